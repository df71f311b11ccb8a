//! Frame checksum (CRC-32, polynomial 0x04C11DB7)
//!
//! Parameters: init 0, no input/output reflection, no final xor.
//! The checksum covers every byte of the frame except the last four,
//! which hold the stored value in big-endian order.

use super::header::read_u32_be;

/// Size of the trailing checksum in bytes
pub const CHECKSUM_SIZE: usize = 4;

/// Default frame size above which validation may be skipped
pub const DEFAULT_CHECKSUM_SIZE_LIMIT: usize = 1024 * 1024;

const POLYNOMIAL: u32 = 0x04C1_1DB7;

static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Incremental CRC-32 computer
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCrc {
    value: u32,
}

impl FrameCrc {
    pub fn new() -> Self {
        Self { value: 0 }
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let index = ((self.value >> 24) ^ byte as u32) as usize;
            self.value = (self.value << 8) ^ TABLE[index];
        }
    }

    pub fn finalize(&self) -> u32 {
        self.value
    }

    /// Compute the checksum of a whole buffer
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

/// Append the checksum of `frame` to it (used when building frames)
pub fn append_checksum(frame: &mut Vec<u8>) {
    let crc = FrameCrc::compute(frame);
    frame.extend_from_slice(&crc.to_be_bytes());
}

/// Stored checksum (last four bytes) of a frame
pub fn stored_checksum(frame: &[u8]) -> Option<u32> {
    let offset = frame.len().checked_sub(CHECKSUM_SIZE)?;
    read_u32_be(frame, offset)
}

/// Result of validating one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumOutcome {
    Ok,
    Mismatch { expected: u32, computed: u32 },
    /// Frame larger than the configured limit; not validated
    SkippedOversize { length: usize },
}

/// Frame checksum validator with an oversize policy
#[derive(Debug, Clone, Copy)]
pub struct ChecksumValidator {
    size_limit: usize,
    skip_oversize: bool,
}

impl Default for ChecksumValidator {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKSUM_SIZE_LIMIT, true)
    }
}

impl ChecksumValidator {
    pub fn new(size_limit: usize, skip_oversize: bool) -> Self {
        Self {
            size_limit,
            skip_oversize,
        }
    }

    /// Validate the trailing checksum of a frame
    pub fn validate(&self, frame: &[u8]) -> ChecksumOutcome {
        if self.skip_oversize && frame.len() > self.size_limit {
            return ChecksumOutcome::SkippedOversize {
                length: frame.len(),
            };
        }

        let Some(expected) = stored_checksum(frame) else {
            return ChecksumOutcome::Mismatch {
                expected: 0,
                computed: 0,
            };
        };
        let computed = FrameCrc::compute(&frame[..frame.len() - CHECKSUM_SIZE]);

        if computed == expected {
            ChecksumOutcome::Ok
        } else {
            ChecksumOutcome::Mismatch { expected, computed }
        }
    }
}
