//! Outer envelope of one raw event buffer
//!
//! Layout:
//! ```text
//! ┌──────────────────────────────────────┐
//! │ magic 0xCAFEBABE (u32)               │
//! │ frame count N (u32)                  │
//! │ frame length × N (u32 each)          │
//! ├──────────────────────────────────────┤
//! │ frame 0, padded to 4 bytes           │
//! │ ...                                  │
//! │ frame N-1                            │
//! └──────────────────────────────────────┘
//! ```
//! Count and lengths are big-endian unless configured otherwise; the magic
//! is accepted in either byte order.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use super::error_mask::ErrorMask;

/// Envelope magic word
pub const ENVELOPE_MAGIC: u32 = 0xCAFE_BABE;

/// Largest accepted frame count
pub const MAX_FRAMES: u32 = 256;

/// Largest accepted buffer size in bytes
pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Smallest accepted buffer (magic + count)
pub const MIN_BUFFER_SIZE: usize = 8;

/// Smallest frame: header, trigger number and checksum
pub const MIN_FRAME_SIZE: usize = 8;

/// Errors that abort decoding of a whole buffer
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EnvelopeError {
    #[error("Invalid buffer size: {0} bytes")]
    BufferSize(usize),

    #[error("Invalid magic word 0x{0:08x}")]
    Magic(u32),

    #[error("Too many frames: {0}")]
    FrameCount(u32),

    #[error("Frame table of {count} entries does not fit into {available} bytes")]
    FrameTable { count: u32, available: usize },

    #[error("Frame {index}: invalid length {length} at offset {offset} ({available} bytes left)")]
    FrameSize {
        index: usize,
        length: usize,
        offset: usize,
        available: usize,
    },
}

impl EnvelopeError {
    /// Error bit recorded for this abort
    pub fn error_mask(&self) -> ErrorMask {
        match self {
            Self::BufferSize(_) => ErrorMask::PACKET_SIZE,
            Self::Magic(_) => ErrorMask::MAGIC,
            Self::FrameCount(_) => ErrorMask::FRAME_COUNT,
            Self::FrameTable { .. } | Self::FrameSize { .. } => ErrorMask::FRAME_SIZE,
        }
    }
}

/// Location of one frame inside the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    pub index: usize,
    /// Byte offset from the start of the buffer
    pub offset: usize,
    /// Declared length (may be unaligned)
    pub length: usize,
}

impl FrameSlot {
    /// Length is a multiple of four
    pub fn is_aligned(&self) -> bool {
        self.length % 4 == 0
    }
}

/// Parsed frame table of one buffer
#[derive(Debug, Clone)]
pub struct FrameTable<'a> {
    buffer: &'a [u8],
    slots: Vec<FrameSlot>,
}

impl<'a> FrameTable<'a> {
    /// Parse the envelope header and locate every frame
    pub fn parse(buffer: &'a [u8], big_endian: bool) -> Result<Self, EnvelopeError> {
        if buffer.len() < MIN_BUFFER_SIZE || buffer.len() > MAX_BUFFER_SIZE {
            return Err(EnvelopeError::BufferSize(buffer.len()));
        }

        let word = |offset: usize| -> u32 {
            let b = [
                buffer[offset],
                buffer[offset + 1],
                buffer[offset + 2],
                buffer[offset + 3],
            ];
            if big_endian {
                u32::from_be_bytes(b)
            } else {
                u32::from_le_bytes(b)
            }
        };

        let magic = word(0);
        if magic != ENVELOPE_MAGIC && magic.swap_bytes() != ENVELOPE_MAGIC {
            return Err(EnvelopeError::Magic(magic));
        }

        let count = word(4);
        if count > MAX_FRAMES {
            return Err(EnvelopeError::FrameCount(count));
        }

        let table_end = MIN_BUFFER_SIZE + 4 * count as usize;
        if table_end > buffer.len() {
            return Err(EnvelopeError::FrameTable {
                count,
                available: buffer.len(),
            });
        }

        let mut slots = Vec::with_capacity(count as usize);
        let mut offset = table_end;
        for index in 0..count as usize {
            let length = word(MIN_BUFFER_SIZE + 4 * index) as usize;
            let available = buffer.len().saturating_sub(offset);
            if length == 0 || length > available {
                return Err(EnvelopeError::FrameSize {
                    index,
                    length,
                    offset,
                    available,
                });
            }
            slots.push(FrameSlot {
                index,
                offset,
                length,
            });
            // frames are padded to 32-bit boundaries
            offset += (length + 3) & !3;
        }

        if offset < buffer.len() {
            warn!(
                trailing = buffer.len() - offset,
                frames = count,
                "Trailing bytes after last frame"
            );
        }

        Ok(Self { buffer, slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    /// Bytes of one frame (declared length, checksum included)
    pub fn frame(&self, slot: &FrameSlot) -> &'a [u8] {
        &self.buffer[slot.offset..slot.offset + slot.length]
    }

    /// Iterate over (slot, bytes) pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (FrameSlot, &'a [u8])> + '_ {
        self.slots.iter().map(move |slot| (*slot, self.frame(slot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(lengths: &[u32], payload: usize, big_endian: bool) -> Vec<u8> {
        let enc = |v: u32| {
            if big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            }
        };
        let mut buf = Vec::new();
        buf.extend_from_slice(&enc(ENVELOPE_MAGIC));
        buf.extend_from_slice(&enc(lengths.len() as u32));
        for &l in lengths {
            buf.extend_from_slice(&enc(l));
        }
        buf.extend(std::iter::repeat(0xAA).take(payload));
        buf
    }

    #[test]
    fn test_parse_frames() {
        let buf = envelope(&[8, 12], 20, true);
        let table = FrameTable::parse(&buf, true).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.slots()[0].offset, 16);
        assert_eq!(table.slots()[1].offset, 24);
        assert_eq!(table.frame(&table.slots()[1]).len(), 12);
    }

    #[test]
    fn test_unaligned_frame_is_padded() {
        let buf = envelope(&[9, 8], 20, true);
        let table = FrameTable::parse(&buf, true).unwrap();
        assert!(!table.slots()[0].is_aligned());
        assert_eq!(table.slots()[1].offset, 16 + 12);
    }

    #[test]
    fn test_little_endian_table() {
        let buf = envelope(&[8], 8, false);
        let table = FrameTable::parse(&buf, false).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_swapped_magic_accepted() {
        let mut buf = envelope(&[8], 8, true);
        buf[0..4].copy_from_slice(&ENVELOPE_MAGIC.to_le_bytes());
        assert!(FrameTable::parse(&buf, true).is_ok());
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = envelope(&[8], 8, true);
        buf[0] = 0x00;
        let err = FrameTable::parse(&buf, true).unwrap_err();
        assert!(matches!(err, EnvelopeError::Magic(_)));
        assert_eq!(err.error_mask(), ErrorMask::MAGIC);
    }

    #[test]
    fn test_buffer_too_small() {
        let err = FrameTable::parse(&[0xCA, 0xFE, 0xBA], true).unwrap_err();
        assert_eq!(err, EnvelopeError::BufferSize(3));
        assert_eq!(err.error_mask(), ErrorMask::PACKET_SIZE);
    }

    #[test]
    fn test_too_many_frames() {
        let mut buf = envelope(&[], 0, true);
        buf[4..8].copy_from_slice(&300u32.to_be_bytes());
        let err = FrameTable::parse(&buf, true).unwrap_err();
        assert_eq!(err, EnvelopeError::FrameCount(300));
    }

    #[test]
    fn test_frame_overrun() {
        let buf = envelope(&[8, 64], 16, true);
        let err = FrameTable::parse(&buf, true).unwrap_err();
        assert!(matches!(err, EnvelopeError::FrameSize { index: 1, .. }));
        assert_eq!(err.error_mask(), ErrorMask::FRAME_SIZE);
    }

    #[test]
    fn test_zero_length_frame() {
        let buf = envelope(&[0], 8, true);
        assert!(matches!(
            FrameTable::parse(&buf, true),
            Err(EnvelopeError::FrameSize { length: 0, .. })
        ));
    }

    #[test]
    fn test_empty_envelope() {
        let buf = envelope(&[], 0, true);
        let table = FrameTable::parse(&buf, true).unwrap();
        assert!(table.is_empty());
    }
}
