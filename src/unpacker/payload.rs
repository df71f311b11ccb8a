//! Variable-length payload decoders: zero-suppressed hits, raw ADC dumps,
//! cluster words and region-of-interest records
//!
//! Chip payload layout (16-bit big-endian words, checksum excluded):
//! ```text
//! word 0..1  frame header + trigger number
//! word 2     chip header   [15:13] type  [7:2] section id  [1:0] port
//! word 3     chip frame number
//! word 4..   row / pixel words
//! ```

use tracing::{debug, error};

use super::error_mask::ErrorMask;
use super::header::read_u64_be;
use super::remap::{Remapper, SENSOR_ROWS};
use crate::common::{PixelHit, RoiRecord};

/// Payload word constants
pub mod constants {
    // Chip header (word 2)
    pub const CHIP_TYPE_MASK: u16 = 0xE000;
    pub const CHIP_TYPE_SHIFT: u32 = 13;
    pub const CHIP_SECTION_MASK: u16 = 0x00FC;
    pub const CHIP_SECTION_SHIFT: u32 = 2;
    pub const CHIP_PORT_MASK: u16 = 0x0003;

    // Row / pixel words
    pub const PIXEL_FLAG: u16 = 0x8000;
    pub const ROW_MASK: u16 = 0xFFC0;
    pub const ROW_SHIFT: u32 = 5;
    pub const COMMON_MODE_MASK: u16 = 0x003F;
    pub const ROW_LOW_BIT_MASK: u16 = 0x4000;
    pub const ROW_LOW_BIT_SHIFT: u32 = 14;
    pub const COLUMN_MASK: u16 = 0x3F00;
    pub const COLUMN_SHIFT: u32 = 8;
    pub const AMPLITUDE_MASK: u16 = 0x00FF;

    // Cluster words
    pub const CLUSTER_START_FLAG: u16 = 0x4000;

    // Raw ADC payload sizes (frame minus checksum)
    pub const RAW_ADC_SIZE: usize = 0x10008;
    pub const RAW_ADC_PEDESTAL_SIZE: usize = 0x20008;
    pub const RAW_HEADER_SIZE: usize = 8;

    pub const FRAME_NUMBER_DELTA_MASK: u16 = 0x3F;

    // ROI frame: header, inner checksum copy, checksum
    pub const ROI_HEADER_SIZE: usize = 4;
    pub const ROI_OVERHEAD: usize = 12;
    pub const ROI_SIZE: usize = 8;
}

use constants::*;

/// Chip header type of raw frames
pub const CHIP_TYPE_RAW: u8 = 0;

/// Chip header type of zero-suppressed frames
pub const CHIP_TYPE_ZERO_SUPPRESSED: u8 = 5;

/// Chip-level header (word 2 of chip frames)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipHeader {
    pub chip_type: u8,
    pub section_id: u8,
    pub chip_port: u8,
}

impl ChipHeader {
    pub fn from_word(word: u16) -> Self {
        Self {
            chip_type: ((word & CHIP_TYPE_MASK) >> CHIP_TYPE_SHIFT) as u8,
            section_id: ((word & CHIP_SECTION_MASK) >> CHIP_SECTION_SHIFT) as u8,
            chip_port: (word & CHIP_PORT_MASK) as u8,
        }
    }

    pub fn encode(chip_type: u8, section_id: u8, chip_port: u8) -> u16 {
        ((chip_type as u16) << CHIP_TYPE_SHIFT)
            | (((section_id as u16) << CHIP_SECTION_SHIFT) & CHIP_SECTION_MASK)
            | (chip_port as u16 & CHIP_PORT_MASK)
    }

    pub fn is_zero_suppressed(&self) -> bool {
        self.chip_type == CHIP_TYPE_ZERO_SUPPRESSED
    }

    pub fn is_raw(&self) -> bool {
        self.chip_type == CHIP_TYPE_RAW
    }
}

/// Split a payload into big-endian 16-bit words (odd trailing byte ignored)
pub fn payload_words(payload: &[u8]) -> Vec<u16> {
    payload
        .chunks_exact(2)
        .map(|w| u16::from_be_bytes([w[0], w[1]]))
        .collect()
}

/// Section context needed to turn chip words into hits
#[derive(Debug, Clone, Copy)]
pub struct PixelContext {
    pub section_id: u8,
    pub chip_port: u8,
    pub reformatted: bool,
    pub start_frame_number: u16,
    pub trigger_row_offset: u16,
    pub chip_frame_number: u16,
}

/// Hits decoded from one zero-suppressed frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZeroSuppressedHits {
    pub hits: Vec<PixelHit>,
    pub errors: ErrorMask,
    /// Hits dropped because their channel has no drain
    pub unmapped: u32,
}

/// True when the payload starts with a repeated chip header (frame number + 1)
pub fn has_double_header(words: &[u16]) -> bool {
    words.len() >= 6 && words[2] == words[4] && words[3].wrapping_add(1) == words[5]
}

/// Decode row and pixel words (from word 4 on) into hits
///
/// A pixel word before any row word aborts the frame; hits decoded up to
/// that point are kept.
pub fn decode_pixel_words(
    words: &[u16],
    ctx: &PixelContext,
    remapper: &Remapper,
) -> ZeroSuppressedHits {
    let mut out = ZeroSuppressedHits::default();
    let mut row: Option<u16> = None;
    let mut common_mode = 0u8;
    let frame_number_delta =
        (ctx.chip_frame_number.wrapping_sub(ctx.start_frame_number) & FRAME_NUMBER_DELTA_MASK) as u8;

    for &word in words {
        if word & PIXEL_FLAG == 0 {
            row = Some((word & ROW_MASK) >> ROW_SHIFT);
            common_mode = (word & COMMON_MODE_MASK) as u8;
            continue;
        }

        let Some(current) = row else {
            error!(
                section_id = ctx.section_id,
                chip_port = ctx.chip_port,
                word = %format_args!("{:#06x}", word),
                "Pixel word without preceding row word, skipping chip data"
            );
            out.errors |= ErrorMask::PIXEL_WITHOUT_ROW;
            return out;
        };

        let pixel_row = (current & 0xFFE) | ((word & ROW_LOW_BIT_MASK) >> ROW_LOW_BIT_SHIFT);
        row = Some(pixel_row);
        let column = (word & COLUMN_MASK) >> COLUMN_SHIFT;
        let amplitude = (word & AMPLITUDE_MASK) as u8;

        if pixel_row >= SENSOR_ROWS {
            error!(row = pixel_row, section_id = ctx.section_id, "Row overflow");
            out.errors |= ErrorMask::ROW_OVERFLOW;
        }

        let (row, column) = if ctx.reformatted {
            (pixel_row, column)
        } else {
            match remapper.remap(ctx.section_id, ctx.chip_port, pixel_row, column) {
                Some(mapped) => mapped,
                None => {
                    debug!(
                        row = pixel_row,
                        column,
                        chip_port = ctx.chip_port,
                        "Dropping hit on unconnected drain"
                    );
                    out.unmapped += 1;
                    continue;
                }
            }
        };

        out.hits.push(PixelHit {
            row,
            column,
            amplitude,
            trigger_time_offset: ctx.trigger_row_offset,
            frame_number_delta,
            common_mode,
        });
    }

    out
}

/// Capture mode of a raw ADC payload, `None` for any other size
pub fn raw_capture_mode(payload_len: usize) -> Option<bool> {
    match payload_len {
        RAW_ADC_SIZE => Some(false),
        RAW_ADC_PEDESTAL_SIZE => Some(true),
        _ => None,
    }
}

/// ADC samples of a raw payload (after frame and chip headers)
pub fn raw_samples(payload: &[u8]) -> &[u8] {
    payload.get(RAW_HEADER_SIZE..).unwrap_or(&[])
}

/// Split cluster words (from word 2 on) into clusters
///
/// A word with bit 15 clear and bit 14 set starts a new cluster. A trailing
/// row word is alignment padding and is zeroed.
pub fn split_clusters(words: &[u16]) -> Vec<Vec<u16>> {
    let repeats_row = match words.split_last() {
        Some((&last, rest)) => rest.iter().any(|&w| w & PIXEL_FLAG == 0 && w == last),
        None => false,
    };
    let mut words = words.to_vec();
    if repeats_row {
        if let Some(w) = words.last_mut() {
            *w = 0;
        }
    }

    let mut clusters = Vec::new();
    let mut current: Vec<u16> = Vec::new();
    for (i, &word) in words.iter().enumerate() {
        let is_start = word & PIXEL_FLAG == 0 && word & CLUSTER_START_FLAG != 0;
        if is_start && i > 0 && !current.is_empty() {
            clusters.push(std::mem::take(&mut current));
        }
        current.push(word);
    }

    if let Some(w) = current.last_mut() {
        if *w & PIXEL_FLAG == 0 {
            *w = 0;
        }
    }
    if !current.is_empty() {
        clusters.push(current);
    }
    clusters
}

/// Region-of-interest size check
pub fn check_roi_size(length: usize) -> ErrorMask {
    if length < ROI_OVERHEAD || (length - ROI_OVERHEAD) % ROI_SIZE != 0 {
        ErrorMask::ROI_SIZE
    } else {
        ErrorMask::NONE
    }
}

/// Region-of-interest records of a frame; fractional trailing bytes ignored
pub fn decode_rois(frame: &[u8]) -> Vec<RoiRecord> {
    if frame.len() < ROI_OVERHEAD {
        return Vec::new();
    }
    let count = (frame.len() - ROI_OVERHEAD) / ROI_SIZE;
    (0..count)
        .filter_map(|i| read_u64_be(frame, ROI_HEADER_SIZE + i * ROI_SIZE))
        .map(RoiRecord)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(section_id: u8, reformatted: bool) -> PixelContext {
        PixelContext {
            section_id,
            chip_port: 0,
            reformatted,
            start_frame_number: 10,
            trigger_row_offset: 42,
            chip_frame_number: 11,
        }
    }

    fn row_word(row: u16, cm: u8) -> u16 {
        ((row >> 1) << 6) | cm as u16
    }

    fn pixel_word(row_low: u16, column: u16, adc: u8) -> u16 {
        0x8000 | (row_low << 14) | (column << 8) | adc as u16
    }

    #[test]
    fn test_chip_header_roundtrip() {
        let word = ChipHeader::encode(CHIP_TYPE_ZERO_SUPPRESSED, 0x21, 3);
        let header = ChipHeader::from_word(word);
        assert!(header.is_zero_suppressed());
        assert_eq!(header.section_id, 0x21);
        assert_eq!(header.chip_port, 3);
    }

    #[test]
    fn test_decode_reformatted_pixels() {
        let words = [row_word(100, 5), pixel_word(1, 7, 200), pixel_word(0, 8, 10)];
        let out = decode_pixel_words(&words, &ctx(0x02, true), &Remapper::default());
        assert_eq!(out.errors, ErrorMask::NONE);
        assert_eq!(out.hits.len(), 2);
        assert_eq!(out.hits[0].row, 101);
        assert_eq!(out.hits[0].column, 7);
        assert_eq!(out.hits[0].amplitude, 200);
        assert_eq!(out.hits[0].common_mode, 5);
        assert_eq!(out.hits[0].trigger_time_offset, 42);
        assert_eq!(out.hits[0].frame_number_delta, 1);
        assert_eq!(out.hits[1].row, 100);
    }

    #[test]
    fn test_pixel_without_row_keeps_earlier_hits() {
        let out = decode_pixel_words(&[pixel_word(0, 1, 1)], &ctx(0x02, true), &Remapper::default());
        assert!(out.hits.is_empty());
        assert_eq!(out.errors, ErrorMask::PIXEL_WITHOUT_ROW);
    }

    #[test]
    fn test_row_overflow_still_emits() {
        let words = [row_word(800, 0), pixel_word(0, 1, 1)];
        let out = decode_pixel_words(&words, &ctx(0x02, true), &Remapper::default());
        assert_eq!(out.errors, ErrorMask::ROW_OVERFLOW);
        assert_eq!(out.hits.len(), 1);
    }

    #[test]
    fn test_remapped_pixel() {
        // section 0x21 (outer, IF/OB), row 0 col 0 -> drain 240
        let words = [row_word(0, 0), pixel_word(0, 0, 9)];
        let out = decode_pixel_words(&words, &ctx(0x21, false), &Remapper::default());
        assert_eq!(out.hits.len(), 1);
        assert_eq!((out.hits[0].row, out.hits[0].column), (0, 60));
    }

    #[test]
    fn test_unmapped_pixel_dropped() {
        // column 2, row 2 -> unconnected channel
        let words = [row_word(2, 0), pixel_word(0, 2, 9)];
        let out = decode_pixel_words(&words, &ctx(0x21, false), &Remapper::default());
        assert!(out.hits.is_empty());
        assert_eq!(out.unmapped, 1);
        assert_eq!(out.errors, ErrorMask::NONE);
    }

    #[test]
    fn test_double_header() {
        assert!(has_double_header(&[0, 0, 0xA004, 7, 0xA004, 8]));
        assert!(!has_double_header(&[0, 0, 0xA004, 7, 0xA004, 9]));
        assert!(!has_double_header(&[0, 0, 0xA004, 7]));
    }

    #[test]
    fn test_raw_capture_mode() {
        assert_eq!(raw_capture_mode(0x10008), Some(false));
        assert_eq!(raw_capture_mode(0x20008), Some(true));
        assert_eq!(raw_capture_mode(0x10000), None);
    }

    #[test]
    fn test_split_clusters() {
        let words = [0x4001, 0x8001, 0x0002, 0x4003, 0x8003, 0x0004, 0x0004];
        let clusters = split_clusters(&words);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], vec![0x4001, 0x8001, 0x0002]);
        assert_eq!(clusters[1], vec![0x4003, 0x8003, 0x0004, 0x0000]);
    }

    #[test]
    fn test_roi_size_and_decode() {
        assert_eq!(check_roi_size(11), ErrorMask::ROI_SIZE);
        assert_eq!(check_roi_size(12), ErrorMask::NONE);
        assert_eq!(check_roi_size(21), ErrorMask::ROI_SIZE);

        let mut frame = vec![0xF8, 0x00, 0x00, 0x01];
        frame.extend_from_slice(&0x0102_0304_0506_0708u64.to_be_bytes());
        frame.extend_from_slice(&[0u8; 8]);
        let rois = decode_rois(&frame);
        assert_eq!(rois, vec![RoiRecord(0x0102_0304_0506_0708)]);
    }
}
