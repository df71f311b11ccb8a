//! Common 16-bit frame header and big-endian field readers
//!
//! Every frame inside an envelope starts with one big-endian 16-bit word:
//!
//! ```text
//!  15 | 14..11     | 10 | 9..0
//!  E  | frame type |  - | misc (type-specific)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header word constants
mod constants {
    pub const ERROR_FLAG_SHIFT: u32 = 15;
    pub const FRAME_TYPE_MASK: u16 = 0x7800;
    pub const FRAME_TYPE_SHIFT: u32 = 11;
    pub const MISC_MASK: u16 = 0x3FF;

    // misc field of data and section frames
    pub const SECTION_ID_SHIFT: u32 = 4;
    pub const SECTION_ID_MASK: u16 = 0x3F;
    pub const CHIP_PORT_MASK: u16 = 0x3;
    pub const REFORMATTED_SHIFT: u32 = 3;
    pub const CHIP_MASK: u16 = 0xF;

    // misc field of envelope frames
    pub const SECTION_MASK: u16 = 0x1F;
    pub const ENVELOPE_ID_SHIFT: u32 = 5;
    pub const ENVELOPE_ID_MASK: u16 = 0xF;
}

use constants::*;

/// Size of the common header word in bytes
pub const HEADER_SIZE: usize = 2;

/// Header parse errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Truncated frame header: {available} byte(s) available, {HEADER_SIZE} required")]
    Truncated { available: usize },
}

/// Frame type carried in bits 14..11 of the header word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    /// Unprocessed ADC dump of one chip
    RawHit,
    /// Raw cluster words from the cluster engine
    RawCluster,
    /// Placeholder frame for a chip without data
    Ghost,
    /// Opens a section (one sensor)
    SectionStart,
    /// Closes a section
    SectionEnd,
    /// Zero-suppressed chip hits
    ZeroSuppressedHit,
    /// Per-chip common-mode values
    CommonMode,
    /// Clusters after region-of-interest filtering
    FilteredCluster,
    /// Opens the event envelope
    EventStart,
    /// Closes the event envelope
    EventEnd,
    /// Zero-suppressed hits after region-of-interest filtering
    FilteredHit,
    /// Trigger metadata (always the first frame)
    TriggerMeta,
    /// Region-of-interest records
    RegionOfInterest,
    /// Any other 4-bit code
    Unknown(u8),
}

impl FrameType {
    /// Map a 4-bit type code to a frame type
    pub fn from_code(code: u8) -> Self {
        match code & 0xF {
            0x0 => Self::RawHit,
            0x1 => Self::RawCluster,
            0x2 => Self::Ghost,
            0x3 => Self::SectionStart,
            0x4 => Self::SectionEnd,
            0x5 => Self::ZeroSuppressedHit,
            0x6 => Self::CommonMode,
            0x9 => Self::FilteredCluster,
            0xB => Self::EventStart,
            0xC => Self::EventEnd,
            0xD => Self::FilteredHit,
            0xE => Self::TriggerMeta,
            0xF => Self::RegionOfInterest,
            other => Self::Unknown(other),
        }
    }

    /// 4-bit type code
    pub fn code(self) -> u8 {
        match self {
            Self::RawHit => 0x0,
            Self::RawCluster => 0x1,
            Self::Ghost => 0x2,
            Self::SectionStart => 0x3,
            Self::SectionEnd => 0x4,
            Self::ZeroSuppressedHit => 0x5,
            Self::CommonMode => 0x6,
            Self::FilteredCluster => 0x9,
            Self::EventStart => 0xB,
            Self::EventEnd => 0xC,
            Self::FilteredHit => 0xD,
            Self::TriggerMeta => 0xE,
            Self::RegionOfInterest => 0xF,
            Self::Unknown(code) => code & 0xF,
        }
    }

    /// Exact frame size in bytes (checksum included) for fixed-size types
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Ghost => Some(8),
            Self::SectionStart | Self::SectionEnd => Some(16),
            Self::EventStart => Some(20),
            Self::EventEnd => Some(16),
            Self::TriggerMeta => Some(32),
            Self::CommonMode => Some(200),
            _ => None,
        }
    }

    /// Whether the frame type only appears after region-of-interest filtering
    pub fn is_filtered(self) -> bool {
        matches!(self, Self::FilteredHit | Self::FilteredCluster)
    }

    /// Short name used in log output
    pub fn name(self) -> &'static str {
        match self {
            Self::RawHit => "raw_hit",
            Self::RawCluster => "raw_cluster",
            Self::Ghost => "ghost",
            Self::SectionStart => "section_start",
            Self::SectionEnd => "section_end",
            Self::ZeroSuppressedHit => "zsd_hit",
            Self::CommonMode => "common_mode",
            Self::FilteredCluster => "filtered_cluster",
            Self::EventStart => "event_start",
            Self::EventEnd => "event_end",
            Self::FilteredHit => "filtered_hit",
            Self::TriggerMeta => "trigger_meta",
            Self::RegionOfInterest => "roi",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown(0x{:x})", code),
            other => f.write_str(other.name()),
        }
    }
}

/// Decoded common frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw header word
    pub word: u16,
    /// Error flag (bit 15)
    pub error_flag: bool,
    /// Frame type (bits 14..11)
    pub frame_type: FrameType,
    /// Type-specific field (bits 9..0)
    pub misc: u16,
}

impl FrameHeader {
    /// Parse the header from the first two bytes of a frame
    pub fn parse(frame: &[u8]) -> Result<Self, HeaderError> {
        read_u16_be(frame, 0)
            .map(Self::from_word)
            .ok_or(HeaderError::Truncated {
                available: frame.len(),
            })
    }

    /// Decode a header word
    pub fn from_word(word: u16) -> Self {
        Self {
            word,
            error_flag: (word >> ERROR_FLAG_SHIFT) & 1 == 1,
            frame_type: FrameType::from_code(((word & FRAME_TYPE_MASK) >> FRAME_TYPE_SHIFT) as u8),
            misc: word & MISC_MASK,
        }
    }

    /// Build a header word from its fields
    pub fn encode(frame_type: FrameType, misc: u16, error_flag: bool) -> u16 {
        let flag = if error_flag { 1 << ERROR_FLAG_SHIFT } else { 0 };
        flag | ((frame_type.code() as u16) << FRAME_TYPE_SHIFT) | (misc & MISC_MASK)
    }

    /// Section identifier of data and section frames
    pub fn section_id(&self) -> u8 {
        ((self.misc >> SECTION_ID_SHIFT) & SECTION_ID_MASK) as u8
    }

    /// Chip port of data frames
    pub fn chip_port(&self) -> u8 {
        (self.misc & CHIP_PORT_MASK) as u8
    }

    /// Data was reformatted upstream; pixel coordinates are already remapped
    pub fn reformatted(&self) -> bool {
        (self.misc >> REFORMATTED_SHIFT) & 1 == 1
    }

    /// Active chip mask of a section start
    pub fn active_chip_mask(&self) -> u8 {
        (self.misc & CHIP_MASK) as u8
    }

    /// Active section mask of an event start
    pub fn active_section_mask(&self) -> u8 {
        (self.misc & SECTION_MASK) as u8
    }

    /// Envelope identifier of event start/end frames
    pub fn envelope_id(&self) -> u8 {
        ((self.misc >> ENVELOPE_ID_SHIFT) & ENVELOPE_ID_MASK) as u8
    }
}

/// Read a big-endian u16 at `offset`
pub fn read_u16_be(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a big-endian u32 at `offset`
pub fn read_u32_be(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a big-endian u64 at `offset`
pub fn read_u64_be(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset.checked_add(8)?)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Some(u64::from_be_bytes(buf))
}
