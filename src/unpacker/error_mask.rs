//! Accumulated decode error bits
//!
//! Each detected problem sets one bit. The mask is a plain `u64` newtype so it
//! can be stored, compared against a critical mask and serialized cheaply.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Set of decode error kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorMask(u64);

/// Name and description of one error bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorKind {
    pub bit: u32,
    pub name: &'static str,
    pub description: &'static str,
}

macro_rules! error_bits {
    ($( $bit:literal => $name:ident : $desc:literal ),+ $(,)?) => {
        impl ErrorMask {
            $(
                #[doc = $desc]
                pub const $name: Self = Self(1u64 << $bit);
            )+
        }

        /// All defined error kinds, in bit order
        pub const ERROR_KINDS: &[ErrorKind] = &[
            $( ErrorKind { bit: $bit, name: stringify!($name), description: $desc }, )+
        ];
    };
}

error_bits! {
    0 => PACKET_SIZE: "Envelope size outside the accepted range",
    1 => MAGIC: "Envelope magic word not recognized",
    2 => FRAME_COUNT: "Envelope frame count too large",
    3 => FRAME_SIZE: "Frame length zero, too small or past the buffer end",
    4 => FRAME_ALIGNMENT: "Frame length not a multiple of four",
    5 => FIXED_SIZE: "Fixed-size frame has the wrong length",
    6 => UNKNOWN_FRAME_TYPE: "Unknown frame type code",
    7 => CHECKSUM: "Frame checksum mismatch",
    8 => TRIGGER_META_ORDER: "Trigger metadata frame missing from first position or repeated",
    9 => SECTION_ENVELOPE_ORDER: "Event start frame missing from second position or repeated",
    10 => EVENT_END_MISSING: "Last frame is not an event end",
    11 => EVENT_END_DUPLICATE: "Event end frame before the last position",
    12 => SECTION_START_MISSING: "Third frame is not a section start although sections are active",
    13 => SECTION_START_WITHOUT_END: "Section start while the previous section is still open",
    14 => SECTION_END_WITHOUT_START: "Section end without a matching start",
    15 => SECTION_ID_ORDER: "Section identifiers not strictly increasing",
    16 => SECTION_START_END_ID: "Section end identifier differs from its start",
    17 => SECTION_FRAME_ID: "Data frame belongs to a different section",
    18 => SECTION_ID_INVALID: "Section identifier does not name a valid module",
    19 => DATA_OUTSIDE_SECTION: "Frame outside any open section",
    20 => CHIP_SECTION_ID: "Chip header section identifier differs from the frame header",
    21 => CHIP_PORT: "Chip header port differs from the frame header",
    22 => DHP_SIZE: "Chip payload too short or of unexpected size",
    23 => PIXEL_WITHOUT_ROW: "Pixel word before any row word",
    24 => DOUBLE_HEADER: "Chip header repeated at the start of the payload",
    25 => ROW_OVERFLOW: "Decoded row beyond the sensor",
    26 => CHIP_FRAME_NOT_CONTINUOUS: "Chip frame numbers on one port not continuous",
    27 => CHIP_FRAME_DIFFER: "Chip frame numbers differ across ports",
    28 => CHIP_SECTION_FRAME_DIFFER: "Chip frame number far from the section start frame number",
    29 => WORD_COUNT_MISMATCH: "Section word count differs from the declared value",
    30 => EVENT_WORD_COUNT_MISMATCH: "Envelope word count differs from the declared value",
    31 => CHIP_MASK_MISMATCH: "Chips seen differ from the active chip mask",
    32 => SECTION_COUNT_MISMATCH: "Section start/end counts differ from the active section mask",
    33 => EVENT_ID_START_END: "Event end identifier differs from event start",
    34 => META_TRIGGER: "Trigger number differs from the event metadata",
    35 => META_TRIGGER_EVENT_START: "Event start trigger number differs from the event metadata",
    36 => META_TRIGGER_SECTION_START: "Section start trigger number differs from the event metadata",
    37 => META_RUN: "Run number differs from the event metadata",
    38 => META_SUBRUN: "Subrun number differs from the event metadata",
    39 => META_EXPERIMENT: "Experiment number differs from the event metadata",
    40 => FRAME_TRIGGER_MISMATCH: "Frame trigger number differs from the trigger metadata frame",
    41 => TRIGGER_MAGIC: "Trigger metadata magic word invalid",
    42 => TRIGGER_SOURCE_MISMATCH: "Primary and secondary trigger sources disagree",
    43 => NO_SECONDARY_TRIGGER: "Secondary trigger source missing",
    44 => FAKE_NO_DATA: "Envelope is a placeholder without data",
    45 => HEADER_ERROR_FLAG: "Header error flag set on a non-ghost frame",
    46 => GHOST_WITHOUT_ERROR_FLAG: "Ghost frame without header error flag",
    47 => UNEXPECTED_FILTERED_FRAME: "Filtered frame in an unfiltered event",
    48 => UNEXPECTED_UNFILTERED_FRAME: "Unfiltered frame in a filtered event",
    49 => SUSPICIOUS_PADDING: "Checksum with an all-zero half word",
    50 => ROI_SIZE: "Region-of-interest frame size invalid",
    51 => NO_DATA: "Event has no buffers",
}

impl ErrorMask {
    pub const NONE: Self = Self(0);

    /// Errors that make a frame's content untrustworthy
    pub const FATAL_CLASS: Self = Self(
        Self::FIXED_SIZE.0
            | Self::UNKNOWN_FRAME_TYPE.0
            | Self::CHECKSUM.0
            | Self::DHP_SIZE.0
            | Self::PIXEL_WITHOUT_ROW.0
            | Self::SECTION_START_WITHOUT_END.0
            | Self::CHIP_FRAME_NOT_CONTINUOUS.0,
    );

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Number of bits set
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Defined error kinds present in this mask
    pub fn kinds(self) -> impl Iterator<Item = &'static ErrorKind> {
        ERROR_KINDS
            .iter()
            .filter(move |kind| self.0 & (1u64 << kind.bit) != 0)
    }

    /// Look up a single bit (or the `FATAL_CLASS` group) by name
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("FATAL_CLASS") {
            return Some(Self::FATAL_CLASS);
        }
        ERROR_KINDS
            .iter()
            .find(|kind| kind.name.eq_ignore_ascii_case(name))
            .map(|kind| Self(1u64 << kind.bit))
    }
}

impl BitOr for ErrorMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ErrorMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ErrorMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for ErrorMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for kind in self.kinds() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(kind.name)?;
            first = false;
        }
        if first {
            write!(f, "0x{:016x}", self.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_distinct() {
        let mut seen = 0u64;
        for (i, kind) in ERROR_KINDS.iter().enumerate() {
            assert_eq!(kind.bit as usize, i, "{} out of order", kind.name);
            let bit = 1u64 << kind.bit;
            assert_eq!(seen & bit, 0, "{} reuses bit {}", kind.name, kind.bit);
            seen |= bit;
        }
    }

    #[test]
    fn test_set_operations() {
        let mut mask = ErrorMask::NONE;
        assert!(mask.is_empty());
        mask |= ErrorMask::CHECKSUM;
        mask.insert(ErrorMask::ROI_SIZE);
        assert!(mask.contains(ErrorMask::CHECKSUM));
        assert!(mask.intersects(ErrorMask::ROI_SIZE | ErrorMask::MAGIC));
        assert!(!mask.contains(ErrorMask::ROI_SIZE | ErrorMask::MAGIC));
        assert_eq!(mask.count(), 2);
        assert_eq!(mask & ErrorMask::CHECKSUM, ErrorMask::CHECKSUM);
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorMask::NONE.to_string(), "NONE");
        let mask = ErrorMask::MAGIC | ErrorMask::CHECKSUM;
        assert_eq!(mask.to_string(), "MAGIC|CHECKSUM");
    }

    #[test]
    fn test_from_name() {
        assert_eq!(ErrorMask::from_name("checksum"), Some(ErrorMask::CHECKSUM));
        assert_eq!(
            ErrorMask::from_name(" ROW_OVERFLOW "),
            Some(ErrorMask::ROW_OVERFLOW)
        );
        assert_eq!(ErrorMask::from_name("FATAL_CLASS"), Some(ErrorMask::FATAL_CLASS));
        assert_eq!(ErrorMask::from_name("NOT_AN_ERROR"), None);
    }

    #[test]
    fn test_serde_transparent() {
        let mask = ErrorMask::MAGIC | ErrorMask::NO_DATA;
        let json = serde_json::to_string(&mask).unwrap();
        assert_eq!(json, (mask.bits()).to_string());
        let back: ErrorMask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mask);
    }
}
