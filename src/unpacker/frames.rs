//! Fixed-layout frames: trigger metadata, event/section envelopes, ghosts
//!
//! All fields are big-endian. Each `parse` returns `None` when the frame is
//! shorter than its layout; the size itself is checked by the caller.

use serde::{Deserialize, Serialize};

use super::checksum::stored_checksum;
use super::error_mask::ErrorMask;
use super::header::{read_u16_be, read_u32_be, FrameHeader};

/// Field layout constants
pub mod constants {
    // Trigger metadata
    pub const TRIGGER_MAGIC_MASK: u32 = 0xFFFF_0000;
    pub const TRIGGER_MAGIC: u32 = 0xCAFE_0000;
    pub const FLAG_ACCEPTED: u32 = 0x8000;
    pub const FLAG_SEND_UNFILTERED: u32 = 0x4000;
    pub const FLAG_SEND_ROIS: u32 = 0x2000;

    // Trigger tag word
    pub const TAG_SUBRUN_MASK: u32 = 0x0000_00FF;
    pub const TAG_RUN_MASK: u32 = 0x003F_FF00;
    pub const TAG_RUN_SHIFT: u32 = 8;
    pub const TAG_EXPERIMENT_MASK: u32 = 0xFFC0_0000;
    pub const TAG_EXPERIMENT_SHIFT: u32 = 22;

    // Event start run/experiment words
    pub const SUBRUN_MASK: u16 = 0x00FF;
    pub const RUN_LO_MASK: u16 = 0xFF00;
    pub const RUN_LO_SHIFT: u32 = 8;
    pub const RUN_HI_MASK: u16 = 0x003F;
    pub const EXPERIMENT_MASK: u16 = 0xFFC0;
    pub const EXPERIMENT_SHIFT: u32 = 6;

    // Section start frame number / row offset word
    pub const START_FRAME_MASK: u16 = 0xFC00;
    pub const START_FRAME_SHIFT: u32 = 10;
    pub const ROW_OFFSET_MASK: u16 = 0x03FF;

    // Placeholder envelope frames
    pub const FAKED_EVENT_START_WORD: u16 = 0x5800;
    pub const FAKED_EVENT_START_CHECKSUM: u32 = 0x4D21_2948;
    pub const FAKED_EVENT_END_WORD: u16 = 0x6000;
    pub const FAKED_EVENT_END_CHECKSUM: u32 = 0x07A5_BCF7;
}

use constants::*;

/// Experiment / run / subrun triple
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTag {
    pub experiment: u16,
    pub run: u16,
    pub subrun: u8,
}

impl RunTag {
    /// Decode a trigger tag word
    pub fn from_trigger_tag(tag: u32) -> Self {
        Self {
            experiment: ((tag & TAG_EXPERIMENT_MASK) >> TAG_EXPERIMENT_SHIFT) as u16,
            run: ((tag & TAG_RUN_MASK) >> TAG_RUN_SHIFT) as u16,
            subrun: (tag & TAG_SUBRUN_MASK) as u8,
        }
    }

    /// Encode as a trigger tag word
    pub fn to_trigger_tag(&self) -> u32 {
        ((self.experiment as u32) << TAG_EXPERIMENT_SHIFT) & TAG_EXPERIMENT_MASK
            | ((self.run as u32) << TAG_RUN_SHIFT) & TAG_RUN_MASK
            | self.subrun as u32
    }

    /// Decode the run/subrun and experiment/run words of an event start
    pub fn from_event_start(run_subrun: u16, exp_run: u16) -> Self {
        Self {
            experiment: (exp_run & EXPERIMENT_MASK) >> EXPERIMENT_SHIFT,
            run: ((run_subrun & RUN_LO_MASK) >> RUN_LO_SHIFT) | ((exp_run & RUN_HI_MASK) << 8),
            subrun: (run_subrun & SUBRUN_MASK) as u8,
        }
    }

    /// Encode as (run_subrun, exp_run) words of an event start
    pub fn to_event_start(&self) -> (u16, u16) {
        let run_subrun = ((self.run & 0xFF) << RUN_LO_SHIFT) | self.subrun as u16;
        let exp_run = (self.experiment << EXPERIMENT_SHIFT) | ((self.run >> 8) & RUN_HI_MASK);
        (run_subrun, exp_run)
    }
}

/// Trigger metadata frame (always first in the envelope)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerMetaFrame {
    pub trigger_lo: u16,
    pub magic1: u32,
    pub trigger1: u32,
    pub tag1: u32,
    pub magic2: u32,
    pub trigger2: u32,
    pub tag2: u32,
}

impl TriggerMetaFrame {
    pub const SIZE: usize = 32;

    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            trigger_lo: read_u16_be(frame, 2)?,
            magic1: read_u32_be(frame, 4)?,
            trigger1: read_u32_be(frame, 8)?,
            tag1: read_u32_be(frame, 12)?,
            magic2: read_u32_be(frame, 16)?,
            trigger2: read_u32_be(frame, 20)?,
            tag2: read_u32_be(frame, 24)?,
        })
    }

    pub fn accepted(&self) -> bool {
        self.magic1 & FLAG_ACCEPTED != 0
    }

    pub fn send_rois(&self) -> bool {
        self.magic1 & FLAG_SEND_ROIS != 0
    }

    pub fn send_unfiltered(&self) -> bool {
        self.magic1 & FLAG_SEND_UNFILTERED != 0
    }

    /// Secondary source filled with the placeholder pattern
    pub fn secondary_missing(&self) -> bool {
        self.magic2 == TRIGGER_MAGIC && self.trigger2 == 0 && self.tag2 == 0
    }

    pub fn primary_tag(&self) -> RunTag {
        RunTag::from_trigger_tag(self.tag1)
    }

    pub fn secondary_tag(&self) -> RunTag {
        RunTag::from_trigger_tag(self.tag2)
    }

    /// Magic and source-consistency checks
    pub fn check(&self) -> ErrorMask {
        let mut errors = ErrorMask::NONE;
        if self.magic1 & TRIGGER_MAGIC_MASK != TRIGGER_MAGIC
            || self.magic2 & TRIGGER_MAGIC_MASK != TRIGGER_MAGIC
        {
            errors |= ErrorMask::TRIGGER_MAGIC;
        }
        if self.secondary_missing() {
            errors |= ErrorMask::NO_SECONDARY_TRIGGER;
        } else if self.trigger1 != self.trigger2 {
            errors |= ErrorMask::TRIGGER_SOURCE_MISMATCH;
        }
        errors
    }
}

/// Event start frame (second in the envelope)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventStartFrame {
    pub header: FrameHeader,
    pub trigger_lo: u16,
    pub trigger_hi: u16,
    pub time_tag_lo_and_type: u16,
    pub time_tag_mid: u16,
    pub time_tag_hi: u16,
    pub run_subrun: u16,
    pub exp_run: u16,
    pub checksum: u32,
}

impl EventStartFrame {
    pub const SIZE: usize = 20;

    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            header: FrameHeader::from_word(read_u16_be(frame, 0)?),
            trigger_lo: read_u16_be(frame, 2)?,
            trigger_hi: read_u16_be(frame, 4)?,
            time_tag_lo_and_type: read_u16_be(frame, 6)?,
            time_tag_mid: read_u16_be(frame, 8)?,
            time_tag_hi: read_u16_be(frame, 10)?,
            run_subrun: read_u16_be(frame, 12)?,
            exp_run: read_u16_be(frame, 14)?,
            checksum: stored_checksum(&frame[..Self::SIZE])?,
        })
    }

    pub fn trigger_number(&self) -> u32 {
        self.trigger_lo as u32 | ((self.trigger_hi as u32) << 16)
    }

    pub fn run_tag(&self) -> RunTag {
        RunTag::from_event_start(self.run_subrun, self.exp_run)
    }

    pub fn trigger_type(&self) -> u8 {
        (self.time_tag_lo_and_type & 0xF) as u8
    }

    /// 27-bit time tag compared against the event time
    pub fn time_tag(&self) -> u32 {
        (((self.time_tag_mid & 0x7FFF) as u32) << 12) | (self.time_tag_lo_and_type >> 4) as u32
    }

    pub fn active_section_mask(&self) -> u8 {
        self.header.active_section_mask()
    }

    pub fn envelope_id(&self) -> u8 {
        self.header.envelope_id()
    }

    /// Placeholder frame inserted when the envelope carries no data
    pub fn is_faked(&self) -> bool {
        self.header.word == FAKED_EVENT_START_WORD
            && self.trigger_lo == 0
            && self.trigger_hi == 0
            && self.time_tag_lo_and_type == 0
            && self.time_tag_mid == 0
            && self.time_tag_hi == 0
            && self.run_subrun == 0
            && self.exp_run == 0
            && self.checksum == FAKED_EVENT_START_CHECKSUM
    }
}

/// Convert an event time in ns to the 27-bit time tag scale
pub fn expected_time_tag(time_ns: u64) -> u32 {
    (((time_ns % 1_000_000_000) as f64) * 0.127216 + 0.5) as u32
}

/// Section start frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionStartFrame {
    pub header: FrameHeader,
    pub trigger_lo: u16,
    pub trigger_hi: u16,
    pub time_tag_lo: u16,
    pub time_tag_hi: u16,
    pub frame_number_and_offset: u16,
}

impl SectionStartFrame {
    pub const SIZE: usize = 16;

    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            header: FrameHeader::from_word(read_u16_be(frame, 0)?),
            trigger_lo: read_u16_be(frame, 2)?,
            trigger_hi: read_u16_be(frame, 4)?,
            time_tag_lo: read_u16_be(frame, 6)?,
            time_tag_hi: read_u16_be(frame, 8)?,
            frame_number_and_offset: read_u16_be(frame, 10)?,
        })
    }

    pub fn trigger_number(&self) -> u32 {
        self.trigger_lo as u32 | ((self.trigger_hi as u32) << 16)
    }

    /// Last chip frame number before the trigger (6 bits)
    pub fn start_frame_number(&self) -> u16 {
        (self.frame_number_and_offset & START_FRAME_MASK) >> START_FRAME_SHIFT
    }

    /// Row at which the trigger arrived
    pub fn trigger_row_offset(&self) -> u16 {
        self.frame_number_and_offset & ROW_OFFSET_MASK
    }

    pub fn section_id(&self) -> u8 {
        self.header.section_id()
    }

    pub fn active_chip_mask(&self) -> u8 {
        self.header.active_chip_mask()
    }
}

/// Section end frame; word count in 16-bit words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionEndFrame {
    pub header: FrameHeader,
    pub trigger_lo: u16,
    pub words: u32,
    pub error_info: u32,
}

impl SectionEndFrame {
    pub const SIZE: usize = 16;

    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < Self::SIZE {
            return None;
        }
        // low half first
        let lo = read_u16_be(frame, 4)? as u32;
        let hi = read_u16_be(frame, 6)? as u32;
        Some(Self {
            header: FrameHeader::from_word(read_u16_be(frame, 0)?),
            trigger_lo: read_u16_be(frame, 2)?,
            words: lo | (hi << 16),
            error_info: read_u32_be(frame, 8)?,
        })
    }

    pub fn declared_bytes(&self) -> u64 {
        self.words as u64 * 2
    }

    pub fn section_id(&self) -> u8 {
        self.header.section_id()
    }
}

/// Event end frame; word count in 32-bit words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventEndFrame {
    pub header: FrameHeader,
    pub trigger_lo: u16,
    pub words: u32,
    pub error_info: u32,
    pub checksum: u32,
}

impl EventEndFrame {
    pub const SIZE: usize = 16;

    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            header: FrameHeader::from_word(read_u16_be(frame, 0)?),
            trigger_lo: read_u16_be(frame, 2)?,
            words: read_u32_be(frame, 4)?,
            error_info: read_u32_be(frame, 8)?,
            checksum: stored_checksum(&frame[..Self::SIZE])?,
        })
    }

    pub fn declared_bytes(&self) -> u64 {
        self.words as u64 * 4
    }

    pub fn envelope_id(&self) -> u8 {
        self.header.envelope_id()
    }

    pub fn is_faked(&self) -> bool {
        self.header.word == FAKED_EVENT_END_WORD
            && self.trigger_lo == 0
            && self.words == 0
            && self.error_info == 0
            && self.checksum == FAKED_EVENT_END_CHECKSUM
    }
}

/// Placeholder frames for an empty envelope (event start, event end)
pub fn faked_envelope_frames() -> (Vec<u8>, Vec<u8>) {
    let mut start = FAKED_EVENT_START_WORD.to_be_bytes().to_vec();
    start.extend_from_slice(&[0u8; 14]);
    start.extend_from_slice(&FAKED_EVENT_START_CHECKSUM.to_be_bytes());

    let mut end = FAKED_EVENT_END_WORD.to_be_bytes().to_vec();
    end.extend_from_slice(&[0u8; 10]);
    end.extend_from_slice(&FAKED_EVENT_END_CHECKSUM.to_be_bytes());
    (start, end)
}
