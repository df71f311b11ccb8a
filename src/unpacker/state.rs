//! Per-buffer decode state
//!
//! Created fresh for every buffer; nothing survives between calls.

use tracing::error;

use super::error_mask::ErrorMask;
use super::SectionStatus;
use crate::common::ModuleId;

const CHIP_PORTS: usize = 4;

/// Section currently between SectionStart and SectionEnd
#[derive(Debug, Clone)]
pub(crate) struct OpenSection {
    pub section_id: u8,
    pub module: ModuleId,
    pub active_chip_mask: u8,
    pub found_chip_mask: u8,
    pub start_frame_number: u16,
    pub trigger_row_offset: u16,
    pub counted_bytes: Option<u64>,
    pub errors: ErrorMask,
    last_chip_frame: [Option<u16>; CHIP_PORTS],
}

impl OpenSection {
    pub fn new(
        section_id: u8,
        active_chip_mask: u8,
        start_frame_number: u16,
        trigger_row_offset: u16,
    ) -> Self {
        Self {
            section_id,
            module: ModuleId::from_section_id(section_id),
            active_chip_mask,
            found_chip_mask: 0,
            start_frame_number,
            trigger_row_offset,
            counted_bytes: Some(0),
            errors: ErrorMask::NONE,
            last_chip_frame: [None; CHIP_PORTS],
        }
    }

    /// Record a chip frame and check its number against the section and
    /// the other ports
    pub fn check_chip_frame(&mut self, chip_port: u8, frame_number: u16) -> ErrorMask {
        let mut errors = ErrorMask::NONE;
        let port = chip_port as usize % CHIP_PORTS;

        if (frame_number.wrapping_sub(self.start_frame_number) & 0x3F) > 1 {
            error!(
                section_id = self.section_id,
                chip_frame = frame_number,
                start_frame = self.start_frame_number,
                "Chip frame number differs from section start frame by more than one"
            );
            errors |= ErrorMask::CHIP_SECTION_FRAME_DIFFER;
        }

        if let Some(last) = self.last_chip_frame[port] {
            if frame_number.wrapping_sub(last) != 1 {
                error!(
                    section_id = self.section_id,
                    chip_port,
                    last,
                    chip_frame = frame_number,
                    "Chip frames on one port not continuous"
                );
                errors |= ErrorMask::CHIP_FRAME_NOT_CONTINUOUS;
            }
        }

        let far_ahead = self
            .last_chip_frame
            .iter()
            .flatten()
            .any(|&last| frame_number.wrapping_sub(last) > 1);
        if far_ahead {
            error!(
                section_id = self.section_id,
                chip_frame = frame_number,
                "Chip frame numbers differ between ports by more than one"
            );
            errors |= ErrorMask::CHIP_FRAME_DIFFER;
        }

        self.last_chip_frame[port] = Some(frame_number);
        errors
    }

    pub fn into_status(self, declared_bytes: Option<u64>, errors: ErrorMask) -> SectionStatus {
        SectionStatus {
            module: self.module,
            section_id: self.section_id,
            error_mask: self.errors | errors,
            declared_bytes,
            counted_bytes: self.counted_bytes,
            active_chip_mask: self.active_chip_mask,
            found_chip_mask: self.found_chip_mask,
            trigger_row_offset: self.trigger_row_offset,
            start_frame_number: self.start_frame_number,
        }
    }
}

/// Bookkeeping for one buffer
#[derive(Debug, Default)]
pub(crate) struct EventDecodeState {
    /// Envelope carries the placeholder (no data) pattern
    pub faked: bool,
    pub send_unfiltered: bool,
    /// Low trigger number of the trigger metadata frame
    pub trigger_frame_number: Option<u16>,
    pub active_section_mask: u8,
    pub envelope_id: Option<u8>,
    pub envelope_errors: ErrorMask,
    /// Bytes since EventStart; `None` once counting became impossible
    pub envelope_bytes: Option<u64>,
    pub section_starts: u32,
    pub section_ends: u32,
    pub open_section: Option<OpenSection>,
    /// Identifier of the most recent section in this envelope
    pub last_section_id: Option<u8>,
}

impl EventDecodeState {
    pub fn new() -> Self {
        Self {
            envelope_bytes: Some(0),
            ..Default::default()
        }
    }

    pub fn expected_sections(&self) -> u32 {
        (self.active_section_mask & 0x1F).count_ones()
    }

    pub fn inside_section(&self) -> bool {
        self.open_section.is_some()
    }

    /// Section the frame claims to belong to differs from the open one
    pub fn section_mismatch(&self, section_id: u8) -> bool {
        self.open_section
            .as_ref()
            .map_or(true, |s| s.section_id != section_id)
    }

    pub fn mark_chip_found(&mut self, chip_port: u8) {
        if let Some(section) = self.open_section.as_mut() {
            section.found_chip_mask |= 1 << (chip_port & 0x3);
        }
    }

    /// Counting is impossible once filtered frames appear
    pub fn invalidate_counts(&mut self) {
        self.envelope_bytes = None;
        if let Some(section) = self.open_section.as_mut() {
            section.counted_bytes = None;
        }
    }

    pub fn count_bytes(&mut self, length: usize) {
        let length = length as u64;
        if let Some(bytes) = self.envelope_bytes.as_mut() {
            *bytes += length;
        }
        if let Some(bytes) = self
            .open_section
            .as_mut()
            .and_then(|s| s.counted_bytes.as_mut())
        {
            *bytes += length;
        }
    }

    /// Section start/end counts agree with the active section mask
    pub fn section_counts_match(&self) -> bool {
        self.section_starts == self.section_ends && self.section_starts == self.expected_sections()
    }

    /// Accumulate the errors of one frame into the open section
    pub fn record_section_errors(&mut self, errors: ErrorMask) {
        if let Some(section) = self.open_section.as_mut() {
            section.errors |= errors;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_frames_continuous() {
        let mut section = OpenSection::new(0x02, 0x3, 10, 0);
        assert_eq!(section.check_chip_frame(0, 10), ErrorMask::NONE);
        assert_eq!(section.check_chip_frame(0, 11), ErrorMask::NONE);
        assert_eq!(section.check_chip_frame(1, 11), ErrorMask::NONE);
    }

    #[test]
    fn test_chip_frame_gap_on_port() {
        let mut section = OpenSection::new(0x02, 0x1, 10, 0);
        section.check_chip_frame(0, 10);
        let errors = section.check_chip_frame(0, 10);
        assert!(errors.contains(ErrorMask::CHIP_FRAME_NOT_CONTINUOUS));
    }

    #[test]
    fn test_chip_frame_far_from_start() {
        let mut section = OpenSection::new(0x02, 0x1, 10, 0);
        let errors = section.check_chip_frame(0, 13);
        assert_eq!(errors, ErrorMask::CHIP_SECTION_FRAME_DIFFER);
    }

    #[test]
    fn test_chip_frame_differs_across_ports() {
        let mut section = OpenSection::new(0x02, 0x3, 10, 0);
        section.check_chip_frame(0, 10);
        let errors = section.check_chip_frame(1, 12);
        assert!(errors.contains(ErrorMask::CHIP_FRAME_DIFFER));
    }

    #[test]
    fn test_byte_counting() {
        let mut state = EventDecodeState::new();
        state.count_bytes(20);
        state.open_section = Some(OpenSection::new(0x02, 0x1, 0, 0));
        state.count_bytes(16);
        assert_eq!(state.envelope_bytes, Some(36));
        assert_eq!(state.open_section.as_ref().unwrap().counted_bytes, Some(16));

        state.invalidate_counts();
        state.count_bytes(8);
        assert_eq!(state.envelope_bytes, None);
        assert_eq!(state.open_section.as_ref().unwrap().counted_bytes, None);
    }

    #[test]
    fn test_section_mismatch_without_open_section() {
        let state = EventDecodeState::new();
        assert!(state.section_mismatch(0x02));
    }
}
