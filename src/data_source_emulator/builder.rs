//! Frame-level event builder
//!
//! Assembles the frames of one envelope in wire format and keeps the byte
//! counters that the section and event end frames declare. Used by the
//! emulator and by tests that need well-formed or deliberately broken
//! buffers.
//!
//! ```ignore
//! let mut builder = EventBuilder::new(meta);
//! builder
//!     .trigger_meta()
//!     .event_start(0b1)
//!     .section_start(0x02, 0b0001)
//!     .zero_suppressed(0x02, 0, &[(10, 3, 40)])
//!     .section_end(0x02)
//!     .event_end();
//! let buffer = builder.build();
//! ```

use crate::common::{EventMeta, RawEventBuffer};
use crate::unpacker::checksum::{append_checksum, stored_checksum, FrameCrc, CHECKSUM_SIZE};
use crate::unpacker::envelope::ENVELOPE_MAGIC;
use crate::unpacker::frames::{constants as frame_constants, expected_time_tag, faked_envelope_frames};
use crate::unpacker::payload::{
    constants as payload_constants, ChipHeader, CHIP_TYPE_RAW, CHIP_TYPE_ZERO_SUPPRESSED,
};
use crate::unpacker::{FrameHeader, FrameType, RunTag};

/// Default trigger flags: accepted, unfiltered data requested
pub const DEFAULT_TRIGGER_FLAGS: u32 =
    frame_constants::FLAG_ACCEPTED | frame_constants::FLAG_SEND_UNFILTERED;

/// Attempts to move a zero checksum half away by appending row words
const PADDING_RETRIES: usize = 8;

/// Bytes of common-mode values in a common-mode frame
const COMMON_MODE_BYTES: usize = 192;

/// One pixel as (chip row, chip column, amplitude)
pub type ChipPixel = (u16, u16, u8);

/// Builds the frames of one event buffer
#[derive(Debug, Clone)]
pub struct EventBuilder {
    meta: EventMeta,
    trigger_number: u32,
    envelope_id: u8,
    start_frame_number: u16,
    trigger_row_offset: u16,
    chip_frame_offset: u16,
    chip_header_ids: Option<(u8, u8)>,
    frames: Vec<Vec<u8>>,
    event_bytes: u64,
    section_bytes: u64,
}

impl EventBuilder {
    pub fn new(meta: EventMeta) -> Self {
        Self {
            meta,
            trigger_number: meta.trigger_number,
            envelope_id: 0,
            start_frame_number: 0,
            trigger_row_offset: 0,
            chip_frame_offset: 0,
            chip_header_ids: None,
            frames: Vec::new(),
            event_bytes: 0,
            section_bytes: 0,
        }
    }

    /// Trigger number written into the frames (defaults to the metadata's)
    pub fn trigger_number(&mut self, trigger_number: u32) -> &mut Self {
        self.trigger_number = trigger_number;
        self
    }

    pub fn envelope_id(&mut self, envelope_id: u8) -> &mut Self {
        self.envelope_id = envelope_id & 0xF;
        self
    }

    /// Start frame number of following section starts (6 bits)
    pub fn start_frame_number(&mut self, frame_number: u16) -> &mut Self {
        self.start_frame_number = frame_number & 0x3F;
        self
    }

    /// Trigger row offset of following section starts (10 bits)
    pub fn trigger_row_offset(&mut self, row_offset: u16) -> &mut Self {
        self.trigger_row_offset = row_offset & frame_constants::ROW_OFFSET_MASK;
        self
    }

    /// Chip frame number of following chip frames, relative to the start frame
    pub fn chip_frame_offset(&mut self, offset: u16) -> &mut Self {
        self.chip_frame_offset = offset;
        self
    }

    /// Section id and port written into the chip header of the next chip frame
    pub fn chip_header_ids(&mut self, section_id: u8, chip_port: u8) -> &mut Self {
        self.chip_header_ids = Some((section_id, chip_port));
        self
    }

    fn trigger_lo(&self) -> u16 {
        self.trigger_number as u16
    }

    fn trigger_hi(&self) -> u16 {
        (self.trigger_number >> 16) as u16
    }

    fn run_tag(&self) -> RunTag {
        RunTag {
            experiment: self.meta.experiment,
            run: self.meta.run,
            subrun: self.meta.subrun,
        }
    }

    /// Header word and low trigger number
    fn frame_head(&self, frame_type: FrameType, misc: u16, error_flag: bool) -> Vec<u8> {
        let mut frame = Vec::with_capacity(32);
        frame.extend_from_slice(&FrameHeader::encode(frame_type, misc, error_flag).to_be_bytes());
        frame.extend_from_slice(&self.trigger_lo().to_be_bytes());
        frame
    }

    fn push(&mut self, frame: Vec<u8>, counted: bool) -> &mut Self {
        if counted {
            self.event_bytes += frame.len() as u64;
            self.section_bytes += frame.len() as u64;
        }
        self.frames.push(frame);
        self
    }

    /// Trigger metadata frame with default flags and both sources present
    pub fn trigger_meta(&mut self) -> &mut Self {
        self.trigger_meta_with(DEFAULT_TRIGGER_FLAGS, true)
    }

    /// Trigger metadata frame with explicit flags; a missing secondary
    /// source is written as the placeholder pattern
    pub fn trigger_meta_with(&mut self, flags: u32, secondary: bool) -> &mut Self {
        let tag = self.run_tag().to_trigger_tag();
        let mut frame = self.frame_head(FrameType::TriggerMeta, 0, false);
        frame.extend_from_slice(&(frame_constants::TRIGGER_MAGIC | (flags & 0xFFFF)).to_be_bytes());
        frame.extend_from_slice(&self.trigger_number.to_be_bytes());
        frame.extend_from_slice(&tag.to_be_bytes());
        frame.extend_from_slice(&frame_constants::TRIGGER_MAGIC.to_be_bytes());
        if secondary {
            frame.extend_from_slice(&self.trigger_number.to_be_bytes());
            frame.extend_from_slice(&tag.to_be_bytes());
        } else {
            frame.extend_from_slice(&[0u8; 8]);
        }
        append_checksum(&mut frame);
        self.push(frame, false)
    }

    /// Event start; `section_mask` marks the sections that follow
    pub fn event_start(&mut self, section_mask: u8) -> &mut Self {
        let misc = ((self.envelope_id as u16) << 5) | (section_mask as u16 & 0x1F);
        let time_tag = expected_time_tag(self.meta.time_ns);
        let (run_subrun, exp_run) = self.run_tag().to_event_start();

        let mut frame = self.frame_head(FrameType::EventStart, misc, false);
        frame.extend_from_slice(&self.trigger_hi().to_be_bytes());
        frame.extend_from_slice(&(((time_tag & 0xFFF) as u16) << 4).to_be_bytes());
        frame.extend_from_slice(&(((time_tag >> 12) & 0x7FFF) as u16).to_be_bytes());
        frame.extend_from_slice(&0u16.to_be_bytes());
        frame.extend_from_slice(&run_subrun.to_be_bytes());
        frame.extend_from_slice(&exp_run.to_be_bytes());
        append_checksum(&mut frame);

        self.event_bytes = 0;
        self.push(frame, true)
    }

    /// Placeholder event start of a trigger without data
    pub fn faked_event_start(&mut self) -> &mut Self {
        let (start, _) = faked_envelope_frames();
        self.event_bytes = 0;
        self.push(start, true)
    }

    /// Placeholder event end of a trigger without data
    pub fn faked_event_end(&mut self) -> &mut Self {
        let (_, end) = faked_envelope_frames();
        self.push(end, true)
    }

    pub fn section_start(&mut self, section_id: u8, chip_mask: u8) -> &mut Self {
        let misc = ((section_id as u16 & 0x3F) << 4) | (chip_mask as u16 & 0xF);
        let frame_word = (self.start_frame_number << frame_constants::START_FRAME_SHIFT)
            | self.trigger_row_offset;

        let mut frame = self.frame_head(FrameType::SectionStart, misc, false);
        frame.extend_from_slice(&self.trigger_hi().to_be_bytes());
        frame.extend_from_slice(&0u16.to_be_bytes());
        frame.extend_from_slice(&0u16.to_be_bytes());
        frame.extend_from_slice(&frame_word.to_be_bytes());
        append_checksum(&mut frame);

        self.section_bytes = 0;
        self.push(frame, true)
    }

    /// Placeholder for a chip without data
    pub fn ghost(&mut self, section_id: u8, chip_port: u8) -> &mut Self {
        let mut frame = self.frame_head(FrameType::Ghost, data_misc(section_id, chip_port), true);
        append_checksum(&mut frame);
        self.push(frame, true)
    }

    /// Section end declaring the bytes counted since the section start
    pub fn section_end(&mut self, section_id: u8) -> &mut Self {
        let words = (self.section_bytes / 2) as u32;
        self.section_end_with_words(section_id, words)
    }

    /// Section end with an explicit word count (16-bit words)
    pub fn section_end_with_words(&mut self, section_id: u8, words: u32) -> &mut Self {
        let mut frame =
            self.frame_head(FrameType::SectionEnd, (section_id as u16 & 0x3F) << 4, false);
        frame.extend_from_slice(&(words as u16).to_be_bytes());
        frame.extend_from_slice(&((words >> 16) as u16).to_be_bytes());
        frame.extend_from_slice(&0u32.to_be_bytes());
        append_checksum(&mut frame);
        self.push(frame, true)
    }

    /// Event end declaring the bytes counted since the event start
    pub fn event_end(&mut self) -> &mut Self {
        let words = (self.event_bytes / 4) as u32;
        self.event_end_with_words(words)
    }

    /// Event end with an explicit word count (32-bit words)
    pub fn event_end_with_words(&mut self, words: u32) -> &mut Self {
        let misc = (self.envelope_id as u16) << 5;
        let mut frame = self.frame_head(FrameType::EventEnd, misc, false);
        frame.extend_from_slice(&words.to_be_bytes());
        frame.extend_from_slice(&0u32.to_be_bytes());
        append_checksum(&mut frame);
        self.push(frame, true)
    }

    /// Zero-suppressed chip frame with the given pixels
    ///
    /// Pixels sharing a row pair follow one row word; keep them sorted by
    /// row for compact frames.
    pub fn zero_suppressed(&mut self, section_id: u8, chip_port: u8, pixels: &[ChipPixel]) -> &mut Self {
        let words = pixel_words(pixels);
        self.chip_frame(FrameType::ZeroSuppressedHit, section_id, chip_port, false, &words)
    }

    /// Filtered chip frame with the given pixels
    pub fn filtered_hit(&mut self, section_id: u8, chip_port: u8, pixels: &[ChipPixel]) -> &mut Self {
        let words = pixel_words(pixels);
        self.chip_frame(FrameType::FilteredHit, section_id, chip_port, false, &words)
    }

    /// Zero-suppressed chip frame with explicit row/pixel words
    pub fn zero_suppressed_words(
        &mut self,
        section_id: u8,
        chip_port: u8,
        reformatted: bool,
        words: &[u16],
    ) -> &mut Self {
        self.chip_frame(FrameType::ZeroSuppressedHit, section_id, chip_port, reformatted, words)
    }

    fn chip_frame(
        &mut self,
        frame_type: FrameType,
        section_id: u8,
        chip_port: u8,
        reformatted: bool,
        words: &[u16],
    ) -> &mut Self {
        let mut misc = data_misc(section_id, chip_port);
        if reformatted {
            misc |= 1 << 3;
        }
        let mut body = words.to_vec();
        // header, trigger, chip header, chip frame number + body must be even
        if body.len() % 2 == 1 {
            body.push(last_row_word(&body));
        }

        let head = self.frame_head(frame_type, misc, false);
        let (header_section, header_port) =
            self.chip_header_ids.take().unwrap_or((section_id, chip_port));
        let chip_header =
            ChipHeader::encode(CHIP_TYPE_ZERO_SUPPRESSED, header_section, header_port);
        let chip_frame_number = self.start_frame_number.wrapping_add(self.chip_frame_offset);
        let encode = |body: &[u16]| {
            let mut frame = head.clone();
            frame.extend_from_slice(&chip_header.to_be_bytes());
            frame.extend_from_slice(&chip_frame_number.to_be_bytes());
            for word in body {
                frame.extend_from_slice(&word.to_be_bytes());
            }
            append_checksum(&mut frame);
            frame
        };

        let mut frame = encode(&body);
        for _ in 0..PADDING_RETRIES {
            if !has_zero_half(&frame) {
                break;
            }
            let pad = last_row_word(&body);
            body.extend_from_slice(&[pad, pad]);
            frame = encode(&body);
        }
        self.push(frame, true)
    }

    /// Raw ADC frame (65536 samples, or 131072 with pedestals)
    pub fn raw_hit(&mut self, section_id: u8, chip_port: u8, with_pedestal: bool) -> &mut Self {
        let payload = if with_pedestal {
            payload_constants::RAW_ADC_PEDESTAL_SIZE
        } else {
            payload_constants::RAW_ADC_SIZE
        };
        let samples = payload - payload_constants::RAW_HEADER_SIZE;

        let mut frame = self.frame_head(FrameType::RawHit, data_misc(section_id, chip_port), false);
        frame.reserve(samples + 8);
        frame.extend_from_slice(&ChipHeader::encode(CHIP_TYPE_RAW, section_id, chip_port).to_be_bytes());
        frame.extend_from_slice(&0u16.to_be_bytes());
        frame.extend((0..samples).map(|i| (i & 0xFF) as u8));
        append_checksum(&mut frame);
        self.push(frame, true)
    }

    /// Cluster frame carrying the given words
    pub fn cluster(&mut self, section_id: u8, chip_port: u8, filtered: bool, words: &[u16]) -> &mut Self {
        let frame_type = if filtered {
            FrameType::FilteredCluster
        } else {
            FrameType::RawCluster
        };
        let mut frame = self.frame_head(frame_type, data_misc(section_id, chip_port), false);
        for word in words {
            frame.extend_from_slice(&word.to_be_bytes());
        }
        if words.len() % 2 == 1 {
            frame.extend_from_slice(&0u16.to_be_bytes());
        }
        append_checksum(&mut frame);
        self.push(frame, true)
    }

    pub fn common_mode(&mut self, section_id: u8, chip_port: u8) -> &mut Self {
        let mut frame = self.frame_head(FrameType::CommonMode, data_misc(section_id, chip_port), false);
        frame.extend((0..COMMON_MODE_BYTES).map(|i| (i % 64) as u8));
        append_checksum(&mut frame);
        self.push(frame, true)
    }

    /// Region-of-interest frame; the records precede an inner checksum copy
    pub fn roi(&mut self, records: &[u64]) -> &mut Self {
        let mut frame = self.frame_head(FrameType::RegionOfInterest, 0, false);
        for record in records {
            frame.extend_from_slice(&record.to_be_bytes());
        }
        let inner = FrameCrc::compute(&frame[payload_constants::ROI_HEADER_SIZE..]);
        frame.extend_from_slice(&inner.to_be_bytes());
        append_checksum(&mut frame);
        self.push(frame, false)
    }

    /// Append a frame verbatim; it is not counted in section or event sizes
    pub fn raw_frame(&mut self, frame: Vec<u8>) -> &mut Self {
        self.push(frame, false)
    }

    /// Append a frame verbatim and count it like any data frame
    pub fn counted_frame(&mut self, frame: Vec<u8>) -> &mut Self {
        self.push(frame, true)
    }

    /// Frame with this builder's trigger number, `body` and a valid checksum
    pub fn custom_frame(
        &self,
        frame_type: FrameType,
        misc: u16,
        error_flag: bool,
        body: &[u8],
    ) -> Vec<u8> {
        let mut frame = self.frame_head(frame_type, misc, error_flag);
        frame.extend_from_slice(body);
        append_checksum(&mut frame);
        frame
    }

    /// Edit a frame in place and recompute its checksum
    pub fn rewrite_frame(&mut self, index: usize, edit: impl FnOnce(&mut Vec<u8>)) -> &mut Self {
        if let Some(frame) = self.frames.get_mut(index) {
            frame.truncate(frame.len().saturating_sub(CHECKSUM_SIZE));
            edit(frame);
            append_checksum(frame);
        }
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<&mut Vec<u8>> {
        self.frames.get_mut(index)
    }

    /// Flip the lowest bit of a frame's stored checksum
    pub fn corrupt_checksum(&mut self, index: usize) -> &mut Self {
        if let Some(last) = self.frames.get_mut(index).and_then(|f| f.last_mut()) {
            *last ^= 0x01;
        }
        self
    }

    /// Envelope with a big-endian frame table
    pub fn build(&self) -> RawEventBuffer {
        self.build_with(true)
    }

    pub fn build_with(&self, big_endian: bool) -> RawEventBuffer {
        RawEventBuffer::from(wrap_frames(&self.frames, big_endian))
    }
}

/// Wrap frames into an envelope: magic, count, lengths, padded frames
pub fn wrap_frames(frames: &[Vec<u8>], big_endian: bool) -> Vec<u8> {
    let enc = |v: u32| {
        if big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    };
    let payload: usize = frames.iter().map(|f| (f.len() + 3) & !3).sum();
    let mut buffer = Vec::with_capacity(8 + 4 * frames.len() + payload);
    buffer.extend_from_slice(&enc(ENVELOPE_MAGIC));
    buffer.extend_from_slice(&enc(frames.len() as u32));
    for frame in frames {
        buffer.extend_from_slice(&enc(frame.len() as u32));
    }
    for frame in frames {
        buffer.extend_from_slice(frame);
        let padded = (frame.len() + 3) & !3;
        buffer.resize(buffer.len() + padded - frame.len(), 0);
    }
    buffer
}

fn data_misc(section_id: u8, chip_port: u8) -> u16 {
    ((section_id as u16 & 0x3F) << 4) | (chip_port as u16 & 0x3)
}

pub fn row_word(row: u16, common_mode: u8) -> u16 {
    ((row >> 1) << 6) | (common_mode as u16 & payload_constants::COMMON_MODE_MASK)
}

pub fn pixel_word(row: u16, column: u16, amplitude: u8) -> u16 {
    payload_constants::PIXEL_FLAG
        | ((row & 1) << payload_constants::ROW_LOW_BIT_SHIFT)
        | ((column & 0x3F) << payload_constants::COLUMN_SHIFT)
        | amplitude as u16
}

/// Row and pixel words; a row word opens every new row pair
fn pixel_words(pixels: &[ChipPixel]) -> Vec<u16> {
    let mut words = Vec::with_capacity(pixels.len() * 2);
    let mut current: Option<u16> = None;
    for &(row, column, amplitude) in pixels {
        if current != Some(row >> 1) {
            words.push(row_word(row, 0));
            current = Some(row >> 1);
        }
        words.push(pixel_word(row, column, amplitude));
    }
    words
}

fn last_row_word(words: &[u16]) -> u16 {
    words
        .iter()
        .rev()
        .copied()
        .find(|w| w & payload_constants::PIXEL_FLAG == 0)
        .unwrap_or(0)
}

fn has_zero_half(frame: &[u8]) -> bool {
    stored_checksum(frame).is_some_and(|crc| crc & 0xFFFF_0000 == 0 || crc & 0xFFFF == 0)
}
