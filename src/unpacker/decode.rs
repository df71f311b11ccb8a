//! Frame-by-frame state machine over one buffer

use tracing::{debug, error, warn};

use super::checksum::{stored_checksum, ChecksumOutcome, CHECKSUM_SIZE};
use super::envelope::{FrameSlot, FrameTable, MIN_FRAME_SIZE};
use super::error_mask::ErrorMask;
use super::frames::{
    expected_time_tag, EventEndFrame, EventStartFrame, SectionEndFrame, SectionStartFrame,
    TriggerMetaFrame,
};
use super::header::{read_u16_be, FrameHeader, FrameType};
use super::payload::{
    check_roi_size, decode_pixel_words, decode_rois, has_double_header, payload_words,
    raw_capture_mode, raw_samples, split_clusters, ChipHeader, PixelContext,
};
use super::state::{EventDecodeState, OpenSection};
use super::{DecodedEvent, EnvelopeStatus, TriggerInfo, Unpacker};
use crate::common::{ClusterRecord, EventMeta, ModuleId, RawAdcFrame};

/// Status waiting for the frame's final error bits
enum Closing {
    Section {
        section: OpenSection,
        declared_bytes: u64,
    },
    Envelope(EnvelopeStatus),
}

/// Decode one buffer into `event`
pub(crate) fn decode_buffer(
    unpacker: &Unpacker,
    meta: &EventMeta,
    buffer: &[u8],
    event: &mut DecodedEvent,
) {
    let table = match FrameTable::parse(buffer, unpacker.options().header_big_endian) {
        Ok(table) => table,
        Err(e) => {
            error!(
                error = %e,
                trigger = meta.trigger_number,
                bytes = buffer.len(),
                "Aborting buffer"
            );
            event.error_mask |= e.error_mask();
            event.aborted.push(e);
            return;
        }
    };
    if table.is_empty() {
        warn!(trigger = meta.trigger_number, "Envelope without frames");
        return;
    }

    let mut decoder = BufferDecoder {
        unpacker,
        meta,
        expected_trigger: unpacker.expected_trigger(meta),
        frame_count: table.len(),
        state: EventDecodeState::new(),
    };

    for (slot, frame) in table.iter() {
        event.frames += 1;

        if !slot.is_aligned() {
            error!(
                frame = slot.index,
                length = slot.length,
                "Frame length not a multiple of 4, skipping"
            );
            event.error_mask |= ErrorMask::FRAME_ALIGNMENT;
            continue;
        }
        if slot.length < MIN_FRAME_SIZE {
            error!(frame = slot.index, length = slot.length, "Frame too short, skipping");
            event.error_mask |= ErrorMask::FRAME_SIZE;
            continue;
        }

        decoder.decode_frame(&slot, frame, event);
    }
}

struct BufferDecoder<'a> {
    unpacker: &'a Unpacker,
    meta: &'a EventMeta,
    expected_trigger: u32,
    frame_count: usize,
    state: EventDecodeState,
}

impl BufferDecoder<'_> {
    fn is_last(&self, index: usize) -> bool {
        index + 1 == self.frame_count
    }

    fn decode_frame(&mut self, slot: &FrameSlot, frame: &[u8], event: &mut DecodedEvent) {
        let index = slot.index;
        let header = match FrameHeader::parse(frame) {
            Ok(header) => header,
            Err(e) => {
                error!(error = %e, frame = index, "Unreadable frame header");
                event.error_mask |= ErrorMask::FRAME_SIZE;
                return;
            }
        };
        let frame_type = header.frame_type;
        let trigger_lo = read_u16_be(frame, 2).unwrap_or_default();
        let mut errors = ErrorMask::NONE;

        debug!(
            frame = index,
            frame_type = %frame_type,
            length = frame.len(),
            "Frame"
        );

        if let Some(size) = frame_type.fixed_size() {
            if frame.len() != size {
                error!(
                    frame_type = %frame_type,
                    expected = size,
                    length = frame.len(),
                    "Fixed frame size mismatch"
                );
                errors |= ErrorMask::FIXED_SIZE;
            }
        }

        if index == 1 && frame_type == FrameType::EventStart {
            self.state.faked = EventStartFrame::parse(frame).is_some_and(|f| f.is_faked());
        }

        if trigger_lo != (self.expected_trigger & 0xFFFF) as u16 && !self.state.faked {
            error!(
                frame = index,
                frame_trigger = trigger_lo,
                meta_trigger = self.expected_trigger,
                "Frame trigger number does not match event metadata"
            );
            errors |= ErrorMask::META_TRIGGER;
        }

        if index > 1
            && !self.is_last(index)
            && !self.state.inside_section()
            && !matches!(
                frame_type,
                FrameType::RegionOfInterest | FrameType::SectionStart
            )
        {
            error!(frame = index, frame_type = %frame_type, "Data frame outside a section");
            errors |= ErrorMask::DATA_OUTSIDE_SECTION;
        }

        // ghosts always carry the error flag, nothing else may
        let is_ghost = frame_type == FrameType::Ghost;
        if header.error_flag && !is_ghost {
            errors |= ErrorMask::HEADER_ERROR_FLAG;
        } else if !header.error_flag && is_ghost {
            errors |= ErrorMask::GHOST_WITHOUT_ERROR_FLAG;
        }

        let closing = self.dispatch(index, &header, frame, event, &mut errors);

        if let Some(trg) = self.state.trigger_frame_number {
            if trigger_lo != trg && !self.state.faked {
                error!(
                    frame = index,
                    frame_trigger = trigger_lo,
                    trigger_meta = trg,
                    "Frame trigger number does not match trigger metadata frame"
                );
                errors |= ErrorMask::FRAME_TRIGGER_MISMATCH;
            }
        }

        errors |= self.check_position(index, frame_type);

        if !matches!(
            frame_type,
            FrameType::RegionOfInterest | FrameType::TriggerMeta
        ) {
            self.state.count_bytes(frame.len());
        }

        event.error_mask |= errors;
        match closing {
            Some(Closing::Section {
                section,
                declared_bytes,
            }) => {
                self.state.envelope_errors |= errors;
                event
                    .sections
                    .push(section.into_status(Some(declared_bytes), errors));
            }
            Some(Closing::Envelope(mut status)) => {
                status.error_mask |= errors;
                event.envelopes.push(status);
            }
            None => {
                self.state.record_section_errors(errors);
                self.state.envelope_errors |= errors;
            }
        }
    }

    /// Type-specific decoding
    fn dispatch(
        &mut self,
        index: usize,
        header: &FrameHeader,
        frame: &[u8],
        event: &mut DecodedEvent,
        errors: &mut ErrorMask,
    ) -> Option<Closing> {
        match header.frame_type {
            FrameType::TriggerMeta => {
                *errors |= self.checksum(frame, event);
                *errors |= self.trigger_meta(index, frame, event);
                None
            }
            FrameType::EventStart => {
                *errors |= self.checksum(frame, event);
                *errors |= self.event_start(frame);
                None
            }
            FrameType::EventEnd => {
                *errors |= self.checksum(frame, event);
                let status = self.event_end(frame, errors);
                status.map(Closing::Envelope)
            }
            FrameType::SectionStart => {
                *errors |= self.checksum(frame, event);
                *errors |= self.section_start(frame, event);
                None
            }
            FrameType::SectionEnd => {
                *errors |= self.checksum(frame, event);
                self.section_end(frame, errors)
            }
            FrameType::Ghost => {
                *errors |= self.section_frame_id(header);
                *errors |= self.checksum(frame, event);
                self.state.mark_chip_found(header.chip_port());
                None
            }
            FrameType::CommonMode => {
                *errors |= self.section_frame_id(header);
                *errors |= self.checksum(frame, event);
                None
            }
            FrameType::RawHit => {
                *errors |= self.section_frame_id(header);
                *errors |= self.checksum(frame, event);
                self.state.mark_chip_found(header.chip_port());
                *errors |= self.raw_hit(header, frame, event);
                None
            }
            FrameType::ZeroSuppressedHit | FrameType::FilteredHit => {
                if header.frame_type.is_filtered() {
                    self.state.invalidate_counts();
                }
                *errors |= self.filter_consistency(header.frame_type);
                *errors |= self.section_frame_id(header);
                *errors |= self.checksum(frame, event);
                self.state.mark_chip_found(header.chip_port());
                *errors |= check_padding(frame);
                *errors |= self.zero_suppressed(header, frame, event);
                None
            }
            FrameType::RawCluster | FrameType::FilteredCluster => {
                if header.frame_type.is_filtered() {
                    self.state.invalidate_counts();
                }
                *errors |= self.filter_consistency(header.frame_type);
                *errors |= self.section_frame_id(header);
                *errors |= self.checksum(frame, event);
                self.state.mark_chip_found(header.chip_port());
                self.clusters(header, frame, event);
                None
            }
            FrameType::RegionOfInterest => {
                *errors |= check_roi_size(frame.len());
                if errors.contains(ErrorMask::ROI_SIZE) {
                    error!(length = frame.len(), "Region-of-interest frame size invalid");
                }
                *errors |= self.checksum(frame, event);
                if self.unpacker.options().store_records {
                    event.rois.extend(decode_rois(frame));
                }
                None
            }
            FrameType::Unknown(code) => {
                error!(frame = index, code, "Unknown frame type");
                *errors |= ErrorMask::UNKNOWN_FRAME_TYPE;
                None
            }
        }
    }

    fn checksum(&self, frame: &[u8], event: &mut DecodedEvent) -> ErrorMask {
        match self.unpacker.checksum().validate(frame) {
            ChecksumOutcome::Ok => ErrorMask::NONE,
            ChecksumOutcome::Mismatch { expected, computed } => {
                error!(
                    expected = %format_args!("{:#010x}", expected),
                    computed = %format_args!("{:#010x}", computed),
                    "Frame checksum mismatch"
                );
                ErrorMask::CHECKSUM
            }
            ChecksumOutcome::SkippedOversize { length } => {
                warn!(length, "Frame checksum not calculated, frame too large");
                event.checksums_skipped += 1;
                ErrorMask::NONE
            }
        }
    }

    fn section_frame_id(&self, header: &FrameHeader) -> ErrorMask {
        if self.state.section_mismatch(header.section_id()) {
            error!(
                frame_section = header.section_id(),
                open_section = ?self.state.open_section.as_ref().map(|s| s.section_id),
                "Section id of frame does not match section start"
            );
            ErrorMask::SECTION_FRAME_ID
        } else {
            ErrorMask::NONE
        }
    }

    fn filter_consistency(&self, frame_type: FrameType) -> ErrorMask {
        match (self.state.send_unfiltered, frame_type.is_filtered()) {
            (true, true) => ErrorMask::UNEXPECTED_FILTERED_FRAME,
            (false, false) => ErrorMask::UNEXPECTED_UNFILTERED_FRAME,
            _ => ErrorMask::NONE,
        }
    }

    fn module_of(&self, header: &FrameHeader) -> ModuleId {
        self.state
            .open_section
            .as_ref()
            .map(|s| s.module)
            .unwrap_or_else(|| ModuleId::from_section_id(header.section_id()))
    }

    fn trigger_meta(&mut self, index: usize, frame: &[u8], event: &mut DecodedEvent) -> ErrorMask {
        let Some(trg) = TriggerMetaFrame::parse(frame) else {
            return ErrorMask::NONE;
        };
        let options = self.unpacker.options();
        let mut errors = ErrorMask::NONE;
        self.state.trigger_frame_number = Some(trg.trigger_lo);

        if index != 0 {
            error!(frame = index, "Trigger metadata frame must be the first one");
        }

        if trg.trigger1 != self.expected_trigger {
            error!(
                trigger = trg.trigger1,
                meta_trigger = self.expected_trigger,
                "Primary trigger number does not match event metadata"
            );
            errors |= ErrorMask::META_TRIGGER;
        }
        errors |= self.run_tag_checks(&trg.primary_tag());

        let secondary = if trg.secondary_missing() {
            None
        } else {
            if trg.trigger2 != self.expected_trigger {
                error!(
                    trigger = trg.trigger2,
                    meta_trigger = self.expected_trigger,
                    "Secondary trigger number does not match event metadata"
                );
                errors |= ErrorMask::META_TRIGGER;
            }
            errors |= self.run_tag_checks(&trg.secondary_tag());
            Some(trg.secondary_tag())
        };

        let checked = trg.check();
        if checked.contains(ErrorMask::NO_SECONDARY_TRIGGER) && !options.ignore_secondary_trigger {
            warn!(trigger = trg.trigger1, "Secondary trigger source missing");
        }
        if checked.intersects(ErrorMask::TRIGGER_MAGIC | ErrorMask::TRIGGER_SOURCE_MISMATCH) {
            error!(
                magic1 = %format_args!("{:#010x}", trg.magic1),
                magic2 = %format_args!("{:#010x}", trg.magic2),
                trigger1 = trg.trigger1,
                trigger2 = trg.trigger2,
                "Trigger metadata inconsistent"
            );
        }
        errors |= checked;

        self.state.send_unfiltered = trg.send_unfiltered();
        event.trigger = Some(TriggerInfo {
            trigger_number: trg.trigger1,
            accepted: trg.accepted(),
            send_rois: trg.send_rois(),
            send_unfiltered: trg.send_unfiltered(),
            primary: trg.primary_tag(),
            secondary,
        });
        errors
    }

    fn run_tag_checks(&self, tag: &super::RunTag) -> ErrorMask {
        let mut errors = ErrorMask::NONE;
        if tag.run != self.meta.run & 0x3FFF {
            error!(run = tag.run, meta_run = self.meta.run, "Run number mismatch");
            errors |= ErrorMask::META_RUN;
        }
        if tag.subrun != self.meta.subrun {
            error!(
                subrun = tag.subrun,
                meta_subrun = self.meta.subrun,
                "Sub-run number mismatch"
            );
            errors |= ErrorMask::META_SUBRUN;
        }
        if tag.experiment != self.meta.experiment & 0x3FF && !self.unpacker.options().ignore_meta_flags
        {
            error!(
                experiment = tag.experiment,
                meta_experiment = self.meta.experiment,
                "Experiment number mismatch"
            );
            errors |= ErrorMask::META_EXPERIMENT;
        }
        errors
    }

    fn event_start(&mut self, frame: &[u8]) -> ErrorMask {
        let Some(start) = EventStartFrame::parse(frame) else {
            return ErrorMask::NONE;
        };
        let mut errors = ErrorMask::NONE;

        self.state.envelope_bytes = Some(0);
        self.state.last_section_id = None;
        self.state.envelope_id = Some(start.envelope_id());
        self.state.active_section_mask = start.active_section_mask();

        if start.is_faked() != self.state.faked {
            error!("Event start and trigger disagree about placeholder data");
        }

        if start.is_faked() {
            warn!(trigger = self.meta.trigger_number, "Placeholder event start, trigger without data");
            return ErrorMask::FAKE_NO_DATA;
        }

        if start.trigger_number() != self.expected_trigger {
            error!(
                trigger = start.trigger_number(),
                meta_trigger = self.expected_trigger,
                "Event start trigger number does not match event metadata"
            );
            errors |= ErrorMask::META_TRIGGER_EVENT_START;
        }
        errors |= self.run_tag_checks(&start.run_tag());

        let expected = expected_time_tag(self.meta.time_ns);
        if start.time_tag() != expected {
            if !self.unpacker.options().ignore_meta_flags {
                warn!(
                    time_tag = start.time_tag(),
                    expected,
                    trigger_type = start.trigger_type(),
                    "Event start time tag does not match event time"
                );
            }
        } else {
            debug!(
                time_tag = start.time_tag(),
                trigger_type = start.trigger_type(),
                "Event start time tag"
            );
        }
        errors
    }

    fn event_end(
        &mut self,
        frame: &[u8],
        errors: &mut ErrorMask,
    ) -> Option<EnvelopeStatus> {
        let end = EventEndFrame::parse(frame)?;

        if end.is_faked() != self.state.faked {
            error!("Event end and event start disagree about placeholder data");
        }

        if self.state.faked {
            warn!(trigger = self.meta.trigger_number, "Placeholder event end, trigger without data");
            *errors |= ErrorMask::FAKE_NO_DATA;
        } else {
            if self.state.envelope_id != Some(end.envelope_id()) {
                error!(
                    start = ?self.state.envelope_id,
                    end = end.envelope_id(),
                    "Envelope id differs between event start and end"
                );
                *errors |= ErrorMask::EVENT_ID_START_END;
            }
            if let Some(counted) = self.state.envelope_bytes {
                if counted != end.declared_bytes() {
                    error!(
                        counted,
                        declared = end.declared_bytes(),
                        "Event word count mismatch"
                    );
                    *errors |= ErrorMask::EVENT_WORD_COUNT_MISMATCH;
                }
            }
        }

        let status = EnvelopeStatus {
            envelope_id: self.state.envelope_id,
            error_mask: self.state.envelope_errors,
            declared_bytes: end.declared_bytes(),
            counted_bytes: self.state.envelope_bytes,
            active_section_mask: self.state.active_section_mask,
            faked: self.state.faked,
        };
        self.state.envelope_errors = ErrorMask::NONE;
        self.state.envelope_id = None;
        Some(status)
    }

    fn section_start(&mut self, frame: &[u8], event: &mut DecodedEvent) -> ErrorMask {
        let Some(start) = SectionStartFrame::parse(frame) else {
            return ErrorMask::NONE;
        };
        let mut errors = ErrorMask::NONE;
        let section_id = start.section_id();

        if let Some(open) = self.state.open_section.take() {
            error!(
                open = open.section_id,
                next = section_id,
                "Section start without section end"
            );
            errors |= ErrorMask::SECTION_START_WITHOUT_END;
            self.state.section_ends += 1;
            event
                .sections
                .push(open.into_status(None, ErrorMask::SECTION_START_WITHOUT_END));
        }

        if let Some(last) = self.state.last_section_id {
            if last >= section_id {
                error!(last, next = section_id, "Section ids not in ascending order");
                errors |= ErrorMask::SECTION_ID_ORDER;
            }
        }
        self.state.last_section_id = Some(section_id);
        self.state.section_starts += 1;

        if start.trigger_number() != self.expected_trigger {
            error!(
                trigger = start.trigger_number(),
                meta_trigger = self.expected_trigger,
                "Section start trigger number does not match event metadata"
            );
            errors |= ErrorMask::META_TRIGGER_SECTION_START;
        }

        let section = OpenSection::new(
            section_id,
            start.active_chip_mask(),
            start.start_frame_number(),
            start.trigger_row_offset(),
        );
        if section_id == 0 || !section.module.is_valid() {
            warn!(
                section_id = %format_args!("{:#04x}", section_id),
                module = %section.module,
                "Invalid section id"
            );
            errors |= ErrorMask::SECTION_ID_INVALID;
        }
        self.state.open_section = Some(section);
        errors
    }

    fn section_end(&mut self, frame: &[u8], errors: &mut ErrorMask) -> Option<Closing> {
        let end = SectionEndFrame::parse(frame)?;
        let section = self.state.open_section.take();

        match &section {
            Some(open) if open.section_id == end.section_id() => {}
            other => {
                error!(
                    open = ?other.as_ref().map(|s| s.section_id),
                    end = end.section_id(),
                    "Section id differs between section start and end"
                );
                *errors |= ErrorMask::SECTION_START_END_ID;
            }
        }

        self.state.section_ends += 1;
        if self.state.section_starts != self.state.section_ends {
            error!(
                starts = self.state.section_starts,
                ends = self.state.section_ends,
                "Section end without section start"
            );
            *errors |= ErrorMask::SECTION_END_WITHOUT_START;
        }

        let section = section?;
        if section.found_chip_mask != section.active_chip_mask {
            warn!(
                active = %format_args!("{:#x}", section.active_chip_mask),
                found = %format_args!("{:#x}", section.found_chip_mask),
                section_id = section.section_id,
                "Active chip mask differs from chips found"
            );
            *errors |= ErrorMask::CHIP_MASK_MISMATCH;
        }
        if let Some(counted) = section.counted_bytes {
            if counted != end.declared_bytes() {
                error!(
                    counted,
                    declared = end.declared_bytes(),
                    section_id = section.section_id,
                    "Section word count mismatch"
                );
                *errors |= ErrorMask::WORD_COUNT_MISMATCH;
            }
        }

        Some(Closing::Section {
            section,
            declared_bytes: end.declared_bytes(),
        })
    }

    fn raw_hit(&self, header: &FrameHeader, frame: &[u8], event: &mut DecodedEvent) -> ErrorMask {
        let payload = &frame[..frame.len() - CHECKSUM_SIZE];
        let Some(with_pedestal) = raw_capture_mode(payload.len()) else {
            error!(length = payload.len(), "Unsupported raw frame size");
            return ErrorMask::DHP_SIZE;
        };

        let words = payload_words(&payload[..8]);
        let chip = ChipHeader::from_word(words[2]);
        let errors = check_chip_header(header, &chip);
        if !chip.is_raw() {
            error!(chip_type = chip.chip_type, "Chip header type invalid for raw frame");
            return errors;
        }

        debug!(with_pedestal, section_id = header.section_id(), "Raw ADC frame");
        if self.unpacker.options().store_records {
            event.raw_frames.push(RawAdcFrame {
                module: self.module_of(header),
                section_id: header.section_id(),
                chip_port: header.chip_port(),
                with_pedestal,
                samples: raw_samples(payload).to_vec(),
            });
        }
        errors
    }

    fn zero_suppressed(
        &mut self,
        header: &FrameHeader,
        frame: &[u8],
        event: &mut DecodedEvent,
    ) -> ErrorMask {
        let words = payload_words(&frame[..frame.len() - CHECKSUM_SIZE]);
        if words.len() < 4 {
            error!(words = words.len(), "Chip frame too small");
            return ErrorMask::DHP_SIZE;
        }

        let chip = ChipHeader::from_word(words[2]);
        let mut errors = check_chip_header(header, &chip);
        if !chip.is_zero_suppressed() {
            error!(chip_type = chip.chip_type, "Chip header type invalid for zero-suppressed frame");
            return errors;
        }

        let chip_frame_number = words[3];
        let (start_frame_number, trigger_row_offset) = match self.state.open_section.as_mut() {
            Some(section) => {
                errors |= section.check_chip_frame(chip.chip_port, chip_frame_number);
                (section.start_frame_number, section.trigger_row_offset)
            }
            None => (0, 0),
        };

        if has_double_header(&words) {
            error!(length = frame.len(), "Double chip header, skipping frame");
            return errors | ErrorMask::DOUBLE_HEADER;
        }

        let ctx = PixelContext {
            section_id: header.section_id(),
            chip_port: header.chip_port(),
            reformatted: header.reformatted(),
            start_frame_number,
            trigger_row_offset,
            chip_frame_number,
        };
        let decoded = decode_pixel_words(&words[4..], &ctx, self.unpacker.remapper());
        event.unmapped_hits += decoded.unmapped;

        if self.unpacker.options().store_records && !decoded.hits.is_empty() {
            event
                .hits
                .entry(self.module_of(header))
                .or_default()
                .extend(decoded.hits);
        }
        errors | decoded.errors
    }

    fn clusters(&self, header: &FrameHeader, frame: &[u8], event: &mut DecodedEvent) {
        if !self.unpacker.options().store_records {
            return;
        }
        let words = payload_words(&frame[..frame.len() - CHECKSUM_SIZE]);
        let Some(cluster_words) = words.get(2..) else {
            return;
        };
        let module = self.module_of(header);
        event
            .clusters
            .extend(split_clusters(cluster_words).into_iter().map(|words| ClusterRecord {
                module,
                section_id: header.section_id(),
                chip_port: header.chip_port(),
                words,
            }));
    }

    fn check_section_counts(&self) -> ErrorMask {
        if self.state.section_counts_match() {
            return ErrorMask::NONE;
        }
        error!(
            starts = self.state.section_starts,
            ends = self.state.section_ends,
            expected = self.state.expected_sections(),
            mask = %format_args!("{:#x}", self.state.active_section_mask),
            "Section start/end count does not match active sections"
        );
        ErrorMask::SECTION_COUNT_MISMATCH
    }

    /// Frames with a fixed position in the envelope
    fn check_position(&self, index: usize, frame_type: FrameType) -> ErrorMask {
        let mut errors = ErrorMask::NONE;

        if (index == 0) != (frame_type == FrameType::TriggerMeta) {
            error!(frame = index, frame_type = %frame_type, "Trigger metadata frame out of place");
            errors |= ErrorMask::TRIGGER_META_ORDER;
        }

        if (index == 1) != (frame_type == FrameType::EventStart) {
            error!(frame = index, frame_type = %frame_type, "Event start frame out of place");
            errors |= ErrorMask::SECTION_ENVELOPE_ORDER;
        }

        if self.is_last(index) {
            if frame_type != FrameType::EventEnd {
                error!(frame = index, frame_type = %frame_type, "Last frame is not an event end");
                errors |= ErrorMask::EVENT_END_MISSING;
            }
            // also runs when a final event end is unreadable
            errors |= self.check_section_counts();
        } else if frame_type == FrameType::EventEnd {
            error!(frame = index, "Event end before the last frame");
            errors |= ErrorMask::EVENT_END_DUPLICATE;
        }

        if index == 2
            && self.state.expected_sections() != 0
            && frame_type != FrameType::SectionStart
        {
            error!(frame_type = %frame_type, "Third frame is not a section start");
            errors |= ErrorMask::SECTION_START_MISSING;
        }
        errors
    }
}

/// Section id and port of the chip header against the frame header
fn check_chip_header(header: &FrameHeader, chip: &ChipHeader) -> ErrorMask {
    let mut errors = ErrorMask::NONE;
    if chip.section_id != header.section_id() {
        error!(
            frame_section = header.section_id(),
            chip_section = chip.section_id,
            "Section id differs between frame and chip header"
        );
        errors |= ErrorMask::CHIP_SECTION_ID;
    }
    if chip.chip_port != header.chip_port() {
        error!(
            frame_port = header.chip_port(),
            chip_port = chip.chip_port,
            "Chip port differs between frame and chip header"
        );
        errors |= ErrorMask::CHIP_PORT;
    }
    errors
}

/// A checksum with an all-zero half hints at padding inside the payload
fn check_padding(frame: &[u8]) -> ErrorMask {
    match stored_checksum(frame) {
        Some(crc) if crc & 0xFFFF_0000 == 0 || crc & 0xFFFF == 0 => {
            warn!(checksum = %format_args!("{:#010x}", crc), "Suspicious padding");
            ErrorMask::SUSPICIOUS_PADDING
        }
        _ => ErrorMask::NONE,
    }
}
