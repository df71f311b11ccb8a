//! One broken rule per buffer
//!
//! Every scenario asserts the exact error mask. `accepted` is checked twice:
//! with the default (empty) critical mask and with the expected bits marked
//! critical.

use pxd_unpacker::data_source_emulator::builder::{pixel_word, row_word};
use pxd_unpacker::data_source_emulator::EventBuilder;
use pxd_unpacker::unpacker::envelope::{ENVELOPE_MAGIC, MAX_FRAMES};
use pxd_unpacker::unpacker::frames::constants::FLAG_ACCEPTED;
use pxd_unpacker::unpacker::payload::{ChipHeader, CHIP_TYPE_ZERO_SUPPRESSED};
use pxd_unpacker::unpacker::FrameType;
use pxd_unpacker::{DecodeOptions, DecodedEvent, ErrorMask, EventMeta, RawEventBuffer, Unpacker};

const SECTION: u8 = 0x02;

fn meta() -> EventMeta {
    EventMeta::new(0x0001_0042, 3, 17, 1).with_time_ns(1_000_000)
}

fn data_misc(section_id: u8, chip_port: u8) -> u16 {
    ((section_id as u16) << 4) | chip_port as u16
}

/// Trigger, event start and the start of one section
fn opened() -> EventBuilder {
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_meta()
        .event_start(0b1)
        .section_start(SECTION, 0b1);
    builder
}

fn closed(mut builder: EventBuilder) -> RawEventBuffer {
    builder.section_end(SECTION).event_end();
    builder.build()
}

fn assert_mask_with(
    options: DecodeOptions,
    meta: &EventMeta,
    buffer: &RawEventBuffer,
    expected: ErrorMask,
) -> DecodedEvent {
    let event = Unpacker::new(options.clone()).unpack(meta, buffer);
    assert_eq!(event.error_mask, expected, "decoded mask: {}", event.error_mask);
    assert!(event.accepted);

    let strict = Unpacker::new(DecodeOptions {
        critical_mask: expected,
        ..options
    });
    assert_eq!(strict.unpack(meta, buffer).accepted, expected.is_empty());
    event
}

fn assert_mask(buffer: &RawEventBuffer, expected: ErrorMask) -> DecodedEvent {
    assert_mask_with(DecodeOptions::default(), &meta(), buffer, expected)
}

#[test]
fn test_reference_event_is_clean() {
    let mut builder = opened();
    builder.ghost(SECTION, 0);
    assert_mask(&closed(builder), ErrorMask::NONE);
}

// ---- ordering ----

#[test]
fn test_repeated_trigger_meta() {
    let mut builder = opened();
    builder.trigger_meta().ghost(SECTION, 0);
    assert_mask(&closed(builder), ErrorMask::TRIGGER_META_ORDER);
}

#[test]
fn test_repeated_event_start() {
    let mut builder = opened();
    builder.event_start(0b1).ghost(SECTION, 0);
    assert_mask(&closed(builder), ErrorMask::SECTION_ENVELOPE_ORDER);
}

#[test]
fn test_descending_section_ids() {
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_meta()
        .event_start(0b11)
        .section_start(0x03, 0b1)
        .ghost(0x03, 0)
        .section_end(0x03)
        .section_start(0x02, 0b1)
        .ghost(0x02, 0)
        .section_end(0x02)
        .event_end();
    let event = assert_mask(&builder.build(), ErrorMask::SECTION_ID_ORDER);
    assert_eq!(event.sections.len(), 2);
    assert!(event.sections[0].error_mask.is_empty());
    assert_eq!(event.sections[1].error_mask, ErrorMask::SECTION_ID_ORDER);
}

#[test]
fn test_third_frame_not_a_section_start() {
    let mut builder = EventBuilder::new(meta());
    builder.trigger_meta().event_start(0b1).event_end();
    assert_mask(
        &builder.build(),
        ErrorMask::SECTION_START_MISSING | ErrorMask::SECTION_COUNT_MISMATCH,
    );
}

// ---- event end ----

#[test]
fn test_event_end_missing() {
    let mut builder = opened();
    builder.ghost(SECTION, 0).section_end(SECTION);
    let event = assert_mask(&builder.build(), ErrorMask::EVENT_END_MISSING);
    assert!(event.envelopes.is_empty());
}

#[test]
fn test_event_end_duplicate() {
    let mut builder = opened();
    builder
        .ghost(SECTION, 0)
        .section_end(SECTION)
        .event_end()
        .event_end();
    // the first end closes the envelope, the second has no start to match
    let event = assert_mask(
        &builder.build(),
        ErrorMask::EVENT_END_DUPLICATE | ErrorMask::EVENT_ID_START_END,
    );
    assert_eq!(event.envelopes.len(), 2);
    assert_eq!(event.envelopes[0].error_mask, ErrorMask::EVENT_END_DUPLICATE);
}

#[test]
fn test_event_end_with_other_envelope_id() {
    let mut builder = opened();
    builder
        .ghost(SECTION, 0)
        .section_end(SECTION)
        .envelope_id(2)
        .event_end();
    let event = assert_mask(&builder.build(), ErrorMask::EVENT_ID_START_END);
    assert_eq!(event.envelopes[0].envelope_id, Some(0));
}

// ---- counts and masks ----

#[test]
fn test_fewer_sections_than_active_mask() {
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_meta()
        .event_start(0b11)
        .section_start(SECTION, 0b1)
        .ghost(SECTION, 0);
    assert_mask(&closed(builder), ErrorMask::SECTION_COUNT_MISMATCH);
}

#[test]
fn test_event_word_count_mismatch() {
    let mut builder = opened();
    builder
        .ghost(SECTION, 0)
        .section_end(SECTION)
        .event_end_with_words(99);
    let event = assert_mask(&builder.build(), ErrorMask::EVENT_WORD_COUNT_MISMATCH);
    assert_eq!(event.envelopes[0].declared_bytes, 99 * 4);
    // event start (20) + section start (16) + ghost (8) + section end (16)
    assert_eq!(event.envelopes[0].counted_bytes, Some(60));
}

#[test]
fn test_chip_missing_from_active_mask() {
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_meta()
        .event_start(0b1)
        .section_start(SECTION, 0b11)
        .ghost(SECTION, 0);
    let event = assert_mask(&closed(builder), ErrorMask::CHIP_MASK_MISMATCH);
    assert_eq!(event.sections[0].found_chip_mask, 0b01);
}

// ---- payload ----

#[test]
fn test_raw_frame_of_unsupported_size() {
    let mut builder = opened();
    let frame = builder.custom_frame(FrameType::RawHit, data_misc(SECTION, 0), false, &[0u8; 8]);
    builder.counted_frame(frame);
    let event = assert_mask(&closed(builder), ErrorMask::DHP_SIZE);
    assert!(event.raw_frames.is_empty());
}

#[test]
fn test_double_chip_header_skips_frame() {
    let chip_header = ChipHeader::encode(CHIP_TYPE_ZERO_SUPPRESSED, SECTION, 0);
    let mut builder = opened();
    // chip header and frame number repeat with the frame number advanced
    builder.zero_suppressed_words(
        SECTION,
        0,
        false,
        &[chip_header, 1, row_word(4, 0), pixel_word(4, 5, 30)],
    );
    let event = assert_mask(&closed(builder), ErrorMask::DOUBLE_HEADER);
    assert_eq!(event.hit_count(), 0);
    assert_eq!(event.unmapped_hits, 0);
}

#[test]
fn test_chip_header_with_other_section() {
    let mut builder = opened();
    builder
        .chip_header_ids(0x03, 0)
        .zero_suppressed(SECTION, 0, &[(10, 3, 40)]);
    assert_mask(&closed(builder), ErrorMask::CHIP_SECTION_ID);
}

#[test]
fn test_chip_header_with_other_port() {
    let mut builder = opened();
    builder
        .chip_header_ids(SECTION, 1)
        .zero_suppressed(SECTION, 0, &[(10, 3, 40)]);
    assert_mask(&closed(builder), ErrorMask::CHIP_PORT);
}

#[test]
fn test_chip_frame_far_from_section_start() {
    let mut builder = opened();
    builder
        .chip_frame_offset(2)
        .zero_suppressed(SECTION, 0, &[(10, 3, 40)]);
    assert_mask(&closed(builder), ErrorMask::CHIP_SECTION_FRAME_DIFFER);
}

// ---- frame level ----

#[test]
fn test_unknown_frame_type() {
    let mut builder = opened();
    let frame = builder.custom_frame(FrameType::Unknown(7), 0, false, &[]);
    builder.ghost(SECTION, 0).counted_frame(frame);
    assert_mask(&closed(builder), ErrorMask::UNKNOWN_FRAME_TYPE);
}

#[test]
fn test_ghost_of_wrong_size() {
    let mut builder = opened();
    let frame = builder.custom_frame(FrameType::Ghost, data_misc(SECTION, 0), true, &[0u8; 4]);
    builder.counted_frame(frame);
    assert_mask(&closed(builder), ErrorMask::FIXED_SIZE);
}

#[test]
fn test_frame_count_above_limit_aborts_buffer() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&ENVELOPE_MAGIC.to_be_bytes());
    buffer.extend_from_slice(&(MAX_FRAMES + 1).to_be_bytes());
    let event = assert_mask(&RawEventBuffer::from(buffer), ErrorMask::FRAME_COUNT);
    assert_eq!(event.aborted.len(), 1);
    assert_eq!(event.frames, 0);
}

#[test]
fn test_error_flag_on_data_frame() {
    let mut builder = opened();
    builder
        .cluster(SECTION, 0, false, &[0x1234, 0x5678])
        .rewrite_frame(3, |frame| frame[0] |= 0x80);
    assert_mask(&closed(builder), ErrorMask::HEADER_ERROR_FLAG);
}

#[test]
fn test_ghost_without_error_flag() {
    let mut builder = opened();
    builder
        .ghost(SECTION, 0)
        .rewrite_frame(3, |frame| frame[0] &= 0x7F);
    assert_mask(&closed(builder), ErrorMask::GHOST_WITHOUT_ERROR_FLAG);
}

// ---- trigger and run ----

#[test]
fn test_trigger_meta_number_mismatch() {
    let trigger = meta().trigger_number;
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_number(trigger + 0x1_0000)
        .trigger_meta()
        .trigger_number(trigger)
        .event_start(0b1)
        .section_start(SECTION, 0b1)
        .ghost(SECTION, 0);
    assert_mask(&closed(builder), ErrorMask::META_TRIGGER);
}

#[test]
fn test_event_start_trigger_mismatch() {
    let trigger = meta().trigger_number;
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_meta()
        .trigger_number(trigger + 0x1_0000)
        .event_start(0b1)
        .trigger_number(trigger)
        .section_start(SECTION, 0b1)
        .ghost(SECTION, 0);
    assert_mask(&closed(builder), ErrorMask::META_TRIGGER_EVENT_START);
}

#[test]
fn test_section_start_trigger_mismatch() {
    let trigger = meta().trigger_number;
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_meta()
        .event_start(0b1)
        .trigger_number(trigger + 0x1_0000)
        .section_start(SECTION, 0b1)
        .trigger_number(trigger)
        .ghost(SECTION, 0);
    assert_mask(&closed(builder), ErrorMask::META_TRIGGER_SECTION_START);
}

#[test]
fn test_upper_trigger_half_differs_everywhere() {
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_number(meta().trigger_number + 0x1_0000)
        .trigger_meta()
        .event_start(0b1)
        .section_start(SECTION, 0b1)
        .ghost(SECTION, 0);
    assert_mask(
        &closed(builder),
        ErrorMask::META_TRIGGER
            | ErrorMask::META_TRIGGER_EVENT_START
            | ErrorMask::META_TRIGGER_SECTION_START,
    );
}

#[test]
fn test_frame_trigger_differs_from_trigger_meta() {
    let trigger = meta().trigger_number;
    let mut builder = opened();
    builder
        .trigger_number(trigger + 1)
        .ghost(SECTION, 0)
        .trigger_number(trigger);
    let event = assert_mask(
        &closed(builder),
        ErrorMask::META_TRIGGER | ErrorMask::FRAME_TRIGGER_MISMATCH,
    );
    assert_eq!(event.sections[0].error_mask, event.error_mask);
}

#[test]
fn test_run_mismatch() {
    let mut builder = opened();
    builder.ghost(SECTION, 0);
    let buffer = closed(builder);
    let other = EventMeta {
        run: meta().run + 1,
        ..meta()
    };
    assert_mask_with(DecodeOptions::default(), &other, &buffer, ErrorMask::META_RUN);
}

#[test]
fn test_subrun_mismatch() {
    let mut builder = opened();
    builder.ghost(SECTION, 0);
    let buffer = closed(builder);
    let other = EventMeta {
        subrun: meta().subrun + 1,
        ..meta()
    };
    assert_mask_with(DecodeOptions::default(), &other, &buffer, ErrorMask::META_SUBRUN);
}

#[test]
fn test_experiment_mismatch_unless_ignored() {
    let mut builder = opened();
    builder.ghost(SECTION, 0);
    let buffer = closed(builder);
    let other = EventMeta {
        experiment: meta().experiment + 1,
        ..meta()
    };
    assert_mask_with(DecodeOptions::default(), &other, &buffer, ErrorMask::META_EXPERIMENT);

    let lenient = DecodeOptions {
        ignore_meta_flags: true,
        ..Default::default()
    };
    assert_mask_with(lenient, &other, &buffer, ErrorMask::NONE);
}

// ---- filtering ----

#[test]
fn test_filtered_frame_when_unfiltered_requested() {
    let mut builder = opened();
    builder.filtered_hit(SECTION, 0, &[(10, 3, 40)]);
    let event = assert_mask(&closed(builder), ErrorMask::UNEXPECTED_FILTERED_FRAME);
    assert_eq!(event.sections[0].counted_bytes, None);
    assert_eq!(event.envelopes[0].counted_bytes, None);
}

#[test]
fn test_unfiltered_frame_when_filtered_requested() {
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_meta_with(FLAG_ACCEPTED, true)
        .event_start(0b1)
        .section_start(SECTION, 0b1)
        .zero_suppressed(SECTION, 0, &[(10, 3, 40)]);
    assert_mask(&closed(builder), ErrorMask::UNEXPECTED_UNFILTERED_FRAME);
}

// ---- section bracketing ----

#[test]
fn test_chip_frame_between_sections() {
    let mut builder = opened();
    builder
        .ghost(SECTION, 0)
        .section_end(SECTION)
        .ghost(SECTION, 0)
        .event_end();
    // with no open section the frame's section id has nothing to match
    assert_mask(
        &builder.build(),
        ErrorMask::DATA_OUTSIDE_SECTION | ErrorMask::SECTION_FRAME_ID,
    );
}

#[test]
fn test_section_end_with_other_id() {
    let mut builder = opened();
    builder.ghost(SECTION, 0).section_end(0x03).event_end();
    let event = assert_mask(&builder.build(), ErrorMask::SECTION_START_END_ID);
    assert_eq!(event.sections[0].section_id, SECTION);
}

#[test]
fn test_section_end_without_start() {
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_meta()
        .event_start(0)
        .section_end(SECTION)
        .event_end();
    let event = assert_mask(
        &builder.build(),
        ErrorMask::DATA_OUTSIDE_SECTION
            | ErrorMask::SECTION_START_END_ID
            | ErrorMask::SECTION_END_WITHOUT_START
            | ErrorMask::SECTION_COUNT_MISMATCH,
    );
    assert!(event.sections.is_empty());
}

#[test]
fn test_chip_frame_of_other_section() {
    let mut builder = opened();
    builder.ghost(0x03, 0);
    assert_mask(&closed(builder), ErrorMask::SECTION_FRAME_ID);
}

#[test]
fn test_section_of_missing_ladder() {
    // layer 2, ladder 15
    let mut builder = EventBuilder::new(meta());
    builder
        .trigger_meta()
        .event_start(0b1)
        .section_start(0x3E, 0b1)
        .ghost(0x3E, 0)
        .section_end(0x3E)
        .event_end();
    assert_mask(&builder.build(), ErrorMask::SECTION_ID_INVALID);
}
