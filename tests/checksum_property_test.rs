//! Property tests: single-byte corruption is caught by the frame checksum

use proptest::prelude::*;
use proptest::sample::Index;
use pxd_unpacker::data_source_emulator::EventBuilder;
use pxd_unpacker::{ErrorMask, EventMeta, Unpacker};

const COMMON_MODE_FRAME: usize = 4;
const FRAMES: usize = 7;

fn builder(meta: EventMeta) -> EventBuilder {
    let mut builder = EventBuilder::new(meta);
    builder
        .trigger_meta()
        .event_start(0b1)
        .section_start(0x02, 0b1)
        .ghost(0x02, 0)
        .common_mode(0x02, 0)
        .section_end(0x02)
        .event_end();
    builder
}

proptest! {
    #[test]
    fn prop_payload_flip_sets_only_checksum(offset in 4usize..196, flip in 1u8..=255) {
        let meta = EventMeta::new(77, 1, 1, 0);
        let mut builder = builder(meta);
        let unpacker = Unpacker::with_defaults();
        prop_assert_eq!(unpacker.unpack(&meta, &builder.build()).error_mask, ErrorMask::NONE);

        if let Some(frame) = builder.frame_mut(COMMON_MODE_FRAME) {
            frame[offset] ^= flip;
        }
        let event = unpacker.unpack(&meta, &builder.build());
        prop_assert_eq!(event.error_mask, ErrorMask::CHECKSUM);
    }

    #[test]
    fn prop_stored_checksum_flip_sets_only_checksum(
        index in 0usize..FRAMES,
        byte in 0usize..4,
        flip in 1u8..=255,
    ) {
        let meta = EventMeta::new(77, 1, 1, 0);
        let mut builder = builder(meta);
        if let Some(frame) = builder.frame_mut(index) {
            let offset = frame.len() - 4 + byte;
            frame[offset] ^= flip;
        }
        let event = Unpacker::with_defaults().unpack(&meta, &builder.build());
        prop_assert_eq!(event.error_mask, ErrorMask::CHECKSUM);
    }

    #[test]
    fn prop_any_flip_is_detected(
        index in 0usize..FRAMES,
        position in any::<Index>(),
        flip in 1u8..=255,
    ) {
        let meta = EventMeta::new(77, 1, 1, 0);
        let mut builder = builder(meta);
        if let Some(frame) = builder.frame_mut(index) {
            let offset = position.index(frame.len());
            frame[offset] ^= flip;
        }
        // a flipped type code may leave no known frame type to checksum
        let event = Unpacker::with_defaults().unpack(&meta, &builder.build());
        prop_assert!(
            event.error_mask.intersects(ErrorMask::CHECKSUM | ErrorMask::UNKNOWN_FRAME_TYPE),
            "mask {}",
            event.error_mask
        );
    }

    #[test]
    fn prop_decode_is_deterministic(trigger in any::<u32>(), run in 0u16..0x3FFF, subrun in any::<u8>()) {
        let meta = EventMeta::new(trigger, 1, run, subrun);
        let buffer = builder(meta).build();
        let unpacker = Unpacker::with_defaults();
        let first = unpacker.unpack(&meta, &buffer);
        let second = unpacker.unpack(&meta, &buffer);
        prop_assert_eq!(first.error_mask, ErrorMask::NONE);
        prop_assert_eq!(first.error_mask, second.error_mask);
        prop_assert_eq!(first.sections, second.sections);
    }
}
