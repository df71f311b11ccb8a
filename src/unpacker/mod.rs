//! Event unpacker for nested pixel-detector readout buffers
//!
//! One call decodes all buffers of one trigger. Decoding never fails: every
//! protocol fault becomes a bit in the event's [`ErrorMask`], and whatever
//! could be decoded is returned alongside it.
//!
//! ```text
//! RawEventBuffer ──► FrameTable (envelope) ──► per-frame state machine
//!                                               ├─ checksum
//!                                               ├─ fixed frames (trigger, envelope, section)
//!                                               └─ payloads (hits, clusters, ROIs) ──► remap
//! ```

pub mod checksum;
mod decode;
pub mod envelope;
pub mod error_mask;
pub mod frames;
pub mod header;
pub mod payload;
pub mod remap;
mod state;

pub use checksum::{ChecksumOutcome, ChecksumValidator, FrameCrc};
pub use envelope::{EnvelopeError, FrameTable};
pub use error_mask::{ErrorKind, ErrorMask, ERROR_KINDS};
pub use frames::RunTag;
pub use header::{FrameHeader, FrameType, HeaderError};
pub use remap::Remapper;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::common::{
    ClusterRecord, EventMeta, ModuleId, PixelHit, RawAdcFrame, RawEventBuffer, RoiRecord,
};

/// Decoder options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Frame count and length table are big-endian
    pub header_big_endian: bool,
    /// Do not validate checksums of frames above `checksum_size_limit`
    pub skip_oversize_checksum: bool,
    /// Frame size limit for checksum validation in bytes
    pub checksum_size_limit: usize,
    /// Row offset added before mirroring (modulo 768)
    pub row_offset: i32,
    /// Added to the metadata trigger number before comparisons
    pub trigger_offset: i32,
    /// Do not warn about a missing secondary trigger source
    pub ignore_secondary_trigger: bool,
    /// Do not report experiment-number and time-tag mismatches
    pub ignore_meta_flags: bool,
    /// Events whose mask intersects this are not accepted
    pub critical_mask: ErrorMask,
    /// Keep decoded hits, clusters, ROIs and raw frames
    pub store_records: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            header_big_endian: true,
            skip_oversize_checksum: true,
            checksum_size_limit: checksum::DEFAULT_CHECKSUM_SIZE_LIMIT,
            row_offset: 0,
            trigger_offset: 0,
            ignore_secondary_trigger: false,
            ignore_meta_flags: false,
            critical_mask: ErrorMask::NONE,
            store_records: true,
        }
    }
}

/// Trigger information from the trigger metadata frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggerInfo {
    pub trigger_number: u32,
    pub accepted: bool,
    pub send_rois: bool,
    pub send_unfiltered: bool,
    pub primary: RunTag,
    /// `None` when the secondary source was missing
    pub secondary: Option<RunTag>,
}

/// Result of one section (SectionStart .. SectionEnd)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionStatus {
    pub module: ModuleId,
    pub section_id: u8,
    pub error_mask: ErrorMask,
    /// Bytes declared by SectionEnd; `None` if the section was never closed
    pub declared_bytes: Option<u64>,
    /// Bytes counted; `None` once filtered frames made counting impossible
    pub counted_bytes: Option<u64>,
    pub active_chip_mask: u8,
    pub found_chip_mask: u8,
    pub trigger_row_offset: u16,
    pub start_frame_number: u16,
}

/// Result of one envelope (EventStart .. EventEnd)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeStatus {
    pub envelope_id: Option<u8>,
    pub error_mask: ErrorMask,
    pub declared_bytes: u64,
    pub counted_bytes: Option<u64>,
    pub active_section_mask: u8,
    pub faked: bool,
}

/// Everything decoded for one trigger
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecodedEvent {
    pub meta: EventMeta,
    pub error_mask: ErrorMask,
    /// Mask does not intersect the critical mask
    pub accepted: bool,
    pub hits: BTreeMap<ModuleId, Vec<PixelHit>>,
    pub clusters: Vec<ClusterRecord>,
    pub rois: Vec<RoiRecord>,
    pub raw_frames: Vec<RawAdcFrame>,
    pub sections: Vec<SectionStatus>,
    pub envelopes: Vec<EnvelopeStatus>,
    pub trigger: Option<TriggerInfo>,
    /// Buffers that aborted before frame decoding
    pub aborted: Vec<EnvelopeError>,
    pub buffers: usize,
    pub frames: usize,
    pub checksums_skipped: u32,
    pub unmapped_hits: u32,
}

impl DecodedEvent {
    pub fn hit_count(&self) -> usize {
        self.hits.values().map(Vec::len).sum()
    }

    pub fn hits_for(&self, module: &ModuleId) -> &[PixelHit] {
        self.hits.get(module).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Placeholder trigger without data
    pub fn is_faked(&self) -> bool {
        self.error_mask.contains(ErrorMask::FAKE_NO_DATA)
    }
}

/// Stateless event decoder; one instance can be shared between threads
#[derive(Debug, Clone)]
pub struct Unpacker {
    options: DecodeOptions,
    remapper: Remapper,
    checksum: ChecksumValidator,
}

impl Default for Unpacker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Unpacker {
    /// Create an unpacker with given options
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            remapper: Remapper::new(options.row_offset),
            checksum: ChecksumValidator::new(
                options.checksum_size_limit,
                options.skip_oversize_checksum,
            ),
            options,
        }
    }

    /// Create an unpacker with default options
    pub fn with_defaults() -> Self {
        Self::new(DecodeOptions::default())
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode a trigger carried by a single buffer
    pub fn unpack(&self, meta: &EventMeta, buffer: &RawEventBuffer) -> DecodedEvent {
        self.unpack_event(meta, std::slice::from_ref(buffer))
    }

    /// Decode all buffers of one trigger
    pub fn unpack_event(&self, meta: &EventMeta, buffers: &[RawEventBuffer]) -> DecodedEvent {
        let mut event = DecodedEvent {
            meta: *meta,
            ..Default::default()
        };

        if buffers.is_empty() {
            warn!(trigger = meta.trigger_number, "Event without any buffer");
            event.error_mask |= ErrorMask::NO_DATA;
        }

        for (index, buffer) in buffers.iter().enumerate() {
            debug!(
                trigger = meta.trigger_number,
                buffer = index,
                bytes = buffer.len(),
                "Decoding buffer"
            );
            decode::decode_buffer(self, meta, buffer.as_bytes(), &mut event);
            event.buffers += 1;
        }

        event.accepted = !event.error_mask.intersects(self.options.critical_mask);
        if !event.error_mask.is_empty() {
            debug!(
                trigger = meta.trigger_number,
                errors = %event.error_mask,
                kinds = event.error_mask.count(),
                accepted = event.accepted,
                "Event decoded with errors"
            );
        }
        event
    }

    /// Metadata trigger number after the configured correction
    pub(crate) fn expected_trigger(&self, meta: &EventMeta) -> u32 {
        meta.trigger_number
            .wrapping_add_signed(self.options.trigger_offset)
    }

    pub(crate) fn remapper(&self) -> &Remapper {
        &self.remapper
    }

    pub(crate) fn checksum(&self) -> &ChecksumValidator {
        &self.checksum
    }
}
