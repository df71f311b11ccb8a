//! pxd-unpacker: decoder for nested pixel-detector readout frames
//!
//! One trigger arrives as one or more raw buffers, each an envelope holding a
//! table of frames (trigger meta, event start/end, section start/end and chip
//! data). The [`unpacker`] walks those frames, validates checksums and
//! structure, and returns pixel hits plus a per-event error mask.
//!
//! Around the decoder:
//! - [`data_source_emulator`]: well-formed synthetic buffers
//! - [`recorder`]: dump files of raw buffers
//! - [`data_sink`]: parallel decode of dump files
//! - [`config`]: TOML configuration

pub mod common;
pub mod config;
pub mod data_sink;
pub mod data_source_emulator;
pub mod recorder;
pub mod unpacker;

pub use common::{DecodeStatistics, EventMeta, ModuleId, PixelHit, RawEventBuffer};
pub use unpacker::{DecodeOptions, DecodedEvent, ErrorMask, Unpacker};
