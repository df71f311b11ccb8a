//! Emulated readout - generates random, well-formed event buffers
//!
//! Every generated trigger carries one envelope with the configured
//! sections. Chips draw a Poisson number of hits; chips without hits send a
//! ghost frame. A fraction of triggers can be emitted as placeholders (no
//! data) or with a corrupted checksum to exercise error accounting.
//!
//! # Design Principles (KISS)
//! - Deterministic when seeded
//! - Output is plain (EventMeta, RawEventBuffer) pairs; callers decide
//!   whether to decode, record or discard them

pub mod builder;

pub use builder::{wrap_frames, ChipPixel, EventBuilder};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::common::{EventMeta, ModuleId, RawEventBuffer};
use crate::unpacker::remap::SENSOR_ROWS;

/// Columns addressable by one chip
const CHIP_COLUMNS: u16 = 64;

/// At most five sections fit into the active section mask
const MAX_SECTIONS: usize = 5;

/// Emulator configuration (`[emulator]` section)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Number of triggers to generate
    pub events: u64,
    /// RNG seed; random when absent
    pub seed: Option<u64>,
    pub first_trigger: u32,
    pub experiment: u16,
    pub run: u16,
    pub subrun: u8,
    /// Section identifiers, one per module read out
    pub sections: Vec<u8>,
    /// Active chip ports per section
    pub chip_mask: u8,
    /// Mean hits per chip and trigger
    pub mean_hits: f64,
    /// Region-of-interest records per trigger
    pub rois: usize,
    /// Fraction of triggers sent as placeholders
    pub faked_fraction: f64,
    /// Fraction of triggers with one corrupted frame checksum
    pub corrupt_fraction: f64,
    /// Trigger spacing in nanoseconds
    pub trigger_interval_ns: u64,
    /// Frame table byte order
    pub big_endian: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            events: 1000,
            seed: None,
            first_trigger: 0,
            experiment: 1,
            run: 1,
            subrun: 0,
            sections: vec![0x02, 0x03],
            chip_mask: 0xF,
            mean_hits: 4.0,
            rois: 0,
            faked_fraction: 0.0,
            corrupt_fraction: 0.0,
            trigger_interval_ns: 33_000,
            big_endian: true,
        }
    }
}

/// Emulator errors
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Invalid section id {0:#04x}")]
    InvalidSection(u8),

    #[error("Too many sections: {0} (at most 5)")]
    TooManySections(usize),

    #[error("Invalid mean hit count: {0}")]
    InvalidMean(f64),

    #[error("Invalid fraction {name}: {value}")]
    InvalidFraction { name: &'static str, value: f64 },
}

/// Random event source
pub struct Emulator {
    config: EmulatorConfig,
    rng: StdRng,
    hits: Option<Poisson<f64>>,
    generated: u64,
}

impl Emulator {
    /// Create an emulator; sections are sorted and must be valid modules
    pub fn new(mut config: EmulatorConfig) -> Result<Self, EmulatorError> {
        config.sections.sort_unstable();
        config.sections.dedup();
        if config.sections.len() > MAX_SECTIONS {
            return Err(EmulatorError::TooManySections(config.sections.len()));
        }
        if let Some(&bad) = config
            .sections
            .iter()
            .find(|&&id| id == 0 || !ModuleId::from_section_id(id).is_valid())
        {
            return Err(EmulatorError::InvalidSection(bad));
        }
        for (name, value) in [
            ("faked_fraction", config.faked_fraction),
            ("corrupt_fraction", config.corrupt_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EmulatorError::InvalidFraction { name, value });
            }
        }

        let hits = if config.mean_hits > 0.0 {
            Some(Poisson::new(config.mean_hits).map_err(|_| EmulatorError::InvalidMean(config.mean_hits))?)
        } else if config.mean_hits == 0.0 {
            None
        } else {
            return Err(EmulatorError::InvalidMean(config.mean_hits));
        };

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            rng,
            hits,
            generated: 0,
        })
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Triggers generated so far
    pub fn generated(&self) -> u64 {
        self.generated
    }

    /// Generate the next trigger
    pub fn next_event(&mut self) -> (EventMeta, RawEventBuffer) {
        let index = self.generated;
        self.generated += 1;

        let meta = EventMeta::new(
            self.config.first_trigger.wrapping_add(index as u32),
            self.config.experiment,
            self.config.run,
            self.config.subrun,
        )
        .with_time_ns(index * self.config.trigger_interval_ns);

        let mut builder = EventBuilder::new(meta);
        if self.rng.gen_bool(self.config.faked_fraction) {
            debug!(trigger = meta.trigger_number, "Emulating placeholder trigger");
            builder.trigger_meta().faked_event_start().faked_event_end();
            return (meta, builder.build_with(self.config.big_endian));
        }

        let mut flags = builder::DEFAULT_TRIGGER_FLAGS;
        if self.config.rois > 0 {
            flags |= crate::unpacker::frames::constants::FLAG_SEND_ROIS;
        }
        let section_mask = ((1u16 << self.config.sections.len()) - 1) as u8;
        builder
            .trigger_meta_with(flags, true)
            .start_frame_number(self.rng.gen_range(0..64))
            .trigger_row_offset(self.rng.gen_range(0..SENSOR_ROWS))
            .event_start(section_mask);

        let sections = self.config.sections.clone();
        for section_id in sections {
            builder.section_start(section_id, self.config.chip_mask);
            for port in 0..4u8 {
                if self.config.chip_mask & (1 << port) == 0 {
                    continue;
                }
                let pixels = self.chip_pixels();
                if pixels.is_empty() {
                    builder.ghost(section_id, port);
                } else {
                    builder.zero_suppressed(section_id, port, &pixels);
                }
            }
            builder.section_end(section_id);
        }

        if self.config.rois > 0 {
            let records: Vec<u64> = (0..self.config.rois).map(|_| self.rng.gen()).collect();
            builder.roi(&records);
        }
        builder.event_end();

        if self.rng.gen_bool(self.config.corrupt_fraction) {
            let index = self.rng.gen_range(1..builder.frame_count());
            debug!(trigger = meta.trigger_number, frame = index, "Corrupting frame checksum");
            builder.corrupt_checksum(index);
        }

        (meta, builder.build_with(self.config.big_endian))
    }

    /// Random pixels of one chip, sorted by row
    fn chip_pixels(&mut self) -> Vec<ChipPixel> {
        let count = match &self.hits {
            Some(poisson) => poisson.sample(&mut self.rng) as usize,
            None => 0,
        };
        let mut pixels: Vec<ChipPixel> = (0..count)
            .map(|_| {
                (
                    self.rng.gen_range(0..SENSOR_ROWS),
                    self.rng.gen_range(0..CHIP_COLUMNS),
                    self.rng.gen_range(1..=255),
                )
            })
            .collect();
        pixels.sort_unstable();
        pixels.dedup_by_key(|p| (p.0, p.1));
        pixels
    }
}

impl Iterator for Emulator {
    type Item = (EventMeta, RawEventBuffer);

    fn next(&mut self) -> Option<Self::Item> {
        if self.generated >= self.config.events {
            return None;
        }
        Some(self.next_event())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unpacker::{ErrorMask, Unpacker};

    fn seeded(config: EmulatorConfig) -> Emulator {
        Emulator::new(EmulatorConfig {
            seed: Some(42),
            ..config
        })
        .unwrap()
    }

    #[test]
    fn default_config() {
        let config = EmulatorConfig::default();
        assert_eq!(config.events, 1000);
        assert_eq!(config.sections, vec![0x02, 0x03]);
        assert_eq!(config.chip_mask, 0xF);
        assert!(config.big_endian);
    }

    #[test]
    fn test_generated_events_decode_cleanly() {
        let unpacker = Unpacker::with_defaults();
        let emulator = seeded(EmulatorConfig {
            events: 50,
            ..Default::default()
        });
        let mut total_hits = 0;
        for (meta, buffer) in emulator {
            let event = unpacker.unpack(&meta, &buffer);
            assert_eq!(event.error_mask, ErrorMask::NONE, "trigger {}", meta.trigger_number);
            assert_eq!(event.sections.len(), 2);
            total_hits += event.hit_count() + event.unmapped_hits as usize;
        }
        assert!(total_hits > 0);
    }

    #[test]
    fn test_seed_is_deterministic() {
        let config = EmulatorConfig {
            events: 5,
            ..Default::default()
        };
        let a: Vec<_> = seeded(config.clone()).collect();
        let b: Vec<_> = seeded(config).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_faked_fraction() {
        let unpacker = Unpacker::with_defaults();
        let emulator = seeded(EmulatorConfig {
            events: 10,
            faked_fraction: 1.0,
            ..Default::default()
        });
        for (meta, buffer) in emulator {
            assert!(unpacker.unpack(&meta, &buffer).is_faked());
        }
    }

    #[test]
    fn test_corrupt_fraction() {
        let unpacker = Unpacker::with_defaults();
        let emulator = seeded(EmulatorConfig {
            events: 10,
            corrupt_fraction: 1.0,
            mean_hits: 0.0,
            ..Default::default()
        });
        for (meta, buffer) in emulator {
            let event = unpacker.unpack(&meta, &buffer);
            assert!(event.error_mask.contains(ErrorMask::CHECKSUM));
        }
    }

    #[test]
    fn test_rois_and_little_endian() {
        let unpacker = Unpacker::new(crate::unpacker::DecodeOptions {
            header_big_endian: false,
            ..Default::default()
        });
        let mut emulator = seeded(EmulatorConfig {
            rois: 3,
            big_endian: false,
            ..Default::default()
        });
        let (meta, buffer) = emulator.next_event();
        let event = unpacker.unpack(&meta, &buffer);
        assert_eq!(event.error_mask, ErrorMask::NONE);
        assert_eq!(event.rois.len(), 3);
        assert!(event.trigger.is_some_and(|t| t.send_rois));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let too_many = EmulatorConfig {
            sections: vec![2, 3, 4, 5, 6, 7],
            ..Default::default()
        };
        assert!(matches!(Emulator::new(too_many), Err(EmulatorError::TooManySections(6))));

        let invalid = EmulatorConfig {
            sections: vec![0],
            ..Default::default()
        };
        assert!(matches!(Emulator::new(invalid), Err(EmulatorError::InvalidSection(0))));

        let negative = EmulatorConfig {
            mean_hits: -1.0,
            ..Default::default()
        };
        assert!(matches!(Emulator::new(negative), Err(EmulatorError::InvalidMean(_))));

        let fraction = EmulatorConfig {
            faked_fraction: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            Emulator::new(fraction),
            Err(EmulatorError::InvalidFraction { name: "faked_fraction", .. })
        ));
    }
}
