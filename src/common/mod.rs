//! Common data types shared across components
//!
//! This module defines the decoder's inputs (raw buffers and event
//! metadata) and its output records (pixel hits, clusters, ROIs).

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod cli;
pub mod error;
pub mod metrics;

pub use error::{UnpackError, UnpackResult};
pub use metrics::DecodeStatistics;

/// One raw event buffer as delivered by the readout (envelope + frames)
///
/// Backed by `Bytes`, so cloning shares the underlying storage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawEventBuffer(Bytes);

impl RawEventBuffer {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Vec<u8>> for RawEventBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

impl From<Bytes> for RawEventBuffer {
    fn from(data: Bytes) -> Self {
        Self(data)
    }
}

impl AsRef<[u8]> for RawEventBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Event metadata supplied by the surrounding pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Trigger number (32 bits)
    pub trigger_number: u32,
    /// Experiment number (10 bits on the wire)
    pub experiment: u16,
    /// Run number (14 bits on the wire)
    pub run: u16,
    /// Sub-run number
    pub subrun: u8,
    /// Event time in nanoseconds
    pub time_ns: u64,
}

impl EventMeta {
    pub fn new(trigger_number: u32, experiment: u16, run: u16, subrun: u8) -> Self {
        Self {
            trigger_number,
            experiment,
            run,
            subrun,
            time_ns: 0,
        }
    }

    pub fn with_time_ns(mut self, time_ns: u64) -> Self {
        self.time_ns = time_ns;
        self
    }
}

/// Detector module identifier (layer, ladder, sensor)
///
/// Derived from the 6-bit section identifier. Serialized as
/// `"layer.ladder.sensor"` so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModuleId {
    pub layer: u8,
    pub ladder: u8,
    pub sensor: u8,
}

impl ModuleId {
    pub fn new(layer: u8, ladder: u8, sensor: u8) -> Self {
        Self {
            layer,
            ladder,
            sensor,
        }
    }

    /// Decode a section identifier
    pub fn from_section_id(section_id: u8) -> Self {
        Self {
            layer: ((section_id & 0x20) >> 5) + 1,
            ladder: (section_id & 0x1E) >> 1,
            sensor: (section_id & 0x01) + 1,
        }
    }

    /// Encode back to a section identifier
    pub fn section_id(&self) -> u8 {
        ((self.layer.saturating_sub(1) & 1) << 5)
            | ((self.ladder & 0xF) << 1)
            | (self.sensor.saturating_sub(1) & 1)
    }

    /// Ladder within the installed range of its layer
    pub fn is_valid(&self) -> bool {
        let max_ladder = match self.layer {
            1 => 8,
            2 => 12,
            _ => return false,
        };
        self.ladder >= 1 && self.ladder <= max_ladder && (1..=2).contains(&self.sensor)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.layer, self.ladder, self.sensor)
    }
}

impl FromStr for ModuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(format!("invalid module id '{}': expected layer.ladder.sensor", s));
        }
        let parse = |p: &str| {
            p.parse::<u8>()
                .map_err(|e| format!("invalid module id '{}': {}", s, e))
        };
        Ok(Self::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }
}

impl Serialize for ModuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One decoded pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelHit {
    /// Sensor row (v cell)
    pub row: u16,
    /// Sensor column (u cell)
    pub column: u16,
    /// ADC amplitude
    pub amplitude: u8,
    /// Trigger row offset of the section
    pub trigger_time_offset: u16,
    /// Chip frame number relative to the section start frame (6 bits)
    pub frame_number_delta: u8,
    /// Common-mode value of the current row
    pub common_mode: u8,
}

/// Cluster words from one cluster-engine frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub module: ModuleId,
    pub section_id: u8,
    pub chip_port: u8,
    pub words: Vec<u16>,
}

/// One region-of-interest record (64 bits, big-endian on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiRecord(pub u64);

/// Unprocessed ADC dump of one chip
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawAdcFrame {
    pub module: ModuleId,
    pub section_id: u8,
    pub chip_port: u8,
    /// ADC + pedestal capture (otherwise ADC only)
    pub with_pedestal: bool,
    #[serde(skip_serializing)]
    pub samples: Vec<u8>,
}

impl RawAdcFrame {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_id_from_section() {
        // layer bit, ladder 3, sensor bit
        let id = ModuleId::from_section_id(0x20 | (3 << 1) | 1);
        assert_eq!(id, ModuleId::new(2, 3, 2));
        assert_eq!(id.section_id(), 0x27);
        assert!(id.is_valid());
    }

    #[test]
    fn test_module_id_validity() {
        assert!(!ModuleId::from_section_id(0).is_valid());
        assert!(ModuleId::from_section_id(1 << 1).is_valid());
        // ladder 9 on layer 1 does not exist
        assert!(!ModuleId::from_section_id(9 << 1).is_valid());
        // ladder 12 on layer 2 does
        assert!(ModuleId::from_section_id(0x20 | (12 << 1)).is_valid());
        assert!(!ModuleId::from_section_id(0x20 | (13 << 1)).is_valid());
    }

    #[test]
    fn test_module_id_string_form() {
        let id = ModuleId::new(1, 4, 2);
        assert_eq!(id.to_string(), "1.4.2");
        assert_eq!("1.4.2".parse::<ModuleId>().unwrap(), id);
        assert!("1.4".parse::<ModuleId>().is_err());
        assert!("a.b.c".parse::<ModuleId>().is_err());

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1.4.2\"");
        let back: ModuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_raw_buffer_shares_storage() {
        let buffer = RawEventBuffer::from(vec![1u8, 2, 3]);
        let copy = buffer.clone();
        assert_eq!(buffer.as_bytes().as_ptr(), copy.as_bytes().as_ptr());
        assert_eq!(copy.len(), 3);
    }
}
