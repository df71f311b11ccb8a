//! Chip-coordinate to sensor-coordinate remapping
//!
//! Chips deliver hits in readout (row, column) order. Unless the section
//! has already reformatted the data, each hit is translated through a drain
//! lookup table chosen by the module's orientation class.

mod tables;

use serde::{Deserialize, Serialize};

/// Number of entries in each drain table (4 ports × 64 columns × 4 rows)
pub const CHANNELS: usize = 1024;

/// Drain table value for channels without a connected drain
pub const UNMAPPED_DRAIN: u16 = 1023;

/// Rows of one sensor
pub const SENSOR_ROWS: u16 = 768;

/// Columns of one sensor
pub const SENSOR_COLUMNS: u16 = 250;

/// Section identifier bit marking an outer-layer module
const OUTER_LAYER_BIT: u8 = 0x20;

/// Orientation class of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    InnerForwardOuterBackward,
    InnerBackwardOuterForward,
}

impl Orientation {
    /// Class from the section identifier: bits 0 and 5 equal means IF/OB
    pub fn of_section(section_id: u8) -> Self {
        match section_id & 0x21 {
            0x00 | 0x21 => Self::InnerForwardOuterBackward,
            _ => Self::InnerBackwardOuterForward,
        }
    }

    fn table(self) -> &'static [u16; CHANNELS] {
        match self {
            Self::InnerForwardOuterBackward => &tables::INNER_FORWARD_OUTER_BACKWARD,
            Self::InnerBackwardOuterForward => &tables::INNER_BACKWARD_OUTER_FORWARD,
        }
    }

    /// Drain line of a channel, `None` for unconnected channels
    pub fn drain(self, channel: usize) -> Option<u16> {
        match self.table().get(channel) {
            Some(&UNMAPPED_DRAIN) | None => None,
            Some(&drain) => Some(drain),
        }
    }

    /// Channel that feeds a given drain line (linear search)
    pub fn channel_of_drain(self, drain: u16) -> Option<usize> {
        if drain == UNMAPPED_DRAIN {
            return None;
        }
        self.table().iter().position(|&d| d == drain)
    }
}

/// Table index of a chip hit
pub fn channel_index(row: u16, column: u16, chip_port: u8) -> usize {
    ((column as usize) << 2) + (row as usize & 0x3) + 256 * chip_port as usize
}

/// Whether a section identifier names an inner-layer module
pub fn is_inner_module(section_id: u8) -> bool {
    section_id & OUTER_LAYER_BIT == 0
}

/// Remaps chip coordinates with a fixed row offset
#[derive(Debug, Clone, Copy, Default)]
pub struct Remapper {
    row_offset: u16,
}

impl Remapper {
    /// Create a remapper; the offset is reduced modulo the sensor rows
    pub fn new(row_offset: i32) -> Self {
        Self {
            row_offset: row_offset.rem_euclid(SENSOR_ROWS as i32) as u16,
        }
    }

    pub fn row_offset(&self) -> u16 {
        self.row_offset
    }

    /// Translate a chip hit to sensor (row, column)
    ///
    /// Returns `None` when the channel has no drain; the hit must be dropped.
    pub fn remap(&self, section_id: u8, chip_port: u8, row: u16, column: u16) -> Option<(u16, u16)> {
        let orientation = Orientation::of_section(section_id);
        let channel = channel_index(row, column, chip_port);
        let drain = orientation.drain(channel)?;

        let (column, row) = match orientation {
            Orientation::InnerForwardOuterBackward => (drain >> 2, (row & !0x3) + (drain & 0x3)),
            Orientation::InnerBackwardOuterForward => (
                (SENSOR_COLUMNS - 1).checked_sub(drain >> 2)?,
                (row & !0x3) + (!drain & 0x3),
            ),
        };

        let row = (row + self.row_offset) % SENSOR_ROWS;
        let row = if is_inner_module(section_id) {
            SENSOR_ROWS - 1 - row
        } else {
            row
        };
        Some((row, column))
    }
}
