//! End-of-run decode statistics
//!
//! # Design Principles (KISS)
//! - Plain counters, no atomics: each worker owns its own instance
//! - Workers merge once at the end (sum is commutative and associative)
//! - One count per event and error kind, however often the bit was set

use std::fmt::Write as _;
use std::iter::Sum;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::unpacker::{DecodedEvent, ERROR_KINDS};

/// Counters accumulated over many decoded events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStatistics {
    /// Events decoded
    pub events: u64,
    /// Events per error kind, indexed like `ERROR_KINDS`
    pub error_counts: Vec<u64>,
    /// Events with at least one error bit
    pub events_with_errors: u64,
    /// Events whose mask intersected the critical mask
    pub rejected: u64,
    /// Trigger metadata without the "accepted" flag
    pub not_accepted: u64,
    /// Trigger metadata with the "send ROIs" flag
    pub send_rois: u64,
    /// Trigger metadata with the "send unfiltered" flag
    pub unfiltered: u64,
    /// Frames whose checksum was not calculated
    pub checksums_skipped: u64,
    /// Placeholder triggers without data
    pub faked: u64,
    pub frames: u64,
    pub hits: u64,
    pub clusters: u64,
    pub rois: u64,
    pub raw_frames: u64,
    /// Hits dropped on unconnected drains
    pub unmapped_hits: u64,
}

impl Default for DecodeStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeStatistics {
    /// Create zeroed statistics
    pub fn new() -> Self {
        Self {
            events: 0,
            error_counts: vec![0; ERROR_KINDS.len()],
            events_with_errors: 0,
            rejected: 0,
            not_accepted: 0,
            send_rois: 0,
            unfiltered: 0,
            checksums_skipped: 0,
            faked: 0,
            frames: 0,
            hits: 0,
            clusters: 0,
            rois: 0,
            raw_frames: 0,
            unmapped_hits: 0,
        }
    }

    /// Account one decoded event
    pub fn record(&mut self, event: &DecodedEvent) {
        self.events += 1;
        if self.error_counts.len() < ERROR_KINDS.len() {
            self.error_counts.resize(ERROR_KINDS.len(), 0);
        }
        for (i, kind) in ERROR_KINDS.iter().enumerate() {
            if event.error_mask.bits() & (1u64 << kind.bit) != 0 {
                self.error_counts[i] += 1;
            }
        }
        if !event.error_mask.is_empty() {
            self.events_with_errors += 1;
        }
        if !event.accepted {
            self.rejected += 1;
        }
        if let Some(trigger) = &event.trigger {
            if !trigger.accepted {
                self.not_accepted += 1;
            }
            if trigger.send_rois {
                self.send_rois += 1;
            }
            if trigger.send_unfiltered {
                self.unfiltered += 1;
            }
        }
        if event.is_faked() {
            self.faked += 1;
        }
        self.checksums_skipped += event.checksums_skipped as u64;
        self.frames += event.frames as u64;
        self.hits += event.hit_count() as u64;
        self.clusters += event.clusters.len() as u64;
        self.rois += event.rois.len() as u64;
        self.raw_frames += event.raw_frames.len() as u64;
        self.unmapped_hits += event.unmapped_hits as u64;
    }

    /// Add another worker's statistics
    pub fn merge(&mut self, other: &DecodeStatistics) {
        self.events += other.events;
        if self.error_counts.len() < other.error_counts.len() {
            self.error_counts.resize(other.error_counts.len(), 0);
        }
        for (mine, theirs) in self.error_counts.iter_mut().zip(&other.error_counts) {
            *mine += theirs;
        }
        self.events_with_errors += other.events_with_errors;
        self.rejected += other.rejected;
        self.not_accepted += other.not_accepted;
        self.send_rois += other.send_rois;
        self.unfiltered += other.unfiltered;
        self.checksums_skipped += other.checksums_skipped;
        self.faked += other.faked;
        self.frames += other.frames;
        self.hits += other.hits;
        self.clusters += other.clusters;
        self.rois += other.rois;
        self.raw_frames += other.raw_frames;
        self.unmapped_hits += other.unmapped_hits;
    }

    /// Events that carried the named error kind
    pub fn error_count(&self, name: &str) -> u64 {
        ERROR_KINDS
            .iter()
            .position(|k| k.name.eq_ignore_ascii_case(name))
            .and_then(|i| self.error_counts.get(i).copied())
            .unwrap_or(0)
    }

    /// Human-readable end-of-run table (all error kinds, zeros included)
    pub fn summary_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Decode summary: {} events, {} frames", self.events, self.frames);
        let _ = writeln!(
            out,
            "  with errors {}  rejected {}  faked {}  checksums skipped {}",
            self.events_with_errors, self.rejected, self.faked, self.checksums_skipped
        );
        let _ = writeln!(
            out,
            "  not accepted {}  send ROIs {}  unfiltered {}",
            self.not_accepted, self.send_rois, self.unfiltered
        );
        let _ = writeln!(
            out,
            "  hits {}  unmapped {}  clusters {}  ROIs {}  raw frames {}",
            self.hits, self.unmapped_hits, self.clusters, self.rois, self.raw_frames
        );
        let _ = writeln!(out, "{:>4}  {:<28} {:>10}  description", "bit", "error", "events");
        for (i, kind) in ERROR_KINDS.iter().enumerate() {
            let count = self.error_counts.get(i).copied().unwrap_or(0);
            let _ = writeln!(
                out,
                "{:>4}  {:<28} {:>10}  {}",
                kind.bit, kind.name, count, kind.description
            );
        }
        out
    }
}

impl AddAssign<&DecodeStatistics> for DecodeStatistics {
    fn add_assign(&mut self, other: &DecodeStatistics) {
        self.merge(other);
    }
}

impl AddAssign for DecodeStatistics {
    fn add_assign(&mut self, other: DecodeStatistics) {
        self.merge(&other);
    }
}

impl Sum for DecodeStatistics {
    fn sum<I: Iterator<Item = DecodeStatistics>>(iter: I) -> Self {
        iter.fold(Self::new(), |mut acc, s| {
            acc += s;
            acc
        })
    }
}

impl<'a> Sum<&'a DecodeStatistics> for DecodeStatistics {
    fn sum<I: Iterator<Item = &'a DecodeStatistics>>(iter: I) -> Self {
        iter.fold(Self::new(), |mut acc, s| {
            acc += s;
            acc
        })
    }
}
