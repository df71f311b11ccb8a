//! Configuration for the unpacker tools
//!
//! Loaded from a TOML file with two sections, both optional:
//!
//! ```toml
//! [decoder]
//! row_offset = 0
//! trigger_offset = 0
//! critical_errors = ["CHECKSUM", "FATAL_CLASS"]
//!
//! [emulator]
//! events = 1000
//! sections = [0x02, 0x03]
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::data_source_emulator::EmulatorConfig;
use crate::unpacker::checksum::DEFAULT_CHECKSUM_SIZE_LIMIT;
use crate::unpacker::{DecodeOptions, ErrorMask};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Unknown error kind in critical_errors: {0}")]
    UnknownErrorKind(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

// =============================================================================
// Decoder Configuration
// =============================================================================

/// `[decoder]` section
#[derive(Debug, Clone, Deserialize)]
pub struct DecoderConfig {
    /// Frame count and length table are big-endian
    #[serde(default = "default_true")]
    pub header_big_endian: bool,

    /// Skip checksum calculation for frames above the size limit
    #[serde(default = "default_true")]
    pub skip_oversize_checksum: bool,

    /// Checksum size limit in bytes
    #[serde(default = "default_checksum_size_limit")]
    pub checksum_size_limit: usize,

    /// Row offset correction (modulo 768)
    #[serde(default)]
    pub row_offset: i32,

    /// Trigger number correction added to the event metadata
    #[serde(default)]
    pub trigger_offset: i32,

    #[serde(default)]
    pub ignore_secondary_trigger: bool,

    #[serde(default)]
    pub ignore_meta_flags: bool,

    /// Error kinds that reject an event, by name (`FATAL_CLASS` allowed)
    #[serde(default)]
    pub critical_errors: Vec<String>,

    /// Raw critical mask, OR-ed with `critical_errors`
    #[serde(default)]
    pub critical_mask: u64,

    /// Keep hits, clusters and ROIs in decoded events
    #[serde(default = "default_true")]
    pub store_records: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            header_big_endian: true,
            skip_oversize_checksum: true,
            checksum_size_limit: default_checksum_size_limit(),
            row_offset: 0,
            trigger_offset: 0,
            ignore_secondary_trigger: false,
            ignore_meta_flags: false,
            critical_errors: Vec::new(),
            critical_mask: 0,
            store_records: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_checksum_size_limit() -> usize {
    DEFAULT_CHECKSUM_SIZE_LIMIT
}

impl DecoderConfig {
    /// Resolve the critical error names into a mask
    pub fn critical(&self) -> Result<ErrorMask, ConfigError> {
        self.critical_errors
            .iter()
            .try_fold(ErrorMask::from_bits(self.critical_mask), |mask, name| {
                ErrorMask::from_name(name)
                    .map(|bit| mask | bit)
                    .ok_or_else(|| ConfigError::UnknownErrorKind(name.clone()))
            })
    }

    /// Build decoder options
    pub fn to_options(&self) -> Result<DecodeOptions, ConfigError> {
        Ok(DecodeOptions {
            header_big_endian: self.header_big_endian,
            skip_oversize_checksum: self.skip_oversize_checksum,
            checksum_size_limit: self.checksum_size_limit,
            row_offset: self.row_offset,
            trigger_offset: self.trigger_offset,
            ignore_secondary_trigger: self.ignore_secondary_trigger,
            ignore_meta_flags: self.ignore_meta_flags,
            critical_mask: self.critical()?,
            store_records: self.store_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config = Config::from_toml("").unwrap();
        let options = config.decoder.to_options().unwrap();
        assert_eq!(options, DecodeOptions::default());
    }

    #[test]
    fn parse_decoder_section() {
        let toml = r#"
[decoder]
header_big_endian = false
row_offset = -3
trigger_offset = 1
ignore_meta_flags = true
critical_errors = ["checksum", "WORD_COUNT_MISMATCH"]
critical_mask = 2
"#;
        let config = Config::from_toml(toml).unwrap();
        let options = config.decoder.to_options().unwrap();
        assert!(!options.header_big_endian);
        assert_eq!(options.row_offset, -3);
        assert_eq!(options.trigger_offset, 1);
        assert!(options.ignore_meta_flags);
        assert_eq!(
            options.critical_mask,
            ErrorMask::CHECKSUM | ErrorMask::WORD_COUNT_MISMATCH | ErrorMask::MAGIC
        );
    }

    #[test]
    fn fatal_class_group() {
        let toml = r#"
[decoder]
critical_errors = ["FATAL_CLASS"]
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.decoder.critical().unwrap(), ErrorMask::FATAL_CLASS);
    }

    #[test]
    fn unknown_error_kind() {
        let toml = r#"
[decoder]
critical_errors = ["NOT_AN_ERROR"]
"#;
        let config = Config::from_toml(toml).unwrap();
        let err = config.decoder.to_options().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownErrorKind(ref n) if n == "NOT_AN_ERROR"));
    }

    #[test]
    fn parse_emulator_section() {
        let toml = r#"
[emulator]
events = 10
sections = [2, 3]
seed = 7
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.emulator.events, 10);
        assert_eq!(config.emulator.sections, vec![2, 3]);
        assert_eq!(config.emulator.seed, Some(7));
    }

    #[test]
    fn invalid_toml() {
        assert!(matches!(
            Config::from_toml("[decoder\n"),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/pxd.toml"),
            Err(ConfigError::IoError(_))
        ));
    }
}
