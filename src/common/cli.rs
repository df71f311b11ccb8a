//! CLI argument parsing for the pxd-unpack tool
//!
//! # Design Principles (KISS)
//! - Use clap's derive macro for declarative argument definition
//! - Common arguments shared via composition, not inheritance
//! - Each subcommand has its own Args struct that embeds CommonArgs

use std::path::PathBuf;

use clap::Parser;

/// Common arguments shared across all subcommands
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file (defaults apply when absent)
    #[arg(short = 'f', long = "config", env = "PXD_UNPACK_CONFIG")]
    pub config_file: Option<PathBuf>,
}

/// Arguments for `decode`
#[derive(Parser, Debug, Clone)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Dump file to decode
    pub file: PathBuf,

    /// Number of parallel decode workers
    #[arg(short = 'w', long, default_value_t = 1)]
    pub workers: usize,

    /// Write decoded events as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write the statistics as JSON instead of the summary table
    #[arg(long)]
    pub stats_json: bool,
}

/// Arguments for `emulate`
#[derive(Parser, Debug, Clone)]
pub struct EmulateArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output dump file
    pub output: PathBuf,

    /// Number of triggers (overrides the config file)
    #[arg(short = 'n', long)]
    pub events: Option<u64>,

    /// RNG seed (overrides the config file)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Free-form comment stored in the dump header
    #[arg(long, default_value = "")]
    pub comment: String,
}

/// Arguments for `info`
#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {
    /// Dump file to inspect
    pub file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_args_default() {
        let args = CommonArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args.config_file, None);
    }

    #[test]
    fn test_common_args_custom_config() {
        let args = CommonArgs::try_parse_from(["test", "-f", "custom.toml"]).unwrap();
        assert_eq!(args.config_file, Some(PathBuf::from("custom.toml")));
    }

    #[test]
    fn test_decode_args_default() {
        let args = DecodeArgs::try_parse_from(["test", "run.pxd"]).unwrap();
        assert_eq!(args.file, PathBuf::from("run.pxd"));
        assert_eq!(args.workers, 1);
        assert_eq!(args.json, None);
        assert!(!args.stats_json);
    }

    #[test]
    fn test_decode_args_full() {
        let args = DecodeArgs::try_parse_from([
            "test",
            "--config",
            "dec.toml",
            "-w",
            "8",
            "--json",
            "events.json",
            "--stats-json",
            "run.pxd",
        ])
        .unwrap();
        assert_eq!(args.common.config_file, Some(PathBuf::from("dec.toml")));
        assert_eq!(args.workers, 8);
        assert_eq!(args.json, Some(PathBuf::from("events.json")));
        assert!(args.stats_json);
    }

    #[test]
    fn test_decode_args_requires_file() {
        assert!(DecodeArgs::try_parse_from(["test"]).is_err());
    }

    #[test]
    fn test_emulate_args() {
        let args =
            EmulateArgs::try_parse_from(["test", "-n", "500", "--seed", "3", "out.pxd"]).unwrap();
        assert_eq!(args.output, PathBuf::from("out.pxd"));
        assert_eq!(args.events, Some(500));
        assert_eq!(args.seed, Some(3));
        assert_eq!(args.comment, "");
    }

    #[test]
    fn test_info_args() {
        let args = InfoArgs::try_parse_from(["test", "run.pxd"]).unwrap();
        assert_eq!(args.file, PathBuf::from("run.pxd"));
    }
}
