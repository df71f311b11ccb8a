//! pxd-unpack - decode, emulate and inspect pixel-detector dump files
//!
//! Usage:
//!   pxd-unpack decode <file> [--workers N] [--json <path>]  - Decode and print error summary
//!   pxd-unpack emulate <file> [--events N] [--seed S]       - Write a synthetic dump file
//!   pxd-unpack info <file>                                  - Validate a dump file

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pxd_unpacker::common::cli::{CommonArgs, DecodeArgs, EmulateArgs, InfoArgs};
use pxd_unpacker::config::Config;
use pxd_unpacker::data_sink::{DataSink, DataSinkConfig};
use pxd_unpacker::data_source_emulator::Emulator;
use pxd_unpacker::recorder::{open_dump, DumpHeader, DumpWriter};
use pxd_unpacker::unpacker::Unpacker;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pxd-unpack")]
#[command(about = "Decoder for pixel-detector readout dump files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode every trigger of a dump file
    Decode(DecodeArgs),

    /// Write a dump file with emulated triggers
    Emulate(EmulateArgs),

    /// Validate a dump file and show its metadata
    Info(InfoArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pxd_unpacker=info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Decode(args) => decode(args).await,
        Commands::Emulate(args) => emulate(args),
        Commands::Info(args) => show_info(&args.file),
    }
}

fn load_config(common: &CommonArgs) -> anyhow::Result<Config> {
    match &common.config_file {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

async fn decode(args: DecodeArgs) -> anyhow::Result<()> {
    let config = load_config(&args.common)?;
    let unpacker = Unpacker::new(config.decoder.to_options()?);

    let reader =
        open_dump(&args.file).with_context(|| format!("opening {}", args.file.display()))?;
    info!(
        file = %args.file.display(),
        run = reader.header().run,
        experiment = reader.header().experiment,
        "Decoding dump file"
    );

    let sink = DataSink::new(
        unpacker,
        DataSinkConfig {
            workers: args.workers,
            keep_events: args.json.is_some(),
            ..Default::default()
        },
    )?;
    let report = sink.decode_dump(reader).await?;

    if args.stats_json {
        println!("{}", serde_json::to_string_pretty(&report.statistics)?);
    } else {
        print!("{}", report.statistics.summary_table());
    }

    if let Some(path) = &args.json {
        let out = BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        );
        serde_json::to_writer_pretty(out, &report.events)?;
        info!(path = %path.display(), events = report.events.len(), "Wrote decoded events");
    }
    Ok(())
}

fn emulate(args: EmulateArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.common)?.emulator;
    if let Some(events) = args.events {
        config.events = events;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let mut header = DumpHeader::new(config.experiment, config.run, "emulator");
    header.comment = args.comment;
    if let Some(seed) = config.seed {
        header.metadata.insert("seed".to_string(), seed.to_string());
    }

    let emulator = Emulator::new(config)?;
    let mut writer = DumpWriter::create(&args.output, &header)
        .with_context(|| format!("creating {}", args.output.display()))?;
    for (meta, buffer) in emulator {
        writer.write(&meta, &buffer)?;
    }
    let (_, footer) = writer.finish()?;
    println!(
        "Wrote {} triggers ({} bytes) to {}",
        footer.total_records,
        footer.data_bytes,
        args.output.display()
    );
    Ok(())
}

fn show_info(path: &Path) -> anyhow::Result<()> {
    let mut reader = open_dump(path).with_context(|| format!("opening {}", path.display()))?;
    let result = reader.validate();

    println!("File: {}", path.display());
    println!("Size: {} bytes", std::fs::metadata(path)?.len());
    println!();

    let header = reader.header();
    println!("=== Header ===");
    println!("  Version:        {}", header.version);
    println!("  Experiment:     {}", header.experiment);
    println!("  Run:            {}", header.run);
    println!("  Source:         {}", header.source);
    println!("  Created:        {} (unix timestamp)", header.created_ns / 1_000_000_000);
    if !header.comment.is_empty() {
        println!("  Comment:        {}", header.comment);
    }
    if !header.metadata.is_empty() {
        println!("  Metadata:       {:?}", header.metadata);
    }

    println!();
    match &result.footer {
        Some(footer) => {
            println!("=== Footer ===");
            println!("  Records:        {}", footer.total_records);
            println!("  Data bytes:     {}", footer.data_bytes);
            println!("  Triggers:       {} .. {}", footer.first_trigger, footer.last_trigger);
            println!("  Checksum:       {:#018x}", footer.data_checksum);
            println!("  Complete:       {}", footer.is_complete());
        }
        None => println!("=== Footer === (missing)"),
    }

    println!();
    println!("Recoverable records: {}", result.recoverable_records);
    for error in &result.errors {
        println!("  - {}", error);
    }
    if result.is_valid {
        println!("\x1b[32m✓ File is valid\x1b[0m");
    } else if result.needs_recovery() {
        println!("\x1b[33m⚠ File is incomplete; {} records readable\x1b[0m", result.recoverable_records);
    } else {
        println!("\x1b[31m✗ File is corrupted\x1b[0m");
    }
    Ok(())
}
