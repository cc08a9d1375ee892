use anyhow::Result;
use clap::Parser;
use confluence_export::attachments::RestoreConfig;
use confluence_export::convert::{convert, Conversion, ConvertOptions};
use confluence_export::output::{write_json, WriteOutcome};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "confluence-export")]
#[command(about = "Convert a Confluence XML export to JSON and restore attachments")]
struct Cli {
    /// The Confluence XML export to read (e.g. entities.xml)
    input_file: PathBuf,

    /// Output JSON file
    #[arg(short, long, default_value = confluence_export::config::DEFAULT_OUTPUT_FILE)]
    output: PathBuf,

    /// Directory holding the attachments exported from Confluence
    #[arg(short, long)]
    attachments_dir: Option<PathBuf>,

    /// Directory to restore attachments into
    #[arg(short, long, requires = "attachments_dir")]
    restore_dir: Option<PathBuf>,

    /// Print per-stage and per-item diagnostics
    #[arg(long)]
    debug: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(cli: Cli) -> Result<()> {
    let restore = match (cli.attachments_dir, cli.restore_dir) {
        (Some(attachments_dir), Some(restore_dir)) => {
            Some(RestoreConfig::new(attachments_dir, restore_dir))
        }
        (Some(attachments_dir), None) => {
            debug!(
                attachments_dir = %attachments_dir.display(),
                "No restore directory given, attachments will not be copied"
            );
            None
        }
        _ => None,
    };
    let restoring = restore.is_some();

    let options = ConvertOptions {
        input: cli.input_file,
        restore,
        show_progress: std::io::stderr().is_terminal(),
    };

    let start_converting = Instant::now();
    let conversion = convert(&options)?;
    let conversion_duration = start_converting.elapsed();

    let start_writing = Instant::now();
    let outcome = write_json(&conversion.records, &cli.output)?;
    let writing_duration = start_writing.elapsed();

    match outcome {
        WriteOutcome::Empty => {
            println!("No content found for processing, so no file was written.");
        }
        WriteOutcome::Written { records } => {
            println!("Saved {} content records to '{}'.", records, cli.output.display());
        }
    }

    let timings = Timings {
        conversion: conversion_duration,
        writing: writing_duration,
    };
    write_summary(&mut std::io::stdout().lock(), &conversion, &timings, restoring)?;

    Ok(())
}

struct Timings {
    conversion: Duration,
    writing: Duration,
}

fn write_summary(
    out: &mut impl Write,
    conversion: &Conversion,
    timings: &Timings,
    restoring: bool,
) -> io::Result<()> {
    let stats = &conversion.stats;
    let index = &conversion.index;
    writeln!(out)?;
    writeln!(out, "=== Summary ===")?;
    writeln!(
        out,
        "Conversion time:    {:.2}s",
        timings.conversion.as_secs_f64()
    )?;
    writeln!(out, "Write time:         {:.2}s", timings.writing.as_secs_f64())?;
    writeln!(out)?;
    writeln!(out, "Objects found:      {}", stats.objects_classified())?;
    writeln!(out, "Users:              {}", index.users)?;
    writeln!(out, "Body contents:      {}", index.bodies)?;
    writeln!(out, "Labels:             {}", index.labels)?;
    writeln!(out, "Labellings:         {}", index.labellings)?;
    writeln!(out, "Content properties: {}", index.properties)?;
    writeln!(out, "Content records:    {}", stats.content_records())?;
    writeln!(out, "Orphan attachments: {}", stats.attachments_skipped())?;
    if restoring {
        writeln!(out, "Restored files:     {}", stats.attachments_restored())?;
        writeln!(out, "Missing sources:    {}", stats.attachments_missing())?;
        writeln!(out, "Failed restores:    {}", stats.restore_failures())?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match (cli.debug, cli.verbose) {
        (_, 2..) => LevelFilter::TRACE,
        (true, _) | (_, 1) => LevelFilter::DEBUG,
        _ => LevelFilter::INFO,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    match run(cli) {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
