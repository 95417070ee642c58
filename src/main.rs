//! FileForge: batch file conversion from the command line.
//!
//! Loads configuration, initializes logging and runs the selected command
//! against the conversion engine.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use fileforge_core::config::{AppConfig, LoggingConfig};
use fileforge_core::types::{ImageOptions, SourceFile, quality_from_percent};
use fileforge_worker::{BatchOrchestrator, BatchReport, ExecutionMode};

mod cli;
mod output;

use cli::{Cli, Commands, ConvertArgs};
use output::OutputFormat;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);

    if let Err(e) = run(cli, config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

async fn run(cli: Cli, mut config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Formats => {
            output::print_list(&output::format_rows(), cli.format);
            Ok(())
        }
        Commands::Convert(args) => {
            if let Some(workers) = args.workers {
                config.pool.max_workers = Some(workers);
            }
            if args.inline {
                config.pool.inline_fallback = true;
            }
            convert(args, config, cli.format).await
        }
    }
}

async fn convert(args: ConvertArgs, config: AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    if !args.category.supports_output(&args.to) {
        bail!(
            "'{}' is not an output format for {} files (expected one of: {})",
            args.to,
            args.category,
            args.category.output_formats().join(", ")
        );
    }

    let options = args
        .options
        .as_deref()
        .map(serde_json::from_str::<ImageOptions>)
        .transpose()
        .context("Invalid --options JSON")?;
    let quality = quality_from_percent(args.quality.unwrap_or(config.image.default_quality));

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(read_source(path).await?);
    }

    tracing::info!("Starting FileForge v{}", env!("CARGO_PKG_VERSION"));
    let orchestrator = BatchOrchestrator::from_config(&config);
    let watcher = spawn_progress_logger(&orchestrator);

    let report = orchestrator
        .convert_batch(files, args.category, &args.to, quality, options)
        .await;

    watcher.abort();
    if let ExecutionMode::Pool(pool) = orchestrator.mode() {
        tracing::debug!(
            "Pool metrics: {}",
            serde_json::to_string(&pool.metrics()).unwrap_or_default()
        );
        pool.terminate().await;
    }

    let written = write_outputs(&report, &args.out_dir).await?;
    output::print_list(&output::file_rows(&report, &written), format);

    if !report.failed.is_empty() {
        bail!(
            "{} of {} file(s) failed to convert",
            report.failed.len(),
            report.total()
        );
    }
    Ok(())
}

async fn read_source(path: &Path) -> anyhow::Result<SourceFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceFile::new(name, bytes))
}

/// Log board changes at debug level until aborted.
fn spawn_progress_logger(orchestrator: &BatchOrchestrator) -> tokio::task::JoinHandle<()> {
    let board = orchestrator.board().clone();
    let mut changes = board.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let summary = board.summary();
            tracing::debug!(
                "Progress: {}/{} finished ({} converting, {} failed)",
                summary.finished(),
                summary.total(),
                summary.converting,
                summary.error
            );
        }
    })
}

/// Save every converted blob under `out_dir`, returning the written paths in
/// the order of `report.converted`.
async fn write_outputs(report: &BatchReport, out_dir: &Path) -> anyhow::Result<Vec<String>> {
    if report.converted.is_empty() {
        return Ok(Vec::new());
    }
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create '{}'", out_dir.display()))?;

    let mut taken = HashSet::new();
    let mut written = Vec::with_capacity(report.converted.len());
    for converted in &report.converted {
        let path = unique_path(out_dir, &converted.output_name, &mut taken);
        tokio::fs::write(&path, &converted.blob.bytes)
            .await
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        tracing::info!("Wrote {} ({} bytes)", path.display(), converted.blob.len());
        written.push(path.display().to_string());
    }
    Ok(written)
}

/// `out_dir/name`, or `out_dir/stem-N.ext` if that name was already used in
/// this run.
fn unique_path(out_dir: &Path, name: &str, taken: &mut HashSet<String>) -> PathBuf {
    if taken.insert(name.to_string()) {
        return out_dir.join(name);
    }
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    let mut n = 2;
    loop {
        let candidate = if ext.is_empty() {
            format!("{stem}-{n}")
        } else {
            format!("{stem}-{n}.{ext}")
        };
        if taken.insert(candidate.clone()) {
            return out_dir.join(candidate);
        }
        n += 1;
    }
}
