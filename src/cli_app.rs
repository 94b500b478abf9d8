//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use hardlink_reconciler::core::config::{Config, ConfigOverrides};
use hardlink_reconciler::core::errors::HlrError;
use hardlink_reconciler::core::paths::split_path_list;
use hardlink_reconciler::engine::orchestrator::{Reconciler, RunSummary};
use hardlink_reconciler::logger::activity::{
    ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger,
};
use hardlink_reconciler::logger::jsonl::JsonlConfig;

/// Hardlink Reconciler: hard-link source files missing from a destination, by inode.
#[derive(Debug, Parser)]
#[command(
    name = "hlr",
    author,
    version,
    about = "Hardlink Reconciler - mirror source trees into a destination by inode identity",
    long_about = None
)]
pub struct Cli {
    /// Comma-separated list of source directories.
    #[arg(long, alias = "src_dirs", value_name = "DIRS")]
    src_dirs: Option<String>,
    /// Comma-separated list of extra destination directories to check for existing inodes.
    #[arg(long, alias = "dst_dirs", value_name = "DIRS")]
    dst_dirs: Option<String>,
    /// Main destination directory; links are created here.
    #[arg(long, value_name = "DIR")]
    dest: Option<PathBuf>,
    /// Print each planned link ("Source Path:" / "Linked Path:") before executing it.
    #[arg(long)]
    output: bool,
    /// Scan and plan only; do not create directories or links.
    #[arg(long)]
    dry: bool,
    /// Walk source and destination trees one after the other instead of concurrently.
    #[arg(long)]
    sequential: bool,
    /// Append JSONL activity records to this file.
    #[arg(long, value_name = "PATH")]
    activity_log: Option<PathBuf>,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input (missing or malformed arguments).
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure, including any scan failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Run completed but some link actions failed.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<HlrError> for CliError {
    fn from(err: HlrError) -> Self {
        match err {
            HlrError::InvalidConfig { .. } => Self::User(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Resolve configuration, run one reconcile pass, and report the outcome.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref(), &overrides_from(cli))?;
    if cli.verbose {
        eprintln!(
            "[HLR-CLI] sources={:?} destinations={:?} dest={:?} dry_run={}",
            config.link.sources,
            config.link.destinations,
            config.primary_destination(),
            config.link.dry_run,
        );
    }

    let logger = match &config.paths.activity_log {
        Some(path) => Some(spawn_logger(ActivityLoggerConfig::new(JsonlConfig::new(
            path,
        )))?),
        None => None,
    };
    let handle: Option<ActivityLoggerHandle> = logger.as_ref().map(|(h, _)| h.clone());

    let result = Reconciler::new(config, handle).and_then(|reconciler| {
        let mut stdout = io::stdout().lock();
        reconciler.run(&mut stdout)
    });

    let logger_ok = logger.is_none_or(|(handle, join)| {
        if cli.verbose && handle.dropped_events() > 0 {
            eprintln!(
                "[HLR-LOGGER] {} activity events dropped under back-pressure",
                handle.dropped_events()
            );
        }
        handle.shutdown();
        drop(handle);
        join.join().is_ok()
    });

    let summary = result?;
    if !logger_ok {
        return Err(CliError::Internal(
            "activity logger thread panicked".to_string(),
        ));
    }
    emit_summary(cli, &summary)?;

    if summary.has_failures() {
        return Err(CliError::Partial(format!(
            "{} of {} link actions failed",
            summary.report.failed, summary.report.planned
        )));
    }
    Ok(())
}

fn overrides_from(cli: &Cli) -> ConfigOverrides {
    ConfigOverrides {
        sources: cli.src_dirs.as_deref().map(split_path_list),
        destinations: cli.dst_dirs.as_deref().map(split_path_list),
        primary_destination: cli.dest.clone(),
        announce: cli.output,
        dry_run: cli.dry,
        sequential_scan: cli.sequential,
        activity_log: cli.activity_log.clone(),
    }
}

fn emit_summary(cli: &Cli, summary: &RunSummary) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Json => {
            let payload = json!({
                "command": "reconcile",
                "ok": !summary.has_failures(),
                "summary": serde_json::to_value(summary)?,
            });
            write_json_line(&payload)?;
        }
        OutputMode::Human => {
            // stdout carries only the announce trace; the summary goes to stderr.
            let mut err = io::stderr().lock();
            if !cli.quiet {
                writeln!(err, "{}", render_human_summary(summary))?;
            }
            for failure in &summary.report.failures {
                let label = if failure.is_expected() {
                    "cross-device".yellow()
                } else {
                    "failed".red()
                };
                writeln!(
                    err,
                    "  {label} {} -> {}\n    [{}] {}",
                    failure.source.display(),
                    failure.destination.display(),
                    failure.error_code,
                    failure.message
                )?;
            }
        }
    }
    Ok(())
}

fn render_human_summary(summary: &RunSummary) -> String {
    let report = &summary.report;
    let verb = if report.dry_run {
        "would link"
    } else {
        "linked"
    };
    let headline = if report.has_failures() {
        format!(
            "{verb} {} of {} files, {} failed ({} cross-device)",
            report.linked,
            report.planned,
            report.failed,
            report.cross_device_failures()
        )
        .yellow()
        .bold()
    } else {
        format!("{verb} {} files", report.linked).green().bold()
    };

    format!(
        "{headline}\n  source:      {} files, {} inodes ({} aliases) in {} roots\n  destination: {} inodes in {} roots\n  already present: {}\n  elapsed: {:.1}s",
        summary.source.files,
        summary.source.inodes,
        summary.source.aliases,
        summary.source.roots.len(),
        summary.destination.inodes,
        summary.destination.roots.len(),
        summary.already_present,
        (summary.source.duration.max(summary.destination.duration) + report.duration)
            .as_secs_f64(),
    )
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("HLR_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Human,
    }
}
