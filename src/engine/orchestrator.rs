//! Orchestrator: scan source → scan destination → plan → link.
//!
//! Scan errors end the run before any link is attempted, since an incomplete
//! destination index would cause files to be linked twice. Link-phase
//! failures are carried in the returned summary instead.

#![allow(missing_docs)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::{HlrError, Result};
use crate::linker::executor::{LinkReport, Linker, LinkerConfig};
use crate::linker::planner::{LinkPlan, LinkPlanner};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scanner::index::InodeIndex;
use crate::scanner::walker::DirectoryScanner;

/// Statistics for one scanned forest.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScanSummary {
    pub roots: Vec<PathBuf>,
    /// Directory entries indexed, hard-linked aliases included.
    pub files: usize,
    /// Distinct `(device, inode)` identities.
    pub inodes: usize,
    pub aliases: usize,
    #[serde(skip)]
    pub duration: Duration,
}

/// Everything a caller needs to report on a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: ScanSummary,
    pub destination: ScanSummary,
    pub already_present: usize,
    pub report: LinkReport,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.report.has_failures()
    }
}

/// Both indices of a run, built once and read-only afterward.
pub struct ScannedForests {
    pub source: InodeIndex,
    pub destination: InodeIndex,
    pub source_summary: ScanSummary,
    pub destination_summary: ScanSummary,
}

/// Wires a validated [`Config`] through the scanner, planner, and linker.
pub struct Reconciler {
    config: Config,
    primary_destination: PathBuf,
    logger: Option<ActivityLoggerHandle>,
}

impl Reconciler {
    /// Validate the configuration up front so a bad config never triggers I/O.
    pub fn new(config: Config, logger: Option<ActivityLoggerHandle>) -> Result<Self> {
        config.validate()?;
        let primary_destination = config
            .primary_destination()
            .map(Path::to_path_buf)
            .ok_or_else(|| HlrError::InvalidConfig {
                details: "missing required argument dest".to_string(),
            })?;
        Ok(Self {
            config,
            primary_destination,
            logger,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the source and destination indices.
    ///
    /// The destination forest is every extra destination root plus the
    /// primary destination. When `scan.parallel` is set the two forests are
    /// walked concurrently; each is still walked in deterministic order.
    pub fn scan(&self) -> Result<ScannedForests> {
        let source_roots = self.config.link.sources.clone();
        let destination_roots = self.config.destination_roots();

        let (source, destination) = if self.config.scan.parallel {
            thread::scope(|s| {
                let src = s.spawn(|| scan_forest(&source_roots));
                let dst = s.spawn(|| scan_forest(&destination_roots));
                let src = join_scan(src);
                let dst = join_scan(dst);
                (src, dst)
            })
        } else {
            let src = scan_forest(&source_roots);
            let dst = match &src {
                Ok(_) => scan_forest(&destination_roots),
                Err(_) => Err(HlrError::Runtime {
                    details: "destination scan skipped after source scan failure".to_string(),
                }),
            };
            (src, dst)
        };

        // Source failure is reported first, matching sequential order.
        let (source, source_summary) = source.inspect_err(|e| self.log_error(e))?;
        let (destination, destination_summary) = destination.inspect_err(|e| self.log_error(e))?;

        self.log_scan("source", &source_summary);
        self.log_scan("destination", &destination_summary);

        Ok(ScannedForests {
            source,
            destination,
            source_summary,
            destination_summary,
        })
    }

    /// Plan against already-built indices.
    pub fn plan(&self, forests: &ScannedForests) -> LinkPlan {
        let plan = LinkPlanner::new(self.primary_destination.clone())
            .plan(&forests.source, &forests.destination);
        self.log_event(ActivityEvent::PlanCompleted {
            planned: plan.len(),
            already_present: plan.already_present,
        });
        plan
    }

    /// Run the whole pipeline, writing announce output to `out`.
    pub fn run<W: Write>(&self, out: &mut W) -> Result<RunSummary> {
        let start = Instant::now();
        self.log_event(ActivityEvent::RunStarted {
            config_hash: self.config.stable_hash()?,
            dry_run: self.config.link.dry_run,
        });

        let forests = self.scan()?;
        let plan = self.plan(&forests);

        let linker = Linker::new(
            LinkerConfig {
                dry_run: self.config.link.dry_run,
                announce: self.config.link.announce,
            },
            self.logger.clone(),
        );
        let report = linker.execute(&plan, out)?;

        #[allow(clippy::cast_possible_truncation)]
        self.log_event(ActivityEvent::RunCompleted {
            linked: report.linked,
            failed: report.failed,
            duration_ms: start.elapsed().as_millis() as u64,
        });

        Ok(RunSummary {
            source: forests.source_summary,
            destination: forests.destination_summary,
            already_present: plan.already_present,
            report,
        })
    }

    fn log_scan(&self, forest: &'static str, summary: &ScanSummary) {
        #[allow(clippy::cast_possible_truncation)]
        self.log_event(ActivityEvent::ScanCompleted {
            forest,
            roots: summary.roots.len(),
            files: summary.files,
            inodes: summary.inodes,
            duration_ms: summary.duration.as_millis() as u64,
        });
    }

    fn log_error(&self, err: &HlrError) {
        self.log_event(ActivityEvent::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }

    fn log_event(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

fn scan_forest(roots: &[PathBuf]) -> Result<(InodeIndex, ScanSummary)> {
    let start = Instant::now();
    let index = InodeIndex::build(&DirectoryScanner::new(roots.to_vec()))?;
    let summary = ScanSummary {
        roots: roots.to_vec(),
        files: index.files_seen(),
        inodes: index.len(),
        aliases: index.alias_count(),
        duration: start.elapsed(),
    };
    Ok((index, summary))
}

fn join_scan<T>(handle: thread::ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle.join().unwrap_or_else(|_| {
        Err(HlrError::Runtime {
            details: "scanner thread panicked".to_string(),
        })
    })
}
