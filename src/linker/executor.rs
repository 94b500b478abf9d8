//! Link executor: applies a `LinkPlan` in order, isolating per-action failures.
//!
//! For each action:
//! 1. Announce `(source, destination)` if enabled, before any mutation
//! 2. Unless dry-run: create missing parent directories of the destination
//! 3. Unless dry-run: hard-link source to destination
//! 4. Log `link_created` (flagged `dry_run` when nothing was touched) or `link_failed`
//!
//! A failed step is recorded as a `LinkFailure` and the next action runs.
//! Only a failure to write announce output aborts the run, since the trace
//! would otherwise be silently incomplete.

#![allow(missing_docs)]

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::errors::{HlrError, Result};
use crate::linker::planner::{LinkPlan, PlannedAction};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// Configuration for the link executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkerConfig {
    /// Report what would be linked without touching the filesystem.
    pub dry_run: bool,
    /// Print each action before executing it.
    pub announce: bool,
}

/// Which step of an action failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStage {
    CreateParent,
    Link,
}

impl fmt::Display for LinkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateParent => f.write_str("create parent directory"),
            Self::Link => f.write_str("create hard link"),
        }
    }
}

/// Failure classes. Cross-device failures are expected when a source tree
/// lives on another volume; the rest point at an unexpected problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CrossDevice,
    AlreadyExists,
    PermissionDenied,
    Other,
}

/// A single failed action.
#[derive(Debug, Clone, Serialize)]
pub struct LinkFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub stage: LinkStage,
    pub kind: FailureKind,
    pub error_code: String,
    pub message: String,
}

impl LinkFailure {
    pub const fn is_expected(&self) -> bool {
        matches!(self.kind, FailureKind::CrossDevice)
    }
}

/// Summary after a plan has been executed.
#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub planned: usize,
    /// Links created, or that would have been created in dry-run mode.
    pub linked: usize,
    pub failed: usize,
    pub dry_run: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub failures: Vec<LinkFailure>,
}

impl LinkReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn cross_device_failures(&self) -> usize {
        self.failures.iter().filter(|f| f.is_expected()).count()
    }
}

/// Executes planned actions sequentially in plan order.
pub struct Linker {
    config: LinkerConfig,
    logger: Option<ActivityLoggerHandle>,
}

impl Linker {
    pub fn new(config: LinkerConfig, logger: Option<ActivityLoggerHandle>) -> Self {
        Self { config, logger }
    }

    /// Execute every action in `plan`, writing announcements to `out`.
    pub fn execute<W: Write>(&self, plan: &LinkPlan, out: &mut W) -> Result<LinkReport> {
        let start = Instant::now();
        let mut report = LinkReport {
            planned: plan.len(),
            linked: 0,
            failed: 0,
            dry_run: self.config.dry_run,
            duration: Duration::ZERO,
            failures: Vec::new(),
        };

        for action in &plan.actions {
            if self.config.announce {
                announce(out, action).map_err(|e| HlrError::Io {
                    path: PathBuf::from("<stdout>"),
                    source: e,
                })?;
            }

            let outcome = if self.config.dry_run {
                Ok(())
            } else {
                link_one(action)
            };

            match outcome {
                Ok(()) => {
                    report.linked += 1;
                    self.log_event(ActivityEvent::LinkCreated {
                        source: action.source.to_string_lossy().to_string(),
                        destination: action.destination.to_string_lossy().to_string(),
                        dry_run: self.config.dry_run,
                    });
                }
                Err(failure) => {
                    report.failed += 1;
                    self.log_event(ActivityEvent::LinkFailed {
                        source: failure.source.to_string_lossy().to_string(),
                        destination: failure.destination.to_string_lossy().to_string(),
                        error_code: failure.error_code.clone(),
                        error_message: failure.message.clone(),
                    });
                    report.failures.push(failure);
                }
            }
        }

        if self.config.announce {
            out.flush().map_err(|e| HlrError::Io {
                path: PathBuf::from("<stdout>"),
                source: e,
            })?;
        }

        report.duration = start.elapsed();
        Ok(report)
    }

    fn log_event(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

fn announce<W: Write>(out: &mut W, action: &PlannedAction) -> io::Result<()> {
    writeln!(out, "Source Path: {}", action.source.display())?;
    writeln!(out, "Linked Path: {}", action.destination.display())
}

fn link_one(action: &PlannedAction) -> std::result::Result<(), LinkFailure> {
    if let Some(parent) = action.destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| failure(action, LinkStage::CreateParent, parent, e))?;
    }
    fs::hard_link(&action.source, &action.destination)
        .map_err(|e| failure(action, LinkStage::Link, &action.destination, e))
}

fn failure(action: &PlannedAction, stage: LinkStage, at: &Path, err: io::Error) -> LinkFailure {
    let kind = classify(&err);
    let error = match kind {
        FailureKind::CrossDevice => HlrError::CrossDevice {
            source_path: action.source.clone(),
            path: action.destination.clone(),
        },
        FailureKind::AlreadyExists => HlrError::AlreadyExists {
            path: at.to_path_buf(),
        },
        FailureKind::PermissionDenied => HlrError::PermissionDenied {
            path: at.to_path_buf(),
        },
        FailureKind::Other => HlrError::io(at, err),
    };
    LinkFailure {
        source: action.source.clone(),
        destination: action.destination.clone(),
        stage,
        kind,
        error_code: error.code().to_string(),
        message: format!("{stage}: {error}"),
    }
}

fn classify(err: &io::Error) -> FailureKind {
    if is_cross_device(err) {
        return FailureKind::CrossDevice;
    }
    match err.kind() {
        io::ErrorKind::AlreadyExists => FailureKind::AlreadyExists,
        io::ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
        _ => FailureKind::Other,
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }
    #[cfg(not(unix))]
    {
        err.kind() == io::ErrorKind::CrossesDevices
    }
}

#[allow(clippy::cast_possible_truncation)]
fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::logger::activity::{ActivityLoggerConfig, spawn_logger};
    use crate::logger::jsonl::JsonlConfig;
    use crate::scanner::index::FileId;
    use std::os::unix::fs::MetadataExt;
    use tempfile::TempDir;

    fn action(source: PathBuf, destination: PathBuf) -> PlannedAction {
        PlannedAction {
            id: FileId::new(0, 0),
            source,
            destination,
        }
    }

    fn plan(actions: Vec<PlannedAction>) -> LinkPlan {
        LinkPlan {
            actions,
            already_present: 0,
        }
    }

    #[test]
    fn creates_parents_and_hard_links() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src").join("x");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, b"payload").unwrap();
        let dst = tmp.path().join("dst").join("deep").join("x");

        let linker = Linker::new(LinkerConfig::default(), None);
        let mut out = Vec::new();
        let report = linker
            .execute(&plan(vec![action(src.clone(), dst.clone())]), &mut out)
            .unwrap();

        assert_eq!(report.linked, 1);
        assert!(!report.has_failures());
        assert!(out.is_empty(), "announce disabled");
        let src_meta = fs::metadata(&src).unwrap();
        assert_eq!(fs::metadata(&dst).unwrap().ino(), src_meta.ino());
        assert_eq!(src_meta.nlink(), 2);
    }

    #[test]
    fn dry_run_announces_without_mutation() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("x");
        fs::write(&src, b"payload").unwrap();
        let dst = tmp.path().join("out").join("x");

        let linker = Linker::new(
            LinkerConfig {
                dry_run: true,
                announce: true,
            },
            None,
        );
        let mut out = Vec::new();
        let report = linker
            .execute(&plan(vec![action(src.clone(), dst.clone())]), &mut out)
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.linked, 1);
        assert!(!dst.exists());
        assert!(!tmp.path().join("out").exists());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!(
                "Source Path: {}\nLinked Path: {}\n",
                src.display(),
                dst.display()
            )
        );
    }

    #[test]
    fn dry_run_logs_would_be_links() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("x");
        fs::write(&src, b"payload").unwrap();
        let dst = tmp.path().join("out").join("x");
        let log = tmp.path().join("activity.jsonl");

        let (handle, join) =
            spawn_logger(ActivityLoggerConfig::new(JsonlConfig::new(&log))).unwrap();
        let linker = Linker::new(
            LinkerConfig {
                dry_run: true,
                announce: false,
            },
            Some(handle.clone()),
        );
        linker
            .execute(&plan(vec![action(src.clone(), dst.clone())]), &mut io::sink())
            .unwrap();
        drop(linker);
        handle.shutdown();
        join.join().unwrap();

        let contents = fs::read_to_string(&log).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["event"], "link_created");
        assert_eq!(lines[0]["dry_run"], true);
        assert_eq!(lines[0]["dest"], dst.to_string_lossy().as_ref());
        assert!(!dst.exists());
    }

    #[test]
    fn failure_does_not_stop_later_actions() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good");
        fs::write(&good, b"g").unwrap();
        let missing = tmp.path().join("missing");
        let taken = tmp.path().join("dst").join("taken");
        fs::create_dir_all(taken.parent().unwrap()).unwrap();
        fs::write(&taken, b"other inode").unwrap();

        let linker = Linker::new(LinkerConfig::default(), None);
        let report = linker
            .execute(
                &plan(vec![
                    action(missing.clone(), tmp.path().join("dst").join("m")),
                    action(good.clone(), taken.clone()),
                    action(good.clone(), tmp.path().join("dst").join("ok")),
                ]),
                &mut io::sink(),
            )
            .unwrap();

        assert_eq!(report.planned, 3);
        assert_eq!(report.linked, 1);
        assert_eq!(report.failed, 2);
        assert!(tmp.path().join("dst").join("ok").exists());

        assert_eq!(report.failures[0].source, missing);
        assert_eq!(report.failures[0].stage, LinkStage::Link);
        assert_eq!(report.failures[0].kind, FailureKind::Other);
        assert_eq!(report.failures[0].error_code, "HLR-3002");

        assert_eq!(report.failures[1].destination, taken);
        assert_eq!(report.failures[1].kind, FailureKind::AlreadyExists);
        assert_eq!(report.failures[1].error_code, "HLR-3004");
        assert!(!report.failures[1].is_expected());
    }

    #[test]
    fn parent_creation_failure_is_recorded() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("x");
        fs::write(&src, b"x").unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"file where a directory is needed").unwrap();

        let report = Linker::new(LinkerConfig::default(), None)
            .execute(
                &plan(vec![action(src, blocker.join("sub").join("x"))]),
                &mut io::sink(),
            )
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].stage, LinkStage::CreateParent);
        assert!(report.failures[0].message.starts_with("create parent directory"));
    }

    #[test]
    fn classifies_cross_device_errors() {
        let exdev = io::Error::from_raw_os_error(libc::EXDEV);
        assert_eq!(classify(&exdev), FailureKind::CrossDevice);
        assert_eq!(
            classify(&io::Error::from(io::ErrorKind::AlreadyExists)),
            FailureKind::AlreadyExists
        );
        assert_eq!(
            classify(&io::Error::from(io::ErrorKind::PermissionDenied)),
            FailureKind::PermissionDenied
        );
        assert_eq!(classify(&io::Error::other("boom")), FailureKind::Other);
    }

    #[test]
    fn report_serializes_failures() {
        let report = LinkReport {
            planned: 1,
            linked: 0,
            failed: 1,
            dry_run: false,
            duration: Duration::from_millis(12),
            failures: vec![LinkFailure {
                source: PathBuf::from("/a/x"),
                destination: PathBuf::from("/b/x"),
                stage: LinkStage::Link,
                kind: FailureKind::CrossDevice,
                error_code: "HLR-3003".to_string(),
                message: "create hard link: cross-device".to_string(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duration"], 12);
        assert_eq!(json["failures"][0]["kind"], "cross_device");
        assert_eq!(json["failures"][0]["stage"], "link");
        assert_eq!(report.cross_device_failures(), 1);
    }
}
