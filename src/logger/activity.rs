//! Activity logger: a dedicated thread owns the `JsonlWriter`; the scanner,
//! linker, and orchestrator send `ActivityEvent`s through a bounded crossbeam
//! channel. `try_send()` keeps the link loop from ever blocking on logging.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{HlrError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;

/// Events emitted during a reconcile run.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    RunStarted {
        config_hash: String,
        dry_run: bool,
    },
    ScanCompleted {
        forest: &'static str,
        roots: usize,
        files: usize,
        inodes: usize,
        duration_ms: u64,
    },
    PlanCompleted {
        planned: usize,
        already_present: usize,
    },
    LinkCreated {
        source: String,
        destination: String,
        dry_run: bool,
    },
    LinkFailed {
        source: String,
        destination: String,
        error_code: String,
        error_message: String,
    },
    RunCompleted {
        linked: usize,
        failed: usize,
        duration_ms: u64,
    },
    Error {
        code: String,
        message: String,
    },
    Shutdown,
}

/// Cloneable handle for sending log events to the logger thread.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event without blocking. Events are dropped and counted when the
    /// channel is full.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Blocks until the request is queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

/// Options for building the activity logger.
pub struct ActivityLoggerConfig {
    pub jsonl_config: JsonlConfig,
    pub channel_capacity: usize,
}

impl ActivityLoggerConfig {
    pub fn new(jsonl_config: JsonlConfig) -> Self {
        Self {
            jsonl_config,
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

/// Spawn the logger thread and return a handle plus its join handle.
///
/// The thread runs until `shutdown()` is called or every handle is dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("hlr-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config.jsonl_config, &dropped_clone))
        .map_err(|e| HlrError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, jsonl_config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.sync();
}

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::RunStarted {
            config_hash,
            dry_run,
        } => {
            let mut e = LogEntry::new(EventType::RunStart, Severity::Info);
            e.dry_run = Some(*dry_run);
            e.details = Some(format!(
                "version={} config_hash={config_hash}",
                env!("CARGO_PKG_VERSION")
            ));
            e
        }
        ActivityEvent::ScanCompleted {
            forest,
            roots,
            files,
            inodes,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::ScanComplete, Severity::Info);
            e.count = Some(*inodes as u64);
            e.duration_ms = Some(*duration_ms);
            e.details = Some(format!("forest={forest} roots={roots} files={files}"));
            e
        }
        ActivityEvent::PlanCompleted {
            planned,
            already_present,
        } => {
            let mut e = LogEntry::new(EventType::PlanComplete, Severity::Info);
            e.count = Some(*planned as u64);
            e.details = Some(format!("already_present={already_present}"));
            e
        }
        ActivityEvent::LinkCreated {
            source,
            destination,
            dry_run,
        } => {
            let mut e = LogEntry::new(EventType::LinkCreated, Severity::Info);
            e.path = Some(source.clone());
            e.dest = Some(destination.clone());
            e.ok = Some(true);
            e.dry_run = Some(*dry_run);
            e
        }
        ActivityEvent::LinkFailed {
            source,
            destination,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::LinkFailed, Severity::Warning);
            e.path = Some(source.clone());
            e.dest = Some(destination.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::RunCompleted {
            linked,
            failed,
            duration_ms,
        } => {
            let severity = if *failed > 0 {
                Severity::Warning
            } else {
                Severity::Info
            };
            let mut e = LogEntry::new(EventType::RunComplete, severity);
            e.count = Some(*linked as u64);
            e.ok = Some(*failed == 0);
            e.duration_ms = Some(*duration_ms);
            e.details = Some(format!("failed={failed}"));
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        // Never converted; handled in the thread loop.
        ActivityEvent::Shutdown => LogEntry::new(EventType::RunComplete, Severity::Info),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> ActivityLoggerConfig {
        ActivityLoggerConfig {
            jsonl_config: JsonlConfig::new(dir.join("activity.jsonl")),
            channel_capacity: 64,
        }
    }

    #[test]
    fn spawn_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path())).unwrap();
        handle.send(ActivityEvent::RunStarted {
            config_hash: "abc".to_string(),
            dry_run: true,
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
        assert!(contents.contains("run_start"));
        assert!(contents.contains("config_hash=abc"));
    }

    #[test]
    fn link_events_keep_paths_and_codes() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path())).unwrap();
        handle.send(ActivityEvent::LinkCreated {
            source: "/src/a".to_string(),
            destination: "/dst/a".to_string(),
            dry_run: false,
        });
        handle.send(ActivityEvent::LinkFailed {
            source: "/src/b".to_string(),
            destination: "/dst/b".to_string(),
            error_code: "HLR-3003".to_string(),
            error_message: "cross-device".to_string(),
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "link_created");
        assert_eq!(lines[0]["dest"], "/dst/a");
        assert_eq!(lines[1]["event"], "link_failed");
        assert_eq!(lines[1]["severity"], "warning");
        assert_eq!(lines[1]["error_code"], "HLR-3003");
    }

    #[test]
    fn handle_is_cloneable_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path())).unwrap();
        let h2 = handle.clone();
        thread::spawn(move || {
            h2.send(ActivityEvent::PlanCompleted {
                planned: 3,
                already_present: 1,
            });
        })
        .join()
        .unwrap();
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
        assert!(contents.contains("plan_complete"));
        assert_eq!(handle.dropped_events(), 0);
    }

    #[test]
    fn thread_exits_when_all_handles_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path())).unwrap();
        drop(handle);
        join.join().unwrap();
    }
}
