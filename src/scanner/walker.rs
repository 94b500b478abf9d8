//! Directory scanner: streams `(path, identity)` pairs for every non-directory
//! entry under a list of roots.
//!
//! Each root is walked depth-first with directory entries sorted by name, so
//! two scans of an unchanged tree yield the same sequence. Symlinks are not
//! followed below the root; a symlink is reported with its own identity.
//!
//! Any I/O error inside a root ends the scan: the error is sent down the
//! stream wrapped with the root and failing path, and nothing after it is
//! produced. Callers treat that as fatal for the run.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel as channel;

use crate::core::errors::{HlrError, Result};
use crate::scanner::index::FileId;

/// Capacity of the bounded entry channel between walker thread and consumer.
const SCAN_CHANNEL_CAPACITY: usize = 4096;

/// Kind of entry emitted by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Symlink,
}

/// A single file discovered during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// Root the file was found under, as configured.
    pub root: PathBuf,
    /// Full path of the file (root joined with its relative path).
    pub path: PathBuf,
    pub id: FileId,
    pub kind: EntryKind,
}

/// Receiving half of a running scan. Yields entries in walk order and ends
/// after the last root or after the first error.
///
/// When the channel closes the walker thread is joined; if it panicked the
/// stream yields one final error so a truncated walk is never mistaken for
/// a complete one.
pub struct ScanStream {
    rx: channel::Receiver<Result<ScanEntry>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Iterator for ScanStream {
    type Item = Result<ScanEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Ok(item) = self.rx.recv() {
            return Some(item);
        }
        match self.worker.take()?.join() {
            Ok(()) => None,
            Err(_) => Some(Err(HlrError::Runtime {
                details: "scanner thread panicked before finishing the walk".to_string(),
            })),
        }
    }
}

/// Sequential, deterministic walker over an ordered list of roots.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    roots: Vec<PathBuf>,
}

/// Pending walk item: a path and whether it is a directory to descend into.
type WorkItem = (PathBuf, bool);

impl DirectoryScanner {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Walk every root and collect all entries, stopping at the first error.
    pub fn scan(&self) -> Result<Vec<ScanEntry>> {
        self.stream()?.collect()
    }

    /// Start the walk on a background thread and return the entry stream.
    ///
    /// Dropping the stream early stops the walker at its next send.
    pub fn stream(&self) -> Result<ScanStream> {
        let (tx, rx) = channel::bounded::<Result<ScanEntry>>(SCAN_CHANNEL_CAPACITY);
        let roots = self.roots.clone();

        let worker = thread::Builder::new()
            .name("hlr-scan".to_string())
            .spawn(move || {
                for root in &roots {
                    if let Err(err) = walk_root(root, &tx) {
                        let _ = tx.send(Err(err));
                        return;
                    }
                }
            })
            .map_err(|e| HlrError::Runtime {
                details: format!("failed to spawn scanner thread: {e}"),
            })?;

        Ok(ScanStream {
            rx,
            worker: Some(worker),
        })
    }
}

/// Walk one root depth-first in name order, sending each file to `tx`.
///
/// Returns `Ok(())` early if the receiver has gone away.
fn walk_root(root: &Path, tx: &channel::Sender<Result<ScanEntry>>) -> Result<()> {
    let meta = fs::metadata(root).map_err(|e| HlrError::scan(root, root, e))?;
    if !meta.is_dir() {
        return Err(HlrError::NotADirectory {
            root: root.to_path_buf(),
        });
    }

    // Stack holds children in reverse name order so pops come out sorted.
    let mut stack: Vec<WorkItem> = Vec::new();
    push_children(root, root, &mut stack)?;

    while let Some((path, is_dir)) = stack.pop() {
        if is_dir {
            push_children(root, &path, &mut stack)?;
            continue;
        }

        let meta = fs::symlink_metadata(&path).map_err(|e| HlrError::scan(root, &path, e))?;
        let kind = if meta.file_type().is_symlink() {
            EntryKind::Symlink
        } else if meta.is_file() {
            EntryKind::File
        } else {
            // FIFOs, sockets, and device nodes cannot be meaningfully mirrored.
            continue;
        };

        let entry = ScanEntry {
            root: root.to_path_buf(),
            id: file_id(&meta)?,
            path,
            kind,
        };
        if tx.send(Ok(entry)).is_err() {
            return Ok(());
        }
    }

    Ok(())
}

fn push_children(root: &Path, dir: &Path, stack: &mut Vec<WorkItem>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| HlrError::scan(root, dir, e))?;

    let mut children: Vec<WorkItem> = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| HlrError::scan(root, dir, e))?;
        let child_path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| HlrError::scan(root, &child_path, e))?;
        children.push((child_path, file_type.is_dir()));
    }

    children.sort_by(|a, b| b.0.file_name().cmp(&a.0.file_name()));
    stack.extend(children);
    Ok(())
}

/// Extract `(device, inode)` identity from `fs::Metadata`.
fn file_id(meta: &fs::Metadata) -> Result<FileId> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        Ok(FileId::new(meta.dev(), meta.ino()))
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        Err(HlrError::UnsupportedPlatform {
            details: "inode identity requires a unix filesystem".to_string(),
        })
    }
}
