//! Inode index: maps filesystem identity to the first path observed for it.
//!
//! Identity is the `(device, inode)` pair. Inode numbers are only unique
//! within one device, so keying by inode alone would equate unrelated files
//! that live on different volumes.
//!
//! Collision policy: the first record observed for an identity is kept and
//! later aliases are counted but not stored. Scan order is deterministic
//! (roots in configured order, entries sorted by name), so the surviving
//! alias is stable across runs. The planner only needs presence, not a
//! specific alias.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::errors::{HlrError, Result};
use crate::scanner::walker::{DirectoryScanner, ScanEntry};

/// Filesystem identity of one physical file object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId {
    pub device: u64,
    pub inode: u64,
}

impl FileId {
    pub const fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.inode)
    }
}

/// Where an indexed identity was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeRecord {
    root: PathBuf,
    relative: PathBuf,
}

impl InodeRecord {
    /// Root directory the file was found under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file relative to its root.
    pub fn relative_path(&self) -> &Path {
        &self.relative
    }

    /// Full path of the file.
    pub fn absolute_path(&self) -> PathBuf {
        self.root.join(&self.relative)
    }
}

/// Result of adding an observation to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// First time this identity was seen.
    Inserted,
    /// The identity was already indexed under another path; the existing record is kept.
    Alias,
}

/// Identity-keyed index built from one directory forest.
#[derive(Debug, Default, Clone)]
pub struct InodeIndex {
    records: HashMap<FileId, InodeRecord>,
    files_seen: usize,
    aliases: usize,
}

impl InodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain a scanner into a fresh index.
    ///
    /// Aborts on the first scan error; a partially built index is never returned.
    pub fn build(scanner: &DirectoryScanner) -> Result<Self> {
        let mut index = Self::new();
        for item in scanner.stream()? {
            let entry = item?;
            index.add_entry(&entry)?;
        }
        Ok(index)
    }

    /// Record that `absolute_path`, found under `root`, has identity `id`.
    pub fn add(&mut self, id: FileId, absolute_path: &Path, root: &Path) -> Result<AddOutcome> {
        let relative = absolute_path
            .strip_prefix(root)
            .map_err(|_| HlrError::PathOutsideRoot {
                root: root.to_path_buf(),
                path: absolute_path.to_path_buf(),
            })?;

        self.files_seen += 1;
        match self.records.entry(id) {
            Entry::Occupied(_) => {
                self.aliases += 1;
                Ok(AddOutcome::Alias)
            }
            Entry::Vacant(slot) => {
                slot.insert(InodeRecord {
                    root: root.to_path_buf(),
                    relative: relative.to_path_buf(),
                });
                Ok(AddOutcome::Inserted)
            }
        }
    }

    pub fn add_entry(&mut self, entry: &ScanEntry) -> Result<AddOutcome> {
        self.add(entry.id, &entry.path, &entry.root)
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn lookup(&self, id: FileId) -> Option<&InodeRecord> {
        self.records.get(&id)
    }

    /// Number of distinct identities.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of directory entries observed, aliases included.
    pub fn files_seen(&self) -> usize {
        self.files_seen
    }

    /// Number of observations dropped because their identity was already indexed.
    pub fn alias_count(&self) -> usize {
        self.aliases
    }

    /// All identities in ascending `(device, inode)` order.
    pub fn sorted_ids(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
