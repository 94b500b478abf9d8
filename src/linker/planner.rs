//! Link planner: set difference of two inode indices, in identity order.
//!
//! Planning is pure. An action is produced for identity `i` iff `i` is in the
//! source index and not in the destination index. Actions are ordered by
//! ascending `(device, inode)`, which keeps announced output and test traces
//! stable even though the indices themselves are unordered.

#![allow(missing_docs)]

use std::path::PathBuf;

use serde::Serialize;

use crate::scanner::index::{FileId, InodeIndex};

/// One hard link to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    #[serde(skip)]
    pub id: FileId,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Ordered list of actions plus planning statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    pub actions: Vec<PlannedAction>,
    /// Source identities skipped because some destination root already holds them.
    pub already_present: usize,
}

impl LinkPlan {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Computes which source files are missing from the destination.
#[derive(Debug, Clone)]
pub struct LinkPlanner {
    primary_destination: PathBuf,
}

impl LinkPlanner {
    pub fn new(primary_destination: impl Into<PathBuf>) -> Self {
        Self {
            primary_destination: primary_destination.into(),
        }
    }

    /// Build the ordered action list for `source` against `destination`.
    pub fn plan(&self, source: &InodeIndex, destination: &InodeIndex) -> LinkPlan {
        let mut plan = LinkPlan::default();

        for id in source.sorted_ids() {
            if destination.contains(id) {
                plan.already_present += 1;
                continue;
            }
            let Some(record) = source.lookup(id) else {
                continue;
            };
            plan.actions.push(PlannedAction {
                id,
                source: record.absolute_path(),
                destination: self.primary_destination.join(record.relative_path()),
            });
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::path::Path;

    fn index_of(root: &str, files: &[(u64, u64, &str)]) -> InodeIndex {
        let mut index = InodeIndex::new();
        for (dev, ino, rel) in files {
            index
                .add(
                    FileId::new(*dev, *ino),
                    &Path::new(root).join(rel),
                    Path::new(root),
                )
                .unwrap();
        }
        index
    }

    #[test]
    fn plans_missing_files_under_primary_destination() {
        let source = index_of("/a", &[(1, 10, "x"), (1, 11, "sub/y")]);
        let destination = index_of("/b", &[(1, 10, "renamed-x")]);

        let plan = LinkPlanner::new("/b").plan(&source, &destination);

        assert_eq!(plan.already_present, 1);
        assert_eq!(
            plan.actions,
            vec![PlannedAction {
                id: FileId::new(1, 11),
                source: PathBuf::from("/a/sub/y"),
                destination: PathBuf::from("/b/sub/y"),
            }]
        );
    }

    #[test]
    fn empty_source_yields_empty_plan() {
        let plan = LinkPlanner::new("/b").plan(&InodeIndex::new(), &index_of("/b", &[(1, 1, "q")]));
        assert!(plan.is_empty());
        assert_eq!(plan.already_present, 0);
    }

    #[test]
    fn relative_path_is_preserved_per_source_root() {
        let mut source = InodeIndex::new();
        source
            .add(FileId::new(1, 2), Path::new("/m1/music/a.flac"), Path::new("/m1"))
            .unwrap();
        source
            .add(FileId::new(1, 1), Path::new("/m2/films/b.mkv"), Path::new("/m2"))
            .unwrap();

        let plan = LinkPlanner::new("/lib").plan(&source, &InodeIndex::new());
        let dests: Vec<_> = plan.actions.iter().map(|a| a.destination.clone()).collect();
        assert_eq!(
            dests,
            vec![
                PathBuf::from("/lib/films/b.mkv"),
                PathBuf::from("/lib/music/a.flac")
            ]
        );
    }

    #[test]
    fn identical_inode_on_other_device_is_not_present() {
        let source = index_of("/a", &[(1, 10, "x")]);
        let destination = index_of("/b", &[(2, 10, "x")]);
        let plan = LinkPlanner::new("/b").plan(&source, &destination);
        assert_eq!(plan.len(), 1);
    }

    proptest! {
        #[test]
        fn plan_is_exact_sorted_set_difference(
            src in proptest::collection::btree_set((0u64..3, 0u64..200), 0..60),
            dst in proptest::collection::btree_set((0u64..3, 0u64..200), 0..60),
        ) {
            let mut source = InodeIndex::new();
            for (dev, ino) in &src {
                let path = PathBuf::from(format!("/s/{dev}/{ino}"));
                source.add(FileId::new(*dev, *ino), &path, Path::new("/s")).unwrap();
            }
            let mut destination = InodeIndex::new();
            for (dev, ino) in &dst {
                let path = PathBuf::from(format!("/d/{dev}/{ino}"));
                destination.add(FileId::new(*dev, *ino), &path, Path::new("/d")).unwrap();
            }

            let plan = LinkPlanner::new("/d").plan(&source, &destination);

            let expected: Vec<FileId> = src
                .difference(&dst)
                .map(|(dev, ino)| FileId::new(*dev, *ino))
                .collect();
            let planned: Vec<FileId> = plan.actions.iter().map(|a| a.id).collect();
            prop_assert_eq!(&planned, &expected);
            prop_assert_eq!(plan.already_present, src.intersection(&dst).count());

            let unique: BTreeSet<_> = plan.actions.iter().map(|a| a.destination.clone()).collect();
            prop_assert_eq!(unique.len(), plan.len());
            for action in &plan.actions {
                prop_assert!(action.destination.starts_with("/d"));
            }
        }
    }
}
