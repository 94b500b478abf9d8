//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use hardlink_reconciler::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, ConfigOverrides};
pub use crate::core::errors::{HlrError, Result};

// Scanner
pub use crate::scanner::index::{FileId, InodeIndex, InodeRecord};
pub use crate::scanner::walker::{DirectoryScanner, ScanEntry};

// Linker
pub use crate::linker::executor::{LinkFailure, LinkReport, Linker, LinkerConfig};
pub use crate::linker::planner::{LinkPlan, LinkPlanner, PlannedAction};

// Engine
pub use crate::engine::orchestrator::{Reconciler, RunSummary};
