#![forbid(unsafe_code)]

//! Hardlink Reconciler (hlr): mirror source trees into a destination by
//! inode identity, creating hard links only for files not already present.
//!
//! Pipeline:
//! 1. **Scanner**: walk source and destination forests, recording `(device, inode)` per file
//! 2. **Planner**: set difference of the two indices, ordered by identity
//! 3. **Linker**: create parent directories and hard links, collecting per-file failures
//!
//! # Library usage
//!
//! ```rust,no_run
//! use hardlink_reconciler::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let config = Config::load(None, &ConfigOverrides::default())?;
//! let summary = Reconciler::new(config, None)?.run(&mut std::io::stdout())?;
//! println!("linked {} files", summary.report.linked);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod core;
pub mod engine;
pub mod linker;
pub mod logger;
pub mod scanner;
