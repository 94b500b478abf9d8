//! Inode scanner: deterministic directory walker and identity-keyed index.

pub mod index;
pub mod walker;
