//! Activity logging: JSONL writer fed by a dedicated logger thread.

pub mod activity;
pub mod jsonl;
