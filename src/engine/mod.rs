//! Run orchestration: configuration in, scan/plan/link summary out.

pub mod orchestrator;
