//! Link planning and execution.

pub mod executor;
pub mod planner;
