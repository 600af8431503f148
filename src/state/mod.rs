//! State module for tracking job progress
//!
//! # Components
//!
//! - `JobStatus`: lifecycle of a job record and its allowed transitions
//! - `LogLevel`: severity of job log entries
//! - `ProgressPlan` / `ProgressTracker`: progress percentages and their monotonicity

mod job_state;
mod progress;

pub use job_state::{JobStatus, LogLevel};
pub use progress::{ProgressPlan, ProgressTracker};
