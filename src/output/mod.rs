//! Output module for the command-line views
//!
//! This module handles:
//! - Queue and job statistics for `status`
//! - Job and log listings for `jobs` and `logs`

mod report;
pub mod stats;

pub use report::{format_jobs, format_logs};
pub use stats::{load_statistics, print_statistics, ExportStatistics};
