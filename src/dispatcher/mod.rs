//! Dispatcher module
//!
//! Pulls work items from the durable queue and runs the export pipeline for
//! each, bounded by a global concurrency limit and a global admission rate.
//!
//! # Components
//!
//! - `AdmissionLimiter`: executions admitted per rolling window
//! - `JobProcessor`: crawl, archive and upload for one item
//! - `Dispatcher`: the polling worker pool with explicit start/stop
//! - `submit_job` / `requeue_pending`: the producer side

mod limiter;
mod processor;
mod submit;
mod worker;

pub use limiter::AdmissionLimiter;
pub use processor::{JobProcessor, JobReporter, JobSummary};
pub use submit::{requeue_pending, submit_job};
pub use worker::Dispatcher;
