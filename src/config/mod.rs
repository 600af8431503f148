//! Configuration module for Site-Export
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use site_export::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("site-export.toml")).unwrap();
//! println!("Worker concurrency: {}", config.worker.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DatabaseConfig, QueueConfig, StorageConfig, UserAgentConfig,
    WorkerConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
