//! Site-Export main entry point
//!
//! Command-line interface for the website-to-Markdown export worker and its
//! queue administration.

use anyhow::Context;
use clap::{Parser, Subcommand};
use site_export::config::{load_config_with_hash, Config};
use site_export::dispatcher::{requeue_pending, submit_job, Dispatcher, JobProcessor};
use site_export::output::{format_jobs, format_logs, load_statistics, print_statistics};
use site_export::persist::LocalObjectStore;
use site_export::queue::{RetryPolicy, SqliteWorkQueue, WorkQueue};
use site_export::storage::{JobStore, SqliteJobStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// How many jobs `jobs` lists
const JOB_LIST_LIMIT: usize = 20;

/// Site-Export: turns websites into Markdown zip archives
///
/// Jobs are submitted to a durable queue; the worker crawls each site,
/// converts its pages to Markdown, harvests images, and stores one zip
/// archive per job.
#[derive(Parser, Debug)]
#[command(name = "site-export")]
#[command(version = "1.0.0")]
#[command(about = "Website to Markdown archive exporter", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the dispatcher until interrupted
    Worker,

    /// Create export jobs for one or more URLs
    Submit {
        #[arg(value_name = "URL", required = true)]
        urls: Vec<String>,

        /// Recorded as the job's submitter
        #[arg(long, default_value = "cli")]
        submitter: String,
    },

    /// Show queue and job counts
    Status,

    /// Move every dead-lettered item back to the queue
    RetryFailed,

    /// Re-enqueue jobs that are still pending and never started
    RequeuePending,

    /// List the most recent jobs
    Jobs,

    /// Show the log of a job
    Logs {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let store = open_store(&config)?;
    let queue = open_queue(&config)?;

    match cli.command {
        Command::Worker => run_worker(&config, store, queue).await?,
        Command::Submit { urls, submitter } => {
            for url in &urls {
                match submit_job(store.as_ref(), queue.as_ref(), url, &submitter).await {
                    Ok(job) => println!("{}  {}", job.id, job.target_url),
                    Err(e) => {
                        tracing::error!("Failed to submit {}: {}", url, e);
                        return Err(e.into());
                    }
                }
            }
        }
        Command::Status => {
            let stats = load_statistics(queue.as_ref(), store.as_ref()).await?;
            print_statistics(&stats);
        }
        Command::RetryFailed => {
            let moved = queue.retry_all_dead().await?;
            println!("✓ Re-queued {} failed jobs", moved);
        }
        Command::RequeuePending => {
            let added = requeue_pending(store.as_ref(), queue.as_ref()).await?;
            println!("✓ Re-queued {} pending jobs", added);
        }
        Command::Jobs => {
            let jobs = store.list_jobs(JOB_LIST_LIMIT).await?;
            print!("{}", format_jobs(&jobs));
        }
        Command::Logs { job_id } => {
            if store.get_job(&job_id).await?.is_none() {
                anyhow::bail!("No job with id {}", job_id);
            }
            let logs = store.get_logs(&job_id).await?;
            print!("{}", format_logs(&logs));
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_export=info,warn"),
            1 => EnvFilter::new("site_export=debug,info"),
            2 => EnvFilter::new("site_export=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn JobStore>> {
    let store = SqliteJobStore::new(Path::new(&config.database.path))
        .with_context(|| format!("Failed to open job store {}", config.database.path))?;
    Ok(Arc::new(store))
}

fn open_queue(config: &Config) -> anyhow::Result<Arc<dyn WorkQueue>> {
    let queue = SqliteWorkQueue::new(
        Path::new(&config.queue.database_path),
        RetryPolicy::from(&config.queue),
    )
    .with_context(|| format!("Failed to open queue {}", config.queue.database_path))?;
    Ok(Arc::new(queue))
}

/// Runs the dispatcher until Ctrl-C, then drains in-flight jobs
async fn run_worker(
    config: &Config,
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
) -> anyhow::Result<()> {
    let objects = Arc::new(LocalObjectStore::new(
        &config.storage.root_dir,
        &config.storage.bucket,
    ));
    let processor = Arc::new(JobProcessor::from_config(config, store, objects)?);

    let mut dispatcher = Dispatcher::new(config, queue, processor);
    dispatcher.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Interrupt received");

    dispatcher.stop().await;
    Ok(())
}
