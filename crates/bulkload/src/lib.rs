//! 🚚 bulkload — NDJSON in, Elasticsearch `_bulk` out, with as many lanes as you ask for.
//!
//! The short version of a long night:
//!   `AppConfig` → `ImportJob` → `Supervisor` → workers → `BatchAccumulator` → `BulkSink` → cluster.

pub mod accumulator;
pub mod app_config;
pub mod backends;
pub mod common;
pub mod decoder;
pub mod error;
pub mod line_source;
#[cfg(test)]
pub(crate) mod log_capture;
pub mod partition;
pub mod progress;
pub mod sink;
pub mod supervisors;
pub(crate) mod transforms;
pub mod validator;

use anyhow::{Context, Result};
use tracing::{info, warn};

pub use crate::app_config::{AppConfig, ConfigOverrides, ImportJob, load_config};
pub use crate::error::LoadError;
pub use crate::progress::render_summary;
pub use crate::supervisors::{Dispatch, ImportStats, RunOutcome, RunReport, Supervisor};

/// 🚀 Freeze the config, then run the whole thing against Elasticsearch, with Ctrl-C
/// as the emergency brake.
pub async fn run(app_config: AppConfig) -> Result<RunReport> {
    let job = app_config
        .into_job()
        .context("💀 The configuration didn't survive inspection")?;
    let factory = job.destination.clone();
    Supervisor::new(job, factory)
        .run_until(shutdown_signal())
        .await
}

/// 🛑 Resolves on Ctrl-C. If the handler can't even be installed, it never resolves,
/// and the run just finishes the old-fashioned way.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Ctrl-C received, wrapping up"),
        Err(err) => {
            warn!("⚠️ could not listen for Ctrl-C ({}), the run is uninterruptible now", err);
            std::future::pending::<()>().await
        }
    }
}
