//! 🧵 Workers: the backbone of bulkload, the unsung heroes, the ones who actually
//! do the work while the Supervisor takes all the credit in the sprint retro.
//!
//! 🚀 Two flavors:
//!   - `SequentialWorker` walks the whole file front to back. One lane, no index.
//!   - `RangeWorker` owns one `LineRange`, builds its own offset index, and walks just that.
//!
//! Each one connects its own transport, fills its own bucket, and hands back its own
//! `ImportStats`. Nobody shares anything except the progress bar. 🦆
//!
//! ⚠️ "If you're reading this, the code review went poorly."

// 🎉 anyhowwwww.... it's useful! Like duct tape for error handling.
use anyhow::{Context, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::warn;

mod range_worker;
mod sequential_worker;
pub(in crate::supervisors) use range_worker::RangeWorker;
pub(in crate::supervisors) use sequential_worker::SequentialWorker;

use crate::accumulator::{BatchAccumulator, BatchStats};
use crate::app_config::ImportJob;
use crate::backends::{BulkTransport, TransportFactory};
use crate::decoder::decode_bytes;
use crate::progress::ProgressMetrics;
use crate::sink::BulkSink;

/// 🏗️ A background worker, that does work. duh.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!" — Seinfeld, on Rust
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify. Okay, we don't trust at all.
    fn start(self) -> JoinHandle<Result<ImportStats>>;
}

/// 📊 What one import pass did. Per worker first, then merged into the run total.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// every line the worker looked at, good or bad
    pub lines_read: u64,
    pub documents_decoded: u64,
    /// not JSON, not our problem (well, it's a `warn!` problem)
    pub lines_skipped: u64,
    pub batches: BatchStats,
}

impl ImportStats {
    pub fn merge(&mut self, other: &ImportStats) {
        self.lines_read += other.lines_read;
        self.documents_decoded += other.documents_decoded;
        self.lines_skipped += other.lines_skipped;
        self.batches.merge(&other.batches);
    }
}

/// 🔌 Connect a fresh transport and wrap it in this worker's private bucket.
async fn open_accumulator<F: TransportFactory>(
    job: &ImportJob,
    factory: &F,
) -> Result<BatchAccumulator<F::Transport>> {
    let transport = factory
        .connect()
        .await
        .context("💀 Worker could not open its own connection to the destination")?;
    Ok(BatchAccumulator::new(
        BulkSink::new(transport, job.retry),
        job.index.clone(),
        job.doc_type.clone(),
        job.batch_size,
    ))
}

/// 📄 One raw line through the gauntlet: decode, then into the bucket. Or a `warn!` and a skip.
async fn ingest_line<T: BulkTransport>(
    raw_line: &[u8],
    line_number: u64,
    accumulator: &mut BatchAccumulator<T>,
    stats: &mut ImportStats,
) {
    stats.lines_read += 1;
    match decode_bytes(raw_line) {
        Ok(document) => {
            stats.documents_decoded += 1;
            accumulator.offer(document).await;
        }
        Err(err) => {
            stats.lines_skipped += 1;
            warn!("⚠️ skipping line {}: {}", line_number, err);
        }
    }
}

fn tick(progress: Option<&ProgressMetrics>) {
    if let Some(progress) = progress {
        progress.inc(1);
    }
}
