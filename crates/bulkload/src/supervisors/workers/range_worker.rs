//! 🍰 The partitioned worker: one slice of the file, one connection, one bucket.
//!
//! It indexes its own range (so `get_line` is a straight read, not a rescan), walks
//! `start..=stop`, pours the leftovers, and drops the index on the way out.

use std::io::ErrorKind;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app_config::ImportJob;
use crate::backends::TransportFactory;
use crate::common::LineRange;
use crate::error::LoadError;
use crate::line_source::LineSource;
use crate::progress::ProgressMetrics;
use crate::supervisors::workers::{ImportStats, Worker, ingest_line, open_accumulator, tick};

pub(in crate::supervisors) struct RangeWorker<F: TransportFactory> {
    job: Arc<ImportJob>,
    factory: Arc<F>,
    range: LineRange,
    total_lines: u64,
    progress: Option<ProgressMetrics>,
}

impl<F: TransportFactory> RangeWorker<F> {
    pub(in crate::supervisors) fn new(
        job: Arc<ImportJob>,
        factory: Arc<F>,
        range: LineRange,
        total_lines: u64,
        progress: Option<ProgressMetrics>,
    ) -> Self {
        Self {
            job,
            factory,
            range,
            total_lines,
            progress,
        }
    }

    async fn run(self) -> Result<ImportStats> {
        let mut accumulator = open_accumulator(&self.job, self.factory.as_ref()).await?;
        let mut source = LineSource::with_total(self.job.data.clone(), self.total_lines);
        source.index_range(self.range).await?;
        debug!("📇 worker indexed lines {}..={}", self.range.start, self.range.stop);

        let mut stats = ImportStats::default();
        for line_number in self.range.start..=self.range.stop {
            match source.get_line(line_number).await {
                Ok(line) => {
                    ingest_line(line.as_bytes(), line_number, &mut accumulator, &mut stats).await
                }
                // -- 🧟 not UTF-8. same fate as bad JSON: counted, logged, skipped.
                Err(LoadError::Io { source: ref cause, .. }) if cause.kind() == ErrorKind::InvalidData => {
                    stats.lines_read += 1;
                    stats.lines_skipped += 1;
                    warn!("⚠️ skipping line {}: not valid UTF-8", line_number);
                }
                Err(err) => return Err(err.into()),
            }
            tick(self.progress.as_ref());
        }

        stats.batches = accumulator.finish().await;
        source.clear_cache();
        Ok(stats)
    }
}

impl<F: TransportFactory> Worker for RangeWorker<F> {
    fn start(self) -> JoinHandle<Result<ImportStats>> {
        tokio::spawn(self.run())
    }
}
