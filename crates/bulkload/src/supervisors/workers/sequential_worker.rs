//! 🚶 The single-lane worker. Opens the file, reads it top to bottom, goes home.
//!
//! No offset index here: a forward pass never seeks, so it never needs one.

use std::sync::Arc;

use anyhow::Result;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::info;

use crate::app_config::ImportJob;
use crate::backends::TransportFactory;
use crate::decoder::trim_line_terminator;
use crate::error::LoadError;
use crate::progress::ProgressMetrics;
use crate::supervisors::workers::{ImportStats, Worker, ingest_line, open_accumulator, tick};

pub(in crate::supervisors) struct SequentialWorker<F: TransportFactory> {
    job: Arc<ImportJob>,
    factory: Arc<F>,
    progress: Option<ProgressMetrics>,
}

impl<F: TransportFactory> SequentialWorker<F> {
    pub(in crate::supervisors) fn new(
        job: Arc<ImportJob>,
        factory: Arc<F>,
        progress: Option<ProgressMetrics>,
    ) -> Self {
        Self {
            job,
            factory,
            progress,
        }
    }

    async fn run(self) -> Result<ImportStats> {
        let mut accumulator = open_accumulator(&self.job, self.factory.as_ref()).await?;
        let path = self.job.data.as_path();
        let file = File::open(path).await.map_err(|e| LoadError::io(path, e))?;
        let mut reader = BufReader::new(file);

        let mut stats = ImportStats::default();
        let mut raw_line = Vec::new();
        let mut line_number = 0u64;
        loop {
            raw_line.clear();
            let bytes_read = reader
                .read_until(b'\n', &mut raw_line)
                .await
                .map_err(|e| LoadError::io(path, e))?;
            if bytes_read == 0 {
                break;
            }
            line_number += 1;
            ingest_line(
                trim_line_terminator(&raw_line),
                line_number,
                &mut accumulator,
                &mut stats,
            )
            .await;
            tick(self.progress.as_ref());
        }

        stats.batches = accumulator.finish().await;
        info!(
            "🏁 sequential pass done: {} lines read, {} skipped",
            stats.lines_read, stats.lines_skipped
        );
        Ok(stats)
    }
}

impl<F: TransportFactory> Worker for SequentialWorker<F> {
    fn start(self) -> JoinHandle<Result<ImportStats>> {
        tokio::spawn(self.run())
    }
}
