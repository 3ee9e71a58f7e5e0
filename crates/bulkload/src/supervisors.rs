//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module — part middle manager, part helicopter parent,
//! part that one project manager who schedules a meeting to plan the next meeting.
//!
//! The whole run, start to finish:
//!   count lines → validate (maybe) → pick a dispatch → spawn everyone → join everyone → report.
//!
//! Workers are all spawned before anyone is awaited, then joined together with
//! `join_all`. The join races a shutdown future: if shutdown wins, we stop waiting and
//! call it `Interrupted`. Whatever was in flight stays in flight. No take-backs.
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB EVER
//! 🔒 Like Fight Club, but for async tasks. First rule: you don't pub the workers.

mod workers;
pub use workers::ImportStats;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app_config::ImportJob;
use crate::backends::TransportFactory;
use crate::common::LineRange;
use crate::line_source::total_lines;
use crate::partition::partition;
use crate::progress::ProgressMetrics;
use crate::validator::{ValidationReport, validate_with_progress};
use workers::{RangeWorker, SequentialWorker, Worker};

/// 🏁 How a run ended. Four ways out of this building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// every requested phase ran to the end, every worker came back
    Success,
    /// the import finished, but at least one worker died and its range is missing
    CompletedWithFailures,
    /// pure-validation run, and the data didn't pass
    FailedValidation,
    /// shutdown arrived before the workers did
    Interrupted,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunOutcome::Success => "success",
            RunOutcome::CompletedWithFailures => "completed with failed workers",
            RunOutcome::FailedValidation => "failed validation",
            RunOutcome::Interrupted => "interrupted",
        };
        f.write_str(label)
    }
}

/// 🚦 One lane or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dispatch {
    Sequential,
    Partitioned { workers: usize },
}

/// 🧾 One worker's receipt. `range` is None for the sequential pass, which owns the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub range: Option<LineRange>,
    pub stats: Option<ImportStats>,
    /// why the worker died, if it did
    pub failure: Option<String>,
}

/// 📋 Everything worth knowing once the dust settles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub elapsed: Duration,
    pub total_lines: u64,
    pub validation: Option<ValidationReport>,
    pub dispatch: Option<Dispatch>,
    /// merged across every worker that came back
    pub import: Option<ImportStats>,
    pub workers: Vec<WorkerReport>,
}

impl RunReport {
    fn new(total_lines: u64) -> Self {
        Self {
            outcome: RunOutcome::Success,
            elapsed: Duration::ZERO,
            total_lines,
            validation: None,
            dispatch: None,
            import: None,
            workers: Vec::new(),
        }
    }

    pub fn failed_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.failure.is_some()).count()
    }
}

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?". Except now it actually blocks on the answer instead of
/// polling every 5 milliseconds like an anxious parent.
pub struct Supervisor<F: TransportFactory> {
    /// 🧊 frozen at construction, shared read-only with every worker
    job: Arc<ImportJob>,
    factory: Arc<F>,
}

impl<F: TransportFactory> Supervisor<F> {
    /// 🚀 Birth of a Supervisor. It's like a baby, but less crying.
    pub fn new(job: ImportJob, factory: F) -> Self {
        Self {
            job: Arc::new(job),
            factory: Arc::new(factory),
        }
    }

    /// 🏃 Run to completion. Nobody can interrupt this one.
    pub async fn run(self) -> Result<RunReport> {
        self.run_until(std::future::pending()).await
    }

    /// 🏃 Run until done or until `shutdown` resolves, whichever comes first.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<RunReport> {
        let started = Instant::now();
        let job = Arc::clone(&self.job);

        let total = total_lines(&job.data)
            .await
            .with_context(|| format!("💀 Could not count the lines of '{}'", job.data.display()))?;
        info!("📏 '{}' has {} lines", job.data.display(), total);
        let mut report = RunReport::new(total);

        if job.check {
            info!("🔎 validating {} lines", total);
            let progress = ProgressMetrics::new("validate", total);
            let validation = validate_with_progress(&job.data, Some(&progress))
                .await
                .context("💀 Validation could not read the data file")?;
            if validation.is_valid() {
                progress.finish();
                info!("✅ {}", validation);
            } else {
                progress.abandon();
                error!("💀 {}", validation);
            }
            let valid = validation.is_valid();
            report.validation = Some(validation);

            if !job.import {
                report.outcome = if valid {
                    RunOutcome::Success
                } else {
                    RunOutcome::FailedValidation
                };
                report.elapsed = started.elapsed();
                return Ok(report);
            }
            if !valid {
                warn!("⚠️ importing anyway: bad lines will be skipped one by one");
            }
        }

        let dispatch = self.plan(total);
        report.dispatch = Some(dispatch);
        let progress = ProgressMetrics::new("import", total);

        // -- 🧵 everybody out of the gate before anybody gets awaited
        let (ranges, handles): (Vec<Option<LineRange>>, Vec<JoinHandle<Result<ImportStats>>>) =
            match dispatch {
                Dispatch::Sequential => {
                    info!("🚶 one sequential pass over {} lines", total);
                    let worker = SequentialWorker::new(
                        Arc::clone(&job),
                        Arc::clone(&self.factory),
                        Some(progress.clone()),
                    );
                    (vec![None], vec![worker.start()])
                }
                Dispatch::Partitioned { workers } => {
                    info!("🍰 {} lines across {} workers", total, workers);
                    partition(total, workers)
                        .into_iter()
                        .map(|range| {
                            let worker = RangeWorker::new(
                                Arc::clone(&job),
                                Arc::clone(&self.factory),
                                range,
                                total,
                                Some(progress.clone()),
                            );
                            (Some(range), worker.start())
                        })
                        .unzip()
                }
            };

        let joined = tokio::select! {
            biased;
            _ = shutdown => None,
            results = join_all(handles) => Some(results),
        };

        let Some(results) = joined else {
            progress.abandon();
            warn!("🛑 shutdown requested: no longer waiting on workers, in-flight batches are on their own");
            report.outcome = RunOutcome::Interrupted;
            report.elapsed = started.elapsed();
            return Ok(report);
        };

        let mut merged = ImportStats::default();
        for (range, result) in ranges.into_iter().zip(results) {
            let worker_report = match result {
                Ok(Ok(stats)) => {
                    merged.merge(&stats);
                    WorkerReport {
                        range,
                        stats: Some(stats),
                        failure: None,
                    }
                }
                Ok(Err(err)) => {
                    error!("💀 worker for {:?} failed: {:#}", range, err);
                    WorkerReport {
                        range,
                        stats: None,
                        failure: Some(format!("{:#}", err)),
                    }
                }
                Err(join_err) => {
                    error!("💀 worker for {:?} panicked or was cancelled: {}", range, join_err);
                    WorkerReport {
                        range,
                        stats: None,
                        failure: Some(join_err.to_string()),
                    }
                }
            };
            report.workers.push(worker_report);
        }
        progress.finish();

        info!(
            "🏁 import done: {} documents delivered, {} dropped, {} lines skipped",
            merged.batches.documents_delivered, merged.batches.documents_dropped, merged.lines_skipped
        );
        report.import = Some(merged);
        report.outcome = if report.failed_workers() == 0 {
            RunOutcome::Success
        } else {
            error!(
                "💀 {} of {} workers failed; their lines were not imported",
                report.failed_workers(),
                report.workers.len()
            );
            RunOutcome::CompletedWithFailures
        };
        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// 🚦 Sequential when asked for one worker or when the file is too small to be worth
    /// slicing. Never more workers than lines.
    fn plan(&self, total: u64) -> Dispatch {
        let requested = self.job.workers;
        if requested <= 1 {
            return Dispatch::Sequential;
        }
        if total < self.job.min_partition_lines {
            info!(
                "📏 {} lines is under the partition threshold of {}: downgrading {} workers to 1",
                total, self.job.min_partition_lines, requested
            );
            return Dispatch::Sequential;
        }
        let workers = usize::try_from(total).map_or(requested, |t| requested.min(t));
        Dispatch::Partitioned { workers }
    }
}
