//! 🔁 sink.rs — try, wait, try again, and eventually let go.
//!
//! 🎬 *[a batch of 5000 documents stands at the door of a cluster that isn't answering]*
//! *[it knocks. it waits five seconds. it knocks again.]*
//! *[after the fifth knock, it leaves a note in the error log and walks away]*
//!
//! `BulkSink` wraps a single-attempt transport with a bounded retry policy.
//! Exhausting every attempt is NOT fatal: the batch is dropped, one `error!` line
//! records its size and how hard we tried, and the worker moves on. The run
//! finishing matters more than one unhealthy batch. That's a data-loss trade-off
//! and it's on purpose; the log line is the receipt.
//!
//! 🦆

use std::time::Duration;

use tracing::{debug, error, warn};

use crate::backends::{BulkRequest, BulkTransport, PermanentRejection};
use crate::common::BulkAction;
use crate::transforms::{ElasticsearchBulk, render_bulk_body};

/// 🔁 How stubborn to be. Defaults: 5 attempts, 5 seconds apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Zero is treated as one.
    pub max_attempts: usize,
    /// Fixed pause between a failed attempt and the next one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(5),
        }
    }
}

/// 📬 What happened to one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// ✅ accepted on attempt number `attempts` (0 for an empty batch, which is trivially delivered)
    Delivered { attempts: usize },
    /// 💀 every attempt failed, the batch is gone
    Dropped { attempts: usize },
}

impl SubmitOutcome {
    pub fn attempts(&self) -> usize {
        match *self {
            SubmitOutcome::Delivered { attempts } | SubmitOutcome::Dropped { attempts } => attempts,
        }
    }
}

/// 🚚 One worker's outbound lane: a transport plus the patience to retry it.
#[derive(Debug)]
pub struct BulkSink<T: BulkTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: BulkTransport> BulkSink<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// 📤 Submit one batch. Never returns an error: the worst case is `Dropped`.
    ///
    /// The body is rendered once and re-sent verbatim on every retry.
    pub async fn submit(&mut self, batch: &[BulkAction]) -> SubmitOutcome {
        if batch.is_empty() {
            return SubmitOutcome::Delivered { attempts: 0 };
        }

        let request = match render_bulk_body::<ElasticsearchBulk>(batch) {
            Ok(body) => BulkRequest {
                body,
                action_count: batch.len(),
            },
            Err(err) => {
                error!(
                    "💀 could not render a batch of {} actions, dropping it without a single attempt: {:#}",
                    batch.len(),
                    err
                );
                return SubmitOutcome::Dropped { attempts: 0 };
            }
        };

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts_made = 0;
        for attempt in 1..=max_attempts {
            attempts_made = attempt;
            match self.transport.send_bulk(&request).await {
                Ok(()) => {
                    debug!(
                        "✅ batch of {} actions delivered on attempt {}/{}",
                        request.action_count, attempt, max_attempts
                    );
                    return SubmitOutcome::Delivered { attempts: attempt };
                }
                Err(err) => {
                    warn!(
                        "⚠️ bulk attempt {}/{} failed for a batch of {} actions: {:#}",
                        attempt, max_attempts, request.action_count, err
                    );
                    // -- 🧱 same body, same answer. retrying only re-indexes the items that did land.
                    if err.downcast_ref::<PermanentRejection>().is_some() {
                        break;
                    }
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        error!(
            batch_size = request.action_count,
            attempts = attempts_made,
            "💀 After trying {} times, a batch of {} documents still could not be sent. Dropping it and moving on.",
            attempts_made,
            request.action_count
        );
        SubmitOutcome::Dropped {
            attempts: attempts_made,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::in_mem::InMemoryTransport;
    use crate::log_capture::CapturedEvents;
    use serde_json::json;
    use tokio::time::Instant;
    use tracing::Level;

    fn a_batch_of(n: usize) -> Vec<BulkAction> {
        (0..n)
            .map(|i| BulkAction::new("books", None, json!({ "n": i })))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_cluster_never_answers_and_we_give_up_after_five() {
        let (logs, _guard) = CapturedEvents::install();
        let transport = InMemoryTransport::always_failing();
        let mut sink = BulkSink::new(transport.clone(), RetryPolicy::default());
        let started = Instant::now();

        let outcome = sink.submit(&a_batch_of(3)).await;

        assert_eq!(outcome, SubmitOutcome::Dropped { attempts: 5 });
        assert_eq!(transport.attempt_count(), 5, "exactly five knocks on the door");
        let waited = started.elapsed();
        assert!(
            waited >= Duration::from_secs(20) && waited < Duration::from_secs(25),
            "four 5s backoffs between five attempts, not five. waited {waited:?}"
        );
        assert!(transport.received.lock().await.is_empty());

        // -- 📼 one warning per failed knock, exactly one error for the dropped batch
        assert_eq!(logs.count_at(Level::WARN), 5);
        let errors = logs.messages_at(Level::ERROR);
        assert_eq!(errors.len(), 1, "one error line per dropped batch, got {errors:?}");
        assert!(errors[0].contains("3 documents"));
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_third_time_is_the_charm() {
        let transport = InMemoryTransport::failing_first(2);
        let mut sink = BulkSink::new(transport.clone(), RetryPolicy::default());

        let outcome = sink.submit(&a_batch_of(7)).await;

        assert_eq!(outcome, SubmitOutcome::Delivered { attempts: 3 });
        assert_eq!(transport.received_action_counts().await, vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_permanent_no_ends_the_retries_on_the_spot() {
        let (logs, _guard) = CapturedEvents::install();
        let transport = InMemoryTransport::permanently_rejecting();
        let mut sink = BulkSink::new(transport.clone(), RetryPolicy::default());
        let started = Instant::now();

        let outcome = sink.submit(&a_batch_of(4)).await;

        assert_eq!(outcome, SubmitOutcome::Dropped { attempts: 1 });
        assert_eq!(transport.attempt_count(), 1, "no second knock on a door that said no");
        assert!(started.elapsed() < Duration::from_secs(5), "and no backoff either");
        assert_eq!(logs.count_at(Level::ERROR), 1);
    }

    #[tokio::test]
    async fn the_one_where_an_empty_batch_never_bothers_the_cluster() {
        let transport = InMemoryTransport::new();
        let mut sink = BulkSink::new(transport.clone(), RetryPolicy::default());

        assert_eq!(sink.submit(&[]).await, SubmitOutcome::Delivered { attempts: 0 });
        assert_eq!(transport.attempt_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_zero_attempts_still_means_one_try() {
        let transport = InMemoryTransport::always_failing();
        let policy = RetryPolicy {
            max_attempts: 0,
            backoff: Duration::from_millis(10),
        };
        let mut sink = BulkSink::new(transport.clone(), policy);

        assert_eq!(sink.submit(&a_batch_of(1)).await, SubmitOutcome::Dropped { attempts: 1 });
        assert_eq!(transport.attempt_count(), 1);
    }
}
