//! 🪣 accumulator.rs — the bucket under the faucet.
//!
//! Documents drip in one at a time. When the bucket holds `batch_size` of them, it gets
//! poured into the `BulkSink` and starts over empty. `finish` pours whatever is left,
//! even if that's a single sad document at the bottom.
//!
//! One accumulator per worker. It never sees another worker's documents, so it never
//! needs a lock. The bucket does not share.

use serde::Serialize;

use crate::backends::BulkTransport;
use crate::common::{BulkAction, Document};
use crate::sink::{BulkSink, SubmitOutcome};

/// 📊 Flush bookkeeping for one accumulator. Merged across workers at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub batches_delivered: u64,
    pub batches_dropped: u64,
    pub documents_delivered: u64,
    pub documents_dropped: u64,
    pub attempts: u64,
}

impl BatchStats {
    pub fn merge(&mut self, other: &BatchStats) {
        self.batches_delivered += other.batches_delivered;
        self.batches_dropped += other.batches_dropped;
        self.documents_delivered += other.documents_delivered;
        self.documents_dropped += other.documents_dropped;
        self.attempts += other.attempts;
    }

    fn record(&mut self, outcome: SubmitOutcome, documents: u64) {
        self.attempts += outcome.attempts() as u64;
        match outcome {
            SubmitOutcome::Delivered { .. } => {
                self.batches_delivered += 1;
                self.documents_delivered += documents;
            }
            SubmitOutcome::Dropped { .. } => {
                self.batches_dropped += 1;
                self.documents_dropped += documents;
            }
        }
    }
}

/// 🪣 Buffers `BulkAction`s and flushes them through a `BulkSink` at `batch_size`.
#[derive(Debug)]
pub struct BatchAccumulator<T: BulkTransport> {
    sink: BulkSink<T>,
    index: String,
    doc_type: Option<String>,
    batch_size: usize,
    pending: Vec<BulkAction>,
    stats: BatchStats,
}

impl<T: BulkTransport> BatchAccumulator<T> {
    pub fn new(
        sink: BulkSink<T>,
        index: impl Into<String>,
        doc_type: Option<String>,
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            index: index.into(),
            doc_type,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            stats: BatchStats::default(),
        }
    }

    /// 📥 Wrap a document in its action and drop it in the bucket. Pours at `batch_size`,
    /// so the bucket never holds more than that.
    pub async fn offer(&mut self, document: Document) {
        self.pending
            .push(BulkAction::new(self.index.clone(), self.doc_type.clone(), document));
        if self.pending.len() >= self.batch_size {
            self.flush().await;
        }
    }

    /// 🏁 Pour out the leftovers and hand back the bookkeeping.
    pub async fn finish(mut self) -> BatchStats {
        if !self.pending.is_empty() {
            self.flush().await;
        }
        self.stats
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    async fn flush(&mut self) {
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let outcome = self.sink.submit(&batch).await;
        self.stats.record(outcome, batch.len() as u64);
    }
}
