//! # Previously, on Bulkload...
//!
//! 🎬 The cluster was down. Or slow. Or not installed on the CI runner, which is the
//! same thing with fewer alerts. Someone had to pretend to be Elasticsearch.
//!
//! `InMemoryTransport` is that someone. It hoards every request it receives behind an
//! `Arc<Mutex<...>>` so tests can inspect what arrived, counts every attempt, and can
//! be told to fail the first N attempts (or all of them, for the dramatic episodes).
//!
//! ⚠️ Test-only. If you're deploying this to prod, please also deploy a therapist.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use super::{BulkRequest, BulkTransport, PermanentRejection, TransportFactory};

/// 📦 A transport that never forgets. Clones share the same vault, so a factory clone
/// handed to eight workers still reports into one place.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemoryTransport {
    /// 🔒 every request that was accepted, in arrival order
    pub(crate) received: Arc<tokio::sync::Mutex<Vec<BulkRequest>>>,
    /// 🔢 every attempt, accepted or not
    pub(crate) attempts: Arc<AtomicUsize>,
    /// 🏭 how many times `connect` was called
    pub(crate) connections: Arc<AtomicUsize>,
    // -- 💀 attempts left to sabotage. usize::MAX = the cluster is never coming back.
    failures_remaining: Arc<AtomicUsize>,
    // -- 🧱 sabotage with a rejection that says "don't bother retrying"
    permanent: Arc<AtomicBool>,
}

impl InMemoryTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 💀 Fail the next `n` attempts across every clone, then behave.
    pub(crate) fn failing_first(n: usize) -> Self {
        let transport = Self::default();
        transport.failures_remaining.store(n, Ordering::SeqCst);
        transport
    }

    /// 💀 Fail forever. A sink that only knows how to say no.
    pub(crate) fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    /// 🧱 Reject everything, permanently. Like a mapping that hates every document.
    pub(crate) fn permanently_rejecting() -> Self {
        let transport = Self::always_failing();
        transport.permanent.store(true, Ordering::SeqCst);
        transport
    }

    pub(crate) fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) async fn received_action_counts(&self) -> Vec<usize> {
        self.received
            .lock()
            .await
            .iter()
            .map(|r| r.action_count)
            .collect()
    }
}

#[async_trait]
impl BulkTransport for InMemoryTransport {
    async fn send_bulk(&mut self, request: &BulkRequest) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let sabotaged = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if sabotaged && self.permanent.load(Ordering::SeqCst) {
            return Err(PermanentRejection {
                message: "💀 in-memory cluster rejected every item with a 400".to_string(),
            }
            .into());
        }
        if sabotaged {
            anyhow::bail!("💀 in-memory cluster is pretending to be on fire");
        }

        self.received.lock().await.push(request.clone());
        Ok(())
    }
}

#[async_trait]
impl TransportFactory for InMemoryTransport {
    type Transport = InMemoryTransport;

    async fn connect(&self) -> Result<InMemoryTransport> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(self.clone())
    }
}
