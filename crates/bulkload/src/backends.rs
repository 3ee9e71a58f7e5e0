//! 🔌 Backends — where the bytes actually leave the building.
//!
//! 🚰 A transport takes one rendered bulk body and makes exactly one attempt at
//! delivering it. That's the whole job. Retrying, backing off, and giving up
//! gracefully belong to `sink::BulkSink`, one floor up.
//!
//! 🏭 A factory hands every worker its OWN transport. No process-wide client,
//! no shared connection object, no global anything. Workers that don't share
//! don't have to lock.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

pub(crate) mod elasticsearch;
#[cfg(test)]
pub(crate) mod in_mem;

pub use elasticsearch::{ElasticsearchSink, ElasticsearchSinkConfig};

/// 📦 A fully rendered bulk request body, plus how many actions are inside it.
///
/// Rendered once per batch and reused across retries.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequest {
    pub body: String,
    pub action_count: usize,
}

/// 🕳️ One attempt at delivering one bulk request. No retries, no sleeps, no feelings.
///
/// # Contract
/// - `Ok(())` means the destination accepted the whole batch.
/// - `Err(..)` covers everything else: network trouble, non-2xx statuses, and
///   per-item rejections inside an otherwise happy 200.
/// - An `Err` wrapping [`PermanentRejection`] means sending the same body again can't
///   help (mapping errors and friends), so the retry loop stops right there.
#[async_trait]
pub trait BulkTransport: Send + std::fmt::Debug {
    async fn send_bulk(&mut self, request: &BulkRequest) -> Result<()>;
}

/// 🧱 The destination looked at the batch and said no for reasons that won't change in
/// five seconds. Carried inside an `anyhow::Error`, found again with `downcast_ref`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PermanentRejection {
    pub message: String,
}

/// 🏭 Builds a fresh transport for each worker.
///
/// Dependency injection, Rust edition: the supervisor holds one factory and calls
/// `connect` once per worker, so each worker owns an independent connection.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    type Transport: BulkTransport + 'static;

    async fn connect(&self) -> Result<Self::Transport>;
}
