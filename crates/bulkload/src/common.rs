//! 📦 Common data structures — the building blocks of bulkload
//!
//! 🎬 COLD OPEN — INT. DATA CENTER — 3:47 AM
//!
//! A forty-gigabyte NDJSON file sits on a disk. Nobody remembers who exported it.
//! Nobody remembers why. All anyone knows is that it must be in the cluster by
//! morning. Line by line, it will be carved into ranges, decoded into documents,
//! wrapped in actions, and stacked into batches. These are the shapes it takes
//! along the way. They don't ask questions. They carry the data.
//!
//! 🦆

use serde::Serialize;

/// 📄 One decoded line. Any JSON value at all — object, array, a lonely `42`.
/// No schema is imposed. The destination gets to have opinions about mappings.
pub type Document = serde_json::Value;

/// 🎯 A `BulkAction` — a document plus the address label for where it should land.
///
/// `doc_type` is the `_type` label older engines insisted on. Newer clusters reject
/// it, which is why it's an `Option` and why it's omitted from the wire when `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkAction {
    /// 📡 Target index. Every action in a run shares it, but each carries its own copy
    /// so a batch is self-describing.
    pub index: String,
    /// 🏷️ Legacy type label. Elasticsearch 6 wants it, 8 throws it back at you.
    pub doc_type: Option<String>,
    /// 📦 The payload itself.
    pub source: Document,
}

impl BulkAction {
    pub fn new(index: impl Into<String>, doc_type: Option<String>, source: Document) -> Self {
        Self {
            index: index.into(),
            doc_type,
            source,
        }
    }
}

/// 📏 A `{start, stop}` pair of 1-indexed, inclusive line numbers owned by exactly one worker.
///
/// `stop < start` means the range is empty. That only happens when somebody asks the
/// partitioner for more workers than there are lines, which the supervisor refuses to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineRange {
    pub start: u64,
    pub stop: u64,
}

impl LineRange {
    pub fn new(start: u64, stop: u64) -> Self {
        Self { start, stop }
    }

    /// 🔢 How many lines live in here. Zero for the degenerate ranges.
    pub fn len(&self) -> u64 {
        if self.stop < self.start {
            0
        } else {
            self.stop - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, line: u64) -> bool {
        line >= self.start && line <= self.stop
    }
}
