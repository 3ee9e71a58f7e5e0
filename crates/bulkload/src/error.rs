//! 💀 error.rs — the taxonomy of things that go wrong before lunch.
//!
//! Most of bulkload speaks `anyhow` (the universal donor of Result types 🩸).
//! The handful of spots where the *kind* of failure changes what we do next
//! get a proper enum instead, so callers can match instead of string-sniffing.
//!
//! 🦆 (the duck files its complaints in triplicate)

use std::path::PathBuf;

use thiserror::Error;

/// 🏷️ The typed failures of the load pipeline.
///
/// - `Config` → fail fast, nothing has touched the network yet
/// - `NotFound` → asked for a line the file does not have
/// - `Io` → the disk said no
/// - `Parse` → one line is not JSON; the caller decides if that's fatal
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("line {line} not found in '{path}' ({total} lines total)")]
    NotFound {
        path: PathBuf,
        line: u64,
        total: u64,
    },
    #[error("io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LoadError {
    /// 🔧 Shorthand for wrapping an io::Error with the path that caused it.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }

    /// ✅ ConfigError is the only class that aborts a run outright.
    pub fn is_config(&self) -> bool {
        matches!(self, LoadError::Config(_))
    }
}
