//! 🔎 validator.rs — the bouncer who reads every ID before anyone gets in.
//!
//! One forward pass over the file, decoding every line, stopping cold at the first
//! one that isn't JSON. No random access, no offset index, no network. The cluster
//! doesn't even know this is happening, and that's the point: catch the bad data
//! before a bulk run commits hours of cluster time to it.
//!
//! 🧠 Knowledge graph:
//! - Pure-validate runs turn an `Invalid` report into `FailedValidation`.
//! - Validate+import runs print the report and import anyway. Diagnostic, not a gate.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::decoder::{decode_bytes, trim_line_terminator};
use crate::error::LoadError;
use crate::progress::ProgressMetrics;

/// 📋 The verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationReport {
    /// ✅ every line parsed
    Valid { lines_checked: u64 },
    /// 💀 the first bad line, with the evidence
    Invalid {
        line_number: u64,
        content: String,
        error: String,
        lines_checked: u64,
    },
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationReport::Valid { .. })
    }

    /// 🔢 How many lines were read before the verdict. For an invalid file this is the
    /// bad line's number, because we stop right there.
    pub fn lines_checked(&self) -> u64 {
        match *self {
            ValidationReport::Valid { lines_checked }
            | ValidationReport::Invalid { lines_checked, .. } => lines_checked,
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReport::Valid { lines_checked } => {
                write!(f, "All raw JSON data valid! ({} lines)", lines_checked)
            }
            ValidationReport::Invalid {
                line_number,
                content,
                error,
                ..
            } => write!(
                f,
                "JSON data not valid at line {}: {}\n  content: {}",
                line_number, error, content
            ),
        }
    }
}

/// 🔎 Validate every line of `path`, stopping at the first malformed one.
pub async fn validate(path: &Path) -> Result<ValidationReport, LoadError> {
    validate_with_progress(path, None).await
}

pub(crate) async fn validate_with_progress(
    path: &Path,
    progress: Option<&ProgressMetrics>,
) -> Result<ValidationReport, LoadError> {
    let file = File::open(path)
        .await
        .map_err(|e| LoadError::io(path, e))?;
    let mut reader = BufReader::new(file);
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
        if let Some(progress) = progress {
            progress.inc(1);
        }

        let line = trim_line_terminator(&raw_line);
        if let Err(err) = decode_bytes(line) {
            debug!("🔎 validation stopped at line {}", line_number);
            return Ok(ValidationReport::Invalid {
                line_number,
                content: String::from_utf8_lossy(line).into_owned(),
                error: err.to_string(),
                lines_checked: line_number,
            });
        }
    }

    Ok(ValidationReport::Valid {
        lines_checked: line_number,
    })
}
