// AI
//! 📊 progress.rs — "Are we there yet?" — every pipeline, every time, forever.
//!
//! 🚀 A line-counting progress bar that every worker can poke at once (indicatif
//! does its own synchronization, so workers just `inc` and move on), plus the
//! comfy end-of-run summary table.
//!
//! ⚠️  Warning: Watching this progress bar will not make it go faster.
//! Neither will refreshing it. We've tried. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};

use crate::supervisors::{Dispatch, RunReport};

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
/// "1000000 docs" → "1,000,000 docs" — you're welcome, eyes.
pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    // -- 🧵 pre-allocate like we know what we're doing (we do, we read the book)
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Formats a Duration as HH:MM:SS. If the hours column is not 00, call your mom.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// 📊 A shared, cheap-to-clone line counter with a bar attached.
///
/// Cloning shares the same bar. Eight workers, one bar, zero locks of our own.
#[derive(Clone)]
pub(crate) struct ProgressMetrics {
    /// 🏷️ what phase is this? "validate", "import", the usual suspects
    label: String,
    progress_bar: ProgressBar,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 custom Debug impl because ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("label", &self.label)
            .field("position", &self.progress_bar.position())
            .field("length", &self.progress_bar.length())
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 A bar over `total_lines`, labelled with the phase name.
    pub(crate) fn new(label: impl Into<String>, total_lines: u64) -> Self {
        let label = label.into();
        let progress_bar = ProgressBar::new(total_lines);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {human_pos}/{human_len} lines ({per_sec}, eta {eta})")
                // -- 🐛 the template is hardcoded, but we still don't unwrap on a Tuesday
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        progress_bar.set_message(label.clone());
        Self {
            label,
            progress_bar,
        }
    }

    /// 🔄 Count some lines as done.
    pub(crate) fn inc(&self, lines: u64) {
        self.progress_bar.inc(lines);
    }

    pub(crate) fn position(&self) -> u64 {
        self.progress_bar.position()
    }

    /// ✅ Mark the bar done. Ring the bell. We made it. (Or we hit EOF. Same energy.)
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    /// 🛑 Freeze the bar where it is, for the runs that end early.
    pub(crate) fn abandon(&self) {
        self.progress_bar.abandon();
    }
}

/// 🍽️ Render the end-of-run summary as a table so comfy it has lumbar support.
pub fn render_summary(report: &RunReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["📊 bulkload", ""]);

    let mut row = |label: &str, value: String| {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    };

    row("outcome", report.outcome.to_string());
    row("elapsed", format_duration(report.elapsed));
    row("total lines", format_number(report.total_lines));

    if let Some(ref validation) = report.validation {
        row(
            "validation",
            if validation.is_valid() {
                "valid".to_string()
            } else {
                format!("invalid at line {}", validation.lines_checked())
            },
        );
    }

    if let Some(ref dispatch) = report.dispatch {
        row(
            "dispatch",
            match dispatch {
                Dispatch::Sequential => "sequential".to_string(),
                Dispatch::Partitioned { workers } => format!("partitioned ({} workers)", workers),
            },
        );
    }

    if let Some(ref stats) = report.import {
        row("lines read", format_number(stats.lines_read));
        row("lines skipped", format_number(stats.lines_skipped));
        row("documents delivered", format_number(stats.batches.documents_delivered));
        row("documents dropped", format_number(stats.batches.documents_dropped));
        row(
            "batches delivered / dropped",
            format!(
                "{} / {}",
                format_number(stats.batches.batches_delivered),
                format_number(stats.batches.batches_dropped)
            ),
        );
        row(
            "failed workers",
            format!("{} of {}", report.failed_workers(), report.workers.len()),
        );
    }

    table.to_string()
}
