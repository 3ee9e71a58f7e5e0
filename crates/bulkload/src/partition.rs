//! 🍰 partition.rs — cutting the file into slices so nobody fights over the last piece.
//!
//! Every worker gets `total / workers` lines. The last worker also eats the
//! remainder, because someone has to and it's always the last one at the table.

use crate::common::LineRange;

/// 🍰 Split `[1, total_lines]` into `workers` contiguous, non-overlapping ranges.
///
/// `partition(37, 4)` → `[1..=9, 10..=18, 19..=27, 28..=37]`.
///
/// ⚠️ With fewer lines than workers, the leading ranges come back empty and the last one
/// takes everything. Still a correct cover, just a silly one. The supervisor keeps
/// small files away from here.
pub fn partition(total_lines: u64, workers: usize) -> Vec<LineRange> {
    let workers = workers.max(1) as u64;
    let base = total_lines / workers;

    let mut ranges: Vec<LineRange> = (0..workers)
        .map(|i| LineRange::new(base * i + 1, base * (i + 1)))
        .collect();

    // -- 🧹 the remainder goes to the last worker. no exceptions, no appeals.
    if let Some(last) = ranges.last_mut() {
        *last = LineRange::new(base * (workers - 1) + 1, total_lines);
    }
    ranges
}
