//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! Someone asked for line 31,337,042 of a file that does not fit in RAM.
//! Politely. As if that were a normal thing to ask a file.
//!
//! This module answers that question without slurping the whole file:
//! one forward `memchr` pass counts the lines up front, and each worker
//! builds a sparse checkpoint index covering only the range it was assigned
//! (one byte offset every 1024 lines, not one per line). Reads inside that
//! range go through a single buffered reader that remembers where it is, so
//! walking a range start-to-end costs exactly one seek.
//!
//! 🧠 Knowledge graph:
//! - `total_lines(path)` → newline count (+1 for an unterminated last line)
//! - `LineSource` → bound to ONE path, so its cache can't leak into another file
//! - `index_range` → checkpoints for `[start, stop]`, built with one early-exiting scan
//! - `clear_cache` → drop the index and the reader once the range is consumed
//!
//! 🦆 (mandatory, no notes)

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use memchr::memchr_iter;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tracing::trace;

use crate::common::LineRange;
use crate::error::LoadError;

// -- 📏 64 KiB per read. Big enough for memchr to stretch its SIMD legs, small enough to not care.
const SCAN_CHUNK_BYTES: usize = 64 * 1024;

/// 🔢 Count the records in a file with a single forward scan.
///
/// Every `\n` ends a record. A non-empty tail without a trailing newline is a record
/// too, because people hand-edit NDJSON and forget the last Enter. An empty file has 0.
pub async fn total_lines(path: &Path) -> Result<u64, LoadError> {
    let mut file = File::open(path)
        .await
        .map_err(|e| LoadError::io(path, e))?;
    let mut chunk = vec![0u8; SCAN_CHUNK_BYTES];
    let mut newlines = 0u64;
    let mut last_byte = None;

    loop {
        let bytes_read = file
            .read(&mut chunk)
            .await
            .map_err(|e| LoadError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        newlines += memchr_iter(b'\n', &chunk[..bytes_read]).count() as u64;
        last_byte = Some(chunk[bytes_read - 1]);
    }

    Ok(match last_byte {
        Some(b) if b != b'\n' => newlines + 1,
        _ => newlines,
    })
}

// -- 📍 one remembered offset per this many lines. random access reads at most this many lines forward.
const CHECKPOINT_EVERY: u64 = 1024;

/// 📇 Sparse byte offsets for one range. `checkpoints[i]` is where line
/// `range.start + i * CHECKPOINT_EVERY` begins.
#[derive(Debug)]
struct LineIndex {
    range: LineRange,
    checkpoints: Vec<u64>,
}

impl LineIndex {
    /// 📍 The nearest checkpoint at or before `line`, as `(line number, byte offset)`.
    fn checkpoint_for(&self, line: u64) -> Option<(u64, u64)> {
        if !self.range.contains(line) {
            return None;
        }
        let slot = (line - self.range.start) / CHECKPOINT_EVERY;
        self.checkpoints
            .get(slot as usize)
            .map(|&offset| (self.range.start + slot * CHECKPOINT_EVERY, offset))
    }
}

/// 🔍 Walk the file once, writing down where every `CHECKPOINT_EVERY`-th line of `range`
/// starts. Stops as soon as it has passed `range.stop`, so the tail of the file is never read.
async fn scan_offsets(path: &Path, range: LineRange) -> Result<Vec<u64>, LoadError> {
    let mut offsets = Vec::with_capacity((range.len() / CHECKPOINT_EVERY + 1) as usize);
    if range.is_empty() {
        return Ok(offsets);
    }

    let mut file = File::open(path)
        .await
        .map_err(|e| LoadError::io(path, e))?;
    let mut chunk = vec![0u8; SCAN_CHUNK_BYTES];
    // -- line 1 starts at byte 0. it's the only line that doesn't need a newline to exist.
    let mut current_line = 1u64;
    let mut chunk_base = 0u64;
    if range.contains(current_line) {
        offsets.push(0);
    }

    'scan: loop {
        let bytes_read = file
            .read(&mut chunk)
            .await
            .map_err(|e| LoadError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        for newline_at in memchr_iter(b'\n', &chunk[..bytes_read]) {
            current_line += 1;
            if current_line > range.stop {
                break 'scan;
            }
            if current_line >= range.start && (current_line - range.start) % CHECKPOINT_EVERY == 0 {
                offsets.push(chunk_base + newline_at as u64 + 1);
            }
        }
        chunk_base += bytes_read as u64;
    }

    trace!(
        "📇 indexed {} checkpoints for {:?} in '{}'",
        offsets.len(),
        range,
        path.display()
    );
    Ok(offsets)
}

/// 📂 Random access to the lines of one file, one worker at a time.
///
/// Owned by exactly one worker. Not `Clone`, not shared, not synchronized, and it
/// doesn't need to be: ranges never overlap, so nobody else wants this reader.
pub struct LineSource {
    path: PathBuf,
    total: u64,
    index: Option<LineIndex>,
    reader: Option<BufReader<File>>,
    // -- 🧭 the line the reader will yield next, if we know it. None = seek before reading.
    next_line: Option<u64>,
}

impl std::fmt::Debug for LineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 BufReader<File> has nothing interesting to say. We speak for it.
        f.debug_struct("LineSource")
            .field("path", &self.path)
            .field("total", &self.total)
            .field("indexed", &self.index.as_ref().map(|i| i.range))
            .field("next_line", &self.next_line)
            .finish()
    }
}

impl LineSource {
    /// 🚀 Open a source and count its lines. One full scan, paid once.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let path = path.into();
        let total = total_lines(&path).await?;
        Ok(Self::with_total(path, total))
    }

    /// 🧵 Build a source when the line count is already known. The supervisor counts once
    /// and hands the number to every worker instead of making each of them re-scan.
    pub fn with_total(path: impl Into<PathBuf>, total: u64) -> Self {
        Self {
            path: path.into(),
            total,
            index: None,
            reader: None,
            next_line: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_lines(&self) -> u64 {
        self.total
    }

    /// 📇 The range the offset cache currently covers, if any.
    pub fn indexed_range(&self) -> Option<LineRange> {
        self.index.as_ref().map(|i| i.range)
    }

    /// 📇 Build the offset index for `range`, replacing whatever was cached before.
    pub async fn index_range(&mut self, range: LineRange) -> Result<(), LoadError> {
        if !range.is_empty() && (range.start == 0 || range.stop > self.total) {
            return Err(self.not_found(if range.start == 0 { 0 } else { range.stop }));
        }
        let offsets = scan_offsets(&self.path, range).await?;
        self.index = Some(LineIndex {
            range,
            checkpoints: offsets,
        });
        Ok(())
    }

    /// 📖 Fetch line `n` (1-indexed) without its `\n` / `\r\n` terminator.
    ///
    /// Sequential calls inside the indexed range just keep reading. Anything else seeks.
    /// Asking outside the indexed range re-indexes to that single line, which costs a scan:
    /// call `index_range` first if you plan to walk a range.
    pub async fn get_line(&mut self, n: u64) -> Result<String, LoadError> {
        if n == 0 || n > self.total {
            return Err(self.not_found(n));
        }

        let needs_seek = self.next_line != Some(n);
        // -- 🧭 forget where we are until the read succeeds. a failed read leaves the cursor in limbo.
        self.next_line = None;

        let mut reader = match self.reader.take() {
            Some(reader) => reader,
            None => {
                let file = File::open(&self.path)
                    .await
                    .map_err(|e| LoadError::io(&self.path, e))?;
                BufReader::new(file)
            }
        };

        if needs_seek {
            let (mut at_line, offset) = match self.index.as_ref().and_then(|i| i.checkpoint_for(n)) {
                Some(checkpoint) => checkpoint,
                None => {
                    self.index_range(LineRange::new(n, n)).await?;
                    self.index
                        .as_ref()
                        .and_then(|i| i.checkpoint_for(n))
                        .ok_or_else(|| self.not_found(n))?
                }
            };
            reader
                .seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| LoadError::io(&self.path, e))?;
            // -- 🚶 walk forward from the checkpoint. raw bytes, so a skipped line can't trip UTF-8 checks.
            let mut skipped = Vec::new();
            while at_line < n {
                skipped.clear();
                let bytes_read = reader
                    .read_until(b'\n', &mut skipped)
                    .await
                    .map_err(|e| LoadError::io(&self.path, e))?;
                if bytes_read == 0 {
                    return Err(self.not_found(n));
                }
                at_line += 1;
            }
        }

        let mut line = String::new();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| LoadError::io(&self.path, e))?;
        self.reader = Some(reader);
        if bytes_read == 0 {
            // -- 💀 the file got shorter while we weren't looking. truncated under our feet.
            return Err(self.not_found(n));
        }

        self.next_line = Some(n + 1);
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    /// 🗑️ Drop the offset index and the reader. Called once a worker's range is consumed.
    pub fn clear_cache(&mut self) {
        self.index = None;
        self.reader = None;
        self.next_line = None;
    }

    fn not_found(&self, line: u64) -> LoadError {
        LoadError::NotFound {
            path: self.path.clone(),
            line,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_fixture(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("💀 tempfile refused to exist");
        file.write_all(contents.as_bytes())
            .expect("💀 the disk said 'new phone who dis'");
        file
    }

    #[tokio::test]
    async fn the_one_where_newlines_are_counted_with_and_without_the_last_enter() {
        let terminated = write_fixture("{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n");
        let unterminated = write_fixture("{\"a\":1}\n{\"a\":2}\n{\"a\":3}");
        let empty = write_fixture("");

        assert_eq!(total_lines(terminated.path()).await.unwrap(), 3);
        assert_eq!(total_lines(unterminated.path()).await.unwrap(), 3);
        assert_eq!(total_lines(empty.path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn the_one_where_a_missing_file_is_an_io_error_not_a_zero() {
        let result = total_lines(Path::new("/definitely/not/a/real/file.ndjson")).await;
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[tokio::test]
    async fn the_one_where_a_range_is_walked_start_to_end() {
        let contents: String = (1..=10).map(|i| format!("{{\"line\":{i}}}\n")).collect();
        let fixture = write_fixture(&contents);
        let mut source = LineSource::open(fixture.path()).await.unwrap();
        assert_eq!(source.total_lines(), 10);

        source.index_range(LineRange::new(4, 7)).await.unwrap();
        for n in 4..=7 {
            assert_eq!(source.get_line(n).await.unwrap(), format!("{{\"line\":{n}}}"));
        }
        assert_eq!(source.indexed_range(), Some(LineRange::new(4, 7)));
    }

    #[tokio::test]
    async fn the_one_where_random_access_jumps_around_and_lands_every_time() {
        let fixture = write_fixture("zero\r\none\ntwo\nthree");
        let mut source = LineSource::open(fixture.path()).await.unwrap();

        assert_eq!(source.get_line(4).await.unwrap(), "three");
        assert_eq!(source.get_line(1).await.unwrap(), "zero", "\\r\\n is trimmed too");
        assert_eq!(source.get_line(3).await.unwrap(), "two");
        assert_eq!(source.get_line(2).await.unwrap(), "one");
    }

    #[tokio::test]
    async fn the_one_where_line_zero_and_line_too_far_are_not_found() {
        let fixture = write_fixture("a\nb\n");
        let mut source = LineSource::open(fixture.path()).await.unwrap();

        assert!(matches!(source.get_line(0).await, Err(LoadError::NotFound { line: 0, .. })));
        assert!(matches!(
            source.get_line(3).await,
            Err(LoadError::NotFound { line: 3, total: 2, .. })
        ));
        assert!(matches!(
            source.index_range(LineRange::new(1, 3)).await,
            Err(LoadError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn the_one_where_clear_cache_forgets_everything_but_still_works_after() {
        let fixture = write_fixture("a\nb\nc\n");
        let mut source = LineSource::open(fixture.path()).await.unwrap();
        source.index_range(LineRange::new(1, 3)).await.unwrap();
        assert_eq!(source.get_line(1).await.unwrap(), "a");

        source.clear_cache();
        assert_eq!(source.indexed_range(), None);
        assert_eq!(source.get_line(3).await.unwrap(), "c");
    }

    #[tokio::test]
    async fn the_one_where_offsets_span_chunk_boundaries() {
        // 🧪 lines long enough that the 64 KiB scan chunks split them mid-line
        let long_line = "x".repeat(10_000);
        let contents: String = (0..20).map(|i| format!("{i}{long_line}\n")).collect();
        let fixture = write_fixture(&contents);
        let mut source = LineSource::open(fixture.path()).await.unwrap();

        source.index_range(LineRange::new(15, 20)).await.unwrap();
        let line = source.get_line(17).await.unwrap();
        assert!(line.starts_with("16x"), "line 17 holds the 0-based 16th entry");
        assert_eq!(line.len(), 2 + long_line.len());
    }

    #[tokio::test]
    async fn the_one_where_the_index_stays_skinny_and_still_finds_everything() {
        let contents: String = (1..=5000).map(|i| format!("{{\"line\":{i}}}\n")).collect();
        let fixture = write_fixture(&contents);
        let mut source = LineSource::open(fixture.path()).await.unwrap();

        source.index_range(LineRange::new(1, 5000)).await.unwrap();
        let checkpoints = &source.index.as_ref().unwrap().checkpoints;
        assert_eq!(checkpoints.len(), 5, "lines 1, 1025, 2049, 3073, 4097. not 5000 offsets");

        for n in [3000, 4097, 1024, 1, 5000, 2049] {
            assert_eq!(source.get_line(n).await.unwrap(), format!("{{\"line\":{n}}}"));
        }
        // -- 🧭 and the cursor still rolls straight on after a jump
        assert_eq!(source.get_line(2050).await.unwrap(), "{\"line\":2050}");
    }

    #[tokio::test]
    async fn the_one_where_a_range_in_the_middle_checkpoints_from_its_own_start() {
        let contents: String = (1..=3000).map(|i| format!("{{\"line\":{i}}}\n")).collect();
        let fixture = write_fixture(&contents);
        let mut source = LineSource::open(fixture.path()).await.unwrap();

        source.index_range(LineRange::new(1001, 3000)).await.unwrap();
        assert_eq!(source.index.as_ref().unwrap().checkpoints.len(), 2);
        assert_eq!(source.get_line(2999).await.unwrap(), "{\"line\":2999}");
        assert_eq!(source.get_line(1001).await.unwrap(), "{\"line\":1001}");
    }
}
