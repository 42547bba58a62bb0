//! Merge line-oriented URL source files into one deduplicated script link list.
//!
//! Every source is scanned in the order given. Lines are trimmed and kept only when
//! they look like a script URL; the first record seen for each canonical key wins and
//! later variants (even with a different query string) are dropped.

use anyhow::{Context, Result};
use jsgrab_core::{is_script_candidate, CanonicalKey};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Canonical key -> first-seen record, iterated in insertion order.
#[derive(Debug, Default)]
pub struct DedupTable {
    seen: HashSet<CanonicalKey>,
    records: Vec<String>,
}

impl DedupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `record` introduced a new canonical key.
    pub fn insert(&mut self, record: &str) -> bool {
        if !self.seen.insert(CanonicalKey::from(record)) {
            return false;
        }
        self.records.push(record.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(String::as_str)
    }

    pub fn into_records(self) -> Vec<String> {
        self.records
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Sources that were opened (fully or partially read).
    pub sources_read: usize,
    /// Sources that could not be opened.
    pub sources_skipped: usize,
    /// Lines that passed the script filter, duplicates included.
    pub candidates: usize,
    /// Records written to the output file.
    pub unique: usize,
}

/// Feed every candidate line of `reader` into `table`. Returns the number of lines that
/// passed the filter. A read error stops this source but keeps what was read so far.
/// Invalid UTF-8 is replaced with U+FFFD, and the stored record is that lossy text
/// rather than the original bytes.
pub fn absorb<R: BufRead>(table: &mut DedupTable, reader: R, source: &Path) -> usize {
    let mut candidates = 0;
    for chunk in reader.split(b'\n') {
        let bytes = match chunk {
            Ok(b) => b,
            Err(e) => {
                warn!(source = %source.display(), error = %e, "read failed, keeping lines read so far");
                break;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let line = text.trim();
        if !is_script_candidate(line) {
            continue;
        }
        candidates += 1;
        table.insert(line);
    }
    candidates
}

/// Build the dedup table from `inputs` without touching any output.
/// Sources that cannot be opened are logged and skipped.
pub fn collect_links(inputs: &[PathBuf]) -> (DedupTable, MergeSummary) {
    let mut table = DedupTable::new();
    let mut summary = MergeSummary::default();
    for path in inputs {
        let fh = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(source = %path.display(), error = %e, "could not open source, skipping");
                summary.sources_skipped += 1;
                continue;
            }
        };
        let before = table.len();
        let n = absorb(&mut table, BufReader::new(fh), path);
        debug!(source = %path.display(), candidates = n, new = table.len() - before, "source merged");
        summary.sources_read += 1;
        summary.candidates += n;
    }
    summary.unique = table.len();
    (table, summary)
}

/// Create (or truncate) `output` and write one link per line.
pub fn write_links<'a, I>(output: &Path, links: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let file = File::create(output)
        .with_context(|| format!("failed to create output file {}", output.display()))?;
    let mut w = BufWriter::new(file);
    let mut written = 0usize;
    for link in links {
        writeln!(w, "{}", link).with_context(|| format!("failed writing {}", output.display()))?;
        written += 1;
    }
    w.flush().with_context(|| format!("failed writing {}", output.display()))?;
    Ok(written)
}

/// Merge `inputs` (in order) into `output`, rewriting it entirely.
/// Failing to create the output file is the only fatal error.
pub fn merge_links(inputs: &[PathBuf], output: &Path) -> Result<MergeSummary> {
    let (table, mut summary) = collect_links(inputs);
    summary.unique = write_links(output, table.iter())?;
    info!(
        output = %output.display(),
        unique = summary.unique,
        candidates = summary.candidates,
        skipped = summary.sources_skipped,
        "merged script links"
    );
    Ok(summary)
}

/// Read a link list back: trimmed lines, blanks dropped, order preserved.
pub fn read_links(path: &Path) -> Result<Vec<String>> {
    let fh = File::open(path).with_context(|| format!("failed to open link list {}", path.display()))?;
    let mut urls = Vec::new();
    for line in BufReader::new(fh).lines() {
        let line = line.with_context(|| format!("failed reading {}", path.display()))?;
        let url = line.trim();
        if !url.is_empty() {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}
