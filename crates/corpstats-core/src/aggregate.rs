//! Cross-file frequency aggregation.
//!
//! Each source file is counted independently into its own [`FrequencyTable`];
//! partial tables are then folded together by adding counts per key. The
//! fold is associative and commutative, so neither the file order nor the
//! number of workers changes the result.

use std::cmp::Reverse;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::progress::fmt_num;
use crate::source::{AnnotationSource, AnnotationStream};

/// One selected value per column for a single token occurrence.
///
/// Ordering is lexicographic column by column, in declared column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrequencyKey(Vec<String>);

impl FrequencyKey {
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for FrequencyKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Occurrence count per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: FxHashMap<FrequencyKey, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: FrequencyKey, n: u64) {
        *self.counts.entry(key).or_insert(0) += n;
    }

    pub fn increment(&mut self, key: FrequencyKey) {
        self.add(key, 1);
    }

    /// Fold `other` into `self` by adding counts per key.
    pub fn merge(&mut self, other: FrequencyTable) {
        if self.counts.len() < other.counts.len() {
            let smaller = std::mem::replace(&mut self.counts, other.counts);
            for (key, n) in smaller {
                *self.counts.entry(key).or_insert(0) += n;
            }
        } else {
            for (key, n) in other.counts {
                *self.counts.entry(key).or_insert(0) += n;
            }
        }
    }

    /// [`merge`](Self::merge) as a by-value combine, for folds and reductions.
    pub fn merged(mut self, other: FrequencyTable) -> Self {
        self.merge(other);
        self
    }

    /// Drop keys seen fewer than `min_count` times.
    pub fn apply_cutoff(mut self, min_count: u64) -> Self {
        if min_count > 1 {
            self.counts.retain(|_, n| *n >= min_count);
        }
        self
    }

    pub fn get(&self, key: &FrequencyKey) -> Option<u64> {
        self.counts.get(key).copied()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FrequencyKey, u64)> {
        self.counts.iter().map(|(k, n)| (k, *n))
    }

    /// Rows in emission order: count descending, then key ascending.
    pub fn sorted_rows(&self) -> Vec<(&FrequencyKey, u64)> {
        let mut rows: Vec<_> = self.iter().collect();
        rows.sort_unstable_by(|a, b| (Reverse(a.1), a.0).cmp(&(Reverse(b.1), b.0)));
        rows
    }
}

impl FromIterator<(FrequencyKey, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (FrequencyKey, u64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (key, n) in iter {
            table.add(key, n);
        }
        table
    }
}

/// An output column: display name and the annotation it is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub annotation: String,
}

impl Column {
    pub fn new(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: annotation.into(),
        }
    }
}

/// What to count and how.
#[derive(Debug, Clone)]
pub struct AggregateConfig<'a> {
    pub columns: &'a [Column],
    /// Annotation whose length defines the token count of each file.
    pub token_annotation: &'a str,
    /// Keys with a total count below this are dropped after merging.
    pub min_count: u64,
    /// Worker threads for per-file passes.
    pub workers: usize,
}

/// Statistics from one aggregation run
#[derive(Debug, Clone, Default)]
pub struct AggregateStats {
    pub files: usize,
    pub tokens: u64,
    /// Distinct keys before the cutoff.
    pub distinct_keys: usize,
    /// Distinct keys kept after the cutoff.
    pub kept_keys: usize,
    pub elapsed: Duration,
}

impl AggregateStats {
    pub fn log(&self) {
        log::info!(
            "Aggregated {} tokens from {} files: {} distinct keys, {} kept [{:.1}s]",
            fmt_num(self.tokens as usize),
            fmt_num(self.files),
            fmt_num(self.distinct_keys),
            fmt_num(self.kept_keys),
            self.elapsed.as_secs_f64()
        );
    }
}

/// Count one source file. Columns are read in lock-step with the token column.
pub fn aggregate_file<A: AnnotationSource + ?Sized>(
    source: &A,
    source_file: &str,
    columns: &[Column],
    token_annotation: &str,
) -> Result<FrequencyTable> {
    let mut tokens = source.open_stream(source_file, token_annotation)?;
    let mut streams = columns
        .iter()
        .map(|c| source.open_stream(source_file, &c.annotation))
        .collect::<Result<Vec<_>>>()?;

    let mut table = FrequencyTable::new();
    let mut position = 0usize;
    while let Some(token) = tokens.next() {
        token?;
        let mut key = Vec::with_capacity(columns.len());
        for (column, stream) in columns.iter().zip(streams.iter_mut()) {
            match stream.next() {
                Some(value) => key.push(value?),
                None => {
                    return Err(misaligned(
                        source_file,
                        column,
                        position + 1 + count_rest(tokens)?,
                        position,
                    ));
                }
            }
        }
        table.increment(FrequencyKey(key));
        position += 1;
    }

    for (column, stream) in columns.iter().zip(streams) {
        let extra = count_rest(stream)?;
        if extra > 0 {
            return Err(misaligned(source_file, column, position, position + extra));
        }
    }
    Ok(table)
}

fn count_rest(mut stream: AnnotationStream<'_>) -> Result<usize> {
    stream.try_fold(0, |n, v| v.map(|_| n + 1))
}

fn misaligned(source_file: &str, column: &Column, expected: usize, actual: usize) -> Error {
    Error::Alignment {
        source_file: source_file.to_string(),
        annotation: column.annotation.clone(),
        expected,
        actual,
    }
}

/// Count every source file and merge, then apply the cutoff once.
///
/// Any file failing (including misaligned columns) aborts the whole run:
/// a silently partial corpus would produce misleading statistics.
pub fn aggregate<A: AnnotationSource + ?Sized>(
    source: &A,
    source_files: &[String],
    cfg: &AggregateConfig<'_>,
    pb: &ProgressBar,
) -> Result<(FrequencyTable, AggregateStats)> {
    let start = Instant::now();
    pb.set_length(source_files.len() as u64);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.workers.max(1))
        .build()
        .map_err(|e| Error::io("building worker pool", std::io::Error::other(e)))?;

    let table = pool.install(|| {
        source_files
            .par_iter()
            .map(|file| -> Result<FrequencyTable> {
                let table = aggregate_file(source, file, cfg.columns, cfg.token_annotation)
                    .inspect_err(|e| log::error!("{file}: {e}"))?;
                log::debug!("{file}: {} distinct keys", fmt_num(table.len()));
                pb.inc(1);
                Ok(table)
            })
            .try_reduce(FrequencyTable::new, |a, b| Ok(a.merged(b)))
    })?;
    pb.finish_and_clear();

    let tokens = table.total();
    let distinct_keys = table.len();
    let table = table.apply_cutoff(cfg.min_count);

    let stats = AggregateStats {
        files: source_files.len(),
        tokens,
        distinct_keys,
        kept_keys: table.len(),
        elapsed: start.elapsed(),
    };
    Ok((table, stats))
}
