//! Batch ingest: decode corpus records in parallel, then fold them into a trie.
//!
//! Decoding is embarrassingly parallel and runs on the rayon pool. Merging
//! follows a [`BuildStrategy`]. A [`CancelFlag`] is checked between units of
//! work; a cancelled batch keeps what completed and never half-inserts a
//! record.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use syntaviz_parse::{parse_record_line, CorpusRecord, ParseError};

use crate::builder::{build_sharded, BuildOptions, TrieBuilder};
use crate::corpus::byte_lines;
use crate::error::Result;
use crate::{ClusterTrie, QueryId};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for signal handlers that set it directly.
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStrategy {
    /// Sequential inserts in record order.
    #[default]
    SingleWriter,
    /// Parallel per-root-label shards, grafted under one root.
    ShardByRoot,
}

/// A record left out of the trie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    /// Zero-based line index in the input.
    pub index: usize,
    /// Known once the record decoded.
    pub query_id: Option<QueryId>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub records_read: usize,
    pub inserted: usize,
    /// Lines that did not decode.
    pub corrupt: Vec<SkippedRecord>,
    /// Records the builder refused.
    pub rejected: Vec<SkippedRecord>,
    pub cancelled: bool,
}

impl IngestReport {
    pub fn skipped(&self) -> usize {
        self.corrupt.len() + self.rejected.len()
    }
}

/// Result of a full ingest.
#[derive(Debug)]
pub struct Ingested {
    pub trie: ClusterTrie,
    /// Records that made it into the trie, in input order.
    pub records: Vec<CorpusRecord>,
    pub report: IngestReport,
}

/// Decode `(index, line)` pairs in parallel, preserving input order.
///
/// Lines not yet started when `cancel` trips are dropped; the flag in the
/// returned report says whether that happened.
pub fn decode_records(
    lines: &[(usize, String)],
    cancel: &CancelFlag,
) -> (Vec<(usize, CorpusRecord)>, IngestReport) {
    let decoded: Vec<Option<_>> = lines
        .par_iter()
        .map(|(index, line)| {
            if cancel.is_cancelled() {
                None
            } else {
                Some((*index, parse_record_line(line, index + 1)))
            }
        })
        .collect();

    let mut report = IngestReport {
        records_read: lines.len(),
        ..IngestReport::default()
    };
    let mut records = Vec::with_capacity(decoded.len());
    for item in decoded {
        match item {
            None => report.cancelled = true,
            Some((index, Ok(record))) => records.push((index, record)),
            Some((index, Err(err))) => {
                tracing::warn!(line = index + 1, error = %err, "skipping corrupt record");
                report.corrupt.push(SkippedRecord {
                    index,
                    query_id: None,
                    reason: err.to_string(),
                });
            }
        }
    }
    (records, report)
}

fn refusal(index: usize, query_id: QueryId, reason: String) -> SkippedRecord {
    tracing::warn!(line = index + 1, query_id, error = %reason, "skipping record");
    SkippedRecord {
        index,
        query_id: Some(query_id),
        reason,
    }
}

/// Fold decoded records into a trie, adding refusals to `report`.
pub fn build_from_records(
    records: Vec<(usize, CorpusRecord)>,
    options: &BuildOptions,
    strategy: BuildStrategy,
    cancel: &CancelFlag,
    report: &mut IngestReport,
) -> (ClusterTrie, Vec<CorpusRecord>) {
    let mut kept = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    let trie = match strategy {
        BuildStrategy::SingleWriter => {
            let mut builder = TrieBuilder::new(*options);
            for (index, record) in records {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                match builder.insert(&record.tree, record.query_id) {
                    Ok(()) => kept.push(record),
                    Err(err) => rejected.push(refusal(index, record.query_id, err.to_string())),
                }
            }
            builder.finish()
        }
        BuildStrategy::ShardByRoot if cancel.is_cancelled() => {
            report.cancelled = true;
            TrieBuilder::new(*options).finish()
        }
        BuildStrategy::ShardByRoot => {
            let (trie, refused) = build_sharded(
                records.iter().map(|(_, r)| (&r.tree, r.query_id)),
                options,
            );
            let mut refused = refused.into_iter().peekable();
            for (position, (index, record)) in records.into_iter().enumerate() {
                match refused.next_if(|r| r.position == position) {
                    Some(r) => rejected.push(refusal(index, r.query_id, r.error.to_string())),
                    None => kept.push(record),
                }
            }
            trie
        }
    };

    report.rejected.extend(rejected);
    report.inserted = kept.len();
    (trie, kept)
}

/// Read record lines and build a trie from them.
///
/// I/O errors abort the ingest; bad records, including lines that are not
/// valid UTF-8, are skipped and reported.
pub fn ingest_lines<R: BufRead>(
    reader: R,
    options: &BuildOptions,
    strategy: BuildStrategy,
    cancel: &CancelFlag,
) -> Result<Ingested> {
    let mut lines = Vec::new();
    let mut undecodable = Vec::new();
    for (index, bytes) in byte_lines(reader).enumerate() {
        match String::from_utf8(bytes?) {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => lines.push((index, line)),
            Err(err) => {
                let err = ParseError::CorruptRecord {
                    line: index + 1,
                    reason: format!("not valid UTF-8 ({})", err.utf8_error()),
                };
                tracing::warn!(line = index + 1, error = %err, "skipping corrupt record");
                undecodable.push(SkippedRecord {
                    index,
                    query_id: None,
                    reason: err.to_string(),
                });
            }
        }
    }

    let (records, mut report) = decode_records(&lines, cancel);
    if !undecodable.is_empty() {
        report.records_read += undecodable.len();
        report.corrupt.extend(undecodable);
        report.corrupt.sort_by_key(|skipped| skipped.index);
    }
    let (trie, records) = build_from_records(records, options, strategy, cancel, &mut report);

    tracing::info!(
        records = report.records_read,
        inserted = report.inserted,
        corrupt = report.corrupt.len(),
        rejected = report.rejected.len(),
        nodes = trie.node_count(),
        cancelled = report.cancelled,
        "built cluster trie"
    );

    Ok(Ingested {
        trie,
        records,
        report,
    })
}
