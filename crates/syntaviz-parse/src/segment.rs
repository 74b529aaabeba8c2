//! Splitting a multi-query indentation transcript into per-query trees.
//!
//! The parser prints, for every query:
//!
//! ```text
//! Input: find me funny movies
//! Parse:
//! find VB ROOT
//!  +-- me PRP iobj
//!  +-- movies NNS dobj
//!      +-- funny JJ amod
//! ```
//!
//! An `Input:` header closes the previous transcript. Tree bodies are
//! reconstructed incrementally as lines arrive. A malformed transcript yields
//! exactly one `Err` in its slot, so a caller zipping the output with the
//! query ids fed to the parser stays aligned.

use thiserror::Error;

use crate::error::ReconstructError;
use crate::transcript::TreeReconstructor;
use crate::tree::TreeNode;

pub const QUERY_HEADER: &str = "Input:";
pub const TREE_HEADER: &str = "Parse:";

/// A successfully rebuilt transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTranscript {
    pub query: String,
    pub tree: TreeNode,
    /// 1-based input line of the `Input:` header.
    pub header_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transcript for `{query}` (input line {header_line}): {source}")]
pub struct SegmentError {
    pub query: String,
    pub header_line: usize,
    #[source]
    pub source: ReconstructError,
}

struct Pending {
    query: String,
    header_line: usize,
    reconstructor: TreeReconstructor,
    error: Option<ReconstructError>,
}

impl Pending {
    fn new(query: String, header_line: usize) -> Self {
        Self {
            query,
            header_line,
            reconstructor: TreeReconstructor::new(),
            error: None,
        }
    }

    fn push(&mut self, line: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.reconstructor.push_raw(line) {
            self.error = Some(err);
        }
    }

    fn finish(self) -> Result<ParsedTranscript, SegmentError> {
        let result = match self.error {
            Some(err) => Err(err),
            None => self.reconstructor.finish(),
        };
        match result {
            Ok(tree) => Ok(ParsedTranscript {
                query: self.query,
                tree,
                header_line: self.header_line,
            }),
            Err(source) => Err(SegmentError {
                query: self.query,
                header_line: self.header_line,
                source,
            }),
        }
    }
}

/// Iterator over the transcripts of an indentation-formatted parser stream.
pub struct IndentedSegmenter<I> {
    lines: I,
    line_no: usize,
    pending: Option<Pending>,
    orphan_lines: usize,
}

impl<I> IndentedSegmenter<I> {
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            line_no: 0,
            pending: None,
            orphan_lines: 0,
        }
    }

    /// Tree lines seen before the first `Input:` header (ignored).
    pub fn orphan_lines(&self) -> usize {
        self.orphan_lines
    }
}

impl<I, S> Iterator for IndentedSegmenter<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = Result<ParsedTranscript, SegmentError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(raw) = self.lines.next() else {
                return self.pending.take().map(Pending::finish);
            };
            self.line_no += 1;

            // The parser indents its ascii trees by one column.
            let raw = raw.as_ref();
            let line = raw.strip_prefix(' ').unwrap_or(raw).trim_end();

            if let Some(rest) = line.strip_prefix(QUERY_HEADER) {
                let next = Pending::new(rest.trim().to_string(), self.line_no);
                if let Some(done) = self.pending.replace(next) {
                    return Some(done.finish());
                }
                continue;
            }

            if line.starts_with(TREE_HEADER) {
                if let Some(pending) = self.pending.as_mut() {
                    pending.reconstructor = TreeReconstructor::new();
                    pending.error = None;
                }
                continue;
            }

            if line.is_empty() {
                continue;
            }

            match self.pending.as_mut() {
                Some(pending) => pending.push(line),
                None => self.orphan_lines += 1,
            }
        }
    }
}
