//! Indentation transcripts: one ascii-tree line at a time.
//!
//! The parser prints the syntactic root unmarked and every other node behind a
//! `+-- ` marker, indented in 4-column steps:
//!
//! ```text
//! find VB ROOT
//! +-- me PRP iobj
//! +-- movies NNS dobj
//!     +-- funny JJ amod
//! ```
//!
//! [`TreeReconstructor`] consumes these lines one by one. It keeps only the
//! chain of still-open nodes from the root to the most recent line; a node is
//! attached to its parent when a later line (or the end of the transcript)
//! closes it.

use crate::error::ReconstructError;
use crate::tree::TreeNode;

/// Depth marker preceding every non-root label.
pub const MARKER: &str = "+--";
/// Columns per depth level.
pub const INDENT_WIDTH: usize = 4;

/// One line of an indentation transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    /// `None` for the root (no marker); `Some(d)` for a node printed at
    /// marker depth `d` (children of the root are depth 0).
    pub depth: Option<usize>,
    pub label: String,
}

impl TranscriptLine {
    pub fn root(label: impl Into<String>) -> Self {
        Self {
            depth: None,
            label: label.into(),
        }
    }

    pub fn child(depth: usize, label: impl Into<String>) -> Self {
        Self {
            depth: Some(depth),
            label: label.into(),
        }
    }

    /// Classify a raw transcript line by the offset of its marker.
    pub fn parse(line: &str) -> Self {
        match line.find(MARKER) {
            None => Self::root(line.trim()),
            Some(offset) => Self::child(
                offset / INDENT_WIDTH,
                line[offset + MARKER.len()..].trim(),
            ),
        }
    }

    /// Signed level: `-1` for the root, the marker depth otherwise.
    pub fn level(&self) -> isize {
        self.depth.map_or(-1, |d| d as isize)
    }

    /// Render back to the transcript form (blank indentation filler).
    pub fn render(&self) -> String {
        match self.depth {
            None => self.label.clone(),
            Some(depth) => format!(
                "{}{MARKER} {}",
                " ".repeat(depth * INDENT_WIDTH),
                self.label
            ),
        }
    }
}

/// Push-based rebuilder of a single query's tree.
#[derive(Debug, Default)]
pub struct TreeReconstructor {
    /// Open nodes from the root (index 0) down to the most recent line.
    open: Vec<TreeNode>,
    lines_seen: usize,
}

impl TreeReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level of the most recently pushed line (`-1` above/at the root).
    pub fn current_level(&self) -> isize {
        self.open.len() as isize - 2
    }

    pub fn lines_seen(&self) -> usize {
        self.lines_seen
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Parse and push a raw line.
    pub fn push_raw(&mut self, line: &str) -> Result<(), ReconstructError> {
        self.push_line(&TranscriptLine::parse(line))
    }

    pub fn push_line(&mut self, line: &TranscriptLine) -> Result<(), ReconstructError> {
        self.lines_seen += 1;
        let line_no = self.lines_seen;

        let Some(next_level) = line.depth else {
            if !self.open.is_empty() {
                return Err(ReconstructError::MultipleRoots {
                    line: line_no,
                    label: line.label.clone(),
                });
            }
            self.open.push(TreeNode::new(line.label.clone()));
            return Ok(());
        };

        if self.open.is_empty() {
            return Err(ReconstructError::MissingRoot {
                line: line_no,
                label: line.label.clone(),
            });
        }

        let current = self.current_level();
        if next_level as isize > current + 1 {
            return Err(ReconstructError::SkippedLevel {
                line: line_no,
                current,
                found: next_level,
            });
        }

        // Same level closes one group, shallower closes `current - next + 1`;
        // afterwards the new node's parent is on top of the stack.
        self.close_until(next_level + 1);
        self.open.push(TreeNode::new(line.label.clone()));
        Ok(())
    }

    /// Close all open groups and return the finished tree.
    pub fn finish(mut self) -> Result<TreeNode, ReconstructError> {
        self.close_until(1);
        self.open.pop().ok_or(ReconstructError::EmptyTranscript)
    }

    fn close_until(&mut self, len: usize) {
        while self.open.len() > len {
            let Some(done) = self.open.pop() else {
                break;
            };
            if let Some(parent) = self.open.last_mut() {
                parent.children.push(done);
            }
        }
    }
}

/// Rebuild one tree from a complete single-query transcript.
pub fn reconstruct<I, S>(lines: I) -> Result<TreeNode, ReconstructError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut reconstructor = TreeReconstructor::new();
    for line in lines {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }
        reconstructor.push_raw(line)?;
    }
    reconstructor.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(depths: &[isize]) -> Vec<TranscriptLine> {
        depths
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                if d < 0 {
                    TranscriptLine::root(format!("n{i}"))
                } else {
                    TranscriptLine::child(d as usize, format!("n{i}"))
                }
            })
            .collect()
    }

    fn rebuild(depths: &[isize]) -> Result<TreeNode, ReconstructError> {
        let mut r = TreeReconstructor::new();
        for line in lines(depths) {
            r.push_line(&line)?;
        }
        r.finish()
    }

    #[test]
    fn parses_marker_offsets() {
        assert_eq!(
            TranscriptLine::parse("find VB ROOT"),
            TranscriptLine::root("find VB ROOT")
        );
        assert_eq!(
            TranscriptLine::parse("+-- me PRP iobj"),
            TranscriptLine::child(0, "me PRP iobj")
        );
        assert_eq!(
            TranscriptLine::parse("|   |   +-- funny JJ amod"),
            TranscriptLine::child(2, "funny JJ amod")
        );
        assert_eq!(
            TranscriptLine::parse("    +-- x NN dep  "),
            TranscriptLine::child(1, "x NN dep")
        );
    }

    #[test]
    fn render_parse_roundtrip() {
        for line in [
            TranscriptLine::root("a"),
            TranscriptLine::child(0, "b"),
            TranscriptLine::child(3, "c d e"),
        ] {
            assert_eq!(TranscriptLine::parse(&line.render()), line);
        }
    }

    #[test]
    fn rebuilds_nested_siblings() {
        // root, child, grandchild, child, grandchild, great-grandchild, child
        let tree = rebuild(&[-1, 0, 1, 0, 1, 2, 0]).unwrap();
        assert_eq!(tree.label, "n0");
        let kids: Vec<&str> = tree.children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(kids, vec!["n1", "n3", "n6"]);
        assert_eq!(tree.children[0].children[0].label, "n2");
        assert_eq!(tree.children[1].children[0].children[0].label, "n5");
        assert!(tree.children[2].is_leaf());
    }

    #[test]
    fn closing_several_levels_at_once() {
        let tree = rebuild(&[-1, 0, 1, 2, 3, 0]).unwrap();
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].max_depth(), 3);
        assert_eq!(tree.children[1].label, "n5");
    }

    #[test]
    fn skipped_level_is_fatal() {
        let err = rebuild(&[-1, 0, 2]).unwrap_err();
        assert_eq!(
            err,
            ReconstructError::SkippedLevel {
                line: 3,
                current: 0,
                found: 2,
            }
        );

        let err = rebuild(&[-1, 1]).unwrap_err();
        assert!(matches!(err, ReconstructError::SkippedLevel { found: 1, .. }));
    }

    #[test]
    fn second_root_and_orphan_children_are_rejected() {
        assert!(matches!(
            rebuild(&[-1, 0, -1]),
            Err(ReconstructError::MultipleRoots { line: 3, .. })
        ));
        assert!(matches!(
            rebuild(&[0, 1]),
            Err(ReconstructError::MissingRoot { line: 1, .. })
        ));
        assert_eq!(rebuild(&[]).unwrap_err(), ReconstructError::EmptyTranscript);
    }

    #[test]
    fn current_level_tracks_the_last_line() {
        let mut r = TreeReconstructor::new();
        assert_eq!(r.current_level(), -2);
        r.push_raw("root").unwrap();
        assert_eq!(r.current_level(), -1);
        r.push_raw("+-- a").unwrap();
        assert_eq!(r.current_level(), 0);
        r.push_raw("    +-- b").unwrap();
        assert_eq!(r.current_level(), 1);
        r.push_raw("+-- c").unwrap();
        assert_eq!(r.current_level(), 0);
        assert_eq!(r.lines_seen(), 4);
    }

    #[test]
    fn reconstruct_skips_blank_lines() {
        let tree = reconstruct(["root", "", "+-- a", "   ", "+-- b"]).unwrap();
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn rendered_tree_rebuilds_to_itself() {
        let tree = rebuild(&[-1, 0, 1, 1, 0, 1, 2, 2, 0]).unwrap();
        let text = tree.render_indented();
        assert_eq!(reconstruct(text.lines()).unwrap(), tree);
    }
}
