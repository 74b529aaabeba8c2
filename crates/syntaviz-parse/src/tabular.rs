//! Tabular (CoNLL-style) transcripts.
//!
//! One tab-delimited row per token, one blank line after every query. The
//! first column (the token id) is dropped; the remaining columns are kept
//! verbatim as the row payload. Token ids are recovered from row positions.
//!
//! Unlike the indentation transcript, the tree shape is explicit in the head
//! column, so no depth state machine is needed: rows are grouped under their
//! heads and assembled bottom-up. Labels use the same `"{form} {tag} {rel}"`
//! shape the ascii tree prints, so both modes agree on the same parse.

use serde::{Deserialize, Serialize};

use crate::error::{ReconstructError, TreeFormatError};
use crate::tree::TreeNode;

/// Payload of one tabular row (all columns after the id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabularRecord {
    pub columns: Vec<String>,
}

impl TabularRecord {
    /// Split a raw row, discarding the leading id column.
    pub fn parse(line: &str) -> Self {
        Self {
            columns: line.split('\t').skip(1).map(str::to_string).collect(),
        }
    }

    pub fn column(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }
}

/// Payload column positions (after the id column has been dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConllLayout {
    pub form: usize,
    pub tag: usize,
    pub head: usize,
    pub relation: usize,
}

impl Default for ConllLayout {
    /// CoNLL-X: `FORM LEMMA CPOSTAG POSTAG FEATS HEAD DEPREL ...`.
    fn default() -> Self {
        Self {
            form: 0,
            tag: 3,
            head: 5,
            relation: 6,
        }
    }
}

impl ConllLayout {
    fn field<'r>(
        &self,
        record: &'r TabularRecord,
        token: usize,
        column: usize,
    ) -> Result<&'r str, ReconstructError> {
        record
            .column(column)
            .ok_or(ReconstructError::MissingColumn { token, column })
    }

    /// Node label for a row: `"{form} {tag} {relation}"`.
    pub fn label(&self, record: &TabularRecord, token: usize) -> Result<String, ReconstructError> {
        Ok(format!(
            "{} {} {}",
            self.field(record, token, self.form)?,
            self.field(record, token, self.tag)?,
            self.field(record, token, self.relation)?,
        ))
    }

    /// Surface form of the query (forms joined by spaces).
    pub fn sentence(&self, records: &[TabularRecord]) -> String {
        records
            .iter()
            .filter_map(|r| r.column(self.form))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Build the canonical tree of one tabular group.
pub fn tree_from_tabular(
    records: &[TabularRecord],
    layout: &ConllLayout,
) -> Result<TreeNode, ReconstructError> {
    if records.is_empty() {
        return Err(ReconstructError::EmptyTranscript);
    }

    let n = records.len();
    let mut labels = Vec::with_capacity(n);
    // children[0] holds the tokens attached to the artificial root.
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n + 1];

    for (i, record) in records.iter().enumerate() {
        let token = i + 1;
        labels.push(layout.label(record, token)?);
        let raw_head = layout.field(record, token, layout.head)?;
        let head: usize = raw_head
            .trim()
            .parse()
            .ok()
            .filter(|&h| h <= n && h != token)
            .ok_or_else(|| ReconstructError::InvalidHead {
                token,
                head: raw_head.to_string(),
            })?;
        children[head].push(token);
    }

    let root = match children[0].as_slice() {
        [] => return Err(ReconstructError::NoRootToken),
        [root] => *root,
        [first, second, ..] => {
            return Err(ReconstructError::MultipleRootTokens {
                first: *first,
                second: *second,
            })
        }
    };

    // Post-order assembly with an explicit stack: (token, next child, built children).
    let mut placed = 0usize;
    let mut stack: Vec<(usize, usize, Vec<TreeNode>)> = vec![(root, 0, Vec::new())];
    while let Some((token, next, _)) = stack.last_mut() {
        let token = *token;
        if let Some(&child) = children[token].get(*next) {
            *next += 1;
            stack.push((child, 0, Vec::new()));
            continue;
        }

        let Some((_, _, built)) = stack.pop() else {
            break;
        };
        placed += 1;
        let node = TreeNode::with_children(std::mem::take(&mut labels[token - 1]), built);
        match stack.last_mut() {
            Some((_, _, siblings)) => siblings.push(node),
            None => {
                if placed != n {
                    return Err(ReconstructError::HeadCycle {
                        detached: n - placed,
                    });
                }
                return Ok(node);
            }
        }
    }

    Err(ReconstructError::NoRootToken)
}

/// Encode a group's payload rows as a JSON array of arrays.
pub fn records_to_json(records: &[TabularRecord]) -> String {
    serde_json::to_string(records).unwrap_or_default()
}

pub fn records_from_json(text: &str) -> Result<Vec<TabularRecord>, TreeFormatError> {
    serde_json::from_str(text).map_err(|e| TreeFormatError::Json(e.to_string()))
}

/// Iterator over blank-line-terminated groups of tabular rows.
///
/// Empty groups (runs of blank lines) are skipped; a trailing group without a
/// terminating blank line is still emitted.
pub struct TabularSegmenter<I> {
    lines: I,
    done: bool,
}

impl<I> TabularSegmenter<I> {
    pub fn new(lines: I) -> Self {
        Self { lines, done: false }
    }
}

impl<I, S> Iterator for TabularSegmenter<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = Vec<TabularRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut group = Vec::new();
        loop {
            match self.lines.next() {
                Some(line) => {
                    let line = line.as_ref().trim_end_matches(['\r', '\n']);
                    if line.trim().is_empty() {
                        if group.is_empty() {
                            continue;
                        }
                        return Some(group);
                    }
                    group.push(TabularRecord::parse(line));
                }
                None => {
                    self.done = true;
                    return (!group.is_empty()).then_some(group);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONLL: &str = "\
1\tfind\t_\tVERB\tVB\t_\t0\tROOT\t_\t_
2\tme\t_\tPRON\tPRP\t_\t1\tiobj\t_\t_
3\tfunny\t_\tADJ\tJJ\t_\t4\tamod\t_\t_
4\tmovies\t_\tNOUN\tNNS\t_\t1\tdobj\t_\t_

1\twatch\t_\tVERB\tVB\t_\t0\tROOT\t_\t_
2\tnews\t_\tNOUN\tNN\t_\t1\tdobj\t_\t_
";

    fn groups() -> Vec<Vec<TabularRecord>> {
        TabularSegmenter::new(CONLL.lines()).collect()
    }

    #[test]
    fn segments_on_blank_lines() {
        let groups = groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 4);
        assert_eq!(groups[0][0].columns[0], "find");
        assert_eq!(groups[0][0].columns.len(), 9);
    }

    #[test]
    fn builds_tree_from_heads() {
        let layout = ConllLayout::default();
        let tree = tree_from_tabular(&groups()[0], &layout).unwrap();
        assert_eq!(
            tree.to_json(),
            r#"["find VB ROOT",["me PRP iobj","movies NNS dobj",["funny JJ amod"]]]"#
        );
        assert_eq!(layout.sentence(&groups()[0]), "find me funny movies");
    }

    #[test]
    fn json_payload_roundtrip() {
        let group = &groups()[1];
        let json = records_to_json(group);
        assert!(json.starts_with(r#"[["watch","_","VERB""#));
        assert_eq!(&records_from_json(&json).unwrap(), group);
    }

    fn rows(heads: &[&str]) -> Vec<TabularRecord> {
        heads
            .iter()
            .enumerate()
            .map(|(i, h)| TabularRecord::parse(&format!("{}\tw{i}\t_\tX\tT\t_\t{h}\trel", i + 1)))
            .collect()
    }

    #[test]
    fn structural_errors() {
        let layout = ConllLayout::default();
        assert_eq!(
            tree_from_tabular(&rows(&["2", "1"]), &layout).unwrap_err(),
            ReconstructError::NoRootToken
        );
        assert_eq!(
            tree_from_tabular(&rows(&["0", "0"]), &layout).unwrap_err(),
            ReconstructError::MultipleRootTokens {
                first: 1,
                second: 2
            }
        );
        assert!(matches!(
            tree_from_tabular(&rows(&["0", "7"]), &layout),
            Err(ReconstructError::InvalidHead { token: 2, .. })
        ));
        assert!(matches!(
            tree_from_tabular(&rows(&["0", "x"]), &layout),
            Err(ReconstructError::InvalidHead { token: 2, .. })
        ));
        assert!(matches!(
            tree_from_tabular(&rows(&["0", "2"]), &layout),
            Err(ReconstructError::InvalidHead { token: 2, .. })
        ));
        assert_eq!(
            tree_from_tabular(&rows(&["0", "3", "2"]), &layout).unwrap_err(),
            ReconstructError::HeadCycle { detached: 2 }
        );
        assert_eq!(
            tree_from_tabular(&[TabularRecord::parse("1\tonly")], &layout).unwrap_err(),
            ReconstructError::MissingColumn { token: 1, column: 3 }
        );
        assert_eq!(
            tree_from_tabular(&[], &layout).unwrap_err(),
            ReconstructError::EmptyTranscript
        );
    }

    #[test]
    fn trailing_group_and_blank_runs() {
        let text = "\n\n1\ta\t_\tX\tT\t_\t0\tROOT\n\n\n1\tb\t_\tX\tT\t_\t0\tROOT";
        let groups: Vec<_> = TabularSegmenter::new(text.lines()).collect();
        assert_eq!(groups.len(), 2);
    }
}
