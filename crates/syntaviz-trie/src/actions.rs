//! Histogram of actions taken in response to a cluster's queries.

use std::cmp::Reverse;
use std::io::BufRead;

use ahash::AHashMap;

use crate::corpus::{byte_lines, table_line, CorpusTables};
use crate::error::{Result, TrieError};
use crate::ClusterTrie;

/// Lower-cased query text → action.
#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    actions: AHashMap<String, String>,
}

impl ActionTable {
    pub fn insert(&mut self, query: &str, action: impl Into<String>) {
        self.actions.insert(query.to_lowercase(), action.into());
    }

    /// Read `query \t action` lines; later lines win.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut table = Self::default();
        for (index, bytes) in byte_lines(reader).enumerate() {
            let line = table_line(bytes?, index + 1)?;
            if line.trim().is_empty() {
                continue;
            }
            let (query, action) = line.rsplit_once('\t').ok_or_else(|| TrieError::CorruptTable {
                line: index + 1,
                reason: "expected `query \\t action`".to_string(),
            })?;
            table.insert(query.trim(), action.trim());
        }
        Ok(table)
    }

    pub fn action(&self, query: &str) -> Option<&str> {
        self.actions.get(&query.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl ClusterTrie {
    /// Count actions over a node's members (duplicates counted), by count
    /// descending then action name. Members with no action are skipped.
    pub fn action_histogram(
        &self,
        path: &str,
        tables: &CorpusTables,
        actions: &ActionTable,
    ) -> Result<Vec<(String, u64)>> {
        let node = self.node(self.lookup(path)?);

        let mut counts: AHashMap<&str, u64> = AHashMap::new();
        for &query_id in node.member_query_ids() {
            let query = tables
                .query(query_id)
                .ok_or(TrieError::UnknownQueryId(query_id))?;
            if let Some(action) = actions.action(query) {
                *counts.entry(action).or_insert(0) += 1;
            }
        }

        let mut histogram: Vec<(String, u64)> = counts
            .into_iter()
            .map(|(action, count)| (action.to_string(), count))
            .collect();
        histogram.sort_by(|a, b| (Reverse(a.1), &a.0).cmp(&(Reverse(b.1), &b.0)));
        Ok(histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuildOptions, FrequencyTable, TrieBuilder};
    use syntaviz_parse::TreeNode;

    #[test]
    fn histogram_over_members() {
        let mut b = TrieBuilder::new(BuildOptions::default());
        for qid in 0..4 {
            b.insert(&TreeNode::new("watch VB ROOT"), qid).unwrap();
        }
        let trie = b.finish();
        let tables = CorpusTables::new(
            vec!["Watch HBO".into(), "watch news".into(), "watch cnn".into(), "watch it".into()],
            FrequencyTable::default(),
        );
        let actions =
            ActionTable::from_reader("watch hbo\tTUNE\nWATCH NEWS\tsearch\nwatch cnn\tTUNE\n".as_bytes())
                .unwrap();

        let hist = trie
            .action_histogram("watch VB ROOT", &tables, &actions)
            .unwrap();
        assert_eq!(hist, vec![("TUNE".to_string(), 2), ("search".to_string(), 1)]);
        assert_eq!(actions.action("Watch Cnn"), Some("TUNE"));
    }

    #[test]
    fn malformed_action_line() {
        assert!(matches!(
            ActionTable::from_reader("no tab here\n".as_bytes()),
            Err(TrieError::CorruptTable { line: 1, .. })
        ));
        assert!(matches!(
            ActionTable::from_reader(&b"watch hbo\tTUNE\nwatch caf\xe9\tTUNE\n"[..]),
            Err(TrieError::CorruptTable { line: 2, .. })
        ));
    }
}
