//! Ranked, windowed listings of a cluster's child keys and member queries.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::corpus::{CorpusTables, FrequencyTable};
use crate::error::{Result, TrieError};
use crate::{ClusterTrie, QueryId};

/// Inclusive `[start, end]` window over a ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Default for Window {
    fn default() -> Self {
        Self { start: 0, end: 100 }
    }
}

impl Window {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Every rank.
    pub fn all() -> Self {
        Self {
            start: 0,
            end: usize::MAX,
        }
    }

    pub fn contains(&self, rank: usize) -> bool {
        self.start <= rank && rank <= self.end
    }

    /// Keep the ranked items inside the window, paired with their rank.
    /// `start > end` yields nothing.
    pub fn apply<T, I>(self, ranked: I) -> impl Iterator<Item = (usize, T)>
    where
        I: IntoIterator<Item = T>,
    {
        ranked
            .into_iter()
            .enumerate()
            .skip(self.start)
            .take_while(move |(rank, _)| *rank <= self.end)
    }
}

/// How child keys are ordered.
#[derive(Debug, Clone, Copy)]
pub enum KeyRanking<'a> {
    /// By occurrence count.
    Occurrence,
    /// By occurrence count, reporting weighted counts alongside.
    OccurrenceWithWeights(&'a FrequencyTable),
    /// By frequency-weighted count.
    Weighted(&'a FrequencyTable),
}

impl<'a> KeyRanking<'a> {
    pub fn frequency(&self) -> Option<&'a FrequencyTable> {
        match *self {
            KeyRanking::Occurrence => None,
            KeyRanking::OccurrenceWithWeights(f) | KeyRanking::Weighted(f) => Some(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyEntry {
    /// Position in the full ranked list.
    pub rank: usize,
    pub label: String,
    /// Full path of the child, usable as the next query's path.
    pub path: String,
    pub occurrence_count: u64,
    pub weighted_count: Option<u64>,
}

/// How member queries are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryOrder {
    /// Weight descending, then id ascending.
    #[default]
    ByFrequency,
    ById,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryEntry {
    pub rank: usize,
    pub query_id: QueryId,
    pub query: String,
    pub weight: u64,
}

impl ClusterTrie {
    /// Children of the node named by `path`, ranked, ties broken by label.
    pub fn list_keys(
        &self,
        path: &str,
        window: Window,
        ranking: KeyRanking<'_>,
    ) -> Result<Vec<KeyEntry>> {
        let node = self.lookup(path)?;
        let frequency = ranking.frequency();

        let mut keys: Vec<(&str, u64, Option<u64>)> = self
            .children(node)
            .map(|(label, child)| {
                let child = self.node(child);
                let weighted = frequency
                    .map(|f| f.weighted_sum(child.member_query_ids().iter().copied()));
                (label, child.occurrence_count(), weighted)
            })
            .collect();

        match ranking {
            KeyRanking::Weighted(_) => {
                keys.sort_unstable_by_key(|&(label, _, weighted)| (Reverse(weighted), label))
            }
            _ => keys.sort_unstable_by_key(|&(label, count, _)| (Reverse(count), label)),
        }

        Ok(window
            .apply(keys)
            .map(|(rank, (label, occurrence_count, weighted_count))| KeyEntry {
                rank,
                label: label.to_string(),
                path: self.join_path(path, label),
                occurrence_count,
                weighted_count,
            })
            .collect())
    }

    /// Member queries of the node named by `path`, duplicates kept.
    ///
    /// Only ids inside the window are looked up; one missing from the query
    /// table is [`TrieError::UnknownQueryId`].
    pub fn list_queries(
        &self,
        path: &str,
        window: Window,
        order: QueryOrder,
        tables: &CorpusTables,
    ) -> Result<Vec<QueryEntry>> {
        let node = self.lookup(path)?;
        let frequency = tables.frequency();

        let mut ids = self.node(node).member_query_ids().to_vec();
        match order {
            QueryOrder::ByFrequency => {
                ids.sort_by_key(|&id| (Reverse(frequency.weight(id)), id))
            }
            QueryOrder::ById => ids.sort(),
        }

        window
            .apply(ids)
            .map(|(rank, query_id)| {
                let query = tables
                    .query(query_id)
                    .ok_or(TrieError::UnknownQueryId(query_id))?;
                Ok(QueryEntry {
                    rank,
                    query_id,
                    query: query.to_string(),
                    weight: frequency.weight(query_id),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuildOptions, TrieBuilder};
    use syntaviz_parse::TreeNode;

    fn corpus() -> (ClusterTrie, CorpusTables) {
        let mut b = TrieBuilder::new(BuildOptions::default());
        let shapes: [&[&str]; 4] = [&["b", "a"], &["a"], &["c", "c"], &["b"]];
        for (qid, children) in shapes.iter().enumerate() {
            let tree = TreeNode::with_children(
                "ROOT",
                children.iter().map(|l| TreeNode::new(*l)).collect(),
            );
            b.insert(&tree, qid as QueryId).unwrap();
        }
        let tables = CorpusTables::new(
            vec!["q0".into(), "q1".into(), "q2".into(), "q3".into()],
            FrequencyTable::new(vec![1, 10, 2, 1]),
        );
        (b.finish(), tables)
    }

    #[test]
    fn window_is_inclusive() {
        let w = Window::new(0, 1);
        assert_eq!(w.apply(["x", "y", "z"]).count(), 2);
        assert_eq!(Window::new(5, 4).apply(0..10).count(), 0);
        assert_eq!(Window::new(2, 2).apply(0..10).collect::<Vec<_>>(), vec![(2, 2)]);
        assert_eq!(Window::default(), Window::new(0, 100));
    }

    #[test]
    fn keys_by_occurrence_break_ties_by_label() {
        let (trie, _) = corpus();
        let keys = trie
            .list_keys("ROOT", Window::default(), KeyRanking::Occurrence)
            .unwrap();
        let got: Vec<(&str, u64)> = keys
            .iter()
            .map(|k| (k.label.as_str(), k.occurrence_count))
            .collect();
        assert_eq!(got, vec![("a", 2), ("b", 2), ("c", 2)]);
        assert_eq!(keys[1].path, "ROOT|b");
        assert_eq!(keys[1].rank, 1);
        assert_eq!(keys[1].weighted_count, None);
    }

    #[test]
    fn keys_by_weight() {
        let (trie, tables) = corpus();
        let keys = trie
            .list_keys(
                "ROOT",
                Window::default(),
                KeyRanking::Weighted(tables.frequency()),
            )
            .unwrap();
        let got: Vec<(&str, Option<u64>)> = keys
            .iter()
            .map(|k| (k.label.as_str(), k.weighted_count))
            .collect();
        // c is counted twice for query 2
        assert_eq!(got, vec![("a", Some(11)), ("c", Some(4)), ("b", Some(2))]);
    }

    #[test]
    fn windowed_keys_keep_their_global_rank() {
        let (trie, _) = corpus();
        let keys = trie
            .list_keys("ROOT", Window::new(1, 5), KeyRanking::Occurrence)
            .unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].rank, 1);
        assert_eq!(keys[0].label, "b");
    }

    #[test]
    fn queries_by_frequency_then_id() {
        let (trie, tables) = corpus();
        let out = trie
            .list_queries("ROOT|c", Window::default(), QueryOrder::ByFrequency, &tables)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|q| q.query_id == 2 && q.weight == 2));

        let out = trie
            .list_queries("", Window::default(), QueryOrder::ByFrequency, &tables)
            .unwrap();
        let ids: Vec<QueryId> = out.iter().map(|q| q.query_id).collect();
        assert_eq!(ids, vec![1, 2, 0, 3]);

        let out = trie
            .list_queries("ROOT|b", Window::default(), QueryOrder::ById, &tables)
            .unwrap();
        let queries: Vec<&str> = out.iter().map(|q| q.query.as_str()).collect();
        assert_eq!(queries, vec!["q0", "q3"]);
    }

    #[test]
    fn unknown_ids_and_paths_are_errors() {
        let (trie, _) = corpus();
        let short = CorpusTables::new(vec!["q0".into()], FrequencyTable::default());
        let err = trie
            .list_queries("ROOT|a", Window::default(), QueryOrder::ById, &short)
            .unwrap_err();
        assert!(matches!(err, TrieError::UnknownQueryId(1)));

        // ids no record carried stay unknown in record-derived tables
        let sparse = CorpusTables::from_records(&[syntaviz_parse::CorpusRecord {
            query: "q0".into(),
            tree: TreeNode::new("ROOT"),
            tabular: None,
            query_id: 0,
        }]);
        let err = trie
            .list_queries("ROOT|a", Window::default(), QueryOrder::ById, &sparse)
            .unwrap_err();
        assert!(matches!(err, TrieError::UnknownQueryId(1)));

        // outside the window nothing is looked up
        assert!(trie
            .list_queries("ROOT|a", Window::new(0, 0), QueryOrder::ById, &short)
            .is_ok());

        assert!(matches!(
            trie.list_keys("ROOT|zzz", Window::default(), KeyRanking::Occurrence),
            Err(TrieError::PathNotFound { .. })
        ));
    }
}
