//! Coarse clustering by root pattern: the root label minus its relation.

use std::cmp::Reverse;

use ahash::AHashMap;
use serde::Serialize;

use crate::{ClusterTrie, QueryId};

/// `"find VB ROOT"` → `"find_VB"`. A single-token label maps to `""`.
pub fn root_pattern(label: &str) -> String {
    let words: Vec<&str> = label.split_whitespace().collect();
    match words.split_last() {
        Some((_, head)) => head.join("_"),
        None => String::new(),
    }
}

/// Queries grouped by root pattern.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RootClusters {
    clusters: Vec<(String, Vec<QueryId>)>,
}

impl RootClusters {
    /// Largest cluster first, ties by pattern.
    pub fn ranked(&self) -> &[(String, Vec<QueryId>)] {
        &self.clusters
    }

    pub fn get(&self, pattern: &str) -> Option<&[QueryId]> {
        self.clusters
            .iter()
            .find(|(p, _)| p == pattern)
            .map(|(_, ids)| ids.as_slice())
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

impl ClusterTrie {
    pub fn root_clusters(&self) -> RootClusters {
        let mut by_pattern: AHashMap<String, Vec<QueryId>> = AHashMap::new();
        for (label, node) in self.sorted_children(self.root()) {
            by_pattern
                .entry(root_pattern(label))
                .or_default()
                .extend_from_slice(self.node(node).member_query_ids());
        }

        let mut clusters: Vec<(String, Vec<QueryId>)> = by_pattern.into_iter().collect();
        for (_, ids) in &mut clusters {
            ids.sort_unstable();
        }
        clusters.sort_by(|a, b| {
            (Reverse(a.1.len()), &a.0).cmp(&(Reverse(b.1.len()), &b.0))
        });
        RootClusters { clusters }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuildOptions, TrieBuilder};
    use syntaviz_parse::TreeNode;

    #[test]
    fn patterns_drop_the_relation() {
        assert_eq!(root_pattern("find VB ROOT"), "find_VB");
        assert_eq!(root_pattern("  show  NN   ROOT "), "show_NN");
        assert_eq!(root_pattern("ROOT"), "");
        assert_eq!(root_pattern(""), "");
    }

    #[test]
    fn clusters_merge_labels_with_the_same_pattern() {
        let mut b = TrieBuilder::new(BuildOptions::default());
        b.insert(&TreeNode::new("find VB ROOT"), 3).unwrap();
        b.insert(&TreeNode::new("find VB ccomp"), 0).unwrap();
        b.insert(&TreeNode::new("show VB ROOT"), 1).unwrap();
        b.insert(&TreeNode::new("hbo NN ROOT"), 2).unwrap();
        let clusters = b.finish().root_clusters();

        let ranked: Vec<(&str, usize)> = clusters
            .ranked()
            .iter()
            .map(|(p, ids)| (p.as_str(), ids.len()))
            .collect();
        assert_eq!(ranked, vec![("find_VB", 2), ("hbo_NN", 1), ("show_VB", 1)]);
        assert_eq!(clusters.get("find_VB"), Some(&[0, 3][..]));
    }
}
