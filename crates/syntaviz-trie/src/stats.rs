//! Cluster statistics and corpus-wide totals.

use std::collections::BTreeMap;

use roaring::RoaringBitmap;
use serde::Serialize;

use crate::corpus::FrequencyTable;
use crate::error::Result;
use crate::{ClusterTrie, QueryId};

/// Aggregate counts for one cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterStats {
    pub occurrence_count: u64,
    /// Weighted sum over members, duplicates counted each time.
    pub weighted_count: u64,
    /// Distinct members found in no immediate child: their match ends here.
    pub non_dependent_count: u64,
    pub non_dependent_weighted: u64,
    /// Member ids found under at least one immediate child, with the child
    /// labels (once each, in label order).
    pub id_to_children: BTreeMap<QueryId, Vec<String>>,
}

/// Corpus denominators for share percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorpusTotals {
    /// Trees in the corpus.
    pub unique: u64,
    /// Frequency-weighted trees in the corpus.
    pub weighted: u64,
}

/// `part` as a percentage of `total`; 0 when `total` is 0.
pub fn share_percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

impl ClusterTrie {
    pub fn statistics(&self, path: &str, frequency: &FrequencyTable) -> Result<ClusterStats> {
        let id = self.lookup(path)?;
        let node = self.node(id);

        let mut covered = RoaringBitmap::new();
        let mut id_to_children: BTreeMap<QueryId, Vec<String>> = BTreeMap::new();
        for (label, child) in self.sorted_children(id) {
            let child_members = self.node(child).member_set();
            for qid in &child_members {
                id_to_children.entry(qid).or_default().push(label.to_string());
            }
            covered |= child_members;
        }

        let non_dependent = node.member_set() - covered;

        Ok(ClusterStats {
            occurrence_count: node.occurrence_count(),
            weighted_count: frequency.weighted_sum(node.member_query_ids().iter().copied()),
            non_dependent_count: non_dependent.len(),
            non_dependent_weighted: frequency.weighted_sum(non_dependent.iter()),
            id_to_children,
        })
    }

    /// Totals over every tree in the trie.
    pub fn totals(&self, frequency: &FrequencyTable) -> CorpusTotals {
        let root = self.node(self.root());
        CorpusTotals {
            unique: root.occurrence_count(),
            weighted: frequency.weighted_sum(root.member_query_ids().iter().copied()),
        }
    }
}
