//! Cluster trie: a label-path index over dependency-parse trees.
//!
//! Every query's parse tree is folded into one shared trie keyed by label
//! sequences from the tree root. Each trie node remembers which queries
//! passed through it, so every distinct root-to-node label path in the corpus
//! is addressable as a *cluster* and can be ranked, measured, and combined
//! with other clusters.
//!
//! Key choices:
//! 1. **Arena storage**: nodes live in one `Vec`, addressed by [`NodeId`];
//!    each node owns a label → child map.
//! 2. **String interning**: labels repeat across millions of queries and are
//!    stored once, referenced by [`StrId`].
//! 3. **Bitmap set algebra**: member lists become Roaring bitmaps when
//!    clusters are intersected, united, or subtracted.
//! 4. **Batch construction**: built once ([`TrieBuilder`] or the sharded
//!    [`build_sharded`]) and immutable afterwards, so every query operation
//!    takes `&self` and is safe to run concurrently.
//!
//! ## Module Organization
//!
//! - `builder`: single-writer and sharded construction
//! - `path`: delimited path resolution
//! - `enumerate`: ranked, windowed listing of child clusters and member queries
//! - `stats`: cluster statistics and corpus totals
//! - `set_ops`: union / intersection / difference of clusters
//! - `corpus`: query texts and frequency weights
//! - `ingest`: parallel record decoding with cancellation
//! - `roots`, `actions`: root-pattern clusters and action histograms

pub mod actions;
pub mod builder;
pub mod corpus;
pub mod enumerate;
pub mod error;
pub mod ingest;
pub mod path;
pub mod roots;
pub mod set_ops;
pub mod stats;

use ahash::AHashMap;
use dashmap::DashMap;
use roaring::RoaringBitmap;
use std::sync::atomic::{AtomicU32, Ordering};

pub use actions::ActionTable;
pub use builder::{build_sharded, BuildOptions, RejectedTree, TrieBuilder};
pub use corpus::{CorpusTables, FrequencyTable};
pub use enumerate::{KeyEntry, KeyRanking, QueryEntry, QueryOrder, Window};
pub use error::{Result, TrieError};
pub use ingest::{
    build_from_records, decode_records, ingest_lines, BuildStrategy, CancelFlag, Ingested,
    IngestReport, SkippedRecord,
};
pub use path::Resolved;
pub use roots::{root_pattern, RootClusters};
pub use set_ops::SetOp;
pub use stats::{share_percent, ClusterStats, CorpusTotals};

/// Index of a query in the external query table.
pub type QueryId = u32;

/// Default path delimiter.
pub const DEFAULT_DELIMITER: char = '|';

// ============================================================================
// String Interning
// ============================================================================

/// Interned label ID (4 bytes instead of 24+ for String)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StrId(u32);

impl StrId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Concurrent label interner used while building.
///
/// Shards built on different threads intern through the same instance, so a
/// label gets one id across the whole trie.
pub struct StringInterner {
    str_to_id: DashMap<String, StrId>,
    id_to_str: DashMap<StrId, String>,
    next_id: AtomicU32,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            str_to_id: DashMap::new(),
            id_to_str: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a string, returning its ID
    pub fn intern(&self, s: &str) -> StrId {
        if let Some(id) = self.str_to_id.get(s) {
            return *id;
        }

        // `entry` holds the shard lock, so racing threads agree on one id.
        *self.str_to_id.entry(s.to_string()).or_insert_with(|| {
            let id = StrId(self.next_id.fetch_add(1, Ordering::SeqCst));
            self.id_to_str.insert(id, s.to_string());
            id
        })
    }

    /// Look up an existing ID for a string without inserting.
    pub fn id_of(&self, s: &str) -> Option<StrId> {
        self.str_to_id.get(s).map(|id| *id)
    }

    /// Look up string by ID
    pub fn lookup(&self, id: StrId) -> Option<String> {
        self.id_to_str.get(&id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze into a read-only table with borrowed lookups.
    pub fn freeze(self) -> LabelTable {
        let mut labels = vec![String::new(); self.len()];
        for (id, label) in self.id_to_str.into_iter() {
            if let Some(slot) = labels.get_mut(id.0 as usize) {
                *slot = label;
            }
        }
        let ids = self.str_to_id.into_iter().collect();
        LabelTable { labels, ids }
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only label table of a finished trie.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    labels: Vec<String>,
    ids: AHashMap<String, StrId>,
}

impl LabelTable {
    pub fn id_of(&self, s: &str) -> Option<StrId> {
        self.ids.get(s).copied()
    }

    pub fn resolve(&self, id: StrId) -> &str {
        self.labels.get(id.0 as usize).map_or("", String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

// ============================================================================
// Trie Nodes
// ============================================================================

/// Arena index of a trie node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The virtual, label-less trie root.
    pub const ROOT: NodeId = NodeId(0);

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One cluster: the set of queries whose trees contain a given label path.
#[derive(Debug, Clone, Default)]
pub struct ClusterNode {
    label: Option<StrId>,
    /// Structural matches through this node (not deduplicated per query).
    occurrence_count: u64,
    children: AHashMap<StrId, NodeId>,
    /// One entry per structural match; a query may appear more than once.
    member_query_ids: Vec<QueryId>,
}

impl ClusterNode {
    pub(crate) fn new(label: Option<StrId>) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, query_id: QueryId) {
        self.occurrence_count += 1;
        self.member_query_ids.push(query_id);
    }

    pub fn label_id(&self) -> Option<StrId> {
        self.label
    }

    pub fn occurrence_count(&self) -> u64 {
        self.occurrence_count
    }

    pub fn member_query_ids(&self) -> &[QueryId] {
        &self.member_query_ids
    }

    /// Members with duplicates collapsed.
    pub fn member_set(&self) -> RoaringBitmap {
        self.member_query_ids.iter().copied().collect()
    }

    pub fn child_id(&self, label: StrId) -> Option<NodeId> {
        self.children.get(&label).copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn children_mut(&mut self) -> &mut AHashMap<StrId, NodeId> {
        &mut self.children
    }

    pub(crate) fn child_entries(&self) -> impl Iterator<Item = (StrId, NodeId)> + '_ {
        self.children.iter().map(|(&label, &id)| (label, id))
    }
}

/// A visited node in [`ClusterTrie::walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeVisit {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    /// Number of labels on the path from the trie root (0 for the root).
    pub level: usize,
}

// ============================================================================
// ClusterTrie: the finished, immutable index
// ============================================================================

/// The finished cluster trie.
///
/// The root is virtual: it records every inserted query once, and its
/// children are the root labels of the corpus' trees.
#[derive(Debug, Clone)]
pub struct ClusterTrie {
    labels: LabelTable,
    nodes: Vec<ClusterNode>,
    delimiter: char,
    max_depth: Option<usize>,
}

impl ClusterTrie {
    pub(crate) fn from_parts(
        labels: LabelTable,
        nodes: Vec<ClusterNode>,
        options: &BuildOptions,
    ) -> Self {
        Self {
            labels,
            nodes,
            delimiter: options.delimiter,
            max_depth: options.max_depth,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Node by id. Ids are only handed out by this trie, so they are always
    /// in range.
    pub fn node(&self, id: NodeId) -> &ClusterNode {
        &self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Number of trees folded into the trie.
    pub fn query_count(&self) -> u64 {
        self.node(NodeId::ROOT).occurrence_count
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Label of a node (`None` for the root).
    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.node(id).label.map(|l| self.labels.resolve(l))
    }

    pub fn child(&self, parent: NodeId, label: &str) -> Option<NodeId> {
        let label = self.labels.id_of(label)?;
        self.node(parent).child_id(label)
    }

    /// Children in arbitrary order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.node(id)
            .child_entries()
            .map(move |(label, child)| (self.labels.resolve(label), child))
    }

    /// Children sorted by label.
    pub fn sorted_children(&self, id: NodeId) -> Vec<(&str, NodeId)> {
        let mut out: Vec<(&str, NodeId)> = self.children(id).collect();
        out.sort_unstable_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Pre-order traversal of every node, children in label order.
    pub fn walk(&self) -> Vec<NodeVisit> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![NodeVisit {
            id: NodeId::ROOT,
            parent: None,
            level: 0,
        }];
        while let Some(visit) = stack.pop() {
            out.push(visit);
            for (_, child) in self.sorted_children(visit.id).into_iter().rev() {
                stack.push(NodeVisit {
                    id: child,
                    parent: Some(visit.id),
                    level: visit.level + 1,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interner_is_stable_and_freezes() {
        let interner = StringInterner::new();
        let a = interner.intern("nsubj");
        let b = interner.intern("obj");
        assert_eq!(interner.intern("nsubj"), a);
        assert_ne!(a, b);
        assert_eq!(interner.lookup(b).as_deref(), Some("obj"));
        assert_eq!(interner.len(), 2);

        let table = interner.freeze();
        assert_eq!(table.resolve(a), "nsubj");
        assert_eq!(table.id_of("obj"), Some(b));
        assert_eq!(table.id_of("dobj"), None);
    }

    #[test]
    fn interner_agrees_across_threads() {
        let interner = StringInterner::new();
        let ids: Vec<Vec<StrId>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        (0..200)
                            .map(|i| interner.intern(&format!("l{}", i % 50)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(interner.len(), 50);
    }
}
