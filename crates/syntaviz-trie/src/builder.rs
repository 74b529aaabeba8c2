//! Trie construction: single-writer inserts and sharded parallel builds.

use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use syntaviz_parse::TreeNode;

use crate::error::{Result, TrieError};
use crate::{ClusterNode, ClusterTrie, NodeId, QueryId, StringInterner, DEFAULT_DELIMITER};

/// Trie-level build settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Path delimiter; labels containing it are rejected.
    pub delimiter: char,
    /// Deepest tree level recorded (root label = 0). `None` records all.
    pub max_depth: Option<usize>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            max_depth: None,
        }
    }
}

impl BuildOptions {
    fn records_depth(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth <= max)
    }
}

/// A tree that was refused during a batch build.
#[derive(Debug)]
pub struct RejectedTree {
    /// Position in the input batch.
    pub position: usize,
    pub query_id: QueryId,
    pub error: TrieError,
}

/// Single-writer builder. Consumed by [`TrieBuilder::finish`].
pub struct TrieBuilder {
    options: BuildOptions,
    labels: StringInterner,
    nodes: Vec<ClusterNode>,
}

impl TrieBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            labels: StringInterner::new(),
            nodes: vec![ClusterNode::new(None)],
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Number of trees inserted so far.
    pub fn tree_count(&self) -> u64 {
        self.nodes[0].occurrence_count()
    }

    /// Fold one tree into the trie under `query_id`.
    ///
    /// Fails with [`TrieError::InvalidLabel`] before touching any node if a
    /// recorded label contains the delimiter.
    pub fn insert(&mut self, tree: &TreeNode, query_id: QueryId) -> Result<()> {
        insert_tree(&mut self.nodes, &self.labels, &self.options, tree, query_id)
    }

    pub fn finish(self) -> ClusterTrie {
        ClusterTrie::from_parts(self.labels.freeze(), self.nodes, &self.options)
    }
}

fn validate_labels(tree: &TreeNode, options: &BuildOptions) -> Result<()> {
    let mut stack = vec![(tree, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        if !options.records_depth(depth) {
            continue;
        }
        if node.label.contains(options.delimiter) {
            return Err(TrieError::InvalidLabel {
                label: node.label.clone(),
                delimiter: options.delimiter,
            });
        }
        stack.extend(node.children.iter().map(|c| (c, depth + 1)));
    }
    Ok(())
}

/// Depth-first insertion into an arena whose slot 0 is the root.
fn insert_tree(
    nodes: &mut Vec<ClusterNode>,
    labels: &StringInterner,
    options: &BuildOptions,
    tree: &TreeNode,
    query_id: QueryId,
) -> Result<()> {
    validate_labels(tree, options)?;

    nodes[NodeId::ROOT.index()].record(query_id);

    let mut stack: Vec<(&TreeNode, NodeId, usize)> = vec![(tree, NodeId::ROOT, 0)];
    while let Some((node, parent, depth)) = stack.pop() {
        if !options.records_depth(depth) {
            continue;
        }
        let label = labels.intern(&node.label);
        let child = match nodes[parent.index()].child_id(label) {
            Some(id) => id,
            None => {
                let id = NodeId::from_index(nodes.len());
                nodes.push(ClusterNode::new(Some(label)));
                nodes[parent.index()].children_mut().insert(label, id);
                id
            }
        };
        nodes[child.index()].record(query_id);

        for c in node.children.iter().rev() {
            stack.push((c, child, depth + 1));
        }
    }
    Ok(())
}

/// Build a trie from a batch by sharding on root label.
///
/// Each shard is built on the rayon pool against one shared interner, then
/// the shards are grafted under a single root in order of first appearance.
/// The result has the same paths, counts and member multisets as inserting
/// the batch with one [`TrieBuilder`]; only root member order differs.
pub fn build_sharded<'a, I>(trees: I, options: &BuildOptions) -> (ClusterTrie, Vec<RejectedTree>)
where
    I: IntoIterator<Item = (&'a TreeNode, QueryId)>,
{
    let trees: Vec<(&TreeNode, QueryId)> = trees.into_iter().collect();
    let mut shard_of: AHashMap<&str, usize> = AHashMap::new();
    let mut shards: Vec<Vec<usize>> = Vec::new();
    for (position, (tree, _)) in trees.iter().enumerate() {
        let shard = *shard_of.entry(tree.label.as_str()).or_insert_with(|| {
            shards.push(Vec::new());
            shards.len() - 1
        });
        shards[shard].push(position);
    }

    let labels = StringInterner::new();
    let built: Vec<(Vec<ClusterNode>, Vec<RejectedTree>)> = shards
        .par_iter()
        .map(|positions| {
            let mut nodes = vec![ClusterNode::new(None)];
            let mut rejected = Vec::new();
            for &position in positions {
                let (tree, query_id) = trees[position];
                if let Err(error) = insert_tree(&mut nodes, &labels, options, tree, query_id) {
                    rejected.push(RejectedTree {
                        position,
                        query_id,
                        error,
                    });
                }
            }
            (nodes, rejected)
        })
        .collect();

    let total: usize = built.iter().map(|(nodes, _)| nodes.len() - 1).sum();
    let mut nodes = Vec::with_capacity(total + 1);
    nodes.push(ClusterNode::new(None));
    let mut rejected = Vec::new();

    for (shard_nodes, shard_rejected) in built {
        rejected.extend(shard_rejected);
        // Shard slot i > 0 lands at offset + i.
        let offset = nodes.len() - 1;
        let remap = |id: NodeId| NodeId::from_index(id.index() + offset);

        let mut shard_nodes = shard_nodes.into_iter();
        let Some(shard_root) = shard_nodes.next() else {
            continue;
        };
        for &query_id in shard_root.member_query_ids() {
            nodes[0].record(query_id);
        }
        for (label, child) in shard_root.child_entries() {
            nodes[0].children_mut().insert(label, remap(child));
        }
        for mut node in shard_nodes {
            for child in node.children_mut().values_mut() {
                *child = remap(*child);
            }
            nodes.push(node);
        }
    }
    rejected.sort_by_key(|r| r.position);

    (
        ClusterTrie::from_parts(labels.freeze(), nodes, options),
        rejected,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(label: &str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode::with_children(label, children)
    }

    #[test]
    fn insert_records_every_level_and_the_root() {
        let mut b = TrieBuilder::new(BuildOptions::default());
        b.insert(&t("ROOT", vec![t("nsubj", vec![]), t("obj", vec![])]), 1)
            .unwrap();
        b.insert(&t("ROOT", vec![t("nsubj", vec![])]), 2).unwrap();
        let trie = b.finish();

        assert_eq!(trie.query_count(), 2);
        let root = trie.child(trie.root(), "ROOT").unwrap();
        assert_eq!(trie.node(root).member_query_ids(), &[1, 2]);
        let nsubj = trie.child(root, "nsubj").unwrap();
        assert_eq!(trie.node(nsubj).occurrence_count(), 2);
        let obj = trie.child(root, "obj").unwrap();
        assert_eq!(trie.node(obj).member_query_ids(), &[1]);
    }

    #[test]
    fn repeated_sibling_labels_are_counted_per_match() {
        let mut b = TrieBuilder::new(BuildOptions::default());
        b.insert(&t("ROOT", vec![t("amod", vec![]), t("amod", vec![])]), 7)
            .unwrap();
        let trie = b.finish();
        let root = trie.child(trie.root(), "ROOT").unwrap();
        let amod = trie.child(root, "amod").unwrap();
        assert_eq!(trie.node(amod).occurrence_count(), 2);
        assert_eq!(trie.node(amod).member_query_ids(), &[7, 7]);
    }

    #[test]
    fn max_depth_cuts_deeper_levels() {
        let options = BuildOptions {
            max_depth: Some(1),
            ..BuildOptions::default()
        };
        let mut b = TrieBuilder::new(options);
        // The level-2 label would be invalid, but it is never recorded.
        b.insert(&t("a", vec![t("b", vec![t("c|d", vec![])])]), 0)
            .unwrap();
        let trie = b.finish();
        assert_eq!(trie.node_count(), 3);
        assert_eq!(trie.max_depth(), Some(1));
    }

    #[test]
    fn invalid_label_leaves_no_partial_state() {
        let mut b = TrieBuilder::new(BuildOptions::default());
        b.insert(&t("ROOT", vec![t("nsubj", vec![])]), 0).unwrap();
        let err = b
            .insert(&t("ROOT", vec![t("nsubj", vec![]), t("x|y", vec![])]), 1)
            .unwrap_err();
        assert!(matches!(err, TrieError::InvalidLabel { delimiter: '|', .. }));
        assert_eq!(b.tree_count(), 1);

        let trie = b.finish();
        let root = trie.child(trie.root(), "ROOT").unwrap();
        assert_eq!(trie.node(root).member_query_ids(), &[0]);
        assert_eq!(trie.node_count(), 3);
    }

    #[test]
    fn sharded_build_matches_single_writer() {
        let batch = vec![
            (t("ROOT", vec![t("nsubj", vec![]), t("obj", vec![])]), 0),
            (t("find", vec![t("me", vec![])]), 1),
            (t("ROOT", vec![t("obj", vec![t("det", vec![])])]), 2),
            (t("bad|root", vec![]), 3),
            (t("find", vec![t("movies", vec![])]), 4),
        ];
        let options = BuildOptions::default();

        let mut single = TrieBuilder::new(options);
        for (tree, qid) in &batch {
            let _ = single.insert(tree, *qid);
        }
        let single = single.finish();
        let (sharded, rejected) = build_sharded(batch.iter().map(|(t, q)| (t, *q)), &options);

        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].position, 3);
        assert_eq!(sharded.node_count(), single.node_count());
        assert_eq!(sharded.query_count(), 4);

        for path in ["ROOT", "ROOT|obj", "ROOT|obj|det", "find", "find|me"] {
            let a = single.lookup(path).unwrap();
            let b = sharded.lookup(path).unwrap();
            assert_eq!(
                single.node(a).member_query_ids(),
                sharded.node(b).member_query_ids(),
                "{path}"
            );
        }
    }
}
