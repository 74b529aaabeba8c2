//! Delimited path resolution.
//!
//! A path is a sequence of labels joined by the trie's delimiter, starting at
//! a root label. The empty path names the virtual root, i.e. the whole corpus.

use crate::error::{Result, TrieError};
use crate::{ClusterTrie, NodeId};

/// A path resolved up to its last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: String,
    /// Node named by every segment but the last.
    pub parent: NodeId,
    /// Last segment; `None` for the empty path.
    pub key: Option<String>,
}

impl Resolved {
    /// The node the full path names.
    pub fn node(&self, trie: &ClusterTrie) -> Result<NodeId> {
        match &self.key {
            None => Ok(self.parent),
            Some(key) => trie
                .child(self.parent, key)
                .ok_or_else(|| TrieError::PathNotFound {
                    path: self.path.clone(),
                    segment: key.clone(),
                }),
        }
    }
}

impl ClusterTrie {
    /// Walk every segment except the last.
    pub fn resolve(&self, path: &str) -> Result<Resolved> {
        if path.is_empty() {
            return Ok(Resolved {
                path: String::new(),
                parent: self.root(),
                key: None,
            });
        }

        let (prefix, key) = match path.rsplit_once(self.delimiter()) {
            Some((prefix, key)) => (Some(prefix), key),
            None => (None, path),
        };

        let mut parent = self.root();
        for segment in prefix.into_iter().flat_map(|p| p.split(self.delimiter())) {
            parent = self
                .child(parent, segment)
                .ok_or_else(|| TrieError::PathNotFound {
                    path: path.to_string(),
                    segment: segment.to_string(),
                })?;
        }

        Ok(Resolved {
            path: path.to_string(),
            parent,
            key: Some(key.to_string()),
        })
    }

    /// Resolve a full path to its node.
    pub fn lookup(&self, path: &str) -> Result<NodeId> {
        self.resolve(path)?.node(self)
    }

    /// Join a parent path and a child label.
    pub fn join_path(&self, parent: &str, label: &str) -> String {
        if parent.is_empty() {
            label.to_string()
        } else {
            format!("{parent}{}{label}", self.delimiter())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuildOptions, TrieBuilder};
    use syntaviz_parse::TreeNode;

    fn trie() -> ClusterTrie {
        let mut b = TrieBuilder::new(BuildOptions::default());
        let tree = TreeNode::with_children(
            "show VB ROOT",
            vec![TreeNode::with_children(
                "movies NNS dobj",
                vec![TreeNode::new("comedy NN compound")],
            )],
        );
        b.insert(&tree, 0).unwrap();
        b.finish()
    }

    #[test]
    fn resolves_nested_paths() {
        let trie = trie();
        let r = trie.resolve("show VB ROOT|movies NNS dobj").unwrap();
        assert_eq!(r.key.as_deref(), Some("movies NNS dobj"));
        assert_eq!(trie.label(r.parent), Some("show VB ROOT"));

        let node = trie
            .lookup("show VB ROOT|movies NNS dobj|comedy NN compound")
            .unwrap();
        assert_eq!(trie.label(node), Some("comedy NN compound"));
    }

    #[test]
    fn empty_path_is_the_root() {
        let trie = trie();
        let r = trie.resolve("").unwrap();
        assert_eq!(r.key, None);
        assert_eq!(r.node(&trie).unwrap(), trie.root());
    }

    #[test]
    fn missing_segments_are_reported() {
        let trie = trie();
        match trie.lookup("show VB ROOT|nope|comedy NN compound") {
            Err(TrieError::PathNotFound { segment, .. }) => assert_eq!(segment, "nope"),
            other => panic!("unexpected {other:?}"),
        }
        // the parent resolves; only the key is missing
        let r = trie.resolve("show VB ROOT|nope").unwrap();
        assert!(matches!(
            r.node(&trie),
            Err(TrieError::PathNotFound { segment, .. }) if segment == "nope"
        ));
        assert!(trie.lookup("show VB ROOT|").is_err());
    }

    #[test]
    fn join_path_handles_the_root() {
        let trie = trie();
        assert_eq!(trie.join_path("", "a"), "a");
        assert_eq!(trie.join_path("a", "b"), "a|b");
    }
}
