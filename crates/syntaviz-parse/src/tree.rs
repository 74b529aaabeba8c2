//! Canonical dependency trees.
//!
//! A query's parse is one [`TreeNode`]. Its serialized form is a *group*: a
//! sequence of [`TreeItem`]s in which every label may be followed by one
//! subtree holding that label's children. A whole tree is the group
//! `[root, [children...]]`, so
//!
//! ```text
//! find VB ROOT
//! +-- me PRP iobj
//! +-- movies NNS dobj
//!     +-- funny JJ amod
//! ```
//!
//! serializes as `["find VB ROOT",["me PRP iobj","movies NNS dobj",["funny JJ amod"]]]`.
//!
//! All traversals here (rendering, serialization, parsing, drop) use
//! explicit stacks, so a pathological parse depth never grows the call stack.

use serde::{Deserialize, Serialize};

use crate::error::TreeFormatError;
use crate::transcript::{TranscriptLine, INDENT_WIDTH, MARKER};

/// One position of the canonical nested form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeItem {
    Label(String),
    Subtree(Vec<TreeItem>),
}

/// An ordered, labeled tree node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreeNode {
    pub label: String,
    pub children: Vec<TreeNode>,
}

impl Drop for TreeNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

impl TreeNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(label: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            label: label.into(),
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of labeled nodes in the tree (including the root).
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Depth of the deepest node; a lone root has depth 0.
    pub fn max_depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children.iter().map(|c| (c, depth + 1)));
        }
        deepest
    }

    /// Labels in depth-first (pre-)order.
    pub fn labels(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node.label.as_str());
            stack.extend(node.children.iter().rev());
        }
        out
    }

    // ------------------------------------------------------------------
    // Canonical nested form
    // ------------------------------------------------------------------

    /// Convert to the canonical group `[label, [children...]]`.
    pub fn to_group(&self) -> Vec<TreeItem> {
        struct Frame<'a> {
            node: &'a TreeNode,
            next: usize,
            items: Vec<TreeItem>,
        }

        let mut stack = vec![Frame {
            node: self,
            next: 0,
            items: Vec::new(),
        }];
        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            if let Some(child) = node.children.get(frame.next) {
                frame.next += 1;
                stack.push(Frame {
                    node: child,
                    next: 0,
                    items: Vec::new(),
                });
                continue;
            }

            let Some(done) = stack.pop() else {
                break;
            };
            let mut entry = vec![TreeItem::Label(done.node.label.clone())];
            if !done.items.is_empty() {
                entry.push(TreeItem::Subtree(done.items));
            }
            match stack.last_mut() {
                Some(parent) => parent.items.extend(entry),
                None => return entry,
            }
        }
        Vec::new()
    }

    /// Rebuild a tree from its canonical group. The group must hold exactly
    /// one root label (optionally followed by its children subtree).
    pub fn from_group(group: Vec<TreeItem>) -> Result<TreeNode, TreeFormatError> {
        let mut forest = forest_from_group(group)?;
        if forest.len() != 1 {
            return Err(TreeFormatError::RootCount(forest.len()));
        }
        forest.pop().ok_or(TreeFormatError::RootCount(0))
    }

    /// Serialize to the canonical JSON nested-array form.
    pub fn to_json(&self) -> String {
        let mut out = String::from("[");
        push_json_label(&mut out, &self.label);
        let mut stack: Vec<(&TreeNode, usize)> = Vec::new();
        if !self.children.is_empty() {
            out.push_str(",[");
            stack.push((self, 0));
        }

        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            match node.children.get(*next) {
                Some(child) => {
                    if *next > 0 {
                        out.push(',');
                    }
                    *next += 1;
                    push_json_label(&mut out, &child.label);
                    if !child.children.is_empty() {
                        out.push_str(",[");
                        stack.push((child, 0));
                    }
                }
                None => {
                    out.push(']');
                    stack.pop();
                }
            }
        }

        out.push(']');
        out
    }

    /// Parse the canonical JSON nested-array form.
    ///
    /// Nesting is walked with an explicit stack, so every tree [`to_json`]
    /// writes reads back whatever its depth. Labels are decoded by
    /// `serde_json`.
    ///
    /// [`to_json`]: TreeNode::to_json
    pub fn from_json(text: &str) -> Result<TreeNode, TreeFormatError> {
        let mut forest = forest_from_json(text)?;
        if forest.len() != 1 {
            return Err(TreeFormatError::RootCount(forest.len()));
        }
        forest.pop().ok_or(TreeFormatError::RootCount(0))
    }

    // ------------------------------------------------------------------
    // Transcript rendering
    // ------------------------------------------------------------------

    /// Flatten depth-first into transcript lines (root has no depth marker).
    pub fn to_transcript_lines(&self) -> Vec<TranscriptLine> {
        let mut out = Vec::new();
        let mut stack: Vec<(&TreeNode, Option<usize>)> = vec![(self, None)];
        while let Some((node, depth)) = stack.pop() {
            out.push(TranscriptLine {
                depth,
                label: node.label.clone(),
            });
            let child_depth = depth.map_or(0, |d| d + 1);
            for child in node.children.iter().rev() {
                stack.push((child, Some(child_depth)));
            }
        }
        out
    }

    /// Render as an ascii indentation transcript, one line per node.
    pub fn render_indented(&self) -> String {
        let mut out = String::new();
        // Each entry carries, per ancestor level, whether that ancestor was
        // the last of its siblings (decides `|   ` vs blank filler).
        let mut stack: Vec<(&TreeNode, Vec<bool>)> = vec![(self, Vec::new())];
        while let Some((node, trail)) = stack.pop() {
            if let Some((_, ancestors)) = trail.split_last() {
                for &ancestor_was_last in ancestors {
                    out.push_str(if ancestor_was_last { "    " } else { "|   " });
                }
                out.push_str(MARKER);
                out.push_str(&" ".repeat(INDENT_WIDTH - MARKER.len()));
            }
            out.push_str(&node.label);
            out.push('\n');

            let n = node.children.len();
            for (i, child) in node.children.iter().enumerate().rev() {
                let mut child_trail = trail.clone();
                child_trail.push(i + 1 == n);
                stack.push((child, child_trail));
            }
        }
        out
    }
}

fn push_json_label(out: &mut String, label: &str) {
    out.push_str(&serde_json::to_string(label).unwrap_or_default());
}

struct GroupFrame {
    items: std::vec::IntoIter<TreeItem>,
    nodes: Vec<TreeNode>,
    position: usize,
    after_label: bool,
}

impl GroupFrame {
    fn new(items: Vec<TreeItem>) -> Self {
        Self {
            items: items.into_iter(),
            nodes: Vec::new(),
            position: 0,
            after_label: false,
        }
    }
}

fn forest_from_group(group: Vec<TreeItem>) -> Result<Vec<TreeNode>, TreeFormatError> {
    if group.is_empty() {
        return Err(TreeFormatError::EmptyGroup);
    }

    let mut stack = vec![GroupFrame::new(group)];
    while let Some(frame) = stack.last_mut() {
        let position = frame.position;
        match frame.items.next() {
            Some(TreeItem::Label(label)) => {
                frame.position += 1;
                frame.after_label = true;
                frame.nodes.push(TreeNode::new(label));
            }
            Some(TreeItem::Subtree(items)) => {
                frame.position += 1;
                if !frame.after_label {
                    return Err(TreeFormatError::OrphanSubtree { position });
                }
                frame.after_label = false;
                if items.is_empty() {
                    return Err(TreeFormatError::EmptyGroup);
                }
                stack.push(GroupFrame::new(items));
            }
            None => {
                let Some(done) = stack.pop() else {
                    break;
                };
                match stack.last_mut() {
                    Some(parent) => {
                        if let Some(owner) = parent.nodes.last_mut() {
                            owner.children = done.nodes;
                        }
                    }
                    None => return Ok(done.nodes),
                }
            }
        }
    }
    Ok(Vec::new())
}

#[derive(Default)]
struct JsonFrame {
    nodes: Vec<TreeNode>,
    items: usize,
    after_label: bool,
    expect_item: bool,
}

fn json_error(at: usize, what: &str) -> TreeFormatError {
    TreeFormatError::Json(format!("{what} at byte {at}"))
}

/// Byte index just past the string literal opening at `start`.
fn string_end(bytes: &[u8], start: usize) -> Result<usize, TreeFormatError> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(json_error(start, "unterminated string"))
}

fn forest_from_json(text: &str) -> Result<Vec<TreeNode>, TreeFormatError> {
    let bytes = text.as_bytes();
    let mut stack: Vec<JsonFrame> = Vec::new();
    let mut forest = None;
    let mut pos = 0;

    while pos < bytes.len() {
        let at = pos;
        pos += 1;
        match bytes[at] {
            b' ' | b'\t' | b'\n' | b'\r' => {}
            _ if forest.is_some() => return Err(json_error(at, "trailing characters")),
            b'[' => {
                if let Some(frame) = stack.last() {
                    if !frame.expect_item {
                        return Err(json_error(at, "expected `,` or `]`"));
                    }
                    if !frame.after_label {
                        return Err(TreeFormatError::OrphanSubtree {
                            position: frame.items,
                        });
                    }
                }
                stack.push(JsonFrame {
                    expect_item: true,
                    ..JsonFrame::default()
                });
            }
            b']' => {
                let Some(done) = stack.pop() else {
                    return Err(json_error(at, "unexpected `]`"));
                };
                if done.nodes.is_empty() && done.items == 0 {
                    return Err(TreeFormatError::EmptyGroup);
                }
                if done.expect_item {
                    return Err(json_error(at, "trailing `,`"));
                }
                match stack.last_mut() {
                    Some(parent) => {
                        if let Some(owner) = parent.nodes.last_mut() {
                            owner.children = done.nodes;
                        }
                        parent.items += 1;
                        parent.after_label = false;
                        parent.expect_item = false;
                    }
                    None => forest = Some(done.nodes),
                }
            }
            b',' => match stack.last_mut() {
                Some(frame) if !frame.expect_item => frame.expect_item = true,
                _ => return Err(json_error(at, "unexpected `,`")),
            },
            b'"' => {
                let Some(frame) = stack.last_mut() else {
                    return Err(json_error(at, "expected `[`"));
                };
                if !frame.expect_item {
                    return Err(json_error(at, "expected `,` or `]`"));
                }
                let end = string_end(bytes, at)?;
                let label: String = serde_json::from_str(&text[at..end])
                    .map_err(|e| TreeFormatError::Json(e.to_string()))?;
                pos = end;
                frame.nodes.push(TreeNode::new(label));
                frame.items += 1;
                frame.after_label = true;
                frame.expect_item = false;
            }
            _ => return Err(json_error(at, "expected a label or a group")),
        }
    }

    forest.ok_or_else(|| json_error(bytes.len(), "unexpected end of input"))
}
