//! Node arena for parsed documents.
//!
//! A [`Tree`] owns every node of one document. Nodes are addressed by
//! [`NodeId`]; shared structure (anchors and aliases) is expressed by
//! [`NodeKind::Alias`] nodes pointing at the anchored node, so cycles are
//! representable without reference counting.

use std::collections::HashMap;
use std::fmt;

/// Tag carried by the key node of a merge (`<<`) pair.
pub const MERGE_TAG: &str = "tag:yaml.org,2002:merge";

/// Index of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Returns the position of this node in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Source location of a node, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mark {
    pub line: u32,
    pub column: u32,
}

impl Mark {
    pub fn new(line: u32, column: u32) -> Self {
        Mark { line, column }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Quoting used for a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
}

/// Layout used for a mapping or sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CollectionStyle {
    #[default]
    Block,
    Flow,
}

/// Formatting attributes of a node that are not part of its content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeMeta {
    /// Explicit tag as written (`!!str`), or [`MERGE_TAG`] on merge keys.
    pub tag: Option<String>,
    /// Anchor name, without the `&`.
    pub anchor: Option<String>,
    pub style: CollectionStyle,
    /// Column offset of a block collection's entries relative to its parent.
    pub indent: Option<usize>,
    /// Comment and blank lines preceding the node, verbatim.
    pub leading_comments: Vec<String>,
    /// End-of-line comment, including the whitespace before `#`.
    pub trailing_comment: Option<String>,
}

impl NodeMeta {
    /// Returns true when the metadata carries nothing worth replaying.
    pub fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.anchor.is_none()
            && self.style == CollectionStyle::Block
            && self.indent.is_none()
            && self.leading_comments.is_empty()
            && self.trailing_comment.is_none()
    }

    /// Returns true if this is the key of a merge pair.
    pub fn is_merge(&self) -> bool {
        self.tag.as_deref() == Some(MERGE_TAG)
    }

    /// Metadata that belongs to one occurrence of a node rather than the
    /// node itself: comments only.
    pub fn occurrence(&self) -> NodeMeta {
        NodeMeta {
            leading_comments: self.leading_comments.clone(),
            trailing_comment: self.trailing_comment.clone(),
            ..Default::default()
        }
    }
}

/// Scalar content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScalarNode {
    /// Decoded text (quotes removed, escapes applied).
    pub text: String,
    pub style: ScalarStyle,
    /// Exact source text, replayed verbatim by the emitter when present.
    pub raw: Option<String>,
}

impl ScalarNode {
    pub fn plain(text: impl Into<String>) -> Self {
        ScalarNode {
            text: text.into(),
            style: ScalarStyle::Plain,
            raw: None,
        }
    }

    pub fn with_style(text: impl Into<String>, style: ScalarStyle) -> Self {
        ScalarNode {
            text: text.into(),
            style,
            raw: None,
        }
    }
}

/// The content of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(ScalarNode),
    Mapping(Vec<(NodeId, NodeId)>),
    Sequence(Vec<NodeId>),
    /// A `*name` occurrence of the referenced node.
    Alias(NodeId),
}

impl NodeKind {
    /// Short name used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            NodeKind::Scalar(_) => "scalar",
            NodeKind::Mapping(_) => "mapping",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Alias(_) => "alias",
        }
    }
}

/// One node of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub meta: NodeMeta,
    pub mark: Option<Mark>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            meta: NodeMeta::default(),
            mark: None,
        }
    }

    pub fn with_meta(kind: NodeKind, meta: NodeMeta) -> Self {
        Node {
            kind,
            meta,
            mark: None,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarNode> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

/// Arena holding the nodes of one document.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    /// Comment and blank lines after the last node.
    pub trailing_comments: Vec<String>,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a node and returns its id.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Reserves an id whose content is filled in later with [`Tree::fill`].
    ///
    /// Needed whenever a node can be referenced before its children are
    /// complete, e.g. an anchored mapping containing an alias to itself.
    pub fn reserve(&mut self) -> NodeId {
        self.add(Node::new(NodeKind::Scalar(ScalarNode::default())))
    }

    pub fn fill(&mut self, id: NodeId, node: Node) {
        self.nodes[id.index()] = node;
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn scalar(&mut self, scalar: ScalarNode, meta: NodeMeta) -> NodeId {
        self.add(Node::with_meta(NodeKind::Scalar(scalar), meta))
    }

    pub fn alias(&mut self, target: NodeId, meta: NodeMeta) -> NodeId {
        self.add(Node::with_meta(NodeKind::Alias(target), meta))
    }

    /// Follows alias occurrences to the node they reference.
    pub fn resolve(&self, mut id: NodeId) -> NodeId {
        // Alias chains are acyclic: an alias always targets an anchored
        // non-alias node, but guard against malformed trees anyway.
        for _ in 0..self.nodes.len() {
            match self.get(id).kind {
                NodeKind::Alias(target) => id = target,
                _ => return id,
            }
        }
        id
    }

    /// Returns true if `id` is the key of a merge pair.
    pub fn is_merge_key(&self, id: NodeId) -> bool {
        self.get(id).meta.is_merge()
    }

    /// Copies the subtree of `source` rooted at `id` into this tree and
    /// returns the id of the copy.
    ///
    /// `copied` maps source ids to ids already copied, so shared nodes and
    /// cycles are copied once and stay shared.
    pub fn copy_from(
        &mut self,
        source: &Tree,
        id: NodeId,
        copied: &mut HashMap<NodeId, NodeId>,
    ) -> NodeId {
        source.copy_into(id, self, copied)
    }

    fn copy_into(
        &self,
        id: NodeId,
        out: &mut Tree,
        mapping: &mut HashMap<NodeId, NodeId>,
    ) -> NodeId {
        if let Some(&copied) = mapping.get(&id) {
            return copied;
        }
        let new_id = out.reserve();
        mapping.insert(id, new_id);

        let node = self.get(id);
        let kind = match &node.kind {
            NodeKind::Scalar(s) => NodeKind::Scalar(s.clone()),
            NodeKind::Mapping(pairs) => NodeKind::Mapping(
                pairs
                    .iter()
                    .map(|&(k, v)| {
                        (
                            self.copy_into(k, out, mapping),
                            self.copy_into(v, out, mapping),
                        )
                    })
                    .collect(),
            ),
            NodeKind::Sequence(items) => NodeKind::Sequence(
                items
                    .iter()
                    .map(|&item| self.copy_into(item, out, mapping))
                    .collect(),
            ),
            NodeKind::Alias(target) => NodeKind::Alias(self.copy_into(*target, out, mapping)),
        };

        out.fill(
            new_id,
            Node {
                kind,
                meta: node.meta.clone(),
                mark: node.mark,
            },
        );
        new_id
    }
}
