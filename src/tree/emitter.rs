//! [`Tree`] to text emitter.
//!
//! Replays node metadata: anchors, tags, flow/block style, per-collection
//! indentation, quoting and comments. Scalars keep their source text when it
//! is still valid in the position they are written to.

use super::node::{CollectionStyle, NodeId, NodeKind, NodeMeta, ScalarNode, ScalarStyle, Tree};
use super::resolve::{double_quote, plain_is_safe, single_quote};
use std::collections::{HashMap, HashSet};

/// Emits `tree` with default settings.
pub fn emit(tree: &Tree) -> String {
    Emitter::new(tree).emit()
}

/// Emitter writes one tree as a YAML document.
pub struct Emitter<'a> {
    tree: &'a Tree,
    indent: usize,
    anchor_prefix: String,
    names: HashMap<NodeId, String>,
    out: String,
}

impl<'a> Emitter<'a> {
    pub fn new(tree: &'a Tree) -> Self {
        Emitter {
            tree,
            indent: 2,
            anchor_prefix: "id".to_string(),
            names: HashMap::new(),
            out: String::new(),
        }
    }

    /// Indentation of block mappings without a recorded indent.
    pub fn indent(mut self, indent: usize) -> Self {
        self.indent = indent.max(1);
        self
    }

    /// Prefix of generated anchor names.
    pub fn anchor_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.anchor_prefix = prefix.into();
        self
    }

    pub fn emit(mut self) -> String {
        if let Some(root) = self.tree.root() {
            self.assign_anchors(root);
            self.write_root(root);
        }
        for line in &self.tree.trailing_comments {
            self.out.push_str(line);
            self.out.push('\n');
        }
        self.out
    }

    /// Nodes reachable from `root` in document order.
    fn document_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            match &self.tree.get(id).kind {
                NodeKind::Mapping(pairs) => {
                    for &(k, v) in pairs.iter().rev() {
                        stack.push(v);
                        stack.push(k);
                    }
                }
                NodeKind::Sequence(items) => stack.extend(items.iter().rev()),
                NodeKind::Alias(target) => stack.push(*target),
                NodeKind::Scalar(_) => {}
            }
        }
        order
    }

    /// Names every aliased node. Explicit names are kept unless already
    /// taken; the rest are generated from the anchor prefix.
    fn assign_anchors(&mut self, root: NodeId) {
        let order = self.document_order(root);
        let referenced: HashSet<NodeId> = order
            .iter()
            .filter_map(|&id| match self.tree.get(id).kind {
                NodeKind::Alias(target) => Some(self.tree.resolve(target)),
                _ => None,
            })
            .collect();

        let mut used = HashSet::new();
        for &id in &order {
            if let Some(name) = &self.tree.get(id).meta.anchor {
                if used.insert(name.clone()) {
                    self.names.insert(id, name.clone());
                }
            }
        }

        let mut counter = 0;
        for &id in &order {
            if !referenced.contains(&id) || self.names.contains_key(&id) {
                continue;
            }
            let name = loop {
                counter += 1;
                let candidate = format!("{}{:03}", self.anchor_prefix, counter);
                if !used.contains(&candidate) {
                    break candidate;
                }
            };
            used.insert(name.clone());
            self.names.insert(id, name);
        }
    }

    fn props(&self, id: NodeId) -> String {
        let meta = &self.tree.get(id).meta;
        let mut parts = Vec::new();
        if let Some(name) = self.names.get(&id) {
            parts.push(format!("&{}", name));
        }
        if let Some(tag) = &meta.tag {
            if !meta.is_merge() {
                parts.push(tag.clone());
            }
        }
        parts.join(" ")
    }

    /// Returns true if the node is written on the line it starts on.
    fn is_inline(&self, id: NodeId) -> bool {
        let node = self.tree.get(id);
        match &node.kind {
            NodeKind::Scalar(_) | NodeKind::Alias(_) => true,
            NodeKind::Mapping(pairs) => node.meta.style == CollectionStyle::Flow || pairs.is_empty(),
            NodeKind::Sequence(items) => node.meta.style == CollectionStyle::Flow || items.is_empty(),
        }
    }

    fn scalar_text(&self, scalar: &ScalarNode, meta: &NodeMeta, flow: bool) -> String {
        if meta.is_merge() {
            return "<<".to_string();
        }
        if let Some(raw) = &scalar.raw {
            let valid = match scalar.style {
                ScalarStyle::Plain => !flow || raw.is_empty() || plain_is_safe(raw, true),
                ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted => true,
            };
            if valid {
                return raw.clone();
            }
        }
        match scalar.style {
            ScalarStyle::Plain if scalar.text.is_empty() || plain_is_safe(&scalar.text, flow) => {
                scalar.text.clone()
            }
            ScalarStyle::DoubleQuoted => double_quote(&scalar.text),
            _ if scalar.text.chars().any(char::is_control) => double_quote(&scalar.text),
            _ => single_quote(&scalar.text),
        }
    }

    /// Renders an inline node, without its properties.
    fn inline_text(&self, id: NodeId, flow: bool) -> String {
        let node = self.tree.get(id);
        match &node.kind {
            NodeKind::Scalar(scalar) => self.scalar_text(scalar, &node.meta, flow),
            NodeKind::Alias(target) => {
                let target = self.tree.resolve(*target);
                format!("*{}", self.names.get(&target).map_or("", String::as_str))
            }
            NodeKind::Mapping(pairs) => {
                let body: Vec<String> = pairs
                    .iter()
                    .map(|&(k, v)| {
                        let value = self.node_text(v, true);
                        if value.is_empty() {
                            format!("{}:", self.node_text(k, true))
                        } else {
                            format!("{}: {}", self.node_text(k, true), value)
                        }
                    })
                    .collect();
                format!("{{{}}}", body.join(", "))
            }
            NodeKind::Sequence(items) => {
                let body: Vec<String> = items.iter().map(|&item| self.node_text(item, true)).collect();
                format!("[{}]", body.join(", "))
            }
        }
    }

    /// Renders an inline node with its properties.
    fn node_text(&self, id: NodeId, flow: bool) -> String {
        let props = self.props(id);
        let text = self.inline_text(id, flow);
        match (props.is_empty(), text.is_empty()) {
            (true, _) => text,
            (false, true) => props,
            (false, false) => format!("{} {}", props, text),
        }
    }

    fn write_comments(&mut self, id: NodeId) {
        for line in &self.tree.get(id).meta.leading_comments {
            self.out.push_str(line);
            self.out.push('\n');
        }
    }

    fn end_line(&mut self, id: NodeId) {
        if let Some(comment) = &self.tree.get(id).meta.trailing_comment {
            self.out.push_str(comment);
        }
        self.out.push('\n');
    }

    fn pad(&mut self, col: usize) {
        self.out.extend(std::iter::repeat(' ').take(col));
    }

    fn write_root(&mut self, root: NodeId) {
        let tree = self.tree;
        self.write_comments(root);
        let props = self.props(root);
        let col = self.tree.get(root).meta.indent.unwrap_or(0);

        if self.is_inline(root) {
            let text = self.node_text(root, false);
            self.out.push_str(&text);
            self.end_line(root);
            return;
        }
        if !props.is_empty() || tree.get(root).meta.trailing_comment.is_some() {
            self.out.push_str(&props);
            self.end_line(root);
        }
        match &tree.get(root).kind {
            NodeKind::Mapping(pairs) => self.write_pairs(pairs, col, false),
            NodeKind::Sequence(items) => self.write_items(items, col, false),
            _ => {}
        }
    }

    /// Writes block mapping pairs at `col`. With `first_inline`, the cursor
    /// already sits where the first key starts.
    fn write_pairs(&mut self, pairs: &[(NodeId, NodeId)], col: usize, first_inline: bool) {
        for (i, &(key, value)) in pairs.iter().enumerate() {
            if !(i == 0 && first_inline) {
                self.write_comments(key);
                self.pad(col);
            }
            let props = self.props(key);
            if !props.is_empty() {
                self.out.push_str(&props);
                self.out.push(' ');
            }
            let text = self.inline_text(key, false);
            self.out.push_str(&text);
            self.out.push(':');
            self.write_value(value, col);
        }
    }

    /// Writes a mapping value after its `key:`.
    fn write_value(&mut self, id: NodeId, col: usize) {
        let tree = self.tree;
        let text = self.node_text(id, false);
        if self.is_inline(id) {
            if !text.is_empty() {
                self.out.push(' ');
                self.out.push_str(&text);
            }
            self.end_line(id);
            return;
        }

        let props = self.props(id);
        if !props.is_empty() {
            self.out.push(' ');
            self.out.push_str(&props);
        }
        self.end_line(id);

        let node = tree.get(id);
        match &node.kind {
            NodeKind::Mapping(pairs) => {
                let child = col + node.meta.indent.unwrap_or(self.indent).max(1);
                self.write_pairs(pairs, child, false);
            }
            NodeKind::Sequence(items) => {
                let child = col + node.meta.indent.unwrap_or(0);
                self.write_items(items, child, false);
            }
            _ => {}
        }
    }

    /// A block collection item starts on its dash line when nothing needs
    /// a line of its own.
    fn is_compact(&self, id: NodeId) -> bool {
        let node = self.tree.get(id);
        if !self.props(id).is_empty() || node.meta.trailing_comment.is_some() {
            return false;
        }
        let first = match &node.kind {
            NodeKind::Mapping(pairs) => pairs.first().map(|&(k, _)| k),
            NodeKind::Sequence(items) => items.first().copied(),
            _ => None,
        };
        first.map_or(false, |f| self.tree.get(f).meta.leading_comments.is_empty())
    }

    fn write_items(&mut self, items: &[NodeId], col: usize, first_inline: bool) {
        let tree = self.tree;
        for (i, &item) in items.iter().enumerate() {
            if !(i == 0 && first_inline) {
                self.write_comments(item);
                self.pad(col);
            }
            self.out.push('-');

            if self.is_inline(item) {
                let text = self.node_text(item, false);
                if !text.is_empty() {
                    self.out.push(' ');
                    self.out.push_str(&text);
                }
                self.end_line(item);
                continue;
            }

            let node = tree.get(item);
            if self.is_compact(item) {
                let step = node.meta.indent.unwrap_or(self.indent).max(2);
                self.pad(step - 1);
                match &node.kind {
                    NodeKind::Mapping(pairs) => self.write_pairs(pairs, col + step, true),
                    NodeKind::Sequence(inner) => self.write_items(inner, col + step, true),
                    _ => {}
                }
                continue;
            }

            let props = self.props(item);
            if !props.is_empty() {
                self.out.push(' ');
                self.out.push_str(&props);
            }
            self.end_line(item);
            let child = col + node.meta.indent.unwrap_or(self.indent).max(1);
            match &node.kind {
                NodeKind::Mapping(pairs) => self.write_pairs(pairs, child, false),
                NodeKind::Sequence(inner) => self.write_items(inner, child, false),
                _ => {}
            }
        }
    }
}
