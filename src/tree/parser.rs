//! Text to [`Tree`] parser for the supported YAML subset.
//!
//! Handles block and flow collections, plain and quoted scalars, node
//! properties (anchors and tags), aliases and merge keys. Comments and blank
//! lines are kept on the nodes they precede; end-of-line comments are kept
//! on the node they follow.

use super::node::{
    CollectionStyle, Mark, Node, NodeId, NodeKind, NodeMeta, ScalarNode, ScalarStyle, Tree,
    MERGE_TAG,
};
use crate::error::{BindError, ErrorKind, Result};
use std::collections::HashMap;

/// Default bound on node nesting.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Parses a single document.
pub fn parse(text: &str) -> Result<Tree> {
    TreeParser::new(text).parse()
}

#[derive(Debug, Clone, Copy)]
struct Position {
    pos: usize,
    line: u32,
    col: usize,
}

/// Recursive-descent parser producing a [`Tree`].
pub struct TreeParser {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: usize,
    depth: usize,
    max_depth: usize,
    tree: Tree,
    anchors: HashMap<String, NodeId>,
    /// Comment and blank lines not yet attached to a node.
    pending: Vec<String>,
}

fn is_merge_key(scalar: &ScalarNode) -> bool {
    scalar.style == ScalarStyle::Plain && scalar.text == "<<"
}

fn empty_scalar() -> NodeKind {
    NodeKind::Scalar(ScalarNode {
        text: String::new(),
        style: ScalarStyle::Plain,
        raw: Some(String::new()),
    })
}

impl TreeParser {
    pub fn new(text: &str) -> Self {
        TreeParser {
            chars: text.replace("\r\n", "\n").chars().collect(),
            pos: 0,
            line: 1,
            col: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            tree: Tree::new(),
            anchors: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Sets the maximum nesting depth.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn parse(mut self) -> Result<Tree> {
        if self.peek() == Some('\u{feff}') {
            self.bump();
        }
        self.collect_lines()?;
        if !self.eof() {
            // Comments above the first node belong to the document root.
            let head = std::mem::take(&mut self.pending);
            self.skip_indent();
            let root = self.parse_block(None, false)?;
            self.tree.get_mut(root).meta.leading_comments = head;
            self.tree.set_root(root);
            if !self.eof() {
                self.skip_indent();
                return Err(self.error("unexpected content after the document root"));
            }
        }
        self.tree.trailing_comments = std::mem::take(&mut self.pending);
        Ok(self.tree)
    }

    // Cursor

    fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn save(&self) -> Position {
        Position {
            pos: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn restore(&mut self, p: Position) {
        self.pos = p.pos;
        self.line = p.line;
        self.col = p.col;
    }

    fn mark(&self) -> Mark {
        Mark::new(self.line, self.col as u32 + 1)
    }

    fn error(&self, message: impl Into<String>) -> BindError {
        BindError::new(ErrorKind::syntax(message)).at(Some(self.mark()))
    }

    fn is_blank(c: Option<char>) -> bool {
        matches!(c, None | Some(' ') | Some('\t') | Some('\n'))
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.bump();
        }
    }

    /// True at the end of a line, the end of input, or the start of a comment.
    fn at_line_end(&self) -> bool {
        match self.peek() {
            None | Some('\n') => true,
            Some('#') => self.pos == 0 || matches!(self.chars[self.pos - 1], ' ' | '\t' | '\n'),
            _ => false,
        }
    }

    /// True if only whitespace or a comment remains on the line.
    fn rest_is_blank(&mut self) -> bool {
        let save = self.save();
        self.skip_spaces();
        let blank = self.at_line_end();
        self.restore(save);
        blank
    }

    /// Skips spaces and a `:` value indicator if one follows.
    fn followed_by_colon(&mut self) -> bool {
        let save = self.save();
        self.skip_spaces();
        if self.peek() == Some(':') && Self::is_blank(self.peek_at(1)) {
            return true;
        }
        self.restore(save);
        false
    }

    /// Number of spaces at the start of the current line.
    fn indent(&self) -> usize {
        self.chars[self.pos..]
            .iter()
            .take_while(|&&c| c == ' ')
            .count()
    }

    fn skip_indent(&mut self) {
        while self.peek() == Some(' ') {
            self.bump();
        }
    }

    fn dash_at(&self, indent: usize) -> bool {
        self.chars.get(self.pos + indent) == Some(&'-')
            && Self::is_blank(self.chars.get(self.pos + indent + 1).copied())
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(BindError::new(ErrorKind::RecursionLimit {
                limit: self.max_depth,
            })
            .at(Some(self.mark())));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn fill(&mut self, id: NodeId, kind: NodeKind, meta: NodeMeta, mark: Mark) {
        self.tree.fill(
            id,
            Node {
                kind,
                meta,
                mark: Some(mark),
            },
        );
    }

    fn add_empty(&mut self, meta: NodeMeta, mark: Mark) -> NodeId {
        self.tree.add(Node {
            kind: empty_scalar(),
            meta,
            mark: Some(mark),
        })
    }

    // Lines

    /// Moves to the next content line, queueing comment and blank lines.
    fn collect_lines(&mut self) -> Result<()> {
        while !self.eof() {
            let start = self.pos;
            let mut i = start;
            while matches!(self.chars.get(i), Some(' ') | Some('\t')) {
                i += 1;
            }
            match self.chars.get(i) {
                None => {
                    while !self.eof() {
                        self.bump();
                    }
                }
                Some('\n') | Some('#') => {
                    let end = self.chars[start..]
                        .iter()
                        .position(|&c| c == '\n')
                        .map_or(self.chars.len(), |n| start + n);
                    self.pending.push(self.chars[start..end].iter().collect());
                    while self.pos < end {
                        self.bump();
                    }
                    self.bump();
                }
                Some(_) => {
                    if self.chars[start..i].contains(&'\t') {
                        return Err(self.error("tabs are not allowed in indentation"));
                    }
                    if i == start && self.at_document_marker() {
                        return Err(self.error("document markers and directives are not supported"));
                    }
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn at_document_marker(&self) -> bool {
        let rest = &self.chars[self.pos..];
        let marker = (rest.starts_with(&['-', '-', '-']) || rest.starts_with(&['.', '.', '.']))
            && Self::is_blank(rest.get(3).copied());
        marker || rest.first() == Some(&'%')
    }

    /// Consumes the rest of the line and returns its comment, if any,
    /// including the whitespace in front of it.
    fn take_trailing(&mut self) -> Result<Option<String>> {
        let start = self.pos;
        self.skip_spaces();
        let comment = match self.peek() {
            None | Some('\n') => None,
            Some('#') if self.at_line_end() => {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.bump();
                }
                Some(self.chars[start..self.pos].iter().collect())
            }
            Some(c) => return Err(self.error(format!("unexpected `{}` after value", c))),
        };
        self.bump();
        Ok(comment)
    }

    // Properties

    /// Reads `&anchor` and `!tag` properties. The anchor is bound to `id`.
    fn parse_props(&mut self, meta: &mut NodeMeta, id: NodeId, flow: bool) -> Result<bool> {
        let mut found = false;
        loop {
            match self.peek() {
                Some('&') => {
                    if meta.anchor.is_some() {
                        return Err(self.error("a node may carry only one anchor"));
                    }
                    self.bump();
                    let name = self.read_name();
                    if name.is_empty() {
                        return Err(self.error("expected an anchor name"));
                    }
                    self.anchors.insert(name.clone(), id);
                    meta.anchor = Some(name);
                }
                Some('!') => {
                    if meta.tag.is_some() {
                        return Err(self.error("a node may carry only one tag"));
                    }
                    meta.tag = Some(self.read_name());
                }
                _ => return Ok(found),
            }
            found = true;

            let delimited = Self::is_blank(self.peek())
                || (flow && matches!(self.peek(), Some(',') | Some(']') | Some('}')));
            if !delimited {
                return Err(self.error("expected whitespace after node properties"));
            }
            if flow {
                self.skip_flow_space();
            } else {
                let save = self.save();
                self.skip_spaces();
                if self.at_line_end() {
                    self.restore(save);
                    return Ok(true);
                }
            }
        }
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || ",[]{}".contains(c) {
                break;
            }
            self.bump();
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_alias(&mut self) -> Result<NodeId> {
        self.bump();
        let name = self.read_name();
        self.anchors
            .get(&name)
            .copied()
            .ok_or_else(|| self.error(format!("unknown anchor `{}`", name)))
    }

    // Block context

    fn parse_block(&mut self, parent: Option<usize>, inline: bool) -> Result<NodeId> {
        self.enter()?;
        let result = self.parse_block_node(parent, inline);
        self.leave();
        result
    }

    /// Parses a node starting at the cursor. `parent` is the column of the
    /// enclosing key or sequence entry; `inline` is set when the node starts
    /// on the same line as its key.
    fn parse_block_node(&mut self, parent: Option<usize>, inline: bool) -> Result<NodeId> {
        let mark = self.mark();
        let id = self.tree.reserve();
        let mut meta = NodeMeta::default();

        if self.parse_props(&mut meta, id, false)? && self.rest_is_blank() {
            // Properties alone on a line apply to the collection below them.
            meta.trailing_comment = self.take_trailing()?;
            self.collect_lines()?;
            if self.nested_follows(parent, inline) {
                self.skip_indent();
                return self.parse_content(id, meta, parent, false, true);
            }
            self.fill(id, empty_scalar(), meta, mark);
            return Ok(id);
        }
        self.parse_content(id, meta, parent, inline, false)
    }

    /// True when the current line holds content nested under `parent`.
    fn nested_follows(&self, parent: Option<usize>, value_of_key: bool) -> bool {
        if self.eof() {
            return false;
        }
        let indent = self.indent();
        match parent {
            None => true,
            Some(p) => indent > p || (value_of_key && indent == p && self.dash_at(indent)),
        }
    }

    fn parse_content(
        &mut self,
        id: NodeId,
        mut meta: NodeMeta,
        parent: Option<usize>,
        inline: bool,
        detached: bool,
    ) -> Result<NodeId> {
        let mark = self.mark();
        let col = self.col;
        let base = parent.unwrap_or(0);

        match self.peek() {
            Some('*') => {
                if meta.anchor.is_some() || meta.tag.is_some() {
                    return Err(self.error("an alias cannot carry node properties"));
                }
                let target = self.parse_alias()?;
                if self.followed_by_colon() {
                    return Err(self.error("aliases are not supported as mapping keys"));
                }
                meta.trailing_comment = self.take_trailing()?;
                self.collect_lines()?;
                self.fill(id, NodeKind::Alias(target), meta, mark);
                Ok(id)
            }
            Some('-') if Self::is_blank(self.peek_at(1)) => {
                if inline {
                    return Err(self.error("a block sequence cannot start on the line of its key"));
                }
                meta.indent = Some(col.saturating_sub(base));
                self.parse_sequence(id, meta, mark, col)?;
                Ok(id)
            }
            Some('{') | Some('[') => {
                let kind = self.parse_flow_collection()?;
                if self.followed_by_colon() {
                    return Err(self.error("complex mapping keys are not supported"));
                }
                meta.style = CollectionStyle::Flow;
                let comment = self.take_trailing()?;
                meta.trailing_comment = meta.trailing_comment.or(comment);
                self.collect_lines()?;
                self.fill(id, kind, meta, mark);
                Ok(id)
            }
            Some('?') if Self::is_blank(self.peek_at(1)) => {
                Err(self.error("complex mapping keys are not supported"))
            }
            _ => {
                let scalar = self.parse_scalar(false)?;
                if !self.followed_by_colon() {
                    let comment = self.take_trailing()?;
                    meta.trailing_comment = meta.trailing_comment.or(comment);
                    self.collect_lines()?;
                    self.fill(id, NodeKind::Scalar(scalar), meta, mark);
                    return Ok(id);
                }
                if inline {
                    return Err(self.error("mapping values are not allowed here"));
                }

                // The scalar is the first key of a block mapping. Properties on
                // the key's own line belong to the key.
                let (map_id, mut map_meta, key_id, mut key_meta) = if detached {
                    (id, meta, self.tree.reserve(), NodeMeta::default())
                } else {
                    (self.tree.reserve(), NodeMeta::default(), id, meta)
                };
                key_meta.leading_comments = std::mem::take(&mut self.pending);
                if key_meta.tag.is_none() && is_merge_key(&scalar) {
                    key_meta.tag = Some(MERGE_TAG.to_string());
                }
                self.fill(key_id, NodeKind::Scalar(scalar), key_meta, mark);
                map_meta.indent = Some(col.saturating_sub(base));
                self.parse_mapping(map_id, map_meta, mark, col, key_id)?;
                Ok(map_id)
            }
        }
    }

    /// Parses the remaining pairs of a block mapping whose keys sit at `col`.
    /// The cursor is on the `:` after `first_key`.
    fn parse_mapping(
        &mut self,
        id: NodeId,
        meta: NodeMeta,
        mark: Mark,
        col: usize,
        first_key: NodeId,
    ) -> Result<()> {
        let mut pairs = Vec::new();
        let mut key = first_key;
        loop {
            self.bump();
            let value = self.parse_value(col)?;
            pairs.push((key, value));

            if self.eof() {
                break;
            }
            let indent = self.indent();
            if indent < col || (indent == col && self.dash_at(indent)) {
                break;
            }
            self.skip_indent();
            if indent > col {
                return Err(self.error("unexpected indentation"));
            }
            key = self.parse_key()?;
        }
        self.fill(id, NodeKind::Mapping(pairs), meta, mark);
        Ok(())
    }

    fn parse_key(&mut self) -> Result<NodeId> {
        let mark = self.mark();
        let id = self.tree.reserve();
        let mut meta = NodeMeta::default();
        self.parse_props(&mut meta, id, false)?;
        match self.peek() {
            Some('*') => return Err(self.error("aliases are not supported as mapping keys")),
            Some('{') | Some('[') | Some('?') => {
                return Err(self.error("complex mapping keys are not supported"))
            }
            _ => {}
        }
        let scalar = self.parse_scalar(false)?;
        if !self.followed_by_colon() {
            return Err(self.error("could not find expected `:`"));
        }
        meta.leading_comments = std::mem::take(&mut self.pending);
        if meta.tag.is_none() && is_merge_key(&scalar) {
            meta.tag = Some(MERGE_TAG.to_string());
        }
        self.fill(id, NodeKind::Scalar(scalar), meta, mark);
        Ok(id)
    }

    /// Parses the value after a key's `:`.
    fn parse_value(&mut self, col: usize) -> Result<NodeId> {
        if !self.rest_is_blank() {
            self.skip_spaces();
            return self.parse_block(Some(col), true);
        }

        let mark = self.mark();
        let comment = self.take_trailing()?;
        self.collect_lines()?;
        if self.nested_follows(Some(col), true) {
            self.skip_indent();
            let value = self.parse_block(Some(col), false)?;
            self.attach_trailing(value, comment);
            return Ok(value);
        }
        let meta = NodeMeta {
            trailing_comment: comment,
            ..Default::default()
        };
        Ok(self.add_empty(meta, mark))
    }

    fn attach_trailing(&mut self, id: NodeId, comment: Option<String>) {
        if comment.is_some() {
            let meta = &mut self.tree.get_mut(id).meta;
            if meta.trailing_comment.is_none() {
                meta.trailing_comment = comment;
            }
        }
    }

    /// Parses a block sequence whose entries sit at `col`.
    fn parse_sequence(&mut self, id: NodeId, meta: NodeMeta, mark: Mark, col: usize) -> Result<()> {
        let mut items = Vec::new();
        loop {
            let leading = std::mem::take(&mut self.pending);
            self.bump();

            let item = if self.rest_is_blank() {
                let item_mark = self.mark();
                let comment = self.take_trailing()?;
                self.collect_lines()?;
                if self.nested_follows(Some(col), false) {
                    self.skip_indent();
                    let item = self.parse_block(Some(col), false)?;
                    self.attach_trailing(item, comment);
                    item
                } else {
                    let meta = NodeMeta {
                        trailing_comment: comment,
                        ..Default::default()
                    };
                    self.add_empty(meta, item_mark)
                }
            } else {
                self.skip_spaces();
                self.parse_block(Some(col), false)?
            };

            if !leading.is_empty() {
                let meta = &mut self.tree.get_mut(item).meta;
                let mut lines = leading;
                lines.append(&mut meta.leading_comments);
                meta.leading_comments = lines;
            }
            items.push(item);

            if self.eof() {
                break;
            }
            let indent = self.indent();
            if indent == col && self.dash_at(indent) {
                self.skip_indent();
                continue;
            }
            if indent > col {
                self.skip_indent();
                return Err(self.error("unexpected indentation"));
            }
            break;
        }
        self.fill(id, NodeKind::Sequence(items), meta, mark);
        Ok(())
    }

    // Scalars

    fn parse_scalar(&mut self, flow: bool) -> Result<ScalarNode> {
        match self.peek() {
            Some('\'') => self.parse_single_quoted(),
            Some('"') => self.parse_double_quoted(),
            Some('|') | Some('>') => Err(self.error("block scalars are not supported")),
            Some(c) if "%@`,[]{}#&*!".contains(c) => {
                Err(self.error(format!("`{}` cannot start a plain scalar", c)))
            }
            _ => Ok(self.parse_plain(flow)),
        }
    }

    fn parse_plain(&mut self, flow: bool) -> ScalarNode {
        let start = self.pos;
        let mut end = self.pos;
        let ends_value = |c: Option<char>| {
            Self::is_blank(c) || (flow && matches!(c, Some(',') | Some('[') | Some(']') | Some('{') | Some('}')))
        };

        while let Some(c) = self.peek() {
            match c {
                '\n' => break,
                ' ' | '\t' => {
                    let mut i = self.pos;
                    while matches!(self.chars.get(i), Some(' ') | Some('\t')) {
                        i += 1;
                    }
                    let next = self.chars.get(i).copied();
                    let stop = match next {
                        None | Some('\n') | Some('#') => true,
                        Some(':') => ends_value(self.chars.get(i + 1).copied()),
                        Some(',') | Some('[') | Some(']') | Some('{') | Some('}') => flow,
                        _ => false,
                    };
                    if stop {
                        break;
                    }
                    while self.pos < i {
                        self.bump();
                    }
                }
                ':' if ends_value(self.peek_at(1)) => break,
                ',' | '[' | ']' | '{' | '}' if flow => break,
                _ => {
                    self.bump();
                    end = self.pos;
                }
            }
        }

        let text: String = self.chars[start..end].iter().collect();
        ScalarNode {
            raw: Some(text.clone()),
            text,
            style: ScalarStyle::Plain,
        }
    }

    fn parse_single_quoted(&mut self) -> Result<ScalarNode> {
        let start = self.pos;
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error("multi-line or unterminated quoted scalars are not supported"))
                }
                Some('\'') => {
                    if self.peek() == Some('\'') {
                        self.bump();
                        text.push('\'');
                    } else {
                        break;
                    }
                }
                Some(c) => text.push(c),
            }
        }
        Ok(ScalarNode {
            text,
            style: ScalarStyle::SingleQuoted,
            raw: Some(self.chars[start..self.pos].iter().collect()),
        })
    }

    fn parse_double_quoted(&mut self) -> Result<ScalarNode> {
        let start = self.pos;
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error("multi-line or unterminated quoted scalars are not supported"))
                }
                Some('"') => break,
                Some('\\') => {
                    let c = match self.bump() {
                        Some('n') => '\n',
                        Some('t') | Some('\t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('a') => '\u{07}',
                        Some('b') => '\u{08}',
                        Some('e') => '\u{1b}',
                        Some('f') => '\u{0c}',
                        Some('v') => '\u{0b}',
                        Some('N') => '\u{85}',
                        Some('_') => '\u{a0}',
                        Some('L') => '\u{2028}',
                        Some('P') => '\u{2029}',
                        Some('x') => self.read_hex(2)?,
                        Some('u') => self.read_hex(4)?,
                        Some('U') => self.read_hex(8)?,
                        Some(c @ (' ' | '"' | '/' | '\\')) => c,
                        _ => return Err(self.error("invalid escape in double-quoted scalar")),
                    };
                    text.push(c);
                }
                Some(c) => text.push(c),
            }
        }
        Ok(ScalarNode {
            text,
            style: ScalarStyle::DoubleQuoted,
            raw: Some(self.chars[start..self.pos].iter().collect()),
        })
    }

    fn read_hex(&mut self, digits: usize) -> Result<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid escape in double-quoted scalar"))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape"))
    }

    // Flow context

    fn skip_flow_space(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\n') => {
                    self.bump();
                }
                Some('#') if self.at_line_end() => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.bump();
                    }
                }
                _ => return,
            }
        }
    }

    fn parse_flow_collection(&mut self) -> Result<NodeKind> {
        let close = if self.bump() == Some('{') { '}' } else { ']' };
        let mut pairs = Vec::new();
        let mut items = Vec::new();

        loop {
            self.skip_flow_space();
            match self.peek() {
                None => return Err(self.error("unterminated flow collection")),
                Some(c) if c == close => {
                    self.bump();
                    break;
                }
                _ => {}
            }

            if close == '}' {
                let key = self.parse_flow_node(true)?;
                self.skip_flow_space();
                let value = if self.peek() == Some(':') {
                    self.bump();
                    self.skip_flow_space();
                    if matches!(self.peek(), Some(',') | Some('}')) {
                        let mark = self.mark();
                        self.add_empty(NodeMeta::default(), mark)
                    } else {
                        self.parse_flow_node(false)?
                    }
                } else {
                    let mark = self.mark();
                    self.add_empty(NodeMeta::default(), mark)
                };
                pairs.push((key, value));
            } else {
                let item = self.parse_flow_node(false)?;
                self.skip_flow_space();
                if self.peek() == Some(':') {
                    return Err(self.error("flow pairs inside sequences are not supported"));
                }
                items.push(item);
            }

            self.skip_flow_space();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {
                    self.bump();
                    break;
                }
                None => return Err(self.error("unterminated flow collection")),
                Some(c) => {
                    return Err(self.error(format!("expected `,` or `{}`, found `{}`", close, c)))
                }
            }
        }

        Ok(if close == '}' {
            NodeKind::Mapping(pairs)
        } else {
            NodeKind::Sequence(items)
        })
    }

    fn parse_flow_node(&mut self, is_key: bool) -> Result<NodeId> {
        self.enter()?;
        let result = self.parse_flow_node_inner(is_key);
        self.leave();
        result
    }

    fn parse_flow_node_inner(&mut self, is_key: bool) -> Result<NodeId> {
        let mark = self.mark();
        let id = self.tree.reserve();
        let mut meta = NodeMeta::default();
        let has_props = self.parse_props(&mut meta, id, true)?;

        let kind = match self.peek() {
            Some('*') => {
                if has_props {
                    return Err(self.error("an alias cannot carry node properties"));
                }
                NodeKind::Alias(self.parse_alias()?)
            }
            Some('{') | Some('[') => {
                meta.style = CollectionStyle::Flow;
                self.parse_flow_collection()?
            }
            None | Some(',') | Some(']') | Some('}') => empty_scalar(),
            Some('?') if Self::is_blank(self.peek_at(1)) => {
                return Err(self.error("complex mapping keys are not supported"))
            }
            _ => {
                let scalar = self.parse_scalar(true)?;
                if is_key && meta.tag.is_none() && is_merge_key(&scalar) {
                    meta.tag = Some(MERGE_TAG.to_string());
                }
                NodeKind::Scalar(scalar)
            }
        };
        self.fill(id, kind, meta, mark);
        Ok(id)
    }
}
