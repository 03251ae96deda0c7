use crate::error::{ModelError, Result};
use crate::mark::{self, Mark, MarkSet};
use crate::resolve::ResolvedPos;
use crate::schema::{Attrs, NodeType};
use serde_json::Value;
use smartstring::alias::String as SmartString;
use std::fmt;
use std::rc::Rc;

/// Immutable document node.
///
/// Cloning is cheap: nodes share their data through `Rc`, and edits rebuild
/// only the path from the changed node up to the root. Two clones of the same
/// node are identical (`ptr_eq`); structurally equal nodes built separately
/// are equal (`==`) but not identical.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

struct NodeInner {
    ty: Rc<NodeType>,
    attrs: Attrs,
    content: Vec<Node>,
    marks: MarkSet,
    text: Option<SmartString>,
    content_size: usize,
}

impl Node {
    pub(crate) fn new(ty: Rc<NodeType>, attrs: Attrs, content: Vec<Node>, marks: MarkSet) -> Self {
        let content_size = content.iter().map(Node::node_size).sum();
        Self(Rc::new(NodeInner {
            ty,
            attrs,
            content,
            marks,
            text: None,
            content_size,
        }))
    }

    pub(crate) fn new_text(ty: Rc<NodeType>, text: SmartString, marks: MarkSet) -> Self {
        let content_size = char_len(&text);
        Self(Rc::new(NodeInner {
            ty,
            attrs: Attrs::new(),
            content: Vec::new(),
            marks,
            text: Some(text),
            content_size,
        }))
    }

    pub fn node_type(&self) -> &Rc<NodeType> {
        &self.0.ty
    }

    pub fn type_name(&self) -> &str {
        self.0.ty.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.0.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.0.attrs.get(name)
    }

    pub fn marks(&self) -> &[Mark] {
        &self.0.marks
    }

    pub fn text(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    pub fn children(&self) -> &[Node] {
        &self.0.content
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.0.content.get(index)
    }

    pub fn child_count(&self) -> usize {
        self.0.content.len()
    }

    pub fn is_text(&self) -> bool {
        self.0.ty.is_text()
    }

    pub fn is_inline(&self) -> bool {
        self.0.ty.is_inline()
    }

    pub fn is_block(&self) -> bool {
        self.0.ty.is_block()
    }

    pub fn is_textblock(&self) -> bool {
        self.0.ty.is_textblock()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.ty.is_leaf()
    }

    /// Size of the node in document positions
    pub fn node_size(&self) -> usize {
        if self.is_text() {
            self.0.content_size
        } else if self.is_leaf() {
            1
        } else {
            self.0.content_size + 2
        }
    }

    pub fn content_size(&self) -> usize {
        self.0.content_size
    }

    pub fn text_content(&self) -> String {
        match &self.0.text {
            Some(text) => text.to_string(),
            None => self.0.content.iter().map(Node::text_content).collect(),
        }
    }

    /// Whether both handles refer to the same node instance
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Same type, attributes and marks
    pub fn same_markup(&self, other: &Node) -> bool {
        self.0.ty == other.0.ty
            && self.0.attrs == other.0.attrs
            && mark::same_set(&self.0.marks, &other.0.marks)
    }

    /// Same markup, new content
    pub fn copy(&self, content: Vec<Node>) -> Node {
        Node::new(
            self.0.ty.clone(),
            self.0.attrs.clone(),
            content,
            self.0.marks.clone(),
        )
    }

    pub fn with_marks(&self, marks: MarkSet) -> Node {
        match &self.0.text {
            Some(text) => Node::new_text(self.0.ty.clone(), text.clone(), marks),
            None => Node::new(
                self.0.ty.clone(),
                self.0.attrs.clone(),
                self.0.content.clone(),
                marks,
            ),
        }
    }

    /// Slice of a text node, in character offsets
    pub fn cut_text(&self, from: usize, to: usize) -> Node {
        let text = self.0.text.as_deref().unwrap_or_default();
        Node::new_text(
            self.0.ty.clone(),
            slice_chars(text, from, to).into(),
            self.0.marks.clone(),
        )
    }

    pub fn to_dom(&self) -> Option<Value> {
        self.0.ty.to_dom().map(|f| f(self))
    }

    /// Children paired with their offset inside this node's content
    pub fn child_offsets(&self) -> impl Iterator<Item = (usize, &Node)> + '_ {
        self.0.content.iter().scan(0usize, |pos, child| {
            let start = *pos;
            *pos += child.node_size();
            Some((start, child))
        })
    }

    /// Index and start offset of the child at `pos`; a position on a
    /// boundary resolves to the child after it
    pub fn find_index(&self, pos: usize) -> Result<(usize, usize)> {
        if pos == 0 {
            return Ok((0, 0));
        }
        if pos == self.0.content_size {
            return Ok((self.0.content.len(), pos));
        }
        if pos > self.0.content_size {
            return Err(ModelError::PositionOutOfRange {
                pos,
                size: self.0.content_size,
            });
        }
        for (index, (offset, child)) in self.child_offsets().enumerate() {
            let end = offset + child.node_size();
            if end == pos {
                return Ok((index + 1, end));
            }
            if end > pos {
                return Ok((index, offset));
            }
        }
        Err(ModelError::PositionOutOfRange {
            pos,
            size: self.0.content_size,
        })
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos> {
        ResolvedPos::resolve(self, pos)
    }

    /// Call `f` for every descendant overlapping `from..to`, with the
    /// node's absolute position. Returning `false` skips its children.
    pub fn nodes_between(&self, from: usize, to: usize, f: &mut dyn FnMut(&Node, usize) -> bool) {
        self.nodes_between_at(from, to, 0, f);
    }

    fn nodes_between_at(
        &self,
        from: usize,
        to: usize,
        base: usize,
        f: &mut dyn FnMut(&Node, usize) -> bool,
    ) {
        for (offset, child) in self.child_offsets() {
            if offset >= to {
                break;
            }
            let end = offset + child.node_size();
            if end > from && f(child, base + offset) && child.content_size() > 0 && !child.is_text() {
                let start = offset + 1;
                child.nodes_between_at(
                    from.saturating_sub(start),
                    child.content_size().min(to.saturating_sub(start)),
                    base + start,
                    f,
                );
            }
        }
    }

    /// Every mark carried by inline content between `from` and `to`
    pub fn marks_between(&self, from: usize, to: usize) -> MarkSet {
        let mut marks = MarkSet::new();
        self.nodes_between(from, to, &mut |node, _| {
            if node.is_inline() {
                marks = mark::union(&marks, node.marks());
            }
            true
        });
        marks
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.same_markup(other)
                && self.0.text == other.0.text
                && self.0.content == other.0.content)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut open = 0;
        for mark in self.marks() {
            write!(f, "{}(", mark.type_name())?;
            open += 1;
        }
        match &self.0.text {
            Some(text) => write!(f, "{:?}", text.as_str())?,
            None => {
                write!(f, "{}", self.type_name())?;
                if !self.0.attrs.is_empty() {
                    write!(f, "{:?}", self.0.attrs)?;
                }
                if !self.is_leaf() {
                    write!(f, "(")?;
                    for (i, child) in self.0.content.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{:?}", child)?;
                    }
                    write!(f, ")")?;
                }
            }
        }
        for _ in 0..open {
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Number of positions a string occupies
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Substring by character offsets
pub fn slice_chars(s: &str, from: usize, to: usize) -> &str {
    let start = s.char_indices().nth(from).map_or(s.len(), |(i, _)| i);
    let end = s.char_indices().nth(to).map_or(s.len(), |(i, _)| i);
    &s[start..end.max(start)]
}

/// Merge adjacent text nodes carrying the same marks and drop empty ones
pub(crate) fn normalize_inline(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if node.is_text() && node.content_size() == 0 {
            continue;
        }
        if let Some(last) = out.last_mut() {
            if last.is_text() && node.is_text() && mark::same_set(last.marks(), node.marks()) {
                let mut text = SmartString::from(last.text().unwrap_or_default());
                text.push_str(node.text().unwrap_or_default());
                *last = Node::new_text(node.node_type().clone(), text, node.0.marks.clone());
                continue;
            }
        }
        out.push(node);
    }
    out
}

/// Slice `children` to the content range `from..to`, cutting text nodes.
/// Non-text children may only be taken whole.
pub(crate) fn cut_children(children: &[Node], from: usize, to: usize) -> Result<Vec<Node>> {
    let mut out = Vec::new();
    let mut pos = 0;
    for child in children {
        let end = pos + child.node_size();
        if end > from && pos < to {
            if pos >= from && end <= to {
                out.push(child.clone());
            } else if child.is_text() {
                out.push(child.cut_text(from.saturating_sub(pos), to.min(end) - pos));
            } else {
                return Err(ModelError::UnsupportedReplace { from, to });
            }
        }
        pos = end;
    }
    Ok(out)
}
