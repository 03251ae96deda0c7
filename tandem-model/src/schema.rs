//! # Schema
//!
//! Node and mark type registry. A schema knows which types exist, what kind
//! of content each node type holds, and how to turn a node or mark into a
//! declarative DOM shape (`to_dom`).
//!
//! Shapes are plain JSON values:
//!
//! ```text
//! "text"                                  literal text
//! ["p", 0]                                element with a content hole
//! ["a", {"href": "#"}, 0]                 element with attributes
//! ["pre", ["code", 0]]                    nested elements
//! ```

use crate::error::{ModelError, Result};
use crate::mark::{Mark, MarkSet};
use crate::node::Node;
use serde_json::Value;
use smartstring::alias::String as SmartString;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Attribute map shared by nodes and marks
pub type Attrs = BTreeMap<SmartString, Value>;

/// Produces the DOM shape for a node
pub type NodeToDom = Rc<dyn Fn(&Node) -> Value>;

/// Produces the DOM shape for a mark; the flag tells whether the marked
/// content is inline
pub type MarkToDom = Rc<dyn Fn(&Mark, bool) -> Value>;

/// What a node type may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Leaf node, no content
    Empty,
    /// Inline content (text and inline nodes)
    Inline,
    /// Block children
    Block,
    /// The text node type itself
    Text,
}

pub struct NodeSpec {
    content: ContentKind,
    inline: bool,
    default_attrs: Attrs,
    to_dom: Option<NodeToDom>,
}

impl NodeSpec {
    /// Block node holding other blocks
    pub fn block() -> Self {
        Self::with(ContentKind::Block, false)
    }

    /// Block node holding inline content
    pub fn textblock() -> Self {
        Self::with(ContentKind::Inline, false)
    }

    /// Block node without content (images, rules)
    pub fn leaf_block() -> Self {
        Self::with(ContentKind::Empty, false)
    }

    /// Inline node without content (hard breaks, inline atoms)
    pub fn inline_leaf() -> Self {
        Self::with(ContentKind::Empty, true)
    }

    pub fn text() -> Self {
        Self::with(ContentKind::Text, true)
    }

    fn with(content: ContentKind, inline: bool) -> Self {
        Self {
            content,
            inline,
            default_attrs: Attrs::new(),
            to_dom: None,
        }
    }

    pub fn attr(mut self, name: &str, default: Value) -> Self {
        self.default_attrs.insert(name.into(), default);
        self
    }

    pub fn to_dom(mut self, f: impl Fn(&Node) -> Value + 'static) -> Self {
        self.to_dom = Some(Rc::new(f));
        self
    }
}

pub struct NodeType {
    name: SmartString,
    spec: NodeSpec,
}

impl NodeType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> ContentKind {
        self.spec.content
    }

    pub fn is_text(&self) -> bool {
        self.spec.content == ContentKind::Text
    }

    pub fn is_inline(&self) -> bool {
        self.spec.inline
    }

    pub fn is_block(&self) -> bool {
        !self.spec.inline
    }

    pub fn is_textblock(&self) -> bool {
        self.spec.content == ContentKind::Inline
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.spec.content, ContentKind::Empty | ContentKind::Text)
    }

    pub fn to_dom(&self) -> Option<&NodeToDom> {
        self.spec.to_dom.as_ref()
    }

    /// Fill in defaults for attributes missing from `given`
    pub fn compute_attrs(&self, given: Attrs) -> Attrs {
        let mut attrs = self.spec.default_attrs.clone();
        attrs.extend(given);
        attrs
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("name", &self.name)
            .field("content", &self.spec.content)
            .field("inline", &self.spec.inline)
            .finish()
    }
}

pub struct MarkSpec {
    inclusive: bool,
    default_attrs: Attrs,
    to_dom: Option<MarkToDom>,
}

impl MarkSpec {
    pub fn new() -> Self {
        Self {
            inclusive: true,
            default_attrs: Attrs::new(),
            to_dom: None,
        }
    }

    /// Non-inclusive marks do not extend to text typed at their end
    pub fn exclusive(mut self) -> Self {
        self.inclusive = false;
        self
    }

    pub fn attr(mut self, name: &str, default: Value) -> Self {
        self.default_attrs.insert(name.into(), default);
        self
    }

    pub fn to_dom(mut self, f: impl Fn(&Mark, bool) -> Value + 'static) -> Self {
        self.to_dom = Some(Rc::new(f));
        self
    }
}

impl Default for MarkSpec {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MarkType {
    name: SmartString,
    rank: usize,
    spec: MarkSpec,
}

impl MarkType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the schema; mark sets are kept sorted by rank
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn inclusive(&self) -> bool {
        self.spec.inclusive
    }

    pub fn to_dom(&self) -> Option<&MarkToDom> {
        self.spec.to_dom.as_ref()
    }

    pub fn compute_attrs(&self, given: Attrs) -> Attrs {
        let mut attrs = self.spec.default_attrs.clone();
        attrs.extend(given);
        attrs
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkType")
            .field("name", &self.name)
            .field("rank", &self.rank)
            .finish()
    }
}

#[derive(Debug)]
pub struct Schema {
    nodes: Vec<Rc<NodeType>>,
    marks: Vec<Rc<MarkType>>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn node_type(&self, name: &str) -> Result<&Rc<NodeType>> {
        self.nodes
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ModelError::UnknownNodeType(name.to_string()))
    }

    pub fn mark_type(&self, name: &str) -> Result<&Rc<MarkType>> {
        self.marks
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ModelError::UnknownMarkType(name.to_string()))
    }

    pub fn node_types(&self) -> impl Iterator<Item = &Rc<NodeType>> {
        self.nodes.iter()
    }

    /// The first textblock type, used when splitting at the end of a block
    pub fn default_textblock(&self) -> Option<&Rc<NodeType>> {
        self.nodes.iter().find(|t| t.is_textblock())
    }

    pub fn node(&self, name: &str, attrs: Attrs, content: Vec<Node>) -> Result<Node> {
        let ty = self.node_type(name)?;
        Ok(Node::new(
            ty.clone(),
            ty.compute_attrs(attrs),
            content,
            MarkSet::new(),
        ))
    }

    pub fn text(&self, text: &str, marks: MarkSet) -> Result<Node> {
        let ty = self
            .nodes
            .iter()
            .find(|t| t.is_text())
            .ok_or_else(|| ModelError::UnknownNodeType("text".to_string()))?;
        Ok(Node::new_text(ty.clone(), text.into(), marks))
    }

    pub fn mark(&self, name: &str, attrs: Attrs) -> Result<Mark> {
        let ty = self.mark_type(name)?;
        Ok(Mark::new(ty.clone(), ty.compute_attrs(attrs)))
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    nodes: Vec<(SmartString, NodeSpec)>,
    marks: Vec<(SmartString, MarkSpec)>,
}

impl SchemaBuilder {
    pub fn node(mut self, name: &str, spec: NodeSpec) -> Self {
        self.nodes.push((name.into(), spec));
        self
    }

    pub fn mark(mut self, name: &str, spec: MarkSpec) -> Self {
        self.marks.push((name.into(), spec));
        self
    }

    pub fn build(self) -> Rc<Schema> {
        let nodes = self
            .nodes
            .into_iter()
            .map(|(name, spec)| Rc::new(NodeType { name, spec }))
            .collect();
        let marks = self
            .marks
            .into_iter()
            .enumerate()
            .map(|(rank, (name, spec))| Rc::new(MarkType { name, rank, spec }))
            .collect();
        Rc::new(Schema { nodes, marks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn small_schema() -> Rc<Schema> {
        Schema::builder()
            .node("doc", NodeSpec::block())
            .node("paragraph", NodeSpec::textblock().to_dom(|_| json!(["p", 0])))
            .node("text", NodeSpec::text())
            .mark("em", MarkSpec::new())
            .mark("strong", MarkSpec::new())
            .build()
    }

    #[test]
    fn test_lookup_types() {
        let schema = small_schema();
        assert!(schema.node_type("paragraph").unwrap().is_textblock());
        assert!(schema.node_type("text").unwrap().is_text());
        assert_eq!(
            schema.node_type("table").unwrap_err(),
            ModelError::UnknownNodeType("table".to_string())
        );
    }

    #[test]
    fn test_mark_ranks_follow_declaration_order() {
        let schema = small_schema();
        assert_eq!(schema.mark_type("em").unwrap().rank(), 0);
        assert_eq!(schema.mark_type("strong").unwrap().rank(), 1);
    }

    #[test]
    fn test_default_attrs_are_filled() {
        let schema = Schema::builder()
            .node("heading", NodeSpec::textblock().attr("level", json!(1)))
            .node("text", NodeSpec::text())
            .build();
        let node = schema.node("heading", Attrs::new(), vec![]).unwrap();
        assert_eq!(node.attr("level"), Some(&json!(1)));
    }
}
