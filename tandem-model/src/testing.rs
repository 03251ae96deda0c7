//! Basic schema and node builders for tests.
//!
//! ```ignore
//! let doc = doc([p([txt("ab"), em(txt("c"))])]);
//! ```

use crate::mark::MarkSet;
use crate::node::Node;
use crate::schema::{Attrs, MarkSpec, NodeSpec, Schema};
use crate::selection::Selection;
use crate::state::EditorState;
use serde_json::{Value, json};
use std::rc::Rc;

thread_local! {
    static SCHEMA: Rc<Schema> = build_schema();
}

fn build_schema() -> Rc<Schema> {
    Schema::builder()
        .node("doc", NodeSpec::block())
        .node("paragraph", NodeSpec::textblock().to_dom(|_| json!(["p", 0])))
        .node(
            "heading",
            NodeSpec::textblock()
                .attr("level", json!(1))
                .to_dom(|node| {
                    let level = node.attr("level").and_then(Value::as_u64).unwrap_or(1);
                    json!([format!("h{level}"), 0])
                }),
        )
        .node("blockquote", NodeSpec::block().to_dom(|_| json!(["blockquote", 0])))
        .node("list", NodeSpec::block().to_dom(|_| json!(["ul", 0])))
        .node("list_item", NodeSpec::block().to_dom(|_| json!(["li", 0])))
        .node(
            "code_block",
            NodeSpec::textblock().to_dom(|_| json!(["pre", ["code", 0]])),
        )
        .node(
            "image",
            NodeSpec::leaf_block()
                .attr("src", json!(""))
                .to_dom(|node| json!(["img", {"src": node.attr("src")}])),
        )
        .node("hard_break", NodeSpec::inline_leaf().to_dom(|_| json!(["br"])))
        // No DOM shape; rendered through a custom view or not at all
        .node("embed", NodeSpec::leaf_block().attr("id", json!("")))
        .node("figure", NodeSpec::block().attr("id", json!("")))
        .node("text", NodeSpec::text())
        .mark(
            "link",
            MarkSpec::new()
                .exclusive()
                .attr("href", json!(""))
                .to_dom(|mark, _| json!(["a", {"href": mark.attr("href")}, 0])),
        )
        .mark("em", MarkSpec::new().to_dom(|_, _| json!(["em", 0])))
        .mark("strong", MarkSpec::new().to_dom(|_, _| json!(["strong"])))
        .mark("code", MarkSpec::new().to_dom(|_, _| json!(["code", 0])))
        .mark("underline", MarkSpec::new().to_dom(|_, _| json!(["u"])))
        .build()
}

/// The shared basic schema
pub fn schema() -> Rc<Schema> {
    SCHEMA.with(Rc::clone)
}

pub fn node(name: &str, attrs: Attrs, content: impl IntoIterator<Item = Node>) -> Node {
    schema()
        .node(name, attrs, content.into_iter().collect())
        .expect("node type in basic schema")
}

pub fn doc(content: impl IntoIterator<Item = Node>) -> Node {
    node("doc", Attrs::new(), content)
}

pub fn p(content: impl IntoIterator<Item = Node>) -> Node {
    node("paragraph", Attrs::new(), content)
}

pub fn heading(level: u64, content: impl IntoIterator<Item = Node>) -> Node {
    node("heading", attrs([("level", json!(level))]), content)
}

pub fn blockquote(content: impl IntoIterator<Item = Node>) -> Node {
    node("blockquote", Attrs::new(), content)
}

pub fn list(content: impl IntoIterator<Item = Node>) -> Node {
    node("list", Attrs::new(), content)
}

pub fn li(content: impl IntoIterator<Item = Node>) -> Node {
    node("list_item", Attrs::new(), content)
}

pub fn code_block(content: impl IntoIterator<Item = Node>) -> Node {
    node("code_block", Attrs::new(), content)
}

pub fn image(src: &str) -> Node {
    node("image", attrs([("src", json!(src))]), [])
}

pub fn embed(id: &str) -> Node {
    node("embed", attrs([("id", json!(id))]), [])
}

pub fn figure(id: &str, content: impl IntoIterator<Item = Node>) -> Node {
    node("figure", attrs([("id", json!(id))]), content)
}

pub fn br() -> Node {
    node("hard_break", Attrs::new(), [])
}

pub fn txt(text: &str) -> Node {
    schema()
        .text(text, MarkSet::new())
        .expect("text type in basic schema")
}

fn marked(node: Node, name: &str, attrs: Attrs) -> Node {
    let mark = schema().mark(name, attrs).expect("mark type in basic schema");
    let marks = mark.add_to_set(node.marks());
    node.with_marks(marks)
}

pub fn em(node: Node) -> Node {
    marked(node, "em", Attrs::new())
}

pub fn strong(node: Node) -> Node {
    marked(node, "strong", Attrs::new())
}

pub fn code(node: Node) -> Node {
    marked(node, "code", Attrs::new())
}

pub fn underline(node: Node) -> Node {
    marked(node, "underline", Attrs::new())
}

pub fn link(href: &str, node: Node) -> Node {
    marked(node, "link", attrs([("href", json!(href))]))
}

/// A mark set from mark names
pub fn marks(names: &[&str]) -> MarkSet {
    let schema = schema();
    names.iter().fold(MarkSet::new(), |set, name| {
        schema
            .mark(name, Attrs::new())
            .expect("mark type in basic schema")
            .add_to_set(&set)
    })
}

pub fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> Attrs {
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value))
        .collect()
}

pub fn state(doc: Node) -> EditorState {
    EditorState::new(schema(), doc)
}

pub fn state_at(doc: Node, anchor: usize, head: usize) -> EditorState {
    state(doc).with_selection(Selection::text(anchor, head))
}
