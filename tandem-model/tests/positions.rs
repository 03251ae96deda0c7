use serde_json::json;
use std::rc::Rc;
use tandem_model::{
    Attrs, Decoration, DecorationAttrs, DecorationSet, EditorState, MarkSet, MarkSpec, Node,
    NodeSpec, Schema, Selection,
};

fn schema() -> Rc<Schema> {
    Schema::builder()
        .node("doc", NodeSpec::block())
        .node("paragraph", NodeSpec::textblock())
        .node("blockquote", NodeSpec::block())
        .node("image", NodeSpec::leaf_block())
        .node("text", NodeSpec::text())
        .mark("em", MarkSpec::new())
        .mark("strong", MarkSpec::new())
        .build()
}

fn para(schema: &Schema, parts: &[(&str, &[&str])]) -> Node {
    let content = parts
        .iter()
        .map(|(text, names)| {
            let marks = names.iter().fold(MarkSet::new(), |set, name| {
                schema.mark(name, Attrs::new()).unwrap().add_to_set(&set)
            });
            schema.text(text, marks).unwrap()
        })
        .collect();
    schema.node("paragraph", Attrs::new(), content).unwrap()
}

// doc(p("ab"), blockquote(p("cd")), image)
fn sample(schema: &Schema) -> Node {
    let quote = schema
        .node("blockquote", Attrs::new(), vec![para(schema, &[("cd", &[])])])
        .unwrap();
    let image = schema.node("image", Attrs::new(), vec![]).unwrap();
    schema
        .node("doc", Attrs::new(), vec![para(schema, &[("ab", &[])]), quote, image])
        .unwrap()
}

#[test]
fn test_node_sizes() {
    let schema = schema();
    let doc = sample(&schema);
    assert_eq!(doc.child(0).unwrap().node_size(), 4);
    assert_eq!(doc.child(1).unwrap().node_size(), 6);
    assert_eq!(doc.child(2).unwrap().node_size(), 1);
    assert_eq!(doc.content_size(), 11);
}

#[test]
fn test_resolve_depths_and_boundaries() {
    let schema = schema();
    let doc = sample(&schema);

    let pos = doc.resolve(2).unwrap();
    assert_eq!(pos.depth(), 1);
    assert_eq!(pos.parent().type_name(), "paragraph");
    assert_eq!(pos.text_offset(), 1);
    assert_eq!(pos.start(1), 1);
    assert_eq!(pos.before(1), Some(0));
    assert_eq!(pos.after(1), Some(4));

    let pos = doc.resolve(6).unwrap();
    assert_eq!(pos.depth(), 2);
    assert_eq!(pos.node(1).type_name(), "blockquote");
    assert_eq!(pos.parent_offset(), 0);

    let pos = doc.resolve(10).unwrap();
    assert_eq!(pos.depth(), 0);
    assert_eq!(pos.node_after().unwrap().type_name(), "image");
    assert_eq!(pos.node_before().unwrap().type_name(), "blockquote");

    assert!(doc.resolve(12).is_err());
}

#[test]
fn test_marks_at_boundaries() {
    let schema = schema();
    let p = para(&schema, &[("a", &["em"]), ("b", &["strong"])]);
    let doc = schema.node("doc", Attrs::new(), vec![p]).unwrap();

    let names = |pos: usize| -> Vec<String> {
        doc.resolve(pos)
            .unwrap()
            .marks()
            .iter()
            .map(|m| m.type_name().to_string())
            .collect()
    };
    // start of the paragraph takes the following text's marks
    assert_eq!(names(1), vec!["em"]);
    // between "a" and "b" the preceding text wins
    assert_eq!(names(2), vec!["em"]);
    assert_eq!(names(3), vec!["strong"]);
}

#[test]
fn test_marks_between_collects_union() {
    let schema = schema();
    let p = para(&schema, &[("a", &["em"]), ("b", &[]), ("c", &["strong"])]);
    let doc = schema.node("doc", Attrs::new(), vec![p]).unwrap();
    let marks = doc.marks_between(1, 4);
    let names: Vec<_> = marks.iter().map(|m| m.type_name()).collect();
    assert_eq!(names, vec!["em", "strong"]);
}

#[test]
fn test_state_starts_in_first_textblock() {
    let schema = schema();
    let doc = sample(&schema);
    let state = EditorState::new(schema, doc);
    assert_eq!(state.selection(), Selection::cursor(1));
}

#[test]
fn test_node_selection_spans_node() {
    let schema = schema();
    let doc = sample(&schema);
    assert_eq!(
        Selection::node(&doc, 10).unwrap(),
        Selection::Node { from: 10, to: 11 }
    );
    assert!(Selection::node(&doc, 2).is_err());
}

#[test]
fn test_decorations_for_child_are_rebased() {
    let schema = schema();
    let doc = sample(&schema);
    let set = DecorationSet::new(vec![
        Decoration::node(4, 10, DecorationAttrs::class("quote")),
        Decoration::inline(6, 8, DecorationAttrs::class("hl")),
        Decoration::widget(7, json!("w")),
    ]);
    let quote = doc.child(1).unwrap();
    let inner = set.for_child(4, quote);
    // node decoration on the blockquote itself stays outside
    assert_eq!(inner.len(), 2);
    let para_decos = inner.for_child(0, quote.child(0).unwrap());
    let ranges: Vec<_> = para_decos.iter().map(|d| (d.from, d.to)).collect();
    assert_eq!(ranges, vec![(0, 2), (1, 1)]);
}

#[test]
fn test_transaction_maps_selection_through_edits() {
    let schema = schema();
    let doc = sample(&schema);
    let state = EditorState::new(schema, doc).with_selection(Selection::cursor(7));
    let mut tr = state.tr();
    tr.insert_text("xy", 1, 1).unwrap();
    tr.delete(9, 10).unwrap();
    let next = state.apply(tr);
    assert_eq!(next.selection(), Selection::cursor(9));
    assert_eq!(next.doc().child(0).unwrap().text_content(), "xyab");
    assert_eq!(next.doc().child(1).unwrap().text_content(), "c");
    assert!(!next.doc().ptr_eq(state.doc()));
    assert!(next.doc().child(2).unwrap().ptr_eq(state.doc().child(2).unwrap()));
}
