use serde_json::json;
use std::rc::Rc;
use tandem_model::testing::{blockquote, br, doc, em, heading, image, link, p, state, strong, txt};
use tandem_model::{Decoration, DecorationAttrs, DecorationSet, EditorState, Node};
use tandem_view::output_spec::{RenderMode, render_value};
use tandem_view::{DomTree, EditorProps, EditorView, ViewConfig};

fn config() -> ViewConfig {
    ViewConfig {
        check_invariants: true,
        ..ViewConfig::default()
    }
}

fn render(d: Node) -> EditorView {
    EditorView::new(state(d), EditorProps::new(), config()).unwrap()
}

fn inner_html(view: &EditorView) -> String {
    let html = view.dom().to_html(view.mount());
    let open = html.find('>').map_or(0, |i| i + 1);
    html[open..html.len() - "</div>".len()].to_string()
}

#[test]
fn renders_nested_blocks() {
    let view = render(doc([
        heading(2, [txt("Title")]),
        blockquote([p([txt("quoted")])]),
        p([txt("a"), br(), txt("b")]),
        image("cat.png"),
    ]));
    assert_eq!(
        inner_html(&view),
        r#"<h2>Title</h2><blockquote><p>quoted</p></blockquote><p>a<br></br>b</p><img src="cat.png"></img>"#
    );
}

#[test]
fn link_mark_with_hole_wraps_text() {
    let view = render(doc([p([link("#", txt("x"))])]));
    assert_eq!(inner_html(&view), r##"<p><a href="#">x</a></p>"##);
}

#[test]
fn hole_shape_places_children_inside_anchor() {
    let mut dom = DomTree::new();
    let rendered = render_value(&json!(["a", {"href": "#"}, 0]), &mut dom, RenderMode::Node).unwrap();
    let slot = rendered.content.unwrap();
    assert_eq!(slot.element, rendered.dom);
    let x = dom.create_text("x");
    dom.append_child(slot.element, x);
    assert_eq!(dom.to_html(rendered.dom), r##"<a href="#">x</a>"##);
}

#[test]
fn holeless_mark_shape_becomes_wrapper() {
    let mut dom = DomTree::new();
    let rendered = render_value(&json!(["a", {"href": "#"}]), &mut dom, RenderMode::Mark).unwrap();
    let slot = rendered.content.unwrap();
    let x = dom.create_text("x");
    dom.append_child(slot.element, x);
    assert_eq!(dom.to_html(rendered.dom), r##"<a href="#">x</a>"##);
}

#[test]
fn nested_marks_share_wrappers() {
    let view = render(doc([p([em(txt("a")), em(strong(txt("b"))), txt("c")])]));
    assert_eq!(inner_html(&view), "<p><em>a<strong>b</strong></em>c</p>");
}

#[test]
fn dom_is_reused_across_edits() {
    let mut view = render(doc([p([txt("one")]), p([txt("two")])]));
    let mount = view.mount();
    let before = view.dom().children(mount).to_vec();

    let mut tr = view.state().tr();
    tr.insert_text("!", 4, 4).unwrap();
    view.dispatch(tr).unwrap();

    assert_eq!(view.dom().children(mount), before.as_slice());
    assert_eq!(inner_html(&view), "<p>one!</p><p>two</p>");
}

#[test]
fn inserted_block_moves_nothing_else() {
    let mut view = render(doc([p([txt("one")]), p([txt("two")])]));
    let mount = view.mount();
    let before = view.dom().children(mount).to_vec();
    let mut tr = view.state().tr();
    tr.split_block(4).unwrap();
    view.dispatch(tr).unwrap();

    let after = view.dom().children(mount);
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[1]);
}

#[test]
fn decorations_follow_the_state() {
    let props = EditorProps::new().with_decorations(Rc::new(|state: &EditorState| {
        let end = state.doc().content_size();
        DecorationSet::new(vec![
            Decoration::inline(1, 3, DecorationAttrs::class("hl")),
            Decoration::node(0, end, DecorationAttrs::class("block")),
            Decoration::widget(2, json!(["img", {"class": "pin"}])),
        ])
    }));
    let view = EditorView::new(state(doc([p([txt("abcd")])])), props, config()).unwrap();
    assert_eq!(
        inner_html(&view),
        r#"<p class="block"><span class="hl">a</span><img class="pin" contenteditable="false"></img><span class="hl">b</span>cd</p>"#
    );
}

#[test]
fn positions_round_trip_through_dom() {
    let view = render(doc([p([txt("ab"), em(txt("cd"))])]));
    for pos in 1..=5 {
        let point = view.dom_at_pos(pos).unwrap();
        assert_eq!(view.pos_at_dom(point.node, point.offset, 1).unwrap(), pos, "pos {pos}");
    }
}

#[test]
fn unrenderable_node_is_an_error() {
    let result = EditorView::new(
        state(doc([tandem_model::testing::embed("x")])),
        EditorProps::new(),
        config(),
    );
    assert!(matches!(result, Err(tandem_view::ViewError::Unrenderable(name)) if name.as_str() == "embed"));
}
