//! # Child view composer
//!
//! Splits the content of a node and its inner decorations into the flat,
//! ordered list of things to render: child nodes, runs of text, and
//! widgets. Text is cut wherever its marks, its covering inline
//! decorations, or a widget change. The flat list is then folded into
//! nested mark wrappers by [`group_by_marks`].

use crate::error::{Result, ViewError};
use std::iter::Peekable;
use tandem_model::node::{char_len, slice_chars};
use tandem_model::{Decoration, DecorationKind, DecorationSet, Mark, MarkSet, Node, Side};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeChild {
    pub node: Node,
    pub offset: usize,
    /// Decorations applied to the node's own DOM
    pub outer: Vec<Decoration>,
    /// Decorations inside the node, relative to its content
    pub inner: DecorationSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLeaf {
    pub text: String,
    pub marks: MarkSet,
    pub offset: usize,
    /// Inline decorations covering the whole leaf
    pub decos: Vec<Decoration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetChild {
    pub deco: Decoration,
    pub offset: usize,
    pub marks: MarkSet,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChildView {
    Node(NodeChild),
    Text(TextLeaf),
    Widget(WidgetChild),
}

impl ChildView {
    pub fn offset(&self) -> usize {
        match self {
            ChildView::Node(child) => child.offset,
            ChildView::Text(leaf) => leaf.offset,
            ChildView::Widget(widget) => widget.offset,
        }
    }

    /// Positions covered; widgets cover none
    pub fn size(&self) -> usize {
        match self {
            ChildView::Node(child) => child.node.node_size(),
            ChildView::Text(leaf) => char_len(&leaf.text),
            ChildView::Widget(_) => 0,
        }
    }

    pub fn marks(&self) -> &[Mark] {
        match self {
            ChildView::Node(child) => child.node.marks(),
            ChildView::Text(leaf) => &leaf.marks,
            ChildView::Widget(widget) => &widget.marks,
        }
    }
}

/// Children of a node, nested under the marks they share
#[derive(Debug, Clone, PartialEq)]
pub enum ComposedView {
    Leaf(ChildView),
    Mark {
        mark: Mark,
        children: Vec<ComposedView>,
    },
}

impl ComposedView {
    pub fn size(&self) -> usize {
        match self {
            ComposedView::Leaf(view) => view.size(),
            ComposedView::Mark { children, .. } => children.iter().map(ComposedView::size).sum(),
        }
    }
}

/// Compose the content of `parent`. `inner` is in the coordinates of the
/// parent's content; widgets without a side get `default_side`.
pub fn compose_children(
    parent: &Node,
    inner: &DecorationSet,
    default_side: Side,
    renderable: &dyn Fn(&Node) -> bool,
) -> Result<Vec<ChildView>> {
    let mut widgets: Vec<(usize, Side, &Decoration)> = inner
        .iter()
        .filter_map(|d| {
            d.widget_spec()
                .map(|spec| (d.from, spec.side.unwrap_or(default_side), d))
        })
        .collect();
    widgets.sort_by_key(|(pos, side, _)| (*pos, *side == Side::After));
    let inline: Vec<&Decoration> = inner
        .iter()
        .filter(|d| matches!(d.kind, DecorationKind::Inline(_)) && d.from < d.to)
        .collect();
    let node_decos: Vec<&Decoration> = inner
        .iter()
        .filter(|d| matches!(d.kind, DecorationKind::Node(_)))
        .collect();

    let mut out = Vec::with_capacity(parent.child_count() + widgets.len());
    let mut pending = widgets.into_iter().peekable();

    for (offset, child) in parent.child_offsets() {
        let end = offset + child.node_size();
        take_widgets(&mut out, &mut pending, parent, offset);

        if let Some(text) = child.text() {
            let mut cuts: Vec<usize> = inline
                .iter()
                .flat_map(|d| [d.from, d.to])
                .chain(inner.iter().filter(|d| d.is_widget()).map(|d| d.from))
                .filter(|pos| *pos > offset && *pos < end)
                .collect();
            cuts.push(end);
            cuts.sort_unstable();
            cuts.dedup();

            let mut start = offset;
            for cut in cuts {
                let decos: Vec<Decoration> = inline
                    .iter()
                    .filter(|d| d.from <= start && d.to >= cut)
                    .map(|d| (*d).clone())
                    .collect();
                push_text(
                    &mut out,
                    TextLeaf {
                        text: slice_chars(text, start - offset, cut - offset).to_string(),
                        marks: child.marks().iter().cloned().collect(),
                        offset: start,
                        decos,
                    },
                );
                if cut < end {
                    take_widgets(&mut out, &mut pending, parent, cut);
                }
                start = cut;
            }
            continue;
        }

        if !renderable(child) {
            return Err(ViewError::Unrenderable(child.type_name().into()));
        }
        let mut outer: Vec<Decoration> = Vec::new();
        if child.is_inline() {
            outer.extend(
                inline
                    .iter()
                    .filter(|d| d.from <= offset && d.to >= end)
                    .map(|d| (*d).clone()),
            );
        }
        outer.extend(
            node_decos
                .iter()
                .filter(|d| d.from == offset && d.to == end)
                .map(|d| (*d).clone()),
        );
        out.push(ChildView::Node(NodeChild {
            node: child.clone(),
            offset,
            outer,
            inner: inner.for_child(offset, child),
        }));
        // widgets strictly inside a non-text child belong to it
        while pending.next_if(|(at, _, _)| *at > offset && *at < end).is_some() {}
    }
    take_widgets(&mut out, &mut pending, parent, parent.content_size());
    Ok(out)
}

type PendingWidgets<'a> = Peekable<std::vec::IntoIter<(usize, Side, &'a Decoration)>>;

/// Emit every pending widget positioned at or before `pos`
fn take_widgets(out: &mut Vec<ChildView>, pending: &mut PendingWidgets<'_>, parent: &Node, pos: usize) {
    while let Some((at, side, deco)) = pending.next_if(|(at, _, _)| *at <= pos) {
        let marks = match deco.widget_spec().and_then(|spec| spec.marks.clone()) {
            Some(marks) => marks,
            None => marks_beside(parent, at, side),
        };
        out.push(ChildView::Widget(WidgetChild {
            deco: deco.clone(),
            offset: at,
            marks,
            side,
        }));
    }
}

/// Marks of the inline content a widget at `pos` leans on
fn marks_beside(parent: &Node, pos: usize, side: Side) -> MarkSet {
    parent
        .child_offsets()
        .find(|(offset, child)| {
            let end = offset + child.node_size();
            match side {
                Side::Before => *offset < pos && pos <= end,
                Side::After => *offset <= pos && pos < end,
            }
        })
        .filter(|(_, child)| child.is_inline())
        .map(|(_, child)| child.marks().iter().cloned().collect())
        .unwrap_or_default()
}

fn push_text(out: &mut Vec<ChildView>, leaf: TextLeaf) {
    if let Some(ChildView::Text(prev)) = out.last_mut() {
        if prev.marks == leaf.marks
            && prev.decos == leaf.decos
            && prev.offset + char_len(&prev.text) == leaf.offset
        {
            prev.text.push_str(&leaf.text);
            return;
        }
    }
    out.push(ChildView::Text(leaf));
}

/// Nest consecutive views under the marks they share, outermost mark first
pub fn group_by_marks(views: Vec<ChildView>) -> Vec<ComposedView> {
    group_at(views, 0)
}

fn group_at(views: Vec<ChildView>, depth: usize) -> Vec<ComposedView> {
    let mut out = Vec::new();
    let mut iter = views.into_iter().peekable();
    while let Some(view) = iter.next() {
        let Some(mark) = view.marks().get(depth).cloned() else {
            out.push(ComposedView::Leaf(view));
            continue;
        };
        let mut run = vec![view];
        while let Some(next) = iter.next_if(|v| v.marks().get(depth) == Some(&mark)) {
            run.push(next);
        }
        out.push(ComposedView::Mark {
            mark,
            children: group_at(run, depth + 1),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tandem_model::DecorationAttrs;
    use tandem_model::testing::{blockquote, br, doc, em, embed, marks, p, strong, txt};

    fn all(_: &Node) -> bool {
        true
    }

    fn covers_exactly(parent: &Node, views: &[ChildView]) -> bool {
        let mut pos = 0;
        for view in views {
            if view.offset() != pos {
                return false;
            }
            pos += view.size();
        }
        pos == parent.content_size()
    }

    #[test]
    fn test_block_children_get_rebased_decorations() {
        let d = doc([p([txt("ab")]), p([txt("cd")])]);
        let decos = DecorationSet::new(vec![
            Decoration::node(4, 8, DecorationAttrs::class("active")),
            Decoration::inline(1, 6, DecorationAttrs::class("hl")),
        ]);
        let views = compose_children(&d, &decos, Side::After, &all).unwrap();
        assert_eq!(views.len(), 2);
        assert!(covers_exactly(&d, &views));

        let ChildView::Node(second) = &views[1] else {
            panic!("expected node view");
        };
        assert_eq!(second.outer.len(), 1);
        let inner: Vec<(usize, usize)> = second.inner.iter().map(|d| (d.from, d.to)).collect();
        assert_eq!(inner, vec![(0, 1)]);
    }

    #[test]
    fn test_text_split_at_decoration_and_widget() {
        let para = p([txt("abcd")]);
        let decos = DecorationSet::new(vec![
            Decoration::inline(1, 3, DecorationAttrs::class("hl")),
            Decoration::widget(2, json!(["span", "w"])),
        ]);
        let views = compose_children(&para, &decos, Side::After, &all).unwrap();
        let shape: Vec<(usize, usize, usize)> = views
            .iter()
            .map(|v| {
                let decos = match v {
                    ChildView::Text(leaf) => leaf.decos.len(),
                    _ => 9,
                };
                (v.offset(), v.size(), decos)
            })
            .collect();
        assert_eq!(
            shape,
            vec![(0, 1, 0), (1, 1, 1), (2, 0, 9), (2, 1, 1), (3, 1, 0)]
        );
        assert!(covers_exactly(&para, &views));
    }

    #[test]
    fn test_widget_side_order_and_marks() {
        let para = p([em(txt("ab")), strong(txt("cd"))]);
        let decos = DecorationSet::new(vec![
            Decoration::widget(2, json!(["span"])).with_key("after"),
            Decoration::widget(2, json!(["span"]))
                .with_key("before")
                .with_side(Side::Before),
        ]);
        let views = compose_children(&para, &decos, Side::After, &all).unwrap();
        let widgets: Vec<&WidgetChild> = views
            .iter()
            .filter_map(|v| match v {
                ChildView::Widget(w) => Some(w),
                _ => None,
            })
            .collect();
        assert_eq!(widgets[0].deco.key.as_deref(), Some("before"));
        assert_eq!(widgets[0].marks, marks(&["em"]));
        assert_eq!(widgets[1].deco.key.as_deref(), Some("after"));
        assert_eq!(widgets[1].marks, marks(&["strong"]));
    }

    #[test]
    fn test_default_side_is_configurable() {
        let para = p([em(txt("ab")), txt("cd")]);
        let decos = DecorationSet::new(vec![Decoration::widget(2, json!(["span"]))]);
        let views = compose_children(&para, &decos, Side::Before, &all).unwrap();
        let ChildView::Widget(widget) = &views[1] else {
            panic!("expected widget");
        };
        assert_eq!(widget.side, Side::Before);
        assert_eq!(widget.marks, marks(&["em"]));
    }

    #[test]
    fn test_explicit_widget_marks_win() {
        let para = p([txt("ab")]);
        let decos = DecorationSet::new(vec![
            Decoration::widget(1, json!(["span"])).with_marks(marks(&["code"])),
        ]);
        let views = compose_children(&para, &decos, Side::After, &all).unwrap();
        assert_eq!(views[1].marks(), marks(&["code"]).as_slice());
    }

    #[test]
    fn test_widgets_at_content_edges() {
        let para = p([txt("ab")]);
        let decos = DecorationSet::new(vec![
            Decoration::widget(0, json!(["span"])),
            Decoration::widget(2, json!(["span"])),
        ]);
        let views = compose_children(&para, &decos, Side::After, &all).unwrap();
        assert_eq!(views.len(), 3);
        assert!(matches!(views[0], ChildView::Widget(_)));
        assert!(matches!(views[2], ChildView::Widget(_)));
        assert!(covers_exactly(&para, &views));
    }

    #[test]
    fn test_inline_node_takes_covering_decorations() {
        let para = p([txt("a"), br(), txt("b")]);
        let decos = DecorationSet::new(vec![Decoration::inline(0, 3, DecorationAttrs::class("hl"))]);
        let views = compose_children(&para, &decos, Side::After, &all).unwrap();
        let ChildView::Node(hard_break) = &views[1] else {
            panic!("expected node view");
        };
        assert_eq!(hard_break.outer.len(), 1);
    }

    #[test]
    fn test_unrenderable_child() {
        let d = doc([embed("x")]);
        let err = compose_children(&d, &DecorationSet::empty(), Side::After, &|n: &Node| {
            n.node_type().to_dom().is_some()
        })
        .unwrap_err();
        assert_eq!(err, ViewError::Unrenderable("embed".into()));
    }

    #[test]
    fn test_nested_blocks_cover_range() {
        let d = doc([blockquote([p([txt("a")]), p([])]), p([txt("bc")])]);
        let views = compose_children(&d, &DecorationSet::empty(), Side::After, &all).unwrap();
        assert!(covers_exactly(&d, &views));
    }

    #[test]
    fn test_group_by_marks_shares_prefix() {
        let para = p([em(txt("a")), em(strong(txt("b"))), txt("c")]);
        let views = compose_children(&para, &DecorationSet::empty(), Side::After, &all).unwrap();
        let grouped = group_by_marks(views);
        assert_eq!(grouped.len(), 2);
        let ComposedView::Mark { mark, children } = &grouped[0] else {
            panic!("expected mark wrapper");
        };
        assert_eq!(mark.type_name(), "em");
        assert_eq!(children.len(), 2);
        assert!(matches!(children[1], ComposedView::Mark { .. }));
        assert_eq!(grouped[0].size(), 2);
        assert!(matches!(grouped[1], ComposedView::Leaf(ChildView::Text(_))));
    }
}
