//! Mapping between document positions and DOM points, following the
//! descriptor tree.

use crate::descriptor::{DescId, DescKind, DescriptorTree};
use crate::dom::{DomId, DomTree};
use crate::error::{Result, ViewError};

/// A DOM node and an offset into it: characters for text nodes, child
/// index for elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomPoint {
    pub node: DomId,
    pub offset: usize,
}

/// DOM point for document position `pos`. Positions on the edge of inline
/// content resolve into the content before them; widgets are skipped.
pub fn dom_at_pos(tree: &DescriptorTree, dom: &DomTree, pos: usize) -> Result<DomPoint> {
    let mut id = tree.root().ok_or(ViewError::PositionNotMapped(pos))?;
    let mut start = 0;
    'descend: loop {
        let desc = tree.get(id)?;
        let Some(slot) = desc.content() else {
            return Err(ViewError::PositionNotMapped(pos));
        };
        let mut cur = start;
        let mut last_index = None;
        for child_id in desc.children() {
            let child = tree.get(*child_id)?;
            let end = cur + child.size();
            let index = dom.child_index(child.dom());
            let at_inline_end = pos == end && matches!(child.kind(), DescKind::Text | DescKind::Mark);
            if pos < end || at_inline_end {
                match child.kind() {
                    DescKind::Text => {
                        return Ok(DomPoint {
                            node: child.node_dom(),
                            offset: pos - cur,
                        });
                    }
                    DescKind::Mark => {
                        id = *child_id;
                        start = cur;
                        continue 'descend;
                    }
                    DescKind::Node if pos > cur && child.content().is_some() => {
                        id = *child_id;
                        start = cur + child.border();
                        continue 'descend;
                    }
                    DescKind::Node => {
                        return Ok(DomPoint {
                            node: slot.element,
                            offset: index.unwrap_or(slot.offset),
                        });
                    }
                    DescKind::Widget => {}
                }
            }
            if child.kind() != DescKind::Widget {
                last_index = index;
            }
            cur = end;
        }
        if pos > cur {
            return Err(ViewError::PositionNotMapped(pos));
        }
        return Ok(DomPoint {
            node: slot.element,
            offset: last_index.map_or(slot.offset, |i| i + 1),
        });
    }
}

/// Document position for a DOM point. Points outside any content slot
/// resolve before the owning node when `bias` is negative, after it
/// otherwise.
pub fn pos_at_dom(
    tree: &DescriptorTree,
    dom: &DomTree,
    node: DomId,
    offset: usize,
    bias: i32,
) -> Result<usize> {
    let not_mapped = || ViewError::PositionNotMapped(offset);
    let id = tree.nearest_desc(dom, node).ok_or_else(not_mapped)?;
    let desc = tree.get(id)?;
    let pos = desc.get_pos().get().ok_or_else(not_mapped)?;

    match desc.kind() {
        DescKind::Text if node == desc.node_dom() => Ok(pos + offset.min(desc.size())),
        DescKind::Text => Ok(if offset == 0 { pos } else { pos + desc.size() }),
        DescKind::Widget => Ok(pos),
        DescKind::Node | DescKind::Mark => {
            let content_start = tree.content_start(id)?;
            match desc.content() {
                Some(slot) if dom.contains(slot.element, node) => {
                    // index within the slot element the point lies before
                    let index = if node == slot.element {
                        offset
                    } else {
                        child_of(dom, slot.element, node).map_or(offset, |i| i + 1)
                    };
                    Ok(content_start + size_before(tree, dom, id, slot.element, index)?)
                }
                _ if desc.parent().is_none() => Ok(if bias < 0 { 0 } else { desc.size() }),
                _ => Ok(if bias < 0 { pos } else { pos + desc.size() }),
            }
        }
    }
}

/// Index of the child of `ancestor` containing `node`
fn child_of(dom: &DomTree, ancestor: DomId, node: DomId) -> Option<usize> {
    let mut cur = node;
    while let Some(parent) = dom.parent(cur) {
        if parent == ancestor {
            return dom.child_index(cur);
        }
        cur = parent;
    }
    None
}

/// Total size of the children of `id` rendered before `index` in `element`
fn size_before(
    tree: &DescriptorTree,
    dom: &DomTree,
    id: DescId,
    element: DomId,
    index: usize,
) -> Result<usize> {
    let mut size = 0;
    for child_id in tree.get(id)?.children() {
        let child = tree.get(*child_id)?;
        let before = dom.parent(child.dom()) == Some(element)
            && dom.child_index(child.dom()).is_some_and(|i| i < index);
        if before {
            size += child.size();
        }
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewConfig;
    use crate::props::EditorProps;
    use crate::reconcile::Reconciler;
    use serde_json::json;
    use tandem_model::testing::{doc, image, p, txt};
    use tandem_model::{Decoration, DecorationSet, Node};

    fn render(d: &Node, decos: &DecorationSet) -> (DomTree, DescriptorTree, DomId) {
        let mut dom = DomTree::new();
        let mut tree = DescriptorTree::default();
        let mount = dom.create_element("div");
        let props = EditorProps::new();
        let config = ViewConfig::default();
        Reconciler::new(&mut dom, &mut tree, &props, &config, None)
            .render_root(mount, d, decos)
            .unwrap();
        (dom, tree, mount)
    }

    #[test]
    fn test_block_boundaries_map_to_child_index() {
        let d = doc([p([txt("ab")]), image("x.png")]);
        let (dom, tree, mount) = render(&d, &DecorationSet::empty());
        assert_eq!(dom_at_pos(&tree, &dom, 0).unwrap(), DomPoint { node: mount, offset: 0 });
        assert_eq!(dom_at_pos(&tree, &dom, 4).unwrap(), DomPoint { node: mount, offset: 1 });
        assert_eq!(dom_at_pos(&tree, &dom, 5).unwrap(), DomPoint { node: mount, offset: 2 });
        assert!(dom_at_pos(&tree, &dom, 6).is_err());
    }

    #[test]
    fn test_widgets_are_skipped() {
        let d = doc([p([txt("ab")])]);
        let decos = DecorationSet::new(vec![Decoration::widget(1, json!(["hr"]))]);
        let (dom, tree, mount) = render(&d, &decos);
        let para = dom.children(mount)[0];
        let widget = dom.children(para)[0];
        let text = dom.children(para)[1];
        assert_eq!(dom_at_pos(&tree, &dom, 2).unwrap(), DomPoint { node: text, offset: 1 });
        assert_eq!(pos_at_dom(&tree, &dom, widget, 0, 1).unwrap(), 1);
        assert_eq!(pos_at_dom(&tree, &dom, para, 2, 1).unwrap(), 3);
    }

    #[test]
    fn test_bias_outside_content() {
        let d = doc([p([txt("ab")]), image("x.png")]);
        let (dom, tree, mount) = render(&d, &DecorationSet::empty());
        let img = dom.children(mount)[1];
        assert_eq!(pos_at_dom(&tree, &dom, img, 0, -1).unwrap(), 4);
        assert_eq!(pos_at_dom(&tree, &dom, img, 0, 1).unwrap(), 5);
        assert_eq!(pos_at_dom(&tree, &dom, mount, 1, 1).unwrap(), 4);
    }
}
