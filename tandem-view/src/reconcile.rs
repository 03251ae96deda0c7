//! # Reconciler
//!
//! Brings the descriptor tree and the DOM in line with a document and its
//! decorations. The commit runs in two passes:
//!
//! 1. Bottom-up render. Composed children are matched against the live
//!    descriptors of their parent, in order. A match is patched in place;
//!    descriptors skipped over are destroyed; unmatched views get new
//!    descriptors. Children are finished before their parent's DOM child
//!    list is synchronised, and nodes already in place are not moved.
//! 2. Top-down resync of node selection and component overrides.
//!
//! The shielded element (the composition container) is never touched.

use crate::component::ComponentProps;
use crate::compose::{ChildView, ComposedView, NodeChild, compose_children, group_by_marks};
use crate::config::ViewConfig;
use crate::custom_view::{CustomViewAdapter, UpdateOutcome};
use crate::descriptor::{DescId, DescKind, DescriptorTree, ViewDesc};
use crate::dom::{DomId, DomTree};
use crate::error::{Result, ViewError};
use crate::output_spec::{ContentSlot, RenderMode, render_value};
use crate::position::GetPos;
use crate::props::EditorProps;
use serde_json::{Value, json};
use smallvec::SmallVec;
use tandem_model::node::char_len;
use tandem_model::{Decoration, DecorationAttrs, DecorationKind, DecorationSet, Node, Selection};
use tracing::{debug, trace};

pub struct Reconciler<'a> {
    dom: &'a mut DomTree,
    tree: &'a mut DescriptorTree,
    props: &'a EditorProps,
    config: &'a ViewConfig,
    shielded: Option<DomId>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        dom: &'a mut DomTree,
        tree: &'a mut DescriptorTree,
        props: &'a EditorProps,
        config: &'a ViewConfig,
        shielded: Option<DomId>,
    ) -> Self {
        Self {
            dom,
            tree,
            props,
            config,
            shielded,
        }
    }

    /// Pass one: render `doc` into `mount`
    pub fn render_root(&mut self, mount: DomId, doc: &Node, decos: &DecorationSet) -> Result<DescId> {
        let root = match self.tree.root() {
            Some(root) => root,
            None => {
                let mut desc = ViewDesc::new(DescKind::Node, mount, GetPos::new(0));
                desc.content = Some(ContentSlot {
                    element: mount,
                    offset: self.dom.children(mount).len(),
                });
                let root = self.tree.register(None, desc);
                debug!(desc = %root, "created root descriptor");
                root
            }
        };
        let desc = self.tree.get_mut(root)?;
        desc.node = Some(doc.clone());
        desc.inner = decos.clone();
        desc.size = doc.content_size();
        let slot = desc.content;
        self.update_children(root, doc, decos, 0, slot)?;
        Ok(root)
    }

    /// Pass two: select the node under a node selection, deselect the rest,
    /// and re-register overrides from custom views and components
    pub fn sync_selection(&mut self, selection: &Selection) -> Result<()> {
        let Some(root) = self.tree.root() else {
            return Ok(());
        };
        let target = match selection {
            Selection::Node { from, .. } => Some(*from),
            Selection::Text { .. } => None,
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let desc = self.tree.get(id)?;
            let (kind, is_root, pos, selected) =
                (desc.kind, desc.parent.is_none(), desc.get_pos.get(), desc.selected);
            stack.extend(desc.children.iter().rev());
            if kind != DescKind::Node || is_root {
                continue;
            }
            self.refresh_overrides(id)?;
            let should_select = target.is_some() && target == pos;
            if should_select && !selected {
                trace!(desc = %id, "selecting node");
                self.tree.select_node(self.dom, id)?;
            } else if !should_select && selected {
                trace!(desc = %id, "deselecting node");
                self.tree.deselect_node(self.dom, id)?;
            }
        }
        Ok(())
    }

    fn refresh_overrides(&mut self, id: DescId) -> Result<()> {
        let desc = self.tree.get(id)?;
        let overrides = if let Some(adapter) = &desc.custom {
            adapter.overrides()
        } else if let Some(node) = &desc.node {
            let Some(component) = self.props.component(node.type_name()) else {
                return Ok(());
            };
            component.overrides(&ComponentProps {
                node,
                outer: &desc.outer,
                inner: &desc.inner,
                get_pos: &desc.get_pos,
            })
        } else {
            return Ok(());
        };
        self.tree.register_hooks(id, overrides)
    }

    fn update_children(
        &mut self,
        id: DescId,
        node: &Node,
        inner: &DecorationSet,
        start: usize,
        slot: Option<ContentSlot>,
    ) -> Result<()> {
        let Some(slot) = slot else {
            let stale = self.tree.get(id)?.children.clone();
            for child in stale {
                self.tree.destroy(self.dom, child)?;
            }
            return self.tree.set_children(id, Vec::new());
        };
        if self.shielded == Some(slot.element) {
            trace!(desc = %id, "content is shielded, skipping");
            return Ok(());
        }
        let props = self.props;
        let renderable = |n: &Node| {
            props.node_view(n.type_name()).is_some()
                || props.component(n.type_name()).is_some()
                || n.node_type().to_dom().is_some()
        };
        let views = compose_children(node, inner, self.config.default_widget_side, &renderable)?;
        self.reconcile_into(id, group_by_marks(views), start, slot)
    }

    fn reconcile_into(
        &mut self,
        id: DescId,
        items: Vec<ComposedView>,
        start: usize,
        slot: ContentSlot,
    ) -> Result<()> {
        let old = self.tree.get(id)?.children.clone();
        // old descriptors some new item matches exactly; these are not
        // repurposed for a different item
        let reserved: Vec<bool> = old
            .iter()
            .map(|desc| items.iter().any(|item| self.exact(*desc, item)))
            .collect();
        let mut next_old = 0;
        let mut children = Vec::with_capacity(items.len());
        let mut pos = start;

        for item in items {
            let size = item.size();
            let matched = (next_old..old.len())
                .find(|&j| self.exact(old[j], &item))
                .or_else(|| {
                    (next_old < old.len()
                        && !reserved[next_old]
                        && self.compatible(old[next_old], &item))
                    .then_some(next_old)
                });
            let child = match matched {
                Some(j) => {
                    for skipped in &old[next_old..j] {
                        self.tree.destroy(self.dom, *skipped)?;
                    }
                    next_old = j + 1;
                    self.patch(old[j], item, pos)?;
                    old[j]
                }
                None => self.create(id, item, pos)?,
            };
            children.push(child);
            pos += size;
        }
        for stale in &old[next_old..] {
            self.tree.destroy(self.dom, *stale)?;
        }

        let doms = children
            .iter()
            .map(|c| self.tree.get(*c).map(|d| d.dom))
            .collect::<Result<Vec<DomId>>>()?;
        self.tree.set_children(id, children)?;
        self.sync_dom(slot, &doms);
        Ok(())
    }

    /// Whether `id` already shows `item`, up to its position
    fn exact(&self, id: DescId, item: &ComposedView) -> bool {
        let Ok(desc) = self.tree.get(id) else {
            return false;
        };
        let same = match item {
            ComposedView::Leaf(ChildView::Node(child)) => {
                desc.node.as_ref() == Some(&child.node) && desc.outer == child.outer
            }
            ComposedView::Leaf(ChildView::Text(leaf)) => desc.text.as_ref() == Some(&leaf.text),
            ComposedView::Mark { .. } | ComposedView::Leaf(ChildView::Widget(_)) => true,
        };
        same && self.compatible(id, item)
    }

    /// Whether the descriptor `id` can be patched to show `item`
    fn compatible(&self, id: DescId, item: &ComposedView) -> bool {
        let Ok(desc) = self.tree.get(id) else {
            return false;
        };
        match item {
            ComposedView::Mark { mark, .. } => {
                desc.kind == DescKind::Mark && desc.mark.as_ref() == Some(mark)
            }
            ComposedView::Leaf(ChildView::Text(leaf)) => {
                desc.kind == DescKind::Text && desc.outer == leaf.decos
            }
            ComposedView::Leaf(ChildView::Widget(widget)) => {
                desc.kind == DescKind::Widget
                    && desc.widget.as_ref().is_some_and(|old| {
                        old.key == widget.deco.key
                            && old.widget_spec().map(|s| &s.shape)
                                == widget.deco.widget_spec().map(|s| &s.shape)
                    })
            }
            ComposedView::Leaf(ChildView::Node(child)) => {
                let same_type = desc.kind == DescKind::Node
                    && desc
                        .node
                        .as_ref()
                        .is_some_and(|n| n.node_type() == child.node.node_type());
                if !same_type {
                    return false;
                }
                if desc.custom.is_some() {
                    return self.props.node_view(child.node.type_name()).is_some();
                }
                desc.shape.is_some()
                    && self.shape_for(&child.node, &child.outer, &child.inner, &desc.get_pos)
                        == desc.shape
            }
        }
    }

    fn shape_for(
        &self,
        node: &Node,
        outer: &[Decoration],
        inner: &DecorationSet,
        get_pos: &GetPos,
    ) -> Option<Value> {
        if let Some(component) = self.props.component(node.type_name()) {
            return Some(component.render(&ComponentProps {
                node,
                outer,
                inner,
                get_pos,
            }));
        }
        node.to_dom()
    }

    fn patch(&mut self, id: DescId, item: ComposedView, pos: usize) -> Result<()> {
        match item {
            ComposedView::Leaf(ChildView::Node(child)) => self.patch_node(id, child, pos),
            ComposedView::Leaf(ChildView::Text(leaf)) => {
                let desc = self.tree.get_mut(id)?;
                desc.get_pos.set(pos);
                desc.size = char_len(&leaf.text);
                self.dom.set_text(desc.node_dom, &leaf.text);
                desc.text = Some(leaf.text);
                desc.marks = leaf.marks;
                Ok(())
            }
            ComposedView::Leaf(ChildView::Widget(widget)) => {
                let desc = self.tree.get_mut(id)?;
                desc.get_pos.set(pos);
                desc.marks = widget.marks;
                desc.widget = Some(widget.deco);
                Ok(())
            }
            ComposedView::Mark { children, .. } => {
                let desc = self.tree.get_mut(id)?;
                desc.get_pos.set(pos);
                desc.size = children.iter().map(ComposedView::size).sum();
                let slot = desc.content.ok_or(ViewError::UnknownDescriptor(id.0))?;
                if self.shielded == Some(slot.element) {
                    trace!(desc = %id, "mark content is shielded, skipping");
                    return Ok(());
                }
                self.reconcile_into(id, children, pos, slot)
            }
        }
    }

    fn patch_node(&mut self, id: DescId, child: NodeChild, pos: usize) -> Result<()> {
        let NodeChild {
            node, outer, inner, ..
        } = child;
        let desc = self.tree.get_mut(id)?;
        desc.get_pos.set(pos);
        desc.size = node.node_size();

        if let Some(mut adapter) = desc.custom.take() {
            let outcome = adapter.update(self.dom, &node, &outer, &inner);
            let content = adapter.content_slot();
            let desc = self.tree.get_mut(id)?;
            desc.custom = Some(adapter);
            if outcome? == UpdateOutcome::Recreated {
                desc.selected = false;
            }
            desc.content = content;
        }

        self.apply_outer(id, &outer)?;
        let desc = self.tree.get_mut(id)?;
        desc.node = Some(node.clone());
        desc.inner = inner.clone();
        let slot = desc.content;
        if node.is_leaf() {
            return Ok(());
        }
        self.update_children(id, &node, &inner, pos + 1, slot)
    }

    fn create(&mut self, parent: DescId, item: ComposedView, pos: usize) -> Result<DescId> {
        match item {
            ComposedView::Leaf(ChildView::Node(child)) => self.create_node(parent, child, pos),
            ComposedView::Leaf(ChildView::Text(leaf)) => {
                let text = self.dom.create_text(&leaf.text);
                let mut desc = ViewDesc::new(DescKind::Text, text, GetPos::new(pos));
                desc.size = char_len(&leaf.text);
                desc.text = Some(leaf.text);
                desc.marks = leaf.marks;
                let id = self.tree.register(Some(parent), desc);
                self.apply_outer(id, &leaf.decos)?;
                trace!(desc = %id, pos, "created text descriptor");
                Ok(id)
            }
            ComposedView::Leaf(ChildView::Widget(widget)) => {
                let shape = widget
                    .deco
                    .widget_spec()
                    .map(|spec| spec.shape.clone())
                    .unwrap_or(Value::Null);
                let rendered = render_value(&shape, self.dom, RenderMode::Node)?;
                self.dom.set_attribute(rendered.dom, "contenteditable", "false");
                let mut desc = ViewDesc::new(DescKind::Widget, rendered.dom, GetPos::new(pos));
                desc.marks = widget.marks;
                desc.widget = Some(widget.deco);
                desc.shape = Some(shape);
                let id = self.tree.register(Some(parent), desc);
                trace!(desc = %id, pos, "created widget descriptor");
                Ok(id)
            }
            ComposedView::Mark { mark, children } => {
                let shape = mark.to_dom(true).unwrap_or_else(|| json!(["span", 0]));
                let rendered = render_value(&shape, self.dom, RenderMode::Mark)?;
                let Some(slot) = rendered.content else {
                    self.dom.dispose(rendered.dom);
                    return Err(ViewError::MalformedSpec(format!(
                        "mark '{}' renders no element",
                        mark.type_name()
                    )));
                };
                let mut desc = ViewDesc::new(DescKind::Mark, rendered.dom, GetPos::new(pos));
                desc.size = children.iter().map(ComposedView::size).sum();
                desc.content = Some(slot);
                desc.shape = Some(shape);
                desc.mark = Some(mark);
                let id = self.tree.register(Some(parent), desc);
                trace!(desc = %id, pos, "created mark descriptor");
                self.reconcile_into(id, children, pos, slot)?;
                Ok(id)
            }
        }
    }

    fn create_node(&mut self, parent: DescId, child: NodeChild, pos: usize) -> Result<DescId> {
        let NodeChild {
            node, outer, inner, ..
        } = child;
        let get_pos = GetPos::new(pos);

        let mut desc = if let Some(factory) = self.props.node_view(node.type_name()) {
            let tag = if node.is_inline() {
                &self.config.inline_slot_tag
            } else {
                &self.config.block_slot_tag
            };
            let mut adapter = CustomViewAdapter::new(
                self.dom,
                tag,
                factory.clone(),
                node.clone(),
                outer.clone(),
                inner.clone(),
                get_pos.clone(),
                self.config.editable,
            );
            if let Err(err) = adapter.mount(self.dom) {
                self.dom.dispose(adapter.slot());
                return Err(err);
            }
            let mut desc = ViewDesc::new(DescKind::Node, adapter.slot(), get_pos);
            desc.content = adapter.content_slot();
            desc.overrides = adapter.overrides();
            desc.custom = Some(adapter);
            desc
        } else {
            let shape = self
                .shape_for(&node, &outer, &inner, &get_pos)
                .ok_or_else(|| ViewError::Unrenderable(node.type_name().into()))?;
            let rendered = render_value(&shape, self.dom, RenderMode::Node)?;
            let mut desc = ViewDesc::new(DescKind::Node, rendered.dom, get_pos);
            desc.content = rendered.content;
            desc.shape = Some(shape);
            desc
        };
        desc.node = Some(node.clone());
        desc.inner = inner.clone();
        desc.size = node.node_size();

        let id = self.tree.register(Some(parent), desc);
        debug!(desc = %id, node_type = node.type_name(), pos, "created node descriptor");
        self.apply_outer(id, &outer)?;
        if !node.is_leaf() {
            let slot = self.tree.get(id)?.content;
            self.update_children(id, &node, &inner, pos + 1, slot)?;
        }
        Ok(id)
    }

    /// Apply outer decorations: attribute patches on the node DOM, or
    /// wrapper elements for decorations naming a node (and for every
    /// decoration on text). The first decoration is the outermost wrapper.
    fn apply_outer(&mut self, id: DescId, decos: &[Decoration]) -> Result<()> {
        let desc = self.tree.get(id)?;
        if desc.outer.as_slice() == decos {
            return Ok(());
        }
        let is_text = desc.kind == DescKind::Text;
        let node_dom = desc.node_dom;
        let old_outer = desc.dom;
        let old_decos = desc.outer.clone();
        let had_wrappers = !desc.wrappers.is_empty();

        for attrs in old_decos.iter().filter_map(deco_attrs) {
            if attrs.node_name.is_none() && !is_text {
                unpatch_attrs(self.dom, node_dom, attrs);
            }
        }
        if had_wrappers {
            if let Some(parent) = self.dom.parent(old_outer) {
                self.dom.insert_before(parent, node_dom, Some(old_outer));
            } else {
                self.dom.detach(node_dom);
            }
            self.dom.dispose(old_outer);
        }

        let mut wrappers: SmallVec<[DomId; 2]> = SmallVec::new();
        for attrs in decos.iter().filter_map(deco_attrs) {
            match (&attrs.node_name, is_text) {
                (None, false) => patch_attrs(self.dom, node_dom, attrs),
                (name, _) => {
                    let wrapper = self.dom.create_element(name.as_deref().unwrap_or("span"));
                    patch_attrs(self.dom, wrapper, attrs);
                    wrappers.push(wrapper);
                }
            }
        }
        if let Some(&outermost) = wrappers.first() {
            if let Some(parent) = self.dom.parent(node_dom) {
                self.dom.insert_before(parent, outermost, Some(node_dom));
            }
            for pair in wrappers.windows(2) {
                self.dom.append_child(pair[0], pair[1]);
            }
            if let Some(&innermost) = wrappers.last() {
                self.dom.append_child(innermost, node_dom);
            }
        }

        let outer = wrappers.first().copied().unwrap_or(node_dom);
        self.tree.set_dom(id, outer)?;
        let desc = self.tree.get_mut(id)?;
        desc.wrappers = wrappers;
        desc.outer = decos.to_vec();
        Ok(())
    }

    /// Make `doms` the children of the slot element after its static
    /// prefix, moving only what is out of place and dropping anything else
    fn sync_dom(&mut self, slot: ContentSlot, doms: &[DomId]) {
        if self.shielded == Some(slot.element) {
            return;
        }
        for (i, child) in doms.iter().enumerate() {
            let current = self.dom.children(slot.element).get(slot.offset + i).copied();
            if current != Some(*child) {
                self.dom.insert_before(slot.element, *child, current);
            }
        }
        let keep = slot.offset + doms.len();
        let extras: Vec<DomId> = self
            .dom
            .children(slot.element)
            .get(keep..)
            .unwrap_or_default()
            .to_vec();
        for extra in extras {
            trace!(?extra, "removing unmanaged DOM");
            self.dom.dispose(extra);
        }
    }
}

fn deco_attrs(deco: &Decoration) -> Option<&DecorationAttrs> {
    match &deco.kind {
        DecorationKind::Node(attrs) | DecorationKind::Inline(attrs) => Some(attrs),
        DecorationKind::Widget(_) => None,
    }
}

fn patch_attrs(dom: &mut DomTree, el: DomId, attrs: &DecorationAttrs) {
    if let Some(class) = &attrs.class {
        for name in class.split_whitespace() {
            dom.add_class(el, name);
        }
    }
    if let Some(style) = &attrs.style {
        let value = match dom.attribute(el, "style") {
            Some(existing) if !existing.is_empty() => format!("{existing};{style}"),
            _ => style.to_string(),
        };
        dom.set_attribute(el, "style", &value);
    }
    for (name, value) in &attrs.attrs {
        dom.set_attribute(el, name, value);
    }
}

fn unpatch_attrs(dom: &mut DomTree, el: DomId, attrs: &DecorationAttrs) {
    if let Some(class) = &attrs.class {
        for name in class.split_whitespace() {
            dom.remove_class(el, name);
        }
    }
    if let Some(style) = &attrs.style {
        match dom.attribute(el, "style") {
            Some(existing) if existing == style.as_str() => dom.remove_attribute(el, "style"),
            Some(existing) => {
                let suffix = format!(";{style}");
                if let Some(rest) = existing.strip_suffix(suffix.as_str()) {
                    let rest = rest.to_string();
                    dom.set_attribute(el, "style", &rest);
                }
            }
            None => {}
        }
    }
    for name in attrs.attrs.keys() {
        dom.remove_attribute(el, name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_model::testing::{doc, em, p, strong, txt};

    fn render(dom: &mut DomTree, tree: &mut DescriptorTree, mount: DomId, d: &Node, decos: &DecorationSet) {
        let props = EditorProps::new();
        let config = ViewConfig::default();
        Reconciler::new(dom, tree, &props, &config, None)
            .render_root(mount, d, decos)
            .unwrap();
    }

    #[test]
    fn test_renders_marks_and_text() {
        let mut dom = DomTree::new();
        let mut tree = DescriptorTree::default();
        let mount = dom.create_element("div");
        let d = doc([p([txt("a"), em(txt("b")), strong(txt("c"))])]);
        render(&mut dom, &mut tree, mount, &d, &DecorationSet::empty());
        assert_eq!(
            dom.to_html(mount),
            "<div><p>a<em>b</em><strong>c</strong></p></div>"
        );
        tree.check_against(&d).unwrap();
    }

    #[test]
    fn test_patch_keeps_dom_identity() {
        let mut dom = DomTree::new();
        let mut tree = DescriptorTree::default();
        let mount = dom.create_element("div");
        render(&mut dom, &mut tree, mount, &doc([p([txt("ab")]), p([txt("c")])]), &DecorationSet::empty());
        let first_p = dom.children(mount)[0];
        let text = dom.children(first_p)[0];

        let d = doc([p([txt("abx")]), p([txt("c")])]);
        render(&mut dom, &mut tree, mount, &d, &DecorationSet::empty());
        assert_eq!(dom.children(mount)[0], first_p);
        assert_eq!(dom.children(first_p)[0], text);
        assert_eq!(dom.text(text), Some("abx"));
        tree.check_against(&d).unwrap();
    }

    #[test]
    fn test_decorations_patch_and_wrap() {
        let mut dom = DomTree::new();
        let mut tree = DescriptorTree::default();
        let mount = dom.create_element("div");
        let d = doc([p([txt("abc")])]);
        let decos = DecorationSet::new(vec![
            Decoration::node(0, 5, DecorationAttrs::class("active")),
            Decoration::inline(1, 2, DecorationAttrs::class("hl")),
        ]);
        render(&mut dom, &mut tree, mount, &d, &decos);
        assert_eq!(
            dom.to_html(mount),
            "<div><p class=\"active\"><span class=\"hl\">a</span>bc</p></div>"
        );

        render(&mut dom, &mut tree, mount, &d, &DecorationSet::empty());
        assert_eq!(dom.to_html(mount), "<div><p>abc</p></div>");
    }

    #[test]
    fn test_wrapper_decoration_on_node() {
        let mut dom = DomTree::new();
        let mut tree = DescriptorTree::default();
        let mount = dom.create_element("div");
        let d = doc([p([txt("a")])]);
        let decos = DecorationSet::new(vec![Decoration::node(0, 3, DecorationAttrs::wrapper("section"))]);
        render(&mut dom, &mut tree, mount, &d, &decos);
        assert_eq!(dom.to_html(mount), "<div><section><p>a</p></section></div>");

        render(&mut dom, &mut tree, mount, &d, &DecorationSet::empty());
        assert_eq!(dom.to_html(mount), "<div><p>a</p></div>");
    }

    #[test]
    fn test_widgets_render_uneditable() {
        let mut dom = DomTree::new();
        let mut tree = DescriptorTree::default();
        let mount = dom.create_element("div");
        let d = doc([p([txt("ab")])]);
        let decos = DecorationSet::new(vec![Decoration::widget(2, json!(["i", "w"]))]);
        render(&mut dom, &mut tree, mount, &d, &decos);
        assert_eq!(
            dom.to_html(mount),
            "<div><p>a<i contenteditable=\"false\">w</i>b</p></div>"
        );
    }

    #[test]
    fn test_unmanaged_dom_is_removed() {
        let mut dom = DomTree::new();
        let mut tree = DescriptorTree::default();
        let mount = dom.create_element("div");
        let d = doc([p([txt("a")])]);
        render(&mut dom, &mut tree, mount, &d, &DecorationSet::empty());
        let para = dom.children(mount)[0];
        let stray = dom.create_text("stray");
        dom.append_child(para, stray);

        render(&mut dom, &mut tree, mount, &d, &DecorationSet::empty());
        assert!(!dom.is_alive(stray));
        assert_eq!(dom.to_html(mount), "<div><p>a</p></div>");
    }
}
