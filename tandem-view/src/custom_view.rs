//! # Custom view adapter
//!
//! Hosts a view built by external code inside the reconciled tree. The
//! adapter owns a slot element; only the adapter puts the handle's root in
//! it, and nothing outside the handle's content container is touched by
//! reconciliation.
//!
//! ```text
//! Uncreated --mount--> Created --update--> Created
//!                         |                   ^
//!                      destroy             remount
//!                         v                   |
//!                      Destroyed -------------+
//! ```

use crate::descriptor::{MutationRecord, Overrides};
use crate::dom::{DomId, DomTree};
use crate::error::{CustomViewError, Result, ViewError};
use crate::events::EditorEvent;
use crate::output_spec::ContentSlot;
use crate::position::GetPos;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tandem_model::{Decoration, DecorationSet, Node};
use tracing::debug;

/// Optional hooks a custom view implements. Only declared hooks are
/// called; the others fall back to the default behaviour of the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CustomViewHooks {
    pub update: bool,
    pub destroy: bool,
    pub select_node: bool,
    pub deselect_node: bool,
    pub stop_event: bool,
    pub ignore_mutation: bool,
}

pub trait CustomView {
    /// Root element of the view
    fn dom(&self) -> DomId;

    /// Element receiving the node's content, if the node has editable content
    fn content_dom(&self) -> Option<DomId> {
        None
    }

    fn hooks(&self) -> CustomViewHooks {
        CustomViewHooks::default()
    }

    /// Apply a new node. `Ok(false)` asks for the view to be rebuilt.
    fn update(
        &mut self,
        _dom: &mut DomTree,
        _node: &Node,
        _outer: &[Decoration],
        _inner: &DecorationSet,
    ) -> std::result::Result<bool, CustomViewError> {
        Ok(false)
    }

    fn destroy(&mut self, _dom: &mut DomTree) {}

    fn select_node(&mut self, _dom: &mut DomTree) {}

    fn deselect_node(&mut self, _dom: &mut DomTree) {}

    fn stop_event(&self, _event: &EditorEvent) -> bool {
        false
    }

    fn ignore_mutation(&self, _record: &MutationRecord) -> bool {
        false
    }
}

pub struct CustomViewContext<'a> {
    pub node: &'a Node,
    pub dom: &'a mut DomTree,
    pub get_pos: GetPos,
    pub outer: &'a [Decoration],
    pub inner: &'a DecorationSet,
    pub editable: bool,
}

pub type CustomViewFactory =
    Rc<dyn Fn(CustomViewContext<'_>) -> std::result::Result<Box<dyn CustomView>, CustomViewError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Uncreated,
    Created,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Same node and decorations; nothing touched
    Unchanged,
    /// The update hook accepted the node
    Updated,
    /// The handle was destroyed and built again
    Recreated,
}

type Handle = Rc<RefCell<Box<dyn CustomView>>>;

pub struct CustomViewAdapter {
    state: AdapterState,
    factory: CustomViewFactory,
    node: Node,
    outer: Vec<Decoration>,
    inner: DecorationSet,
    get_pos: GetPos,
    editable: bool,
    slot: DomId,
    handle: Option<Handle>,
    hooks: CustomViewHooks,
    content_offset: usize,
}

impl CustomViewAdapter {
    /// Create the adapter and its slot element. The handle is built by
    /// [`mount`](Self::mount).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dom: &mut DomTree,
        slot_tag: &str,
        factory: CustomViewFactory,
        node: Node,
        outer: Vec<Decoration>,
        inner: DecorationSet,
        get_pos: GetPos,
        editable: bool,
    ) -> Self {
        let slot = dom.create_element(slot_tag);
        Self {
            state: AdapterState::Uncreated,
            factory,
            node,
            outer,
            inner,
            get_pos,
            editable,
            slot,
            handle: None,
            hooks: CustomViewHooks::default(),
            content_offset: 0,
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn slot(&self) -> DomId {
        self.slot
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn hooks(&self) -> CustomViewHooks {
        self.hooks
    }

    /// Root element of the current handle
    pub fn root_dom(&self) -> Option<DomId> {
        self.handle.as_ref().map(|h| h.borrow().dom())
    }

    pub fn content_dom(&self) -> Option<DomId> {
        self.handle.as_ref().and_then(|h| h.borrow().content_dom())
    }

    /// Where the node's children go: after whatever the view put in its
    /// content container itself
    pub fn content_slot(&self) -> Option<ContentSlot> {
        self.content_dom().map(|element| ContentSlot {
            element,
            offset: self.content_offset,
        })
    }

    pub fn mount(&mut self, dom: &mut DomTree) -> Result<()> {
        if self.state != AdapterState::Uncreated {
            return Err(ViewError::AdapterState("mount requires an uncreated adapter"));
        }
        self.create(dom)
    }

    /// Build a new handle for the same node after a destroy
    pub fn remount(&mut self, dom: &mut DomTree) -> Result<()> {
        if self.state != AdapterState::Destroyed {
            return Err(ViewError::AdapterState("remount requires a destroyed adapter"));
        }
        self.create(dom)
    }

    pub fn update(
        &mut self,
        dom: &mut DomTree,
        node: &Node,
        outer: &[Decoration],
        inner: &DecorationSet,
    ) -> Result<UpdateOutcome> {
        if self.state != AdapterState::Created {
            return Err(ViewError::AdapterState("update requires a created adapter"));
        }
        if node.ptr_eq(&self.node) && outer == self.outer.as_slice() && *inner == self.inner {
            return Ok(UpdateOutcome::Unchanged);
        }

        self.node = node.clone();
        self.outer = outer.to_vec();
        self.inner = inner.clone();

        if self.hooks.update {
            if let Some(handle) = self.handle.clone() {
                let accepted = handle
                    .borrow_mut()
                    .update(dom, node, outer, inner)
                    .map_err(|source| self.error(source))?;
                if accepted {
                    debug!(node_type = node.type_name(), "custom view updated in place");
                    return Ok(UpdateOutcome::Updated);
                }
            }
        }

        self.release_content(dom);
        self.teardown(dom);
        self.create(dom)?;
        Ok(UpdateOutcome::Recreated)
    }

    /// Detach the handle root, run the destroy hook and free the root
    pub fn destroy(&mut self, dom: &mut DomTree) -> Result<()> {
        if self.state != AdapterState::Created {
            return Err(ViewError::AdapterState("destroy requires a created adapter"));
        }
        self.teardown(dom);
        Ok(())
    }

    /// Hooks of the current handle as descriptor overrides. They hold the
    /// handle weakly and defer once it is gone.
    pub fn overrides(&self) -> Overrides {
        let Some(handle) = &self.handle else {
            return Overrides::default();
        };
        let mut overrides = Overrides::default();
        if self.hooks.stop_event {
            let weak = Rc::downgrade(handle);
            overrides.stop_event = Some(Rc::new(move |event: &EditorEvent| {
                weak.upgrade().map(|h| h.borrow().stop_event(event))
            }));
        }
        if self.hooks.ignore_mutation {
            let weak = Rc::downgrade(handle);
            overrides.ignore_mutation = Some(Rc::new(move |record: &MutationRecord| {
                weak.upgrade().map(|h| h.borrow().ignore_mutation(record))
            }));
        }
        if self.hooks.select_node {
            let weak = Rc::downgrade(handle);
            overrides.select_node = Some(Rc::new(move |dom: &mut DomTree| {
                with_handle(&weak, |h| h.select_node(dom));
            }));
        }
        if self.hooks.deselect_node {
            let weak = Rc::downgrade(handle);
            overrides.deselect_node = Some(Rc::new(move |dom: &mut DomTree| {
                with_handle(&weak, |h| h.deselect_node(dom));
            }));
        }
        overrides
    }

    fn create(&mut self, dom: &mut DomTree) -> Result<()> {
        let ctx = CustomViewContext {
            node: &self.node,
            dom: &mut *dom,
            get_pos: self.get_pos.clone(),
            outer: &self.outer,
            inner: &self.inner,
            editable: self.editable,
        };
        let view = (self.factory)(ctx).map_err(|source| self.error(source))?;

        let root = view.dom();
        let content = view.content_dom();
        self.hooks = view.hooks();
        self.content_offset = content.map_or(0, |c| dom.children(c).len());
        dom.append_child(self.slot, root);
        let editable = if content.is_some() { "true" } else { "false" };
        dom.set_attribute(self.slot, "contenteditable", editable);

        self.handle = Some(Rc::new(RefCell::new(view)));
        self.state = AdapterState::Created;
        debug!(node_type = self.node.type_name(), "custom view created");
        Ok(())
    }

    fn teardown(&mut self, dom: &mut DomTree) {
        if let Some(handle) = self.handle.take() {
            let root = handle.borrow().dom();
            dom.detach(root);
            if self.hooks.destroy {
                handle.borrow_mut().destroy(dom);
            }
            dom.dispose(root);
        }
        self.state = AdapterState::Destroyed;
        debug!(node_type = self.node.type_name(), "custom view destroyed");
    }

    /// Take the reconciled children out of the content container so they
    /// outlive the handle that is about to be rebuilt
    fn release_content(&self, dom: &mut DomTree) {
        if let Some(slot) = self.content_slot() {
            let managed: Vec<DomId> = dom
                .children(slot.element)
                .get(slot.offset..)
                .unwrap_or_default()
                .to_vec();
            for child in managed {
                dom.detach(child);
            }
        }
    }

    fn error(&self, source: CustomViewError) -> ViewError {
        ViewError::CustomView {
            node_type: self.node.type_name().into(),
            source,
        }
    }
}

fn with_handle(weak: &Weak<RefCell<Box<dyn CustomView>>>, f: impl FnOnce(&mut dyn CustomView)) {
    if let Some(handle) = weak.upgrade() {
        let mut view = handle.borrow_mut();
        f(&mut **view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tandem_model::testing::{embed, figure};

    #[derive(Default)]
    struct Counters {
        created: Cell<usize>,
        destroyed: Cell<usize>,
    }

    struct Plain {
        root: DomId,
        counters: Rc<Counters>,
    }

    impl CustomView for Plain {
        fn dom(&self) -> DomId {
            self.root
        }

        fn hooks(&self) -> CustomViewHooks {
            CustomViewHooks {
                destroy: true,
                ..CustomViewHooks::default()
            }
        }

        fn destroy(&mut self, _dom: &mut DomTree) {
            self.counters.destroyed.set(self.counters.destroyed.get() + 1);
        }
    }

    fn plain_factory(counters: Rc<Counters>) -> CustomViewFactory {
        Rc::new(move |ctx: CustomViewContext<'_>| {
            counters.created.set(counters.created.get() + 1);
            let root = ctx.dom.create_element("div");
            Ok(Box::new(Plain {
                root,
                counters: counters.clone(),
            }) as Box<dyn CustomView>)
        })
    }

    fn adapter(dom: &mut DomTree, factory: CustomViewFactory, node: Node) -> CustomViewAdapter {
        CustomViewAdapter::new(
            dom,
            "div",
            factory,
            node,
            Vec::new(),
            DecorationSet::empty(),
            GetPos::new(0),
            true,
        )
    }

    #[test]
    fn test_mount_appends_root_into_slot() {
        let mut dom = DomTree::new();
        let counters = Rc::new(Counters::default());
        let mut adapter = adapter(&mut dom, plain_factory(counters.clone()), embed("a"));
        adapter.mount(&mut dom).unwrap();

        assert_eq!(adapter.state(), AdapterState::Created);
        assert_eq!(dom.children(adapter.slot()), &[adapter.root_dom().unwrap()]);
        assert_eq!(dom.attribute(adapter.slot(), "contenteditable"), Some("false"));
        assert!(matches!(
            adapter.mount(&mut dom),
            Err(ViewError::AdapterState(_))
        ));
    }

    #[test]
    fn test_identical_update_touches_nothing() {
        let mut dom = DomTree::new();
        let counters = Rc::new(Counters::default());
        let node = embed("a");
        let mut adapter = adapter(&mut dom, plain_factory(counters.clone()), node.clone());
        adapter.mount(&mut dom).unwrap();
        dom.take_mutations();

        for _ in 0..2 {
            let outcome = adapter
                .update(&mut dom, &node, &[], &DecorationSet::empty())
                .unwrap();
            assert_eq!(outcome, UpdateOutcome::Unchanged);
        }
        assert!(dom.take_mutations().is_empty());
        assert_eq!(counters.created.get(), 1);
    }

    #[test]
    fn test_missing_update_hook_recreates() {
        let mut dom = DomTree::new();
        let counters = Rc::new(Counters::default());
        let mut adapter = adapter(&mut dom, plain_factory(counters.clone()), embed("a"));
        adapter.mount(&mut dom).unwrap();
        let old_root = adapter.root_dom().unwrap();

        let outcome = adapter
            .update(&mut dom, &embed("b"), &[], &DecorationSet::empty())
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Recreated);
        assert_eq!(counters.created.get(), 2);
        assert_eq!(counters.destroyed.get(), 1);
        assert_eq!(dom.children(adapter.slot()).len(), 1);
        assert!(!dom.is_alive(old_root) || adapter.root_dom() == Some(old_root));
    }

    #[test]
    fn test_destroy_and_remount() {
        let mut dom = DomTree::new();
        let counters = Rc::new(Counters::default());
        let mut adapter = adapter(&mut dom, plain_factory(counters.clone()), embed("a"));
        assert!(matches!(
            adapter.destroy(&mut dom),
            Err(ViewError::AdapterState(_))
        ));
        adapter.mount(&mut dom).unwrap();
        adapter.destroy(&mut dom).unwrap();
        assert_eq!(adapter.state(), AdapterState::Destroyed);
        assert!(dom.children(adapter.slot()).is_empty());
        assert!(matches!(
            adapter.update(&mut dom, &embed("a"), &[], &DecorationSet::empty()),
            Err(ViewError::AdapterState(_))
        ));

        adapter.remount(&mut dom).unwrap();
        assert_eq!(adapter.state(), AdapterState::Created);
        assert_eq!(counters.created.get(), 2);
    }

    #[test]
    fn test_factory_error_is_reported() {
        let mut dom = DomTree::new();
        let factory: CustomViewFactory =
            Rc::new(|_: CustomViewContext<'_>| Err(CustomViewError::new("boom")));
        let mut adapter = adapter(&mut dom, factory, figure("f", []));
        let err = adapter.mount(&mut dom).unwrap_err();
        assert_eq!(
            err,
            ViewError::CustomView {
                node_type: "figure".into(),
                source: CustomViewError::new("boom"),
            }
        );
    }

    struct WithContent {
        root: DomId,
        content: DomId,
    }

    impl CustomView for WithContent {
        fn dom(&self) -> DomId {
            self.root
        }

        fn content_dom(&self) -> Option<DomId> {
            Some(self.content)
        }

        fn hooks(&self) -> CustomViewHooks {
            CustomViewHooks {
                update: true,
                ..CustomViewHooks::default()
            }
        }

        fn update(
            &mut self,
            _dom: &mut DomTree,
            node: &Node,
            _outer: &[Decoration],
            _inner: &DecorationSet,
        ) -> std::result::Result<bool, CustomViewError> {
            Ok(node.type_name() == "figure")
        }
    }

    #[test]
    fn test_content_slot_skips_static_prefix() {
        let mut dom = DomTree::new();
        let factory: CustomViewFactory = Rc::new(|ctx: CustomViewContext<'_>| {
            let root = ctx.dom.create_element("figure");
            let caption = ctx.dom.create_element("figcaption");
            let content = ctx.dom.create_element("div");
            let label = ctx.dom.create_text("label");
            ctx.dom.append_child(root, caption);
            ctx.dom.append_child(root, content);
            ctx.dom.append_child(content, label);
            Ok(Box::new(WithContent { root, content }) as Box<dyn CustomView>)
        });
        let mut adapter = adapter(&mut dom, factory, figure("f", []));
        adapter.mount(&mut dom).unwrap();

        let slot = adapter.content_slot().unwrap();
        assert_eq!(slot.offset, 1);
        assert_eq!(dom.attribute(adapter.slot(), "contenteditable"), Some("true"));

        let outcome = adapter
            .update(&mut dom, &figure("g", []), &[], &DecorationSet::empty())
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Updated);
    }
}
