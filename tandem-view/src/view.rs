//! # Editor view
//!
//! The root coordinator. Owns the editor state, the DOM arena, the
//! descriptor tree and the handler table, and runs the commit protocol
//! after every state change.

use crate::config::ViewConfig;
use crate::coords::{self, DomPoint};
use crate::descriptor::{DescriptorTree, MutationRecord};
use crate::dom::{DomId, DomTree};
use crate::error::Result;
use crate::events::{EditorEvent, EventDispatcher, EventHandler, EventKind, EventQueue, SubscriptionId};
use crate::input::{InputBridge, InputHost};
use crate::keymap::KeyEvent;
use crate::props::EditorProps;
use crate::reconcile::Reconciler;
use tandem_model::{Decoration, EditorState, Transaction};
use tracing::{debug, trace};

pub struct EditorView {
    state: EditorState,
    dom: DomTree,
    mount: DomId,
    tree: DescriptorTree,
    props: EditorProps,
    config: ViewConfig,
    bridge: InputBridge,
    dispatcher: EventDispatcher,
    queue: EventQueue,
    shielded: Option<DomId>,
    cursor_wrapper: Option<Decoration>,
}

impl EditorView {
    /// Create a view and render `state` into a fresh mount element
    pub fn new(state: EditorState, props: EditorProps, config: ViewConfig) -> Result<Self> {
        let mut dom = DomTree::new();
        let mount = dom.create_element("div");
        dom.set_attribute(mount, "contenteditable", if config.editable { "true" } else { "false" });
        let tree = DescriptorTree::new(&config.selected_node_class);
        let mut view = Self {
            state,
            dom,
            mount,
            tree,
            props,
            config,
            bridge: InputBridge::new(),
            dispatcher: EventDispatcher::new(),
            queue: EventQueue::new(),
            shielded: None,
            cursor_wrapper: None,
        };
        view.commit()?;
        debug!(mount = ?view.mount, descriptors = view.tree.len(), "editor view created");
        Ok(view)
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn dom(&self) -> &DomTree {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut DomTree {
        &mut self.dom
    }

    pub fn mount(&self) -> DomId {
        self.mount
    }

    pub fn tree(&self) -> &DescriptorTree {
        &self.tree
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn is_composing(&self) -> bool {
        self.bridge.is_composing()
    }

    /// Replace the state wholesale and re-render
    pub fn update_state(&mut self, state: EditorState) -> Result<()> {
        self.state = state;
        self.commit()
    }

    /// Apply `tr` and commit synchronously
    pub fn dispatch(&mut self, tr: Transaction) -> Result<()> {
        trace!(doc_changed = tr.doc_changed(), "dispatch");
        self.state = self.state.apply(tr);
        self.commit()
    }

    /// Bring the descriptor tree and DOM in line with the current state
    pub fn commit(&mut self) -> Result<()> {
        let mut decos = self.props.decorations(&self.state);
        if let Some(wrapper) = &self.cursor_wrapper {
            decos = decos.add(vec![wrapper.clone()]);
        }
        let mut reconciler = Reconciler::new(
            &mut self.dom,
            &mut self.tree,
            &self.props,
            &self.config,
            self.shielded,
        );
        reconciler.render_root(self.mount, self.state.doc(), &decos)?;
        reconciler.sync_selection(&self.state.selection())?;
        if self.config.check_invariants && self.shielded.is_none() {
            self.tree.check_against(self.state.doc())?;
        }
        Ok(())
    }

    /// Route an event: node views that stop it keep it, then subscribers,
    /// then built-in handling. Returns whether the editor handled it.
    pub fn handle_event(&mut self, event: &mut EditorEvent) -> Result<bool> {
        if let Some(target) = event.target()
            && self.tree.stop_event(&self.dom, target, event)
        {
            trace!(kind = ?event.kind(), "event stopped by node view");
            return Ok(false);
        }
        if self.dispatcher.dispatch(event, &self.state) {
            return Ok(true);
        }

        let mut bridge = std::mem::take(&mut self.bridge);
        let result = match event {
            EditorEvent::KeyDown { key, .. } => self.key_down(key),
            EditorEvent::BeforeInput { event, .. } => bridge.before_input(self, event),
            EditorEvent::CompositionStart { .. } => bridge.composition_start(self),
            EditorEvent::CompositionUpdate { .. } => bridge.composition_update(self),
            EditorEvent::CompositionEnd { data, .. } => bridge.composition_end(self, data.as_deref()),
            EditorEvent::Focus | EditorEvent::Blur => Ok(false),
        };
        self.bridge = bridge;
        result
    }

    /// Queue an event for the next `pump_events`
    pub fn enqueue(&mut self, event: EditorEvent) {
        self.queue.push(event);
    }

    /// Handle every queued event in arrival order, returning how many were
    /// handled
    pub fn pump_events(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(mut event) = self.queue.pop() {
            if self.handle_event(&mut event)? {
                handled += 1;
            }
        }
        Ok(handled)
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        self.dispatcher.subscribe(kind, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Drain recorded DOM mutations, keeping those the editor has to read
    /// back
    pub fn filter_mutations(&mut self) -> Vec<MutationRecord> {
        let mutations = self.dom.take_mutations();
        mutations
            .iter()
            .map(MutationRecord::from)
            .filter(|record| !self.tree.ignore_mutation(&self.dom, record))
            .collect()
    }

    pub fn dom_at_pos(&self, pos: usize) -> Result<DomPoint> {
        coords::dom_at_pos(&self.tree, &self.dom, pos)
    }

    pub fn pos_at_dom(&self, node: DomId, offset: usize, bias: i32) -> Result<usize> {
        coords::pos_at_dom(&self.tree, &self.dom, node, offset, bias)
    }

    /// Tear down every descriptor and owned custom view
    pub fn destroy(&mut self) -> Result<()> {
        if let Some(root) = self.tree.root() {
            self.tree.destroy(&mut self.dom, root)?;
        }
        self.shielded = None;
        self.cursor_wrapper = None;
        debug!("editor view destroyed");
        Ok(())
    }

    fn key_down(&mut self, key: &KeyEvent) -> Result<bool> {
        let mut trs = Vec::new();
        let handled = self
            .props
            .handle_key_down(key, &self.state, &mut |tr| trs.push(tr));
        trace!(key = %key.name(), handled, "key down");
        for tr in trs {
            self.dispatch(tr)?;
        }
        Ok(handled)
    }

    fn text_input(&mut self, from: usize, to: usize, text: &str) -> Result<bool> {
        let mut trs = Vec::new();
        let handled = self
            .props
            .handle_text_input(&self.state, from, to, text, &mut |tr| trs.push(tr));
        for tr in trs {
            self.dispatch(tr)?;
        }
        Ok(handled)
    }
}

impl InputHost for EditorView {
    fn state(&self) -> &EditorState {
        &self.state
    }

    fn config(&self) -> &ViewConfig {
        &self.config
    }

    fn dom(&self) -> &DomTree {
        &self.dom
    }

    fn dom_mut(&mut self) -> &mut DomTree {
        &mut self.dom
    }

    fn dispatch(&mut self, tr: Transaction) -> Result<()> {
        EditorView::dispatch(self, tr)
    }

    fn commit(&mut self) -> Result<()> {
        EditorView::commit(self)
    }

    fn dom_at_pos(&self, pos: usize) -> Result<DomPoint> {
        EditorView::dom_at_pos(self, pos)
    }

    fn pos_at_dom(&self, node: DomId, offset: usize, bias: i32) -> Result<usize> {
        EditorView::pos_at_dom(self, node, offset, bias)
    }

    fn set_shielded(&mut self, element: Option<DomId>) {
        self.shielded = element;
    }

    fn set_cursor_wrapper(&mut self, wrapper: Option<Decoration>) {
        self.cursor_wrapper = wrapper;
    }

    fn handle_key_down(&mut self, key: &KeyEvent) -> Result<bool> {
        self.key_down(key)
    }

    fn handle_text_input(&mut self, from: usize, to: usize, text: &str) -> Result<bool> {
        self.text_input(from, to, text)
    }

    fn is_managed(&self, node: DomId) -> bool {
        self.tree.desc_for_dom(node).is_some()
    }

    fn content_element(&self, node: DomId) -> Option<DomId> {
        self.tree.content_element(&self.dom, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::Keymap;
    use std::rc::Rc;
    use tandem_model::testing::{doc, p, state, txt};

    fn view(state: EditorState) -> EditorView {
        let props = EditorProps::new().with_keymap(Keymap::base());
        let config = ViewConfig {
            check_invariants: true,
            ..ViewConfig::default()
        };
        EditorView::new(state, props, config).unwrap()
    }

    #[test]
    fn test_initial_render() {
        let view = view(state(doc([p([txt("ab")])])));
        assert_eq!(view.dom().to_html(view.mount()), r#"<div contenteditable="true"><p>ab</p></div>"#);
    }

    #[test]
    fn test_dispatch_rerenders() {
        let mut view = view(state(doc([p([txt("ab")])])));
        let mut tr = view.state().tr();
        tr.insert_text("c", 3, 3).unwrap();
        view.dispatch(tr).unwrap();
        assert_eq!(view.dom().text_content(view.mount()), "abc");
    }

    #[test]
    fn test_subscriber_takes_precedence() {
        let mut view = view(state(doc([p([txt("ab")])])));
        let id = view.subscribe(EventKind::KeyDown, Rc::new(|_, _| true));
        let target = view.mount();
        let mut event = EditorEvent::KeyDown {
            target,
            key: KeyEvent::new("Enter"),
        };
        assert!(view.handle_event(&mut event).unwrap());
        assert_eq!(view.state().doc().child_count(), 1);

        assert!(view.unsubscribe(id));
        assert!(view.handle_event(&mut event).unwrap());
        assert_eq!(view.state().doc().child_count(), 2);
    }

    #[test]
    fn test_focus_is_not_handled() {
        let mut view = view(state(doc([p([txt("ab")])])));
        assert!(!view.handle_event(&mut EditorEvent::Focus).unwrap());
    }

    #[test]
    fn test_pump_events() {
        let mut view = view(state(doc([p([txt("ab")])])));
        let target = view.mount();
        view.enqueue(EditorEvent::Focus);
        view.enqueue(EditorEvent::KeyDown {
            target,
            key: KeyEvent::new("Enter"),
        });
        assert_eq!(view.pump_events().unwrap(), 1);
        assert_eq!(view.state().doc().child_count(), 2);
    }

    #[test]
    fn test_destroy_invalidates_positions() {
        let mut view = view(state(doc([p([txt("ab")])])));
        let root = view.tree().root().unwrap();
        let para = view.tree().get(root).unwrap().children()[0];
        let get_pos = view.tree().get(para).unwrap().get_pos().clone();
        assert_eq!(get_pos.get(), Some(0));
        view.destroy().unwrap();
        assert!(!get_pos.is_live());
        assert!(view.tree().is_empty());
    }
}
