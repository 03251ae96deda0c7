//! Handler table consulted by the view: key-down and text-input handlers in
//! priority order, custom view factories, components and decoration sources.

use crate::component::NodeViewComponent;
use crate::custom_view::CustomViewFactory;
use crate::keymap::{KeyEvent, Keymap};
use smartstring::alias::String as SmartString;
use std::collections::HashMap;
use std::rc::Rc;
use tandem_model::{Decoration, DecorationSet, EditorState, Transaction};

pub type KeyDownHandler = Rc<dyn Fn(&KeyEvent, &EditorState, &mut dyn FnMut(Transaction)) -> bool>;

/// Called with the range being replaced and the text replacing it
pub type TextInputHandler =
    Rc<dyn Fn(&EditorState, usize, usize, &str, &mut dyn FnMut(Transaction)) -> bool>;

pub type DecorationSource = Rc<dyn Fn(&EditorState) -> DecorationSet>;

#[derive(Clone, Default)]
pub struct EditorProps {
    key_down: Vec<KeyDownHandler>,
    text_input: Vec<TextInputHandler>,
    node_views: HashMap<SmartString, CustomViewFactory>,
    components: HashMap<SmartString, Rc<dyn NodeViewComponent>>,
    decorations: Vec<DecorationSource>,
}

impl EditorProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_down(mut self, handler: KeyDownHandler) -> Self {
        self.key_down.push(handler);
        self
    }

    pub fn with_keymap(self, keymap: Keymap) -> Self {
        self.with_key_down(Rc::new(
            move |key: &KeyEvent, state: &EditorState, dispatch: &mut dyn FnMut(Transaction)| {
                keymap.handle(key, state, Some(dispatch))
            },
        ))
    }

    pub fn with_text_input(mut self, handler: TextInputHandler) -> Self {
        self.text_input.push(handler);
        self
    }

    pub fn with_node_view(mut self, node_type: &str, factory: CustomViewFactory) -> Self {
        self.node_views.insert(node_type.into(), factory);
        self
    }

    pub fn with_component(mut self, node_type: &str, component: Rc<dyn NodeViewComponent>) -> Self {
        self.components.insert(node_type.into(), component);
        self
    }

    pub fn with_decorations(mut self, source: DecorationSource) -> Self {
        self.decorations.push(source);
        self
    }

    pub fn node_view(&self, node_type: &str) -> Option<&CustomViewFactory> {
        self.node_views.get(node_type)
    }

    pub fn component(&self, node_type: &str) -> Option<&Rc<dyn NodeViewComponent>> {
        self.components.get(node_type)
    }

    /// First handler returning `true` wins
    pub fn handle_key_down(
        &self,
        key: &KeyEvent,
        state: &EditorState,
        dispatch: &mut dyn FnMut(Transaction),
    ) -> bool {
        self.key_down.iter().any(|handler| handler(key, state, dispatch))
    }

    pub fn handle_text_input(
        &self,
        state: &EditorState,
        from: usize,
        to: usize,
        text: &str,
        dispatch: &mut dyn FnMut(Transaction),
    ) -> bool {
        self.text_input
            .iter()
            .any(|handler| handler(state, from, to, text, dispatch))
    }

    /// Decorations from every source, merged
    pub fn decorations(&self, state: &EditorState) -> DecorationSet {
        let all: Vec<Decoration> = self
            .decorations
            .iter()
            .flat_map(|source| source(state).iter().cloned().collect::<Vec<_>>())
            .collect();
        DecorationSet::new(all)
    }
}
