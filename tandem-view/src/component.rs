//! Declarative node components.
//!
//! A component renders a node from props to a DOM shape, like a schema
//! `to_dom`, but with access to its decorations and position handle. It may
//! also register behaviour overrides for its descriptor; these are
//! re-registered on every commit.

use crate::descriptor::Overrides;
use crate::position::GetPos;
use serde_json::Value;
use tandem_model::{Decoration, DecorationSet, Node};

pub struct ComponentProps<'a> {
    pub node: &'a Node,
    pub outer: &'a [Decoration],
    pub inner: &'a DecorationSet,
    pub get_pos: &'a GetPos,
}

pub trait NodeViewComponent {
    /// DOM shape for the node; a hole marks where its content goes
    fn render(&self, props: &ComponentProps) -> Value;

    fn overrides(&self, _props: &ComponentProps) -> Overrides {
        Overrides::default()
    }
}
