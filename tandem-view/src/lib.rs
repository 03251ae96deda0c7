//! Tandem view layer
//!
//! Keeps a DOM tree in step with a rich-text document owned by
//! `tandem_model`, decorations included, while letting opaque custom node
//! views and IME composition edit parts of the DOM on their own.

pub mod component;
pub mod compose;
pub mod config;
pub mod coords;
pub mod custom_view;
pub mod descriptor;
pub mod dom;
pub mod error;
pub mod events;
pub mod input;
pub mod keymap;
pub mod logging;
pub mod output_spec;
pub mod position;
pub mod props;
pub mod reconcile;
pub mod view;

pub use component::{ComponentProps, NodeViewComponent};
pub use config::ViewConfig;
pub use coords::DomPoint;
pub use custom_view::{CustomView, CustomViewContext, CustomViewFactory, CustomViewHooks};
pub use descriptor::{DescId, DescKind, DescriptorTree, MutationKind, MutationRecord, Overrides};
pub use dom::{DomId, DomMutation, DomTree};
pub use error::{CustomViewError, Result, ViewError};
pub use events::{EditorEvent, EventDispatcher, EventKind, EventQueue, SubscriptionId};
pub use input::{BeforeInputEvent, InputBridge, InputHost, InputType, StaticRange};
pub use keymap::{KeyEvent, Keymap};
pub use props::EditorProps;
pub use view::EditorView;
