//! Tandem document model
//!
//! A compact document engine for the Tandem view layer: schema, immutable
//! node trees, marks, resolved positions, selections, transactions with
//! position mapping, decorations and basic editing commands.
//!
//! Positions count the boundaries between tokens: every character of text
//! is one position, a leaf node is one position, and any other node adds
//! one position for its opening and one for its closing boundary.

pub mod commands;
pub mod decoration;
pub mod error;
pub mod mapping;
pub mod mark;
pub mod node;
pub mod resolve;
pub mod schema;
pub mod selection;
pub mod state;
pub mod transform;

#[cfg(feature = "testing")]
pub mod testing;

pub use commands::Command;
pub use decoration::{Decoration, DecorationAttrs, DecorationKind, DecorationSet, Side, WidgetSpec};
pub use error::{ModelError, Result};
pub use mapping::{Mapping, StepMap};
pub use mark::{Mark, MarkSet};
pub use node::Node;
pub use resolve::ResolvedPos;
pub use schema::{Attrs, ContentKind, MarkSpec, MarkType, NodeSpec, NodeType, Schema};
pub use selection::Selection;
pub use state::EditorState;
pub use transform::Transaction;
