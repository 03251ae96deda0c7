//! Error types for the view layer

use smartstring::alias::String as SmartString;
use tandem_model::ModelError;
use thiserror::Error;

/// Error raised by externally supplied view code (factories, update hooks)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CustomViewError(pub String);

impl CustomViewError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("Malformed DOM shape: {0}")]
    MalformedSpec(String),

    #[error("Content hole must be the only or last child of its element: {0}")]
    MisplacedHole(String),

    #[error("Node type '{0}' has no custom view, component or DOM shape")]
    Unrenderable(SmartString),

    #[error("Custom view for '{node_type}' failed: {source}")]
    CustomView {
        node_type: SmartString,
        #[source]
        source: CustomViewError,
    },

    #[error("Illegal adapter transition: {0}")]
    AdapterState(&'static str),

    #[error("Unknown descriptor {0}")]
    UnknownDescriptor(u32),

    #[error("Descriptor tree does not match the document: {0}")]
    TreeMismatch(String),

    #[error("Position {0} does not map to the rendered DOM")]
    PositionNotMapped(usize),

    #[error("Invalid view config: {0}")]
    Config(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, ViewError>;
