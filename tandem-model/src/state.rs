use crate::mark::MarkSet;
use crate::node::Node;
use crate::schema::Schema;
use crate::selection::Selection;
use crate::transform::Transaction;
use std::rc::Rc;
use tracing::trace;

/// Immutable editor state: document, selection and stored marks
#[derive(Debug, Clone)]
pub struct EditorState {
    schema: Rc<Schema>,
    doc: Node,
    selection: Selection,
    stored_marks: Option<MarkSet>,
}

impl EditorState {
    /// State with the cursor at the start of the first textblock
    pub fn new(schema: Rc<Schema>, doc: Node) -> Self {
        let mut cursor = None;
        doc.nodes_between(0, doc.content_size(), &mut |node, pos| {
            if cursor.is_none() && node.is_textblock() {
                cursor = Some(pos + 1);
            }
            cursor.is_none()
        });
        Self {
            schema,
            doc,
            selection: Selection::cursor(cursor.unwrap_or(0)),
            stored_marks: None,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn schema(&self) -> &Rc<Schema> {
        &self.schema
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Marks applied to the next input, overriding the marks at the cursor
    pub fn stored_marks(&self) -> Option<&MarkSet> {
        self.stored_marks.as_ref()
    }

    pub fn tr(&self) -> Transaction {
        Transaction::new(self)
    }

    pub fn apply(&self, tr: Transaction) -> EditorState {
        trace!(
            steps = tr.mapping().maps().len(),
            doc_changed = tr.doc_changed(),
            "applying transaction"
        );
        let (doc, selection, stored_marks) = tr.into_parts();
        let stored_marks = if selection.empty() { stored_marks } else { None };
        EditorState {
            schema: self.schema.clone(),
            doc,
            selection,
            stored_marks,
        }
    }
}
