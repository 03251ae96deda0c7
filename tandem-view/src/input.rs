//! # Composition and before-input bridge
//!
//! Native text input never edits the document directly. Before-input
//! events are cancelled and turned into transactions. Composition (IME) is
//! the exception: the platform edits the DOM while a session is active, so
//! the container it types into is shielded from reconciliation, and its
//! children are put back when the session ends, before the composed text is
//! inserted as a transaction.

use crate::config::ViewConfig;
use crate::coords::DomPoint;
use crate::dom::{DomId, DomTree};
use crate::error::Result;
use crate::keymap::KeyEvent;
use serde_json::json;
use tandem_model::mark::union;
use tandem_model::{Decoration, EditorState, MarkSet, Transaction};
use tracing::{debug, trace};

pub const CURSOR_WRAPPER_KEY: &str = "cursor-wrapper";

/// What the bridge needs from the view
pub trait InputHost {
    fn state(&self) -> &EditorState;
    fn config(&self) -> &ViewConfig;
    fn dom(&self) -> &DomTree;
    fn dom_mut(&mut self) -> &mut DomTree;
    /// Apply a transaction and commit
    fn dispatch(&mut self, tr: Transaction) -> Result<()>;
    /// Re-render the current state
    fn commit(&mut self) -> Result<()>;
    fn dom_at_pos(&self, pos: usize) -> Result<DomPoint>;
    fn pos_at_dom(&self, node: DomId, offset: usize, bias: i32) -> Result<usize>;
    /// Exclude an element from reconciliation, or lift the exclusion
    fn set_shielded(&mut self, element: Option<DomId>);
    fn set_cursor_wrapper(&mut self, wrapper: Option<Decoration>);
    fn handle_key_down(&mut self, key: &KeyEvent) -> Result<bool>;
    /// Offer text input to the text-input handlers
    fn handle_text_input(&mut self, from: usize, to: usize, text: &str) -> Result<bool>;
    /// Whether a live descriptor owns this DOM node
    fn is_managed(&self, node: DomId) -> bool;
    /// Content element of the innermost descriptor holding `node`
    fn content_element(&self, node: DomId) -> Option<DomId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    InsertText,
    InsertReplacementText,
    InsertParagraph,
    InsertLineBreak,
    DeleteWordBackward,
    DeleteContentBackward,
    DeleteWordForward,
    DeleteContentForward,
    DeleteContent,
    Other,
}

impl InputType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "insertText" => InputType::InsertText,
            "insertReplacementText" => InputType::InsertReplacementText,
            "insertParagraph" => InputType::InsertParagraph,
            "insertLineBreak" => InputType::InsertLineBreak,
            "deleteWordBackward" => InputType::DeleteWordBackward,
            "deleteContentBackward" => InputType::DeleteContentBackward,
            "deleteWordForward" => InputType::DeleteWordForward,
            "deleteContentForward" => InputType::DeleteContentForward,
            "deleteContent" => InputType::DeleteContent,
            _ => InputType::Other,
        }
    }

    pub fn is_delete(self) -> bool {
        matches!(
            self,
            InputType::DeleteWordBackward
                | InputType::DeleteContentBackward
                | InputType::DeleteWordForward
                | InputType::DeleteContentForward
                | InputType::DeleteContent
        )
    }
}

/// A DOM range reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRange {
    pub start: DomId,
    pub start_offset: usize,
    pub end: DomId,
    pub end_offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BeforeInputEvent {
    pub input_type: InputType,
    pub data: Option<String>,
    pub target_ranges: Vec<StaticRange>,
    /// Plain text carried by replacement input
    pub data_transfer: Option<String>,
    pub default_prevented: bool,
}

impl BeforeInputEvent {
    pub fn new(input_type: &str) -> Self {
        Self {
            input_type: InputType::from_name(input_type),
            data: None,
            target_ranges: Vec::new(),
            data_transfer: None,
            default_prevented: false,
        }
    }

    pub fn with_data(mut self, data: &str) -> Self {
        self.data = Some(data.to_string());
        self
    }

    pub fn with_data_transfer(mut self, text: &str) -> Self {
        self.data_transfer = Some(text.to_string());
        self
    }

    pub fn with_range(mut self, range: StaticRange) -> Self {
        self.target_ranges.push(range);
        self
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }
}

/// State of an active composition
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionSession {
    /// Marks the composed text will carry
    pub marks: MarkSet,
    /// Element the platform types into
    pub container: DomId,
    /// Children of the container when the session started
    pub snapshot: Vec<DomId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum BridgeState {
    #[default]
    Idle,
    Composing(CompositionSession),
}

#[derive(Debug, Default)]
pub struct InputBridge {
    state: BridgeState,
}

impl InputBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn is_composing(&self) -> bool {
        matches!(self.state, BridgeState::Composing(_))
    }

    pub fn composition_start(&mut self, host: &mut dyn InputHost) -> Result<bool> {
        if self.is_composing() {
            trace!("composition already active");
            return Ok(true);
        }
        if !host.state().selection().empty() {
            let mut tr = host.state().tr();
            tr.delete_selection()?;
            host.dispatch(tr)?;
        }

        let state = host.state();
        let pos = state.selection().from();
        let marks = match state.stored_marks() {
            Some(marks) => marks.clone(),
            None => state.doc().resolve(pos)?.marks(),
        };
        if host.config().cursor_wrapper {
            let wrapper = Decoration::widget(pos, json!(["span", {"class": "cursor-wrapper"}]))
                .with_key(CURSOR_WRAPPER_KEY)
                .with_marks(marks.clone());
            host.set_cursor_wrapper(Some(wrapper));
            host.commit()?;
        }

        let point = host.dom_at_pos(pos)?;
        let container = match host.content_element(point.node) {
            Some(element) => element,
            None if host.dom().is_text(point.node) => host.dom().parent(point.node).unwrap_or(point.node),
            None => point.node,
        };
        let snapshot = host.dom().children(container).to_vec();
        host.set_shielded(Some(container));
        debug!(pos, ?container, children = snapshot.len(), "composition started");
        self.state = BridgeState::Composing(CompositionSession {
            marks,
            container,
            snapshot,
        });
        Ok(true)
    }

    pub fn composition_update(&mut self, _host: &mut dyn InputHost) -> Result<bool> {
        Ok(true)
    }

    pub fn composition_end(&mut self, host: &mut dyn InputHost, data: Option<&str>) -> Result<bool> {
        let BridgeState::Composing(session) = std::mem::take(&mut self.state) else {
            trace!("composition end without a session");
            return Ok(true);
        };
        host.set_shielded(None);
        restore_children(host, &session);

        let text = data.filter(|t| !t.is_empty());
        debug!(text = ?text, "composition ended");
        let Some(text) = text else {
            host.set_cursor_wrapper(None);
            host.commit()?;
            return Ok(true);
        };

        let selection = host.state().selection();
        let (from, to) = (selection.from(), selection.to());
        if host.handle_text_input(from, to, text)? {
            host.set_cursor_wrapper(None);
            host.commit()?;
            return Ok(true);
        }
        let mut tr = host.state().tr();
        tr.set_stored_marks(Some(session.marks));
        tr.insert_text(text, from, to)?;
        host.set_cursor_wrapper(None);
        host.dispatch(tr)?;
        Ok(true)
    }

    /// Translate a before-input event into editor actions. The native
    /// default is always prevented.
    pub fn before_input(&mut self, host: &mut dyn InputHost, event: &mut BeforeInputEvent) -> Result<bool> {
        event.prevent_default();
        trace!(input_type = ?event.input_type, "before input");
        match event.input_type {
            InputType::InsertParagraph => {
                host.handle_key_down(&KeyEvent::new("Enter"))?;
            }
            InputType::InsertLineBreak => {
                host.handle_key_down(&KeyEvent::new("Enter").with_shift())?;
            }
            InputType::InsertReplacementText => {
                let Some(text) = event.data.clone().or_else(|| event.data_transfer.clone()) else {
                    trace!("replacement without text, ignoring");
                    return Ok(true);
                };
                let mut tr = host.state().tr();
                for range in &event.target_ranges {
                    let from = host.pos_at_dom(range.start, range.start_offset, 1)?;
                    let to = host.pos_at_dom(range.end, range.end_offset, 1)?;
                    let (from, to) = (tr.mapping().map(from), tr.mapping().map(to));
                    tr.insert_text(&text, from, to)?;
                }
                host.dispatch(tr)?;
            }
            InputType::InsertText => {
                let Some(text) = event.data.clone() else {
                    trace!("text input without data, ignoring");
                    return Ok(true);
                };
                let selection = host.state().selection();
                let (from, to) = (selection.from(), selection.to());
                if !host.handle_text_input(from, to, &text)? {
                    let mut tr = host.state().tr();
                    tr.insert_text(&text, from, to)?;
                    host.dispatch(tr)?;
                }
            }
            input_type if input_type.is_delete() => self.delete_ranges(host, event)?,
            _ => {}
        }
        Ok(true)
    }

    fn delete_ranges(&self, host: &mut dyn InputHost, event: &BeforeInputEvent) -> Result<()> {
        let mut tr = host.state().tr();
        if event.target_ranges.is_empty() {
            if host.state().selection().empty() {
                return Ok(());
            }
            let selection = host.state().selection();
            let marks = host.state().doc().marks_between(selection.from(), selection.to());
            tr.delete_selection()?;
            tr.set_stored_marks(Some(marks));
            return host.dispatch(tr);
        }

        let mut marks = MarkSet::new();
        for range in &event.target_ranges {
            let from = host.pos_at_dom(range.start, range.start_offset, -1)?;
            let to = host.pos_at_dom(range.end, range.end_offset, 1)?;
            let (from, to) = (tr.mapping().map(from), tr.mapping().map(to));
            let (from, to) = (from.min(to), from.max(to));
            marks = union(&marks, &tr.doc().marks_between(from, to));
            tr.delete(from, to)?;
        }
        tr.set_stored_marks(Some(marks));
        host.dispatch(tr)
    }
}

/// Put the container's children back the way they were when the session
/// started. Nodes the platform added are removed and, unless a descriptor
/// owns them, freed.
fn restore_children(host: &mut dyn InputHost, session: &CompositionSession) {
    let container = session.container;
    if !host.dom().is_alive(container) {
        debug!(?container, "composition container is gone");
        return;
    }
    let mut placed = 0;
    for node in &session.snapshot {
        if !host.dom().is_alive(*node) {
            debug!(?node, "snapshot node was freed during composition");
            continue;
        }
        let dom = host.dom_mut();
        let current = dom.children(container).get(placed).copied();
        if current != Some(*node) {
            dom.insert_before(container, *node, current);
        }
        placed += 1;
    }
    let extras: Vec<DomId> = host
        .dom()
        .children(container)
        .get(placed..)
        .unwrap_or_default()
        .to_vec();
    for extra in extras {
        debug!(?extra, "removing DOM added during composition");
        if host.is_managed(extra) {
            host.dom_mut().detach(extra);
        } else {
            host.dom_mut().dispose(extra);
        }
    }
}
