//! Editor events and the dispatcher that routes them to subscribers.

mod queue;

pub use queue::EventQueue;

use crate::dom::DomId;
use crate::input::BeforeInputEvent;
use crate::keymap::KeyEvent;
use std::rc::Rc;
use tandem_model::EditorState;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyDown,
    BeforeInput,
    CompositionStart,
    CompositionUpdate,
    CompositionEnd,
    Focus,
    Blur,
}

/// Events the editor reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    KeyDown {
        target: DomId,
        key: KeyEvent,
    },
    BeforeInput {
        target: DomId,
        event: BeforeInputEvent,
    },
    CompositionStart {
        target: DomId,
    },
    CompositionUpdate {
        target: DomId,
        data: String,
    },
    /// `data` is the committed text, if any
    CompositionEnd {
        target: DomId,
        data: Option<String>,
    },
    Focus,
    Blur,
}

impl EditorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EditorEvent::KeyDown { .. } => EventKind::KeyDown,
            EditorEvent::BeforeInput { .. } => EventKind::BeforeInput,
            EditorEvent::CompositionStart { .. } => EventKind::CompositionStart,
            EditorEvent::CompositionUpdate { .. } => EventKind::CompositionUpdate,
            EditorEvent::CompositionEnd { .. } => EventKind::CompositionEnd,
            EditorEvent::Focus => EventKind::Focus,
            EditorEvent::Blur => EventKind::Blur,
        }
    }

    /// DOM node the event was fired on
    pub fn target(&self) -> Option<DomId> {
        match self {
            EditorEvent::KeyDown { target, .. }
            | EditorEvent::BeforeInput { target, .. }
            | EditorEvent::CompositionStart { target }
            | EditorEvent::CompositionUpdate { target, .. }
            | EditorEvent::CompositionEnd { target, .. } => Some(*target),
            EditorEvent::Focus | EditorEvent::Blur => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u32);

/// Returns `true` when it handled the event
pub type EventHandler = Rc<dyn Fn(&EditorEvent, &EditorState) -> bool>;

/// Typed subscriber lists, one per event kind
pub struct EventDispatcher {
    handlers: Vec<(SubscriptionId, EventKind, EventHandler)>,
    next_id: u32,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, kind, handler));
        id
    }

    /// Returns whether the subscription existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sub, _, _)| *sub != id);
        self.handlers.len() != before
    }

    /// Offer `event` to its subscribers in subscription order until one
    /// handles it
    pub fn dispatch(&self, event: &EditorEvent, state: &EditorState) -> bool {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = self
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, h)| h.clone())
            .collect();
        for handler in handlers {
            if handler(event, state) {
                trace!(?kind, "event handled by subscriber");
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tandem_model::testing::{doc, p, state, txt};

    #[test]
    fn test_first_handler_wins() {
        let mut dispatcher = EventDispatcher::new();
        let calls = Rc::new(Cell::new(0));
        let first = calls.clone();
        dispatcher.subscribe(
            EventKind::Focus,
            Rc::new(move |_: &EditorEvent, _: &EditorState| {
                first.set(first.get() + 1);
                true
            }),
        );
        let second = calls.clone();
        dispatcher.subscribe(
            EventKind::Focus,
            Rc::new(move |_: &EditorEvent, _: &EditorState| {
                second.set(second.get() + 10);
                true
            }),
        );

        let st = state(doc([p([txt("a")])]));
        assert!(dispatcher.dispatch(&EditorEvent::Focus, &st));
        assert_eq!(calls.get(), 1);
        assert!(!dispatcher.dispatch(&EditorEvent::Blur, &st));
    }

    #[test]
    fn test_unsubscribe() {
        let mut dispatcher = EventDispatcher::new();
        let id = dispatcher.subscribe(
            EventKind::Blur,
            Rc::new(|_: &EditorEvent, _: &EditorState| true),
        );
        let st = state(doc([p([])]));
        assert!(dispatcher.dispatch(&EditorEvent::Blur, &st));
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        assert!(!dispatcher.dispatch(&EditorEvent::Blur, &st));
        assert!(dispatcher.is_empty());
    }
}
