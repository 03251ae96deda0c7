use super::EditorEvent;
use std::collections::VecDeque;
use tracing::trace;

/// Pending editor events, handled oldest first by `EditorView::pump_events`.
///
/// A composition update carries the whole composed string, so a run of
/// updates on the same target collapses into the latest one.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<EditorEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: EditorEvent) {
        if let EditorEvent::CompositionUpdate { target, data } = &event {
            if let Some(EditorEvent::CompositionUpdate {
                target: last_target,
                data: last_data,
            }) = self.events.back_mut()
            {
                if *last_target == *target {
                    trace!(?target, "coalescing composition update");
                    *last_data = data.clone();
                    return;
                }
            }
        }
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<EditorEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
