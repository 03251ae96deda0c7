//! Editing commands.
//!
//! A command inspects the state and reports whether it applies. When a
//! dispatch sink is given it also builds and dispatches the transaction.

use crate::error::Result;
use crate::schema::Attrs;
use crate::state::EditorState;
use crate::transform::Transaction;
use std::rc::Rc;
use tracing::warn;

pub type Command = Rc<dyn Fn(&EditorState, Option<&mut dyn FnMut(Transaction)>) -> bool>;

/// Run `build` against a fresh transaction and dispatch it. Build errors
/// make the command inapplicable.
fn run(
    state: &EditorState,
    dispatch: Option<&mut dyn FnMut(Transaction)>,
    build: impl FnOnce(&mut Transaction) -> Result<()>,
) -> bool {
    let mut tr = state.tr();
    if let Err(err) = build(&mut tr) {
        warn!(%err, "command failed");
        return false;
    }
    if let Some(dispatch) = dispatch {
        dispatch(tr);
    }
    true
}

pub fn delete_selection() -> Command {
    Rc::new(|state: &EditorState, dispatch: Option<&mut dyn FnMut(Transaction)>| {
        if state.selection().empty() {
            return false;
        }
        run(state, dispatch, |tr| tr.delete_selection().map(|_| ()))
    })
}

/// Replace the selection, then split the textblock at the cursor
pub fn split_block() -> Command {
    Rc::new(|state: &EditorState, dispatch: Option<&mut dyn FnMut(Transaction)>| {
        let Ok(from) = state.doc().resolve(state.selection().from()) else {
            return false;
        };
        if !from.parent().is_textblock() {
            return false;
        }
        run(state, dispatch, |tr| {
            tr.delete_selection()?;
            let pos = tr.selection().from();
            tr.split_block(pos)?;
            Ok(())
        })
    })
}

/// Replace the selection with a `hard_break` node
pub fn insert_hard_break() -> Command {
    Rc::new(|state: &EditorState, dispatch: Option<&mut dyn FnMut(Transaction)>| {
        let Ok(br) = state.schema().node("hard_break", Attrs::new(), Vec::new()) else {
            return false;
        };
        run(state, dispatch, |tr| {
            tr.delete_selection()?;
            let pos = tr.selection().from();
            tr.insert(pos, br)?;
            Ok(())
        })
    })
}

/// Toggle a mark over the selection, or in the stored marks for an empty
/// selection
pub fn toggle_mark(name: &str) -> Command {
    let name: String = name.to_string();
    Rc::new(move |state: &EditorState, dispatch: Option<&mut dyn FnMut(Transaction)>| {
        let Ok(mark) = state.schema().mark(&name, Attrs::new()) else {
            return false;
        };
        let selection = state.selection();
        run(state, dispatch, |tr| {
            if selection.empty() {
                let current = match state.stored_marks() {
                    Some(stored) => stored.clone(),
                    None => state.doc().resolve(selection.from())?.marks(),
                };
                let toggled = if current.iter().any(|m| m.type_name() == mark.type_name()) {
                    current
                        .iter()
                        .filter(|m| m.type_name() != mark.type_name())
                        .cloned()
                        .collect()
                } else {
                    mark.add_to_set(&current)
                };
                tr.set_stored_marks(Some(toggled));
            } else {
                let (from, to) = (selection.from(), selection.to());
                let present = state
                    .doc()
                    .marks_between(from, to)
                    .iter()
                    .any(|m| m.type_name() == mark.type_name());
                if present {
                    tr.remove_mark(from, to, &mark)?;
                } else {
                    tr.add_mark(from, to, &mark)?;
                }
            }
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MarkSpec, NodeSpec, Schema};
    use crate::selection::Selection;
    use crate::mark::MarkSet;

    fn state(text: &str) -> EditorState {
        let schema = Schema::builder()
            .node("doc", NodeSpec::block())
            .node("paragraph", NodeSpec::textblock())
            .node("hard_break", NodeSpec::inline_leaf())
            .node("text", NodeSpec::text())
            .mark("em", MarkSpec::new())
            .build();
        let text = schema.text(text, MarkSet::new()).unwrap();
        let para = schema.node("paragraph", Attrs::new(), vec![text]).unwrap();
        let doc = schema.node("doc", Attrs::new(), vec![para]).unwrap();
        EditorState::new(schema, doc)
    }

    fn apply(state: &EditorState, command: &Command) -> Option<EditorState> {
        let mut result = None;
        let sink: &mut dyn FnMut(Transaction) = &mut |tr| result = Some(state.apply(tr));
        let applied = command(state, Some(sink));
        assert_eq!(applied, result.is_some());
        result
    }

    #[test]
    fn test_delete_selection_needs_range() {
        let state = state("abc");
        assert!(!delete_selection()(&state, None));
        let state = state.with_selection(Selection::text(1, 3));
        let next = apply(&state, &delete_selection()).unwrap();
        assert_eq!(next.doc().text_content(), "c");
    }

    #[test]
    fn test_hard_break_inserted_at_cursor() {
        let state = state("ab").with_selection(Selection::cursor(3));
        let next = apply(&state, &insert_hard_break()).unwrap();
        let para = next.doc().child(0).unwrap();
        assert_eq!(para.child(1).unwrap().type_name(), "hard_break");
        assert_eq!(next.selection(), Selection::cursor(4));
    }

    #[test]
    fn test_toggle_mark_on_range_and_back() {
        let state = state("abc").with_selection(Selection::text(1, 3));
        let marked = apply(&state, &toggle_mark("em")).unwrap();
        assert_eq!(marked.doc().child(0).unwrap().child_count(), 2);
        let unmarked = apply(&marked, &toggle_mark("em")).unwrap();
        assert_eq!(unmarked.doc().child(0).unwrap().child_count(), 1);
    }

    #[test]
    fn test_toggle_mark_on_cursor_stores_it() {
        let state = state("abc");
        let next = apply(&state, &toggle_mark("em")).unwrap();
        assert_eq!(next.stored_marks().map(|m| m.len()), Some(1));
    }
}
