//! Key bindings from normalized key names to commands.

use smartstring::alias::String as SmartString;
use std::collections::HashMap;
use tandem_model::commands::{self, Command};
use tandem_model::{EditorState, Transaction};
use tracing::trace;

/// A key press with its modifiers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyEvent {
    pub key: SmartString,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyEvent {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Normalized binding name, e.g. `Shift-Enter` or `Mod-b`. Ctrl and
    /// Meta both count as `Mod`.
    pub fn name(&self) -> SmartString {
        let mut name = SmartString::new();
        if self.alt {
            name.push_str("Alt-");
        }
        if self.ctrl || self.meta {
            name.push_str("Mod-");
        }
        if self.shift {
            name.push_str("Shift-");
        }
        name.push_str(&self.key);
        name
    }
}

#[derive(Clone, Default)]
pub struct Keymap {
    bindings: HashMap<SmartString, Command>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter splits the block, Shift-Enter inserts a hard break, Mod-b and
    /// Mod-i toggle strong and em
    pub fn base() -> Self {
        Self::new()
            .bind("Enter", commands::split_block())
            .bind("Shift-Enter", commands::insert_hard_break())
            .bind("Mod-b", commands::toggle_mark("strong"))
            .bind("Mod-i", commands::toggle_mark("em"))
    }

    pub fn bind(mut self, name: &str, command: Command) -> Self {
        self.bindings.insert(name.into(), command);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.bindings.get(name)
    }

    /// Run the command bound to `key`, if any
    pub fn handle(
        &self,
        key: &KeyEvent,
        state: &EditorState,
        dispatch: Option<&mut dyn FnMut(Transaction)>,
    ) -> bool {
        let name = key.name();
        let Some(command) = self.bindings.get(&name) else {
            return false;
        };
        trace!(key = %name, "running key binding");
        command(state, dispatch)
    }
}
