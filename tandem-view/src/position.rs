use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug)]
struct Slot {
    pos: Cell<usize>,
    live: Cell<bool>,
}

/// Handle reporting the current document position of a rendered node.
///
/// Each descriptor owns one; the reconciler refreshes it on every commit and
/// invalidates it when the descriptor is destroyed, after which `get`
/// returns `None`. Clones share the same slot, so handles given to custom
/// views go stale together with their descriptor.
#[derive(Debug, Clone)]
pub struct GetPos(Rc<Slot>);

impl GetPos {
    pub fn new(pos: usize) -> Self {
        Self(Rc::new(Slot {
            pos: Cell::new(pos),
            live: Cell::new(true),
        }))
    }

    pub fn get(&self) -> Option<usize> {
        self.0.live.get().then(|| self.0.pos.get())
    }

    pub fn is_live(&self) -> bool {
        self.0.live.get()
    }

    pub(crate) fn set(&self, pos: usize) {
        self.0.pos.set(pos);
    }

    pub(crate) fn invalidate(&self) {
        self.0.live.set(false);
    }

    pub fn ptr_eq(&self, other: &GetPos) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
