use crate::schema::{Attrs, MarkType};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;

/// Ordered set of marks, sorted by mark type rank
pub type MarkSet = SmallVec<[Mark; 4]>;

/// A range-spanning annotation on inline content (emphasis, links, ...)
#[derive(Clone)]
pub struct Mark {
    ty: Rc<MarkType>,
    attrs: Attrs,
}

impl Mark {
    pub(crate) fn new(ty: Rc<MarkType>, attrs: Attrs) -> Self {
        Self { ty, attrs }
    }

    pub fn mark_type(&self) -> &Rc<MarkType> {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.iter().any(|m| m == self)
    }

    /// Add this mark to `set`, replacing any mark of the same type and
    /// keeping rank order
    pub fn add_to_set(&self, set: &[Mark]) -> MarkSet {
        let mut out = MarkSet::new();
        let mut placed = false;
        for mark in set {
            if mark.type_name() == self.type_name() {
                continue;
            }
            if !placed && mark.ty.rank() > self.ty.rank() {
                out.push(self.clone());
                placed = true;
            }
            out.push(mark.clone());
        }
        if !placed {
            out.push(self.clone());
        }
        out
    }

    pub fn remove_from_set(&self, set: &[Mark]) -> MarkSet {
        set.iter().filter(|m| *m != self).cloned().collect()
    }

    /// DOM shape for this mark, if its type defines one
    pub fn to_dom(&self, inline: bool) -> Option<Value> {
        self.ty.to_dom().map(|f| f(self, inline))
    }
}

impl PartialEq for Mark {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name() && self.attrs == other.attrs
    }
}

impl Eq for Mark {}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attrs.is_empty() {
            write!(f, "{}", self.type_name())
        } else {
            write!(f, "{}{:?}", self.type_name(), self.attrs)
        }
    }
}

pub fn same_set(a: &[Mark], b: &[Mark]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

/// Every mark present in either set, rank ordered
pub fn union(a: &[Mark], b: &[Mark]) -> MarkSet {
    let mut out: MarkSet = a.iter().cloned().collect();
    for mark in b {
        if !mark.is_in_set(&out) {
            out = mark.add_to_set(&out);
        }
    }
    out
}
