//! # Decorations
//!
//! Annotations that change how a range renders without touching the
//! document. Positions are in the coordinates of the content they decorate:
//! a set attached to the document uses document positions, a set passed to
//! a child uses offsets into that child's content.

use crate::mapping::Mapping;
use crate::mark::MarkSet;
use crate::node::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smartstring::alias::String as SmartString;
use std::collections::BTreeMap;

/// Which side of a boundary a widget sticks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Before,
    #[default]
    After,
}

/// Attribute patch applied to a node's DOM, or to the wrapper of an inline
/// decoration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecorationAttrs {
    /// Wrap in an element of this name instead of patching in place
    pub node_name: Option<SmartString>,
    pub class: Option<SmartString>,
    pub style: Option<SmartString>,
    pub attrs: BTreeMap<SmartString, SmartString>,
}

impl DecorationAttrs {
    pub fn class(class: &str) -> Self {
        Self {
            class: Some(class.into()),
            ..Self::default()
        }
    }

    pub fn wrapper(node_name: &str) -> Self {
        Self {
            node_name: Some(node_name.into()),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSpec {
    /// DOM shape rendered for the widget
    pub shape: Value,
    pub side: Option<Side>,
    /// Marks to render the widget with; inherited from neighbours when unset
    pub marks: Option<MarkSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecorationKind {
    Node(DecorationAttrs),
    Inline(DecorationAttrs),
    Widget(WidgetSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoration {
    pub from: usize,
    pub to: usize,
    pub key: Option<SmartString>,
    pub kind: DecorationKind,
}

impl Decoration {
    /// Decorates the node spanning exactly `from..to`
    pub fn node(from: usize, to: usize, attrs: DecorationAttrs) -> Self {
        Self {
            from,
            to,
            key: None,
            kind: DecorationKind::Node(attrs),
        }
    }

    pub fn inline(from: usize, to: usize, attrs: DecorationAttrs) -> Self {
        Self {
            from,
            to,
            key: None,
            kind: DecorationKind::Inline(attrs),
        }
    }

    pub fn widget(pos: usize, shape: Value) -> Self {
        Self {
            from: pos,
            to: pos,
            key: None,
            kind: DecorationKind::Widget(WidgetSpec {
                shape,
                side: None,
                marks: None,
            }),
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        if let DecorationKind::Widget(spec) = &mut self.kind {
            spec.side = Some(side);
        }
        self
    }

    pub fn with_marks(mut self, marks: MarkSet) -> Self {
        if let DecorationKind::Widget(spec) = &mut self.kind {
            spec.marks = Some(marks);
        }
        self
    }

    pub fn is_widget(&self) -> bool {
        matches!(self.kind, DecorationKind::Widget(_))
    }

    pub fn widget_spec(&self) -> Option<&WidgetSpec> {
        match &self.kind {
            DecorationKind::Widget(spec) => Some(spec),
            _ => None,
        }
    }

    fn rebased(&self, from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            key: self.key.clone(),
            kind: self.kind.clone(),
        }
    }
}

/// Decorations ordered by start position; ties keep insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecorationSet {
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn new(mut decorations: Vec<Decoration>) -> Self {
        decorations.sort_by_key(|d| d.from);
        Self { decorations }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decorations.iter()
    }

    /// Decorations touching `from..to`
    pub fn find(&self, from: usize, to: usize) -> Vec<&Decoration> {
        self.decorations
            .iter()
            .filter(|d| d.from <= to && d.to >= from)
            .collect()
    }

    /// Decorations inside the content of `node`, which starts at `offset`,
    /// rebased to that content. Inline decorations are clipped to it.
    pub fn for_child(&self, offset: usize, node: &Node) -> DecorationSet {
        if node.is_text() || node.is_leaf() {
            return DecorationSet::empty();
        }
        let start = offset + 1;
        let end = start + node.content_size();
        let decorations = self
            .decorations
            .iter()
            .filter_map(|d| match d.kind {
                DecorationKind::Inline(_) if d.from < end && d.to > start => Some(
                    d.rebased(d.from.max(start) - start, d.to.min(end) - start),
                ),
                DecorationKind::Widget(_) if d.from >= start && d.from <= end => {
                    Some(d.rebased(d.from - start, d.to - start))
                }
                DecorationKind::Node(_) if d.from >= start && d.to <= end => {
                    Some(d.rebased(d.from - start, d.to - start))
                }
                _ => None,
            })
            .collect();
        DecorationSet { decorations }
    }

    pub fn add(&self, more: Vec<Decoration>) -> DecorationSet {
        let mut decorations = self.decorations.clone();
        decorations.extend(more);
        DecorationSet::new(decorations)
    }

    /// Map every decoration through document changes, dropping ranges that
    /// collapsed
    pub fn map(&self, mapping: &Mapping) -> DecorationSet {
        let decorations = self
            .decorations
            .iter()
            .filter_map(|d| match &d.kind {
                DecorationKind::Widget(spec) => {
                    let assoc = if spec.side == Some(Side::Before) { -1 } else { 1 };
                    let pos = mapping.map_assoc(d.from, assoc);
                    Some(d.rebased(pos, pos))
                }
                DecorationKind::Inline(_) => {
                    let from = mapping.map_assoc(d.from, 1);
                    let to = mapping.map_assoc(d.to, -1);
                    (from < to).then(|| d.rebased(from, to))
                }
                DecorationKind::Node(_) => {
                    let from = mapping.map_assoc(d.from, 1);
                    let to = mapping.map_assoc(d.to, -1);
                    (from < to).then(|| d.rebased(from, to))
                }
            })
            .collect();
        DecorationSet::new(decorations)
    }
}

impl FromIterator<Decoration> for DecorationSet {
    fn from_iter<I: IntoIterator<Item = Decoration>>(iter: I) -> Self {
        DecorationSet::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::StepMap;
    use serde_json::json;

    #[test]
    fn test_set_is_ordered_and_stable() {
        let set = DecorationSet::new(vec![
            Decoration::widget(4, json!("b")).with_key("b"),
            Decoration::inline(1, 3, DecorationAttrs::class("x")).with_key("x"),
            Decoration::widget(4, json!("c")).with_key("c"),
        ]);
        let keys: Vec<_> = set.iter().filter_map(|d| d.key.as_deref()).collect();
        assert_eq!(keys, vec!["x", "b", "c"]);
    }

    #[test]
    fn test_find_touching() {
        let set = DecorationSet::new(vec![
            Decoration::inline(1, 3, DecorationAttrs::class("x")),
            Decoration::widget(7, json!("w")),
        ]);
        assert_eq!(set.find(3, 5).len(), 1);
        assert_eq!(set.find(0, 10).len(), 2);
        assert!(set.find(4, 6).is_empty());
    }

    #[test]
    fn test_map_widget_side() {
        let set = DecorationSet::new(vec![
            Decoration::widget(2, json!("a")).with_side(Side::Before),
            Decoration::widget(2, json!("b")),
        ]);
        let mut mapping = Mapping::new();
        mapping.push(StepMap::new(2, 0, 3));
        let mapped = set.map(&mapping);
        let positions: Vec<_> = mapped.iter().map(|d| d.from).collect();
        assert_eq!(positions, vec![2, 5]);
    }

    #[test]
    fn test_side_deserializes_lowercase() {
        let side: Side = serde_json::from_value(json!("before")).unwrap();
        assert_eq!(side, Side::Before);
        assert_eq!(Side::default(), Side::After);
    }
}
