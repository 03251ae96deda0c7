use crate::error::{ModelError, Result};
use crate::mapping::Mapping;
use crate::node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Text range; `anchor` stays put while `head` moves
    Text { anchor: usize, head: usize },
    /// A single selected node spanning `from..to`
    Node { from: usize, to: usize },
}

impl Selection {
    pub fn cursor(pos: usize) -> Self {
        Selection::Text {
            anchor: pos,
            head: pos,
        }
    }

    pub fn text(anchor: usize, head: usize) -> Self {
        Selection::Text { anchor, head }
    }

    /// Select the node starting at `pos`
    pub fn node(doc: &Node, pos: usize) -> Result<Self> {
        let resolved = doc.resolve(pos)?;
        let node = resolved.node_after().ok_or(ModelError::NoNodeAt(pos))?;
        if node.is_text() {
            return Err(ModelError::NoNodeAt(pos));
        }
        Ok(Selection::Node {
            from: pos,
            to: pos + node.node_size(),
        })
    }

    pub fn from(&self) -> usize {
        match *self {
            Selection::Text { anchor, head } => anchor.min(head),
            Selection::Node { from, .. } => from,
        }
    }

    pub fn to(&self) -> usize {
        match *self {
            Selection::Text { anchor, head } => anchor.max(head),
            Selection::Node { to, .. } => to,
        }
    }

    pub fn head(&self) -> usize {
        match *self {
            Selection::Text { head, .. } => head,
            Selection::Node { to, .. } => to,
        }
    }

    pub fn empty(&self) -> bool {
        self.from() == self.to()
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Selection::Node { .. })
    }

    pub fn map(&self, mapping: &Mapping) -> Selection {
        match *self {
            Selection::Text { anchor, head } => Selection::Text {
                anchor: mapping.map(anchor),
                head: mapping.map(head),
            },
            Selection::Node { from, to } => {
                let new_from = mapping.map_assoc(from, 1);
                let new_to = mapping.map_assoc(to, -1);
                if new_to <= new_from {
                    Selection::cursor(new_from)
                } else {
                    Selection::Node {
                        from: new_from,
                        to: new_to,
                    }
                }
            }
        }
    }
}
