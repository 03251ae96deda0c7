use crate::error::{ModelError, Result};
use crate::mark::{Mark, MarkSet};
use crate::node::Node;

#[derive(Debug, Clone)]
struct PathEntry {
    node: Node,
    index: usize,
    offset: usize,
}

/// A document position resolved against the tree: the chain of ancestors
/// containing it, with child indices and offsets at every depth.
#[derive(Debug, Clone)]
pub struct ResolvedPos {
    pos: usize,
    path: Vec<PathEntry>,
    parent_offset: usize,
}

impl ResolvedPos {
    pub fn resolve(doc: &Node, pos: usize) -> Result<Self> {
        if pos > doc.content_size() {
            return Err(ModelError::PositionOutOfRange {
                pos,
                size: doc.content_size(),
            });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();
        loop {
            let (index, offset) = node.find_index(parent_offset)?;
            let rem = parent_offset - offset;
            path.push(PathEntry {
                node: node.clone(),
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            let Some(child) = node.child(index).cloned() else {
                break;
            };
            if child.is_text() {
                break;
            }
            parent_offset = rem - 1;
            start += offset + 1;
            node = child;
        }
        Ok(Self {
            pos,
            path,
            parent_offset,
        })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// Offset of the position inside its parent's content
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth.min(self.depth())].node
    }

    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    pub fn doc(&self) -> &Node {
        self.node(0)
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth.min(self.depth())].index
    }

    /// Index of the child after the position in its parent
    pub fn index_after(&self) -> usize {
        let index = self.index(self.depth());
        if self.text_offset() > 0 { index + 1 } else { index }
    }

    /// Absolute position where the content of the ancestor at `depth` starts
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position directly before the ancestor at `depth` (depth ≥ 1)
    pub fn before(&self, depth: usize) -> Option<usize> {
        (depth > 0).then(|| self.path[depth - 1].offset)
    }

    pub fn after(&self, depth: usize) -> Option<usize> {
        self.before(depth)
            .map(|before| before + self.node(depth).node_size())
    }

    /// Distance into the text node the position points into, 0 on a boundary
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth()].offset
    }

    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let child = parent.child(index)?;
        let offset = self.text_offset();
        if offset > 0 {
            Some(child.cut_text(offset, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    pub fn node_before(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let offset = self.text_offset();
        if offset > 0 {
            return parent.child(index).map(|child| child.cut_text(0, offset));
        }
        index.checked_sub(1).and_then(|i| parent.child(i)).cloned()
    }

    /// Marks that text inserted at this position would get. Inside a text
    /// node these are its marks; on a boundary the marks of the node before
    /// (or after, at the start of the parent) minus non-inclusive marks the
    /// other side does not share.
    pub fn marks(&self) -> MarkSet {
        let parent = self.parent();
        let index = self.index(self.depth());
        if parent.content_size() == 0 {
            return MarkSet::new();
        }
        if self.text_offset() > 0 {
            return parent
                .child(index)
                .map(|child| child.marks().iter().cloned().collect())
                .unwrap_or_default();
        }
        let mut main = index.checked_sub(1).and_then(|i| parent.child(i));
        let mut other = parent.child(index);
        if main.is_none() {
            std::mem::swap(&mut main, &mut other);
        }
        let Some(main) = main else {
            return MarkSet::new();
        };
        strip_exclusive(main.marks(), other)
    }

    /// Marks of the inline content after this position, minus non-inclusive
    /// marks missing after `end`. `None` when no inline node follows.
    pub fn marks_across(&self, end: &ResolvedPos) -> Option<MarkSet> {
        let after = self.parent().child(self.index(self.depth()))?;
        if !after.is_inline() {
            return None;
        }
        let next = end.parent().child(end.index(end.depth()));
        Some(strip_exclusive(after.marks(), next))
    }

    /// Deepest depth whose node contains both this position and `pos`
    pub fn shared_depth(&self, pos: usize) -> usize {
        (1..=self.depth())
            .rev()
            .find(|&depth| self.start(depth) <= pos && self.end(depth) >= pos)
            .unwrap_or(0)
    }
}

fn strip_exclusive(marks: &[Mark], other: Option<&Node>) -> MarkSet {
    marks
        .iter()
        .filter(|mark| {
            mark.mark_type().inclusive() || other.is_some_and(|o| mark.is_in_set(o.marks()))
        })
        .cloned()
        .collect()
}
