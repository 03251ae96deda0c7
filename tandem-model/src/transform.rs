use crate::error::{ModelError, Result};
use crate::mapping::{Mapping, StepMap};
use crate::mark::{self, Mark, MarkSet};
use crate::node::{self, Node};
use crate::resolve::ResolvedPos;
use crate::schema::{Attrs, Schema};
use crate::selection::Selection;
use crate::state::EditorState;
use serde_json::Value;
use smartstring::alias::String as SmartString;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// A batch of document changes plus selection and stored-mark updates,
/// built against one state and applied with [`EditorState::apply`].
///
/// Every editing method returns `Result<&mut Self>` so calls chain with `?`.
#[derive(Debug, Clone)]
pub struct Transaction {
    schema: Rc<Schema>,
    before: Node,
    doc: Node,
    selection: Selection,
    stored_marks: Option<MarkSet>,
    mapping: Mapping,
    meta: BTreeMap<SmartString, Value>,
}

impl Transaction {
    pub fn new(state: &EditorState) -> Self {
        Self {
            schema: state.schema().clone(),
            before: state.doc().clone(),
            doc: state.doc().clone(),
            selection: state.selection(),
            stored_marks: state.stored_marks().cloned(),
            mapping: Mapping::new(),
            meta: BTreeMap::new(),
        }
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    /// Document the transaction started from
    pub fn doc_before(&self) -> &Node {
        &self.before
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn stored_marks(&self) -> Option<&MarkSet> {
        self.stored_marks.as_ref()
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.mapping.is_empty()
    }

    pub fn set_meta(&mut self, key: &str, value: Value) -> &mut Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn get_meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<&mut Self> {
        let size = self.doc.content_size();
        if selection.to() > size {
            return Err(ModelError::PositionOutOfRange {
                pos: selection.to(),
                size,
            });
        }
        self.selection = selection;
        self.stored_marks = None;
        Ok(self)
    }

    pub fn set_stored_marks(&mut self, marks: Option<MarkSet>) -> &mut Self {
        self.stored_marks = marks;
        self
    }

    /// Store `marks` unless they already equal the marks input would get
    pub fn ensure_marks(&mut self, marks: &[Mark]) -> Result<&mut Self> {
        let current = match &self.stored_marks {
            Some(stored) => stored.clone(),
            None => self.doc.resolve(self.selection.from())?.marks(),
        };
        if !mark::same_set(&current, marks) {
            self.stored_marks = Some(marks.iter().cloned().collect());
        }
        Ok(self)
    }

    /// Replace `from..to` with `text`. The text takes the stored marks, or
    /// the marks at `from` when nothing is stored. A non-empty selection is
    /// collapsed to its mapped end.
    pub fn insert_text(&mut self, text: &str, from: usize, to: usize) -> Result<&mut Self> {
        if text.is_empty() {
            return self.delete(from, to);
        }
        let marks = match &self.stored_marks {
            Some(marks) => marks.clone(),
            None => {
                let start = self.doc.resolve(from)?;
                if from == to {
                    start.marks()
                } else {
                    let end = self.doc.resolve(to)?;
                    start.marks_across(&end).unwrap_or_default()
                }
            }
        };
        let node = self.schema.text(text, marks)?;
        let was_empty = self.selection.empty();
        self.replace(from, to, vec![node])?;
        if !was_empty {
            self.selection = Selection::cursor(self.selection.to());
        }
        Ok(self)
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self> {
        if from == to {
            return Ok(self);
        }
        self.replace(from, to, Vec::new())
    }

    pub fn delete_selection(&mut self) -> Result<&mut Self> {
        let (from, to) = (self.selection.from(), self.selection.to());
        self.delete(from, to)
    }

    pub fn insert(&mut self, pos: usize, node: Node) -> Result<&mut Self> {
        self.replace(pos, pos, vec![node])
    }

    /// Split the textblock around `pos` in two. Splitting at the end of a
    /// block opens the schema's default textblock.
    pub fn split_block(&mut self, pos: usize) -> Result<&mut Self> {
        let resolved = self.doc.resolve(pos)?;
        let depth = resolved.depth();
        let parent = resolved.parent().clone();
        if !parent.is_textblock() || depth == 0 {
            return Err(ModelError::NotInTextblock(pos));
        }
        let offset = resolved.parent_offset();
        let left = parent.copy(node::cut_children(parent.children(), 0, offset)?);
        let right = if offset == parent.content_size() {
            let ty = self
                .schema
                .default_textblock()
                .ok_or(ModelError::NotInTextblock(pos))?;
            Node::new(ty.clone(), ty.compute_attrs(Attrs::new()), Vec::new(), MarkSet::new())
        } else {
            parent.copy(node::cut_children(
                parent.children(),
                offset,
                parent.content_size(),
            )?)
        };

        let grandparent = resolved.node(depth - 1);
        let index = resolved.index(depth - 1);
        let mut children = grandparent.children().to_vec();
        children.splice(index..=index, [left, right]);
        let doc = replace_at_depth(&resolved, depth - 1, grandparent.copy(children));
        self.add_step(doc, StepMap::new(pos, 0, 2));
        Ok(self)
    }

    pub fn add_mark(&mut self, from: usize, to: usize, mark: &Mark) -> Result<&mut Self> {
        self.map_marks(from, to, &|marks| mark.add_to_set(marks))
    }

    pub fn remove_mark(&mut self, from: usize, to: usize, mark: &Mark) -> Result<&mut Self> {
        self.map_marks(from, to, &|marks| mark.remove_from_set(marks))
    }

    fn map_marks(
        &mut self,
        from: usize,
        to: usize,
        f: &dyn Fn(&[Mark]) -> MarkSet,
    ) -> Result<&mut Self> {
        check_range(&self.doc, from, to)?;
        if from == to {
            return Ok(self);
        }
        let doc = rewrite_marks(&self.doc, from as isize, to as isize, f)?;
        self.add_step(doc, StepMap::identity());
        Ok(self)
    }

    /// Replace `from..to` with `content`. Supports edits within one parent
    /// and deletions joining two sibling textblocks.
    pub fn replace(&mut self, from: usize, to: usize, content: Vec<Node>) -> Result<&mut Self> {
        check_range(&self.doc, from, to)?;
        let start = self.doc.resolve(from)?;
        let end = self.doc.resolve(to)?;
        let new_size: usize = content.iter().map(Node::node_size).sum();

        let depth = start.depth();
        let doc = if depth == end.depth() && start.start(depth) == end.start(depth) {
            let parent = start.parent();
            if content
                .iter()
                .any(|n| n.is_inline() != parent.is_textblock())
            {
                return Err(ModelError::UnsupportedReplace { from, to });
            }
            let mut children = node::cut_children(parent.children(), 0, start.parent_offset())?;
            children.extend(content);
            children.extend(node::cut_children(
                parent.children(),
                end.parent_offset(),
                parent.content_size(),
            )?);
            if parent.is_textblock() {
                children = node::normalize_inline(children);
            }
            replace_at_depth(&start, depth, parent.copy(children))
        } else if content.is_empty() {
            self.join_textblocks(&start, &end)?
        } else {
            return Err(ModelError::UnsupportedReplace { from, to });
        };

        debug!(from, to, new_size, "replace");
        self.add_step(doc, StepMap::new(from, to - from, new_size));
        Ok(self)
    }

    /// Delete across the boundary of two textblocks sharing a parent,
    /// merging the tail of the second into the first.
    fn join_textblocks(&self, start: &ResolvedPos, end: &ResolvedPos) -> Result<Node> {
        let shared = start.shared_depth(end.pos());
        let (from, to) = (start.pos(), end.pos());
        if start.depth() != shared + 1
            || end.depth() != shared + 1
            || !start.parent().is_textblock()
            || !end.parent().is_textblock()
        {
            return Err(ModelError::UnsupportedReplace { from, to });
        }
        let first = start.parent();
        let last = end.parent();
        let mut children = node::cut_children(first.children(), 0, start.parent_offset())?;
        children.extend(node::cut_children(
            last.children(),
            end.parent_offset(),
            last.content_size(),
        )?);
        let joined = first.copy(node::normalize_inline(children));

        let container = start.node(shared);
        let mut siblings = container.children().to_vec();
        siblings.splice(start.index(shared)..=end.index(shared), [joined]);
        Ok(replace_at_depth(start, shared, container.copy(siblings)))
    }

    fn add_step(&mut self, doc: Node, map: StepMap) {
        self.doc = doc;
        self.mapping.push(map);
        let mut single = Mapping::new();
        single.push(map);
        self.selection = self.selection.map(&single);
        self.stored_marks = None;
    }

    pub(crate) fn into_parts(self) -> (Node, Selection, Option<MarkSet>) {
        (self.doc, self.selection, self.stored_marks)
    }
}

fn check_range(doc: &Node, from: usize, to: usize) -> Result<()> {
    if from > to {
        return Err(ModelError::InvertedRange { from, to });
    }
    if to > doc.content_size() {
        return Err(ModelError::PositionOutOfRange {
            pos: to,
            size: doc.content_size(),
        });
    }
    Ok(())
}

/// Rebuild the ancestors of `pos` from `depth` up, with `node` in place of
/// the ancestor at `depth`
fn replace_at_depth(pos: &ResolvedPos, depth: usize, node: Node) -> Node {
    (0..depth).rev().fold(node, |child, d| {
        let parent = pos.node(d);
        let mut children = parent.children().to_vec();
        children[pos.index(d)] = child;
        parent.copy(children)
    })
}

/// Apply `f` to the marks of inline content inside `from..to`, given in
/// the coordinates of `node`'s content
fn rewrite_marks(
    node: &Node,
    from: isize,
    to: isize,
    f: &dyn Fn(&[Mark]) -> MarkSet,
) -> Result<Node> {
    let mut children = Vec::with_capacity(node.child_count());
    for (offset, child) in node.child_offsets() {
        let start = offset as isize;
        let end = start + child.node_size() as isize;
        if end <= from || start >= to {
            children.push(child.clone());
        } else if child.is_text() {
            let cut_from = (from - start).max(0) as usize;
            let cut_to = (to.min(end) - start) as usize;
            let len = child.node_size();
            if cut_from > 0 {
                children.push(child.cut_text(0, cut_from));
            }
            let middle = child.cut_text(cut_from, cut_to);
            children.push(middle.with_marks(f(middle.marks())));
            if cut_to < len {
                children.push(child.cut_text(cut_to, len));
            }
        } else if child.is_inline() {
            children.push(child.with_marks(f(child.marks())));
        } else {
            children.push(rewrite_marks(child, from - start - 1, to - start - 1, f)?);
        }
    }
    if node.is_textblock() {
        children = node::normalize_inline(children);
    }
    Ok(node.copy(children))
}
