//! # Descriptor tree
//!
//! Registry of live view descriptors. Each descriptor records one rendered
//! presence (a document node, a text run, a mark wrapper or a widget), the
//! DOM it owns, and the behaviour overrides registered for it.
//!
//! Descriptors form a tree isomorphic to the rendered document: node
//! descriptors hold the descriptors of their content, mark descriptors hold
//! the content they wrap. The tree also indexes DOM nodes back to the
//! descriptor that owns them, which is how DOM events, mutations and
//! positions find their way back into the document.

use crate::custom_view::CustomViewAdapter;
use crate::dom::{DomId, DomMutation, DomTree};
use crate::error::{Result, ViewError};
use crate::events::EditorEvent;
use crate::output_spec::ContentSlot;
use crate::position::GetPos;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tandem_model::node::slice_chars;
use tandem_model::{Decoration, DecorationSet, Mark, MarkSet, Node};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescId(pub(crate) u32);

impl fmt::Display for DescId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescKind {
    Node,
    Text,
    Mark,
    Widget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    CharacterData,
    Attributes,
    /// DOM selection moved; never a content change
    Selection,
}

/// A DOM change observed in the editor, as seen by ignore-mutation hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: DomId,
    pub kind: MutationKind,
}

impl From<&DomMutation> for MutationRecord {
    fn from(mutation: &DomMutation) -> Self {
        let kind = match mutation {
            DomMutation::Insert { .. } | DomMutation::Remove { .. } => MutationKind::ChildList,
            DomMutation::SetText { .. } => MutationKind::CharacterData,
            DomMutation::SetAttribute { .. } | DomMutation::RemoveAttribute { .. } => {
                MutationKind::Attributes
            }
        };
        Self {
            target: mutation.target(),
            kind,
        }
    }
}

/// Answers `Some(decision)` or `None` to defer to the next descriptor
pub type StopEventFn = Rc<dyn Fn(&EditorEvent) -> Option<bool>>;
pub type IgnoreMutationFn = Rc<dyn Fn(&MutationRecord) -> Option<bool>>;
pub type SelectionHookFn = Rc<dyn Fn(&mut DomTree)>;

/// Per-descriptor behaviour overrides
#[derive(Clone, Default)]
pub struct Overrides {
    pub stop_event: Option<StopEventFn>,
    pub ignore_mutation: Option<IgnoreMutationFn>,
    pub select_node: Option<SelectionHookFn>,
    pub deselect_node: Option<SelectionHookFn>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.stop_event.is_none()
            && self.ignore_mutation.is_none()
            && self.select_node.is_none()
            && self.deselect_node.is_none()
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overrides")
            .field("stop_event", &self.stop_event.is_some())
            .field("ignore_mutation", &self.ignore_mutation.is_some())
            .field("select_node", &self.select_node.is_some())
            .field("deselect_node", &self.deselect_node.is_some())
            .finish()
    }
}

pub struct ViewDesc {
    pub(crate) kind: DescKind,
    pub(crate) node: Option<Node>,
    pub(crate) text: Option<String>,
    pub(crate) mark: Option<Mark>,
    pub(crate) widget: Option<Decoration>,
    /// Marks of a text run or widget
    pub(crate) marks: MarkSet,
    /// Outermost owned DOM, decoration wrappers included
    pub(crate) dom: DomId,
    /// DOM produced for the node, mark or text itself
    pub(crate) node_dom: DomId,
    /// Decoration wrappers between `dom` and `node_dom`, outermost first
    pub(crate) wrappers: SmallVec<[DomId; 2]>,
    pub(crate) content: Option<ContentSlot>,
    pub(crate) get_pos: GetPos,
    pub(crate) parent: Option<DescId>,
    pub(crate) children: Vec<DescId>,
    pub(crate) outer: Vec<Decoration>,
    pub(crate) inner: DecorationSet,
    /// Shape the node DOM was rendered from
    pub(crate) shape: Option<Value>,
    pub(crate) overrides: Overrides,
    pub(crate) custom: Option<CustomViewAdapter>,
    pub(crate) selected: bool,
    pub(crate) size: usize,
}

impl ViewDesc {
    pub(crate) fn new(kind: DescKind, dom: DomId, get_pos: GetPos) -> Self {
        Self {
            kind,
            node: None,
            text: None,
            mark: None,
            widget: None,
            marks: MarkSet::new(),
            dom,
            node_dom: dom,
            wrappers: SmallVec::new(),
            content: None,
            get_pos,
            parent: None,
            children: Vec::new(),
            outer: Vec::new(),
            inner: DecorationSet::empty(),
            shape: None,
            overrides: Overrides::default(),
            custom: None,
            selected: false,
            size: 0,
        }
    }

    pub fn kind(&self) -> DescKind {
        self.kind
    }

    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn mark(&self) -> Option<&Mark> {
        self.mark.as_ref()
    }

    pub fn widget(&self) -> Option<&Decoration> {
        self.widget.as_ref()
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn dom(&self) -> DomId {
        self.dom
    }

    pub fn node_dom(&self) -> DomId {
        self.node_dom
    }

    pub fn content(&self) -> Option<ContentSlot> {
        self.content
    }

    pub fn get_pos(&self) -> &GetPos {
        &self.get_pos
    }

    pub fn parent(&self) -> Option<DescId> {
        self.parent
    }

    pub fn children(&self) -> &[DescId] {
        &self.children
    }

    pub fn outer_decorations(&self) -> &[Decoration] {
        &self.outer
    }

    pub fn inner_decorations(&self) -> &DecorationSet {
        &self.inner
    }

    pub fn custom_view(&self) -> Option<&CustomViewAdapter> {
        self.custom.as_ref()
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Document positions covered
    pub fn size(&self) -> usize {
        self.size
    }

    /// Node boundary tokens around the content: 1 for nodes, 0 otherwise
    pub fn border(&self) -> usize {
        usize::from(self.kind == DescKind::Node)
    }
}

impl fmt::Debug for ViewDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewDesc")
            .field("kind", &self.kind)
            .field("node", &self.node.as_ref().map(|n| n.type_name().to_string()))
            .field("text", &self.text)
            .field("dom", &self.dom)
            .field("pos", &self.get_pos.get())
            .field("size", &self.size)
            .field("children", &self.children)
            .finish()
    }
}

pub struct DescriptorTree {
    descs: Vec<Option<ViewDesc>>,
    free_list: Vec<u32>,
    dom_index: HashMap<DomId, DescId>,
    root: Option<DescId>,
    selected_class: String,
}

impl DescriptorTree {
    pub fn new(selected_class: &str) -> Self {
        Self {
            descs: Vec::new(),
            free_list: Vec::new(),
            dom_index: HashMap::new(),
            root: None,
            selected_class: selected_class.to_string(),
        }
    }

    /// Add a descriptor under `parent` (the root when `None`). The parent's
    /// child list is set by the render pass once all siblings exist.
    pub fn register(&mut self, parent: Option<DescId>, mut desc: ViewDesc) -> DescId {
        desc.parent = parent;
        let (dom, node_dom) = (desc.dom, desc.node_dom);
        let index = if let Some(idx) = self.free_list.pop() {
            idx as usize
        } else {
            self.descs.len()
        };
        if index >= self.descs.len() {
            self.descs.push(Some(desc));
        } else {
            self.descs[index] = Some(desc);
        }
        let id = DescId(index as u32);
        self.dom_index.insert(dom, id);
        self.dom_index.insert(node_dom, id);
        if parent.is_none() {
            self.root = Some(id);
        }
        trace!(desc = %id, ?parent, "registered descriptor");
        id
    }

    /// Replace the behaviour overrides of `id`
    pub fn register_hooks(&mut self, id: DescId, overrides: Overrides) -> Result<()> {
        self.get_mut(id)?.overrides = overrides;
        Ok(())
    }

    pub fn root(&self) -> Option<DescId> {
        self.root
    }

    pub fn get(&self, id: DescId) -> Result<&ViewDesc> {
        self.descs
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(ViewError::UnknownDescriptor(id.0))
    }

    pub fn get_mut(&mut self, id: DescId) -> Result<&mut ViewDesc> {
        self.descs
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(ViewError::UnknownDescriptor(id.0))
    }

    pub fn contains(&self, id: DescId) -> bool {
        self.get(id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.descs.iter().filter(|d| d.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn set_children(&mut self, id: DescId, children: Vec<DescId>) -> Result<()> {
        for child in &children {
            self.get_mut(*child)?.parent = Some(id);
        }
        self.get_mut(id)?.children = children;
        Ok(())
    }

    /// Point the index at a descriptor's new outer DOM
    pub(crate) fn set_dom(&mut self, id: DescId, dom: DomId) -> Result<()> {
        let desc = self.get_mut(id)?;
        let old = std::mem::replace(&mut desc.dom, dom);
        let node_dom = desc.node_dom;
        if old != node_dom && self.dom_index.get(&old) == Some(&id) {
            self.dom_index.remove(&old);
        }
        self.dom_index.insert(dom, id);
        Ok(())
    }

    pub(crate) fn set_node_dom(&mut self, id: DescId, node_dom: DomId) -> Result<()> {
        let desc = self.get_mut(id)?;
        let old = std::mem::replace(&mut desc.node_dom, node_dom);
        let outer = desc.dom;
        if old != outer && self.dom_index.get(&old) == Some(&id) {
            self.dom_index.remove(&old);
        }
        self.dom_index.insert(node_dom, id);
        Ok(())
    }

    /// Descriptor that registered exactly this DOM node
    pub fn desc_for_dom(&self, dom: DomId) -> Option<DescId> {
        self.dom_index.get(&dom).copied()
    }

    /// Innermost descriptor owning `node`, found by walking DOM parents
    pub fn nearest_desc(&self, dom: &DomTree, node: DomId) -> Option<DescId> {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if let Some(desc) = self.dom_index.get(&id) {
                return Some(*desc);
            }
            cur = dom.parent(id);
        }
        None
    }

    /// Content element of the innermost descriptor whose content holds
    /// `node`. Decoration wrappers and text nodes are skipped over.
    pub fn content_element(&self, dom: &DomTree, node: DomId) -> Option<DomId> {
        let mut cur = self.nearest_desc(dom, node);
        while let Some(id) = cur {
            let desc = self.get(id).ok()?;
            match desc.content {
                Some(slot) if dom.contains(slot.element, node) => return Some(slot.element),
                _ => {}
            }
            cur = desc.parent;
        }
        None
    }

    /// Descriptors from the root down to `id`
    pub fn path(&self, id: DescId) -> Vec<DescId> {
        let mut path = Vec::new();
        let mut cur = Some(id);
        while let Some(desc) = cur {
            path.push(desc);
            cur = self.get(desc).ok().and_then(|d| d.parent);
        }
        path.reverse();
        path
    }

    /// Position where the content of `id` starts
    pub fn content_start(&self, id: DescId) -> Result<usize> {
        let desc = self.get(id)?;
        let pos = desc.get_pos.get().ok_or(ViewError::UnknownDescriptor(id.0))?;
        Ok(if desc.parent.is_some() {
            pos + desc.border()
        } else {
            0
        })
    }

    /// Innermost node descriptor whose node starts at `pos`
    pub fn desc_at_pos(&self, pos: usize) -> Option<DescId> {
        let root = self.root?;
        let mut found = None;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Ok(desc) = self.get(id) else {
                continue;
            };
            let Some(start) = desc.get_pos.get() else {
                continue;
            };
            if desc.kind == DescKind::Node && desc.parent.is_some() && start == pos {
                found = Some(id);
            }
            let inside = desc.parent.is_none() || (start <= pos && pos <= start + desc.size);
            if inside {
                stack.extend(desc.children.iter().rev());
            }
        }
        found
    }

    /// Whether the node view under `target` handles `event` itself. The
    /// first descriptor on the path from the root with an opinion decides.
    pub fn stop_event(&self, dom: &DomTree, target: DomId, event: &EditorEvent) -> bool {
        let Some(desc) = self.nearest_desc(dom, target) else {
            return false;
        };
        for id in self.path(desc) {
            let hook = self.get(id).ok().and_then(|d| d.overrides.stop_event.clone());
            if let Some(decision) = hook.and_then(|hook| hook(event)) {
                return decision;
            }
        }
        false
    }

    /// Whether a DOM mutation can be ignored by the editor. Without an
    /// override, mutations inside widgets and inside custom views without a
    /// content container are ignored.
    pub fn ignore_mutation(&self, dom: &DomTree, record: &MutationRecord) -> bool {
        let Some(desc) = self.nearest_desc(dom, record.target) else {
            return false;
        };
        let path = self.path(desc);
        for id in &path {
            let hook = self
                .get(*id)
                .ok()
                .and_then(|d| d.overrides.ignore_mutation.clone());
            if let Some(decision) = hook.and_then(|hook| hook(record)) {
                return decision;
            }
        }
        path.iter().filter_map(|id| self.get(*id).ok()).any(|d| {
            d.kind == DescKind::Widget
                || (record.kind != MutationKind::Selection
                    && d.custom.as_ref().is_some_and(|c| {
                        c.content_dom().is_none_or(|content| !dom.contains(content, record.target))
                    }))
        })
    }

    /// Mark a node descriptor selected, through its select hook or by
    /// adding the selected class to its DOM
    pub fn select_node(&mut self, dom: &mut DomTree, id: DescId) -> Result<()> {
        let desc = self.get_mut(id)?;
        desc.selected = true;
        let node_dom = desc.node_dom;
        match desc.overrides.select_node.clone() {
            Some(hook) => hook(dom),
            None => dom.add_class(node_dom, &self.selected_class),
        }
        Ok(())
    }

    pub fn deselect_node(&mut self, dom: &mut DomTree, id: DescId) -> Result<()> {
        let desc = self.get_mut(id)?;
        desc.selected = false;
        let node_dom = desc.node_dom;
        match desc.overrides.deselect_node.clone() {
            Some(hook) => hook(dom),
            None => dom.remove_class(node_dom, &self.selected_class),
        }
        Ok(())
    }

    /// Destroy `id` and its subtree: descendants first, position handles
    /// invalidated, custom views destroyed, DOM freed. The root keeps its
    /// mount element.
    pub fn destroy(&mut self, dom: &mut DomTree, id: DescId) -> Result<()> {
        let children = self.get(id)?.children.clone();
        for child in children {
            self.destroy(dom, child)?;
        }

        let idx = id.0 as usize;
        let Some(mut desc) = self.descs.get_mut(idx).and_then(Option::take) else {
            return Err(ViewError::UnknownDescriptor(id.0));
        };
        self.free_list.push(id.0);
        desc.get_pos.invalidate();
        if let Some(adapter) = desc.custom.as_mut() {
            if let Err(err) = adapter.destroy(dom) {
                warn!(desc = %id, %err, "custom view already destroyed");
            }
        }
        for key in [desc.dom, desc.node_dom] {
            if self.dom_index.get(&key) == Some(&id) {
                self.dom_index.remove(&key);
            }
        }
        if let Some(parent) = desc.parent {
            if let Ok(parent) = self.get_mut(parent) {
                parent.children.retain(|c| *c != id);
            }
        }
        if self.root == Some(id) {
            self.root = None;
            if let Some(slot) = desc.content {
                let managed: Vec<DomId> = dom
                    .children(slot.element)
                    .get(slot.offset..)
                    .unwrap_or_default()
                    .to_vec();
                for child in managed {
                    dom.dispose(child);
                }
            }
        } else {
            dom.dispose(desc.node_dom);
            dom.dispose(desc.dom);
        }
        debug!(desc = %id, kind = ?desc.kind, "destroyed descriptor");
        Ok(())
    }

    /// Verify that the descriptor tree mirrors `doc`
    pub fn check_against(&self, doc: &Node) -> Result<()> {
        let root = self
            .root
            .ok_or_else(|| ViewError::TreeMismatch("no root descriptor".to_string()))?;
        let desc = self.get(root)?;
        match &desc.node {
            Some(node) if node.ptr_eq(doc) || node == doc => self.check_content(root, doc),
            _ => Err(ViewError::TreeMismatch(
                "root descriptor does not hold the document".to_string(),
            )),
        }
    }

    fn check_content(&self, id: DescId, node: &Node) -> Result<()> {
        let mut leaves = Vec::new();
        self.flatten(id, &mut leaves)?;
        let mut offset = 0;
        for leaf in leaves {
            let desc = self.get(leaf)?;
            match desc.kind {
                DescKind::Widget => continue,
                DescKind::Node => {
                    let (index, start) = node.find_index(offset)?;
                    let child = node.child(index);
                    let matches = start == offset
                        && child
                            .zip(desc.node.as_ref())
                            .is_some_and(|(c, n)| c.ptr_eq(n) || c == n);
                    if !matches {
                        return Err(ViewError::TreeMismatch(format!(
                            "descriptor {leaf} does not match the node at {offset} in {}",
                            node.type_name()
                        )));
                    }
                    if let Some(child) = child {
                        let has_content = match &desc.custom {
                            Some(adapter) => adapter.content_dom().is_some(),
                            None => desc.content.is_some(),
                        };
                        if has_content && !child.is_leaf() {
                            self.check_content(leaf, child)?;
                        }
                    }
                }
                DescKind::Text => {
                    let (index, start) = node.find_index(offset)?;
                    let (child, local) = match node.child(index) {
                        Some(child) if start <= offset => (child, offset - start),
                        _ => {
                            return Err(ViewError::TreeMismatch(format!(
                                "text descriptor {leaf} past the end of {}",
                                node.type_name()
                            )));
                        }
                    };
                    let text = desc.text.as_deref().unwrap_or_default();
                    let expected = slice_chars(
                        child.text().unwrap_or_default(),
                        local,
                        local + desc.size,
                    );
                    if !child.is_text() || expected != text {
                        return Err(ViewError::TreeMismatch(format!(
                            "text descriptor {leaf} holds {text:?}, document has {expected:?}"
                        )));
                    }
                }
                DescKind::Mark => {
                    return Err(ViewError::TreeMismatch(format!(
                        "mark descriptor {leaf} left in flattened content"
                    )));
                }
            }
            offset += desc.size;
        }
        if offset != node.content_size() {
            return Err(ViewError::TreeMismatch(format!(
                "descriptors cover {offset} of {} positions in {}",
                node.content_size(),
                node.type_name()
            )));
        }
        Ok(())
    }

    /// Children of `id` with mark wrappers replaced by their content
    fn flatten(&self, id: DescId, out: &mut Vec<DescId>) -> Result<()> {
        for child in &self.get(id)?.children {
            if self.get(*child)?.kind == DescKind::Mark {
                self.flatten(*child, out)?;
            } else {
                out.push(*child);
            }
        }
        Ok(())
    }
}

impl Default for DescriptorTree {
    fn default() -> Self {
        Self::new("node-selected")
    }
}
