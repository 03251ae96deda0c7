//! # In-memory DOM
//!
//! Arena of element and text nodes shared by the reconciler, custom views
//! and composition handling. Nodes are addressed by [`DomId`]; a freed slot
//! is reused by the next created node.
//!
//! Every structural or content change is appended to a mutation log that
//! callers drain with [`DomTree::take_mutations`].

use smartstring::alias::String as SmartString;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomId(pub(crate) u32);

impl DomId {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element {
        tag: SmartString,
        namespace: Option<SmartString>,
        attrs: BTreeMap<SmartString, SmartString>,
        children: Vec<DomId>,
    },
    Text {
        text: String,
    },
}

/// One recorded change to the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomMutation {
    Insert { parent: DomId, child: DomId },
    Remove { parent: DomId, child: DomId },
    SetText { node: DomId },
    SetAttribute { node: DomId, name: SmartString },
    RemoveAttribute { node: DomId, name: SmartString },
}

impl DomMutation {
    /// The node whose children, text or attributes changed
    pub fn target(&self) -> DomId {
        match self {
            DomMutation::Insert { parent, .. } | DomMutation::Remove { parent, .. } => *parent,
            DomMutation::SetText { node }
            | DomMutation::SetAttribute { node, .. }
            | DomMutation::RemoveAttribute { node, .. } => *node,
        }
    }

    pub fn is_child_list(&self) -> bool {
        matches!(self, DomMutation::Insert { .. } | DomMutation::Remove { .. })
    }
}

pub struct DomTree {
    nodes: Vec<Option<DomNode>>,
    parents: Vec<Option<DomId>>,
    free_list: Vec<u32>,
    mutations: Vec<DomMutation>,
}

impl DomTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            parents: Vec::new(),
            free_list: Vec::new(),
            mutations: Vec::new(),
        }
    }

    fn create(&mut self, node: DomNode) -> DomId {
        let index = if let Some(idx) = self.free_list.pop() {
            idx as usize
        } else {
            self.nodes.len()
        };

        if index >= self.nodes.len() {
            self.nodes.push(Some(node));
            self.parents.push(None);
        } else {
            self.nodes[index] = Some(node);
            self.parents[index] = None;
        }

        DomId(index as u32)
    }

    pub fn create_element(&mut self, tag: &str) -> DomId {
        self.create(DomNode::Element {
            tag: tag.into(),
            namespace: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
        })
    }

    pub fn create_element_ns(&mut self, namespace: &str, tag: &str) -> DomId {
        self.create(DomNode::Element {
            tag: tag.into(),
            namespace: Some(namespace.into()),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> DomId {
        self.create(DomNode::Text {
            text: text.to_string(),
        })
    }

    pub fn get(&self, id: DomId) -> Option<&DomNode> {
        self.nodes.get(id.0 as usize)?.as_ref()
    }

    pub fn is_alive(&self, id: DomId) -> bool {
        self.get(id).is_some()
    }

    pub fn is_text(&self, id: DomId) -> bool {
        matches!(self.get(id), Some(DomNode::Text { .. }))
    }

    pub fn tag(&self, id: DomId) -> Option<&str> {
        match self.get(id)? {
            DomNode::Element { tag, .. } => Some(tag),
            DomNode::Text { .. } => None,
        }
    }

    pub fn namespace(&self, id: DomId) -> Option<&str> {
        match self.get(id)? {
            DomNode::Element { namespace, .. } => namespace.as_deref(),
            DomNode::Text { .. } => None,
        }
    }

    pub fn parent(&self, id: DomId) -> Option<DomId> {
        *self.parents.get(id.0 as usize)?
    }

    pub fn children(&self, id: DomId) -> &[DomId] {
        match self.get(id) {
            Some(DomNode::Element { children, .. }) => children,
            _ => &[],
        }
    }

    pub fn child_index(&self, id: DomId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Whether `node` is `ancestor` or lies inside it
    pub fn contains(&self, ancestor: DomId, node: DomId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    pub fn append_child(&mut self, parent: DomId, child: DomId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `reference`, or at the end. A
    /// child that already has a parent is moved.
    pub fn insert_before(&mut self, parent: DomId, child: DomId, reference: Option<DomId>) {
        if !self.is_alive(child) || self.contains(child, parent) {
            warn!(?parent, ?child, "refusing DOM insertion");
            return;
        }
        if !matches!(self.get(parent), Some(DomNode::Element { .. })) {
            return;
        }
        self.detach(child);
        if let Some(DomNode::Element { children, .. }) = self.nodes[parent.0 as usize].as_mut() {
            let index = reference
                .and_then(|r| children.iter().position(|c| *c == r))
                .unwrap_or(children.len());
            children.insert(index, child);
        }
        self.parents[child.0 as usize] = Some(parent);
        self.mutations.push(DomMutation::Insert { parent, child });
    }

    /// Put `new` where `old` is and detach `old`
    pub fn replace_child(&mut self, parent: DomId, new: DomId, old: DomId) {
        if self.parent(old) != Some(parent) || new == old {
            return;
        }
        self.insert_before(parent, new, Some(old));
        self.remove_child(parent, old);
    }

    pub fn remove_child(&mut self, parent: DomId, child: DomId) {
        if self.parent(child) == Some(parent) {
            self.detach(child);
        }
    }

    /// Remove `child` from its parent, keeping it alive
    pub fn detach(&mut self, child: DomId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Some(Some(DomNode::Element { children, .. })) = self.nodes.get_mut(parent.0 as usize)
        {
            children.retain(|c| *c != child);
        }
        self.parents[child.0 as usize] = None;
        self.mutations.push(DomMutation::Remove { parent, child });
    }

    pub fn text(&self, id: DomId) -> Option<&str> {
        match self.get(id)? {
            DomNode::Text { text } => Some(text),
            DomNode::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, id: DomId, value: &str) {
        if let Some(Some(DomNode::Text { text })) = self.nodes.get_mut(id.0 as usize) {
            if text != value {
                *text = value.to_string();
                self.mutations.push(DomMutation::SetText { node: id });
            }
        }
    }

    pub fn attribute(&self, id: DomId, name: &str) -> Option<&str> {
        match self.get(id)? {
            DomNode::Element { attrs, .. } => attrs.get(name).map(|v| v.as_str()),
            DomNode::Text { .. } => None,
        }
    }

    pub fn attributes(&self, id: DomId) -> Option<&BTreeMap<SmartString, SmartString>> {
        match self.get(id)? {
            DomNode::Element { attrs, .. } => Some(attrs),
            DomNode::Text { .. } => None,
        }
    }

    pub fn set_attribute(&mut self, id: DomId, name: &str, value: &str) {
        if let Some(Some(DomNode::Element { attrs, .. })) = self.nodes.get_mut(id.0 as usize) {
            if attrs.get(name).map(|v| v.as_str()) != Some(value) {
                attrs.insert(name.into(), value.into());
                self.mutations.push(DomMutation::SetAttribute {
                    node: id,
                    name: name.into(),
                });
            }
        }
    }

    pub fn remove_attribute(&mut self, id: DomId, name: &str) {
        if let Some(Some(DomNode::Element { attrs, .. })) = self.nodes.get_mut(id.0 as usize) {
            if attrs.remove(name).is_some() {
                self.mutations.push(DomMutation::RemoveAttribute {
                    node: id,
                    name: name.into(),
                });
            }
        }
    }

    /// Whether the space-separated `class` attribute contains `class`
    pub fn has_class(&self, id: DomId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, id: DomId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let value = match self.attribute(id, "class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attribute(id, "class", &value);
    }

    pub fn remove_class(&mut self, id: DomId, class: &str) {
        let Some(existing) = self.attribute(id, "class") else {
            return;
        };
        let remaining: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
        if remaining.is_empty() {
            self.remove_attribute(id, "class");
        } else {
            let value = remaining.join(" ");
            self.set_attribute(id, "class", &value);
        }
    }

    pub fn text_content(&self, id: DomId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: DomId, out: &mut String) {
        match self.get(id) {
            Some(DomNode::Text { text }) => out.push_str(text),
            Some(DomNode::Element { children, .. }) => {
                for child in children {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Serialize the subtree, attributes in name order
    pub fn to_html(&self, id: DomId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: DomId, out: &mut String) {
        match self.get(id) {
            Some(DomNode::Text { text }) => out.push_str(&escape(text)),
            Some(DomNode::Element {
                tag,
                attrs,
                children,
                ..
            }) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in attrs {
                    let _ = write!(out, " {name}=\"{}\"", escape(value));
                }
                out.push('>');
                for child in children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
            None => {}
        }
    }

    /// Detach and free the node and everything below it
    pub fn dispose(&mut self, id: DomId) {
        self.detach(id);
        self.free_subtree(id);
    }

    fn free_subtree(&mut self, id: DomId) {
        let idx = id.0 as usize;
        let Some(node) = self.nodes.get_mut(idx).and_then(Option::take) else {
            return;
        };
        if let DomNode::Element { children, .. } = node {
            for child in children {
                self.free_subtree(child);
            }
        }
        self.parents[idx] = None;
        self.free_list.push(id.0);
    }

    pub fn take_mutations(&mut self) -> Vec<DomMutation> {
        std::mem::take(&mut self.mutations)
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_append() {
        let mut dom = DomTree::new();
        let p = dom.create_element("p");
        let text = dom.create_text("hi");
        dom.append_child(p, text);

        assert_eq!(dom.children(p), &[text]);
        assert_eq!(dom.parent(text), Some(p));
        assert_eq!(dom.to_html(p), "<p>hi</p>");
    }

    #[test]
    fn test_insert_moves_existing_child() {
        let mut dom = DomTree::new();
        let a = dom.create_element("div");
        let b = dom.create_element("div");
        let t = dom.create_text("x");
        dom.append_child(a, t);
        dom.append_child(b, t);

        assert!(dom.children(a).is_empty());
        assert_eq!(dom.children(b), &[t]);
    }

    #[test]
    fn test_insert_before_reference() {
        let mut dom = DomTree::new();
        let ul = dom.create_element("ul");
        let first = dom.create_element("li");
        let second = dom.create_element("li");
        dom.append_child(ul, second);
        dom.insert_before(ul, first, Some(second));
        assert_eq!(dom.children(ul), &[first, second]);
        assert_eq!(dom.child_index(second), Some(1));
    }

    #[test]
    fn test_refuses_cycles() {
        let mut dom = DomTree::new();
        let outer = dom.create_element("div");
        let inner = dom.create_element("div");
        dom.append_child(outer, inner);
        dom.append_child(inner, outer);
        assert_eq!(dom.parent(outer), None);
    }

    #[test]
    fn test_dispose_frees_subtree_and_reuses_slots() {
        let mut dom = DomTree::new();
        let root = dom.create_element("div");
        let p = dom.create_element("p");
        let t = dom.create_text("x");
        dom.append_child(root, p);
        dom.append_child(p, t);
        assert_eq!(dom.len(), 3);

        dom.dispose(p);
        assert_eq!(dom.len(), 1);
        assert!(!dom.is_alive(t));
        assert!(dom.children(root).is_empty());

        let reused = dom.create_text("y");
        assert!(reused == p || reused == t);
    }

    #[test]
    fn test_mutation_log() {
        let mut dom = DomTree::new();
        let p = dom.create_element("p");
        let t = dom.create_text("a");
        dom.append_child(p, t);
        dom.set_text(t, "a");
        dom.set_text(t, "b");
        dom.set_attribute(p, "class", "x");

        let log = dom.take_mutations();
        assert_eq!(
            log,
            vec![
                DomMutation::Insert { parent: p, child: t },
                DomMutation::SetText { node: t },
                DomMutation::SetAttribute {
                    node: p,
                    name: "class".into()
                },
            ]
        );
        assert!(dom.take_mutations().is_empty());
    }

    #[test]
    fn test_classes() {
        let mut dom = DomTree::new();
        let p = dom.create_element("p");
        dom.add_class(p, "a");
        dom.add_class(p, "b");
        dom.add_class(p, "a");
        assert_eq!(dom.attribute(p, "class"), Some("a b"));
        dom.remove_class(p, "a");
        assert_eq!(dom.attribute(p, "class"), Some("b"));
        dom.remove_class(p, "b");
        assert_eq!(dom.attribute(p, "class"), None);
    }
}
