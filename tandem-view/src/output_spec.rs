//! # Output spec interpreter
//!
//! Turns a declarative DOM shape into elements in a [`DomTree`].
//!
//! ```text
//! "text"                                 text node
//! ["p", 0]                               <p> whose content goes in the hole
//! ["a", {"href": "#"}, 0]                attributes, then the hole
//! ["pre", ["code", 0]]                   hole nested one level down
//! ["http://www.w3.org/2000/svg svg"]     namespaced element
//! {"nodeType": 3, "textContent": "x"}    literal DOM node
//! ```
//!
//! The hole `0` must be the only or the last child of its element, and a
//! shape holds at most one. Mark shapes may omit the hole: their content
//! then goes into the innermost element reached through last children.

use crate::dom::{DomId, DomTree};
use crate::error::{Result, ViewError};
use serde_json::{Map, Value};
use smartstring::alias::String as SmartString;

/// What a shape is being rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Node,
    Mark,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputSpec {
    Text(String),
    Element {
        tag: SmartString,
        namespace: Option<SmartString>,
        attrs: Vec<(SmartString, SmartString)>,
        children: Vec<OutputSpec>,
    },
    Hole,
    /// Pre-built node given as `{"nodeType": 1 | 3, ...}`
    Literal(LiteralNode),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralNode {
    Element {
        tag: SmartString,
        attrs: Vec<(SmartString, SmartString)>,
    },
    Text(String),
}

/// Where supplied children go: the element and how many of its own
/// children precede them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentSlot {
    pub element: DomId,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendered {
    pub dom: DomId,
    pub content: Option<ContentSlot>,
}

impl OutputSpec {
    pub fn parse(value: &Value) -> Result<OutputSpec> {
        let mut holes = 0;
        match value {
            Value::Number(n) if n.as_u64() == Some(0) => Err(ViewError::MisplacedHole(
                "a hole cannot be the whole shape".to_string(),
            )),
            _ => parse_value(value, &mut holes),
        }
    }

    pub fn has_hole(&self) -> bool {
        match self {
            OutputSpec::Hole => true,
            OutputSpec::Element { children, .. } => children.iter().any(OutputSpec::has_hole),
            _ => false,
        }
    }

    pub fn render(&self, dom: &mut DomTree, mode: RenderMode) -> Result<Rendered> {
        let mut slot = None;
        let root = self.build(dom, None, &mut slot)?;
        if slot.is_none() && mode == RenderMode::Mark && !dom.is_text(root) {
            let mut deepest = root;
            while let Some(&last) = dom.children(deepest).last() {
                if dom.is_text(last) {
                    break;
                }
                deepest = last;
            }
            slot = Some(ContentSlot {
                element: deepest,
                offset: dom.children(deepest).len(),
            });
        }
        Ok(Rendered {
            dom: root,
            content: slot,
        })
    }

    /// Render and splice `children` into the content slot
    pub fn render_with_children(
        &self,
        dom: &mut DomTree,
        mode: RenderMode,
        children: &[DomId],
    ) -> Result<Rendered> {
        let rendered = self.render(dom, mode)?;
        match rendered.content {
            Some(slot) => {
                for child in children {
                    dom.append_child(slot.element, *child);
                }
            }
            None if !children.is_empty() => {
                dom.dispose(rendered.dom);
                return Err(ViewError::MalformedSpec(
                    "shape has no place for content".to_string(),
                ));
            }
            None => {}
        }
        Ok(rendered)
    }

    fn build(
        &self,
        dom: &mut DomTree,
        inherited_ns: Option<&str>,
        slot: &mut Option<ContentSlot>,
    ) -> Result<DomId> {
        match self {
            OutputSpec::Text(text) => Ok(dom.create_text(text)),
            OutputSpec::Literal(LiteralNode::Text(text)) => Ok(dom.create_text(text)),
            OutputSpec::Literal(LiteralNode::Element { tag, attrs }) => {
                let id = dom.create_element(tag);
                for (name, value) in attrs {
                    dom.set_attribute(id, name, value);
                }
                Ok(id)
            }
            OutputSpec::Hole => Err(ViewError::MisplacedHole(
                "a hole cannot be the whole shape".to_string(),
            )),
            OutputSpec::Element {
                tag,
                namespace,
                attrs,
                children,
            } => {
                let ns = namespace.as_deref().or(inherited_ns);
                let id = match ns {
                    Some(ns) => dom.create_element_ns(ns, tag),
                    None => dom.create_element(tag),
                };
                for (name, value) in attrs {
                    dom.set_attribute(id, name, value);
                }
                for (index, child) in children.iter().enumerate() {
                    if let OutputSpec::Hole = child {
                        *slot = Some(ContentSlot {
                            element: id,
                            offset: index,
                        });
                        continue;
                    }
                    let child_id = child.build(dom, ns, slot)?;
                    dom.append_child(id, child_id);
                }
                Ok(id)
            }
        }
    }
}

fn parse_value(value: &Value, holes: &mut usize) -> Result<OutputSpec> {
    match value {
        Value::String(text) => Ok(OutputSpec::Text(text.clone())),
        Value::Array(items) => parse_element(items, holes),
        Value::Object(map) if map.contains_key("nodeType") => parse_literal(map),
        other => Err(ViewError::MalformedSpec(format!(
            "expected a string, array or DOM node, got {other}"
        ))),
    }
}

fn parse_element(items: &[Value], holes: &mut usize) -> Result<OutputSpec> {
    let Some(Value::String(name)) = items.first() else {
        return Err(ViewError::MalformedSpec(
            "element shape must start with a tag name".to_string(),
        ));
    };
    if name.is_empty() {
        return Err(ViewError::MalformedSpec("empty tag name".to_string()));
    }
    let (namespace, tag) = match name.split_once(' ') {
        Some((ns, tag)) => (Some(SmartString::from(ns)), SmartString::from(tag)),
        None => (None, SmartString::from(name.as_str())),
    };

    let mut rest = &items[1..];
    let mut attrs = Vec::new();
    if let Some(Value::Object(map)) = rest.first() {
        if !map.contains_key("nodeType") {
            attrs = parse_attrs(map)?;
            rest = &rest[1..];
        }
    }

    let mut children = Vec::with_capacity(rest.len());
    for (index, child) in rest.iter().enumerate() {
        if is_hole(child) {
            if index + 1 != rest.len() {
                return Err(ViewError::MisplacedHole(format!(
                    "hole in <{tag}> is followed by other children"
                )));
            }
            *holes += 1;
            if *holes > 1 {
                return Err(ViewError::MisplacedHole(
                    "shape contains more than one hole".to_string(),
                ));
            }
            children.push(OutputSpec::Hole);
        } else {
            children.push(parse_value(child, holes)?);
        }
    }

    Ok(OutputSpec::Element {
        tag,
        namespace,
        attrs,
        children,
    })
}

fn is_hole(value: &Value) -> bool {
    matches!(value, Value::Number(n) if n.as_u64() == Some(0))
}

fn parse_attrs(map: &Map<String, Value>) -> Result<Vec<(SmartString, SmartString)>> {
    let mut attrs = Vec::with_capacity(map.len());
    for (name, value) in map {
        let value: SmartString = match value {
            Value::Null => continue,
            Value::String(s) => s.as_str().into(),
            Value::Number(n) => n.to_string().into(),
            Value::Bool(b) => b.to_string().into(),
            other => {
                return Err(ViewError::MalformedSpec(format!(
                    "attribute '{name}' has non-scalar value {other}"
                )));
            }
        };
        attrs.push((SmartString::from(name.as_str()), value));
    }
    Ok(attrs)
}

fn parse_literal(map: &Map<String, Value>) -> Result<OutputSpec> {
    match map.get("nodeType").and_then(Value::as_u64) {
        Some(1) => {
            let Some(tag) = map.get("nodeName").and_then(Value::as_str) else {
                return Err(ViewError::MalformedSpec(
                    "element literal needs a nodeName".to_string(),
                ));
            };
            let attrs = match map.get("attributes") {
                Some(Value::Object(attrs)) => parse_attrs(attrs)?,
                _ => Vec::new(),
            };
            Ok(OutputSpec::Literal(LiteralNode::Element {
                tag: tag.to_ascii_lowercase().into(),
                attrs,
            }))
        }
        Some(3) => Ok(OutputSpec::Literal(LiteralNode::Text(
            map.get("textContent")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ))),
        _ => Err(ViewError::MalformedSpec(
            "unsupported nodeType in DOM literal".to_string(),
        )),
    }
}

/// Parse and render in one step
pub fn render_value(value: &Value, dom: &mut DomTree, mode: RenderMode) -> Result<Rendered> {
    OutputSpec::parse(value)?.render(dom, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hole_receives_children() {
        let mut dom = DomTree::new();
        let x = dom.create_text("x");
        let spec = OutputSpec::parse(&json!(["a", {"href": "#"}, 0])).unwrap();
        let rendered = spec
            .render_with_children(&mut dom, RenderMode::Node, &[x])
            .unwrap();
        assert_eq!(dom.to_html(rendered.dom), "<a href=\"#\">x</a>");
        assert_eq!(
            rendered.content,
            Some(ContentSlot {
                element: rendered.dom,
                offset: 0
            })
        );
    }

    #[test]
    fn test_mark_without_hole_wraps_content() {
        let mut dom = DomTree::new();
        let x = dom.create_text("x");
        let spec = OutputSpec::parse(&json!(["a", {"href": "#"}])).unwrap();
        let rendered = spec
            .render_with_children(&mut dom, RenderMode::Mark, &[x])
            .unwrap();
        assert_eq!(dom.to_html(rendered.dom), "<a href=\"#\">x</a>");
    }

    #[test]
    fn test_mark_without_hole_uses_deepest_last_element() {
        let mut dom = DomTree::new();
        let spec = OutputSpec::parse(&json!(["span", ["b"], ["i", ["u"]]])).unwrap();
        let rendered = spec.render(&mut dom, RenderMode::Mark).unwrap();
        let slot = rendered.content.unwrap();
        assert_eq!(dom.tag(slot.element), Some("u"));
    }

    #[test]
    fn test_node_without_hole_has_no_slot() {
        let mut dom = DomTree::new();
        let spec = OutputSpec::parse(&json!(["br"])).unwrap();
        let rendered = spec.render(&mut dom, RenderMode::Node).unwrap();
        assert_eq!(rendered.content, None);
        let child = dom.create_text("x");
        assert!(matches!(
            spec.render_with_children(&mut dom, RenderMode::Node, &[child]),
            Err(ViewError::MalformedSpec(_))
        ));
    }

    #[test]
    fn test_nested_hole_with_static_prefix() {
        let mut dom = DomTree::new();
        let spec = OutputSpec::parse(&json!(["figure", ["div", ["span", "label"], 0]])).unwrap();
        let rendered = spec.render(&mut dom, RenderMode::Node).unwrap();
        let slot = rendered.content.unwrap();
        assert_eq!(dom.tag(slot.element), Some("div"));
        assert_eq!(slot.offset, 1);
    }

    #[test]
    fn test_hole_must_be_last() {
        let err = OutputSpec::parse(&json!(["p", 0, "tail"])).unwrap_err();
        assert!(matches!(err, ViewError::MisplacedHole(_)));
    }

    #[test]
    fn test_single_hole_only() {
        let err = OutputSpec::parse(&json!(["div", ["p", 0], ["p", 0]])).unwrap_err();
        assert!(matches!(err, ViewError::MisplacedHole(_)));
    }

    #[test]
    fn test_top_level_hole_rejected() {
        let err = OutputSpec::parse(&json!(0)).unwrap_err();
        assert!(matches!(err, ViewError::MisplacedHole(_)));
    }

    #[test]
    fn test_node_type_object_is_a_child_not_attrs() {
        let spec = OutputSpec::parse(&json!(["p", {"nodeType": 3, "textContent": "hi"}])).unwrap();
        let OutputSpec::Element { attrs, children, .. } = spec else {
            panic!("expected element");
        };
        assert!(attrs.is_empty());
        assert_eq!(children, vec![OutputSpec::Literal(LiteralNode::Text("hi".to_string()))]);
    }

    #[test]
    fn test_attribute_values() {
        let mut dom = DomTree::new();
        let spec = OutputSpec::parse(&json!(["img", {"src": "a.png", "width": 3, "alt": null, "hidden": true}])).unwrap();
        let rendered = spec.render(&mut dom, RenderMode::Node).unwrap();
        assert_eq!(dom.attribute(rendered.dom, "width"), Some("3"));
        assert_eq!(dom.attribute(rendered.dom, "hidden"), Some("true"));
        assert_eq!(dom.attribute(rendered.dom, "alt"), None);
    }

    #[test]
    fn test_namespace_is_inherited() {
        let mut dom = DomTree::new();
        let spec =
            OutputSpec::parse(&json!(["http://www.w3.org/2000/svg svg", ["circle"]])).unwrap();
        let rendered = spec.render(&mut dom, RenderMode::Node).unwrap();
        let circle = dom.children(rendered.dom)[0];
        assert_eq!(dom.tag(rendered.dom), Some("svg"));
        assert_eq!(dom.namespace(circle), Some("http://www.w3.org/2000/svg"));
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(
            OutputSpec::parse(&json!([])),
            Err(ViewError::MalformedSpec(_))
        ));
        assert!(matches!(
            OutputSpec::parse(&json!([1, 2])),
            Err(ViewError::MalformedSpec(_))
        ));
        assert!(matches!(
            OutputSpec::parse(&json!(["p", {"style": {"color": "red"}}])),
            Err(ViewError::MalformedSpec(_))
        ));
    }
}
