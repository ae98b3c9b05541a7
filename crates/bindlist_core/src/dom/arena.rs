//! Arena-backed in-process document.
//!
//! # Responsibility
//! - Provide a complete `Dom` implementation without a browser.
//! - Offer a small declarative builder for assembling pages.
//!
//! # Invariants
//! - Detached nodes stay allocated until `discard` releases them; released
//!   slots are recycled by later node creation.
//! - A recycled slot gets a new generation, so stale handles fail with
//!   `DomError::UnknownNode` instead of aliasing the new node.
//! - A node has at most one parent; the document node has none.

use super::{Dom, DomError, DomResult};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Handle to one arena node: slot index plus the slot generation it was
/// issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    style: BTreeMap<String, String>,
    /// Dirty control value; `None` falls back to the `value` attribute.
    value: Option<String>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    Fragment,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    /// `None` once released.
    node: Option<NodeData>,
}

/// In-memory document tree.
///
/// Removing a node only detaches it. Hosts that render for a long time
/// should hand rows they drop to [`Dom::discard`], otherwise every removed
/// row and rendered clone keeps its slot until the document is dropped.
/// `set_text_content` rewrites a lone text child in place and releases
/// the children it replaces.
#[derive(Debug, Clone)]
pub struct ArenaDom {
    nodes: Vec<Slot>,
    free: Vec<usize>,
}

impl Default for ArenaDom {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaDom {
    const DOCUMENT: NodeId = NodeId {
        index: 0,
        generation: 0,
    };

    /// Creates an empty document.
    pub fn new() -> Self {
        Self {
            nodes: vec![Slot {
                generation: 0,
                node: Some(NodeData {
                    kind: NodeKind::Document,
                    parent: None,
                    children: Vec::new(),
                }),
            }],
            free: Vec::new(),
        }
    }

    /// Materializes `spec` as a detached subtree and returns its root.
    pub fn build(&mut self, spec: &ElementSpec) -> NodeId {
        let node = self.create_element(&spec.tag);
        if let Some(NodeKind::Element(data)) = self.data_mut(node).map(|data| &mut data.kind) {
            data.attributes = spec.attributes.clone();
        }
        if let Some(text) = &spec.text {
            let text_node = self.create_text_node(text);
            self.link(node, text_node);
        }
        for child_spec in &spec.children {
            let child = self.build(child_spec);
            self.link(node, child);
        }
        node
    }

    /// Builds `spec` and appends it under `parent`.
    pub fn append_spec(&mut self, parent: NodeId, spec: &ElementSpec) -> DomResult<NodeId> {
        let node = self.build(spec);
        self.append_child(&parent, &node)?;
        Ok(node)
    }

    /// Number of nodes currently allocated, attached or not.
    pub fn live_nodes(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.node.is_some()).count()
    }

    /// Serializes `node` as markup; attributes keep insertion order.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.data(node) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Document | NodeKind::Fragment => {
                for child in &data.children {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
                }
                if !element.style.is_empty() {
                    let style = element
                        .style
                        .iter()
                        .map(|(property, value)| format!("{property}: {value}"))
                        .collect::<Vec<_>>()
                        .join("; ");
                    out.push_str(&format!(" style=\"{}\"", escape_attr(&style)));
                }
                out.push('>');
                for child in &data.children {
                    self.write_html(*child, out);
                }
                out.push_str(&format!("</{}>", element.tag));
            }
        }
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)?
            .node
            .as_ref()
    }

    fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)?
            .node
            .as_mut()
    }

    fn node(&self, id: NodeId) -> DomResult<&NodeData> {
        self.data(id)
            .ok_or_else(|| DomError::UnknownNode(id.to_string()))
    }

    fn element_mut(&mut self, id: NodeId) -> DomResult<&mut ElementData> {
        let data = self
            .data_mut(id)
            .ok_or_else(|| DomError::UnknownNode(id.to_string()))?;
        match &mut data.kind {
            NodeKind::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement(id.to_string())),
        }
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.data(id)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.nodes[index];
            slot.node = Some(data);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.nodes.push(Slot {
            generation: 0,
            node: Some(data),
        });
        NodeId {
            index: self.nodes.len() - 1,
            generation: 0,
        }
    }

    /// Frees `root` and its subtree.
    fn release(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(slot) = self
                .nodes
                .get_mut(id.index)
                .filter(|slot| slot.generation == id.generation)
            else {
                continue;
            };
            let Some(data) = slot.node.take() else {
                continue;
            };
            // A slot whose generation cannot advance is retired, not reused.
            if let Some(next) = slot.generation.checked_add(1) {
                slot.generation = next;
                self.free.push(id.index);
            }
            stack.extend(data.children);
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(data) = self.data_mut(child) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.data_mut(parent) {
            data.children.push(child);
        }
    }

    fn detach(&mut self, child: NodeId) {
        let parent = self.data_mut(child).and_then(|data| data.parent.take());
        if let Some(data) = parent.and_then(|parent| self.data_mut(parent)) {
            data.children.retain(|id| *id != child);
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.data(id).and_then(|data| data.parent);
        }
        false
    }

    /// Children to insert for `child`: a fragment contributes its children.
    fn insertion_set(&self, parent: NodeId, child: NodeId) -> DomResult<Vec<NodeId>> {
        self.node(parent)?;
        let data = self.node(child)?;
        match data.kind {
            NodeKind::Document => Err(DomError::HierarchyRequest(
                "cannot insert the document node".to_string(),
            )),
            NodeKind::Fragment => Ok(data.children.clone()),
            _ => {
                if self.is_inclusive_ancestor(child, parent) {
                    return Err(DomError::HierarchyRequest(format!(
                        "{child} is an ancestor of {parent}"
                    )));
                }
                Ok(vec![child])
            }
        }
    }

    fn deep_copy(&mut self, source: NodeId) -> Option<NodeId> {
        let (kind, children) = {
            let data = self.data(source)?;
            (data.kind.clone(), data.children.clone())
        };
        let copy = self.push(kind);
        for child in children {
            if let Some(child_copy) = self.deep_copy(child) {
                self.link(copy, child_copy);
            }
        }
        Some(copy)
    }
}

impl Dom for ArenaDom {
    type Node = NodeId;

    fn document(&self) -> NodeId {
        Self::DOCUMENT
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.data(*node)?.parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.data(*node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    fn is_element(&self, node: &NodeId) -> bool {
        self.element(*node).is_some()
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        self.element(*node).map(|element| element.tag.clone())
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.element(*node)?
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> DomResult<()> {
        let element = self.element_mut(*node)?;
        match element.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => element
                .attributes
                .push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn text_content(&self, node: &NodeId) -> String {
        match self.data(*node).map(|data| &data.kind) {
            Some(NodeKind::Text(text)) => text.clone(),
            Some(_) => self
                .descendants(node)
                .iter()
                .filter_map(|id| match self.data(*id).map(|data| &data.kind) {
                    Some(NodeKind::Text(text)) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            None => String::new(),
        }
    }

    /// Replaced children are released; a lone text child is rewritten in
    /// place.
    fn set_text_content(&mut self, node: &NodeId, text: &str) -> DomResult<()> {
        if matches!(self.node(*node)?.kind, NodeKind::Text(_)) {
            if let Some(data) = self.data_mut(*node) {
                data.kind = NodeKind::Text(text.to_string());
            }
            return Ok(());
        }
        let children = self.children(node);
        if let [only] = children.as_slice() {
            if !text.is_empty() {
                if let Some(data) = self.data_mut(*only) {
                    if let NodeKind::Text(current) = &mut data.kind {
                        *current = text.to_string();
                        return Ok(());
                    }
                }
            }
        }
        for child in children {
            self.detach(child);
            self.release(child);
        }
        if !text.is_empty() {
            let text_node = self.create_text_node(text);
            self.link(*node, text_node);
        }
        Ok(())
    }

    fn value(&self, node: &NodeId) -> String {
        match self.element(*node) {
            Some(element) => element
                .value
                .clone()
                .or_else(|| self.attribute(node, "value"))
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    fn set_value(&mut self, node: &NodeId, value: &str) -> DomResult<()> {
        self.element_mut(*node)?.value = Some(value.to_string());
        Ok(())
    }

    fn style(&self, node: &NodeId, property: &str) -> Option<String> {
        self.element(*node)?.style.get(property).cloned()
    }

    fn set_style(&mut self, node: &NodeId, property: &str, value: &str) -> DomResult<()> {
        self.element_mut(*node)?
            .style
            .insert(property.to_string(), value.to_string());
        Ok(())
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            style: BTreeMap::new(),
            value: None,
        }))
    }

    fn create_text_node(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn create_fragment(&mut self) -> NodeId {
        self.push(NodeKind::Fragment)
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> DomResult<()> {
        for node in self.insertion_set(*parent, *child)? {
            self.detach(node);
            self.link(*parent, node);
        }
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> DomResult<()> {
        self.node(*parent)?;
        if self.node(*child)?.parent != Some(*parent) {
            return Err(DomError::NotAChild {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        self.detach(*child);
        Ok(())
    }

    fn replace_child(
        &mut self,
        parent: &NodeId,
        new_child: &NodeId,
        old_child: &NodeId,
    ) -> DomResult<()> {
        if new_child == old_child {
            return Ok(());
        }
        if self.node(*old_child)?.parent != Some(*parent) {
            return Err(DomError::NotAChild {
                parent: parent.to_string(),
                child: old_child.to_string(),
            });
        }
        let incoming = self.insertion_set(*parent, *new_child)?;
        for node in &incoming {
            self.detach(*node);
        }
        let not_a_child = || DomError::NotAChild {
            parent: parent.to_string(),
            child: old_child.to_string(),
        };
        let position = self
            .node(*parent)?
            .children
            .iter()
            .position(|id| id == old_child)
            .ok_or_else(not_a_child)?;
        if let Some(data) = self.data_mut(*old_child) {
            data.parent = None;
        }
        let children = &mut self.data_mut(*parent).ok_or_else(not_a_child)?.children;
        children.remove(position);
        for (offset, node) in incoming.iter().enumerate() {
            children.insert(position + offset, *node);
        }
        for node in incoming {
            if let Some(data) = self.data_mut(node) {
                data.parent = Some(*parent);
            }
        }
        Ok(())
    }

    fn clone_node(&mut self, node: &NodeId) -> DomResult<NodeId> {
        if let NodeKind::Document = self.node(*node)?.kind {
            return Err(DomError::HierarchyRequest(
                "cannot clone the document node".to_string(),
            ));
        }
        self.deep_copy(*node)
            .ok_or_else(|| DomError::UnknownNode(node.to_string()))
    }

    fn reset_form(&mut self, form: &NodeId) -> DomResult<()> {
        self.element_mut(*form)?;
        for node in self.descendants(form) {
            if let Some(NodeKind::Element(element)) =
                self.data_mut(node).map(|data| &mut data.kind)
            {
                element.value = None;
            }
        }
        Ok(())
    }

    /// Releases `node` and its subtree when it is detached; attached nodes,
    /// the document and stale handles are left alone.
    fn discard(&mut self, node: &NodeId) {
        let detached = self
            .data(*node)
            .is_some_and(|data| data.parent.is_none() && !matches!(data.kind, NodeKind::Document));
        if detached {
            self.release(*node);
        }
    }
}

/// Declarative element description consumed by `ArenaDom::build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    tag: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<ElementSpec>,
}

/// Starts an element description.
pub fn el(tag: &str) -> ElementSpec {
    ElementSpec {
        tag: tag.to_ascii_lowercase(),
        attributes: Vec::new(),
        text: None,
        children: Vec::new(),
    }
}

impl ElementSpec {
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    /// Leading text node, emitted before element children.
    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = ElementSpec>) -> Self {
        self.children.extend(children);
        self
    }
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::{el, ArenaDom};
    use crate::dom::{Dom, DomError};

    fn list_page() -> (ArenaDom, super::NodeId) {
        let mut dom = ArenaDom::new();
        let root = dom.document();
        let list = dom
            .append_spec(
                root,
                &el("ul")
                    .attr("id", "list")
                    .child(el("li").attr("data-k", "a").text("first"))
                    .child(el("li").attr("data-k", "b").text("second")),
            )
            .expect("page should build");
        (dom, list)
    }

    #[test]
    fn descendants_follow_document_order() {
        let (dom, list) = list_page();
        let tags: Vec<String> = dom
            .descendants(&list)
            .iter()
            .filter_map(|node| dom.tag_name(node))
            .collect();
        assert_eq!(tags, vec!["li".to_string(), "li".to_string()]);
        assert_eq!(dom.text_content(&list), "firstsecond");
    }

    #[test]
    fn fragment_append_moves_children() {
        let (mut dom, list) = list_page();
        let fragment = dom.create_fragment();
        let item = dom.build(&el("li").text("third"));
        dom.append_child(&fragment, &item).expect("append to fragment");

        dom.append_child(&list, &fragment).expect("append fragment");

        assert!(dom.children(&fragment).is_empty());
        assert_eq!(dom.parent(&item), Some(list));
        assert_eq!(dom.children(&list).len(), 3);
    }

    #[test]
    fn replace_child_keeps_position() {
        let (mut dom, list) = list_page();
        let first = dom.children(&list)[0];
        let replacement = dom.build(&el("li").text("new"));

        dom.replace_child(&list, &replacement, &first)
            .expect("replace should succeed");

        assert_eq!(dom.children(&list)[0], replacement);
        assert_eq!(dom.parent(&first), None);
        assert_eq!(dom.text_content(&list), "newsecond");
    }

    #[test]
    fn remove_child_rejects_non_children() {
        let (mut dom, list) = list_page();
        let stray = dom.create_element("p");

        let err = dom.remove_child(&list, &stray).expect_err("stray is not a child");
        assert!(matches!(err, DomError::NotAChild { .. }));
    }

    #[test]
    fn append_rejects_cycles() {
        let (mut dom, list) = list_page();
        let item = dom.children(&list)[0];

        let err = dom.append_child(&item, &list).expect_err("cycle must fail");
        assert!(matches!(err, DomError::HierarchyRequest(_)));
    }

    #[test]
    fn clone_is_deep_and_detached() {
        let (mut dom, list) = list_page();
        let copy = dom.clone_node(&list).expect("clone should succeed");

        assert_eq!(dom.parent(&copy), None);
        assert_eq!(dom.text_content(&copy), "firstsecond");
        dom.set_text_content(&copy, "changed").expect("set text");
        assert_eq!(dom.text_content(&list), "firstsecond");
    }

    #[test]
    fn discarded_row_frees_its_slots_for_reuse() {
        let (mut dom, list) = list_page();
        let first = dom.children(&list)[0];
        let allocated = dom.live_nodes();

        dom.remove_child(&list, &first).expect("remove first");
        assert_eq!(dom.live_nodes(), allocated, "removal alone keeps the row");
        dom.discard(&first);
        assert_eq!(dom.live_nodes(), allocated - 2);

        let fresh = dom.create_element("li");
        let text = dom.create_text_node("again");
        assert_eq!(dom.live_nodes(), allocated);
        assert_ne!(fresh, first);
        assert_ne!(text, first);
    }

    #[test]
    fn stale_handle_does_not_alias_recycled_node() {
        let (mut dom, list) = list_page();
        let first = dom.children(&list)[0];
        dom.remove_child(&list, &first).expect("remove first");
        dom.discard(&first);
        let fresh = dom.build(&el("li").attr("data-k", "c"));

        let err = dom
            .set_attribute(&first, "data-k", "stale")
            .expect_err("released handle is unknown");
        assert!(matches!(err, DomError::UnknownNode(_)));
        assert_eq!(dom.attribute(&first, "data-k"), None);
        assert_eq!(dom.attribute(&fresh, "data-k").as_deref(), Some("c"));
    }

    #[test]
    fn discard_leaves_attached_nodes_and_document_alone() {
        let (mut dom, list) = list_page();
        let allocated = dom.live_nodes();
        let document = dom.document();

        dom.discard(&list);
        dom.discard(&document);

        assert_eq!(dom.live_nodes(), allocated);
        assert_eq!(dom.text_content(&list), "firstsecond");
    }

    #[test]
    fn repeated_set_text_content_does_not_allocate() {
        let mut dom = ArenaDom::new();
        let cell = dom.build(&el("td").text("seed"));
        let allocated = dom.live_nodes();

        for round in 0..50 {
            dom.set_text_content(&cell, &format!("value {round}"))
                .expect("set text");
        }
        dom.set_text_content(&cell, "").expect("clear text");
        dom.set_text_content(&cell, "last").expect("set text");

        assert_eq!(dom.live_nodes(), allocated);
        assert_eq!(dom.outer_html(cell), "<td>last</td>");
    }

    #[test]
    fn reset_form_restores_default_values() {
        let mut dom = ArenaDom::new();
        let root = dom.document();
        let form = dom
            .append_spec(root, &el("form").child(el("input").attr("value", "seed")))
            .expect("form should build");
        let input = dom.children(&form)[0];

        dom.set_value(&input, "typed").expect("set value");
        assert_eq!(dom.value(&input), "typed");

        dom.reset_form(&form).expect("reset");
        assert_eq!(dom.value(&input), "seed");
    }

    #[test]
    fn query_attribute_matches_value() {
        let (dom, list) = list_page();
        let second = dom
            .query_attribute(&list, "data-k", Some("b"))
            .expect("second item");
        assert_eq!(dom.text_content(&second), "second");
        assert!(dom.query_attribute(&list, "data-k", Some("z")).is_none());
    }

    #[test]
    fn outer_html_escapes_content() {
        let mut dom = ArenaDom::new();
        let node = dom.build(&el("td").attr("title", "a\"b").text("x<y"));
        assert_eq!(dom.outer_html(node), "<td title=\"a&quot;b\">x&lt;y</td>");
    }
}
