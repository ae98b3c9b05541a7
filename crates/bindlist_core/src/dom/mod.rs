//! Host document abstraction.
//!
//! # Responsibility
//! - Define the query/mutation surface the view layer needs from a document.
//! - Keep renderer code independent from any concrete DOM implementation.
//!
//! # Invariants
//! - Traversal helpers return nodes in document (pre-)order.
//! - Appending a fragment moves its children and leaves the fragment empty.
//! - Appending a node that already has a parent detaches it first.
//!
//! # See also
//! - `arena` for the in-process implementation used by tests and the CLI.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub mod arena;
pub mod page;

pub use arena::{el, ArenaDom, ElementSpec, NodeId};

pub type DomResult<T> = Result<T, DomError>;

/// Document mutation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// Node handle does not belong to this document.
    UnknownNode(String),
    /// Operation requires an element node.
    NotAnElement(String),
    /// `remove_child`/`replace_child` target is not a child of the parent.
    NotAChild { parent: String, child: String },
    /// Insertion would make a node its own ancestor, or insert a document.
    HierarchyRequest(String),
}

impl Display for DomError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownNode(node) => write!(f, "node does not belong to document: {node}"),
            Self::NotAnElement(node) => write!(f, "node is not an element: {node}"),
            Self::NotAChild { parent, child } => {
                write!(f, "node {child} is not a child of {parent}")
            }
            Self::HierarchyRequest(message) => write!(f, "hierarchy request error: {message}"),
        }
    }
}

impl Error for DomError {}

/// Document operations consumed by templates, views and controllers.
pub trait Dom {
    type Node: Clone + PartialEq + Debug;

    /// Returns the document node.
    fn document(&self) -> Self::Node;
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
    fn is_element(&self, node: &Self::Node) -> bool;
    /// Lowercase tag name for elements, `None` for other node kinds.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> DomResult<()>;
    /// Concatenated text of all descendant text nodes.
    fn text_content(&self, node: &Self::Node) -> String;
    /// Replaces all children of `node` with a single text node.
    fn set_text_content(&mut self, node: &Self::Node, text: &str) -> DomResult<()>;
    /// Current form-control value.
    fn value(&self, node: &Self::Node) -> String;
    fn set_value(&mut self, node: &Self::Node, value: &str) -> DomResult<()>;
    fn style(&self, node: &Self::Node, property: &str) -> Option<String>;
    fn set_style(&mut self, node: &Self::Node, property: &str, value: &str) -> DomResult<()>;
    fn create_element(&mut self, tag: &str) -> Self::Node;
    fn create_text_node(&mut self, text: &str) -> Self::Node;
    fn create_fragment(&mut self) -> Self::Node;
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> DomResult<()>;
    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> DomResult<()>;
    fn replace_child(
        &mut self,
        parent: &Self::Node,
        new_child: &Self::Node,
        old_child: &Self::Node,
    ) -> DomResult<()>;
    /// Deep clone; the copy has no parent.
    fn clone_node(&mut self, node: &Self::Node) -> DomResult<Self::Node>;
    /// Restores every control under `form` to its default value.
    fn reset_form(&mut self, form: &Self::Node) -> DomResult<()>;

    /// Drops a detached subtree the caller no longer needs. Its handles must
    /// not be used afterwards. Documents that reclaim nothing ignore it.
    fn discard(&mut self, _node: &Self::Node) {}

    fn has_attribute(&self, node: &Self::Node, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// All descendants of `root` in document order, `root` excluded.
    fn descendants(&self, root: &Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack: Vec<Self::Node> = self.children(root).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            stack.extend(self.children(&node).into_iter().rev());
            out.push(node);
        }
        out
    }

    /// Descendant elements of `root` carrying attribute `name`.
    fn query_all_attribute(&self, root: &Self::Node, name: &str) -> Vec<Self::Node> {
        self.descendants(root)
            .into_iter()
            .filter(|node| self.is_element(node) && self.has_attribute(node, name))
            .collect()
    }

    /// First descendant element with attribute `name`, optionally equal to `value`.
    fn query_attribute(
        &self,
        root: &Self::Node,
        name: &str,
        value: Option<&str>,
    ) -> Option<Self::Node> {
        self.descendants(root).into_iter().find(|node| {
            if !self.is_element(node) {
                return false;
            }
            match (self.attribute(node, name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }

    /// First descendant element with the given tag name.
    fn query_tag(&self, root: &Self::Node, tag: &str) -> Option<Self::Node> {
        let wanted = tag.to_ascii_lowercase();
        self.descendants(root)
            .into_iter()
            .find(|node| self.tag_name(node).as_deref() == Some(wanted.as_str()))
    }
}
