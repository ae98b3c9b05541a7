//! Declarative attribute bindings.
//!
//! # Responsibility
//! - Map binding roles onto the marker attributes that declare them.
//! - Index a subtree by marker value (`AttributeIndex`).
//!
//! # Invariants
//! - Every `BindingRole` resolves to exactly one marker.
//! - Marker names match `^[a-z][a-z0-9_-]*$`.
//! - Index scans never mutate the document.

use crate::dom::Dom;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static MARKER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("valid marker name regex"));

/// Role a marker attribute plays in the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingRole {
    /// Application root element.
    AppRoot,
    /// The single repeated row template; carries the row id on clones.
    RepeatTemplate,
    WarningPanel,
    WarningText,
    /// Form control; value names the record field.
    FormField,
    /// Optional declared content type of a form control (`number`).
    ContentType,
    /// Clickable control; value is `submit|reset|delete|edit`.
    Action,
    /// Output element inside the template; value names the record field.
    ModelField,
    /// Row id stamped onto action elements of a rendered row.
    TargetId,
}

impl BindingRole {
    pub const ALL: [BindingRole; 9] = [
        Self::AppRoot,
        Self::RepeatTemplate,
        Self::WarningPanel,
        Self::WarningText,
        Self::FormField,
        Self::ContentType,
        Self::Action,
        Self::ModelField,
        Self::TargetId,
    ];

    /// Marker used when a configuration does not override the role.
    pub fn default_marker(self) -> &'static str {
        match self {
            Self::AppRoot => "lib-app",
            Self::RepeatTemplate => "lib-repeat",
            Self::WarningPanel => "lib-warning-panel",
            Self::WarningText => "lib-warning-text",
            Self::FormField => "lib-content",
            Self::ContentType => "lib-content-type",
            Self::Action => "lib-action",
            Self::ModelField => "lib-model",
            Self::TargetId => "lib-id",
        }
    }
}

/// One `{marker, role}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDescriptor {
    pub marker: String,
    pub role: BindingRole,
}

impl BindingDescriptor {
    pub fn new(marker: impl Into<String>, role: BindingRole) -> Self {
        Self {
            marker: marker.into(),
            role,
        }
    }
}

/// Binding declaration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    InvalidMarker(String),
    DuplicateRole(BindingRole),
    MissingRole(BindingRole),
}

impl Display for BindingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMarker(marker) => write!(
                f,
                "marker attribute `{marker}` is invalid; expected ^[a-z][a-z0-9_-]*$"
            ),
            Self::DuplicateRole(role) => write!(f, "binding role declared twice: {role:?}"),
            Self::MissingRole(role) => write!(f, "binding role not declared: {role:?}"),
        }
    }
}

impl Error for BindingError {}

/// Resolved role → marker table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    markers: BTreeMap<BindingRole, String>,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            markers: BindingRole::ALL
                .iter()
                .map(|role| (*role, role.default_marker().to_string()))
                .collect(),
        }
    }
}

impl Bindings {
    /// Resolves a full descriptor list.
    ///
    /// # Errors
    /// - `InvalidMarker` when a marker is not a valid attribute name.
    /// - `DuplicateRole` / `MissingRole` unless each role appears once.
    pub fn from_descriptors(descriptors: &[BindingDescriptor]) -> Result<Self, BindingError> {
        let mut markers = BTreeMap::new();
        for descriptor in descriptors {
            let marker = descriptor.marker.trim();
            if !MARKER_NAME_RE.is_match(marker) {
                return Err(BindingError::InvalidMarker(descriptor.marker.clone()));
            }
            if markers
                .insert(descriptor.role, marker.to_string())
                .is_some()
            {
                return Err(BindingError::DuplicateRole(descriptor.role));
            }
        }
        for role in BindingRole::ALL {
            if !markers.contains_key(&role) {
                return Err(BindingError::MissingRole(role));
            }
        }
        Ok(Self { markers })
    }

    /// Descriptor list equivalent to this table.
    pub fn descriptors(&self) -> Vec<BindingDescriptor> {
        self.markers
            .iter()
            .map(|(role, marker)| BindingDescriptor::new(marker.clone(), *role))
            .collect()
    }

    pub fn marker(&self, role: BindingRole) -> &str {
        self.markers
            .get(&role)
            .map(String::as_str)
            .unwrap_or_else(|| role.default_marker())
    }
}

/// Marker value → element mapping for one subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeIndex<N> {
    marker: String,
    entries: BTreeMap<String, N>,
}

impl<N: Clone> AttributeIndex<N> {
    /// Indexes every descendant element of `root` carrying `marker`.
    ///
    /// Later elements in document order overwrite earlier ones that share a
    /// marker value.
    pub fn scan<D>(dom: &D, root: &N, marker: &str) -> Self
    where
        D: Dom<Node = N>,
    {
        let mut entries = BTreeMap::new();
        for node in dom.query_all_attribute(root, marker) {
            if let Some(value) = dom.attribute(&node, marker) {
                entries.insert(value, node);
            }
        }
        Self {
            marker: marker.to_string(),
            entries,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn get(&self, value: &str) -> Option<&N> {
        self.entries.get(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries sorted by marker value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &N)> {
        self.entries
            .iter()
            .map(|(value, node)| (value.as_str(), node))
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeIndex, BindingDescriptor, BindingError, BindingRole, Bindings};
    use crate::dom::{el, ArenaDom, Dom};

    #[test]
    fn scan_indexes_nested_elements_and_skips_unmarked() {
        let mut dom = ArenaDom::new();
        let root = dom.document();
        let form = dom
            .append_spec(
                root,
                &el("form")
                    .child(el("input").attr("lib-content", "author"))
                    .child(
                        el("div")
                            .child(el("input").attr("lib-content", "year"))
                            .child(el("span").text("no marker")),
                    ),
            )
            .expect("form should build");

        let index = AttributeIndex::scan(&dom, &form, "lib-content");

        assert_eq!(index.len(), 2);
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["author", "year"]);
        assert_eq!(index.marker(), "lib-content");
    }

    #[test]
    fn later_duplicate_marker_value_wins() {
        let mut dom = ArenaDom::new();
        let root = dom.document();
        let list = dom
            .append_spec(
                root,
                &el("ul")
                    .child(el("li").attr("lib-model", "name").text("first"))
                    .child(el("li").attr("lib-model", "name").text("second")),
            )
            .expect("list should build");

        let index = AttributeIndex::scan(&dom, &list, "lib-model");
        let node = index.get("name").expect("name should be indexed");

        assert_eq!(index.len(), 1);
        assert_eq!(dom.text_content(node), "second");
    }

    #[test]
    fn scan_excludes_root_and_returns_empty_without_matches() {
        let mut dom = ArenaDom::new();
        let root = dom.document();
        let lone = dom
            .append_spec(root, &el("p").attr("lib-model", "self"))
            .expect("paragraph should build");

        let index = AttributeIndex::scan(&dom, &lone, "lib-model");
        assert!(index.is_empty());
    }

    #[test]
    fn default_bindings_cover_every_role() {
        let bindings = Bindings::default();
        assert_eq!(bindings.marker(BindingRole::RepeatTemplate), "lib-repeat");
        assert_eq!(bindings.marker(BindingRole::TargetId), "lib-id");

        let rebuilt = Bindings::from_descriptors(&bindings.descriptors())
            .expect("default descriptors should resolve");
        assert_eq!(rebuilt, bindings);
    }

    #[test]
    fn from_descriptors_rejects_invalid_marker_and_missing_role() {
        let err = Bindings::from_descriptors(&[BindingDescriptor::new(
            "Bad Marker",
            BindingRole::AppRoot,
        )])
        .expect_err("invalid marker must fail");
        assert_eq!(err, BindingError::InvalidMarker("Bad Marker".to_string()));

        let err = Bindings::from_descriptors(&[BindingDescriptor::new(
            "x-app",
            BindingRole::AppRoot,
        )])
        .expect_err("partial declaration must fail");
        assert_eq!(err, BindingError::MissingRole(BindingRole::RepeatTemplate));
    }

    #[test]
    fn from_descriptors_rejects_duplicate_role() {
        let mut descriptors = Bindings::default().descriptors();
        descriptors.push(BindingDescriptor::new("x-app", BindingRole::AppRoot));

        let err = Bindings::from_descriptors(&descriptors).expect_err("duplicate role must fail");
        assert_eq!(err, BindingError::DuplicateRole(BindingRole::AppRoot));
    }
}
