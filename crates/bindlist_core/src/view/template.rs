//! Repeat template.
//!
//! # Responsibility
//! - Detach the single repeated row node from the page.
//! - Render one row clone per record.
//!
//! # Invariants
//! - The template node itself is never re-inserted; only clones are.
//! - Bound outputs and action elements are indexed once, at detach time.

use super::{ViewError, ViewResult};
use crate::binding::{AttributeIndex, BindingRole, Bindings};
use crate::dom::Dom;
use crate::model::record::{Record, RecordId};

/// Detached row template plus its binding indexes.
#[derive(Debug, Clone)]
pub struct Template<N> {
    container: N,
    node: N,
    row_marker: String,
    target_marker: String,
    model_queries: AttributeIndex<N>,
    controller_actions: AttributeIndex<N>,
}

impl<N: Clone + PartialEq> Template<N> {
    /// Removes `node` from its parent and indexes its bindings.
    ///
    /// # Errors
    /// - `ViewError::MissingElement` when `node` has no parent container.
    pub fn detach<D>(dom: &mut D, node: N, bindings: &Bindings) -> ViewResult<Self>
    where
        D: Dom<Node = N>,
    {
        let container = dom.parent(&node).ok_or_else(|| {
            ViewError::MissingElement("repeat template has no parent container".to_string())
        })?;
        dom.remove_child(&container, &node)?;

        let model_queries =
            AttributeIndex::scan(&*dom, &node, bindings.marker(BindingRole::ModelField));
        let controller_actions =
            AttributeIndex::scan(&*dom, &node, bindings.marker(BindingRole::Action));

        Ok(Self {
            container,
            node,
            row_marker: bindings.marker(BindingRole::RepeatTemplate).to_string(),
            target_marker: bindings.marker(BindingRole::TargetId).to_string(),
            model_queries,
            controller_actions,
        })
    }

    /// Renders `record` into the template and returns a detached deep clone.
    ///
    /// Fields the record lacks render as empty text.
    pub fn make_item<D>(&self, dom: &mut D, record: &Record, id: RecordId) -> ViewResult<N>
    where
        D: Dom<Node = N>,
    {
        for (field, element) in self.model_queries.iter() {
            dom.set_text_content(element, &record.display(field))?;
        }
        let id_text = id.to_string();
        for (_, element) in self.controller_actions.iter() {
            dom.set_attribute(element, &self.target_marker, &id_text)?;
        }
        dom.set_attribute(&self.node, &self.row_marker, &id_text)?;
        Ok(dom.clone_node(&self.node)?)
    }

    /// Element rendered clones are appended to.
    pub fn container(&self) -> &N {
        &self.container
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn row_marker(&self) -> &str {
        &self.row_marker
    }

    pub fn model_queries(&self) -> &AttributeIndex<N> {
        &self.model_queries
    }

    pub fn controller_actions(&self) -> &AttributeIndex<N> {
        &self.controller_actions
    }
}

#[cfg(test)]
mod tests {
    use super::Template;
    use crate::binding::Bindings;
    use crate::dom::{el, ArenaDom, Dom};
    use crate::model::record::Record;

    fn table() -> (ArenaDom, crate::dom::NodeId, crate::dom::NodeId) {
        let mut dom = ArenaDom::new();
        let root = dom.document();
        let body = dom
            .append_spec(
                root,
                &el("tbody").child(
                    el("tr")
                        .attr("lib-repeat", "")
                        .child(el("td").attr("lib-model", "name"))
                        .child(el("td").attr("lib-model", "year"))
                        .child(el("td").child(el("button").attr("lib-action", "delete"))),
                ),
            )
            .expect("table should build");
        let row = dom.children(&body)[0];
        (dom, body, row)
    }

    #[test]
    fn detach_removes_template_and_indexes_bindings() {
        let (mut dom, body, row) = table();
        let template =
            Template::detach(&mut dom, row, &Bindings::default()).expect("template detaches");

        assert!(dom.children(&body).is_empty());
        assert_eq!(template.container(), &body);
        assert_eq!(template.model_queries().len(), 2);
        assert_eq!(template.controller_actions().len(), 1);
    }

    #[test]
    fn make_item_renders_fields_and_tags_ids() {
        let (mut dom, _body, row) = table();
        let template =
            Template::detach(&mut dom, row, &Bindings::default()).expect("template detaches");

        let item = template
            .make_item(&mut dom, &Record::new().with("name", "Solaris"), 4)
            .expect("item renders");

        assert_ne!(item, row);
        assert_eq!(dom.attribute(&item, "lib-repeat").as_deref(), Some("4"));
        assert_eq!(dom.text_content(&item), "Solaris");
        let button = dom
            .query_attribute(&item, "lib-action", Some("delete"))
            .expect("button is cloned");
        assert_eq!(dom.attribute(&button, "lib-id").as_deref(), Some("4"));
    }

    #[test]
    fn detach_without_parent_fails() {
        let mut dom = ArenaDom::new();
        let orphan = dom.build(&el("tr"));
        assert!(Template::detach(&mut dom, orphan, &Bindings::default()).is_err());
    }
}
