//! Reference page layout.
//!
//! Builds the record list page (warning panel, edit form, repeat table) for a
//! given binding table and field schema. Used by the smoke CLI and tests;
//! browser hosts ship their own markup with the same markers.

use super::arena::{el, ArenaDom, ElementSpec, NodeId};
use super::{Dom, DomResult};
use crate::binding::{BindingRole, Bindings};
use crate::model::record::ID_FIELD;
use crate::model::schema::{FieldSchema, FieldType};

/// Appends the page under the document node and returns the app root.
pub fn build_record_page(
    dom: &mut ArenaDom,
    bindings: &Bindings,
    schema: &FieldSchema,
) -> DomResult<NodeId> {
    let marker = |role: BindingRole| bindings.marker(role);

    let mut form = el("form").child(
        el("input")
            .attr("type", "hidden")
            .attr(marker(BindingRole::FormField), ID_FIELD),
    );
    for (field, descriptor) in schema.iter() {
        let mut input = el("input").attr(marker(BindingRole::FormField), field);
        if descriptor.kind == FieldType::Number {
            input = input.attr(marker(BindingRole::ContentType), "number");
        }
        form = form.child(el("label").text(field).child(input));
    }
    form = form
        .child(
            el("button")
                .attr("type", "submit")
                .attr(marker(BindingRole::Action), "submit")
                .text("Save"),
        )
        .child(
            el("button")
                .attr("type", "reset")
                .attr(marker(BindingRole::Action), "reset")
                .text("Reset"),
        );

    let row: ElementSpec = el("tr")
        .attr(marker(BindingRole::RepeatTemplate), "")
        .children(
            schema
                .iter()
                .map(|(field, _)| el("td").attr(marker(BindingRole::ModelField), field)),
        )
        .child(
            el("td")
                .child(
                    el("button")
                        .attr(marker(BindingRole::Action), "edit")
                        .text("Edit"),
                )
                .child(
                    el("button")
                        .attr(marker(BindingRole::Action), "delete")
                        .text("Delete"),
                ),
        );

    let header = el("tr").children(schema.iter().map(|(field, _)| el("th").text(field)));

    let page = el("div")
        .attr(marker(BindingRole::AppRoot), "")
        .child(
            el("div")
                .attr(marker(BindingRole::WarningPanel), "")
                .child(el("div").attr(marker(BindingRole::WarningText), "")),
        )
        .child(form)
        .child(
            el("table")
                .child(el("thead").child(header))
                .child(el("tbody").child(row)),
        );

    let document = dom.document();
    let root = dom.append_spec(document, &page)?;
    let panel = dom
        .query_attribute(&root, marker(BindingRole::WarningPanel), None)
        .unwrap_or(root);
    dom.set_style(&panel, "display", "none")?;
    Ok(root)
}
