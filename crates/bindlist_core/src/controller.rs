//! UI event glue.
//!
//! # Responsibility
//! - Translate submit/reset/click events into record store and view calls.
//! - Read typed form input through the view's form-field index.
//!
//! # Invariants
//! - The view is never borrowed while the record store publishes, so view
//!   listeners can always patch the document.
//! - Clicks on elements without a known action are ignored.

use crate::binding::{BindingRole, Bindings};
use crate::dom::Dom;
use crate::model::record::{FieldValue, Record, RecordId};
use crate::model::schema::ValidationErrors;
use crate::model::store::{Model, Mutation};
use crate::storage::KeyValueStore;
use crate::view::{View, ViewResult};
use log::{info, warn};
use std::cell::RefCell;
use std::rc::Rc;

/// Content type value that triggers numeric coercion.
pub const CONTENT_TYPE_NUMBER: &str = "number";

/// Raw UI event delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent<N> {
    Submit,
    Reset,
    /// Click on `N`; dispatched by its action marker.
    Click(N),
}

/// Action names carried by action markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    Reset,
    Delete,
    Edit,
}

impl Action {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "submit" => Some(Self::Submit),
            "reset" => Some(Self::Reset),
            "delete" => Some(Self::Delete),
            "edit" => Some(Self::Edit),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Reset => "reset",
            Self::Delete => "delete",
            Self::Edit => "edit",
        }
    }
}

/// Result of a form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved(Mutation),
    Rejected(ValidationErrors),
}

/// Wires UI events to a record store and its view.
pub struct Controller<D: Dom, S: KeyValueStore> {
    model: Rc<RefCell<Model<S>>>,
    view: Rc<RefCell<View<D>>>,
    action_marker: String,
    target_marker: String,
}

impl<D: Dom, S: KeyValueStore> Controller<D, S> {
    pub fn new(
        model: Rc<RefCell<Model<S>>>,
        view: Rc<RefCell<View<D>>>,
        bindings: &Bindings,
    ) -> Self {
        Self {
            model,
            view,
            action_marker: bindings.marker(BindingRole::Action).to_string(),
            target_marker: bindings.marker(BindingRole::TargetId).to_string(),
        }
    }

    pub fn dispatch(&self, event: UiEvent<D::Node>) -> ViewResult<Option<Action>> {
        match event {
            UiEvent::Submit => self.submit().map(|_| Some(Action::Submit)),
            UiEvent::Reset => self.reset().map(|_| Some(Action::Reset)),
            UiEvent::Click(target) => self.click(&target),
        }
    }

    /// Saves the form as a record.
    ///
    /// Rejected input is listed in the warning panel; accepted input clears
    /// the warning and resets the form.
    pub fn submit(&self) -> ViewResult<SubmitOutcome> {
        self.view.borrow_mut().hide_warning()?;
        let record = self.collect_form();
        let result = self.model.borrow_mut().add(record);
        let mut view = self.view.borrow_mut();
        match result {
            Ok(mutation) => {
                view.hide_warning()?;
                view.reset_form()?;
                Ok(SubmitOutcome::Saved(mutation))
            }
            Err(errors) => {
                view.show_warning(errors.as_slice())?;
                Ok(SubmitOutcome::Rejected(errors))
            }
        }
    }

    /// Clears the form, the warning panel and highlight tracking.
    pub fn reset(&self) -> ViewResult<()> {
        let mut view = self.view.borrow_mut();
        view.reset_form()?;
        view.hide_warning()?;
        view.highlight(None)
    }

    /// Removes record `id`; returns whether it existed.
    pub fn delete(&self, id: RecordId) -> bool {
        self.model.borrow_mut().remove(id)
    }

    /// Highlights row `id` and loads its record into the form.
    ///
    /// Returns `false` when the record does not exist; the form is untouched.
    pub fn edit(&self, id: RecordId) -> ViewResult<bool> {
        self.view.borrow_mut().highlight(Some(id))?;
        let lookup = self.model.borrow().get(id);
        match lookup {
            Ok(record) => {
                self.view.borrow_mut().populate_form(&record)?;
                Ok(true)
            }
            Err(err) => {
                warn!(
                    "event=controller_edit module=controller status=not_found id={} error={}",
                    id, err
                );
                Ok(false)
            }
        }
    }

    /// Delegated click handling by the target's action marker.
    ///
    /// Returns the action performed, or `None` when the click was ignored.
    pub fn click(&self, target: &D::Node) -> ViewResult<Option<Action>> {
        let (action, target_id) = {
            let view = self.view.borrow();
            let dom = view.dom();
            (
                dom.attribute(target, &self.action_marker),
                dom.attribute(target, &self.target_marker),
            )
        };
        let Some(action) = action.as_deref().and_then(Action::parse) else {
            return Ok(None);
        };

        match action {
            Action::Submit => {
                self.submit()?;
            }
            Action::Reset => self.reset()?,
            Action::Delete | Action::Edit => {
                let Some(id) = target_id
                    .as_deref()
                    .and_then(|raw| raw.trim().parse::<RecordId>().ok())
                else {
                    warn!(
                        "event=controller_click module=controller status=ignored action={} reason=missing_id",
                        action.as_str()
                    );
                    return Ok(None);
                };
                if action == Action::Delete {
                    self.delete(id);
                } else {
                    self.edit(id)?;
                }
            }
        }
        info!(
            "event=controller_click module=controller status=ok action={}",
            action.as_str()
        );
        Ok(Some(action))
    }

    /// Reads every bound form field, coercing numeric content types.
    pub fn collect_form(&self) -> Record {
        let view = self.view.borrow();
        let dom = view.dom();
        let mut record = Record::new();
        for (field, node) in view.form_fields().iter() {
            let raw = dom.value(node);
            let value = match dom.attribute(node, view.content_type_marker()).as_deref() {
                Some(CONTENT_TYPE_NUMBER) => coerce_number(&raw),
                _ => FieldValue::Text(raw),
            };
            record.insert(field, value);
        }
        record
    }

    pub fn model(&self) -> &Rc<RefCell<Model<S>>> {
        &self.model
    }

    pub fn view(&self) -> &Rc<RefCell<View<D>>> {
        &self.view
    }
}

/// Blank input is absent; anything unparsable or non-finite (`inf`, `nan`)
/// becomes NaN for validation.
fn coerce_number(raw: &str) -> FieldValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FieldValue::Null;
    }
    let number = trimmed
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .unwrap_or(f64::NAN);
    FieldValue::Number(number)
}
