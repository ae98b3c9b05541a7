//! Record list view.
//!
//! # Responsibility
//! - Keep rendered rows in sync with record store events.
//! - Own transient UI state: the highlighted row and the warning panel.
//!
//! # Invariants
//! - At most one row is highlighted at any time.
//! - Rows are located by their row-id marker, never cached.
//! - Patches are direct insert/replace/remove calls; no diffing.
//! - Rows and warning lists the view drops are discarded from the document.
//!
//! # See also
//! - `template` for row rendering.

use crate::binding::{AttributeIndex, BindingRole, Bindings};
use crate::bus::{BusResult, Listener};
use crate::dom::{Dom, DomError};
use crate::model::record::{Record, RecordId, Store};
use crate::model::schema::ValidationError;
use crate::model::store::{Model, RecordChange};
use crate::storage::KeyValueStore;
use log::{debug, error, warn};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::{Rc, Weak};

pub mod template;

pub use template::Template;

pub type ViewResult<T> = Result<T, ViewError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// A required page element could not be located.
    MissingElement(String),
    Dom(DomError),
}

impl Display for ViewError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingElement(what) => write!(f, "page element missing: {what}"),
            Self::Dom(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ViewError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MissingElement(_) => None,
            Self::Dom(err) => Some(err),
        }
    }
}

impl From<DomError> for ViewError {
    fn from(value: DomError) -> Self {
        Self::Dom(value)
    }
}

/// Listener handles registered by `View::attach`.
pub struct ViewListeners {
    add: Listener<RecordChange>,
    edit: Listener<RecordChange>,
    remove: Listener<RecordId>,
    load: Listener<Store>,
}

impl ViewListeners {
    /// Unsubscribes every view listener from `model`.
    pub fn detach<S: KeyValueStore>(&self, model: &Model<S>) -> BusResult<()> {
        model.add_bus().unsubscribe(&self.add)?;
        model.edit_bus().unsubscribe(&self.edit)?;
        model.remove_bus().unsubscribe(&self.remove)?;
        model.load_bus().unsubscribe(&self.load)?;
        Ok(())
    }
}

/// Renders records into the page's repeat region.
pub struct View<D: Dom> {
    dom: D,
    highlight_class: String,
    content_type_marker: String,
    root: D::Node,
    template: Template<D::Node>,
    warning_panel: D::Node,
    warning_text: D::Node,
    form: D::Node,
    form_fields: AttributeIndex<D::Node>,
    form_controls: AttributeIndex<D::Node>,
    highlighted: Option<RecordId>,
}

impl<D: Dom> View<D> {
    /// Locates the page parts and detaches the repeat template.
    ///
    /// # Errors
    /// - `ViewError::MissingElement` when the app root, repeat template,
    ///   warning panel, warning text or form cannot be found.
    pub fn new(mut dom: D, bindings: &Bindings, highlight_class: &str) -> ViewResult<Self> {
        let document = dom.document();
        let root = require(
            &dom,
            &document,
            bindings.marker(BindingRole::AppRoot),
            "application root",
        )?;
        let template_node = require(
            &dom,
            &root,
            bindings.marker(BindingRole::RepeatTemplate),
            "repeat template",
        )?;
        let warning_panel = require(
            &dom,
            &root,
            bindings.marker(BindingRole::WarningPanel),
            "warning panel",
        )?;
        let warning_text = require(
            &dom,
            &root,
            bindings.marker(BindingRole::WarningText),
            "warning text",
        )?;
        let form = dom
            .query_tag(&root, "form")
            .ok_or_else(|| ViewError::MissingElement("form".to_string()))?;

        let template = Template::detach(&mut dom, template_node, bindings)?;
        let form_fields =
            AttributeIndex::scan(&dom, &form, bindings.marker(BindingRole::FormField));
        let form_controls = AttributeIndex::scan(&dom, &form, bindings.marker(BindingRole::Action));

        Ok(Self {
            dom,
            highlight_class: highlight_class.to_string(),
            content_type_marker: bindings.marker(BindingRole::ContentType).to_string(),
            root,
            template,
            warning_panel,
            warning_text,
            form,
            form_fields,
            form_controls,
            highlighted: None,
        })
    }

    /// Renders one detached row for `record`.
    pub fn make_item(&mut self, record: &Record, id: RecordId) -> ViewResult<D::Node> {
        self.template.make_item(&mut self.dom, record, id)
    }

    /// Appends one rendered row.
    pub fn add_item(&mut self, record: &Record, id: RecordId) -> ViewResult<()> {
        let row = self.make_item(record, id)?;
        let container = self.template.container().clone();
        self.dom.append_child(&container, &row)?;
        Ok(())
    }

    /// Renders every record off-document, then appends them in one insert.
    pub fn add_items(&mut self, store: &Store) -> ViewResult<()> {
        let fragment = self.dom.create_fragment();
        for (id, record) in store {
            let row = self.make_item(record, *id)?;
            self.dom.append_child(&fragment, &row)?;
        }
        let container = self.template.container().clone();
        self.dom.append_child(&container, &fragment)?;
        self.dom.discard(&fragment);
        debug!(
            "event=view_render module=view status=ok mode=bulk rows={}",
            store.len()
        );
        Ok(())
    }

    /// Removes the row for `id`. Returns `false` when no such row exists.
    pub fn remove_item(&mut self, id: RecordId) -> ViewResult<bool> {
        let Some(row) = self.row(id) else {
            return Ok(false);
        };
        let container = self.template.container().clone();
        self.dom.remove_child(&container, &row)?;
        self.dom.discard(&row);
        if self.highlighted == Some(id) {
            self.highlighted = None;
        }
        Ok(true)
    }

    /// Replaces the row for `id` in place, or appends it when missing.
    ///
    /// Highlight state for `id` is cleared either way.
    pub fn edit_item(&mut self, record: &Record, id: RecordId) -> ViewResult<()> {
        match self.row(id) {
            Some(existing) => {
                let replacement = self.make_item(record, id)?;
                let container = self.template.container().clone();
                self.dom.replace_child(&container, &replacement, &existing)?;
                self.dom.discard(&existing);
            }
            None => self.add_item(record, id)?,
        }
        self.unhighlight(id)?;
        if self.highlighted == Some(id) {
            self.highlighted = None;
        }
        Ok(())
    }

    /// Moves the highlight to row `id`.
    ///
    /// `None` only forgets the tracked row; it does not touch the document.
    pub fn highlight(&mut self, id: Option<RecordId>) -> ViewResult<()> {
        let Some(id) = id else {
            self.highlighted = None;
            return Ok(());
        };
        if let Some(previous) = self.highlighted.take() {
            self.unhighlight(previous)?;
        }
        match self.row(id) {
            Some(row) => {
                let class = self.dom.attribute(&row, "class").unwrap_or_default();
                let updated = add_class_token(&class, &self.highlight_class);
                self.dom.set_attribute(&row, "class", &updated)?;
                self.highlighted = Some(id);
            }
            None => warn!("event=view_highlight module=view status=not_found id={}", id),
        }
        Ok(())
    }

    /// Strips the highlight class from row `id`, if it is rendered.
    pub fn unhighlight(&mut self, id: RecordId) -> ViewResult<()> {
        if let Some(row) = self.row(id) {
            if let Some(class) = self.dom.attribute(&row, "class") {
                let updated = remove_class_token(&class, &self.highlight_class);
                self.dom.set_attribute(&row, "class", &updated)?;
            }
        }
        Ok(())
    }

    /// Lists `errors` in the warning panel and shows it.
    pub fn show_warning(&mut self, errors: &[ValidationError]) -> ViewResult<()> {
        let list = self.dom.create_element("ul");
        for validation_error in errors {
            let line = self.dom.create_element("li");
            let text = self.dom.create_text_node(&validation_error.message);
            self.dom.append_child(&line, &text)?;
            self.dom.append_child(&list, &line)?;
        }
        let warning_text = self.warning_text.clone();
        self.dom.append_child(&warning_text, &list)?;
        let panel = self.warning_panel.clone();
        self.dom.set_style(&panel, "display", "block")?;
        warn!(
            "event=view_warning module=view status=shown errors={}",
            errors.len()
        );
        Ok(())
    }

    /// Clears and hides the warning panel.
    pub fn hide_warning(&mut self) -> ViewResult<()> {
        let warning_text = self.warning_text.clone();
        for child in self.dom.children(&warning_text) {
            self.dom.remove_child(&warning_text, &child)?;
            self.dom.discard(&child);
        }
        let panel = self.warning_panel.clone();
        self.dom.set_style(&panel, "display", "none")?;
        Ok(())
    }

    /// Subscribes `view` to the four record store buses.
    ///
    /// Listeners hold a weak reference; dropping the view silences them.
    /// Rendering failures inside listeners are logged.
    pub fn attach<S>(view: &Rc<RefCell<Self>>, model: &Model<S>) -> ViewListeners
    where
        D: 'static,
        S: KeyValueStore,
    {
        let add = {
            let weak = Rc::downgrade(view);
            Listener::new(move |(record, id): &RecordChange| {
                with_view(&weak, "add", |view| view.add_item(record, *id))
            })
        };
        let edit = {
            let weak = Rc::downgrade(view);
            Listener::new(move |(record, id): &RecordChange| {
                with_view(&weak, "edit", |view| view.edit_item(record, *id))
            })
        };
        let remove = {
            let weak = Rc::downgrade(view);
            Listener::new(move |id: &RecordId| {
                with_view(&weak, "remove", |view| view.remove_item(*id).map(|_| ()))
            })
        };
        let load = {
            let weak = Rc::downgrade(view);
            Listener::new(move |store: &Store| {
                with_view(&weak, "load", |view| view.add_items(store))
            })
        };

        model.add_bus().subscribe(&add);
        model.edit_bus().subscribe(&edit);
        model.remove_bus().subscribe(&remove);
        model.load_bus().subscribe(&load);

        ViewListeners {
            add,
            edit,
            remove,
            load,
        }
    }

    /// Rendered row for `id`, if any.
    pub fn row(&self, id: RecordId) -> Option<D::Node> {
        self.dom.query_attribute(
            self.template.container(),
            self.template.row_marker(),
            Some(id.to_string().as_str()),
        )
    }

    /// Row ids in document order.
    pub fn row_ids(&self) -> Vec<String> {
        let marker = self.template.row_marker();
        self.dom
            .children(self.template.container())
            .iter()
            .filter_map(|node| self.dom.attribute(node, marker))
            .collect()
    }

    /// Rows currently carrying the highlight class.
    pub fn highlighted_rows(&self) -> Vec<String> {
        let marker = self.template.row_marker();
        self.dom
            .children(self.template.container())
            .iter()
            .filter(|node| {
                self.dom
                    .attribute(node, "class")
                    .is_some_and(|class| has_class_token(&class, &self.highlight_class))
            })
            .filter_map(|node| self.dom.attribute(node, marker))
            .collect()
    }

    pub fn highlighted(&self) -> Option<RecordId> {
        self.highlighted
    }

    pub fn warning_visible(&self) -> bool {
        self.dom.style(&self.warning_panel, "display").as_deref() == Some("block")
    }

    /// Messages currently listed in the warning panel.
    pub fn warning_messages(&self) -> Vec<String> {
        self.dom
            .descendants(&self.warning_text)
            .iter()
            .filter(|node| self.dom.tag_name(node).as_deref() == Some("li"))
            .map(|node| self.dom.text_content(node))
            .collect()
    }

    /// Writes `record` into the bound form fields; missing fields become empty.
    pub fn populate_form(&mut self, record: &Record) -> ViewResult<()> {
        let fields: Vec<(String, D::Node)> = self
            .form_fields
            .iter()
            .map(|(field, node)| (field.to_string(), node.clone()))
            .collect();
        for (field, node) in fields {
            self.dom.set_value(&node, &record.display(&field))?;
        }
        Ok(())
    }

    pub fn reset_form(&mut self) -> ViewResult<()> {
        let form = self.form.clone();
        self.dom.reset_form(&form)?;
        Ok(())
    }

    /// Bound form fields, keyed by field name.
    pub fn form_fields(&self) -> &AttributeIndex<D::Node> {
        &self.form_fields
    }

    /// Form controls, keyed by action name.
    pub fn form_controls(&self) -> &AttributeIndex<D::Node> {
        &self.form_controls
    }

    pub fn content_type_marker(&self) -> &str {
        &self.content_type_marker
    }

    pub fn template(&self) -> &Template<D::Node> {
        &self.template
    }

    pub fn root(&self) -> &D::Node {
        &self.root
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }
}

fn require<D: Dom>(dom: &D, scope: &D::Node, marker: &str, what: &str) -> ViewResult<D::Node> {
    dom.query_attribute(scope, marker, None)
        .ok_or_else(|| ViewError::MissingElement(format!("{what} [{marker}]")))
}

fn with_view<D: Dom>(
    weak: &Weak<RefCell<View<D>>>,
    event: &str,
    apply: impl FnOnce(&mut View<D>) -> ViewResult<()>,
) {
    let Some(view) = weak.upgrade() else {
        return;
    };
    let mut view = view.borrow_mut();
    if let Err(err) = apply(&mut *view) {
        error!(
            "event=view_patch module=view status=error trigger={} error={}",
            event, err
        );
    }
}

fn has_class_token(class: &str, token: &str) -> bool {
    class.split_whitespace().any(|existing| existing == token)
}

fn add_class_token(class: &str, token: &str) -> String {
    if has_class_token(class, token) {
        return class.to_string();
    }
    if class.trim().is_empty() {
        token.to_string()
    } else {
        format!("{} {token}", class.trim_end())
    }
}

fn remove_class_token(class: &str, token: &str) -> String {
    class
        .split_whitespace()
        .filter(|existing| *existing != token)
        .collect::<Vec<_>>()
        .join(" ")
}
