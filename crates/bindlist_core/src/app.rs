//! Application context.
//!
//! # Responsibility
//! - Own one record store, its view and controller for a single page.
//! - Run the two-phase startup: restore, attach, then publish the load event.
//!
//! # Invariants
//! - The view is attached before the load event fires, so restored records
//!   render exactly once.
//! - An `App` is single-threaded; shared parts live in `Rc<RefCell<_>>`.
//!
//! # See also
//! - `config` for the accepted configuration surface.

use crate::binding::Bindings;
use crate::bus::BusResult;
use crate::config::{AppConfig, ConfigError};
use crate::controller::{Action, Controller, UiEvent};
use crate::dom::Dom;
use crate::model::store::Model;
use crate::storage::KeyValueStore;
use crate::view::{View, ViewError, ViewListeners, ViewResult};
use log::{error, info};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    View(ViewError),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration rejected: {err}"),
            Self::View(err) => write!(f, "view setup failed: {err}"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::View(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ViewError> for AppError {
    fn from(value: ViewError) -> Self {
        Self::View(value)
    }
}

/// One bound page: record store, view and controller.
pub struct App<D: Dom + 'static, S: KeyValueStore> {
    config: AppConfig,
    bindings: Bindings,
    model: Rc<RefCell<Model<S>>>,
    view: Rc<RefCell<View<D>>>,
    controller: Controller<D, S>,
    listeners: ViewListeners,
}

impl<D: Dom + 'static, S: KeyValueStore> App<D, S> {
    /// Boots an application on a loaded page.
    ///
    /// # Errors
    /// - `AppError::Config` when `config` fails validation.
    /// - `AppError::View` when the page lacks a bound element.
    pub fn bootstrap(dom: D, storage: S, config: AppConfig) -> AppResult<Self> {
        let bindings = config.validate().map_err(|err| {
            error!(
                "event=app_bootstrap module=app status=error stage=config error={}",
                err
            );
            err
        })?;

        let model = Rc::new(RefCell::new(Model::new(
            storage,
            config.schema.clone(),
            config.storage_keys.clone(),
        )));
        let view = match View::new(dom, &bindings, &config.highlight_class) {
            Ok(view) => Rc::new(RefCell::new(view)),
            Err(err) => {
                error!(
                    "event=app_bootstrap module=app status=error stage=view error={}",
                    err
                );
                return Err(err.into());
            }
        };

        let listeners = View::attach(&view, &*model.borrow());
        let loaded = model.borrow_mut().activate();
        let controller = Controller::new(Rc::clone(&model), Rc::clone(&view), &bindings);

        info!(
            "event=app_bootstrap module=app status=ok records={} loaded={}",
            model.borrow().len(),
            loaded
        );

        Ok(Self {
            config,
            bindings,
            model,
            view,
            controller,
            listeners,
        })
    }

    /// Routes one UI event through the controller.
    pub fn dispatch(&self, event: UiEvent<D::Node>) -> ViewResult<Option<Action>> {
        self.controller.dispatch(event)
    }

    /// Unsubscribes the view; later store changes no longer touch the page.
    pub fn detach(&self) -> BusResult<()> {
        self.listeners.detach(&*self.model.borrow())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn model(&self) -> &Rc<RefCell<Model<S>>> {
        &self.model
    }

    pub fn view(&self) -> &Rc<RefCell<View<D>>> {
        &self.view
    }

    pub fn controller(&self) -> &Controller<D, S> {
        &self.controller
    }
}
