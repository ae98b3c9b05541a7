//! Change notification bus.
//!
//! # Responsibility
//! - Fan one published event out to every registered listener.
//! - Decouple the record store from whatever renders it.
//!
//! # Invariants
//! - Listener list is ordered by registration and never holds duplicates.
//! - `publish` dispatches to a snapshot taken at publish time; listeners
//!   added or removed during dispatch only affect later publishes.
//! - Dispatch is synchronous and single-threaded.

use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

pub type BusResult<T> = Result<T, BusError>;

/// Wiring errors raised by bus subscription management.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// `unsubscribe` was called with a listener that was never registered.
    ListenerNotFound,
}

impl Display for BusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ListenerNotFound => write!(f, "no such listener registered on bus"),
        }
    }
}

impl Error for BusError {}

/// Shared handle to one listener callback.
///
/// Identity is the handle's allocation: clones of one `Listener` are the
/// same listener, two `Listener::new` calls with equal closures are not.
pub struct Listener<A> {
    callback: Rc<dyn Fn(&A)>,
}

impl<A> Listener<A> {
    pub fn new(callback: impl Fn(&A) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    /// Returns whether both handles point at the same callback.
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }

    fn call(&self, args: &A) {
        (self.callback)(args)
    }
}

impl<A> Clone for Listener<A> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<A> Debug for Listener<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.callback))
    }
}

/// One-to-many synchronous event channel.
pub struct ChangeBus<A> {
    listeners: RefCell<Vec<Listener<A>>>,
}

impl<A> Default for ChangeBus<A> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }
}

impl<A> Debug for ChangeBus<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("listeners", &self.len())
            .finish()
    }
}

impl<A> ChangeBus<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`. Registering the same listener twice is a no-op.
    pub fn subscribe(&self, listener: &Listener<A>) {
        let mut listeners = self.listeners.borrow_mut();
        if listeners.iter().any(|existing| existing.same_as(listener)) {
            return;
        }
        listeners.push(listener.clone());
    }

    /// Removes `listener`.
    ///
    /// # Errors
    /// - `BusError::ListenerNotFound` when the listener was never registered.
    pub fn unsubscribe(&self, listener: &Listener<A>) -> BusResult<()> {
        let mut listeners = self.listeners.borrow_mut();
        match listeners
            .iter()
            .position(|existing| existing.same_as(listener))
        {
            Some(index) => {
                listeners.remove(index);
                Ok(())
            }
            None => Err(BusError::ListenerNotFound),
        }
    }

    /// Invokes every listener registered at call time, in registration order.
    pub fn publish(&self, args: &A) {
        let snapshot = self.listeners.borrow().clone();
        for listener in &snapshot {
            listener.call(args);
        }
    }

    pub fn contains(&self, listener: &Listener<A>) -> bool {
        self.listeners
            .borrow()
            .iter()
            .any(|existing| existing.same_as(listener))
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}
