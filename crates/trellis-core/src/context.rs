use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::component::Component;

/// Shared object resolved by name through the component tree.
///
/// Providers list instances under `default_contexts`; consumers name them in
/// `contexts` or look them up with [`Component::get_context`]. Each
/// consuming component is bound once and unbound once it leaves the tree.
pub trait Context: Any {
    fn bind_to_component(&self, _component: &Component) {}
    fn unbind_from_component(&self, _component: &Component) {}
}

pub type ContextMap = HashMap<String, Rc<dyn Context>>;

/// Contexts waiting for the frame after a disconnect to be unbound.
#[derive(Default)]
pub(crate) struct PendingUnbind {
    contexts: RefCell<ContextMap>,
    cancelled: Cell<bool>,
}

impl PendingUnbind {
    pub(crate) fn new(contexts: ContextMap) -> Rc<Self> {
        Rc::new(Self {
            contexts: RefCell::new(contexts),
            cancelled: Cell::new(false),
        })
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Stops the scheduled unbind and hands the contexts back.
    pub(crate) fn cancel(&self) -> ContextMap {
        self.cancelled.set(true);
        self.take()
    }

    pub(crate) fn take(&self) -> ContextMap {
        std::mem::take(&mut *self.contexts.borrow_mut())
    }
}
