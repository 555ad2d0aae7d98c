use std::any::Any;
use std::rc::Rc;

use crate::state::{State, StateStore};

/// External owner of a component's state.
///
/// A controlled component subscribes to [`Controller::store`] while
/// connected and re-renders on every update published there. Its own
/// `update` / `update_app` are disabled.
pub trait Controller: Any {
    fn store(&self) -> &Rc<StateStore>;

    fn state(&self) -> State {
        self.store().state()
    }

    fn update(&self, partial: &State) {
        self.store().update(partial);
    }
}

/// Plain controller that only holds state.
#[derive(Debug, Default)]
pub struct StateController {
    store: Rc<StateStore>,
}

impl StateController {
    pub fn new(initial: State) -> Self {
        Self {
            store: Rc::new(StateStore::new(initial)),
        }
    }
}

impl Controller for StateController {
    fn store(&self) -> &Rc<StateStore> {
        &self.store
    }
}
