use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;

pub use trellis_router::State;

use crate::signal::SubId;

type UpdateListener = Rc<dyn Fn(&State)>;

/// Shallow-merging state container.
///
/// A store is shared by every component in a state tree, so writes from any
/// member are visible to all of them. Subscribers receive each merged
/// partial, not the full state.
#[derive(Default)]
pub struct StateStore {
    state: RefCell<State>,
    listeners: RefCell<Vec<(SubId, UpdateListener)>>,
    next: Cell<SubId>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.state.borrow())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

impl StateStore {
    pub fn new(initial: State) -> Self {
        Self {
            state: RefCell::new(initial),
            ..Self::default()
        }
    }

    /// Snapshot of the whole state.
    pub fn state(&self) -> State {
        self.state.borrow().clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.borrow().get(key).cloned()
    }

    /// Merges `partial` key by key, then notifies subscribers.
    pub fn update(&self, partial: &State) {
        merge(&mut self.state.borrow_mut(), partial);
        let listeners: Vec<UpdateListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for l in listeners {
            l(partial);
        }
    }

    /// Overwrites the state without notifying anyone.
    pub fn replace(&self, state: State) {
        *self.state.borrow_mut() = state;
    }

    pub fn subscribe_updates(&self, f: impl Fn(&State) + 'static) -> SubId {
        let id = self.next.get();
        self.next.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::new(f)));
        id
    }

    pub fn unsubscribe_updates(&self, id: SubId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

pub fn merge(target: &mut State, partial: &State) {
    for (k, v) in partial {
        target.insert(k.clone(), v.clone());
    }
}

/// Turns a JSON object into a [`State`]; anything else yields an empty one.
pub fn into_state(value: Value) -> State {
    match value {
        Value::Object(map) => map,
        Value::Null => State::new(),
        other => {
            log::warn!("expected a JSON object for state, got {other}");
            State::new()
        }
    }
}

/// `json!`-style shorthand for building a [`State`].
#[macro_export]
macro_rules! state {
    ($($tt:tt)*) => {
        $crate::state::into_state($crate::serde_json::json!({ $($tt)* }))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_merges_shallowly_and_notifies_with_partial() {
        let store = StateStore::new(crate::state! { "a": 1, "nested": {"x": 1} });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let id = store.subscribe_updates(move |p| s.borrow_mut().push(p.clone()));

        store.update(&crate::state! { "nested": {"y": 2} });
        assert_eq!(store.get("a"), Some(json!(1)));
        assert_eq!(store.get("nested"), Some(json!({"y": 2})));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0], crate::state! { "nested": {"y": 2} });

        assert!(store.unsubscribe_updates(id));
        store.update(&crate::state! { "a": 2 });
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn non_objects_become_empty_state() {
        assert!(into_state(json!([1, 2])).is_empty());
        assert!(into_state(Value::Null).is_empty());
    }
}
