use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use trellis_dom::ElementDefinitions;

use crate::config::Config;
use crate::error::RegistryError;

pub type Factory = Rc<dyn Fn() -> Config>;

thread_local! {
    static GLOBAL: Rc<Registry> = Rc::new(Registry::new());
}

/// Tag name to component factory.
#[derive(Default)]
pub struct Registry {
    factories: RefCell<HashMap<String, Factory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-thread registry used by [`crate::Host::new`].
    pub fn global() -> Rc<Registry> {
        GLOBAL.with(Rc::clone)
    }

    pub fn define(
        &self,
        tag: &str,
        factory: impl Fn() -> Config + 'static,
    ) -> Result<(), RegistryError> {
        if !is_valid_tag(tag) {
            return Err(RegistryError::InvalidTagName(tag.to_owned()));
        }
        let mut factories = self.factories.borrow_mut();
        if factories.contains_key(tag) {
            return Err(RegistryError::AlreadyDefined(tag.to_owned()));
        }
        factories.insert(tag.to_owned(), Rc::new(factory));
        log::debug!("defined <{tag}>");
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<Factory> {
        self.factories.borrow().get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.borrow().contains_key(tag)
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.factories.borrow().keys().cloned().collect();
        tags.sort();
        tags
    }
}

// Components filter attribute changes against their own schema, so every
// attribute of a defined element is reported.
impl ElementDefinitions for Registry {
    fn is_defined(&self, tag: &str) -> bool {
        self.contains(tag)
    }

    fn is_observed(&self, _tag: &str, _attr: &str) -> bool {
        true
    }
}

/// Lowercase ASCII letter first, at least one hyphen, then lowercase
/// letters, digits, `-`, `.` or `_`.
fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && tag.contains('-')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
}
