use std::cell::RefCell;

/// How [`crate::Router::replace_hash`] writes to history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistoryMethod {
    #[default]
    Push,
    Replace,
}

/// The slice of `window.location` / `window.history` the router needs.
pub trait Location {
    /// Current fragment including the leading `#`, or empty.
    fn hash(&self) -> String;
    fn push(&self, url: &str);
    fn replace(&self, url: &str);
}

/// History kept in memory, for hosts without a browser.
#[derive(Debug)]
pub struct MemoryLocation {
    entries: RefCell<Vec<String>>,
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new("")
    }
}

impl MemoryLocation {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: RefCell::new(vec![initial.into()]),
        }
    }

    /// Every entry written so far, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Drops the newest entry, like the browser back button.
    pub fn back(&self) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.len() > 1 {
            entries.pop();
            true
        } else {
            false
        }
    }
}

impl Location for MemoryLocation {
    fn hash(&self) -> String {
        let entries = self.entries.borrow();
        let url = entries.last().map(String::as_str).unwrap_or("");
        url.find('#').map(|i| url[i..].to_owned()).unwrap_or_default()
    }

    fn push(&self, url: &str) {
        self.entries.borrow_mut().push(url.to_owned());
    }

    fn replace(&self, url: &str) {
        let mut entries = self.entries.borrow_mut();
        match entries.last_mut() {
            Some(last) => *last = url.to_owned(),
            None => entries.push(url.to_owned()),
        }
    }
}
