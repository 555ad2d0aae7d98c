use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::document::{Event, Listener};

/// Virtual node produced by a render function.
#[derive(Clone)]
pub enum VNode {
    Element(VElement),
    Text(String),
}

#[derive(Clone)]
pub struct VElement {
    pub tag: String,
    /// Identity among siblings; keyed children are matched by key when diffing.
    pub key: Option<String>,
    pub attrs: SmallVec<[(String, String); 4]>,
    pub listeners: SmallVec<[(String, Listener); 1]>,
    pub children: Vec<VNode>,
}

/// Starts an element builder.
pub fn h(tag: impl Into<String>) -> VElement {
    VElement::new(tag)
}

pub fn text(t: impl Into<String>) -> VNode {
    VNode::Text(t.into())
}

impl VElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            key: None,
            attrs: SmallVec::new(),
            listeners: SmallVec::new(),
            children: Vec::new(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets an attribute; a repeated name overwrites the earlier value.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
        self
    }

    pub fn on(mut self, event: impl Into<String>, f: impl Fn(&Event) + 'static) -> Self {
        self.listeners.push((event.into(), Rc::new(f)));
        self
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_children(mut self, kids: impl IntoIterator<Item = VNode>) -> Self {
        self.children.extend(kids);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl VNode {
    pub fn key(&self) -> Option<&str> {
        match self {
            VNode::Element(el) => el.key.as_deref(),
            VNode::Text(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&VElement> {
        match self {
            VNode::Element(el) => Some(el),
            VNode::Text(_) => None,
        }
    }
}

impl From<VElement> for VNode {
    fn from(el: VElement) -> Self {
        VNode::Element(el)
    }
}

impl From<String> for VNode {
    fn from(t: String) -> Self {
        VNode::Text(t)
    }
}

impl From<&str> for VNode {
    fn from(t: &str) -> Self {
        VNode::Text(t.to_owned())
    }
}

impl fmt::Debug for VElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VElement")
            .field("tag", &self.tag)
            .field("key", &self.key)
            .field("attrs", &self.attrs)
            .field(
                "listeners",
                &self.listeners.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("children", &self.children)
            .finish()
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNode::Element(el) => el.fmt(f),
            VNode::Text(t) => f.debug_tuple("Text").field(t).finish(),
        }
    }
}
