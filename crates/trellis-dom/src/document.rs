//! # Document
//!
//! An arena-backed model of the host page: elements, text nodes and shadow
//! roots, with attributes and event listeners on elements.
//!
//! The document does not run component code itself. Mutations that a browser
//! would turn into custom-element callbacks are recorded as [`Reaction`]s and
//! drained by whoever owns the document (the `trellis-core` host):
//!
//! - `Created` when an element with a defined tag is created,
//! - `Connected` / `Disconnected` when such an element enters or leaves the
//!   document (shadow-including tree order),
//! - `AttributeChanged` when an observed attribute is written.

use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::error::DomError;

new_key_type! {
    /// Handle to a node in a [`Document`].
    pub struct NodeId;
}

/// Event delivered to listeners registered with [`Document::add_listener`].
#[derive(Clone, Debug)]
pub struct Event {
    pub name: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
    /// Node whose listener is currently running.
    pub current: NodeId,
}

pub type Listener = Rc<dyn Fn(&Event)>;

/// External source of custom-element definitions, consulted in addition to
/// tags registered with [`Document::define`].
pub trait ElementDefinitions {
    fn is_defined(&self, tag: &str) -> bool;
    fn is_observed(&self, tag: &str, attr: &str) -> bool;
}

/// Queued custom-element lifecycle notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reaction {
    Created(NodeId),
    Connected(NodeId),
    Disconnected(NodeId),
    AttributeChanged {
        node: NodeId,
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
}

pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) attrs: SmallVec<[(String, String); 4]>,
    pub(crate) shadow_root: Option<NodeId>,
    pub(crate) listeners: SmallVec<[(String, Listener); 1]>,
}

pub(crate) enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    ShadowRoot { host: NodeId },
}

pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

pub struct Document {
    pub(crate) nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    body: NodeId,
    /// tag -> observed attribute names
    defined: HashMap<String, HashSet<String>>,
    definitions: Option<Rc<dyn ElementDefinitions>>,
    reactions: VecDeque<Reaction>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
        });
        let body = nodes.insert(Node {
            kind: NodeKind::Element(ElementData {
                tag: "body".into(),
                attrs: SmallVec::new(),
                shadow_root: None,
                listeners: SmallVec::new(),
            }),
            parent: Some(root),
            children: Vec::new(),
        });
        nodes[root].children.push(body);
        Self {
            nodes,
            root,
            body,
            defined: HashMap::new(),
            definitions: None,
            reactions: VecDeque::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Marks `tag` as a custom element whose lifecycle should be recorded.
    pub fn define(&mut self, tag: &str, observed: impl IntoIterator<Item = String>) {
        self.defined
            .insert(tag.to_owned(), observed.into_iter().collect());
    }

    pub fn set_definitions(&mut self, definitions: Rc<dyn ElementDefinitions>) {
        self.definitions = Some(definitions);
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.defined.contains_key(tag)
            || self.definitions.as_ref().is_some_and(|d| d.is_defined(tag))
    }

    fn is_observed(&self, tag: &str, attr: &str) -> bool {
        match self.defined.get(tag) {
            Some(attrs) => attrs.contains(attr),
            None => self
                .definitions
                .as_ref()
                .is_some_and(|d| d.is_defined(tag) && d.is_observed(tag, attr)),
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create_element_with_attrs(tag, std::iter::empty())
    }

    /// Creates an element with its initial attributes already in place.
    ///
    /// Initial attributes never produce `AttributeChanged` reactions; the
    /// component reads them when it is constructed.
    pub fn create_element_with_attrs(
        &mut self,
        tag: &str,
        attrs: impl IntoIterator<Item = (String, String)>,
    ) -> NodeId {
        let mut list: SmallVec<[(String, String); 4]> = SmallVec::new();
        for (k, v) in attrs {
            match list.iter_mut().find(|(name, _)| *name == k) {
                Some(slot) => slot.1 = v,
                None => list.push((k, v)),
            }
        }
        let id = self.nodes.insert(Node {
            kind: NodeKind::Element(ElementData {
                tag: tag.to_owned(),
                attrs: list,
                shadow_root: None,
                listeners: SmallVec::new(),
            }),
            parent: None,
            children: Vec::new(),
        });
        if self.is_defined(tag) {
            self.reactions.push_back(Reaction::Created(id));
        }
        id
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.nodes.insert(Node {
            kind: NodeKind::Text(text.into()),
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId, DomError> {
        match &self.node(host)?.kind {
            NodeKind::Element(el) if el.shadow_root.is_some() => {
                return Err(DomError::ShadowRootExists(host));
            }
            NodeKind::Element(_) => {}
            _ => return Err(DomError::NotAnElement(host)),
        }
        let shadow = self.nodes.insert(Node {
            kind: NodeKind::ShadowRoot { host },
            parent: None,
            children: Vec::new(),
        });
        if let NodeKind::Element(el) = &mut self.nodes[host].kind {
            el.shadow_root = Some(shadow);
        }
        Ok(shadow)
    }

    pub fn shadow_root(&self, node: NodeId) -> Option<NodeId> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Element(el) => el.shadow_root,
            _ => None,
        }
    }

    /// Host element of a shadow root.
    pub fn shadow_host(&self, node: NodeId) -> Option<NodeId> {
        match &self.nodes.get(node)?.kind {
            NodeKind::ShadowRoot { host } => Some(*host),
            _ => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node)?.parent
    }

    /// Parent in the composed tree: the parent node, or the host when `node`
    /// is a shadow root.
    pub fn composed_parent(&self, node: NodeId) -> Option<NodeId> {
        let n = self.nodes.get(node)?;
        match n.kind {
            NodeKind::ShadowRoot { host } => Some(host),
            _ => n.parent,
        }
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Element(el) => Some(el.tag.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.tag(node).is_some()
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.kind {
            NodeKind::Text(t) => {
                *t = text.into();
                Ok(())
            }
            _ => Err(DomError::NotAText(node)),
        }
    }

    /// Concatenated text of all descendant text nodes (light tree only).
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        if let Some(t) = self.text(node) {
            out.push_str(t);
        }
        for &c in self.children(node) {
            self.collect_text(c, out);
        }
    }

    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)
            .ok()?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.get_attribute(node, name).is_some()
    }

    pub fn attributes(&self, node: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.element(node)
            .ok()
            .into_iter()
            .flat_map(|el| el.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        let value = value.into();
        let el = self.element_mut(node)?;
        let old = match el.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => Some(std::mem::replace(&mut slot.1, value.clone())),
            None => {
                el.attrs.push((name.to_owned(), value.clone()));
                None
            }
        };
        self.queue_attribute_changed(node, name, old, Some(value));
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        let Some(pos) = el.attrs.iter().position(|(k, _)| k == name) else {
            return Ok(());
        };
        let (_, old) = el.attrs.remove(pos);
        self.queue_attribute_changed(node, name, Some(old), None);
        Ok(())
    }

    fn queue_attribute_changed(
        &mut self,
        node: NodeId,
        name: &str,
        old: Option<String>,
        new: Option<String>,
    ) {
        let observed = self
            .tag(node)
            .is_some_and(|tag| self.is_observed(tag, name));
        if observed {
            self.reactions.push_back(Reaction::AttributeChanged {
                node,
                name: name.to_owned(),
                old,
                new,
            });
        }
    }

    pub fn add_listener(
        &mut self,
        node: NodeId,
        event: impl Into<String>,
        listener: Listener,
    ) -> Result<(), DomError> {
        self.element_mut(node)?
            .listeners
            .push((event.into(), listener));
        Ok(())
    }

    /// Replaces every listener on `node`.
    pub fn set_listeners(
        &mut self,
        node: NodeId,
        listeners: impl IntoIterator<Item = (String, Listener)>,
    ) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        el.listeners.clear();
        el.listeners.extend(listeners);
        Ok(())
    }

    /// Listeners for `event` along the composed path from `target` upwards.
    pub fn event_path(&self, target: NodeId, event: &str) -> Vec<(NodeId, Listener)> {
        let mut out = Vec::new();
        let mut cur = Some(target);
        while let Some(node) = cur {
            if let Ok(el) = self.element(node) {
                out.extend(
                    el.listeners
                        .iter()
                        .filter(|(name, _)| name == event)
                        .map(|(_, l)| (node, l.clone())),
                );
            }
            cur = self.composed_parent(node);
        }
        out
    }

    /// Whether `node` is reachable from the document root, crossing shadow
    /// roots to their hosts.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == self.root {
                return true;
            }
            cur = self.composed_parent(n);
        }
        false
    }

    /// Whether `ancestor` is `node` or one of its composed ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.composed_parent(n);
        }
        false
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` under `parent` before `reference` (or last).
    ///
    /// A child that already has a parent is detached first, which records a
    /// `Disconnected`/`Connected` pair for custom elements moved within the
    /// document.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if let NodeKind::Text(_) = self.node(parent)?.kind {
            return Err(DomError::NotAContainer(parent));
        }
        if let NodeKind::Document | NodeKind::ShadowRoot { .. } = self.node(child)?.kind {
            return Err(DomError::NotInsertable(child));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(r) = reference
            && self.parent(r) != Some(parent)
        {
            return Err(DomError::NotAChild { parent, child: r });
        }
        if reference == Some(child) {
            return Ok(());
        }

        self.detach(child);

        let siblings = &mut self.nodes[parent].children;
        let idx = reference
            .and_then(|r| siblings.iter().position(|&c| c == r))
            .unwrap_or(siblings.len());
        siblings.insert(idx, child);
        self.nodes[child].parent = Some(parent);

        if self.is_connected(parent) {
            let mut custom = Vec::new();
            self.collect_custom(child, &mut custom);
            self.reactions
                .extend(custom.into_iter().map(Reaction::Connected));
        }
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.node(child)?.parent != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(child);
        Ok(())
    }

    pub fn replace_child(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> Result<(), DomError> {
        if new_child == old_child {
            return Ok(());
        }
        self.insert_before(parent, new_child, Some(old_child))?;
        self.remove_child(parent, old_child)
    }

    /// Detaches `node` from its parent, if any.
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get(node).and_then(|n| n.parent) else {
            return;
        };
        let was_connected = self.is_connected(node);
        self.nodes[parent].children.retain(|&c| c != node);
        self.nodes[node].parent = None;
        if was_connected {
            let mut custom = Vec::new();
            self.collect_custom(node, &mut custom);
            self.reactions
                .extend(custom.into_iter().map(Reaction::Disconnected));
        }
    }

    /// Custom elements in shadow-including tree order.
    fn collect_custom(&self, node: NodeId, out: &mut Vec<NodeId>) {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        if let NodeKind::Element(el) = &n.kind {
            if self.is_defined(&el.tag) {
                out.push(node);
            }
            if let Some(shadow) = el.shadow_root {
                for &c in &self.nodes[shadow].children {
                    self.collect_custom(c, out);
                }
            }
        }
        for &c in &n.children {
            self.collect_custom(c, out);
        }
    }

    pub fn pop_reaction(&mut self) -> Option<Reaction> {
        self.reactions.pop_front()
    }

    pub fn pending_reactions(&self) -> usize {
        self.reactions.len()
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id).ok_or(DomError::MissingNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id).ok_or(DomError::MissingNode(id))
    }

    pub(crate) fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        match &self.node(id)?.kind {
            NodeKind::Element(el) => Ok(el),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(el) => Ok(el),
            _ => Err(DomError::NotAnElement(id)),
        }
    }
}
