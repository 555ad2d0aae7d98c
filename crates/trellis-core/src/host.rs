//! # Host
//!
//! The host owns the [`Document`] and plays the part of the browser's
//! custom-element machinery: after every mutation it drains the document's
//! reaction queue, constructing components for newly created elements and
//! connecting, disconnecting or notifying them in order.
//!
//! ```rust
//! use std::rc::Rc;
//! use trellis_core::prelude::*;
//!
//! let registry = Rc::new(Registry::new());
//! registry
//!     .define("x-hello", || {
//!         Config::new()
//!             .default_state(state! { "name": "world" })
//!             .view(|s| h("p").child(format!("hello {}", s.get("name").as_str().unwrap_or(""))).into())
//!     })
//!     .unwrap();
//!
//! let frames = Rc::new(FrameQueue::new());
//! let host = Host::with_options(HostOptions::new(frames.clone()).registry(registry));
//! let el = host.create_element("x-hello").unwrap();
//! host.append_child(host.body(), el).unwrap();
//! assert_eq!(host.inner_html(el), "<p>hello world</p>");
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use trellis_dom::{
    Document, Event, FrameCallback, FrameScheduler, NodeId, Reaction,
};
use trellis_router::{Location, MemoryLocation};

use crate::component::{Component, ComponentId};
use crate::error::{ComponentError, RegistryError};
use crate::registry::Registry;
use crate::reporter::{ErrorReporter, LogReporter, RenderErrorEvent};
use crate::signal::{Signal, SubId};
use crate::state::State;

#[derive(Clone)]
pub struct HostOptions {
    pub registry: Rc<Registry>,
    pub frames: Rc<dyn FrameScheduler>,
    pub location: Rc<dyn Location>,
    pub reporter: Rc<dyn ErrorReporter>,
}

impl HostOptions {
    /// Global registry, in-memory location and [`LogReporter`].
    pub fn new(frames: Rc<dyn FrameScheduler>) -> Self {
        Self {
            registry: Registry::global(),
            frames,
            location: Rc::new(MemoryLocation::default()),
            reporter: Rc::new(LogReporter),
        }
    }

    pub fn registry(mut self, registry: Rc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn location(mut self, location: Rc<dyn Location>) -> Self {
        self.location = location;
        self
    }

    pub fn reporter(mut self, reporter: Rc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }
}

pub struct Host {
    inner: Rc<HostInner>,
}

pub(crate) struct HostInner {
    doc: Rc<RefCell<Document>>,
    registry: Rc<Registry>,
    frames: Rc<dyn FrameScheduler>,
    location: Rc<dyn Location>,
    reporter: Rc<dyn ErrorReporter>,
    components: RefCell<HashMap<NodeId, Rc<Component>>>,
    by_id: RefCell<HashMap<ComponentId, NodeId>>,
    flushing: Cell<bool>,
    render_errors: Signal<Option<RenderErrorEvent>>,
}

/// Flushes the host's reaction queue after every frame callback, so work
/// done inside a frame (deferred renders, unbinds) is fully processed.
struct FlushingFrames {
    frames: Rc<dyn FrameScheduler>,
    host: Weak<HostInner>,
}

impl FrameScheduler for FlushingFrames {
    fn request_frame(&self, callback: FrameCallback) {
        let host = self.host.clone();
        self.frames.request_frame(Box::new(move || {
            callback();
            if let Some(host) = host.upgrade()
                && let Err(err) = host.flush()
            {
                log::error!("{err}");
            }
        }));
    }
}

impl Host {
    pub fn new(frames: Rc<dyn FrameScheduler>) -> Self {
        Self::with_options(HostOptions::new(frames))
    }

    pub fn with_options(options: HostOptions) -> Self {
        let mut doc = Document::new();
        doc.set_definitions(options.registry.clone());
        let inner = Rc::new_cyclic(|weak| HostInner {
            doc: Rc::new(RefCell::new(doc)),
            registry: options.registry,
            frames: Rc::new(FlushingFrames {
                frames: options.frames,
                host: weak.clone(),
            }),
            location: options.location,
            reporter: options.reporter,
            components: RefCell::new(HashMap::new()),
            by_id: RefCell::new(HashMap::new()),
            flushing: Cell::new(false),
            render_errors: Signal::new(None),
        });
        Self { inner }
    }

    pub fn document(&self) -> &Rc<RefCell<Document>> {
        &self.inner.doc
    }

    pub fn registry(&self) -> &Rc<Registry> {
        &self.inner.registry
    }

    pub fn location(&self) -> Rc<dyn Location> {
        self.inner.location()
    }

    pub fn body(&self) -> NodeId {
        self.inner.doc.borrow().body()
    }

    /// Creates an element; a registered tag is constructed right away.
    pub fn create_element(&self, tag: &str) -> Result<NodeId, ComponentError> {
        let node = self.inner.doc.borrow_mut().create_element(tag);
        self.inner.flush()?;
        Ok(node)
    }

    pub fn create_text(&self, text: impl Into<String>) -> NodeId {
        self.inner.doc.borrow_mut().create_text(text)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), ComponentError> {
        self.inner.doc.borrow_mut().append_child(parent, child)?;
        self.inner.flush()
    }

    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), ComponentError> {
        self.inner
            .doc
            .borrow_mut()
            .insert_before(parent, child, reference)?;
        self.inner.flush()
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), ComponentError> {
        self.inner.doc.borrow_mut().remove_child(parent, child)?;
        self.inner.flush()
    }

    /// Sets an attribute. Values outside a component's declared enum are
    /// rejected and leave the element untouched.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), ComponentError> {
        if let Some(component) = self.inner.component_for(node) {
            component.check_attribute(name, Some(value))?;
        }
        self.inner
            .doc
            .borrow_mut()
            .set_attribute(node, name, value)?;
        self.inner.flush()
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), ComponentError> {
        self.inner.doc.borrow_mut().remove_attribute(node, name)?;
        self.inner.flush()
    }

    pub fn add_listener(
        &self,
        node: NodeId,
        event: &str,
        listener: impl Fn(&Event) + 'static,
    ) -> Result<(), ComponentError> {
        self.inner
            .doc
            .borrow_mut()
            .add_listener(node, event, Rc::new(listener))?;
        Ok(())
    }

    /// Delivers `event` to listeners from `target` up the composed tree.
    /// Returns how many listeners ran.
    pub fn dispatch_event(&self, target: NodeId, event: &str) -> Result<usize, ComponentError> {
        let path = self.inner.doc.borrow().event_path(target, event);
        for (current, listener) in &path {
            listener(&Event {
                name: event.to_owned(),
                target,
                current: *current,
            });
        }
        self.inner.flush()?;
        Ok(path.len())
    }

    /// Re-runs routing for every connected routed component against the
    /// current location, as a browser `popstate` would.
    pub fn pop_state(&self) -> Result<(), ComponentError> {
        let mut routed: Vec<Rc<Component>> = self
            .inner
            .components
            .borrow()
            .values()
            .filter(|c| c.is_connected() && c.has_router())
            .cloned()
            .collect();
        routed.sort_by_key(|c| c.id());

        let hash = self.inner.location.hash();
        let mut first_err = None;
        for component in routed {
            if let Err(err) = component.navigate(&hash, State::new()) {
                log::error!("<{}> failed to route {hash}: {err}", component.tag());
                first_err.get_or_insert(err);
            }
        }
        self.inner.flush()?;
        first_err.map_or(Ok(()), Err)
    }

    /// Processes pending reactions after direct document edits.
    pub fn flush(&self) -> Result<(), ComponentError> {
        self.inner.flush()
    }

    pub fn component(&self, node: NodeId) -> Option<Rc<Component>> {
        self.inner.component_for(node)
    }

    pub fn component_by_id(&self, id: ComponentId) -> Option<Rc<Component>> {
        let node = self.inner.by_id.borrow().get(&id).copied()?;
        self.inner.component_for(node)
    }

    /// Every constructed component, oldest first.
    pub fn components(&self) -> Vec<Rc<Component>> {
        let mut all: Vec<Rc<Component>> = self.inner.components.borrow().values().cloned().collect();
        all.sort_by_key(|c| c.id());
        all
    }

    pub fn subscribe_render_errors(&self, f: impl Fn(&RenderErrorEvent) + 'static) -> SubId {
        self.inner.render_errors.subscribe(move |event| {
            if let Some(event) = event {
                f(event);
            }
        })
    }

    pub fn unsubscribe_render_errors(&self, id: SubId) -> bool {
        self.inner.render_errors.unsubscribe(id)
    }

    pub fn last_render_error(&self) -> Option<RenderErrorEvent> {
        self.inner.render_errors.get()
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        self.inner.doc.borrow().outer_html(node)
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        self.inner.doc.borrow().inner_html(node)
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.inner.doc.borrow().text_content(node)
    }
}

impl HostInner {
    pub(crate) fn doc(&self) -> &Rc<RefCell<Document>> {
        &self.doc
    }

    pub(crate) fn frames(&self) -> Rc<dyn FrameScheduler> {
        self.frames.clone()
    }

    pub(crate) fn location(&self) -> Rc<dyn Location> {
        self.location.clone()
    }

    pub(crate) fn component_for(&self, node: NodeId) -> Option<Rc<Component>> {
        self.components.borrow().get(&node).cloned()
    }

    pub(crate) fn report(&self, event: RenderErrorEvent) {
        self.reporter.report(&event);
        self.render_errors.set(Some(event));
    }

    /// Drains the reaction queue. Re-entrant calls return immediately; the
    /// outermost flush picks up whatever they queued. Every reaction is
    /// processed even after a failure; the first error is returned.
    pub(crate) fn flush(self: &Rc<Self>) -> Result<(), ComponentError> {
        if self.flushing.replace(true) {
            return Ok(());
        }
        let mut first_err = None;
        loop {
            let Some(reaction) = self.doc.borrow_mut().pop_reaction() else {
                break;
            };
            if let Err(err) = self.react(reaction) {
                log::error!("{err}");
                first_err.get_or_insert(err);
            }
        }
        self.flushing.set(false);
        first_err.map_or(Ok(()), Err)
    }

    fn react(self: &Rc<Self>, reaction: Reaction) -> Result<(), ComponentError> {
        match reaction {
            Reaction::Created(node) => self.construct(node),
            Reaction::Connected(node) => {
                if !self.doc.borrow().is_connected(node) {
                    return Ok(());
                }
                match self.component_for(node) {
                    Some(component) => component.connect(),
                    None => Ok(()),
                }
            }
            Reaction::Disconnected(node) => {
                if self.doc.borrow().is_connected(node) {
                    return Ok(());
                }
                if let Some(component) = self.component_for(node) {
                    component.disconnect();
                }
                Ok(())
            }
            Reaction::AttributeChanged { node, name, new, .. } => match self.component_for(node) {
                Some(component) => component.attribute_changed(&name, new.as_deref()),
                None => Ok(()),
            },
        }
    }

    fn construct(self: &Rc<Self>, node: NodeId) -> Result<(), ComponentError> {
        if self.components.borrow().contains_key(&node) {
            return Ok(());
        }
        let Some(tag) = self.doc.borrow().tag(node).map(str::to_owned) else {
            return Ok(());
        };
        let factory = self
            .registry
            .get(&tag)
            .ok_or_else(|| RegistryError::NotDefined(tag.clone()))?;
        let component = Component::new(self, &tag, node, factory())?;
        log::debug!("constructed <{tag}> ({})", component.id());
        self.by_id.borrow_mut().insert(component.id(), node);
        self.components.borrow_mut().insert(node, component);
        Ok(())
    }
}
