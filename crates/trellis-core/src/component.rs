//! # Component lifecycle
//!
//! A [`Component`] is the runtime half of a custom element. The host creates
//! one when an element with a registered tag is created, and drives it
//! through its phases as the element moves in and out of the document:
//!
//! ```text
//! Constructed -> Connecting -> Connected -> Disconnected -> Connecting -> ...
//! ```
//!
//! While connected a component knows its logical parent (the component whose
//! id it carries in `trellis-parent`), the root of its tree and the stores it
//! reads. Non-isolated children share their state root's [`StateStore`];
//! the nearest ancestor declaring `app_state` owns the app store. An update
//! through any member re-renders every member sharing the store exactly once.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use serde_json::Value;
use trellis_dom::{DomPatcher, NodeId, PatcherOptions, VNode, h};
use trellis_router::{FRAGMENT_KEY, HistoryMethod, Router, RouterOptions};

use crate::config::Config;
use crate::context::{Context, ContextMap, PendingUnbind};
use crate::controller::Controller;
use crate::error::{ComponentError, ConfigError, ContextError};
use crate::host::HostInner;
use crate::reporter::{RenderErrorEvent, panic_message};
use crate::schema::{AttrSchema, STYLE_OVERRIDE_ATTR, parse_number};
use crate::scope::Scope;
use crate::state::{State, StateStore, merge};
use crate::template::TemplateScope;

/// Attribute naming the logical parent component by id.
pub const PARENT_ATTR: &str = "trellis-parent";
/// JSON object merged into the initial state.
pub const DATA_STATE_ATTR: &str = "data-state";
/// `state-<key>="value"` seeds one key of the initial state.
pub const STATE_ATTR_PREFIX: &str = "state-";

thread_local! {
    static NEXT_ID: Cell<u64> = const { Cell::new(1) };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    fn next() -> Self {
        NEXT_ID.with(|n| {
            let id = n.get();
            n.set(id + 1);
            Self(id)
        })
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Constructed,
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StoreKind {
    State,
    App,
}

pub struct Component {
    id: ComponentId,
    tag: String,
    node: NodeId,
    render_root: NodeId,
    style_node: Option<NodeId>,
    config: Config,
    schema: AttrSchema,
    host: Weak<HostInner>,
    this: Weak<Component>,
    inner: RefCell<Inner>,
}

struct Inner {
    phase: Phase,
    parent: Option<Weak<Component>>,
    root: Option<Weak<Component>>,
    /// Component owning `state`; `None` while detached.
    state_owner: Option<Weak<Component>>,
    children: Vec<Weak<Component>>,
    own_state: Rc<StateStore>,
    state: Rc<StateStore>,
    own_app: Option<Rc<StateStore>>,
    app: Option<Rc<StateStore>>,
    app_owner: Option<Weak<Component>>,
    /// App updates made before the app store is known.
    pending_app: State,
    /// State updates made while not connected; replayed over the live store.
    detached_writes: State,
    attrs: State,
    patcher: Option<DomPatcher<State>>,
    rendered: Option<VNode>,
    renders: u64,
    router: Option<Rc<Router>>,
    bound: ContextMap,
    /// Contexts still bound from the previous connection.
    carried: ContextMap,
    /// Memoized resolutions for the whole tree; only used on roots.
    context_cache: ContextMap,
    pending_unbind: Option<Rc<PendingUnbind>>,
    scope: Option<Scope>,
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("node", &self.node)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl Component {
    pub(crate) fn new(
        host: &Rc<HostInner>,
        tag: &str,
        node: NodeId,
        config: Config,
    ) -> Result<Rc<Self>, ComponentError> {
        let schema = config.validate()?;
        let (attrs, style_override) = {
            let doc = host.doc().borrow();
            let attrs = schema.parse_all(|name| doc.get_attribute(node, name))?;
            let style_override = doc
                .get_attribute(node, STYLE_OVERRIDE_ATTR)
                .unwrap_or_default()
                .to_owned();
            (attrs, style_override)
        };

        let (render_root, style_node) = if config.use_shadow_dom {
            let mut doc = host.doc().borrow_mut();
            let shadow = doc.attach_shadow(node)?;
            let style = doc.create_element("style");
            let css = doc.create_text(format!("{}{}", config.css, style_override));
            doc.append_child(style, css)?;
            doc.append_child(shadow, style)?;
            (shadow, Some(style))
        } else {
            (node, None)
        };

        let own_state = Rc::new(StateStore::default());
        let own_app = config
            .app_state
            .clone()
            .map(|app| Rc::new(StateStore::new(app)));

        Ok(Rc::new_cyclic(|this| Self {
            id: ComponentId::next(),
            tag: tag.to_owned(),
            node,
            render_root,
            style_node,
            config,
            schema,
            host: Rc::downgrade(host),
            this: this.clone(),
            inner: RefCell::new(Inner {
                phase: Phase::Constructed,
                parent: None,
                root: None,
                state_owner: None,
                children: Vec::new(),
                state: own_state.clone(),
                own_state,
                app: own_app.clone(),
                own_app,
                app_owner: None,
                pending_app: State::new(),
                detached_writes: State::new(),
                attrs,
                patcher: None,
                rendered: None,
                renders: 0,
                router: None,
                bound: ContextMap::new(),
                carried: ContextMap::new(),
                context_cache: ContextMap::new(),
                pending_unbind: None,
                scope: None,
            }),
        }))
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The custom element itself.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Where rendered output goes: the shadow root, or the element.
    pub fn render_root(&self) -> NodeId {
        self.render_root
    }

    /// Root node of the current rendered output.
    pub fn el(&self) -> Option<NodeId> {
        self.inner.borrow().patcher.as_ref().and_then(DomPatcher::el)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn schema(&self) -> &AttrSchema {
        &self.schema
    }

    pub fn phase(&self) -> Phase {
        self.inner.borrow().phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase() == Phase::Connected
    }

    /// No logical parent.
    pub fn is_root(&self) -> bool {
        self.inner.borrow().parent.is_none()
    }

    pub fn parent(&self) -> Option<Rc<Component>> {
        self.inner.borrow().parent.as_ref().and_then(Weak::upgrade)
    }

    /// Root of the component tree; `None` while detached.
    pub fn root(&self) -> Option<Rc<Component>> {
        self.inner.borrow().root.as_ref().and_then(Weak::upgrade)
    }

    pub fn children(&self) -> Vec<Rc<Component>> {
        self.inner
            .borrow()
            .children
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn state(&self) -> State {
        self.state_store().state()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state_store().get(key)
    }

    pub fn state_store(&self) -> Rc<StateStore> {
        self.inner.borrow().state.clone()
    }

    pub fn app_state(&self) -> Option<State> {
        self.app_store().map(|app| app.state())
    }

    pub fn app_store(&self) -> Option<Rc<StateStore>> {
        self.inner.borrow().app.clone()
    }

    /// Whether both components read and write the same state.
    pub fn shares_state_with(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.state_store(), &other.state_store())
    }

    /// Coerced attribute values for every schema attribute.
    pub fn attrs(&self) -> State {
        self.inner.borrow().attrs.clone()
    }

    pub fn attr(&self, name: &str) -> Result<Value, ComponentError> {
        self.inner
            .borrow()
            .attrs
            .get(name)
            .cloned()
            .ok_or_else(|| ComponentError::UnknownAttribute {
                component: self.tag.clone(),
                key: name.to_owned(),
            })
    }

    pub fn controller(&self) -> Option<&Rc<dyn Controller>> {
        self.config.controller.as_ref()
    }

    pub fn controller_as<T: Controller>(&self) -> Option<Rc<T>> {
        let controller: Rc<dyn Any> = self.config.controller.clone()?;
        controller.downcast::<T>().ok()
    }

    /// Template invocations so far, failed ones included.
    pub fn render_count(&self) -> u64 {
        self.inner.borrow().renders
    }

    pub fn has_router(&self) -> bool {
        self.inner.borrow().router.is_some()
    }

    /// Merges `partial` into the state and re-renders every component
    /// sharing it.
    pub fn update(&self, partial: State) -> Result<(), ComponentError> {
        self.ensure_uncontrolled()?;
        self.apply(StoreKind::State, move |_| partial)
    }

    /// Like [`Component::update`], computing the partial from the current
    /// state.
    pub fn update_with(&self, f: impl FnOnce(&State) -> State) -> Result<(), ComponentError> {
        self.ensure_uncontrolled()?;
        self.apply(StoreKind::State, f)
    }

    pub fn update_app(&self, partial: State) -> Result<(), ComponentError> {
        self.ensure_uncontrolled()?;
        self.apply(StoreKind::App, move |_| partial)
    }

    pub fn update_app_with(&self, f: impl FnOnce(&State) -> State) -> Result<(), ComponentError> {
        self.ensure_uncontrolled()?;
        self.apply(StoreKind::App, f)
    }

    /// Renders this component again without touching state.
    pub fn rerender(&self) -> Result<(), ComponentError> {
        let (patcher, state) = {
            let inner = self.inner.borrow();
            (inner.patcher.clone(), inner.state.state())
        };
        if let Some(patcher) = patcher {
            patcher.update(&state)?;
        }
        Ok(())
    }

    /// Runs the route table against `fragment` and applies the result.
    pub fn navigate(&self, fragment: &str, pending: State) -> Result<(), ComponentError> {
        let (router, current) = {
            let inner = self.inner.borrow();
            (inner.router.clone(), inner.state.get(FRAGMENT_KEY))
        };
        let router = router.ok_or_else(|| ComponentError::NoRouter {
            component: self.tag.clone(),
        })?;
        let current = current.as_ref().and_then(Value::as_str);
        match router.navigate(fragment, current, pending)? {
            Some(update) => self.apply(StoreKind::State, move |_| update),
            None => Ok(()),
        }
    }

    /// Writes `fragment` through the router of this component or its
    /// nearest routed ancestor.
    pub fn replace_hash(&self, fragment: &str, method: Option<HistoryMethod>) -> bool {
        match self.nearest_router() {
            Some(router) => router.replace_hash(fragment, method),
            None => false,
        }
    }

    fn nearest_router(&self) -> Option<Rc<Router>> {
        let own = self.inner.borrow().router.clone();
        own.or_else(|| self.parent().and_then(|p| p.nearest_router()))
    }

    /// Resolves a context by name: the nearest `default_contexts` entry from
    /// this component up to its root, memoized per root. The component is
    /// bound to the context on first use.
    pub fn get_context(&self, name: &str) -> Result<Rc<dyn Context>, ContextError> {
        if name.is_empty() {
            return Err(ContextError::EmptyName);
        }
        let not_connected = || ContextError::NotConnected {
            component: self.tag.clone(),
        };
        let root = {
            let inner = self.inner.borrow();
            if !matches!(inner.phase, Phase::Connecting | Phase::Connected) {
                return Err(not_connected());
            }
            if let Some(bound) = inner.bound.get(name) {
                return Ok(bound.clone());
            }
            inner.root.as_ref().and_then(Weak::upgrade)
        };
        let root = root.or_else(|| self.this.upgrade()).ok_or_else(not_connected)?;

        let cached = root.inner.borrow().context_cache.get(name).cloned();
        let context = match cached {
            Some(context) => context,
            None => {
                let found = self
                    .find_default_context(name)
                    .ok_or_else(|| ContextError::NotFound {
                        component: self.tag.clone(),
                        name: name.to_owned(),
                    })?;
                root.inner
                    .borrow_mut()
                    .context_cache
                    .insert(name.to_owned(), found.clone());
                found
            }
        };
        self.bind(name, context.clone());
        Ok(context)
    }

    pub fn get_context_as<T: Context>(&self, name: &str) -> Result<Rc<T>, ContextError> {
        let context: Rc<dyn Any> = self.get_context(name)?;
        context.downcast::<T>().map_err(|_| ContextError::WrongType {
            name: name.to_owned(),
            expected: std::any::type_name::<T>(),
        })
    }

    fn find_default_context(&self, name: &str) -> Option<Rc<dyn Context>> {
        if let Some(context) = self.config.default_contexts.get(name) {
            return Some(context.clone());
        }
        let mut cur = self.parent();
        while let Some(component) = cur {
            if let Some(context) = component.config.default_contexts.get(name) {
                return Some(context.clone());
            }
            cur = component.parent();
        }
        None
    }

    fn bind(&self, name: &str, context: Rc<dyn Context>) {
        let carried = self.inner.borrow_mut().carried.remove(name);
        match carried {
            Some(prev) if Rc::ptr_eq(&prev, &context) => {}
            Some(prev) => {
                prev.unbind_from_component(self);
                context.bind_to_component(self);
            }
            None => context.bind_to_component(self),
        }
        self.inner
            .borrow_mut()
            .bound
            .insert(name.to_owned(), context);
    }

    fn ensure_uncontrolled(&self) -> Result<(), ComponentError> {
        if self.config.controller.is_some() {
            return Err(ComponentError::UpdateDisabled {
                component: self.tag.clone(),
            });
        }
        Ok(())
    }

    fn host(&self) -> Result<Rc<HostInner>, ComponentError> {
        self.host.upgrade().ok_or_else(|| ComponentError::Detached {
            component: self.tag.clone(),
        })
    }

    fn rc(&self) -> Result<Rc<Component>, ComponentError> {
        self.this.upgrade().ok_or_else(|| ComponentError::Detached {
            component: self.tag.clone(),
        })
    }

    fn apply(
        &self,
        kind: StoreKind,
        make: impl FnOnce(&State) -> State,
    ) -> Result<(), ComponentError> {
        let (store, phase) = {
            let inner = self.inner.borrow();
            let store = match kind {
                StoreKind::State => Some(inner.state.clone()),
                StoreKind::App => inner.app.clone(),
            };
            (store, inner.phase)
        };
        let attached = matches!(phase, Phase::Connecting | Phase::Connected);

        let Some(store) = store else {
            if attached {
                return Err(ComponentError::NoAppState {
                    component: self.tag.clone(),
                });
            }
            let current = self.inner.borrow().pending_app.clone();
            let partial = make(&current);
            merge(&mut self.inner.borrow_mut().pending_app, &partial);
            return Ok(());
        };

        let partial = make(&store.state());
        if phase != Phase::Connected {
            if kind == StoreKind::State && !attached {
                merge(&mut self.inner.borrow_mut().detached_writes, &partial);
            }
            store.update(&partial);
            return Ok(());
        }

        if let Some(hook) = &self.config.hooks.pre_update {
            hook(&partial);
        }
        let fragment = match kind {
            StoreKind::State => changed_fragment(&store, &partial),
            StoreKind::App => None,
        };
        store.update(&partial);

        let owner = {
            let inner = self.inner.borrow();
            let owner = match kind {
                StoreKind::State => inner.state_owner.as_ref(),
                StoreKind::App => inner.app_owner.as_ref(),
            };
            owner.and_then(Weak::upgrade)
        };
        self.update_self_and_children(kind, &store, None);
        if let Some(owner) = owner
            && owner.id != self.id
        {
            owner.update_self_and_children(kind, &store, Some(self.id));
        }

        if let Some(fragment) = fragment {
            self.replace_hash(&fragment, None);
        }
        if let Some(hook) = &self.config.hooks.post_update {
            hook(&partial);
        }
        self.host()?.flush()
    }

    /// Re-renders this component and every descendant reading `store`,
    /// skipping the subtree of `exclude`.
    fn update_self_and_children(
        &self,
        kind: StoreKind,
        store: &Rc<StateStore>,
        exclude: Option<ComponentId>,
    ) {
        let (patcher, state, children) = {
            let inner = self.inner.borrow();
            if inner.phase != Phase::Connected {
                return;
            }
            (
                inner.patcher.clone(),
                inner.state.state(),
                inner.children.clone(),
            )
        };
        if !self.accepts(&state) {
            return;
        }
        if let Some(patcher) = patcher
            && let Err(err) = patcher.update(&state)
        {
            log::warn!("<{}> ({}) failed to patch: {err}", self.tag, self.id);
        }

        for child in children.iter().filter_map(Weak::upgrade) {
            if Some(child.id) == exclude {
                continue;
            }
            let shares = match kind {
                StoreKind::State => Rc::ptr_eq(&child.state_store(), store),
                StoreKind::App => child.app_store().is_some_and(|app| Rc::ptr_eq(&app, store)),
            };
            if shares {
                child.update_self_and_children(kind, store, exclude);
            }
        }
    }

    fn accepts(&self, state: &State) -> bool {
        match &self.config.should_update {
            Some(should_update) if !should_update(state) => {
                log::debug!("<{}> ({}) skipped update", self.tag, self.id);
                false
            }
            _ => true,
        }
    }

    fn render_template(&self, state: &State) -> VNode {
        let Some(this) = self.this.upgrade() else {
            return empty_view();
        };
        let (app, attrs) = {
            let inner = self.inner.borrow();
            (inner.app.as_ref().map(|app| app.state()), inner.attrs.clone())
        };
        let scope = TemplateScope {
            state,
            app: app.as_ref(),
            component: &this,
            helpers: &self.config.helpers,
            hooks: &self.config.hooks,
            controller: self.config.controller.as_ref(),
            attrs: &attrs,
        };
        let template = self.config.template.clone();
        let outcome = match catch_unwind(AssertUnwindSafe(|| template(&scope))) {
            Ok(Ok(vnode)) => Ok(vnode),
            Ok(Err(err)) => Err(err.to_string()),
            Err(payload) => Err(panic_message(&*payload)),
        };
        self.inner.borrow_mut().renders += 1;

        match outcome {
            Ok(vnode) => {
                self.inner.borrow_mut().rendered = Some(vnode.clone());
                vnode
            }
            Err(message) => {
                if let Some(host) = self.host.upgrade() {
                    host.report(RenderErrorEvent {
                        component: self.id,
                        tag: self.tag.clone(),
                        message,
                    });
                }
                self.inner
                    .borrow()
                    .rendered
                    .clone()
                    .unwrap_or_else(empty_view)
            }
        }
    }

    /// Rejects enum violations before the attribute is written.
    pub(crate) fn check_attribute(&self, name: &str, value: Option<&str>) -> Result<(), ComponentError> {
        Ok(self.schema.check_value(name, value)?)
    }

    pub(crate) fn attribute_changed(&self, name: &str, value: Option<&str>) -> Result<(), ComponentError> {
        let is_style = name == STYLE_OVERRIDE_ATTR;
        if !is_style && !self.schema.contains(name) {
            return Ok(());
        }
        if is_style {
            self.apply_style_override(value.unwrap_or_default())?;
        }
        if let Some(parsed) = self.schema.parse(name, value)? {
            self.inner
                .borrow_mut()
                .attrs
                .insert(name.to_owned(), parsed);
        }
        if !self.is_connected() {
            return Ok(());
        }
        if self.is_root() {
            self.apply(StoreKind::State, |_| State::new())
        } else if self.accepts(&self.state()) {
            self.rerender()
        } else {
            Ok(())
        }
    }

    fn apply_style_override(&self, value: &str) -> Result<(), ComponentError> {
        let Some(style) = self.style_node else {
            return Ok(());
        };
        let host = self.host()?;
        let mut doc = host.doc().borrow_mut();
        let css = format!("{}{}", self.config.css, value);
        match doc.children(style).first().copied() {
            Some(text) => doc.set_text(text, css)?,
            None => {
                let text = doc.create_text(css);
                doc.append_child(style, text)?;
            }
        }
        Ok(())
    }

    pub(crate) fn connect(&self) -> Result<(), ComponentError> {
        {
            let mut inner = self.inner.borrow_mut();
            if matches!(inner.phase, Phase::Connecting | Phase::Connected) {
                return Ok(());
            }
            inner.phase = Phase::Connecting;
            if let Some(pending) = inner.pending_unbind.take() {
                inner.carried = pending.cancel();
            }
        }

        let result = self.try_connect();
        let leftovers = std::mem::take(&mut self.inner.borrow_mut().carried);
        for context in leftovers.values() {
            context.unbind_from_component(self);
        }

        match result {
            Ok(()) => {
                self.inner.borrow_mut().phase = Phase::Connected;
                log::debug!("connected <{}> ({})", self.tag, self.id);
                Ok(())
            }
            Err(err) => {
                self.teardown(false);
                Err(err)
            }
        }
    }

    fn try_connect(&self) -> Result<(), ComponentError> {
        let this = self.rc()?;
        let host = self.host()?;
        let parent = self.find_parent(&host)?;

        let (missing, attrs, attr_state) = {
            let doc = host.doc().borrow();
            let missing = self
                .schema
                .missing_required(|name| doc.has_attribute(self.node, name))
                .map(str::to_owned);
            let attrs = self.schema.parse_all(|name| doc.get_attribute(self.node, name))?;
            let mut attr_state = State::new();
            if let Some(raw) = doc.get_attribute(self.node, DATA_STATE_ATTR) {
                match serde_json::from_str::<Value>(raw) {
                    Ok(Value::Object(data)) => merge(&mut attr_state, &data),
                    Ok(other) => log::warn!("<{}> {DATA_STATE_ATTR} is not an object: {other}", self.tag),
                    Err(err) => log::warn!("<{}> {DATA_STATE_ATTR} is not valid JSON: {err}", self.tag),
                }
            }
            for (name, value) in doc.attributes(self.node) {
                if let Some(key) = name.strip_prefix(STATE_ATTR_PREFIX)
                    && !key.is_empty()
                {
                    let value = parse_number(value).unwrap_or_else(|| Value::String(value.to_owned()));
                    attr_state.insert(key.to_owned(), value);
                }
            }
            (missing, attrs, attr_state)
        };
        if let Some(attr) = missing {
            return Err(ConfigError::MissingRequiredAttribute {
                component: self.tag.clone(),
                attr,
            }
            .into());
        }

        let (own_state, own_app, pending_app, detached_writes) = {
            let mut inner = self.inner.borrow_mut();
            (
                inner.own_state.clone(),
                inner.own_app.clone(),
                std::mem::take(&mut inner.pending_app),
                std::mem::take(&mut inner.detached_writes),
            )
        };
        let root = match &parent {
            Some(p) => p.root().unwrap_or_else(|| p.clone()),
            None => this.clone(),
        };
        let (state_owner, store) = match &parent {
            Some(p) if !self.config.isolated_state => {
                let owner = p.inner.borrow().state_owner.as_ref().and_then(Weak::upgrade);
                (owner.unwrap_or_else(|| p.clone()), p.state_store())
            }
            _ => (this.clone(), own_state.clone()),
        };
        let (app_owner, app) = match (&own_app, &parent) {
            (Some(app), _) => (Some(Rc::downgrade(&this)), Some(app.clone())),
            (None, Some(p)) => {
                let inner = p.inner.borrow();
                (inner.app_owner.clone(), inner.app.clone())
            }
            (None, None) => (None, None),
        };

        // Joining a shared store only replays what was written while
        // detached; the private snapshot never outranks the live state.
        let shared = !Rc::ptr_eq(&store, &own_state);
        let live = store.state();
        let mut initial = self.config.default_state.clone();
        merge(&mut initial, &live);
        merge(&mut initial, &detached_writes);
        if let Some(controller) = &self.config.controller {
            merge(&mut initial, &controller.state());
        }
        merge(&mut initial, &attr_state);
        let seeded = if shared {
            let delta: State = initial
                .into_iter()
                .filter(|(k, v)| live.get(k) != Some(v))
                .collect();
            if !delta.is_empty() {
                store.update(&delta);
            }
            !delta.is_empty()
        } else {
            store.replace(initial);
            false
        };

        match &app {
            Some(app) if !pending_app.is_empty() => app.update(&pending_app),
            None if !pending_app.is_empty() => {
                log::warn!("<{}> has no app state; dropping early app update", self.tag);
            }
            _ => {}
        }

        let scope = Scope::new();
        {
            let mut inner = self.inner.borrow_mut();
            inner.parent = parent.as_ref().map(Rc::downgrade);
            inner.root = Some(Rc::downgrade(&root));
            inner.state_owner = Some(Rc::downgrade(&state_owner));
            inner.state = store.clone();
            inner.app = app;
            inner.app_owner = app_owner;
            inner.attrs = attrs;
            inner.scope = Some(scope.clone());
        }
        if let Some(p) = &parent {
            p.inner.borrow_mut().children.push(Rc::downgrade(&this));
        }

        for name in &self.config.contexts {
            self.get_context(name).map_err(|err| match err {
                ContextError::NotFound { component, name } => {
                    ConfigError::UnresolvedContext { component, name }.into()
                }
                other => ComponentError::from(other),
            })?;
        }

        if let Some(controller) = &self.config.controller {
            let controller_store = controller.store().clone();
            let weak = self.this.clone();
            let sub = controller_store.subscribe_updates(move |partial| {
                let Some(component) = weak.upgrade() else {
                    return;
                };
                let partial = partial.clone();
                if let Err(err) = component.apply(StoreKind::State, move |_| partial) {
                    log::error!("<{}> controller update failed: {err}", component.tag);
                }
            });
            scope.add_disposer(move || {
                controller_store.unsubscribe_updates(sub);
            });
        }

        if !self.config.routes.is_empty() {
            let options = RouterOptions::new(host.location()).history_method(self.config.history_method);
            let router = Router::new(&self.config.routes, options)?;
            self.inner.borrow_mut().router = Some(Rc::new(router));
            self.navigate(&host.location().hash(), State::new())?;
        }

        let weak = self.this.clone();
        let patcher = DomPatcher::new(
            host.doc().clone(),
            &store.state(),
            move |state: &State| {
                Ok(match weak.upgrade() {
                    Some(component) => component.render_template(state),
                    None => empty_view(),
                })
            },
            PatcherOptions::new(host.frames()).sync(self.config.update_sync),
        )?;
        let el = patcher.el();
        self.inner.borrow_mut().patcher = Some(patcher);
        if let Some(el) = el {
            host.doc().borrow_mut().append_child(self.render_root, el)?;
        }
        if seeded {
            state_owner.update_self_and_children(StoreKind::State, &store, Some(self.id));
        }
        Ok(())
    }

    fn find_parent(&self, host: &HostInner) -> Result<Option<Rc<Component>>, ConfigError> {
        let (marker, ancestors) = {
            let doc = host.doc().borrow();
            let Some(marker) = doc.get_attribute(self.node, PARENT_ATTR) else {
                return Ok(None);
            };
            let mut ancestors = Vec::new();
            let mut cur = doc.composed_parent(self.node);
            while let Some(node) = cur {
                ancestors.push(node);
                cur = doc.composed_parent(node);
            }
            (marker.to_owned(), ancestors)
        };
        let parent = ancestors
            .into_iter()
            .filter_map(|node| host.component_for(node))
            .find(|c| c.id.to_string() == marker)
            .ok_or_else(|| ConfigError::ParentNotFound {
                component: self.tag.clone(),
                id: marker.clone(),
            })?;
        if !parent.is_connected() {
            return Err(ConfigError::ParentNotConnected {
                component: self.tag.clone(),
                id: marker,
            });
        }
        Ok(Some(parent))
    }

    pub(crate) fn disconnect(&self) {
        if self.phase() != Phase::Connected {
            return;
        }
        self.teardown(true);
        log::debug!("disconnected <{}> ({})", self.tag, self.id);
    }

    /// Unwinds everything a connection set up. The state is kept in a
    /// private store so a later reconnect starts from it.
    fn teardown(&self, defer_unbind: bool) {
        let (parent, scope, bound, patcher) = {
            let mut inner = self.inner.borrow_mut();
            inner.phase = Phase::Disconnected;
            let snapshot = inner.state.state();
            inner.own_state.replace(snapshot);
            inner.state = inner.own_state.clone();
            inner.app = inner.own_app.clone();
            inner.app_owner = None;
            inner.root = None;
            inner.state_owner = None;
            inner.rendered = None;
            inner.router = None;
            inner.context_cache.clear();
            (
                inner.parent.take(),
                inner.scope.take(),
                std::mem::take(&mut inner.bound),
                inner.patcher.take(),
            )
        };

        if let Some(parent) = parent.and_then(|p| p.upgrade()) {
            parent
                .inner
                .borrow_mut()
                .children
                .retain(|c| !Weak::ptr_eq(c, &self.this));
        }
        if let Some(scope) = scope {
            scope.dispose();
        }
        if let Some(patcher) = patcher {
            if let (Some(el), Some(host)) = (patcher.el(), self.host.upgrade()) {
                let mut doc = host.doc().borrow_mut();
                if doc.parent(el) == Some(self.render_root)
                    && let Err(err) = doc.remove_child(self.render_root, el)
                {
                    log::warn!("<{}> could not detach its output: {err}", self.tag);
                }
            }
            patcher.disconnect();
        }

        if bound.is_empty() {
            return;
        }
        match self.host.upgrade() {
            Some(host) if defer_unbind => self.schedule_unbind(&host, bound),
            _ => {
                for context in bound.values() {
                    context.unbind_from_component(self);
                }
            }
        }
    }

    // Unbinding waits one frame so that a move within the document
    // (disconnect immediately followed by connect) keeps its bindings.
    fn schedule_unbind(&self, host: &HostInner, contexts: ContextMap) {
        let pending = PendingUnbind::new(contexts);
        self.inner.borrow_mut().pending_unbind = Some(pending.clone());
        let weak = self.this.clone();
        host.frames().request_frame(Box::new(move || {
            if pending.is_cancelled() {
                return;
            }
            let Some(component) = weak.upgrade() else {
                return;
            };
            {
                let mut inner = component.inner.borrow_mut();
                if inner
                    .pending_unbind
                    .as_ref()
                    .is_some_and(|p| Rc::ptr_eq(p, &pending))
                {
                    inner.pending_unbind = None;
                }
            }
            for context in pending.take().values() {
                context.unbind_from_component(&component);
            }
        }));
    }
}

fn changed_fragment(store: &StateStore, partial: &State) -> Option<String> {
    let next = partial.get(FRAGMENT_KEY)?.as_str()?;
    let current = store.get(FRAGMENT_KEY);
    (current.as_ref().and_then(Value::as_str) != Some(next)).then(|| next.to_owned())
}

fn empty_view() -> VNode {
    h("div").into()
}
