use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use trellis_dom::{RenderError, VNode};
use trellis_router::{HistoryMethod, RouteParams, Routes};

use crate::context::{Context, ContextMap};
use crate::controller::Controller;
use crate::error::ConfigError;
use crate::schema::AttrSchema;
use crate::state::State;
use crate::template::TemplateScope;

pub type Template = Rc<dyn Fn(&TemplateScope<'_>) -> Result<VNode, RenderError>>;
pub type Helper = Rc<dyn Fn(&[Value]) -> Value>;
pub type StateHook = Rc<dyn Fn(&State)>;
pub type ShouldUpdate = Rc<dyn Fn(&State) -> bool>;

/// Named functions exposed to templates.
#[derive(Clone, Default)]
pub struct Helpers(HashMap<String, Helper>);

impl Helpers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, f: impl Fn(&[Value]) -> Value + 'static) {
        self.0.insert(name.into(), Rc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&Helper> {
        self.0.get(name)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        self.0.get(name).map(|f| f(args))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Callbacks around every connected state update, with the partial.
#[derive(Clone, Default)]
pub struct Hooks {
    pub pre_update: Option<StateHook>,
    pub post_update: Option<StateHook>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SchemaSource {
    Typed(AttrSchema),
    Json(Value),
}

impl Default for SchemaSource {
    fn default() -> Self {
        Self::Typed(AttrSchema::new())
    }
}

/// Everything a component type declares.
///
/// ```rust
/// use trellis_core::prelude::*;
///
/// let config = Config::new()
///     .default_state(state! { "count": 0 })
///     .view(|s| h("p").child(format!("Count: {}", s.state["count"])).into())
///     .update_sync(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct Config {
    pub template: Template,
    pub default_state: State,
    pub helpers: Helpers,
    pub routes: Routes,
    pub history_method: HistoryMethod,
    /// Context names resolved (and bound) at connect.
    pub contexts: Vec<String>,
    /// Context instances provided to this component's subtree.
    pub default_contexts: ContextMap,
    /// Declaring this makes the component the app-state root of its subtree.
    pub app_state: Option<State>,
    pub isolated_state: bool,
    pub css: String,
    pub use_shadow_dom: bool,
    pub update_sync: bool,
    pub attrs_schema: SchemaSource,
    pub hooks: Hooks,
    pub controller: Option<Rc<dyn Controller>>,
    pub should_update: Option<ShouldUpdate>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template: Rc::new(|_| Err(RenderError::new("no template configured"))),
            default_state: State::new(),
            helpers: Helpers::new(),
            routes: Routes::new(),
            history_method: HistoryMethod::default(),
            contexts: Vec::new(),
            default_contexts: ContextMap::new(),
            app_state: None,
            isolated_state: false,
            css: String::new(),
            use_shadow_dom: false,
            update_sync: false,
            attrs_schema: SchemaSource::default(),
            hooks: Hooks::default(),
            controller: None,
            should_update: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("default_state", &self.default_state)
            .field("routes", &self.routes)
            .field("contexts", &self.contexts)
            .field("default_contexts", &self.default_contexts.keys())
            .field("app_state", &self.app_state)
            .field("isolated_state", &self.isolated_state)
            .field("use_shadow_dom", &self.use_shadow_dom)
            .field("update_sync", &self.update_sync)
            .field("attrs_schema", &self.attrs_schema)
            .field("controller", &self.controller.is_some())
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(
        mut self,
        f: impl Fn(&TemplateScope<'_>) -> Result<VNode, RenderError> + 'static,
    ) -> Self {
        self.template = Rc::new(f);
        self
    }

    /// Infallible template.
    pub fn view(self, f: impl Fn(&TemplateScope<'_>) -> VNode + 'static) -> Self {
        self.template(move |scope| Ok(f(scope)))
    }

    pub fn default_state(mut self, state: State) -> Self {
        self.default_state = state;
        self
    }

    pub fn helper(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Value + 'static,
    ) -> Self {
        self.helpers.insert(name, f);
        self
    }

    pub fn route(
        mut self,
        pattern: impl Into<String>,
        handler: impl Fn(&State, &RouteParams) -> Option<State> + 'static,
    ) -> Self {
        self.routes = self.routes.route(pattern, handler);
        self
    }

    pub fn route_alias(mut self, pattern: impl Into<String>, target: impl Into<String>) -> Self {
        self.routes = self.routes.alias(pattern, target);
        self
    }

    pub fn history_method(mut self, method: HistoryMethod) -> Self {
        self.history_method = method;
        self
    }

    pub fn context(mut self, name: impl Into<String>) -> Self {
        self.contexts.push(name.into());
        self
    }

    pub fn default_context(mut self, name: impl Into<String>, context: Rc<dyn Context>) -> Self {
        self.default_contexts.insert(name.into(), context);
        self
    }

    pub fn app_state(mut self, state: State) -> Self {
        self.app_state = Some(state);
        self
    }

    pub fn isolated_state(mut self, isolated: bool) -> Self {
        self.isolated_state = isolated;
        self
    }

    pub fn css(mut self, css: impl Into<String>) -> Self {
        self.css = css.into();
        self
    }

    pub fn use_shadow_dom(mut self, shadow: bool) -> Self {
        self.use_shadow_dom = shadow;
        self
    }

    pub fn update_sync(mut self, sync: bool) -> Self {
        self.update_sync = sync;
        self
    }

    pub fn attrs_schema(mut self, schema: AttrSchema) -> Self {
        self.attrs_schema = SchemaSource::Typed(schema);
        self
    }

    pub fn attrs_schema_json(mut self, schema: Value) -> Self {
        self.attrs_schema = SchemaSource::Json(schema);
        self
    }

    pub fn pre_update(mut self, f: impl Fn(&State) + 'static) -> Self {
        self.hooks.pre_update = Some(Rc::new(f));
        self
    }

    pub fn post_update(mut self, f: impl Fn(&State) + 'static) -> Self {
        self.hooks.post_update = Some(Rc::new(f));
        self
    }

    pub fn controller(mut self, controller: Rc<dyn Controller>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn should_update(mut self, f: impl Fn(&State) -> bool + 'static) -> Self {
        self.should_update = Some(Rc::new(f));
        self
    }

    /// Checks the declaration and returns the resolved attribute schema.
    pub fn validate(&self) -> Result<AttrSchema, ConfigError> {
        if !self.css.is_empty() && !self.use_shadow_dom {
            return Err(ConfigError::CssWithoutShadowDom);
        }
        if self.contexts.iter().any(String::is_empty)
            || self.default_contexts.keys().any(String::is_empty)
        {
            return Err(ConfigError::EmptyContextName);
        }
        match &self.attrs_schema {
            SchemaSource::Typed(schema) => {
                schema.validate()?;
                Ok(schema.clone())
            }
            SchemaSource::Json(value) => AttrSchema::from_json(value),
        }
    }
}
