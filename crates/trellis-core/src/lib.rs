//! # Trellis core
//!
//! Declarative web components on top of [`trellis_dom`]:
//!
//! - [`Config`] declares a component type: template, default state, routes,
//!   contexts, attribute schema and update behaviour.
//! - [`Registry`] maps custom-element tags to config factories.
//! - [`Host`] owns the document and runs component lifecycles as elements
//!   are created, attached, detached and edited.
//! - [`Component`] is one live instance: state, app state, contexts,
//!   routing and rendering.
//!
//! ```rust
//! use std::rc::Rc;
//! use trellis_core::prelude::*;
//!
//! let registry = Rc::new(Registry::new());
//! registry
//!     .define("x-counter", || {
//!         Config::new()
//!             .default_state(state! { "count": 0 })
//!             .view(|s| h("p").child(format!("Counter: {}", s.get("count"))).into())
//!     })
//!     .unwrap();
//!
//! let frames = Rc::new(FrameQueue::new());
//! let host = Host::with_options(HostOptions::new(frames.clone()).registry(registry));
//! let el = host.create_element("x-counter").unwrap();
//! host.append_child(host.body(), el).unwrap();
//!
//! let counter = host.component(el).unwrap();
//! for n in 1..=3 {
//!     counter.update(state! { "count": n }).unwrap();
//! }
//! frames.run_frame();
//! assert_eq!(host.text_content(el), "Counter: 3");
//! assert_eq!(counter.render_count(), 2);
//! ```

pub mod component;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod host;
pub mod prelude;
pub mod registry;
pub mod reporter;
pub mod schema;
pub mod scope;
pub mod signal;
pub mod state;
pub mod template;

pub use serde_json;

pub use component::{Component, ComponentId, DATA_STATE_ATTR, PARENT_ATTR, Phase, STATE_ATTR_PREFIX};
pub use config::{Config, Helper, Helpers, Hooks, SchemaSource, ShouldUpdate, Template};
pub use context::{Context, ContextMap};
pub use controller::{Controller, StateController};
pub use error::{ComponentError, ConfigError, ContextError, RegistryError};
pub use host::{Host, HostOptions};
pub use registry::{Factory, Registry};
pub use reporter::{ErrorReporter, LogReporter, RenderErrorEvent};
pub use schema::{AttrSchema, AttrSpec, AttrType, STYLE_OVERRIDE_ATTR};
pub use state::{State, StateStore};
pub use template::TemplateScope;

#[cfg(test)]
mod tests;
