pub use crate::state;
pub use crate::{
    AttrSchema, AttrSpec, AttrType, Component, ComponentError, ComponentId, Config, ConfigError,
    Context, ContextError, Controller, ErrorReporter, Host, HostOptions, Registry,
    RenderErrorEvent, State, StateController, StateStore, TemplateScope,
};
pub use serde_json::{Value, json};
pub use trellis_dom::{Event, FrameQueue, FrameScheduler, NodeId, RenderError, VElement, VNode, h, text};
pub use trellis_router::{HistoryMethod, Location, MemoryLocation, RouteParams};
