use thiserror::Error;
use trellis_dom::{DomError, RenderError};
use trellis_router::RouterError;

/// Invalid configuration, reported when a component is constructed or
/// connected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("\"use_shadow_dom\" must be set in order to use \"css\"")]
    CssWithoutShadowDom,
    #[error("attribute schema is malformed: {0}")]
    MalformedSchema(String),
    #[error("attribute {attr:?}: unknown type {ty:?}")]
    UnknownAttrType { attr: String, ty: String },
    #[error("attribute {attr:?}: a required attribute cannot have a default")]
    RequiredWithDefault { attr: String },
    #[error("attribute {attr:?}: a boolean attribute cannot be required")]
    RequiredBoolean { attr: String },
    #[error("attribute {attr:?}: enum is only supported on string attributes")]
    EnumOnNonString { attr: String },
    #[error("invalid value {value:?} for attribute {attr:?}; expected one of {allowed:?}")]
    InvalidEnumValue {
        attr: String,
        value: String,
        allowed: Vec<String>,
    },
    #[error("<{component}> is missing required attribute {attr:?}")]
    MissingRequiredAttribute { component: String, attr: String },
    #[error("context names must not be empty")]
    EmptyContextName,
    #[error("<{component}> depends on context {name:?} but no ancestor provides it")]
    UnresolvedContext { component: String, name: String },
    #[error("logical parent {id:?} of <{component}> not found")]
    ParentNotFound { component: String, id: String },
    #[error("logical parent {id:?} of <{component}> is not connected")]
    ParentNotConnected { component: String, id: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("context name must not be empty")]
    EmptyName,
    #[error("<{component}> must be connected to look up contexts")]
    NotConnected { component: String },
    #[error("context {name:?} not found above <{component}>")]
    NotFound { component: String, name: String },
    #[error("context {name:?} is not a {expected}")]
    WrongType { name: String, expected: &'static str },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0:?} is not a valid custom element name")]
    InvalidTagName(String),
    #[error("<{0}> is already defined")]
    AlreadyDefined(String),
    #[error("<{0}> is not defined")]
    NotDefined(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComponentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("<{component}> has no attribute {key:?} in its schema")]
    UnknownAttribute { component: String, key: String },
    #[error("<{component}>: update() is disabled, state is owned by its controller")]
    UpdateDisabled { component: String },
    #[error("<{component}> has no app state")]
    NoAppState { component: String },
    #[error("<{component}> declares no routes")]
    NoRouter { component: String },
    #[error("<{component}> outlived its host")]
    Detached { component: String },
}
