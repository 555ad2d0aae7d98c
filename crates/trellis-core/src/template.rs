use std::rc::Rc;

use serde_json::Value;
use trellis_dom::{VElement, h};

use crate::component::{Component, PARENT_ATTR};
use crate::config::{Helpers, Hooks};
use crate::controller::Controller;
use crate::error::ComponentError;
use crate::state::State;

static NULL: Value = Value::Null;

/// Everything a template can read while rendering.
pub struct TemplateScope<'a> {
    /// Full component state.
    pub state: &'a State,
    /// App state, when an ancestor (or the component itself) declares one.
    pub app: Option<&'a State>,
    pub component: &'a Rc<Component>,
    pub helpers: &'a Helpers,
    pub hooks: &'a Hooks,
    pub controller: Option<&'a Rc<dyn Controller>>,
    pub(crate) attrs: &'a State,
}

impl<'a> TemplateScope<'a> {
    /// State value, `Null` when absent.
    pub fn get(&self, key: &str) -> &'a Value {
        self.state.get(key).unwrap_or(&NULL)
    }

    pub fn app_get(&self, key: &str) -> &'a Value {
        self.app.and_then(|app| app.get(key)).unwrap_or(&NULL)
    }

    /// Coerced attribute value. Reading an attribute the schema does not
    /// declare is an error.
    pub fn attr(&self, name: &str) -> Result<&'a Value, ComponentError> {
        self.attrs
            .get(name)
            .ok_or_else(|| ComponentError::UnknownAttribute {
                component: self.component.tag().to_owned(),
                key: name.to_owned(),
            })
    }

    pub fn attrs(&self) -> &'a State {
        self.attrs
    }

    pub fn helper(&self, name: &str, args: &[Value]) -> Option<Value> {
        self.helpers.call(name, args)
    }

    /// Element for a child component that joins this component's tree,
    /// wherever the template places it.
    pub fn child(&self, tag: &str) -> VElement {
        h(tag).attr(PARENT_ATTR, self.component.id().to_string())
    }
}
