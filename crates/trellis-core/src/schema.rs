//! Typed attribute declarations.
//!
//! An [`AttrSchema`] lists the attributes a component observes, how their
//! string values are coerced, and which constraints apply:
//!
//! | type      | absent            | present                              |
//! |-----------|-------------------|--------------------------------------|
//! | `string`  | default or `null` | the raw string (checked against enum) |
//! | `boolean` | default or `false`| `false` only for `"false"`           |
//! | `number`  | default or `null` | parsed number, `null` if invalid     |
//! | `json`    | default or `null` | parsed JSON, `null` if invalid       |

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Number, Value};

use crate::error::ConfigError;
use crate::state::State;

/// Attribute that restyles a shadow-DOM component; always observed.
pub const STYLE_OVERRIDE_ATTR: &str = "style-override";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AttrType {
    #[default]
    String,
    Boolean,
    Number,
    Json,
}

impl FromStr for AttrType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "boolean" => Ok(Self::Boolean),
            "number" => Ok(Self::Number),
            "json" => Ok(Self::Json),
            other => Err(other.to_owned()),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Json => "json",
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttrSpec {
    pub ty: AttrType,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<String>>,
    pub required: bool,
}

impl AttrSpec {
    pub fn string() -> Self {
        Self::default()
    }

    pub fn boolean() -> Self {
        Self::of(AttrType::Boolean)
    }

    pub fn number() -> Self {
        Self::of(AttrType::Number)
    }

    pub fn json() -> Self {
        Self::of(AttrType::Json)
    }

    pub fn of(ty: AttrType) -> Self {
        Self {
            ty,
            ..Self::default()
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn check(&self, attr: &str) -> Result<(), ConfigError> {
        let attr = attr.to_owned();
        if self.required && self.default.is_some() {
            return Err(ConfigError::RequiredWithDefault { attr });
        }
        if self.required && self.ty == AttrType::Boolean {
            return Err(ConfigError::RequiredBoolean { attr });
        }
        if self.enum_values.is_some() && self.ty != AttrType::String {
            return Err(ConfigError::EnumOnNonString { attr });
        }
        Ok(())
    }

    /// Coerces a raw attribute value; enum membership is not checked.
    pub fn coerce(&self, raw: Option<&str>) -> Value {
        let Some(raw) = raw else {
            return match (&self.default, self.ty) {
                (Some(default), _) => default.clone(),
                (None, AttrType::Boolean) => Value::Bool(false),
                (None, _) => Value::Null,
            };
        };
        match self.ty {
            AttrType::String => Value::String(raw.to_owned()),
            AttrType::Boolean => Value::Bool(raw != "false"),
            AttrType::Number => parse_number(raw).unwrap_or(Value::Null),
            AttrType::Json => serde_json::from_str(raw).unwrap_or_else(|err| {
                log::warn!("attribute value {raw:?} is not valid JSON: {err}");
                Value::Null
            }),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpec {
    #[serde(rename = "type", default)]
    ty: Option<String>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(rename = "enum", default)]
    enum_values: Option<Vec<String>>,
    #[serde(default)]
    required: bool,
}

/// Ordered attribute declarations. Always valid once constructed through
/// [`AttrSchema::from_json`] or [`AttrSchema::validate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttrSchema {
    specs: Vec<(String, AttrSpec)>,
}

impl AttrSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>, spec: AttrSpec) -> Self {
        let name = name.into();
        match self.specs.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = spec,
            None => self.specs.push((name, spec)),
        }
        self
    }

    /// Parses the JSON form:
    /// `{"size": {"type": "string", "enum": ["s", "m"], "default": "m"}}`.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let Value::Object(entries) = value else {
            return Err(ConfigError::MalformedSchema(format!(
                "expected an object, got {value}"
            )));
        };
        let mut schema = Self::new();
        for (name, raw) in entries {
            let raw: RawSpec = serde_json::from_value(raw.clone())
                .map_err(|e| ConfigError::MalformedSchema(format!("{name}: {e}")))?;
            let ty = match raw.ty.as_deref() {
                None => AttrType::String,
                Some(ty) => ty.parse().map_err(|ty| ConfigError::UnknownAttrType {
                    attr: name.clone(),
                    ty,
                })?,
            };
            schema = schema.attr(
                name.clone(),
                AttrSpec {
                    ty,
                    default: raw.default,
                    enum_values: raw.enum_values,
                    required: raw.required,
                },
            );
        }
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.specs.iter().try_for_each(|(name, spec)| spec.check(name))
    }

    pub fn get(&self, name: &str) -> Option<&AttrSpec> {
        self.specs.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Schema names plus [`STYLE_OVERRIDE_ATTR`].
    pub fn observed(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names().map(str::to_owned).collect();
        names.push(STYLE_OVERRIDE_ATTR.to_owned());
        names
    }

    /// Rejects a value outside a declared enum. Unknown attributes and
    /// removals always pass.
    pub fn check_value(&self, name: &str, raw: Option<&str>) -> Result<(), ConfigError> {
        let (Some(spec), Some(raw)) = (self.get(name), raw) else {
            return Ok(());
        };
        match &spec.enum_values {
            Some(allowed) if !allowed.iter().any(|v| v == raw) => {
                Err(ConfigError::InvalidEnumValue {
                    attr: name.to_owned(),
                    value: raw.to_owned(),
                    allowed: allowed.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn parse(&self, name: &str, raw: Option<&str>) -> Result<Option<Value>, ConfigError> {
        self.check_value(name, raw)?;
        Ok(self.get(name).map(|spec| spec.coerce(raw)))
    }

    /// Coerces every declared attribute, reading raw values via `lookup`.
    pub fn parse_all<'a>(
        &self,
        lookup: impl Fn(&str) -> Option<&'a str>,
    ) -> Result<State, ConfigError> {
        let mut attrs = State::new();
        for (name, spec) in &self.specs {
            let raw = lookup(name);
            self.check_value(name, raw)?;
            attrs.insert(name.clone(), spec.coerce(raw));
        }
        Ok(attrs)
    }

    /// First required attribute for which `present` is false.
    pub fn missing_required(&self, present: impl Fn(&str) -> bool) -> Option<&str> {
        self.specs
            .iter()
            .find(|(name, spec)| spec.required && !present(name))
            .map(|(name, _)| name.as_str())
    }
}

/// Parses a decimal number, keeping integers integral.
pub(crate) fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    let f = trimmed.parse::<f64>().ok()?;
    Number::from_f64(f).map(Value::Number)
}
