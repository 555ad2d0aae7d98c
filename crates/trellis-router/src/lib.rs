//! # Fragment router
//!
//! Maps URL fragments onto state updates and writes state back to the URL.
//!
//! Patterns use the familiar client-router grammar:
//!
//! - `:name` matches one path segment (`[^/?]+`),
//! - `*name` matches the rest of the path, slashes included,
//! - `( ... )` marks an optional group,
//! - a trailing `?query` is captured (undecoded) as [`RouteParams::query`].
//!
//! ```rust
//! use serde_json::json;
//! use std::rc::Rc;
//! use trellis_router::*;
//!
//! let routes = Routes::new().route("item/:id", |pending, params| {
//!     let mut update = pending.clone();
//!     update.insert("item".into(), json!(params.get(0)));
//!     Some(update)
//! });
//! let location = Rc::new(MemoryLocation::new("#item/42"));
//! let router = Router::new(&routes, RouterOptions::new(location)).unwrap();
//!
//! let update = router.navigate("#item/42", None, State::new()).unwrap().unwrap();
//! assert_eq!(update["item"], json!("42"));
//! assert_eq!(update[FRAGMENT_KEY], json!("item/42"));
//! ```

mod location;

use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use thiserror::Error;

pub use location::{HistoryMethod, Location, MemoryLocation};

/// State and partial updates share one shape: a JSON object.
pub type State = Map<String, Value>;

/// State key holding the current fragment of a routed component.
pub const FRAGMENT_KEY: &str = "$fragment";

pub type RouteHandler = Rc<dyn Fn(&State, &RouteParams) -> Option<State>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("route pattern {pattern:?} does not compile: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("no route handler defined for #{fragment}")]
    NoHandler { fragment: String },
}

#[derive(Clone)]
pub enum RouteTarget {
    Handler(RouteHandler),
    /// Reuses the handler of the route declared with this pattern.
    Alias(String),
}

/// Ordered route table; earlier routes win.
#[derive(Clone, Default)]
pub struct Routes {
    entries: Vec<(String, RouteTarget)>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        pattern: impl Into<String>,
        handler: impl Fn(&State, &RouteParams) -> Option<State> + 'static,
    ) -> Self {
        self.entries
            .push((pattern.into(), RouteTarget::Handler(Rc::new(handler))));
        self
    }

    pub fn alias(mut self, pattern: impl Into<String>, target: impl Into<String>) -> Self {
        self.entries
            .push((pattern.into(), RouteTarget::Alias(target.into())));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    fn handler_for(&self, target: &RouteTarget) -> Option<RouteHandler> {
        match target {
            RouteTarget::Handler(h) => Some(h.clone()),
            RouteTarget::Alias(name) => self.entries.iter().find_map(|(p, t)| match t {
                RouteTarget::Handler(h) if p == name => Some(h.clone()),
                _ => None,
            }),
        }
    }
}

impl fmt::Debug for Routes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.patterns()).finish()
    }
}

/// Values captured by a matched route.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteParams {
    params: Vec<Option<String>>,
    query: Option<String>,
}

impl RouteParams {
    /// Positional parameter, percent-decoded; `None` when an optional part
    /// did not match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.params.get(index)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn from_captures(caps: &Captures<'_>) -> Self {
        let mut raw: Vec<Option<&str>> = caps.iter().skip(1).map(|m| m.map(|m| m.as_str())).collect();
        let query = raw.pop().flatten().map(str::to_owned);
        let params = raw
            .into_iter()
            .map(|p| p.filter(|p| !p.is_empty()).map(percent_decode))
            .collect();
        Self { params, query }
    }
}

pub struct RouterOptions {
    pub location: Rc<dyn Location>,
    pub history_method: HistoryMethod,
}

impl RouterOptions {
    pub fn new(location: Rc<dyn Location>) -> Self {
        Self {
            location,
            history_method: HistoryMethod::default(),
        }
    }

    pub fn history_method(mut self, method: HistoryMethod) -> Self {
        self.history_method = method;
        self
    }
}

struct CompiledRoute {
    expr: Regex,
    handler: Option<RouteHandler>,
}

pub struct Router {
    routes: Vec<CompiledRoute>,
    location: Rc<dyn Location>,
    history_method: HistoryMethod,
}

impl Router {
    pub fn new(routes: &Routes, options: RouterOptions) -> Result<Self, RouterError> {
        let compiled = routes
            .entries
            .iter()
            .map(|(pattern, target)| {
                Ok(CompiledRoute {
                    expr: compile_pattern(pattern)?,
                    handler: routes.handler_for(target),
                })
            })
            .collect::<Result<Vec<_>, RouterError>>()?;
        Ok(Self {
            routes: compiled,
            location: options.location,
            history_method: options.history_method,
        })
    }

    pub fn location(&self) -> &Rc<dyn Location> {
        &self.location
    }

    pub fn history_method(&self) -> HistoryMethod {
        self.history_method
    }

    /// Fragment currently shown by the location, without `#`.
    pub fn current_fragment(&self) -> String {
        strip_hash(&self.location.hash()).to_owned()
    }

    /// Matches `fragment` and asks the route handler for a state update.
    ///
    /// Returns the partial to apply (`pending`, the new fragment and the
    /// handler's result merged), or `None` when nothing should change: the
    /// fragment equals `current` with nothing pending, no route matched, or
    /// the handler declined.
    pub fn navigate(
        &self,
        fragment: &str,
        current: Option<&str>,
        mut pending: State,
    ) -> Result<Option<State>, RouterError> {
        let fragment = strip_hash(fragment);
        if current == Some(fragment) && pending.is_empty() {
            return Ok(None);
        }
        pending.insert(FRAGMENT_KEY.into(), Value::String(fragment.to_owned()));

        let Some((route, caps)) = self
            .routes
            .iter()
            .find_map(|r| r.expr.captures(fragment).map(|c| (r, c)))
        else {
            log::debug!("no route matches #{fragment}");
            return Ok(None);
        };
        let Some(handler) = &route.handler else {
            return Err(RouterError::NoHandler {
                fragment: fragment.to_owned(),
            });
        };
        let params = RouteParams::from_captures(&caps);
        Ok(handler(&pending, &params).map(|update| {
            pending.extend(update);
            pending
        }))
    }

    /// Writes `#fragment` to the location unless it already shows it.
    /// Returns whether history was touched.
    pub fn replace_hash(&self, fragment: &str, method: Option<HistoryMethod>) -> bool {
        let fragment = strip_hash(fragment);
        if strip_hash(&self.location.hash()) == fragment {
            return false;
        }
        let url = format!("#{fragment}");
        match method.unwrap_or(self.history_method) {
            HistoryMethod::Push => self.location.push(&url),
            HistoryMethod::Replace => self.location.replace(&url),
        }
        true
    }
}

pub fn strip_hash(fragment: &str) -> &str {
    fragment.trim_start_matches('#')
}

static ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\-{}\[\]+?.,\\\^$|#\s]").expect("escape pattern"));
static OPTIONAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((.*?)\)").expect("optional pattern"));
static NAMED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\(\?)?:\w+").expect("named pattern"));
static SPLAT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\w+").expect("splat pattern"));

fn compile_pattern(pattern: &str) -> Result<Regex, RouterError> {
    let invalid = |e: regex::Error| RouterError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: e.to_string(),
    };
    let expr = ESCAPE.replace_all(pattern, |caps: &Captures<'_>| {
        let m = &caps[0];
        match m.chars().next() {
            Some(c) if c.is_whitespace() => format!(r"\x{{{:X}}}", u32::from(c)),
            _ => format!(r"\{m}"),
        }
    });
    let expr = OPTIONAL.replace_all(&expr, "(?:${1})?");
    let expr = NAMED.replace_all(&expr, |caps: &Captures<'_>| {
        if caps.get(1).is_some() {
            caps[0].to_owned()
        } else {
            "([^/?]+)".to_owned()
        }
    });
    let expr = SPLAT.replace_all(&expr, "([^?]*?)");
    Regex::new(&format!(r"^{expr}(?:\?([\s\S]*))?$")).map_err(invalid)
}

/// Decodes `%XX` escapes; malformed escapes are kept literally.
fn percent_decode(raw: &str) -> String {
    fn hex(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2]))
        {
            out.push(hi << 4 | lo);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
