//! Raw action configuration and the layered-defaults resolver.
//!
//! An action arrives as a [`RawAction`]: either a structured [`ActionConfig`]
//! or a scalar that is read as an on/off toggle. [`apply_defaults`] folds the
//! four configuration layers into a [`ResolvedAction`] field by field:
//!
//! 1. explicit user configuration for the action key
//! 2. the built-in template for the action kind (if the key is a built-in)
//! 3. the controller-wide `default` entry
//! 4. the global default (`enabled = true`, `method = [get]`, `priority = 1`)
//!
//! Every field is replaced as a whole; lists are never merged element-wise.

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde::Serialize;

/// Ordered action map keyed by action name. Iteration order is the
/// tie-breaker for actions sharing a priority, so it must be preserved.
pub type ActionMap<H = String> = IndexMap<String, RawAction<H>>;

/// Key of the synthetic entry that supplies the controller-wide template.
pub const DEFAULT_ACTION_KEY: &str = "default";

/// Priority used when none is configured (or when `0` is configured).
pub const DEFAULT_PRIORITY: i64 = 1;

// ---------------------------------------------------------------------------
// MethodSpec
// ---------------------------------------------------------------------------

/// One HTTP verb or an ordered list of verbs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MethodSpec {
    One(String),
    Many(Vec<String>),
}

impl MethodSpec {
    /// Returns the verbs as a lowercase list, preserving order.
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::One(method) => vec![method.to_ascii_lowercase()],
            Self::Many(methods) => methods.iter().map(|m| m.to_ascii_lowercase()).collect(),
        }
    }
}

impl From<&str> for MethodSpec {
    fn from(method: &str) -> Self {
        Self::One(method.to_string())
    }
}

impl From<Vec<&str>> for MethodSpec {
    fn from(methods: Vec<&str>) -> Self {
        Self::Many(methods.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for MethodSpec {
    fn from(methods: Vec<String>) -> Self {
        Self::Many(methods)
    }
}

// ---------------------------------------------------------------------------
// ActionConfig
// ---------------------------------------------------------------------------

/// Structured configuration for one action. Every field is optional; absent
/// fields are filled by [`apply_defaults`].
///
/// `H` is the handler reference type. The core crate only needs it to be
/// cloneable; the server crate plugs in a type that is either a method name
/// or an already-callable handler.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig<H = String> {
    pub enabled: Option<bool>,
    pub method: Option<MethodSpec>,
    pub path: Option<String>,
    pub priority: Option<i64>,
    pub handler: Option<H>,
    /// Accepted for compatibility but always replaced by the action key.
    pub name: Option<String>,
}

impl<H> Default for ActionConfig<H> {
    fn default() -> Self {
        Self {
            enabled: None,
            method: None,
            path: None,
            priority: None,
            handler: None,
            name: None,
        }
    }
}

impl<H> ActionConfig<H> {
    /// The global default layer: enabled, `GET`, priority 1.
    #[must_use]
    pub fn global_default() -> Self {
        Self {
            enabled: Some(true),
            method: Some(MethodSpec::One("get".to_string())),
            priority: Some(DEFAULT_PRIORITY),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn method(mut self, method: impl Into<MethodSpec>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn handler(mut self, handler: impl Into<H>) -> Self {
        self.handler = Some(handler.into());
        self
    }
}

// ---------------------------------------------------------------------------
// RawAction
// ---------------------------------------------------------------------------

/// An action entry as written in configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAction<H = String> {
    /// A non-object entry, read by truthiness: `{ enabled: !!value }`.
    Toggle(bool),
    Config(ActionConfig<H>),
}

impl<H> RawAction<H> {
    /// Converts the entry into a structured config. Toggles become a config
    /// that only sets `enabled`.
    #[must_use]
    pub fn into_config(self) -> ActionConfig<H> {
        match self {
            Self::Toggle(enabled) => ActionConfig::default().enabled(enabled),
            Self::Config(config) => config,
        }
    }
}

impl<H> From<ActionConfig<H>> for RawAction<H> {
    fn from(config: ActionConfig<H>) -> Self {
        Self::Config(config)
    }
}

impl<H> From<bool> for RawAction<H> {
    fn from(enabled: bool) -> Self {
        Self::Toggle(enabled)
    }
}

impl<'de, H> Deserialize<'de> for RawAction<H>
where
    H: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        if value.is_object() {
            ActionConfig::<H>::deserialize(value)
                .map(Self::Config)
                .map_err(serde::de::Error::custom)
        } else {
            Ok(Self::Toggle(is_truthy(&value)))
        }
    }
}

/// Truthiness of a configuration scalar: `false`, `0`, `""` and `null` are
/// false, everything else is true.
#[must_use]
pub fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// ResolvedAction
// ---------------------------------------------------------------------------

/// An action after every layer has been applied. Handler resolution is left
/// to the caller: `handler` is the highest-precedence handler reference
/// found, or `None` meaning "look it up by the action name".
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAction<H = String> {
    pub name: String,
    pub method: Vec<String>,
    pub path: String,
    pub priority: i64,
    pub enabled: bool,
    pub handler: Option<H>,
}

/// Picks the first layer that sets a field.
fn pick<'a, H, T: 'a>(
    layers: &[Option<&'a ActionConfig<H>>],
    field: impl Fn(&'a ActionConfig<H>) -> Option<&'a T>,
) -> Option<&'a T> {
    layers.iter().flatten().find_map(|layer| field(*layer))
}

/// Resolves one action from its configuration layers, highest precedence
/// first: `explicit`, `kind_template`, `controller_default`, `global_default`.
///
/// - `name` is always `key`, whatever the layers say.
/// - `path` falls back to `key` when no layer sets it. An explicit empty
///   string is kept and means the controller root.
/// - `priority` of `0` is treated as unset and becomes `1`.
#[must_use]
pub fn apply_defaults<H: Clone>(
    key: &str,
    explicit: &ActionConfig<H>,
    kind_template: Option<&ActionConfig<H>>,
    controller_default: &ActionConfig<H>,
    global_default: &ActionConfig<H>,
) -> ResolvedAction<H> {
    let layers = [
        Some(explicit),
        kind_template,
        Some(controller_default),
        Some(global_default),
    ];

    let enabled = pick(&layers, |l| l.enabled.as_ref()).copied().unwrap_or(true);
    let method = pick(&layers, |l| l.method.as_ref())
        .map(MethodSpec::to_list)
        .unwrap_or_else(|| vec!["get".to_string()]);
    let path = pick(&layers, |l| l.path.as_ref())
        .cloned()
        .unwrap_or_else(|| key.to_string());
    let priority = match pick(&layers, |l| l.priority.as_ref()).copied() {
        Some(0) | None => DEFAULT_PRIORITY,
        Some(p) => p,
    };
    let handler = pick(&layers, |l| l.handler.as_ref()).cloned();

    ResolvedAction {
        name: key.to_string(),
        method,
        path,
        priority,
        enabled,
        handler,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
