//! Controller configuration: the serializable settings and the runtime
//! collaborators wired in code.

use std::fmt;
use std::sync::Arc;

use restifizer_core::{ActionMap, RawAction};
use serde::Deserialize;
use serde_json::Value;

use super::action::ControllerMethods;
use super::errors::ConfigurationError;
use super::handler::{Handler, HandlerRef};
use crate::traits::{ControllerPlugin, DataSource, ErrorLog, ErrorParser, Transport};

/// Controller base path: one prefix or an ordered list of prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BasePath {
    One(String),
    Many(Vec<String>),
}

impl BasePath {
    /// The prefixes as a list.
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::One(path) => vec![path.clone()],
            Self::Many(paths) => paths.clone(),
        }
    }
}

impl fmt::Display for BasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(path) => f.write_str(path),
            Self::Many(paths) => f.write_str(&paths.join(",")),
        }
    }
}

impl From<&str> for BasePath {
    fn from(path: &str) -> Self {
        Self::One(path.to_string())
    }
}

impl From<Vec<&str>> for BasePath {
    fn from(paths: Vec<&str>) -> Self {
        Self::Many(paths.into_iter().map(str::to_string).collect())
    }
}

/// Serializable part of a controller's configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSettings {
    pub path: Option<BasePath>,
    pub file_field: Option<String>,
    /// Verbs bound by `replace`. Empty means `put`.
    #[serde(default)]
    pub supported_methods: Vec<String>,
    #[serde(default)]
    pub actions: ActionMap<HandlerRef>,
}

impl ControllerSettings {
    /// Parses settings from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSettings`] if the value does not
    /// describe controller settings.
    pub fn from_json(value: Value) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A plugin and the options it is invoked with.
#[derive(Clone)]
pub struct PluginEntry {
    pub plugin: Arc<dyn ControllerPlugin>,
    pub options: Value,
}

/// Everything a controller is constructed from.
#[derive(Default)]
pub struct ControllerOptions {
    pub settings: ControllerSettings,
    pub methods: ControllerMethods,
    pub transports: Vec<Arc<dyn Transport>>,
    pub data_source: Option<Arc<dyn DataSource>>,
    pub parse_error: Option<Arc<dyn ErrorParser>>,
    pub plugins: Vec<PluginEntry>,
    pub log: Option<Arc<dyn ErrorLog>>,
}

impl ControllerOptions {
    #[must_use]
    pub fn new(path: impl Into<BasePath>, file_field: impl Into<String>) -> Self {
        Self::from_settings(ControllerSettings {
            path: Some(path.into()),
            file_field: Some(file_field.into()),
            ..ControllerSettings::default()
        })
    }

    #[must_use]
    pub fn from_settings(settings: ControllerSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Defines a controller method that actions can name as their handler.
    #[must_use]
    pub fn method(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.methods.insert(name, handler);
        self
    }

    #[must_use]
    pub fn action(mut self, key: impl Into<String>, action: impl Into<RawAction<HandlerRef>>) -> Self {
        self.settings.actions.insert(key.into(), action.into());
        self
    }

    #[must_use]
    pub fn supported_methods(mut self, methods: Vec<String>) -> Self {
        self.settings.supported_methods = methods;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.push(transport);
        self
    }

    #[must_use]
    pub fn data_source(mut self, data_source: Arc<dyn DataSource>) -> Self {
        self.data_source = Some(data_source);
        self
    }

    #[must_use]
    pub fn parse_error(mut self, parser: Arc<dyn ErrorParser>) -> Self {
        self.parse_error = Some(parser);
        self
    }

    #[must_use]
    pub fn plugin(mut self, plugin: Arc<dyn ControllerPlugin>, options: Value) -> Self {
        self.plugins.push(PluginEntry { plugin, options });
        self
    }

    #[must_use]
    pub fn log(mut self, log: Arc<dyn ErrorLog>) -> Self {
        self.log = Some(log);
        self
    }
}

/// Fails on the first required setting that is absent.
///
/// # Errors
///
/// Returns [`ConfigurationError::MissingOption`] naming the setting.
pub fn require_options(settings: &ControllerSettings) -> Result<(), ConfigurationError> {
    if settings.path.is_none() {
        return Err(ConfigurationError::MissingOption("path"));
    }
    if settings.file_field.is_none() {
        return Err(ConfigurationError::MissingOption("fileField"));
    }
    Ok(())
}
