//! File controllers: a declarative action set bound onto transports.
//!
//! A [`Controller`] is built once from [`ControllerOptions`], extended by
//! plugins, then frozen behind an `Arc` and bound with
//! [`Controller::bind`]. From then on every request flows through
//! [`Controller::dispatch`].

pub mod action;
pub mod binder;
pub mod config;
pub mod dispatch;
pub mod error_mapper;
pub mod errors;
pub mod handler;
pub mod registry;
pub mod scope;

use std::sync::Arc;

use restifizer_core::{ActionConfig, BuiltinAction, RawAction};

pub use action::{Action, ControllerMethods};
pub use config::{require_options, BasePath, ControllerOptions, ControllerSettings, PluginEntry};
pub use dispatch::DispatchFn;
pub use errors::{ConfigurationError, RequestError};
pub use handler::{
    handler_fn, with_timeout, ActionHandler, BodyStream, Handler, HandlerRef, HandlerResult,
    ResData, StreamResult,
};
pub use registry::ActionRegistry;
pub use scope::{RequestScope, SentBody, SentResponse, TransportData};

use crate::traits::{DataSource, ErrorLog, ErrorParser, TracingLog, Transport};

/// A configured set of actions over one base path.
pub struct Controller {
    base_path: BasePath,
    file_field: String,
    supported_methods: Vec<String>,
    actions: ActionRegistry,
    methods: Arc<ControllerMethods>,
    defaults: ActionConfig<HandlerRef>,
    transports: Vec<Arc<dyn Transport>>,
    data_source: Option<Arc<dyn DataSource>>,
    parse_error: Option<Arc<dyn ErrorParser>>,
    log: Arc<dyn ErrorLog>,
}

impl Controller {
    /// Builds a controller: checks required options, normalizes the action
    /// map, then runs plugins in order.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for a missing option, a handler that
    /// does not resolve, or a failing plugin.
    pub fn new(options: ControllerOptions) -> Result<Self, ConfigurationError> {
        let ControllerOptions {
            settings,
            methods,
            transports,
            data_source,
            parse_error,
            plugins,
            log,
        } = options;
        require_options(&settings)?;

        let ControllerSettings {
            path,
            file_field,
            supported_methods,
            actions,
        } = settings;
        let base_path = path.ok_or(ConfigurationError::MissingOption("path"))?;
        let file_field = file_field.ok_or(ConfigurationError::MissingOption("fileField"))?;

        let methods = Arc::new(methods);
        let built = ActionRegistry::build(actions, &supported_methods, &methods)?;

        let mut controller = Self {
            base_path,
            file_field,
            supported_methods,
            actions: built.registry,
            methods,
            defaults: built.controller_default,
            transports,
            data_source,
            parse_error,
            log: log.unwrap_or_else(|| Arc::new(TracingLog)),
        };

        for PluginEntry { plugin, options } in plugins {
            plugin.apply(&mut controller, &options)?;
        }

        tracing::debug!(
            path = %controller.base_path,
            actions = controller.actions.len(),
            "controller configured"
        );
        Ok(controller)
    }

    #[must_use]
    pub fn base_path(&self) -> &BasePath {
        &self.base_path
    }

    /// Name of the multipart field carrying the uploaded file.
    #[must_use]
    pub fn file_field(&self) -> &str {
        &self.file_field
    }

    #[must_use]
    pub fn supported_methods(&self) -> &[String] {
        &self.supported_methods
    }

    #[must_use]
    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Arc<Action>> {
        self.actions.get(name)
    }

    #[must_use]
    pub fn methods(&self) -> &ControllerMethods {
        &self.methods
    }

    /// The controller-wide action template (the `default` entry).
    #[must_use]
    pub fn action_defaults(&self) -> &ActionConfig<HandlerRef> {
        &self.defaults
    }

    #[must_use]
    pub fn transports(&self) -> &[Arc<dyn Transport>] {
        &self.transports
    }

    #[must_use]
    pub fn data_source(&self) -> Option<&Arc<dyn DataSource>> {
        self.data_source.as_ref()
    }

    #[must_use]
    pub fn error_log(&self) -> &dyn ErrorLog {
        self.log.as_ref()
    }

    /// Adds a method handlers can be resolved against. Only affects actions
    /// normalized afterwards.
    pub fn register_method(&mut self, name: impl Into<String>, handler: Handler) {
        Arc::make_mut(&mut self.methods).insert(name, handler);
    }

    pub fn add_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transports.push(transport);
    }

    /// Normalizes an action the same way configured actions are, with the
    /// built-in template applied when `key` names a built-in.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::WrongHandler`] if the handler does not
    /// resolve.
    pub fn normalize_action(
        &self,
        key: &str,
        raw: RawAction<HandlerRef>,
    ) -> Result<Action, ConfigurationError> {
        let template = BuiltinAction::from_key(key)
            .map(|builtin| builtin.template::<HandlerRef>(&self.supported_methods));
        Action::normalize(key, raw, template.as_ref(), &self.defaults, &self.methods)
    }

    /// Adds or replaces a normalized action.
    pub fn insert_action(&mut self, action: Action) {
        self.actions.insert(action);
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("base_path", &self.base_path)
            .field("file_field", &self.file_field)
            .field("actions", &self.actions)
            .field("transports", &self.transports.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
