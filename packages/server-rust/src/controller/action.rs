//! Normalized actions and the controller method table they resolve against.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use restifizer_core::{apply_defaults, ActionConfig, RawAction, ResolvedAction};

use super::errors::ConfigurationError;
use super::handler::{Handler, HandlerRef};

/// Named handlers defined on a controller. Unqualified handler names in
/// action configs are looked up here.
#[derive(Clone, Default)]
pub struct ControllerMethods {
    methods: HashMap<String, Handler>,
}

impl ControllerMethods {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a method.
    pub fn insert(&mut self, name: impl Into<String>, handler: Handler) {
        self.methods.insert(name.into(), handler);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.methods.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }
}

impl fmt::Debug for ControllerMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.methods.keys().collect();
        names.sort();
        f.debug_set().entries(names).finish()
    }
}

/// A bindable action. Immutable once built.
pub struct Action {
    pub name: String,
    /// Lowercase verbs, in configuration order.
    pub method: Vec<String>,
    /// Relative to the controller base path; empty means the root.
    pub path: String,
    pub priority: i64,
    pub enabled: bool,
    handler: Handler,
    owner: Arc<ControllerMethods>,
}

impl Action {
    /// Normalizes one raw entry against its configuration layers and
    /// resolves its handler.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::WrongHandler`] if the handler reference
    /// does not resolve to a callable.
    pub fn normalize(
        key: &str,
        raw: RawAction<HandlerRef>,
        kind_template: Option<&ActionConfig<HandlerRef>>,
        controller_default: &ActionConfig<HandlerRef>,
        owner: &Arc<ControllerMethods>,
    ) -> Result<Self, ConfigurationError> {
        let resolved = apply_defaults(
            key,
            &raw.into_config(),
            kind_template,
            controller_default,
            &ActionConfig::global_default(),
        );
        Self::from_resolved(resolved, owner)
    }

    fn from_resolved(
        resolved: ResolvedAction<HandlerRef>,
        owner: &Arc<ControllerMethods>,
    ) -> Result<Self, ConfigurationError> {
        let ResolvedAction {
            name,
            method,
            path,
            priority,
            enabled,
            handler,
        } = resolved;

        let handler = match handler {
            Some(HandlerRef::Callable(handler)) => Some(handler),
            Some(HandlerRef::Named(handler_name)) => owner.get(&handler_name).cloned(),
            None => owner.get(&name).cloned(),
        }
        .ok_or_else(|| ConfigurationError::WrongHandler(name.clone()))?;

        Ok(Self {
            name,
            method,
            path,
            priority,
            enabled,
            handler,
            owner: Arc::clone(owner),
        })
    }

    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Looks up another method of the owning controller.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Handler> {
        self.owner.get(name)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::controller::handler::handler_fn;
    use crate::controller::ResData;

    fn noop() -> Handler {
        handler_fn(|_scope| Box::pin(async { Ok(None) }))
    }

    fn methods(names: &[&str]) -> Arc<ControllerMethods> {
        let mut table = ControllerMethods::new();
        for name in names {
            table.insert(*name, noop());
        }
        Arc::new(table)
    }

    #[test]
    fn handler_defaults_to_method_named_after_key() {
        let owner = methods(&["preview"]);
        let action = Action::normalize(
            "preview",
            RawAction::Toggle(true),
            None,
            &ActionConfig::default(),
            &owner,
        )
        .unwrap();
        assert!(Arc::ptr_eq(action.handler(), owner.get("preview").unwrap()));
        assert_eq!(action.path, "preview");
        assert_eq!(action.method, vec!["get"]);
    }

    #[test]
    fn named_handler_resolves_against_controller() {
        let owner = methods(&["sendFile"]);
        let raw = RawAction::Config(ActionConfig::default().handler("sendFile"));
        let action =
            Action::normalize("download", raw, None, &ActionConfig::default(), &owner).unwrap();
        assert!(Arc::ptr_eq(action.handler(), owner.get("sendFile").unwrap()));
    }

    #[test]
    fn callable_handler_is_used_as_is() {
        let owner = methods(&[]);
        let handler = handler_fn(|_scope| Box::pin(async { Ok(Some(ResData::Json(json!(1)))) }));
        let raw = RawAction::Config(ActionConfig::default().handler(Arc::clone(&handler)));
        let action = Action::normalize("inline", raw, None, &ActionConfig::default(), &owner).unwrap();
        assert!(Arc::ptr_eq(action.handler(), &handler));
    }

    #[test]
    fn unresolvable_handler_is_fatal() {
        let owner = methods(&["replace"]);
        let raw = RawAction::Config(ActionConfig::default().handler("doesNotExist"));
        let err = Action::normalize("replace", raw, None, &ActionConfig::default(), &owner)
            .unwrap_err();
        assert_eq!(err.to_string(), "Wrong handler for replace");
    }

    #[test]
    fn disabled_actions_still_need_a_handler() {
        let owner = methods(&[]);
        let err = Action::normalize(
            "ghost",
            RawAction::Toggle(false),
            None,
            &ActionConfig::default(),
            &owner,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::WrongHandler(name) if name == "ghost"));
    }

    #[test]
    fn action_reaches_other_controller_methods() {
        let owner = methods(&["preview", "thumbnail"]);
        let action = Action::normalize(
            "preview",
            RawAction::Toggle(true),
            None,
            &ActionConfig::default(),
            &owner,
        )
        .unwrap();
        assert!(action.resolve("thumbnail").is_some());
        assert!(action.resolve("missing").is_none());
    }

    proptest! {
        #[test]
        fn name_is_the_key_whatever_the_config_says(
            key in "[a-z]{1,8}",
            user_name in "[A-Z]{1,8}",
        ) {
            let owner = methods(&["h"]);
            let raw = RawAction::Config(ActionConfig {
                name: Some(user_name),
                handler: Some(HandlerRef::from("h")),
                ..ActionConfig::default()
            });
            let action = Action::normalize(&key, raw, None, &ActionConfig::default(), &owner).unwrap();
            prop_assert_eq!(action.name, key);
        }
    }
}
