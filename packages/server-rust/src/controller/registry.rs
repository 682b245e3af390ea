//! Action registry: the build pipeline from a raw action map to a frozen,
//! ordered set of actions.

use std::sync::Arc;

use restifizer_core::action::DEFAULT_ACTION_KEY;
use restifizer_core::{ActionConfig, ActionMap, BuiltinAction, RawAction};

use super::action::{Action, ControllerMethods};
use super::errors::ConfigurationError;
use super::handler::HandlerRef;

/// Normalized actions in configuration order.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: Vec<Arc<Action>>,
}

/// Output of [`ActionRegistry::build`].
#[derive(Debug)]
pub struct BuiltRegistry {
    pub registry: ActionRegistry,
    /// The `default` entry, kept as the controller-wide template.
    pub controller_default: ActionConfig<HandlerRef>,
}

impl ActionRegistry {
    /// Builds the registry from the raw action map.
    ///
    /// 1. The `default` entry is removed and becomes the controller template.
    ///    A scalar `default` carries no fields and is ignored.
    /// 2. Built-in actions missing from the map are appended in
    ///    `selectOne, replace, delete` order; present ones keep their slot.
    /// 3. Every entry is layered (user > kind template > controller default
    ///    > global default) and its handler resolved.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] raised while normalizing.
    pub fn build(
        mut raw: ActionMap<HandlerRef>,
        supported_methods: &[String],
        owner: &Arc<ControllerMethods>,
    ) -> Result<BuiltRegistry, ConfigurationError> {
        let controller_default = match raw.shift_remove(DEFAULT_ACTION_KEY) {
            Some(RawAction::Config(config)) => config,
            Some(RawAction::Toggle(_)) | None => ActionConfig::default(),
        };

        for builtin in BuiltinAction::ALL {
            raw.entry(builtin.key().to_string())
                .or_insert_with(|| RawAction::Config(ActionConfig::default()));
        }

        let actions = raw
            .into_iter()
            .map(|(key, entry)| {
                let template = BuiltinAction::from_key(&key)
                    .map(|builtin| builtin.template::<HandlerRef>(supported_methods));
                Action::normalize(&key, entry, template.as_ref(), &controller_default, owner)
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BuiltRegistry {
            registry: Self { actions },
            controller_default,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Action>> {
        self.actions.iter().find(|action| action.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Action>> {
        self.actions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Inserts an already-normalized action. An action with the same name is
    /// replaced in place; otherwise the action is appended.
    pub fn insert(&mut self, action: Action) {
        let action = Arc::new(action);
        match self.actions.iter_mut().find(|a| a.name == action.name) {
            Some(slot) => *slot = action,
            None => self.actions.push(action),
        }
    }

    /// Actions in bind order: ascending priority, ties in registry order.
    #[must_use]
    pub fn by_priority(&self) -> Vec<Arc<Action>> {
        let mut ordered = self.actions.clone();
        // `sort_by_key` is stable.
        ordered.sort_by_key(|action| action.priority);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::controller::handler::{handler_fn, Handler};

    fn noop() -> Handler {
        handler_fn(|_scope| Box::pin(async { Ok(None) }))
    }

    fn owner() -> Arc<ControllerMethods> {
        let mut table = ControllerMethods::new();
        for name in ["selectOne", "replace", "delete", "preview", "upload"] {
            table.insert(name, noop());
        }
        Arc::new(table)
    }

    fn parse(value: serde_json::Value) -> ActionMap<HandlerRef> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn builtins_are_always_present() {
        let built = ActionRegistry::build(ActionMap::new(), &[], &owner()).unwrap();
        let names: Vec<_> = built.registry.iter().map(|a| a.name.clone()).collect();
        assert_eq!(names, vec!["selectOne", "replace", "delete"]);

        let select = built.registry.get("selectOne").unwrap();
        assert_eq!(select.method, vec!["get", "head"]);
        assert_eq!(select.path, "");
        let replace = built.registry.get("replace").unwrap();
        assert_eq!(replace.method, vec!["put"]);
        let delete = built.registry.get("delete").unwrap();
        assert_eq!(delete.method, vec!["delete"]);
    }

    #[test]
    fn supported_methods_drive_replace() {
        let methods = vec!["post".to_string(), "put".to_string()];
        let built = ActionRegistry::build(ActionMap::new(), &methods, &owner()).unwrap();
        assert_eq!(built.registry.get("replace").unwrap().method, vec!["post", "put"]);
    }

    #[test]
    fn default_entry_is_a_template_not_an_action() {
        let raw = parse(json!({
            "default": { "priority": 7, "enabled": false },
            "preview": {},
        }));
        let built = ActionRegistry::build(raw, &[], &owner()).unwrap();
        assert!(built.registry.get("default").is_none());
        assert_eq!(built.controller_default.priority, Some(7));

        let preview = built.registry.get("preview").unwrap();
        assert_eq!(preview.priority, 7);
        assert!(!preview.enabled);
        // Kind templates sit above the controller default.
        let select = built.registry.get("selectOne").unwrap();
        assert_eq!(select.path, "");
        assert_eq!(select.priority, 7);
    }

    #[test]
    fn user_fields_override_template_and_default() {
        let raw = parse(json!({
            "default": { "method": "post", "priority": 4 },
            "selectOne": { "method": "get", "path": "current", "priority": 2 },
        }));
        let built = ActionRegistry::build(raw, &[], &owner()).unwrap();
        let select = built.registry.get("selectOne").unwrap();
        assert_eq!(select.method, vec!["get"]);
        assert_eq!(select.path, "current");
        assert_eq!(select.priority, 2);
        // The template still beats the controller default for `delete`.
        assert_eq!(built.registry.get("delete").unwrap().method, vec!["delete"]);
    }

    #[test]
    fn user_order_is_kept_and_missing_builtins_appended() {
        let raw = parse(json!({
            "upload": { "method": "post" },
            "replace": {},
            "preview": true,
        }));
        let built = ActionRegistry::build(raw, &[], &owner()).unwrap();
        let names: Vec<_> = built.registry.iter().map(|a| a.name.clone()).collect();
        assert_eq!(names, vec!["upload", "replace", "preview", "selectOne", "delete"]);
    }

    #[test]
    fn toggle_disables_builtin() {
        let raw = parse(json!({ "delete": false }));
        let built = ActionRegistry::build(raw, &[], &owner()).unwrap();
        let delete = built.registry.get("delete").unwrap();
        assert!(!delete.enabled);
        assert_eq!(delete.method, vec!["delete"]);
    }

    #[test]
    fn wrong_handler_aborts_the_build() {
        let raw = parse(json!({ "replace": { "handler": "doesNotExist" } }));
        let err = ActionRegistry::build(raw, &[], &owner()).unwrap_err();
        assert_eq!(err.to_string(), "Wrong handler for replace");
    }

    #[test]
    fn by_priority_is_stable() {
        let raw = parse(json!({
            "upload": { "priority": 2 },
            "preview": { "priority": 1 },
        }));
        let built = ActionRegistry::build(raw, &[], &owner()).unwrap();
        let order: Vec<_> = built
            .registry
            .by_priority()
            .iter()
            .map(|a| a.name.clone())
            .collect();
        assert_eq!(order, vec!["preview", "selectOne", "replace", "delete", "upload"]);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut registry = ActionRegistry::build(ActionMap::new(), &[], &owner())
            .unwrap()
            .registry;
        let replacement = Action::normalize(
            "replace",
            RawAction::Config(ActionConfig::default().priority(9)),
            None,
            &ActionConfig::default(),
            &owner(),
        )
        .unwrap();
        registry.insert(replacement);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("replace").unwrap().priority, 9);
    }
}
