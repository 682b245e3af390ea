//! Built-in action kinds every file controller exposes.

use crate::action::{ActionConfig, MethodSpec};

/// Method used by `replace` when the controller configures none.
pub const DEFAULT_SUPPORTED_METHOD: &str = "put";

/// The three always-present actions of a file controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinAction {
    /// `GET`/`HEAD` on the controller root: read the stored file.
    SelectOne,
    /// Upload over the stored file with the configured supported methods.
    Replace,
    /// `DELETE` on the controller root.
    Delete,
}

impl BuiltinAction {
    /// All built-ins, in the order they are appended when absent.
    pub const ALL: [Self; 3] = [Self::SelectOne, Self::Replace, Self::Delete];

    /// Registry key of the action; also the controller method it resolves to.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::SelectOne => "selectOne",
            Self::Replace => "replace",
            Self::Delete => "delete",
        }
    }

    /// Looks up a built-in by its registry key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.key() == key)
    }

    /// Kind template layered between the user's config and the controller
    /// default. `supported_methods` only affects `replace`; an empty list
    /// falls back to `put`.
    #[must_use]
    pub fn template<H: From<String>>(self, supported_methods: &[String]) -> ActionConfig<H> {
        let method = match self {
            Self::SelectOne => MethodSpec::from(vec!["get", "head"]),
            Self::Replace if supported_methods.is_empty() => {
                MethodSpec::from(vec![DEFAULT_SUPPORTED_METHOD])
            }
            Self::Replace => MethodSpec::Many(supported_methods.to_vec()),
            Self::Delete => MethodSpec::from("delete"),
        };
        ActionConfig {
            method: Some(method),
            path: Some(String::new()),
            handler: Some(H::from(self.key().to_string())),
            ..ActionConfig::default()
        }
    }
}
