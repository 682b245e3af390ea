//! Construction-time and request-time error types.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

use http::StatusCode;
use restifizer_core::diagnostics::collapse_backtrace;
use serde_json::Value;

/// Fatal error raised while constructing or binding a controller.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("\"{0}\" is required")]
    MissingOption(&'static str),
    #[error("Wrong handler for {0}")]
    WrongHandler(String),
    #[error("failed to set route for action {action} and path {path}")]
    RouteRegistration {
        action: String,
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid controller settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),
    #[error("plugin {plugin} failed: {message}")]
    Plugin { plugin: String, message: String },
}

/// A request failure raised by a handler.
///
/// Every field is optional; the normalizer fills the gaps. `source` keeps the
/// original error so parse hooks can downcast it.
#[derive(Debug, Default)]
pub struct RequestError {
    kind: Option<String>,
    http_status: Option<StatusCode>,
    error: Option<String>,
    message: Option<String>,
    details: Option<Value>,
    source: Option<anyhow::Error>,
    stack: Option<String>,
    backtrace: Option<Backtrace>,
}

/// Captures the constructor's caller when backtraces are enabled through
/// `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE`. Kept out of line so the caller
/// is always the third frame below the header.
#[inline(never)]
fn capture() -> Option<Backtrace> {
    let backtrace = Backtrace::capture();
    (backtrace.status() == BacktraceStatus::Captured).then_some(backtrace)
}

impl RequestError {
    /// A plain error carrying only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            backtrace: capture(),
            ..Self::default()
        }
    }

    /// An error with an explicit HTTP status; parse hooks are skipped.
    #[must_use]
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            http_status: Some(status),
            backtrace: capture(),
            ..Self::default()
        }
    }

    /// Wraps an arbitrary error. Its `Display` becomes the message.
    #[must_use]
    pub fn from_anyhow(source: anyhow::Error) -> Self {
        Self::wrap(source, capture())
    }

    fn wrap(source: anyhow::Error, backtrace: Option<Backtrace>) -> Self {
        Self {
            message: Some(source.to_string()),
            source: Some(source),
            backtrace,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.http_status = Some(status);
        self
    }

    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attaches a stack in the `at <fn> (<file>:<line>:<col>)` shape.
    #[must_use]
    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    #[must_use]
    pub fn kind_tag(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    #[must_use]
    pub fn http_status(&self) -> Option<StatusCode> {
        self.http_status
    }

    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn message_text(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub fn details_value(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    #[must_use]
    pub fn source_error(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    /// Downcasts the wrapped source error.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.source.as_ref().and_then(anyhow::Error::downcast_ref::<E>)
    }

    /// The error's stack: an attached one, else the backtrace captured when
    /// the error was built, else the source's. `None` when backtraces are
    /// disabled and nothing was attached.
    #[must_use]
    pub fn stack_trace(&self) -> Option<String> {
        if let Some(stack) = &self.stack {
            return Some(stack.clone());
        }
        if let Some(backtrace) = &self.backtrace {
            return Some(collapse_backtrace(&self.to_string(), &backtrace.to_string()));
        }
        let source = self.source.as_ref()?;
        let backtrace = source.backtrace();
        (backtrace.status() == BacktraceStatus::Captured)
            .then(|| collapse_backtrace(&source.to_string(), &backtrace.to_string()))
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            f.write_str(message)
        } else if let Some(error) = &self.error {
            f.write_str(error)
        } else if let Some(status) = self.http_status {
            write!(f, "{status}")
        } else {
            f.write_str("request failed")
        }
    }
}

impl<E> From<E> for RequestError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(source: E) -> Self {
        Self::wrap(anyhow::Error::new(source), capture())
    }
}
