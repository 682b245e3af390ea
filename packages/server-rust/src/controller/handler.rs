//! Action handlers and the values they produce.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use http::StatusCode;
use serde::de::{Deserialize, Deserializer};
use serde_json::Value;

use super::errors::RequestError;
use super::scope::RequestScope;

/// Body chunks of a streamed result.
pub type BodyStream = BoxStream<'static, std::io::Result<Bytes>>;

/// What a handler hands back: `Ok(None)` means "no content".
pub type HandlerResult = Result<Option<ResData>, RequestError>;

/// A streamed file plus the metadata a transport needs to send it.
pub struct StreamResult {
    pub stream: BodyStream,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub file_name: Option<String>,
}

impl StreamResult {
    #[must_use]
    pub fn new(stream: BodyStream) -> Self {
        Self {
            stream,
            content_type: None,
            content_length: None,
            file_name: None,
        }
    }
}

impl fmt::Debug for StreamResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResult")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

/// A handler's resolved value.
#[derive(Debug)]
pub enum ResData {
    Json(Value),
    Stream(StreamResult),
}

impl From<Value> for ResData {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<StreamResult> for ResData {
    fn from(file: StreamResult) -> Self {
        Self::Stream(file)
    }
}

/// The callable behind an action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn call(&self, scope: &mut RequestScope) -> HandlerResult;
}

/// Shared handler reference stored in method tables and actions.
pub type Handler = Arc<dyn ActionHandler>;

/// Adapter turning a closure into an [`ActionHandler`].
pub struct HandlerFn<F>(F);

#[async_trait]
impl<F> ActionHandler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut RequestScope) -> BoxFuture<'a, HandlerResult> + Send + Sync,
{
    async fn call(&self, scope: &mut RequestScope) -> HandlerResult {
        (self.0)(scope).await
    }
}

/// Wraps a closure returning a boxed future as a [`Handler`].
///
/// ```ignore
/// let ping = handler_fn(|_scope| Box::pin(async { Ok(Some(ResData::Json(json!("pong")))) }));
/// ```
pub fn handler_fn<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut RequestScope) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(HandlerFn(f))
}

/// Handler decorator that fails with `504 Gateway Timeout` when the inner
/// handler does not settle in time.
pub struct TimeoutHandler {
    inner: Handler,
    timeout: Duration,
}

#[async_trait]
impl ActionHandler for TimeoutHandler {
    async fn call(&self, scope: &mut RequestScope) -> HandlerResult {
        match tokio::time::timeout(self.timeout, self.inner.call(scope)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                #[allow(clippy::cast_possible_truncation)]
                let timeout_ms = self.timeout.as_millis() as u64;
                Err(RequestError::with_status(StatusCode::GATEWAY_TIMEOUT)
                    .message(format!("handler timed out after {timeout_ms}ms")))
            }
        }
    }
}

/// Wraps `inner` with a timeout. The core pipeline has none of its own.
#[must_use]
pub fn with_timeout(inner: Handler, timeout: Duration) -> Handler {
    Arc::new(TimeoutHandler { inner, timeout })
}

/// How an action names its handler: a method of the controller, or a
/// handler given directly.
#[derive(Clone)]
pub enum HandlerRef {
    Named(String),
    Callable(Handler),
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl From<String> for HandlerRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<&str> for HandlerRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<Handler> for HandlerRef {
    fn from(handler: Handler) -> Self {
        Self::Callable(handler)
    }
}

impl<'de> Deserialize<'de> for HandlerRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Named)
    }
}
