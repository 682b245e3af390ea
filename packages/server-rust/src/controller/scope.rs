//! Per-request context threaded through the dispatch pipeline.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, StatusCode};
use serde_json::{Map, Value};

use super::handler::{ResData, StreamResult};
use super::Controller;
use crate::traits::Transport;

/// Request data captured by the transport, plus the response it committed.
#[derive(Debug, Default)]
pub struct TransportData {
    pub method: Method,
    /// Matched request path.
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Transport-specific values.
    pub extensions: Extensions,
    /// Set exactly once by the transport's send step.
    pub response: Option<SentResponse>,
}

/// Body of a committed response.
#[derive(Debug)]
pub enum SentBody {
    Empty,
    Json(Value),
    Stream(StreamResult),
}

/// A response committed by a transport, independent of the HTTP library.
#[derive(Debug)]
pub struct SentResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: SentBody,
}

/// Per-request context. Created fresh for every call, never shared.
pub struct RequestScope {
    /// The controller handling the request. Weak: the scope never keeps a
    /// controller alive.
    pub owner: Weak<Controller>,
    /// Request-derived data accumulated by handlers.
    pub model: Map<String, Value>,
    /// The transport serving this request.
    pub transport: Arc<dyn Transport>,
    pub transport_data: TransportData,
    /// Outcome to send; written once by the pipeline.
    pub restful_result: Option<ResData>,
    /// Status chosen by the success or error mapper.
    pub status: Option<StatusCode>,
    /// Set by handlers that created a resource; selects `201` over `200`.
    pub new_content: bool,
    /// Name of the action being dispatched.
    pub action: Option<String>,
}

impl RequestScope {
    /// A scope with no owning controller.
    #[must_use]
    pub fn detached(transport: Arc<dyn Transport>) -> Self {
        Self {
            owner: Weak::new(),
            model: Map::new(),
            transport,
            transport_data: TransportData::default(),
            restful_result: None,
            status: None,
            new_content: false,
            action: None,
        }
    }

    /// The owning controller, if it is still alive.
    #[must_use]
    pub fn controller(&self) -> Option<Arc<Controller>> {
        self.owner.upgrade()
    }

    /// The committed response, if the send step ran.
    #[must_use]
    pub fn response(&self) -> Option<&SentResponse> {
        self.transport_data.response.as_ref()
    }
}

impl Controller {
    /// Creates the scope for one request served by `transport`.
    #[must_use]
    pub fn create_scope(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
        transport_data: TransportData,
    ) -> RequestScope {
        RequestScope {
            owner: Arc::downgrade(self),
            transport_data,
            ..RequestScope::detached(transport)
        }
    }
}
