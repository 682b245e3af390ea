//! Transports: where routes live and responses are written.

pub mod memory;
pub mod router;

pub use memory::{MemoryTransport, RouteRecord};
pub use router::RouterTransport;

use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use tracing::warn;

use crate::controller::{RequestScope, SentBody, SentResponse, StreamResult};

/// Joins a controller base path and an action path into a route path.
/// An empty action path routes the base itself.
#[must_use]
pub fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    let joined = match (base.is_empty(), path.is_empty()) {
        (true, true) => String::new(),
        (false, true) => base.to_string(),
        (true, false) => path.to_string(),
        (false, false) => format!("{base}/{path}"),
    };
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{joined}")
    }
}

/// Response headers describing a streamed file.
#[must_use]
pub fn stream_headers(file: &StreamResult) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = file
        .content_type
        .as_deref()
        .and_then(|content_type| HeaderValue::from_str(content_type).ok())
    {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Some(length) = file.content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    if let Some(value) = file
        .file_name
        .as_deref()
        .and_then(|name| HeaderValue::from_str(&format!("inline; filename=\"{name}\"")).ok())
    {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    headers
}

/// Writes the committed response onto the scope at the status the
/// pipeline chose.
pub(crate) fn commit(scope: &mut RequestScope, headers: HeaderMap, body: SentBody) {
    if scope.transport_data.response.is_some() {
        warn!(
            action = scope.action.as_deref().unwrap_or_default(),
            "response already committed, overwriting"
        );
    }
    scope.transport_data.response = Some(SentResponse {
        status: scope.status.unwrap_or(StatusCode::OK),
        headers,
        body,
    });
}
