//! axum transport: controller routes become routes of an [`axum::Router`].

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use anyhow::anyhow;
use axum::body::{to_bytes, Body};
use axum::extract::{FromRequestParts, Query, RawPathParams, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter};
use axum::{Json, Router};
use http::{HeaderMap, Method, StatusCode};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use super::{commit, join_path, stream_headers};
use crate::controller::{
    Action, Controller, DispatchFn, RequestScope, SentBody, SentResponse, StreamResult,
    TransportData,
};
use crate::network::{build_http_layers, NetworkConfig};
use crate::traits::Transport;

/// Largest request body read into a scope.
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

pub struct RouterTransport {
    me: Weak<RouterTransport>,
    router: Mutex<Router>,
    bound: Mutex<HashSet<(Method, String)>>,
    body_limit: usize,
}

impl RouterTransport {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_body_limit(DEFAULT_BODY_LIMIT)
    }

    #[must_use]
    pub fn with_body_limit(body_limit: usize) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            router: Mutex::new(Router::new()),
            bound: Mutex::new(HashSet::new()),
            body_limit,
        })
    }

    /// Takes the routes registered so far and wraps them in the HTTP
    /// middleware stack. Later registrations start a fresh router.
    #[must_use]
    pub fn into_router(&self, config: &NetworkConfig) -> Router {
        let router = std::mem::take(&mut *self.router.lock());
        router.layer(build_http_layers(config))
    }

    /// The `(method, path)` pairs bound so far.
    #[must_use]
    pub fn bound_routes(&self) -> Vec<(Method, String)> {
        let mut routes: Vec<_> = self.bound.lock().iter().cloned().collect();
        routes.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        routes
    }
}

impl Transport for RouterTransport {
    fn name(&self) -> &'static str {
        "axum"
    }

    fn add_route(
        &self,
        controller: &Arc<Controller>,
        method: &str,
        base_paths: &[String],
        action: &Arc<Action>,
        dispatch: DispatchFn,
    ) -> anyhow::Result<()> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
        let filter = MethodFilter::try_from(method.clone())?;

        for base in base_paths {
            let path = join_path(base, &action.path);
            let key = (method.clone(), path.clone());
            if self.bound.lock().contains(&key) {
                warn!(%method, %path, action = %action.name, "route already bound, skipped");
                continue;
            }

            let transport = self.me.clone();
            let owner = Arc::downgrade(controller);
            let dispatch = Arc::clone(&dispatch);
            let body_limit = self.body_limit;
            let handler = on(filter, move |request: Request| {
                serve(transport, owner, dispatch, body_limit, request)
            });

            let mut router = self.router.lock();
            let candidate = router.clone();
            *router = catch_unwind(AssertUnwindSafe(|| candidate.route(&path, handler)))
                .map_err(|_| anyhow!("axum rejected route {method} {path}"))?;
            self.bound.lock().insert(key);
            debug!(%method, %path, action = %action.name, "route bound");
        }
        Ok(())
    }

    fn send_result(&self, result: Option<Value>, scope: &mut RequestScope) {
        let body = result.map_or(SentBody::Empty, SentBody::Json);
        commit(scope, HeaderMap::new(), body);
    }

    fn send_stream(&self, file: StreamResult, scope: &mut RequestScope) {
        let headers = stream_headers(&file);
        commit(scope, headers, SentBody::Stream(file));
    }
}

async fn serve(
    transport: Weak<RouterTransport>,
    owner: Weak<Controller>,
    dispatch: DispatchFn,
    body_limit: usize,
    request: Request,
) -> Response {
    let (Some(transport), Some(controller)) = (transport.upgrade(), owner.upgrade()) else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let data = match transport_data(request, body_limit).await {
        Ok(data) => data,
        Err(rejection) => return rejection,
    };

    let transport: Arc<dyn Transport> = transport;
    let scope = dispatch(controller.create_scope(transport, data)).await;
    into_response(scope)
}

async fn transport_data(request: Request, body_limit: usize) -> Result<TransportData, Response> {
    let (mut parts, body) = request.into_parts();

    let params = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .map_err(IntoResponse::into_response)?
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    let Query(query) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map_err(IntoResponse::into_response)?;
    let body = to_bytes(body, body_limit)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE.into_response())?;

    Ok(TransportData {
        path: parts.uri.path().to_string(),
        method: parts.method,
        params,
        query,
        headers: parts.headers,
        body,
        extensions: parts.extensions,
        response: None,
    })
}

fn into_response(scope: RequestScope) -> Response {
    let Some(SentResponse {
        status,
        headers,
        body,
    }) = scope.transport_data.response
    else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mut response = match body {
        SentBody::Empty => Body::empty().into_response(),
        SentBody::Json(value) => Json(value).into_response(),
        SentBody::Stream(file) => Body::from_stream(file.stream).into_response(),
    };
    *response.status_mut() = status;
    response.headers_mut().extend(headers);
    response
}
