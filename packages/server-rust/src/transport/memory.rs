//! In-process transport that records registrations and responses.
//!
//! Used by tests to drive controllers without a socket: routes are kept in
//! registration order and can be invoked directly with [`MemoryTransport::invoke`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use anyhow::bail;
use http::{HeaderMap, Method};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::{commit, join_path, stream_headers};
use crate::controller::{
    Action, Controller, DispatchFn, RequestScope, SentBody, StreamResult, TransportData,
};
use crate::traits::Transport;

/// A registered route as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    /// Lowercase verb.
    pub method: String,
    pub path: String,
    pub action: String,
}

struct MemoryRoute {
    record: RouteRecord,
    controller: Weak<Controller>,
    dispatch: DispatchFn,
}

pub struct MemoryTransport {
    me: Weak<MemoryTransport>,
    routes: Mutex<Vec<MemoryRoute>>,
    reject: Mutex<Option<String>>,
    sends: AtomicUsize,
    streams: AtomicUsize,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            routes: Mutex::new(Vec::new()),
            reject: Mutex::new(None),
            sends: AtomicUsize::new(0),
            streams: AtomicUsize::new(0),
        })
    }

    /// Makes every registration for `action` fail.
    pub fn reject_action(&self, action: impl Into<String>) {
        *self.reject.lock() = Some(action.into());
    }

    /// Registered routes in registration order.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteRecord> {
        self.routes
            .lock()
            .iter()
            .map(|route| route.record.clone())
            .collect()
    }

    /// Number of `send_result` calls.
    #[must_use]
    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Number of `send_stream` calls.
    #[must_use]
    pub fn streams(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    /// Dispatches a request to the route bound for `method` and `path`.
    /// Returns `None` when no live route matches.
    pub async fn invoke(
        &self,
        method: &str,
        path: &str,
        mut data: TransportData,
    ) -> Option<RequestScope> {
        let method = method.to_lowercase();
        let (controller, dispatch) = {
            let routes = self.routes.lock();
            let route = routes
                .iter()
                .find(|route| route.record.method == method && route.record.path == path)?;
            (route.controller.upgrade()?, Arc::clone(&route.dispatch))
        };
        let transport: Arc<dyn Transport> = self.me.upgrade()?;

        data.method = Method::from_bytes(method.to_uppercase().as_bytes()).ok()?;
        data.path = path.to_string();
        let scope = controller.create_scope(transport, data);
        Some(dispatch(scope).await)
    }
}

impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn add_route(
        &self,
        controller: &Arc<Controller>,
        method: &str,
        base_paths: &[String],
        action: &Arc<Action>,
        dispatch: DispatchFn,
    ) -> anyhow::Result<()> {
        if self.reject.lock().as_deref() == Some(action.name.as_str()) {
            bail!("route for {} rejected", action.name);
        }

        let mut routes = self.routes.lock();
        for base in base_paths {
            let record = RouteRecord {
                method: method.to_lowercase(),
                path: join_path(base, &action.path),
                action: action.name.clone(),
            };
            let taken = routes
                .iter()
                .any(|route| route.record.method == record.method && route.record.path == record.path);
            if taken {
                debug!(method = %record.method, path = %record.path, action = %record.action, "route already bound, skipped");
                continue;
            }
            routes.push(MemoryRoute {
                record,
                controller: Arc::downgrade(controller),
                dispatch: Arc::clone(&dispatch),
            });
        }
        Ok(())
    }

    fn send_result(&self, result: Option<Value>, scope: &mut RequestScope) {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let body = result.map_or(SentBody::Empty, SentBody::Json);
        commit(scope, HeaderMap::new(), body);
    }

    fn send_stream(&self, file: StreamResult, scope: &mut RequestScope) {
        self.streams.fetch_add(1, Ordering::SeqCst);
        let headers = stream_headers(&file);
        commit(scope, headers, SentBody::Stream(file));
    }
}
