//! Per-request pipeline: handler, then success or error mapping, then a
//! single send.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt, TryStreamExt};
use http::StatusCode;
use tracing::{error, field, info_span, warn, Instrument, Span};

use super::action::Action;
use super::handler::ResData;
use super::scope::RequestScope;
use super::Controller;

/// Entry point a transport calls for every request on a bound route. The
/// returned scope carries the committed response.
pub type DispatchFn = Arc<dyn Fn(RequestScope) -> BoxFuture<'static, RequestScope> + Send + Sync>;

/// Builds the dispatch entry point for one action. The controller is held
/// weakly so routes stored in a transport never keep it alive.
pub(crate) fn dispatch_fn(controller: &Arc<Controller>, action: &Arc<Action>) -> DispatchFn {
    let controller = Arc::downgrade(controller);
    let action = Arc::clone(action);
    Arc::new(move |scope: RequestScope| -> BoxFuture<'static, RequestScope> {
        let controller = controller.upgrade();
        let action = Arc::clone(&action);
        Box::pin(async move {
            match controller {
                Some(controller) => controller.dispatch(&action, scope).await,
                None => {
                    warn!(action = %action.name, "controller dropped, request not dispatched");
                    scope
                }
            }
        })
    })
}

impl Controller {
    /// Runs `action` for one request.
    ///
    /// The handler's value goes through [`Controller::set_res_data`]; a
    /// rejection or a panic goes through [`Controller::set_res_error`]. The
    /// transport's send step then runs exactly once.
    pub async fn dispatch(&self, action: &Action, mut scope: RequestScope) -> RequestScope {
        let span = info_span!(
            "dispatch",
            action = %action.name,
            method = %scope.transport_data.method,
            status = field::Empty,
            elapsed_ms = field::Empty,
        );
        let started = Instant::now();

        async {
            scope.action = Some(action.name.clone());

            let outcome = AssertUnwindSafe(action.handler().call(&mut scope))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(data)) => self.set_res_data(data, &mut scope, None),
                Ok(Err(err)) => {
                    self.set_res_error(Some(err), &mut scope);
                }
                Err(panic) => {
                    error!(panic = %panic_message(panic.as_ref()), "handler panicked");
                    self.set_res_error(None, &mut scope);
                }
            }

            self.send_result(&mut scope);

            let span = Span::current();
            if let Some(status) = scope.status {
                span.record("status", status.as_u16());
            }
            #[allow(clippy::cast_possible_truncation)]
            span.record("elapsed_ms", started.elapsed().as_millis() as u64);
        }
        .instrument(span)
        .await;

        scope
    }

    /// Stores a handler's value on the scope with its status: `status` when
    /// given, else one already set on the scope, else `201` for new content,
    /// `200` for a value and `204` for none.
    pub fn set_res_data(
        &self,
        data: Option<ResData>,
        scope: &mut RequestScope,
        status: Option<StatusCode>,
    ) {
        let status = status.or(scope.status).unwrap_or(match (&data, scope.new_content) {
            (Some(_), true) => StatusCode::CREATED,
            (Some(_), false) => StatusCode::OK,
            (None, _) => StatusCode::NO_CONTENT,
        });
        let transport = Arc::clone(&scope.transport);
        transport.set_res_data(data, scope, status);
    }

    /// Hands the stored outcome to the transport. Streams are sent with
    /// `send_stream`; their item errors are logged on the way through.
    pub fn send_result(&self, scope: &mut RequestScope) {
        let transport = Arc::clone(&scope.transport);
        match scope.restful_result.take() {
            Some(ResData::Stream(mut file)) => {
                let log = Arc::clone(&self.log);
                file.stream = file
                    .stream
                    .inspect_err(move |err| log.error(&format!("Stream error: {err}")))
                    .boxed();
                transport.send_stream(file, scope);
            }
            Some(ResData::Json(value)) => transport.send_result(Some(value), scope),
            None => transport.send_result(None, scope),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
