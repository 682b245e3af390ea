use std::sync::Arc;

use http::StatusCode;
use restifizer_core::{classify_data_source_error, DataSourceError, ParsedError, StackDiagnostics};
use serde_json::Value;

use crate::controller::{
    Action, Controller, ConfigurationError, DispatchFn, RequestError, RequestScope, ResData,
    StreamResult,
};

/// Pluggable HTTP transport. Owns route registration and response I/O.
/// Implementations: axum router, in-memory recorder (tests).
pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Registers `dispatch` for `method` on every prefix in `base_paths`
    /// joined with `action.path`. When a method/path pair is already taken
    /// the first registration wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the route cannot be registered. Binding aborts on
    /// the first error.
    fn add_route(
        &self,
        controller: &Arc<Controller>,
        method: &str,
        base_paths: &[String],
        action: &Arc<Action>,
        dispatch: DispatchFn,
    ) -> anyhow::Result<()>;

    /// Stores the outcome and status on the scope for the send step.
    fn set_res_data(&self, data: Option<ResData>, scope: &mut RequestScope, status: StatusCode) {
        scope.restful_result = data;
        scope.status = Some(status);
    }

    /// Commits a non-stream result.
    fn send_result(&self, result: Option<Value>, scope: &mut RequestScope);

    /// Commits a streamed result.
    fn send_stream(&self, file: StreamResult, scope: &mut RequestScope);
}

/// Persistence backend, consulted only for its error vocabulary.
pub trait DataSource: Send + Sync {
    /// Claims an error the backend raised. The default understands
    /// [`DataSourceError`] sources.
    fn parse_error(&self, err: &RequestError) -> Option<ParsedError> {
        err.downcast_ref::<DataSourceError>()
            .and_then(classify_data_source_error)
    }
}

/// Controller-level error hook, consulted before the data source.
pub trait ErrorParser: Send + Sync {
    fn parse_error(&self, err: &RequestError) -> Option<ParsedError>;
}

impl<F> ErrorParser for F
where
    F: Fn(&RequestError) -> Option<ParsedError> + Send + Sync,
{
    fn parse_error(&self, err: &RequestError) -> Option<ParsedError> {
        self(err)
    }
}

/// Sink for controller error logs.
pub trait ErrorLog: Send + Sync {
    fn error(&self, message: &str);

    /// Logs call-site diagnostics extracted from a failed request.
    fn diagnostics(&self, data: &StackDiagnostics) {
        self.error(&format!("{data:?}"));
    }
}

/// Default log: `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl ErrorLog for TracingLog {
    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn diagnostics(&self, data: &StackDiagnostics) {
        match data {
            StackDiagnostics::CallSite(site) => tracing::error!(
                method = %site.method,
                file = %site.file,
                path = %site.path,
                line = %site.line,
                pos = %site.pos,
                stack = %site.stack,
                "request failed at call site"
            ),
            StackDiagnostics::Raw(raw) => tracing::error!(raw = %raw, "request failed"),
        }
    }
}

/// Construction-time extension. Runs once, after action normalization.
pub trait ControllerPlugin: Send + Sync {
    /// # Errors
    ///
    /// Returns a configuration error to abort controller construction.
    fn apply(&self, controller: &mut Controller, options: &Value) -> Result<(), ConfigurationError>;
}

impl<F> ControllerPlugin for F
where
    F: Fn(&mut Controller, &Value) -> Result<(), ConfigurationError> + Send + Sync,
{
    fn apply(&self, controller: &mut Controller, options: &Value) -> Result<(), ConfigurationError> {
        self(controller, options)
    }
}
