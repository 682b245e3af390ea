//! Error mapping: any handler failure becomes a fully populated
//! [`NormalizedError`] sent at its status.

use std::sync::Arc;

use http::StatusCode;
use restifizer_core::error::reason;
use restifizer_core::{
    extract_call_site, ErrorStatus, NormalizedError, ParsedError, StackDiagnostics, ERROR_TYPE,
};
use serde_json::Value;

use super::errors::RequestError;
use super::handler::ResData;
use super::scope::RequestScope;
use super::Controller;

impl Controller {
    /// Normalizes `err`, stores it on the scope at its status, and logs it
    /// with call-site diagnostics. `None` stands for a failure that carried
    /// no error value and maps to a generic `500`.
    pub fn set_res_error(&self, err: Option<RequestError>, scope: &mut RequestScope) -> NormalizedError {
        let err = err.unwrap_or_else(|| {
            RequestError::default().status(StatusCode::INTERNAL_SERVER_ERROR)
        });
        let normalized = self.normalize_error(&err);
        let status =
            StatusCode::from_u16(normalized.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let transport = Arc::clone(&scope.transport);
        transport.set_res_data(Some(ResData::Json(normalized.to_json())), scope, status);
        self.log.error(&format!(
            "Error({}): {}: {}",
            normalized.status, normalized.message, normalized.details
        ));

        match extract_call_site(err.stack_trace().as_deref()) {
            Ok(data) => self.log.diagnostics(&data),
            Err(failure) => {
                self.log.error("Error in error handler!");
                self.log
                    .diagnostics(&StackDiagnostics::Raw(failure.to_string()));
            }
        }

        normalized
    }

    /// Builds the normalized body for `err` without touching any scope.
    ///
    /// An explicit status is taken as is. Otherwise the controller's parse
    /// hook is asked first and the data source's second; the first claim is
    /// merged over the error's own fields. Unclaimed errors are `500`.
    #[must_use]
    pub fn normalize_error(&self, err: &RequestError) -> NormalizedError {
        let mut parsed = ParsedError {
            status: err.http_status().map(ErrorStatus::from),
            kind: err.kind_tag().map(str::to_string),
            error: err.error_text().map(str::to_string),
            message: err.message_text().map(str::to_string),
            details: err.details_value().cloned(),
        };

        if parsed.status.is_none() {
            let claim = self
                .parse_error
                .as_ref()
                .and_then(|hook| hook.parse_error(err))
                .or_else(|| {
                    self.data_source
                        .as_ref()
                        .and_then(|data_source| data_source.parse_error(err))
                });
            match claim {
                Some(claim) => merge(&mut parsed, claim),
                None => parsed.status = Some(ErrorStatus::Http(StatusCode::INTERNAL_SERVER_ERROR)),
            }
        }

        finish(parsed)
    }
}

fn merge(into: &mut ParsedError, claim: ParsedError) {
    let ParsedError {
        status,
        kind,
        error,
        message,
        details,
    } = claim;
    if status.is_some() {
        into.status = status;
    }
    if kind.is_some() {
        into.kind = kind;
    }
    if error.is_some() {
        into.error = error;
    }
    if message.is_some() {
        into.message = message;
    }
    if details.is_some() {
        into.details = details;
    }
}

fn finish(parsed: ParsedError) -> NormalizedError {
    let status = parsed
        .status
        .map(ErrorStatus::code)
        .filter(|code| StatusCode::from_u16(*code).is_ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR.as_u16());
    NormalizedError {
        kind: parsed.kind.unwrap_or_else(|| ERROR_TYPE.to_string()),
        status,
        error: parsed.error.unwrap_or_else(|| reason(status)),
        message: parsed.message.unwrap_or_else(|| reason(status)),
        details: parsed.details.unwrap_or(Value::Null),
    }
}
