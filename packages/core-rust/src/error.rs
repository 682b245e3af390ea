//! The canonical error shape sent to callers, and the partial result that
//! error-parse hooks return.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `type` tag used when an error does not carry its own.
pub const ERROR_TYPE: &str = "restifizer-files";

/// Status of a parsed error: either a bare numeric code or a status object
/// that carries one. Both forms collapse to the bare code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    Code(u16),
    Http(StatusCode),
}

impl ErrorStatus {
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Code(code) => code,
            Self::Http(status) => status.as_u16(),
        }
    }
}

impl From<u16> for ErrorStatus {
    fn from(code: u16) -> Self {
        Self::Code(code)
    }
}

impl From<StatusCode> for ErrorStatus {
    fn from(status: StatusCode) -> Self {
        Self::Http(status)
    }
}

/// What an error-parse hook claims about an error. Set fields override the
/// corresponding fields of the normalized result; unset fields leave them
/// alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedError {
    pub status: Option<ErrorStatus>,
    pub kind: Option<String>,
    pub error: Option<String>,
    pub message: Option<String>,
    pub details: Option<Value>,
}

impl ParsedError {
    #[must_use]
    pub fn with_status(status: impl Into<ErrorStatus>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
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

    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Canonical error body: `{type, status, error, message, details}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedError {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub details: Value,
}

impl NormalizedError {
    /// The generic 500 used when there is nothing to normalize.
    #[must_use]
    pub fn internal() -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self {
            kind: ERROR_TYPE.to_string(),
            status: status.as_u16(),
            error: reason(status.as_u16()),
            message: reason(status.as_u16()),
            details: Value::Null,
        }
    }

    /// The body as JSON, fields in `type, status, error, message, details`
    /// order.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "type": self.kind,
            "status": self.status,
            "error": self.error,
            "message": self.message,
            "details": self.details,
        })
    }
}

/// Reason phrase for a status code, or `"Unknown Status"` for codes outside
/// the registry.
#[must_use]
pub fn reason(code: u16) -> String {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown Status")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_object_unwraps_to_code() {
        assert_eq!(ErrorStatus::from(StatusCode::CONFLICT).code(), 409);
        assert_eq!(ErrorStatus::from(422).code(), 422);
    }

    #[test]
    fn normalized_error_serializes_type_field() {
        let json = serde_json::to_value(NormalizedError::internal()).unwrap();
        assert_eq!(json["type"], "restifizer-files");
        assert_eq!(json["status"], 500);
        assert_eq!(json["message"], "Internal Server Error");
        assert!(json["details"].is_null());
    }

    #[test]
    fn reason_for_unknown_code() {
        assert_eq!(reason(404), "Not Found");
        assert_eq!(reason(799), "Unknown Status");
    }
}
