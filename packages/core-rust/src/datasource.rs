//! Error vocabulary of persistence backends and its mapping onto HTTP.
//!
//! Data sources report failures as [`DataSourceError`]. The classifier turns
//! them into a [`ParsedError`] the normalizer can merge:
//!
//! | Variant | Status | Details |
//! |---------|--------|---------|
//! | `Validation` | 400 | per-field errors |
//! | `Cast` | 400 | `{<path>: {message, name, path, type, value}}` |
//! | `Backend` with code 11000 or 11001 | 400 | backend payload |
//! | `VersionConflict` | 409 | conflict message |

use http::StatusCode;
use serde_json::{json, Map, Value};

use crate::error::ParsedError;

/// Backend codes reported for a duplicate-key index violation.
pub const DUPLICATE_KEY_CODES: [i64; 2] = [11000, 11001];

/// Failures raised by a data source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataSourceError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        /// Field name -> error description.
        errors: Map<String, Value>,
    },
    #[error("cast to {kind} failed for value {value} at path {path}")]
    Cast {
        message: String,
        path: String,
        kind: String,
        value: Value,
    },
    #[error("backend error {code}: {message}")]
    Backend {
        code: i64,
        message: String,
        details: Value,
    },
    #[error("version conflict: {message}")]
    VersionConflict { message: String },
}

impl DataSourceError {
    /// Name of the error class as the backend reports it.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::Cast { .. } => "CastError",
            Self::Backend { .. } => "BackendError",
            Self::VersionConflict { .. } => "VersionError",
        }
    }

    /// True for a backend error whose code marks a duplicate key.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::Backend { code, .. } if DUPLICATE_KEY_CODES.contains(code))
    }
}

/// Maps a data-source error onto a status and details. Backend errors other
/// than duplicate keys are not claimed.
#[must_use]
pub fn classify_data_source_error(err: &DataSourceError) -> Option<ParsedError> {
    match err {
        DataSourceError::Validation { message, errors } => Some(
            ParsedError::with_status(StatusCode::BAD_REQUEST)
                .message(message.clone())
                .details(Value::Object(errors.clone())),
        ),
        DataSourceError::Cast {
            message,
            path,
            kind,
            value,
        } => {
            let mut details = Map::new();
            details.insert(
                path.clone(),
                json!({
                    "message": message,
                    "name": err.name(),
                    "path": path,
                    "type": kind,
                    "value": value,
                }),
            );
            Some(
                ParsedError::with_status(StatusCode::BAD_REQUEST)
                    .message(err.name())
                    .details(Value::Object(details)),
            )
        }
        DataSourceError::Backend {
            message, details, ..
        } if err.is_duplicate_key() => Some(
            ParsedError::with_status(StatusCode::BAD_REQUEST)
                .message(message.clone())
                .details(details.clone()),
        ),
        DataSourceError::Backend { .. } => None,
        DataSourceError::VersionConflict { message } => Some(
            ParsedError::with_status(StatusCode::CONFLICT)
                .message(message.clone())
                .details(Value::String(message.clone())),
        ),
    }
}
