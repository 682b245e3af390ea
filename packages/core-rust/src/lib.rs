//! `restifizer` core: action descriptors, layered defaults and the error taxonomy
//! shared by every transport.

pub mod action;
pub mod builtin;
pub mod datasource;
pub mod diagnostics;
pub mod error;

pub use action::{apply_defaults, ActionConfig, ActionMap, MethodSpec, RawAction, ResolvedAction};
pub use builtin::BuiltinAction;
pub use datasource::{classify_data_source_error, DataSourceError};
pub use diagnostics::{extract_call_site, CallSite, DiagnosticFailure, StackDiagnostics};
pub use error::{ErrorStatus, NormalizedError, ParsedError, ERROR_TYPE};
