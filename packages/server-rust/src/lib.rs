//! `restifizer` server: file controllers bound onto pluggable transports,
//! with an axum transport and the listener that serves it.

pub mod controller;
pub mod network;
pub mod traits;
pub mod transport;

pub use controller::{
    handler_fn, with_timeout, Action, ConfigurationError, Controller, ControllerOptions,
    ControllerSettings, RequestError, RequestScope, ResData, StreamResult,
};
pub use traits::{ControllerPlugin, DataSource, ErrorLog, ErrorParser, TracingLog, Transport};
pub use transport::{MemoryTransport, RouterTransport};
