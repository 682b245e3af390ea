//! Listener lifecycle, network configuration and the HTTP middleware stack.

pub mod config;
pub mod middleware;
pub mod module;

pub use config::NetworkConfig;
pub use middleware::build_http_layers;
pub use module::NetworkModule;
