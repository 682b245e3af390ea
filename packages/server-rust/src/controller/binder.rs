//! Route binding: every enabled action, for every verb, on every transport.

use std::sync::Arc;

use tracing::{debug, info};

use super::dispatch::dispatch_fn;
use super::errors::ConfigurationError;
use super::Controller;

impl Controller {
    /// Registers the controller's routes on all of its transports.
    ///
    /// Actions are visited by ascending priority (ties in registry order).
    /// Disabled actions register nothing. The first failing registration is
    /// logged and aborts binding; routes registered before it stay.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::RouteRegistration`] for the first route a
    /// transport rejects.
    pub fn bind(self: &Arc<Self>) -> Result<(), ConfigurationError> {
        let base_paths = self.base_path.to_list();
        let mut routes = 0_usize;

        for action in self.actions.by_priority() {
            if !action.enabled {
                debug!(action = %action.name, "action disabled, not bound");
                continue;
            }
            for method in &action.method {
                for transport in &self.transports {
                    let dispatch = dispatch_fn(self, &action);
                    if let Err(err) =
                        transport.add_route(self, method, &base_paths, &action, dispatch)
                    {
                        let path = format!("{}/{}", self.base_path, action.path);
                        self.log.error(&format!(
                            "Set route for action: {} and path {path}",
                            action.name
                        ));
                        self.log.error(&format!("Error {err:#}"));
                        return Err(ConfigurationError::RouteRegistration {
                            action: action.name.clone(),
                            path,
                            source: err,
                        });
                    }
                    routes += 1;
                }
            }
        }

        info!(path = %self.base_path, routes, "controller bound");
        Ok(())
    }
}
