use std::sync::Arc;

use relay::RelayConfig;
use resolver::MediaResolver;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod error;
pub mod media;
pub mod relay;
pub mod resolver;
pub mod routes;

#[cfg(test)]
pub mod tests_utils;

pub use error::ErrorResponse;

pub struct AppData {
    resolver: Arc<dyn MediaResolver>,
    relay_config: RelayConfig,
    shutdown: CancellationToken,
}

impl AppData {
    pub fn new(
        resolver: Arc<dyn MediaResolver>,
        relay_config: RelayConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            resolver,
            relay_config,
            shutdown,
        }
    }

    pub fn resolver(&self) -> &dyn MediaResolver {
        self.resolver.as_ref()
    }

    pub fn relay_config(&self) -> &RelayConfig {
        &self.relay_config
    }

    /// Token for a new relay session, cancelled when the server shuts down.
    pub fn session_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
