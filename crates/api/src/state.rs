use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// The engine keeps no cross-request state, so this only carries configuration.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
}
