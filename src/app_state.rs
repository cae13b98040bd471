//! Application state for the Actix-web server
//!
//! This module defines the shared state used across all HTTP handlers.
//! The `AppState` struct is wrapped in `web::Data` and provides access to
//! the shared browser session, metrics, and configuration.

use crate::config::Config;
use crate::metrics::RelayMetrics;
use crate::session::SessionManager;
use std::sync::Arc;

/// Shared application state for Actix-web handlers
pub struct AppState {
    /// Authenticated shared browser session (read-mostly singleton)
    pub session: Arc<SessionManager>,
    /// Relay metrics tracker
    pub metrics: RelayMetrics,
    /// Application configuration
    pub config: Config,
}
