//! Application state for API handlers

use crate::admin::Admin;
use crate::config::PermissionsConfig;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Root controller
    pub admin: Arc<Admin>,

    /// Permission names with defaults applied
    pub permissions: Arc<PermissionsConfig>,

    /// Daemon version
    pub version: String,

    /// Start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(admin: Arc<Admin>) -> Self {
        Self {
            permissions: Arc::new(admin.config().permissions()),
            admin,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Human-readable uptime
    pub fn uptime(&self) -> String {
        let duration = chrono::Utc::now() - self.started_at;
        let hours = duration.num_hours();
        let minutes = duration.num_minutes() % 60;
        let seconds = duration.num_seconds() % 60;
        format!("{hours}h {minutes}m {seconds}s")
    }
}
