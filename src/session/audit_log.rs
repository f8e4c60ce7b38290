use tracing::{info, warn};

use crate::session::role::Role;

/// Session lifecycle events, logged under the `audit` target.
#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn request_unauthorized(&self, role: Role, path: &str, retried: bool) {
        warn!(target: "audit", event = "request_unauthorized", role = %role, path, retried);
    }

    pub fn refresh_started(&self, role: Role) {
        info!(target: "audit", event = "refresh_started", role = %role);
    }

    pub fn token_refreshed(&self, role: Role, released: usize) {
        info!(target: "audit", event = "token_refreshed", role = %role, released);
    }

    pub fn refresh_failed(&self, role: Role, error_msg: &str) {
        warn!(target: "audit", event = "refresh_failed", role = %role, error = error_msg);
    }

    pub fn session_expired(&self, role: Role, redirect_to: &str) {
        warn!(target: "audit", event = "session_expired", role = %role, redirect_to);
    }

    pub fn logged_in(&self, role: Role, user_id: Option<&str>) {
        info!(target: "audit", event = "logged_in", role = %role, user_id = user_id.unwrap_or(""));
    }

    pub fn logged_out(&self, role: Role) {
        info!(target: "audit", event = "logged_out", role = %role);
    }
}
