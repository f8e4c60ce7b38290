use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::debug;

pub const BASE_URL_ENV: &str = "PORTAL_API_BASE_URL";
pub const TIMEOUT_ENV: &str = "PORTAL_API_TIMEOUT_SECS";
pub const STORE_PATH_ENV: &str = "PORTAL_STORE_PATH";

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_refresh_path() -> String {
    "/api/v1/users/refresh".to_string()
}
fn default_store_path() -> String {
    "portal-session.json".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Backend root, e.g. `https://api.example.com`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Endpoint that exchanges a refresh token for a new token pair
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Where the session file lives
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            refresh_path: default_refresh_path(),
            store_path: default_store_path(),
        }
    }
}

impl GatewayConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let cfg: GatewayConfig = serde_json::from_str(&raw).context("parsing config JSON")?;
        Ok(cfg)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Config file if given (otherwise defaults), then environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        debug!(base_url = %cfg.base_url, timeout_secs = cfg.timeout_secs, "gateway config loaded");
        Ok(cfg)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(base) = std::env::var(BASE_URL_ENV) {
            self.base_url = base;
        }
        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            self.timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("parsing {TIMEOUT_ENV}={raw}"))?;
        }
        if let Ok(path) = std::env::var(STORE_PATH_ENV) {
            self.store_path = path;
        }
        Ok(())
    }
}
