//! Authenticated request gateway.
//!
//! Every call goes through [`Gateway::send`], which attaches the role's bearer
//! token, normalizes key casing in both directions, and recovers from an
//! expired access token with a single shared refresh:
//!
//! 1. a 401 on the refresh endpoint itself, on a retried call, or with no
//!    refresh token stored tears the session down and fails;
//! 2. otherwise the first caller refreshes while later 401s queue behind it;
//! 3. every caller then retries exactly once with the new token, or fails
//!    with the refresh error.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::session::audit_log::AuditLogger;
use crate::session::refresh::{RefreshCoordinator, Ticket};
use crate::session::role::Role;
use crate::session::store::{CredentialStore, FileStore, SessionCredential};
use crate::transport::casing::{keys_to_camel, keys_to_snake};
use crate::transport::{ApiEnvelope, ApiRequest, AuthTokens, HttpTransport, ReqwestTransport, WireRequest};

/// Notifications for the UI layer, which owns the actual navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The role's session was torn down; the UI should go to `redirect_to`.
    SessionExpired { role: Role, redirect_to: String },
    TokenRefreshed { role: Role },
}

pub type SessionEventTx = broadcast::Sender<SessionEvent>;

pub struct Gateway {
    transport: Arc<dyn HttpTransport>,
    store: CredentialStore,
    coordinators: [RefreshCoordinator; 3],
    refresh_path: String,
    events: SessionEventTx,
    audit: AuditLogger,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: CredentialStore,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            store,
            coordinators: Default::default(),
            refresh_path: refresh_path.into(),
            events: broadcast::channel(32).0,
            audit: AuditLogger::new(),
        }
    }

    /// Reqwest transport and a file-backed session store, both from `config`.
    pub async fn from_config(config: &GatewayConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.base_url, config.timeout())?;
        let store = FileStore::open(&config.store_path).await?;
        Ok(Self::new(
            Arc::new(transport),
            CredentialStore::new(Arc::new(store)),
            &config.refresh_path,
        ))
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Each role refreshes on its own; a 401 never queues behind another role.
    pub fn coordinator(&self, role: Role) -> &RefreshCoordinator {
        &self.coordinators[role as usize]
    }

    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Send `request` under `role`'s session and return the camelCased body.
    pub async fn send(&self, role: Role, request: ApiRequest) -> Result<Value> {
        let token = self.store.access_token(role).await?;
        let body = match self.dispatch(&request, token).await {
            Err(err) if err.is_unauthorized() => self.recover(role, &request, err).await?,
            other => other?,
        };
        Ok(keys_to_camel(body))
    }

    /// [`Gateway::send`] with the role derived from a navigation path.
    pub async fn send_for_path(&self, nav_path: &str, request: ApiRequest) -> Result<Value> {
        self.send(Role::from_path(nav_path), request).await
    }

    /// [`Gateway::send`], decoding the standard envelope.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        role: Role,
        request: ApiRequest,
    ) -> Result<ApiEnvelope<T>> {
        let body = self.send(role, request).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Drop every stored key of `role` and tell the UI where to go.
    /// Never fails; calling it again is harmless.
    pub async fn teardown(&self, role: Role) {
        if let Err(err) = self.store.clear(role).await {
            error!(role = %role, error = %err, "failed to clear session storage");
        }
        let redirect_to = role.entry_page().to_string();
        self.audit.session_expired(role, &redirect_to);
        // no subscribers is fine
        let _ = self
            .events
            .send(SessionEvent::SessionExpired { role, redirect_to });
    }

    fn is_refresh_call(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path.trim_start_matches('/') == self.refresh_path.trim_start_matches('/')
    }

    async fn dispatch(&self, request: &ApiRequest, bearer: Option<String>) -> Result<Value> {
        let wire = WireRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            body: request.body.clone().map(keys_to_snake),
            headers: request.headers.clone(),
            bearer,
        };
        let resp = self.transport.execute(wire).await?;
        if resp.is_success() {
            Ok(resp.body)
        } else {
            debug!(path = %request.path, status = resp.status, "request failed");
            Err(GatewayError::from_status(resp.status, resp.body))
        }
    }

    async fn recover(&self, role: Role, request: &ApiRequest, err: GatewayError) -> Result<Value> {
        self.audit.request_unauthorized(role, &request.path, false);

        if self.is_refresh_call(&request.path) {
            self.teardown(role).await;
            return Err(err);
        }

        if self.store.refresh_token(role).await?.is_none() {
            self.teardown(role).await;
            return Err(err);
        }
        let access_token = self.shared_refresh(role).await?;

        match self.dispatch(request, Some(access_token)).await {
            Err(retry_err) if retry_err.is_unauthorized() => {
                self.audit.request_unauthorized(role, &request.path, true);
                self.teardown(role).await;
                Err(retry_err)
            }
            other => other,
        }
    }

    /// Renew `role`'s tokens on demand. Joins a refresh already in flight
    /// for that role instead of starting a second one.
    pub async fn refresh_session(&self, role: Role) -> Result<String> {
        if self.store.refresh_token(role).await?.is_none() {
            self.teardown(role).await;
            return Err(GatewayError::MissingRefreshToken);
        }
        self.shared_refresh(role).await
    }

    async fn shared_refresh(&self, role: Role) -> Result<String> {
        match self.coordinator(role).begin() {
            Ticket::Leader(lease) => {
                let outcome = self.lead_refresh(role).await;
                let released = lease.settle(outcome.clone());
                if outcome.is_ok() {
                    self.audit.token_refreshed(role, released);
                }
                outcome
            }
            Ticket::Waiter(rx) => Ticket::wait(rx).await,
        }
    }

    /// Reads the refresh token only once leadership is held.
    async fn lead_refresh(&self, role: Role) -> Result<String> {
        match self.store.refresh_token(role).await? {
            Some(refresh_token) => self.refresh(role, &refresh_token).await,
            None => {
                self.teardown(role).await;
                Err(GatewayError::MissingRefreshToken)
            }
        }
    }

    /// Exchange the refresh token and persist the new pair. On failure the
    /// session is already torn down when this returns.
    async fn refresh(&self, role: Role, refresh_token: &str) -> Result<String> {
        self.audit.refresh_started(role);
        match self.exchange_refresh_token(role, refresh_token).await {
            Ok(access_token) => {
                let _ = self.events.send(SessionEvent::TokenRefreshed { role });
                Ok(access_token)
            }
            Err(err) => {
                self.audit.refresh_failed(role, &err.to_string());
                self.teardown(role).await;
                Err(err)
            }
        }
    }

    async fn exchange_refresh_token(&self, role: Role, refresh_token: &str) -> Result<String> {
        let request =
            ApiRequest::post(&self.refresh_path).body(json!({ "refresh_token": refresh_token }));
        let body = self.dispatch(&request, None).await?;
        let envelope: ApiEnvelope<AuthTokens> = serde_json::from_value(keys_to_camel(body))?;
        let tokens = envelope.data;

        let previous_user_id = self.store.load(role).await?.and_then(|c| c.user_id);
        let credential = SessionCredential {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user_id: tokens.user_id.or(previous_user_id),
            role,
        };
        self.store.save(&credential).await?;
        info!(role = %role, "access token refreshed");
        Ok(credential.access_token)
    }
}
