#![allow(dead_code)]

use async_trait::async_trait;
use portal_gateway::session::{CredentialStore, MemoryStore, SessionCredential};
use portal_gateway::transport::{HttpTransport, WireRequest, WireResponse};
use portal_gateway::{Gateway, Result, Role};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const REFRESH_PATH: &str = "/api/v1/users/refresh";

#[derive(Debug, Clone)]
pub enum RefreshReply {
    Issue { access: String, refresh: String },
    /// Derive the new pair from the presented refresh token, so each role
    /// gets its own: `r` becomes `r-access` / `r-next`.
    Rotate,
    Reject(u16),
}

/// In-memory backend: resources accept only issued tokens, refresh
/// answers per `reply`, optionally held until the test opens the gate.
pub struct ScriptedBackend {
    issued: Mutex<HashSet<String>>,
    reply: Mutex<RefreshReply>,
    reject_everything: bool,
    gate: Semaphore,
    refresh_calls: AtomicUsize,
    presented: Mutex<Vec<String>>,
    log: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedBackend {
    fn build(reply: RefreshReply, gated: bool, reject_everything: bool) -> Arc<Self> {
        let permits = if gated { 0 } else { Semaphore::MAX_PERMITS };
        Arc::new(Self {
            issued: Mutex::new(HashSet::new()),
            reply: Mutex::new(reply),
            reject_everything,
            gate: Semaphore::new(permits),
            refresh_calls: AtomicUsize::new(0),
            presented: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn issuing(access: &str, refresh: &str) -> Arc<Self> {
        Self::build(issue(access, refresh), false, false)
    }

    pub fn issuing_rotated() -> Arc<Self> {
        Self::build(RefreshReply::Rotate, false, false)
    }

    pub fn gated(reply: RefreshReply) -> Arc<Self> {
        Self::build(reply, true, false)
    }

    pub fn rejecting(reply: RefreshReply) -> Arc<Self> {
        Self::build(reply, false, true)
    }

    pub fn open_gate(&self) {
        self.gate.add_permits(1);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens in the order the refresh endpoint received them.
    pub fn presented_refresh_tokens(&self) -> Vec<String> {
        self.presented.lock().unwrap().clone()
    }

    /// Every resource call seen, with the bearer it carried.
    pub fn resource_log(&self) -> Vec<(String, Option<String>)> {
        self.log.lock().unwrap().clone()
    }
}

pub fn issue(access: &str, refresh: &str) -> RefreshReply {
    RefreshReply::Issue {
        access: access.to_string(),
        refresh: refresh.to_string(),
    }
}

#[async_trait]
impl HttpTransport for ScriptedBackend {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse> {
        if request.path == REFRESH_PATH {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();

            let presented = request
                .body
                .as_ref()
                .and_then(|body| body["refresh_token"].as_str())
                .unwrap_or_default()
                .to_string();
            self.presented.lock().unwrap().push(presented.clone());
            let reply = match self.reply.lock().unwrap().clone() {
                RefreshReply::Rotate => RefreshReply::Issue {
                    access: format!("{presented}-access"),
                    refresh: format!("{presented}-next"),
                },
                other => other,
            };
            return Ok(match reply {
                RefreshReply::Issue { access, refresh } => {
                    self.issued.lock().unwrap().insert(access.clone());
                    WireResponse {
                        status: 200,
                        body: json!({
                            "code": 0,
                            "message": "ok",
                            "data": {"access_token": access, "refresh_token": refresh, "expires_in": 3600}
                        }),
                    }
                }
                RefreshReply::Rotate => unreachable!("resolved above"),
                RefreshReply::Reject(status) => WireResponse {
                    status,
                    body: json!({"code": status, "message": "refresh rejected"}),
                },
            });
        }

        self.log
            .lock()
            .unwrap()
            .push((request.path.clone(), request.bearer.clone()));

        let authorized = !self.reject_everything
            && request
                .bearer
                .as_ref()
                .is_some_and(|token| self.issued.lock().unwrap().contains(token));
        Ok(if authorized {
            WireResponse {
                status: 200,
                body: json!({"code": 0, "message": "ok", "data": {"served_path": request.path}}),
            }
        } else {
            WireResponse {
                status: 401,
                body: json!({"code": 401, "message": "token expired"}),
            }
        })
    }
}

pub struct Harness {
    pub gateway: Arc<Gateway>,
    pub backend: Arc<ScriptedBackend>,
    pub storage: MemoryStore,
}

impl Harness {
    pub fn new(backend: Arc<ScriptedBackend>) -> Self {
        let storage = MemoryStore::new();
        let gateway = Gateway::new(
            backend.clone(),
            CredentialStore::new(Arc::new(storage.clone())),
            REFRESH_PATH,
        );
        Self {
            gateway: Arc::new(gateway),
            backend,
            storage,
        }
    }

    pub async fn seed(&self, role: Role, access: &str, refresh: &str) {
        self.gateway
            .store()
            .save(&SessionCredential {
                access_token: access.to_string(),
                refresh_token: refresh.to_string(),
                user_id: Some(format!("{role}-user")),
                role,
            })
            .await
            .unwrap();
    }

    /// Yield until `n` callers are parked behind `role`'s running refresh.
    pub async fn wait_for_waiters(&self, role: Role, n: usize) {
        self.wait_until(|h| h.gateway.coordinator(role).waiting() >= n)
            .await;
    }

    pub async fn wait_until(&self, ready: impl Fn(&Harness) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !ready(self) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition never reached");
    }
}
