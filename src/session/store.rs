use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::session::role::{Role, ACCESS_TOKEN, REFRESH_TOKEN, SESSION_FIELDS, USER, USER_ID};

/// Durable string key-value storage, the local-storage analogue.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every key currently stored.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Store persisted as a flat JSON object on disk, rewritten on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                GatewayError::Storage(format!("parsing {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(GatewayError::Storage(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        debug!(path = %path.display(), keys = entries.len(), "session file opened");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| GatewayError::Storage(format!("writing {}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }
}

/// Tokens and identity for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Option<String>,
    pub role: Role,
}

/// Profile record kept next to the tokens under the `user` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub logged_in_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            avatar_url: None,
            logged_in_at: Utc::now(),
        }
    }
}

/// Role-namespaced view over a [`KeyValueStore`].
///
/// Every key is built through [`Role::key`], so one role's operations cannot
/// reach another role's entries.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn access_token(&self, role: Role) -> Result<Option<String>> {
        self.read(role, ACCESS_TOKEN).await
    }

    pub async fn refresh_token(&self, role: Role) -> Result<Option<String>> {
        self.read(role, REFRESH_TOKEN).await
    }

    pub async fn load(&self, role: Role) -> Result<Option<SessionCredential>> {
        let access_token = self.read(role, ACCESS_TOKEN).await?;
        let refresh_token = self.read(role, REFRESH_TOKEN).await?;
        let user_id = self.read(role, USER_ID).await?;
        Ok(match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token)) => Some(SessionCredential {
                access_token,
                refresh_token,
                user_id,
                role,
            }),
            _ => None,
        })
    }

    /// Replace the credential for `credential.role` wholesale.
    pub async fn save(&self, credential: &SessionCredential) -> Result<()> {
        let role = credential.role;
        self.backend
            .set(&role.key(ACCESS_TOKEN), &credential.access_token)
            .await?;
        self.backend
            .set(&role.key(REFRESH_TOKEN), &credential.refresh_token)
            .await?;
        match &credential.user_id {
            Some(id) => self.backend.set(&role.key(USER_ID), id).await?,
            None => self.backend.remove(&role.key(USER_ID)).await?,
        }
        debug!(role = %role, "session credential saved");
        Ok(())
    }

    pub async fn save_user(&self, role: Role, user: &StoredUser) -> Result<()> {
        let raw = serde_json::to_string(user)?;
        self.backend.set(&role.key(USER), &raw).await
    }

    /// The stored profile; an unparsable record reads as absent.
    pub async fn user(&self, role: Role) -> Result<Option<StoredUser>> {
        Ok(self
            .read(role, USER)
            .await?
            .and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    /// Remove every session key of `role`. Safe to call repeatedly.
    pub async fn clear(&self, role: Role) -> Result<()> {
        for field in SESSION_FIELDS {
            self.backend.remove(&role.key(field)).await?;
        }
        debug!(role = %role, "session credential cleared");
        Ok(())
    }

    async fn read(&self, role: Role, field: &str) -> Result<Option<String>> {
        self.backend.get(&role.key(field)).await
    }
}
