use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{GatewayError, Result};
use crate::gateway::Gateway;
use crate::session::audit_log::AuditLogger;
use crate::session::role::Role;
use crate::session::store::{SessionCredential, StoredUser};
use crate::transport::{ApiEnvelope, ApiRequest, AuthTokens};

pub const USER_REGISTER: &str = "/api/v1/users/register";
pub const USER_LOGIN: &str = "/api/v1/users/login";
pub const USER_ME: &str = "/api/v1/users/me";
pub const USER_LOGOUT: &str = "/api/v1/users/logout";
pub const ADMIN_REGISTER: &str = "/api/v1/admin/register";
pub const ADMIN_LOGIN: &str = "/api/v1/admin/login";
pub const ADMIN_ME: &str = "/api/v1/admin/me";
pub const ADMIN_LOGOUT: &str = "/api/v1/admin/logout";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// `patient` or `doctor`
    pub role: String,
}

impl RegisterRequest {
    pub fn new(
        role: Role,
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let role = match role {
            Role::Professional => "doctor",
            Role::Public | Role::Admin => "patient",
        };
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: role.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// Profile returned by the `me` endpoints, read after camelCasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.real_name.as_deref())
            .unwrap_or("User")
    }
}

struct Endpoints {
    login: &'static str,
    me: &'static str,
    logout: &'static str,
}

fn endpoints(role: Role) -> Endpoints {
    match role {
        Role::Admin => Endpoints {
            login: ADMIN_LOGIN,
            me: ADMIN_ME,
            logout: ADMIN_LOGOUT,
        },
        Role::Public | Role::Professional => Endpoints {
            login: USER_LOGIN,
            me: USER_ME,
            logout: USER_LOGOUT,
        },
    }
}

/// Login, logout, and profile calls for all three portals.
pub struct AuthApi<'a> {
    gateway: &'a Gateway,
    audit: AuditLogger,
}

impl<'a> AuthApi<'a> {
    pub fn new(gateway: &'a Gateway) -> Self {
        Self {
            gateway,
            audit: AuditLogger::new(),
        }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<ApiEnvelope<Value>> {
        let role = if request.role == "doctor" {
            Role::Professional
        } else {
            Role::Public
        };
        self.gateway
            .send_json(role, ApiRequest::post(USER_REGISTER).json(request)?)
            .await
    }

    pub async fn admin_register(&self, request: &AdminCredentials) -> Result<ApiEnvelope<Value>> {
        self.gateway
            .send_json(Role::Admin, ApiRequest::post(ADMIN_REGISTER).json(request)?)
            .await
    }

    /// Log in to the public or professional portal and store the session under `role`.
    pub async fn login(&self, role: Role, request: &LoginRequest) -> Result<SessionCredential> {
        let body = ApiRequest::post(endpoints(role).login).json(request)?;
        self.establish(role, body).await
    }

    pub async fn admin_login(&self, request: &AdminCredentials) -> Result<SessionCredential> {
        let body = ApiRequest::post(ADMIN_LOGIN).json(request)?;
        self.establish(Role::Admin, body).await
    }

    pub async fn me(&self, role: Role) -> Result<UserProfile> {
        let envelope: ApiEnvelope<UserProfile> = self
            .gateway
            .send_json(role, ApiRequest::get(endpoints(role).me))
            .await?;
        Ok(envelope.data)
    }

    /// Renew the session now. Shares any refresh already running for `role`;
    /// a rejected or missing refresh token ends the session.
    pub async fn refresh(&self, role: Role) -> Result<SessionCredential> {
        self.gateway.refresh_session(role).await?;
        self.gateway
            .store()
            .load(role)
            .await?
            .ok_or(GatewayError::MissingRefreshToken)
    }

    /// Tell the server, then forget the session locally whatever it answered.
    pub async fn logout(&self, role: Role) -> Result<()> {
        if let Err(err) = self
            .gateway
            .send(role, ApiRequest::post(endpoints(role).logout))
            .await
        {
            warn!(role = %role, error = %err, "server logout failed; clearing local session anyway");
        }
        self.gateway.store().clear(role).await?;
        self.audit.logged_out(role);
        Ok(())
    }

    async fn establish(&self, role: Role, request: ApiRequest) -> Result<SessionCredential> {
        let envelope: ApiEnvelope<AuthTokens> = self.gateway.send_json(role, request).await?;
        let tokens = envelope.data;
        let credential = SessionCredential {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user_id: tokens.user_id,
            role,
        };
        self.gateway.store().save(&credential).await?;

        let user = match self.me(role).await {
            Ok(profile) => {
                let id = credential
                    .user_id
                    .clone()
                    .or(profile.id.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                let mut user = StoredUser::new(id, profile.display_name(), role);
                user.avatar_url = profile.avatar_url;
                user
            }
            Err(err) => {
                warn!(role = %role, error = %err, "profile fetch failed; storing basic user");
                let id = credential
                    .user_id
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                StoredUser::new(id, "User", role)
            }
        };
        self.gateway.store().save_user(role, &user).await?;

        self.audit.logged_in(role, credential.user_id.as_deref());
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::CredentialStore;
    use crate::transport::ReqwestTransport;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn gateway_for(server: &Server) -> Gateway {
        let transport = ReqwestTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        Gateway::new(
            Arc::new(transport),
            CredentialStore::in_memory(),
            "/api/v1/users/refresh",
        )
    }

    const TOKENS: &str = r#"{"code":0,"message":"ok","data":{"access_token":"a1","refresh_token":"r1","expires_in":3600,"user_id":"u-7"}}"#;

    #[tokio::test]
    async fn login_stores_session_and_profile_under_role() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", USER_LOGIN)
            .match_body(Matcher::Json(json!({"email": "doc@example.com", "password": "pw"})))
            .with_status(200)
            .with_body(TOKENS)
            .create_async()
            .await;
        let me = server
            .mock("GET", USER_ME)
            .match_header("Authorization", Matcher::Exact("Bearer a1".into()))
            .with_status(200)
            .with_body(r#"{"code":0,"message":"ok","data":{"id":"u-7","real_name":"Dr. Li","avatar_url":"https://img/1"}}"#)
            .create_async()
            .await;

        let gateway = gateway_for(&server);
        let credential = AuthApi::new(&gateway)
            .login(
                Role::Professional,
                &LoginRequest {
                    email: "doc@example.com".to_string(),
                    password: "pw".to_string(),
                },
            )
            .await
            .expect("login should succeed");

        assert_eq!(credential.access_token, "a1");
        assert_eq!(credential.user_id.as_deref(), Some("u-7"));
        let stored = gateway.store().load(Role::Professional).await.unwrap();
        assert_eq!(stored, Some(credential));
        let user = gateway.store().user(Role::Professional).await.unwrap().unwrap();
        assert_eq!(user.name, "Dr. Li");
        assert_eq!(user.avatar_url.as_deref(), Some("https://img/1"));
        assert!(gateway.store().load(Role::Public).await.unwrap().is_none());
        login.assert_async().await;
        me.assert_async().await;
    }

    #[tokio::test]
    async fn admin_login_falls_back_to_basic_user() {
        let mut server = Server::new_async().await;
        let _login = server
            .mock("POST", ADMIN_LOGIN)
            .with_status(200)
            .with_body(TOKENS)
            .create_async()
            .await;
        let _me = server
            .mock("GET", ADMIN_ME)
            .with_status(500)
            .create_async()
            .await;

        let gateway = gateway_for(&server);
        AuthApi::new(&gateway)
            .admin_login(&AdminCredentials {
                username: "root".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();

        let user = gateway.store().user(Role::Admin).await.unwrap().unwrap();
        assert_eq!(user.id, "u-7");
        assert_eq!(user.name, "User");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn logout_clears_local_session_even_when_server_fails() {
        let mut server = Server::new_async().await;
        let _logout = server
            .mock("POST", USER_LOGOUT)
            .with_status(502)
            .create_async()
            .await;

        let gateway = gateway_for(&server);
        gateway
            .store()
            .save(&SessionCredential {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                user_id: None,
                role: Role::Public,
            })
            .await
            .unwrap();

        AuthApi::new(&gateway).logout(Role::Public).await.unwrap();
        assert!(gateway.store().load(Role::Public).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn explicit_refresh_sends_snake_cased_token_and_persists() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", "/api/v1/users/refresh")
            .match_body(Matcher::Json(json!({"refresh_token": "old-r"})))
            .with_status(200)
            .with_body(
                r#"{"code":0,"message":"ok","data":{"access_token":"a2","refresh_token":"r2"}}"#,
            )
            .create_async()
            .await;

        let gateway = gateway_for(&server);
        gateway
            .store()
            .save(&SessionCredential {
                access_token: "old-a".to_string(),
                refresh_token: "old-r".to_string(),
                user_id: Some("u1".to_string()),
                role: Role::Public,
            })
            .await
            .unwrap();

        let credential = AuthApi::new(&gateway).refresh(Role::Public).await.unwrap();
        assert_eq!(credential.access_token, "a2");
        let stored = gateway.store().load(Role::Public).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, "r2");
        assert_eq!(stored.user_id.as_deref(), Some("u1"));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn explicit_refresh_rejected_with_401_ends_session() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", "/api/v1/users/refresh")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let gateway = gateway_for(&server);
        gateway
            .store()
            .save(&SessionCredential {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                user_id: None,
                role: Role::Admin,
            })
            .await
            .unwrap();

        let err = AuthApi::new(&gateway).refresh(Role::Admin).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(gateway.store().load(Role::Admin).await.unwrap().is_none());
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn explicit_refresh_without_refresh_token_never_calls_server() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", "/api/v1/users/refresh")
            .expect(0)
            .create_async()
            .await;

        let gateway = gateway_for(&server);
        let mut events = gateway.subscribe();

        let err = AuthApi::new(&gateway).refresh(Role::Public).await.unwrap_err();
        assert_eq!(err, GatewayError::MissingRefreshToken);
        assert!(matches!(
            events.try_recv().unwrap(),
            crate::gateway::SessionEvent::SessionExpired { role: Role::Public, .. }
        ));
        refresh.assert_async().await;
    }

    #[test]
    fn register_request_maps_role() {
        let req = RegisterRequest::new(Role::Professional, "li", "li@x.com", "pw");
        assert_eq!(req.role, "doctor");
        let req = RegisterRequest::new(Role::Public, "wang", "w@x.com", "pw");
        assert_eq!(req.role, "patient");
    }
}
