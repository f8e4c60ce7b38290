use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::gateway::Gateway;
use crate::session::role::Role;
use crate::transport::{ApiEnvelope, ApiRequest};

pub const PROVIDER_CREATE: &str = "/api/v1/provider/create";
pub const PROVIDER_UPDATE: &str = "/api/v1/provider/update";
pub const PROVIDER_DELETE: &str = "/api/v1/provider/delete";
pub const PROVIDER_VERIFY_API_KEY: &str = "/api/v1/provider/verify_api_key";
pub const PROVIDERS_WITH_MODELS: &str = "/api/v1/providers_with_models";
pub const BUILTIN_PROVIDERS_WITH_MODELS: &str = "/api/v1/builtin/providers_with_models";
pub const MODEL_CONFIG_CREATE: &str = "/api/v1/model/config/create";
pub const MODEL_CONFIG_UPDATE: &str = "/api/v1/model/config/update";
pub const MODEL_CONFIG_DELETE: &str = "/api/v1/model/config/delete";

// Field names are camelCase here; the gateway snake_cases them on the wire.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCreate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_model_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUpdate {
    pub provider_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_model_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDelete {
    pub provider_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyVerify {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfigCreate {
    pub provider_id: String,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfigUpdate {
    pub model_config_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfigDelete {
    pub model_config_id: String,
}

/// Provider and model configuration endpoints, sent under one role's session.
pub struct ModelApi<'a> {
    gateway: &'a Gateway,
    role: Role,
}

impl<'a> ModelApi<'a> {
    pub fn new(gateway: &'a Gateway, role: Role) -> Self {
        Self { gateway, role }
    }

    pub async fn create_provider(&self, data: &ProviderCreate) -> Result<ApiEnvelope<Value>> {
        self.post(PROVIDER_CREATE, data).await
    }

    pub async fn update_provider(&self, data: &ProviderUpdate) -> Result<ApiEnvelope<Value>> {
        self.post(PROVIDER_UPDATE, data).await
    }

    pub async fn delete_provider(&self, data: &ProviderDelete) -> Result<ApiEnvelope<Value>> {
        self.post(PROVIDER_DELETE, data).await
    }

    pub async fn verify_api_key(&self, data: &ApiKeyVerify) -> Result<ApiEnvelope<Value>> {
        self.post(PROVIDER_VERIFY_API_KEY, data).await
    }

    pub async fn providers_with_models(&self) -> Result<ApiEnvelope<Value>> {
        self.gateway
            .send_json(self.role, ApiRequest::get(PROVIDERS_WITH_MODELS))
            .await
    }

    pub async fn builtin_providers_with_models(&self) -> Result<ApiEnvelope<Value>> {
        self.gateway
            .send_json(self.role, ApiRequest::get(BUILTIN_PROVIDERS_WITH_MODELS))
            .await
    }

    pub async fn create_model_config(&self, data: &ModelConfigCreate) -> Result<ApiEnvelope<Value>> {
        self.post(MODEL_CONFIG_CREATE, data).await
    }

    pub async fn update_model_config(&self, data: &ModelConfigUpdate) -> Result<ApiEnvelope<Value>> {
        self.post(MODEL_CONFIG_UPDATE, data).await
    }

    pub async fn delete_model_config(&self, data: &ModelConfigDelete) -> Result<ApiEnvelope<Value>> {
        self.post(MODEL_CONFIG_DELETE, data).await
    }

    async fn post<T: Serialize>(&self, path: &str, data: &T) -> Result<ApiEnvelope<Value>> {
        let request = ApiRequest::post(path).json(data)?;
        self.gateway.send_json(self.role, request).await
    }
}
