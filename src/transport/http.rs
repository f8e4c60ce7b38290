use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::transport::{HttpTransport, WireRequest, WireResponse};

const REQUEST_ID_HEADER: &str = "X-Request-Id";

fn build_headers(request: &WireRequest) -> Result<HeaderMap> {
    let request_id = Uuid::new_v4().to_string();

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&request_id).map_err(invalid_header)?,
    );

    if let Some(token) = &request.bearer {
        let bearer = format!("Bearer {}", token);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&bearer).map_err(invalid_header)?);
    }

    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(invalid_header)?;
        headers.insert(name, HeaderValue::from_str(value).map_err(invalid_header)?);
    }

    debug!(
        request_id = %request_id,
        authorized = request.bearer.is_some(),
        "built request headers"
    );
    Ok(headers)
}

fn invalid_header(err: impl std::fmt::Display) -> GatewayError {
    GatewayError::InvalidRequest(format!("invalid header: {}", err))
}

/// Empty bodies read as null and non-JSON bodies as a JSON string.
fn decode_body(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// [`HttpTransport`] over a shared reqwest client rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    client: Client,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("building http client: {}", e)))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse> {
        let url = self.url_for(&request.path);
        let headers = build_headers(&request)?;

        trace!(method = %request.method, url = %url, "sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let raw = resp.text().await?;

        debug!(
            method = %request.method,
            url = %url,
            status_code = %status,
            "received response"
        );

        Ok(WireResponse {
            status,
            body: decode_body(&raw),
        })
    }
}
