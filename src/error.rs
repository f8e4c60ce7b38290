use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Failure of a gateway call.
///
/// `Clone` so a single refresh failure can be handed to every request that
/// was waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// The request never produced an HTTP response (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        body: serde_json::Value,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The role has no refresh token, so its session cannot be renewed.
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// The refresh this request was queued behind was abandoned before it settled.
    #[error("token refresh aborted")]
    RefreshAborted,
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Build a status error, pulling a human message out of the envelope when present.
    pub fn from_status(status: u16, body: serde_json::Value) -> Self {
        let message = body
            .get("message")
            .or_else(|| body.get("detail"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status {}", status));
        GatewayError::Status {
            status,
            message,
            body,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}
