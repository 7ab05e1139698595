use reqwest::blocking::{Client, Response};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://localhost:3001/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// The REST backend the façade tries before falling back to local storage.
pub trait RemoteBackend {
    fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError>;
    fn get(&self, path: &str) -> Result<Value, RemoteError>;
    fn base_url(&self) -> &str;
}

pub struct HttpBackend {
    client: Client,
    base: String,
}

impl HttpBackend {
    pub fn new(base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn decode(resp: Response) -> Result<Value, RemoteError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            let body = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("").to_string()
            } else {
                body
            };
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<Value>()
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

impl RemoteBackend for HttpBackend {
    fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        let url = self.url(path);
        tracing::debug!(%url, "remote POST");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Self::decode(resp)
    }

    fn get(&self, path: &str) -> Result<Value, RemoteError> {
        let url = self.url(path);
        tracing::debug!(%url, "remote GET");
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Self::decode(resp)
    }

    fn base_url(&self) -> &str {
        &self.base
    }
}
