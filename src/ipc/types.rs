use crate::config::Config;
use crate::facade::Facade;
use crate::notify::NoticeBuffer;
use crate::remote::{HttpBackend, RemoteBackend};
use crate::store::KvStore;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub store: Option<Box<dyn KvStore>>,
    pub facade: Facade,
    pub notices: NoticeBuffer,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let notices = NoticeBuffer::new();
        let backend = build_backend(config.api_base.as_deref(), config.http_timeout);
        let facade = Facade::new(backend, config.warn_policy, Box::new(notices.clone()));
        Self {
            config,
            workspace: None,
            store: None,
            facade,
            notices,
        }
    }
}

/// A client that cannot be built leaves the façade local-only.
pub fn build_backend(api_base: Option<&str>, timeout: Duration) -> Option<Box<dyn RemoteBackend>> {
    let base = api_base?;
    match HttpBackend::new(base, timeout) {
        Ok(b) => Some(Box::new(b)),
        Err(e) => {
            tracing::error!(base, error = %e, "failed to build http client; remote disabled");
            None
        }
    }
}
