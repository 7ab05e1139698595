use crate::notify::WarnPolicy;
use crate::remote::{DEFAULT_API_BASE, DEFAULT_TIMEOUT};
use std::path::PathBuf;
use std::time::Duration;

/// Startup settings read from `UNIERP_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `None` disables the remote backend.
    pub api_base: Option<String>,
    pub http_timeout: Duration,
    pub warn_policy: WarnPolicy,
    pub workspace: Option<PathBuf>,
    pub seed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: Some(DEFAULT_API_BASE.to_string()),
            http_timeout: DEFAULT_TIMEOUT,
            warn_policy: WarnPolicy::Once,
            workspace: None,
            seed: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        if let Some(v) = lookup("UNIERP_API_BASE") {
            cfg.api_base = parse_api_base(&v);
        }
        if let Some(v) = lookup("UNIERP_HTTP_TIMEOUT_MS") {
            match v.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => cfg.http_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(value = %v, "ignoring invalid UNIERP_HTTP_TIMEOUT_MS"),
            }
        }
        if let Some(v) = lookup("UNIERP_WARN_POLICY") {
            match WarnPolicy::parse(&v) {
                Some(p) => cfg.warn_policy = p,
                None => tracing::warn!(value = %v, "ignoring invalid UNIERP_WARN_POLICY"),
            }
        }
        if let Some(v) = lookup("UNIERP_WORKSPACE") {
            if !v.trim().is_empty() {
                cfg.workspace = Some(PathBuf::from(v.trim()));
            }
        }
        if let Some(v) = lookup("UNIERP_SEED") {
            match parse_boolish(&v) {
                Some(b) => cfg.seed = b,
                None => tracing::warn!(value = %v, "ignoring invalid UNIERP_SEED"),
            }
        }
        cfg
    }
}

/// Empty or `off` disables the remote.
pub fn parse_api_base(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("off") || t.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(t.trim_end_matches('/').to_string())
    }
}

pub fn parse_boolish(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
