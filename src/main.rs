mod calc;
mod config;
mod db;
mod entity;
mod export;
mod facade;
mod ipc;
mod notify;
mod ops;
mod remote;
mod repo;
mod store;

use serde_json::json;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    // stdout carries the protocol; logs go to stderr.
    let filter = std::env::var("UNIERP_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();

    let config = config::Config::from_env();
    tracing::info!(
        api_base = config.api_base.as_deref().unwrap_or("off"),
        timeout_ms = config.http_timeout.as_millis() as u64,
        warn_policy = %config.warn_policy.describe(),
        "unierpd starting"
    );
    let startup_workspace = config.workspace.clone();
    let seed = config.seed;
    let mut state = ipc::AppState::new(config);

    if let Some(path) = startup_workspace {
        if let Err(e) = ipc::open_workspace(&mut state, Some(path.clone()), seed) {
            tracing::error!(path = %path.display(), error = ?e, "failed to open workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        tracing::debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
