use crate::config::parse_api_base;
use crate::db;
use crate::entity::EntityKind;
use crate::ipc::helpers::{respond, HandlerErr};
use crate::ipc::types::{build_backend, AppState, Request};
use crate::notify::WarnPolicy;
use crate::repo::{now_stamp, Repository};
use crate::store::{KvStore, MemoryStore};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(
        &req.id,
        Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "store": state.store.as_ref().map(|s| s.describe()),
            "apiBase": state.facade.api_base(),
        })),
    )
}

/// Writes default records for every collection key that is absent.
pub fn seed_store(store: &dyn KvStore) -> anyhow::Result<Vec<&'static str>> {
    let now = now_stamp();
    let mut seeded = Vec::new();
    for kind in EntityKind::ALL {
        if Repository::new(store, kind).seed_if_absent(&now)? {
            seeded.push(kind.storage_key());
        }
    }
    Ok(seeded)
}

/// Opens (or creates) the workspace store and seeds it. Used at startup and
/// by `workspace.select`.
pub fn open_workspace(
    state: &mut AppState,
    path: Option<PathBuf>,
    seed: bool,
) -> anyhow::Result<Vec<&'static str>> {
    let store: Box<dyn KvStore> = match &path {
        Some(p) => Box::new(db::open_db(p)?),
        None => Box::new(MemoryStore::new()),
    };
    let seeded = if seed { seed_store(store.as_ref())? } else { Vec::new() };
    tracing::info!(store = %store.describe(), seeded = seeded.len(), "workspace opened");
    state.workspace = path;
    state.store = Some(store);
    Ok(seeded)
}

fn workspace_select(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let in_memory = params
        .get("inMemory")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let path = params.get("path").and_then(|v| v.as_str()).map(PathBuf::from);
    if path.is_none() && !in_memory {
        return Err(HandlerErr::bad_params("missing params.path"));
    }
    let seed = params
        .get("seed")
        .and_then(|v| v.as_bool())
        .unwrap_or(state.config.seed);

    let seeded = open_workspace(state, if in_memory { None } else { path }, seed).map_err(|e| {
        HandlerErr {
            code: "db_open_failed",
            message: format!("{e:?}"),
            details: None,
        }
    })?;
    Ok(json!({
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "seeded": seeded,
    }))
}

fn backend_status(state: &AppState) -> Value {
    let journal: Vec<Value> = state
        .facade
        .journal()
        .map(|e| serde_json::to_value(e).unwrap_or(Value::Null))
        .collect();
    json!({
        "apiBase": state.facade.api_base(),
        "timeoutMs": state.config.http_timeout.as_millis() as u64,
        "warnPolicy": state.facade.policy().describe(),
        "warned": state.facade.warned(),
        "fallbacks": journal,
    })
}

fn backend_configure(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    match params.get("apiBase") {
        None => {}
        Some(Value::Null) => state.config.api_base = None,
        Some(Value::String(s)) => state.config.api_base = parse_api_base(s),
        Some(_) => return Err(HandlerErr::bad_params("apiBase must be a string or null")),
    }
    if let Some(v) = params.get("timeoutMs") {
        let ms = v
            .as_u64()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| HandlerErr::bad_params("timeoutMs must be a positive integer"))?;
        state.config.http_timeout = Duration::from_millis(ms);
    }
    if let Some(v) = params.get("warnPolicy") {
        let policy = v
            .as_str()
            .and_then(WarnPolicy::parse)
            .ok_or_else(|| {
                HandlerErr::bad_params("warnPolicy must be once, always or interval:<secs>")
            })?;
        state.config.warn_policy = policy;
    }

    let backend = build_backend(state.config.api_base.as_deref(), state.config.http_timeout);
    state.facade.reconfigure(backend, state.config.warn_policy);
    tracing::info!(api_base = ?state.config.api_base, "backend reconfigured");
    Ok(backend_status(state))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(respond(&req.id, workspace_select(state, &req.params))),
        "backend.status" => Some(respond(&req.id, Ok(backend_status(state)))),
        "backend.configure" => Some(respond(&req.id, backend_configure(state, &req.params))),
        _ => None,
    }
}
