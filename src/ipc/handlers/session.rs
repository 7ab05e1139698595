use crate::entity::{default_settings, REMEMBER_KEY, SESSION_KEY, SETTINGS_KEY};
use crate::ipc::helpers::{data, get_object, require_store, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, KvStore};
use serde_json::Value;

fn storage_err(e: anyhow::Error) -> HandlerErr {
    tracing::error!(error = ?e, "storage failure");
    HandlerErr {
        code: "storage_failed",
        message: e.to_string(),
        details: None,
    }
}

fn get_key(store: &dyn KvStore, key: &str) -> Result<Value, HandlerErr> {
    let v: Option<Value> = store::read(store, key).map_err(storage_err)?;
    Ok(data(v.unwrap_or(Value::Null)))
}

fn set_key(
    store: &dyn KvStore,
    key: &str,
    params: &Value,
    field: &str,
) -> Result<Value, HandlerErr> {
    let rec = get_object(params, field)?;
    store::write(store, key, &rec).map_err(storage_err)?;
    Ok(data(Value::Object(rec)))
}

fn clear_key(store: &dyn KvStore, key: &str) -> Result<Value, HandlerErr> {
    store.remove(key).map_err(storage_err)?;
    Ok(data(Value::Null))
}

/// Stored settings merged over the defaults.
fn settings_get(store: &dyn KvStore) -> Result<serde_json::Map<String, Value>, HandlerErr> {
    let mut merged = match default_settings() {
        Value::Object(m) => m,
        _ => serde_json::Map::new(),
    };
    let stored: Option<serde_json::Map<String, Value>> =
        store::read(store, SETTINGS_KEY).map_err(storage_err)?;
    if let Some(s) = stored {
        merged.extend(s);
    }
    Ok(merged)
}

fn settings_update(store: &dyn KvStore, params: &Value) -> Result<Value, HandlerErr> {
    let patch = get_object(params, "patch")?;
    let mut merged = settings_get(store)?;
    merged.extend(patch);
    store::write(store, SETTINGS_KEY, &merged).map_err(storage_err)?;
    Ok(data(Value::Object(merged)))
}

fn dispatch(state: &mut AppState, method: &str, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    match method {
        "session.get" => get_key(store, SESSION_KEY),
        "session.set" => set_key(store, SESSION_KEY, params, "user"),
        "session.clear" => clear_key(store, SESSION_KEY),
        "session.remembered" => get_key(store, REMEMBER_KEY),
        "session.remember" => set_key(store, REMEMBER_KEY, params, "prefill"),
        "session.forget" => clear_key(store, REMEMBER_KEY),
        "settings.get" => Ok(data(Value::Object(settings_get(store)?))),
        "settings.update" => settings_update(store, params),
        other => Err(HandlerErr {
            code: "not_implemented",
            message: format!("unknown method: {}", other),
            details: None,
        }),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.get" | "session.set" | "session.clear" | "session.remembered"
        | "session.remember" | "session.forget" | "settings.get" | "settings.update" => {
            Some(respond(&req.id, dispatch(state, &req.method, &req.params)))
        }
        _ => None,
    }
}
