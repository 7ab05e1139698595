use crate::entity::{EntityKind, Record};
use crate::ipc::helpers::{data, get_required_str, require_store, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::repo::Repository;
use serde_json::Value;

fn set_status(state: &mut AppState, params: &Value, status: &str) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let id = get_required_str(params, "id")?;
    let mut patch = Record::new();
    patch.insert("status".into(), Value::String(status.to_string()));
    let rec = Repository::new(store, EntityKind::User).update(&id, patch)?;
    tracing::info!(user = %id, status, "user status changed");
    Ok(data(Value::Object(rec)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.activate" => Some(respond(&req.id, set_status(state, &req.params, "Active"))),
        "users.deactivate" => Some(respond(&req.id, set_status(state, &req.params, "Inactive"))),
        _ => None,
    }
}
