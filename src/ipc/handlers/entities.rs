use crate::entity::EntityKind;
use crate::ipc::helpers::{
    data, get_filter, get_object, get_required_str, records_value, require_store, respond,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::repo::Repository;
use serde_json::Value;

/// Plain repository CRUD, shared by every collection namespace. Operations
/// routed through the façade are intercepted by earlier handlers.
fn dispatch(
    state: &mut AppState,
    kind: EntityKind,
    op: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let repo = Repository::new(store, kind);
    match op {
        "list" => Ok(data(records_value(repo.list(&get_filter(params)?)?))),
        "get" => {
            let id = get_required_str(params, "id")?;
            Ok(data(Value::Object(repo.get(&id)?)))
        }
        "create" => {
            let rec = repo.create(get_object(params, "data")?)?;
            Ok(data(Value::Object(rec)))
        }
        "update" => {
            let id = get_required_str(params, "id")?;
            let rec = repo.update(&id, get_object(params, "patch")?)?;
            Ok(data(Value::Object(rec)))
        }
        "delete" => {
            let id = get_required_str(params, "id")?;
            repo.delete(&id)?;
            Ok(data(Value::Null))
        }
        other => Err(HandlerErr {
            code: "not_implemented",
            message: format!("unknown operation: {}.{}", kind.namespace(), other),
            details: None,
        }),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (ns, op) = req.method.split_once('.')?;
    let kind = EntityKind::from_namespace(ns)?;
    if !matches!(op, "list" | "get" | "create" | "update" | "delete") {
        return None;
    }
    Some(respond(&req.id, dispatch(state, kind, op, &req.params)))
}
