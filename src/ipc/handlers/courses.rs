use crate::facade::Routed;
use crate::ipc::helpers::{get_object, get_required_str, require_store, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

pub fn routed(r: Routed) -> Value {
    json!({ "data": r.data, "source": r.source })
}

fn courses_create(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let data = get_object(params, "data")?;
    Ok(routed(state.facade.create_course(store, data)?))
}

fn courses_update(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let id = get_required_str(params, "id")?;
    let patch = get_object(params, "patch")?;
    Ok(routed(state.facade.update_course(store, &id, patch)?))
}

fn courses_delete(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let id = get_required_str(params, "id")?;
    Ok(routed(state.facade.delete_course(store, &id)?))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(respond(&req.id, courses_create(state, &req.params))),
        "courses.update" => Some(respond(&req.id, courses_update(state, &req.params))),
        "courses.delete" => Some(respond(&req.id, courses_delete(state, &req.params))),
        _ => None,
    }
}
