use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use serde_json::Value;

type Handler = fn(&mut AppState, &Request) -> Option<Value>;

// Façade-routed and helper methods come before the generic collection CRUD.
const HANDLERS: &[Handler] = &[
    handlers::core::try_handle,
    handlers::courses::try_handle,
    handlers::teaching::try_handle,
    handlers::reports::try_handle,
    handlers::users::try_handle,
    handlers::session::try_handle,
    handlers::entities::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> Value {
    let mut resp = HANDLERS
        .iter()
        .find_map(|h| h(state, &req))
        .unwrap_or_else(|| {
            err(
                &req.id,
                "not_implemented",
                format!("unknown method: {}", req.method),
                None,
            )
        });

    let notices = state.notices.drain();
    if !notices.is_empty() {
        if let Some(obj) = resp.as_object_mut() {
            obj.insert("notices".to_string(), Value::from(notices));
        }
    }
    resp
}
