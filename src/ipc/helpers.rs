use crate::entity::Record;
use crate::ipc::error::{err, ok};
use crate::repo::{Filter, RepoError};
use crate::store::KvStore;
use serde_json::{json, Value};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<RepoError> for HandlerErr {
    fn from(e: RepoError) -> Self {
        if let RepoError::Storage(inner) = &e {
            tracing::error!(error = ?inner, "storage failure");
        }
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details: None,
        }
    }
}

pub fn respond(id: &str, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

/// `{ "data": ... }`, the shape every successful operation answers with.
pub fn data(v: Value) -> Value {
    json!({ "data": v })
}

pub fn require_store(store: &Option<Box<dyn KvStore>>) -> Result<&dyn KvStore, HandlerErr> {
    store.as_deref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    match params.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    match params.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Semester-like values stay loosely typed (`1` or `"1"`).
pub fn get_required_value(params: &Value, key: &str) -> Result<Value, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(v) => Ok(v.clone()),
    }
}

pub fn get_optional_value(params: &Value, key: &str) -> Option<Value> {
    match params.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.clone()),
    }
}

pub fn get_object(params: &Value, key: &str) -> Result<Record, HandlerErr> {
    match params.get(key) {
        Some(Value::Object(m)) => Ok(m.clone()),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be an object", key))),
        None => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

/// `params.filter` as equality predicates; null values are ignored.
pub fn get_filter(params: &Value) -> Result<Filter, HandlerErr> {
    match params.get("filter") {
        None | Some(Value::Null) => Ok(Filter::new()),
        Some(Value::Object(m)) => Ok(m
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        Some(_) => Err(HandlerErr::bad_params("filter must be an object")),
    }
}

pub fn records_value(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}
