//! Local implementations of the operations the façade guards. Each returns
//! the same JSON shape the remote backend is expected to answer with.

use crate::calc;
use crate::entity::{EntityKind, Record};
use crate::export;
use crate::repo::{RepoError, RepoResult, Repository};
use crate::store::KvStore;
use serde_json::Value;

/// Composite key for mark upserts.
pub const MARK_KEYS: [&str; 3] = ["studentId", "courseId", "type"];

fn to_value<T: serde::Serialize>(v: &T) -> RepoResult<Value> {
    serde_json::to_value(v).map_err(|e| RepoError::Storage(e.into()))
}

pub fn create_course(store: &dyn KvStore, data: Record) -> RepoResult<Value> {
    let rec = Repository::new(store, EntityKind::Course).create(data)?;
    Ok(Value::Object(rec))
}

pub fn update_course(store: &dyn KvStore, id: &str, patch: Record) -> RepoResult<Value> {
    let rec = Repository::new(store, EntityKind::Course).update(id, patch)?;
    Ok(Value::Object(rec))
}

pub fn delete_course(store: &dyn KvStore, id: &str) -> RepoResult<Value> {
    Repository::new(store, EntityKind::Course).delete(id)?;
    Ok(Value::Null)
}

pub fn create_assignment(store: &dyn KvStore, data: Record) -> RepoResult<Value> {
    let rec = Repository::new(store, EntityKind::Assignment).create(data)?;
    Ok(Value::Object(rec))
}

pub fn post_marks(store: &dyn KvStore, data: Record) -> RepoResult<Value> {
    let rec = Repository::new(store, EntityKind::Mark).upsert_by(&MARK_KEYS, data)?;
    Ok(Value::Object(rec))
}

pub fn mark_attendance(store: &dyn KvStore, data: Record) -> RepoResult<Value> {
    let rec = Repository::new(store, EntityKind::Attendance).create(data)?;
    Ok(Value::Object(rec))
}

pub fn student_attendance(
    store: &dyn KvStore,
    student_id: &str,
    course_id: Option<&str>,
) -> RepoResult<Value> {
    let all = Repository::new(store, EntityKind::Attendance).load()?;
    to_value(&calc::student_attendance(&all, student_id, course_id, None))
}

pub fn export_schedule(student_id: &str, payload: &Value) -> RepoResult<Value> {
    to_value(&export::schedule_csv(student_id, payload))
}
