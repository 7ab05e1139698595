use crate::entity::{key_string, loosely_equal, str_field, EntityKind, Record};
use crate::store::{self, KvStore};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl RepoError {
    pub fn code(&self) -> &'static str {
        match self {
            RepoError::NotFound(_) => "not_found",
            RepoError::Conflict(_) => "conflict",
            RepoError::Storage(_) => "storage_failed",
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Equality predicates applied by `list`.
pub type Filter = Vec<(String, Value)>;

pub fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Read-all / mutate / write-all access to one collection.
pub struct Repository<'s> {
    store: &'s dyn KvStore,
    kind: EntityKind,
}

impl<'s> Repository<'s> {
    pub fn new(store: &'s dyn KvStore, kind: EntityKind) -> Self {
        Self { store, kind }
    }

    /// Whole collection. Absent or corrupt storage reads as empty; non-object
    /// entries are skipped.
    pub fn load(&self) -> RepoResult<Vec<Record>> {
        let raw: Vec<Value> = store::read(self.store, self.kind.storage_key())?.unwrap_or_default();
        let mut out = Vec::with_capacity(raw.len());
        for v in raw {
            match v {
                Value::Object(mut rec) => {
                    if self.kind == EntityKind::Course {
                        normalize_course_ids(&mut rec);
                    }
                    out.push(rec);
                }
                other => {
                    tracing::warn!(
                        key = self.kind.storage_key(),
                        value = %other,
                        "skipping non-object entry"
                    );
                }
            }
        }
        Ok(out)
    }

    fn save(&self, records: &[Record]) -> RepoResult<()> {
        store::write(self.store, self.kind.storage_key(), records)?;
        Ok(())
    }

    pub fn list(&self, filter: &Filter) -> RepoResult<Vec<Record>> {
        let all = self.load()?;
        Ok(all
            .into_iter()
            .filter(|rec| matches_filter(rec, filter))
            .collect())
    }

    pub fn get(&self, id: &str) -> RepoResult<Record> {
        self.load()?
            .into_iter()
            .find(|rec| self.is_target(rec, id))
            .ok_or(RepoError::NotFound(self.kind.label()))
    }

    pub fn create(&self, partial: Record) -> RepoResult<Record> {
        let mut all = self.load()?;
        let rec = self.prepare_new(&all, partial)?;
        all.push(rec.clone());
        self.save(&all)?;
        Ok(rec)
    }

    /// Appends every entry in one write; entries are not validated against
    /// each other.
    pub fn create_many(&self, partials: Vec<Record>) -> RepoResult<Vec<Record>> {
        let mut all = self.load()?;
        let mut created = Vec::with_capacity(partials.len());
        for partial in partials {
            let rec = self.prepare_new(&all, partial)?;
            all.push(rec.clone());
            created.push(rec);
        }
        self.save(&all)?;
        Ok(created)
    }

    pub fn update(&self, id: &str, patch: Record) -> RepoResult<Record> {
        let mut all = self.load()?;
        let Some(idx) = all.iter().position(|rec| self.is_target(rec, id)) else {
            return Err(RepoError::NotFound(self.kind.label()));
        };
        if self.kind == EntityKind::User {
            if let Some(username) = str_field(&patch, "username") {
                let taken = all
                    .iter()
                    .enumerate()
                    .any(|(i, u)| i != idx && str_field(u, "username") == Some(username));
                if taken {
                    return Err(RepoError::Conflict("Username already exists".into()));
                }
            }
        }
        let rec = &mut all[idx];
        for (k, v) in patch {
            if self.is_identity_field(&k) {
                continue;
            }
            rec.insert(k, v);
        }
        rec.insert("updatedAt".into(), Value::String(now_stamp()));
        let merged = rec.clone();
        self.save(&all)?;
        Ok(merged)
    }

    /// Idempotent: deleting an unknown id still succeeds.
    pub fn delete(&self, id: &str) -> RepoResult<()> {
        let all = self.load()?;
        let before = all.len();
        let kept: Vec<Record> = all
            .into_iter()
            .filter(|rec| !self.is_target(rec, id))
            .collect();
        if kept.len() == before {
            tracing::debug!(collection = self.kind.storage_key(), id, "delete matched nothing");
        }
        self.save(&kept)
    }

    /// Create-or-merge keyed by the given fields instead of the id.
    pub fn upsert_by(&self, keys: &[&str], data: Record) -> RepoResult<Record> {
        let mut all = self.load()?;
        let existing = all.iter().position(|rec| {
            keys.iter().all(|k| match (rec.get(*k), data.get(*k)) {
                (Some(a), Some(b)) => loosely_equal(a, b),
                (None, None) => true,
                _ => false,
            })
        });
        let stored = match existing {
            Some(idx) => {
                let rec = &mut all[idx];
                for (k, v) in data {
                    if self.is_identity_field(&k) {
                        continue;
                    }
                    rec.insert(k, v);
                }
                rec.insert("updatedAt".into(), Value::String(now_stamp()));
                rec.clone()
            }
            None => {
                let rec = self.prepare_new(&all, data)?;
                all.push(rec.clone());
                rec
            }
        };
        self.save(&all)?;
        Ok(stored)
    }

    /// Writes the seed records when the collection key is absent.
    pub fn seed_if_absent(&self, now: &str) -> RepoResult<bool> {
        if self.store.contains(self.kind.storage_key())? {
            return Ok(false);
        }
        store::write(
            self.store,
            self.kind.storage_key(),
            &self.kind.seed_records(now),
        )?;
        Ok(true)
    }

    /// Courses written before `id` became canonical may only be known by code.
    fn is_target(&self, rec: &Record, id: &str) -> bool {
        record_id(rec).as_deref() == Some(id)
            || (self.kind == EntityKind::Course && str_field(rec, "code") == Some(id))
    }

    fn is_identity_field(&self, field: &str) -> bool {
        field == "id" || (self.kind == EntityKind::Course && field == "code")
    }

    fn prepare_new(&self, existing: &[Record], mut rec: Record) -> RepoResult<Record> {
        if self.kind == EntityKind::Course && key_string(rec.get("id")).is_none() {
            if let Some(code) = key_string(rec.get("code")) {
                rec.insert("id".into(), Value::String(code));
            }
        }

        let id = match key_string(rec.get("id")) {
            Some(id) => {
                if existing.iter().any(|r| self.is_target(r, &id)) {
                    return Err(RepoError::Conflict(match self.kind {
                        EntityKind::Course => "Course code already exists".to_string(),
                        k => format!("{} id already exists", k.label()),
                    }));
                }
                id
            }
            None => format!("{}{}", self.kind.id_prefix(), Uuid::new_v4().simple()),
        };
        rec.insert("id".into(), Value::String(id.clone()));
        if !rec.contains_key("createdAt") {
            rec.insert("createdAt".into(), Value::String(now_stamp()));
        }

        match self.kind {
            EntityKind::Course => {
                rec.insert("code".into(), Value::String(id));
            }
            EntityKind::User => {
                if let Some(username) = str_field(&rec, "username") {
                    if existing
                        .iter()
                        .any(|u| str_field(u, "username") == Some(username))
                    {
                        return Err(RepoError::Conflict("Username already exists".into()));
                    }
                }
                rec.entry("lastLogin").or_insert(Value::Null);
                rec.entry("status")
                    .or_insert_with(|| Value::String("Active".into()));
            }
            EntityKind::Submission => {
                rec.entry("status")
                    .or_insert_with(|| Value::String("submitted".into()));
                rec.entry("submittedAt")
                    .or_insert_with(|| Value::String(now_stamp()));
            }
            _ => {}
        }
        Ok(rec)
    }
}

pub fn record_id(rec: &Record) -> Option<String> {
    key_string(rec.get("id"))
}

fn matches_filter(rec: &Record, filter: &Filter) -> bool {
    filter.iter().all(|(field, want)| {
        rec.get(field)
            .map(|have| loosely_equal(have, want))
            .unwrap_or(false)
    })
}

/// Older course records carry only `code` or only `id`; `id` is canonical and
/// `code` mirrors it.
fn normalize_course_ids(rec: &mut Record) {
    match (key_string(rec.get("id")), key_string(rec.get("code"))) {
        (None, Some(code)) => {
            rec.insert("id".into(), Value::String(code));
        }
        (Some(id), None) => {
            rec.insert("code".into(), Value::String(id));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn obj(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn create_then_get_returns_same_record() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store, EntityKind::Student);
        let created = repo
            .create(obj(json!({ "name": "Ada", "grade": "Grade 10A" })))
            .expect("create");
        let id = record_id(&created).expect("id");
        assert!(id.starts_with("S-"));
        assert!(created.contains_key("createdAt"));
        assert_eq!(repo.get(&id).expect("get"), created);
    }

    #[test]
    fn get_missing_reports_label() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store, EntityKind::Faculty);
        let e = repo.get("nope").expect_err("missing");
        assert_eq!(e.to_string(), "Faculty member not found");
        assert_eq!(e.code(), "not_found");
    }

    #[test]
    fn update_keeps_fields_not_in_patch() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store, EntityKind::Student);
        let created = repo
            .create(obj(json!({ "name": "Ada", "email": "ada@x.edu", "status": "Active" })))
            .expect("create");
        let id = record_id(&created).expect("id");
        let merged = repo
            .update(&id, obj(json!({ "status": "Probation", "id": "hijack" })))
            .expect("update");
        assert_eq!(merged.get("status"), Some(&json!("Probation")));
        assert_eq!(merged.get("email"), Some(&json!("ada@x.edu")));
        assert_eq!(merged.get("id"), Some(&json!(id)));
        assert!(merged.contains_key("updatedAt"));
    }

    #[test]
    fn update_missing_is_not_found() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store, EntityKind::Transaction);
        let e = repo.update("TXN-x", Record::new()).expect_err("missing");
        assert_eq!(e.to_string(), "Transaction not found");
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store, EntityKind::Borrowing);
        let created = repo
            .create(obj(json!({ "bookTitle": "Dune" })))
            .expect("create");
        let id = record_id(&created).expect("id");
        repo.delete(&id).expect("first delete");
        repo.delete(&id).expect("second delete");
        assert!(repo.list(&Filter::new()).expect("list").is_empty());
    }

    #[test]
    fn list_filters_with_loose_equality() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store, EntityKind::Attendance);
        repo.create(obj(json!({ "courseId": "CS101", "semester": 1 })))
            .expect("create");
        repo.create(obj(json!({ "courseId": "CS101", "semester": "2" })))
            .expect("create");
        repo.create(obj(json!({ "courseId": "MA101", "semester": 1 })))
            .expect("create");
        let filter: Filter = vec![
            ("courseId".into(), json!("CS101")),
            ("semester".into(), json!("1")),
        ];
        assert_eq!(repo.list(&filter).expect("list").len(), 1);
    }

    #[test]
    fn marks_upsert_overwrites_same_key() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store, EntityKind::Mark);
        let keys = ["studentId", "courseId", "type"];
        let first = repo
            .upsert_by(
                &keys,
                obj(json!({ "studentId": "S1", "courseId": "CS101", "type": "quiz", "marks": 5 })),
            )
            .expect("first");
        let second = repo
            .upsert_by(
                &keys,
                obj(json!({ "studentId": "S1", "courseId": "CS101", "type": "quiz", "marks": 9 })),
            )
            .expect("second");
        let all = repo.list(&Filter::new()).expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get("marks"), Some(&json!(9)));
        assert_eq!(record_id(&first), record_id(&second));

        repo.upsert_by(
            &keys,
            obj(json!({ "studentId": "S1", "courseId": "CS101", "type": "final", "marks": 70 })),
        )
        .expect("other type");
        assert_eq!(repo.list(&Filter::new()).expect("list").len(), 2);
    }

    #[test]
    fn course_code_is_canonical_id() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store, EntityKind::Course);
        let created = repo
            .create(obj(json!({ "code": "CS999", "name": "Test", "instructor": "Dr. X" })))
            .expect("create");
        assert_eq!(created.get("id"), Some(&json!("CS999")));
        let dup = repo
            .create(obj(json!({ "code": "CS999", "name": "Again" })))
            .expect_err("duplicate");
        assert_eq!(dup.code(), "conflict");

        let all = repo.list(&Filter::new()).expect("list");
        let matching = all
            .iter()
            .filter(|c| c.get("code") == Some(&json!("CS999")))
            .count();
        assert_eq!(matching, 1);
    }

    #[test]
    fn legacy_course_records_are_normalized_on_read() {
        let store = MemoryStore::new();
        store::write(
            &store,
            "erp_courses",
            &json!([{ "code": "MA101", "name": "Calculus" }, { "id": "PH201", "name": "Physics" }]),
        )
        .expect("seed");
        let repo = Repository::new(&store, EntityKind::Course);
        assert_eq!(
            repo.get("MA101").expect("by code").get("code"),
            Some(&json!("MA101"))
        );
        assert_eq!(
            repo.get("PH201").expect("by id").get("code"),
            Some(&json!("PH201"))
        );
    }

    #[test]
    fn course_with_diverging_id_and_code_is_found_by_either() {
        let store = MemoryStore::new();
        store::write(
            &store,
            "erp_courses",
            &json!([{ "id": "C-17", "code": "BIO110", "name": "Biology" }]),
        )
        .expect("seed");
        let repo = Repository::new(&store, EntityKind::Course);
        assert_eq!(repo.get("BIO110").expect("by code").get("id"), Some(&json!("C-17")));
        repo.update("BIO110", obj(json!({ "capacity": 20 })))
            .expect("update by code");
        assert_eq!(repo.get("C-17").expect("by id").get("capacity"), Some(&json!(20)));
        repo.delete("BIO110").expect("delete by code");
        assert!(repo.list(&Filter::new()).expect("list").is_empty());
    }

    #[test]
    fn duplicate_username_rejected() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store, EntityKind::User);
        let u = repo
            .create(obj(json!({ "username": "amy", "role": "Faculty" })))
            .expect("create");
        assert_eq!(u.get("status"), Some(&json!("Active")));
        assert_eq!(u.get("lastLogin"), Some(&Value::Null));
        let e = repo
            .create(obj(json!({ "username": "amy" })))
            .expect_err("dup");
        assert_eq!(e.to_string(), "Username already exists");
    }

    #[test]
    fn renaming_user_to_taken_username_rejected() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store, EntityKind::User);
        repo.create(obj(json!({ "username": "amy" }))).expect("amy");
        let bob = repo.create(obj(json!({ "username": "bob" }))).expect("bob");
        let bob_id = record_id(&bob).expect("id");

        let e = repo
            .update(&bob_id, obj(json!({ "username": "amy" })))
            .expect_err("taken");
        assert_eq!(e.code(), "conflict");
        assert_eq!(e.to_string(), "Username already exists");
        let filter: Filter = vec![("username".to_string(), json!("amy"))];
        assert_eq!(repo.list(&filter).expect("list").len(), 1);

        // Re-saving the same username is not a conflict with itself.
        let same = repo
            .update(&bob_id, obj(json!({ "username": "bob", "role": "Faculty" })))
            .expect("same name");
        assert_eq!(same.get("role"), Some(&json!("Faculty")));
    }

    #[test]
    fn corrupt_collection_reads_empty_and_is_rewritten_on_create() {
        let store = MemoryStore::new();
        store.set_raw("erp_announcements", "{{{").expect("corrupt");
        let repo = Repository::new(&store, EntityKind::Announcement);
        assert!(repo.list(&Filter::new()).expect("list").is_empty());
        repo.create(obj(json!({ "title": "Hello" })))
            .expect("create");
        assert_eq!(repo.list(&Filter::new()).expect("list").len(), 1);
    }

    #[test]
    fn seeding_skips_present_keys() {
        let store = MemoryStore::new();
        store.set_raw("erp_students", "[]").expect("set");
        let students = Repository::new(&store, EntityKind::Student);
        assert!(!students.seed_if_absent("t").expect("seed"));
        assert!(students.list(&Filter::new()).expect("list").is_empty());
        let users = Repository::new(&store, EntityKind::User);
        assert!(users.seed_if_absent("t").expect("seed"));
        assert_eq!(users.list(&Filter::new()).expect("list").len(), 3);
    }
}
