use crate::entity::Record;
use crate::notify::{Notifier, WarnGate, WarnPolicy};
use crate::ops;
use crate::remote::{RemoteBackend, RemoteError};
use crate::repo::{now_stamp, RepoResult};
use crate::store::KvStore;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Instant;

const JOURNAL_CAP: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    pub data: Value,
    pub source: Source,
}

/// A guarded operation that was served locally because the remote failed.
/// Remote stays the source of truth; these are the writes it has not seen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackEntry {
    pub operation: &'static str,
    pub path: String,
    pub error: String,
    pub at: String,
}

enum Call {
    Post(String, Value),
    Get(String),
}

impl Call {
    fn path(&self) -> &str {
        match self {
            Call::Post(p, _) | Call::Get(p) => p,
        }
    }
}

/// Network-first access: one remote attempt, then the local operation.
pub struct Facade {
    backend: Option<Box<dyn RemoteBackend>>,
    gate: WarnGate,
    notifier: Box<dyn Notifier>,
    journal: VecDeque<FallbackEntry>,
}

impl Facade {
    pub fn new(
        backend: Option<Box<dyn RemoteBackend>>,
        policy: WarnPolicy,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            gate: WarnGate::new(policy),
            notifier,
            journal: VecDeque::new(),
        }
    }

    pub fn reconfigure(&mut self, backend: Option<Box<dyn RemoteBackend>>, policy: WarnPolicy) {
        self.backend = backend;
        self.gate.reset(policy);
    }

    pub fn api_base(&self) -> Option<&str> {
        self.backend.as_deref().map(|b| b.base_url())
    }

    pub fn policy(&self) -> WarnPolicy {
        self.gate.policy()
    }

    pub fn warned(&self) -> bool {
        self.gate.has_shown()
    }

    pub fn journal(&self) -> impl Iterator<Item = &FallbackEntry> {
        self.journal.iter()
    }

    fn route<F>(&mut self, operation: &'static str, call: Call, local: F) -> RepoResult<Routed>
    where
        F: FnOnce() -> RepoResult<Value>,
    {
        if let Some(backend) = self.backend.as_deref() {
            let attempt = match &call {
                Call::Post(path, body) => backend.post(path, body),
                Call::Get(path) => backend.get(path),
            };
            match attempt {
                Ok(data) => {
                    return Ok(Routed {
                        data,
                        source: Source::Remote,
                    })
                }
                Err(e) => self.record_fallback(operation, call.path(), &e),
            }
        }
        Ok(Routed {
            data: local()?,
            source: Source::Local,
        })
    }

    fn record_fallback(&mut self, operation: &'static str, path: &str, err: &RemoteError) {
        let base = self.api_base().unwrap_or("").to_string();
        tracing::warn!(
            operation,
            path,
            %base,
            error = %err,
            "backend unreachable; using local store"
        );
        if self.gate.allow(Instant::now()) {
            self.notifier.notify(&format!(
                "Unable to reach backend at {}; using local data. Error: {}",
                base, err
            ));
        }
        if self.journal.len() == JOURNAL_CAP {
            self.journal.pop_front();
        }
        self.journal.push_back(FallbackEntry {
            operation,
            path: path.to_string(),
            error: err.to_string(),
            at: now_stamp(),
        });
    }

    pub fn create_course(&mut self, store: &dyn KvStore, data: Record) -> RepoResult<Routed> {
        let body = Value::Object(data.clone());
        self.route(
            "courses.create",
            Call::Post("/admin/courses/create".into(), body),
            || ops::create_course(store, data),
        )
    }

    pub fn update_course(
        &mut self,
        store: &dyn KvStore,
        id: &str,
        patch: Record,
    ) -> RepoResult<Routed> {
        let mut body = Record::new();
        body.insert("id".into(), Value::String(id.to_string()));
        body.extend(patch.clone());
        self.route(
            "courses.update",
            Call::Post("/admin/courses/update".into(), Value::Object(body)),
            || ops::update_course(store, id, patch),
        )
    }

    pub fn delete_course(&mut self, store: &dyn KvStore, id: &str) -> RepoResult<Routed> {
        let body = serde_json::json!({ "id": id });
        self.route(
            "courses.delete",
            Call::Post("/admin/courses/delete".into(), body),
            || ops::delete_course(store, id),
        )
    }

    pub fn create_assignment(&mut self, store: &dyn KvStore, data: Record) -> RepoResult<Routed> {
        let body = Value::Object(data.clone());
        self.route(
            "assignments.create",
            Call::Post("/teacher/assignments/create".into(), body),
            || ops::create_assignment(store, data),
        )
    }

    pub fn post_marks(&mut self, store: &dyn KvStore, data: Record) -> RepoResult<Routed> {
        let body = Value::Object(data.clone());
        self.route(
            "marks.post",
            Call::Post("/teacher/marks/post".into(), body),
            || ops::post_marks(store, data),
        )
    }

    pub fn mark_attendance(&mut self, store: &dyn KvStore, data: Record) -> RepoResult<Routed> {
        let body = Value::Object(data.clone());
        self.route(
            "attendance.mark",
            Call::Post("/teacher/attendance/mark".into(), body),
            || ops::mark_attendance(store, data),
        )
    }

    pub fn student_attendance(
        &mut self,
        store: &dyn KvStore,
        student_id: &str,
        course_id: Option<&str>,
    ) -> RepoResult<Routed> {
        let mut path = format!("/students/{}/attendance", urlencoding::encode(student_id));
        if let Some(c) = course_id {
            path.push_str(&format!("?courseId={}", urlencoding::encode(c)));
        }
        self.route("attendance.student", Call::Get(path), || {
            ops::student_attendance(store, student_id, course_id)
        })
    }

    pub fn export_schedule(&mut self, student_id: &str, payload: &Value) -> RepoResult<Routed> {
        let path = format!("/students/{}/export/schedule", urlencoding::encode(student_id));
        self.route(
            "schedule.export",
            Call::Post(path, payload.clone()),
            || ops::export_schedule(student_id, payload),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use crate::notify::NoticeBuffer;
    use crate::remote::HttpBackend;
    use crate::repo::{Filter, Repository};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::cell::Cell;
    use std::net::TcpListener;
    use std::rc::Rc;
    use std::time::Duration;

    struct Unreachable {
        calls: Rc<Cell<usize>>,
    }

    impl RemoteBackend for Unreachable {
        fn post(&self, _path: &str, _body: &Value) -> Result<Value, RemoteError> {
            self.calls.set(self.calls.get() + 1);
            Err(RemoteError::Transport("connection refused".into()))
        }
        fn get(&self, _path: &str) -> Result<Value, RemoteError> {
            self.calls.set(self.calls.get() + 1);
            Err(RemoteError::Transport("connection refused".into()))
        }
        fn base_url(&self) -> &str {
            "http://unreachable.invalid/api"
        }
    }

    struct Echo;

    impl RemoteBackend for Echo {
        fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
            Ok(json!({ "path": path, "echo": body }))
        }
        fn get(&self, path: &str) -> Result<Value, RemoteError> {
            Ok(json!({ "path": path }))
        }
        fn base_url(&self) -> &str {
            "http://echo.test/api"
        }
    }

    fn obj(v: Value) -> Record {
        v.as_object().expect("object").clone()
    }

    fn unreachable_facade(policy: WarnPolicy) -> (Facade, NoticeBuffer, Rc<Cell<usize>>) {
        let notices = NoticeBuffer::new();
        let calls = Rc::new(Cell::new(0));
        let facade = Facade::new(
            Some(Box::new(Unreachable { calls: calls.clone() })),
            policy,
            Box::new(notices.clone()),
        );
        (facade, notices, calls)
    }

    #[test]
    fn fallback_matches_local_operation() {
        let (mut facade, _notices, calls) = unreachable_facade(WarnPolicy::Once);
        let via_facade = MemoryStore::new();
        let direct = MemoryStore::new();
        let input = obj(json!({
            "studentId": "S1",
            "courseId": "CS101",
            "type": "quiz",
            "marks": 7
        }));

        let routed = facade.post_marks(&via_facade, input.clone()).expect("facade");
        let local = ops::post_marks(&direct, input).expect("local");
        assert_eq!(routed.source, Source::Local);
        assert_eq!(calls.get(), 1);

        // Generated id and timestamp differ between the two stores.
        let strip = |v: &Value| {
            let mut m = v.as_object().expect("object").clone();
            m.remove("id");
            m.remove("createdAt");
            m
        };
        assert_eq!(strip(&routed.data), strip(&local));
    }

    #[test]
    fn notifies_once_across_failures() {
        let (mut facade, notices, _calls) = unreachable_facade(WarnPolicy::Once);
        let store = MemoryStore::new();
        facade
            .create_course(&store, obj(json!({ "code": "CS1", "name": "A" })))
            .expect("first");
        facade
            .create_course(&store, obj(json!({ "code": "CS2", "name": "B" })))
            .expect("second");
        let shown = notices.drain();
        assert_eq!(shown.len(), 1);
        assert!(shown[0].contains("http://unreachable.invalid/api"));
        assert_eq!(facade.journal().count(), 2);
        assert!(facade.warned());
    }

    #[test]
    fn always_policy_notifies_every_time() {
        let (mut facade, notices, _calls) = unreachable_facade(WarnPolicy::Always);
        let store = MemoryStore::new();
        facade.delete_course(&store, "nope").expect("delete");
        facade.delete_course(&store, "nope").expect("delete again");
        assert_eq!(notices.drain().len(), 2);
    }

    #[test]
    fn remote_success_is_not_mirrored_locally() {
        let mut facade = Facade::new(
            Some(Box::new(Echo)),
            WarnPolicy::Once,
            Box::new(NoticeBuffer::new()),
        );
        let store = MemoryStore::new();
        let routed = facade
            .create_course(&store, obj(json!({ "code": "CS9", "name": "Remote" })))
            .expect("remote");
        assert_eq!(routed.source, Source::Remote);
        assert_eq!(routed.data["path"], json!("/admin/courses/create"));
        let local = Repository::new(&store, EntityKind::Course)
            .list(&Filter::new())
            .expect("list");
        assert!(local.is_empty());
    }

    #[test]
    fn update_body_carries_id_and_attendance_path_is_encoded() {
        let mut facade = Facade::new(
            Some(Box::new(Echo)),
            WarnPolicy::Once,
            Box::new(NoticeBuffer::new()),
        );
        let store = MemoryStore::new();
        let routed = facade
            .update_course(&store, "CS101", obj(json!({ "capacity": 40 })))
            .expect("update");
        assert_eq!(routed.data["echo"], json!({ "id": "CS101", "capacity": 40 }));

        let routed = facade
            .student_attendance(&store, "S 1", Some("CS101"))
            .expect("attendance");
        assert_eq!(routed.data["path"], json!("/students/S%201/attendance?courseId=CS101"));

        let routed = facade.export_schedule("a/b", &json!({})).expect("export");
        assert_eq!(routed.data["path"], json!("/students/a%2Fb/export/schedule"));
    }

    #[test]
    fn silent_backend_times_out_and_falls_back() {
        // Accepts connections and never writes a response.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });

        let base = format!("http://{}/api", addr);
        let backend = HttpBackend::new(&base, Duration::from_millis(300)).expect("client");
        let notices = NoticeBuffer::new();
        let mut facade = Facade::new(
            Some(Box::new(backend)),
            WarnPolicy::Once,
            Box::new(notices.clone()),
        );
        let store = MemoryStore::new();
        let input = obj(json!({
            "studentId": "S1",
            "courseId": "CS101",
            "type": "quiz",
            "marks": 7
        }));

        let started = Instant::now();
        let routed = facade.post_marks(&store, input).expect("fallback");
        let elapsed = started.elapsed();

        assert_eq!(routed.source, Source::Local);
        assert_eq!(routed.data["marks"], json!(7));
        assert_eq!(notices.drain().len(), 1);
        assert!(elapsed >= Duration::from_millis(250), "returned early: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(3), "timeout not applied: {:?}", elapsed);
        assert_eq!(facade.journal().count(), 1);
    }

    #[test]
    fn disabled_backend_goes_local_silently() {
        let notices = NoticeBuffer::new();
        let mut facade = Facade::new(None, WarnPolicy::Always, Box::new(notices.clone()));
        let store = MemoryStore::new();
        let routed = facade
            .export_schedule("jdoe", &json!({ "scheduleData": [] }))
            .expect("export");
        assert_eq!(routed.source, Source::Local);
        assert_eq!(routed.data["fileName"], json!("jdoe-schedule.csv"));
        let att = facade
            .student_attendance(&store, "S1", None)
            .expect("attendance");
        assert_eq!(att.data["percentage"], json!(0.0));
        assert!(notices.drain().is_empty());
        assert_eq!(facade.journal().count(), 0);
    }
}
