use crate::calc::{self, SearchScope};
use crate::entity::EntityKind;
use crate::export;
use crate::ipc::handlers::courses::routed;
use crate::ipc::helpers::{
    data, get_optional_str, get_required_str, records_value, require_store, respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::repo::{now_stamp, Filter, Repository};
use crate::store::KvStore;
use serde_json::{json, Value};

fn count(store: &dyn KvStore, kind: EntityKind) -> Result<usize, HandlerErr> {
    Ok(Repository::new(store, kind).list(&Filter::new())?.len())
}

fn finance_summary(state: &mut AppState) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let txns = Repository::new(store, EntityKind::Transaction).load()?;
    Ok(data(json!(calc::financial_summary(&txns))))
}

fn library_overdue(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let today = match get_optional_str(params, "today") {
        Some(s) => calc::parse_day(&s)
            .ok_or_else(|| HandlerErr::bad_params("today must be YYYY-MM-DD"))?,
        None => chrono::Local::now().date_naive(),
    };
    let borrowings = Repository::new(store, EntityKind::Borrowing).load()?;
    Ok(data(records_value(calc::overdue_borrowings(&borrowings, today))))
}

fn stats_system(state: &mut AppState) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    Ok(data(json!({
        "totalStudents": count(store, EntityKind::Student)?,
        "totalFaculty": count(store, EntityKind::Faculty)?,
        "totalCourses": count(store, EntityKind::Course)?,
        "totalUsers": count(store, EntityKind::User)?,
        "timestamp": now_stamp(),
    })))
}

fn search(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let query = params
        .get("query")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing query"))?;
    let scope_raw = get_optional_str(params, "type").unwrap_or_else(|| "all".to_string());
    let scope = SearchScope::parse(&scope_raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown search type: {}", scope_raw)))?;

    let mut out = serde_json::Map::new();
    for (kind, key, s) in [
        (EntityKind::Student, "students", SearchScope::Students),
        (EntityKind::Faculty, "faculty", SearchScope::Faculty),
        (EntityKind::Course, "courses", SearchScope::Courses),
    ] {
        if scope.includes(s) {
            let all = Repository::new(store, kind).load()?;
            out.insert(key.to_string(), records_value(calc::name_matches(&all, query)));
        }
    }
    Ok(data(Value::Object(out)))
}

fn schedule_export(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let payload = params.get("payload").cloned().unwrap_or_else(|| json!({}));
    Ok(routed(state.facade.export_schedule(&student_id, &payload)?))
}

fn attendance_csv(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let student_id = get_required_str(params, "studentId")?;
    let all = Repository::new(store, EntityKind::Attendance).load()?;
    let report = calc::attendance_report(&all, &student_id);
    Ok(data(json!(export::attendance_report_csv(&student_id, &report))))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "finance.summary" => finance_summary(state),
        "library.overdue" => library_overdue(state, &req.params),
        "stats.system" => stats_system(state),
        "search" => search(state, &req.params),
        "schedule.export" => schedule_export(state, &req.params),
        "reports.attendanceCsv" => attendance_csv(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
