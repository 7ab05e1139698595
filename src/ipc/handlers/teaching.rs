use crate::calc;
use crate::entity::{EntityKind, Record};
use crate::ipc::handlers::courses::routed;
use crate::ipc::helpers::{
    data, get_object, get_optional_str, get_optional_value, get_required_str, get_required_value,
    records_value, require_store, respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::repo::{Filter, Repository};
use serde_json::{json, Value};

fn assignments_create(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let data = get_object(params, "data")?;
    Ok(routed(state.facade.create_assignment(store, data)?))
}

fn marks_post(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let data = get_object(params, "data")?;
    Ok(routed(state.facade.post_marks(store, data)?))
}

/// Marks for one student in one semester.
fn marks_results(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let student_id = get_required_str(params, "studentId")?;
    let semester = get_required_value(params, "semester")?;
    let filter: Filter = vec![
        ("studentId".to_string(), Value::String(student_id)),
        ("semester".to_string(), semester),
    ];
    let marks = Repository::new(store, EntityKind::Mark).list(&filter)?;
    Ok(data(records_value(marks)))
}

fn marks_cgpa(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let student_id = get_required_str(params, "studentId")?;
    let marks = Repository::new(store, EntityKind::Mark).load()?;
    Ok(data(json!(calc::grade_summary(&marks, &student_id))))
}

fn attendance_mark(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let data = get_object(params, "data")?;
    Ok(routed(state.facade.mark_attendance(store, data)?))
}

fn attendance_mark_batch(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let entries = params
        .get("entries")
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerErr::bad_params("missing entries"))?;
    let mut partials: Vec<Record> = Vec::with_capacity(entries.len());
    for (i, e) in entries.iter().enumerate() {
        let Some(obj) = e.as_object() else {
            return Err(HandlerErr {
                code: "bad_params",
                message: "entries must be objects".to_string(),
                details: Some(json!({ "index": i })),
            });
        };
        partials.push(obj.clone());
    }
    let created = Repository::new(store, EntityKind::Attendance).create_many(partials)?;
    let message = format!("Attendance marked for {} students", created.len());
    Ok(json!({ "data": records_value(created), "message": message }))
}

fn attendance_student(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let student_id = get_required_str(params, "studentId")?;
    let course_id = get_optional_str(params, "courseId");
    Ok(routed(state.facade.student_attendance(
        store,
        &student_id,
        course_id.as_deref(),
    )?))
}

fn attendance_by_semester(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let student_id = get_required_str(params, "studentId")?;
    let semester = get_required_value(params, "semester")?;
    let all = Repository::new(store, EntityKind::Attendance).load()?;
    Ok(data(json!(calc::attendance_by_semester(&all, &student_id, &semester))))
}

fn attendance_by_course_semester(
    state: &mut AppState,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let student_id = get_required_str(params, "studentId")?;
    let course_id = get_required_str(params, "courseId")?;
    let semester = get_required_value(params, "semester")?;
    let all = Repository::new(store, EntityKind::Attendance).load()?;
    Ok(data(json!(calc::attendance_by_course_semester(
        &all,
        &student_id,
        &course_id,
        &semester
    ))))
}

fn attendance_summary(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let course_id = get_required_str(params, "courseId")?;
    let semester = get_optional_value(params, "semester");
    let all = Repository::new(store, EntityKind::Attendance).load()?;
    Ok(data(json!(calc::class_attendance_summary(
        &all,
        &course_id,
        semester.as_ref()
    ))))
}

fn attendance_report(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = require_store(&state.store)?;
    let student_id = get_required_str(params, "studentId")?;
    let all = Repository::new(store, EntityKind::Attendance).load()?;
    Ok(data(json!(calc::attendance_report(&all, &student_id))))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assignments.create" => assignments_create(state, &req.params),
        "marks.post" => marks_post(state, &req.params),
        "marks.results" => marks_results(state, &req.params),
        "marks.cgpa" => marks_cgpa(state, &req.params),
        "attendance.mark" => attendance_mark(state, &req.params),
        "attendance.markBatch" => attendance_mark_batch(state, &req.params),
        "attendance.student" => attendance_student(state, &req.params),
        "attendance.bySemester" => attendance_by_semester(state, &req.params),
        "attendance.byCourseSemester" => attendance_by_course_semester(state, &req.params),
        "attendance.summary" => attendance_summary(state, &req.params),
        "attendance.report" => attendance_report(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
