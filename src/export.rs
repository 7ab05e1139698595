use crate::calc::SemesterReport;
use crate::entity::{key_string, str_field};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const CSV_MIME: &str = "text/csv";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CsvFile {
    pub file_name: String,
    pub mime_type: String,
    pub file_content: String,
}

/// RFC 4180 field quoting. Surrounding whitespace is quoted too so
/// spreadsheet imports keep it.
pub fn csv_quote(s: &str) -> String {
    let needs_quotes = s.contains(',')
        || s.contains('"')
        || s.contains('\n')
        || s.contains('\r')
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace);
    if needs_quotes {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn csv_document<R, F>(header: &[&str], rows: R) -> String
where
    R: IntoIterator<Item = Vec<F>>,
    F: AsRef<str>,
{
    let mut out = String::new();
    push_row(&mut out, header.iter().copied());
    for row in rows {
        push_row(&mut out, row.iter().map(|f| AsRef::<str>::as_ref(f)));
    }
    out
}

fn push_row<'a, I>(out: &mut String, fields: I)
where
    I: Iterator<Item = &'a str>,
{
    let line: Vec<String> = fields.map(csv_quote).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

fn cell(v: Option<&Value>) -> String {
    key_string(v).unwrap_or_default()
}

/// Flattens `scheduleData: [{time, events: [{day, course, room, instructor}]}]`
/// into one row per event.
pub fn schedule_csv(student: &str, payload: &Value) -> CsvFile {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let slots = payload
        .get("scheduleData")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    for slot in &slots {
        let time = cell(slot.get("time"));
        let events = slot
            .get("events")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for ev in &events {
            rows.push(vec![
                time.clone(),
                cell(ev.get("day")),
                cell(ev.get("course")),
                cell(ev.get("room")),
                cell(ev.get("instructor")),
            ]);
        }
    }
    CsvFile {
        file_name: format!("{}-schedule.csv", student),
        mime_type: CSV_MIME.to_string(),
        file_content: csv_document(&["Time", "Day", "Course", "Room", "Instructor"], rows),
    }
}

pub fn attendance_report_csv(
    student_id: &str,
    report: &BTreeMap<String, SemesterReport>,
) -> CsvFile {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (semester, entry) in report {
        for r in &entry.records {
            rows.push(vec![
                semester.clone(),
                str_field(r, "date").unwrap_or("").to_string(),
                cell(r.get("courseId")),
                str_field(r, "status").unwrap_or("").to_string(),
            ]);
        }
    }
    CsvFile {
        file_name: format!("{}-attendance.csv", student_id),
        mime_type: CSV_MIME.to_string(),
        file_content: csv_document(&["Semester", "Date", "Course", "Status"], rows),
    }
}
