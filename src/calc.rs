use crate::entity::{key_string, loosely_equal, str_field, Record};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Records without a semester are reported under this key.
pub const UNSPECIFIED_SEMESTER: &str = "unspecified";

/// Two-decimal rounding used for every percentage and grade figure.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Present over total as a percentage; zero records is a defined 0, not NaN.
pub fn attendance_percentage(present: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_2_decimals(present as f64 / total as f64 * 100.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub present: usize,
    pub absent: usize,
    pub total: usize,
}

impl Tally {
    pub fn add(&mut self, rec: &Record) {
        self.total += 1;
        if is_present(rec) {
            self.present += 1;
        } else {
            self.absent += 1;
        }
    }

    pub fn percentage(&self) -> f64 {
        attendance_percentage(self.present, self.total)
    }
}

fn is_present(rec: &Record) -> bool {
    str_field(rec, "status")
        .map(|s| s.trim().eq_ignore_ascii_case("present"))
        .unwrap_or(false)
}

pub fn tally<'a, I>(records: I) -> Tally
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut t = Tally::default();
    for r in records {
        t.add(r);
    }
    t
}

fn field_matches(rec: &Record, field: &str, want: &Value) -> bool {
    rec.get(field).map(|v| loosely_equal(v, want)).unwrap_or(false)
}

fn field_is(rec: &Record, field: &str, want: &str) -> bool {
    field_matches(rec, field, &Value::String(want.to_string()))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendance {
    pub attendance: Vec<Record>,
    pub present_count: usize,
    pub absent_count: usize,
    pub percentage: f64,
    pub total_classes: usize,
}

pub fn student_attendance(
    all: &[Record],
    student_id: &str,
    course_id: Option<&str>,
    semester: Option<&Value>,
) -> StudentAttendance {
    let attendance: Vec<Record> = all
        .iter()
        .filter(|r| field_is(r, "studentId", student_id))
        .filter(|r| course_id.map(|c| field_is(r, "courseId", c)).unwrap_or(true))
        .filter(|r| semester.map(|s| field_matches(r, "semester", s)).unwrap_or(true))
        .cloned()
        .collect();
    let t = tally(&attendance);
    StudentAttendance {
        present_count: t.present,
        absent_count: t.absent,
        percentage: t.percentage(),
        total_classes: t.total,
        attendance,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SemesterAttendance {
    pub semester: Value,
    pub total_classes: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub percentage: f64,
    pub attendance_details: Vec<Record>,
}

pub fn attendance_by_semester(
    all: &[Record],
    student_id: &str,
    semester: &Value,
) -> SemesterAttendance {
    let s = student_attendance(all, student_id, None, Some(semester));
    SemesterAttendance {
        semester: semester.clone(),
        total_classes: s.total_classes,
        present_count: s.present_count,
        absent_count: s.absent_count,
        percentage: s.percentage,
        attendance_details: s.attendance,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseSemesterAttendance {
    pub course_id: String,
    pub semester: Value,
    pub total_classes: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub percentage: f64,
    pub attendance_log: Vec<Record>,
}

pub fn attendance_by_course_semester(
    all: &[Record],
    student_id: &str,
    course_id: &str,
    semester: &Value,
) -> CourseSemesterAttendance {
    let s = student_attendance(all, student_id, Some(course_id), Some(semester));
    CourseSemesterAttendance {
        course_id: course_id.to_string(),
        semester: semester.clone(),
        total_classes: s.total_classes,
        present_count: s.present_count,
        absent_count: s.absent_count,
        percentage: s.percentage,
        attendance_log: s.attendance,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClassAttendanceRow {
    pub present: usize,
    pub absent: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Per-student tallies for one course, keyed by student id.
pub fn class_attendance_summary(
    all: &[Record],
    course_id: &str,
    semester: Option<&Value>,
) -> BTreeMap<String, ClassAttendanceRow> {
    let mut by_student: BTreeMap<String, Tally> = BTreeMap::new();
    for r in all
        .iter()
        .filter(|r| field_is(r, "courseId", course_id))
        .filter(|r| semester.map(|s| field_matches(r, "semester", s)).unwrap_or(true))
    {
        let Some(student_id) = key_string(r.get("studentId")) else {
            continue;
        };
        by_student.entry(student_id).or_default().add(r);
    }
    by_student
        .into_iter()
        .map(|(sid, t)| {
            (
                sid,
                ClassAttendanceRow {
                    present: t.present,
                    absent: t.absent,
                    total: t.total,
                    percentage: t.percentage(),
                },
            )
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SemesterReport {
    pub total_classes: usize,
    pub present: usize,
    pub absent: usize,
    pub percentage: f64,
    pub records: Vec<Record>,
}

/// A student's attendance grouped by semester.
pub fn attendance_report(all: &[Record], student_id: &str) -> BTreeMap<String, SemesterReport> {
    let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for r in all.iter().filter(|r| field_is(r, "studentId", student_id)) {
        let key = key_string(r.get("semester")).unwrap_or_else(|| UNSPECIFIED_SEMESTER.to_string());
        groups.entry(key).or_default().push(r.clone());
    }
    groups
        .into_iter()
        .map(|(sem, records)| {
            let t = tally(&records);
            (
                sem,
                SemesterReport {
                    total_classes: t.total,
                    present: t.present,
                    absent: t.absent,
                    percentage: t.percentage(),
                    records,
                },
            )
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_revenue: f64,
    pub paid: f64,
    pub pending: f64,
    pub overdue: f64,
    pub total_transactions: usize,
    pub paid_transactions: usize,
    pub pending_transactions: usize,
    pub overdue_transactions: usize,
}

/// Non-numeric amounts count as zero; numeric strings are accepted.
pub fn amount_of(rec: &Record) -> f64 {
    match rec.get("amount") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn financial_summary(transactions: &[Record]) -> FinancialSummary {
    let mut s = FinancialSummary {
        total_transactions: transactions.len(),
        ..FinancialSummary::default()
    };
    for t in transactions {
        let amount = amount_of(t);
        s.total_revenue += amount;
        match str_field(t, "status") {
            Some("Paid") => {
                s.paid += amount;
                s.paid_transactions += 1;
            }
            Some("Pending") => {
                s.pending += amount;
                s.pending_transactions += 1;
            }
            Some("Overdue") => {
                s.overdue += amount;
                s.overdue_transactions += 1;
            }
            _ => {}
        }
    }
    s
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummary {
    pub cgpa: f64,
    pub sgpa: f64,
    pub total_marks: f64,
    pub course_count: usize,
}

fn marks_of(rec: &Record) -> f64 {
    match rec.get("marks") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Grade point average on the 4-point scale used by the dashboard:
/// mean mark divided by 25.
pub fn grade_summary(marks: &[Record], student_id: &str) -> GradeSummary {
    let own: Vec<&Record> = marks
        .iter()
        .filter(|m| field_is(m, "studentId", student_id))
        .collect();
    if own.is_empty() {
        return GradeSummary::default();
    }
    let total: f64 = own.iter().map(|m| marks_of(m)).sum();
    let cgpa = round_2_decimals(total / own.len() as f64 / 25.0);
    GradeSummary {
        cgpa,
        sgpa: cgpa,
        total_marks: total,
        course_count: own.len(),
    }
}

pub fn parse_day(s: &str) -> Option<NaiveDate> {
    let t = s.trim();
    let head = t.get(..10).unwrap_or(t);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Due strictly before `today` and not returned. Unparseable due dates never
/// count as overdue.
pub fn overdue_borrowings(borrowings: &[Record], today: NaiveDate) -> Vec<Record> {
    borrowings
        .iter()
        .filter(|b| str_field(b, "status") != Some("Returned"))
        .filter(|b| {
            str_field(b, "dueDate")
                .and_then(parse_day)
                .map(|due| due < today)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    All,
    Students,
    Faculty,
    Courses,
}

impl SearchScope {
    pub fn parse(s: &str) -> Option<SearchScope> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Some(SearchScope::All),
            "students" => Some(SearchScope::Students),
            "faculty" | "teachers" => Some(SearchScope::Faculty),
            "courses" => Some(SearchScope::Courses),
            _ => None,
        }
    }

    pub fn includes(self, other: SearchScope) -> bool {
        self == SearchScope::All || self == other
    }
}

pub fn name_matches(records: &[Record], query: &str) -> Vec<Record> {
    let q = query.to_lowercase();
    records
        .iter()
        .filter(|r| {
            str_field(r, "name")
                .map(|n| n.to_lowercase().contains(&q))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}
