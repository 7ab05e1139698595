use serde_json::{json, Value};

pub type Record = serde_json::Map<String, Value>;

pub const SESSION_KEY: &str = "uniERPUser";
pub const REMEMBER_KEY: &str = "uniERPRemember";
pub const SETTINGS_KEY: &str = "erp_settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Student,
    Faculty,
    Course,
    Transaction,
    Borrowing,
    User,
    Assignment,
    Mark,
    Attendance,
    Announcement,
    Submission,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Student,
        EntityKind::Faculty,
        EntityKind::Course,
        EntityKind::Transaction,
        EntityKind::Borrowing,
        EntityKind::User,
        EntityKind::Assignment,
        EntityKind::Mark,
        EntityKind::Attendance,
        EntityKind::Announcement,
        EntityKind::Submission,
    ];

    pub fn storage_key(self) -> &'static str {
        match self {
            EntityKind::Student => "erp_students",
            EntityKind::Faculty => "erp_faculty",
            EntityKind::Course => "erp_courses",
            EntityKind::Transaction => "erp_transactions",
            EntityKind::Borrowing => "erp_borrowings",
            EntityKind::User => "erp_users",
            EntityKind::Assignment => "erp_assignments",
            EntityKind::Mark => "erp_student_marks",
            EntityKind::Attendance => "erp_attendance",
            EntityKind::Announcement => "erp_announcements",
            EntityKind::Submission => "erp_submissions",
        }
    }

    /// Used in "<label> not found" messages.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Student => "Student",
            EntityKind::Faculty => "Faculty member",
            EntityKind::Course => "Course",
            EntityKind::Transaction => "Transaction",
            EntityKind::Borrowing => "Borrowing record",
            EntityKind::User => "User",
            EntityKind::Assignment => "Assignment",
            EntityKind::Mark => "Mark",
            EntityKind::Attendance => "Attendance record",
            EntityKind::Announcement => "Announcement",
            EntityKind::Submission => "Submission",
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::Student => "S-",
            EntityKind::Faculty => "F-",
            EntityKind::Course => "C-",
            EntityKind::Transaction => "TXN-",
            EntityKind::Borrowing => "BOR-",
            EntityKind::User => "USR-",
            EntityKind::Assignment => "ASG-",
            EntityKind::Mark => "MRK-",
            EntityKind::Attendance => "ATT-",
            EntityKind::Announcement => "ANN-",
            EntityKind::Submission => "SUB-",
        }
    }

    /// IPC namespace, e.g. `students` in `students.list`.
    pub fn namespace(self) -> &'static str {
        match self {
            EntityKind::Student => "students",
            EntityKind::Faculty => "faculty",
            EntityKind::Course => "courses",
            EntityKind::Transaction => "transactions",
            EntityKind::Borrowing => "borrowings",
            EntityKind::User => "users",
            EntityKind::Assignment => "assignments",
            EntityKind::Mark => "marks",
            EntityKind::Attendance => "attendance",
            EntityKind::Announcement => "announcements",
            EntityKind::Submission => "submissions",
        }
    }

    pub fn from_namespace(ns: &str) -> Option<EntityKind> {
        EntityKind::ALL.into_iter().find(|k| k.namespace() == ns)
    }

    /// Records written when a workspace is opened and the key is absent.
    pub fn seed_records(self, now: &str) -> Vec<Value> {
        match self {
            EntityKind::User => vec![
                json!({ "id": "USR001", "username": "admin", "fullName": "System Administrator", "role": "Administrator", "lastLogin": "2023-10-15 09:42", "status": "Active", "email": "admin@university.edu", "createdAt": now }),
                json!({ "id": "USR002", "username": "jsmith", "fullName": "John Smith", "role": "Faculty", "lastLogin": "2023-10-14 14:20", "status": "Active", "email": "jsmith@university.edu", "createdAt": now }),
                json!({ "id": "USR003", "username": "ljohnson", "fullName": "Lisa Johnson", "role": "Registrar", "lastLogin": "2023-10-15 08:15", "status": "Active", "email": "ljohnson@university.edu", "createdAt": now }),
            ],
            EntityKind::Student => vec![
                json!({ "id": "S2023001", "name": "John Smith", "grade": "Grade 10A", "enrollmentDate": "2023-08-15", "status": "Active", "email": "john.smith@student.edu", "phone": "123-456-7890", "address": "123 Main St, City, State", "dob": "2005-03-15", "createdAt": now }),
                json!({ "id": "S2023002", "name": "Emily Johnson", "grade": "Grade 11B", "enrollmentDate": "2023-08-15", "status": "Active", "email": "emily.johnson@student.edu", "phone": "123-456-7891", "address": "456 Oak St, City, State", "dob": "2004-07-22", "createdAt": now }),
                json!({ "id": "S2023003", "name": "Michael Brown", "grade": "Grade 9C", "enrollmentDate": "2023-08-16", "status": "Probation", "email": "michael.brown@student.edu", "phone": "123-456-7892", "address": "789 Pine St, City, State", "dob": "2006-11-05", "createdAt": now }),
            ],
            EntityKind::Faculty => vec![
                json!({ "id": "F2023001", "name": "Dr. Robert Miller", "department": "Mathematics", "position": "Professor", "email": "robert.m@unierp.edu", "phone": "123-456-7801", "qualification": "Ph.D. in Mathematics", "status": "Active", "createdAt": now }),
                json!({ "id": "F2023002", "name": "Prof. Jennifer Lee", "department": "Science", "position": "Associate Professor", "email": "jennifer.l@unierp.edu", "phone": "123-456-7802", "qualification": "Ph.D. in Physics", "status": "Active", "createdAt": now }),
                json!({ "id": "F2023003", "name": "Dr. Samuel Wilson", "department": "Computer Science", "position": "Assistant Professor", "email": "samuel.w@unierp.edu", "phone": "123-456-7803", "qualification": "Ph.D. in Computer Science", "status": "On Leave", "createdAt": now }),
            ],
            EntityKind::Transaction => vec![
                json!({ "id": "TXN2023001", "student": "John Smith", "studentId": "S2023001", "type": "Tuition Fee", "amount": 1200, "date": "2023-10-15", "status": "Paid", "description": "Semester 1 Tuition", "createdAt": now }),
                json!({ "id": "TXN2023002", "student": "Emily Johnson", "studentId": "S2023002", "type": "Library Fine", "amount": 25, "date": "2023-10-14", "status": "Pending", "description": "Library Late Fee", "createdAt": now }),
                json!({ "id": "TXN2023003", "student": "Michael Brown", "studentId": "S2023003", "type": "Tuition Fee", "amount": 1200, "date": "2023-10-10", "status": "Overdue", "description": "Semester 1 Tuition", "createdAt": now }),
            ],
            _ => Vec::new(),
        }
    }
}

pub fn default_settings() -> Value {
    json!({
        "institutionName": "UniERP University",
        "academicYear": "2023-2024",
        "gradeScale": "Percentage (0-100%)",
        "dateFormat": "MM/DD/YYYY"
    })
}

pub fn str_field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(|v| v.as_str())
}

/// Loose equality used by filters: `"1"` matches `1`, otherwise exact JSON
/// equality.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.trim() == n.to_string()
        }
        _ => false,
    }
}

/// Grouping key for a loosely typed field value.
pub fn key_string(v: Option<&Value>) -> Option<String> {
    match v {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}
