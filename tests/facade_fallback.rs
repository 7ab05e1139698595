use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

// Nothing listens on the discard port, so connections are refused quickly.
const UNREACHABLE_API: &str = "http://127.0.0.1:9/api";

fn spawn_sidecar(api_base: &str, warn_policy: &str) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_unierpd");
    let mut child = Command::new(exe)
        .env("UNIERP_API_BASE", api_base)
        .env("UNIERP_HTTP_TIMEOUT_MS", "2000")
        .env("UNIERP_WARN_POLICY", warn_policy)
        .env_remove("UNIERP_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn unierpd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

/// Returns the whole response so callers can inspect `notices`.
fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value
}

fn notices(resp: &serde_json::Value) -> usize {
    resp.get("notices")
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0)
}

#[test]
fn unreachable_backend_falls_back_and_warns_once() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar(UNREACHABLE_API, "once");
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "inMemory": true }),
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.create",
        json!({ "data": { "code": "CS999", "name": "Test", "instructor": "Dr. X" } }),
    );
    assert_eq!(first["result"]["source"], json!("local"));
    assert_eq!(first["result"]["data"]["id"], json!("CS999"));
    assert_eq!(notices(&first), 1);
    let text = first["notices"][0].as_str().expect("notice text");
    assert!(text.contains(UNREACHABLE_API), "notice: {}", text);

    let listed = request_ok(&mut stdin, &mut reader, "3", "courses.list", json!({}));
    assert_eq!(notices(&listed), 0);
    let matching = listed["result"]["data"]
        .as_array()
        .expect("courses")
        .iter()
        .filter(|c| c["code"] == json!("CS999"))
        .count();
    assert_eq!(matching, 1);

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "courses.update",
        json!({ "id": "CS999", "patch": { "capacity": 30, "code": "HACK" } }),
    );
    assert_eq!(second["result"]["source"], json!("local"));
    assert_eq!(second["result"]["data"]["code"], json!("CS999"));
    assert_eq!(second["result"]["data"]["capacity"], json!(30));
    assert_eq!(notices(&second), 0);

    let status = request_ok(&mut stdin, &mut reader, "5", "backend.status", json!({}));
    assert_eq!(status["result"]["warned"], json!(true));
    let journal = status["result"]["fallbacks"].as_array().expect("fallbacks");
    assert_eq!(journal.len(), 2);
    assert_eq!(journal[0]["operation"], json!("courses.create"));
    assert_eq!(journal[1]["path"], json!("/admin/courses/update"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn always_policy_warns_on_every_fallback() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar(UNREACHABLE_API, "always");
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "inMemory": true, "seed": false }),
    );
    for id in ["2", "3"] {
        let resp = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "attendance.student",
            json!({ "studentId": "S1" }),
        );
        assert_eq!(resp["result"]["source"], json!("local"));
        assert_eq!(resp["result"]["data"]["percentage"], json!(0.0));
        assert_eq!(notices(&resp), 1);
    }

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn reachable_backend_answers_and_local_store_is_untouched() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/teacher/marks/post")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"MRK-remote","marks":9}"#)
        .create();
    let api = format!("{}/api", server.url());

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&api, "once");
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "inMemory": true, "seed": false }),
    );
    let posted = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.post",
        json!({ "data": { "studentId": "S1", "courseId": "CS101", "type": "quiz", "marks": 9 } }),
    );
    assert_eq!(posted["result"]["source"], json!("remote"));
    assert_eq!(posted["result"]["data"]["id"], json!("MRK-remote"));
    assert_eq!(notices(&posted), 0);
    mock.assert();

    let local = request_ok(&mut stdin, &mut reader, "3", "marks.list", json!({}));
    assert_eq!(local["result"]["data"], json!([]));

    // Switching the remote off routes the same call locally without a notice.
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backend.configure",
        json!({ "apiBase": "off" }),
    );
    let offline = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "marks.post",
        json!({ "data": { "studentId": "S1", "courseId": "CS101", "type": "quiz", "marks": 9 } }),
    );
    assert_eq!(offline["result"]["source"], json!("local"));
    assert_eq!(notices(&offline), 0);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn schedule_export_falls_back_to_local_csv() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar(UNREACHABLE_API, "once");
    let resp = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "schedule.export",
        json!({
            "studentId": "jdoe",
            "payload": { "scheduleData": [
                { "time": "8:00 - 9:30", "events": [
                    { "day": "Monday", "course": "MATH101", "room": "Room 201", "instructor": "Dr. Smith" }
                ]}
            ]}
        }),
    );
    let file = &resp["result"]["data"];
    assert_eq!(resp["result"]["source"], json!("local"));
    assert_eq!(file["fileName"], json!("jdoe-schedule.csv"));
    assert_eq!(file["mimeType"], json!("text/csv"));
    assert_eq!(
        file["fileContent"],
        json!("Time,Day,Course,Room,Instructor\r\n8:00 - 9:30,Monday,MATH101,Room 201,Dr. Smith\r\n")
    );
    assert_eq!(notices(&resp), 1);

    drop(stdin);
    let _ = child.wait();
}
