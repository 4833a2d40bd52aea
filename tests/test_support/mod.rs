#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use clubd::activities::{self, NewActivity};
use clubd::api::{self, AppState};
use clubd::auth::{self, RegisterInput};
use clubd::config::Config;
use clubd::db;
use clubd::model::{Activity, ActivityStatus, Capacity, Principal};
use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::TempDir;

pub struct Workspace {
    pub dir: TempDir,
    pub state: AppState,
}

impl Workspace {
    pub fn conn(&self) -> Connection {
        self.state.connect().expect("connect")
    }
}

pub fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("clubd.sqlite3");
    db::open_db(&db_path).expect("open db");
    let config = Config {
        db_path,
        ..Config::default()
    };
    Workspace {
        state: AppState::new(&config),
        dir,
    }
}

pub fn ttl() -> Duration {
    Duration::hours(1)
}

pub fn teacher(conn: &Connection, name: &str, email: &str) -> Principal {
    let input = RegisterInput {
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        password: Some("secret1".to_string()),
        role: Some("teacher".to_string()),
        ..RegisterInput::default()
    };
    let (user, _) = auth::register(conn, &input, Utc::now(), ttl()).expect("register teacher");
    user.principal()
}

pub fn student(conn: &Connection, name: &str, email: &str, roll: &str) -> Principal {
    let input = RegisterInput {
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        password: Some("secret1".to_string()),
        role: Some("student".to_string()),
        roll_number: Some(roll.to_string()),
        department: Some("CS".to_string()),
        year: Some(2),
    };
    let (user, _) = auth::register(conn, &input, Utc::now(), ttl()).expect("register student");
    user.principal()
}

pub fn new_activity(title: &str, date: NaiveDate) -> NewActivity {
    NewActivity {
        title: title.to_string(),
        description: format!("{title} session"),
        club_name: "Chess Club".to_string(),
        date,
        start_time: NaiveTime::from_hms_opt(10, 0, 0).expect("time"),
        end_time: NaiveTime::from_hms_opt(12, 0, 0).expect("time"),
        location: "Room 101".to_string(),
        max_capacity: Capacity::Unlimited,
        status: ActivityStatus::Upcoming,
    }
}

/// Creates an activity dated `days_ago` days in the past (negative for future).
pub fn activity(conn: &Connection, owner: &Principal, title: &str, days_ago: i64) -> Activity {
    let date = (Utc::now() - Duration::days(days_ago)).date_naive();
    activities::create(conn, owner, &new_activity(title, date), Utc::now()).expect("create activity")
}

pub fn open_activity(conn: &Connection, owner: &Principal, title: &str, days_ago: i64) -> Activity {
    let a = activity(conn, owner, title, days_ago);
    activities::open_gate(conn, owner, &a.id, Utc::now()).expect("open gate")
}

/// Dispatches one request through the same entry point the transports use.
pub fn call(state: &AppState, method: &str, token: Option<&str>, params: Value) -> api::Reply {
    api::handle_request(
        state,
        api::Request::new(method, token.map(str::to_string), params),
    )
}

pub fn call_ok(state: &AppState, method: &str, token: Option<&str>, params: Value) -> Value {
    let reply = call(state, method, token, params);
    assert!(
        reply.status < 300,
        "{method} failed: {} {}",
        reply.status,
        reply.body
    );
    assert_eq!(reply.body["success"], json!(true), "{method}: {}", reply.body);
    reply.body
}

pub fn assert_err(reply: &api::Reply, status: u16, code: &str) {
    assert_eq!(reply.status, status, "unexpected reply: {}", reply.body);
    assert_eq!(reply.body["success"], json!(false));
    assert_eq!(reply.body["code"], json!(code), "unexpected reply: {}", reply.body);
}

/// Registers through the dispatcher and returns the bearer token.
pub fn register_token(state: &AppState, params: Value) -> String {
    let body = call_ok(state, "auth.register", None, params);
    body["data"]["token"]
        .as_str()
        .expect("token in register reply")
        .to_string()
}

pub fn spawn_sidecar(db_path: &Path) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_clubd");
    let mut child = Command::new(exe)
        .arg("--stdio")
        .env("CLUBD_DB_PATH", db_path)
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn clubd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    token: Option<&str>,
    params: Value,
) -> Value {
    let payload = json!({
        "id": id,
        "method": method,
        "token": token,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}
