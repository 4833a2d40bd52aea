mod test_support;

use clubd::http::build_router;
use serde_json::{json, Value};
use test_support::workspace;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn send_raw(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (u16, Value) {
    let auth = token.map(|t| format!("Bearer {t}"));
    let payload = body.map(|b| b.to_string()).unwrap_or_default();
    let mut headers = Vec::new();
    if let Some(auth) = auth.as_deref() {
        headers.push(("Authorization", auth));
    }
    if !payload.is_empty() {
        headers.push(("Content-Type", "application/json"));
    }
    send_with_headers(addr, method, path, &headers, &payload).await
}

async fn send_with_headers(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    payload: &str,
) -> (u16, Value) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (name, value) in headers {
        req.push_str(&format!("{name}: {value}\r\n"));
    }
    req.push_str(&format!("Content-Length: {}\r\n\r\n{payload}", payload.len()));
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status");
    let json = serde_json::from_str(body).unwrap_or(Value::Null);
    (status, json)
}

async fn serve(app: axum::Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

#[tokio::test]
async fn routes_map_to_envelopes_and_status_codes() {
    let ws = workspace();
    let addr = serve(build_router(ws.state.clone(), 16 * 1024)).await;

    let (status, body) = send_raw(addr, "GET", "/health", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], json!(true));

    let (status, body) = send_raw(addr, "GET", "/activities", None, None).await;
    assert_eq!(status, 401);
    assert_eq!(body["code"], json!("unauthenticated"));
    assert_eq!(body["message"], json!("Not authorized, no token"));

    let (status, body) = send_raw(addr, "GET", "/activities", Some("bogus"), None).await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], json!("Not authorized, token failed"));

    let (status, body) = send_raw(
        addr,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "T", "email": "t@school.test", "password": "secret1", "role": "teacher" })),
    )
    .await;
    assert_eq!(status, 201, "{body}");
    let teacher = body["data"]["token"].as_str().expect("teacher token").to_string();

    let (status, body) = send_raw(
        addr,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "name": "Sam", "email": "sam@school.test", "password": "secret1",
            "role": "student", "rollNumber": "S001"
        })),
    )
    .await;
    assert_eq!(status, 201, "{body}");
    let student = body["data"]["token"].as_str().expect("student token").to_string();

    let (status, body) = send_raw(
        addr,
        "POST",
        "/activities",
        Some(&teacher),
        Some(json!({
            "title": "Chess Club Meet", "description": "Weekly", "clubName": "Chess Club",
            "date": "2024-05-01", "startTime": "10:00", "endTime": "11:00", "location": "Library"
        })),
    )
    .await;
    assert_eq!(status, 201, "{body}");
    let id = body["data"]["activity"]["id"].as_str().expect("id").to_string();

    let (status, body) = send_raw(
        addr,
        "POST",
        "/attendance/mark",
        Some(&student),
        Some(json!({ "activityId": id })),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], json!("gate_closed"));

    let open = format!("/activities/{id}/attendance/open");
    let (status, _) = send_raw(addr, "PUT", &open, Some(&student), None).await;
    assert_eq!(status, 403);
    let (status, body) = send_raw(addr, "PUT", &open, Some(&teacher), None).await;
    assert_eq!(status, 200, "{body}");

    let (status, _) = send_raw(
        addr,
        "POST",
        "/attendance/mark",
        Some(&student),
        Some(json!({ "activityId": id })),
    )
    .await;
    assert_eq!(status, 201);

    let (status, body) = send_raw(addr, "GET", "/attendance/my-attendance", Some(&student), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["stats"]["attendancePercentage"], json!("100.00"));

    let path = format!("/attendance/activity/{id}");
    let (status, body) = send_raw(addr, "GET", &path, Some(&teacher), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["stats"]["present"], json!(1));

    let (status, body) = send_raw(
        addr,
        "GET",
        "/activities?clubName=Chess%20Club&status=upcoming",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], json!(1));

    let (status, body) = send_raw(addr, "GET", "/activities?status=bogus", Some(&student), None).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], json!("validation_failed"));

    let (status, _) = send_raw(addr, "GET", "/activities/does-not-exist", Some(&teacher), None).await;
    assert_eq!(status, 404);

    let (status, body) = send_raw(addr, "GET", "/no/such/route", None, None).await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], json!("not_found"));
}

#[tokio::test]
async fn bearer_scheme_is_case_insensitive() {
    let ws = workspace();
    let addr = serve(build_router(ws.state.clone(), 16 * 1024)).await;

    let (status, body) = send_raw(
        addr,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "T", "email": "t@school.test", "password": "secret1", "role": "teacher" })),
    )
    .await;
    assert_eq!(status, 201, "{body}");
    let token = body["data"]["token"].as_str().expect("token").to_string();

    for scheme in ["bearer", "BEARER", "Bearer"] {
        let auth = format!("{scheme} {token}");
        let (status, body) =
            send_with_headers(addr, "GET", "/auth/me", &[("Authorization", auth.as_str())], "").await;
        assert_eq!(status, 200, "{scheme}: {body}");
        assert_eq!(body["data"]["user"]["email"], json!("t@school.test"));
    }

    let auth = format!("Basic {token}");
    let (status, body) =
        send_with_headers(addr, "GET", "/auth/me", &[("Authorization", auth.as_str())], "").await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], json!("Not authorized, no token"));

    let (status, _) =
        send_with_headers(addr, "GET", "/auth/me", &[("Authorization", "bearer")], "").await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn unreadable_bodies_get_the_failure_envelope() {
    let ws = workspace();
    let addr = serve(build_router(ws.state.clone(), 64)).await;
    let json_type = ("Content-Type", "application/json");

    let (status, body) =
        send_with_headers(addr, "POST", "/auth/login", &[json_type], "{\"email\": ").await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("bad_json"));
    assert!(body["message"].is_string());

    let (status, body) = send_with_headers(
        addr,
        "POST",
        "/auth/login",
        &[("Content-Type", "text/plain")],
        "{}",
    )
    .await;
    assert_eq!(status, 415);
    assert_eq!(body["code"], json!("unsupported_media_type"));

    let (status, body) = send_with_headers(addr, "POST", "/auth/login", &[], "{}").await;
    assert_eq!(status, 415);
    assert_eq!(body["code"], json!("unsupported_media_type"));

    let big = json!({ "email": "x".repeat(200), "password": "secret1" }).to_string();
    let (status, body) = send_with_headers(addr, "POST", "/auth/login", &[json_type], &big).await;
    assert_eq!(status, 413);
    assert_eq!(body["code"], json!("payload_too_large"));

    let (status, body) = send_with_headers(addr, "POST", "/auth/login", &[json_type], "{}").await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], json!("validation_failed"));
}
