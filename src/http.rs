//! HTTP surface. Each route turns its path, query and body into an
//! [`api::Request`] and runs it on the blocking pool; status and envelope come
//! straight from the dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::{json, Map, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, warn, Instrument};
use uuid::Uuid;

use crate::api::{self, AppState, Reply};

type Shared = Arc<AppState>;
type JsonBody = Result<Json<Value>, JsonRejection>;

/// Raw bearer credential lifted from the `Authorization` header. Whether it
/// names a live session is decided by the dispatcher.
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(me))
        .route("/activities", get(list_activities).post(create_activity))
        .route(
            "/activities/:id",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
        .route("/activities/:id/attendance/open", put(open_attendance))
        .route("/activities/:id/attendance/close", put(close_attendance))
        .route("/attendance/mark", post(mark_attendance))
        .route("/attendance/my-attendance", get(my_attendance))
        .route("/attendance/activity/:activity_id", get(activity_attendance))
        .route("/attendance/student/:student_id", get(student_attendance))
        .route("/attendance/report", get(attendance_report))
        .route(
            "/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route(
            "/announcements/:id",
            get(get_announcement)
                .put(update_announcement)
                .delete(delete_announcement),
        )
        .layer(middleware::from_fn(require_bearer));

    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .merge(protected)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(request_span))
        .layer(CatchPanicLayer::new())
        .with_state(Arc::new(state))
}

fn into_response(reply: Reply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body)).into_response()
}

fn unauthorized(message: &str) -> Response {
    into_response(Reply {
        status: 401,
        body: json!({ "success": false, "code": "unauthenticated", "message": message }),
    })
}

/// Wraps each request in an `http.request` span and echoes its id back.
async fn request_span(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().simple().to_string();
    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %request.method(),
        route = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = header::HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

pub async fn require_bearer(mut request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|v| v.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let Some(token) = token else {
        return unauthorized("Not authorized, no token");
    };
    request.extensions_mut().insert(BearerToken(token));
    next.run(request).await
}

async fn dispatch(state: Shared, method: &str, token: Option<String>, params: Value) -> Response {
    let req = api::Request::new(method, token, params);
    match tokio::task::spawn_blocking(move || api::handle_request(&state, req)).await {
        Ok(reply) => into_response(reply),
        Err(e) => {
            error!(method, error = %e, "request task failed");
            into_response(Reply {
                status: 500,
                body: json!({ "success": false, "code": "internal", "message": "Server error" }),
            })
        }
    }
}

/// An unreadable body answered in the failure envelope instead of axum's
/// plain-text rejection.
fn rejection_response(rejection: JsonRejection) -> Response {
    let status = rejection.status();
    let code = match status {
        StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "unsupported_media_type",
        _ => "bad_json",
    };
    let message = rejection.body_text();
    warn!(status = status.as_u16(), code, message = %message, "request body rejected");
    into_response(Reply {
        status: status.as_u16(),
        body: json!({ "success": false, "code": code, "message": message }),
    })
}

/// Path parameters layered over the body fields; path wins on a name clash.
fn with_path(body: Value, path: &[(&str, String)]) -> Value {
    let mut obj = match body {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    for (k, v) in path {
        obj.insert((*k).to_string(), Value::String(v.clone()));
    }
    Value::Object(obj)
}

async fn dispatch_body(
    state: Shared,
    method: &str,
    token: Option<String>,
    body: JsonBody,
    path: &[(&str, String)],
) -> Response {
    match body {
        Ok(Json(body)) => dispatch(state, method, token, with_path(body, path)).await,
        Err(rejection) => rejection_response(rejection),
    }
}

fn query_params(query: HashMap<String, String>) -> Value {
    Value::Object(
        query
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}

fn id_param(key: &str, id: String) -> Value {
    with_path(Value::Null, &[(key, id)])
}

async fn route_not_found() -> Response {
    into_response(Reply {
        status: 404,
        body: json!({ "success": false, "code": "not_found", "message": "Route not found" }),
    })
}

async fn health(State(state): State<Shared>) -> Response {
    dispatch(state, "health", None, json!({})).await
}

async fn register(State(state): State<Shared>, body: JsonBody) -> Response {
    dispatch_body(state, "auth.register", None, body, &[]).await
}

async fn login(State(state): State<Shared>, body: JsonBody) -> Response {
    dispatch_body(state, "auth.login", None, body, &[]).await
}

async fn me(State(state): State<Shared>, Extension(BearerToken(token)): Extension<BearerToken>) -> Response {
    dispatch(state, "auth.me", Some(token), json!({})).await
}

async fn list_activities(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    dispatch(state, "activities.list", Some(token), query_params(query)).await
}

async fn get_activity(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<String>,
) -> Response {
    dispatch(state, "activities.get", Some(token), id_param("id", id)).await
}

async fn create_activity(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    body: JsonBody,
) -> Response {
    dispatch_body(state, "activities.create", Some(token), body, &[]).await
}

async fn update_activity(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<String>,
    body: JsonBody,
) -> Response {
    dispatch_body(state, "activities.update", Some(token), body, &[("id", id)]).await
}

async fn delete_activity(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<String>,
) -> Response {
    dispatch(state, "activities.delete", Some(token), id_param("id", id)).await
}

async fn open_attendance(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<String>,
) -> Response {
    dispatch(state, "activities.openAttendance", Some(token), id_param("id", id)).await
}

async fn close_attendance(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<String>,
) -> Response {
    dispatch(state, "activities.closeAttendance", Some(token), id_param("id", id)).await
}

async fn mark_attendance(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    body: JsonBody,
) -> Response {
    dispatch_body(state, "attendance.mark", Some(token), body, &[]).await
}

async fn my_attendance(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Response {
    dispatch(state, "attendance.mine", Some(token), json!({})).await
}

async fn activity_attendance(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(activity_id): Path<String>,
) -> Response {
    let params = id_param("activityId", activity_id);
    dispatch(state, "attendance.forActivity", Some(token), params).await
}

async fn student_attendance(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(student_id): Path<String>,
) -> Response {
    let params = id_param("studentId", student_id);
    dispatch(state, "attendance.forStudent", Some(token), params).await
}

async fn attendance_report(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Response {
    dispatch(state, "attendance.report", Some(token), json!({})).await
}

async fn list_announcements(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    dispatch(state, "announcements.list", Some(token), query_params(query)).await
}

async fn get_announcement(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<String>,
) -> Response {
    dispatch(state, "announcements.get", Some(token), id_param("id", id)).await
}

async fn create_announcement(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    body: JsonBody,
) -> Response {
    dispatch_body(state, "announcements.create", Some(token), body, &[]).await
}

async fn update_announcement(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<String>,
    body: JsonBody,
) -> Response {
    dispatch_body(state, "announcements.update", Some(token), body, &[("id", id)]).await
}

async fn delete_announcement(
    State(state): State<Shared>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<String>,
) -> Response {
    dispatch(state, "announcements.delete", Some(token), id_param("id", id)).await
}
