use chrono::Utc;

use super::error::{err, fail};
use super::handlers;
use super::types::{AppState, Ctx, Reply, Request};
use crate::auth;
use crate::error::Error;

/// Runs one request to completion on a fresh connection. Public methods are
/// tried first; everything else requires a valid bearer token, checked
/// before any handler sees the request.
pub fn handle_request(state: &AppState, req: Request) -> Reply {
    let conn = match state.connect() {
        Ok(c) => c,
        Err(e) => return fail(&req.method, &Error::from(e)),
    };
    let ctx = Ctx {
        conn: &conn,
        now: Utc::now(),
        token_ttl: state.token_ttl,
    };

    if let Some(resp) = handlers::core::try_handle(&ctx, &req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle_public(&ctx, &req) {
        return resp;
    }

    let principal = match auth::resolve_token(&conn, req.token.as_deref(), ctx.now) {
        Ok(p) => p,
        Err(e) => return fail(&req.method, &e),
    };

    if let Some(resp) = handlers::auth::try_handle(&ctx, &principal, &req) {
        return resp;
    }
    if let Some(resp) = handlers::activities::try_handle(&ctx, &principal, &req) {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(&ctx, &principal, &req) {
        return resp;
    }
    if let Some(resp) = handlers::announcements::try_handle(&ctx, &principal, &req) {
        return resp;
    }

    err(
        404,
        "not_implemented",
        format!("unknown method: {}", req.method),
    )
}
