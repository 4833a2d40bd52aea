use serde_json::json;

use crate::api::error::{fail, ok, to_json};
use crate::api::params::{opt_i64, opt_raw_str, opt_str};
use crate::api::types::{Ctx, Reply, Request};
use crate::auth::{self, LoginInput, RegisterInput};
use crate::error::{Error, Result};
use crate::model::{Principal, User};

fn session_data(user: &User, token: &str) -> Result<serde_json::Value> {
    Ok(json!({ "user": to_json(user)?, "token": token }))
}

fn handle_register(ctx: &Ctx<'_>, req: &Request) -> Result<Reply> {
    let p = &req.params;
    let input = RegisterInput {
        name: opt_str(p, "name")?,
        email: opt_str(p, "email")?,
        password: opt_raw_str(p, "password")?,
        role: opt_str(p, "role")?,
        roll_number: opt_str(p, "rollNumber")?,
        department: opt_str(p, "department")?,
        year: opt_i64(p, "year")?,
    };
    let (user, token) = auth::register(ctx.conn, &input, ctx.now, ctx.token_ttl)?;
    Ok(ok(
        201,
        Some("User registered successfully"),
        Some(session_data(&user, &token)?),
    ))
}

fn handle_login(ctx: &Ctx<'_>, req: &Request) -> Result<Reply> {
    let p = &req.params;
    let input = LoginInput {
        email: opt_str(p, "email")?,
        roll_number: opt_str(p, "rollNumber")?,
        password: opt_raw_str(p, "password")?,
    };
    let (user, token) = auth::login(ctx.conn, &input, ctx.now, ctx.token_ttl)?;
    Ok(ok(
        200,
        Some("Login successful"),
        Some(session_data(&user, &token)?),
    ))
}

fn handle_me(ctx: &Ctx<'_>, principal: &Principal) -> Result<Reply> {
    let user = auth::get_user(ctx.conn, &principal.id)?
        .ok_or_else(|| Error::unauthenticated("User no longer exists"))?;
    Ok(ok(200, None, Some(json!({ "user": to_json(&user)? }))))
}

/// Methods reachable without a bearer token.
pub fn try_handle_public(ctx: &Ctx<'_>, req: &Request) -> Option<Reply> {
    let result = match req.method.as_str() {
        "auth.register" => handle_register(ctx, req),
        "auth.login" => handle_login(ctx, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| fail(&req.method, &e)))
}

pub fn try_handle(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Option<Reply> {
    let result = match req.method.as_str() {
        "auth.me" => handle_me(ctx, principal),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| fail(&req.method, &e)))
}
