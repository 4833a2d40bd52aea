use serde_json::json;

use crate::api::error::{fail, ok, to_json};
use crate::api::params::{opt_str, required_id};
use crate::api::types::{Ctx, Reply, Request};
use crate::attendance;
use crate::auth::require_role;
use crate::error::{Error, Result};
use crate::model::{Principal, Role};

fn handle_mark(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Result<Reply> {
    let activity_id = opt_str(&req.params, "activityId")?
        .ok_or_else(|| Error::validation("Activity ID is required"))?;
    let record = attendance::mark(ctx.conn, principal, &activity_id, ctx.now)?;
    Ok(ok(
        201,
        Some("Attendance marked successfully"),
        Some(json!({ "attendance": to_json(&record)? })),
    ))
}

fn handle_mine(ctx: &Ctx<'_>, principal: &Principal) -> Result<Reply> {
    let view = attendance::my_attendance(ctx.conn, principal, ctx.now)?;
    Ok(ok(200, None, Some(to_json(&view)?)))
}

fn handle_for_activity(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Result<Reply> {
    let activity_id = required_id(&req.params, "activityId")?;
    let view = attendance::activity_attendance(ctx.conn, principal, &activity_id)?;
    Ok(ok(200, None, Some(to_json(&view)?)))
}

fn handle_for_student(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Result<Reply> {
    let student_id = required_id(&req.params, "studentId")?;
    let view = attendance::student_attendance(ctx.conn, principal, &student_id, ctx.now)?;
    Ok(ok(200, None, Some(to_json(&view)?)))
}

fn handle_report(ctx: &Ctx<'_>, principal: &Principal) -> Result<Reply> {
    let report = attendance::report(ctx.conn, principal)?;
    Ok(ok(200, None, Some(to_json(&report)?)))
}

pub fn try_handle(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Option<Reply> {
    let student = || require_role(principal, Role::Student);
    let teacher = || require_role(principal, Role::Teacher);
    let result = match req.method.as_str() {
        "attendance.mark" => student().and_then(|_| handle_mark(ctx, principal, req)),
        "attendance.mine" => student().and_then(|_| handle_mine(ctx, principal)),
        "attendance.forActivity" => {
            teacher().and_then(|_| handle_for_activity(ctx, principal, req))
        }
        "attendance.forStudent" => teacher().and_then(|_| handle_for_student(ctx, principal, req)),
        "attendance.report" => teacher().and_then(|_| handle_report(ctx, principal)),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| fail(&req.method, &e)))
}
