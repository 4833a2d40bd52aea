use serde_json::{json, Value};

use crate::activities::{self, ActivityFilter, ActivityPatch, NewActivity};
use crate::api::error::{fail, ok, ok_list, to_json};
use crate::api::params::{capacity, opt_i64, opt_str, parse_choice, parse_date, parse_time, required_id};
use crate::api::types::{Ctx, Reply, Request};
use crate::auth::require_role;
use crate::error::{Error, Result};
use crate::model::{ActivityStatus, Capacity, Principal, Role};

fn parse_status(raw: &str) -> Result<ActivityStatus> {
    parse_choice("status", raw, ActivityStatus::parse, ActivityStatus::choices())
}

fn parse_filter(p: &Value) -> Result<ActivityFilter> {
    Ok(ActivityFilter {
        status: opt_str(p, "status")?.as_deref().map(parse_status).transpose()?,
        club_name: opt_str(p, "clubName")?,
        date_from: opt_str(p, "date")?
            .as_deref()
            .map(|d| parse_date("date", d))
            .transpose()?,
    })
}

fn parse_new(p: &Value) -> Result<NewActivity> {
    let (
        Some(title),
        Some(description),
        Some(club_name),
        Some(date),
        Some(start_time),
        Some(end_time),
        Some(location),
    ) = (
        opt_str(p, "title")?,
        opt_str(p, "description")?,
        opt_str(p, "clubName")?,
        opt_str(p, "date")?,
        opt_str(p, "startTime")?,
        opt_str(p, "endTime")?,
        opt_str(p, "location")?,
    )
    else {
        return Err(Error::validation("Please provide all required fields"));
    };

    Ok(NewActivity {
        title,
        description,
        club_name,
        date: parse_date("date", &date)?,
        start_time: parse_time("startTime", &start_time)?,
        end_time: parse_time("endTime", &end_time)?,
        location,
        max_capacity: capacity(opt_i64(p, "maxCapacity")?)?,
        status: match opt_str(p, "status")? {
            Some(s) => parse_status(&s)?,
            None => ActivityStatus::Upcoming,
        },
    })
}

fn parse_patch(p: &Value) -> Result<ActivityPatch> {
    let max_capacity = match p.get("maxCapacity") {
        None => None,
        Some(Value::Null) => Some(Capacity::Unlimited),
        Some(_) => Some(capacity(opt_i64(p, "maxCapacity")?)?),
    };
    Ok(ActivityPatch {
        title: opt_str(p, "title")?,
        description: opt_str(p, "description")?,
        club_name: opt_str(p, "clubName")?,
        date: opt_str(p, "date")?
            .as_deref()
            .map(|d| parse_date("date", d))
            .transpose()?,
        start_time: opt_str(p, "startTime")?
            .as_deref()
            .map(|t| parse_time("startTime", t))
            .transpose()?,
        end_time: opt_str(p, "endTime")?
            .as_deref()
            .map(|t| parse_time("endTime", t))
            .transpose()?,
        location: opt_str(p, "location")?,
        max_capacity,
        status: opt_str(p, "status")?.as_deref().map(parse_status).transpose()?,
    })
}

fn handle_list(ctx: &Ctx<'_>, req: &Request) -> Result<Reply> {
    let filter = parse_filter(&req.params)?;
    let rows = activities::list(ctx.conn, &filter)?;
    Ok(ok_list(rows.len(), json!({ "activities": to_json(&rows)? })))
}

fn handle_get(ctx: &Ctx<'_>, req: &Request) -> Result<Reply> {
    let id = required_id(&req.params, "id")?;
    let view = activities::get_view(ctx.conn, &id)?;
    Ok(ok(200, None, Some(json!({ "activity": to_json(&view)? }))))
}

fn handle_create(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Result<Reply> {
    let new = parse_new(&req.params)?;
    let activity = activities::create(ctx.conn, principal, &new, ctx.now)?;
    Ok(ok(
        201,
        Some("Activity created successfully"),
        Some(json!({ "activity": to_json(&activity)? })),
    ))
}

fn handle_update(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Result<Reply> {
    let id = required_id(&req.params, "id")?;
    let patch = parse_patch(&req.params)?;
    let activity = activities::update(ctx.conn, principal, &id, &patch, ctx.now)?;
    Ok(ok(
        200,
        Some("Activity updated successfully"),
        Some(json!({ "activity": to_json(&activity)? })),
    ))
}

fn handle_delete(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Result<Reply> {
    let id = required_id(&req.params, "id")?;
    activities::delete(ctx.conn, principal, &id)?;
    Ok(ok(200, Some("Activity deleted successfully"), None))
}

fn handle_gate(ctx: &Ctx<'_>, principal: &Principal, req: &Request, open: bool) -> Result<Reply> {
    let id = required_id(&req.params, "id")?;
    let (activity, message) = if open {
        (
            activities::open_gate(ctx.conn, principal, &id, ctx.now)?,
            "Attendance opened successfully",
        )
    } else {
        (
            activities::close_gate(ctx.conn, principal, &id, ctx.now)?,
            "Attendance closed successfully",
        )
    };
    Ok(ok(
        200,
        Some(message),
        Some(json!({ "activity": to_json(&activity)? })),
    ))
}

pub fn try_handle(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Option<Reply> {
    let teacher = || require_role(principal, Role::Teacher);
    let result = match req.method.as_str() {
        "activities.list" => handle_list(ctx, req),
        "activities.get" => handle_get(ctx, req),
        "activities.create" => teacher().and_then(|_| handle_create(ctx, principal, req)),
        "activities.update" => teacher().and_then(|_| handle_update(ctx, principal, req)),
        "activities.delete" => teacher().and_then(|_| handle_delete(ctx, principal, req)),
        "activities.openAttendance" => {
            teacher().and_then(|_| handle_gate(ctx, principal, req, true))
        }
        "activities.closeAttendance" => {
            teacher().and_then(|_| handle_gate(ctx, principal, req, false))
        }
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| fail(&req.method, &e)))
}
