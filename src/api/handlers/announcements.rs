use serde_json::{json, Value};

use crate::announcements::{self, AnnouncementFilter, AnnouncementPatch, NewAnnouncement};
use crate::api::error::{fail, ok, ok_list, to_json};
use crate::api::params::{nullable_str, opt_str, parse_choice, parse_timestamp, required_id};
use crate::api::types::{Ctx, Reply, Request};
use crate::auth::require_role;
use crate::error::{Error, Result};
use crate::model::{Principal, Priority, Role, TargetAudience};

fn parse_priority(raw: &str) -> Result<Priority> {
    parse_choice("priority", raw, Priority::parse, Priority::choices())
}

fn parse_audience(raw: &str) -> Result<TargetAudience> {
    parse_choice(
        "targetAudience",
        raw,
        TargetAudience::parse,
        TargetAudience::choices(),
    )
}

fn parse_expiry(p: &Value) -> Result<Option<Option<chrono::DateTime<chrono::Utc>>>> {
    nullable_str(p, "expiryDate")?
        .map(|v| v.map(|raw| parse_timestamp("expiryDate", &raw)).transpose())
        .transpose()
}

fn parse_new(p: &Value) -> Result<NewAnnouncement> {
    let (Some(title), Some(content)) = (opt_str(p, "title")?, opt_str(p, "content")?) else {
        return Err(Error::validation("Title and content are required"));
    };
    Ok(NewAnnouncement {
        title,
        content,
        priority: opt_str(p, "priority")?
            .as_deref()
            .map(parse_priority)
            .transpose()?
            .unwrap_or(Priority::Medium),
        target_audience: opt_str(p, "targetAudience")?
            .as_deref()
            .map(parse_audience)
            .transpose()?
            .unwrap_or(TargetAudience::All),
        club_name: opt_str(p, "clubName")?,
        expiry_date: parse_expiry(p)?.flatten(),
    })
}

fn parse_patch(p: &Value) -> Result<AnnouncementPatch> {
    Ok(AnnouncementPatch {
        title: opt_str(p, "title")?,
        content: opt_str(p, "content")?,
        priority: opt_str(p, "priority")?.as_deref().map(parse_priority).transpose()?,
        target_audience: opt_str(p, "targetAudience")?
            .as_deref()
            .map(parse_audience)
            .transpose()?,
        club_name: nullable_str(p, "clubName")?,
        expiry_date: parse_expiry(p)?,
    })
}

fn parse_filter(p: &Value) -> Result<AnnouncementFilter> {
    Ok(AnnouncementFilter {
        priority: opt_str(p, "priority")?.as_deref().map(parse_priority).transpose()?,
        club_name: opt_str(p, "clubName")?,
    })
}

fn handle_list(ctx: &Ctx<'_>, req: &Request) -> Result<Reply> {
    let filter = parse_filter(&req.params)?;
    let rows = announcements::list(ctx.conn, &filter, ctx.now)?;
    Ok(ok_list(rows.len(), json!({ "announcements": to_json(&rows)? })))
}

fn handle_get(ctx: &Ctx<'_>, req: &Request) -> Result<Reply> {
    let id = required_id(&req.params, "id")?;
    let view = announcements::get_view(ctx.conn, &id)?;
    Ok(ok(200, None, Some(json!({ "announcement": to_json(&view)? }))))
}

fn handle_create(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Result<Reply> {
    let new = parse_new(&req.params)?;
    let created = announcements::create(ctx.conn, principal, &new, ctx.now)?;
    Ok(ok(
        201,
        Some("Announcement created successfully"),
        Some(json!({ "announcement": to_json(&created)? })),
    ))
}

fn handle_update(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Result<Reply> {
    let id = required_id(&req.params, "id")?;
    let patch = parse_patch(&req.params)?;
    let updated = announcements::update(ctx.conn, principal, &id, &patch, ctx.now)?;
    Ok(ok(
        200,
        Some("Announcement updated successfully"),
        Some(json!({ "announcement": to_json(&updated)? })),
    ))
}

fn handle_delete(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Result<Reply> {
    let id = required_id(&req.params, "id")?;
    announcements::delete(ctx.conn, principal, &id)?;
    Ok(ok(200, Some("Announcement deleted successfully"), None))
}

pub fn try_handle(ctx: &Ctx<'_>, principal: &Principal, req: &Request) -> Option<Reply> {
    let teacher = || require_role(principal, Role::Teacher);
    let result = match req.method.as_str() {
        "announcements.list" => handle_list(ctx, req),
        "announcements.get" => handle_get(ctx, req),
        "announcements.create" => teacher().and_then(|_| handle_create(ctx, principal, req)),
        "announcements.update" => teacher().and_then(|_| handle_update(ctx, principal, req)),
        "announcements.delete" => teacher().and_then(|_| handle_delete(ctx, principal, req)),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| fail(&req.method, &e)))
}
