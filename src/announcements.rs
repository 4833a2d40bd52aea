//! Announcement board.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;

use crate::auth::require_role;
use crate::db;
use crate::error::{Error, Result};
use crate::model::{Announcement, Principal, Priority, Role, TargetAudience, UserRef};

const ANNOUNCEMENT_COLUMNS: &str = "n.id, n.title, n.content, n.priority, n.target_audience, \
     n.club_name, n.created_by, n.is_active, n.expiry_date, n.created_at, n.updated_at";

fn announcement_from_row(r: &Row<'_>) -> rusqlite::Result<Announcement> {
    let priority: String = r.get(3)?;
    let audience: String = r.get(4)?;
    Ok(Announcement {
        id: r.get(0)?,
        title: r.get(1)?,
        content: r.get(2)?,
        priority: Priority::parse(&priority).unwrap_or(Priority::Medium),
        target_audience: TargetAudience::parse(&audience).unwrap_or(TargetAudience::All),
        club_name: r.get(5)?,
        created_by: r.get(6)?,
        is_active: db::bool_col(r.get(7)?),
        expiry_date: r.get(8)?,
        created_at: r.get(9)?,
        updated_at: r.get(10)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub priority: Priority,
    pub target_audience: TargetAudience,
    pub club_name: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Outer `None` leaves a field alone; `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct AnnouncementPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub priority: Option<Priority>,
    pub target_audience: Option<TargetAudience>,
    pub club_name: Option<Option<String>>,
    pub expiry_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default)]
pub struct AnnouncementFilter {
    pub priority: Option<Priority>,
    pub club_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementView {
    #[serde(flatten)]
    pub announcement: Announcement,
    pub creator: UserRef,
}

fn view_from_row(r: &Row<'_>) -> rusqlite::Result<AnnouncementView> {
    Ok(AnnouncementView {
        announcement: announcement_from_row(r)?,
        creator: UserRef {
            id: r.get(11)?,
            name: r.get(12)?,
            email: r.get(13)?,
        },
    })
}

fn trimmed(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn create(
    conn: &Connection,
    principal: &Principal,
    new: &NewAnnouncement,
    now: DateTime<Utc>,
) -> Result<Announcement> {
    require_role(principal, Role::Teacher)?;
    let stamp = db::ts(now);
    let announcement = Announcement {
        id: db::new_id(),
        title: new.title.trim().to_string(),
        content: new.content.trim().to_string(),
        priority: new.priority,
        target_audience: new.target_audience,
        club_name: trimmed(&new.club_name),
        created_by: principal.id.clone(),
        is_active: true,
        expiry_date: new.expiry_date.map(db::ts),
        created_at: stamp.clone(),
        updated_at: stamp,
    };
    conn.execute(
        "INSERT INTO announcements(id, title, content, priority, target_audience, club_name,
            created_by, is_active, expiry_date, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)",
        params![
            announcement.id,
            announcement.title,
            announcement.content,
            announcement.priority.as_str(),
            announcement.target_audience.as_str(),
            announcement.club_name,
            announcement.created_by,
            announcement.expiry_date,
            announcement.created_at,
            announcement.updated_at,
        ],
    )?;
    info!(announcement_id = %announcement.id, teacher_id = %principal.id, "announcement created");
    Ok(announcement)
}

fn find(conn: &Connection, announcement_id: &str) -> Result<Option<Announcement>> {
    Ok(conn
        .query_row(
            &format!("SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements n WHERE n.id = ?"),
            [announcement_id],
            announcement_from_row,
        )
        .optional()?)
}

/// Single lookup by id. Unlike the listing, this does not hide expired or
/// inactive announcements.
pub fn get_view(conn: &Connection, announcement_id: &str) -> Result<AnnouncementView> {
    conn.query_row(
        &format!(
            "SELECT {ANNOUNCEMENT_COLUMNS}, u.id, u.name, u.email
             FROM announcements n JOIN users u ON u.id = n.created_by
             WHERE n.id = ?"
        ),
        [announcement_id],
        view_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("Announcement not found"))
}

/// Active announcements that have not expired as of `now`, newest first.
pub fn list(
    conn: &Connection,
    filter: &AnnouncementFilter,
    now: DateTime<Utc>,
) -> Result<Vec<AnnouncementView>> {
    let mut sql = format!(
        "SELECT {ANNOUNCEMENT_COLUMNS}, u.id, u.name, u.email
         FROM announcements n JOIN users u ON u.id = n.created_by
         WHERE n.is_active = 1 AND (n.expiry_date IS NULL OR n.expiry_date >= ?)"
    );
    let mut values: Vec<Value> = vec![Value::Text(db::ts(now))];
    if let Some(p) = filter.priority {
        sql.push_str(" AND n.priority = ?");
        values.push(Value::Text(p.as_str().to_string()));
    }
    if let Some(club) = &filter.club_name {
        sql.push_str(" AND n.club_name = ?");
        values.push(Value::Text(club.clone()));
    }
    sql.push_str(" ORDER BY n.created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), view_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn owned(
    conn: &Connection,
    principal: &Principal,
    announcement_id: &str,
    verb: &str,
) -> Result<Announcement> {
    require_role(principal, Role::Teacher)?;
    let announcement =
        find(conn, announcement_id)?.ok_or_else(|| Error::not_found("Announcement not found"))?;
    if announcement.created_by != principal.id {
        return Err(Error::forbidden(format!(
            "Not authorized to {verb} this announcement"
        )));
    }
    Ok(announcement)
}

pub fn update(
    conn: &Connection,
    principal: &Principal,
    announcement_id: &str,
    patch: &AnnouncementPatch,
    now: DateTime<Utc>,
) -> Result<Announcement> {
    let mut n = owned(conn, principal, announcement_id, "update")?;
    if let Some(v) = &patch.title {
        n.title = v.trim().to_string();
    }
    if let Some(v) = &patch.content {
        n.content = v.trim().to_string();
    }
    if let Some(v) = patch.priority {
        n.priority = v;
    }
    if let Some(v) = patch.target_audience {
        n.target_audience = v;
    }
    if let Some(v) = &patch.club_name {
        n.club_name = trimmed(v);
    }
    if let Some(v) = patch.expiry_date {
        n.expiry_date = v.map(db::ts);
    }
    n.updated_at = db::ts(now);

    conn.execute(
        "UPDATE announcements
         SET title = ?, content = ?, priority = ?, target_audience = ?, club_name = ?,
             expiry_date = ?, updated_at = ?
         WHERE id = ?",
        params![
            n.title,
            n.content,
            n.priority.as_str(),
            n.target_audience.as_str(),
            n.club_name,
            n.expiry_date,
            n.updated_at,
            n.id,
        ],
    )?;
    Ok(n)
}

pub fn delete(conn: &Connection, principal: &Principal, announcement_id: &str) -> Result<()> {
    let n = owned(conn, principal, announcement_id, "delete")?;
    conn.execute("DELETE FROM announcements WHERE id = ?", [&n.id])?;
    info!(announcement_id = %n.id, teacher_id = %principal.id, "announcement deleted");
    Ok(())
}
