//! Activity registry and the per-activity attendance gate.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;

use crate::auth::require_role;
use crate::db;
use crate::error::{Error, Result};
use crate::model::{Activity, ActivityStatus, Capacity, Principal, Role, UserRef};

pub(crate) const ACTIVITY_COLUMNS: &str = "a.id, a.title, a.description, a.club_name, a.date, \
     a.start_time, a.end_time, a.location, a.max_capacity, a.attendance_open, \
     a.attendance_open_time, a.attendance_close_time, a.status, a.created_by, \
     a.created_at, a.updated_at";

pub(crate) fn activity_from_row(r: &Row<'_>) -> rusqlite::Result<Activity> {
    let status: String = r.get(12)?;
    Ok(Activity {
        id: r.get(0)?,
        title: r.get(1)?,
        description: r.get(2)?,
        club_name: r.get(3)?,
        date: r.get(4)?,
        start_time: r.get(5)?,
        end_time: r.get(6)?,
        location: r.get(7)?,
        max_capacity: Capacity::from_column(r.get(8)?),
        attendance_open: db::bool_col(r.get(9)?),
        attendance_open_time: r.get(10)?,
        attendance_close_time: r.get(11)?,
        status: ActivityStatus::parse(&status).unwrap_or(ActivityStatus::Upcoming),
        created_by: r.get(13)?,
        created_at: r.get(14)?,
        updated_at: r.get(15)?,
    })
}

pub fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub club_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: String,
    pub max_capacity: Capacity,
    pub status: ActivityStatus,
}

/// Fields a teacher may change after creation. Ownership and the gate are
/// deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub club_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub max_capacity: Option<Capacity>,
    pub status: Option<ActivityStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub status: Option<ActivityStatus>,
    pub club_name: Option<String>,
    /// Activities on or after this date.
    pub date_from: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub creator: UserRef,
}

fn view_from_row(r: &Row<'_>) -> rusqlite::Result<ActivityView> {
    Ok(ActivityView {
        activity: activity_from_row(r)?,
        creator: UserRef {
            id: r.get(16)?,
            name: r.get(17)?,
            email: r.get(18)?,
        },
    })
}

pub fn create(
    conn: &Connection,
    principal: &Principal,
    new: &NewActivity,
    now: DateTime<Utc>,
) -> Result<Activity> {
    require_role(principal, Role::Teacher)?;
    let stamp = db::ts(now);
    let activity = Activity {
        id: db::new_id(),
        title: new.title.trim().to_string(),
        description: new.description.trim().to_string(),
        club_name: new.club_name.trim().to_string(),
        date: format_date(new.date),
        start_time: format_time(new.start_time),
        end_time: format_time(new.end_time),
        location: new.location.trim().to_string(),
        max_capacity: new.max_capacity,
        attendance_open: false,
        attendance_open_time: None,
        attendance_close_time: None,
        status: new.status,
        created_by: principal.id.clone(),
        created_at: stamp.clone(),
        updated_at: stamp,
    };
    conn.execute(
        "INSERT INTO activities(id, title, description, club_name, date, start_time, end_time,
            location, max_capacity, attendance_open, status, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
        params![
            activity.id,
            activity.title,
            activity.description,
            activity.club_name,
            activity.date,
            activity.start_time,
            activity.end_time,
            activity.location,
            activity.max_capacity.to_column(),
            activity.status.as_str(),
            activity.created_by,
            activity.created_at,
            activity.updated_at,
        ],
    )?;
    info!(activity_id = %activity.id, teacher_id = %principal.id, "activity created");
    Ok(activity)
}

pub fn find(conn: &Connection, activity_id: &str) -> Result<Option<Activity>> {
    Ok(conn
        .query_row(
            &format!("SELECT {ACTIVITY_COLUMNS} FROM activities a WHERE a.id = ?"),
            [activity_id],
            activity_from_row,
        )
        .optional()?)
}

pub fn get(conn: &Connection, activity_id: &str) -> Result<Activity> {
    find(conn, activity_id)?.ok_or_else(|| Error::not_found("Activity not found"))
}

pub fn get_view(conn: &Connection, activity_id: &str) -> Result<ActivityView> {
    conn.query_row(
        &format!(
            "SELECT {ACTIVITY_COLUMNS}, u.id, u.name, u.email
             FROM activities a JOIN users u ON u.id = a.created_by
             WHERE a.id = ?"
        ),
        [activity_id],
        view_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("Activity not found"))
}

pub fn list(conn: &Connection, filter: &ActivityFilter) -> Result<Vec<ActivityView>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(status) = filter.status {
        clauses.push("a.status = ?");
        values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(club) = &filter.club_name {
        clauses.push("a.club_name = ?");
        values.push(Value::Text(club.clone()));
    }
    if let Some(from) = filter.date_from {
        clauses.push("a.date >= ?");
        values.push(Value::Text(format_date(from)));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {ACTIVITY_COLUMNS}, u.id, u.name, u.email
         FROM activities a JOIN users u ON u.id = a.created_by
         {where_sql}
         ORDER BY a.date DESC, a.start_time DESC, a.created_at DESC"
    ))?;
    let rows = stmt
        .query_map(params_from_iter(values), view_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Fetches an activity the caller is about to mutate. Missing activities are
/// 404; activities owned by someone else are 403.
fn owned(conn: &Connection, principal: &Principal, activity_id: &str, verb: &str) -> Result<Activity> {
    require_role(principal, Role::Teacher)?;
    let activity = get(conn, activity_id)?;
    if activity.created_by != principal.id {
        return Err(Error::forbidden(format!("Not authorized to {verb} this activity")));
    }
    Ok(activity)
}

pub fn update(
    conn: &Connection,
    principal: &Principal,
    activity_id: &str,
    patch: &ActivityPatch,
    now: DateTime<Utc>,
) -> Result<Activity> {
    let mut a = owned(conn, principal, activity_id, "update")?;
    if let Some(v) = &patch.title {
        a.title = v.trim().to_string();
    }
    if let Some(v) = &patch.description {
        a.description = v.trim().to_string();
    }
    if let Some(v) = &patch.club_name {
        a.club_name = v.trim().to_string();
    }
    if let Some(v) = patch.date {
        a.date = format_date(v);
    }
    if let Some(v) = patch.start_time {
        a.start_time = format_time(v);
    }
    if let Some(v) = patch.end_time {
        a.end_time = format_time(v);
    }
    if let Some(v) = &patch.location {
        a.location = v.trim().to_string();
    }
    if let Some(v) = patch.max_capacity {
        a.max_capacity = v;
    }
    if let Some(v) = patch.status {
        a.status = v;
    }
    a.updated_at = db::ts(now);

    conn.execute(
        "UPDATE activities
         SET title = ?, description = ?, club_name = ?, date = ?, start_time = ?, end_time = ?,
             location = ?, max_capacity = ?, status = ?, updated_at = ?
         WHERE id = ?",
        params![
            a.title,
            a.description,
            a.club_name,
            a.date,
            a.start_time,
            a.end_time,
            a.location,
            a.max_capacity.to_column(),
            a.status.as_str(),
            a.updated_at,
            a.id,
        ],
    )?;
    Ok(a)
}

/// Removes the activity together with its ledger rows.
pub fn delete(conn: &Connection, principal: &Principal, activity_id: &str) -> Result<()> {
    let a = owned(conn, principal, activity_id, "delete")?;
    conn.execute("DELETE FROM activities WHERE id = ?", [&a.id])?;
    info!(activity_id = %a.id, teacher_id = %principal.id, "activity deleted");
    Ok(())
}

/// Opens the gate. Re-opening an open gate just moves the open timestamp.
pub fn open_gate(
    conn: &Connection,
    principal: &Principal,
    activity_id: &str,
    now: DateTime<Utc>,
) -> Result<Activity> {
    let mut a = owned(conn, principal, activity_id, "modify")?;
    let stamp = db::ts(now);
    conn.execute(
        "UPDATE activities SET attendance_open = 1, attendance_open_time = ?, updated_at = ? WHERE id = ?",
        params![stamp, stamp, a.id],
    )?;
    a.attendance_open = true;
    a.attendance_open_time = Some(stamp.clone());
    a.updated_at = stamp;
    info!(activity_id = %a.id, "attendance opened");
    Ok(a)
}

/// Closes the gate; allowed even if it was never opened.
pub fn close_gate(
    conn: &Connection,
    principal: &Principal,
    activity_id: &str,
    now: DateTime<Utc>,
) -> Result<Activity> {
    let mut a = owned(conn, principal, activity_id, "modify")?;
    let stamp = db::ts(now);
    conn.execute(
        "UPDATE activities SET attendance_open = 0, attendance_close_time = ?, updated_at = ? WHERE id = ?",
        params![stamp, stamp, a.id],
    )?;
    a.attendance_open = false;
    a.attendance_close_time = Some(stamp.clone());
    a.updated_at = stamp;
    info!(activity_id = %a.id, "attendance closed");
    Ok(a)
}

/// Activities held on or before `today`, regardless of status.
pub fn count_held_by(conn: &Connection, today: NaiveDate) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM activities WHERE date <= ?",
        [format_date(today)],
        |r| r.get(0),
    )?;
    Ok(n as u64)
}

pub fn count_all(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM activities", [], |r| r.get(0))?;
    Ok(n as u64)
}
