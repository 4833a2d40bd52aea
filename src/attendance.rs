//! Attendance ledger: marking and the derived read views.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::activities;
use crate::auth::{self, require_role};
use crate::db;
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, AttendanceStatus, Principal, Role};
use crate::stats::{ActivityStats, Percentage, ReportSummary, StudentStats};

const RECORD_COLUMNS: &str = "r.id, r.student_id, r.activity_id, r.status, r.marked_at, r.remarks";

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let status: String = r.get(3)?;
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        activity_id: r.get(2)?,
        status: AttendanceStatus::parse(&status).unwrap_or(AttendanceStatus::Present),
        marked_at: r.get(4)?,
        remarks: r.get(5)?,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub id: String,
    pub title: String,
    pub club_name: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub roll_number: Option<String>,
    pub department: Option<String>,
    pub year: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordWithActivity {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    /// `None` once the activity has been deleted.
    pub activity: Option<ActivitySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordWithStudent {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub student: StudentSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyAttendance {
    pub attendance: Vec<RecordWithActivity>,
    pub stats: StudentStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentAttendance {
    pub student: StudentSummary,
    pub attendance: Vec<RecordWithActivity>,
    pub stats: StudentStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityBrief {
    pub id: String,
    pub title: String,
    pub club_name: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityAttendance {
    pub activity: ActivityBrief,
    pub attendance: Vec<RecordWithStudent>,
    pub stats: ActivityStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub student: StudentSummary,
    pub total_activities: u64,
    pub attended: u64,
    pub percentage: Percentage,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReport {
    pub report: Vec<ReportRow>,
    pub summary: ReportSummary,
}

/// Records the caller as present. The gate must be open and the pair must be
/// new; the second condition is enforced by the ledger's unique index, so
/// racing requests for the same pair produce exactly one row.
pub fn mark(
    conn: &Connection,
    principal: &Principal,
    activity_id: &str,
    now: DateTime<Utc>,
) -> Result<AttendanceRecord> {
    require_role(principal, Role::Student)?;
    let activity = activities::get(conn, activity_id)?;
    if !activity.attendance_open {
        return Err(Error::gate_closed());
    }

    let record = AttendanceRecord {
        id: db::new_id(),
        student_id: principal.id.clone(),
        activity_id: activity.id,
        status: AttendanceStatus::Present,
        marked_at: db::ts(now),
        remarks: None,
    };
    let inserted = conn.execute(
        "INSERT INTO attendance(id, student_id, activity_id, status, marked_at, remarks)
         VALUES (?, ?, ?, ?, ?, NULL)",
        params![
            record.id,
            record.student_id,
            record.activity_id,
            record.status.as_str(),
            record.marked_at,
        ],
    );
    match inserted {
        Ok(_) => {
            info!(student_id = %record.student_id, activity_id = %record.activity_id, "attendance marked");
            Ok(record)
        }
        Err(e) if db::is_unique_violation(&e) => Err(Error::duplicate_record()),
        Err(e) => Err(e.into()),
    }
}

fn records_for_student(conn: &Connection, student_id: &str) -> Result<Vec<RecordWithActivity>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS}, a.id, a.title, a.club_name, a.date, a.start_time, a.end_time
         FROM attendance r LEFT JOIN activities a ON a.id = r.activity_id
         WHERE r.student_id = ?
         ORDER BY r.marked_at DESC"
    ))?;
    let rows = stmt
        .query_map([student_id], |r| {
            let activity = match r.get::<_, Option<String>>(6)? {
                Some(id) => Some(ActivitySummary {
                    id,
                    title: r.get(7)?,
                    club_name: r.get(8)?,
                    date: r.get(9)?,
                    start_time: r.get(10)?,
                    end_time: r.get(11)?,
                }),
                None => None,
            };
            Ok(RecordWithActivity {
                record: record_from_row(r)?,
                activity,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Numerator: the student's present rows. Denominator: every activity dated
/// today or earlier, system-wide and whatever its status.
fn student_stats(
    conn: &Connection,
    records: &[RecordWithActivity],
    now: DateTime<Utc>,
) -> Result<StudentStats> {
    let held = activities::count_held_by(conn, now.date_naive())?;
    let present = records
        .iter()
        .filter(|r| r.record.status == AttendanceStatus::Present)
        .count() as u64;
    Ok(StudentStats::new(held, present))
}

pub fn my_attendance(
    conn: &Connection,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<MyAttendance> {
    require_role(principal, Role::Student)?;
    let attendance = records_for_student(conn, &principal.id)?;
    let stats = student_stats(conn, &attendance, now)?;
    Ok(MyAttendance { attendance, stats })
}

pub fn student_attendance(
    conn: &Connection,
    principal: &Principal,
    student_id: &str,
    now: DateTime<Utc>,
) -> Result<StudentAttendance> {
    require_role(principal, Role::Teacher)?;
    let student = auth::get_user(conn, student_id)?
        .filter(|u| u.role == Role::Student)
        .ok_or_else(|| Error::not_found("Student not found"))?;
    let attendance = records_for_student(conn, &student.id)?;
    let stats = student_stats(conn, &attendance, now)?;
    Ok(StudentAttendance {
        student: StudentSummary {
            id: student.id,
            name: student.name,
            email: student.email,
            roll_number: student.roll_number,
            department: student.department,
            year: student.year,
        },
        attendance,
        stats,
    })
}

pub fn activity_attendance(
    conn: &Connection,
    principal: &Principal,
    activity_id: &str,
) -> Result<ActivityAttendance> {
    require_role(principal, Role::Teacher)?;
    let activity = activities::get(conn, activity_id)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS}, u.id, u.name, u.email, u.roll_number, u.department, u.year
         FROM attendance r JOIN users u ON u.id = r.student_id
         WHERE r.activity_id = ?
         ORDER BY r.marked_at DESC"
    ))?;
    let attendance = stmt
        .query_map([&activity.id], |r| {
            Ok(RecordWithStudent {
                record: record_from_row(r)?,
                student: student_summary_at(r, 6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stats = ActivityStats {
        total: attendance.len() as u64,
        ..ActivityStats::default()
    };
    for r in &attendance {
        match r.record.status {
            AttendanceStatus::Present => stats.present += 1,
            AttendanceStatus::Absent => stats.absent += 1,
        }
    }

    Ok(ActivityAttendance {
        activity: ActivityBrief {
            id: activity.id,
            title: activity.title,
            club_name: activity.club_name,
            date: activity.date,
        },
        attendance,
        stats,
    })
}

fn student_summary_at(r: &Row<'_>, base: usize) -> rusqlite::Result<StudentSummary> {
    Ok(StudentSummary {
        id: r.get(base)?,
        name: r.get(base + 1)?,
        email: r.get(base + 2)?,
        roll_number: r.get(base + 3)?,
        department: r.get(base + 4)?,
        year: r.get(base + 5)?,
    })
}

/// One row per student. Every row shares the same denominator: the count of
/// all activities in the system.
pub fn report(conn: &Connection, principal: &Principal) -> Result<AttendanceReport> {
    require_role(principal, Role::Teacher)?;
    let total_activities = activities::count_all(conn)?;

    let mut present_by_student: HashMap<String, u64> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT student_id, COUNT(*) FROM attendance WHERE status = 'present' GROUP BY student_id",
    )?;
    let counts = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for (student_id, n) in counts {
        present_by_student.insert(student_id, n as u64);
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, email, roll_number, department, year
         FROM users WHERE role = 'student'
         ORDER BY name, created_at",
    )?;
    let students = stmt
        .query_map([], |r| student_summary_at(r, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let total_records: i64 = conn.query_row("SELECT COUNT(*) FROM attendance", [], |r| r.get(0))?;

    let report: Vec<ReportRow> = students
        .into_iter()
        .map(|student| {
            let attended = present_by_student.get(&student.id).copied().unwrap_or(0);
            ReportRow {
                student,
                total_activities,
                attended,
                percentage: Percentage::of(attended, total_activities),
            }
        })
        .collect();

    Ok(AttendanceReport {
        summary: ReportSummary {
            total_students: report.len() as u64,
            total_activities,
            total_attendance_records: total_records as u64,
        },
        report,
    })
}
