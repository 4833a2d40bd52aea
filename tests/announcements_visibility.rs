mod test_support;

use chrono::{Duration, Utc};
use clubd::announcements::{self, AnnouncementFilter, AnnouncementPatch, NewAnnouncement};
use clubd::model::{Priority, TargetAudience};
use serde_json::json;
use test_support::{assert_err, call, call_ok, register_token, student, teacher, workspace};

fn notice(title: &str, expiry_hours: Option<i64>) -> NewAnnouncement {
    NewAnnouncement {
        title: title.to_string(),
        content: format!("{title} details"),
        priority: Priority::Medium,
        target_audience: TargetAudience::All,
        club_name: None,
        expiry_date: expiry_hours.map(|h| Utc::now() + Duration::hours(h)),
    }
}

#[test]
fn listing_hides_expired_but_direct_lookup_does_not() {
    let ws = workspace();
    let conn = ws.conn();
    let t = teacher(&conn, "T", "t@school.test");

    let forever = announcements::create(&conn, &t, &notice("No expiry", None), Utc::now())
        .expect("create");
    let later = announcements::create(&conn, &t, &notice("Next week", Some(24 * 7)), Utc::now())
        .expect("create");
    let gone = announcements::create(&conn, &t, &notice("Yesterday", Some(-24)), Utc::now())
        .expect("create");

    let listed = announcements::list(&conn, &AnnouncementFilter::default(), Utc::now())
        .expect("list");
    let ids: Vec<_> = listed.iter().map(|v| v.announcement.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&forever.id.as_str()));
    assert!(ids.contains(&later.id.as_str()));
    assert!(!ids.contains(&gone.id.as_str()));

    let direct = announcements::get_view(&conn, &gone.id).expect("direct lookup");
    assert_eq!(direct.announcement.title, "Yesterday");
    assert_eq!(direct.creator.id, t.id);

    // Once the clock passes the expiry, the announcement drops out.
    let after = announcements::list(
        &conn,
        &AnnouncementFilter::default(),
        Utc::now() + Duration::days(8),
    )
    .expect("list later");
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].announcement.id, forever.id);
}

#[test]
fn filters_and_owner_only_updates() {
    let ws = workspace();
    let conn = ws.conn();
    let owner = teacher(&conn, "Owner", "owner@school.test");
    let other = teacher(&conn, "Other", "other@school.test");
    let s = student(&conn, "Sam", "sam@school.test", "S001");

    let mut chess = notice("Chess finals", None);
    chess.priority = Priority::High;
    chess.club_name = Some("Chess Club".to_string());
    let chess = announcements::create(&conn, &owner, &chess, Utc::now()).expect("create");
    announcements::create(&conn, &owner, &notice("General", None), Utc::now()).expect("create");

    let high = AnnouncementFilter {
        priority: Some(Priority::High),
        ..AnnouncementFilter::default()
    };
    let rows = announcements::list(&conn, &high, Utc::now()).expect("list high");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].announcement.club_name.as_deref(), Some("Chess Club"));

    let err = announcements::create(&conn, &s, &notice("Nope", None), Utc::now())
        .expect_err("students cannot announce");
    assert_eq!(err.status(), 403);

    let patch = AnnouncementPatch {
        title: Some("Hijacked".to_string()),
        ..AnnouncementPatch::default()
    };
    let err = announcements::update(&conn, &other, &chess.id, &patch, Utc::now())
        .expect_err("other teacher");
    assert_eq!(err.status(), 403);
    let err = announcements::delete(&conn, &other, &chess.id).expect_err("other teacher");
    assert_eq!(err.status(), 403);

    let patch = AnnouncementPatch {
        club_name: Some(None),
        expiry_date: Some(Some(Utc::now() - Duration::hours(1))),
        ..AnnouncementPatch::default()
    };
    let updated = announcements::update(&conn, &owner, &chess.id, &patch, Utc::now())
        .expect("owner update");
    assert_eq!(updated.club_name, None);
    assert_eq!(updated.title, "Chess finals");
    assert!(updated.expiry_date.is_some());

    let rows = announcements::list(&conn, &AnnouncementFilter::default(), Utc::now())
        .expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].announcement.title, "General");

    announcements::delete(&conn, &owner, &chess.id).expect("owner delete");
    let err = announcements::get_view(&conn, &chess.id).expect_err("deleted");
    assert_eq!(err.status(), 404);
}

#[test]
fn announcement_requests_through_dispatch() {
    let ws = workspace();
    let state = &ws.state;
    let t = register_token(
        state,
        json!({ "name": "T", "email": "t@school.test", "password": "secret1", "role": "teacher" }),
    );
    let s = register_token(
        state,
        json!({
            "name": "Sam", "email": "sam@school.test", "password": "secret1",
            "role": "student", "rollNumber": "S001"
        }),
    );

    let reply = call(state, "announcements.create", Some(&t), json!({ "title": "Only title" }));
    assert_err(&reply, 400, "validation_failed");

    let reply = call(
        state,
        "announcements.create",
        Some(&t),
        json!({ "title": "Hi", "content": "There", "priority": "urgent" }),
    );
    assert_err(&reply, 400, "validation_failed");

    let created = call_ok(
        state,
        "announcements.create",
        Some(&t),
        json!({ "title": "Hi", "content": "There", "expiryDate": "2999-01-01" }),
    );
    let a = &created["data"]["announcement"];
    assert_eq!(a["priority"], json!("medium"));
    assert_eq!(a["targetAudience"], json!("all"));
    assert_eq!(a["isActive"], json!(true));
    assert_eq!(a["expiryDate"], json!("2999-01-01T00:00:00.000Z"));

    let listed = call_ok(state, "announcements.list", Some(&s), json!({ "priority": "medium" }));
    assert_eq!(listed["count"], json!(1));
    assert_eq!(listed["data"]["announcements"][0]["creator"]["name"], json!("T"));
}
