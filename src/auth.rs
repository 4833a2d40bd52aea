//! Credentials and sessions. Passwords are stored as Argon2id PHC strings,
//! bearer tokens as the SHA-256 of an opaque random value.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::{ConflictKind, Error, Result};
use crate::model::{Principal, Role, User};

const MIN_PASSWORD_LEN: usize = 6;

pub(crate) const USER_COLUMNS: &str =
    "id, name, email, roll_number, role, department, year, is_active, created_at";

pub(crate) fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = r.get(4)?;
    Ok(User {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        roll_number: r.get(3)?,
        role: Role::parse(&role).unwrap_or(Role::Student),
        department: r.get(5)?,
        year: r.get(6)?,
        is_active: db::bool_col(r.get(7)?),
        created_at: r.get(8)?,
    })
}

fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::Internal(format!("password hash: {e}")))
}

/// False for a wrong password and for anything that is not a PHC string.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub roll_number: Option<String>,
    pub department: Option<String>,
    pub year: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct LoginInput {
    pub email: Option<String>,
    pub roll_number: Option<String>,
    pub password: Option<String>,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn register(
    conn: &Connection,
    input: &RegisterInput,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<(User, String)> {
    let (Some(name), Some(email), Some(password), Some(role_raw)) = (
        non_empty(&input.name),
        non_empty(&input.email),
        input.password.as_deref().filter(|p| !p.is_empty()),
        non_empty(&input.role),
    ) else {
        return Err(Error::validation("Please provide all required fields"));
    };
    let role = Role::parse(role_raw).ok_or_else(|| {
        Error::validation(format!("role must be one of: {}", Role::choices()))
    })?;
    let roll_number = match role {
        Role::Student => Some(
            non_empty(&input.roll_number)
                .ok_or_else(|| Error::validation("Roll number is required for students"))?
                .to_string(),
        ),
        Role::Teacher => None,
    };
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if let Some(year) = input.year {
        if !(1..=4).contains(&year) {
            return Err(Error::validation("year must be between 1 and 4"));
        }
    }

    let user = User {
        id: db::new_id(),
        name: name.to_string(),
        email: email.to_ascii_lowercase(),
        roll_number,
        role,
        department: non_empty(&input.department).map(str::to_string),
        year: input.year,
        is_active: true,
        created_at: db::ts(now),
    };
    let password_hash = hash_password(password)?;
    let inserted = conn.execute(
        "INSERT INTO users(id, name, email, roll_number, role, password_hash, department, year, is_active, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        params![
            user.id,
            user.name,
            user.email,
            user.roll_number,
            user.role.as_str(),
            password_hash,
            user.department,
            user.year,
            user.created_at,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if db::is_unique_violation(&e) => {
            return Err(Error::conflict(
                ConflictKind::DuplicateUser,
                "User already exists with this email or roll number",
            ));
        }
        Err(e) => return Err(e.into()),
    }
    info!(user_id = %user.id, role = user.role.as_str(), "user registered");

    let token = issue_token(conn, &user.id, now, ttl)?;
    Ok((user, token))
}

pub fn login(
    conn: &Connection,
    input: &LoginInput,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<(User, String)> {
    let email = non_empty(&input.email).map(|e| e.to_ascii_lowercase());
    let roll_number = non_empty(&input.roll_number);
    let password = input.password.as_deref().filter(|p| !p.is_empty());
    let Some(password) = password.filter(|_| email.is_some() || roll_number.is_some()) else {
        return Err(Error::validation(
            "Please provide email/roll number and password",
        ));
    };

    let found: Option<(User, String)> = conn
        .query_row(
            &format!(
                "SELECT {USER_COLUMNS}, password_hash FROM users
                 WHERE (?1 IS NOT NULL AND email = ?1) OR (?2 IS NOT NULL AND roll_number = ?2)
                 ORDER BY created_at
                 LIMIT 1"
            ),
            params![email, roll_number],
            |r| Ok((user_from_row(r)?, r.get(9)?)),
        )
        .optional()?;
    let Some((user, stored_hash)) = found else {
        return Err(Error::unauthenticated("Invalid credentials"));
    };
    if !user.is_active {
        return Err(Error::forbidden("Your account has been deactivated"));
    }
    if !verify_password(&stored_hash, password) {
        return Err(Error::unauthenticated("Invalid credentials"));
    }

    let token = issue_token(conn, &user.id, now, ttl)?;
    Ok((user, token))
}

pub fn issue_token(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<String> {
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ? AND expires_at <= ?",
        params![user_id, db::ts(now)],
    )?;
    let token = Uuid::new_v4().simple().to_string();
    conn.execute(
        "INSERT INTO sessions(token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        params![sha256_hex(&token), user_id, db::ts(now), db::ts(now + ttl)],
    )?;
    Ok(token)
}

/// Maps a bearer token to the caller. Every failure is the same 401 so the
/// response does not reveal which check failed.
pub fn resolve_token(conn: &Connection, token: Option<&str>, now: DateTime<Utc>) -> Result<Principal> {
    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        return Err(Error::unauthenticated("Not authorized, no token"));
    };
    let row: Option<(String, String, i64)> = conn
        .query_row(
            "SELECT u.id, u.role, u.is_active
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ? AND s.expires_at > ?",
            params![sha256_hex(token), db::ts(now)],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    match row {
        Some((id, role, active)) if db::bool_col(active) => Ok(Principal {
            id,
            role: Role::parse(&role)
                .ok_or_else(|| Error::Internal(format!("unknown role stored: {role}")))?,
        }),
        _ => Err(Error::unauthenticated("Not authorized, token failed")),
    }
}

pub fn require_role(principal: &Principal, role: Role) -> Result<()> {
    if principal.role == role {
        return Ok(());
    }
    Err(Error::forbidden(format!(
        "User role {} is not authorized to access this route",
        principal.role.as_str()
    )))
}

pub fn get_user(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
            [user_id],
            user_from_row,
        )
        .optional()?)
}
