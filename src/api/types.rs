use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::db;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    #[serde(default)]
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(method: &str, token: Option<String>, params: serde_json::Value) -> Self {
        Self {
            id: String::new(),
            method: method.to_string(),
            token,
            params,
        }
    }
}

/// Status code plus the `{success, message?, data?}` envelope.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub db_path: PathBuf,
    pub token_ttl: Duration,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            db_path: config.db_path.clone(),
            token_ttl: Duration::hours(config.token_ttl_hours),
        }
    }

    pub fn connect(&self) -> rusqlite::Result<Connection> {
        db::connect(&self.db_path)
    }
}

/// Per-request view handed to handler families.
pub struct Ctx<'a> {
    pub conn: &'a Connection,
    pub now: DateTime<Utc>,
    pub token_ttl: Duration,
}
