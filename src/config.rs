use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_hours: i64,
    pub max_body_bytes: usize,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("clubd.sqlite3"),
            host: "127.0.0.1".to_string(),
            port: 5000,
            token_ttl_hours: 24 * 7,
            max_body_bytes: 16 * 1024,
            log_json: false,
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Reads `CLUBD_*` variables; anything missing or unparseable keeps its
    /// default.
    pub fn from_env() -> Self {
        let d = Config::default();
        Self {
            db_path: env::var("CLUBD_DB_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(d.db_path),
            host: env::var("CLUBD_HOST")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(d.host),
            port: env_parse("CLUBD_PORT", d.port),
            token_ttl_hours: env_parse("CLUBD_TOKEN_TTL_HOURS", d.token_ttl_hours).max(1),
            max_body_bytes: env_parse("CLUBD_MAX_BODY_BYTES", d.max_body_bytes),
            log_json: env_bool("CLUBD_LOG_JSON", d.log_json),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
