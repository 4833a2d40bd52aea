use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::Context;
use clubd::api::{self, AppState};
use clubd::config::Config;
use clubd::{db, http};
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout belongs to the line protocol; logs always go to stderr.
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

/// Request id and status folded into the envelope.
fn stdio_line(id: &str, reply: api::Reply) -> Value {
    let mut body = match reply.body {
        Value::Object(m) => m,
        other => {
            let mut m = serde_json::Map::new();
            m.insert("data".to_string(), other);
            m
        }
    };
    body.insert("id".to_string(), Value::String(id.to_string()));
    body.insert("status".to_string(), json!(reply.status));
    Value::Object(body)
}

fn run_stdio(state: &AppState) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let out = match serde_json::from_str::<api::Request>(&line) {
            Ok(req) => {
                let id = req.id.clone();
                stdio_line(&id, api::handle_request(state, req))
            }
            // No id to echo back.
            Err(e) => json!({
                "success": false,
                "status": 400,
                "code": "bad_json",
                "message": e.to_string(),
            }),
        };
        let _ = writeln!(stdout, "{out}");
        let _ = stdout.flush();
    }
}

async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "clubd listening");
    axum::serve(listener, http::build_router(state, config.max_body_bytes))
        .await
        .context("server stopped")
}

fn run(config: Config, stdio: bool) -> anyhow::Result<()> {
    db::open_db(&config.db_path)
        .with_context(|| format!("open database {}", config.db_path.display()))?;
    let state = AppState::new(&config);

    if stdio {
        run_stdio(&state);
        return Ok(());
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start runtime")?
        .block_on(serve(&config, state))
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    init_tracing(config.log_json);

    let stdio = std::env::args().skip(1).any(|a| a == "--stdio");
    match run(config, stdio) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "clubd exiting");
            ExitCode::FAILURE
        }
    }
}
