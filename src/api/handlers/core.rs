use serde_json::json;

use crate::api::error::ok;
use crate::api::types::{Ctx, Reply, Request};

fn handle_health(ctx: &Ctx<'_>) -> Reply {
    ok(
        200,
        None,
        Some(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "time": crate::db::ts(ctx.now),
        })),
    )
}

pub fn try_handle(ctx: &Ctx<'_>, req: &Request) -> Option<Reply> {
    match req.method.as_str() {
        "health" => Some(handle_health(ctx)),
        _ => None,
    }
}
