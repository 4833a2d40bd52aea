use serde_json::json;
use tracing::{error, warn};

use super::types::Reply;
use crate::error::Error;

pub fn ok(status: u16, message: Option<&str>, data: Option<serde_json::Value>) -> Reply {
    let mut body = json!({ "success": true });
    if let Some(m) = message {
        body["message"] = json!(m);
    }
    if let Some(d) = data {
        body["data"] = d;
    }
    Reply { status, body }
}

/// Success envelope for listings, which also carry the item count.
pub fn ok_list(count: usize, data: serde_json::Value) -> Reply {
    let mut reply = ok(200, None, Some(data));
    reply.body["count"] = json!(count);
    reply
}

pub fn err(status: u16, code: &str, message: impl Into<String>) -> Reply {
    Reply {
        status,
        body: json!({
            "success": false,
            "code": code,
            "message": message.into(),
        }),
    }
}

pub fn fail(method: &str, e: &Error) -> Reply {
    let status = e.status();
    if status >= 500 {
        error!(method, error = %e, "request failed");
    } else {
        warn!(method, status, code = e.code(), error = %e, "request rejected");
    }
    err(status, e.code(), e.to_string())
}

pub fn to_json<T: serde::Serialize>(v: &T) -> Result<serde_json::Value, Error> {
    serde_json::to_value(v).map_err(|e| Error::Internal(e.to_string()))
}
