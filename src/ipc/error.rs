use crate::error::CoreError;
use log::warn;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps a domain failure onto its stable wire code.
pub fn core_err(id: &str, e: CoreError) -> serde_json::Value {
    if let CoreError::Storage(ref inner) = e {
        warn!("request {} hit a storage error: {}", id, inner);
    }
    err(id, e.code(), e.to_string(), None)
}
