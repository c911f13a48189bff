use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::patch::FieldPatch;
use rusqlite::Connection;
use serde_json::Value as JsonValue;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, JsonValue> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, JsonValue> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Raw string param; absent or null reads as empty so the operation itself
/// decides whether empty is acceptable.
pub fn str_param<'a>(req: &'a Request, key: &str) -> Result<&'a str, JsonValue> {
    match req.params.get(key) {
        None | Some(JsonValue::Null) => Ok(""),
        Some(v) => v
            .as_str()
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be string", key), None)),
    }
}

pub fn opt_str(req: &Request, key: &str) -> Result<Option<String>, JsonValue> {
    match req.params.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be string or null", key), None)),
    }
}

pub fn parse_bool(req: &Request, key: &str, default: bool) -> Result<bool, JsonValue> {
    match req.params.get(key) {
        None | Some(JsonValue::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be boolean", key), None)),
    }
}

/// Required array of ids. Duplicates are kept so the operation can reject them.
pub fn id_list(req: &Request, key: &str) -> Result<Vec<String>, JsonValue> {
    let Some(arr) = req.params.get(key).and_then(|v| v.as_array()) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        let Some(s) = item.as_str() else {
            return Err(err(&req.id, "bad_params", format!("{} must be strings", key), None));
        };
        let s = s.trim();
        if s.is_empty() {
            return Err(err(
                &req.id,
                "bad_params",
                format!("{} must not contain empty values", key),
                None,
            ));
        }
        out.push(s.to_string());
    }
    Ok(out)
}

pub fn patch_object<'a>(req: &'a Request) -> Result<&'a serde_json::Map<String, JsonValue>, JsonValue> {
    req.params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| err(&req.id, "bad_params", "missing patch", None))
}

pub fn text_patch(req: &Request, key: &str, v: &JsonValue) -> Result<FieldPatch<String>, JsonValue> {
    match v.as_str() {
        Some(s) => Ok(FieldPatch::Set(s.to_string())),
        None => Err(err(&req.id, "bad_params", format!("patch.{} must be string", key), None)),
    }
}

pub fn nullable_text_patch(
    req: &Request,
    key: &str,
    v: &JsonValue,
) -> Result<FieldPatch<Option<String>>, JsonValue> {
    if v.is_null() {
        return Ok(FieldPatch::Set(None));
    }
    match v.as_str() {
        Some(s) => Ok(FieldPatch::Set(Some(s.to_string()))),
        None => Err(err(
            &req.id,
            "bad_params",
            format!("patch.{} must be string or null", key),
            None,
        )),
    }
}

pub fn bool_patch(req: &Request, key: &str, v: &JsonValue) -> Result<FieldPatch<bool>, JsonValue> {
    match v.as_bool() {
        Some(b) => Ok(FieldPatch::Set(b)),
        None => Err(err(&req.id, "bad_params", format!("patch.{} must be boolean", key), None)),
    }
}
