use crate::ipc::error::{core_err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::progress;
use serde_json::json;

struct ProgressKey {
    student_id: String,
    course_id: String,
}

fn progress_key(req: &Request) -> Result<ProgressKey, serde_json::Value> {
    Ok(ProgressKey {
        student_id: required_str(req, "studentId")?,
        course_id: required_str(req, "courseId")?,
    })
}

fn handle_progress_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let key = match progress_key(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match progress::course_progress(conn, &key.student_id, &key.course_id) {
        Ok(p) => ok(&req.id, json!({ "progress": p })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_progress_mark_completed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let key = match progress_key(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let lecture_id = match required_str(req, "lectureId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match progress::mark_lecture_completed(conn, &key.student_id, &key.course_id, &lecture_id) {
        Ok(update) => ok(&req.id, json!(update)),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_progress_update_last_accessed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let key = match progress_key(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let lecture_id = match required_str(req, "lectureId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match progress::update_last_accessed(conn, &key.student_id, &key.course_id, &lecture_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => core_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "progress.get" => Some(handle_progress_get(state, req)),
        "progress.markCompleted" => Some(handle_progress_mark_completed(state, req)),
        "progress.updateLastAccessed" => Some(handle_progress_update_last_accessed(state, req)),
        _ => None,
    }
}
