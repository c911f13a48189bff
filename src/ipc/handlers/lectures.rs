use crate::curriculum::{self, LecturePatch};
use crate::ipc::error::{core_err, err, ok};
use crate::ipc::helpers::{
    bool_patch, db_conn, id_list, nullable_text_patch, patch_object, required_str, str_param, text_patch,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_lectures_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match str_param(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::create_lecture_in_module(conn, &module_id, title) {
        Ok(lecture) => ok(&req.id, json!({ "lecture": lecture })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_lectures_create_unassigned(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match str_param(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::create_unassigned_lecture(conn, &course_id, title) {
        Ok(lecture) => ok(&req.id, json!({ "lecture": lecture })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_lectures_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::course_lectures(conn, &course_id) {
        Ok(lectures) => ok(&req.id, json!({ "lectures": lectures })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_lectures_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lecture_id = match required_str(req, "lectureId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match patch_object(req) {
        Ok(p) => p,
        Err(e) => return e,
    };

    let mut update = LecturePatch::default();
    for (k, v) in patch {
        match k.as_str() {
            "title" => match text_patch(req, k, v) {
                Ok(p) => update.title = p,
                Err(e) => return e,
            },
            "isPreview" => match bool_patch(req, k, v) {
                Ok(p) => update.is_preview = p,
                Err(e) => return e,
            },
            "mediaUrl" => match nullable_text_patch(req, k, v) {
                Ok(p) => update.media_url = p,
                Err(e) => return e,
            },
            _ => return err(&req.id, "bad_params", format!("unknown patch field: {}", k), None),
        }
    }
    match curriculum::update_lecture(conn, &lecture_id, update) {
        Ok(lecture) => ok(&req.id, json!({ "lecture": lecture })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_lectures_reorder(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ids = match id_list(req, "lectureIds") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::reorder_lectures(conn, &module_id, &ids) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_lectures_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lecture_id = match required_str(req, "lectureId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::delete_lecture(conn, &lecture_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => core_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lectures.create" => Some(handle_lectures_create(state, req)),
        "lectures.createUnassigned" => Some(handle_lectures_create_unassigned(state, req)),
        "lectures.list" => Some(handle_lectures_list(state, req)),
        "lectures.update" => Some(handle_lectures_update(state, req)),
        "lectures.reorder" => Some(handle_lectures_reorder(state, req)),
        "lectures.delete" => Some(handle_lectures_delete(state, req)),
        _ => None,
    }
}
