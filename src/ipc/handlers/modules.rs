use crate::curriculum::{self, ModulePatch};
use crate::ipc::error::{core_err, err, ok};
use crate::ipc::helpers::{db_conn, id_list, opt_str, parse_bool, patch_object, required_str, str_param, text_patch};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_modules_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let description = match opt_str(req, "description") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::create_module(conn, &course_id, title, description.as_deref()) {
        Ok(module) => ok(&req.id, json!({ "module": module })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_modules_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::list_modules(conn, &course_id) {
        Ok(modules) => ok(&req.id, json!({ "modules": modules })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_modules_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match patch_object(req) {
        Ok(p) => p,
        Err(e) => return e,
    };

    let mut update = ModulePatch::default();
    for (k, v) in patch {
        match k.as_str() {
            "title" => match text_patch(req, k, v) {
                Ok(p) => update.title = p,
                Err(e) => return e,
            },
            "description" => match text_patch(req, k, v) {
                Ok(p) => update.description = p,
                Err(e) => return e,
            },
            _ => return err(&req.id, "bad_params", format!("unknown patch field: {}", k), None),
        }
    }
    match curriculum::update_module(conn, &module_id, update) {
        Ok(module) => ok(&req.id, json!({ "module": module })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_modules_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // The caller has to pick; there is no implicit default.
    if req.params.get("cascade").map_or(true, |v| v.is_null()) {
        return err(&req.id, "bad_params", "missing cascade", None);
    }
    let cascade = match parse_bool(req, "cascade", false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::delete_module(conn, &module_id, cascade) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "ok": true,
                "deletedLectureIds": outcome.deleted_lecture_ids,
                "unlinkedLectureIds": outcome.unlinked_lecture_ids,
            }),
        ),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_modules_reorder(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ids = match id_list(req, "moduleIds") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match curriculum::reorder_modules(conn, &course_id, &ids) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => core_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "modules.create" => Some(handle_modules_create(state, req)),
        "modules.list" => Some(handle_modules_list(state, req)),
        "modules.update" => Some(handle_modules_update(state, req)),
        "modules.delete" => Some(handle_modules_delete(state, req)),
        "modules.reorder" => Some(handle_modules_reorder(state, req)),
        _ => None,
    }
}
