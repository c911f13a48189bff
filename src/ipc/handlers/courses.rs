use crate::courses;
use crate::curriculum;
use crate::ipc::error::{core_err, ok};
use crate::ipc::helpers::{db_conn, opt_str, required_str, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let creator_id = match required_str(req, "creatorId") {
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
    match courses::create_course(conn, title, description.as_deref(), &creator_id) {
        Ok(course) => ok(&req.id, json!({ "course": course })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };
    let creator_id = match opt_str(req, "creatorId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match courses::list_courses(conn, creator_id.as_deref()) {
        Ok(list) => ok(&req.id, json!({ "courses": list })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_courses_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course = match courses::get_course(conn, &course_id) {
        Ok(c) => c,
        Err(e) => return core_err(&req.id, e),
    };
    let modules = match curriculum::list_modules(conn, &course_id) {
        Ok(v) => v,
        Err(e) => return core_err(&req.id, e),
    };
    let lectures = match curriculum::course_lectures(conn, &course_id) {
        Ok(v) => v,
        Err(e) => return core_err(&req.id, e),
    };
    ok(
        &req.id,
        json!({ "course": course, "modules": modules, "lectures": lectures }),
    )
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match courses::delete_course(conn, &course_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => core_err(&req.id, e),
    }
}

fn course_and_student(req: &Request) -> Result<(String, String), serde_json::Value> {
    let course_id = required_str(req, "courseId")?;
    let student_id = required_str(req, "studentId")?;
    Ok((course_id, student_id))
}

fn handle_enrollments_enroll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (course_id, student_id) = match course_and_student(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match courses::enroll(conn, &course_id, &student_id) {
        Ok(created) => ok(&req.id, json!({ "ok": true, "created": created })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_enrollments_unenroll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (course_id, student_id) = match course_and_student(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match courses::unenroll(conn, &course_id, &student_id) {
        Ok(removed) => ok(&req.id, json!({ "ok": true, "removed": removed })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_enrollments_list_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match courses::enrolled_students(conn, &course_id) {
        Ok(ids) => ok(&req.id, json!({ "studentIds": ids })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_enrollments_list_courses(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match courses::enrolled_courses(conn, &student_id) {
        Ok(ids) => ok(&req.id, json!({ "courseIds": ids })),
        Err(e) => core_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.open" => Some(handle_courses_open(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        "enrollments.enroll" => Some(handle_enrollments_enroll(state, req)),
        "enrollments.unenroll" => Some(handle_enrollments_unenroll(state, req)),
        "enrollments.listStudents" => Some(handle_enrollments_list_students(state, req)),
        "enrollments.listCourses" => Some(handle_enrollments_list_courses(state, req)),
        _ => None,
    }
}
