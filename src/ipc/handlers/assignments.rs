use crate::assignments::{self, NewAssignment};
use crate::grading;
use crate::ipc::error::{core_err, ok};
use crate::ipc::helpers::{db_conn, opt_str, required_str, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_assignments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
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
    let due_date = match opt_str(req, "dueDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input = NewAssignment {
        course_id: &course_id,
        creator_id: &creator_id,
        title,
        description: description.as_deref(),
        due_date: due_date.as_deref(),
    };
    match assignments::create_assignment(conn, input) {
        Ok(a) => ok(&req.id, json!({ "assignment": a })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match assignments::list_assignments(conn, &course_id) {
        Ok(list) => ok(&req.id, json!({ "assignments": list })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_submissions_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let link = match str_param(req, "submissionLink") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grading::submit(conn, &assignment_id, &student_id, link) {
        Ok(s) => ok(&req.id, json!({ "submission": s })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_submissions_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grading::list_submissions(conn, &assignment_id) {
        Ok(list) => ok(&req.id, json!({ "submissions": list })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_submissions_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grading::submission_history(conn, &assignment_id, &student_id) {
        Ok(list) => ok(&req.id, json!({ "submissions": list })),
        Err(e) => core_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.create" => Some(handle_assignments_create(state, req)),
        "assignments.list" => Some(handle_assignments_list(state, req)),
        "submissions.submit" => Some(handle_submissions_submit(state, req)),
        "submissions.list" => Some(handle_submissions_list(state, req)),
        "submissions.history" => Some(handle_submissions_history(state, req)),
        _ => None,
    }
}
