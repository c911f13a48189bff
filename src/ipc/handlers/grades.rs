use crate::grading::{self, GradeDecision};
use crate::ipc::error::{core_err, ok};
use crate::ipc::helpers::{db_conn, opt_str, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_grades_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let submission_id = match required_str(req, "submissionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grader_id = match required_str(req, "graderId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let status = match opt_str(req, "status") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade = match opt_str(req, "grade") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let feedback = match opt_str(req, "feedback") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let decision = match GradeDecision::parse(status.as_deref(), grade.as_deref(), feedback.as_deref()) {
        Ok(d) => d,
        Err(e) => return core_err(&req.id, e),
    };
    match grading::assign_grade(conn, &submission_id, decision, &grader_id) {
        Ok(g) => ok(&req.id, json!({ "grade": g })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_grades_list_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grading::student_grades(conn, &student_id) {
        Ok(list) => ok(&req.id, json!({ "grades": list })),
        Err(e) => core_err(&req.id, e),
    }
}

fn handle_grades_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // `average: null` means no graded work yet; it is never reported as 0.
    match grading::student_average(conn, &student_id) {
        Ok(avg) => ok(&req.id, json!({ "studentId": student_id, "average": avg })),
        Err(e) => core_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.assign" => Some(handle_grades_assign(state, req)),
        "grades.listForStudent" => Some(handle_grades_list_for_student(state, req)),
        "grades.average" => Some(handle_grades_average(state, req)),
        _ => None,
    }
}
