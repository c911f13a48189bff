mod test_support;

use serde_json::json;
use test_support::{create_course, ids_at, str_at, temp_dir, Sidecar};

const OWNER: &str = "teacher-1";

fn create_assignment(s: &mut Sidecar, course_id: &str, title: &str) -> String {
    let created = s.ok(
        "assignments.create",
        json!({
            "courseId": course_id,
            "creatorId": OWNER,
            "title": title,
            "dueDate": "2026-12-01"
        }),
    );
    str_at(&created, "/assignment/id")
}

fn submit(s: &mut Sidecar, assignment_id: &str, student_id: &str, link: &str) -> String {
    let out = s.ok(
        "submissions.submit",
        json!({ "assignmentId": assignment_id, "studentId": student_id, "submissionLink": link }),
    );
    str_at(&out, "/submission/id")
}

fn grade(s: &mut Sidecar, submission_id: &str, letter: &str) -> serde_json::Value {
    s.ok(
        "grades.assign",
        json!({ "submissionId": submission_id, "graderId": OWNER, "grade": letter }),
    )
}

fn reject(s: &mut Sidecar, submission_id: &str, feedback: &str) -> serde_json::Value {
    s.ok(
        "grades.assign",
        json!({
            "submissionId": submission_id,
            "graderId": OWNER,
            "status": "rejected",
            "feedback": feedback
        }),
    )
}

fn enrolled_course(s: &mut Sidecar, students: &[&str]) -> String {
    let course_id = create_course(s, "Algorithms", OWNER);
    for student in students {
        s.ok(
            "enrollments.enroll",
            json!({ "courseId": course_id, "studentId": student }),
        );
    }
    course_id
}

#[test]
fn assignment_creation_checks_owner_and_due_date() {
    let workspace = temp_dir("coursebook-assignments");
    let mut s = Sidecar::open(&workspace);
    let course_id = enrolled_course(&mut s, &[]);

    assert_eq!(
        s.err_code(
            "assignments.create",
            json!({ "courseId": course_id, "creatorId": "someone-else", "title": "HW" })
        ),
        "forbidden"
    );
    assert_eq!(
        s.err_code(
            "assignments.create",
            json!({ "courseId": course_id, "creatorId": OWNER, "title": "HW", "dueDate": "next week" })
        ),
        "bad_params"
    );
    let id = create_assignment(&mut s, &course_id, "HW1");
    let list = s.ok("assignments.list", json!({ "courseId": course_id }));
    assert_eq!(ids_at(&list, "/assignments"), vec![id]);
}

#[test]
fn submit_requires_enrollment_and_rejects_duplicates() {
    let workspace = temp_dir("coursebook-submit");
    let mut s = Sidecar::open(&workspace);
    let course_id = enrolled_course(&mut s, &["stu-1"]);
    let assignment_id = create_assignment(&mut s, &course_id, "HW1");

    assert_eq!(
        s.err_code(
            "submissions.submit",
            json!({ "assignmentId": assignment_id, "studentId": "stranger", "submissionLink": "https://x" })
        ),
        "forbidden"
    );
    assert_eq!(
        s.err_code(
            "submissions.submit",
            json!({ "assignmentId": assignment_id, "studentId": "stu-1", "submissionLink": "  " })
        ),
        "bad_params"
    );

    submit(&mut s, &assignment_id, "stu-1", "https://repo/one");
    assert_eq!(
        s.err_code(
            "submissions.submit",
            json!({ "assignmentId": assignment_id, "studentId": "stu-1", "submissionLink": "https://repo/two" })
        ),
        "conflict"
    );

    s.ok(
        "enrollments.unenroll",
        json!({ "courseId": course_id, "studentId": "stu-1" }),
    );
    let other = create_assignment(&mut s, &course_id, "HW2");
    assert_eq!(
        s.err_code(
            "submissions.submit",
            json!({ "assignmentId": other, "studentId": "stu-1", "submissionLink": "https://x" })
        ),
        "forbidden"
    );
}

#[test]
fn grading_normalizes_letters_and_guards_access() {
    let workspace = temp_dir("coursebook-grade");
    let mut s = Sidecar::open(&workspace);
    let course_id = enrolled_course(&mut s, &["stu-1"]);
    let assignment_id = create_assignment(&mut s, &course_id, "HW1");
    let submission_id = submit(&mut s, &assignment_id, "stu-1", "https://repo/one");

    assert_eq!(
        s.err_code(
            "grades.assign",
            json!({ "submissionId": submission_id, "graderId": "stu-1", "grade": "A" })
        ),
        "forbidden"
    );
    assert_eq!(
        s.err_code(
            "grades.assign",
            json!({ "submissionId": submission_id, "graderId": OWNER, "grade": "E" })
        ),
        "bad_params"
    );
    assert_eq!(
        s.err_code(
            "grades.assign",
            json!({ "submissionId": submission_id, "graderId": OWNER, "status": "rejected" })
        ),
        "bad_params"
    );
    assert_eq!(
        s.err_code(
            "grades.assign",
            json!({ "submissionId": "missing", "graderId": OWNER, "grade": "A" })
        ),
        "not_found"
    );

    let graded = grade(&mut s, &submission_id, "b");
    assert_eq!(graded.pointer("/grade/grade"), Some(&json!("B")));
    assert_eq!(graded.pointer("/grade/status"), Some(&json!("graded")));

    assert_eq!(
        s.err_code(
            "grades.assign",
            json!({ "submissionId": submission_id, "graderId": OWNER, "grade": "A" })
        ),
        "conflict"
    );
    assert_eq!(
        s.err_code(
            "submissions.submit",
            json!({ "assignmentId": assignment_id, "studentId": "stu-1", "submissionLink": "https://repo/two" })
        ),
        "conflict"
    );

    let list = s.ok("submissions.list", json!({ "assignmentId": assignment_id }));
    assert_eq!(list.pointer("/submissions/0/grade/grade"), Some(&json!("B")));
}

#[test]
fn rejection_then_resubmission_keeps_history_and_drops_old_grade() {
    let workspace = temp_dir("coursebook-resubmit");
    let mut s = Sidecar::open(&workspace);
    let course_id = enrolled_course(&mut s, &["stu-1"]);
    let assignment_id = create_assignment(&mut s, &course_id, "HW1");
    let first = submit(&mut s, &assignment_id, "stu-1", "https://repo/one");

    let rejected = reject(&mut s, &first, "Missing tests");
    assert_eq!(rejected.pointer("/grade/status"), Some(&json!("rejected")));
    let grades = s.ok("grades.listForStudent", json!({ "studentId": "stu-1" }));
    assert_eq!(ids_at(&grades, "/grades").len(), 1);

    let second = submit(&mut s, &assignment_id, "stu-1", "https://repo/two");
    assert_ne!(first, second);

    let grades = s.ok("grades.listForStudent", json!({ "studentId": "stu-1" }));
    assert!(ids_at(&grades, "/grades").is_empty());

    let history = s.ok(
        "submissions.history",
        json!({ "assignmentId": assignment_id, "studentId": "stu-1" }),
    );
    assert_eq!(ids_at(&history, "/submissions"), vec![second.clone(), first.clone()]);
    assert_eq!(history.pointer("/submissions/1/status"), Some(&json!("superseded")));
    assert_eq!(
        history.pointer("/submissions/1/priorFeedback"),
        Some(&json!("Missing tests"))
    );
    assert!(history
        .pointer("/submissions/1/gradeId")
        .map(|v| v.is_null())
        .unwrap_or(false));

    let current = s.ok("submissions.list", json!({ "assignmentId": assignment_id }));
    assert_eq!(ids_at(&current, "/submissions"), vec![second.clone()]);

    assert_eq!(
        s.err_code(
            "grades.assign",
            json!({ "submissionId": first, "graderId": OWNER, "grade": "A" })
        ),
        "conflict"
    );
    grade(&mut s, &second, "A");
}

#[test]
fn a_rejection_can_be_replaced_by_a_grade() {
    let workspace = temp_dir("coursebook-regrade");
    let mut s = Sidecar::open(&workspace);
    let course_id = enrolled_course(&mut s, &["stu-1"]);
    let assignment_id = create_assignment(&mut s, &course_id, "HW1");
    let submission_id = submit(&mut s, &assignment_id, "stu-1", "https://repo/one");

    reject(&mut s, &submission_id, "Wrong repo");
    let graded = grade(&mut s, &submission_id, "C");
    assert_eq!(graded.pointer("/grade/grade"), Some(&json!("C")));
    let grades = s.ok("grades.listForStudent", json!({ "studentId": "stu-1" }));
    assert_eq!(ids_at(&grades, "/grades").len(), 1);
}

#[test]
fn average_counts_only_accepted_grades() {
    let workspace = temp_dir("coursebook-average");
    let mut s = Sidecar::open(&workspace);
    let course_id = enrolled_course(&mut s, &["stu-1", "stu-2"]);

    let none = s.ok("grades.average", json!({ "studentId": "stu-1" }));
    assert!(none.get("average").map(|v| v.is_null()).unwrap_or(false));

    let hw: Vec<String> = (1..=4)
        .map(|i| create_assignment(&mut s, &course_id, &format!("HW{i}")))
        .collect();
    let subs: Vec<String> = hw
        .iter()
        .map(|a| submit(&mut s, a, "stu-1", "https://repo"))
        .collect();
    grade(&mut s, &subs[0], "A");
    grade(&mut s, &subs[1], "B");
    reject(&mut s, &subs[2], "Try again");
    grade(&mut s, &subs[3], "C");

    let avg = s.ok("grades.average", json!({ "studentId": "stu-1" }));
    assert_eq!(avg.get("average").and_then(|v| v.as_f64()), Some(3.0));

    let other = s.ok("grades.average", json!({ "studentId": "stu-2" }));
    assert!(other.get("average").map(|v| v.is_null()).unwrap_or(false));
}
