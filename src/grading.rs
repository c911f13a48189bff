//! Submission and grading lifecycle.
//!
//! Per (assignment, student) there is at most one current submission, the
//! one whose status is not `superseded` (a partial unique index enforces it).
//! A rejected submission is superseded, not deleted, when the student submits
//! again; its rejection grade is dropped and the feedback stays on the row.

use crate::assignments;
use crate::calc::{self, GradeLetter};
use crate::courses;
use crate::db::{now_ts, write_tx};
use crate::error::{CoreError, CoreResult};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Active,
    Rejected,
    Superseded,
}

impl SubmissionStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Superseded => "superseded",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "rejected" => Some(Self::Rejected),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeStatus {
    Graded,
    Rejected,
}

impl GradeStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Graded => "graded",
            Self::Rejected => "rejected",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "graded" => Some(Self::Graded),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub submission_link: String,
    pub status: SubmissionStatus,
    pub grade_id: Option<String>,
    pub prior_feedback: Option<String>,
    pub submitted_at: String,
    pub superseded_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub submission_id: String,
    pub grader_id: String,
    pub status: GradeStatus,
    /// Uppercase letter, empty for a rejection.
    pub grade: String,
    pub feedback: Option<String>,
    pub graded_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionWithGrade {
    #[serde(flatten)]
    pub submission: Submission,
    pub grade: Option<Grade>,
}

/// What the grader decided about a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum GradeDecision {
    Graded {
        letter: GradeLetter,
        feedback: Option<String>,
    },
    Rejected {
        feedback: String,
    },
}

impl GradeDecision {
    /// `status` defaults to `graded`. Rejections need feedback; grades need
    /// one of A-D in any case.
    pub fn parse(status: Option<&str>, grade: Option<&str>, feedback: Option<&str>) -> CoreResult<Self> {
        let feedback = feedback.map(str::trim).filter(|s| !s.is_empty());
        let status = status.map(|s| s.trim().to_ascii_lowercase());
        match status.as_deref().unwrap_or("graded") {
            "graded" => {
                let raw = grade.ok_or_else(|| CoreError::invalid("grade is required"))?;
                let letter = GradeLetter::parse(raw)
                    .ok_or_else(|| CoreError::invalid(format!("grade must be one of A, B, C, D: {raw}")))?;
                Ok(Self::Graded {
                    letter,
                    feedback: feedback.map(str::to_string),
                })
            }
            "rejected" => {
                let feedback =
                    feedback.ok_or_else(|| CoreError::invalid("feedback is required when rejecting"))?;
                Ok(Self::Rejected {
                    feedback: feedback.to_string(),
                })
            }
            other => Err(CoreError::invalid(format!(
                "status must be graded or rejected: {other}"
            ))),
        }
    }
}

const SUBMISSION_COLUMNS: &str = "id, assignment_id, student_id, submission_link, status, grade_id, prior_feedback, submitted_at, superseded_at";
const GRADE_COLUMNS: &str = "id, submission_id, grader_id, status, grade, feedback, graded_at";

fn bad_enum(col: usize, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        col,
        rusqlite::types::Type::Text,
        format!("unexpected status: {value}").into(),
    )
}

fn submission_from_row(r: &Row<'_>) -> rusqlite::Result<Submission> {
    let status: String = r.get(4)?;
    Ok(Submission {
        id: r.get(0)?,
        assignment_id: r.get(1)?,
        student_id: r.get(2)?,
        submission_link: r.get(3)?,
        status: SubmissionStatus::parse(&status).ok_or_else(|| bad_enum(4, status.clone()))?,
        grade_id: r.get(5)?,
        prior_feedback: r.get(6)?,
        submitted_at: r.get(7)?,
        superseded_at: r.get(8)?,
    })
}

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<Grade> {
    let status: String = r.get(3)?;
    Ok(Grade {
        id: r.get(0)?,
        submission_id: r.get(1)?,
        grader_id: r.get(2)?,
        status: GradeStatus::parse(&status).ok_or_else(|| bad_enum(3, status.clone()))?,
        grade: r.get(4)?,
        feedback: r.get(5)?,
        graded_at: r.get(6)?,
    })
}

pub fn get_submission(conn: &Connection, submission_id: &str) -> CoreResult<Submission> {
    conn.query_row(
        &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?"),
        [submission_id],
        submission_from_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::not_found("submission not found"))
}

fn current_submission(conn: &Connection, assignment_id: &str, student_id: &str) -> CoreResult<Option<Submission>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {SUBMISSION_COLUMNS} FROM submissions
                 WHERE assignment_id = ? AND student_id = ? AND status <> 'superseded'"
            ),
            params![assignment_id, student_id],
            submission_from_row,
        )
        .optional()?)
}

fn grade_for_submission(conn: &Connection, submission_id: &str) -> CoreResult<Option<Grade>> {
    Ok(conn
        .query_row(
            &format!("SELECT {GRADE_COLUMNS} FROM grades WHERE submission_id = ?"),
            [submission_id],
            grade_from_row,
        )
        .optional()?)
}

/// Clears the submission's forward pointer, then removes the grade row.
fn delete_grade(conn: &Connection, grade: &Grade) -> CoreResult<()> {
    conn.execute(
        "UPDATE submissions SET grade_id = NULL WHERE id = ?",
        [&grade.submission_id],
    )?;
    conn.execute("DELETE FROM grades WHERE id = ?", [&grade.id])?;
    Ok(())
}

/// Records a submission. A previously rejected attempt is superseded first;
/// an active one makes this a conflict.
pub fn submit(
    conn: &Connection,
    assignment_id: &str,
    student_id: &str,
    submission_link: &str,
) -> CoreResult<Submission> {
    let link = submission_link.trim();
    if link.is_empty() {
        return Err(CoreError::invalid("submissionLink must not be empty"));
    }
    let assignment = assignments::get_assignment(conn, assignment_id)?;
    if !courses::is_enrolled(conn, &assignment.course_id, student_id)? {
        return Err(CoreError::forbidden("student is not enrolled in this course"));
    }

    let tx = write_tx(conn)?;
    let ts = now_ts();
    if let Some(prior) = current_submission(&tx, assignment_id, student_id)? {
        if prior.status != SubmissionStatus::Rejected {
            return Err(CoreError::conflict("assignment already submitted"));
        }
        let prior_grade = grade_for_submission(&tx, &prior.id)?;
        tx.execute(
            "UPDATE submissions SET status = ?, superseded_at = ?, prior_feedback = ? WHERE id = ?",
            params![
                SubmissionStatus::Superseded.as_str(),
                ts,
                prior_grade.as_ref().and_then(|g| g.feedback.clone()),
                prior.id
            ],
        )?;
        if let Some(g) = prior_grade {
            delete_grade(&tx, &g)?;
        }
        info!("submission {} superseded by resubmission", prior.id);
    }

    let submission = Submission {
        id: Uuid::new_v4().to_string(),
        assignment_id: assignment_id.to_string(),
        student_id: student_id.to_string(),
        submission_link: link.to_string(),
        status: SubmissionStatus::Active,
        grade_id: None,
        prior_feedback: None,
        submitted_at: ts,
        superseded_at: None,
    };
    tx.execute(
        "INSERT INTO submissions(id, assignment_id, student_id, submission_link, status, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![
            submission.id,
            submission.assignment_id,
            submission.student_id,
            submission.submission_link,
            submission.status.as_str(),
            submission.submitted_at
        ],
    )?;
    tx.commit()?;
    info!(
        "submission {} for assignment {} by {}",
        submission.id, assignment_id, student_id
    );
    Ok(submission)
}

/// Grades or rejects a submission. Only the creator of the assignment's
/// course may grade. A rejected grade may be replaced; an accepted one may not.
pub fn assign_grade(
    conn: &Connection,
    submission_id: &str,
    decision: GradeDecision,
    grader_id: &str,
) -> CoreResult<Grade> {
    let submission = get_submission(conn, submission_id)?;
    let assignment = assignments::get_assignment(conn, &submission.assignment_id)?;
    let course = courses::get_course(conn, &assignment.course_id)?;
    if course.creator_id != grader_id {
        return Err(CoreError::forbidden("only the course creator can grade submissions"));
    }

    let tx = write_tx(conn)?;
    // Re-read under the write lock; a resubmission may have landed meanwhile.
    let submission = get_submission(&tx, submission_id)?;
    if submission.status == SubmissionStatus::Superseded {
        return Err(CoreError::conflict("submission was superseded by a resubmission"));
    }
    if let Some(existing) = grade_for_submission(&tx, submission_id)? {
        if existing.status == GradeStatus::Graded {
            return Err(CoreError::conflict("submission already graded"));
        }
        delete_grade(&tx, &existing)?;
    }

    let (status, letter, feedback) = match decision {
        GradeDecision::Graded { letter, feedback } => {
            (GradeStatus::Graded, letter.as_str().to_string(), feedback)
        }
        GradeDecision::Rejected { feedback } => (GradeStatus::Rejected, String::new(), Some(feedback)),
    };
    let grade = Grade {
        id: Uuid::new_v4().to_string(),
        submission_id: submission_id.to_string(),
        grader_id: grader_id.to_string(),
        status,
        grade: letter,
        feedback,
        graded_at: now_ts(),
    };
    tx.execute(
        "INSERT INTO grades(id, submission_id, grader_id, status, grade, feedback, graded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            grade.id,
            grade.submission_id,
            grade.grader_id,
            grade.status.as_str(),
            grade.grade,
            grade.feedback,
            grade.graded_at
        ],
    )?;
    let submission_status = match grade.status {
        GradeStatus::Graded => SubmissionStatus::Active,
        GradeStatus::Rejected => SubmissionStatus::Rejected,
    };
    tx.execute(
        "UPDATE submissions SET grade_id = ?, status = ? WHERE id = ?",
        params![grade.id, submission_status.as_str(), submission_id],
    )?;
    tx.commit()?;
    info!(
        "submission {} {} by {}",
        submission_id,
        grade.status.as_str(),
        grader_id
    );
    Ok(grade)
}

/// Mean grade points over the student's accepted grades, or `None` when
/// there are none.
pub fn student_average(conn: &Connection, student_id: &str) -> CoreResult<Option<f64>> {
    let mut stmt = conn.prepare(
        "SELECT g.grade
         FROM grades g
         JOIN submissions s ON s.id = g.submission_id
         WHERE s.student_id = ? AND g.status = 'graded'",
    )?;
    let letters = stmt
        .query_map([student_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(calc::average_grade_points(letters.iter().map(String::as_str)))
}

pub fn student_grades(conn: &Connection, student_id: &str) -> CoreResult<Vec<Grade>> {
    let mut stmt = conn.prepare(
        "SELECT g.id, g.submission_id, g.grader_id, g.status, g.grade, g.feedback, g.graded_at
         FROM grades g
         JOIN submissions s ON s.id = g.submission_id
         WHERE s.student_id = ?
         ORDER BY g.graded_at, g.id",
    )?;
    let rows = stmt
        .query_map([student_id], grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Current submissions for an assignment, with their grade if any.
pub fn list_submissions(conn: &Connection, assignment_id: &str) -> CoreResult<Vec<SubmissionWithGrade>> {
    assignments::get_assignment(conn, assignment_id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions
         WHERE assignment_id = ? AND status <> 'superseded'
         ORDER BY submitted_at, id"
    ))?;
    let submissions = stmt
        .query_map([assignment_id], submission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    submissions
        .into_iter()
        .map(|submission| -> CoreResult<SubmissionWithGrade> {
            let grade = grade_for_submission(conn, &submission.id)?;
            Ok(SubmissionWithGrade { submission, grade })
        })
        .collect()
}

/// Every attempt by one student on one assignment, newest first.
pub fn submission_history(conn: &Connection, assignment_id: &str, student_id: &str) -> CoreResult<Vec<Submission>> {
    assignments::get_assignment(conn, assignment_id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions
         WHERE assignment_id = ? AND student_id = ?
         ORDER BY submitted_at DESC, rowid DESC"
    ))?;
    let rows = stmt
        .query_map(params![assignment_id, student_id], submission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
