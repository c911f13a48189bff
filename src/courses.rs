use crate::db::{now_ts, write_tx};
use crate::error::{CoreError, CoreResult};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub creator_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    #[serde(flatten)]
    pub course: Course,
    pub module_count: i64,
    pub lecture_count: i64,
    pub student_count: i64,
}

const COURSE_COLUMNS: &str = "id, title, description, creator_id, created_at, updated_at";

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: r.get(0)?,
        title: r.get(1)?,
        description: r.get(2)?,
        creator_id: r.get(3)?,
        created_at: r.get(4)?,
        updated_at: r.get(5)?,
    })
}

pub fn create_course(
    conn: &Connection,
    title: &str,
    description: Option<&str>,
    creator_id: &str,
) -> CoreResult<Course> {
    let title = title.trim();
    if title.is_empty() {
        return Err(CoreError::invalid("title must not be empty"));
    }
    let creator_id = creator_id.trim();
    if creator_id.is_empty() {
        return Err(CoreError::invalid("creatorId must not be empty"));
    }
    let ts = now_ts();
    let course = Course {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        description: description.unwrap_or_default().to_string(),
        creator_id: creator_id.to_string(),
        created_at: ts.clone(),
        updated_at: ts,
    };
    conn.execute(
        "INSERT INTO courses(id, title, description, creator_id, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![
            course.id,
            course.title,
            course.description,
            course.creator_id,
            course.created_at,
            course.updated_at
        ],
    )?;
    info!("course {} created by {}", course.id, course.creator_id);
    Ok(course)
}

pub fn get_course(conn: &Connection, course_id: &str) -> CoreResult<Course> {
    conn.query_row(
        &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?"),
        [course_id],
        course_from_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::not_found("course not found"))
}

pub fn require_course(conn: &Connection, course_id: &str) -> CoreResult<()> {
    let exists = conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |_r| Ok(()))
        .optional()?;
    match exists {
        Some(()) => Ok(()),
        None => Err(CoreError::not_found("course not found")),
    }
}

pub fn list_courses(conn: &Connection, creator_id: Option<&str>) -> CoreResult<Vec<CourseSummary>> {
    // Correlated subqueries keep the counts independent of each other.
    let mut stmt = conn.prepare(
        "SELECT
           c.id, c.title, c.description, c.creator_id, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM course_modules m WHERE m.course_id = c.id),
           (SELECT COUNT(*) FROM lectures l WHERE l.course_id = c.id),
           (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id)
         FROM courses c
         WHERE ?1 IS NULL OR c.creator_id = ?1
         ORDER BY c.title, c.id",
    )?;
    let rows = stmt
        .query_map([creator_id], |r| {
            Ok(CourseSummary {
                course: course_from_row(r)?,
                module_count: r.get(6)?,
                lecture_count: r.get(7)?,
                student_count: r.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Removes a course and everything hanging off it, children first.
pub fn delete_course(conn: &Connection, course_id: &str) -> CoreResult<()> {
    require_course(conn, course_id)?;
    let tx = write_tx(conn)?;
    tx.execute(
        "UPDATE submissions SET grade_id = NULL
         WHERE assignment_id IN (SELECT id FROM assignments WHERE course_id = ?)",
        [course_id],
    )?;
    tx.execute(
        "DELETE FROM grades WHERE submission_id IN (
           SELECT s.id FROM submissions s
           JOIN assignments a ON a.id = s.assignment_id
           WHERE a.course_id = ?
         )",
        [course_id],
    )?;
    tx.execute(
        "DELETE FROM submissions
         WHERE assignment_id IN (SELECT id FROM assignments WHERE course_id = ?)",
        [course_id],
    )?;
    tx.execute("DELETE FROM assignments WHERE course_id = ?", [course_id])?;
    tx.execute(
        "DELETE FROM progress_completions
         WHERE progress_id IN (SELECT id FROM progress WHERE course_id = ?)",
        [course_id],
    )?;
    tx.execute("DELETE FROM progress WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM lectures WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM course_modules WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM enrollments WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM courses WHERE id = ?", [course_id])?;
    tx.commit()?;
    info!("course {} deleted", course_id);
    Ok(())
}

/// Returns true when the student was not enrolled before.
pub fn enroll(conn: &Connection, course_id: &str, student_id: &str) -> CoreResult<bool> {
    require_course(conn, course_id)?;
    let student_id = student_id.trim();
    if student_id.is_empty() {
        return Err(CoreError::invalid("studentId must not be empty"));
    }
    let n = conn.execute(
        "INSERT OR IGNORE INTO enrollments(course_id, student_id, enrolled_at) VALUES(?, ?, ?)",
        params![course_id, student_id, now_ts()],
    )?;
    if n > 0 {
        info!("student {} enrolled in course {}", student_id, course_id);
    }
    Ok(n > 0)
}

pub fn unenroll(conn: &Connection, course_id: &str, student_id: &str) -> CoreResult<bool> {
    require_course(conn, course_id)?;
    let n = conn.execute(
        "DELETE FROM enrollments WHERE course_id = ? AND student_id = ?",
        params![course_id, student_id],
    )?;
    Ok(n > 0)
}

/// The course-side enrollment table is the only record of who may submit.
pub fn is_enrolled(conn: &Connection, course_id: &str, student_id: &str) -> CoreResult<bool> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE course_id = ? AND student_id = ?",
            params![course_id, student_id],
            |_r| Ok(()),
        )
        .optional()?;
    Ok(hit.is_some())
}

pub fn enrolled_students(conn: &Connection, course_id: &str) -> CoreResult<Vec<String>> {
    require_course(conn, course_id)?;
    let mut stmt = conn.prepare(
        "SELECT student_id FROM enrollments WHERE course_id = ? ORDER BY enrolled_at, student_id",
    )?;
    let ids = stmt
        .query_map([course_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn enrolled_courses(conn: &Connection, student_id: &str) -> CoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT course_id FROM enrollments WHERE student_id = ? ORDER BY enrolled_at, course_id",
    )?;
    let ids = stmt
        .query_map([student_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
