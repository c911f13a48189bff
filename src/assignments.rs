use crate::courses;
use crate::db::now_ts;
use crate::error::{CoreError, CoreResult};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: String,
    pub due_date: Option<String>,
    pub created_at: String,
}

pub struct NewAssignment<'a> {
    pub course_id: &'a str,
    pub creator_id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub due_date: Option<&'a str>,
}

fn assignment_from_row(r: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: r.get(0)?,
        course_id: r.get(1)?,
        title: r.get(2)?,
        description: r.get(3)?,
        due_date: r.get(4)?,
        created_at: r.get(5)?,
    })
}

/// Only the course creator may add assignments to it.
pub fn create_assignment(conn: &Connection, input: NewAssignment<'_>) -> CoreResult<Assignment> {
    let course = courses::get_course(conn, input.course_id)?;
    if course.creator_id != input.creator_id {
        return Err(CoreError::forbidden("only the course creator can add assignments"));
    }
    let title = input.title.trim();
    if title.is_empty() {
        return Err(CoreError::invalid("title must not be empty"));
    }
    if let Some(due) = input.due_date {
        if chrono::NaiveDate::parse_from_str(due, "%Y-%m-%d").is_err() {
            return Err(CoreError::invalid("dueDate must be YYYY-MM-DD"));
        }
    }
    let assignment = Assignment {
        id: Uuid::new_v4().to_string(),
        course_id: course.id,
        title: title.to_string(),
        description: input.description.unwrap_or_default().to_string(),
        due_date: input.due_date.map(str::to_string),
        created_at: now_ts(),
    };
    conn.execute(
        "INSERT INTO assignments(id, course_id, title, description, due_date, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![
            assignment.id,
            assignment.course_id,
            assignment.title,
            assignment.description,
            assignment.due_date,
            assignment.created_at
        ],
    )?;
    info!("assignment {} created in course {}", assignment.id, assignment.course_id);
    Ok(assignment)
}

pub fn get_assignment(conn: &Connection, assignment_id: &str) -> CoreResult<Assignment> {
    conn.query_row(
        "SELECT id, course_id, title, description, due_date, created_at
         FROM assignments WHERE id = ?",
        [assignment_id],
        assignment_from_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::not_found("assignment not found"))
}

pub fn list_assignments(conn: &Connection, course_id: &str) -> CoreResult<Vec<Assignment>> {
    courses::require_course(conn, course_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, course_id, title, description, due_date, created_at
         FROM assignments WHERE course_id = ?
         ORDER BY due_date IS NULL, due_date, created_at, id",
    )?;
    let rows = stmt
        .query_map([course_id], assignment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
