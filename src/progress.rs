use crate::calc::{self, ProgressStatus};
use crate::courses;
use crate::curriculum;
use crate::db::now_ts;
use crate::error::{CoreError, CoreResult};
use log::debug;
use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub progress_id: String,
    pub student_id: String,
    pub course_id: String,
    pub completed_lecture_ids: Vec<String>,
    /// `None` while the course has no lectures.
    pub progress_percentage: Option<i64>,
    pub status: ProgressStatus,
    pub last_lecture_id: Option<String>,
    pub last_accessed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionUpdate {
    pub completed_lecture_ids: Vec<String>,
    pub progress_percentage: Option<i64>,
    pub newly_completed: bool,
}

fn require_ids(student_id: &str, course_id: &str) -> CoreResult<()> {
    if student_id.trim().is_empty() {
        return Err(CoreError::invalid("studentId must not be empty"));
    }
    if course_id.trim().is_empty() {
        return Err(CoreError::invalid("courseId must not be empty"));
    }
    Ok(())
}

fn require_lecture_in_course(conn: &Connection, course_id: &str, lecture_id: &str) -> CoreResult<()> {
    if curriculum::lecture_in_course(conn, course_id, lecture_id)? {
        Ok(())
    } else {
        Err(CoreError::not_found("lecture not found in course"))
    }
}

/// Returns the progress id for the pair, creating the record when absent.
///
/// The insert is ignored when the (student, course) key already exists, so
/// two callers racing here both end up reading the single surviving row.
pub fn get_or_create(conn: &Connection, student_id: &str, course_id: &str) -> CoreResult<String> {
    require_ids(student_id, course_id)?;
    courses::require_course(conn, course_id)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO progress(id, student_id, course_id, created_at) VALUES(?, ?, ?, ?)",
        params![Uuid::new_v4().to_string(), student_id, course_id, now_ts()],
    )?;
    if inserted > 0 {
        debug!("progress created for student {} in course {}", student_id, course_id);
    }
    let id = conn.query_row(
        "SELECT id FROM progress WHERE student_id = ? AND course_id = ?",
        params![student_id, course_id],
        |r| r.get::<_, String>(0),
    )?;
    Ok(id)
}

/// Completed lectures that still belong to the course, in completion order.
fn completed_ids(conn: &Connection, progress_id: &str, course_id: &str) -> CoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT pc.lecture_id
         FROM progress_completions pc
         JOIN lectures l ON l.id = pc.lecture_id
         WHERE pc.progress_id = ? AND l.course_id = ?
         ORDER BY pc.completed_at, pc.rowid",
    )?;
    let ids = stmt
        .query_map(params![progress_id, course_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn percentage(conn: &Connection, course_id: &str, completed: usize) -> CoreResult<Option<i64>> {
    let total = curriculum::lecture_count(conn, course_id)?;
    Ok(calc::progress_percentage(completed, total))
}

/// Reads (and lazily creates) the record; the percentage is recomputed
/// against the course's lectures as they are right now.
pub fn course_progress(conn: &Connection, student_id: &str, course_id: &str) -> CoreResult<CourseProgress> {
    let progress_id = get_or_create(conn, student_id, course_id)?;
    let (last_lecture_id, last_accessed_at) = conn.query_row(
        "SELECT last_lecture_id, last_accessed_at FROM progress WHERE id = ?",
        [&progress_id],
        |r| Ok((r.get::<_, Option<String>>(0)?, r.get::<_, Option<String>>(1)?)),
    )?;
    let completed = completed_ids(conn, &progress_id, course_id)?;
    let pct = percentage(conn, course_id, completed.len())?;
    Ok(CourseProgress {
        progress_id,
        student_id: student_id.to_string(),
        course_id: course_id.to_string(),
        status: calc::progress_status(completed.len(), pct),
        completed_lecture_ids: completed,
        progress_percentage: pct,
        last_lecture_id,
        last_accessed_at,
    })
}

/// Idempotent: a lecture already in the completed set changes nothing.
pub fn mark_lecture_completed(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    lecture_id: &str,
) -> CoreResult<CompletionUpdate> {
    let progress_id = get_or_create(conn, student_id, course_id)?;
    require_lecture_in_course(conn, course_id, lecture_id)?;

    let ts = now_ts();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO progress_completions(progress_id, lecture_id, completed_at)
         VALUES(?, ?, ?)",
        params![progress_id, lecture_id, ts],
    )?;
    if inserted > 0 {
        conn.execute(
            "UPDATE progress SET last_lecture_id = ?, last_accessed_at = ? WHERE id = ?",
            params![lecture_id, ts, progress_id],
        )?;
        debug!("student {} completed lecture {}", student_id, lecture_id);
    }

    let completed = completed_ids(conn, &progress_id, course_id)?;
    let pct = percentage(conn, course_id, completed.len())?;
    Ok(CompletionUpdate {
        completed_lecture_ids: completed,
        progress_percentage: pct,
        newly_completed: inserted > 0,
    })
}

pub fn update_last_accessed(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    lecture_id: &str,
) -> CoreResult<()> {
    let progress_id = get_or_create(conn, student_id, course_id)?;
    require_lecture_in_course(conn, course_id, lecture_id)?;
    conn.execute(
        "UPDATE progress SET last_lecture_id = ?, last_accessed_at = ? WHERE id = ?",
        params![lecture_id, now_ts(), progress_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory;

    struct Fixture {
        conn: Connection,
        course_id: String,
        module_id: String,
        lectures: Vec<String>,
    }

    fn fixture(lecture_count: usize) -> Fixture {
        let conn = open_memory();
        let course_id = courses::create_course(&conn, "C", None, "owner")
            .expect("course")
            .id;
        let module_id = curriculum::create_module(&conn, &course_id, "M", None)
            .expect("module")
            .id;
        let lectures = (0..lecture_count)
            .map(|i| {
                curriculum::create_lecture_in_module(&conn, &module_id, &format!("L{i}"))
                    .expect("lecture")
                    .id
            })
            .collect();
        Fixture {
            conn,
            course_id,
            module_id,
            lectures,
        }
    }

    #[test]
    fn get_or_create_returns_same_record() {
        let f = fixture(1);
        let a = get_or_create(&f.conn, "s1", &f.course_id).expect("first");
        let b = get_or_create(&f.conn, "s1", &f.course_id).expect("second");
        assert_eq!(a, b);
        let n: i64 = f
            .conn
            .query_row("SELECT COUNT(*) FROM progress", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 1);
    }

    #[test]
    fn percentage_recomputes_when_lectures_are_added() {
        let f = fixture(4);
        let u = mark_lecture_completed(&f.conn, "s1", &f.course_id, &f.lectures[0]).expect("1");
        assert_eq!(u.progress_percentage, Some(25));
        let u = mark_lecture_completed(&f.conn, "s1", &f.course_id, &f.lectures[1]).expect("2");
        assert_eq!(u.progress_percentage, Some(50));

        curriculum::create_lecture_in_module(&f.conn, &f.module_id, "L4").expect("fifth");
        let p = course_progress(&f.conn, "s1", &f.course_id).expect("progress");
        assert_eq!(p.progress_percentage, Some(40));
        assert_eq!(p.status, ProgressStatus::InProgress);
        assert_eq!(p.last_lecture_id.as_deref(), Some(f.lectures[1].as_str()));
    }

    #[test]
    fn marking_twice_is_a_no_op() {
        let f = fixture(2);
        let first = mark_lecture_completed(&f.conn, "s1", &f.course_id, &f.lectures[0]).expect("1");
        assert!(first.newly_completed);
        let again = mark_lecture_completed(&f.conn, "s1", &f.course_id, &f.lectures[0]).expect("2");
        assert!(!again.newly_completed);
        assert_eq!(again.completed_lecture_ids, vec![f.lectures[0].clone()]);
        assert_eq!(again.progress_percentage, first.progress_percentage);
    }

    #[test]
    fn completing_everything_reaches_complete() {
        let f = fixture(2);
        for l in &f.lectures {
            mark_lecture_completed(&f.conn, "s1", &f.course_id, l).expect("mark");
        }
        let p = course_progress(&f.conn, "s1", &f.course_id).expect("progress");
        assert_eq!(p.progress_percentage, Some(100));
        assert_eq!(p.status, ProgressStatus::Complete);
    }

    #[test]
    fn empty_course_has_no_percentage() {
        let f = fixture(0);
        let p = course_progress(&f.conn, "s1", &f.course_id).expect("progress");
        assert_eq!(p.progress_percentage, None);
        assert_eq!(p.status, ProgressStatus::NotStarted);
    }

    #[test]
    fn last_accessed_does_not_complete() {
        let f = fixture(2);
        update_last_accessed(&f.conn, "s1", &f.course_id, &f.lectures[1]).expect("touch");
        let p = course_progress(&f.conn, "s1", &f.course_id).expect("progress");
        assert!(p.completed_lecture_ids.is_empty());
        assert_eq!(p.progress_percentage, Some(0));
        assert_eq!(p.last_lecture_id.as_deref(), Some(f.lectures[1].as_str()));
        assert!(p.last_accessed_at.is_some());

        let err = update_last_accessed(&f.conn, "s1", &f.course_id, "ghost").unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn cascaded_lecture_delete_drops_completion() {
        let f = fixture(2);
        mark_lecture_completed(&f.conn, "s1", &f.course_id, &f.lectures[0]).expect("mark");
        curriculum::delete_lecture(&f.conn, &f.lectures[0]).expect("delete");
        let p = course_progress(&f.conn, "s1", &f.course_id).expect("progress");
        assert!(p.completed_lecture_ids.is_empty());
        assert_eq!(p.last_lecture_id, None);
        assert_eq!(p.progress_percentage, Some(0));
    }

    #[test]
    fn cascaded_module_delete_drops_completions_and_pointer() {
        let f = fixture(2);
        let other = curriculum::create_module(&f.conn, &f.course_id, "Other", None).expect("other");
        let kept = curriculum::create_lecture_in_module(&f.conn, &other.id, "kept")
            .expect("kept")
            .id;
        mark_lecture_completed(&f.conn, "s1", &f.course_id, &kept).expect("mark kept");
        mark_lecture_completed(&f.conn, "s1", &f.course_id, &f.lectures[0]).expect("mark");
        update_last_accessed(&f.conn, "s1", &f.course_id, &f.lectures[1]).expect("touch");

        curriculum::delete_module(&f.conn, &f.module_id, true).expect("cascade");

        let p = course_progress(&f.conn, "s1", &f.course_id).expect("progress");
        assert_eq!(p.completed_lecture_ids, vec![kept]);
        assert_eq!(p.last_lecture_id, None);
        assert_eq!(p.progress_percentage, Some(100));
        let orphans: i64 = f
            .conn
            .query_row(
                "SELECT COUNT(*) FROM progress_completions WHERE lecture_id = ?",
                [&f.lectures[0]],
                |r| r.get(0),
            )
            .expect("count");
        assert_eq!(orphans, 0);
    }
}
