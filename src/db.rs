use crate::config::Config;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;

pub fn open_db(workspace: &Path, config: &Config) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(&config.db_file_name);
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(config.busy_timeout)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates every table and index the daemon uses. Safe to run on an existing
/// workspace.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            creator_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_creator ON courses(creator_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            course_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            enrolled_at TEXT NOT NULL,
            PRIMARY KEY(course_id, student_id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_modules(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            sort_order INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_modules_course_sort ON course_modules(course_id, sort_order)",
        [],
    )?;

    // module_id NULL marks a lecture created before modules existed, or one
    // detached by a non-cascading module delete.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS lectures(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            module_id TEXT,
            title TEXT NOT NULL,
            is_preview INTEGER NOT NULL DEFAULT 0,
            media_url TEXT,
            sort_order INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(module_id) REFERENCES course_modules(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lectures_course ON lectures(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lectures_module_sort ON lectures(module_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS progress(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            last_lecture_id TEXT,
            last_accessed_at TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id),
            UNIQUE(student_id, course_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS progress_completions(
            progress_id TEXT NOT NULL,
            lecture_id TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            PRIMARY KEY(progress_id, lecture_id),
            FOREIGN KEY(progress_id) REFERENCES progress(id),
            FOREIGN KEY(lecture_id) REFERENCES lectures(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_progress_completions_lecture ON progress_completions(lecture_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            due_date TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_course ON assignments(course_id)",
        [],
    )?;

    // grade_id and grades.submission_id point at each other; the grade row is
    // written after the submission and unlinked before it is deleted.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            submission_link TEXT NOT NULL,
            status TEXT NOT NULL,
            grade_id TEXT,
            prior_feedback TEXT,
            submitted_at TEXT NOT NULL,
            superseded_at TEXT,
            FOREIGN KEY(assignment_id) REFERENCES assignments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL UNIQUE,
            grader_id TEXT NOT NULL,
            status TEXT NOT NULL,
            grade TEXT NOT NULL,
            feedback TEXT,
            graded_at TEXT NOT NULL,
            FOREIGN KEY(submission_id) REFERENCES submissions(id)
        )",
        [],
    )?;
    ensure_submissions_lifecycle_columns(conn)?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_submissions_current
         ON submissions(assignment_id, student_id)
         WHERE status <> 'superseded'",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_student ON submissions(student_id)",
        [],
    )?;

    Ok(())
}

// Workspaces written before resubmission history existed have a submissions
// table without these columns. An old row is current; it is `rejected` when
// its grade says so, otherwise `active`.
fn ensure_submissions_lifecycle_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "submissions", "status")? {
        conn.execute(
            "ALTER TABLE submissions ADD COLUMN status TEXT NOT NULL DEFAULT 'active'",
            [],
        )?;
        if table_has_column(conn, "grades", "status")? {
            conn.execute(
                "UPDATE submissions SET status = 'rejected'
                 WHERE id IN (SELECT submission_id FROM grades WHERE status = 'rejected')",
                [],
            )?;
        }
    }
    if !table_has_column(conn, "submissions", "prior_feedback")? {
        conn.execute("ALTER TABLE submissions ADD COLUMN prior_feedback TEXT", [])?;
    }
    if !table_has_column(conn, "submissions", "superseded_at")? {
        conn.execute("ALTER TABLE submissions ADD COLUMN superseded_at TEXT", [])?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Starts a write transaction that takes the database write lock up front, so
/// a competing daemon waits (up to the busy timeout) instead of interleaving.
pub fn write_tx(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
pub fn open_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_init_is_idempotent() {
        let conn = open_memory();
        init_schema(&conn).expect("second init");
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('courses','enrollments','course_modules','lectures','progress',
                  'progress_completions','assignments','submissions','grades')",
                [],
                |r| r.get(0),
            )
            .expect("count tables");
        assert_eq!(n, 9);
    }

    #[test]
    fn old_submissions_table_gets_lifecycle_columns() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch(
            "CREATE TABLE submissions(
                id TEXT PRIMARY KEY,
                assignment_id TEXT NOT NULL,
                student_id TEXT NOT NULL,
                submission_link TEXT NOT NULL,
                grade_id TEXT,
                submitted_at TEXT NOT NULL
            );
            CREATE TABLE grades(
                id TEXT PRIMARY KEY,
                submission_id TEXT NOT NULL UNIQUE,
                grader_id TEXT NOT NULL,
                status TEXT NOT NULL,
                grade TEXT NOT NULL,
                feedback TEXT,
                graded_at TEXT NOT NULL
            );
            INSERT INTO submissions VALUES('s1', 'a1', 'stu', 'https://x', 'g1', '2024-01-01');
            INSERT INTO submissions VALUES('s2', 'a2', 'stu', 'https://y', 'g2', '2024-01-02');
            INSERT INTO submissions VALUES('s3', 'a3', 'stu', 'https://z', NULL, '2024-01-03');
            INSERT INTO grades VALUES('g1', 's1', 'owner', 'graded', 'A', NULL, '2024-01-05');
            INSERT INTO grades VALUES('g2', 's2', 'owner', 'rejected', '', 'redo', '2024-01-05');",
        )
        .expect("old schema");
        init_schema(&conn).expect("upgrade");
        assert!(table_has_column(&conn, "submissions", "superseded_at").expect("pragma"));
        let status = |id: &str| -> String {
            conn.query_row("SELECT status FROM submissions WHERE id = ?", [id], |r| r.get(0))
                .expect("status")
        };
        assert_eq!(status("s1"), "active");
        assert_eq!(status("s2"), "rejected");
        assert_eq!(status("s3"), "active");
    }
}
