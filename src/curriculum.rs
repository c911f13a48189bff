//! Course -> module -> lecture tree.
//!
//! Modules own their lectures. The course-wide lecture list that older
//! clients read is not stored anywhere; [`course_lectures`] derives it from
//! the tree on every call, so there is nothing to keep in sync.

use crate::courses;
use crate::db::{now_ts, write_tx};
use crate::error::{CoreError, CoreResult};
use crate::patch::FieldPatch;
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: String,
    pub order: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub id: String,
    pub course_id: String,
    pub module_id: Option<String>,
    pub title: String,
    pub is_preview: bool,
    pub media_url: Option<String>,
    pub order: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleWithLectures {
    #[serde(flatten)]
    pub module: Module,
    pub lectures: Vec<Lecture>,
}

#[derive(Debug, Default)]
pub struct ModulePatch {
    pub title: FieldPatch<String>,
    pub description: FieldPatch<String>,
}

#[derive(Debug, Default)]
pub struct LecturePatch {
    pub title: FieldPatch<String>,
    pub is_preview: FieldPatch<bool>,
    pub media_url: FieldPatch<Option<String>>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDeleted {
    pub deleted_lecture_ids: Vec<String>,
    pub unlinked_lecture_ids: Vec<String>,
}

const MODULE_COLUMNS: &str =
    "m.id, m.course_id, m.title, m.description, m.sort_order, m.created_at, m.updated_at";
const LECTURE_COLUMNS: &str = "l.id, l.course_id, l.module_id, l.title, l.is_preview, l.media_url, l.sort_order, l.created_at, l.updated_at";

fn module_from_row(r: &Row<'_>) -> rusqlite::Result<Module> {
    Ok(Module {
        id: r.get(0)?,
        course_id: r.get(1)?,
        title: r.get(2)?,
        description: r.get(3)?,
        order: r.get(4)?,
        created_at: r.get(5)?,
        updated_at: r.get(6)?,
    })
}

fn lecture_from_row(r: &Row<'_>) -> rusqlite::Result<Lecture> {
    Ok(Lecture {
        id: r.get(0)?,
        course_id: r.get(1)?,
        module_id: r.get(2)?,
        title: r.get(3)?,
        is_preview: r.get::<_, i64>(4)? != 0,
        media_url: r.get(5)?,
        order: r.get(6)?,
        created_at: r.get(7)?,
        updated_at: r.get(8)?,
    })
}

fn required_title(raw: &str) -> CoreResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(CoreError::invalid("title must not be empty"));
    }
    Ok(title.to_string())
}

/// Checks that `provided` is exactly a reordering of `existing`.
fn validate_permutation(kind: &str, provided: &[String], existing: &[String]) -> CoreResult<()> {
    let existing_set: HashSet<&str> = existing.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    for id in provided {
        if !seen.insert(id.as_str()) {
            return Err(CoreError::invalid(format!("duplicate {} id: {}", kind, id)));
        }
        if !existing_set.contains(id.as_str()) {
            return Err(CoreError::not_found(format!("{} not found: {}", kind, id)));
        }
    }
    let missing: Vec<&str> = existing
        .iter()
        .map(String::as_str)
        .filter(|id| !seen.contains(id))
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::invalid(format!(
            "order must list every {}; missing: {}",
            kind,
            missing.join(", ")
        )));
    }
    Ok(())
}

pub fn get_module(conn: &Connection, module_id: &str) -> CoreResult<Module> {
    conn.query_row(
        &format!("SELECT {MODULE_COLUMNS} FROM course_modules m WHERE m.id = ?"),
        [module_id],
        module_from_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::not_found("module not found"))
}

pub fn get_lecture(conn: &Connection, lecture_id: &str) -> CoreResult<Lecture> {
    conn.query_row(
        &format!("SELECT {LECTURE_COLUMNS} FROM lectures l WHERE l.id = ?"),
        [lecture_id],
        lecture_from_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::not_found("lecture not found"))
}

fn module_ids(conn: &Connection, course_id: &str) -> CoreResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM course_modules WHERE course_id = ? ORDER BY sort_order, id")?;
    let ids = stmt
        .query_map([course_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Lecture ids of one module, or of the module-less group when `module_id`
/// is `None`.
fn lecture_ids(conn: &Connection, course_id: &str, module_id: Option<&str>) -> CoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM lectures WHERE course_id = ? AND module_id IS ?
         ORDER BY sort_order, created_at, id",
    )?;
    let ids = stmt
        .query_map(params![course_id, module_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn compact_module_order(conn: &Connection, course_id: &str) -> CoreResult<()> {
    let ts = now_ts();
    for (idx, id) in module_ids(conn, course_id)?.iter().enumerate() {
        conn.execute(
            "UPDATE course_modules SET sort_order = ?, updated_at = ? WHERE id = ? AND sort_order <> ?",
            params![idx as i64, ts, id, idx as i64],
        )?;
    }
    Ok(())
}

fn compact_lecture_order(conn: &Connection, course_id: &str, module_id: Option<&str>) -> CoreResult<()> {
    for (idx, id) in lecture_ids(conn, course_id, module_id)?.iter().enumerate() {
        conn.execute(
            "UPDATE lectures SET sort_order = ? WHERE id = ? AND sort_order <> ?",
            params![idx as i64, id, idx as i64],
        )?;
    }
    Ok(())
}

/// Drops completion marks and last-accessed pointers for lectures about to go.
fn forget_lectures_in_progress(conn: &Connection, lecture_ids: &[String]) -> CoreResult<()> {
    for id in lecture_ids {
        conn.execute("DELETE FROM progress_completions WHERE lecture_id = ?", [id])?;
        conn.execute(
            "UPDATE progress SET last_lecture_id = NULL WHERE last_lecture_id = ?",
            [id],
        )?;
    }
    Ok(())
}

pub fn create_module(
    conn: &Connection,
    course_id: &str,
    title: &str,
    description: Option<&str>,
) -> CoreResult<Module> {
    let title = required_title(title)?;
    let tx = write_tx(conn)?;
    courses::require_course(&tx, course_id)?;
    let order: i64 = tx.query_row(
        "SELECT COUNT(*) FROM course_modules WHERE course_id = ?",
        [course_id],
        |r| r.get(0),
    )?;
    let ts = now_ts();
    let module = Module {
        id: Uuid::new_v4().to_string(),
        course_id: course_id.to_string(),
        title,
        description: description.unwrap_or_default().to_string(),
        order,
        created_at: ts.clone(),
        updated_at: ts,
    };
    tx.execute(
        "INSERT INTO course_modules(id, course_id, title, description, sort_order, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            module.id,
            module.course_id,
            module.title,
            module.description,
            module.order,
            module.created_at,
            module.updated_at
        ],
    )?;
    tx.commit()?;
    info!("module {} created in course {} at {}", module.id, course_id, order);
    Ok(module)
}

/// Modules in order, each carrying its lectures in order.
pub fn list_modules(conn: &Connection, course_id: &str) -> CoreResult<Vec<ModuleWithLectures>> {
    courses::require_course(conn, course_id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {MODULE_COLUMNS} FROM course_modules m
         WHERE m.course_id = ?
         ORDER BY m.sort_order, m.id"
    ))?;
    let modules = stmt
        .query_map([course_id], module_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {LECTURE_COLUMNS} FROM lectures l
         WHERE l.course_id = ? AND l.module_id IS NOT NULL
         ORDER BY l.sort_order, l.created_at, l.id"
    ))?;
    let mut by_module: HashMap<String, Vec<Lecture>> = HashMap::new();
    for lecture in stmt.query_map([course_id], lecture_from_row)? {
        let lecture = lecture?;
        if let Some(mid) = lecture.module_id.clone() {
            by_module.entry(mid).or_default().push(lecture);
        }
    }

    Ok(modules
        .into_iter()
        .map(|module| {
            let lectures = by_module.remove(&module.id).unwrap_or_default();
            ModuleWithLectures { module, lectures }
        })
        .collect())
}

pub fn update_module(conn: &Connection, module_id: &str, patch: ModulePatch) -> CoreResult<Module> {
    let current = get_module(conn, module_id)?;
    if !patch.title.is_set() && !patch.description.is_set() {
        return Ok(current);
    }
    let title = patch.title.apply(current.title);
    let description = patch.description.apply(current.description);
    conn.execute(
        "UPDATE course_modules SET title = ?, description = ?, updated_at = ? WHERE id = ?",
        params![title, description, now_ts(), module_id],
    )?;
    get_module(conn, module_id)
}

/// Unlinks a module from its course. With `cascade` its lectures are deleted;
/// without it they survive as module-less lectures of the same course.
pub fn delete_module(conn: &Connection, module_id: &str, cascade: bool) -> CoreResult<ModuleDeleted> {
    let tx = write_tx(conn)?;
    let module = get_module(&tx, module_id)?;
    let owned = lecture_ids(&tx, &module.course_id, Some(module_id))?;
    let mut outcome = ModuleDeleted::default();
    if cascade {
        forget_lectures_in_progress(&tx, &owned)?;
        tx.execute("DELETE FROM lectures WHERE module_id = ?", [module_id])?;
        outcome.deleted_lecture_ids = owned;
    } else {
        let base: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM lectures
             WHERE course_id = ? AND module_id IS NULL",
            [&module.course_id],
            |r| r.get(0),
        )?;
        let ts = now_ts();
        for (idx, id) in owned.iter().enumerate() {
            tx.execute(
                "UPDATE lectures SET module_id = NULL, sort_order = ?, updated_at = ? WHERE id = ?",
                params![base + idx as i64, ts, id],
            )?;
        }
        outcome.unlinked_lecture_ids = owned;
    }
    tx.execute("DELETE FROM course_modules WHERE id = ?", [module_id])?;
    compact_module_order(&tx, &module.course_id)?;
    tx.commit()?;

    info!(
        "module {} deleted (cascade={}, lectures={})",
        module_id,
        cascade,
        outcome.deleted_lecture_ids.len() + outcome.unlinked_lecture_ids.len()
    );
    Ok(outcome)
}

/// Sets each module's order to its index in `ordered_ids`, which must be a
/// permutation of the course's modules.
pub fn reorder_modules(conn: &Connection, course_id: &str, ordered_ids: &[String]) -> CoreResult<()> {
    let tx = write_tx(conn)?;
    courses::require_course(&tx, course_id)?;
    let existing = module_ids(&tx, course_id)?;
    validate_permutation("module", ordered_ids, &existing)?;
    let ts = now_ts();
    for (idx, id) in ordered_ids.iter().enumerate() {
        tx.execute(
            "UPDATE course_modules SET sort_order = ?, updated_at = ? WHERE course_id = ? AND id = ?",
            params![idx as i64, ts, course_id, id],
        )?;
    }
    tx.commit()?;
    Ok(())
}

fn insert_lecture(conn: &Connection, lecture: &Lecture) -> CoreResult<()> {
    conn.execute(
        "INSERT INTO lectures(id, course_id, module_id, title, is_preview, media_url, sort_order, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            lecture.id,
            lecture.course_id,
            lecture.module_id,
            lecture.title,
            lecture.is_preview as i64,
            lecture.media_url,
            lecture.order,
            lecture.created_at,
            lecture.updated_at
        ],
    )?;
    Ok(())
}

fn new_lecture(course_id: &str, module_id: Option<&str>, title: String, order: i64) -> Lecture {
    let ts = now_ts();
    Lecture {
        id: Uuid::new_v4().to_string(),
        course_id: course_id.to_string(),
        module_id: module_id.map(str::to_string),
        title,
        is_preview: false,
        media_url: None,
        order,
        created_at: ts.clone(),
        updated_at: ts,
    }
}

/// Appends a lecture to a module. It shows up in the course-wide lecture list
/// immediately because that list is derived from the tree.
pub fn create_lecture_in_module(conn: &Connection, module_id: &str, title: &str) -> CoreResult<Lecture> {
    let title = required_title(title)?;
    let tx = write_tx(conn)?;
    let module = get_module(&tx, module_id)?;
    let order: i64 = tx.query_row(
        "SELECT COUNT(*) FROM lectures WHERE module_id = ?",
        [module_id],
        |r| r.get(0),
    )?;
    let lecture = new_lecture(&module.course_id, Some(module_id), title, order);
    insert_lecture(&tx, &lecture)?;
    tx.commit()?;
    info!("lecture {} created in module {}", lecture.id, module_id);
    Ok(lecture)
}

/// Legacy path: a lecture attached to the course but to no module.
pub fn create_unassigned_lecture(conn: &Connection, course_id: &str, title: &str) -> CoreResult<Lecture> {
    let title = required_title(title)?;
    let tx = write_tx(conn)?;
    courses::require_course(&tx, course_id)?;
    let order: i64 = tx.query_row(
        "SELECT COUNT(*) FROM lectures WHERE course_id = ? AND module_id IS NULL",
        [course_id],
        |r| r.get(0),
    )?;
    let lecture = new_lecture(course_id, None, title, order);
    insert_lecture(&tx, &lecture)?;
    tx.commit()?;
    info!("module-less lecture {} created in course {}", lecture.id, course_id);
    Ok(lecture)
}

pub fn update_lecture(conn: &Connection, lecture_id: &str, patch: LecturePatch) -> CoreResult<Lecture> {
    let current = get_lecture(conn, lecture_id)?;
    if !patch.title.is_set() && !patch.is_preview.is_set() && !patch.media_url.is_set() {
        return Ok(current);
    }
    let title = patch.title.apply(current.title);
    let is_preview = patch.is_preview.apply(current.is_preview);
    let media_url = patch.media_url.apply(current.media_url);
    conn.execute(
        "UPDATE lectures SET title = ?, is_preview = ?, media_url = ?, updated_at = ? WHERE id = ?",
        params![title, is_preview as i64, media_url, now_ts(), lecture_id],
    )?;
    get_lecture(conn, lecture_id)
}

/// Sets each lecture's order to its index; `ordered_ids` must be a
/// permutation of the module's current lectures.
pub fn reorder_lectures(conn: &Connection, module_id: &str, ordered_ids: &[String]) -> CoreResult<()> {
    let tx = write_tx(conn)?;
    let module = get_module(&tx, module_id)?;
    let existing = lecture_ids(&tx, &module.course_id, Some(module_id))?;
    validate_permutation("lecture", ordered_ids, &existing)?;
    let ts = now_ts();
    for (idx, id) in ordered_ids.iter().enumerate() {
        tx.execute(
            "UPDATE lectures SET sort_order = ?, updated_at = ? WHERE module_id = ? AND id = ?",
            params![idx as i64, ts, module_id, id],
        )?;
    }
    tx.commit()?;
    Ok(())
}

pub fn delete_lecture(conn: &Connection, lecture_id: &str) -> CoreResult<()> {
    let tx = write_tx(conn)?;
    let lecture = get_lecture(&tx, lecture_id)?;
    forget_lectures_in_progress(&tx, std::slice::from_ref(&lecture.id))?;
    tx.execute("DELETE FROM lectures WHERE id = ?", [lecture_id])?;
    compact_lecture_order(&tx, &lecture.course_id, lecture.module_id.as_deref())?;
    tx.commit()?;
    info!("lecture {} deleted", lecture_id);
    Ok(())
}

/// The flat course lecture list: module lectures in module order, then the
/// module-less ones.
pub fn course_lectures(conn: &Connection, course_id: &str) -> CoreResult<Vec<Lecture>> {
    courses::require_course(conn, course_id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {LECTURE_COLUMNS}
         FROM lectures l
         LEFT JOIN course_modules m ON m.id = l.module_id
         WHERE l.course_id = ?
         ORDER BY m.sort_order IS NULL, m.sort_order, l.sort_order, l.created_at, l.id"
    ))?;
    let rows = stmt
        .query_map([course_id], lecture_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn lecture_count(conn: &Connection, course_id: &str) -> CoreResult<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM lectures WHERE course_id = ?",
        [course_id],
        |r| r.get(0),
    )?;
    Ok(n.max(0) as usize)
}

pub fn lecture_in_course(conn: &Connection, course_id: &str, lecture_id: &str) -> CoreResult<bool> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM lectures WHERE course_id = ? AND id = ?",
            params![course_id, lecture_id],
            |_r| Ok(()),
        )
        .optional()?;
    Ok(hit.is_some())
}
