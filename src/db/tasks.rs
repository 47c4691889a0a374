//! Task CRUD, hierarchy validation, and the delete cascade.

use super::{Database, now_ms, sql_placeholders};
use crate::error::ApiError;
use crate::shape;
use crate::types::{DeleteOutcome, SubtaskListing, TaskDetail, TaskInput, TaskPatch};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Raw task row as stored.
#[derive(Debug, Clone)]
pub(crate) struct TaskRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub estimated_time_ms: Option<i64>,
    pub due_date: Option<i64>,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub parent_task_id: Option<String>,
    pub category_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        estimated_time_ms: row.get("estimated_time_ms")?,
        due_date: row.get("due_date")?,
        completed: row.get("completed")?,
        completed_at: row.get("completed_at")?,
        parent_task_id: row.get("parent_task_id")?,
        category_id: row.get("category_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Fetch a task row only if it belongs to the given user. A foreign id is
/// indistinguishable from a missing one.
pub(crate) fn get_task_row(
    conn: &Connection,
    user_id: &str,
    task_id: &str,
) -> Result<Option<TaskRow>> {
    let result = conn.query_row(
        "SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2",
        params![task_id, user_id],
        parse_task_row,
    );

    match result {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn has_subtasks(conn: &Connection, task_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tasks WHERE parent_task_id = ?1)",
        params![task_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Replace the tag associations of a task.
fn sync_task_tags(conn: &Connection, task_id: &str, tags: &[String]) -> Result<()> {
    conn.execute("DELETE FROM task_tags WHERE task_id = ?1", params![task_id])?;
    for tag in tags {
        conn.execute(
            "INSERT INTO task_tags (task_id, tag_id) VALUES (?1, ?2)",
            params![task_id, tag],
        )?;
    }
    Ok(())
}

fn dedupe(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Cross-reference validation for a task write. Failures carry the offending
/// field and never leave side effects; they mirror the error messages the
/// client already understands.
fn validate_relations(
    conn: &Connection,
    user_id: &str,
    current: Option<&TaskRow>,
    parent_id: Option<&str>,
    category_id: Option<&str>,
    tag_ids: Option<&[String]>,
) -> Result<()> {
    if let Some(pid) = parent_id {
        if current.is_some_and(|task| task.id == pid) {
            return Err(
                ApiError::invalid_value("parent_task", "A task cannot be its own parent").into(),
            );
        }

        let parent = get_task_row(conn, user_id, pid)?.ok_or_else(|| {
            anyhow::Error::new(ApiError::invalid_value(
                "parent_task",
                "Invalid parent task selection",
            ))
        })?;
        if parent.parent_task_id.is_some() {
            return Err(ApiError::invalid_value(
                "parent_task",
                "Subtasks cannot have their own subtasks",
            )
            .into());
        }

        // The invariant holds from both sides: a task that already has
        // subtasks may not itself become a subtask.
        if let Some(task) = current
            && has_subtasks(conn, &task.id)?
        {
            return Err(ApiError::invalid_value(
                "parent_task",
                "Subtasks cannot have their own subtasks",
            )
            .into());
        }
    }

    if let Some(cid) = category_id {
        let owned: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1 AND user_id = ?2)",
            params![cid, user_id],
            |row| row.get(0),
        )?;
        if !owned {
            return Err(ApiError::invalid_value("category", "Invalid category selection").into());
        }
    }

    if let Some(tags) = tag_ids
        && !tags.is_empty()
    {
        let unique = dedupe(tags);
        let sql = format!(
            "SELECT COUNT(*) FROM tags WHERE user_id = ? AND id IN ({})",
            sql_placeholders(unique.len())
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        params_vec.push(Box::new(user_id.to_string()));
        for id in &unique {
            params_vec.push(Box::new(id.clone()));
        }
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();
        let owned: i64 = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
        if owned != unique.len() as i64 {
            return Err(ApiError::invalid_value("tags", "One or more tags are invalid").into());
        }
    }

    Ok(())
}

/// Serialize task rows into full records, batching the related lookups.
///
/// Returns the details for `rows` (order preserved) plus details for any
/// direct subtasks of those rows that were not part of `rows` themselves.
pub(crate) fn assemble_details(
    conn: &Connection,
    user_id: &str,
    rows: Vec<TaskRow>,
) -> Result<(Vec<TaskDetail>, Vec<TaskDetail>)> {
    if rows.is_empty() {
        return Ok((vec![], vec![]));
    }

    let matched_ids: HashSet<String> = rows.iter().map(|r| r.id.clone()).collect();

    // Direct subtasks of the matched rows, in creation order.
    let child_sql = format!(
        "SELECT * FROM tasks WHERE user_id = ? AND parent_task_id IN ({}) ORDER BY created_at",
        sql_placeholders(matched_ids.len())
    );
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    params_vec.push(Box::new(user_id.to_string()));
    for id in &matched_ids {
        params_vec.push(Box::new(id.clone()));
    }
    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&child_sql)?;
    let children: Vec<TaskRow> = stmt
        .query_map(params_refs.as_slice(), parse_task_row)?
        .collect::<rusqlite::Result<_>>()?;
    drop(stmt);

    let mut children_by_parent: HashMap<String, Vec<String>> = HashMap::new();
    for child in &children {
        if let Some(pid) = &child.parent_task_id {
            children_by_parent
                .entry(pid.clone())
                .or_default()
                .push(child.id.clone());
        }
    }

    let related: Vec<TaskRow> = children
        .into_iter()
        .filter(|c| !matched_ids.contains(&c.id))
        .collect();

    // Tag ids and names for every record, ordered by tag name.
    let all_ids: Vec<String> = rows
        .iter()
        .chain(related.iter())
        .map(|r| r.id.clone())
        .collect();
    let tag_sql = format!(
        "SELECT tt.task_id, g.id, g.name FROM task_tags tt
         INNER JOIN tags g ON g.id = tt.tag_id
         WHERE tt.task_id IN ({}) ORDER BY g.name",
        sql_placeholders(all_ids.len())
    );
    let params_vec: Vec<Box<dyn rusqlite::ToSql>> = all_ids
        .iter()
        .map(|id| Box::new(id.clone()) as Box<dyn rusqlite::ToSql>)
        .collect();
    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&tag_sql)?;
    let mut tags_by_task: HashMap<String, (Vec<String>, Vec<String>)> = HashMap::new();
    let tag_rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    for tag_row in tag_rows {
        let (task_id, tag_id, tag_name) = tag_row?;
        let entry = tags_by_task.entry(task_id).or_default();
        entry.0.push(tag_id);
        entry.1.push(tag_name);
    }
    drop(stmt);

    // Category names for the user (small, fetched once).
    let mut stmt = conn.prepare("SELECT id, name FROM categories WHERE user_id = ?1")?;
    let category_names: HashMap<String, String> = stmt
        .query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<_>>()?;
    drop(stmt);

    // A subtask with no category of its own inherits the parent's category
    // name for display. Look up category ids of parents outside the set.
    let mut category_by_task: HashMap<String, Option<String>> = rows
        .iter()
        .chain(related.iter())
        .map(|r| (r.id.clone(), r.category_id.clone()))
        .collect();
    let missing_parents: Vec<String> = rows
        .iter()
        .chain(related.iter())
        .filter_map(|r| r.parent_task_id.clone())
        .filter(|pid| !category_by_task.contains_key(pid))
        .collect();
    if !missing_parents.is_empty() {
        let parent_sql = format!(
            "SELECT id, category_id FROM tasks WHERE id IN ({})",
            sql_placeholders(missing_parents.len())
        );
        let params_vec: Vec<Box<dyn rusqlite::ToSql>> = missing_parents
            .iter()
            .map(|id| Box::new(id.clone()) as Box<dyn rusqlite::ToSql>)
            .collect();
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();
        let mut stmt = conn.prepare(&parent_sql)?;
        let parent_rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        for parent_row in parent_rows {
            let (id, category_id) = parent_row?;
            category_by_task.insert(id, category_id);
        }
    }

    let mut build = |row: TaskRow| -> TaskDetail {
        let (tags, tag_names) = tags_by_task.remove(&row.id).unwrap_or_default();
        let own_name = row
            .category_id
            .as_ref()
            .and_then(|cid| category_names.get(cid).cloned());
        let category_name = own_name.or_else(|| {
            row.parent_task_id
                .as_ref()
                .and_then(|pid| category_by_task.get(pid).cloned().flatten())
                .and_then(|cid| category_names.get(&cid).cloned())
        });
        let sub_tasks = children_by_parent.remove(&row.id).unwrap_or_default();

        TaskDetail {
            id: row.id,
            title: row.title,
            description: row.description,
            estimated_time_ms: row.estimated_time_ms,
            due_date: row.due_date,
            completed: row.completed,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user: row.user_id,
            parent_task: row.parent_task_id,
            category: row.category_id,
            category_name,
            has_subtasks: !sub_tasks.is_empty(),
            sub_tasks,
            tags,
            tag_names,
        }
    };

    let details: Vec<TaskDetail> = rows.into_iter().map(&mut build).collect();
    let related_details: Vec<TaskDetail> = related.into_iter().map(&mut build).collect();

    Ok((details, related_details))
}

impl Database {
    /// Create a task owned by the given user.
    pub fn create_task(&self, user_id: &str, input: TaskInput) -> Result<TaskDetail> {
        let task_id = Uuid::now_v7().to_string();
        let now = now_ms();
        let title = input
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled".to_string());
        let tags = dedupe(&input.tags);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            validate_relations(
                &tx,
                user_id,
                None,
                input.parent_task.as_deref(),
                input.category.as_deref(),
                Some(&tags),
            )?;

            let completed_at = if input.completed { Some(now) } else { None };

            tx.execute(
                "INSERT INTO tasks (
                    id, user_id, title, description, estimated_time_ms, due_date,
                    completed, completed_at, parent_task_id, category_id, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    &task_id,
                    user_id,
                    &title,
                    &input.description,
                    input.estimated_time_ms,
                    input.due_date,
                    input.completed,
                    completed_at,
                    &input.parent_task,
                    &input.category,
                    now,
                    now,
                ],
            )?;

            sync_task_tags(&tx, &task_id, &tags)?;

            let row = get_task_row(&tx, user_id, &task_id)?
                .ok_or_else(|| anyhow::anyhow!("task vanished during create"))?;
            let (mut details, _) = assemble_details(&tx, user_id, vec![row])?;

            tx.commit()?;
            Ok(details.remove(0))
        })
    }

    /// Get one of the user's tasks with related data.
    pub fn task_detail(&self, user_id: &str, task_id: &str) -> Result<TaskDetail> {
        self.with_conn(|conn| {
            let row = get_task_row(conn, user_id, task_id)?
                .ok_or_else(|| anyhow::Error::new(ApiError::task_not_found(task_id)))?;
            let (mut details, _) = assemble_details(conn, user_id, vec![row])?;
            Ok(details.remove(0))
        })
    }

    /// Apply a partial (or, via `TaskPatch::from(TaskInput)`, full) update.
    ///
    /// `completed_at` is derived on every save: set when `completed` flips
    /// false to true, cleared when it flips back.
    pub fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<TaskDetail> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task = get_task_row(&tx, user_id, task_id)?
                .ok_or_else(|| anyhow::Error::new(ApiError::task_not_found(task_id)))?;

            let title = match patch.title {
                Some(t) if t.trim().is_empty() => {
                    return Err(ApiError::missing_field("title").into());
                }
                Some(t) => t,
                None => task.title.clone(),
            };
            let description = patch.description.unwrap_or(task.description.clone());
            let estimated_time_ms = patch.estimated_time_ms.unwrap_or(task.estimated_time_ms);
            let due_date = patch.due_date.unwrap_or(task.due_date);
            let parent_task = patch.parent_task.unwrap_or(task.parent_task_id.clone());
            let category = patch.category.unwrap_or(task.category_id.clone());
            let tags = patch.tags.as_deref().map(dedupe);

            validate_relations(
                &tx,
                user_id,
                Some(&task),
                parent_task.as_deref(),
                category.as_deref(),
                tags.as_deref(),
            )?;

            let completed = patch.completed.unwrap_or(task.completed);
            let completed_at = match (task.completed, completed) {
                (false, true) => Some(now),
                (true, false) => None,
                _ => task.completed_at,
            };

            tx.execute(
                "UPDATE tasks SET
                    title = ?1, description = ?2, estimated_time_ms = ?3, due_date = ?4,
                    completed = ?5, completed_at = ?6, parent_task_id = ?7, category_id = ?8,
                    updated_at = ?9
                WHERE id = ?10",
                params![
                    &title,
                    &description,
                    estimated_time_ms,
                    due_date,
                    completed,
                    completed_at,
                    &parent_task,
                    &category,
                    now,
                    task_id,
                ],
            )?;

            if let Some(tags) = &tags {
                sync_task_tags(&tx, task_id, tags)?;
            }

            let row = get_task_row(&tx, user_id, task_id)?
                .ok_or_else(|| anyhow::anyhow!("task vanished during update"))?;
            let (mut details, _) = assemble_details(&tx, user_id, vec![row])?;

            tx.commit()?;
            Ok(details.remove(0))
        })
    }

    /// Delete a task and cascade over its subtasks.
    ///
    /// With `keep_subtasks` (the default) the subtasks survive as top-level
    /// tasks: the id set is collected, the rows are reparented to null, and
    /// the task row is removed, all in one transaction. The orphans are then
    /// re-fetched and reported in the shaped listing form. With
    /// `keep_subtasks = false` the collected subtasks are hard-deleted in
    /// the same transaction and their ids reported.
    pub fn delete_task(
        &self,
        user_id: &str,
        task_id: &str,
        keep_subtasks: bool,
    ) -> Result<DeleteOutcome> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if get_task_row(&tx, user_id, task_id)?.is_none() {
                return Err(ApiError::task_not_found(task_id).into());
            }

            let mut stmt = tx.prepare(
                "SELECT id FROM tasks WHERE parent_task_id = ?1 ORDER BY created_at",
            )?;
            let sub_ids: Vec<String> = stmt
                .query_map(params![task_id], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            drop(stmt);

            if keep_subtasks {
                tx.execute(
                    "UPDATE tasks SET parent_task_id = NULL, updated_at = ?1
                     WHERE parent_task_id = ?2",
                    params![now, task_id],
                )?;
            } else if !sub_ids.is_empty() {
                let sql = format!(
                    "DELETE FROM tasks WHERE id IN ({})",
                    sql_placeholders(sub_ids.len())
                );
                let params_vec: Vec<Box<dyn rusqlite::ToSql>> = sub_ids
                    .iter()
                    .map(|id| Box::new(id.clone()) as Box<dyn rusqlite::ToSql>)
                    .collect();
                let params_refs: Vec<&dyn rusqlite::ToSql> =
                    params_vec.iter().map(|b| b.as_ref()).collect();
                tx.execute(&sql, params_refs.as_slice())?;
            }

            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;

            tx.commit()?;

            let sub_count = sub_ids.len();
            if !keep_subtasks {
                return Ok(DeleteOutcome {
                    sub_count,
                    subtasks: None,
                    deleted: Some(sub_ids),
                });
            }

            // Re-fetch the orphans now that their parent is gone.
            let mut orphans = Vec::new();
            for id in &sub_ids {
                if let Some(row) = get_task_row(conn, user_id, id)? {
                    orphans.push(row);
                }
            }
            let (details, related) = assemble_details(conn, user_id, orphans)?;

            Ok(DeleteOutcome {
                sub_count,
                subtasks: Some(shape::build_page(details, related)),
                deleted: None,
            })
        })
    }

    /// List the direct subtasks of one of the user's tasks, in creation order.
    pub fn subtask_listing(&self, user_id: &str, task_id: &str) -> Result<SubtaskListing> {
        self.with_conn(|conn| {
            if get_task_row(conn, user_id, task_id)?.is_none() {
                return Err(ApiError::task_not_found(task_id).into());
            }

            let mut stmt = conn.prepare(
                "SELECT * FROM tasks WHERE parent_task_id = ?1 AND user_id = ?2
                 ORDER BY created_at",
            )?;
            let rows: Vec<TaskRow> = stmt
                .query_map(params![task_id, user_id], parse_task_row)?
                .collect::<rusqlite::Result<_>>()?;
            drop(stmt);

            let (details, _) = assemble_details(conn, user_id, rows)?;
            Ok(shape::build_subtask_listing(details))
        })
    }
}
