//! Category CRUD, scoped to the owning user.

use super::{Database, now_ms};
use crate::error::ApiError;
use crate::types::{Category, CategoryInput, CategoryPatch};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

fn parse_category_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get("id")?,
        user: row.get("user_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        as_workload: row.get("as_workload")?,
        priority: row.get("priority")?,
        created_at: row.get("created_at")?,
    })
}

/// Fetch a category only if it belongs to the given user. A foreign or
/// unknown id is indistinguishable from a missing one.
fn get_owned(conn: &Connection, user_id: &str, category_id: &str) -> Result<Option<Category>> {
    let result = conn.query_row(
        "SELECT * FROM categories WHERE id = ?1 AND user_id = ?2",
        params![category_id, user_id],
        parse_category_row,
    );

    match result {
        Ok(category) => Ok(Some(category)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// List a user's categories, ordered by name.
    pub fn list_categories(&self, user_id: &str) -> Result<Vec<Category>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM categories WHERE user_id = ?1 ORDER BY name")?;
            let categories = stmt
                .query_map(params![user_id], parse_category_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(categories)
        })
    }

    /// Create a category owned by the given user.
    pub fn create_category(&self, user_id: &str, input: CategoryInput) -> Result<Category> {
        if input.name.trim().is_empty() {
            return Err(ApiError::missing_field("name").into());
        }

        let id = Uuid::now_v7().to_string();
        let now = now_ms();
        let as_workload = input.as_workload.unwrap_or(true);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (id, user_id, name, description, as_workload, priority, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &id,
                    user_id,
                    &input.name,
                    &input.description,
                    as_workload,
                    input.priority,
                    now,
                ],
            )?;

            Ok(Category {
                id: id.clone(),
                user: user_id.to_string(),
                name: input.name.clone(),
                description: input.description.clone(),
                as_workload,
                priority: input.priority,
                created_at: now,
            })
        })
    }

    /// Get one of the user's categories by id.
    pub fn get_category(&self, user_id: &str, category_id: &str) -> Result<Category> {
        self.with_conn(|conn| {
            get_owned(conn, user_id, category_id)?
                .ok_or_else(|| ApiError::category_not_found(category_id).into())
        })
    }

    /// Partially update one of the user's categories.
    pub fn update_category(
        &self,
        user_id: &str,
        category_id: &str,
        patch: CategoryPatch,
    ) -> Result<Category> {
        self.with_conn(|conn| {
            let current = get_owned(conn, user_id, category_id)?
                .ok_or_else(|| anyhow::Error::new(ApiError::category_not_found(category_id)))?;

            let name = patch.name.unwrap_or(current.name);
            if name.trim().is_empty() {
                return Err(ApiError::missing_field("name").into());
            }
            let description = patch.description.unwrap_or(current.description);
            let as_workload = patch.as_workload.unwrap_or(current.as_workload);
            let priority = patch.priority.unwrap_or(current.priority);

            conn.execute(
                "UPDATE categories SET name = ?1, description = ?2, as_workload = ?3, priority = ?4
                 WHERE id = ?5",
                params![&name, &description, as_workload, priority, category_id],
            )?;

            Ok(Category {
                name,
                description,
                as_workload,
                priority,
                ..current
            })
        })
    }

    /// Delete one of the user's categories. Tasks in the category are
    /// detached (category set to null by the schema), never deleted.
    pub fn delete_category(&self, user_id: &str, category_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM categories WHERE id = ?1 AND user_id = ?2",
                params![category_id, user_id],
            )?;
            if deleted == 0 {
                return Err(ApiError::category_not_found(category_id).into());
            }
            Ok(())
        })
    }
}
