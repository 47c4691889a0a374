//! Tag CRUD, scoped to the owning user.

use super::{Database, now_ms};
use crate::error::ApiError;
use crate::types::{Tag, TagInput};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

fn parse_tag_row(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        user: row.get("user_id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

fn get_owned(conn: &Connection, user_id: &str, tag_id: &str) -> Result<Option<Tag>> {
    let result = conn.query_row(
        "SELECT * FROM tags WHERE id = ?1 AND user_id = ?2",
        params![tag_id, user_id],
        parse_tag_row,
    );

    match result {
        Ok(tag) => Ok(Some(tag)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// List a user's tags, ordered by name.
    pub fn list_tags(&self, user_id: &str) -> Result<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tags WHERE user_id = ?1 ORDER BY name")?;
            let tags = stmt
                .query_map(params![user_id], parse_tag_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(tags)
        })
    }

    /// Create a tag owned by the given user.
    pub fn create_tag(&self, user_id: &str, input: TagInput) -> Result<Tag> {
        if input.name.trim().is_empty() {
            return Err(ApiError::missing_field("name").into());
        }

        let id = Uuid::now_v7().to_string();
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tags (id, user_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![&id, user_id, &input.name, now],
            )?;

            Ok(Tag {
                id: id.clone(),
                user: user_id.to_string(),
                name: input.name.clone(),
                created_at: now,
            })
        })
    }

    /// Get one of the user's tags by id.
    pub fn get_tag(&self, user_id: &str, tag_id: &str) -> Result<Tag> {
        self.with_conn(|conn| {
            get_owned(conn, user_id, tag_id)?.ok_or_else(|| ApiError::tag_not_found(tag_id).into())
        })
    }

    /// Rename one of the user's tags.
    pub fn update_tag(&self, user_id: &str, tag_id: &str, input: TagInput) -> Result<Tag> {
        if input.name.trim().is_empty() {
            return Err(ApiError::missing_field("name").into());
        }

        self.with_conn(|conn| {
            let current = get_owned(conn, user_id, tag_id)?
                .ok_or_else(|| anyhow::Error::new(ApiError::tag_not_found(tag_id)))?;

            conn.execute(
                "UPDATE tags SET name = ?1 WHERE id = ?2",
                params![&input.name, tag_id],
            )?;

            Ok(Tag {
                name: input.name.clone(),
                ..current
            })
        })
    }

    /// Delete one of the user's tags. Task associations are removed by the
    /// schema; tasks themselves are untouched.
    pub fn delete_tag(&self, user_id: &str, tag_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tags WHERE id = ?1 AND user_id = ?2",
                params![tag_id, user_id],
            )?;
            if deleted == 0 {
                return Err(ApiError::tag_not_found(tag_id).into());
            }
            Ok(())
        })
    }
}
