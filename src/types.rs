//! Core types for the Task Organizer backend.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// A registered user. The password hash never leaves the persistence layer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: i64,
}

/// A server-side session backing a bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
}

/// A user-defined grouping for tasks. `as_workload` marks whether tasks in
/// this category count toward workload accounting; `priority` is an optional
/// sort key (nulls sort last).
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: String,
    pub user: String,
    pub name: String,
    pub description: Option<String>,
    pub as_workload: bool,
    pub priority: Option<i64>,
    pub created_at: i64,
}

/// A user-defined label, many-to-many with tasks.
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: String,
    pub user: String,
    pub name: String,
    pub created_at: i64,
}

/// A fully serialized task record, including related category/tag names and
/// the ids of its direct subtasks. Subtasks with no category of their own
/// display the parent's category name.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub estimated_time_ms: Option<i64>,
    pub due_date: Option<i64>,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub user: String,
    pub parent_task: Option<String>,
    pub category: Option<String>,
    pub category_name: Option<String>,
    pub tags: Vec<String>,
    pub tag_names: Vec<String>,
    pub has_subtasks: bool,
    pub sub_tasks: Vec<String>,
}

/// Shaped task listing: ordered id lists for top-level tasks partitioned by
/// completion, plus an id-indexed lookup covering every returned record
/// (subtasks included) so clients can resolve any referenced id without a
/// second fetch.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    pub total_count: usize,
    pub parent_count: usize,
    pub incomplete_count: usize,
    pub complete_count: usize,
    pub incomplete_tasks: Vec<String>,
    pub complete_tasks: Vec<String>,
    pub tasks: HashMap<String, TaskDetail>,
}

/// Flat listing of a task's direct subtasks: ordered ids plus lookup.
#[derive(Debug, Clone, Serialize)]
pub struct SubtaskListing {
    pub sub_tasks: Vec<String>,
    pub tasks: HashMap<String, TaskDetail>,
}

/// Result of deleting a task that may have had subtasks.
///
/// With `keep_subtasks` the orphaned subtasks are re-fetched and reported in
/// the shaped form; otherwise the deleted subtask ids are listed.
#[derive(Debug, Serialize)]
pub struct DeleteOutcome {
    pub sub_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<TaskPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<Vec<String>>,
}

// =============================================================================
// Request payloads
// =============================================================================

/// Payload for creating a task or fully replacing one (PUT).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub estimated_time_ms: Option<i64>,
    pub due_date: Option<i64>,
    #[serde(default)]
    pub completed: bool,
    pub parent_task: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial task update (PATCH). Nullable fields use a double `Option` so an
/// explicit JSON `null` clears the field while absence leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub estimated_time_ms: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<i64>>,
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_task: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

impl From<TaskInput> for TaskPatch {
    /// A full replace is a patch where every field is present.
    fn from(input: TaskInput) -> Self {
        TaskPatch {
            title: Some(input.title.unwrap_or_else(|| "Untitled".to_string())),
            description: Some(input.description),
            estimated_time_ms: Some(input.estimated_time_ms),
            due_date: Some(input.due_date),
            completed: Some(input.completed),
            parent_task: Some(input.parent_task),
            category: Some(input.category),
            tags: Some(input.tags),
        }
    }
}

/// Payload for creating or replacing a category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub as_workload: Option<bool>,
    pub priority: Option<i64>,
}

/// Partial category update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub as_workload: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub priority: Option<Option<i64>>,
}

/// Payload for creating a tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagInput {
    pub name: String,
}

/// Registration payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Login payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Partial profile update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

/// Deserialize a field that distinguishes "absent" from "explicitly null".
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let patch: TaskPatch = serde_json::from_str(r#"{"due_date": null}"#).unwrap();
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.description, None);

        let patch: TaskPatch = serde_json::from_str(r#"{"due_date": 1700000000000}"#).unwrap();
        assert_eq!(patch.due_date, Some(Some(1_700_000_000_000)));
    }

    #[test]
    fn replace_defaults_title() {
        let patch = TaskPatch::from(TaskInput::default());
        assert_eq!(patch.title.as_deref(), Some("Untitled"));
        assert_eq!(patch.tags, Some(vec![]));
    }
}
