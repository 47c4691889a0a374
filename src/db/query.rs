//! The task query engine: lenient parameter parsing, filter composition,
//! and multi-key ordering over a user's tasks.

use super::Database;
use super::tasks::{TaskRow, assemble_details, parse_task_row};
use crate::shape;
use crate::types::TaskPage;
use anyhow::Result;
use chrono::{DateTime, Utc};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Filter on the parent relation: top-level only, or children of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentFilter {
    TopLevel,
    Of(String),
}

/// Filter on the category relation: uncategorized, or one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    None,
    Id(String),
}

/// Symbolic due-date buckets, evaluated against "today" at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueBucket {
    Past,
    Overdue,
    Today,
    Week,
    Future,
    None,
}

impl DueBucket {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "past" => Some(DueBucket::Past),
            "overdue" => Some(DueBucket::Overdue),
            "today" => Some(DueBucket::Today),
            "week" => Some(DueBucket::Week),
            "future" => Some(DueBucket::Future),
            "none" => Some(DueBucket::None),
            _ => None,
        }
    }
}

/// Recognized sort fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    DueDate,
    CategoryPriority,
    Duration,
    CreatedAt,
    SubtaskCount,
}

/// One requested `field:direction` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    /// Parse a `field:direction` entry; unknown fields are dropped.
    fn parse(value: &str) -> Option<Self> {
        let (field, direction) = value.split_once(':').unwrap_or((value, "asc"));
        let field = match field {
            "dueDate" => SortField::DueDate,
            "categoryPriority" => SortField::CategoryPriority,
            "duration" => SortField::Duration,
            "createdAt" => SortField::CreatedAt,
            "numOfSubtasks" => SortField::SubtaskCount,
            _ => return None,
        };
        Some(SortKey {
            field,
            descending: direction.eq_ignore_ascii_case("desc"),
        })
    }
}

/// Parsed task-list query. All filters are optional and combined with AND.
#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub parent: Option<ParentFilter>,
    pub completed: Option<bool>,
    pub category: Option<CategoryFilter>,
    pub due: Option<DueBucket>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort: Vec<SortKey>,
}

impl TaskFilters {
    /// Parse raw query-string pairs. Unknown keys, unrecognized symbolic
    /// values, and malformed sort entries are ignored rather than rejected,
    /// so unknown future parameters never break older clients.
    pub fn from_params(params: &[(String, String)]) -> Self {
        let mut filters = TaskFilters::default();
        for (key, value) in params {
            match key.as_str() {
                "parent_task" => {
                    filters.parent = Some(if value == "null" {
                        ParentFilter::TopLevel
                    } else {
                        ParentFilter::Of(value.clone())
                    });
                }
                "completed" | "status" => match value.to_ascii_lowercase().as_str() {
                    "true" => filters.completed = Some(true),
                    "false" => filters.completed = Some(false),
                    _ => {}
                },
                "category" | "component" => {
                    filters.category = Some(if value == "null" {
                        CategoryFilter::None
                    } else {
                        CategoryFilter::Id(value.clone())
                    });
                }
                "due_date" => {
                    if let Some(bucket) = DueBucket::parse(value) {
                        filters.due = Some(bucket);
                    }
                }
                "tag" => filters.tag = Some(value.clone()),
                "search" => filters.search = Some(value.clone()),
                "sort_by" => {
                    if let Some(sort_key) = SortKey::parse(value) {
                        filters.sort.push(sort_key);
                    }
                }
                _ => {}
            }
        }
        filters
    }

    /// Filters for the top-level listing: parentless tasks, default order.
    pub fn top_level() -> Self {
        TaskFilters {
            parent: Some(ParentFilter::TopLevel),
            ..TaskFilters::default()
        }
    }
}

/// UTC calendar-day boundaries for bucket evaluation:
/// (start of today, start of tomorrow, start of today + 7 days).
fn day_bounds(now_ms: i64) -> (i64, i64, i64) {
    let today = DateTime::<Utc>::from_timestamp_millis(now_ms)
        .unwrap_or_else(Utc::now)
        .date_naive();
    let start = today
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(now_ms);
    (start, start + DAY_MS, start + 7 * DAY_MS)
}

/// Assemble the ORDER BY expression list for the requested sort keys.
///
/// Null placement follows SQLite's natural order (nulls are smallest:
/// ascending puts them first, descending last), except `dueDate` ascending
/// which explicitly pushes nulls last and tiebreaks on newest-first.
/// `createdAt` is always newest-first regardless of the requested direction.
/// The default order (due date ascending nulls-last, then newest-first) is
/// appended as the final tiebreak so equal keys stay deterministic.
fn order_clause(sort: &[SortKey]) -> String {
    let mut keys: Vec<String> = Vec::new();

    for sort_key in sort {
        let direction = if sort_key.descending { "DESC" } else { "ASC" };
        match sort_key.field {
            SortField::DueDate => {
                if sort_key.descending {
                    keys.push("t.due_date DESC".to_string());
                } else {
                    keys.push("(t.due_date IS NULL) ASC".to_string());
                    keys.push("t.due_date ASC".to_string());
                }
                keys.push("t.created_at DESC".to_string());
            }
            SortField::CategoryPriority => {
                keys.push(format!(
                    "(SELECT c.priority FROM categories c WHERE c.id = t.category_id) {}",
                    direction
                ));
            }
            SortField::Duration => {
                keys.push(format!("t.estimated_time_ms {}", direction));
            }
            SortField::CreatedAt => {
                keys.push("t.created_at DESC".to_string());
            }
            SortField::SubtaskCount => {
                keys.push(format!(
                    "(SELECT COUNT(*) FROM tasks s WHERE s.parent_task_id = t.id) {}",
                    direction
                ));
            }
        }
    }

    keys.push("(t.due_date IS NULL) ASC".to_string());
    keys.push("t.due_date ASC".to_string());
    keys.push("t.created_at DESC".to_string());

    keys.join(", ")
}

impl Database {
    /// Run the filtered, ordered task query for a user and shape the result.
    ///
    /// The owner-equality filter is always present; `now_ms` anchors the
    /// due-date buckets so behavior is reproducible in tests.
    pub fn list_task_page(
        &self,
        user_id: &str,
        filters: &TaskFilters,
        now_ms: i64,
    ) -> Result<TaskPage> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT t.* FROM tasks t WHERE t.user_id = ?");
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            params_vec.push(Box::new(user_id.to_string()));

            match &filters.parent {
                Some(ParentFilter::TopLevel) => sql.push_str(" AND t.parent_task_id IS NULL"),
                Some(ParentFilter::Of(parent_id)) => {
                    sql.push_str(" AND t.parent_task_id = ?");
                    params_vec.push(Box::new(parent_id.clone()));
                }
                None => {}
            }

            if let Some(completed) = filters.completed {
                sql.push_str(" AND t.completed = ?");
                params_vec.push(Box::new(completed));
            }

            match &filters.category {
                Some(CategoryFilter::None) => sql.push_str(" AND t.category_id IS NULL"),
                Some(CategoryFilter::Id(category_id)) => {
                    sql.push_str(" AND t.category_id = ?");
                    params_vec.push(Box::new(category_id.clone()));
                }
                None => {}
            }

            if let Some(bucket) = filters.due {
                let (today, tomorrow, week_end) = day_bounds(now_ms);
                match bucket {
                    DueBucket::Past => {
                        sql.push_str(" AND t.due_date IS NOT NULL AND t.due_date < ?");
                        params_vec.push(Box::new(today));
                    }
                    DueBucket::Overdue => {
                        sql.push_str(
                            " AND t.due_date IS NOT NULL AND t.due_date < ? AND t.completed = 0",
                        );
                        params_vec.push(Box::new(today));
                    }
                    DueBucket::Today => {
                        sql.push_str(" AND t.due_date >= ? AND t.due_date < ?");
                        params_vec.push(Box::new(today));
                        params_vec.push(Box::new(tomorrow));
                    }
                    DueBucket::Week => {
                        sql.push_str(" AND t.due_date >= ? AND t.due_date < ?");
                        params_vec.push(Box::new(today));
                        params_vec.push(Box::new(week_end));
                    }
                    DueBucket::Future => {
                        sql.push_str(" AND t.due_date >= ?");
                        params_vec.push(Box::new(week_end));
                    }
                    DueBucket::None => sql.push_str(" AND t.due_date IS NULL"),
                }
            }

            if let Some(tag_id) = &filters.tag {
                sql.push_str(" AND t.id IN (SELECT task_id FROM task_tags WHERE tag_id = ?)");
                params_vec.push(Box::new(tag_id.clone()));
            }

            if let Some(needle) = &filters.search {
                sql.push_str(
                    " AND (LOWER(t.title) LIKE '%' || LOWER(?) || '%'
                       OR LOWER(COALESCE(t.description, '')) LIKE '%' || LOWER(?) || '%')",
                );
                params_vec.push(Box::new(needle.clone()));
                params_vec.push(Box::new(needle.clone()));
            }

            sql.push_str(" ORDER BY ");
            sql.push_str(&order_clause(&filters.sort));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows: Vec<TaskRow> = stmt
                .query_map(params_refs.as_slice(), parse_task_row)?
                .collect::<rusqlite::Result<_>>()?;
            drop(stmt);

            let (details, related) = assemble_details(conn, user_id, rows)?;
            Ok(shape::build_page(details, related))
        })
    }
}
