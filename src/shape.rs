//! Flattening of task record sequences into the wire shape.
//!
//! A task listing is delivered as ordered id lists for top-level tasks
//! (partitioned by completion) plus an id-indexed lookup holding every
//! record, so nested payloads are never duplicated. This is a flattening
//! transform only: the id lists preserve the order the query engine
//! produced.

use crate::types::{SubtaskListing, TaskDetail, TaskPage};
use std::collections::HashMap;

/// Build a shaped page from the filtered/sorted result set plus any related
/// subtask records that were pre-loaded for the lookup but did not match the
/// filters themselves.
pub fn build_page(matched: Vec<TaskDetail>, related: Vec<TaskDetail>) -> TaskPage {
    let mut incomplete_tasks = Vec::new();
    let mut complete_tasks = Vec::new();
    let mut tasks: HashMap<String, TaskDetail> = HashMap::with_capacity(matched.len());

    for detail in matched {
        if detail.parent_task.is_none() {
            if detail.completed {
                complete_tasks.push(detail.id.clone());
            } else {
                incomplete_tasks.push(detail.id.clone());
            }
        }
        tasks.insert(detail.id.clone(), detail);
    }

    for detail in related {
        tasks.entry(detail.id.clone()).or_insert(detail);
    }

    let incomplete_count = incomplete_tasks.len();
    let complete_count = complete_tasks.len();

    TaskPage {
        total_count: tasks.len(),
        parent_count: incomplete_count + complete_count,
        incomplete_count,
        complete_count,
        incomplete_tasks,
        complete_tasks,
        tasks,
    }
}

/// Build the flat subtask listing: ordered ids plus lookup.
pub fn build_subtask_listing(subtasks: Vec<TaskDetail>) -> SubtaskListing {
    let sub_tasks: Vec<String> = subtasks.iter().map(|d| d.id.clone()).collect();
    let tasks = subtasks.into_iter().map(|d| (d.id.clone(), d)).collect();
    SubtaskListing { sub_tasks, tasks }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(id: &str, parent: Option<&str>, completed: bool) -> TaskDetail {
        TaskDetail {
            id: id.to_string(),
            title: format!("task {}", id),
            description: None,
            estimated_time_ms: None,
            due_date: None,
            completed,
            completed_at: completed.then_some(1),
            created_at: 1,
            updated_at: 1,
            user: "u1".to_string(),
            parent_task: parent.map(str::to_string),
            category: None,
            category_name: None,
            tags: vec![],
            tag_names: vec![],
            has_subtasks: false,
            sub_tasks: vec![],
        }
    }

    #[test]
    fn partitions_top_level_by_completion() {
        let page = build_page(
            vec![
                detail("a", None, false),
                detail("b", None, true),
                detail("c", None, false),
            ],
            vec![],
        );

        assert_eq!(page.incomplete_tasks, vec!["a", "c"]);
        assert_eq!(page.complete_tasks, vec!["b"]);
        assert_eq!(page.parent_count, 3);
        assert_eq!(page.total_count, 3);
    }

    #[test]
    fn subtasks_appear_only_in_lookup() {
        let page = build_page(
            vec![detail("a", None, false)],
            vec![detail("s1", Some("a"), false), detail("s2", Some("a"), true)],
        );

        assert_eq!(page.incomplete_tasks, vec!["a"]);
        assert!(page.complete_tasks.is_empty());
        assert_eq!(page.total_count, 3);
        assert_eq!(page.parent_count, 1);
        assert!(page.tasks.contains_key("s1"));
        assert!(page.tasks.contains_key("s2"));
    }

    #[test]
    fn every_listed_id_resolves_and_lists_are_disjoint() {
        let page = build_page(
            vec![
                detail("a", None, false),
                detail("b", None, true),
                detail("s", Some("a"), false),
            ],
            vec![],
        );

        for id in page.incomplete_tasks.iter().chain(&page.complete_tasks) {
            assert!(page.tasks.contains_key(id));
            assert!(page.tasks[id].parent_task.is_none());
        }
        assert!(!page.incomplete_tasks.iter().any(|id| page.complete_tasks.contains(id)));
    }

    #[test]
    fn order_is_preserved_not_resorted() {
        let page = build_page(
            vec![
                detail("z", None, false),
                detail("a", None, false),
                detail("m", None, false),
            ],
            vec![],
        );
        assert_eq!(page.incomplete_tasks, vec!["z", "a", "m"]);
    }

    #[test]
    fn subtask_listing_keeps_order() {
        let listing = build_subtask_listing(vec![
            detail("s2", Some("a"), false),
            detail("s1", Some("a"), true),
        ]);
        assert_eq!(listing.sub_tasks, vec!["s2", "s1"]);
        assert_eq!(listing.tasks.len(), 2);
    }
}
