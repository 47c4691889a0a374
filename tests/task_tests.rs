//! Integration tests for task CRUD, hierarchy validation, the completed_at
//! derivation, and the delete cascade.

use task_organizer::db::Database;
use task_organizer::error::{ApiError, ErrorCode};
use task_organizer::types::{
    CategoryInput, RegisterInput, TagInput, TaskInput, TaskPatch,
};

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn register(db: &Database, username: &str) -> String {
    db.create_user(RegisterInput {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: "correct-horse-battery".to_string(),
        confirm_password: "correct-horse-battery".to_string(),
        first_name: String::new(),
        last_name: String::new(),
    })
    .expect("Failed to register user")
    .id
}

fn titled(title: &str) -> TaskInput {
    TaskInput {
        title: Some(title.to_string()),
        ..TaskInput::default()
    }
}

fn api_err(err: anyhow::Error) -> ApiError {
    ApiError::from(err)
}

mod crud {
    use super::*;

    #[test]
    fn create_applies_defaults() {
        let db = setup_db();
        let user = register(&db, "defaults");

        let task = db.create_task(&user, TaskInput::default()).unwrap();

        assert_eq!(task.title, "Untitled");
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
        assert!(task.parent_task.is_none());
        assert!(task.category.is_none());
        assert!(task.tags.is_empty());
        assert!(!task.has_subtasks);
        assert_eq!(task.user, user);
    }

    #[test]
    fn blank_title_falls_back_to_untitled() {
        let db = setup_db();
        let user = register(&db, "blank");
        let task = db.create_task(&user, titled("   ")).unwrap();
        assert_eq!(task.title, "Untitled");
    }

    #[test]
    fn patch_updates_only_provided_fields() {
        let db = setup_db();
        let user = register(&db, "patcher");
        let task = db
            .create_task(
                &user,
                TaskInput {
                    description: Some("keep me".to_string()),
                    due_date: Some(1_700_000_000_000),
                    ..titled("original")
                },
            )
            .unwrap();

        let updated = db
            .update_task(
                &user,
                &task.id,
                TaskPatch {
                    title: Some("renamed".to_string()),
                    ..TaskPatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.description.as_deref(), Some("keep me"));
        assert_eq!(updated.due_date, Some(1_700_000_000_000));
    }

    #[test]
    fn explicit_null_clears_nullable_fields() {
        let db = setup_db();
        let user = register(&db, "clearer");
        let task = db
            .create_task(
                &user,
                TaskInput {
                    due_date: Some(1_700_000_000_000),
                    ..titled("dated")
                },
            )
            .unwrap();

        let patch: TaskPatch = serde_json::from_str(r#"{"due_date": null}"#).unwrap();
        let updated = db.update_task(&user, &task.id, patch).unwrap();
        assert!(updated.due_date.is_none());
    }

    #[test]
    fn replace_clears_omitted_fields() {
        let db = setup_db();
        let user = register(&db, "replacer");
        let task = db
            .create_task(
                &user,
                TaskInput {
                    description: Some("gone soon".to_string()),
                    due_date: Some(1_700_000_000_000),
                    ..titled("full")
                },
            )
            .unwrap();

        let replaced = db
            .update_task(&user, &task.id, TaskPatch::from(titled("bare")))
            .unwrap();

        assert_eq!(replaced.title, "bare");
        assert!(replaced.description.is_none());
        assert!(replaced.due_date.is_none());
    }

    #[test]
    fn update_replaces_tag_associations() {
        let db = setup_db();
        let user = register(&db, "tagger");
        let home = db
            .create_tag(&user, TagInput { name: "home".to_string() })
            .unwrap();
        let work = db
            .create_tag(&user, TagInput { name: "work".to_string() })
            .unwrap();

        let task = db
            .create_task(
                &user,
                TaskInput {
                    tags: vec![home.id.clone()],
                    ..titled("tagged")
                },
            )
            .unwrap();
        assert_eq!(task.tag_names, vec!["home"]);

        let updated = db
            .update_task(
                &user,
                &task.id,
                TaskPatch {
                    tags: Some(vec![work.id.clone()]),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.tags, vec![work.id]);
        assert_eq!(updated.tag_names, vec!["work"]);
    }

    #[test]
    fn subtask_without_category_inherits_parent_category_name() {
        let db = setup_db();
        let user = register(&db, "inherit");
        let category = db
            .create_category(
                &user,
                CategoryInput {
                    name: "Health".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        let parent = db
            .create_task(
                &user,
                TaskInput {
                    category: Some(category.id.clone()),
                    ..titled("parent")
                },
            )
            .unwrap();
        let sub = db
            .create_task(
                &user,
                TaskInput {
                    parent_task: Some(parent.id.clone()),
                    ..titled("sub")
                },
            )
            .unwrap();

        assert!(sub.category.is_none());
        assert_eq!(sub.category_name.as_deref(), Some("Health"));
    }

    #[test]
    fn parent_detail_lists_subtask_ids_in_creation_order() {
        let db = setup_db();
        let user = register(&db, "lister");
        let parent = db.create_task(&user, titled("parent")).unwrap();
        let mut expected = Vec::new();
        for title in ["first", "second", "third"] {
            expected.push(
                db.create_task(
                    &user,
                    TaskInput {
                        parent_task: Some(parent.id.clone()),
                        ..titled(title)
                    },
                )
                .unwrap()
                .id,
            );
            std::thread::sleep(std::time::Duration::from_millis(3));
        }

        let detail = db.task_detail(&user, &parent.id).unwrap();
        assert!(detail.has_subtasks);
        assert_eq!(detail.sub_tasks, expected);

        let listing = db.subtask_listing(&user, &parent.id).unwrap();
        assert_eq!(listing.sub_tasks, expected);
        for id in &expected {
            assert!(listing.tasks.contains_key(id));
        }
    }

    #[test]
    fn category_delete_detaches_tasks() {
        let db = setup_db();
        let user = register(&db, "detach");
        let category = db
            .create_category(
                &user,
                CategoryInput {
                    name: "Doomed".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        let task = db
            .create_task(
                &user,
                TaskInput {
                    category: Some(category.id.clone()),
                    ..titled("survivor")
                },
            )
            .unwrap();

        db.delete_category(&user, &category.id).unwrap();

        let detail = db.task_detail(&user, &task.id).unwrap();
        assert!(detail.category.is_none());
        assert!(detail.category_name.is_none());
    }

    #[test]
    fn tag_delete_removes_association_only() {
        let db = setup_db();
        let user = register(&db, "untag");
        let tag = db
            .create_tag(&user, TagInput { name: "doomed".to_string() })
            .unwrap();
        let task = db
            .create_task(
                &user,
                TaskInput {
                    tags: vec![tag.id.clone()],
                    ..titled("survivor")
                },
            )
            .unwrap();

        db.delete_tag(&user, &tag.id).unwrap();

        let detail = db.task_detail(&user, &task.id).unwrap();
        assert!(detail.tags.is_empty());
    }
}

mod completed_at {
    use super::*;

    #[test]
    fn set_on_completed_create() {
        let db = setup_db();
        let user = register(&db, "done_create");
        let task = db
            .create_task(
                &user,
                TaskInput {
                    completed: true,
                    ..titled("done")
                },
            )
            .unwrap();
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn derived_across_transitions() {
        let db = setup_db();
        let user = register(&db, "transitions");
        let task = db.create_task(&user, titled("toggle")).unwrap();
        assert!(task.completed_at.is_none());

        let done = db
            .update_task(
                &user,
                &task.id,
                TaskPatch {
                    completed: Some(true),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        assert!(done.completed);
        assert!(done.completed_at.is_some());
        let stamp = done.completed_at;

        // An unrelated update leaves the stamp alone.
        let renamed = db
            .update_task(
                &user,
                &task.id,
                TaskPatch {
                    title: Some("still done".to_string()),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.completed_at, stamp);

        let reopened = db
            .update_task(
                &user,
                &task.id,
                TaskPatch {
                    completed: Some(false),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        assert!(!reopened.completed);
        assert!(reopened.completed_at.is_none());
    }
}

mod hierarchy {
    use super::*;

    #[test]
    fn subtask_of_subtask_is_rejected() {
        let db = setup_db();
        let user = register(&db, "depth");
        let parent = db.create_task(&user, titled("parent")).unwrap();
        let sub = db
            .create_task(
                &user,
                TaskInput {
                    parent_task: Some(parent.id.clone()),
                    ..titled("sub")
                },
            )
            .unwrap();

        let err = api_err(
            db.create_task(
                &user,
                TaskInput {
                    parent_task: Some(sub.id.clone()),
                    ..titled("subsub")
                },
            )
            .unwrap_err(),
        );

        assert_eq!(err.code, ErrorCode::InvalidFieldValue);
        assert_eq!(err.field.as_deref(), Some("parent_task"));
    }

    #[test]
    fn task_cannot_be_its_own_parent() {
        let db = setup_db();
        let user = register(&db, "selfparent");
        let task = db.create_task(&user, titled("loner")).unwrap();

        let err = api_err(
            db.update_task(
                &user,
                &task.id,
                TaskPatch {
                    parent_task: Some(Some(task.id.clone())),
                    ..TaskPatch::default()
                },
            )
            .unwrap_err(),
        );

        assert_eq!(err.field.as_deref(), Some("parent_task"));
    }

    #[test]
    fn task_with_subtasks_cannot_become_a_subtask() {
        let db = setup_db();
        let user = register(&db, "demote");
        let parent = db.create_task(&user, titled("parent")).unwrap();
        db.create_task(
            &user,
            TaskInput {
                parent_task: Some(parent.id.clone()),
                ..titled("sub")
            },
        )
        .unwrap();
        let other = db.create_task(&user, titled("other")).unwrap();

        let err = api_err(
            db.update_task(
                &user,
                &parent.id,
                TaskPatch {
                    parent_task: Some(Some(other.id.clone())),
                    ..TaskPatch::default()
                },
            )
            .unwrap_err(),
        );

        assert_eq!(err.code, ErrorCode::InvalidFieldValue);
        assert_eq!(err.field.as_deref(), Some("parent_task"));
    }

    #[test]
    fn unknown_parent_is_a_validation_error() {
        let db = setup_db();
        let user = register(&db, "ghostparent");

        let err = api_err(
            db.create_task(
                &user,
                TaskInput {
                    parent_task: Some("no-such-task".to_string()),
                    ..titled("orphan")
                },
            )
            .unwrap_err(),
        );

        assert_eq!(err.code, ErrorCode::InvalidFieldValue);
        assert_eq!(err.field.as_deref(), Some("parent_task"));
    }

    #[test]
    fn validation_failure_leaves_no_side_effects() {
        let db = setup_db();
        let user = register(&db, "atomic");

        let _ = db.create_task(
            &user,
            TaskInput {
                parent_task: Some("no-such-task".to_string()),
                ..titled("rejected")
            },
        );

        let page = db
            .list_task_page(
                &user,
                &task_organizer::db::query::TaskFilters::default(),
                task_organizer::db::now_ms(),
            )
            .unwrap();
        assert_eq!(page.total_count, 0);
    }
}

mod delete_cascade {
    use super::*;

    fn parent_with_two_subs(db: &Database, user: &str) -> (String, String, String) {
        let parent = db.create_task(user, titled("parent")).unwrap();
        let sub_a = db
            .create_task(
                user,
                TaskInput {
                    parent_task: Some(parent.id.clone()),
                    ..titled("sub a")
                },
            )
            .unwrap();
        // Keep creation timestamps distinct so ordering is deterministic.
        std::thread::sleep(std::time::Duration::from_millis(3));
        let sub_b = db
            .create_task(
                user,
                TaskInput {
                    parent_task: Some(parent.id.clone()),
                    completed: true,
                    ..titled("sub b")
                },
            )
            .unwrap();
        (parent.id, sub_a.id, sub_b.id)
    }

    #[test]
    fn keeping_subtasks_orphans_and_reports_them() {
        let db = setup_db();
        let user = register(&db, "keeper");
        let (parent, sub_a, sub_b) = parent_with_two_subs(&db, &user);

        let outcome = db.delete_task(&user, &parent, true).unwrap();

        assert_eq!(outcome.sub_count, 2);
        assert!(outcome.deleted.is_none());
        let page = outcome.subtasks.expect("shaped subtasks expected");
        assert_eq!(page.total_count, 2);
        assert_eq!(page.incomplete_tasks, vec![sub_a.clone()]);
        assert_eq!(page.complete_tasks, vec![sub_b.clone()]);
        for id in [&sub_a, &sub_b] {
            assert!(page.tasks[id.as_str()].parent_task.is_none());
        }

        // The parent is gone; the orphans persist as top-level tasks.
        let err = api_err(db.task_detail(&user, &parent).unwrap_err());
        assert_eq!(err.code, ErrorCode::TaskNotFound);
        let detail = db.task_detail(&user, &sub_a).unwrap();
        assert!(detail.parent_task.is_none());
    }

    #[test]
    fn dropping_subtasks_deletes_and_lists_ids() {
        let db = setup_db();
        let user = register(&db, "dropper");
        let (parent, sub_a, sub_b) = parent_with_two_subs(&db, &user);

        let outcome = db.delete_task(&user, &parent, false).unwrap();

        assert_eq!(outcome.sub_count, 2);
        assert!(outcome.subtasks.is_none());
        assert_eq!(
            outcome.deleted,
            Some(vec![sub_a.clone(), sub_b.clone()])
        );

        for id in [&parent, &sub_a, &sub_b] {
            let err = api_err(db.task_detail(&user, id).unwrap_err());
            assert_eq!(err.code, ErrorCode::TaskNotFound);
        }
    }

    #[test]
    fn deleting_a_leaf_reports_empty_cascade() {
        let db = setup_db();
        let user = register(&db, "leaf");
        let task = db.create_task(&user, titled("leaf")).unwrap();

        let outcome = db.delete_task(&user, &task.id, true).unwrap();

        assert_eq!(outcome.sub_count, 0);
        let page = outcome.subtasks.expect("shaped subtasks expected");
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn deleting_a_missing_task_is_not_found() {
        let db = setup_db();
        let user = register(&db, "missing");

        let err = api_err(db.delete_task(&user, "no-such-task", true).unwrap_err());
        assert_eq!(err.code, ErrorCode::TaskNotFound);
    }
}
