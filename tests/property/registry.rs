//! Property-based tests for the task registry and drag engine.
//!
//! Uses proptest to verify:
//! 1. Grouping places every task in exactly the column of its status,
//!    keeping server order within a column.
//! 2. Loading the same tasks twice yields the same grouping.
//! 3. Whatever order reload responses arrive in, the newest one wins.
//! 4. A move followed by a restore of its snapshot leaves the registry as
//!    it was.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use boardsync::drag::{DragEngine, DropResolution, DropTarget};
use boardsync::registry::{LoadOutcome, TaskRegistry};
use boardsync_proto::task::{Task, TaskId, TaskPriority, TaskStatus};
use boardsync_proto::time::Timestamp;
use proptest::prelude::*;

// --- Strategies ---

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

fn make_task(index: usize, status: TaskStatus) -> Task {
    Task {
        id: TaskId::new(format!("t{index}")),
        title: format!("Task {index}"),
        description: None,
        board_id: "b1".to_string(),
        assigned_to: None,
        status,
        priority: TaskPriority::Medium,
        due_date: None,
        created_by: "u1".to_string(),
        created_at: Timestamp::default(),
        updated_at: Timestamp::default(),
    }
}

/// A task list with unique ids and arbitrary statuses.
fn arb_tasks(max: usize) -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(arb_status(), 0..max).prop_map(|statuses| {
        statuses
            .into_iter()
            .enumerate()
            .map(|(i, status)| make_task(i, status))
            .collect()
    })
}

fn grouping(registry: &TaskRegistry) -> Vec<Vec<String>> {
    let columns = registry.columns();
    TaskStatus::ALL
        .iter()
        .map(|status| {
            columns
                .ids(*status)
                .into_iter()
                .map(|id| id.as_str().to_string())
                .collect()
        })
        .collect()
}

// --- Properties ---

proptest! {
    #[test]
    fn every_task_lands_in_its_status_column(tasks in arb_tasks(40)) {
        let mut registry = TaskRegistry::new();
        registry.load(tasks.clone());
        let columns = registry.columns();

        let total: usize = TaskStatus::ALL.iter().map(|s| columns.len(*s)).sum();
        prop_assert_eq!(total, tasks.len());

        for status in TaskStatus::ALL {
            let expected: Vec<&TaskId> = tasks
                .iter()
                .filter(|t| t.status == status)
                .map(|t| &t.id)
                .collect();
            prop_assert_eq!(columns.ids(status), expected);
        }
    }

    #[test]
    fn loading_same_tasks_twice_is_idempotent(tasks in arb_tasks(40)) {
        let mut registry = TaskRegistry::new();
        registry.load(tasks.clone());
        let first = grouping(&registry);
        registry.load(tasks);
        prop_assert_eq!(grouping(&registry), first);
    }

    #[test]
    fn newest_reload_wins_in_any_arrival_order(
        snapshots in prop::collection::vec(arb_tasks(12), 1..6),
        order in any::<u64>(),
    ) {
        let mut registry = TaskRegistry::new();
        let tickets: Vec<_> = snapshots.iter().map(|_| registry.begin_load()).collect();

        // Deterministic shuffle driven by `order`.
        let mut arrival: Vec<usize> = (0..snapshots.len()).collect();
        let mut seed = order;
        for i in (1..arrival.len()).rev() {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let j = usize::try_from(seed >> 33).unwrap() % (i + 1);
            arrival.swap(i, j);
        }

        for index in arrival {
            let outcome = registry.load_with(tickets[index], snapshots[index].clone());
            if outcome == LoadOutcome::Applied {
                prop_assert_eq!(registry.applied_ticket(), Some(tickets[index]));
            }
        }

        let newest = snapshots.len() - 1;
        prop_assert_eq!(registry.applied_ticket(), Some(tickets[newest]));
        prop_assert_eq!(registry.tasks(), snapshots[newest].as_slice());
    }

    #[test]
    fn restore_undoes_a_move(
        tasks in arb_tasks(20).prop_filter("need a task", |t| !t.is_empty()),
        pick in any::<prop::sample::Index>(),
        to in arb_status(),
    ) {
        let mut registry = TaskRegistry::new();
        registry.load(tasks.clone());
        let task_id = tasks[pick.index(tasks.len())].id.clone();

        let mut drag = DragEngine::new();
        drag.start(&registry, &task_id).unwrap();
        match drag.end(&mut registry, Some(&DropTarget::Column(to))) {
            DropResolution::Move { snapshot, to: moved_to, .. } => {
                prop_assert_eq!(moved_to, to);
                prop_assert_eq!(registry.find(&task_id).unwrap().status, to);
                prop_assert!(registry.restore(snapshot));
                prop_assert_eq!(registry.tasks(), tasks.as_slice());
            }
            DropResolution::NoChange { .. } => {
                prop_assert_eq!(registry.tasks(), tasks.as_slice());
            }
            DropResolution::Abandoned => prop_assert!(false, "drop on a column is never abandoned"),
        }
    }
}
