//! Integration tests for drag reconciliation.
//!
//! Drives a `BoardSession` against the in-memory board API and a loopback
//! board channel: drops are applied optimistically, confirmed with exactly
//! one status patch, announced with exactly one `task_update` frame, and
//! rolled back when the server rejects them.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::similar_names,
    clippy::redundant_clone
)]

use std::sync::Arc;
use std::time::Duration;

use boardsync::api::ApiError;
use boardsync::api::memory::{ApiCall, InMemoryBoardApi};
use boardsync::channel::loopback::{LoopbackConnector, LoopbackServer};
use boardsync::drag::{DragError, DropTarget};
use boardsync::registry::LoadTicket;
use boardsync::session::{
    BoardSession, DropOutcome, NoticeLevel, ReconnectPolicy, SessionConfig, SessionInput,
};
use boardsync_proto::board::{Board, BoardStats};
use boardsync_proto::codec;
use boardsync_proto::frame::OutboundFrame;
use boardsync_proto::task::{Task, TaskId, TaskPriority, TaskStatus};
use boardsync_proto::time::Timestamp;

type Session = BoardSession<InMemoryBoardApi, LoopbackConnector>;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn make_task(id: &str, status: TaskStatus) -> Task {
    Task {
        id: TaskId::new(id),
        title: format!("Task {id}"),
        description: None,
        board_id: "b1".to_string(),
        assigned_to: Some("u1".to_string()),
        status,
        priority: TaskPriority::Medium,
        due_date: None,
        created_by: "u1".to_string(),
        created_at: Timestamp::new("2024-05-01T09:00:00Z"),
        updated_at: Timestamp::new("2024-05-01T09:00:00Z"),
    }
}

fn make_board() -> Board {
    Board {
        id: "b1".to_string(),
        name: "Sprint 12".to_string(),
        description: None,
        team_id: Some("team1".to_string()),
        member_ids: vec!["u1".to_string(), "u2".to_string()],
        created_by: Some("u1".to_string()),
        created_at: None,
        stats: BoardStats::default(),
    }
}

/// A session with t1 in todo and t2 in review, board loaded, chat open.
async fn open_session() -> (Session, Arc<InMemoryBoardApi>, LoopbackServer) {
    let api = Arc::new(InMemoryBoardApi::new(
        make_board(),
        vec![
            make_task("t1", TaskStatus::Todo),
            make_task("t2", TaskStatus::Review),
        ],
    ));
    let connector = Arc::new(LoopbackConnector::new());
    let server = connector.expect_connection(32);
    let config = SessionConfig::new("b1").with_reconnect(ReconnectPolicy::disabled());
    let mut session = BoardSession::new(Arc::clone(&api), connector, config);

    session.load_board();
    session.open_chat();
    session.settle().await;
    api.clear_calls();
    (session, api, server)
}

fn column_ids(session: &Session, status: TaskStatus) -> Vec<String> {
    session
        .registry()
        .columns()
        .ids(status)
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect()
}

/// Apply inputs until nothing arrives for a short while.
async fn pump(session: &mut Session) {
    loop {
        match tokio::time::timeout(Duration::from_millis(200), session.next_input()).await {
            Ok(SessionInput::Idle) | Err(_) => break,
            Ok(input) => session.apply(input).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Successful moves
// ---------------------------------------------------------------------------

#[tokio::test]
async fn drop_on_card_in_review_moves_task_end_to_end() {
    let (mut session, api, server) = open_session().await;

    session.begin_drag(&TaskId::new("t1")).unwrap();
    session.hover(Some(DropTarget::Task(TaskId::new("t2"))));
    let outcome = session.drop_on(Some(&DropTarget::Task(TaskId::new("t2"))));
    assert_eq!(
        outcome,
        DropOutcome::Submitted {
            task_id: TaskId::new("t1"),
            to: TaskStatus::Review,
        }
    );

    // Applied locally before the server answers.
    assert_eq!(column_ids(&session, TaskStatus::Review), ["t1", "t2"]);
    assert!(session.drag().active().is_none());

    session.settle().await;

    assert_eq!(
        api.patch_calls(),
        vec![(TaskId::new("t1"), TaskStatus::Review)]
    );
    let sent = server.drain_sent().await;
    assert_eq!(sent.len(), 1);
    let wire: serde_json::Value = serde_json::from_str(&codec::encode_outbound(&sent[0]).unwrap()).unwrap();
    assert_eq!(
        wire,
        serde_json::json!({
            "type": "task_update",
            "task_id": "t1",
            "action": "updated",
            "details": { "status": "review" },
        })
    );

    assert!(column_ids(&session, TaskStatus::Todo).is_empty());
    assert_eq!(column_ids(&session, TaskStatus::Review), ["t1", "t2"]);
    // The confirmed move is followed by one catch-up reload.
    assert_eq!(api.count_calls(|c| matches!(c, ApiCall::FetchBoardTasks(_))), 1);
    assert_eq!(session.board().unwrap().stats.total_tasks, 2);
}

#[tokio::test]
async fn drop_on_column_uses_column_status() {
    let (mut session, api, server) = open_session().await;

    session.begin_drag(&TaskId::new("t2")).unwrap();
    let outcome = session.drop_on(Some(&DropTarget::Column(TaskStatus::Completed)));
    assert!(matches!(outcome, DropOutcome::Submitted { to: TaskStatus::Completed, .. }));
    session.settle().await;

    assert_eq!(
        api.patch_calls(),
        vec![(TaskId::new("t2"), TaskStatus::Completed)]
    );
    assert_eq!(
        server.drain_sent().await,
        vec![OutboundFrame::status_changed(TaskId::new("t2"), TaskStatus::Completed)]
    );
    assert_eq!(column_ids(&session, TaskStatus::Completed), ["t2"]);
    assert!(session.drain_notices().is_empty());
}

#[tokio::test]
async fn move_without_chat_is_patched_but_not_announced() {
    let (mut session, api, server) = open_session().await;
    session.close_chat().await;

    session.begin_drag(&TaskId::new("t1")).unwrap();
    session.drop_on(Some(&DropTarget::Column(TaskStatus::InProgress)));
    session.settle().await;

    assert_eq!(api.patch_calls().len(), 1);
    assert!(server.drain_sent().await.is_empty());
    assert_eq!(column_ids(&session, TaskStatus::InProgress), ["t1"]);
}

// ---------------------------------------------------------------------------
// Gestures that change nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn drop_in_same_column_makes_no_calls() {
    let (mut session, api, server) = open_session().await;

    session.begin_drag(&TaskId::new("t1")).unwrap();
    let outcome = session.drop_on(Some(&DropTarget::Column(TaskStatus::Todo)));
    assert_eq!(outcome, DropOutcome::Unchanged);
    session.settle().await;

    assert!(api.calls().is_empty());
    assert!(server.drain_sent().await.is_empty());
    assert_eq!(column_ids(&session, TaskStatus::Todo), ["t1"]);
}

#[tokio::test]
async fn drop_on_card_in_same_column_makes_no_calls() {
    let (mut session, api, server) = open_session().await;

    session.begin_drag(&TaskId::new("t2")).unwrap();
    let outcome = session.drop_on(Some(&DropTarget::Task(TaskId::new("t2"))));
    assert_eq!(outcome, DropOutcome::Unchanged);
    session.settle().await;

    assert!(api.calls().is_empty());
    assert!(server.drain_sent().await.is_empty());
}

#[tokio::test]
async fn drop_outside_any_target_leaves_registry_unchanged() {
    let (mut session, api, server) = open_session().await;
    let before = session.registry().tasks().to_vec();

    session.begin_drag(&TaskId::new("t1")).unwrap();
    session.hover(Some(DropTarget::Column(TaskStatus::Review)));
    session.hover(None);
    assert_eq!(session.drop_on(None), DropOutcome::Abandoned);
    session.settle().await;

    assert_eq!(session.registry().tasks(), before.as_slice());
    assert!(api.calls().is_empty());
    assert!(server.drain_sent().await.is_empty());
}

#[tokio::test]
async fn cancelled_drag_is_abandoned() {
    let (mut session, api, _server) = open_session().await;

    session.begin_drag(&TaskId::new("t1")).unwrap();
    session.cancel_drag();
    assert_eq!(
        session.drop_on(Some(&DropTarget::Column(TaskStatus::Review))),
        DropOutcome::Abandoned
    );
    assert!(api.patch_calls().is_empty());
}

#[tokio::test]
async fn unknown_task_cannot_be_dragged() {
    let (mut session, _api, _server) = open_session().await;
    assert_eq!(
        session.begin_drag(&TaskId::new("ghost")),
        Err(DragError::UnknownTask(TaskId::new("ghost")))
    );
    assert!(session.drag().active().is_none());
}

#[tokio::test]
async fn drop_on_unknown_card_is_abandoned() {
    let (mut session, api, _server) = open_session().await;

    session.begin_drag(&TaskId::new("t1")).unwrap();
    assert_eq!(
        session.drop_on(Some(&DropTarget::Task(TaskId::new("ghost")))),
        DropOutcome::Abandoned
    );
    assert!(api.calls().is_empty());
    assert_eq!(column_ids(&session, TaskStatus::Todo), ["t1"]);
}

// ---------------------------------------------------------------------------
// Rejected moves
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_patch_restores_status_and_sends_nothing() {
    let (mut session, api, server) = open_session().await;
    api.fail_patches(Some(ApiError::Status {
        status: 403,
        detail: "You can only update tasks assigned to you".to_string(),
    }));

    session.begin_drag(&TaskId::new("t1")).unwrap();
    session.drop_on(Some(&DropTarget::Column(TaskStatus::Completed)));
    assert_eq!(column_ids(&session, TaskStatus::Completed), ["t1"]);

    session.settle().await;

    assert_eq!(api.patch_calls().len(), 1);
    assert!(server.drain_sent().await.is_empty());
    assert_eq!(column_ids(&session, TaskStatus::Todo), ["t1"]);
    assert!(column_ids(&session, TaskStatus::Completed).is_empty());

    let notices = session.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(
        notices[0].text,
        "Failed to update task: You can only update tasks assigned to you"
    );
}

#[tokio::test]
async fn transport_failure_restores_status() {
    let (mut session, api, server) = open_session().await;
    api.fail_patches(Some(ApiError::Transport("connection refused".to_string())));

    session.begin_drag(&TaskId::new("t2")).unwrap();
    session.drop_on(Some(&DropTarget::Task(TaskId::new("t1"))));
    session.settle().await;

    assert_eq!(session.registry().find(&TaskId::new("t2")).unwrap().status, TaskStatus::Review);
    assert!(server.drain_sent().await.is_empty());
    assert!(session.drain_notices()[0].text.contains("connection refused"));
}

// ---------------------------------------------------------------------------
// Reload sequencing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_reload_does_not_overwrite_newer_one() {
    let (mut session, api, _server) = open_session().await;

    api.delay_next_task_fetch(Duration::from_millis(150));
    let slow: LoadTicket = session.load_board();
    // Let the slow fetch take its snapshot before the server changes.
    tokio::time::sleep(Duration::from_millis(20)).await;
    api.set_status(&TaskId::new("t1"), TaskStatus::Completed);
    let fast = session.load_board();
    assert!(fast > slow);

    session.settle().await;

    assert_eq!(session.registry().applied_ticket(), Some(fast));
    assert_eq!(column_ids(&session, TaskStatus::Completed), ["t1"]);
    assert!(column_ids(&session, TaskStatus::Todo).is_empty());
}

#[tokio::test]
async fn loading_same_tasks_twice_yields_same_grouping() {
    let (mut session, _api, _server) = open_session().await;
    let first: Vec<Vec<String>> = TaskStatus::ALL
        .iter()
        .map(|s| column_ids(&session, *s))
        .collect();

    session.load_board();
    session.settle().await;
    let second: Vec<Vec<String>> = TaskStatus::ALL
        .iter()
        .map(|s| column_ids(&session, *s))
        .collect();

    assert_eq!(first, second);
    assert_eq!(first[TaskStatus::Todo.column()], ["t1"]);
    assert_eq!(first[TaskStatus::Review.column()], ["t2"]);
}

#[tokio::test]
async fn peer_update_after_local_move_keeps_both() {
    let (mut session, api, server) = open_session().await;

    session.begin_drag(&TaskId::new("t1")).unwrap();
    session.drop_on(Some(&DropTarget::Column(TaskStatus::InProgress)));
    session.settle().await;
    server.drain_sent().await;

    // Another member moves t2; the hub relays their announcement.
    api.set_status(&TaskId::new("t2"), TaskStatus::Completed);
    server
        .push_raw(r#"{"type":"task_update","task_id":"t2","action":"updated","details":{"status":"completed"},"username":"bob","user_id":"u2","timestamp":"2024-05-01T10:00:00Z"}"#)
        .await
        .unwrap();
    pump(&mut session).await;

    assert_eq!(column_ids(&session, TaskStatus::InProgress), ["t1"]);
    assert_eq!(column_ids(&session, TaskStatus::Completed), ["t2"]);
    assert_eq!(
        session.log().entries().last().unwrap().text(),
        "bob updated a task (moved to Completed)"
    );
}
