//! Integration tests for the board channel as seen through a session.
//!
//! Frames are pushed from a loopback server end; the tests check the
//! resulting message log, presence set, reloads and the bounded reconnect
//! behavior when the channel drops.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::similar_names,
    clippy::redundant_clone
)]

use std::sync::Arc;
use std::time::Duration;

use boardsync::api::memory::{ApiCall, InMemoryBoardApi};
use boardsync::channel::loopback::{LoopbackConnector, LoopbackServer};
use boardsync::channel::{ChannelState, CloseReason};
use boardsync::message_log::LogEntry;
use boardsync::session::{
    BoardSession, NoticeLevel, ReconnectPolicy, SessionConfig, SessionInput,
};
use boardsync_proto::board::{Board, BoardStats};
use boardsync_proto::frame::{InboundFrame, OutboundFrame, TaskUpdateDetails};
use boardsync_proto::presence::UserSummary;
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
        assigned_to: None,
        status,
        priority: TaskPriority::Low,
        due_date: None,
        created_by: "u1".to_string(),
        created_at: Timestamp::default(),
        updated_at: Timestamp::default(),
    }
}

fn make_api() -> Arc<InMemoryBoardApi> {
    let board = Board {
        id: "b1".to_string(),
        name: "Launch".to_string(),
        description: None,
        team_id: None,
        member_ids: vec!["u1".to_string(), "u2".to_string(), "u3".to_string()],
        created_by: None,
        created_at: None,
        stats: BoardStats::default(),
    };
    Arc::new(InMemoryBoardApi::new(
        board,
        vec![make_task("t1", TaskStatus::Todo), make_task("t2", TaskStatus::InProgress)],
    ))
}

fn fast_retry(attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

fn user(id: &str, name: &str) -> UserSummary {
    UserSummary {
        id: id.to_string(),
        username: Some(name.to_string()),
    }
}

/// A session with its board loaded and the chat channel open.
async fn open_session(
    policy: ReconnectPolicy,
) -> (Session, Arc<InMemoryBoardApi>, Arc<LoopbackConnector>, LoopbackServer) {
    let api = make_api();
    let connector = Arc::new(LoopbackConnector::new());
    let server = connector.expect_connection(32);
    let config = SessionConfig::new("b1").with_reconnect(policy);
    let mut session = BoardSession::new(Arc::clone(&api), Arc::clone(&connector), config);

    session.load_board();
    session.open_chat();
    session.settle().await;
    assert_eq!(session.state(), &ChannelState::Open);
    api.clear_calls();
    (session, api, connector, server)
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

fn texts(session: &Session) -> Vec<String> {
    session
        .log()
        .entries()
        .iter()
        .map(|e| e.text().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Message log
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_system_and_task_update_are_logged_in_order() {
    let (mut session, _api, _connector, server) = open_session(ReconnectPolicy::disabled()).await;

    server
        .push(&InboundFrame::Chat {
            user_id: "u1".to_string(),
            username: "alice".to_string(),
            message: "standup in 5".to_string(),
            timestamp: Timestamp::new("2024-05-01T09:00:00Z"),
        })
        .await
        .unwrap();
    server
        .push(&InboundFrame::System {
            message: "Welcome to the board chat, alice!".to_string(),
            timestamp: Timestamp::new("2024-05-01T09:00:01Z"),
        })
        .await
        .unwrap();
    server
        .push(&InboundFrame::TaskUpdate {
            task_id: Some(TaskId::new("t2")),
            action: "updated".to_string(),
            details: TaskUpdateDetails {
                status: Some(TaskStatus::Review),
            },
            username: "carol".to_string(),
            user_id: Some("u3".to_string()),
            timestamp: Timestamp::new("2024-05-01T09:00:02Z"),
        })
        .await
        .unwrap();
    pump(&mut session).await;

    let entries = session.log().entries();
    assert_eq!(entries.len(), 3);
    assert!(matches!(&entries[0], LogEntry::Chat { username, text, .. }
        if username == "alice" && text == "standup in 5"));
    assert!(matches!(&entries[1], LogEntry::System { .. }));
    assert_eq!(entries[2].text(), "carol updated a task (moved to Review)");
}

#[tokio::test]
async fn user_left_logs_once_and_refreshes_presence_once() {
    let (mut session, api, _connector, server) = open_session(ReconnectPolicy::disabled()).await;

    server
        .push_raw(r#"{"type":"user_left","username":"alice","timestamp":"2024-05-01T09:30:00Z"}"#)
        .await
        .unwrap();
    pump(&mut session).await;

    assert_eq!(texts(&session), ["alice left the chat"]);
    assert_eq!(
        api.count_calls(|c| matches!(c, ApiCall::FetchOnlineUsers(_))),
        1
    );
}

#[tokio::test]
async fn unknown_and_malformed_frames_are_ignored() {
    let (mut session, _api, _connector, server) = open_session(ReconnectPolicy::disabled()).await;

    server
        .push_raw(r#"{"type":"reaction","emoji":"tada","user_id":"u2"}"#)
        .await
        .unwrap();
    server.push_raw("definitely not json").await.unwrap();
    server.push_raw(r#"{"type":"chat"}"#).await.unwrap();
    server
        .push_raw(r#"{"type":"chat","message":"still here","username":"bob","user_id":"u2"}"#)
        .await
        .unwrap();
    pump(&mut session).await;

    assert_eq!(texts(&session), ["still here"]);
    assert_eq!(session.state(), &ChannelState::Open);
    assert!(session.drain_notices().is_empty());
}

#[tokio::test]
async fn task_update_with_null_fields_still_reloads_board() {
    let (mut session, api, _connector, server) = open_session(ReconnectPolicy::disabled()).await;

    server
        .push_raw(
            r#"{"type":"task_update","username":"bob","user_id":"u2","task_id":null,"action":null,"details":{},"timestamp":"2024-05-01T09:31:00Z"}"#,
        )
        .await
        .unwrap();
    pump(&mut session).await;

    assert_eq!(texts(&session), ["bob changed a task"]);
    assert_eq!(api.count_calls(|c| matches!(c, ApiCall::FetchBoardTasks(_))), 1);
    assert_eq!(session.state(), &ChannelState::Open);
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn joined_user_appears_exactly_once_after_refresh() {
    let (mut session, api, _connector, server) = open_session(ReconnectPolicy::disabled()).await;
    api.set_online(vec![user("u1", "alice"), user("u2", "bob"), user("u1", "alice")]);

    server
        .push(&InboundFrame::UserJoined {
            user_id: Some("u2".to_string()),
            username: "bob".to_string(),
            timestamp: Timestamp::now(),
        })
        .await
        .unwrap();
    pump(&mut session).await;

    let presence = session.presence();
    assert!(presence.contains("u2"));
    assert_eq!(presence.users().iter().filter(|u| u.id == "u2").count(), 1);
    assert_eq!(presence.count(), 2);
    assert_eq!(texts(&session), ["bob joined the chat"]);
}

#[tokio::test]
async fn typing_indicators_track_other_users() {
    let (mut session, _api, _connector, server) = open_session(ReconnectPolicy::disabled()).await;

    server
        .push(&InboundFrame::Typing {
            user_id: Some("u2".to_string()),
            username: "bob".to_string(),
            is_typing: true,
        })
        .await
        .unwrap();
    pump(&mut session).await;
    assert_eq!(session.presence().typing().collect::<Vec<_>>(), ["bob"]);
    assert!(session.log().is_empty());

    server
        .push(&InboundFrame::Typing {
            user_id: Some("u2".to_string()),
            username: "bob".to_string(),
            is_typing: false,
        })
        .await
        .unwrap();
    pump(&mut session).await;
    assert_eq!(session.presence().typing().count(), 0);
}

// ---------------------------------------------------------------------------
// Outbound frames
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_text_is_trimmed_before_sending() {
    let (mut session, _api, _connector, server) = open_session(ReconnectPolicy::disabled()).await;

    assert!(session.send_chat("  ship it  ").await.unwrap());
    assert!(!session.send_chat("   ").await.unwrap());
    assert_eq!(
        server.drain_sent().await,
        vec![OutboundFrame::Chat {
            message: "ship it".to_string()
        }]
    );
}

#[tokio::test]
async fn closing_chat_discards_log_and_presence() {
    let (mut session, api, connector, server) = open_session(ReconnectPolicy::disabled()).await;
    api.set_online(vec![user("u1", "alice")]);
    server
        .push(&InboundFrame::UserJoined {
            user_id: Some("u1".to_string()),
            username: "alice".to_string(),
            timestamp: Timestamp::now(),
        })
        .await
        .unwrap();
    pump(&mut session).await;
    assert_eq!(session.presence().count(), 1);

    session.toggle_chat().await;
    assert!(!session.chat_open());
    assert!(session.log().is_empty());
    assert_eq!(session.presence().count(), 0);
    assert!(!server.client_open());
    assert_eq!(session.state(), &ChannelState::Closed(CloseReason::Local));

    let reopened = connector.expect_connection(8);
    session.toggle_chat().await;
    session.settle().await;
    assert_eq!(session.state(), &ChannelState::Open);
    assert!(reopened.client_open());
    assert_eq!(connector.attempts(), 2);
}

// ---------------------------------------------------------------------------
// Reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnect_gives_up_after_configured_attempts() {
    let (mut session, _api, connector, server) = open_session(fast_retry(2)).await;

    server
        .close(CloseReason::Lost("connection reset".to_string()))
        .await;
    let input = session.next_input().await;
    session.apply(input).await;
    session.settle().await;

    // The original connection plus two failed retries.
    assert_eq!(connector.attempts(), 3);
    assert!(matches!(session.state(), ChannelState::Closed(CloseReason::Lost(_))));

    let notices = session.drain_notices();
    assert_eq!(notices.len(), 2);
    assert!(notices[0].text.starts_with("Chat disconnected"));
    assert_eq!(notices[1].level, NoticeLevel::Error);
    assert!(notices[1].text.starts_with("Could not connect to chat"));
}

#[tokio::test]
async fn reconnect_catches_up_and_keeps_log() {
    let (mut session, api, connector, server) = open_session(fast_retry(3)).await;
    server
        .push(&InboundFrame::Chat {
            user_id: "u2".to_string(),
            username: "bob".to_string(),
            message: "before the drop".to_string(),
            timestamp: Timestamp::now(),
        })
        .await
        .unwrap();
    pump(&mut session).await;

    connector.expect_failure("hub restarting");
    let second = connector.expect_connection(32);
    server
        .close(CloseReason::Server {
            code: 1012,
            reason: "Service restart".to_string(),
        })
        .await;
    pump(&mut session).await;

    assert_eq!(session.state(), &ChannelState::Open);
    assert_eq!(connector.attempts(), 3);
    assert_eq!(api.count_calls(|c| matches!(c, ApiCall::FetchBoardTasks(_))), 1);
    assert!(api.count_calls(|c| matches!(c, ApiCall::FetchOnlineUsers(_))) >= 1);
    assert!(
        session
            .drain_notices()
            .iter()
            .any(|n| n.level == NoticeLevel::Info && n.text == "Chat reconnected")
    );

    second
        .push(&InboundFrame::Chat {
            user_id: "u2".to_string(),
            username: "bob".to_string(),
            message: "after the drop".to_string(),
            timestamp: Timestamp::now(),
        })
        .await
        .unwrap();
    pump(&mut session).await;
    assert_eq!(texts(&session), ["before the drop", "after the drop"]);
}

#[tokio::test]
async fn initial_connect_failure_is_retried() {
    let api = make_api();
    let connector = Arc::new(LoopbackConnector::new());
    connector.expect_failure("refused");
    let server = connector.expect_connection(8);
    let config = SessionConfig::new("b1").with_reconnect(fast_retry(1));
    let mut session = BoardSession::new(api, Arc::clone(&connector), config);

    session.open_chat();
    assert_eq!(session.state(), &ChannelState::Connecting);
    session.settle().await;

    assert_eq!(connector.attempts(), 2);
    assert_eq!(session.state(), &ChannelState::Open);
    assert!(server.client_open());
}

#[tokio::test]
async fn no_reconnect_when_disabled() {
    let (mut session, _api, connector, server) = open_session(ReconnectPolicy::disabled()).await;

    server
        .close(CloseReason::Lost("connection reset".to_string()))
        .await;
    let input = session.next_input().await;
    session.apply(input).await;
    session.settle().await;

    assert_eq!(connector.attempts(), 1);
    assert!(session.chat_open());
    assert!(matches!(session.state(), ChannelState::Closed(CloseReason::Lost(_))));
    assert!(session.send_chat("hello?").await.is_err());
}
