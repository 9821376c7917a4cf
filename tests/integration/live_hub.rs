//! End-to-end tests against an in-process hub.
//!
//! Starts `boardsync-hub` on an OS-assigned port and drives real sessions
//! over HTTP and WebSocket: join announcements, chat relay, drag moves
//! propagated to a second member, and server-side rejections.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::similar_names,
    clippy::redundant_clone
)]

use std::sync::Arc;
use std::time::Duration;

use boardsync::api::BoardApi;
use boardsync::api::http::HttpBoardApi;
use boardsync::channel::ws::WsConnector;
use boardsync::channel::{ChannelState, CloseReason, ws_base_from_api};
use boardsync::drag::DropTarget;
use boardsync::session::{BoardSession, ReconnectPolicy, SessionConfig, SessionInput};
use boardsync_hub::hub::start_server_with_state;
use boardsync_hub::state::HubState;
use boardsync_proto::task::{TaskId, TaskStatus};

type LiveSession = BoardSession<HttpBoardApi, WsConnector>;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Starts a hub serving the demo board and returns its API URL.
async fn start_hub() -> String {
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::new(HubState::default()))
        .await
        .expect("failed to start hub");
    format!("http://{addr}")
}

fn make_api(api_url: &str, token: &str) -> HttpBoardApi {
    HttpBoardApi::new(api_url, token, Duration::from_secs(5)).unwrap()
}

/// Creates a session for `token` on the demo board, loaded and connected.
async fn join(api_url: &str, token: &str) -> LiveSession {
    let connector = WsConnector::new(ws_base_from_api(api_url).unwrap(), token)
        .with_connect_timeout(Duration::from_secs(5));
    let config = SessionConfig::new("b1").with_reconnect(ReconnectPolicy::disabled());
    let mut session = BoardSession::new(Arc::new(make_api(api_url, token)), Arc::new(connector), config);
    session.load_board();
    session.open_chat();
    pump(&mut session).await;
    session
}

/// Apply inputs until nothing arrives for a short while.
async fn pump(session: &mut LiveSession) {
    loop {
        match tokio::time::timeout(Duration::from_millis(300), session.next_input()).await {
            Ok(SessionInput::Idle) | Err(_) => break,
            Ok(input) => session.apply(input).await,
        }
    }
}

fn texts(session: &LiveSession) -> Vec<String> {
    session
        .log()
        .entries()
        .iter()
        .map(|e| e.text().to_string())
        .collect()
}

fn status_of(session: &LiveSession, id: &str) -> TaskStatus {
    session.registry().find(&TaskId::new(id)).unwrap().status
}

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

#[tokio::test]
async fn http_api_reads_demo_board() {
    let api_url = start_hub().await;
    let api = make_api(&api_url, "alice-token");

    let board = api.fetch_board("b1").await.unwrap();
    assert_eq!(board.name, "Demo Board");
    assert_eq!(board.stats.total_tasks, 4);

    let tasks = api.fetch_board_tasks("b1").await.unwrap();
    assert_eq!(tasks.len(), 4);

    let online = api.fetch_online_users("b1").await.unwrap();
    assert_eq!(online.count, 0);
}

#[tokio::test]
async fn http_api_surfaces_detail_of_rejections() {
    let api_url = start_hub().await;

    let err = make_api(&api_url, "bogus").fetch_board("b1").await.unwrap_err();
    assert_eq!(err.user_message(), "Invalid token");

    let err = make_api(&api_url, "bob-token")
        .patch_task_status(&TaskId::new("t1"), TaskStatus::Review)
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "You can only update tasks assigned to you");
}

// ---------------------------------------------------------------------------
// Board channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn members_see_each_other_join_and_chat() {
    let api_url = start_hub().await;
    let mut alice = join(&api_url, "alice-token").await;
    assert_eq!(alice.state(), &ChannelState::Open);
    assert_eq!(texts(&alice), ["Welcome to the board chat, alice!"]);

    let mut bob = join(&api_url, "bob-token").await;
    pump(&mut alice).await;
    assert_eq!(
        texts(&alice),
        ["Welcome to the board chat, alice!", "bob joined the chat"]
    );
    assert!(alice.presence().contains("u1"));
    assert!(alice.presence().contains("u2"));

    assert!(bob.send_chat("morning!").await.unwrap());
    pump(&mut alice).await;
    pump(&mut bob).await;
    assert_eq!(texts(&alice).last().unwrap(), "morning!");
    assert_eq!(texts(&bob).last().unwrap(), "morning!");

    bob.close_chat().await;
    pump(&mut alice).await;
    assert_eq!(texts(&alice).last().unwrap(), "bob left the chat");
    assert!(!alice.presence().contains("u2"));
}

#[tokio::test]
async fn drag_move_reaches_other_member() {
    let api_url = start_hub().await;
    let mut alice = join(&api_url, "alice-token").await;
    let mut bob = join(&api_url, "bob-token").await;
    pump(&mut alice).await;
    assert_eq!(status_of(&bob, "t1"), TaskStatus::Todo);

    alice.begin_drag(&TaskId::new("t1")).unwrap();
    alice.drop_on(Some(&DropTarget::Task(TaskId::new("t3"))));
    pump(&mut alice).await;
    assert_eq!(status_of(&alice, "t1"), TaskStatus::Review);

    pump(&mut bob).await;
    assert_eq!(status_of(&bob, "t1"), TaskStatus::Review);
    assert_eq!(
        texts(&bob).last().unwrap(),
        "alice updated a task (moved to Review)"
    );
    assert!(alice.drain_notices().is_empty());
}

#[tokio::test]
async fn rejected_move_rolls_back_on_live_hub() {
    let api_url = start_hub().await;
    let mut alice = join(&api_url, "alice-token").await;
    let mut bob = join(&api_url, "bob-token").await;
    pump(&mut alice).await;
    let alice_log = alice.log().len();

    bob.begin_drag(&TaskId::new("t1")).unwrap();
    bob.drop_on(Some(&DropTarget::Column(TaskStatus::Completed)));
    pump(&mut bob).await;

    assert_eq!(status_of(&bob, "t1"), TaskStatus::Todo);
    let notices = bob.drain_notices();
    assert_eq!(
        notices[0].text,
        "Failed to update task: You can only update tasks assigned to you"
    );

    pump(&mut alice).await;
    assert_eq!(alice.log().len(), alice_log);
}

#[tokio::test]
async fn invalid_token_closes_channel_without_retry() {
    let api_url = start_hub().await;
    let connector = WsConnector::new(ws_base_from_api(&api_url).unwrap(), "bogus");
    let config = SessionConfig::new("b1");
    let mut session = BoardSession::new(
        Arc::new(make_api(&api_url, "bogus")),
        Arc::new(connector),
        config,
    );

    session.open_chat();
    pump(&mut session).await;

    assert_eq!(
        session.state(),
        &ChannelState::Closed(CloseReason::Server {
            code: 1008,
            reason: "Invalid token".to_string(),
        })
    );
    assert!(
        session
            .drain_notices()
            .iter()
            .any(|n| n.text.contains("Invalid token"))
    );
}
