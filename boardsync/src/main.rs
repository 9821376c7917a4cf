//! `BoardSync`: terminal kanban board with live chat.
//!
//! Opens one board, keeps its columns in sync with the server and shows
//! the board's chat channel next to it. Configuration via CLI flags,
//! environment variables, or config file (`~/.config/boardsync/config.toml`).
//!
//! ```bash
//! cargo run --bin boardsync -- --api-url http://127.0.0.1:8000 \
//!     --token alice-token --board b1
//!
//! # Or via environment variables
//! BOARDSYNC_API_URL=http://127.0.0.1:8000 BOARDSYNC_TOKEN=alice-token \
//!     BOARDSYNC_BOARD=b1 cargo run --bin boardsync
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing_appender::non_blocking::WorkerGuard;
use url::Url;

use boardsync::api::BoardApi;
use boardsync::api::http::HttpBoardApi;
use boardsync::app::{Action, App};
use boardsync::channel::ChannelConnector;
use boardsync::channel::ws::WsConnector;
use boardsync::config::{CliArgs, ClientConfig};
use boardsync::session::{BoardSession, Notice, SessionInput};
use boardsync::{channel, ui};

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };
    let endpoint = match config.endpoint() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Logs go to a file; the terminal belongs to the TUI.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(board_id = %endpoint.board_id, api_url = %endpoint.api_url, "boardsync starting");

    let api = match HttpBoardApi::new(&endpoint.api_url, endpoint.token.clone(), config.request_timeout) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let ws_base = match endpoint.ws_url.as_deref() {
        Some(ws_url) => Url::parse(ws_url).map_err(channel::ChannelError::from),
        None => channel::ws_base_from_api(&endpoint.api_url),
    };
    let ws_base = match ws_base {
        Ok(url) => url,
        Err(e) => {
            eprintln!("Error: invalid WebSocket URL: {e}");
            std::process::exit(1);
        }
    };
    let connector = WsConnector::new(ws_base, endpoint.token.clone())
        .with_connect_timeout(config.connect_timeout)
        .with_capacity(config.channel_capacity);

    let mut session = BoardSession::new(
        Arc::new(api),
        Arc::new(connector),
        config.session_config(&endpoint.board_id),
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut session, &config).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("boardsync exiting");
    result
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("boardsync.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Main application loop.
///
/// Each turn draws, handles at most one session input, then at most one
/// key press. When the session has nothing pending the key poll blocks
/// for the configured timeout instead.
async fn run_app<A: BoardApi, C: ChannelConnector>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut BoardSession<A, C>,
    config: &ClientConfig,
) -> io::Result<()> {
    let mut app = App::new(config.timestamp_format.clone());

    session.load_board();
    session.open_chat();

    loop {
        terminal.draw(|frame| ui::draw(frame, &app, &session.view()))?;

        let key_wait = match tokio::time::timeout(config.poll_timeout, session.next_input()).await {
            Ok(SessionInput::Idle) => config.poll_timeout,
            Ok(input) => {
                session.apply(input).await;
                Duration::ZERO
            }
            Err(_) => Duration::ZERO,
        };
        for notice in session.drain_notices() {
            app.show_notice(notice);
        }

        if event::poll(key_wait)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let action = app.handle_key_event(key, &session.view());
            if let Some(action) = action {
                app.dismiss_notice();
                apply_action(&mut app, session, action).await;
            }
        }

        if app.should_quit {
            session.close_chat().await;
            return Ok(());
        }
    }
}

async fn apply_action<A: BoardApi, C: ChannelConnector>(
    app: &mut App,
    session: &mut BoardSession<A, C>,
    action: Action,
) {
    match action {
        Action::Quit => {}
        Action::BeginDrag(task_id) => {
            if let Err(e) = session.begin_drag(&task_id) {
                app.show_notice(Notice::error(e.to_string()));
            }
        }
        Action::Hover(target) => session.hover(target),
        Action::Drop(target) => {
            let outcome = session.drop_on(target.as_ref());
            tracing::debug!(?outcome, "drop handled");
        }
        Action::CancelDrag => session.cancel_drag(),
        Action::ToggleChat => session.toggle_chat().await,
        Action::SendChat(text) => {
            if let Err(e) = session.send_chat(&text).await {
                app.show_notice(Notice::error(format!("Message not sent: {e}")));
            }
            if let Err(e) = session.set_typing(false).await {
                tracing::debug!(err = %e, "failed to clear typing indicator");
            }
        }
        Action::Typing(is_typing) => {
            if let Err(e) = session.set_typing(is_typing).await {
                tracing::debug!(err = %e, "failed to send typing indicator");
            }
        }
        Action::ScrollChat { up: true } => session.log_mut().scroll_up(),
        Action::ScrollChat { up: false } => session.log_mut().scroll_down(),
        Action::Reload => {
            session.load_board();
        }
    }
}
