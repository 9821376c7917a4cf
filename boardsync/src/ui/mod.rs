//! Terminal UI rendering.

pub mod board;
pub mod chat_panel;
pub mod status_bar;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};

use crate::app::App;
use crate::session::SessionView;

/// Main draw function for the entire UI.
pub fn draw(frame: &mut Frame, app: &App, view: &SessionView<'_>) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let content_area = main_chunks[0];
    let status_area = main_chunks[1];

    if view.chat_open {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(content_area);
        board::render(frame, content_chunks[0], app, view);
        chat_panel::render(frame, content_chunks[1], app, view);
    } else {
        board::render(frame, content_area, app, view);
    }

    status_bar::render(frame, status_area, app, view);
}
