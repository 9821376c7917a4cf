//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, PanelFocus};
use crate::channel::ChannelState;
use crate::session::{NoticeLevel, SessionView};

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App, view: &SessionView<'_>) {
    let help_text = match app.focus {
        _ if view.drag.is_some() => "←→↑↓: move | Space/Enter: drop | Esc: cancel",
        PanelFocus::Board => {
            "Space: pick up | c: chat | Tab: type | /: search | p: priority | r: reload | q: quit"
        }
        PanelFocus::ChatInput => "Enter: send | PgUp/PgDn: scroll | Esc: back to board",
        PanelFocus::Filter => "type to search | Enter/Esc: done",
    };

    let (dot_color, status_text) = match view.state {
        ChannelState::Open => (theme::SUCCESS, view.state.to_string()),
        ChannelState::Connecting => (theme::WARNING, "Connecting...".to_string()),
        ChannelState::Closed(_) => (theme::OFFLINE, view.state.to_string()),
    };

    let mut spans = vec![
        Span::styled("BoardSync v0.1.0", theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(dot_color)),
        Span::raw(format!(" {status_text}")),
    ];
    if view.pending > 0 {
        spans.push(Span::styled(" ⟳", theme::dimmed()));
    }
    spans.push(Span::raw(" | "));
    match app.notice() {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Info => theme::SUCCESS,
                NoticeLevel::Error => theme::ERROR,
            };
            spans.push(Span::styled(notice.text.as_str(), theme::normal().fg(color)));
            let queued = app.queued_notices();
            if queued > 0 {
                spans.push(Span::styled(format!(" (+{queued})"), theme::dimmed()));
            }
        }
        None => spans.push(Span::styled(help_text, theme::dimmed())),
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
