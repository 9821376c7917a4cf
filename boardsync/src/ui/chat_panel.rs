//! Chat panel rendering (online users, message list, input box).

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::theme;
use crate::app::{App, PanelFocus};
use crate::message_log::LogEntry;
use crate::session::SessionView;

/// Render the chat panel.
pub fn render(frame: &mut Frame, area: Rect, app: &App, view: &SessionView<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);

    render_presence(frame, chunks[0], view);
    render_messages(frame, chunks[1], app, view);
    render_input(frame, chunks[2], app, view);
}

fn render_presence(frame: &mut Frame, area: Rect, view: &SessionView<'_>) {
    let names: Vec<Span> = view
        .presence
        .users()
        .iter()
        .flat_map(|user| {
            let name = user.display_name();
            [
                Span::styled(name.to_string(), theme::normal().fg(theme::sender_color(name))),
                Span::raw(" "),
            ]
        })
        .collect();

    let block = Block::default()
        .title(Span::styled(
            format!("Online ({})", view.presence.count()),
            theme::panel_title(theme::SUCCESS),
        ))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(Line::from(names)).block(block), area);
}

fn render_messages(frame: &mut Frame, area: Rect, app: &App, view: &SessionView<'_>) {
    let height = usize::from(area.height.saturating_sub(3));
    let mut items: Vec<ListItem> = view
        .log
        .visible(height)
        .iter()
        .map(|entry| ListItem::new(entry_line(entry, &app.timestamp_format)))
        .collect();

    let typing: Vec<&str> = view.presence.typing().collect();
    if !typing.is_empty() {
        let verb = if typing.len() == 1 { "is" } else { "are" };
        items.push(ListItem::new(Line::from(Span::styled(
            format!("{} {verb} typing…", typing.join(", ")),
            theme::dimmed(),
        ))));
    }

    let mut title = "Chat".to_string();
    if !view.log.is_following() {
        title.push_str(&format!(" (↑{})", view.log.scroll_offset()));
    }
    let block = Block::default()
        .title(Span::styled(title, theme::panel_title(theme::CHAT_TITLE)))
        .borders(Borders::ALL);
    frame.render_widget(List::new(items).block(block), area);
}

fn entry_line<'a>(entry: &'a LogEntry, timestamp_format: &str) -> Line<'a> {
    let time = Span::styled(entry.timestamp().format(timestamp_format), theme::timestamp());
    match entry {
        LogEntry::Chat { username, text, .. } => Line::from(vec![
            time,
            Span::raw(" "),
            Span::styled(username.as_str(), theme::normal().fg(theme::sender_color(username))),
            Span::raw(": "),
            Span::styled(text.as_str(), theme::normal()),
        ]),
        LogEntry::System { text, .. } => Line::from(vec![
            time,
            Span::raw(" "),
            Span::styled(text.as_str(), theme::system_message()),
        ]),
    }
}

fn render_input(frame: &mut Frame, area: Rect, app: &App, view: &SessionView<'_>) {
    let is_focused = app.focus == PanelFocus::ChatInput;

    let line = if !view.state.is_open() {
        Line::from(Span::styled(view.state.to_string(), theme::dimmed()))
    } else if app.input.is_empty() && !is_focused {
        Line::from(Span::styled("Tab to type a message...", theme::dimmed()))
    } else {
        let mut text = app.input.clone();
        if is_focused {
            text.push('█');
        }
        Line::from(Span::styled(text, theme::normal()))
    };

    let block = Block::default()
        .title("Message")
        .borders(Borders::ALL)
        .border_style(if is_focused {
            theme::highlighted()
        } else {
            theme::normal()
        });
    frame.render_widget(Paragraph::new(line).block(block), area);
}
