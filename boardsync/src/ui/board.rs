//! Board rendering: header plus the four status columns.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use boardsync_proto::task::{Task, TaskStatus};

use super::theme;
use crate::app::{App, PanelFocus};
use crate::drag::{DropTarget, resolve_destination};
use crate::session::SessionView;

/// Render the board header and columns.
pub fn render(frame: &mut Frame, area: Rect, app: &App, view: &SessionView<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3)])
        .split(area);

    render_header(frame, chunks[0], app, view);

    let column_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(chunks[1]);

    let columns = view.registry.columns_filtered(&app.filter);
    let drop_target = view.drag.and_then(|_| app.drop_target(&columns));
    let drop_column = drop_target
        .as_ref()
        .and_then(|target| resolve_destination(view.registry, target));
    let carried = view.drag.and_then(|drag| view.registry.find(&drag.task_id));

    for status in TaskStatus::ALL {
        let marks = ColumnMarks {
            selected_row: (view.drag.is_none()
                && app.focus == PanelFocus::Board
                && app.selected_column == status.column())
            .then_some(app.selected_row),
            is_drop_column: drop_column == Some(status),
            drop_target: drop_target.as_ref(),
            carried,
        };
        render_column(
            frame,
            column_areas[status.column()],
            status,
            columns.tasks(status),
            &marks,
        );
    }
}

struct ColumnMarks<'a> {
    selected_row: Option<usize>,
    is_drop_column: bool,
    drop_target: Option<&'a DropTarget>,
    carried: Option<&'a Task>,
}

fn render_header(frame: &mut Frame, area: Rect, app: &App, view: &SessionView<'_>) {
    let mut spans = match view.board {
        Some(board) => vec![
            Span::styled(board.name.clone(), theme::bold()),
            Span::raw("  "),
            Span::styled(
                format!(
                    "{} tasks · {} completed · {} pending",
                    board.stats.total_tasks, board.stats.completed_tasks, board.stats.pending_tasks
                ),
                theme::dimmed(),
            ),
        ],
        None => vec![Span::styled(
            format!("Loading board {}…", view.board_id),
            theme::dimmed(),
        )],
    };

    if !app.filter.is_empty() || app.focus == PanelFocus::Filter {
        spans.push(Span::raw("  |  filter: "));
        let query_style = if app.focus == PanelFocus::Filter {
            theme::highlighted()
        } else {
            theme::normal()
        };
        spans.push(Span::styled(format!("\"{}\"", app.filter.query), query_style));
        if let Some(priority) = app.filter.priority {
            spans.push(Span::styled(
                format!(" [{priority}]"),
                theme::normal().fg(theme::priority_color(priority)),
            ));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_column(
    frame: &mut Frame,
    area: Rect,
    status: TaskStatus,
    tasks: &[&Task],
    marks: &ColumnMarks<'_>,
) {
    let mut items: Vec<ListItem> = tasks
        .iter()
        .enumerate()
        .map(|(row, task)| {
            let is_carried = marks.carried.is_some_and(|c| c.id == task.id);
            let is_target =
                matches!(marks.drop_target, Some(DropTarget::Task(id)) if *id == task.id);
            let style = if is_carried {
                theme::dragging()
            } else if marks.selected_row == Some(row) {
                theme::selected()
            } else if is_target {
                theme::highlighted()
            } else {
                theme::normal()
            };
            ListItem::new(card_line(task)).style(style)
        })
        .collect();

    if marks.is_drop_column
        && let Some(carried) = marks.carried
        && carried.status != status
    {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("» {}", carried.title),
            theme::drop_ghost(),
        ))));
    }

    let border_style = if marks.is_drop_column {
        theme::panel_title(theme::WARNING)
    } else if marks.selected_row.is_some() {
        theme::highlighted()
    } else {
        theme::normal()
    };

    let block = Block::default()
        .title(Span::styled(
            format!("{} ({})", status.label(), tasks.len()),
            theme::panel_title(theme::column_color(status)),
        ))
        .borders(Borders::ALL)
        .border_style(border_style);

    frame.render_widget(List::new(items).block(block), area);
}

fn card_line(task: &Task) -> Line<'_> {
    let mut spans = vec![
        Span::styled("■ ", theme::normal().fg(theme::priority_color(task.priority))),
        Span::raw(task.title.as_str()),
    ];
    if let Some(assignee) = &task.assigned_to {
        spans.push(Span::styled(format!(" @{assignee}"), theme::dimmed()));
    }
    Line::from(spans)
}
