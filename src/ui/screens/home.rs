use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::ui::styles;
use crate::utils::{format_age, truncate_string};

/// Sidebar width in columns
const SIDEBAR_WIDTH: u16 = 30;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(area);

    render_sidebar(frame, app, chunks[0]);
    render_main(frame, app, chunks[1]);
}

fn render_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let inner_width = SIDEBAR_WIDTH.saturating_sub(4) as usize;
    let mut lines = vec![Line::from(Span::styled(" Signed in as", styles::muted_style()))];

    // Nothing is shown when the store has no user
    if let Some(ref user) = app.sidebar.user_identifier {
        lines.push(Line::from(Span::styled(
            format!(" {}", truncate_string(user, inner_width)),
            styles::highlight_style(),
        )));
    }
    if let Some(since) = app.sidebar.signed_in_at {
        lines.push(Line::from(Span::styled(
            format!(" {}", format_age(since, Utc::now())),
            styles::muted_style(),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" [l]", styles::help_key_style()),
        Span::styled(" Logout", styles::help_desc_style()),
    ]));
    lines.push(Line::from(vec![
        Span::styled(" [g]", styles::help_key_style()),
        Span::styled(" Go to path", styles::help_desc_style()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false))
        .title(Span::styled(" Account ", styles::title_style()));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_main(frame: &mut Frame, app: &App, area: Rect) {
    let user = app.sidebar.user_identifier.as_deref().unwrap_or("there");
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!(" Welcome, {}!", user), styles::title_style())),
        Line::from(""),
        Line::from(Span::styled(
            " You are signed in.",
            styles::list_item_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Backend: ", styles::muted_style()),
            Span::styled(app.config.backend_uri.as_str(), styles::success_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title(Span::styled(" Home ", styles::title_style()));

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}
