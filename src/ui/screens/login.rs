use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, LoginFocus};
use crate::ui::{centered_rect_fixed, styles};
use crate::utils::{mask_secret, truncate_string};

/// Visible width of the input fields
const FIELD_WIDTH: usize = 24;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let form = &app.login;
    let field_errors = form.field_errors();

    let mut height = 11;
    height += field_errors.len() as u16;
    if form.error.is_some() {
        height += 3;
    }
    let area = centered_rect_fixed(50, height, area);

    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled("   Sign in", styles::title_style())),
        Line::from(Span::styled(
            format!("   {}", truncate_string(app.config.backend_uri.as_str(), 42)),
            styles::muted_style(),
        )),
        Line::from(""),
    ];

    // Identifier field
    let focused = form.focus == LoginFocus::Identifier;
    let shown = truncate_string(&form.identifier, FIELD_WIDTH);
    lines.push(field_line("   Email:    [", &shown, focused));

    // Secret field
    let focused = form.focus == LoginFocus::Secret;
    let shown = mask_secret(&form.secret, FIELD_WIDTH);
    lines.push(field_line("   Password: [", &shown, focused));

    for error in &field_errors {
        lines.push(Line::from(Span::styled(
            format!("   {}", error),
            styles::error_style(),
        )));
    }

    // Login button
    lines.push(Line::from(""));
    let focused = form.focus == LoginFocus::Button;
    let label = if form.is_in_flight() {
        " Signing in… "
    } else if focused {
        " ▶ Login ◀  "
    } else {
        "   Login    "
    };
    lines.push(Line::from(vec![
        Span::raw("               ["),
        Span::styled(label, styles::button_style(focused, form.can_submit())),
        Span::raw("]"),
    ]));

    // Error message from the last attempt
    if let Some(ref error) = form.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", truncate_string(error, 46)),
            styles::error_style(),
        )));
        lines.push(Line::from(Span::styled(
            " [Esc] dismiss",
            styles::muted_style(),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " [Tab] next field  [Enter] confirm  [Ctrl+C] quit",
        styles::muted_style(),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_line<'a>(label: &'a str, value: &str, focused: bool) -> Line<'a> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let cursor = if focused { "▌" } else { " " };
    Line::from(vec![
        Span::styled(label, styles::muted_style()),
        Span::styled(format!("{:<width$}{}", value, cursor, width = FIELD_WIDTH), style),
        Span::styled("]", styles::muted_style()),
    ])
}
