use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::centered_rect;
use crate::login::{AuthMode, Field, LoginForm};

const LABEL_WIDTH: u16 = 11;

fn label(field: Field) -> &'static str {
    match field {
        Field::Name => "Name",
        Field::Email => "Email",
        Field::Password => "Password",
    }
}

pub fn draw_login(f: &mut Frame<'_>, form: &LoginForm) {
    let size = f.size();
    let area = centered_rect(60, 14, size);

    let title = match form.mode {
        AuthMode::Login => " Meetchat - Login ",
        AuthMode::Register => " Meetchat - Register ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);

    let mut lines = Vec::new();
    if let Some(notice) = &form.notice {
        lines.push(Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Yellow))));
    }
    lines.push(Line::default());

    let mut cursor = None;
    for &field in form.fields() {
        let input = form.field(field);
        let shown = match field {
            Field::Password => "•".repeat(input.as_str().chars().count()),
            _ => input.as_str().to_string(),
        };
        let focused = field == form.focus;
        let label_style = if focused {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };

        if focused {
            // The mask is one column per character.
            let column = match field {
                Field::Password => input.cursor(),
                _ => input.cursor_column(),
            };
            cursor = Some((
                inner.x + LABEL_WIDTH + column as u16,
                inner.y + lines.len() as u16,
            ));
        }
        lines.push(Line::from(vec![
            Span::styled(format!("{:<width$}", label(field), width = LABEL_WIDTH as usize), label_style),
            Span::styled(shown, Style::default().fg(Color::White)),
        ]));
    }

    lines.push(Line::default());
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
        lines.push(Line::default());
    }

    let switch_hint = match form.mode {
        AuthMode::Login => "Ctrl+R=register",
        AuthMode::Register => "Ctrl+R=login",
    };
    lines.push(Line::from(Span::styled(
        format!("TAB=next field, ENTER=submit, {switch_hint}, ESC=quit"),
        Style::default().fg(Color::DarkGray),
    )));

    f.render_widget(Clear, area);
    f.render_widget(block, area);
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: false }),
        inner,
    );

    if let Some((x, y)) = cursor {
        f.set_cursor(x, y);
    }
}
