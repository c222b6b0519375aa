use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode, Screen};
use crate::api::Message;
use crate::chat::{Banner, ChatClient};

pub mod format;
mod login;

pub fn draw(f: &mut Frame<'_>, app: &App) {
    match &app.screen {
        Screen::Login(form) => login::draw_login(f, form),
        Screen::Chat(client) => draw_chat(f, client, &app.input_mode),
    }
}

pub fn draw_chat(f: &mut Frame<'_>, client: &ChatClient, mode: &InputMode) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Main content
            Constraint::Length(3), // Input area
        ])
        .split(size);

    draw_title_bar(f, client, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(68), // Message feed
            Constraint::Percentage(32), // Side panels
        ])
        .split(chunks[1]);

    draw_messages(f, client, main_chunks[0]);
    draw_side_panels(f, client, main_chunks[1]);
    draw_input_area(f, client, mode, chunks[2]);

    if let Some(alert) = client.alert() {
        draw_alert(f, alert, size);
    }
}

fn draw_title_bar(f: &mut Frame, client: &ChatClient, area: Rect) {
    let title = Line::from(vec![
        Span::styled(format!(" Chat #{} ", client.chat_id()), Style::default().fg(Color::Cyan)),
        Span::raw("| "),
        Span::styled(
            format!("Welcome, {}", client.user().name),
            Style::default().fg(Color::Green),
        ),
        Span::raw(" | "),
        Span::styled("o: logout", Style::default().fg(Color::Red)),
        Span::raw(" "),
    ]);

    let title_block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Blue))
        .title(" Meetchat ");

    let title_paragraph = Paragraph::new(title)
        .block(title_block)
        .alignment(Alignment::Center);

    f.render_widget(title_paragraph, area);
}

fn message_block(message: &Message, width: usize) -> Vec<Line<'static>> {
    let time = format::message_time(&message.created_at.with_timezone(&Local));
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!(" {} ", format::initial(&message.user_name)),
            Style::default().fg(Color::White).bg(Color::Blue).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            message.user_name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(time, Style::default().fg(Color::Gray)),
    ])];
    for text_line in format::wrap(&message.text, width.saturating_sub(4)) {
        lines.push(Line::from(format!("    {text_line}")));
    }
    lines.push(Line::default());
    lines
}

/// The `height` feed rows ending `scroll_back` rows above the newest line.
/// Messages are laid out newest first and only until the window is covered.
/// The second value is the largest useful `scroll_back`, known once the
/// whole history has been laid out.
fn feed_window(client: &ChatClient, width: usize, height: usize) -> (Vec<Line<'static>>, Option<usize>) {
    if let Some(error) = &client.feed_error {
        return (vec![Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red)))], Some(0));
    }

    if client.messages.is_empty() {
        let placeholder = Line::from(Span::styled(
            "No messages yet. Press i and type to start the conversation.",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        ));
        return (vec![placeholder], Some(0));
    }

    let wanted = height.saturating_add(client.scroll_back);
    let mut blocks = Vec::new();
    let mut total = 0;
    for message in client.messages.iter().rev() {
        if total >= wanted {
            break;
        }
        let block = message_block(message, width);
        total += block.len();
        blocks.push(block);
    }

    let max_back = total.saturating_sub(height);
    let back = client.scroll_back.min(max_back);
    let limit = (blocks.len() == client.messages.len()).then_some(max_back);

    let window = blocks
        .into_iter()
        .rev()
        .flatten()
        .skip(max_back - back)
        .take(height)
        .collect();
    (window, limit)
}

fn draw_messages(f: &mut Frame, client: &ChatClient, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Messages ")
        .style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let (lines, limit) = feed_window(client, inner.width as usize, inner.height as usize);
    client.note_scroll_limit(limit);

    let feed = Paragraph::new(lines).style(Style::default().fg(Color::White));
    f.render_widget(feed, inner);
}

fn draw_side_panels(f: &mut Frame, client: &ChatClient, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),      // Schedule control
            Constraint::Percentage(50), // Meetings
            Constraint::Min(0),         // Participants
        ])
        .split(area);

    draw_schedule_panel(f, client, chunks[0]);
    draw_meetings(f, client, chunks[1]);
    draw_participants(f, client, chunks[2]);
}

fn draw_schedule_panel(f: &mut Frame, client: &ChatClient, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Schedule ")
        .style(Style::default().fg(Color::Blue));

    let control = if client.is_scheduling() {
        Span::styled("[ Scheduling... ]", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(
            "[ Schedule meeting (s) ]",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )
    };

    let mut lines = vec![Line::from(control)];
    if let Some(banner) = &client.banner {
        let (icon, color) = match banner {
            Banner::Success(_) => ("✔", Color::Green),
            Banner::Info(_) => ("ℹ", Color::Yellow),
            Banner::Error(_) => ("⚠", Color::Red),
        };
        lines.push(Line::from(Span::styled(
            format!("{icon} {}", banner.text()),
            Style::default().fg(color),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_meetings(f: &mut Frame, client: &ChatClient, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Meetings ")
        .style(Style::default().fg(Color::Blue));

    let mut lines = Vec::new();
    if client.meetings.is_empty() {
        lines.push(Line::from(Span::styled(
            "No meetings scheduled yet",
            Style::default().fg(Color::Gray),
        )));
    }
    for meeting in &client.meetings {
        let start = meeting.start_utc.with_timezone(&Local);
        lines.push(Line::from(Span::styled(
            format!("▌{}", meeting.title.as_deref().unwrap_or("Untitled meeting")),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("▌{}", format::meeting_time(&start)),
            Style::default().fg(Color::Gray),
        )));
        lines.push(Line::from(Span::styled(
            format!("▌{}", format::participant_count(meeting.participants.len())),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::default());
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn draw_participants(f: &mut Frame, client: &ChatClient, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Participants ")
        .style(Style::default().fg(Color::Blue));

    let mut lines = Vec::new();
    for participant in &client.participants {
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {} ", format::initial(&participant.name)),
                Style::default().fg(Color::Black).bg(Color::Gray),
            ),
            Span::raw(" "),
            Span::styled(participant.name.clone(), Style::default().fg(Color::White)),
        ]));
        lines.push(Line::from(Span::styled(
            format!("    {}", participant.email),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines).block(block);
    f.render_widget(paragraph, area);
}

fn draw_input_area(f: &mut Frame, client: &ChatClient, mode: &InputMode, area: Rect) {
    let input_style = match mode {
        InputMode::Normal => Style::default().fg(Color::White),
        InputMode::Editing => Style::default().fg(Color::Green),
    };

    let mode_indicator = match mode {
        InputMode::Normal => "[NORMAL] i=type, s=schedule, r=reload, o=logout, q=quit",
        InputMode::Editing => "[INPUT] ESC=normal, ENTER=send",
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .title(mode_indicator)
        .style(input_style);

    let input_paragraph = Paragraph::new(client.input.as_str()).block(input_block);
    f.render_widget(input_paragraph, area);

    if *mode == InputMode::Editing && client.alert().is_none() {
        f.set_cursor(area.x + client.input.cursor_column() as u16 + 1, area.y + 1);
    }
}

fn draw_alert(f: &mut Frame, text: &str, screen: Rect) {
    let area = centered_rect(50, 7, screen);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Alert ")
        .style(Style::default().fg(Color::Red));

    let lines = vec![
        Line::from(Span::styled(text.to_string(), Style::default().fg(Color::White))),
        Line::default(),
        Line::from(Span::styled("[Enter] OK", Style::default().fg(Color::Gray))),
    ];

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        area,
    );
}

/// A box `percent_x` wide and `height` rows tall, centred in `r`.
pub(crate) fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::api::{Meeting, Message, Participant, User};
    use crate::session::{shared, MemorySessionStore, Session};
    use chrono::{TimeZone, Utc};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    pub(crate) fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn client() -> ChatClient {
        let session = Session {
            token: "tok".into(),
            user: User { id: 3, name: "Ada".into(), email: None },
        };
        ChatClient::new(Arc::new(FakeApi::new()), shared(MemorySessionStore::default()), session, 2)
    }

    fn render(client: &ChatClient) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw_chat(f, client, &InputMode::Normal)).unwrap();
        screen_text(&terminal)
    }

    #[test]
    fn header_greets_user() {
        let screen = render(&client());
        assert!(screen.contains("Welcome, Ada"));
        assert!(screen.contains("o: logout"));
    }

    #[test]
    fn feed_shows_sender_and_text() {
        let mut client = client();
        client.messages.push(message(1, "Bob", "lunch tomorrow?"));

        let screen = render(&client);
        assert!(screen.contains(" B  Bob"));
        assert!(screen.contains("lunch tomorrow?"));
    }

    #[test]
    fn feed_error_replaces_messages() {
        let mut client = client();
        client.feed_error = Some(crate::chat::FEED_ERROR.into());
        assert!(render(&client).contains("Error loading messages"));
    }

    #[test]
    fn empty_meetings_show_placeholder() {
        assert!(render(&client()).contains("No meetings scheduled yet"));
    }

    #[test]
    fn meetings_and_participants_are_listed() {
        let mut client = client();
        client.meetings.push(Meeting {
            id: None,
            chat_id: None,
            title: Some("Roadmap".into()),
            start_utc: Utc.with_ymd_and_hms(2024, 3, 6, 15, 0, 0).unwrap(),
            end_utc: None,
            description: None,
            status: None,
            participants: Vec::new(),
        });
        client.participants.push(Participant { id: Some(4), name: "Bob".into(), email: "bob@example.com".into() });

        let screen = render(&client);
        assert!(screen.contains("Roadmap"));
        assert!(screen.contains("0 participants"));
        assert!(screen.contains("bob@example.com"));
        assert!(!screen.contains("No meetings scheduled yet"));
    }

    #[test]
    fn banner_and_busy_control() {
        let mut client = client();
        client.banner = Some(Banner::Info("Which day?".into()));
        let screen = render(&client);
        assert!(screen.contains("Which day?"));
        assert!(screen.contains("Schedule meeting (s)"));
    }

    fn message(id: i64, name: &str, text: &str) -> Message {
        Message {
            id,
            chat_id: 2,
            user_id: 4,
            user_name: name.into(),
            text: text.into(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn wide_text_wraps_without_losing_glyphs() {
        let mut client = client();
        let text = "会议".repeat(30) + "终";
        client.messages.push(message(1, "Bob", &text));

        let screen = render(&client);
        assert_eq!(screen.matches('会').count(), 30);
        assert_eq!(screen.matches('议').count(), 30);
        assert!(screen.contains('终'));
    }

    #[test]
    fn long_history_is_anchored_at_newest() {
        let mut client = client();
        client.messages = (0..25_000).map(|i| message(i, "Bob", &format!("m{i}"))).collect();

        let screen = render(&client);
        assert!(screen.contains("m24999"));
        assert!(screen.contains("m24995"));
        assert!(!screen.contains("m3144"));
    }

    #[test]
    fn scrolling_back_reaches_the_oldest_message_and_stops() {
        let mut client = client();
        client.messages = (0..20).map(|i| message(i, "Bob", &format!("m{i}"))).collect();

        client.scroll_up(1_000);
        let screen = render(&client);
        assert!(screen.contains("    m0 "));
        assert!(!screen.contains("m19"));

        // 20 messages of 3 rows in a 32 row feed
        client.scroll_up(10);
        assert_eq!(client.scroll_back, 28);
        client.scroll_down(10);
        assert_eq!(client.scroll_back, 18);
    }

    #[test]
    fn scroll_back_is_clamped_to_history() {
        let mut client = client();
        client.scroll_back = 10_000;
        // Only the placeholder line exists; rendering must not panic.
        assert!(render(&client).contains("No messages yet"));
    }
}
