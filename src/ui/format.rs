use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Time of day with two-digit hour and minute, e.g. `09:05 AM`.
pub fn message_time<Tz: TimeZone>(ts: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    ts.format("%I:%M %p").to_string()
}

/// Weekday, month, day and time, e.g. `Wed, Mar 6, 03:00 PM`.
pub fn meeting_time<Tz: TimeZone>(ts: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    ts.format("%a, %b %-d, %I:%M %p").to_string()
}

/// First character of a name, for the avatar badge.
pub fn initial(name: &str) -> String {
    name.chars().next().map_or_else(|| "?".to_string(), |c| c.to_string())
}

pub fn participant_count(count: usize) -> String {
    format!("{count} participants")
}

/// Greedy wrap measured in terminal columns; words wider than `width` are
/// split. A glyph wider than `width` still gets a line of its own.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0;

        for word in paragraph.split(' ') {
            let word_width = word.width();
            let needed = if line.is_empty() { word_width } else { line_width + 1 + word_width };

            if needed <= width {
                if !line.is_empty() {
                    line.push(' ');
                    line_width += 1;
                }
                line.push_str(word);
                line_width += word_width;
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_width = 0;
            }

            for c in word.chars() {
                let char_width = c.width().unwrap_or(0);
                if !line.is_empty() && line_width + char_width > width {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0;
                }
                line.push(c);
                line_width += char_width;
            }
        }
        lines.push(line);
    }

    lines
}
