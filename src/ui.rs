use chrono::{DateTime, Utc};
use console::{strip_ansi_codes, Term};
use owo_colors::OwoColorize;
use turnier_client::SessionStatus;
use unicode_width::UnicodeWidthStr;

/// Terminal output for the CLI
pub struct UI {
    term: Term,
}

impl UI {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    /// Apply `color_fn` only when the terminal supports color
    fn colorize<F>(&self, text: &str, color_fn: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        if self.supports_color() {
            color_fn(text)
        } else {
            text.to_string()
        }
    }

    pub fn success(&self, message: &str) {
        let output = self.colorize(message, |m| m.green().bold().to_string());
        println!("{}", output);
    }

    pub fn error(&self, message: &str) {
        let output = self.colorize(message, |m| m.red().bold().to_string());
        eprintln!("{}", output);
    }

    pub fn warning(&self, message: &str) {
        let output = self.colorize(message, |m| m.yellow().bold().to_string());
        println!("{}", output);
    }

    pub fn info(&self, message: &str) {
        let output = self.colorize(message, |m| m.blue().bold().to_string());
        println!("{}", output);
    }

    /// Plain output, e.g. a response body
    pub fn print(&self, text: &str) {
        println!("{}", text);
    }

    /// Authenticated / expiring / expired / signed out
    pub fn format_session_state(&self, status: &SessionStatus) -> String {
        let (text, level) = session_state_label(status);
        match level {
            Level::Good => self.colorize(text, |t| t.green().to_string()),
            Level::Warn => self.colorize(text, |t| t.yellow().to_string()),
            Level::Bad => self.colorize(text, |t| t.red().to_string()),
        }
    }

    pub fn format_server_status(&self, reachable: Option<bool>) -> String {
        match reachable {
            Some(true) => self.colorize("Reachable", |t| t.green().to_string()),
            Some(false) => self.colorize("Unhealthy", |t| t.yellow().to_string()),
            None => self.colorize("Unreachable", |t| t.red().to_string()),
        }
    }

    pub fn format_expiry(&self, expires_at: Option<DateTime<Utc>>, remaining_ms: Option<i64>) -> String {
        match (expires_at, remaining_ms) {
            (Some(at), Some(remaining)) if remaining > 0 => format!(
                "{} (in {})",
                at.format("%Y-%m-%d %H:%M:%S UTC"),
                format_duration_ms(remaining)
            ),
            (Some(at), _) => format!("{} (expired)", at.format("%Y-%m-%d %H:%M:%S UTC")),
            _ => "-".to_string(),
        }
    }

    /// Missing values render as "-"
    pub fn format_user_field(&self, value: Option<String>) -> String {
        value.unwrap_or_else(|| "-".to_string())
    }

    /// Create a card-style display for information
    pub fn card(&self, title: &str, content: Vec<(&str, String)>) {
        let card_width = self.width().saturating_sub(4).clamp(50, 80);
        let supports_color = self.supports_color();

        println!("╭{}╮", "─".repeat(card_width - 2));
        let title_spaces = card_width.saturating_sub(title.width() + 4);
        if supports_color {
            println!("│ {} {}│", title.cyan().bold(), " ".repeat(title_spaces));
        } else {
            println!("│ {} {}│", title, " ".repeat(title_spaces));
        }
        println!("├{}┤", "─".repeat(card_width - 2));

        for (label, value) in content {
            // Widths are measured on the text without ANSI codes
            let content_width =
                strip_ansi_codes(label).width() + strip_ansi_codes(&value).width() + 4;
            let spaces = if content_width < card_width - 1 {
                card_width - content_width - 1
            } else {
                1
            };

            if supports_color {
                println!("│ {}: {}{}│", label.dimmed(), value, " ".repeat(spaces));
            } else {
                println!("│ {}: {}{}│", label, value, " ".repeat(spaces));
            }
        }

        println!("╰{}╯", "─".repeat(card_width - 2));
        println!();
    }

    pub fn width(&self) -> usize {
        self.term.size().1 as usize
    }

    pub fn supports_color(&self) -> bool {
        self.term.features().colors_supported()
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Good,
    Warn,
    Bad,
}

fn session_state_label(status: &SessionStatus) -> (&'static str, Level) {
    match (status.token_present, status.valid, status.refresh_due) {
        (false, _, _) => ("Not logged in", Level::Bad),
        (true, true, false) => ("Authenticated", Level::Good),
        (true, true, true) => ("Authenticated (refresh due)", Level::Warn),
        (true, false, _) if status.expires_at.is_some() => ("Session expired", Level::Bad),
        (true, false, _) => ("Token unreadable", Level::Warn),
    }
}

/// "1h 05m", "12m 30s", "45s"
pub fn format_duration_ms(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(token_present: bool, valid: bool, refresh_due: bool) -> SessionStatus {
        SessionStatus {
            token_present,
            valid,
            expires_at: None,
            remaining_ms: None,
            refresh_due,
            user: None,
        }
    }

    #[test]
    fn test_session_state_label() {
        assert_eq!(session_state_label(&status(false, false, false)).0, "Not logged in");
        assert_eq!(session_state_label(&status(true, true, false)).0, "Authenticated");
        assert_eq!(session_state_label(&status(true, true, true)).1, Level::Warn);
        assert_eq!(session_state_label(&status(true, false, false)).0, "Token unreadable");

        let expired = SessionStatus {
            expires_at: DateTime::from_timestamp(1_700_000_000, 0),
            ..status(true, false, false)
        };
        assert_eq!(session_state_label(&expired).0, "Session expired");
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(45_000), "45s");
        assert_eq!(format_duration_ms(750_000), "12m 30s");
        assert_eq!(format_duration_ms(3_900_000), "1h 05m");
        assert_eq!(format_duration_ms(-5), "0s");
    }
}
