use chrono::{DateTime, Local, Utc};
use ratatui::prelude::Color;

/// Truncate a string to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for a talent or requirement status code
pub fn status_color(code: Option<&str>) -> Color {
  match code.map(|c| c.to_ascii_uppercase()).as_deref() {
    Some("ACTIVE" | "OPEN") => Color::Green,
    Some("INTERVIEWING" | "PAUSED" | "ON_HOLD") => Color::Yellow,
    Some("PLACED" | "FILLED") => Color::Cyan,
    Some("INACTIVE" | "CANCELLED" | "CLOSED") => Color::DarkGray,
    _ => Color::White,
  }
}

/// Local date for list columns, "-" when unknown
pub fn format_date(timestamp: Option<DateTime<Utc>>) -> String {
  timestamp
    .map(|t| t.with_timezone(&Local).format("%Y-%m-%d").to_string())
    .unwrap_or_else(|| "-".to_string())
}
