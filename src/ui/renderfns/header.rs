use crate::ui::view::Shortcut;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// State of the shared parameter cache, shown next to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
  Ready,
  Loading,
  Failed,
}

/// Draw the header bar with title, backend host, and the view's shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  host: &str,
  lookups: LookupStatus,
  shortcuts: &[Shortcut],
) {
  let mut spans = vec![
    Span::styled(format!(" {} ", title), Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", host), Style::default().fg(Color::White)),
  ];

  match lookups {
    LookupStatus::Ready => {}
    LookupStatus::Loading => spans.push(Span::styled(
      "│ loading lookups ",
      Style::default().fg(Color::DarkGray),
    )),
    LookupStatus::Failed => spans.push(Span::styled(
      "│ lookups unavailable ",
      Style::default().fg(Color::Red),
    )),
  }

  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);
  for shortcut in shortcuts {
    spans.push(Span::raw("  "));
    spans.push(Span::styled(format!("<{}>", shortcut.key), Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
