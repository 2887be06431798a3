use super::input::TextInput;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Draw a bordered prompt box in the top-left corner of `area`.
///
/// `extra_rows` reserves space below the input line; the rect for those
/// rows is returned when there is room for them.
pub fn render_prompt(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  prefix: &str,
  input: &TextInput,
  extra_rows: u16,
) -> Option<Rect> {
  let width = (area.width * 60 / 100).clamp(30, 60).min(area.width.saturating_sub(2));
  let height = (3 + extra_rows).min(area.height.saturating_sub(1));
  let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height);

  frame.render_widget(Clear, overlay_area);

  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow))
    .title(format!(" {} ", title));

  let inner = block.inner(overlay_area);
  frame.render_widget(block, overlay_area);

  if inner.height == 0 {
    return None;
  }

  let (before, after) = input.split_at_cursor();
  let cursor = Style::default().fg(Color::Black).bg(Color::Yellow);
  let mut spans = vec![
    Span::styled(prefix.to_string(), Style::default().fg(Color::Yellow)),
    Span::raw(before.to_string()),
  ];
  let mut rest = after.chars();
  match rest.next() {
    Some(c) => {
      spans.push(Span::styled(c.to_string(), cursor));
      spans.push(Span::raw(rest.as_str().to_string()));
    }
    None => spans.push(Span::styled(" ", cursor)),
  }

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(1), Constraint::Min(0)])
    .split(inner);
  frame.render_widget(Paragraph::new(Line::from(spans)), rows[0]);

  (extra_rows > 0 && rows[1].height > 0).then_some(rows[1])
}
