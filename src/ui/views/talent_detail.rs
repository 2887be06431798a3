use crate::backend::reference::{SENIORITY, TALENT_STATUS, WORK_CITY};
use crate::backend::types::Talent;
use crate::backend::parameter_label;
use crate::query::{FetcherOptions, RequestStatus, ResourceFetcher};
use crate::reference::composite_key;
use crate::ui::renderfns::{format_date, status_color};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::ViewContext;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Full profile of one talent
pub struct TalentDetailView {
  ctx: ViewContext,
  name: String,
  fetcher: ResourceFetcher<u64, Talent>,
}

impl TalentDetailView {
  pub fn new(ctx: ViewContext, id: u64, name: String) -> Self {
    ctx
      .parameters
      .request(composite_key([TALENT_STATUS, SENIORITY, WORK_CITY]));

    let backend = ctx.backend.clone();
    let on_success = ctx.events.clone();
    let on_error = ctx.events.clone();
    let fetcher = ResourceFetcher::new(
      move |id: u64, _cancel| {
        let backend = backend.clone();
        async move { backend.get_talent(id).await }
      },
      FetcherOptions::new()
        .auto_invoke(true)
        .initial_params(id)
        .on_success(move |_| on_success.redraw())
        .on_error(move |error| on_error.error(error.to_string())),
    );

    Self { ctx, name, fetcher }
  }

  fn field<'a>(label: &'a str, value: impl Into<Span<'a>>) -> Line<'a> {
    Line::from(vec![
      Span::styled(format!("{:<12}", label), Style::default().fg(Color::DarkGray)),
      value.into(),
    ])
  }

  fn profile_lines(&self, talent: &Talent) -> Vec<Line<'static>> {
    let parameters = &self.ctx.parameters;
    let status = parameter_label(parameters, TALENT_STATUS, talent.status.as_deref());
    let level = parameter_label(parameters, SENIORITY, talent.level.as_deref());
    let city = parameter_label(parameters, WORK_CITY, talent.city.as_deref());
    let skills = if talent.skills.is_empty() {
      "-".to_string()
    } else {
      talent.skills.join(", ")
    };
    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
      Self::field("Title", text(&talent.title)),
      Self::field(
        "Status",
        Span::styled(status, Style::default().fg(status_color(talent.status.as_deref()))),
      ),
      Self::field("Level", level),
      Self::field("City", city),
      Self::field(
        "Experience",
        talent
          .years_of_experience
          .map(|years| format!("{} years", years))
          .unwrap_or_else(|| "-".to_string()),
      ),
      Self::field("Phone", text(&talent.phone)),
      Self::field("Email", text(&talent.email)),
      Self::field("Skills", skills),
      Self::field("Created", format_date(talent.created_at)),
      Self::field("Updated", format_date(talent.updated_at)),
      Line::default(),
    ];

    lines.push(Line::styled(
      talent.summary.clone().unwrap_or_else(|| "No summary".to_string()),
      Style::default(),
    ));
    lines
  }
}

impl View for TalentDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.fetcher.refetch();
        ViewAction::None
      }
      KeyCode::Esc if self.fetcher.is_loading() => {
        self.fetcher.cancel();
        self.ctx.events.info("Cancelled loading talent profile");
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let state = self.fetcher.state();
    let title = match state.status {
      RequestStatus::Loading => format!(" {} (loading...) ", self.name),
      RequestStatus::Error => format!(" {} (error) ", self.name),
      _ => format!(" {} ", self.name),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    // Last good profile stays up while a refresh runs or after it fails
    let paragraph = match (&state.data, state.error()) {
      (Some(talent), _) => Paragraph::new(self.profile_lines(talent)),
      (None, Some(error)) => Paragraph::new(format!("Error: {}\n\nPress 'r' to retry.", error))
        .style(Style::default().fg(Color::Red)),
      (None, None) => {
        Paragraph::new("Loading talent profile...").style(Style::default().fg(Color::DarkGray))
      }
    };
    frame.render_widget(paragraph.block(block).wrap(Wrap { trim: true }), area);
  }

  fn breadcrumb_label(&self) -> String {
    self.name.clone()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("r", "refresh").with_priority(40),
      Shortcut::new("esc", "stop loading").with_priority(80),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}
