use crate::backend::reference::{REQUIREMENT_STATUS, SENIORITY, WORK_CITY};
use crate::backend::types::{ListQuery, Page, Requirement};
use crate::backend::parameter_label;
use crate::query::{FetcherOptions, ResourceFetcher};
use crate::reference::composite_key;
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::renderfns::{format_date, status_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::page_title;
use crate::ui::{ensure_valid_selection, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Paged list of staffing requirements
pub struct RequirementListView {
  ctx: ViewContext,
  fetcher: ResourceFetcher<ListQuery, Page<Requirement>>,
  list_state: ListState,
  search: SearchInput,
}

impl RequirementListView {
  pub fn new(ctx: ViewContext) -> Self {
    // Requirement status first: this view needs that group most
    ctx
      .parameters
      .request(composite_key([REQUIREMENT_STATUS, SENIORITY, WORK_CITY]));

    let backend = ctx.backend.clone();
    let on_success = ctx.events.clone();
    let on_error = ctx.events.clone();
    let fetcher = ResourceFetcher::new(
      move |query: ListQuery, _cancel| {
        let backend = backend.clone();
        async move { backend.list_requirements(&query).await }
      },
      FetcherOptions::new()
        .auto_invoke(true)
        .initial_params(ListQuery::new(ctx.page_size))
        .on_success(move |_| on_success.redraw())
        .on_error(move |error| on_error.error(error.to_string())),
    );

    Self {
      ctx,
      fetcher,
      list_state: ListState::default(),
      search: SearchInput::new(),
    }
  }

  fn query(&self) -> ListQuery {
    self
      .fetcher
      .params()
      .unwrap_or_else(|| ListQuery::new(self.ctx.page_size))
  }

  fn change_query(&mut self, query: ListQuery) {
    if self.fetcher.params().as_ref() != Some(&query) {
      self.list_state.select(None);
    }
    self.fetcher.set_params(Some(query));
  }

  fn row(&self, requirement: &Requirement) -> ListItem<'static> {
    let parameters = &self.ctx.parameters;
    let status = parameter_label(parameters, REQUIREMENT_STATUS, requirement.status.as_deref());
    let level = parameter_label(parameters, SENIORITY, requirement.level.as_deref());
    let city = parameter_label(parameters, WORK_CITY, requirement.city.as_deref());

    ListItem::new(Line::from(vec![
      Span::styled(
        format!("{:<30}", truncate(&requirement.title, 30)),
        Style::default().fg(Color::Cyan),
      ),
      Span::raw(" "),
      Span::raw(format!(
        "{:<18}",
        truncate(requirement.client.as_deref().unwrap_or("-"), 18)
      )),
      Span::raw(" "),
      Span::raw(format!("{:<10}", truncate(&level, 10))),
      Span::raw(" "),
      Span::raw(format!("{:<12}", truncate(&city, 12))),
      Span::raw(format!("{:>4}  ", requirement.headcount)),
      Span::styled(
        format!("{:<10}", truncate(&status, 10)),
        Style::default().fg(status_color(requirement.status.as_deref())),
      ),
      Span::raw(" "),
      Span::styled(
        format_date(requirement.created_at),
        Style::default().fg(Color::DarkGray),
      ),
    ]))
  }
}

impl View for RequirementListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    let query = self.query();
    match self.search.handle_key(key, &query.keyword) {
      KeyResult::Event(SearchEvent::Changed(keyword) | SearchEvent::Submitted(keyword)) => {
        self.change_query(query.with_keyword(&keyword));
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char(']') => {
        if self.fetcher.data().is_some_and(|page| page.has_next()) {
          self.change_query(query.next_page());
        }
      }
      KeyCode::Char('[') => self.change_query(query.previous_page()),
      KeyCode::Char('r') => self.fetcher.refetch(),
      KeyCode::Esc if self.fetcher.is_loading() => {
        self.fetcher.cancel();
        self.ctx.events.info("Cancelled loading requirements");
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let state = self.fetcher.state();
    let query = self.query();
    let items = state.data.as_ref().map(|page| page.items.as_slice()).unwrap_or(&[]);
    ensure_valid_selection(&mut self.list_state, items.len());

    let block = Block::default()
      .title(page_title("Requirements", &query, &state))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if items.is_empty() {
      let content = if state.is_loading() {
        "Loading requirements..."
      } else if state.is_error() {
        "Failed to load requirements. Press 'r' to retry."
      } else {
        "No requirements found."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
    } else {
      let rows: Vec<ListItem> = items.iter().map(|r| self.row(r)).collect();
      let list = List::new(rows)
        .block(block)
        .highlight_style(
          Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
      frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    let keyword = self.query().keyword;
    if keyword.is_empty() {
      "Requirements".to_string()
    } else {
      format!("Requirements [{}]", keyword)
    }
  }

  fn is_capturing_input(&self) -> bool {
    self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("/", "search").with_priority(20),
      Shortcut::new("[ ]", "page").with_priority(30),
      Shortcut::new("r", "refresh").with_priority(40),
      Shortcut::new("esc", "stop loading").with_priority(80),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}
