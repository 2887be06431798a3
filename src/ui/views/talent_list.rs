use crate::backend::reference::{SENIORITY, TALENT_STATUS, WORK_CITY};
use crate::backend::types::{ListQuery, Page, TalentSummary};
use crate::backend::parameter_label;
use crate::query::{FetcherOptions, ResourceFetcher};
use crate::reference::composite_key;
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::renderfns::{format_date, status_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::{page_title, TalentDetailView};
use crate::ui::{ensure_valid_selection, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Paged, searchable list of talents
pub struct TalentListView {
  ctx: ViewContext,
  fetcher: ResourceFetcher<ListQuery, Page<TalentSummary>>,
  list_state: ListState,
  search: SearchInput,
}

impl TalentListView {
  pub fn new(ctx: ViewContext, keyword: Option<&str>) -> Self {
    ctx
      .parameters
      .request(composite_key([TALENT_STATUS, SENIORITY, WORK_CITY]));

    let mut query = ListQuery::new(ctx.page_size);
    if let Some(keyword) = keyword {
      query = query.with_keyword(keyword);
    }

    let backend = ctx.backend.clone();
    let on_success = ctx.events.clone();
    let on_error = ctx.events.clone();
    let fetcher = ResourceFetcher::new(
      move |query: ListQuery, _cancel| {
        let backend = backend.clone();
        async move { backend.list_talents(&query).await }
      },
      FetcherOptions::new()
        .auto_invoke(true)
        .initial_params(query)
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

  fn row(&self, talent: &TalentSummary) -> ListItem<'static> {
    let parameters = &self.ctx.parameters;
    let status = parameter_label(parameters, TALENT_STATUS, talent.status.as_deref());
    let level = parameter_label(parameters, SENIORITY, talent.level.as_deref());
    let city = parameter_label(parameters, WORK_CITY, talent.city.as_deref());

    ListItem::new(Line::from(vec![
      Span::styled(
        format!("{:<20}", truncate(&talent.name, 20)),
        Style::default().fg(Color::Cyan),
      ),
      Span::raw(" "),
      Span::raw(format!(
        "{:<28}",
        truncate(talent.title.as_deref().unwrap_or("-"), 28)
      )),
      Span::raw(" "),
      Span::raw(format!("{:<10}", truncate(&level, 10))),
      Span::raw(" "),
      Span::raw(format!("{:<12}", truncate(&city, 12))),
      Span::raw(" "),
      Span::styled(
        format!("{:<12}", truncate(&status, 12)),
        Style::default().fg(status_color(talent.status.as_deref())),
      ),
      Span::raw(" "),
      Span::styled(
        format_date(talent.updated_at),
        Style::default().fg(Color::DarkGray),
      ),
    ]))
  }
}

impl View for TalentListView {
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
        let has_next = self.fetcher.data().is_some_and(|page| page.has_next());
        if has_next {
          self.change_query(query.next_page());
        }
      }
      KeyCode::Char('[') => self.change_query(query.previous_page()),
      KeyCode::Char('r') => self.fetcher.refetch(),
      KeyCode::Enter => {
        let selected = self.list_state.selected().and_then(|idx| {
          self
            .fetcher
            .with_state(|state| state.data.as_ref().and_then(|page| page.items.get(idx).cloned()))
        });
        if let Some(talent) = selected {
          return ViewAction::Push(Box::new(TalentDetailView::new(
            self.ctx.clone(),
            talent.id,
            talent.name,
          )));
        }
      }
      KeyCode::Esc if self.fetcher.is_loading() => {
        self.fetcher.cancel();
        self.ctx.events.info("Cancelled loading talents");
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
      .title(page_title("Talents", &query, &state))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if items.is_empty() {
      let content = if state.is_loading() {
        "Loading talents..."
      } else if state.is_error() {
        "Failed to load talents. Press 'r' to retry."
      } else {
        "No talents found."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
    } else {
      let rows: Vec<ListItem> = items.iter().map(|talent| self.row(talent)).collect();
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
      "Talents".to_string()
    } else {
      format!("Talents [{}]", keyword)
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
      Shortcut::new("enter", "open").with_priority(50),
      Shortcut::new("esc", "stop loading").with_priority(80),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}
