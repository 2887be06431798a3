use crate::backend::{parameter_cache, BackendClient, ParameterCache};
use crate::commands::Command;
use crate::config::Config;
use crate::event::{Event, EventHandler, Notice};
use crate::reference::composite_key;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::LookupStatus;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{RequirementListView, TalentListView};
use crate::ui::{self, ViewContext};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(200);
const NOTICE_TTL: Duration = Duration::from_secs(6);

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  command_input: CommandInput,

  /// Latest notice and when it arrived
  notice: Option<(Notice, Instant)>,

  config: Config,
  backend: BackendClient,

  /// Parameter groups shared by every view
  parameters: ParameterCache,

  /// Keyword from the command line for the first talent list
  initial_keyword: Option<String>,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config, initial_keyword: Option<String>) -> Result<Self> {
    let backend = BackendClient::new(&config)?;
    let parameters = parameter_cache(backend.clone());

    Ok(Self {
      view_stack: Vec::new(),
      command_input: CommandInput::new(),
      notice: None,
      config,
      backend,
      parameters,
      initial_keyword,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.main_loop(&mut terminal).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);
    let ctx = ViewContext {
      backend: self.backend.clone(),
      parameters: self.parameters.clone(),
      events: events.sender(),
      page_size: self.config.page_size,
    };

    if !self.config.reference_groups.is_empty() {
      self
        .parameters
        .request(composite_key(&self.config.reference_groups));
    }

    let root = TalentListView::new(ctx.clone(), self.initial_keyword.as_deref());
    self.view_stack.push(Box::new(root));
    info!(host = self.backend.host(), "talentdesk started");

    // Labels resolve as soon as parameter groups land
    let mut lookups = self.parameters.subscribe();

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      tokio::select! {
        event = events.next() => match event {
          Some(event) => self.handle_event(event, &ctx),
          None => break,
        },
        changed = lookups.changed() => {
          if changed.is_ok() {
            debug!(revision = *lookups.borrow_and_update(), "parameter cache changed");
          }
        }
      }
    }

    info!("talentdesk exiting");
    Ok(())
  }

  fn handle_event(&mut self, event: Event, ctx: &ViewContext) {
    match event {
      Event::Key(key) => self.handle_key(key, ctx),
      Event::Tick => {
        if self
          .notice
          .as_ref()
          .is_some_and(|(_, at)| at.elapsed() > NOTICE_TTL)
        {
          self.notice = None;
        }
      }
      Event::Notice(notice) => self.notice = Some((notice, Instant::now())),
      Event::Redraw => {}
    }
  }

  fn handle_key(&mut self, key: KeyEvent, ctx: &ViewContext) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self.current_view().is_some_and(|v| v.is_capturing_input());
    if !capturing {
      match self.command_input.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(command)) => {
          self.execute_command(command, ctx);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(typed)) => {
          if !typed.is_empty() {
            self.notice = Some((
              Notice::Error(format!("Unknown command: {}", typed)),
              Instant::now(),
            ));
          }
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!(view = %view.breadcrumb_label(), "push view");
        self.view_stack.push(view);
      }
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn execute_command(&mut self, command: Command, ctx: &ViewContext) {
    info!(command = command.name(), "execute command");
    let root: Box<dyn View> = match command {
      Command::Talents => Box::new(TalentListView::new(ctx.clone(), None)),
      Command::Requirements => Box::new(RequirementListView::new(ctx.clone())),
      Command::Quit => {
        self.should_quit = true;
        return;
      }
    };

    // Dropping the old views cancels whatever they were still loading
    self.view_stack.clear();
    self.view_stack.push(root);
  }

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref().map(|(notice, _)| notice)
  }

  pub fn title(&self) -> &str {
    self.config.display_title()
  }

  pub fn host(&self) -> &str {
    self.backend.host()
  }

  /// Loading wins over a stale failure: a retry is already running
  pub fn lookup_status(&self) -> LookupStatus {
    if self.parameters.is_loading() {
      LookupStatus::Loading
    } else if self.parameters.error().is_some() {
      LookupStatus::Failed
    } else {
      LookupStatus::Ready
    }
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|view| view.breadcrumb_label())
      .collect()
  }
}
