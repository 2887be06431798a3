use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh
  Tick,
  /// Message for the status bar, posted from fetch callbacks
  Notice(Notice),
  /// Data arrived in the background; draw again without waiting for a tick
  Redraw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  Info(String),
  Error(String),
}

impl Notice {
  pub fn message(&self) -> &str {
    match self {
      Notice::Info(message) | Notice::Error(message) => message,
    }
  }

  pub fn is_error(&self) -> bool {
    matches!(self, Notice::Error(_))
  }
}

/// Cloneable handle views and fetch callbacks use to post into the loop
#[derive(Debug, Clone)]
pub struct EventSender {
  tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
  fn send(&self, event: Event) {
    // The receiver is gone only while the app shuts down
    let _ = self.tx.send(event);
  }

  pub fn error(&self, message: impl Into<String>) {
    self.send(Event::Notice(Notice::Error(message.into())));
  }

  pub fn info(&self, message: impl Into<String>) {
    self.send(Event::Notice(Notice::Info(message.into())));
  }

  pub fn redraw(&self) {
    self.send(Event::Redraw);
  }
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm's poll blocks, so the reader gets its own thread
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
          _ => None,
        }
      } else {
        Some(Event::Tick)
      };

      if let Some(event) = event {
        if input_tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { tx, rx }
  }

  /// Handle for posting into this event stream
  pub fn sender(&self) -> EventSender {
    EventSender {
      tx: self.tx.clone(),
    }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
