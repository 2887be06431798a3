use thiserror::Error;

/// Lifecycle of a fetcher's current call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestStatus {
  /// Nothing has been requested yet
  #[default]
  Idle,
  /// A call is outstanding
  Loading,
  /// The last current call succeeded
  Success,
  /// The last current call failed
  Error,
}

/// Error surfaced by `ResourceFetcher::invoke`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// The underlying call failed; carries the full error chain
  #[error("{0}")]
  Failed(String),
  /// A newer call superseded this one, or the fetcher was dropped
  #[error("request was cancelled")]
  Cancelled,
}

/// Consumer-visible snapshot of a fetcher.
///
/// `data` survives failures and new loads, so views keep showing the last
/// good payload while a refresh is running or after it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
  pub status: RequestStatus,
  pub data: Option<T>,
  pub error: Option<String>,
}

impl<T> Default for RequestState<T> {
  fn default() -> Self {
    Self {
      status: RequestStatus::Idle,
      data: None,
      error: None,
    }
  }
}

impl<T> RequestState<T> {
  pub fn is_loading(&self) -> bool {
    self.status == RequestStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == RequestStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == RequestStatus::Error
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub(crate) fn begin(&mut self) {
    self.status = RequestStatus::Loading;
    self.error = None;
  }

  pub(crate) fn succeed(&mut self, data: T) {
    self.status = RequestStatus::Success;
    self.data = Some(data);
    self.error = None;
  }

  pub(crate) fn fail(&mut self, error: String) {
    self.status = RequestStatus::Error;
    self.error = Some(error);
  }

  /// A cancelled call with no replacement leaves the fetcher idle, or
  /// settled on the data it already had.
  pub(crate) fn abandon(&mut self) {
    if self.status == RequestStatus::Loading {
      self.status = if self.data.is_some() {
        RequestStatus::Success
      } else {
        RequestStatus::Idle
      };
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_begin_keeps_data_and_clears_error() {
    let mut state = RequestState::default();
    state.succeed(1);
    state.fail("boom".to_string());
    state.begin();

    assert!(state.is_loading());
    assert_eq!(state.data(), Some(&1));
    assert_eq!(state.error(), None);
  }

  #[test]
  fn test_fail_retains_data() {
    let mut state = RequestState::default();
    state.succeed(vec!["a"]);
    state.begin();
    state.fail("offline".to_string());

    assert!(state.is_error());
    assert_eq!(state.data(), Some(&vec!["a"]));
    assert_eq!(state.error(), Some("offline"));
  }

  #[test]
  fn test_abandon() {
    let mut state: RequestState<i32> = RequestState::default();
    state.begin();
    state.abandon();
    assert_eq!(state.status, RequestStatus::Idle);

    state.succeed(3);
    state.begin();
    state.abandon();
    assert_eq!(state.status, RequestStatus::Success);
  }

  #[test]
  fn test_fetch_error_display() {
    assert_eq!(FetchError::Failed("not found".into()).to_string(), "not found");
    assert_eq!(FetchError::Cancelled.to_string(), "request was cancelled");
  }
}
