//! Per-consumer async resource fetching with single-flight semantics.
//!
//! A `ResourceFetcher<P, T>` wraps one async call and owns the loading,
//! data and error state for it. Starting a new call supersedes the previous
//! one: the old call's cancellation token fires and whatever it eventually
//! produces is dropped on the floor. Only the most recently started call can
//! reach the state or the callbacks.
//!
//! # Example
//!
//! ```ignore
//! let backend = backend.clone();
//! let fetcher = ResourceFetcher::new(
//!   move |query: ListQuery, _cancel| {
//!     let backend = backend.clone();
//!     async move { backend.list_talents(&query).await }
//!   },
//!   FetcherOptions::new()
//!     .auto_invoke(true)
//!     .initial_params(ListQuery::new(20)),
//! );
//!
//! // Typing in the search box: only re-fetches when the value changed
//! fetcher.set_params(Some(query));
//!
//! // In render
//! fetcher.with_state(|state| match state.status {
//!   RequestStatus::Loading => render_spinner(),
//!   ..
//! });
//! ```

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::state::{FetchError, RequestState, RequestStatus};
use super::token::{RequestToken, TokenSlot};

type CallFn<P, T> = Box<dyn Fn(P, CancellationToken) -> BoxFuture<'static, Result<T>> + Send + Sync>;

type Callback<A> = Box<dyn Fn(&A) + Send + Sync>;

/// Optional configuration for a `ResourceFetcher`.
pub struct FetcherOptions<P, T> {
  auto_invoke: bool,
  initial_params: Option<P>,
  on_success: Option<Callback<T>>,
  on_error: Option<Callback<FetchError>>,
}

impl<P, T> Default for FetcherOptions<P, T> {
  fn default() -> Self {
    Self {
      auto_invoke: false,
      initial_params: None,
      on_success: None,
      on_error: None,
    }
  }
}

impl<P, T> FetcherOptions<P, T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Invoke on construction and whenever the params change by value.
  pub fn auto_invoke(mut self, enabled: bool) -> Self {
    self.auto_invoke = enabled;
    self
  }

  pub fn initial_params(mut self, params: P) -> Self {
    self.initial_params = Some(params);
    self
  }

  /// Called after the state has been updated to `Success`.
  pub fn on_success<F>(mut self, callback: F) -> Self
  where
    F: Fn(&T) + Send + Sync + 'static,
  {
    self.on_success = Some(Box::new(callback));
    self
  }

  /// Called after the state has been updated to `Error`.
  pub fn on_error<F>(mut self, callback: F) -> Self
  where
    F: Fn(&FetchError) + Send + Sync + 'static,
  {
    self.on_error = Some(Box::new(callback));
    self
  }
}

struct Shared<P, T> {
  call: CallFn<P, T>,
  on_success: Option<Callback<T>>,
  on_error: Option<Callback<FetchError>>,
  tokens: Mutex<TokenSlot>,
  state: watch::Sender<RequestState<T>>,
}

impl<P, T> Shared<P, T> {
  fn tokens(&self) -> MutexGuard<'_, TokenSlot> {
    self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn begin(&self) -> RequestToken {
    let mut tokens = self.tokens();
    let token = tokens.mint();
    self.state.send_modify(RequestState::begin);
    token
  }

  /// Apply a terminal transition if `token` is still current.
  fn settle(&self, token: &RequestToken, apply: impl FnOnce(&mut RequestState<T>)) -> bool {
    let mut tokens = self.tokens();
    if !tokens.finish(token) {
      return false;
    }
    self.state.send_modify(apply);
    true
  }
}

async fn run<P, T>(
  shared: Arc<Shared<P, T>>,
  token: RequestToken,
  call: BoxFuture<'static, Result<T>>,
) -> std::result::Result<T, FetchError>
where
  T: Clone,
{
  let cancellation = token.cancellation();
  let outcome = tokio::select! {
    biased;
    _ = cancellation.cancelled() => {
      debug!(generation = token.generation(), "request cancelled before completion");
      return Err(FetchError::Cancelled);
    }
    outcome = AssertUnwindSafe(call).catch_unwind() => {
      outcome.unwrap_or_else(|_| Err(eyre!("request panicked")))
    }
  };

  match outcome {
    Ok(data) => {
      if !shared.settle(&token, |state| state.succeed(data.clone())) {
        debug!(
          generation = token.generation(),
          "discarding result of superseded request"
        );
        return Err(FetchError::Cancelled);
      }
      if let Some(on_success) = &shared.on_success {
        on_success(&data);
      }
      Ok(data)
    }
    Err(report) => {
      let message = format!("{report:#}");
      if !shared.settle(&token, |state| state.fail(message.clone())) {
        debug!(
          generation = token.generation(),
          error = %message,
          "discarding failure of superseded request"
        );
        return Err(FetchError::Cancelled);
      }
      warn!(generation = token.generation(), error = %message, "request failed");
      let error = FetchError::Failed(message);
      if let Some(on_error) = &shared.on_error {
        on_error(&error);
      }
      Err(error)
    }
  }
}

/// Async call wrapper with loading/data/error state and last-started-wins
/// cancellation.
///
/// Callbacks run after the internal lock is released, so they may call back
/// into the fetcher. Dropping the fetcher cancels the outstanding call.
pub struct ResourceFetcher<P, T> {
  shared: Arc<Shared<P, T>>,
  params: Mutex<Option<P>>,
  auto_invoke: bool,
}

impl<P, T> ResourceFetcher<P, T>
where
  P: Clone + PartialEq + Send + 'static,
  T: Clone + Send + Sync + 'static,
{
  /// Create a fetcher around `call`.
  ///
  /// With `auto_invoke` and `initial_params` set, the first call is spawned
  /// right away, so this must run inside a tokio runtime.
  pub fn new<F, Fut>(call: F, options: FetcherOptions<P, T>) -> Self
  where
    F: Fn(P, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let FetcherOptions {
      auto_invoke,
      initial_params,
      on_success,
      on_error,
    } = options;
    let (state, _) = watch::channel(RequestState::default());

    let fetcher = Self {
      shared: Arc::new(Shared {
        call: Box::new(move |params: P, cancellation: CancellationToken| {
          call(params, cancellation).boxed()
        }),
        on_success,
        on_error,
        tokens: Mutex::new(TokenSlot::default()),
        state,
      }),
      params: Mutex::new(None),
      auto_invoke,
    };
    fetcher.set_params(initial_params);
    fetcher
  }

  /// Start a call and return a future for its outcome.
  ///
  /// The call becomes current and starts running on the runtime as soon as
  /// this returns, so dropping the returned future does not stop it from
  /// settling. The future resolves to `FetchError::Cancelled` if another
  /// call starts first or the fetcher is dropped.
  pub fn invoke(
    &self,
    params: P,
  ) -> impl Future<Output = std::result::Result<T, FetchError>> + Send + 'static {
    let token = self.shared.begin();
    let call = (self.shared.call)(params, token.cancellation());
    let task = tokio::spawn(run(Arc::clone(&self.shared), token, call));
    async move {
      task.await.unwrap_or_else(|error| {
        debug!(%error, "request task did not finish");
        Err(FetchError::Cancelled)
      })
    }
  }

  /// Start a call in the background. The outcome lands in the state.
  pub fn fetch(&self, params: P) {
    drop(self.invoke(params));
  }

  /// Re-run the last declared params, if any.
  pub fn refetch(&self) {
    if let Some(params) = self.params() {
      self.fetch(params);
    }
  }

  /// Declare the params this fetcher depends on.
  ///
  /// Compared by value against the previous params; with `auto_invoke` a
  /// change to `Some` starts exactly one call.
  pub fn set_params(&self, params: Option<P>) {
    let changed = {
      let mut current = self.params.lock().unwrap_or_else(PoisonError::into_inner);
      if *current == params {
        return;
      }
      current.clone_from(&params);
      params
    };

    if self.auto_invoke {
      if let Some(params) = changed {
        self.fetch(params);
      }
    }
  }

  pub fn params(&self) -> Option<P> {
    self
      .params
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

impl<P, T> ResourceFetcher<P, T>
where
  T: Clone,
{
  /// Cancel the outstanding call without starting another one.
  pub fn cancel(&self) {
    let mut tokens = self.shared.tokens();
    if tokens.invalidate() {
      self.shared.state.send_modify(RequestState::abandon);
    }
  }

  /// Snapshot of the current state.
  pub fn state(&self) -> RequestState<T> {
    self.shared.state.borrow().clone()
  }

  /// Read the state without cloning it.
  pub fn with_state<R>(&self, read: impl FnOnce(&RequestState<T>) -> R) -> R {
    read(&self.shared.state.borrow())
  }

  /// Receiver that is notified on every state transition.
  pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
    self.shared.state.subscribe()
  }

  pub fn status(&self) -> RequestStatus {
    self.shared.state.borrow().status
  }

  pub fn is_loading(&self) -> bool {
    self.status() == RequestStatus::Loading
  }

  pub fn data(&self) -> Option<T> {
    self.shared.state.borrow().data.clone()
  }

  pub fn error(&self) -> Option<String> {
    self.shared.state.borrow().error.clone()
  }
}

impl<P, T> Drop for ResourceFetcher<P, T> {
  fn drop(&mut self) {
    if self.shared.tokens().invalidate() {
      debug!("fetcher dropped with a request outstanding");
    }
  }
}

impl<P, T: fmt::Debug> fmt::Debug for ResourceFetcher<P, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResourceFetcher")
      .field("state", &*self.shared.state.borrow())
      .field("auto_invoke", &self.auto_invoke)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::WrapErr;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::oneshot;

  type Outcome = std::result::Result<String, String>;

  /// Calls that stay pending until the test releases them by id.
  #[derive(Clone, Default)]
  struct Gates {
    pending: Arc<Mutex<HashMap<u32, oneshot::Receiver<Outcome>>>>,
    cancellations: Arc<Mutex<HashMap<u32, CancellationToken>>>,
    calls: Arc<AtomicUsize>,
  }

  impl Gates {
    fn open(&self, id: u32) -> oneshot::Sender<Outcome> {
      let (tx, rx) = oneshot::channel();
      self.pending.lock().unwrap().insert(id, rx);
      tx
    }

    fn call(
      &self,
    ) -> impl Fn(u32, CancellationToken) -> BoxFuture<'static, Result<String>> + Send + Sync + 'static
    {
      let gates = self.clone();
      move |id, cancellation| {
        gates.calls.fetch_add(1, Ordering::SeqCst);
        gates.cancellations.lock().unwrap().insert(id, cancellation);
        let gate = gates.pending.lock().unwrap().remove(&id);
        async move {
          let gate = gate.ok_or_else(|| eyre!("no gate for request {id}"))?;
          match gate.await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(message)) => Err(eyre!(message)),
            Err(_) => Err(eyre!("gate for request {id} dropped")),
          }
        }
        .boxed()
      }
    }

    fn was_cancelled(&self, id: u32) -> bool {
      self.cancellations.lock().unwrap()[&id].is_cancelled()
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[derive(Clone, Default)]
  struct Recorder {
    successes: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<FetchError>>>,
  }

  impl Recorder {
    fn options(&self) -> FetcherOptions<u32, String> {
      let successes = Arc::clone(&self.successes);
      let errors = Arc::clone(&self.errors);
      FetcherOptions::new()
        .on_success(move |data: &String| successes.lock().unwrap().push(data.clone()))
        .on_error(move |error: &FetchError| errors.lock().unwrap().push(error.clone()))
    }

    fn successes(&self) -> Vec<String> {
      self.successes.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<FetchError> {
      self.errors.lock().unwrap().clone()
    }
  }

  #[tokio::test]
  async fn test_invoke_success() {
    let gates = Gates::default();
    let recorder = Recorder::default();
    let fetcher = ResourceFetcher::new(gates.call(), recorder.options());
    assert_eq!(fetcher.status(), RequestStatus::Idle);

    let tx = gates.open(1);
    let request = fetcher.invoke(1);
    assert!(fetcher.is_loading());

    tx.send(Ok("X".to_string())).unwrap();
    assert_eq!(request.await, Ok("X".to_string()));

    let state = fetcher.state();
    assert_eq!(state.status, RequestStatus::Success);
    assert_eq!(state.data, Some("X".to_string()));
    assert_eq!(state.error, None);
    assert_eq!(recorder.successes(), vec!["X".to_string()]);
    assert!(recorder.errors().is_empty());
  }

  #[tokio::test]
  async fn test_later_call_wins_when_earlier_settles_last() {
    let gates = Gates::default();
    let recorder = Recorder::default();
    let fetcher = ResourceFetcher::new(gates.call(), recorder.options());

    let tx1 = gates.open(1);
    let tx2 = gates.open(2);
    let first = fetcher.invoke(1);
    let second = fetcher.invoke(2);

    tx2.send(Ok("Y".to_string())).unwrap();
    assert_eq!(second.await, Ok("Y".to_string()));

    let _ = tx1.send(Ok("X".to_string()));
    assert_eq!(first.await, Err(FetchError::Cancelled));

    let state = fetcher.state();
    assert_eq!(state.status, RequestStatus::Success);
    assert_eq!(state.data, Some("Y".to_string()));
    assert_eq!(recorder.successes(), vec!["Y".to_string()]);
  }

  #[tokio::test]
  async fn test_earlier_call_settling_first_is_discarded() {
    let gates = Gates::default();
    let recorder = Recorder::default();
    let fetcher = ResourceFetcher::new(gates.call(), recorder.options());

    let tx1 = gates.open(1);
    let tx2 = gates.open(2);
    let first = fetcher.invoke(1);
    let second = fetcher.invoke(2);

    let _ = tx1.send(Ok("X".to_string()));
    assert_eq!(first.await, Err(FetchError::Cancelled));
    assert!(fetcher.is_loading());
    assert_eq!(fetcher.data(), None);

    tx2.send(Err("boom".to_string())).unwrap();
    assert_eq!(second.await, Err(FetchError::Failed("boom".to_string())));

    let state = fetcher.state();
    assert_eq!(state.status, RequestStatus::Error);
    assert_eq!(state.data, None);
    assert_eq!(state.error.as_deref(), Some("boom"));
    assert!(recorder.successes().is_empty());
    assert_eq!(recorder.errors(), vec![FetchError::Failed("boom".to_string())]);
  }

  #[tokio::test]
  async fn test_superseded_failure_never_reaches_on_error() {
    let gates = Gates::default();
    let recorder = Recorder::default();
    let fetcher = ResourceFetcher::new(gates.call(), recorder.options());

    let tx1 = gates.open(1);
    let tx2 = gates.open(2);
    let first = fetcher.invoke(1);
    let second = fetcher.invoke(2);

    let _ = tx1.send(Err("timeout talking to search".to_string()));
    assert_eq!(first.await, Err(FetchError::Cancelled));
    assert!(recorder.errors().is_empty());
    assert_eq!(fetcher.error(), None);

    tx2.send(Ok("Y".to_string())).unwrap();
    assert_eq!(second.await, Ok("Y".to_string()));
    assert!(recorder.errors().is_empty());
    assert_eq!(recorder.successes(), vec!["Y".to_string()]);
    assert_eq!(fetcher.status(), RequestStatus::Success);
  }

  #[tokio::test]
  async fn test_dropped_invoke_future_still_settles() {
    let gates = Gates::default();
    let recorder = Recorder::default();
    let fetcher = ResourceFetcher::new(gates.call(), recorder.options());
    let mut states = fetcher.subscribe();

    let tx = gates.open(1);
    drop(fetcher.invoke(1));
    assert!(fetcher.is_loading());

    tx.send(Ok("X".to_string())).unwrap();
    states.wait_for(|state| !state.is_loading()).await.unwrap();

    assert_eq!(fetcher.status(), RequestStatus::Success);
    assert_eq!(fetcher.data(), Some("X".to_string()));
    assert_eq!(recorder.successes(), vec!["X".to_string()]);
  }

  #[tokio::test]
  async fn test_panicking_call_settles_as_error() {
    let recorder = Recorder::default();
    let fetcher = ResourceFetcher::new(
      |_: u32, _| async {
        if true {
          panic!("decoder bug");
        }
        Ok::<String, color_eyre::Report>(String::new())
      },
      recorder.options(),
    );

    assert_eq!(
      fetcher.invoke(1).await,
      Err(FetchError::Failed("request panicked".to_string()))
    );
    assert_eq!(fetcher.status(), RequestStatus::Error);
    assert_eq!(recorder.errors().len(), 1);
  }

  #[tokio::test]
  async fn test_superseded_call_receives_cancellation() {
    let gates = Gates::default();
    let fetcher = ResourceFetcher::new(gates.call(), FetcherOptions::new());

    let _tx1 = gates.open(1);
    let tx2 = gates.open(2);
    let _first = fetcher.invoke(1);
    let second = fetcher.invoke(2);

    assert!(gates.was_cancelled(1));
    assert!(!gates.was_cancelled(2));

    tx2.send(Ok("done".to_string())).unwrap();
    second.await.unwrap();
    assert!(!gates.was_cancelled(2));
  }

  #[tokio::test]
  async fn test_error_retains_previous_data() {
    let gates = Gates::default();
    let recorder = Recorder::default();
    let fetcher = ResourceFetcher::new(gates.call(), recorder.options());

    let tx = gates.open(1);
    let request = fetcher.invoke(1);
    tx.send(Ok("first".to_string())).unwrap();
    request.await.unwrap();

    let tx = gates.open(2);
    let request = fetcher.invoke(2);
    assert!(fetcher.is_loading());
    assert_eq!(fetcher.data(), Some("first".to_string()));

    tx.send(Err("backend unavailable".to_string())).unwrap();
    assert_eq!(
      request.await,
      Err(FetchError::Failed("backend unavailable".to_string()))
    );

    let state = fetcher.state();
    assert_eq!(state.status, RequestStatus::Error);
    assert_eq!(state.data, Some("first".to_string()));
    assert_eq!(state.error.as_deref(), Some("backend unavailable"));
    assert_eq!(recorder.successes().len(), 1);
    assert_eq!(recorder.errors().len(), 1);
  }

  #[tokio::test]
  async fn test_error_keeps_context_chain() {
    let fetcher = ResourceFetcher::new(
      |_: u32, _| async {
        Err::<String, _>(eyre!("connection refused")).wrap_err("failed to load talent")
      },
      FetcherOptions::new(),
    );

    let error = fetcher.invoke(7).await.unwrap_err();
    assert_eq!(
      error,
      FetchError::Failed("failed to load talent: connection refused".to_string())
    );
  }

  #[tokio::test]
  async fn test_drop_cancels_outstanding_call() {
    let gates = Gates::default();
    let fetcher = ResourceFetcher::new(gates.call(), FetcherOptions::new());

    let _tx = gates.open(1);
    let request = fetcher.invoke(1);
    drop(fetcher);

    assert!(gates.was_cancelled(1));
    assert_eq!(request.await, Err(FetchError::Cancelled));
  }

  #[tokio::test]
  async fn test_cancel_without_replacement() {
    let gates = Gates::default();
    let recorder = Recorder::default();
    let fetcher = ResourceFetcher::new(gates.call(), recorder.options());

    let _tx = gates.open(1);
    let request = fetcher.invoke(1);
    fetcher.cancel();

    assert_eq!(fetcher.status(), RequestStatus::Idle);
    assert_eq!(request.await, Err(FetchError::Cancelled));
    assert!(recorder.errors().is_empty());
  }

  #[tokio::test]
  async fn test_auto_invoke_compares_params_by_value() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let fetcher = ResourceFetcher::new(
      move |id: u32, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(format!("talent-{id}")) }
      },
      FetcherOptions::new().auto_invoke(true).initial_params(1),
    );

    let mut states = fetcher.subscribe();
    states.wait_for(|state| state.is_success()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.data(), Some("talent-1".to_string()));

    // Equal value, fresh instance: no call
    fetcher.set_params(Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!fetcher.is_loading());

    fetcher.set_params(Some(2));
    states
      .wait_for(|state| state.data.as_deref() == Some("talent-2"))
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Absent params never invoke
    fetcher.set_params(None);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(fetcher.params(), None);
  }

  #[tokio::test]
  async fn test_without_auto_invoke_params_only_feed_refetch() {
    let gates = Gates::default();
    let fetcher = ResourceFetcher::new(gates.call(), FetcherOptions::new().initial_params(3));
    assert_eq!(gates.calls(), 0);
    assert_eq!(fetcher.status(), RequestStatus::Idle);

    let tx = gates.open(3);
    fetcher.refetch();
    assert_eq!(gates.calls(), 1);
    assert!(fetcher.is_loading());

    tx.send(Ok("three".to_string())).unwrap();
    let mut states = fetcher.subscribe();
    states.wait_for(|state| state.is_success()).await.unwrap();
    assert_eq!(fetcher.data(), Some("three".to_string()));
  }
}
