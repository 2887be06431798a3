//! Process-wide reference data cache keyed by composite request key.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::traits::{group_records, ReferenceBatch, ReferenceRecord};

type LoaderFn<R> =
  Box<dyn Fn(String) -> BoxFuture<'static, Result<ReferenceBatch<R>>> + Send + Sync>;

/// A load that other callers of the same key can await.
type InFlight = Shared<BoxFuture<'static, ()>>;

struct Store<R: ReferenceRecord> {
  groups: HashMap<R::Group, Vec<R>>,
  /// Composite keys that loaded successfully
  fetched: HashSet<String>,
  in_flight: HashMap<String, InFlight>,
  error: Option<String>,
  /// Bumped by `reset`; loads started before a reset are dropped
  epoch: u64,
}

impl<R: ReferenceRecord> Default for Store<R> {
  fn default() -> Self {
    Self {
      groups: HashMap::new(),
      fetched: HashSet::new(),
      in_flight: HashMap::new(),
      error: None,
      epoch: 0,
    }
  }
}

struct Inner<R: ReferenceRecord> {
  loader: LoaderFn<R>,
  store: Mutex<Store<R>>,
  revision: watch::Sender<u64>,
}

impl<R: ReferenceRecord> Inner<R> {
  fn store(&self) -> MutexGuard<'_, Store<R>> {
    self.store.lock().unwrap_or_else(PoisonError::into_inner)
  }

  async fn load(self: Arc<Self>, key: String, epoch: u64) {
    let outcome = AssertUnwindSafe(async { (self.loader)(key.clone()).await })
      .catch_unwind()
      .await
      .unwrap_or_else(|_| Err(eyre!("reference loader panicked")));

    let mut store = self.store();
    if store.epoch != epoch {
      debug!(key = %key, "dropping reference load that started before a reset");
      return;
    }
    store.in_flight.remove(&key);

    match outcome {
      Ok(ReferenceBatch::Loaded(records)) => {
        let record_count = records.len();
        let grouped = group_records(records);
        let group_count = grouped.len();
        // Groups already cached under another key are replaced, not appended
        store.groups.extend(grouped);
        store.fetched.insert(key.clone());
        info!(
          key = %key,
          records = record_count,
          groups = group_count,
          "reference data loaded"
        );
      }
      Ok(ReferenceBatch::Rejected(message)) => {
        warn!(key = %key, error = %message, "reference data request rejected");
        store.error = Some(message);
      }
      Err(report) => {
        let message = format!("{report:#}");
        warn!(key = %key, error = %message, "reference data request failed");
        store.error = Some(message);
      }
    }
    drop(store);

    self.revision.send_modify(|revision| *revision += 1);
  }

  /// Clear the in-flight entry of a load task that died before settling.
  fn abandon(&self, key: &str, epoch: u64, message: String) {
    {
      let mut store = self.store();
      if store.epoch != epoch || store.in_flight.remove(key).is_none() {
        return;
      }
      warn!(key, error = %message, "reference load task did not finish");
      store.error = Some(message);
    }
    self.revision.send_modify(|revision| *revision += 1);
  }
}

/// Shared store of grouped lookup records.
///
/// Cloning the cache clones a handle; all clones see the same store. The
/// application builds one and hands it to every view that needs labels.
pub struct ReferenceDataCache<R: ReferenceRecord> {
  inner: Arc<Inner<R>>,
}

impl<R: ReferenceRecord> Clone for ReferenceDataCache<R> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<R: ReferenceRecord> ReferenceDataCache<R> {
  /// Create a cache around `loader`, which performs one network call for a
  /// composite key and maps the response envelope to a `ReferenceBatch`.
  pub fn new<F, Fut>(loader: F) -> Self
  where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ReferenceBatch<R>>> + Send + 'static,
  {
    let (revision, _) = watch::channel(0);
    Self {
      inner: Arc::new(Inner {
        loader: Box::new(move |key: String| loader(key).boxed()),
        store: Mutex::new(Store::default()),
        revision,
      }),
    }
  }

  /// Load `key` unless it was already loaded.
  ///
  /// Concurrent callers of the same uncached key share a single loader
  /// call. Failures are recorded in `error()` and leave the key unmarked so
  /// a later call retries; they are never returned.
  pub async fn ensure_loaded(&self, key: &str) {
    let pending = {
      let mut store = self.inner.store();
      if store.fetched.contains(key) {
        trace!(key, "reference key already loaded");
        return;
      }

      match store.in_flight.get(key) {
        Some(pending) => {
          trace!(key, "joining in-flight reference load");
          pending.clone()
        }
        None => {
          store.error = None;
          let epoch = store.epoch;
          let owned_key = key.to_string();
          let inner = Arc::downgrade(&self.inner);
          let pending = tokio::spawn(Arc::clone(&self.inner).load(owned_key.clone(), epoch))
            .map(move |joined| {
              if let (Err(error), Some(inner)) = (joined, inner.upgrade()) {
                inner.abandon(&owned_key, epoch, format!("reference load failed: {error}"));
              }
            })
            .boxed()
            .shared();
          store.in_flight.insert(key.to_string(), pending.clone());
          pending
        }
      }
    };

    pending.await;
  }

  /// Fire-and-forget `ensure_loaded`.
  pub fn request(&self, key: impl Into<String>) {
    let cache = self.clone();
    let key = key.into();
    tokio::spawn(async move { cache.ensure_loaded(&key).await });
  }

  /// Records of one group, in response order.
  pub fn group(&self, group: &R::Group) -> Option<Vec<R>> {
    self.inner.store().groups.get(group).cloned()
  }

  /// Snapshot of every cached group.
  pub fn groups(&self) -> HashMap<R::Group, Vec<R>> {
    self.inner.store().groups.clone()
  }

  /// First record in `group` matching `predicate`.
  pub fn find(&self, group: &R::Group, predicate: impl Fn(&R) -> bool) -> Option<R> {
    self
      .inner
      .store()
      .groups
      .get(group)
      .and_then(|records| records.iter().find(|record| predicate(record)).cloned())
  }

  pub fn is_fetched(&self, key: &str) -> bool {
    self.inner.store().fetched.contains(key)
  }

  /// True while any load is outstanding.
  pub fn is_loading(&self) -> bool {
    !self.inner.store().in_flight.is_empty()
  }

  /// Message of the most recent failed load, cleared when a new load starts.
  pub fn error(&self) -> Option<String> {
    self.inner.store().error.clone()
  }

  /// Receiver of a counter bumped whenever a load settles or the cache is
  /// reset.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.inner.revision.subscribe()
  }

  /// Forget everything, including loads still in flight.
  pub fn reset(&self) {
    {
      let mut store = self.inner.store();
      let epoch = store.epoch + 1;
      *store = Store {
        epoch,
        ..Store::default()
      };
    }
    debug!("reference data cache reset");
    self.inner.revision.send_modify(|revision| *revision += 1);
  }
}

impl<R: ReferenceRecord> fmt::Debug for ReferenceDataCache<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let store = self.inner.store();
    f.debug_struct("ReferenceDataCache")
      .field("groups", &store.groups.len())
      .field("fetched", &store.fetched)
      .field("in_flight", &store.in_flight.len())
      .field("error", &store.error)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::oneshot;

  #[derive(Debug, Clone, PartialEq)]
  struct Lookup {
    group: u32,
    label: &'static str,
  }

  impl ReferenceRecord for Lookup {
    type Group = u32;

    fn group(&self) -> u32 {
      self.group
    }
  }

  fn lookup(group: u32, label: &'static str) -> Lookup {
    Lookup { group, label }
  }

  fn labels(records: &[Lookup]) -> Vec<&'static str> {
    records.iter().map(|r| r.label).collect()
  }

  /// Cache whose loader answers from `respond` and counts calls.
  fn counting_cache<F>(respond: F) -> (ReferenceDataCache<Lookup>, Arc<AtomicUsize>)
  where
    F: Fn(&str, usize) -> Result<ReferenceBatch<Lookup>> + Send + Sync + 'static,
  {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = ReferenceDataCache::new(move |key: String| {
      let attempt = counter.fetch_add(1, Ordering::SeqCst);
      let response = respond(&key, attempt);
      async move {
        tokio::task::yield_now().await;
        response
      }
    });
    (cache, calls)
  }

  fn by_key(key: &str) -> Result<ReferenceBatch<Lookup>> {
    let records = key
      .split(',')
      .map(|id| {
        let group: u32 = id.parse().unwrap();
        lookup(group, "entry")
      })
      .collect();
    Ok(ReferenceBatch::Loaded(records))
  }

  #[tokio::test]
  async fn test_groups_records_by_discriminant() {
    let (cache, calls) = counting_cache(|_, _| {
      Ok(ReferenceBatch::Loaded(vec![
        lookup(2, "junior"),
        lookup(2, "senior"),
        lookup(3, "open"),
      ]))
    });

    cache.ensure_loaded("2,3").await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(labels(&cache.group(&2).unwrap()), vec!["junior", "senior"]);
    assert_eq!(labels(&cache.group(&3).unwrap()), vec!["open"]);
    assert!(cache.is_fetched("2,3"));
    assert!(!cache.is_loading());
    assert_eq!(cache.error(), None);
  }

  #[tokio::test]
  async fn test_same_key_is_fetched_once() {
    let (cache, calls) = counting_cache(|key, _| by_key(key));

    cache.ensure_loaded("3,5").await;
    cache.ensure_loaded("3,5").await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Same groups, different order: a different key
    cache.ensure_loaded("5,3").await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.is_fetched("3,5"));
    assert!(cache.is_fetched("5,3"));
    assert_eq!(cache.group(&3).unwrap().len(), 1);
    assert_eq!(cache.group(&5).unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_overlapping_keys_replace_groups() {
    let (cache, calls) = counting_cache(|key, _| match key {
      "3" => Ok(ReferenceBatch::Loaded(vec![lookup(3, "old")])),
      _ => Ok(ReferenceBatch::Loaded(vec![lookup(3, "new"), lookup(7, "remote")])),
    });

    cache.ensure_loaded("3").await;
    assert_eq!(labels(&cache.group(&3).unwrap()), vec!["old"]);

    cache.ensure_loaded("3,7").await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(labels(&cache.group(&3).unwrap()), vec!["new"]);
    assert_eq!(labels(&cache.group(&7).unwrap()), vec!["remote"]);
    assert_eq!(cache.groups().len(), 2);
  }

  #[tokio::test]
  async fn test_failed_load_is_retried() {
    let (cache, calls) = counting_cache(|key, attempt| {
      if attempt == 0 {
        Err(eyre!("connection reset"))
      } else {
        by_key(key)
      }
    });

    cache.ensure_loaded("9").await;
    assert_eq!(cache.error().as_deref(), Some("connection reset"));
    assert!(!cache.is_fetched("9"));
    assert_eq!(cache.group(&9), None);

    cache.ensure_loaded("9").await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.is_fetched("9"));
    assert_eq!(cache.error(), None);
  }

  #[tokio::test]
  async fn test_rejected_load_sets_error() {
    let (cache, calls) =
      counting_cache(|_, _| Ok(ReferenceBatch::Rejected("parameter service unavailable".into())));

    cache.ensure_loaded("4").await;
    assert_eq!(
      cache.error().as_deref(),
      Some("parameter service unavailable")
    );
    assert!(!cache.is_fetched("4"));

    cache.ensure_loaded("4").await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_concurrent_callers_share_one_load() {
    let (cache, calls) = counting_cache(|key, _| by_key(key));

    tokio::join!(
      cache.ensure_loaded("2,3"),
      cache.ensure_loaded("2,3"),
      cache.ensure_loaded("2,3"),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.is_fetched("2,3"));
  }

  #[tokio::test]
  async fn test_loading_flag_and_revision_counter() {
    let (tx, rx) = oneshot::channel::<()>();
    let gate = Arc::new(Mutex::new(Some(rx)));
    let cache = ReferenceDataCache::new(move |_key: String| {
      let gate = gate.lock().unwrap().take();
      async move {
        if let Some(gate) = gate {
          let _ = gate.await;
        }
        Ok(ReferenceBatch::Loaded(vec![lookup(1, "active")]))
      }
    });
    let revisions = cache.subscribe();
    let before = *revisions.borrow();

    let load = cache.ensure_loaded("1");
    tokio::pin!(load);
    assert!(futures::poll!(load.as_mut()).is_pending());
    assert!(cache.is_loading());

    tx.send(()).unwrap();
    load.await;

    assert!(!cache.is_loading());
    assert_eq!(*revisions.borrow(), before + 1);
    assert_eq!(
      cache.find(&1, |r| r.label == "active"),
      Some(lookup(1, "active"))
    );
    assert_eq!(cache.find(&1, |r| r.label == "inactive"), None);
  }

  #[tokio::test]
  async fn test_reset_isolates_runs() {
    let (cache, calls) = counting_cache(|key, _| by_key(key));

    cache.ensure_loaded("1,2").await;
    cache.reset();
    assert!(cache.groups().is_empty());
    assert!(!cache.is_fetched("1,2"));

    cache.ensure_loaded("1,2").await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.is_fetched("1,2"));
  }

  #[tokio::test]
  async fn test_reset_drops_in_flight_load() {
    let (tx, rx) = oneshot::channel::<()>();
    let gate = Arc::new(Mutex::new(Some(rx)));
    let cache = ReferenceDataCache::new(move |_key: String| {
      let gate = gate.lock().unwrap().take();
      async move {
        if let Some(gate) = gate {
          let _ = gate.await;
        }
        Ok(ReferenceBatch::Loaded(vec![lookup(6, "stale")]))
      }
    });

    let load = cache.ensure_loaded("6");
    tokio::pin!(load);
    assert!(futures::poll!(load.as_mut()).is_pending());

    cache.reset();
    assert!(!cache.is_loading());

    tx.send(()).unwrap();
    load.await;

    assert_eq!(cache.group(&6), None);
    assert!(!cache.is_fetched("6"));
  }

  #[tokio::test]
  async fn test_panicking_loader_does_not_wedge_the_key() {
    let (cache, calls) = counting_cache(|key, attempt| {
      if attempt == 0 {
        panic!("parameter decoder blew up");
      }
      by_key(key)
    });

    cache.ensure_loaded("5").await;
    assert!(!cache.is_loading());
    assert!(!cache.is_fetched("5"));
    assert_eq!(cache.error().as_deref(), Some("reference loader panicked"));

    cache.ensure_loaded("5").await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.is_fetched("5"));
    assert_eq!(cache.error(), None);
  }

  #[tokio::test]
  async fn test_abandoned_task_clears_in_flight_entry() {
    let (cache, _) = counting_cache(|key, _| by_key(key));
    let epoch = cache.inner.store().epoch;
    let (_never, rx) = oneshot::channel::<()>();
    let stuck = async move {
      let _ = rx.await;
    }
    .boxed()
    .shared();
    cache.inner.store().in_flight.insert("6".to_string(), stuck);
    assert!(cache.is_loading());

    cache.inner.abandon("6", epoch, "reference load failed: task cancelled".to_string());
    assert!(!cache.is_loading());
    assert_eq!(
      cache.error().as_deref(),
      Some("reference load failed: task cancelled")
    );

    // A stale epoch leaves newer state alone
    cache.inner.abandon("6", epoch + 1, "late".to_string());
    assert_eq!(
      cache.error().as_deref(),
      Some("reference load failed: task cancelled")
    );

    cache.ensure_loaded("6").await;
    assert!(cache.is_fetched("6"));
  }

  #[tokio::test]
  async fn test_request_is_fire_and_forget() {
    let (cache, calls) = counting_cache(|key, _| by_key(key));
    let mut revisions = cache.subscribe();

    cache.request("8");
    revisions.changed().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.is_fetched("8"));
  }
}
