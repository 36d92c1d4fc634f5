//! Cache-backed loadable collection
//!
//! A `LoadableStore<T>` shows something as early as it can (cache, then
//! bundled placeholders) and reconciles with the remote in the background.
//!
//! # State machine
//!
//! ```text
//! Empty ──initialize──▶ Loading ──fetch ok──▶ Loaded(items)
//!                          │                      │  ▲
//!                          └──fetch err──▶ Failed │  │ fetch ok / empty / err
//!                                                 ▼  │
//!                                          Loading (items retained)
//! ```
//!
//! Once anything has been shown, a refresh never lands in `Failed` or drops
//! back to nothing: empty and failed refreshes keep the shown items and log
//! a warning.
//!
//! Concurrent `fetch` calls on one store share the in-flight request.

use super::cache::SnapshotCache;
use super::errors::{LoadError, StoreResult};
use super::loadable::Loadable;
use super::traits::{FetchParams, RemoteCollection, StoreItem};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Whether a store initializes itself when the session signs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreGate {
    /// Initialize on any sign-in, anonymous included
    pub requires_sign_in: bool,
    /// Initialize only once a real (non-anonymous) user signs in
    pub requires_real_user: bool,
}

impl StoreGate {
    /// Initialized explicitly by the app, never by session events
    pub const MANUAL: StoreGate = StoreGate {
        requires_sign_in: false,
        requires_real_user: false,
    };

    pub const SIGNED_IN: StoreGate = StoreGate {
        requires_sign_in: true,
        requires_real_user: false,
    };

    pub const REAL_USER: StoreGate = StoreGate {
        requires_sign_in: true,
        requires_real_user: true,
    };

    /// Does a sign-in of this kind trigger initialization?
    pub fn allows(&self, is_anonymous: bool) -> bool {
        if self.requires_real_user {
            return !is_anonymous;
        }
        self.requires_sign_in
    }
}

/// Construction options for a store
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub params: FetchParams,
    pub gate: StoreGate,
    /// Directory for the JSON snapshot; no caching when absent
    pub cache_dir: Option<PathBuf>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: FetchParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_gate(mut self, gate: StoreGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

/// What a completed fetch did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Items replaced with the remote contents
    Replaced { count: usize },
    /// Remote returned nothing; shown items kept
    KeptOnEmpty { count: usize },
    /// Remote failed; shown items kept
    KeptOnError { count: usize, error: LoadError },
}

impl FetchOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, FetchOutcome::Replaced { .. })
    }
}

type FetchResult = Result<FetchOutcome, LoadError>;

struct StoreState<T> {
    loadable: Loadable<T>,
    /// Items shown before a refresh flipped the state to `Loading`
    retained: Option<Vec<T>>,
    /// Most recent error, including ones that were downgraded to warnings
    last_error: Option<LoadError>,
}

impl<T: Clone> StoreState<T> {
    /// Items currently on screen, if anything has been shown
    fn shown(&self) -> Option<&Vec<T>> {
        match &self.loadable {
            Loadable::Loaded(items) => Some(items),
            _ => self.retained.as_ref(),
        }
    }
}

struct Inner<T: StoreItem> {
    remote: Arc<dyn RemoteCollection<T>>,
    params: FetchParams,
    gate: StoreGate,
    cache: Option<SnapshotCache<T>>,
    /// Held across a snapshot write; taken while the state lock is held
    cache_writes: Mutex<()>,
    state: RwLock<StoreState<T>>,
    updates: watch::Sender<Loadable<T>>,
    in_flight: Mutex<Option<watch::Receiver<Option<FetchResult>>>>,
}

/// Generic cache-first collection of remote-sourced items
///
/// Cloning is cheap; clones share state.
pub struct LoadableStore<T: StoreItem> {
    inner: Arc<Inner<T>>,
}

impl<T: StoreItem> Clone for LoadableStore<T> {
    fn clone(&self) -> Self {
        LoadableStore {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Clears the in-flight slot even if the leading fetch is dropped mid-await
struct InFlightGuard<'a, T: StoreItem> {
    inner: &'a Inner<T>,
}

impl<T: StoreItem> Drop for InFlightGuard<'_, T> {
    fn drop(&mut self) {
        *self.inner.in_flight.lock() = None;
    }
}

enum FetchRole {
    Leader(watch::Sender<Option<FetchResult>>),
    Follower(watch::Receiver<Option<FetchResult>>),
}

impl<T: StoreItem> LoadableStore<T> {
    pub fn new(remote: Arc<dyn RemoteCollection<T>>, options: StoreOptions) -> Self {
        let (updates, _) = watch::channel(Loadable::Empty);
        let cache = options.cache_dir.map(SnapshotCache::in_dir);

        LoadableStore {
            inner: Arc::new(Inner {
                remote,
                params: options.params,
                gate: options.gate,
                cache,
                cache_writes: Mutex::new(()),
                state: RwLock::new(StoreState {
                    loadable: Loadable::Empty,
                    retained: None,
                    last_error: None,
                }),
                updates,
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        T::TYPE_LABEL
    }

    pub fn gate(&self) -> StoreGate {
        self.inner.gate
    }

    /// Current load state
    pub fn state(&self) -> Loadable<T> {
        self.inner.state.read().loadable.clone()
    }

    /// Items on screen: the loaded items, or the retained ones during a refresh
    pub fn items(&self) -> Vec<T> {
        self.inner.state.read().shown().cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().shown().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.read().loadable.is_loaded()
    }

    /// Last error seen, even if it only produced a warning
    pub fn last_error(&self) -> Option<LoadError> {
        self.inner.state.read().last_error.clone()
    }

    /// Subscribe to state changes
    pub fn watch(&self) -> watch::Receiver<Loadable<T>> {
        self.inner.updates.subscribe()
    }

    /// Show the best local data and schedule a background fetch.
    ///
    /// No-op while `Loading` or `Loaded`. Otherwise resolves, in order:
    /// a non-empty cache snapshot, the type's placeholders, or `Loading`.
    /// Returns the background fetch task, or `None` if nothing was started.
    pub fn initialize(&self) -> Option<JoinHandle<()>> {
        if self.inner.state.read().loadable.is_active() {
            debug!(store = T::TYPE_LABEL, "Already initialized");
            return None;
        }

        let cached = self
            .inner
            .cache
            .as_ref()
            .and_then(SnapshotCache::load)
            .filter(|items| !items.is_empty());

        {
            let mut state = self.inner.state.write();
            if state.loadable.is_active() {
                return None;
            }

            state.loadable = if let Some(items) = cached {
                crate::metrics::record_counter("store.cache.hit", 1);
                info!(store = T::TYPE_LABEL, count = items.len(), "Loaded from cache");
                Loadable::Loaded(items)
            } else {
                crate::metrics::record_counter("store.cache.miss", 1);
                let placeholders = T::placeholders();
                if placeholders.is_empty() {
                    Loadable::Loading
                } else {
                    debug!(store = T::TYPE_LABEL, count = placeholders.len(), "Showing placeholders");
                    Loadable::Loaded(placeholders)
                }
            };
            self.publish(&state);
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(store = T::TYPE_LABEL, "No async runtime; background fetch skipped");
                return None;
            }
        };

        let store = self.clone();
        Some(handle.spawn(async move {
            // Outcome is already logged and recorded on the store
            let _ = store.fetch().await;
        }))
    }

    /// Reconcile with the remote.
    ///
    /// Joins an in-flight fetch if there is one. `Err` only when nothing had
    /// been shown yet and the store moved to `Failed`.
    pub async fn fetch(&self) -> FetchResult {
        let role = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(rx) => FetchRole::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx);
                    FetchRole::Leader(tx)
                }
            }
        };

        match role {
            FetchRole::Follower(mut rx) => {
                debug!(store = T::TYPE_LABEL, "Joining in-flight fetch");
                match rx.wait_for(Option::is_some).await {
                    Ok(result) => result
                        .clone()
                        .unwrap_or(Err(LoadError::Interrupted(T::TYPE_LABEL))),
                    Err(_) => Err(LoadError::Interrupted(T::TYPE_LABEL)),
                }
            }
            FetchRole::Leader(tx) => {
                let guard = InFlightGuard { inner: &self.inner };
                let result = self.run_fetch().await;
                drop(guard);
                tx.send_replace(Some(result.clone()));
                result
            }
        }
    }

    /// Flip to `Loading` now and return once the fetch resolves
    pub async fn fetch_and_await(&self) -> FetchResult {
        {
            let mut state = self.inner.state.write();
            match std::mem::take(&mut state.loadable) {
                Loadable::Loaded(items) => state.retained = Some(items),
                Loadable::Loading | Loadable::Empty | Loadable::Failed(_) => {}
            }
            state.loadable = Loadable::Loading;
            self.publish(&state);
        }
        self.fetch().await
    }

    /// Optimistically prepend a locally originated item
    pub fn insert(&self, item: T) {
        let mut state = self.inner.state.write();
        let id = item.item_id();
        let mut items = state.shown().cloned().unwrap_or_default();
        items.retain(|existing| existing.item_id() != id);
        items.insert(0, item);

        state.loadable = Loadable::Loaded(items.clone());
        state.retained = None;
        self.publish(&state);

        debug!(store = T::TYPE_LABEL, count = items.len(), "Inserted item");
        self.persist(state, &items);
    }

    /// Create `candidate` remotely, then insert the stored item
    pub async fn submit(&self, candidate: T::Candidate) -> StoreResult<T> {
        match self.inner.remote.create(candidate).await {
            Ok(item) => {
                self.insert(item.clone());
                Ok(item)
            }
            Err(source) => {
                let err = LoadError::Create {
                    label: T::TYPE_LABEL,
                    source,
                };
                warn!(store = T::TYPE_LABEL, error = %err, "Remote create failed");
                self.inner.state.write().last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Drop everything, including the cache snapshot
    pub fn reset(&self) {
        let mut state = self.inner.state.write();
        state.loadable = Loadable::Empty;
        state.retained = None;
        state.last_error = None;
        self.publish(&state);

        if let Some(cache) = &self.inner.cache {
            let _write = self.inner.cache_writes.lock();
            drop(state);
            if let Err(e) = cache.clear() {
                warn!(store = T::TYPE_LABEL, error = %e, "Failed to clear cache");
            }
        }
        info!(store = T::TYPE_LABEL, "Store reset");
    }

    /// Initialize if this store's gate admits a sign-in of this kind
    pub fn on_signed_in(&self, is_anonymous: bool) -> Option<JoinHandle<()>> {
        if !self.inner.gate.allows(is_anonymous) {
            debug!(store = T::TYPE_LABEL, is_anonymous, "Sign-in does not pass store gate");
            return None;
        }
        self.initialize()
    }

    async fn run_fetch(&self) -> FetchResult {
        debug!(store = T::TYPE_LABEL, "Fetching from remote");

        match self.inner.remote.fetch(&self.inner.params).await {
            Ok(items) => {
                let fetched = items.len();
                let items: Vec<T> = items.into_iter().filter(|item| item.is_valid()).collect();
                if items.len() < fetched {
                    warn!(
                        store = T::TYPE_LABEL,
                        dropped = fetched - items.len(),
                        "Dropped invalid remote items"
                    );
                }
                Ok(self.apply_items(items))
            }
            Err(source) => self.apply_error(LoadError::Fetch {
                label: T::TYPE_LABEL,
                source,
            }),
        }
    }

    fn apply_items(&self, items: Vec<T>) -> FetchOutcome {
        let mut state = self.inner.state.write();

        if items.is_empty() {
            if let Some(shown) = state.shown().cloned() {
                warn!(
                    store = T::TYPE_LABEL,
                    count = shown.len(),
                    "Remote returned no items; keeping shown items"
                );
                crate::metrics::record_counter("store.fetch.kept_stale", 1);
                let count = shown.len();
                state.loadable = Loadable::Loaded(shown);
                state.retained = None;
                self.publish(&state);
                return FetchOutcome::KeptOnEmpty { count };
            }
        }

        let count = items.len();
        state.loadable = Loadable::Loaded(items.clone());
        state.retained = None;
        state.last_error = None;
        self.publish(&state);

        crate::metrics::record_counter("store.fetch.success", 1);
        info!(store = T::TYPE_LABEL, count, "Fetched from remote");
        self.persist(state, &items);
        FetchOutcome::Replaced { count }
    }

    fn apply_error(&self, err: LoadError) -> FetchResult {
        crate::metrics::record_counter("store.fetch.failure", 1);
        let mut state = self.inner.state.write();
        state.last_error = Some(err.clone());

        if let Some(shown) = state.shown().cloned() {
            warn!(store = T::TYPE_LABEL, error = %err, "Fetch failed; keeping shown items");
            crate::metrics::record_counter("store.fetch.kept_stale", 1);
            let count = shown.len();
            state.loadable = Loadable::Loaded(shown);
            state.retained = None;
            self.publish(&state);
            return Ok(FetchOutcome::KeptOnError { count, error: err });
        }

        error!(store = T::TYPE_LABEL, error = %err, "Fetch failed with nothing to show");
        state.loadable = Loadable::Failed(err.clone());
        self.publish(&state);
        Err(err)
    }

    /// Write `items` to the snapshot, releasing `state` once this write is
    /// queued behind earlier ones so disk order matches state order
    fn persist(&self, state: RwLockWriteGuard<'_, StoreState<T>>, items: &[T]) {
        if let Some(cache) = &self.inner.cache {
            let _write = self.inner.cache_writes.lock();
            drop(state);
            if let Err(e) = cache.save(items) {
                warn!(store = T::TYPE_LABEL, error = %e, "Failed to write cache snapshot");
            }
        }
    }

    fn publish(&self, state: &StoreState<T>) {
        self.inner.updates.send_replace(state.loadable.clone());
    }
}
