//! Scripted fakes for remote collaborators
//!
//! `ScriptedCollection` plays back queued fetch results, counts calls and
//! can hold fetches open so tests can observe in-between states.

use super::async_helpers::DEFAULT_TEST_TIMEOUT;
use crate::core_loadable::{FetchParams, RemoteCollection, StoreItem, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;

type Factory<T> = Box<dyn Fn(<T as StoreItem>::Candidate) -> T + Send + Sync>;

/// Remote collection that replays scripted responses in order.
///
/// An exhausted script answers every fetch with an empty list.
pub struct ScriptedCollection<T: StoreItem> {
    responses: Mutex<VecDeque<Result<Vec<T>, TransportError>>>,
    create_error: Mutex<Option<TransportError>>,
    factory: Option<Factory<T>>,
    last_params: Mutex<Option<FetchParams>>,
    calls: watch::Sender<usize>,
    open: Arc<watch::Sender<bool>>,
}

impl<T: StoreItem> Default for ScriptedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StoreItem> ScriptedCollection<T> {
    pub fn new() -> Self {
        let (calls, _) = watch::channel(0);
        let (open, _) = watch::channel(true);
        ScriptedCollection {
            responses: Mutex::new(VecDeque::new()),
            create_error: Mutex::new(None),
            factory: None,
            last_params: Mutex::new(None),
            calls,
            open: Arc::new(open),
        }
    }

    /// Build created items with `factory`
    pub fn with_factory(mut self, factory: impl Fn(T::Candidate) -> T + Send + Sync + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    pub fn push_ok(&self, items: Vec<T>) {
        self.responses.lock().push_back(Ok(items));
    }

    pub fn push_err(&self, err: TransportError) {
        self.responses.lock().push_back(Err(err));
    }

    /// Make every create fail with `err`
    pub fn fail_creates(&self, err: TransportError) {
        *self.create_error.lock() = Some(err);
    }

    pub fn fetch_count(&self) -> usize {
        *self.calls.borrow()
    }

    pub fn last_params(&self) -> Option<FetchParams> {
        self.last_params.lock().clone()
    }

    /// Block fetches after they are counted, until the gate is released
    pub fn hold(&self) -> HoldGate {
        HoldGate::close(&self.open)
    }

    /// Wait until at least `n` fetches have started
    pub async fn wait_until_called(&self, n: usize) {
        let mut rx = self.calls.subscribe();
        let reached = tokio::time::timeout(DEFAULT_TEST_TIMEOUT, async {
            let _ = rx.wait_for(|count| *count >= n).await;
        })
        .await;
        if reached.is_err() {
            panic!("remote was not called {} times within {:?}", n, DEFAULT_TEST_TIMEOUT);
        }
    }
}

#[async_trait]
impl<T: StoreItem> RemoteCollection<T> for ScriptedCollection<T> {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<T>, TransportError> {
        *self.last_params.lock() = Some(params.clone());
        self.calls.send_modify(|count| *count += 1);

        let mut open = self.open.subscribe();
        let _ = open.wait_for(|open| *open).await;

        self.responses.lock().pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn create(&self, candidate: T::Candidate) -> Result<T, TransportError> {
        if let Some(err) = self.create_error.lock().clone() {
            return Err(err);
        }
        match &self.factory {
            Some(factory) => Ok(factory(candidate)),
            None => Err(TransportError::Rejected("create not scripted".to_string())),
        }
    }
}

/// Releases held fetches when `release` is called or the gate is dropped
pub struct HoldGate {
    open: Arc<watch::Sender<bool>>,
}

impl HoldGate {
    /// Close `open` until the returned gate is released
    pub fn close(open: &Arc<watch::Sender<bool>>) -> HoldGate {
        open.send_replace(false);
        HoldGate {
            open: Arc::clone(open),
        }
    }

    pub fn release(self) {
        // Drop opens the gate
    }
}

impl Drop for HoldGate {
    fn drop(&mut self) {
        self.open.send_replace(true);
    }
}
