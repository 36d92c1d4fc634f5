/*
    registry.rs - Session-aware store registry

    Stores register once; session events are then delivered to every store
    in registration order, on the caller's task.
*/

use crate::config::FeatureManager;
use crate::core_loadable::{LoadableStore, StoreItem};
use crate::core_session::SessionEvent;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A dependent that follows sign-in and sign-out
pub trait SessionAware: Send + Sync {
    fn label(&self) -> &'static str;

    /// Start loading if this kind of sign-in qualifies
    fn on_signed_in(&self, is_anonymous: bool) -> Option<JoinHandle<()>>;

    /// Forget everything loaded for the previous user
    fn reset(&self);
}

impl<T: StoreItem> SessionAware for LoadableStore<T> {
    fn label(&self) -> &'static str {
        LoadableStore::label(self)
    }

    fn on_signed_in(&self, is_anonymous: bool) -> Option<JoinHandle<()>> {
        LoadableStore::on_signed_in(self, is_anonymous)
    }

    fn reset(&self) {
        LoadableStore::reset(self)
    }
}

/// Ordered set of session-aware stores
pub struct StoreRegistry {
    stores: RwLock<Vec<Arc<dyn SessionAware>>>,
    features: Arc<FeatureManager>,
}

impl StoreRegistry {
    pub fn new(features: Arc<FeatureManager>) -> Self {
        StoreRegistry {
            stores: RwLock::new(Vec::new()),
            features,
        }
    }

    pub fn register(&self, store: Arc<dyn SessionAware>) {
        debug!(store = store.label(), "Registered store");
        self.stores.write().push(store);
    }

    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }

    /// Labels in delivery order
    pub fn labels(&self) -> Vec<&'static str> {
        self.stores.read().iter().map(|s| s.label()).collect()
    }

    /// Deliver `event` to every store, in registration order.
    ///
    /// Returns the background fetches started by sign-in initialization.
    pub fn route_event(&self, event: &SessionEvent) -> Vec<JoinHandle<()>> {
        let stores = self.stores.read().clone();
        match event {
            SessionEvent::SignedIn { is_anonymous, .. } => stores
                .iter()
                .filter_map(|store| store.on_signed_in(*is_anonymous))
                .collect(),
            SessionEvent::SignedOut => {
                if self.features.is_reset_on_sign_out_enabled() {
                    info!(stores = stores.len(), "Resetting stores after sign-out");
                    for store in &stores {
                        store.reset();
                    }
                } else {
                    debug!("Keeping store contents after sign-out");
                }
                Vec::new()
            }
        }
    }
}
