//! Contracts a store depends on
//!
//! `StoreItem` is implemented by every type a `LoadableStore` can hold.
//! `RemoteCollection` is the narrow, function-shaped view of the remote
//! data platform for one entity type.

use super::errors::TransportError;
use crate::core_model::Uid;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// An item that can live in a `LoadableStore`
pub trait StoreItem: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable identity used to de-duplicate local inserts
    type Id: Clone + Eq + fmt::Debug + Send + Sync;

    /// Proposal sent to the remote when creating a new item
    type Candidate: Send + Sync + 'static;

    /// Human-readable label used in logs and errors
    const TYPE_LABEL: &'static str;

    /// File name of this type's snapshot under the cache directory
    const CACHE_FILE: &'static str;

    fn item_id(&self) -> Self::Id;

    /// Items failing this check are dropped on fetch and cache load
    fn is_valid(&self) -> bool {
        true
    }

    /// Bundled items shown before anything has been fetched
    fn placeholders() -> Vec<Self> {
        Vec::new()
    }
}

/// Parameters passed through to the remote on every fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchParams {
    /// Restrict results to records involving this user
    pub scope: Option<Uid>,
    /// Maximum number of records to return
    pub limit: Option<usize>,
}

impl FetchParams {
    pub fn scoped_to(uid: Uid) -> Self {
        FetchParams {
            scope: Some(uid),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Remote data collaborator for one entity type
#[async_trait]
pub trait RemoteCollection<T: StoreItem>: Send + Sync {
    /// Fetch the current remote contents
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<T>, TransportError>;

    /// Create a record from a candidate, returning it as stored
    async fn create(&self, candidate: T::Candidate) -> Result<T, TransportError>;
}
