//! Cache-first loadable collections
//!
//! A `LoadableStore<T>` holds one remote-sourced collection and moves it
//! through the `Loadable` states. It shows cached or bundled items right
//! away, refreshes in the background and keeps what it has shown when a
//! refresh fails or comes back empty.

pub mod cache;
pub mod errors;
pub mod loadable;
pub mod store;
pub mod traits;

pub use cache::SnapshotCache;
pub use errors::{LoadError, StoreResult, TransportError};
pub use loadable::Loadable;
pub use store::{FetchOutcome, LoadableStore, StoreGate, StoreOptions};
pub use traits::{FetchParams, RemoteCollection, StoreItem};
