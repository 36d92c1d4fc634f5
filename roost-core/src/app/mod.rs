//! Composition root
//!
//! `AppContext` owns the session, the filter and the stores, and keeps the
//! stores in step with sign-in and sign-out.

pub mod context;
pub mod errors;
pub mod registry;

pub use context::{AppCollaborators, AppContext, AppTasks};
pub use errors::{AppError, AppResult};
pub use registry::{SessionAware, StoreRegistry};
