//! Authenticated session
//!
//! `AuthSession` tracks who is signed in (anonymous or real), loads their
//! profile, runs the multi-step profile creation and tells dependents
//! about sign-in and sign-out through `SessionEvent`s.

pub mod activity;
pub mod auth;
pub mod errors;
pub mod events;
pub mod remote;
pub mod saga;
pub mod state;
pub mod validation;

pub use activity::{ActivityLog, MemoryActivityLog, TracingActivityLog};
pub use auth::{AuthSession, SessionCollaborators};
pub use errors::{AuthRemoteError, SessionError, SessionResult};
pub use events::{EventBroadcaster, SessionEvent};
pub use remote::{AuthRemote, AuthRemoteResult, ProfileRemote};
pub use saga::{SagaReport, SagaStep, SagaWarning};
pub use state::{SessionFlags, SessionPhase, SessionSnapshot};
