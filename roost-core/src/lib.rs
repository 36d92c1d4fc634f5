//! Roost client core
//!
//! Session, cache-first stores, content filter and derived views for the
//! Roost app, plus an in-memory backend for offline use.

pub mod app;
pub mod config;
pub mod core_backend;
pub mod core_filter;
pub mod core_loadable;
pub mod core_model;
pub mod core_session;
pub mod core_views;
pub mod logging;
pub mod metrics;
pub mod test_utils;

pub use app::{AppCollaborators, AppContext};
pub use config::Config;
pub use logging::{init_logging, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        let _ = Config::default();
    }
}
