//! The `Loadable` state of a remote-sourced collection

use super::errors::LoadError;

/// Load state of a collection; exactly one variant is active
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Loadable<T> {
    #[default]
    Empty,
    Loading,
    Loaded(Vec<T>),
    Failed(LoadError),
}

impl<T> Loadable<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Loadable::Loaded(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading)
    }

    /// Loaded or loading; `initialize` leaves these alone
    pub fn is_active(&self) -> bool {
        matches!(self, Loadable::Loading | Loadable::Loaded(_))
    }

    pub fn items(&self) -> Option<&[T]> {
        match self {
            Loadable::Loaded(items) => Some(items),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            Loadable::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Variant name, for logs
    pub fn label(&self) -> &'static str {
        match self {
            Loadable::Empty => "empty",
            Loadable::Loading => "loading",
            Loadable::Loaded(_) => "loaded",
            Loadable::Failed(_) => "failed",
        }
    }
}
