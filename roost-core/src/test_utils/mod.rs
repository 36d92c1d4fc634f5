//! Test utilities and helpers for Roost
//!
//! Fixtures, scripted fakes for the remote collaborators and async helpers
//! shared by unit tests, integration tests and benches.

pub mod async_helpers;
pub mod fakes;
pub mod fixtures;

pub use async_helpers::*;
pub use fakes::*;
pub use fixtures::*;
