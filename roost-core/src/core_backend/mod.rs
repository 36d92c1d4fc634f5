//! In-process implementation of the remote contracts
//!
//! Used by the CLI's offline demo and by tests.

pub mod memory;

pub use memory::{MemoryBackend, Operation};
