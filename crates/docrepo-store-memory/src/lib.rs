//! In-memory backend for the docrepo document store traits.
//!
//! Suitable for tests, demos and the `docrepo` CLI. Nothing is persisted.

mod diff;
mod store;

pub use store::{MemoryStore, Seed};
