//! Record types and the storage boundary.
//!
//! The rest of the crate talks to storage only through the `Store` trait;
//! `MemoryStore` is the in-process implementation.

pub mod memory_store;
pub mod models;
pub mod store;

pub use memory_store::MemoryStore;
pub use store::{Store, StoreError};
