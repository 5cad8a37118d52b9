//! LMDB-backed checkpoint store
//!
//! Persists one decimal version string per mirror in a single named LMDB
//! database. Blocking LMDB calls are moved off the async runtime with
//! `spawn_blocking`; writes are serialized by LMDB's single-writer lock.

pub mod keys;
pub mod store;

pub use store::LmdbCheckpointStore;
