//! # Storage
//!
//! The persistence layer for committed blocks. A single sled-backed tree
//! (`db`) holds every block the node has produced or accepted; the chain
//! layer above it ([`crate::chain`]) is what enforces ordering and
//! hash-chain integrity.

pub mod db;

pub use db::{make_key, BlockStore, StoreError, StoreResult, GC_INTERVAL};
