//! Persistence layer for overlay records.
//!
//! # Responsibility
//! - Define the durable key-value contract and its implementations.
//! - Encode partitions as JSON blobs and decode them defensively.
//!
//! # Invariants
//! - Repository reads degrade to "no overlay" instead of failing.

pub mod kv_store;
pub mod overlay_repo;
