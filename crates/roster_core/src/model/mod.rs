//! Domain model for reference entities.
//!
//! # Responsibility
//! - Define the generic record shape shared by seed data and overlay storage.
//! - Declare per-partition schemas and the business key of each entity type.
//! - Normalize heterogeneous stored timestamps.
//!
//! # Invariants
//! - Every record carries an opaque `id` unique within its partition.
//! - `created_at` is canonical ISO-8601 text after construction.

pub mod record;
pub mod schema;
pub mod timestamp;
