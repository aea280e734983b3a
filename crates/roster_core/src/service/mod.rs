//! Use-case services over seed and overlay data.
//!
//! # Responsibility
//! - Reconcile seed and overlay records into the merged view.
//! - Export and import merged partitions as CSV.

pub mod reconcile_service;
pub mod transfer_service;
