//! FFI surface of the roster store for the dashboard UI.

pub mod api;
