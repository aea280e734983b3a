//! Text codecs used by import/export.

pub mod csv;
