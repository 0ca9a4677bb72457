//! Normalized store: SQLite persistence of extracted sheets
//!
//! One row per cell, formula, style assignment, merged range and chart,
//! keyed by a store-assigned sheet id that survives renames.

mod schema;
mod storage;

pub use storage::NormalizedStore;
