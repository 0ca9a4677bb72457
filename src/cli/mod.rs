//! CLI command handlers

pub mod commands;

pub use commands::{cells, charts, export, history, import, rename_sheet, set_cell, sheets, styles};
