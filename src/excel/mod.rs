//! Workbook transcoding
//!
//! - Extract: .xlsx → record streams (calamine + raw OOXML parts)
//! - Reconstruct: normalized store → .xlsx (rust_xlsxwriter)

pub mod chart_translator;
pub mod coordinates;
pub mod drawing;
mod exporter;
pub mod format_translator;
pub mod geometry;
mod importer;
pub mod package;
pub mod style_table;
pub mod styles;
mod xml_helpers;

pub use exporter::{ReconstructOptions, ReconstructSummary, Reconstructor};
pub use importer::{cell_value, ExtractOptions, ExtractSummary, Extraction, Extractor};
