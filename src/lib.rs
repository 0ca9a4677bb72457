//! Excel micro-database - workbooks as normalized SQLite records
//!
//! This library extracts `.xlsx` workbooks into record streams (cells,
//! formulas, styles, merged ranges, charts), persists them in a normalized
//! SQLite store, and reconstructs new workbooks from the stored records.
//!
//! # Features
//!
//! - Formula text or computed values, per extraction mode
//! - Canonical style attributes with stable content-hash keys
//! - Chart extraction from DrawingML (kind, series, anchors, title, legend)
//! - Single-cell edits with an edit log
//! - Progress callbacks for long imports and exports
//!
//! # Example
//!
//! ```no_run
//! use excel_micro_db::Project;
//!
//! let mut project = Project::open("budget.db")?;
//! let summary = project.extract("budget.xlsx")?;
//! println!("Sheets: {}", summary.sheets);
//!
//! project.update_cell("Sheet1", "B2", Some(42.0.into()))?;
//! project.reconstruct("rebuilt.xlsx")?;
//! # Ok::<(), excel_micro_db::MicroDbError>(())
//! ```

pub mod cli;
pub mod error;
pub mod excel;
pub mod progress;
pub mod project;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{MicroDbError, MicroDbResult};
pub use project::Project;
pub use store::NormalizedStore;
pub use types::{
    CellRecord, CellValue, ChartRecord, ExtractMode, FormulaRecord, MergedRange, Sheet, SheetId,
    SheetModel, StyleRecord, WorkbookModel,
};
