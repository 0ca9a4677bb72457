//! Extractor: source workbook (.xlsx) → normalized record streams
//!
//! calamine supplies values and formula texts; [`WorkbookPackage`] supplies
//! styles, merges and charts. Failing to open either is fatal. Anything
//! scoped to one cell, style or chart is logged, counted and skipped.

use crate::error::{MicroDbError, MicroDbResult};
use crate::excel::coordinates::{range_to_bounds, row_col_to_address};
use crate::excel::package::{SheetEntry, SheetParts, WorkbookPackage};
use crate::excel::styles::StyleRegistry;
use crate::progress::{self, ProgressTracker};
use crate::types::{
    CellRecord, CellValue, ExtractMode, FormulaRecord, MergedRange, SheetModel, WorkbookModel,
};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn, Dispatch};

/// Extraction settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    pub mode: ExtractMode,
    /// Cells between progress callbacks
    pub progress_interval: usize,
    /// Group equal styles into rectangles instead of one record per cell
    pub coalesce_styles: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            mode: ExtractMode::Formulas,
            progress_interval: 500,
            coalesce_styles: false,
        }
    }
}

/// Counts of what one extraction produced and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractSummary {
    pub sheets: usize,
    pub cells: usize,
    pub formulas: usize,
    pub styles: usize,
    pub merges: usize,
    pub charts: usize,
    pub skipped_cells: usize,
    pub skipped_styles: usize,
    pub skipped_charts: usize,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub model: WorkbookModel,
    pub summary: ExtractSummary,
}

/// Walks a source workbook and produces one [`SheetModel`] per worksheet.
pub struct Extractor {
    path: PathBuf,
    options: ExtractOptions,
    dispatch: Option<Dispatch>,
}

/// Values and formula texts loaded for one worksheet
struct LoadedSheet {
    entry: SheetEntry,
    values: Range<Data>,
    formulas: Option<Range<String>>,
}

impl Extractor {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options: ExtractOptions::default(),
            dispatch: None,
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Send this extraction's log events to `dispatch` instead of the
    /// global subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn extract(&self) -> MicroDbResult<Extraction> {
        self.extract_with_progress(progress::silent)
    }

    pub fn extract_with_progress<F: FnMut(u8, &str)>(&self, progress: F) -> MicroDbResult<Extraction> {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || self.run(progress)),
            None => self.run(progress),
        }
    }

    fn run<F: FnMut(u8, &str)>(&self, progress: F) -> MicroDbResult<Extraction> {
        let span = info_span!("extract", path = %self.path.display());
        let _enter = span.enter();

        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(|e| {
            MicroDbError::Source(format!("Failed to open {}: {}", self.path.display(), e))
        })?;
        let mut package = WorkbookPackage::open(&self.path)?;

        let mut tracker = ProgressTracker::new(progress, self.options.progress_interval);
        let mut loaded = Vec::new();
        for entry in package.sheets().to_vec() {
            let values = workbook.worksheet_range(&entry.name).map_err(|e| {
                MicroDbError::Source(format!("Failed to read sheet '{}': {}", entry.name, e))
            })?;
            let formulas = match self.options.mode {
                ExtractMode::Formulas => Some(workbook.worksheet_formula(&entry.name).map_err(|e| {
                    MicroDbError::Source(format!(
                        "Failed to read formulas of sheet '{}': {}",
                        entry.name, e
                    ))
                })?),
                ExtractMode::ValuesOnly => None,
            };
            tracker.expect(values.used_cells().count());
            loaded.push(LoadedSheet {
                entry,
                values,
                formulas,
            });
        }

        let mut summary = ExtractSummary::default();
        let mut sheets = Vec::with_capacity(loaded.len());
        for sheet in &loaded {
            tracker.report(&format!("Extracting sheet '{}'", sheet.entry.name));
            let model = self.extract_sheet(&mut package, sheet, &mut tracker, &mut summary)?;
            sheets.push(model);
        }

        summary.sheets = sheets.len();
        tracker.finish("Extraction complete");
        info!(
            sheets = summary.sheets,
            cells = summary.cells,
            formulas = summary.formulas,
            styles = summary.styles,
            charts = summary.charts,
            "Extraction complete"
        );

        Ok(Extraction {
            model: WorkbookModel {
                source: self.path.clone(),
                mode: self.options.mode,
                sheets,
            },
            summary,
        })
    }

    fn extract_sheet<F: FnMut(u8, &str)>(
        &self,
        package: &mut WorkbookPackage,
        sheet: &LoadedSheet,
        tracker: &mut ProgressTracker<F>,
        summary: &mut ExtractSummary,
    ) -> MicroDbResult<SheetModel> {
        let name = &sheet.entry.name;
        let parts = package.read_sheet(&sheet.entry)?;
        let mut model = SheetModel::new(name.as_str());

        // Cell pass
        let cells = collect_cells(&sheet.values, sheet.formulas.as_ref(), tracker);
        for ((row, col), record) in &cells {
            if record.is_formula {
                if let Some(CellValue::Text(formula)) = &record.value {
                    model.formulas.push(FormulaRecord {
                        address: row_col_to_address(*row, *col),
                        formula: formula.clone(),
                    });
                }
            }
        }
        model.cells = cells.into_values().collect();
        summary.skipped_cells += parts.skipped_cells;

        // Style pass
        let mut registry = StyleRegistry::new();
        for &(row, col, xf) in &parts.cell_styles {
            let address = row_col_to_address(row, col);
            match package.styles().attributes_for(xf) {
                Ok(Some(attributes)) => {
                    registry.register(&address, &attributes);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(sheet = %name, address = %address, "Skipping style: {}", e);
                    summary.skipped_styles += 1;
                }
            }
        }
        model.styles = if self.options.coalesce_styles {
            registry.coalesced_records()
        } else {
            registry.records()
        };
        debug!(
            sheet = %name,
            styled_cells = registry.assigned_cells(),
            unique_styles = registry.unique_styles(),
            "Styles registered"
        );

        // Merge pass
        model.merges = parts.merges.iter().map(MergedRange::new).collect();

        // Chart pass
        self.extract_charts(package, &sheet.entry, &parts, &mut model, summary);

        let (max_row, max_col) = used_extent(&model);
        model.max_row = max_row;
        model.max_col = max_col;

        summary.cells += model.cells.len();
        summary.formulas += model.formulas.len();
        summary.styles += model.styles.len();
        summary.merges += model.merges.len();
        summary.charts += model.charts.len();

        info!(
            sheet = %name,
            cells = model.cells.len(),
            formulas = model.formulas.len(),
            styles = model.styles.len(),
            merges = model.merges.len(),
            charts = model.charts.len(),
            "Extracted sheet"
        );
        Ok(model)
    }

    fn extract_charts(
        &self,
        package: &mut WorkbookPackage,
        entry: &SheetEntry,
        parts: &SheetParts,
        model: &mut SheetModel,
        summary: &mut ExtractSummary,
    ) {
        let charts = match package.read_charts(entry, parts) {
            Ok(charts) => charts,
            Err(e) => {
                warn!(sheet = %entry.name, "Skipping drawing: {}", e);
                summary.skipped_charts += 1;
                return;
            }
        };

        for (index, chart) in charts.into_iter().enumerate() {
            match chart {
                Ok(chart) => model.charts.push(chart),
                Err(e) => {
                    warn!(sheet = %entry.name, chart_index = index, "Skipping chart: {}", e);
                    summary.skipped_charts += 1;
                }
            }
        }
    }
}

/// Merge the formula and value grids into one record per cell, keyed by
/// `(row, col)` so the output is in row-major order.
///
/// A formula cell is kept even when it has no cached value; in values-only
/// mode no formula range is passed and only cached results are kept.
fn collect_cells<F: FnMut(u8, &str)>(
    values: &Range<Data>,
    formulas: Option<&Range<String>>,
    tracker: &mut ProgressTracker<F>,
) -> BTreeMap<(u32, u32), CellRecord> {
    let mut cells = BTreeMap::new();

    if let Some(formulas) = formulas {
        let (row0, col0) = formulas.start().unwrap_or((0, 0));
        for (r, c, formula) in formulas.used_cells() {
            if formula.is_empty() {
                continue;
            }
            let (row, col) = (row0 + r as u32, col0 + c as u32);
            let text = if formula.starts_with('=') {
                formula.clone()
            } else {
                format!("={formula}")
            };
            cells.insert((row, col), CellRecord::formula(row_col_to_address(row, col), text));
        }
    }

    let (row0, col0) = values.start().unwrap_or((0, 0));
    for (r, c, data) in values.used_cells() {
        tracker.tick("Extracting cells");
        let key = (row0 + r as u32, col0 + c as u32);
        if cells.contains_key(&key) {
            continue;
        }
        if let Some(value) = cell_value(data) {
            cells.insert(key, CellRecord::value(row_col_to_address(key.0, key.1), value));
        }
    }

    cells
}

/// Scalar value of a calamine cell; `None` for empty cells and empty text.
pub fn cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Error(e.to_string())),
    }
}

/// 1-based used extent over cells, styles and merges; `(0, 0)` when empty.
fn used_extent(model: &SheetModel) -> (u32, u32) {
    let mut max_row = 0;
    let mut max_col = 0;
    let mut include = |last_row: u32, last_col: u32| {
        max_row = max_row.max(last_row + 1);
        max_col = max_col.max(last_col + 1);
    };

    let ranges = model
        .cells
        .iter()
        .map(|c| c.address.as_str())
        .chain(model.styles.iter().map(|s| s.range_address.as_str()))
        .chain(model.merges.iter().map(|m| m.range_address.as_str()));
    for range in ranges {
        if let Ok(bounds) = range_to_bounds(range) {
            include(bounds.last_row, bounds.last_col);
        }
    }
    (max_row, max_col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;

    #[test]
    fn test_cell_value_conversion() {
        assert_eq!(cell_value(&Data::Empty), None);
        assert_eq!(cell_value(&Data::String(String::new())), None);
        assert_eq!(cell_value(&Data::Int(7)), Some(CellValue::Number(7.0)));
        assert_eq!(cell_value(&Data::Bool(true)), Some(CellValue::Bool(true)));
        assert_eq!(
            cell_value(&Data::Error(CellErrorType::Div0)),
            Some(CellValue::Error("#DIV/0!".to_string()))
        );
    }

    #[test]
    fn test_used_extent() {
        let mut model = SheetModel::new("Sheet1");
        assert_eq!(used_extent(&model), (0, 0));

        model.cells.push(CellRecord::value("B2", CellValue::from("x")));
        model.merges.push(MergedRange::new("D1:E1"));
        assert_eq!(used_extent(&model), (2, 5));
    }

    #[test]
    fn test_missing_file_is_fatal_source_error() {
        let err = Extractor::new("/definitely/not/here.xlsx").extract().unwrap_err();
        assert!(matches!(err, MicroDbError::Source(_)));
        assert!(!err.is_record_scoped());
    }
}
