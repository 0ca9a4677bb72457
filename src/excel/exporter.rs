//! Reconstructor: normalized store → new workbook (.xlsx)
//!
//! Per sheet the order is merges, then values and formulas, then styled
//! blanks, then charts. Merges go first because the writer fills a merged
//! range with blanks, which the value pass then overwrites.

use crate::error::{MicroDbError, MicroDbResult};
use crate::excel::chart_translator::{build_chart, CellLookup};
use crate::excel::coordinates::{address_to_row_col, range_to_bounds};
use crate::excel::format_translator::build_format;
use crate::excel::geometry::placement_for;
use crate::progress::{self, ProgressTracker};
use crate::store::NormalizedStore;
use crate::types::{
    CellRecord, CellValue, ChartRecord, FormulaRecord, MergedRange, Sheet, StyleRecord,
};
use rust_xlsxwriter::{Format, Formula, Workbook, Worksheet};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, info_span, warn, Dispatch};

/// Reconstruction settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructOptions {
    /// Cells between progress callbacks
    pub progress_interval: usize,
    /// Chart size in pixels when a record carries no usable size
    pub default_chart_width: u32,
    pub default_chart_height: u32,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            progress_interval: 500,
            default_chart_width: 480,
            default_chart_height: 288,
        }
    }
}

/// Counts of what one reconstruction wrote and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructSummary {
    pub sheets: usize,
    pub cells: usize,
    pub formulas: usize,
    pub styled_blanks: usize,
    pub formats: usize,
    pub merges: usize,
    pub charts: usize,
    pub skipped_cells: usize,
    pub skipped_styles: usize,
    pub skipped_merges: usize,
    pub skipped_charts: usize,
}

//==============================================================================
// Snapshot of the store
//==============================================================================

struct SheetSnapshot {
    sheet: Sheet,
    cells: Vec<CellRecord>,
    formulas: Vec<FormulaRecord>,
    styles: Vec<StyleRecord>,
    merges: Vec<MergedRange>,
    charts: Vec<ChartRecord>,
    /// Non-formula values by `(row, col)`, used to dereference chart titles
    values: HashMap<(u32, u32), CellValue>,
}

struct WorkbookSnapshot {
    sheets: Vec<SheetSnapshot>,
    index: HashMap<String, usize>,
}

impl WorkbookSnapshot {
    fn load(store: &NormalizedStore) -> MicroDbResult<Self> {
        let mut sheets = Vec::new();
        let mut index = HashMap::new();

        for sheet in store.sheets()? {
            let id = sheet.sheet_id;
            let cells = store.cell_records(id)?;
            let values = cells
                .iter()
                .filter(|c| !c.is_formula)
                .filter_map(|c| {
                    let cell = address_to_row_col(&c.address).ok()?;
                    c.value.clone().map(|v| (cell, v))
                })
                .collect();

            index.insert(sheet.name.clone(), sheets.len());
            sheets.push(SheetSnapshot {
                formulas: store.formula_records(id)?,
                styles: store.style_records(id)?,
                merges: store.merged_ranges(id)?,
                charts: store.charts(id)?,
                sheet,
                cells,
                values,
            });
        }

        Ok(Self { sheets, index })
    }
}

impl CellLookup for WorkbookSnapshot {
    fn has_sheet(&self, sheet: &str) -> bool {
        self.index.contains_key(sheet)
    }

    fn cell_text(&self, sheet: &str, row: u32, col: u32) -> Option<String> {
        let snapshot = self.sheets.get(*self.index.get(sheet)?)?;
        snapshot.values.get(&(row, col)).map(|v| v.to_string())
    }
}

//==============================================================================
// Reconstructor
//==============================================================================

/// Rebuilds a workbook from everything held in a [`NormalizedStore`].
pub struct Reconstructor<'a> {
    store: &'a NormalizedStore,
    options: ReconstructOptions,
    dispatch: Option<Dispatch>,
}

impl<'a> Reconstructor<'a> {
    pub fn new(store: &'a NormalizedStore) -> Self {
        Self {
            store,
            options: ReconstructOptions::default(),
            dispatch: None,
        }
    }

    pub fn with_options(mut self, options: ReconstructOptions) -> Self {
        self.options = options;
        self
    }

    /// Send this reconstruction's log events to `dispatch` instead of the
    /// global subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn reconstruct<P: AsRef<Path>>(&self, output: P) -> MicroDbResult<ReconstructSummary> {
        self.reconstruct_with_progress(output, progress::silent)
    }

    pub fn reconstruct_with_progress<P: AsRef<Path>, F: FnMut(u8, &str)>(
        &self,
        output: P,
        progress: F,
    ) -> MicroDbResult<ReconstructSummary> {
        let output = output.as_ref();
        match &self.dispatch {
            Some(dispatch) => {
                tracing::dispatcher::with_default(dispatch, || self.run(output, progress))
            }
            None => self.run(output, progress),
        }
    }

    fn run<F: FnMut(u8, &str)>(&self, output: &Path, progress: F) -> MicroDbResult<ReconstructSummary> {
        let span = info_span!("reconstruct", path = %output.display());
        let _enter = span.enter();

        let snapshot = WorkbookSnapshot::load(self.store)?;
        let mut tracker = ProgressTracker::new(progress, self.options.progress_interval);
        for sheet in &snapshot.sheets {
            tracker.expect(sheet.cells.len());
        }

        let mut workbook = Workbook::new();
        let mut summary = ReconstructSummary::default();

        for sheet in &snapshot.sheets {
            tracker.report(&format!("Writing sheet '{}'", sheet.sheet.name));
            let mut worksheet = Worksheet::new();
            worksheet.set_name(&sheet.sheet.name).map_err(|e| {
                MicroDbError::ReconstructionWrite(format!(
                    "Failed to set worksheet name '{}': {}",
                    sheet.sheet.name, e
                ))
            })?;

            self.write_sheet(&mut worksheet, sheet, &snapshot, &mut tracker, &mut summary);
            workbook.push_worksheet(worksheet);
            summary.sheets += 1;
        }

        workbook.save(output).map_err(|e| {
            MicroDbError::ReconstructionWrite(format!("Failed to save {}: {}", output.display(), e))
        })?;

        tracker.finish("Reconstruction complete");
        info!(
            sheets = summary.sheets,
            cells = summary.cells,
            formulas = summary.formulas,
            charts = summary.charts,
            "Reconstruction complete"
        );
        Ok(summary)
    }

    fn write_sheet<F: FnMut(u8, &str)>(
        &self,
        worksheet: &mut Worksheet,
        sheet: &SheetSnapshot,
        snapshot: &WorkbookSnapshot,
        tracker: &mut ProgressTracker<F>,
        summary: &mut ReconstructSummary,
    ) {
        let name = sheet.sheet.name.as_str();
        let formats = FormatLookup::build(name, &sheet.styles, summary);
        let default_format = Format::new();

        // Merges
        for merge in &sheet.merges {
            match write_merge(worksheet, merge, &formats) {
                Ok(()) => summary.merges += 1,
                Err(e) => {
                    warn!(sheet = %name, range = %merge.range_address, "Skipping merge: {}", e);
                    summary.skipped_merges += 1;
                }
            }
        }

        // Values and formulas
        let formula_texts: HashMap<&str, &str> = sheet
            .formulas
            .iter()
            .map(|f| (f.address.as_str(), f.formula.as_str()))
            .collect();
        let mut written: HashSet<(u32, u32)> = HashSet::new();

        for record in &sheet.cells {
            tracker.tick(&format!("Writing sheet '{name}'"));
            let (row, col) = match address_to_row_col(&record.address) {
                Ok(cell) => cell,
                Err(e) => {
                    warn!(sheet = %name, address = %record.address, "Skipping cell: {}", e);
                    summary.skipped_cells += 1;
                    continue;
                }
            };
            let format = formats.format_at(row, col).unwrap_or(&default_format);

            let formula = if record.is_formula {
                formula_texts
                    .get(record.address.as_str())
                    .copied()
                    .or_else(|| record.value.as_ref().and_then(CellValue::as_text))
            } else {
                None
            };

            let result = match (formula, &record.value) {
                (Some(formula), _) => write_formula(worksheet, row, col, formula, format),
                (None, Some(value)) => write_value(worksheet, row, col, value, format),
                (None, None) => continue,
            };
            match result {
                Ok(()) => {
                    written.insert((row, col));
                    if formula.is_some() {
                        summary.formulas += 1;
                    } else {
                        summary.cells += 1;
                    }
                }
                Err(e) => {
                    warn!(sheet = %name, address = %record.address, "Skipping cell: {}", e);
                    summary.skipped_cells += 1;
                }
            }
        }

        // Formula records without a matching cell record
        for record in &sheet.formulas {
            let Ok((row, col)) = address_to_row_col(&record.address) else {
                continue;
            };
            if written.contains(&(row, col)) {
                continue;
            }
            let format = formats.format_at(row, col).unwrap_or(&default_format);
            match write_formula(worksheet, row, col, &record.formula, format) {
                Ok(()) => {
                    written.insert((row, col));
                    summary.formulas += 1;
                }
                Err(e) => {
                    warn!(sheet = %name, address = %record.address, "Skipping formula: {}", e);
                    summary.skipped_cells += 1;
                }
            }
        }

        // Styled cells that hold no value
        for (&(row, col), format) in formats.cells() {
            if written.contains(&(row, col)) {
                continue;
            }
            let result = to_col(col).and_then(|c| {
                worksheet
                    .write_blank(row, c, format)
                    .map(|_| ())
                    .map_err(|e| MicroDbError::StyleTranslation(format!("write_blank failed: {e}")))
            });
            match result {
                Ok(()) => summary.styled_blanks += 1,
                Err(e) => {
                    warn!(sheet = %name, row, col, "Skipping styled blank: {}", e);
                    summary.skipped_styles += 1;
                }
            }
        }

        // Charts
        for (index, record) in sheet.charts.iter().enumerate() {
            match self.insert_chart(worksheet, name, record, snapshot) {
                Ok(()) => summary.charts += 1,
                Err(e) => {
                    warn!(sheet = %name, chart_index = index, "Skipping chart: {}", e);
                    summary.skipped_charts += 1;
                }
            }
        }

        debug!(sheet = %name, written = written.len(), "Sheet written");
    }

    fn insert_chart(
        &self,
        worksheet: &mut Worksheet,
        sheet: &str,
        record: &ChartRecord,
        snapshot: &WorkbookSnapshot,
    ) -> MicroDbResult<()> {
        let mut chart = build_chart(record, sheet, snapshot)?;
        let placement = placement_for(
            record.position.as_ref(),
            record.size.as_ref(),
            self.options.default_chart_width,
            self.options.default_chart_height,
        );
        chart.set_width(placement.width_px).set_height(placement.height_px);

        worksheet
            .insert_chart_with_offset(
                placement.row,
                to_col(placement.col)?,
                &chart,
                placement.x_offset,
                placement.y_offset,
            )
            .map_err(|e| MicroDbError::ChartTranslation(format!("Failed to insert chart: {e}")))?;
        Ok(())
    }
}

//==============================================================================
// Formats
//==============================================================================

/// `(row, col) → Format` for one sheet, one format object per style key.
struct FormatLookup {
    formats: HashMap<String, Format>,
    cells: BTreeMap<(u32, u32), String>,
}

impl FormatLookup {
    fn build(sheet: &str, styles: &[StyleRecord], summary: &mut ReconstructSummary) -> Self {
        let mut formats: HashMap<String, Format> = HashMap::new();
        let mut failed: HashSet<&str> = HashSet::new();
        let mut cells: BTreeMap<(u32, u32), String> = BTreeMap::new();

        for record in styles {
            let key = record.style_key.as_str();
            if failed.contains(key) {
                summary.skipped_styles += 1;
                continue;
            }
            if !formats.contains_key(key) {
                match build_format(&record.attributes) {
                    Ok(format) => {
                        formats.insert(key.to_string(), format);
                    }
                    Err(e) => {
                        warn!(sheet = %sheet, style_key = %key, "Skipping style: {}", e);
                        failed.insert(key);
                        summary.skipped_styles += 1;
                        continue;
                    }
                }
            }

            let bounds = match range_to_bounds(&record.range_address) {
                Ok(bounds) => bounds,
                Err(e) => {
                    warn!(sheet = %sheet, range = %record.range_address, "Skipping style range: {}", e);
                    summary.skipped_styles += 1;
                    continue;
                }
            };
            for row in bounds.first_row..=bounds.last_row {
                for col in bounds.first_col..=bounds.last_col {
                    // First assignment wins
                    cells.entry((row, col)).or_insert_with(|| key.to_string());
                }
            }
        }

        summary.formats += formats.len();
        Self { formats, cells }
    }

    fn format_at(&self, row: u32, col: u32) -> Option<&Format> {
        self.cells.get(&(row, col)).and_then(|key| self.formats.get(key))
    }

    fn cells(&self) -> impl Iterator<Item = (&(u32, u32), &Format)> {
        self.cells
            .iter()
            .filter_map(|(cell, key)| self.formats.get(key).map(|format| (cell, format)))
    }
}

//==============================================================================
// Writers
//==============================================================================

fn to_col(col: u32) -> MicroDbResult<u16> {
    u16::try_from(col)
        .map_err(|_| MicroDbError::ReconstructionWrite(format!("Column {col} out of range")))
}

fn write_merge(worksheet: &mut Worksheet, merge: &MergedRange, formats: &FormatLookup) -> MicroDbResult<()> {
    let bounds = range_to_bounds(&merge.range_address)?;
    if bounds.is_single_cell() {
        return Err(MicroDbError::ReconstructionWrite(
            "single-cell merge".to_string(),
        ));
    }
    let default_format = Format::new();
    let format = formats
        .format_at(bounds.first_row, bounds.first_col)
        .unwrap_or(&default_format);
    worksheet
        .merge_range(
            bounds.first_row,
            to_col(bounds.first_col)?,
            bounds.last_row,
            to_col(bounds.last_col)?,
            "",
            format,
        )
        .map_err(|e| MicroDbError::ReconstructionWrite(format!("merge_range failed: {e}")))?;
    Ok(())
}

fn write_formula(worksheet: &mut Worksheet, row: u32, col: u32, formula: &str, format: &Format) -> MicroDbResult<()> {
    // The writer takes the formula body without the leading marker
    let body = formula.strip_prefix('=').unwrap_or(formula);
    worksheet
        .write_formula_with_format(row, to_col(col)?, Formula::new(body), format)
        .map_err(|e| MicroDbError::ReconstructionWrite(format!("write_formula failed: {e}")))?;
    Ok(())
}

/// Error values have no writer equivalent and are written as their text.
fn write_value(worksheet: &mut Worksheet, row: u32, col: u32, value: &CellValue, format: &Format) -> MicroDbResult<()> {
    let col = to_col(col)?;
    let result = match value {
        CellValue::Number(n) => worksheet.write_number_with_format(row, col, *n, format),
        CellValue::Text(s) | CellValue::Error(s) => worksheet.write_string_with_format(row, col, s, format),
        CellValue::Bool(b) => worksheet.write_boolean_with_format(row, col, *b, format),
    };
    result
        .map(|_| ())
        .map_err(|e| MicroDbError::ReconstructionWrite(format!("write failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::styles::{FillAttributes, StyleAttributes};

    fn style(range: &str, key: &str, pattern: &str) -> StyleRecord {
        StyleRecord {
            range_address: range.to_string(),
            style_key: key.to_string(),
            attributes: StyleAttributes {
                fill: Some(FillAttributes {
                    pattern: pattern.to_string(),
                    fg_color: Some("FF0000".to_string()),
                    bg_color: None,
                }),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_format_lookup_first_assignment_wins() {
        let mut summary = ReconstructSummary::default();
        let styles = vec![
            style("A1:B2", "aaaa", "solid"),
            style("B2", "bbbb", "gray125"),
        ];
        let lookup = FormatLookup::build("Sheet1", &styles, &mut summary);

        assert_eq!(summary.formats, 2);
        assert_eq!(lookup.cells.get(&(1, 1)).map(String::as_str), Some("aaaa"));
        assert_eq!(lookup.cells().count(), 4);
        assert!(lookup.format_at(5, 5).is_none());
    }

    #[test]
    fn test_format_lookup_skips_bad_styles() {
        let mut summary = ReconstructSummary::default();
        let styles = vec![
            style("A1", "bad", "plaid"),
            style("A2", "bad", "plaid"),
            style("not-a-cell", "good", "solid"),
        ];
        let lookup = FormatLookup::build("Sheet1", &styles, &mut summary);

        assert_eq!(summary.skipped_styles, 3);
        assert_eq!(lookup.cells().count(), 0);
    }

    #[test]
    fn test_reconstruct_unwritable_destination_is_fatal() {
        let store = NormalizedStore::open_in_memory().unwrap();
        let err = Reconstructor::new(&store)
            .reconstruct("/definitely/not/a/dir/out.xlsx")
            .unwrap_err();
        assert!(matches!(err, MicroDbError::ReconstructionWrite(_)));
    }
}
