//! Project facade: the operations an editor or the CLI calls
//!
//! A project is one normalized store. Importing a workbook fills it,
//! single-cell edits mutate it, and reconstruction writes a new workbook
//! from whatever it currently holds.

use crate::error::MicroDbResult;
use crate::excel::{ExtractOptions, ExtractSummary, Extractor, ReconstructOptions, ReconstructSummary, Reconstructor};
use crate::progress;
use crate::store::NormalizedStore;
use crate::types::{
    CellEdit, CellRecord, CellValue, ChartRecord, FormulaRecord, MergedRange, Sheet, SheetId,
    StyleRecord,
};
use chrono::Utc;
use std::path::Path;
use tracing::{info, Dispatch};

pub const META_SOURCE_PATH: &str = "source_path";
pub const META_EXTRACT_MODE: &str = "extract_mode";
pub const META_IMPORTED_AT: &str = "imported_at";

pub struct Project {
    store: NormalizedStore,
    dispatch: Option<Dispatch>,
}

impl Project {
    /// Open (or create) a project database on disk
    pub fn open<P: AsRef<Path>>(path: P) -> MicroDbResult<Self> {
        Ok(Self {
            store: NormalizedStore::open_path(path)?,
            dispatch: None,
        })
    }

    pub fn in_memory() -> MicroDbResult<Self> {
        Ok(Self {
            store: NormalizedStore::open_in_memory()?,
            dispatch: None,
        })
    }

    /// Route import and export logging to `dispatch`
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn store(&self) -> &NormalizedStore {
        &self.store
    }

    //==========================================================================
    // Import / export
    //==========================================================================

    pub fn extract<P: AsRef<Path>>(&mut self, path: P) -> MicroDbResult<ExtractSummary> {
        self.extract_with(path, ExtractOptions::default(), progress::silent)
    }

    /// Extract a workbook and store every sheet, keeping workbook order.
    ///
    /// Sheets already in the project are replaced by name; sheets the
    /// workbook does not contain are left untouched.
    pub fn extract_with<P: AsRef<Path>, F: FnMut(u8, &str)>(
        &mut self,
        path: P,
        options: ExtractOptions,
        progress: F,
    ) -> MicroDbResult<ExtractSummary> {
        let path = path.as_ref();
        let mode = options.mode;
        let mut extractor = Extractor::new(path).with_options(options);
        if let Some(dispatch) = &self.dispatch {
            extractor = extractor.with_dispatch(dispatch.clone());
        }
        let extraction = extractor.extract_with_progress(progress)?;

        for (position, sheet) in extraction.model.sheets.iter().enumerate() {
            self.store.import_sheet(sheet, position as i64)?;
        }

        self.store
            .set_metadata(META_SOURCE_PATH, &path.display().to_string())?;
        self.store.set_metadata(META_EXTRACT_MODE, mode.as_str())?;
        self.store
            .set_metadata(META_IMPORTED_AT, &Utc::now().to_rfc3339())?;

        info!(path = %path.display(), sheets = extraction.summary.sheets, "Workbook imported");
        Ok(extraction.summary)
    }

    pub fn reconstruct<P: AsRef<Path>>(&self, output: P) -> MicroDbResult<ReconstructSummary> {
        self.reconstruct_with(output, ReconstructOptions::default(), progress::silent)
    }

    pub fn reconstruct_with<P: AsRef<Path>, F: FnMut(u8, &str)>(
        &self,
        output: P,
        options: ReconstructOptions,
        progress: F,
    ) -> MicroDbResult<ReconstructSummary> {
        let mut reconstructor = Reconstructor::new(&self.store).with_options(options);
        if let Some(dispatch) = &self.dispatch {
            reconstructor = reconstructor.with_dispatch(dispatch.clone());
        }
        reconstructor.reconstruct_with_progress(output, progress)
    }

    //==========================================================================
    // Reading
    //==========================================================================

    pub fn sheets(&self) -> MicroDbResult<Vec<Sheet>> {
        self.store.sheets()
    }

    pub fn get_sheet_names(&self) -> MicroDbResult<Vec<String>> {
        Ok(self.store.sheets()?.into_iter().map(|s| s.name).collect())
    }

    pub fn get_cells(&self, sheet: &str) -> MicroDbResult<Vec<CellRecord>> {
        self.store.cell_records(self.store.sheet_id(sheet)?)
    }

    pub fn get_formulas(&self, sheet: &str) -> MicroDbResult<Vec<FormulaRecord>> {
        self.store.formula_records(self.store.sheet_id(sheet)?)
    }

    pub fn get_styles(&self, sheet: &str) -> MicroDbResult<Vec<StyleRecord>> {
        self.store.style_records(self.store.sheet_id(sheet)?)
    }

    pub fn get_merged_ranges(&self, sheet: &str) -> MicroDbResult<Vec<MergedRange>> {
        self.store.merged_ranges(self.store.sheet_id(sheet)?)
    }

    pub fn get_charts(&self, sheet: &str) -> MicroDbResult<Vec<ChartRecord>> {
        self.store.charts(self.store.sheet_id(sheet)?)
    }

    pub fn edit_history(&self, sheet: &str) -> MicroDbResult<Vec<CellEdit>> {
        self.store.edit_history(self.store.sheet_id(sheet)?)
    }

    /// Import metadata entries, sorted by key
    pub fn metadata(&self) -> MicroDbResult<Vec<(String, String)>> {
        self.store.all_metadata()
    }

    //==========================================================================
    // Editing
    //==========================================================================

    /// Set or clear one cell. Returns false when the sheet does not exist.
    pub fn update_cell(&mut self, sheet: &str, address: &str, value: Option<CellValue>) -> MicroDbResult<bool> {
        let Some(sheet) = self.store.sheet_by_name(sheet)? else {
            return Ok(false);
        };
        self.store.update_cell_value(sheet.sheet_id, address, value)
    }

    pub fn rename_sheet(&mut self, old: &str, new: &str) -> MicroDbResult<bool> {
        self.store.rename_sheet(old, new)
    }

    pub fn create_sheet(&mut self, name: &str) -> MicroDbResult<SheetId> {
        self.store.create_sheet(name)
    }
}
