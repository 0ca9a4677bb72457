//! Project and normalized store tests against an on-disk database

use excel_micro_db::project::{META_EXTRACT_MODE, META_SOURCE_PATH};
use excel_micro_db::types::{CellValue, ExtractMode};
use excel_micro_db::excel::ExtractOptions;
use excel_micro_db::{MicroDbError, Project};
use pretty_assertions::assert_eq;
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_workbook(dir: &Path, name: &str, sheets: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut workbook = Workbook::new();
    for (index, sheet_name) in sheets.iter().enumerate() {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*sheet_name).unwrap();
        sheet.write_number(0, 0, index as f64 + 1.0).unwrap();
        sheet.write_string(1, 1, *sheet_name).unwrap();
    }
    workbook.save(&path).unwrap();
    path
}

// ═══════════════════════════════════════════════════════════════════════════
// PERSISTENCE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_project_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let source = write_workbook(dir.path(), "book.xlsx", &["Inputs", "Outputs"]);
    let db = dir.path().join("project.db");

    {
        let mut project = Project::open(&db).unwrap();
        project.extract(&source).unwrap();
    }

    let project = Project::open(&db).unwrap();
    assert_eq!(project.get_sheet_names().unwrap(), vec!["Inputs", "Outputs"]);

    let cells = project.get_cells("Outputs").unwrap();
    assert_eq!(cells[0].address, "A1");
    assert_eq!(cells[0].value, Some(CellValue::Number(2.0)));

    let metadata = project.metadata().unwrap();
    let lookup = |key: &str| {
        metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(lookup(META_EXTRACT_MODE).as_deref(), Some("formulas"));
    assert!(lookup(META_SOURCE_PATH).unwrap().ends_with("book.xlsx"));
}

#[test]
fn test_reimport_replaces_sheet_contents() {
    let dir = TempDir::new().unwrap();
    let first = write_workbook(dir.path(), "first.xlsx", &["Sheet1"]);

    let mut project = Project::in_memory().unwrap();
    project.extract(&first).unwrap();
    assert!(project.update_cell("Sheet1", "Z9", Some(CellValue::Number(9.0))).unwrap());
    let id_before = project.sheets().unwrap()[0].sheet_id;

    project.extract(&first).unwrap();
    let sheets = project.sheets().unwrap();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].sheet_id, id_before);
    assert!(project
        .get_cells("Sheet1")
        .unwrap()
        .iter()
        .all(|c| c.address != "Z9"));
}

#[test]
fn test_values_only_import_records_mode() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("formula.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_number(0, 0, 2.0).unwrap();
    sheet.write_formula(0, 1, "=A1*3").unwrap();
    workbook.save(&path).unwrap();

    let mut project = Project::in_memory().unwrap();
    let options = ExtractOptions {
        mode: ExtractMode::ValuesOnly,
        ..Default::default()
    };
    project
        .extract_with(&path, options, excel_micro_db::progress::silent)
        .unwrap();

    assert!(project.get_formulas("Sheet1").unwrap().is_empty());
    let metadata = project.metadata().unwrap();
    assert!(metadata
        .iter()
        .any(|(k, v)| k == META_EXTRACT_MODE && v == "values_only"));
}

// ═══════════════════════════════════════════════════════════════════════════
// EDITING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_update_cell_scenario() {
    let dir = TempDir::new().unwrap();
    let source = write_workbook(dir.path(), "book.xlsx", &["Sheet1"]);

    let mut project = Project::in_memory().unwrap();
    project.extract(&source).unwrap();

    assert!(project.update_cell("Sheet1", "b2", Some(CellValue::Number(42.0))).unwrap());
    let cells = project.get_cells("Sheet1").unwrap();
    let b2 = cells.iter().find(|c| c.address == "B2").unwrap();
    assert_eq!(b2.value, Some(CellValue::Number(42.0)));
    assert!(!b2.is_formula);

    let history = project.edit_history("Sheet1").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].address, "B2");
    assert_eq!(history[0].old_value.as_deref(), Some("Sheet1"));
    assert_eq!(history[0].new_value.as_deref(), Some("42"));
}

#[test]
fn test_formula_edit_then_clear() {
    let mut project = Project::in_memory().unwrap();
    project.create_sheet("Calc").unwrap();

    let formula = Some(CellValue::Text("=A1+1".to_string()));
    assert!(project.update_cell("Calc", "C3", formula).unwrap());
    let formulas = project.get_formulas("Calc").unwrap();
    assert_eq!(formulas.len(), 1);
    assert_eq!(formulas[0].formula, "=A1+1");

    let sheet = &project.sheets().unwrap()[0];
    assert_eq!((sheet.max_row, sheet.max_col), (3, 3));

    assert!(project.update_cell("Calc", "C3", None).unwrap());
    assert!(project.get_formulas("Calc").unwrap().is_empty());
    assert!(project.get_cells("Calc").unwrap().is_empty());
}

#[test]
fn test_bad_address_is_an_error() {
    let mut project = Project::in_memory().unwrap();
    project.create_sheet("Calc").unwrap();
    let result = project.update_cell("Calc", "not-an-address", Some(CellValue::Number(1.0)));
    assert!(matches!(result, Err(MicroDbError::Address(_))));
}

#[test]
fn test_rename_keeps_identity_and_rejects_conflicts() {
    let mut project = Project::in_memory().unwrap();
    let inputs = project.create_sheet("Inputs").unwrap();
    project.create_sheet("Outputs").unwrap();
    assert!(project.update_cell("Inputs", "A1", Some(CellValue::Bool(true))).unwrap());

    assert!(!project.rename_sheet("Inputs", "Outputs").unwrap());
    assert!(!project.rename_sheet("Missing", "Other").unwrap());
    assert!(project.rename_sheet("Inputs", "Assumptions").unwrap());

    let sheets = project.sheets().unwrap();
    assert_eq!(sheets[0].name, "Assumptions");
    assert_eq!(sheets[0].sheet_id, inputs);
    assert_eq!(
        project.get_cells("Assumptions").unwrap()[0].value,
        Some(CellValue::Bool(true))
    );
    assert!(matches!(
        project.get_cells("Inputs"),
        Err(MicroDbError::SheetNotFound(_))
    ));
}

#[test]
fn test_create_duplicate_sheet_fails() {
    let mut project = Project::in_memory().unwrap();
    project.create_sheet("Inputs").unwrap();
    assert!(matches!(
        project.create_sheet("Inputs"),
        Err(MicroDbError::SheetExists(_))
    ));
}

#[test]
fn test_styles_persist_with_attributes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("styled.xlsx");
    let mut workbook = Workbook::new();
    let italic = Format::new().set_italic().set_num_format("0.00%");
    let sheet = workbook.add_worksheet();
    sheet.write_number_with_format(0, 0, 0.25, &italic).unwrap();
    workbook.save(&path).unwrap();

    let mut project = Project::in_memory().unwrap();
    project.extract(&path).unwrap();

    let styles = project.get_styles("Sheet1").unwrap();
    assert_eq!(styles.len(), 1);
    assert_eq!(styles[0].range_address, "A1");
    assert!(styles[0].attributes.font.as_ref().unwrap().italic);
    assert_eq!(styles[0].attributes.number_format.as_deref(), Some("0.00%"));
}
