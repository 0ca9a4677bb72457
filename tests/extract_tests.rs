//! Workbook extraction tests
//!
//! Fixtures are written with rust_xlsxwriter into a temp dir, then read back
//! through the extractor.

use excel_micro_db::excel::{ExtractOptions, Extractor};
use excel_micro_db::types::{CellValue, ChartKind, ChartText, ExtractMode, SheetModel};
use excel_micro_db::MicroDbError;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::{Chart, ChartType, Color, Format, Workbook};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

// ═══════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════

/// Data: A1..A5 numbers (A1 red), B2 "Hello", C2 =SUM(A1:A5), D1:E1 merged.
/// Summary: one value and a column chart over Data!A1:A5.
fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("fixture.xlsx");
    let mut workbook = Workbook::new();
    let red = Format::new().set_background_color(Color::Red);

    let data = workbook.add_worksheet();
    data.set_name("Data").unwrap();
    data.write_number_with_format(0, 0, 1.0, &red).unwrap();
    for row in 1..5 {
        data.write_number(row, 0, (row + 1) as f64).unwrap();
    }
    data.write_string(1, 1, "Hello").unwrap();
    data.write_formula(1, 2, "=SUM(A1:A5)").unwrap();
    data.merge_range(0, 3, 0, 4, "Merged", &Format::new()).unwrap();

    let summary = workbook.add_worksheet();
    summary.set_name("Summary").unwrap();
    summary.write_string(0, 0, "Totals").unwrap();
    let mut chart = Chart::new(ChartType::Column);
    chart.add_series().set_values("Data!$A$1:$A$5");
    chart.title().set_name("Sales");
    summary.insert_chart(3, 6, &chart).unwrap();

    workbook.save(&path).unwrap();
    path
}

fn sheet<'a>(sheets: &'a [SheetModel], name: &str) -> &'a SheetModel {
    sheets
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("sheet '{name}' not extracted"))
}

fn value_at(sheet: &SheetModel, address: &str) -> Option<CellValue> {
    sheet
        .cells
        .iter()
        .find(|c| c.address == address)
        .and_then(|c| c.value.clone())
}

// ═══════════════════════════════════════════════════════════════════════════
// CELLS AND FORMULAS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_extract_sheets_in_workbook_order() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());

    let extraction = Extractor::new(&path).extract().unwrap();
    let names: Vec<&str> = extraction.model.sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Data", "Summary"]);
    assert_eq!(extraction.summary.sheets, 2);
}

#[test]
fn test_extract_values_and_formulas() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());

    let extraction = Extractor::new(&path).extract().unwrap();
    let data = sheet(&extraction.model.sheets, "Data");

    assert_eq!(value_at(data, "B2"), Some(CellValue::Text("Hello".to_string())));
    assert_eq!(value_at(data, "A3"), Some(CellValue::Number(3.0)));

    let c2 = data.cells.iter().find(|c| c.address == "C2").unwrap();
    assert!(c2.is_formula);
    assert_eq!(c2.value, Some(CellValue::Text("=SUM(A1:A5)".to_string())));

    assert_eq!(data.formulas.len(), 1);
    assert_eq!(data.formulas[0].address, "C2");
    assert_eq!(data.formulas[0].formula, "=SUM(A1:A5)");
}

#[test]
fn test_cells_are_row_major() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());

    let extraction = Extractor::new(&path).extract().unwrap();
    let data = sheet(&extraction.model.sheets, "Data");
    let addresses: Vec<&str> = data.cells.iter().map(|c| c.address.as_str()).collect();
    assert_eq!(addresses, vec!["A1", "D1", "A2", "B2", "C2", "A3", "A4", "A5"]);
}

#[test]
fn test_values_only_mode_drops_formulas() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());

    let options = ExtractOptions {
        mode: ExtractMode::ValuesOnly,
        ..Default::default()
    };
    let extraction = Extractor::new(&path).with_options(options).extract().unwrap();
    let data = sheet(&extraction.model.sheets, "Data");

    assert_eq!(extraction.model.mode, ExtractMode::ValuesOnly);
    assert!(data.formulas.is_empty());
    assert!(data.cells.iter().all(|c| !c.is_formula));
    assert_eq!(extraction.summary.formulas, 0);
}

#[test]
fn test_used_extent() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());

    let extraction = Extractor::new(&path).extract().unwrap();
    let data = sheet(&extraction.model.sheets, "Data");
    assert_eq!(data.max_row, 5);
    assert_eq!(data.max_col, 5);
}

// ═══════════════════════════════════════════════════════════════════════════
// STYLES AND MERGES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_extract_solid_fill_style() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());

    let extraction = Extractor::new(&path).extract().unwrap();
    let data = sheet(&extraction.model.sheets, "Data");

    let a1 = data
        .styles
        .iter()
        .find(|s| s.range_address == "A1")
        .expect("A1 should carry a style record");
    let fill = a1.attributes.fill.as_ref().expect("A1 should have a fill");
    assert_eq!(fill.pattern, "solid");
    assert_eq!(fill.fg_color.as_deref(), Some("FF0000"));
    assert!(!a1.style_key.is_empty());

    // Unstyled value cells get no style record
    assert!(data.styles.iter().all(|s| s.range_address != "B2"));
}

#[test]
fn test_extract_merged_range() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());

    let extraction = Extractor::new(&path).extract().unwrap();
    let data = sheet(&extraction.model.sheets, "Data");
    let merges: Vec<&str> = data.merges.iter().map(|m| m.range_address.as_str()).collect();
    assert_eq!(merges, vec!["D1:E1"]);
    assert_eq!(value_at(data, "D1"), Some(CellValue::Text("Merged".to_string())));
}

#[test]
fn test_same_style_same_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("same.xlsx");
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet1 = workbook.add_worksheet();
    sheet1.write_string_with_format(0, 0, "a", &bold).unwrap();
    sheet1.write_string_with_format(5, 3, "b", &bold).unwrap();
    workbook.save(&path).unwrap();

    let extraction = Extractor::new(&path).extract().unwrap();
    let styles = &extraction.model.sheets[0].styles;
    assert_eq!(styles.len(), 2);
    assert_eq!(styles[0].style_key, styles[1].style_key);
    assert!(styles[0].attributes.font.as_ref().unwrap().bold);
}

// ═══════════════════════════════════════════════════════════════════════════
// CHARTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_extract_column_chart() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());

    let extraction = Extractor::new(&path).extract().unwrap();
    let summary = sheet(&extraction.model.sheets, "Summary");
    assert_eq!(summary.charts.len(), 1);

    let chart = &summary.charts[0];
    assert_eq!(chart.kind, ChartKind::Column);
    assert_eq!(chart.title, Some(ChartText::Literal("Sales".to_string())));
    assert_eq!(chart.series.len(), 1);
    assert_eq!(chart.series[0].values.as_deref(), Some("Data!$A$1:$A$5"));

    let origin = chart.position.as_ref().unwrap().origin();
    assert_eq!((origin.row, origin.col), (3, 6));
    let size = chart.size.unwrap();
    assert!(size.width > 0 && size.height > 0);

    // The Data sheet has no drawing
    assert!(sheet(&extraction.model.sheets, "Data").charts.is_empty());
}

/// Copy `source` to `target`, swapping the body of one package part.
fn replace_part(source: &Path, target: &Path, part: &str, body: &str) {
    let mut archive = zip::ZipArchive::new(File::open(source).unwrap()).unwrap();
    let mut writer = zip::ZipWriter::new(File::create(target).unwrap());
    for index in 0..archive.len() {
        let entry = archive.by_index(index).unwrap();
        if entry.name() == part {
            let name = entry.name().to_string();
            drop(entry);
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        } else {
            writer.raw_copy_file(entry).unwrap();
        }
    }
    writer.finish().unwrap();
}

#[test]
fn test_corrupt_chart_part_skips_only_that_chart() {
    let dir = TempDir::new().unwrap();
    let intact = dir.path().join("two-charts.xlsx");
    let mut workbook = Workbook::new();
    let data = workbook.add_worksheet();
    data.set_name("Data").unwrap();
    for row in 0..5 {
        data.write_number(row, 0, (row + 1) as f64).unwrap();
    }
    let mut good = Chart::new(ChartType::Column);
    good.add_series().set_values("Data!$A$1:$A$5");
    data.insert_chart(1, 3, &good).unwrap();
    let mut broken = Chart::new(ChartType::Line);
    broken.add_series().set_values("Data!$A$1:$A$5");
    data.insert_chart(20, 3, &broken).unwrap();
    workbook.save(&intact).unwrap();

    let path = dir.path().join("one-corrupt.xlsx");
    replace_part(
        &intact,
        &path,
        "xl/charts/chart2.xml",
        r#"<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart"><c:chart/></c:chartSpace>"#,
    );

    let extraction = Extractor::new(&path).extract().unwrap();
    assert_eq!(extraction.summary.skipped_charts, 1);
    assert_eq!(extraction.summary.cells, 5);

    let charts = &sheet(&extraction.model.sheets, "Data").charts;
    assert_eq!(charts.len(), 1);
    assert_eq!(charts[0].kind, ChartKind::Column);
    assert_eq!(charts[0].position.as_ref().unwrap().origin().row, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// PROGRESS AND FAILURES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_progress_is_monotonic_and_completes() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path());

    let mut seen: Vec<u8> = Vec::new();
    let options = ExtractOptions {
        progress_interval: 1,
        ..Default::default()
    };
    Extractor::new(&path)
        .with_options(options)
        .extract_with_progress(|percent, _message| seen.push(percent))
        .unwrap();

    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last(), Some(&100));
    assert_eq!(seen.iter().filter(|p| **p == 100).count(), 1);
}

#[test]
fn test_missing_workbook_is_source_error() {
    let dir = TempDir::new().unwrap();
    let result = Extractor::new(dir.path().join("missing.xlsx")).extract();
    assert!(matches!(result, Err(MicroDbError::Source(_))));
}

#[test]
fn test_non_workbook_is_source_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not-a-workbook.xlsx");
    std::fs::write(&path, "plain text, not a zip").unwrap();

    let result = Extractor::new(&path).extract();
    assert!(matches!(result, Err(MicroDbError::Source(_))));
}
