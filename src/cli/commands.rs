use crate::excel::{ExtractOptions, ExtractSummary, ReconstructOptions, ReconstructSummary};
use crate::project::Project;
use crate::types::{CellValue, ChartText, ExtractMode};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

fn open_project(db: &Path) -> Result<Project> {
    Project::open(db).with_context(|| format!("Failed to open project database {}", db.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Execute the import command
pub fn import(
    db: &Path,
    input: PathBuf,
    values_only: bool,
    coalesce_styles: bool,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let options = ExtractOptions {
        mode: if values_only {
            ExtractMode::ValuesOnly
        } else {
            ExtractMode::Formulas
        },
        coalesce_styles,
        ..Default::default()
    };

    if !json {
        println!("{}", "🔥 emdb - Workbook Import".bold().green());
        println!("   Input:    {}", input.display());
        println!("   Database: {}", db.display());
        println!("   Mode:     {}\n", options.mode.as_str());
    }

    let mut project = open_project(db)?;
    let summary = project
        .extract_with(&input, options, |percent, message| {
            if verbose && !json {
                println!("   [{percent:>3}%] {message}");
            }
        })
        .with_context(|| format!("Import of {} failed", input.display()))?;

    if json {
        return print_json(&summary);
    }
    print_extract_summary(&summary);
    println!("{}", "✅ Import Complete!".bold().green());
    Ok(())
}

fn print_extract_summary(summary: &ExtractSummary) {
    println!("   📄 Sheets:   {}", summary.sheets);
    println!("   🔢 Cells:    {}", summary.cells);
    println!("   🧮 Formulas: {}", summary.formulas);
    println!("   🎨 Styles:   {}", summary.styles);
    println!("   🔗 Merges:   {}", summary.merges);
    println!("   📊 Charts:   {}", summary.charts);
    let skipped = summary.skipped_cells + summary.skipped_styles + summary.skipped_charts;
    if skipped > 0 {
        println!(
            "{}",
            format!(
                "   ⚠️  Skipped {} cells, {} styles, {} charts (see log)",
                summary.skipped_cells, summary.skipped_styles, summary.skipped_charts
            )
            .yellow()
        );
    }
    println!();
}

/// Execute the export command
pub fn export(db: &Path, output: PathBuf, json: bool, verbose: bool) -> Result<()> {
    if !json {
        println!("{}", "🔥 emdb - Workbook Export".bold().green());
        println!("   Database: {}", db.display());
        println!("   Output:   {}\n", output.display());
    }

    let project = open_project(db)?;
    let summary = project
        .reconstruct_with(&output, ReconstructOptions::default(), |percent, message| {
            if verbose && !json {
                println!("   [{percent:>3}%] {message}");
            }
        })
        .with_context(|| format!("Export to {} failed", output.display()))?;

    if json {
        return print_json(&summary);
    }
    print_reconstruct_summary(&summary);
    println!("{}", "✅ Export Complete!".bold().green());
    Ok(())
}

fn print_reconstruct_summary(summary: &ReconstructSummary) {
    println!("   📄 Sheets:   {}", summary.sheets);
    println!("   🔢 Cells:    {}", summary.cells);
    println!("   🧮 Formulas: {}", summary.formulas);
    println!("   🎨 Formats:  {} ({} styled blanks)", summary.formats, summary.styled_blanks);
    println!("   🔗 Merges:   {}", summary.merges);
    println!("   📊 Charts:   {}", summary.charts);
    let skipped = summary.skipped_cells
        + summary.skipped_styles
        + summary.skipped_merges
        + summary.skipped_charts;
    if skipped > 0 {
        println!(
            "{}",
            format!(
                "   ⚠️  Skipped {} cells, {} styles, {} merges, {} charts (see log)",
                summary.skipped_cells,
                summary.skipped_styles,
                summary.skipped_merges,
                summary.skipped_charts
            )
            .yellow()
        );
    }
    println!();
}

/// List sheets in workbook order
pub fn sheets(db: &Path, json: bool) -> Result<()> {
    let project = open_project(db)?;
    let sheets = project.sheets()?;
    if json {
        return print_json(&sheets);
    }

    if sheets.is_empty() {
        println!("{}", "⚠️  No sheets in project".yellow());
        return Ok(());
    }
    println!("{}", "📄 Sheets:".bold().cyan());
    for sheet in &sheets {
        println!(
            "   {} {}  ({} rows x {} cols)",
            format!("#{}", sheet.sheet_id).dimmed(),
            sheet.name.bright_blue(),
            sheet.max_row,
            sheet.max_col
        );
    }
    Ok(())
}

/// Print every stored cell of a sheet
pub fn cells(db: &Path, sheet: &str, json: bool) -> Result<()> {
    let project = open_project(db)?;
    let cells = project.get_cells(sheet)?;
    if json {
        return print_json(&cells);
    }

    println!("{}", format!("🔢 Cells of '{sheet}':").bold().cyan());
    for cell in &cells {
        let value = cell
            .value
            .as_ref()
            .map(CellValue::to_string)
            .unwrap_or_default();
        if cell.is_formula {
            println!("   {:<8} {}", cell.address.bold(), value.yellow());
        } else {
            println!("   {:<8} {}", cell.address.bold(), value);
        }
    }
    println!("   {} cells", cells.len());
    Ok(())
}

/// Print style assignments of a sheet
pub fn styles(db: &Path, sheet: &str, json: bool) -> Result<()> {
    let project = open_project(db)?;
    let styles = project.get_styles(sheet)?;
    if json {
        return print_json(&styles);
    }

    println!("{}", format!("🎨 Styles of '{sheet}':").bold().cyan());
    for style in &styles {
        println!(
            "   {:<12} {}  {}",
            style.range_address.bold(),
            style.style_key.dimmed(),
            style.attributes.to_canonical_json()?
        );
    }
    println!("   {} style records", styles.len());
    Ok(())
}

/// Print charts of a sheet
pub fn charts(db: &Path, sheet: &str, json: bool) -> Result<()> {
    let project = open_project(db)?;
    let charts = project.get_charts(sheet)?;
    if json {
        return print_json(&charts);
    }

    println!("{}", format!("📊 Charts of '{sheet}':").bold().cyan());
    for (index, chart) in charts.iter().enumerate() {
        let title = match &chart.title {
            Some(ChartText::Literal(text)) => text.clone(),
            Some(ChartText::Reference(reference)) => format!("={reference}"),
            None => "(untitled)".to_string(),
        };
        println!("   {}. {:?} {}", index + 1, chart.kind, title.bright_blue());
        if let Some(position) = &chart.position {
            let origin = position.origin();
            println!("      at row {}, col {}", origin.row + 1, origin.col + 1);
        }
        if let Some(size) = &chart.size {
            println!(
                "      {} x {} EMU{}",
                size.width,
                size.height,
                if size.estimated { " (estimated)" } else { "" }
            );
        }
        for series in &chart.series {
            println!(
                "      series: {}",
                series.values.as_deref().unwrap_or("(no values)")
            );
        }
    }
    println!("   {} charts", charts.len());
    Ok(())
}

/// Set or clear one cell. An empty value clears it.
pub fn set_cell(db: &Path, sheet: &str, address: &str, value: &str) -> Result<()> {
    let mut project = open_project(db)?;
    let parsed = CellValue::from_user_input(value);
    if !project.update_cell(sheet, address, parsed.clone())? {
        bail!("Sheet '{}' not found", sheet);
    }

    match parsed {
        Some(value) => println!("{} {}!{} = {}", "✅".green(), sheet, address.to_uppercase(), value),
        None => println!("{} {}!{} cleared", "✅".green(), sheet, address.to_uppercase()),
    }
    Ok(())
}

pub fn rename_sheet(db: &Path, old: &str, new: &str) -> Result<()> {
    let mut project = open_project(db)?;
    if !project.rename_sheet(old, new)? {
        bail!("Cannot rename '{}' to '{}': source missing or target exists", old, new);
    }
    println!("{} Renamed '{}' → '{}'", "✅".green(), old, new.bright_blue());
    Ok(())
}

/// Print the cell edit log of a sheet
pub fn history(db: &Path, sheet: &str, json: bool) -> Result<()> {
    let project = open_project(db)?;
    let edits = project.edit_history(sheet)?;
    if json {
        return print_json(&edits);
    }

    println!("{}", format!("🕘 Edit history of '{sheet}':").bold().cyan());
    for edit in &edits {
        println!(
            "   {}  {:<8} {} → {}",
            edit.edited_at.dimmed(),
            edit.address.bold(),
            edit.old_value.as_deref().unwrap_or("(empty)"),
            edit.new_value.as_deref().unwrap_or("(empty)")
        );
    }
    println!("   {} edits", edits.len());
    Ok(())
}
