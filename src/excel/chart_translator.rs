//! Stored chart records → `rust_xlsxwriter::Chart`

use crate::error::{MicroDbError, MicroDbResult};
use crate::excel::coordinates::SheetReference;
use crate::types::{ChartGrouping, ChartKind, ChartRecord, ChartText, LegendPosition};
use rust_xlsxwriter::{Chart, ChartLegendPosition, ChartType};
use tracing::warn;

/// Read access to the workbook being rebuilt, used to validate series
/// references and to dereference single-cell titles.
pub trait CellLookup {
    fn has_sheet(&self, sheet: &str) -> bool;

    /// Display text of a stored cell, `None` when the cell is empty
    fn cell_text(&self, sheet: &str, row: u32, col: u32) -> Option<String>;
}

/// A range reference resolved against the owning sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedRange {
    sheet: String,
    first_row: u32,
    first_col: u16,
    last_row: u32,
    last_col: u16,
}

impl ResolvedRange {
    fn as_tuple(&self) -> (&str, u32, u16, u32, u16) {
        (
            self.sheet.as_str(),
            self.first_row,
            self.first_col,
            self.last_row,
            self.last_col,
        )
    }
}

fn resolve_reference(
    reference: &str,
    current_sheet: &str,
    lookup: &dyn CellLookup,
) -> MicroDbResult<ResolvedRange> {
    let parsed = SheetReference::parse(reference)?;
    let sheet = parsed.sheet.unwrap_or_else(|| current_sheet.to_string());
    if !lookup.has_sheet(&sheet) {
        return Err(MicroDbError::ChartTranslation(format!(
            "Reference '{reference}' points at unknown sheet '{sheet}'"
        )));
    }

    let column = |col: u32| {
        u16::try_from(col).map_err(|_| {
            MicroDbError::ChartTranslation(format!("Column out of range in '{reference}'"))
        })
    };
    let bounds = parsed.bounds;
    Ok(ResolvedRange {
        sheet,
        first_row: bounds.first_row,
        first_col: column(bounds.first_col)?,
        last_row: bounds.last_row,
        last_col: column(bounds.last_col)?,
    })
}

/// Writer chart type for a stored kind and grouping. Kinds the writer
/// cannot draw become a column chart.
pub fn chart_type_for(kind: &ChartKind, grouping: Option<ChartGrouping>) -> ChartType {
    let stacked = matches!(grouping, Some(ChartGrouping::Stacked));
    let percent = matches!(grouping, Some(ChartGrouping::PercentStacked));

    match kind {
        ChartKind::Bar if percent => ChartType::BarPercentStacked,
        ChartKind::Bar if stacked => ChartType::BarStacked,
        ChartKind::Bar => ChartType::Bar,
        ChartKind::Column if percent => ChartType::ColumnPercentStacked,
        ChartKind::Column if stacked => ChartType::ColumnStacked,
        ChartKind::Column => ChartType::Column,
        ChartKind::Line if percent => ChartType::LinePercentStacked,
        ChartKind::Line if stacked => ChartType::LineStacked,
        ChartKind::Line => ChartType::Line,
        ChartKind::Area if percent => ChartType::AreaPercentStacked,
        ChartKind::Area if stacked => ChartType::AreaStacked,
        ChartKind::Area => ChartType::Area,
        ChartKind::Pie | ChartKind::Pie3D => ChartType::Pie,
        ChartKind::Doughnut => ChartType::Doughnut,
        ChartKind::Scatter => ChartType::Scatter,
        ChartKind::Radar => ChartType::Radar,
        ChartKind::Stock => ChartType::Stock,
        ChartKind::Bubble | ChartKind::Surface | ChartKind::Other(_) => {
            warn!(kind = ?kind, "Unsupported chart type, falling back to column");
            ChartType::Column
        }
    }
}

pub fn legend_position_for(position: LegendPosition) -> ChartLegendPosition {
    match position {
        LegendPosition::Right => ChartLegendPosition::Right,
        LegendPosition::Left => ChartLegendPosition::Left,
        LegendPosition::Top => ChartLegendPosition::Top,
        LegendPosition::Bottom => ChartLegendPosition::Bottom,
        LegendPosition::TopRight => ChartLegendPosition::TopRight,
    }
}

/// Build a writer chart without size or placement.
///
/// A series whose values cannot be resolved is dropped with a warning; a
/// chart left without any series is an error.
pub fn build_chart(record: &ChartRecord, sheet: &str, lookup: &dyn CellLookup) -> MicroDbResult<Chart> {
    let mut chart = Chart::new(chart_type_for(&record.kind, record.grouping));

    let mut series_count = 0;
    for (index, series) in record.series.iter().enumerate() {
        let Some(values) = series.values.as_deref() else {
            warn!(sheet = %sheet, series = index, "Series has no values reference, skipping");
            continue;
        };
        let values = match resolve_reference(values, sheet, lookup) {
            Ok(range) => range,
            Err(e) => {
                warn!(sheet = %sheet, series = index, "Skipping series: {}", e);
                continue;
            }
        };
        let categories = match series.categories.as_deref() {
            Some(reference) => match resolve_reference(reference, sheet, lookup) {
                Ok(range) => Some(range),
                Err(e) => {
                    warn!(sheet = %sheet, series = index, "Dropping series categories: {}", e);
                    None
                }
            },
            None => None,
        };

        let chart_series = chart.add_series().set_values(values.as_tuple());
        if let Some(categories) = &categories {
            chart_series.set_categories(categories.as_tuple());
        }
        match &series.name {
            Some(ChartText::Literal(name)) => {
                chart_series.set_name(name.as_str());
            }
            Some(ChartText::Reference(reference)) => match resolve_reference(reference, sheet, lookup) {
                Ok(range) => {
                    chart_series.set_name(range.as_tuple());
                }
                Err(e) => warn!(sheet = %sheet, series = index, "Dropping series name: {}", e),
            },
            None => {}
        }
        series_count += 1;
    }

    if series_count == 0 {
        return Err(MicroDbError::ChartTranslation(
            "Chart has no usable series".to_string(),
        ));
    }

    if let Some(title) = resolve_title(record.title.as_ref(), sheet, lookup) {
        match title {
            ResolvedTitle::Text(text) => {
                chart.title().set_name(text.as_str());
            }
            ResolvedTitle::Range(range) => {
                chart.title().set_name(range.as_tuple());
            }
        }
    }

    match &record.legend {
        Some(legend) => {
            if let Some(position) = legend.position {
                chart.legend().set_position(legend_position_for(position));
            }
        }
        None => {
            chart.legend().set_hidden();
        }
    }

    Ok(chart)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResolvedTitle {
    Text(String),
    /// Multi-cell references are handed to the writer unresolved
    Range(ResolvedRange),
}

fn resolve_title(title: Option<&ChartText>, sheet: &str, lookup: &dyn CellLookup) -> Option<ResolvedTitle> {
    match title? {
        ChartText::Literal(text) => Some(ResolvedTitle::Text(text.clone())),
        ChartText::Reference(reference) => {
            let range = match resolve_reference(reference, sheet, lookup) {
                Ok(range) => range,
                Err(e) => {
                    warn!(sheet = %sheet, "Dropping chart title: {}", e);
                    return None;
                }
            };
            if range.first_row == range.last_row && range.first_col == range.last_col {
                match lookup.cell_text(&range.sheet, range.first_row, range.first_col as u32) {
                    Some(text) => Some(ResolvedTitle::Text(text)),
                    // Empty source cell: let the writer keep the link
                    None => Some(ResolvedTitle::Range(range)),
                }
            } else {
                Some(ResolvedTitle::Range(range))
            }
        }
    }
}
