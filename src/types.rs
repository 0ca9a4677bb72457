use crate::excel::styles::StyleAttributes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Store-assigned sheet identity. Stable across renames.
pub type SheetId = i64;

//==============================================================================
// Sheets
//==============================================================================

/// A worksheet as tracked by the normalized store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub sheet_id: SheetId,
    pub name: String,
    /// Workbook order (0-based)
    pub position: i64,
    /// 1-based extent of the used area, 0 for an empty sheet
    pub max_row: u32,
    pub max_col: u32,
}

//==============================================================================
// Cell Values
//==============================================================================

/// Scalar cell value.
///
/// Dates and times are kept as their serial number; the number format
/// that displays them travels in the cell's style record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    /// Cached error literal such as `#DIV/0!`. Reconstruction writes it
    /// back as text, so it re-extracts as [`CellValue::Text`].
    Error(String),
}

impl CellValue {
    /// Parse free-form user input the way a grid editor would:
    /// numbers, then `TRUE`/`FALSE`, then text.
    pub fn from_user_input(input: &str) -> Option<CellValue> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Some(CellValue::Number(n));
            }
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "TRUE" => Some(CellValue::Bool(true)),
            "FALSE" => Some(CellValue::Bool(false)),
            _ => Some(CellValue::Text(input.to_string())),
        }
    }

    /// Tag stored in the `value_type` column
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
            CellValue::Bool(_) => "bool",
            CellValue::Error(_) => "error",
        }
    }

    /// Text values beginning with the formula marker
    pub fn is_formula_text(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.starts_with('='))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(e) => write!(f, "{e}"),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

//==============================================================================
// Record Streams
//==============================================================================

/// One non-empty cell or formula cell.
///
/// For formula cells the value is the formula text, leading `=` included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub address: String,
    pub value: Option<CellValue>,
    pub is_formula: bool,
}

impl CellRecord {
    pub fn value(address: impl Into<String>, value: CellValue) -> Self {
        Self {
            address: address.into(),
            value: Some(value),
            is_formula: false,
        }
    }

    pub fn formula(address: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            value: Some(CellValue::Text(formula.into())),
            is_formula: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaRecord {
    pub address: String,
    /// Verbatim formula text including the leading `=`
    pub formula: String,
}

/// A style assignment for a range (a single cell unless coalescing is on).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRecord {
    pub range_address: String,
    pub style_key: String,
    pub attributes: StyleAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MergedRange {
    pub range_address: String,
}

impl MergedRange {
    pub fn new(range_address: impl Into<String>) -> Self {
        Self {
            range_address: range_address.into(),
        }
    }
}

//==============================================================================
// Charts
//==============================================================================

/// Supported chart kinds on the extraction side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Column,
    Line,
    Pie,
    #[serde(rename = "pie3d")]
    Pie3D,
    Area,
    Scatter,
    Doughnut,
    Radar,
    Bubble,
    Stock,
    Surface,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartGrouping {
    Standard,
    Clustered,
    Stacked,
    PercentStacked,
}

impl ChartGrouping {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(ChartGrouping::Standard),
            "clustered" => Some(ChartGrouping::Clustered),
            "stacked" => Some(ChartGrouping::Stacked),
            "percentStacked" => Some(ChartGrouping::PercentStacked),
            _ => None,
        }
    }
}

/// Cell corner plus EMU offsets inside that cell (0-based row and column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorPoint {
    pub col: u32,
    pub row: u32,
    pub col_offset: i64,
    pub row_offset: i64,
}

/// Chart placement. Either one anchor cell plus an explicit size, or two
/// anchor cells spanning the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "anchor", rename_all = "snake_case")]
pub enum ChartPosition {
    OneCell { from: AnchorPoint },
    TwoCell { from: AnchorPoint, to: AnchorPoint },
}

impl ChartPosition {
    pub fn origin(&self) -> &AnchorPoint {
        match self {
            ChartPosition::OneCell { from } | ChartPosition::TwoCell { from, .. } => from,
        }
    }
}

/// Chart extent in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSize {
    pub width: i64,
    pub height: i64,
    /// False when the size came from authoritative extent data
    pub estimated: bool,
}

/// Literal text or a formula-style reference such as `Sheet1!$B$1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ChartText {
    Literal(String),
    Reference(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub values: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub categories: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<ChartText>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegendPosition {
    Right,
    Left,
    Top,
    Bottom,
    TopRight,
}

impl LegendPosition {
    /// Parse the OOXML `legendPos` value (`r`, `l`, `t`, `b`, `tr`)
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "r" => Some(LegendPosition::Right),
            "l" => Some(LegendPosition::Left),
            "t" => Some(LegendPosition::Top),
            "b" => Some(LegendPosition::Bottom),
            "tr" => Some(LegendPosition::TopRight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartLegend {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<LegendPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRecord {
    pub kind: ChartKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub grouping: Option<ChartGrouping>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<ChartPosition>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<ChartSize>,
    #[serde(default)]
    pub series: Vec<ChartSeries>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<ChartText>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub legend: Option<ChartLegend>,
}

impl ChartRecord {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            grouping: None,
            position: None,
            size: None,
            series: Vec::new(),
            title: None,
            legend: None,
        }
    }
}

//==============================================================================
// Extraction Output
//==============================================================================

/// How formula cells are captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// Formula text is captured and FormulaRecords are emitted
    #[default]
    Formulas,
    /// The last computed result is captured instead of the formula
    ValuesOnly,
}

impl ExtractMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractMode::Formulas => "formulas",
            ExtractMode::ValuesOnly => "values_only",
        }
    }
}

/// All record streams for one sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetModel {
    pub name: String,
    pub max_row: u32,
    pub max_col: u32,
    pub cells: Vec<CellRecord>,
    pub formulas: Vec<FormulaRecord>,
    pub styles: Vec<StyleRecord>,
    pub merges: Vec<MergedRange>,
    pub charts: Vec<ChartRecord>,
}

impl SheetModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Result of one extraction pass over a workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookModel {
    pub source: PathBuf,
    pub mode: ExtractMode,
    pub sheets: Vec<SheetModel>,
}

/// One entry of the cell edit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEdit {
    pub address: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub edited_at: String,
}
