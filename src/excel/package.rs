//! OOXML package reader for the parts calamine does not expose
//!
//! calamine supplies cell values and formula texts. Everything else the
//! extractor needs is read here straight from the zip container: the
//! style tables, per-cell style indices, merged regions and the drawing
//! parts that carry charts.

use crate::error::{MicroDbError, MicroDbResult};
use crate::excel::coordinates::address_to_row_col;
use crate::excel::drawing::{parse_chart_part, parse_drawing_part, DrawingAnchor};
use crate::excel::style_table::StyleTable;
use crate::excel::xml_helpers::{
    attr_string, attr_string_local, attr_u32, dir_of, local_name_str, read_part, rels_path_for,
    resolve_relative_path,
};
use crate::types::ChartRecord;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

/// A worksheet entry from `xl/workbook.xml`, resolved to its part path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub part_path: String,
}

/// Per-sheet data read from the worksheet part.
#[derive(Debug, Clone, Default)]
pub struct SheetParts {
    /// `(row, col, xf index)` for every cell with a non-default style
    pub cell_styles: Vec<(u32, u32, u32)>,
    /// Merged regions, verbatim
    pub merges: Vec<String>,
    /// Relationship id of the sheet's drawing part
    pub drawing_rid: Option<String>,
    /// Cells whose address could not be parsed
    pub skipped_cells: usize,
}

pub struct WorkbookPackage {
    archive: ZipArchive<BufReader<File>>,
    sheets: Vec<SheetEntry>,
    styles: StyleTable,
}

impl WorkbookPackage {
    /// Open the package and load the workbook-level parts.
    ///
    /// A missing or unreadable `xl/workbook.xml` is fatal; a missing
    /// `xl/styles.xml` just means every cell is unstyled.
    pub fn open<P: AsRef<Path>>(path: P) -> MicroDbResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            MicroDbError::Source(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| MicroDbError::Source(format!("Not a workbook package: {e}")))?;

        let workbook_xml = read_part(&mut archive, "xl/workbook.xml")
            .ok_or_else(|| MicroDbError::Source("Missing xl/workbook.xml".to_string()))?;
        let rels_xml = read_part(&mut archive, "xl/_rels/workbook.xml.rels")
            .ok_or_else(|| MicroDbError::Source("Missing xl/_rels/workbook.xml.rels".to_string()))?;

        let targets = parse_relationships(&rels_xml)?;
        let mut sheets = Vec::new();
        for (name, rid) in parse_workbook_sheets(&workbook_xml)? {
            match targets.get(&rid) {
                Some(rel) if rel.rel_type.ends_with("/worksheet") => sheets.push(SheetEntry {
                    name,
                    part_path: resolve_relative_path("xl", &rel.target),
                }),
                Some(rel) => debug!(sheet = %name, rel_type = %rel.rel_type, "Skipping non-worksheet sheet"),
                None => warn!(sheet = %name, rid = %rid, "Sheet has no relationship target"),
            }
        }

        let styles = match read_part(&mut archive, "xl/styles.xml") {
            Some(xml) => StyleTable::parse(&xml)?,
            None => {
                debug!("No styles part, all cells use the default style");
                StyleTable::default()
            }
        };

        Ok(Self {
            archive,
            sheets,
            styles,
        })
    }

    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    /// Read style indices, merges and the drawing link of one worksheet
    pub fn read_sheet(&mut self, entry: &SheetEntry) -> MicroDbResult<SheetParts> {
        let xml = read_part(&mut self.archive, &entry.part_path).ok_or_else(|| {
            MicroDbError::Source(format!("Missing worksheet part {}", entry.part_path))
        })?;
        parse_worksheet(&xml)
            .map_err(|e| MicroDbError::Source(format!("Worksheet '{}': {}", entry.name, e)))
    }

    /// Read every chart anchored on a worksheet.
    ///
    /// The outer result fails only when the drawing part itself is
    /// unreadable; each chart carries its own result so one bad chart can
    /// be skipped without losing the others.
    pub fn read_charts(
        &mut self,
        entry: &SheetEntry,
        parts: &SheetParts,
    ) -> MicroDbResult<Vec<MicroDbResult<ChartRecord>>> {
        let Some(drawing_rid) = parts.drawing_rid.as_deref() else {
            return Ok(Vec::new());
        };

        let sheet_rels = self.relationships_of(&entry.part_path)?;
        let Some(drawing_rel) = sheet_rels.get(drawing_rid) else {
            warn!(sheet = %entry.name, rid = %drawing_rid, "Drawing relationship not found");
            return Ok(Vec::new());
        };
        let drawing_path = resolve_relative_path(dir_of(&entry.part_path), &drawing_rel.target);

        let Some(drawing_xml) = read_part(&mut self.archive, &drawing_path) else {
            warn!(sheet = %entry.name, part = %drawing_path, "Drawing part missing");
            return Ok(Vec::new());
        };
        let anchors = parse_drawing_part(&drawing_xml).map_err(|e| {
            MicroDbError::ChartTranslation(format!("Drawing part {drawing_path}: {e}"))
        })?;
        let drawing_rels = self.relationships_of(&drawing_path)?;

        let mut charts = Vec::new();
        for anchor in anchors {
            charts.push(self.read_chart(&anchor, &drawing_path, &drawing_rels));
        }
        Ok(charts)
    }

    fn read_chart(
        &mut self,
        anchor: &DrawingAnchor,
        drawing_path: &str,
        drawing_rels: &HashMap<String, Relationship>,
    ) -> MicroDbResult<ChartRecord> {
        let rel = drawing_rels.get(&anchor.chart_rid).ok_or_else(|| {
            MicroDbError::ChartTranslation(format!(
                "Chart relationship {} not found in {}",
                anchor.chart_rid, drawing_path
            ))
        })?;
        let chart_path = resolve_relative_path(dir_of(drawing_path), &rel.target);
        let chart_xml = read_part(&mut self.archive, &chart_path).ok_or_else(|| {
            MicroDbError::ChartTranslation(format!("Chart part {chart_path} missing"))
        })?;

        let mut chart = parse_chart_part(&chart_xml)?;
        chart.position = Some(anchor.position);
        chart.size = Some(anchor.resolve_size());
        Ok(chart)
    }

    fn relationships_of(&mut self, part_path: &str) -> MicroDbResult<HashMap<String, Relationship>> {
        match read_part(&mut self.archive, &rels_path_for(part_path)) {
            Some(xml) => parse_relationships(&xml),
            None => Ok(HashMap::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Relationship {
    pub target: String,
    pub rel_type: String,
}

/// Parse a `.rels` part into `Id -> Relationship`
pub fn parse_relationships(xml: &str) -> MicroDbResult<HashMap<String, Relationship>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut out = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    if let (Some(id), Some(target)) = (attr_string(e, b"Id"), attr_string(e, b"Target")) {
                        let rel_type = attr_string(e, b"Type").unwrap_or_default();
                        out.insert(id, Relationship { target, rel_type });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MicroDbError::Source(format!(
                    "Failed to parse relationships: {e}"
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// `(sheet name, relationship id)` pairs in workbook order
fn parse_workbook_sheets(xml: &str) -> MicroDbResult<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut out = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    if let (Some(name), Some(rid)) = (attr_string(e, b"name"), attr_string_local(e, b"id")) {
                        out.push((name, rid));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MicroDbError::Source(format!("Failed to parse workbook.xml: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// Walk `<sheetData>` for `<c s=..>`, plus `<mergeCell>` and `<drawing>`
fn parse_worksheet(xml: &str) -> Result<SheetParts, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut parts = SheetParts::default();

    // Position tracking for cells that omit the `r` attribute
    let mut current_row: Option<u32> = None;
    let mut next_col: u32 = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match local_name_str(e).as_str() {
                "row" => {
                    current_row = Some(match attr_u32(e, b"r") {
                        Some(r) => r.saturating_sub(1),
                        None => current_row.map_or(0, |r| r + 1),
                    });
                    next_col = 0;
                }
                "c" => {
                    let position = match attr_string(e, b"r") {
                        Some(address) => match address_to_row_col(&address) {
                            Ok(position) => Some(position),
                            Err(err) => {
                                warn!("Skipping cell: {}", err);
                                parts.skipped_cells += 1;
                                None
                            }
                        },
                        None => Some((current_row.unwrap_or(0), next_col)),
                    };
                    if let Some((row, col)) = position {
                        next_col = col + 1;
                        let style = attr_u32(e, b"s").unwrap_or(0);
                        if style != 0 {
                            parts.cell_styles.push((row, col, style));
                        }
                    }
                }
                "mergeCell" => {
                    if let Some(range) = attr_string(e, b"ref") {
                        parts.merges.push(range);
                    }
                }
                "drawing" => {
                    parts.drawing_rid = attr_string_local(e, b"id");
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML error at {}: {}", reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(parts)
}
