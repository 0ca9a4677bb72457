//! `xl/styles.xml` reader
//!
//! Loads the number format, font, fill, border and cellXfs tables and turns
//! a cell's xf index into a canonical [`StyleAttributes`] holding only the
//! facets that differ from the workbook defaults.

use crate::error::{MicroDbError, MicroDbResult};
use crate::excel::styles::{
    AlignmentAttributes, BorderAttributes, BorderSide, FillAttributes, FontAttributes,
    ProtectionAttributes, StyleAttributes,
};
use crate::excel::xml_helpers::{attr_string, attr_u32, attr_val, local_name_str, toggle_val};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// Standard 64-entry indexed color palette (`RRGGBB`)
const INDEXED_COLORS: [&str; 64] = [
    "000000", "FFFFFF", "FF0000", "00FF00", "0000FF", "FFFF00", "FF00FF", "00FFFF", //
    "000000", "FFFFFF", "FF0000", "00FF00", "0000FF", "FFFF00", "FF00FF", "00FFFF", //
    "800000", "008000", "000080", "808000", "800080", "008080", "C0C0C0", "808080", //
    "9999FF", "993366", "FFFFCC", "CCFFFF", "660066", "FF8080", "0066CC", "CCCCFF", //
    "000080", "FF00FF", "FFFF00", "00FFFF", "800080", "800000", "008080", "0000FF", //
    "00CCFF", "CCFFFF", "CCFFCC", "FFFF99", "99CCFF", "FF99CC", "CC99FF", "FFCC99", //
    "3366FF", "33CCCC", "99CC00", "FFCC00", "FF9900", "FF6600", "666699", "969696", //
    "003366", "339966", "003300", "333300", "993300", "993366", "333399", "333333",
];

/// Built-in number format codes by id. Id 0 (`General`) is treated as default.
pub fn builtin_num_format(id: u32) -> Option<&'static str> {
    let code = match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    };
    Some(code)
}

/// Normalize a `<color>` element to `RRGGBB` or `theme:N`.
///
/// `auto` and the system indexes (64, 65) have no fixed color.
fn parse_color(e: &BytesStart) -> Option<String> {
    if let Some(rgb) = attr_string(e, b"rgb") {
        let hex = rgb.trim();
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        return match hex.len() {
            8 => Some(hex[2..].to_ascii_uppercase()),
            6 => Some(hex.to_ascii_uppercase()),
            _ => None,
        };
    }
    if let Some(index) = attr_u32(e, b"indexed") {
        return INDEXED_COLORS.get(index as usize).map(|c| c.to_string());
    }
    if let Some(theme) = attr_u32(e, b"theme") {
        return Some(format!("theme:{theme}"));
    }
    None
}

#[derive(Debug, Clone, Default)]
struct CellXf {
    num_fmt_id: u32,
    font_id: u32,
    fill_id: u32,
    border_id: u32,
    alignment: Option<AlignmentAttributes>,
    protection: Option<ProtectionAttributes>,
}

/// Parsed style tables of one workbook.
#[derive(Debug, Clone, Default)]
pub struct StyleTable {
    num_formats: HashMap<u32, String>,
    fonts: Vec<FontAttributes>,
    fills: Vec<Option<FillAttributes>>,
    borders: Vec<BorderAttributes>,
    cell_xfs: Vec<CellXf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Fonts,
    Fills,
    Borders,
    CellXfs,
    Other,
}

impl StyleTable {
    pub fn parse(xml: &str) -> MicroDbResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut buf = Vec::new();

        let mut table = StyleTable::default();
        let mut section = Section::None;

        let mut font: Option<FontAttributes> = None;
        let mut fill: Option<FillAttributes> = None;
        let mut in_fill = false;
        let mut border: Option<BorderAttributes> = None;
        let mut border_side: Option<(String, BorderSide)> = None;
        let mut xf: Option<CellXf> = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| MicroDbError::Source(format!("Failed to parse styles.xml: {e}")))?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let name = local_name_str(e);
                    match (section, name.as_str()) {
                        (_, "numFmt") => {
                            if let (Some(id), Some(code)) =
                                (attr_u32(e, b"numFmtId"), attr_string(e, b"formatCode"))
                            {
                                table.num_formats.insert(id, code);
                            }
                        }
                        (_, "fonts") if !is_empty => section = Section::Fonts,
                        (_, "fills") if !is_empty => section = Section::Fills,
                        (_, "borders") if !is_empty => section = Section::Borders,
                        (_, "cellXfs") if !is_empty => section = Section::CellXfs,
                        (_, "cellStyleXfs" | "dxfs" | "cellStyles" | "colors") if !is_empty => {
                            section = Section::Other
                        }

                        (Section::Fonts, "font") => {
                            font = Some(FontAttributes::default());
                            if is_empty {
                                table.fonts.push(FontAttributes::default());
                                font = None;
                            }
                        }
                        (Section::Fonts, tag) => {
                            if let Some(f) = font.as_mut() {
                                apply_font_child(f, tag, e);
                            }
                        }

                        (Section::Fills, "fill") => {
                            in_fill = true;
                            fill = None;
                            if is_empty {
                                table.fills.push(None);
                                in_fill = false;
                            }
                        }
                        (Section::Fills, "patternFill") if in_fill => {
                            let pattern =
                                attr_string(e, b"patternType").unwrap_or_else(|| "none".to_string());
                            fill = Some(FillAttributes {
                                pattern,
                                fg_color: None,
                                bg_color: None,
                            });
                        }
                        (Section::Fills, "fgColor") => {
                            if let Some(f) = fill.as_mut() {
                                f.fg_color = parse_color(e);
                            }
                        }
                        (Section::Fills, "bgColor") => {
                            if let Some(f) = fill.as_mut() {
                                f.bg_color = parse_color(e);
                            }
                        }

                        (Section::Borders, "border") => {
                            border = Some(BorderAttributes::default());
                            if is_empty {
                                table.borders.push(BorderAttributes::default());
                                border = None;
                            }
                        }
                        (Section::Borders, "left" | "right" | "top" | "bottom") => {
                            let side = BorderSide {
                                style: attr_string(e, b"style").filter(|s| s != "none"),
                                color: None,
                            };
                            if is_empty {
                                if let Some(b) = border.as_mut() {
                                    set_border_side(b, &name, side);
                                }
                            } else {
                                border_side = Some((name.clone(), side));
                            }
                        }
                        (Section::Borders, "color") => {
                            if let Some((_, side)) = border_side.as_mut() {
                                side.color = parse_color(e);
                            }
                        }

                        (Section::CellXfs, "xf") => {
                            let entry = CellXf {
                                num_fmt_id: attr_u32(e, b"numFmtId").unwrap_or(0),
                                font_id: attr_u32(e, b"fontId").unwrap_or(0),
                                fill_id: attr_u32(e, b"fillId").unwrap_or(0),
                                border_id: attr_u32(e, b"borderId").unwrap_or(0),
                                alignment: None,
                                protection: None,
                            };
                            if is_empty {
                                table.cell_xfs.push(entry);
                            } else {
                                xf = Some(entry);
                            }
                        }
                        (Section::CellXfs, "alignment") => {
                            if let Some(x) = xf.as_mut() {
                                let alignment = parse_alignment(e);
                                x.alignment = (!alignment.is_empty()).then_some(alignment);
                            }
                        }
                        (Section::CellXfs, "protection") => {
                            if let Some(x) = xf.as_mut() {
                                let protection = ProtectionAttributes {
                                    locked: attr_string(e, b"locked").map_or(true, |v| v != "0"),
                                    hidden: attr_string(e, b"hidden").is_some_and(|v| v == "1"),
                                };
                                x.protection =
                                    (protection != ProtectionAttributes::default()).then_some(protection);
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    match name.as_str() {
                        "fonts" | "fills" | "borders" | "cellXfs" | "cellStyleXfs" | "dxfs"
                        | "cellStyles" | "colors" => section = Section::None,
                        "font" if section == Section::Fonts => {
                            table.fonts.push(font.take().unwrap_or_default());
                        }
                        "fill" if section == Section::Fills => {
                            table.fills.push(fill.take());
                            in_fill = false;
                        }
                        "left" | "right" | "top" | "bottom" if section == Section::Borders => {
                            if let (Some((side_name, side)), Some(b)) = (border_side.take(), border.as_mut()) {
                                set_border_side(b, &side_name, side);
                            }
                        }
                        "border" if section == Section::Borders => {
                            table.borders.push(border.take().unwrap_or_default());
                        }
                        "xf" if section == Section::CellXfs => {
                            if let Some(x) = xf.take() {
                                table.cell_xfs.push(x);
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(table)
    }

    pub fn cell_xf_count(&self) -> usize {
        self.cell_xfs.len()
    }

    /// Canonical attributes for a cell's xf index.
    ///
    /// Returns `Ok(None)` for the default style (index 0) and for styles with
    /// no non-default facet, and an error when the index does not exist.
    pub fn attributes_for(&self, xf_index: u32) -> MicroDbResult<Option<StyleAttributes>> {
        if xf_index == 0 {
            return Ok(None);
        }
        let xf = self.cell_xfs.get(xf_index as usize).ok_or_else(|| {
            MicroDbError::StyleTranslation(format!(
                "Style index {} out of range ({} cellXfs)",
                xf_index,
                self.cell_xfs.len()
            ))
        })?;

        let default_font = self.fonts.first().cloned().unwrap_or_default();
        let font = self
            .fonts
            .get(xf.font_id as usize)
            .filter(|f| **f != default_font)
            .cloned();

        let fill = self
            .fills
            .get(xf.fill_id as usize)
            .cloned()
            .flatten()
            .filter(|f| f.pattern != "none");

        let border = self
            .borders
            .get(xf.border_id as usize)
            .filter(|b| !b.is_empty())
            .cloned();

        let number_format = if xf.num_fmt_id == 0 {
            None
        } else {
            self.num_formats
                .get(&xf.num_fmt_id)
                .cloned()
                .or_else(|| builtin_num_format(xf.num_fmt_id).map(str::to_string))
                .filter(|code| code != "General")
        };

        let attributes = StyleAttributes {
            font,
            fill,
            border,
            alignment: xf.alignment.clone(),
            number_format,
            protection: xf.protection,
        };

        Ok((!attributes.is_empty()).then_some(attributes))
    }
}

fn apply_font_child(font: &mut FontAttributes, tag: &str, e: &BytesStart) {
    match tag {
        "b" => font.bold = toggle_val(e),
        "i" => font.italic = toggle_val(e),
        "strike" => font.strike = toggle_val(e),
        "u" => {
            let style = attr_val(e).unwrap_or_else(|| "single".to_string());
            font.underline = (style != "none").then_some(style);
        }
        "sz" => font.size = attr_val(e).and_then(|v| v.parse().ok()),
        "name" => font.name = attr_val(e),
        "color" => font.color = parse_color(e),
        _ => {}
    }
}

fn set_border_side(border: &mut BorderAttributes, name: &str, side: BorderSide) {
    if side.is_empty() {
        return;
    }
    match name {
        "left" => border.left = Some(side),
        "right" => border.right = Some(side),
        "top" => border.top = Some(side),
        "bottom" => border.bottom = Some(side),
        _ => {}
    }
}

fn parse_alignment(e: &BytesStart) -> AlignmentAttributes {
    AlignmentAttributes {
        horizontal: attr_string(e, b"horizontal").filter(|h| h != "general"),
        vertical: attr_string(e, b"vertical").filter(|v| v != "bottom"),
        wrap_text: attr_string(e, b"wrapText").is_some_and(|v| v == "1" || v == "true"),
        text_rotation: attr_string(e, b"textRotation")
            .and_then(|v| v.parse().ok())
            .filter(|r: &i16| *r != 0),
        indent: attr_string(e, b"indent")
            .and_then(|v| v.parse().ok())
            .filter(|i: &u8| *i != 0),
    }
}
