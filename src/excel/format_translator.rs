//! Canonical style attributes → `rust_xlsxwriter::Format`
//!
//! Every facet is translated independently. Unknown border or pattern names
//! fail the whole style, so the caller can skip it and keep the cell value.
//! Theme colors have no RGB equivalent without the source theme and are
//! left unset.

use crate::error::{MicroDbError, MicroDbResult};
use crate::excel::styles::{
    AlignmentAttributes, BorderAttributes, BorderSide, FillAttributes, FontAttributes,
    ProtectionAttributes, StyleAttributes,
};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatPattern, FormatUnderline};

/// Build a writer format for one canonical attribute set.
pub fn build_format(attributes: &StyleAttributes) -> MicroDbResult<Format> {
    let mut format = Format::new();

    if let Some(font) = &attributes.font {
        format = apply_font(format, font)?;
    }
    if let Some(fill) = &attributes.fill {
        format = apply_fill(format, fill)?;
    }
    if let Some(border) = &attributes.border {
        format = apply_border(format, border)?;
    }
    if let Some(alignment) = &attributes.alignment {
        format = apply_alignment(format, alignment)?;
    }
    if let Some(number_format) = &attributes.number_format {
        format = format.set_num_format(number_format);
    }
    if let Some(protection) = &attributes.protection {
        format = apply_protection(format, protection);
    }

    Ok(format)
}

fn apply_font(mut format: Format, font: &FontAttributes) -> MicroDbResult<Format> {
    if let Some(name) = &font.name {
        format = format.set_font_name(name);
    }
    if let Some(size) = font.size {
        format = format.set_font_size(size);
    }
    if font.bold {
        format = format.set_bold();
    }
    if font.italic {
        format = format.set_italic();
    }
    if font.strike {
        format = format.set_font_strikethrough();
    }
    if let Some(underline) = &font.underline {
        format = format.set_underline(map_underline(underline)?);
    }
    if let Some(color) = parse_color(font.color.as_deref())? {
        format = format.set_font_color(color);
    }
    Ok(format)
}

fn apply_fill(mut format: Format, fill: &FillAttributes) -> MicroDbResult<Format> {
    let pattern = map_pattern(&fill.pattern)?;
    if pattern == FormatPattern::None {
        return Ok(format);
    }

    let fg = parse_color(fill.fg_color.as_deref())?;
    let bg = parse_color(fill.bg_color.as_deref())?;

    if pattern == FormatPattern::Solid {
        // The writer stores a solid fill's color as the background color
        if let Some(color) = fg.or(bg) {
            format = format.set_background_color(color);
        }
        return Ok(format.set_pattern(FormatPattern::Solid));
    }

    format = format.set_pattern(pattern);
    if let Some(color) = fg {
        format = format.set_foreground_color(color);
    }
    if let Some(color) = bg {
        format = format.set_background_color(color);
    }
    Ok(format)
}

fn apply_border(mut format: Format, border: &BorderAttributes) -> MicroDbResult<Format> {
    if let Some((style, color)) = border_side(border.left.as_ref())? {
        format = format.set_border_left(style);
        if let Some(color) = color {
            format = format.set_border_left_color(color);
        }
    }
    if let Some((style, color)) = border_side(border.right.as_ref())? {
        format = format.set_border_right(style);
        if let Some(color) = color {
            format = format.set_border_right_color(color);
        }
    }
    if let Some((style, color)) = border_side(border.top.as_ref())? {
        format = format.set_border_top(style);
        if let Some(color) = color {
            format = format.set_border_top_color(color);
        }
    }
    if let Some((style, color)) = border_side(border.bottom.as_ref())? {
        format = format.set_border_bottom(style);
        if let Some(color) = color {
            format = format.set_border_bottom_color(color);
        }
    }
    Ok(format)
}

/// A side with only a color still needs a line style to be visible; thin is
/// what spreadsheet applications assume.
fn border_side(side: Option<&BorderSide>) -> MicroDbResult<Option<(FormatBorder, Option<Color>)>> {
    let Some(side) = side else {
        return Ok(None);
    };
    let style = match side.style.as_deref() {
        Some(style) => map_border_style(style)?,
        None => FormatBorder::Thin,
    };
    if style == FormatBorder::None {
        return Ok(None);
    }
    Ok(Some((style, parse_color(side.color.as_deref())?)))
}

fn apply_alignment(mut format: Format, alignment: &AlignmentAttributes) -> MicroDbResult<Format> {
    if let Some(horizontal) = &alignment.horizontal {
        if let Some(align) = map_horizontal(horizontal)? {
            format = format.set_align(align);
        }
    }
    if let Some(vertical) = &alignment.vertical {
        if let Some(align) = map_vertical(vertical)? {
            format = format.set_align(align);
        }
    }
    if alignment.wrap_text {
        format = format.set_text_wrap();
    }
    if let Some(rotation) = alignment.text_rotation {
        format = format.set_rotation(map_rotation(rotation));
    }
    if let Some(indent) = alignment.indent {
        format = format.set_indent(indent);
    }
    Ok(format)
}

fn apply_protection(mut format: Format, protection: &ProtectionAttributes) -> Format {
    if !protection.locked {
        format = format.set_unlocked();
    }
    if protection.hidden {
        format = format.set_hidden();
    }
    format
}

//==============================================================================
// Lookup tables
//==============================================================================

/// `RRGGBB` → writer color. `theme:N` and absent colors yield `None`.
pub fn parse_color(color: Option<&str>) -> MicroDbResult<Option<Color>> {
    let Some(color) = color else {
        return Ok(None);
    };
    if color.starts_with("theme:") {
        return Ok(None);
    }
    let hex = color.trim_start_matches('#');
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(MicroDbError::StyleTranslation(format!("Invalid color '{color}'")));
    }
    let hex = if hex.len() == 8 { &hex[2..] } else { hex };
    if hex.len() != 6 {
        return Err(MicroDbError::StyleTranslation(format!("Invalid color '{color}'")));
    }
    u32::from_str_radix(hex, 16)
        .map(|rgb| Some(Color::RGB(rgb)))
        .map_err(|_| MicroDbError::StyleTranslation(format!("Invalid color '{color}'")))
}

fn map_underline(underline: &str) -> MicroDbResult<FormatUnderline> {
    let mapped = match underline {
        "single" => FormatUnderline::Single,
        "double" => FormatUnderline::Double,
        "singleAccounting" => FormatUnderline::SingleAccounting,
        "doubleAccounting" => FormatUnderline::DoubleAccounting,
        "none" => FormatUnderline::None,
        other => {
            return Err(MicroDbError::StyleTranslation(format!(
                "Unknown underline style '{other}'"
            )))
        }
    };
    Ok(mapped)
}

fn map_pattern(pattern: &str) -> MicroDbResult<FormatPattern> {
    let mapped = match pattern {
        "none" => FormatPattern::None,
        "solid" => FormatPattern::Solid,
        "mediumGray" => FormatPattern::MediumGray,
        "darkGray" => FormatPattern::DarkGray,
        "lightGray" => FormatPattern::LightGray,
        "darkHorizontal" => FormatPattern::DarkHorizontal,
        "darkVertical" => FormatPattern::DarkVertical,
        "darkDown" => FormatPattern::DarkDown,
        "darkUp" => FormatPattern::DarkUp,
        "darkGrid" => FormatPattern::DarkGrid,
        "darkTrellis" => FormatPattern::DarkTrellis,
        "lightHorizontal" => FormatPattern::LightHorizontal,
        "lightVertical" => FormatPattern::LightVertical,
        "lightDown" => FormatPattern::LightDown,
        "lightUp" => FormatPattern::LightUp,
        "lightGrid" => FormatPattern::LightGrid,
        "lightTrellis" => FormatPattern::LightTrellis,
        "gray125" => FormatPattern::Gray125,
        "gray0625" => FormatPattern::Gray0625,
        other => {
            return Err(MicroDbError::StyleTranslation(format!(
                "Unknown fill pattern '{other}'"
            )))
        }
    };
    Ok(mapped)
}

fn map_border_style(style: &str) -> MicroDbResult<FormatBorder> {
    let mapped = match style {
        "none" => FormatBorder::None,
        "thin" => FormatBorder::Thin,
        "medium" => FormatBorder::Medium,
        "dashed" => FormatBorder::Dashed,
        "dotted" => FormatBorder::Dotted,
        "thick" => FormatBorder::Thick,
        "double" => FormatBorder::Double,
        "hair" => FormatBorder::Hair,
        "mediumDashed" => FormatBorder::MediumDashed,
        "dashDot" => FormatBorder::DashDot,
        "mediumDashDot" => FormatBorder::MediumDashDot,
        "dashDotDot" => FormatBorder::DashDotDot,
        "mediumDashDotDot" => FormatBorder::MediumDashDotDot,
        "slantDashDot" => FormatBorder::SlantDashDot,
        other => {
            return Err(MicroDbError::StyleTranslation(format!(
                "Unknown border style '{other}'"
            )))
        }
    };
    Ok(mapped)
}

/// `general` has no writer equivalent and is simply not set.
fn map_horizontal(horizontal: &str) -> MicroDbResult<Option<FormatAlign>> {
    let mapped = match horizontal {
        "general" => return Ok(None),
        "left" => FormatAlign::Left,
        "center" => FormatAlign::Center,
        "right" => FormatAlign::Right,
        "fill" => FormatAlign::Fill,
        "justify" => FormatAlign::Justify,
        "centerContinuous" => FormatAlign::CenterAcross,
        "distributed" => FormatAlign::Distributed,
        other => {
            return Err(MicroDbError::StyleTranslation(format!(
                "Unknown horizontal alignment '{other}'"
            )))
        }
    };
    Ok(Some(mapped))
}

fn map_vertical(vertical: &str) -> MicroDbResult<Option<FormatAlign>> {
    let mapped = match vertical {
        "top" => FormatAlign::Top,
        "center" => FormatAlign::VerticalCenter,
        "bottom" => FormatAlign::Bottom,
        "justify" => FormatAlign::VerticalJustify,
        "distributed" => FormatAlign::VerticalDistributed,
        other => {
            return Err(MicroDbError::StyleTranslation(format!(
                "Unknown vertical alignment '{other}'"
            )))
        }
    };
    Ok(Some(mapped))
}

/// OOXML stores downward angles as 91..=180 and stacked text as 255; the
/// writer takes -90..=90 and 270.
fn map_rotation(rotation: i16) -> i16 {
    match rotation {
        255 => 270,
        91..=180 => -(rotation - 90),
        other => other,
    }
}
