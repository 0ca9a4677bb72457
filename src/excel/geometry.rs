//! Chart anchor geometry
//!
//! Pure functions that turn anchor data into a chart extent. When no
//! authoritative size exists they return an estimate flagged as such
//! instead of failing.

use crate::types::{AnchorPoint, ChartPosition, ChartSize};

/// English Metric Units per pixel at 96 DPI
pub const EMU_PER_PIXEL: i64 = 9_525;

/// Per-cell unit used to estimate a two-cell anchor's extent
pub const ESTIMATED_EMU_PER_CELL: i64 = 640_000;

/// Default chart size used when nothing better is known (480 x 288 px)
pub const DEFAULT_CHART_WIDTH_EMU: i64 = 480 * EMU_PER_PIXEL;
pub const DEFAULT_CHART_HEIGHT_EMU: i64 = 288 * EMU_PER_PIXEL;

/// Explicit width/height pair in EMU, as found on an anchor or chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub width: i64,
    pub height: i64,
}

impl Extent {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    fn is_usable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Extent of a chart spanning two anchor cells.
///
/// An explicit extent wins. Otherwise the size is estimated from the cell
/// delta at [`ESTIMATED_EMU_PER_CELL`] per cell plus the offset delta; the
/// estimate is never zero or negative.
pub fn resolve_two_anchor_extent(
    from: &AnchorPoint,
    to: &AnchorPoint,
    explicit: Option<Extent>,
) -> ChartSize {
    if let Some(extent) = explicit.filter(Extent::is_usable) {
        return ChartSize {
            width: extent.width,
            height: extent.height,
            estimated: false,
        };
    }

    let width = estimate_span(from.col, to.col, from.col_offset, to.col_offset);
    let height = estimate_span(from.row, to.row, from.row_offset, to.row_offset);

    ChartSize {
        width: width.unwrap_or(DEFAULT_CHART_WIDTH_EMU),
        height: height.unwrap_or(DEFAULT_CHART_HEIGHT_EMU),
        estimated: true,
    }
}

/// Positive span between two anchor edges, `None` when it is not usable.
/// Offsets come straight from the drawing XML and may be arbitrary.
fn estimate_span(from: u32, to: u32, from_offset: i64, to_offset: i64) -> Option<i64> {
    let cells = (i64::from(to) - i64::from(from)).saturating_mul(ESTIMATED_EMU_PER_CELL);
    let span = cells.saturating_add(to_offset.saturating_sub(from_offset));
    (span > 0 && span < i64::MAX).then_some(span)
}

/// Extent of a chart anchored at one cell.
///
/// The chart's own size fields take precedence over the anchor's extent;
/// with neither available the default size is returned as an estimate.
pub fn resolve_one_anchor_extent(explicit_size: Option<Extent>, extent_field: Option<Extent>) -> ChartSize {
    match explicit_size
        .filter(Extent::is_usable)
        .or(extent_field.filter(Extent::is_usable))
    {
        Some(extent) => ChartSize {
            width: extent.width,
            height: extent.height,
            estimated: false,
        },
        None => ChartSize {
            width: DEFAULT_CHART_WIDTH_EMU,
            height: DEFAULT_CHART_HEIGHT_EMU,
            estimated: true,
        },
    }
}

pub fn emu_to_pixels(emu: i64) -> u32 {
    (emu.max(0) / EMU_PER_PIXEL).min(u32::MAX as i64) as u32
}

/// Where and how large to insert a chart in the target writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub row: u32,
    pub col: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub width_px: u32,
    pub height_px: u32,
}

/// Inverse direction: from a stored position and size to the insertion
/// cell, pixel offsets and pixel size. Missing data falls back to A1 and the
/// given default size.
pub fn placement_for(
    position: Option<&ChartPosition>,
    size: Option<&ChartSize>,
    default_width_px: u32,
    default_height_px: u32,
) -> Placement {
    let (row, col, x_offset, y_offset) = match position {
        Some(position) => {
            let from = position.origin();
            (
                from.row,
                from.col,
                emu_to_pixels(from.col_offset),
                emu_to_pixels(from.row_offset),
            )
        }
        None => (0, 0, 0, 0),
    };

    let (width_px, height_px) = match size {
        Some(size) => {
            let w = emu_to_pixels(size.width);
            let h = emu_to_pixels(size.height);
            (
                if w > 0 { w } else { default_width_px },
                if h > 0 { h } else { default_height_px },
            )
        }
        None => (default_width_px, default_height_px),
    };

    Placement {
        row,
        col,
        x_offset,
        y_offset,
        width_px,
        height_px,
    }
}
