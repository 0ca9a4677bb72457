//! Canonical cell style attributes and the style-key registry
//!
//! Every facet is optional: a facet is present only when the source cell
//! carries a non-default value for it. Identical attribute sets always hash
//! to the same [`StyleKey`], regardless of where the cell sits.

use crate::excel::coordinates::{address_to_row_col, bounds_to_range};
use crate::types::StyleRecord;
use ahash::{AHashMap, RandomState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use tracing::warn;

//==============================================================================
// Attribute Facets
//==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontAttributes {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub bold: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub italic: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub strike: bool,
    /// `single`, `double`, `singleAccounting`, `doubleAccounting`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub underline: Option<String>,
    /// `RRGGBB`, or `theme:N` for unresolved theme colors
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<String>,
}

impl Hash for FontAttributes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.size.map(f64::to_bits).hash(state);
        self.bold.hash(state);
        self.italic.hash(state);
        self.strike.hash(state);
        self.underline.hash(state);
        self.color.hash(state);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FillAttributes {
    /// OOXML pattern type, e.g. `solid`, `gray125`
    pub pattern: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fg_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bg_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorderSide {
    /// OOXML line style, e.g. `thin`, `medium`, `dashed`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<String>,
}

impl BorderSide {
    pub fn is_empty(&self) -> bool {
        self.style.is_none() && self.color.is_none()
    }
}

/// Only sides with a line style or a color are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorderAttributes {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub left: Option<BorderSide>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub right: Option<BorderSide>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub top: Option<BorderSide>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bottom: Option<BorderSide>,
}

impl BorderAttributes {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none() && self.top.is_none() && self.bottom.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlignmentAttributes {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub horizontal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vertical: Option<String>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub wrap_text: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text_rotation: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub indent: Option<u8>,
}

impl AlignmentAttributes {
    pub fn is_empty(&self) -> bool {
        *self == AlignmentAttributes::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtectionAttributes {
    pub locked: bool,
    pub hidden: bool,
}

impl Default for ProtectionAttributes {
    fn default() -> Self {
        Self {
            locked: true,
            hidden: false,
        }
    }
}

/// The canonical style attribute map of one cell.
#[derive(Debug, Clone, Default, PartialEq, Hash, Serialize, Deserialize)]
pub struct StyleAttributes {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub font: Option<FontAttributes>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fill: Option<FillAttributes>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub border: Option<BorderAttributes>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub alignment: Option<AlignmentAttributes>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub number_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub protection: Option<ProtectionAttributes>,
}

impl StyleAttributes {
    pub fn is_empty(&self) -> bool {
        self.font.is_none()
            && self.fill.is_none()
            && self.border.is_none()
            && self.alignment.is_none()
            && self.number_format.is_none()
            && self.protection.is_none()
    }

    /// Deterministic JSON form used for the persisted attributes column
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

//==============================================================================
// Style Keys
//==============================================================================

/// Fixed seeds so keys stored in one run match keys computed in the next
const STYLE_KEY_SEEDS: RandomState = RandomState::with_seeds(
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

/// Structural hash of a [`StyleAttributes`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleKey(u64);

impl StyleKey {
    pub fn of(attributes: &StyleAttributes) -> Self {
        Self::salted(attributes, 0)
    }

    fn salted(attributes: &StyleAttributes, salt: u32) -> Self {
        if salt == 0 {
            StyleKey(STYLE_KEY_SEEDS.hash_one(attributes))
        } else {
            StyleKey(STYLE_KEY_SEEDS.hash_one((attributes, salt)))
        }
    }

    pub fn as_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

//==============================================================================
// Registry
//==============================================================================

/// Deduplicates style attribute sets within one sheet.
///
/// Cells are registered one at a time; [`StyleRegistry::records`] yields one
/// record per registered cell in registration order, and
/// [`StyleRegistry::coalesced_records`] groups equal keys into rectangles.
#[derive(Debug, Default)]
pub struct StyleRegistry {
    styles: AHashMap<StyleKey, StyleAttributes>,
    assignments: Vec<(String, StyleKey)>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the key for `attributes`, registering them on first sight.
    pub fn intern(&mut self, attributes: &StyleAttributes) -> StyleKey {
        let mut salt = 0;
        loop {
            let key = StyleKey::salted(attributes, salt);
            match self.styles.get(&key) {
                Some(existing) if existing == attributes => return key,
                Some(_) => {
                    warn!(style_key = %key.as_hex(), "Style key collision, re-salting");
                    salt += 1;
                }
                None => {
                    self.styles.insert(key, attributes.clone());
                    return key;
                }
            }
        }
    }

    /// Assign a style to one cell address. Empty attribute sets are ignored.
    pub fn register(&mut self, address: &str, attributes: &StyleAttributes) -> Option<StyleKey> {
        if attributes.is_empty() {
            return None;
        }
        let key = self.intern(attributes);
        self.assignments.push((address.to_string(), key));
        Some(key)
    }

    /// Number of distinct attribute sets
    pub fn unique_styles(&self) -> usize {
        self.styles.len()
    }

    pub fn assigned_cells(&self) -> usize {
        self.assignments.len()
    }

    /// One record per registered cell
    pub fn records(&self) -> Vec<StyleRecord> {
        self.assignments
            .iter()
            .filter_map(|(address, key)| {
                self.styles.get(key).map(|attributes| StyleRecord {
                    range_address: address.clone(),
                    style_key: key.as_hex(),
                    attributes: attributes.clone(),
                })
            })
            .collect()
    }

    /// Group cells sharing a key into rectangles: horizontal runs per row
    /// first, then runs with the same column span on consecutive rows.
    pub fn coalesced_records(&self) -> Vec<StyleRecord> {
        let mut by_key: BTreeMap<StyleKey, Vec<(u32, u32)>> = BTreeMap::new();
        for (address, key) in &self.assignments {
            match address_to_row_col(address) {
                Ok(cell) => by_key.entry(*key).or_default().push(cell),
                Err(e) => warn!(address = %address, "Skipping style during coalescing: {}", e),
            }
        }

        let mut records = Vec::new();
        for (key, mut cells) in by_key {
            let Some(attributes) = self.styles.get(&key) else {
                continue;
            };
            cells.sort_unstable();
            cells.dedup();

            for (r0, c0, r1, c1) in coalesce_cells(&cells) {
                records.push(StyleRecord {
                    range_address: bounds_to_range(r0, c0, r1, c1),
                    style_key: key.as_hex(),
                    attributes: attributes.clone(),
                });
            }
        }

        records.sort_by_key(|r| {
            address_to_row_col(r.range_address.split(':').next().unwrap_or_default())
                .unwrap_or((u32::MAX, u32::MAX))
        });
        records
    }
}

/// Merge sorted `(row, col)` cells into `(r0, c0, r1, c1)` rectangles.
fn coalesce_cells(cells: &[(u32, u32)]) -> Vec<(u32, u32, u32, u32)> {
    // Horizontal runs: (row, first_col, last_col)
    let mut runs: Vec<(u32, u32, u32)> = Vec::new();
    for &(row, col) in cells {
        match runs.last_mut() {
            Some((r, _, last)) if *r == row && *last + 1 == col => *last = col,
            _ => runs.push((row, col, col)),
        }
    }

    // Stack runs with identical column spans on consecutive rows
    let mut rects: Vec<(u32, u32, u32, u32)> = Vec::new();
    let mut open: AHashMap<(u32, u32), usize> = AHashMap::new();
    for (row, c0, c1) in runs {
        match open.get(&(c0, c1)).copied() {
            Some(idx) if rects[idx].2 + 1 == row => rects[idx].2 = row,
            _ => {
                open.insert((c0, c1), rects.len());
                rects.push((row, c0, row, c1));
            }
        }
    }
    rects
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn red_fill() -> StyleAttributes {
        StyleAttributes {
            fill: Some(FillAttributes {
                pattern: "solid".to_string(),
                fg_color: Some("FF0000".to_string()),
                bg_color: None,
            }),
            ..Default::default()
        }
    }

    fn bold_font() -> StyleAttributes {
        StyleAttributes {
            font: Some(FontAttributes {
                name: Some("Calibri".to_string()),
                size: Some(11.0),
                bold: true,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_equal_attributes_share_key() {
        let mut registry = StyleRegistry::new();
        let a = registry.register("A1", &red_fill()).unwrap();
        let b = registry.register("Z40", &red_fill()).unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.unique_styles(), 1);
        assert_eq!(registry.assigned_cells(), 2);
    }

    #[test]
    fn test_different_attributes_differ() {
        assert_ne!(StyleKey::of(&red_fill()), StyleKey::of(&bold_font()));

        let mut bigger = bold_font();
        if let Some(font) = bigger.font.as_mut() {
            font.size = Some(12.0);
        }
        assert_ne!(StyleKey::of(&bigger), StyleKey::of(&bold_font()));
    }

    #[test]
    fn test_key_is_stable() {
        let key = StyleKey::of(&red_fill());
        assert_eq!(key, StyleKey::of(&red_fill().clone()));
        assert_eq!(key.as_hex().len(), 16);
    }

    #[test]
    fn test_key_ignores_process_random_state() {
        // A fresh hasher from the same fixed seeds gives the same key
        let reseeded = RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        );
        assert_eq!(StyleKey::of(&red_fill()), StyleKey(reseeded.hash_one(&red_fill())));
        assert_ne!(StyleKey::salted(&red_fill(), 1), StyleKey::of(&red_fill()));
    }

    #[test]
    fn test_empty_attributes_not_registered() {
        let mut registry = StyleRegistry::new();
        assert!(registry.register("A1", &StyleAttributes::default()).is_none());
        assert!(registry.records().is_empty());
    }

    #[test]
    fn test_one_record_per_cell() {
        let mut registry = StyleRegistry::new();
        for address in ["A1", "B1", "A2", "B2"] {
            registry.register(address, &red_fill());
        }
        let records = registry.records();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.style_key == records[0].style_key));
        assert_eq!(records[2].range_address, "A2");
    }

    #[test]
    fn test_coalesced_records() {
        let mut registry = StyleRegistry::new();
        for address in ["A1", "B1", "A2", "B2", "D5"] {
            registry.register(address, &red_fill());
        }
        registry.register("C1", &bold_font());

        let ranges: Vec<String> = registry
            .coalesced_records()
            .into_iter()
            .map(|r| r.range_address)
            .collect();
        assert_eq!(ranges, vec!["A1:B2", "C1", "D5"]);
    }

    #[test]
    fn test_canonical_json_is_deterministic() {
        let json = bold_font().to_canonical_json().unwrap();
        assert_eq!(json, r#"{"font":{"name":"Calibri","size":11.0,"bold":true}}"#);

        let back: StyleAttributes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bold_font());
    }
}
