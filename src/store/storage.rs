use crate::error::{MicroDbError, MicroDbResult};
use crate::excel::coordinates::{address_to_row_col, row_col_to_address};
use crate::store::schema;
use crate::types::{
    CellEdit, CellRecord, CellValue, ChartRecord, FormulaRecord, MergedRange, Sheet, SheetId,
    SheetModel, StyleRecord,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// SQLite-backed persistence for extracted sheets.
///
/// Every `replace_*` call swaps the whole set for one sheet inside a
/// transaction, so re-importing the same workbook is idempotent.
#[derive(Debug)]
pub struct NormalizedStore {
    conn: Connection,
}

impl NormalizedStore {
    pub fn open_path(path: impl AsRef<Path>) -> MicroDbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::init(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> MicroDbResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::init(&conn)?;
        Ok(Self { conn })
    }

    //==========================================================================
    // Sheets
    //==========================================================================

    /// Create-or-fetch by name. New sheets are appended after the last one.
    pub fn upsert_sheet(&mut self, name: &str) -> MicroDbResult<SheetId> {
        let tx = self.conn.transaction()?;
        let id = upsert_sheet_tx(&tx, name)?;
        tx.commit()?;
        Ok(id)
    }

    /// Create a new, empty sheet; fails if the name is taken.
    pub fn create_sheet(&mut self, name: &str) -> MicroDbResult<SheetId> {
        if self.sheet_by_name(name)?.is_some() {
            return Err(MicroDbError::SheetExists(name.to_string()));
        }
        self.upsert_sheet(name)
    }

    pub fn sheet_by_name(&self, name: &str) -> MicroDbResult<Option<Sheet>> {
        let sheet = self
            .conn
            .query_row(
                "SELECT sheet_id, name, position, max_row, max_col FROM sheets WHERE name = ?1",
                params![name],
                sheet_from_row,
            )
            .optional()?;
        Ok(sheet)
    }

    pub fn sheet_id(&self, name: &str) -> MicroDbResult<SheetId> {
        self.sheet_by_name(name)?
            .map(|s| s.sheet_id)
            .ok_or_else(|| MicroDbError::SheetNotFound(name.to_string()))
    }

    /// All sheets in workbook order
    pub fn sheets(&self) -> MicroDbResult<Vec<Sheet>> {
        let mut stmt = self.conn.prepare(
            "SELECT sheet_id, name, position, max_row, max_col FROM sheets ORDER BY position, sheet_id",
        )?;
        let rows = stmt.query_map([], sheet_from_row)?;

        let mut sheets = Vec::new();
        for sheet in rows {
            sheets.push(sheet?);
        }
        Ok(sheets)
    }

    pub fn set_sheet_dimensions(&mut self, sheet_id: SheetId, max_row: u32, max_col: u32) -> MicroDbResult<()> {
        self.conn.execute(
            "UPDATE sheets SET max_row = ?2, max_col = ?3 WHERE sheet_id = ?1",
            params![sheet_id, max_row, max_col],
        )?;
        Ok(())
    }

    /// Rename in place; the id is kept. Returns false when `old` does not
    /// exist or `new` is already taken.
    pub fn rename_sheet(&mut self, old: &str, new: &str) -> MicroDbResult<bool> {
        let Some(sheet) = self.sheet_by_name(old)? else {
            return Ok(false);
        };
        if old == new {
            return Ok(true);
        }
        if self.sheet_by_name(new)?.is_some() {
            return Ok(false);
        }
        self.conn.execute(
            "UPDATE sheets SET name = ?2 WHERE sheet_id = ?1",
            params![sheet.sheet_id, new],
        )?;
        Ok(true)
    }

    //==========================================================================
    // Bulk replace
    //==========================================================================

    pub fn replace_cell_records(&mut self, sheet_id: SheetId, records: &[CellRecord]) -> MicroDbResult<()> {
        let tx = self.conn.transaction()?;
        replace_cells_tx(&tx, sheet_id, records)?;
        tx.commit()?;
        Ok(())
    }

    pub fn replace_formula_records(&mut self, sheet_id: SheetId, records: &[FormulaRecord]) -> MicroDbResult<()> {
        let tx = self.conn.transaction()?;
        replace_formulas_tx(&tx, sheet_id, records)?;
        tx.commit()?;
        Ok(())
    }

    pub fn replace_style_records(&mut self, sheet_id: SheetId, records: &[StyleRecord]) -> MicroDbResult<()> {
        let tx = self.conn.transaction()?;
        replace_styles_tx(&tx, sheet_id, records)?;
        tx.commit()?;
        Ok(())
    }

    pub fn replace_merged_ranges(&mut self, sheet_id: SheetId, merges: &[MergedRange]) -> MicroDbResult<()> {
        let tx = self.conn.transaction()?;
        replace_merges_tx(&tx, sheet_id, merges)?;
        tx.commit()?;
        Ok(())
    }

    pub fn replace_charts(&mut self, sheet_id: SheetId, charts: &[ChartRecord]) -> MicroDbResult<()> {
        let tx = self.conn.transaction()?;
        replace_charts_tx(&tx, sheet_id, charts)?;
        tx.commit()?;
        Ok(())
    }

    /// Store every record stream of one extracted sheet atomically.
    pub fn import_sheet(&mut self, model: &SheetModel, position: i64) -> MicroDbResult<SheetId> {
        let tx = self.conn.transaction()?;
        let sheet_id = upsert_sheet_tx(&tx, &model.name)?;
        tx.execute(
            "UPDATE sheets SET position = ?2, max_row = ?3, max_col = ?4 WHERE sheet_id = ?1",
            params![sheet_id, position, model.max_row, model.max_col],
        )?;
        replace_cells_tx(&tx, sheet_id, &model.cells)?;
        replace_formulas_tx(&tx, sheet_id, &model.formulas)?;
        replace_styles_tx(&tx, sheet_id, &model.styles)?;
        replace_merges_tx(&tx, sheet_id, &model.merges)?;
        replace_charts_tx(&tx, sheet_id, &model.charts)?;
        tx.commit()?;

        debug!(sheet = %model.name, sheet_id, "Sheet stored");
        Ok(sheet_id)
    }

    //==========================================================================
    // Read accessors
    //==========================================================================

    /// Cells in row-major order
    pub fn cell_records(&self, sheet_id: SheetId) -> MicroDbResult<Vec<CellRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT address, value_type, value_number, value_string, is_formula
            FROM cells
            WHERE sheet_id = ?1
            ORDER BY row, col
            "#,
        )?;
        let rows = stmt.query_map(params![sheet_id], |r| {
            Ok(CellRecord {
                address: r.get(0)?,
                value: value_from_columns(r.get(1)?, r.get(2)?, r.get(3)?),
                is_formula: r.get(4)?,
            })
        })?;

        let mut cells = Vec::new();
        for cell in rows {
            cells.push(cell?);
        }
        Ok(cells)
    }

    pub fn cell_value(&self, sheet_id: SheetId, address: &str) -> MicroDbResult<Option<CellValue>> {
        let (row, col) = address_to_row_col(address)?;
        let address = row_col_to_address(row, col);
        let value = self
            .conn
            .query_row(
                "SELECT value_type, value_number, value_string FROM cells WHERE sheet_id = ?1 AND address = ?2",
                params![sheet_id, address],
                |r| Ok(value_from_columns(r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;
        Ok(value.flatten())
    }

    pub fn formula_records(&self, sheet_id: SheetId) -> MicroDbResult<Vec<FormulaRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT address, formula_text FROM formulas WHERE sheet_id = ?1 ORDER BY row, col",
        )?;
        let rows = stmt.query_map(params![sheet_id], |r| {
            Ok(FormulaRecord {
                address: r.get(0)?,
                formula: r.get(1)?,
            })
        })?;

        let mut formulas = Vec::new();
        for formula in rows {
            formulas.push(formula?);
        }
        Ok(formulas)
    }

    pub fn style_records(&self, sheet_id: SheetId) -> MicroDbResult<Vec<StyleRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT range_address, style_key, style_attributes_json
            FROM styles
            WHERE sheet_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![sheet_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?;

        let mut styles = Vec::new();
        for row in rows {
            let (range_address, style_key, json) = row?;
            styles.push(StyleRecord {
                range_address,
                style_key,
                attributes: serde_json::from_str(&json)?,
            });
        }
        Ok(styles)
    }

    pub fn merged_ranges(&self, sheet_id: SheetId) -> MicroDbResult<Vec<MergedRange>> {
        let mut stmt = self
            .conn
            .prepare("SELECT range_address FROM merged_ranges WHERE sheet_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![sheet_id], |r| r.get::<_, String>(0))?;

        let mut merges = Vec::new();
        for range in rows {
            merges.push(MergedRange::new(range?));
        }
        Ok(merges)
    }

    pub fn charts(&self, sheet_id: SheetId) -> MicroDbResult<Vec<ChartRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT chart_payload_json FROM charts WHERE sheet_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![sheet_id], |r| r.get::<_, serde_json::Value>(0))?;

        let mut charts = Vec::new();
        for payload in rows {
            charts.push(serde_json::from_value(payload?)?);
        }
        Ok(charts)
    }

    //==========================================================================
    // Editing
    //==========================================================================

    /// Set or clear one cell.
    ///
    /// Text beginning with `=` is stored as a formula; any other value drops
    /// a formula previously stored at that address. Returns false when the
    /// sheet does not exist. Every successful edit is logged.
    pub fn update_cell_value(
        &mut self,
        sheet_id: SheetId,
        address: &str,
        value: Option<CellValue>,
    ) -> MicroDbResult<bool> {
        let (row, col) = address_to_row_col(address)?;
        let address = row_col_to_address(row, col);

        let tx = self.conn.transaction()?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM sheets WHERE sheet_id = ?1",
                params![sheet_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Ok(false);
        }

        let old_value = tx
            .query_row(
                "SELECT value_type, value_number, value_string FROM cells WHERE sheet_id = ?1 AND address = ?2",
                params![sheet_id, address],
                |r| Ok(value_from_columns(r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?
            .flatten();

        match &value {
            None => {
                tx.execute(
                    "DELETE FROM cells WHERE sheet_id = ?1 AND address = ?2",
                    params![sheet_id, address],
                )?;
                tx.execute(
                    "DELETE FROM formulas WHERE sheet_id = ?1 AND address = ?2",
                    params![sheet_id, address],
                )?;
            }
            Some(new_value) => {
                let is_formula = new_value.is_formula_text();
                upsert_cell_tx(&tx, sheet_id, &address, row, col, new_value, is_formula)?;
                match new_value.as_text().filter(|_| is_formula) {
                    Some(formula) => {
                        tx.execute(
                            r#"
                            INSERT INTO formulas (sheet_id, address, row, col, formula_text)
                            VALUES (?1, ?2, ?3, ?4, ?5)
                            ON CONFLICT(sheet_id, address) DO UPDATE SET
                              formula_text = excluded.formula_text
                            "#,
                            params![sheet_id, address, row, col, formula],
                        )?;
                    }
                    None => {
                        tx.execute(
                            "DELETE FROM formulas WHERE sheet_id = ?1 AND address = ?2",
                            params![sheet_id, address],
                        )?;
                    }
                }
                tx.execute(
                    r#"
                    UPDATE sheets
                    SET max_row = MAX(max_row, ?2), max_col = MAX(max_col, ?3)
                    WHERE sheet_id = ?1
                    "#,
                    params![sheet_id, row + 1, col + 1],
                )?;
            }
        }

        tx.execute(
            r#"
            INSERT INTO edit_history (sheet_id, address, old_value, new_value, edited_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                sheet_id,
                address,
                old_value.map(|v| v.to_string()),
                value.as_ref().map(|v| v.to_string()),
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;

        debug!(sheet_id, address = %address, "Cell updated");
        Ok(true)
    }

    /// Edit log of one sheet, oldest first
    pub fn edit_history(&self, sheet_id: SheetId) -> MicroDbResult<Vec<CellEdit>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT address, old_value, new_value, edited_at
            FROM edit_history
            WHERE sheet_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![sheet_id], |r| {
            Ok(CellEdit {
                address: r.get(0)?,
                old_value: r.get(1)?,
                new_value: r.get(2)?,
                edited_at: r.get(3)?,
            })
        })?;

        let mut edits = Vec::new();
        for edit in rows {
            edits.push(edit?);
        }
        Ok(edits)
    }

    //==========================================================================
    // Project metadata
    //==========================================================================

    pub fn set_metadata(&mut self, key: &str, value: &str) -> MicroDbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO project_metadata (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    pub fn metadata(&self, key: &str) -> MicroDbResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM project_metadata WHERE key = ?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// All metadata entries sorted by key
    pub fn all_metadata(&self) -> MicroDbResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM project_metadata ORDER BY key")?;
        let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }
}

//==============================================================================
// Row mapping
//==============================================================================

fn sheet_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Sheet> {
    Ok(Sheet {
        sheet_id: r.get(0)?,
        name: r.get(1)?,
        position: r.get(2)?,
        max_row: r.get(3)?,
        max_col: r.get(4)?,
    })
}

/// `(value_type, value_number, value_string)` for a scalar
fn value_columns(value: &CellValue) -> (&'static str, Option<f64>, Option<&str>) {
    match value {
        CellValue::Number(n) => ("number", Some(*n), None),
        CellValue::Text(s) => ("text", None, Some(s.as_str())),
        CellValue::Bool(b) => ("bool", Some(if *b { 1.0 } else { 0.0 }), None),
        CellValue::Error(e) => ("error", None, Some(e.as_str())),
    }
}

fn value_from_columns(
    value_type: Option<String>,
    number: Option<f64>,
    string: Option<String>,
) -> Option<CellValue> {
    match value_type.as_deref()? {
        "number" => number.map(CellValue::Number),
        "bool" => number.map(|n| CellValue::Bool(n != 0.0)),
        "error" => string.map(CellValue::Error),
        _ => string.map(CellValue::Text),
    }
}

//==============================================================================
// Transaction helpers
//==============================================================================

fn upsert_sheet_tx(tx: &Transaction<'_>, name: &str) -> MicroDbResult<SheetId> {
    tx.execute(
        r#"
        INSERT INTO sheets (name, position)
        VALUES (?1, (SELECT COALESCE(MAX(position) + 1, 0) FROM sheets))
        ON CONFLICT(name) DO NOTHING
        "#,
        params![name],
    )?;
    let id = tx.query_row(
        "SELECT sheet_id FROM sheets WHERE name = ?1",
        params![name],
        |r| r.get(0),
    )?;
    Ok(id)
}

fn upsert_cell_tx(
    tx: &Transaction<'_>,
    sheet_id: SheetId,
    address: &str,
    row: u32,
    col: u32,
    value: &CellValue,
    is_formula: bool,
) -> MicroDbResult<()> {
    let (value_type, number, string) = value_columns(value);
    tx.execute(
        r#"
        INSERT INTO cells (
          sheet_id, address, row, col, value_type, value_number, value_string, is_formula
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(sheet_id, address) DO UPDATE SET
          value_type = excluded.value_type,
          value_number = excluded.value_number,
          value_string = excluded.value_string,
          is_formula = excluded.is_formula
        "#,
        params![sheet_id, address, row, col, value_type, number, string, is_formula],
    )?;
    Ok(())
}

/// Cells whose address does not parse cannot be ordered and are rejected.
fn replace_cells_tx(tx: &Transaction<'_>, sheet_id: SheetId, records: &[CellRecord]) -> MicroDbResult<()> {
    tx.execute("DELETE FROM cells WHERE sheet_id = ?1", params![sheet_id])?;
    let mut stmt = tx.prepare(
        r#"
        INSERT OR REPLACE INTO cells (
          sheet_id, address, row, col, value_type, value_number, value_string, is_formula
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )?;
    for record in records {
        let (row, col) = address_to_row_col(&record.address)?;
        let (value_type, number, string) = match &record.value {
            Some(value) => {
                let (t, n, s) = value_columns(value);
                (Some(t), n, s)
            }
            None => (None, None, None),
        };
        stmt.execute(params![
            sheet_id,
            row_col_to_address(row, col),
            row,
            col,
            value_type,
            number,
            string,
            record.is_formula
        ])?;
    }
    Ok(())
}

fn replace_formulas_tx(tx: &Transaction<'_>, sheet_id: SheetId, records: &[FormulaRecord]) -> MicroDbResult<()> {
    tx.execute("DELETE FROM formulas WHERE sheet_id = ?1", params![sheet_id])?;
    let mut stmt = tx.prepare(
        r#"
        INSERT OR REPLACE INTO formulas (sheet_id, address, row, col, formula_text)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?;
    for record in records {
        let (row, col) = address_to_row_col(&record.address)?;
        stmt.execute(params![
            sheet_id,
            row_col_to_address(row, col),
            row,
            col,
            record.formula
        ])?;
    }
    Ok(())
}

fn replace_styles_tx(tx: &Transaction<'_>, sheet_id: SheetId, records: &[StyleRecord]) -> MicroDbResult<()> {
    tx.execute("DELETE FROM styles WHERE sheet_id = ?1", params![sheet_id])?;
    let mut stmt = tx.prepare(
        r#"
        INSERT INTO styles (sheet_id, range_address, style_key, style_attributes_json)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )?;
    for record in records {
        stmt.execute(params![
            sheet_id,
            record.range_address,
            record.style_key,
            record.attributes.to_canonical_json()?
        ])?;
    }
    Ok(())
}

fn replace_merges_tx(tx: &Transaction<'_>, sheet_id: SheetId, merges: &[MergedRange]) -> MicroDbResult<()> {
    tx.execute("DELETE FROM merged_ranges WHERE sheet_id = ?1", params![sheet_id])?;
    let mut stmt =
        tx.prepare("INSERT OR IGNORE INTO merged_ranges (sheet_id, range_address) VALUES (?1, ?2)")?;
    for merge in merges {
        stmt.execute(params![sheet_id, merge.range_address])?;
    }
    Ok(())
}

fn replace_charts_tx(tx: &Transaction<'_>, sheet_id: SheetId, charts: &[ChartRecord]) -> MicroDbResult<()> {
    tx.execute("DELETE FROM charts WHERE sheet_id = ?1", params![sheet_id])?;
    let mut stmt = tx.prepare("INSERT INTO charts (sheet_id, chart_payload_json) VALUES (?1, ?2)")?;
    for chart in charts {
        stmt.execute(params![sheet_id, serde_json::to_value(chart)?])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::styles::{FillAttributes, StyleAttributes};
    use crate::types::{ChartKind, ChartSeries};
    use pretty_assertions::assert_eq;

    fn store_with_sheet(name: &str) -> (NormalizedStore, SheetId) {
        let mut store = NormalizedStore::open_in_memory().unwrap();
        let id = store.upsert_sheet(name).unwrap();
        (store, id)
    }

    #[test]
    fn test_upsert_sheet_is_create_or_fetch() {
        let mut store = NormalizedStore::open_in_memory().unwrap();
        let a = store.upsert_sheet("Sheet1").unwrap();
        let b = store.upsert_sheet("Sheet2").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.upsert_sheet("Sheet1").unwrap(), a);

        let names: Vec<_> = store.sheets().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Sheet1", "Sheet2"]);
    }

    #[test]
    fn test_replace_is_not_additive() {
        let (mut store, id) = store_with_sheet("Sheet1");
        store
            .replace_cell_records(
                id,
                &[
                    CellRecord::value("A1", CellValue::Number(1.0)),
                    CellRecord::value("B1", CellValue::from("x")),
                ],
            )
            .unwrap();
        store
            .replace_cell_records(id, &[CellRecord::value("C3", CellValue::Bool(true))])
            .unwrap();

        assert_eq!(
            store.cell_records(id).unwrap(),
            vec![CellRecord::value("C3", CellValue::Bool(true))]
        );
    }

    #[test]
    fn test_cells_are_row_major() {
        let (mut store, id) = store_with_sheet("Sheet1");
        store
            .replace_cell_records(
                id,
                &[
                    CellRecord::value("B2", CellValue::Number(4.0)),
                    CellRecord::value("AA1", CellValue::Number(2.0)),
                    CellRecord::value("B1", CellValue::Number(1.0)),
                    CellRecord::value("A2", CellValue::Number(3.0)),
                ],
            )
            .unwrap();
        let addresses: Vec<_> = store
            .cell_records(id)
            .unwrap()
            .into_iter()
            .map(|c| c.address)
            .collect();
        assert_eq!(addresses, vec!["B1", "AA1", "A2", "B2"]);
    }

    #[test]
    fn test_styles_and_charts_round_trip_through_json() {
        let (mut store, id) = store_with_sheet("Sheet1");
        let style = StyleRecord {
            range_address: "A1".to_string(),
            style_key: "00000000000000ff".to_string(),
            attributes: StyleAttributes {
                fill: Some(FillAttributes {
                    pattern: "solid".to_string(),
                    fg_color: Some("FF0000".to_string()),
                    bg_color: None,
                }),
                ..Default::default()
            },
        };
        store.replace_style_records(id, &[style.clone()]).unwrap();
        assert_eq!(store.style_records(id).unwrap(), vec![style]);

        let mut chart = ChartRecord::new(ChartKind::Line);
        chart.series.push(ChartSeries {
            values: Some("Sheet1!$B$1:$B$4".to_string()),
            ..Default::default()
        });
        store.replace_charts(id, &[chart.clone()]).unwrap();
        assert_eq!(store.charts(id).unwrap(), vec![chart]);
    }

    #[test]
    fn test_update_cell_leaves_other_cells_alone() {
        let (mut store, id) = store_with_sheet("Sheet1");
        store
            .replace_cell_records(
                id,
                &[
                    CellRecord::value("A1", CellValue::from("old")),
                    CellRecord::value("A2", CellValue::Number(7.0)),
                ],
            )
            .unwrap();

        assert!(store.update_cell_value(id, "A1", Some(CellValue::Number(42.0))).unwrap());
        assert_eq!(
            store.cell_records(id).unwrap(),
            vec![
                CellRecord::value("A1", CellValue::Number(42.0)),
                CellRecord::value("A2", CellValue::Number(7.0)),
            ]
        );

        let history = store.edit_history(id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_value.as_deref(), Some("old"));
        assert_eq!(history[0].new_value.as_deref(), Some("42"));
    }

    #[test]
    fn test_update_cell_formula_and_back() {
        let (mut store, id) = store_with_sheet("Sheet1");
        store
            .update_cell_value(id, "c5", Some(CellValue::from("=A1*2")))
            .unwrap();
        assert_eq!(
            store.formula_records(id).unwrap(),
            vec![FormulaRecord {
                address: "C5".to_string(),
                formula: "=A1*2".to_string(),
            }]
        );
        assert!(store.cell_records(id).unwrap()[0].is_formula);

        store
            .update_cell_value(id, "C5", Some(CellValue::Number(3.0)))
            .unwrap();
        assert!(store.formula_records(id).unwrap().is_empty());

        store.update_cell_value(id, "C5", None).unwrap();
        assert!(store.cell_records(id).unwrap().is_empty());
        assert_eq!(store.edit_history(id).unwrap().len(), 3);
    }

    #[test]
    fn test_update_cell_unknown_sheet_or_bad_address() {
        let (mut store, id) = store_with_sheet("Sheet1");
        assert!(!store.update_cell_value(id + 100, "A1", None).unwrap());
        assert!(matches!(
            store.update_cell_value(id, "1A", None),
            Err(MicroDbError::Address(_))
        ));
    }

    #[test]
    fn test_rename_sheet() {
        let mut store = NormalizedStore::open_in_memory().unwrap();
        let old = store.upsert_sheet("Old").unwrap();
        store.upsert_sheet("New").unwrap();

        assert!(!store.rename_sheet("Old", "New").unwrap());
        assert_eq!(store.sheet_id("Old").unwrap(), old);

        assert!(store.rename_sheet("Old", "Renamed").unwrap());
        assert_eq!(store.sheet_id("Renamed").unwrap(), old);
        assert!(matches!(store.sheet_id("Old"), Err(MicroDbError::SheetNotFound(_))));
        assert!(!store.rename_sheet("Missing", "Other").unwrap());
    }

    #[test]
    fn test_create_sheet_rejects_duplicates() {
        let (mut store, _) = store_with_sheet("Sheet1");
        assert!(matches!(
            store.create_sheet("Sheet1"),
            Err(MicroDbError::SheetExists(_))
        ));
        store.create_sheet("Sheet2").unwrap();
        assert_eq!(store.sheets().unwrap()[1].position, 1);
    }

    #[test]
    fn test_metadata() {
        let mut store = NormalizedStore::open_in_memory().unwrap();
        store.set_metadata("source_path", "a.xlsx").unwrap();
        store.set_metadata("source_path", "b.xlsx").unwrap();
        assert_eq!(store.metadata("source_path").unwrap().as_deref(), Some("b.xlsx"));
        assert_eq!(store.metadata("missing").unwrap(), None);
        assert_eq!(store.all_metadata().unwrap().len(), 1);
    }
}
