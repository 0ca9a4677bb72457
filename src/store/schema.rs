use rusqlite::Connection;

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    // Foreign keys are off by default in SQLite
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sheets (
          sheet_id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL UNIQUE,
          position INTEGER NOT NULL DEFAULT 0,
          max_row INTEGER NOT NULL DEFAULT 0,
          max_col INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS cells (
          sheet_id INTEGER NOT NULL REFERENCES sheets(sheet_id) ON DELETE CASCADE,
          address TEXT NOT NULL,
          row INTEGER NOT NULL,
          col INTEGER NOT NULL,
          value_type TEXT,  -- 'number', 'text', 'bool', 'error'
          value_number REAL,
          value_string TEXT,
          is_formula INTEGER NOT NULL DEFAULT 0,
          PRIMARY KEY (sheet_id, address)
        );

        CREATE INDEX IF NOT EXISTS idx_cells_sheet_pos ON cells(sheet_id, row, col);

        CREATE TABLE IF NOT EXISTS formulas (
          sheet_id INTEGER NOT NULL REFERENCES sheets(sheet_id) ON DELETE CASCADE,
          address TEXT NOT NULL,
          row INTEGER NOT NULL,
          col INTEGER NOT NULL,
          formula_text TEXT NOT NULL,
          PRIMARY KEY (sheet_id, address)
        );

        CREATE TABLE IF NOT EXISTS styles (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          sheet_id INTEGER NOT NULL REFERENCES sheets(sheet_id) ON DELETE CASCADE,
          range_address TEXT NOT NULL,
          style_key TEXT NOT NULL,
          style_attributes_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_styles_sheet ON styles(sheet_id);
        CREATE INDEX IF NOT EXISTS idx_styles_key ON styles(style_key);

        CREATE TABLE IF NOT EXISTS merged_ranges (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          sheet_id INTEGER NOT NULL REFERENCES sheets(sheet_id) ON DELETE CASCADE,
          range_address TEXT NOT NULL,
          UNIQUE (sheet_id, range_address)
        );

        CREATE TABLE IF NOT EXISTS charts (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          sheet_id INTEGER NOT NULL REFERENCES sheets(sheet_id) ON DELETE CASCADE,
          chart_payload_json JSON NOT NULL
        );

        CREATE TABLE IF NOT EXISTS edit_history (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          sheet_id INTEGER NOT NULL REFERENCES sheets(sheet_id) ON DELETE CASCADE,
          address TEXT NOT NULL,
          old_value TEXT,
          new_value TEXT,
          edited_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_edit_history_sheet ON edit_history(sheet_id);

        CREATE TABLE IF NOT EXISTS project_metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                 ('sheets', 'cells', 'formulas', 'styles', 'merged_ranges', 'charts', \
                  'edit_history', 'project_metadata')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 8);
    }
}
