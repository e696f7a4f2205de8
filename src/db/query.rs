use anyhow::Result;
use rusqlite::{Connection, params, OptionalExtension};

pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| row.get::<_, String>(0))
        .optional()?;
    Ok(value)
}

pub fn count_keys(conn: &Connection) -> Result<i64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM kv_store", [], |r| r.get(0))?;
    Ok(n)
}
