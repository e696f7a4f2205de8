use anyhow::Result;
use rusqlite::{Connection, params};

pub fn set_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
        params![key, value, now],
    )?;
    Ok(())
}

/// Returns true when a row was actually removed.
pub fn remove_value(conn: &Connection, key: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
    Ok(n > 0)
}
