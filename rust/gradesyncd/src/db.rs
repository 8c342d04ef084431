use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "gradesync.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_text(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value_json FROM settings WHERE key = ?",
        [key],
        |r| r.get(0),
    )
    .optional()
}

// Single statement, so a reader never observes a half-written value.
pub fn settings_set_text(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value),
    )?;
    Ok(())
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let Some(text) = settings_get_text(conn, key)? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&text)?))
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    settings_set_text(conn, key, &serde_json::to_string(value)?)?;
    Ok(())
}

pub fn settings_delete(conn: &Connection, key: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn settings_json_roundtrip_and_delete() {
        let ws = temp_dir("gradesync-db-settings");
        let conn = open_db(&ws).expect("open db");
        assert!(ws.join(DB_FILE_NAME).is_file());

        assert_eq!(settings_get_json(&conn, "k").expect("get"), None);
        settings_set_json(&conn, "k", &json!({ "a": 1 })).expect("set");
        settings_set_json(&conn, "k", &json!({ "a": 2 })).expect("overwrite");
        assert_eq!(
            settings_get_json(&conn, "k").expect("get"),
            Some(json!({ "a": 2 }))
        );
        settings_delete(&conn, "k").expect("delete");
        assert_eq!(settings_get_text(&conn, "k").expect("get"), None);

        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn reopening_keeps_existing_rows() {
        let ws = temp_dir("gradesync-db-reopen");
        {
            let conn = open_db(&ws).expect("open db");
            settings_set_text(&conn, "k", "[]").expect("set");
        }
        let conn = open_db(&ws).expect("reopen db");
        assert_eq!(
            settings_get_text(&conn, "k").expect("get").as_deref(),
            Some("[]")
        );
        let _ = std::fs::remove_dir_all(ws);
    }
}
