use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{AssetProvenance, LinkedText, NaturalKey, Record, StoredRecord, SubjectInfo};

pub fn connect(path: &Path) -> Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("Failed to open store {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// One JSON document per record. The key columns duplicate fields of `doc`
/// so the natural key can be indexed and kept unique.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            id             INTEGER PRIMARY KEY,
            subject_text   TEXT NOT NULL,
            presented_date TEXT NOT NULL,
            presented_by   TEXT NOT NULL,
            doc            TEXT NOT NULL,
            UNIQUE(subject_text, presented_date, presented_by)
        );
        CREATE INDEX IF NOT EXISTS idx_records_date ON records(presented_date);
        ",
    )?;
    Ok(())
}

/// Delete every record. Returns how many were removed.
pub fn purge(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("DELETE FROM records", [])?)
}

pub fn count(conn: &Connection) -> Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))?;
    Ok(n as usize)
}

// ── Reads ──

pub fn find_by_key(conn: &Connection, key: &NaturalKey) -> Result<Option<StoredRecord>> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, doc FROM records
             WHERE subject_text = ?1 AND presented_date = ?2 AND presented_by = ?3",
            params![key.subject, key.date_text(), key.presented_by],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    row.map(|(id, doc)| decode(id, &doc)).transpose()
}

pub fn fetch_all(conn: &Connection) -> Result<Vec<StoredRecord>> {
    let mut stmt = conn.prepare("SELECT id, doc FROM records ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    rows.iter().map(|(id, doc)| decode(*id, doc)).collect()
}

/// Records whose presentation year lies within the inclusive bounds. A missing bound is open.
pub fn fetch_in_year_range(
    conn: &Connection,
    ini_year: Option<i32>,
    fin_year: Option<i32>,
) -> Result<Vec<StoredRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, doc FROM records
         WHERE (?1 IS NULL OR CAST(substr(presented_date, 1, 4) AS INTEGER) >= ?1)
           AND (?2 IS NULL OR CAST(substr(presented_date, 1, 4) AS INTEGER) <= ?2)
         ORDER BY presented_date, id",
    )?;
    let rows = stmt
        .query_map(params![ini_year, fin_year], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.iter().map(|(id, doc)| decode(*id, doc)).collect()
}

fn decode(id: i64, doc: &str) -> Result<StoredRecord> {
    let record: Record = serde_json::from_str(doc)
        .with_context(|| format!("Malformed document for record {}", id))?;
    Ok(StoredRecord { id, record })
}

// ── Writes ──

pub fn insert_record(conn: &Connection, record: &Record) -> Result<i64> {
    let key = record.key();
    let doc = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO records (subject_text, presented_date, presented_by, doc)
         VALUES (?1, ?2, ?3, ?4)",
        params![key.subject, key.date_text(), key.presented_by, doc],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Replace `status` and bump `modified` on the record matching `key`.
pub fn update_status(
    conn: &Connection,
    key: &NaturalKey,
    status: &LinkedText,
    modified: NaiveDateTime,
) -> Result<usize> {
    let n = conn.execute(
        "UPDATE records SET doc = json_set(doc, '$.status', json(?1), '$.modified', json(?2))
         WHERE subject_text = ?3 AND presented_date = ?4 AND presented_by = ?5",
        params![
            serde_json::to_string(status)?,
            serde_json::to_string(&modified)?,
            key.subject,
            key.date_text(),
            key.presented_by,
        ],
    )?;
    Ok(n)
}

/// Replace `subject_info` and bump `modified` on the record matching `key`.
pub fn update_subject_info(
    conn: &Connection,
    key: &NaturalKey,
    info: &SubjectInfo,
    modified: NaiveDateTime,
) -> Result<usize> {
    let n = conn.execute(
        "UPDATE records SET doc = json_set(doc, '$.subject_info', json(?1), '$.modified', json(?2))
         WHERE subject_text = ?3 AND presented_date = ?4 AND presented_by = ?5",
        params![
            serde_json::to_string(info)?,
            serde_json::to_string(&modified)?,
            key.subject,
            key.date_text(),
            key.presented_by,
        ],
    )?;
    Ok(n)
}

pub fn update_assets(
    conn: &Connection,
    id: i64,
    assets: &AssetProvenance,
    modified: NaiveDateTime,
) -> Result<usize> {
    let n = conn.execute(
        "UPDATE records SET doc = json_set(doc,
             '$.pdf_url', ?1,
             '$.pdf_filename', ?2,
             '$.text_filename', ?3,
             '$.modified', json(?4))
         WHERE id = ?5",
        params![
            assets.pdf_url,
            assets.pdf_filename,
            assets.text_filename,
            serde_json::to_string(&modified)?,
            id,
        ],
    )?;
    Ok(n)
}

#[cfg(test)]
pub(crate) fn memory() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    conn
}
