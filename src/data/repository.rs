use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::AppError;
use crate::models::media_file::{parse_size, MediaFileRecord};

const MEDIA_COLUMNS: &str =
    "id, name, mime_type, size_bytes, md5_checksum, parent_folder_id, indexed_at";

fn media_file_from_row(row: &Row<'_>) -> Result<MediaFileRecord, rusqlite::Error> {
    let size_raw: String = row.get(3)?;
    let size = parse_size(&size_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(MediaFileRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        mime_type: row.get(2)?,
        size,
        md5_checksum: row.get(4)?,
        parent_folder_id: row.get(5)?,
        indexed_at: row.get(6)?,
    })
}

/// Writes `record`, replacing any stored record with the same id.
pub fn upsert_media_file(conn: &Connection, record: &MediaFileRecord) -> Result<(), AppError> {
    conn.execute(
        "INSERT OR REPLACE INTO media_files (id, name, mime_type, size_bytes, md5_checksum, parent_folder_id, indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id,
            record.name,
            record.mime_type,
            record.size.to_string(),
            record.md5_checksum,
            record.parent_folder_id,
            record.indexed_at,
        ],
    )?;
    Ok(())
}

pub fn get_all_media_files(conn: &Connection) -> Result<Vec<MediaFileRecord>, AppError> {
    let mut stmt = conn.prepare(&format!("SELECT {MEDIA_COLUMNS} FROM media_files"))?;
    let records = stmt
        .query_map([], media_file_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

pub fn get_media_file(conn: &Connection, id: &str) -> Result<Option<MediaFileRecord>, AppError> {
    let mut stmt = conn.prepare(&format!("SELECT {MEDIA_COLUMNS} FROM media_files WHERE id = ?1"))?;
    let record = stmt
        .query_row(params![id], media_file_from_row)
        .optional()?;
    Ok(record)
}

/// Deletes every record and returns how many were removed.
pub fn clear_media_files(conn: &Connection) -> Result<usize, AppError> {
    let count = conn.execute("DELETE FROM media_files", [])?;
    Ok(count)
}
