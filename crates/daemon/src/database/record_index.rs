use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use common::record::{IndexError, RecordIndex, RecordIndexEntry};

use crate::database::types::{DCid, DUuid};
use crate::database::Database;

fn backend(e: sqlx::Error) -> IndexError {
    IndexError::Backend(e.to_string())
}

fn entry_from_row(row: &SqliteRow) -> Result<RecordIndexEntry, IndexError> {
    let record_id: DUuid = row.try_get("record_id").map_err(backend)?;
    let record_id: Uuid = record_id.into();
    let corrupt = |reason: String| IndexError::Corrupt {
        record_id: record_id.to_string(),
        reason,
    };

    let cid: DCid = row.try_get("cid").map_err(|e| corrupt(e.to_string()))?;
    let created_at: String = row.try_get("created_at").map_err(backend)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| corrupt(format!("bad created_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(RecordIndexEntry {
        record_id,
        anchor_key: row.try_get("anchor_key").map_err(backend)?,
        cid: cid.into(),
        created_at,
    })
}

#[async_trait]
impl RecordIndex for Database {
    async fn upsert(&self, entry: &RecordIndexEntry) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            INSERT INTO records (record_id, anchor_key, cid, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(record_id) DO UPDATE SET
                anchor_key = excluded.anchor_key,
                cid = excluded.cid,
                created_at = excluded.created_at
            "#,
        )
        .bind(DUuid::from(entry.record_id))
        .bind(&entry.anchor_key)
        .bind(DCid::from(entry.cid))
        .bind(entry.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&**self)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn get(&self, record_id: Uuid) -> Result<Option<RecordIndexEntry>, IndexError> {
        let row = sqlx::query(
            r#"
            SELECT record_id, anchor_key, cid, created_at
            FROM records
            WHERE record_id = $1
            "#,
        )
        .bind(DUuid::from(record_id))
        .fetch_optional(&**self)
        .await
        .map_err(backend)?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<RecordIndexEntry>, IndexError> {
        let rows = sqlx::query(
            r#"
            SELECT record_id, anchor_key, cid, created_at
            FROM records
            ORDER BY created_at ASC, record_id ASC
            "#,
        )
        .fetch_all(&**self)
        .await
        .map_err(backend)?;

        rows.iter().map(entry_from_row).collect()
    }
}
