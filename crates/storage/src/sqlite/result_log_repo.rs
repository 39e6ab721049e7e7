use drill_core::model::ResultRecord;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{ResultLogRepository, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn tables_from_text(raw: &str) -> Result<Vec<u32>, StorageError> {
    raw.split_whitespace()
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| StorageError::Serialization(format!("invalid table number: {part}")))
        })
        .collect()
}

fn map_record_row(row: &sqlx::sqlite::SqliteRow) -> Result<ResultRecord, StorageError> {
    let timestamp = row.try_get("timestamp").map_err(ser)?;
    let name: String = row.try_get("name").map_err(ser)?;
    let class_code: String = row.try_get("class_code").map_err(ser)?;
    let mode: String = row.try_get("mode").map_err(ser)?;
    let tables_raw: String = row.try_get("selected_tables").map_err(ser)?;
    let selected_tables = tables_from_text(&tables_raw)?;
    let questions_target = u32_from_i64(
        "questions_target",
        row.try_get::<i64, _>("questions_target").map_err(ser)?,
    )?;
    let attempts = u32_from_i64("attempts", row.try_get::<i64, _>("attempts").map_err(ser)?)?;
    let completed = u32_from_i64(
        "completed",
        row.try_get::<i64, _>("completed").map_err(ser)?,
    )?;
    let correct = u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?;
    let accuracy = u32_from_i64("accuracy", row.try_get::<i64, _>("accuracy").map_err(ser)?)?;
    let duration_ms = u64_from_i64(
        "duration_ms",
        row.try_get::<i64, _>("duration_ms").map_err(ser)?,
    )?;
    let q_per_min: f64 = row.try_get("q_per_min").map_err(ser)?;
    let fastest_ms = row
        .try_get::<Option<i64>, _>("fastest_ms")
        .map_err(ser)?
        .map(|v| u64_from_i64("fastest_ms", v))
        .transpose()?;
    let slowest_ms = row
        .try_get::<Option<i64>, _>("slowest_ms")
        .map_err(ser)?
        .map(|v| u64_from_i64("slowest_ms", v))
        .transpose()?;

    ResultRecord::from_persisted(
        timestamp,
        name,
        class_code,
        mode,
        selected_tables,
        questions_target,
        attempts,
        completed,
        correct,
        accuracy,
        duration_ms,
        q_per_min,
        fastest_ms,
        slowest_ms,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl ResultLogRepository for SqliteRepository {
    async fn append(&self, record: &ResultRecord) -> Result<i64, StorageError> {
        let tables: Vec<String> = record
            .selected_tables()
            .iter()
            .map(ToString::to_string)
            .collect();

        let res = sqlx::query(
            r"
                INSERT INTO result_records (
                    timestamp, name, class_code, mode, selected_tables,
                    questions_target, attempts, completed, correct, accuracy,
                    duration_ms, q_per_min, fastest_ms, slowest_ms
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ",
        )
        .bind(record.timestamp())
        .bind(record.name())
        .bind(record.class_code())
        .bind(record.mode())
        .bind(tables.join(" "))
        .bind(i64::from(record.questions_target()))
        .bind(i64::from(record.attempts()))
        .bind(i64::from(record.completed()))
        .bind(i64::from(record.correct()))
        .bind(i64::from(record.accuracy()))
        .bind(id_i64("duration_ms", record.duration_ms())?)
        .bind(record.q_per_min())
        .bind(
            record
                .fastest_ms()
                .map(|v| id_i64("fastest_ms", v))
                .transpose()?,
        )
        .bind(
            record
                .slowest_ms()
                .map(|v| id_i64("slowest_ms", v))
                .transpose()?,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }

    async fn get(&self, id: i64) -> Result<ResultRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    timestamp, name, class_code, mode, selected_tables,
                    questions_target, attempts, completed, correct, accuracy,
                    duration_ms, q_per_min, fastest_ms, slowest_ms
                FROM result_records
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_record_row(&row)
    }

    async fn list_all(&self) -> Result<Vec<ResultRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, timestamp, name, class_code, mode, selected_tables,
                    questions_target, attempts, completed, correct, accuracy,
                    duration_ms, q_per_min, fastest_ms, slowest_ms
                FROM result_records
                ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match map_record_row(&row) {
                Ok(record) => out.push(record),
                Err(err) => {
                    // Corrupt rows are skipped, never fatal.
                    let id: i64 = row.try_get("id").unwrap_or(-1);
                    log::warn!("skipping unreadable result record {id}: {err}");
                }
            }
        }

        Ok(out)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM result_records")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
