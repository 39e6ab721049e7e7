use async_trait::async_trait;
use drill_core::model::ResultRecord;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for the append-only results log.
///
/// The log is only ever appended to or wholly cleared, never edited in
/// place. Implementations must tolerate corrupt prior data by skipping it
/// rather than failing the whole listing.
#[async_trait]
pub trait ResultLogRepository: Send + Sync {
    /// Append one record and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn append(&self, record: &ResultRecord) -> Result<i64, StorageError>;

    /// Fetch a single record by row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get(&self, id: i64) -> Result<ResultRecord, StorageError>;

    /// All records in insertion order. Unreadable rows are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only when the log itself cannot be read.
    async fn list_all(&self) -> Result<Vec<ResultRecord>, StorageError>;

    /// Remove every record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be cleared.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Simple in-memory results log for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryResultLog {
    records: Arc<Mutex<Vec<ResultRecord>>>,
}

impl InMemoryResultLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultLogRepository for InMemoryResultLog {
    async fn append(&self, record: &ResultRecord) -> Result<i64, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(record.clone());
        i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("row id overflow".into()))
    }

    async fn get(&self, id: i64) -> Result<ResultRecord, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let index = usize::try_from(id.checked_sub(1).ok_or(StorageError::NotFound)?)
            .map_err(|_| StorageError::NotFound)?;
        guard.get(index).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_all(&self) -> Result<Vec<ResultRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.clear();
        Ok(())
    }
}

/// Aggregates the results log behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub results: Arc<dyn ResultLogRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            results: Arc::new(InMemoryResultLog::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::model::{SessionMode, StudentIdentity, TableSelection};
    use drill_core::stats::SessionStats;
    use drill_core::time::fixed_now;

    fn build_record(name: &str) -> ResultRecord {
        let identity = StudentIdentity::new(name, "4B").unwrap();
        let tables = TableSelection::new([2, 3]).unwrap();
        let stats = SessionStats {
            attempts: 10,
            completed: 10,
            correct: 8,
            streak: 4,
            fastest_ms: Some(700),
            slowest_ms: Some(3_000),
        };
        ResultRecord::from_session(
            fixed_now(),
            &identity,
            SessionMode::Fixed { target: 10 },
            &tables,
            &stats,
            90_000,
        )
    }

    #[tokio::test]
    async fn append_then_list_preserves_order() {
        let log = InMemoryResultLog::new();
        let first_id = log.append(&build_record("Ada")).await.unwrap();
        let second_id = log.append(&build_record("Grace")).await.unwrap();
        assert!(second_id > first_id);

        let all = log.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name(), "Ada");
        assert_eq!(all[1].name(), "Grace");
    }

    #[tokio::test]
    async fn get_round_trips_by_id() {
        let log = InMemoryResultLog::new();
        let id = log.append(&build_record("Ada")).await.unwrap();
        let fetched = log.get(id).await.unwrap();
        assert_eq!(fetched.name(), "Ada");

        assert!(matches!(log.get(99).await, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn clear_empties_the_log() {
        let log = InMemoryResultLog::new();
        log.append(&build_record("Ada")).await.unwrap();
        log.clear().await.unwrap();
        assert!(log.list_all().await.unwrap().is_empty());
    }
}
