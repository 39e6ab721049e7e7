use std::sync::Arc;

use drill_core::csv::to_csv;
use drill_core::model::ResultRecord;
use drill_storage::repository::ResultLogRepository;

use crate::error::ExportError;

/// Teacher-view export over the accumulated results log.
#[derive(Clone)]
pub struct ExportService {
    results: Arc<dyn ResultLogRepository>,
}

impl ExportService {
    #[must_use]
    pub fn new(results: Arc<dyn ResultLogRepository>) -> Self {
        Self { results }
    }

    /// Serialize the whole log as CSV text in the stable field order.
    ///
    /// An empty log yields an empty string with no header.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Storage` if the log cannot be read.
    pub async fn export_csv(&self) -> Result<String, ExportError> {
        let records = self.results.list_all().await?;
        let rows: Vec<Vec<(&'static str, Option<String>)>> =
            records.iter().map(ResultRecord::csv_fields).collect();
        log::debug!("exporting {} result records as CSV", records.len());
        Ok(to_csv(&rows))
    }

    /// Wipe the results log.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Storage` if the log cannot be cleared.
    pub async fn clear(&self) -> Result<(), ExportError> {
        self.results.clear().await?;
        log::info!("results log cleared");
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::model::{SessionMode, StudentIdentity, TableSelection};
    use drill_core::stats::SessionStats;
    use drill_core::time::fixed_now;
    use drill_storage::repository::InMemoryResultLog;

    fn build_record(name: &str) -> ResultRecord {
        let identity = StudentIdentity::new(name, "4B").unwrap();
        let tables = TableSelection::new([2, 5]).unwrap();
        let stats = SessionStats {
            attempts: 4,
            completed: 4,
            correct: 3,
            streak: 1,
            fastest_ms: Some(500),
            slowest_ms: Some(2_000),
        };
        ResultRecord::from_session(
            fixed_now(),
            &identity,
            SessionMode::Fixed { target: 4 },
            &tables,
            &stats,
            60_000,
        )
    }

    #[tokio::test]
    async fn empty_log_exports_empty_string() {
        let svc = ExportService::new(Arc::new(InMemoryResultLog::new()));
        assert_eq!(svc.export_csv().await.unwrap(), "");
    }

    #[tokio::test]
    async fn export_has_header_and_one_line_per_record() {
        let log = InMemoryResultLog::new();
        log.append(&build_record("Ada")).await.unwrap();
        log.append(&build_record("Grace")).await.unwrap();

        let svc = ExportService::new(Arc::new(log));
        let csv = svc.export_csv().await.unwrap();

        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,name,classCode,mode,selectedTables"));
        assert!(lines[1].contains("Ada"));
        assert!(lines[2].contains("Grace"));
        assert!(!csv.ends_with('\n'));
    }

    #[tokio::test]
    async fn fields_with_commas_are_quoted() {
        let identity = StudentIdentity::new("Lovelace, Ada", "4B").unwrap();
        let tables = TableSelection::new([2]).unwrap();
        let record = ResultRecord::from_session(
            fixed_now(),
            &identity,
            SessionMode::Fixed { target: 1 },
            &tables,
            &SessionStats::default(),
            1_000,
        );
        let log = InMemoryResultLog::new();
        log.append(&record).await.unwrap();

        let svc = ExportService::new(Arc::new(log));
        let csv = svc.export_csv().await.unwrap();
        assert!(csv.contains("\"Lovelace, Ada\""));
    }

    #[tokio::test]
    async fn clear_resets_the_export() {
        let log = InMemoryResultLog::new();
        log.append(&build_record("Ada")).await.unwrap();

        let svc = ExportService::new(Arc::new(log));
        svc.clear().await.unwrap();
        assert_eq!(svc.export_csv().await.unwrap(), "");
    }
}
