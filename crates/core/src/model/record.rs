use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{SessionMode, StudentIdentity, TableSelection};
use crate::stats::SessionStats;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    #[error("correct ({correct}) exceeds attempts ({attempts})")]
    CorrectExceedsAttempts { correct: u32, attempts: u32 },

    #[error("completed ({completed}) exceeds attempts ({attempts})")]
    CompletedExceedsAttempts { completed: u32, attempts: u32 },
}

/// Immutable end-of-session snapshot appended to the results log.
///
/// Combines identity, configuration, final stats, and the derived accuracy
/// and throughput figures. Written exactly once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    timestamp: DateTime<Utc>,
    name: String,
    class_code: String,
    mode: String,
    selected_tables: Vec<u32>,
    questions_target: u32,
    attempts: u32,
    completed: u32,
    correct: u32,
    accuracy: u32,
    duration_ms: u64,
    q_per_min: f64,
    fastest_ms: Option<u64>,
    slowest_ms: Option<u64>,
}

impl ResultRecord {
    /// Build the snapshot for a finished session.
    #[must_use]
    pub fn from_session(
        timestamp: DateTime<Utc>,
        identity: &StudentIdentity,
        mode: SessionMode,
        tables: &TableSelection,
        stats: &SessionStats,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp,
            name: identity.name().to_owned(),
            class_code: identity.class_code().to_owned(),
            mode: mode.label().to_owned(),
            selected_tables: tables.tables().to_vec(),
            questions_target: mode.questions_target(),
            attempts: stats.attempts,
            completed: stats.completed,
            correct: stats.correct,
            accuracy: Self::accuracy_percent(stats.correct, stats.attempts),
            duration_ms,
            q_per_min: Self::questions_per_minute(stats.completed, duration_ms),
            fastest_ms: stats.fastest_ms,
            slowest_ms: stats.slowest_ms,
        }
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` if the stored counters are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        timestamp: DateTime<Utc>,
        name: String,
        class_code: String,
        mode: String,
        selected_tables: Vec<u32>,
        questions_target: u32,
        attempts: u32,
        completed: u32,
        correct: u32,
        accuracy: u32,
        duration_ms: u64,
        q_per_min: f64,
        fastest_ms: Option<u64>,
        slowest_ms: Option<u64>,
    ) -> Result<Self, RecordError> {
        if correct > attempts {
            return Err(RecordError::CorrectExceedsAttempts { correct, attempts });
        }
        if completed > attempts {
            return Err(RecordError::CompletedExceedsAttempts {
                completed,
                attempts,
            });
        }

        Ok(Self {
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
        })
    }

    /// Integer-percent accuracy; 0 when nothing was attempted.
    #[must_use]
    pub fn accuracy_percent(correct: u32, attempts: u32) -> u32 {
        if attempts == 0 {
            return 0;
        }
        let ratio = 100.0 * f64::from(correct) / f64::from(attempts);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            ratio.round() as u32
        }
    }

    /// Resolved questions per minute of session time; 0 for a zero duration.
    #[must_use]
    pub fn questions_per_minute(completed: u32, duration_ms: u64) -> f64 {
        if duration_ms == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            f64::from(completed) * 60_000.0 / duration_ms as f64
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn class_code(&self) -> &str {
        &self.class_code
    }

    #[must_use]
    pub fn mode(&self) -> &str {
        &self.mode
    }

    #[must_use]
    pub fn selected_tables(&self) -> &[u32] {
        &self.selected_tables
    }

    #[must_use]
    pub fn questions_target(&self) -> u32 {
        self.questions_target
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn completed(&self) -> u32 {
        self.completed
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn accuracy(&self) -> u32 {
        self.accuracy
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    #[must_use]
    pub fn q_per_min(&self) -> f64 {
        self.q_per_min
    }

    #[must_use]
    pub fn fastest_ms(&self) -> Option<u64> {
        self.fastest_ms
    }

    #[must_use]
    pub fn slowest_ms(&self) -> Option<u64> {
        self.slowest_ms
    }

    fn joined_tables(&self) -> String {
        let parts: Vec<String> = self.selected_tables.iter().map(ToString::to_string).collect();
        parts.join(" ")
    }

    /// Fields in the stable export order used for the CSV header.
    #[must_use]
    pub fn csv_fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("timestamp", Some(self.timestamp.to_rfc3339())),
            ("name", Some(self.name.clone())),
            ("classCode", Some(self.class_code.clone())),
            ("mode", Some(self.mode.clone())),
            ("selectedTables", Some(self.joined_tables())),
            ("questionsTarget", Some(self.questions_target.to_string())),
            ("attempts", Some(self.attempts.to_string())),
            ("completed", Some(self.completed.to_string())),
            ("correct", Some(self.correct.to_string())),
            ("accuracy", Some(self.accuracy.to_string())),
            ("durationMs", Some(self.duration_ms.to_string())),
            ("qPerMin", Some(format!("{:.1}", self.q_per_min))),
            ("fastestMs", self.fastest_ms.map(|ms| ms.to_string())),
            ("slowestMs", self.slowest_ms.map(|ms| ms.to_string())),
        ]
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
