use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::fact::{MULTIPLIER_MAX, MULTIPLIER_MIN};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("no times tables selected")]
    EmptyTables,

    #[error("table {provided} is outside {MULTIPLIER_MIN}..={MULTIPLIER_MAX}")]
    TableOutOfRange { provided: u32 },

    #[error("student name is required")]
    MissingName,

    #[error("class code is required")]
    MissingClassCode,

    #[error("fixed sessions need a question target of at least 1")]
    ZeroTarget,

    #[error("timed sessions need a positive duration")]
    ZeroDuration,
}

//
// ─── TABLE SELECTION ───────────────────────────────────────────────────────────
//

/// Validated, deduplicated set of selected times tables.
///
/// Guaranteed non-empty with every table in the multiplier range, so a
/// session built from it can always produce questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSelection(Vec<u32>);

impl TableSelection {
    /// Build a selection from raw table numbers.
    ///
    /// Duplicates are dropped and the result is sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyTables` for an empty input and
    /// `ConfigError::TableOutOfRange` for any table outside `1..=12`.
    pub fn new(tables: impl IntoIterator<Item = u32>) -> Result<Self, ConfigError> {
        let mut tables: Vec<u32> = tables.into_iter().collect();
        for &table in &tables {
            if !(MULTIPLIER_MIN..=MULTIPLIER_MAX).contains(&table) {
                return Err(ConfigError::TableOutOfRange { provided: table });
            }
        }
        tables.sort_unstable();
        tables.dedup();
        if tables.is_empty() {
            return Err(ConfigError::EmptyTables);
        }
        Ok(Self(tables))
    }

    #[must_use]
    pub fn tables(&self) -> &[u32] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Space-joined table numbers, the form used in exported records.
    #[must_use]
    pub fn joined(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        parts.join(" ")
    }
}

impl fmt::Display for TableSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joined())
    }
}

//
// ─── SESSION MODE ──────────────────────────────────────────────────────────────
//

/// How a practice session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    /// Ends after a fixed number of resolved questions.
    Fixed { target: u32 },
    /// Ends when the countdown reaches zero.
    Timed { duration_ms: u64 },
}

impl SessionMode {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SessionMode::Fixed { .. } => "fixed",
            SessionMode::Timed { .. } => "timed",
        }
    }

    /// Question target for fixed sessions; 0 for timed sessions.
    #[must_use]
    pub fn questions_target(&self) -> u32 {
        match self {
            SessionMode::Fixed { target } => *target,
            SessionMode::Timed { .. } => 0,
        }
    }

    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            SessionMode::Fixed { .. } => None,
            SessionMode::Timed { duration_ms } => Some(*duration_ms),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            SessionMode::Fixed { target: 0 } => Err(ConfigError::ZeroTarget),
            SessionMode::Timed { duration_ms: 0 } => Err(ConfigError::ZeroDuration),
            _ => Ok(()),
        }
    }
}

//
// ─── IDENTITY AND CONFIG ───────────────────────────────────────────────────────
//

/// Who is practising, as entered on the sign-in form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentIdentity {
    name: String,
    class_code: String,
}

impl StudentIdentity {
    /// Build an identity, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingName` or `ConfigError::MissingClassCode`
    /// when the corresponding field is blank.
    pub fn new(name: impl Into<String>, class_code: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into().trim().to_owned();
        let class_code = class_code.into().trim().to_owned();
        if name.is_empty() {
            return Err(ConfigError::MissingName);
        }
        if class_code.is_empty() {
            return Err(ConfigError::MissingClassCode);
        }
        Ok(Self { name, class_code })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn class_code(&self) -> &str {
        &self.class_code
    }
}

/// Everything a session needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    identity: StudentIdentity,
    mode: SessionMode,
    tables: TableSelection,
}

impl SessionConfig {
    /// Assemble a validated session configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ZeroTarget` or `ConfigError::ZeroDuration` for
    /// a degenerate mode. Identity and table validation happen in their own
    /// constructors.
    pub fn new(
        identity: StudentIdentity,
        mode: SessionMode,
        tables: TableSelection,
    ) -> Result<Self, ConfigError> {
        mode.validate()?;
        Ok(Self {
            identity,
            mode,
            tables,
        })
    }

    #[must_use]
    pub fn identity(&self) -> &StudentIdentity {
        &self.identity
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn tables(&self) -> &TableSelection {
        &self.tables
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
