use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{Fact, FactKey};

/// Wrong submissions allowed on one question before the answer is revealed.
pub const MAX_TRIES: u32 = 3;

//
// ─── SUBMISSIONS ───────────────────────────────────────────────────────────────
//

/// A single answer as typed by the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Submission {
    Answer(u32),
    /// Blank or non-numeric input; counted as a wrong attempt.
    Invalid,
}

impl Submission {
    /// Parse raw input text. Anything that is not a non-negative integer is
    /// `Invalid` rather than a parse error.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u32>() {
            Ok(value) => Submission::Answer(value),
            Err(_) => Submission::Invalid,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Submission::Answer(_))
    }
}

/// What happened to the current question after one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Right answer; the question is resolved.
    Correct,
    /// Wrong answer with tries still left on this question.
    Incorrect { tries_remaining: u32 },
    /// Third wrong answer; the question is resolved and the answer shown.
    Revealed { answer: u32 },
}

impl SubmissionOutcome {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        matches!(self, SubmissionOutcome::Correct)
    }

    /// Resolved questions trigger advancement to the next one.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            SubmissionOutcome::Correct | SubmissionOutcome::Revealed { .. }
        )
    }
}

//
// ─── AGGREGATES ────────────────────────────────────────────────────────────────
//

/// Running aggregate for the current session, reset at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Every submission, including repeated wrong tries on one question.
    pub attempts: u32,
    /// Distinct questions resolved (answered or revealed).
    pub completed: u32,
    pub correct: u32,
    pub streak: u32,
    pub fastest_ms: Option<u64>,
    pub slowest_ms: Option<u64>,
}

/// Per-fact miss bookkeeping; grows monotonically during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissRecord {
    pub fact: Fact,
    pub miss_count: u32,
    pub last_wrong_answer: Option<u32>,
}

//
// ─── TRACKER ───────────────────────────────────────────────────────────────────
//

/// Accumulates stats and miss records as submissions arrive.
///
/// The tracker also owns the reveal-and-advance policy: a question is
/// resolved once answered correctly or after `MAX_TRIES` wrong submissions.
#[derive(Debug, Clone, Default)]
pub struct StatTracker {
    stats: SessionStats,
    misses: HashMap<FactKey, MissRecord>,
    current_misses: u32,
}

impl StatTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    #[must_use]
    pub fn miss_records(&self) -> &HashMap<FactKey, MissRecord> {
        &self.misses
    }

    /// Wrong tries accumulated on the question currently being asked.
    #[must_use]
    pub fn current_misses(&self) -> u32 {
        self.current_misses
    }

    /// Record one submission against the current question.
    ///
    /// `latency_ms` is the gap since the previous submission (or since
    /// session start for the first one).
    pub fn record(
        &mut self,
        fact: &Fact,
        submission: Submission,
        latency_ms: u64,
    ) -> SubmissionOutcome {
        self.stats.attempts += 1;
        self.stats.fastest_ms = Some(match self.stats.fastest_ms {
            Some(fastest) => fastest.min(latency_ms),
            None => latency_ms,
        });
        self.stats.slowest_ms = Some(match self.stats.slowest_ms {
            Some(slowest) => slowest.max(latency_ms),
            None => latency_ms,
        });

        let correct = matches!(submission, Submission::Answer(value) if fact.accepts(value));
        if correct {
            self.stats.correct += 1;
            self.stats.streak += 1;
            self.resolve_current();
            return SubmissionOutcome::Correct;
        }

        self.stats.streak = 0;
        let wrong_answer = match submission {
            Submission::Answer(value) => Some(value),
            Submission::Invalid => None,
        };
        self.misses
            .entry(fact.key())
            .and_modify(|record| {
                record.miss_count += 1;
                record.last_wrong_answer = wrong_answer;
            })
            .or_insert_with(|| MissRecord {
                fact: *fact,
                miss_count: 1,
                last_wrong_answer: wrong_answer,
            });

        self.current_misses += 1;
        if self.current_misses >= MAX_TRIES {
            self.resolve_current();
            return SubmissionOutcome::Revealed {
                answer: fact.answer(),
            };
        }

        SubmissionOutcome::Incorrect {
            tries_remaining: MAX_TRIES - self.current_misses,
        }
    }

    fn resolve_current(&mut self) {
        self.stats.completed += 1;
        self.current_misses = 0;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
