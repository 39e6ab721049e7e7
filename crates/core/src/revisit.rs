use rand::Rng;
use std::collections::HashSet;

use crate::model::{Fact, FactKey};
use crate::pool::QuestionPool;

/// Resolved questions that must pass before a missed fact becomes eligible.
pub const REVISIT_COOLDOWN_STEPS: u64 = 2;
/// Chance of serving an eligible revisit instead of drawing from the pool.
pub const REVISIT_PROBABILITY: f64 = 0.6;

/// Where a served question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOrigin {
    Pool,
    Revisit,
}

/// A question chosen for the student, tagged with its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawnQuestion {
    pub fact: Fact,
    pub origin: QuestionOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RevisitEntry {
    fact: Fact,
    scheduled_at_step: u64,
}

/// Schedules missed facts for one spaced re-ask per session.
///
/// A fact enters the pending queue on its first miss and leaves it exactly
/// once, when served back. The handled set is never cleared mid-session,
/// which is what enforces "at most once per fact per session".
#[derive(Debug, Clone)]
pub struct RevisitScheduler {
    pending: Vec<RevisitEntry>,
    handled: HashSet<FactKey>,
    step: u64,
    probability: f64,
}

impl RevisitScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            handled: HashSet::new(),
            step: 0,
            probability: REVISIT_PROBABILITY,
        }
    }

    /// Override the revisit probability; tests use 0.0 and 1.0 to force a
    /// branch deterministically.
    #[must_use]
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Register a missed fact. Only the first miss of a fact per session
    /// schedules a revisit; returns whether an entry was added.
    pub fn register_miss(&mut self, fact: &Fact) -> bool {
        if !self.handled.insert(fact.key()) {
            return false;
        }
        self.pending.push(RevisitEntry {
            fact: *fact,
            scheduled_at_step: self.step,
        });
        true
    }

    /// Advance the step counter; call once per resolved question.
    pub fn note_resolved(&mut self) {
        self.step += 1;
    }

    /// Choose the next question.
    ///
    /// Pending entries past the cooldown are served with the configured
    /// probability (unconditionally when the pool is empty), one chosen
    /// uniformly and removed from the queue. Otherwise the pool's
    /// no-immediate-repeat sampler is used. Returns `None` only when both
    /// sources are exhausted.
    pub fn pick_next<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        previous: Option<FactKey>,
        pool: &QuestionPool,
    ) -> Option<DrawnQuestion> {
        let eligible: Vec<usize> = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, entry)| self.step - entry.scheduled_at_step >= REVISIT_COOLDOWN_STEPS)
            .map(|(index, _)| index)
            .collect();

        if !eligible.is_empty() && (pool.is_empty() || rng.random_bool(self.probability)) {
            let index = eligible[rng.random_range(0..eligible.len())];
            let entry = self.pending.swap_remove(index);
            return Some(DrawnQuestion {
                fact: entry.fact,
                origin: QuestionOrigin::Revisit,
            });
        }

        pool.draw(rng, previous).map(|fact| DrawnQuestion {
            fact,
            origin: QuestionOrigin::Pool,
        })
    }

    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// True once the fact has been scheduled this session, whether or not
    /// it is still pending.
    #[must_use]
    pub fn is_handled(&self, key: FactKey) -> bool {
        self.handled.contains(&key)
    }
}

impl Default for RevisitScheduler {
    fn default() -> Self {
        Self::new()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
