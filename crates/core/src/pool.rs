use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::model::{Fact, FactKey, MULTIPLIER_MAX, MULTIPLIER_MIN, TableSelection};

/// The full set of facts for a session, permuted once at session start.
///
/// Draws are independent uniform samples; facts are never removed. The only
/// ordering constraint is the no-immediate-repeat rule in [`QuestionPool::draw`].
#[derive(Debug, Clone)]
pub struct QuestionPool {
    facts: Vec<Fact>,
}

impl QuestionPool {
    /// Build the cross-product of selected tables and the multiplier range,
    /// shuffled with an unbiased Fisher-Yates permutation.
    pub fn generate<R: Rng + ?Sized>(tables: &TableSelection, rng: &mut R) -> Self {
        let mut facts: Vec<Fact> = tables
            .tables()
            .iter()
            .flat_map(|&a| (MULTIPLIER_MIN..=MULTIPLIER_MAX).map(move |b| Fact::new(a, b)))
            .collect();
        facts.shuffle(rng);
        Self { facts }
    }

    /// Sample one fact uniformly, excluding `previous` when any other fact
    /// exists. Falls back to the unfiltered pool when exclusion would leave
    /// nothing to draw. Returns `None` only for an empty pool.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, previous: Option<FactKey>) -> Option<Fact> {
        if self.facts.is_empty() {
            return None;
        }

        if let Some(previous) = previous {
            let candidates: Vec<&Fact> = self
                .facts
                .iter()
                .filter(|fact| fact.key() != previous)
                .collect();
            if !candidates.is_empty() {
                return candidates.choose(rng).map(|fact| **fact);
            }
        }

        self.facts.choose(rng).copied()
    }

    #[cfg(test)]
    pub(crate) fn from_facts(facts: Vec<Fact>) -> Self {
        Self { facts }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
