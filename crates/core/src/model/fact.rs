use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest multiplier asked for any table.
pub const MULTIPLIER_MIN: u32 = 1;
/// Largest multiplier asked for any table.
pub const MULTIPLIER_MAX: u32 = 12;

/// Identity of a multiplication fact.
///
/// Order-sensitive: `2×3` and `3×2` are distinct because pools enumerate
/// `a` over the selected tables and `b` over the multiplier range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactKey {
    a: u32,
    b: u32,
}

impl FactKey {
    #[must_use]
    pub fn new(a: u32, b: u32) -> Self {
        Self { a, b }
    }

    #[must_use]
    pub fn a(&self) -> u32 {
        self.a
    }

    #[must_use]
    pub fn b(&self) -> u32 {
        self.b
    }
}

impl fmt::Debug for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FactKey({}x{})", self.a, self.b)
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.a, self.b)
    }
}

/// A single multiplication question together with its answer.
///
/// The only constructor computes the product, so `answer == a * b` holds
/// for every `Fact` that can exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    a: u32,
    b: u32,
    answer: u32,
}

impl Fact {
    #[must_use]
    pub fn new(a: u32, b: u32) -> Self {
        Self { a, b, answer: a * b }
    }

    #[must_use]
    pub fn a(&self) -> u32 {
        self.a
    }

    #[must_use]
    pub fn b(&self) -> u32 {
        self.b
    }

    #[must_use]
    pub fn answer(&self) -> u32 {
        self.answer
    }

    #[must_use]
    pub fn key(&self) -> FactKey {
        FactKey::new(self.a, self.b)
    }

    /// Returns true if `candidate` is the right answer for this fact.
    #[must_use]
    pub fn accepts(&self, candidate: u32) -> bool {
        candidate == self.answer
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.a, self.b)
    }
}
