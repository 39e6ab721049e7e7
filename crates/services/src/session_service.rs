use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;

use drill_core::model::{Fact, FactKey, ResultRecord, SessionConfig, SessionMode};
use drill_core::pool::QuestionPool;
use drill_core::revisit::{DrawnQuestion, QuestionOrigin, RevisitScheduler};
use drill_core::stats::{MissRecord, SessionStats, StatTracker, Submission, SubmissionOutcome};
use drill_core::time::millis_between;

use crate::error::SessionError;

//
// ─── FEEDBACK ──────────────────────────────────────────────────────────────────
//

/// What the presentation layer needs to show after one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub fact: Fact,
    pub origin: QuestionOrigin,
    pub submission: Submission,
    pub outcome: SubmissionOutcome,
    pub latency_ms: u64,
    pub is_finished: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory drill session: owns the pool, the revisit scheduler, and the
/// stat tracker, and steps through questions as answers arrive.
///
/// All state transitions happen through `submit`, `tick`, and `finish`;
/// every one takes `now` from the caller so the clock stays in the services
/// layer and tests stay deterministic.
pub struct SessionService {
    config: SessionConfig,
    pool: QuestionPool,
    scheduler: RevisitScheduler,
    tracker: StatTracker,
    rng: StdRng,
    current: Option<DrawnQuestion>,
    previous: Option<FactKey>,
    started_at: DateTime<Utc>,
    last_submission_at: Option<DateTime<Utc>>,
    deadline: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    record_id: Option<i64>,
}

impl SessionService {
    /// Start a session with an OS-seeded random source.
    ///
    /// `started_at` should come from the services layer clock.
    #[must_use]
    pub fn new(config: SessionConfig, started_at: DateTime<Utc>) -> Self {
        Self::with_rng(config, started_at, StdRng::from_os_rng())
    }

    /// Start a session with an explicit seed, for reproducible runs.
    #[must_use]
    pub fn with_seed(config: SessionConfig, started_at: DateTime<Utc>, seed: u64) -> Self {
        Self::with_rng(config, started_at, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SessionConfig, started_at: DateTime<Utc>, mut rng: StdRng) -> Self {
        let pool = QuestionPool::generate(config.tables(), &mut rng);
        let mut scheduler = RevisitScheduler::new();
        let current = scheduler.pick_next(&mut rng, None, &pool);
        let deadline = config.mode().duration_ms().map(|ms| {
            started_at + Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
        });

        Self {
            config,
            pool,
            scheduler,
            tracker: StatTracker::new(),
            rng,
            current,
            previous: None,
            started_at,
            last_submission_at: None,
            deadline,
            finished_at: None,
            record_id: None,
        }
    }

    /// Override the revisit probability; tests use 0.0 and 1.0 to pin down
    /// which branch the scheduler takes.
    #[must_use]
    pub fn with_revisit_probability(mut self, probability: f64) -> Self {
        self.scheduler = self.scheduler.with_probability(probability);
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&DrawnQuestion> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        self.tracker.stats()
    }

    #[must_use]
    pub fn miss_records(&self) -> Vec<&MissRecord> {
        self.tracker.miss_records().values().collect()
    }

    #[must_use]
    pub fn record_id(&self) -> Option<i64> {
        self.record_id
    }

    /// Milliseconds left in a timed session; `None` in fixed mode.
    #[must_use]
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> Option<u64> {
        self.deadline.map(|deadline| millis_between(now, deadline))
    }

    /// Apply one typed answer to the current question.
    ///
    /// Updates stats and miss records, registers first misses with the
    /// revisit scheduler, and on resolution advances to the next question
    /// or ends the session when the target or deadline has been reached.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` if the session is already over.
    pub fn submit(&mut self, raw: &str, now: DateTime<Utc>) -> Result<AnswerFeedback, SessionError> {
        if self.is_finished() {
            return Err(SessionError::Finished);
        }
        let Some(question) = self.current else {
            return Err(SessionError::Finished);
        };

        let submission = Submission::parse(raw);
        let latency_ms =
            millis_between(self.last_submission_at.unwrap_or(self.started_at), now);
        self.last_submission_at = Some(now);

        let outcome = self.tracker.record(&question.fact, submission, latency_ms);
        if !outcome.is_correct() {
            // Idempotent per fact per session; revisit-origin questions are
            // already in the handled set and are never rescheduled.
            self.scheduler.register_miss(&question.fact);
        }

        if outcome.is_resolved() {
            self.scheduler.note_resolved();
            self.previous = Some(question.fact.key());
            self.advance(now);
        }

        Ok(AnswerFeedback {
            fact: question.fact,
            origin: question.origin,
            submission,
            outcome,
            latency_ms,
            is_finished: self.is_finished(),
        })
    }

    /// Countdown check for timed sessions; call on every timer tick.
    ///
    /// Returns true when the session is (now) finished. No-op in fixed mode
    /// and after the session has ended, so a stale tick cannot end a
    /// session twice.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_finished() && self.deadline_passed(now) {
            self.finish(now);
        }
        self.is_finished()
    }

    /// End the session. Idempotent: only the first call records the finish
    /// time, so a timer expiry racing a manual finish cannot double-end.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        if self.finished_at.is_none() {
            self.finished_at = Some(now);
            self.current = None;
        }
    }

    /// Build the immutable end-of-session snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` before the session has ended.
    pub fn build_record(&self) -> Result<ResultRecord, SessionError> {
        let finished_at = self.finished_at.ok_or(SessionError::NotFinished)?;
        let duration_ms = millis_between(self.started_at, finished_at);
        Ok(ResultRecord::from_session(
            finished_at,
            self.config.identity(),
            self.config.mode(),
            self.config.tables(),
            self.tracker.stats(),
            duration_ms,
        ))
    }

    pub(crate) fn set_record_id(&mut self, id: i64) {
        self.record_id = Some(id);
    }

    fn advance(&mut self, now: DateTime<Utc>) {
        if self.target_reached() || self.deadline_passed(now) {
            self.finish(now);
            return;
        }

        self.current = self
            .scheduler
            .pick_next(&mut self.rng, self.previous, &self.pool);
        if self.current.is_none() {
            self.finish(now);
        }
    }

    fn target_reached(&self) -> bool {
        match self.config.mode() {
            SessionMode::Fixed { target } => self.tracker.stats().completed >= target,
            SessionMode::Timed { .. } => false,
        }
    }

    fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

impl fmt::Debug for SessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionService")
            .field("mode", &self.config.mode().label())
            .field("pool_len", &self.pool.len())
            .field("pending_revisits", &self.scheduler.pending_count())
            .field("stats", self.tracker.stats())
            .field("started_at", &self.started_at)
            .field("finished_at", &self.finished_at)
            .field("record_id", &self.record_id)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::model::{StudentIdentity, TableSelection};
    use drill_core::time::fixed_now;

    fn config(mode: SessionMode) -> SessionConfig {
        SessionConfig::new(
            StudentIdentity::new("Ada", "4B").unwrap(),
            mode,
            TableSelection::new([3, 4]).unwrap(),
        )
        .unwrap()
    }

    fn fixed_session(target: u32) -> SessionService {
        SessionService::with_seed(
            config(SessionMode::Fixed { target }),
            fixed_now(),
            42,
        )
        .with_revisit_probability(0.0)
    }

    fn answer_correctly(session: &mut SessionService, now: DateTime<Utc>) -> AnswerFeedback {
        let answer = session.current_question().unwrap().fact.answer();
        session.submit(&answer.to_string(), now).unwrap()
    }

    #[test]
    fn fixed_session_finishes_at_target() {
        let mut session = fixed_session(5);
        let mut now = fixed_now();

        for i in 0..5 {
            assert!(!session.is_finished(), "finished early at question {i}");
            now += Duration::seconds(2);
            answer_correctly(&mut session, now);
        }

        assert!(session.is_finished());
        assert_eq!(session.stats().completed, 5);
        assert_eq!(session.stats().attempts, 5);
        assert_eq!(session.stats().correct, 5);
        assert!(session.current_question().is_none());
    }

    #[test]
    fn submit_after_finish_is_rejected() {
        let mut session = fixed_session(1);
        let now = fixed_now() + Duration::seconds(1);
        answer_correctly(&mut session, now);

        let err = session.submit("1", now + Duration::seconds(1)).unwrap_err();
        assert!(matches!(err, SessionError::Finished));
    }

    #[test]
    fn three_misses_reveal_and_advance() {
        let mut session = fixed_session(10);
        let mut now = fixed_now();
        let asked = session.current_question().unwrap().fact;

        for expected_remaining in [2, 1] {
            now += Duration::seconds(1);
            let feedback = session.submit("0", now).unwrap();
            assert_eq!(
                feedback.outcome,
                SubmissionOutcome::Incorrect {
                    tries_remaining: expected_remaining
                }
            );
            assert_eq!(
                session.current_question().unwrap().fact.key(),
                asked.key(),
                "question must not advance before the third miss"
            );
        }

        now += Duration::seconds(1);
        let feedback = session.submit("0", now).unwrap();
        assert_eq!(
            feedback.outcome,
            SubmissionOutcome::Revealed {
                answer: asked.answer()
            }
        );
        assert_eq!(session.stats().completed, 1);
        assert_ne!(session.current_question().unwrap().fact.key(), asked.key());
    }

    #[test]
    fn no_immediate_repeat_across_advancement() {
        let mut session = fixed_session(30);
        let mut now = fixed_now();
        let mut previous = session.current_question().unwrap().fact.key();

        for _ in 0..29 {
            now += Duration::seconds(1);
            answer_correctly(&mut session, now);
            if let Some(question) = session.current_question() {
                assert_ne!(question.fact.key(), previous);
                previous = question.fact.key();
            }
        }
    }

    #[test]
    fn missed_fact_comes_back_after_cooldown() {
        let mut session = SessionService::with_seed(
            config(SessionMode::Fixed { target: 20 }),
            fixed_now(),
            7,
        )
        .with_revisit_probability(1.0);
        let mut now = fixed_now();

        let missed = session.current_question().unwrap().fact;
        now += Duration::seconds(1);
        session.submit("0", now).unwrap();
        now += Duration::seconds(1);
        answer_correctly(&mut session, now); // resolves the missed question

        // second resolved question satisfies the cooldown
        now += Duration::seconds(1);
        answer_correctly(&mut session, now);

        let revisit = session.current_question().unwrap();
        assert_eq!(revisit.origin, QuestionOrigin::Revisit);
        assert_eq!(revisit.fact.key(), missed.key());
    }

    #[test]
    fn timed_session_ends_on_tick() {
        let mut session = SessionService::with_seed(
            config(SessionMode::Timed { duration_ms: 60_000 }),
            fixed_now(),
            42,
        )
        .with_revisit_probability(0.0);

        let mid = fixed_now() + Duration::seconds(30);
        assert!(!session.tick(mid));
        assert_eq!(session.remaining_ms(mid), Some(30_000));

        let late = fixed_now() + Duration::seconds(61);
        assert!(session.tick(late));
        assert!(session.is_finished());
        assert_eq!(session.remaining_ms(late), Some(0));

        // a stale tick after the end changes nothing
        let finished_at = session.finished_at();
        assert!(session.tick(late + Duration::seconds(5)));
        assert_eq!(session.finished_at(), finished_at);
    }

    #[test]
    fn timed_session_ends_on_submission_past_deadline() {
        let mut session = SessionService::with_seed(
            config(SessionMode::Timed { duration_ms: 10_000 }),
            fixed_now(),
            42,
        )
        .with_revisit_probability(0.0);

        let late = fixed_now() + Duration::seconds(11);
        let feedback = answer_correctly(&mut session, late);
        assert!(feedback.is_finished);
        assert!(session.is_finished());
    }

    #[test]
    fn finish_is_idempotent() {
        let mut session = fixed_session(10);
        let first = fixed_now() + Duration::seconds(5);
        session.finish(first);
        session.finish(first + Duration::seconds(5));
        assert_eq!(session.finished_at(), Some(first));
    }

    #[test]
    fn record_snapshot_reflects_final_stats() {
        let mut session = fixed_session(3);
        let mut now = fixed_now();

        now += Duration::seconds(2);
        session.submit("0", now).unwrap(); // one miss
        now += Duration::seconds(1);
        answer_correctly(&mut session, now);
        now += Duration::seconds(3);
        answer_correctly(&mut session, now);
        now += Duration::seconds(1);
        answer_correctly(&mut session, now);
        assert!(session.is_finished());

        let record = session.build_record().unwrap();
        assert_eq!(record.mode(), "fixed");
        assert_eq!(record.questions_target(), 3);
        assert_eq!(record.attempts(), 4);
        assert_eq!(record.completed(), 3);
        assert_eq!(record.correct(), 3);
        assert_eq!(record.accuracy(), 75);
        assert_eq!(record.duration_ms(), 7_000);
        assert_eq!(record.fastest_ms(), Some(1_000));
        assert_eq!(record.slowest_ms(), Some(3_000));
    }

    #[test]
    fn build_record_requires_finish() {
        let session = fixed_session(10);
        assert!(matches!(
            session.build_record(),
            Err(SessionError::NotFinished)
        ));
    }

    #[test]
    fn invalid_input_counts_as_wrong_try() {
        let mut session = fixed_session(10);
        let now = fixed_now() + Duration::seconds(1);

        let feedback = session.submit("banana", now).unwrap();
        assert_eq!(feedback.submission, Submission::Invalid);
        assert_eq!(
            feedback.outcome,
            SubmissionOutcome::Incorrect { tries_remaining: 2 }
        );
        assert_eq!(session.stats().attempts, 1);
        assert_eq!(session.stats().streak, 0);
    }
}
