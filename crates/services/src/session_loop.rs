use std::sync::Arc;

use drill_core::model::SessionConfig;
use drill_storage::repository::ResultLogRepository;

use crate::Clock;
use crate::error::SessionError;
use crate::session_service::{AnswerFeedback, SessionService};

/// Result of submitting one answer through the loop service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitResult {
    pub feedback: AnswerFeedback,
    /// Set once the finished session's record has been persisted.
    pub record_id: Option<i64>,
}

/// Orchestrates session start, answering, ticking, and persisted finish.
///
/// Every path that can end a session funnels through the same persistence
/// guard, so ending a session twice appends exactly one record.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    results: Arc<dyn ResultLogRepository>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(clock: Clock, results: Arc<dyn ResultLogRepository>) -> Self {
        Self { clock, results }
    }

    /// Start a new session from a validated configuration.
    #[must_use]
    pub fn start_session(&self, config: SessionConfig) -> SessionService {
        SessionService::new(config, self.clock.now())
    }

    /// Start a reproducible session; used by tests and scripted demos.
    #[must_use]
    pub fn start_session_seeded(&self, config: SessionConfig, seed: u64) -> SessionService {
        SessionService::with_seed(config, self.clock.now(), seed)
    }

    /// Submit one answer and persist the result record if this submission
    /// ended the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for submissions after the end of the session
    /// or persistence failures.
    pub async fn submit_answer(
        &self,
        session: &mut SessionService,
        raw: &str,
    ) -> Result<SubmitResult, SessionError> {
        let feedback = session.submit(raw, self.clock.now())?;

        if session.is_finished() {
            self.persist_record(session).await?;
        }

        Ok(SubmitResult {
            feedback,
            record_id: session.record_id(),
        })
    }

    /// Timer tick: ends a timed session whose deadline has passed and
    /// persists its record. Safe to call after the session has ended.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if persistence fails; the record can
    /// then be retried via `finish_session`.
    pub async fn tick(&self, session: &mut SessionService) -> Result<Option<i64>, SessionError> {
        if session.tick(self.clock.now()) {
            self.persist_record(session).await?;
        }
        Ok(session.record_id())
    }

    /// Explicitly end the session and persist its record.
    ///
    /// Idempotent: calling this after the session already ended (by target,
    /// timeout, or an earlier finish) returns the existing record id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if persistence fails.
    pub async fn finish_session(&self, session: &mut SessionService) -> Result<i64, SessionError> {
        session.finish(self.clock.now());
        self.persist_record(session).await
    }

    async fn persist_record(&self, session: &mut SessionService) -> Result<i64, SessionError> {
        if let Some(id) = session.record_id() {
            return Ok(id);
        }

        let record = session.build_record()?;
        let id = self.results.append(&record).await?;
        session.set_record_id(id);
        log::info!(
            "session result persisted: id={id} completed={} accuracy={}%",
            record.completed(),
            record.accuracy()
        );
        Ok(id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use drill_core::model::{SessionMode, StudentIdentity, TableSelection};
    use drill_core::time::fixed_now;
    use drill_storage::repository::InMemoryResultLog;

    fn config(mode: SessionMode) -> SessionConfig {
        SessionConfig::new(
            StudentIdentity::new("Ada", "4B").unwrap(),
            mode,
            TableSelection::new([6]).unwrap(),
        )
        .unwrap()
    }

    fn service(log: &InMemoryResultLog) -> SessionLoopService {
        SessionLoopService::new(Clock::fixed(fixed_now()), Arc::new(log.clone()))
    }

    #[tokio::test]
    async fn finishing_twice_appends_one_record() {
        let log = InMemoryResultLog::new();
        let svc = service(&log);
        let mut session = svc
            .start_session_seeded(config(SessionMode::Fixed { target: 10 }), 3)
            .with_revisit_probability(0.0);

        let first = svc.finish_session(&mut session).await.unwrap();
        let second = svc.finish_session(&mut session).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(log.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reaching_target_persists_automatically() {
        let log = InMemoryResultLog::new();
        let svc = service(&log);
        let mut session = svc
            .start_session_seeded(config(SessionMode::Fixed { target: 2 }), 3)
            .with_revisit_probability(0.0);

        let answer = session.current_question().unwrap().fact.answer();
        let result = svc
            .submit_answer(&mut session, &answer.to_string())
            .await
            .unwrap();
        assert!(result.record_id.is_none());

        let answer = session.current_question().unwrap().fact.answer();
        let result = svc
            .submit_answer(&mut session, &answer.to_string())
            .await
            .unwrap();
        assert!(result.feedback.is_finished);
        let id = result.record_id.expect("record persisted at target");

        // a duplicate finish signal right after is a no-op
        assert_eq!(svc.finish_session(&mut session).await.unwrap(), id);
        assert_eq!(log.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn timer_expiry_and_manual_finish_race_cleanly() {
        let log = InMemoryResultLog::new();
        let svc = SessionLoopService::new(
            Clock::fixed(fixed_now() + Duration::seconds(120)),
            Arc::new(log.clone()),
        );

        let mut session = SessionService::with_seed(
            config(SessionMode::Timed { duration_ms: 60_000 }),
            fixed_now(),
            3,
        );

        let tick_id = svc.tick(&mut session).await.unwrap();
        assert!(tick_id.is_some(), "deadline passed, record persisted");

        let finish_id = svc.finish_session(&mut session).await.unwrap();
        assert_eq!(Some(finish_id), tick_id);
        assert_eq!(log.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persisted_record_matches_session_stats() {
        let log = InMemoryResultLog::new();
        let svc = service(&log);
        let mut session = svc
            .start_session_seeded(config(SessionMode::Fixed { target: 1 }), 3)
            .with_revisit_probability(0.0);

        let answer = session.current_question().unwrap().fact.answer();
        let result = svc
            .submit_answer(&mut session, &answer.to_string())
            .await
            .unwrap();

        let id = result.record_id.unwrap();
        let stored = log.get(id).await.unwrap();
        assert_eq!(stored.attempts(), 1);
        assert_eq!(stored.correct(), 1);
        assert_eq!(stored.accuracy(), 100);
        assert_eq!(stored.mode(), "fixed");
    }
}
