use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::TickOutcome;
use quiz_core::model::Attempt;
use tokio::sync::Mutex as AsyncMutex;

use super::service::QuizSessionService;
use crate::error::SessionError;

/// Host-side handle for an open session.
pub type SessionId = u64;

pub type SharedSession = Arc<AsyncMutex<QuizSessionService>>;

/// Open sessions keyed by id, for hosts that drive several sessions from
/// more than one task.
///
/// Each session sits behind its own async mutex, so commands for one session
/// run one at a time while different sessions proceed independently.
#[derive(Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, SharedSession>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, service: QuizSessionService) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().insert(id, Arc::new(AsyncMutex::new(service)));
        id
    }

    /// Look up an open session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownSession` if the id was never opened or
    /// has been closed.
    pub fn get(&self, id: SessionId) -> Result<SharedSession, SessionError> {
        self.lock()
            .get(&id)
            .cloned()
            .ok_or(SessionError::UnknownSession(id))
    }

    /// Drop a session. Closing before submit discards it without an attempt.
    pub fn close(&self, id: SessionId) -> Option<SharedSession> {
        self.lock().remove(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Tick every open session once, returning the attempts of sessions that
    /// timed out on this tick.
    ///
    /// A session whose attempt could not be recorded is logged and skipped;
    /// it stays submitted and can be finalized later.
    pub async fn tick_all(&self) -> Vec<(SessionId, Attempt)> {
        let open: Vec<(SessionId, SharedSession)> = self
            .lock()
            .iter()
            .map(|(id, session)| (*id, Arc::clone(session)))
            .collect();

        let mut timed_out = Vec::new();
        for (id, session) in open {
            match session.lock().await.tick().await {
                Ok(TickOutcome::TimedOut(attempt)) => timed_out.push((id, attempt)),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(session_id = id, error = %err, "tick failed to record attempt");
                }
            }
        }
        timed_out
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SharedSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Clock;
    use quiz_core::QuizSession;
    use quiz_core::model::{AnswerOption, Question, QuestionKind, QuizDefinition, QuizId};
    use quiz_core::time::fixed_now;
    use storage::repository::{AttemptRepository, InMemoryRepository};

    fn build_service(repo: &InMemoryRepository, minutes: u32) -> QuizSessionService {
        let quiz = QuizDefinition::new(
            "sqs",
            "SQS",
            minutes,
            50,
            vec![Question::new(
                "q1",
                "FIFO?",
                QuestionKind::Single,
                vec![AnswerOption::new("a", "Yes"), AnswerOption::new("b", "No")],
                ["a"],
            )],
        );
        let session = QuizSession::start(quiz, fixed_now()).unwrap();
        QuizSessionService::new(session, Clock::fixed(fixed_now()), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn open_get_close() {
        let repo = InMemoryRepository::new();
        let registry = SessionRegistry::new();
        let id = registry.open(build_service(&repo, 1));
        assert_eq!(registry.len(), 1);

        let session = registry.get(id).unwrap();
        assert!(!session.lock().await.next());

        assert!(registry.close(id).is_some());
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get(id),
            Err(SessionError::UnknownSession(missing)) if missing == id
        ));
        // Exit without submit leaves no attempt behind.
        assert!(repo.list_attempts(&QuizId::new("sqs"), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tick_all_reports_timeouts_once() {
        let repo = InMemoryRepository::new();
        let registry = SessionRegistry::new();
        let short = registry.open(build_service(&repo, 1));
        let long = registry.open(build_service(&repo, 2));

        let mut timed_out = Vec::new();
        for _ in 0..120 {
            timed_out.extend(registry.tick_all().await);
        }

        let ids: Vec<_> = timed_out.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![short, long]);
        assert_eq!(
            repo.list_attempts(&QuizId::new("sqs"), 10).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn concurrent_commands_are_serialized() {
        let repo = InMemoryRepository::new();
        let registry = Arc::new(SessionRegistry::new());
        let id = registry.open(build_service(&repo, 1));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let session = registry.get(id).unwrap();
                let mut guard = session.lock().await;
                guard.submit().await.unwrap().is_new
            }));
        }

        let mut new_count = 0;
        for handle in handles {
            if handle.await.unwrap() {
                new_count += 1;
            }
        }
        assert_eq!(new_count, 1);
        assert_eq!(
            repo.list_attempts(&QuizId::new("sqs"), 10).await.unwrap().len(),
            1
        );
    }
}
