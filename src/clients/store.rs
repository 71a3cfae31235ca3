// src/clients/store.rs

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::definition::QuizDefinition;
use crate::models::session::{QuizSession, SessionStatus};

/// Persistence contract for sessions. Implementations must be safe for
/// concurrent use; the engine serializes writes per session above this layer.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<QuizSession>, AppError>;

    /// Whole-document upsert.
    async fn put(&self, session: &QuizSession) -> Result<(), AppError>;

    /// Soft delete. Returns whether a live session was removed.
    async fn delete(&self, session_id: &str) -> Result<bool, AppError>;

    /// The learner's `in_progress` session for a quiz, if any.
    async fn find_active(
        &self,
        quiz_id: &str,
        user_id: &str,
    ) -> Result<Option<QuizSession>, AppError>;

    /// The learner's undeleted sessions for a quiz, newest first.
    async fn list_for_user(
        &self,
        quiz_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<QuizSession>, AppError>;

    /// How many undeleted sessions the learner has for a quiz, any status.
    async fn count_for_user(&self, quiz_id: &str, user_id: &str) -> Result<u32, AppError>;
}

/// Persistence contract for quiz definitions.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn get(&self, quiz_id: &str) -> Result<Option<QuizDefinition>, AppError>;
    async fn put(&self, definition: &QuizDefinition) -> Result<(), AppError>;
    /// Soft delete. Returns whether a live definition was removed.
    async fn delete(&self, quiz_id: &str) -> Result<bool, AppError>;
    async fn list(&self) -> Result<Vec<QuizDefinition>, AppError>;
}

fn lock_poisoned() -> AppError {
    AppError::InternalServerError("store lock poisoned".to_string())
}

/// In-memory session store for dev and tests.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, QuizSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<QuizSession>, AppError> {
        let sessions = self.sessions.read().map_err(|_| lock_poisoned())?;
        Ok(sessions.get(session_id).cloned())
    }

    async fn put(&self, session: &QuizSession) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().map_err(|_| lock_poisoned())?;
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, AppError> {
        let mut sessions = self.sessions.write().map_err(|_| lock_poisoned())?;
        Ok(sessions.remove(session_id).is_some())
    }

    async fn find_active(
        &self,
        quiz_id: &str,
        user_id: &str,
    ) -> Result<Option<QuizSession>, AppError> {
        let sessions = self.sessions.read().map_err(|_| lock_poisoned())?;
        Ok(sessions
            .values()
            .filter(|s| {
                s.quiz_id == quiz_id
                    && s.user_id == user_id
                    && s.status == SessionStatus::InProgress
            })
            .max_by_key(|s| s.started_at)
            .cloned())
    }

    async fn list_for_user(
        &self,
        quiz_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<QuizSession>, AppError> {
        let sessions = self.sessions.read().map_err(|_| lock_poisoned())?;
        let mut matched: Vec<QuizSession> = sessions
            .values()
            .filter(|s| s.quiz_id == quiz_id && s.user_id == user_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn count_for_user(&self, quiz_id: &str, user_id: &str) -> Result<u32, AppError> {
        let sessions = self.sessions.read().map_err(|_| lock_poisoned())?;
        Ok(sessions
            .values()
            .filter(|s| s.quiz_id == quiz_id && s.user_id == user_id)
            .count() as u32)
    }
}

/// In-memory definition store for dev and tests.
#[derive(Default)]
pub struct InMemoryDefinitionStore {
    definitions: RwLock<HashMap<String, QuizDefinition>>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn get(&self, quiz_id: &str) -> Result<Option<QuizDefinition>, AppError> {
        let definitions = self.definitions.read().map_err(|_| lock_poisoned())?;
        Ok(definitions.get(quiz_id).cloned())
    }

    async fn put(&self, definition: &QuizDefinition) -> Result<(), AppError> {
        let mut definitions = self.definitions.write().map_err(|_| lock_poisoned())?;
        definitions.insert(definition.quiz_id.clone(), definition.clone());
        Ok(())
    }

    async fn delete(&self, quiz_id: &str) -> Result<bool, AppError> {
        let mut definitions = self.definitions.write().map_err(|_| lock_poisoned())?;
        Ok(definitions.remove(quiz_id).is_some())
    }

    async fn list(&self) -> Result<Vec<QuizDefinition>, AppError> {
        let definitions = self.definitions.read().map_err(|_| lock_poisoned())?;
        let mut all: Vec<QuizDefinition> = definitions.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
