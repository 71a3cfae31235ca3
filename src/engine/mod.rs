// src/engine/mod.rs

pub mod coverage;
pub mod difficulty;
pub mod locks;
pub mod scoring;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::clients::content::{ContentPool, Snippet};
use crate::clients::generator::{GeneratedQuestion, QuestionGenerator};
use crate::clients::store::{DefinitionStore, SessionStore};
use crate::config::EngineSettings;
use crate::error::AppError;
use crate::models::definition::{QuizDefinition, UpsertQuizDefinitionRequest};
use crate::models::question::QuestionRecord;
use crate::models::session::{
    AnswerOutcome, AnswerRecord, AnswerRequest, Difficulty, QuizMode, QuizSession, SessionStatus,
    StartSessionRequest,
};
use crate::models::summary::SessionSummary;

use coverage::SnippetChoice;
use difficulty::next_difficulty;
use locks::SessionLocks;
use scoring::summarize;

/// The quiz session engine: owns the session state machine and drives the
/// collaborators (definition/session stores, content pool, generator).
///
/// All state-changing operations run under a per-session lock; the generator
/// call is the one expensive step and happens with the lock released,
/// followed by optimistic re-validation.
pub struct QuizEngine {
    definitions: Arc<dyn DefinitionStore>,
    sessions: Arc<dyn SessionStore>,
    content: Arc<dyn ContentPool>,
    generator: Arc<dyn QuestionGenerator>,
    settings: EngineSettings,
    locks: SessionLocks,
}

impl QuizEngine {
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        sessions: Arc<dyn SessionStore>,
        content: Arc<dyn ContentPool>,
        generator: Arc<dyn QuestionGenerator>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            definitions,
            sessions,
            content,
            generator,
            settings,
            locks: SessionLocks::new(),
        }
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Creates or replaces a quiz definition. `created_at` survives replacement.
    pub async fn upsert_definition(
        &self,
        req: UpsertQuizDefinitionRequest,
    ) -> Result<QuizDefinition, AppError> {
        let mut topics: Vec<String> = Vec::new();
        for topic in &req.topics {
            let trimmed = topic.trim();
            if !trimmed.is_empty() && !topics.iter().any(|t| t == trimmed) {
                topics.push(trimmed.to_string());
            }
        }
        if topics.is_empty() {
            return Err(AppError::BadRequest(
                "Quiz definitions must include at least one topic".to_string(),
            ));
        }
        if let Some(metadata) = &req.metadata {
            if !metadata.is_object() {
                return Err(AppError::BadRequest(
                    "metadata must be a JSON object".to_string(),
                ));
            }
        }

        let existing = self.definitions.get(&req.quiz_id).await?;
        let now = Utc::now();
        let definition = QuizDefinition {
            name: req.name.unwrap_or_else(|| req.quiz_id.clone()),
            quiz_id: req.quiz_id,
            topics,
            default_mode: req.default_mode.unwrap_or(QuizMode::Practice),
            initial_difficulty: req
                .initial_difficulty
                .unwrap_or(self.settings.default_difficulty),
            num_questions: req.num_questions,
            time_limit_minutes: req.time_limit_minutes,
            max_attempts: req.max_attempts,
            is_published: req.is_published.unwrap_or(true),
            metadata: req
                .metadata
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            created_at: existing.as_ref().map(|d| d.created_at).unwrap_or(now),
            updated_at: now,
        };

        self.definitions.put(&definition).await?;
        tracing::info!("Saved quiz definition {}", definition.quiz_id);
        Ok(definition)
    }

    pub async fn get_definition(&self, quiz_id: &str) -> Result<QuizDefinition, AppError> {
        self.definitions
            .get(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))
    }

    pub async fn list_definitions(&self) -> Result<Vec<QuizDefinition>, AppError> {
        self.definitions.list().await
    }

    pub async fn delete_definition(&self, quiz_id: &str) -> Result<(), AppError> {
        if !self.definitions.delete(quiz_id).await? {
            return Err(AppError::NotFound(format!("Quiz {} not found", quiz_id)));
        }
        tracing::info!("Deleted quiz definition {}", quiz_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Starts a session for (quiz_id, user_id), or returns the learner's
    /// `in_progress` session when one exists. The bool is the `resumed` flag.
    pub async fn start(
        &self,
        req: StartSessionRequest,
    ) -> Result<(QuizSession, bool), AppError> {
        // One start per (quiz, user) at a time, so concurrent starts cannot
        // both create a session.
        let start_key = format!("start:{}:{}", req.quiz_id, req.user_id);
        let _start_guard = self.locks.acquire(&start_key).await;

        let definition = self.get_definition(&req.quiz_id).await?;
        if !definition.is_published {
            return Err(AppError::BadRequest(format!(
                "Quiz {} is not published",
                definition.quiz_id
            )));
        }

        if let Some(found) = self
            .sessions
            .find_active(&req.quiz_id, &req.user_id)
            .await?
        {
            let _session_guard = self.locks.acquire(&found.session_id).await;
            // Re-load under the session lock; another call may have just closed it.
            if let Some(mut session) = self.sessions.get(&found.session_id).await? {
                let now = Utc::now();
                if session.past_deadline(now) {
                    self.close(&mut session, SessionStatus::Expired, now);
                    self.sessions.put(&session).await?;
                    tracing::info!(
                        "Session {} expired before resume; starting a fresh attempt",
                        session.session_id
                    );
                } else if session.status == SessionStatus::InProgress {
                    return Ok((session, true));
                }
            }
        }

        let mode = req.mode.unwrap_or(definition.default_mode);
        let attempt_number = self
            .sessions
            .count_for_user(&req.quiz_id, &req.user_id)
            .await?
            + 1;

        let now = Utc::now();
        let mut deadline = None;
        let mut num_questions = None;
        if mode == QuizMode::Assessment {
            let quota = definition.num_questions.ok_or_else(|| {
                AppError::BadRequest(
                    "Quiz definition is missing an assessment question count".to_string(),
                )
            })?;
            num_questions = Some(quota);
            if let Some(max) = definition.max_attempts {
                if attempt_number > max {
                    return Err(AppError::AttemptsExhausted(format!(
                        "All {} attempts for this quiz have been used",
                        max
                    )));
                }
            }
            if let Some(minutes) = definition.time_limit_minutes {
                deadline = Some(now + Duration::minutes(minutes as i64));
            }
        }

        let session = QuizSession {
            session_id: Uuid::new_v4().to_string(),
            quiz_id: definition.quiz_id.clone(),
            user_id: req.user_id,
            mode,
            status: SessionStatus::InProgress,
            attempt_number,
            topics: definition.topics.clone(),
            num_questions,
            max_attempts: definition.max_attempts,
            started_at: now,
            deadline,
            completed_at: None,
            current_difficulty: req
                .initial_difficulty
                .unwrap_or(definition.initial_difficulty),
            correct_streak: 0,
            incorrect_streak: 0,
            served_question_ids: Vec::new(),
            active_question: None,
            answer_log: Vec::new(),
            used_snippet_ids: Vec::new(),
            missed_snippets: BTreeMap::new(),
        };

        self.sessions.put(&session).await?;
        tracing::info!(
            "Started {} session {} for quiz {} (attempt {})",
            session.mode,
            session.session_id,
            session.quiz_id,
            session.attempt_number
        );
        Ok((session, false))
    }

    /// Serves the next question. Repeated calls without an intervening
    /// `answer` return the same pending question.
    pub async fn next(&self, session_id: &str) -> Result<QuestionRecord, AppError> {
        // Phase 1: validate and pick a snippet under the lock.
        let guard = self.locks.acquire(session_id).await;
        let mut session = self.load_live(session_id).await?;
        self.require_in_progress(&mut session).await?;

        if let Some(pending) = &session.active_question {
            return Ok(pending.clone());
        }
        if self.assessment_quota_reached(&session) {
            let now = Utc::now();
            self.close(&mut session, SessionStatus::Completed, now);
            self.sessions.put(&session).await?;
            return Err(AppError::SessionNoLongerActive(session.status));
        }

        let candidates = self
            .content
            .sample(&session.topics, self.settings.retriever_top_k)
            .await?;
        let choice = {
            let mut rng = rand::thread_rng();
            coverage::choose_snippets(
                &mut rng,
                &candidates,
                &session.used_snippet_ids,
                &session.missed_snippets,
                session.questions_served(),
                &self.settings,
            )
        }
        .ok_or_else(|| {
            AppError::QuestionGenerationFailed("content pool returned no snippets".to_string())
        })?;
        let difficulty = session.current_difficulty;
        let order = (session.questions_served() + 1) as u32;
        drop(guard);

        // Phase 2: call the generator with the lock released.
        let (generated, snippet) = self.generate_with_retry(&choice, difficulty, order).await?;

        // Phase 3: re-acquire and re-validate before committing.
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_live(session_id).await?;
        self.require_in_progress(&mut session).await?;

        if let Some(pending) = &session.active_question {
            // A concurrent call won the race; its question is the real one.
            return Ok(pending.clone());
        }
        if self.assessment_quota_reached(&session) {
            let now = Utc::now();
            self.close(&mut session, SessionStatus::Completed, now);
            self.sessions.put(&session).await?;
            return Err(AppError::SessionNoLongerActive(session.status));
        }

        let record = QuestionRecord {
            question_id: Uuid::new_v4().to_string(),
            order: (session.questions_served() + 1) as u32,
            prompt: generated.prompt,
            choices: generated.choices,
            correct_choice: generated.correct_choice,
            rationale: generated.rationale,
            incorrect_rationales: generated.incorrect_rationales,
            difficulty,
            topic: snippet.topic.clone(),
            source_snippet_id: snippet.snippet_id.clone(),
            served_at: Utc::now(),
        };

        session.served_question_ids.push(record.question_id.clone());
        if !session.used_snippet_ids.contains(&snippet.snippet_id) {
            session.used_snippet_ids.push(snippet.snippet_id.clone());
        }
        session.active_question = Some(record.clone());
        self.sessions.put(&session).await?;

        Ok(record)
    }

    /// Grades an answer to the pending question and advances the session.
    pub async fn answer(
        &self,
        session_id: &str,
        req: AnswerRequest,
    ) -> Result<AnswerOutcome, AppError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_live(session_id).await?;
        self.require_in_progress(&mut session).await?;

        let question = match &session.active_question {
            Some(q) if q.question_id == req.question_id => q.clone(),
            _ => {
                return Err(AppError::StaleQuestion(
                    "The submitted question is not the one currently served".to_string(),
                ));
            }
        };
        if !question.choices.contains(&req.selected_choice) {
            return Err(AppError::BadRequest(
                "Selected choice is not one of the served choices".to_string(),
            ));
        }

        let now = Utc::now();
        let is_correct = req.selected_choice == question.correct_choice;
        let rationale = if is_correct {
            question.rationale.clone()
        } else {
            question
                .rationale_for_incorrect(&req.selected_choice)
                .unwrap_or("This option does not correctly address the prompt.")
                .to_string()
        };
        let response_ms = (now - question.served_at).num_milliseconds().max(0);

        session.answer_log.push(AnswerRecord {
            question_id: question.question_id.clone(),
            selected_choice: req.selected_choice.clone(),
            is_correct,
            response_time_ms: response_ms,
            answered_at: now,
            topic: question.topic.clone(),
            difficulty: question.difficulty,
            source_snippet_id: question.source_snippet_id.clone(),
        });

        // Exactly one streak resets on every answer.
        if is_correct {
            session.correct_streak += 1;
            session.incorrect_streak = 0;
        } else {
            session.incorrect_streak += 1;
            session.correct_streak = 0;
            session
                .missed_snippets
                .insert(question.source_snippet_id.clone(), question.order as usize);
        }

        if session.mode == QuizMode::Practice {
            let next = next_difficulty(
                session.current_difficulty,
                session.correct_streak,
                session.incorrect_streak,
                self.settings.increase_streak,
                self.settings.decrease_streak,
            );
            if next != session.current_difficulty {
                // The streak that triggered the move starts over.
                if next > session.current_difficulty {
                    session.correct_streak = 0;
                } else {
                    session.incorrect_streak = 0;
                }
                tracing::info!(
                    "Session {} difficulty {} -> {}",
                    session.session_id,
                    session.current_difficulty,
                    next
                );
                session.current_difficulty = next;
            }
        }

        session.active_question = None;

        if session.mode == QuizMode::Assessment {
            if self.assessment_quota_reached(&session) {
                self.close(&mut session, SessionStatus::Completed, now);
            } else if session.past_deadline(Utc::now()) {
                // The deadline passed while grading; the answer is kept.
                self.close(&mut session, SessionStatus::Expired, now);
            }
        }

        // One put commits the record, streaks, difficulty and any transition.
        self.sessions.put(&session).await?;

        let summary = session.status.is_terminal().then(|| summarize(&session));
        Ok(AnswerOutcome {
            question_id: question.question_id,
            is_correct,
            selected_choice: req.selected_choice,
            correct_choice: question.correct_choice,
            rationale,
            current_difficulty: session.current_difficulty,
            session_completed: session.status.is_terminal(),
            response_ms,
            summary,
        })
    }

    /// Ends a session. `in_progress` becomes `completed`; a session already
    /// in a terminal state is left untouched. Always returns the summary.
    pub async fn end(&self, session_id: &str) -> Result<SessionSummary, AppError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_live(session_id).await?;

        let now = Utc::now();
        if session.past_deadline(now) {
            self.close(&mut session, SessionStatus::Expired, now);
            self.sessions.put(&session).await?;
        } else if session.status == SessionStatus::InProgress {
            self.close(&mut session, SessionStatus::Completed, now);
            self.sessions.put(&session).await?;
            tracing::info!("Session {} ended by the learner", session.session_id);
        }

        Ok(summarize(&session))
    }

    /// Read-only session fetch for the owner. Reports lazy expiry without
    /// writing it back; the next mutating call commits the transition.
    pub async fn resume(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<QuizSession, AppError> {
        let mut session = self.load_live(session_id).await?;
        if session.user_id != user_id {
            return Err(AppError::Forbidden(
                "This session belongs to another user".to_string(),
            ));
        }
        if session.past_deadline(Utc::now()) {
            session.status = SessionStatus::Expired;
            session.active_question = None;
        }
        Ok(session)
    }

    /// Newest-first summaries of a learner's undeleted sessions for a quiz.
    pub async fn history(
        &self,
        quiz_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, AppError> {
        let sessions = self.sessions.list_for_user(quiz_id, user_id, limit).await?;
        let now = Utc::now();
        Ok(sessions
            .into_iter()
            .map(|mut session| {
                if session.past_deadline(now) {
                    session.status = SessionStatus::Expired;
                }
                summarize(&session)
            })
            .collect())
    }

    /// Owner-checked soft delete. An `in_progress` session is marked
    /// abandoned before it is removed from queries.
    pub async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<(), AppError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_live(session_id).await?;
        if session.user_id != user_id {
            return Err(AppError::Forbidden(
                "This session belongs to another user".to_string(),
            ));
        }

        if session.status == SessionStatus::InProgress {
            self.close(&mut session, SessionStatus::Abandoned, Utc::now());
            self.sessions.put(&session).await?;
        }
        if !self.sessions.delete(session_id).await? {
            return Err(AppError::NotFound(format!(
                "Quiz session {} not found",
                session_id
            )));
        }
        tracing::info!("Deleted session {}", session_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn load_live(&self, session_id: &str) -> Result<QuizSession, AppError> {
        self.sessions.get(session_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Quiz session {} not found", session_id))
        })
    }

    /// Commits lazy expiry if the deadline passed, then rejects any session
    /// that is not `in_progress`. Callers must hold the session lock.
    async fn require_in_progress(&self, session: &mut QuizSession) -> Result<(), AppError> {
        let now = Utc::now();
        if session.past_deadline(now) {
            self.close(session, SessionStatus::Expired, now);
            self.sessions.put(session).await?;
            tracing::info!("Session {} expired lazily", session.session_id);
        }
        if session.status != SessionStatus::InProgress {
            return Err(AppError::SessionNoLongerActive(session.status));
        }
        Ok(())
    }

    fn assessment_quota_reached(&self, session: &QuizSession) -> bool {
        match (session.mode, session.num_questions) {
            (QuizMode::Assessment, Some(quota)) => {
                session.questions_answered() >= quota as usize
            }
            _ => false,
        }
    }

    fn close(&self, session: &mut QuizSession, status: SessionStatus, now: DateTime<Utc>) {
        session.status = status;
        session.completed_at = Some(now);
        session.active_question = None;
    }

    /// Runs the generator against the chosen snippet with a bounded timeout,
    /// then once more against the fallback snippet. The session is untouched
    /// on failure, so the caller may simply retry `next`.
    async fn generate_with_retry(
        &self,
        choice: &SnippetChoice,
        difficulty: Difficulty,
        order: u32,
    ) -> Result<(GeneratedQuestion, Snippet), AppError> {
        let timeout = self.settings.generator_timeout;

        match tokio::time::timeout(timeout, self.generator.generate(&choice.primary, difficulty, order)).await {
            Ok(Ok(generated)) => return Ok((generated, choice.primary.clone())),
            Ok(Err(e)) => {
                tracing::warn!(
                    "Question generation failed on snippet {}: {:?}",
                    choice.primary.snippet_id,
                    e
                );
            }
            Err(_) => {
                tracing::warn!(
                    "Question generation timed out on snippet {}",
                    choice.primary.snippet_id
                );
            }
        }

        let Some(retry) = &choice.retry else {
            return Err(AppError::QuestionGenerationFailed(
                "generation failed and no alternative snippet was available".to_string(),
            ));
        };
        match tokio::time::timeout(timeout, self.generator.generate(retry, difficulty, order)).await
        {
            Ok(Ok(generated)) => Ok((generated, retry.clone())),
            Ok(Err(e)) => Err(AppError::QuestionGenerationFailed(e.to_string())),
            Err(_) => Err(AppError::QuestionGenerationFailed(
                "generation timed out on both snippets".to_string(),
            )),
        }
    }
}
