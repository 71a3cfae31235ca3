// src/models/session.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::{PublicQuestion, QuestionRecord};
use crate::models::summary::SessionSummary;

/// Question difficulty scale. Practice sessions move along it one step at a
/// time; assessment sessions stay on their starting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// One step harder, saturating at `Hard`.
    pub fn step_up(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Hard,
        }
    }

    /// One step easier, saturating at `Easy`.
    pub fn step_down(self) -> Self {
        match self {
            Difficulty::Hard => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Easy,
            Difficulty::Easy => Difficulty::Easy,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Session mode: 'practice' (open-ended, adaptive difficulty) or
/// 'assessment' (fixed question count, fixed difficulty).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    Practice,
    Assessment,
}

impl QuizMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizMode::Practice => "practice",
            QuizMode::Assessment => "assessment",
        }
    }
}

impl std::fmt::Display for QuizMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuizMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "practice" => Ok(QuizMode::Practice),
            "assessment" => Ok(QuizMode::Assessment),
            other => Err(format!("unknown quiz mode: {other}")),
        }
    }
}

/// Lifecycle state of a session. `InProgress` is the only state that
/// accepts further questions and answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Expired,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One graded answer in a session's log. Snapshots topic, difficulty and
/// snippet so the log alone is enough to score the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    pub selected_choice: String,
    pub is_correct: bool,
    /// Milliseconds between the question being served and the answer
    /// arriving, floored at 0.
    pub response_time_ms: i64,
    pub answered_at: DateTime<Utc>,
    pub topic: String,
    pub difficulty: Difficulty,
    pub source_snippet_id: String,
}

/// One learner attempt at a quiz, persisted as a single document.
/// Every constraint a decision depends on is snapshotted at start time,
/// so editing the definition never changes a session already in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSession {
    pub session_id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub mode: QuizMode,
    pub status: SessionStatus,
    /// 1-indexed count of this learner's attempts at this quiz, this one included.
    pub attempt_number: u32,

    // Constraint snapshot taken from the definition at start.
    pub topics: Vec<String>,
    /// Assessment question quota. `None` in practice mode.
    pub num_questions: Option<u32>,
    pub max_attempts: Option<u32>,

    pub started_at: DateTime<Utc>,
    /// Hard stop for timed assessments (`started_at` + time limit).
    /// `None` for practice sessions and untimed assessments.
    pub deadline: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub current_difficulty: Difficulty,
    pub correct_streak: u32,
    pub incorrect_streak: u32,

    /// IDs of every question served, in serve order.
    pub served_question_ids: Vec<String>,
    /// The question awaiting an answer, answer key included. Present between
    /// `next` and `answer`; cleared on answer and on terminal transitions.
    pub active_question: Option<QuestionRecord>,
    pub answer_log: Vec<AnswerRecord>,

    // Coverage bookkeeping for snippet selection.
    /// Distinct snippet IDs in first-use order.
    pub used_snippet_ids: Vec<String>,
    /// Snippet ID -> serve ordinal at which its question was last missed.
    pub missed_snippets: BTreeMap<String, usize>,
}

impl QuizSession {
    /// Whether a still-running session has outlived its deadline.
    pub fn past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::InProgress && self.deadline.is_some_and(|d| now > d)
    }

    pub fn questions_served(&self) -> usize {
        self.served_question_ids.len()
    }

    pub fn questions_answered(&self) -> usize {
        self.answer_log.len()
    }
}

/// DTO for starting (or resuming) a session.
#[derive(Debug, Deserialize, Validate)]
pub struct StartSessionRequest {
    #[validate(length(min = 1, max = 128))]
    pub quiz_id: String,
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    /// Overrides the definition's default mode when present.
    pub mode: Option<QuizMode>,
    /// Overrides the definition's starting difficulty when present.
    pub initial_difficulty: Option<Difficulty>,
}

/// DTO for answering the currently served question.
#[derive(Debug, Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(length(min = 1, max = 128))]
    pub question_id: String,
    #[validate(length(min = 1, max = 1000))]
    pub selected_choice: String,
}

/// Public projection of a session: progress and adaptive state, but no
/// answer keys and no snippet bookkeeping.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub mode: QuizMode,
    pub status: SessionStatus,
    pub attempt_number: u32,
    pub current_difficulty: Difficulty,
    pub num_questions: Option<u32>,
    pub questions_served: usize,
    pub questions_answered: usize,
    pub active_question_id: Option<String>,
    pub topics: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&QuizSession> for SessionView {
    fn from(session: &QuizSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            quiz_id: session.quiz_id.clone(),
            user_id: session.user_id.clone(),
            mode: session.mode,
            status: session.status,
            attempt_number: session.attempt_number,
            current_difficulty: session.current_difficulty,
            num_questions: session.num_questions,
            questions_served: session.questions_served(),
            questions_answered: session.questions_answered(),
            active_question_id: session
                .active_question
                .as_ref()
                .map(|q| q.question_id.clone()),
            topics: session.topics.clone(),
            started_at: session.started_at,
            deadline: session.deadline,
            completed_at: session.completed_at,
        }
    }
}

/// Response for `start`: the session plus whether an existing one was resumed.
#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    #[serde(flatten)]
    pub session: SessionView,
    pub resumed: bool,
}

/// Response for fetching one session: state, the pending question (if any,
/// without its answer key) and the score so far.
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionView,
    pub active_question: Option<PublicQuestion>,
    pub summary: SessionSummary,
}

/// Response for `answer`: grading feedback plus the updated adaptive state.
#[derive(Debug, Serialize)]
pub struct AnswerOutcome {
    pub question_id: String,
    pub is_correct: bool,
    pub selected_choice: String,
    pub correct_choice: String,
    pub rationale: String,
    /// Difficulty the next question will be generated at.
    pub current_difficulty: Difficulty,
    pub session_completed: bool,
    pub response_ms: i64,
    /// Present only when this answer moved the session to a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}
