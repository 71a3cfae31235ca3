// src/models/summary.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::{QuizMode, SessionStatus};

/// Aggregate results for a session, derived on demand from its answer log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub mode: QuizMode,
    pub status: SessionStatus,
    /// Number of answered questions.
    pub total_questions: usize,
    pub correct_answers: usize,
    /// Exact `correct / total`; 0.0 when nothing was answered.
    pub accuracy: f64,
    /// Sum of per-answer response times.
    pub total_time_ms: i64,
    /// Longest run of consecutive correct answers.
    pub max_correct_streak: u32,
    pub per_topic: BTreeMap<String, TopicStats>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-topic answer tallies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TopicStats {
    pub attempted: usize,
    pub correct: usize,
}
