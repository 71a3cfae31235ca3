// src/engine/scoring.rs

use std::collections::BTreeMap;

use crate::models::session::QuizSession;
use crate::models::summary::{SessionSummary, TopicStats};

/// Folds a session's answer log into its summary. The log is the single
/// source of truth; no separately maintained counters are consulted.
pub fn summarize(session: &QuizSession) -> SessionSummary {
    let mut correct_answers = 0usize;
    let mut total_time_ms = 0i64;
    let mut max_correct_streak = 0u32;
    let mut run = 0u32;
    let mut per_topic: BTreeMap<String, TopicStats> = BTreeMap::new();

    for record in &session.answer_log {
        let stats = per_topic.entry(record.topic.clone()).or_default();
        stats.attempted += 1;
        if record.is_correct {
            correct_answers += 1;
            stats.correct += 1;
            run += 1;
            max_correct_streak = max_correct_streak.max(run);
        } else {
            run = 0;
        }
        total_time_ms += record.response_time_ms;
    }

    let total_questions = session.answer_log.len();
    let accuracy = if total_questions == 0 {
        0.0
    } else {
        correct_answers as f64 / total_questions as f64
    };

    SessionSummary {
        session_id: session.session_id.clone(),
        quiz_id: session.quiz_id.clone(),
        user_id: session.user_id.clone(),
        mode: session.mode,
        status: session.status,
        total_questions,
        correct_answers,
        accuracy,
        total_time_ms,
        max_correct_streak,
        per_topic,
        started_at: session.started_at,
        completed_at: session.completed_at,
    }
}
