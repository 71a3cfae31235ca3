// src/models/definition.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::session::{Difficulty, QuizMode};

/// An instructor-authored quiz: the template sessions are started from.
/// Sessions snapshot what they need at start, so edits here never touch
/// attempts already in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub quiz_id: String,
    pub name: String,
    /// Non-empty, trimmed, deduplicated.
    pub topics: Vec<String>,
    pub default_mode: QuizMode,
    pub initial_difficulty: Difficulty,
    /// Questions per assessment attempt. Required to start an assessment,
    /// ignored in practice mode.
    pub num_questions: Option<u32>,
    /// Minutes before a timed assessment expires. `None` = untimed.
    pub time_limit_minutes: Option<u32>,
    /// Assessment attempts allowed per learner. `None` = unlimited.
    pub max_attempts: Option<u32>,
    /// Unpublished quizzes cannot start new sessions.
    pub is_published: bool,
    /// Free-form author metadata, stored and returned untouched.
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating or replacing a quiz definition.
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertQuizDefinitionRequest {
    #[validate(length(min = 1, max = 128))]
    pub quiz_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(custom(function = validate_topics))]
    pub topics: Vec<String>,
    pub default_mode: Option<QuizMode>,
    pub initial_difficulty: Option<Difficulty>,
    #[validate(range(min = 1, max = 100))]
    pub num_questions: Option<u32>,
    #[validate(range(min = 1, max = 1440))]
    pub time_limit_minutes: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: Option<u32>,
    pub is_published: Option<bool>,
    pub metadata: Option<Value>,
}

fn validate_topics(topics: &[String]) -> Result<(), validator::ValidationError> {
    if topics.is_empty() {
        return Err(validator::ValidationError::new("topics_cannot_be_empty"));
    }
    for topic in topics {
        if topic.trim().is_empty() {
            return Err(validator::ValidationError::new("topic_cannot_be_blank"));
        }
        if topic.len() > 200 {
            return Err(validator::ValidationError::new("topic_too_long"));
        }
    }
    Ok(())
}
