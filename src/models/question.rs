// src/models/question.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::Difficulty;

/// A generated multiple-choice question as cached inside the session
/// document, answer key and rationales included. Never sent to clients
/// directly; see `PublicQuestion`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question_id: String,
    /// 1-indexed position within the session.
    pub order: u32,
    pub prompt: String,
    /// Choice texts in display order. Always at least two, all distinct.
    pub choices: Vec<String>,
    /// The member of `choices` that is correct.
    pub correct_choice: String,
    /// Why the correct choice is correct.
    pub rationale: String,
    /// Why each incorrect choice is wrong, keyed by choice text.
    pub incorrect_rationales: BTreeMap<String, String>,
    pub difficulty: Difficulty,
    pub topic: String,
    pub source_snippet_id: String,
    pub served_at: DateTime<Utc>,
}

impl QuestionRecord {
    /// Looks up the explanation for an incorrect pick, if the generator
    /// provided one for that choice.
    pub fn rationale_for_incorrect(&self, choice: &str) -> Option<&str> {
        self.incorrect_rationales.get(choice).map(String::as_str)
    }
}

/// DTO for sending a question to the client (excludes the answer key,
/// all rationales and the source snippet).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub question_id: String,
    pub order: u32,
    pub prompt: String,
    pub choices: Vec<String>,
    pub difficulty: Difficulty,
    pub topic: String,
}

impl From<&QuestionRecord> for PublicQuestion {
    fn from(record: &QuestionRecord) -> Self {
        Self {
            question_id: record.question_id.clone(),
            order: record.order,
            prompt: record.prompt.clone(),
            choices: record.choices.clone(),
            difficulty: record.difficulty,
            topic: record.topic.clone(),
        }
    }
}
