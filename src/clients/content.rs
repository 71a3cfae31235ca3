// src/clients/content.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A unit of source material questions are generated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    pub snippet_id: String,
    pub topic: String,
    pub text: String,
    /// Optional label for where the snippet came from.
    #[serde(default)]
    pub source: Option<String>,
    /// Optional retrieval score, higher is more relevant.
    #[serde(default)]
    pub score: Option<f64>,
}

/// Supplies candidate snippets for a session's topics.
#[async_trait]
pub trait ContentPool: Send + Sync {
    /// Returns up to `k` snippets matching any of `topics`, most relevant first.
    async fn sample(&self, topics: &[String], k: usize) -> Result<Vec<Snippet>, AppError>;
}

/// In-memory topic-keyed pool for dev and tests. Production deployments
/// point the engine at a retrieval-backed pool outside this crate.
///
/// When the pool holds nothing for the requested topics it synthesizes one
/// snippet per topic from the topic name itself, so a bare deployment can
/// still serve questions.
pub struct StaticContentPool {
    snippets: Vec<Snippet>,
}

impl StaticContentPool {
    pub fn new(snippets: Vec<Snippet>) -> Self {
        Self { snippets }
    }

    pub fn empty() -> Self {
        Self {
            snippets: Vec::new(),
        }
    }
}

#[async_trait]
impl ContentPool for StaticContentPool {
    async fn sample(&self, topics: &[String], k: usize) -> Result<Vec<Snippet>, AppError> {
        let mut matched: Vec<Snippet> = self
            .snippets
            .iter()
            .filter(|s| topics.iter().any(|t| t == &s.topic))
            .cloned()
            .collect();

        // Higher retrieval score first; unscored snippets keep insertion order.
        matched.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if matched.is_empty() {
            matched = topics
                .iter()
                .map(|topic| Snippet {
                    snippet_id: format!("topic:{topic}"),
                    topic: topic.clone(),
                    text: topic.clone(),
                    source: None,
                    score: None,
                })
                .collect();
        }

        matched.truncate(k);
        Ok(matched)
    }
}
