// src/clients/generator.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};

use crate::clients::content::Snippet;
use crate::config::GeneratorConfig;
use crate::models::session::Difficulty;
use crate::utils::html::clean_html;

/// Errors from question generation. The engine retries once on a different
/// snippet before surfacing `AppError::QuestionGenerationFailed`.
#[derive(Debug)]
pub enum GeneratorError {
    /// The upstream call failed (network, timeout, non-2xx status).
    Upstream(String),
    /// The model answered, but not with a usable question.
    InvalidFormat(String),
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::Upstream(msg) => write!(f, "generator upstream error: {}", msg),
            GeneratorError::InvalidFormat(msg) => write!(f, "generator returned bad output: {}", msg),
        }
    }
}

impl std::error::Error for GeneratorError {}

/// A question as produced by a generator, before the engine assigns it an
/// id and a position in the session.
#[derive(Debug, Clone)]
pub struct GeneratedQuestion {
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_choice: String,
    pub rationale: String,
    pub incorrect_rationales: BTreeMap<String, String>,
}

/// Produces one multiple-choice question from a snippet.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(
        &self,
        snippet: &Snippet,
        difficulty: Difficulty,
        order: u32,
    ) -> Result<GeneratedQuestion, GeneratorError>;
}

/// Generates questions through an OpenAI-compatible chat completions API.
pub struct LlmQuestionGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl LlmQuestionGenerator {
    pub fn new(config: &GeneratorConfig, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    async fn generate(
        &self,
        snippet: &Snippet,
        difficulty: Difficulty,
        order: u32,
    ) -> Result<GeneratedQuestion, GeneratorError> {
        let instructions = "You are an instructional design assistant. \
            Write a single multiple-choice question that checks conceptual understanding \
            of the provided source material. \
            Return ONLY a JSON object with keys: prompt (string), choices (array of 4 distinct strings), \
            correct_answer (string exactly matching one choice), correct_rationale (string), \
            incorrect_rationales (object keyed by choice with short explanation).\n\
            Keep the distractors plausible but definitively incorrect. \
            Do not include any text before or after the JSON object and do not wrap it in Markdown fences.";
        let learner_prompt = format!(
            "Topic: {}\nDifficulty: {}\nQuestion Number: {}\nSource material:\n{}\n\
             Follow the format instructions strictly.",
            snippet.topic, difficulty, order, snippet.text,
        );

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": instructions },
                { "role": "user", "content": learner_prompt },
            ],
            "temperature": 0.4,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| GeneratorError::Upstream(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Upstream(format!("{}: {}", status, text)));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| GeneratorError::Upstream(format!("invalid response body: {}", e)))?;
        let content = envelope
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GeneratorError::InvalidFormat("response carried no message content".to_string())
            })?;

        parse_generated(content, &snippet.topic)
    }
}

/// Parses a model response into a validated question.
///
/// Tolerates the failure modes actually seen in the wild: Markdown fences
/// around the JSON, prose before or after it, missing distractor rationales.
/// Rejects responses with fewer than two distinct choices or a correct
/// answer that is not one of the choices. All text is sanitized before use.
pub fn parse_generated(raw: &str, topic: &str) -> Result<GeneratedQuestion, GeneratorError> {
    let mut text = raw.trim();
    if text.is_empty() {
        return Err(GeneratorError::InvalidFormat(
            "model returned an empty response".to_string(),
        ));
    }

    let stripped;
    if text.starts_with("```") {
        stripped = strip_markdown_fence(text);
        text = &stripped;
    }

    let payload = extract_json_object(text)?;

    let prompt = clean_text(payload.get("prompt").unwrap_or(&Value::Null));

    let mut choices: Vec<String> = Vec::new();
    if let Some(items) = payload.get("choices").and_then(Value::as_array) {
        for item in items {
            let choice = clean_text(item);
            if !choice.is_empty() && !choices.contains(&choice) {
                choices.push(choice);
            }
        }
    }
    if choices.len() < 2 {
        return Err(GeneratorError::InvalidFormat(
            "fewer than two distinct choices".to_string(),
        ));
    }

    let correct_choice = clean_text(payload.get("correct_answer").unwrap_or(&Value::Null));
    if !choices.contains(&correct_choice) {
        return Err(GeneratorError::InvalidFormat(
            "correct answer missing from choices".to_string(),
        ));
    }

    let mut rationale = clean_text(payload.get("correct_rationale").unwrap_or(&Value::Null));
    if rationale.is_empty() {
        rationale = format!("The correct choice best represents the topic {}.", topic);
    }

    let mut incorrect_rationales = BTreeMap::new();
    if let Some(map) = payload.get("incorrect_rationales").and_then(Value::as_object) {
        for (key, value) in map {
            let choice = clean_html(key.trim());
            if choices.contains(&choice) && choice != correct_choice {
                incorrect_rationales.insert(choice, clean_text(value));
            }
        }
    }
    // Every distractor gets a rationale; supply a generic one when missing.
    for choice in &choices {
        if choice != &correct_choice && !incorrect_rationales.contains_key(choice) {
            incorrect_rationales.insert(
                choice.clone(),
                "This option does not correctly address the prompt.".to_string(),
            );
        }
    }

    Ok(GeneratedQuestion {
        prompt,
        choices,
        correct_choice,
        rationale,
        incorrect_rationales,
    })
}

/// Pulls the outermost JSON object out of `text`, trying the brace-bounded
/// slice first and the whole text second.
fn extract_json_object(text: &str) -> Result<serde_json::Map<String, Value>, GeneratorError> {
    let candidate = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&text[start..=end]),
        _ => None,
    };

    for slice in candidate.into_iter().chain(std::iter::once(text)) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(slice) {
            return Ok(map);
        }
    }

    Err(GeneratorError::InvalidFormat(
        "model returned invalid question format".to_string(),
    ))
}

/// Removes a leading ```lang fence and the trailing fence, if present.
fn strip_markdown_fence(raw: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"^```[a-zA-Z0-9_-]*\s*").expect("fence pattern is valid")
    });

    let mut text = fence.replace(raw.trim(), "").into_owned();
    if let Some(pos) = text.rfind("```") {
        text.truncate(pos);
    }
    text.trim().to_string()
}

/// Stringifies a JSON value, trims it and strips any markup the model smuggled in.
fn clean_text(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    clean_html(raw.trim()).trim().to_string()
}

/// Deterministic offline generator, selected automatically when no API key
/// is configured. Builds a four-choice question from the snippet's topic
/// with the correct choice first.
pub struct TemplateQuestionGenerator;

#[async_trait]
impl QuestionGenerator for TemplateQuestionGenerator {
    async fn generate(
        &self,
        snippet: &Snippet,
        _difficulty: Difficulty,
        _order: u32,
    ) -> Result<GeneratedQuestion, GeneratorError> {
        let topic = &snippet.topic;
        let correct_choice = format!("The option summarizing {} fundamentals.", topic);
        let distractors = [
            format!("An idea mostly unrelated to {}.", topic),
            format!("A misconception commonly seen about {}.", topic),
            format!("A detail that only loosely connects to {}.", topic),
        ];
        let incorrect_rationales = BTreeMap::from([
            (
                distractors[0].clone(),
                format!("This option does not focus on {} and goes off-topic.", topic),
            ),
            (
                distractors[1].clone(),
                format!("This reflects a common misunderstanding of {}.", topic),
            ),
            (
                distractors[2].clone(),
                format!(
                    "This detail is tangential and does not capture the core of {}.",
                    topic
                ),
            ),
        ]);

        Ok(GeneratedQuestion {
            prompt: format!(
                "Which option best represents a key idea from the topic '{}'?",
                topic
            ),
            choices: vec![
                correct_choice.clone(),
                distractors[0].clone(),
                distractors[1].clone(),
                distractors[2].clone(),
            ],
            correct_choice,
            rationale: format!(
                "The correct answer highlights the fundamental concept within {}.",
                topic
            ),
            incorrect_rationales,
        })
    }
}
