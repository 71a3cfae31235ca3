// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

use crate::models::session::Difficulty;

/// Runtime configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// SQLite database URL. When unset the server runs on in-memory stores
    /// (sessions do not survive a restart).
    pub database_url: Option<String>,
    pub rust_log: String,
    pub generator: GeneratorConfig,
    pub engine: EngineSettings,
}

/// Connection settings for the LLM question generator.
/// When `api_key` is absent the deterministic template generator is used.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Tunables for the session engine. Every knob has a default; the
/// environment only needs to override what differs per deployment.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Consecutive correct answers required to step practice difficulty up.
    pub increase_streak: u32,
    /// Consecutive incorrect answers required to step practice difficulty down.
    pub decrease_streak: u32,
    /// Fraction of the snippet pool that must be served before repeats are allowed.
    pub coverage_threshold: f64,
    /// Questions that must be served before a missed snippet may come back.
    pub missed_question_gap: usize,
    /// How many snippets to request from the content pool per question.
    pub retriever_top_k: usize,
    /// How many of the top-K snippets to sample before applying coverage.
    pub retriever_sample_size: usize,
    /// Upper bound on a single generator call; `next` retries once within it.
    pub generator_timeout: Duration,
    /// Fallback initial difficulty when neither request nor definition sets one.
    pub default_difficulty: Difficulty,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            increase_streak: 3,
            decrease_streak: 2,
            coverage_threshold: 0.70,
            missed_question_gap: 2,
            retriever_top_k: 10,
            retriever_sample_size: 4,
            generator_timeout: Duration::from_secs(40),
            default_difficulty: Difficulty::Medium,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let database_url = env::var("DATABASE_URL").ok();

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let base_url = env::var("OPENROUTER_BASE_URL")
            .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());
        Url::parse(&base_url).expect("OPENROUTER_BASE_URL must be a valid URL");

        let generator = GeneratorConfig {
            api_key: env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url,
            model: env::var("OPENROUTER_MODEL_NAME")
                .unwrap_or_else(|_| "google/gemini-2.0-flash-exp:free".to_string()),
            timeout: Duration::from_secs(env_parse("OPENROUTER_TIMEOUT_SECONDS", 40u64).max(1)),
        };

        let defaults = EngineSettings::default();
        let engine = EngineSettings {
            increase_streak: env_parse("QUIZ_PRACTICE_INCREASE_STREAK", defaults.increase_streak)
                .max(1),
            decrease_streak: env_parse("QUIZ_PRACTICE_DECREASE_STREAK", defaults.decrease_streak)
                .max(1),
            coverage_threshold: env_parse("QUIZ_COVERAGE_THRESHOLD", defaults.coverage_threshold)
                .clamp(0.0, 1.0),
            missed_question_gap: env_parse(
                "QUIZ_MISSED_QUESTION_GAP",
                defaults.missed_question_gap,
            ),
            retriever_top_k: env_parse("QUIZ_RETRIEVER_TOP_K", defaults.retriever_top_k).max(1),
            retriever_sample_size: env_parse(
                "QUIZ_RETRIEVER_SAMPLE_SIZE",
                defaults.retriever_sample_size,
            )
            .max(1),
            generator_timeout: generator.timeout,
            default_difficulty: defaults.default_difficulty,
        };

        Self {
            bind_addr,
            database_url,
            rust_log,
            generator,
            engine,
        }
    }
}

/// Reads an environment variable and parses it, falling back to `default`
/// when the variable is unset or malformed (malformed values are logged).
fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults_match_documented_values() {
        let settings = EngineSettings::default();
        assert_eq!(settings.increase_streak, 3);
        assert_eq!(settings.decrease_streak, 2);
        assert!((settings.coverage_threshold - 0.70).abs() < f64::EPSILON);
        assert_eq!(settings.missed_question_gap, 2);
    }
}
