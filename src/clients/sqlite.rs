// src/clients/sqlite.rs

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

use crate::clients::store::{DefinitionStore, SessionStore};
use crate::error::AppError;
use crate::models::definition::QuizDefinition;
use crate::models::session::{Difficulty, QuizMode, QuizSession, SessionStatus};

/// Opens the SQLite database (creating the file if missing) and applies
/// the embedded migrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// SQLite-backed session store. Each session is one row: the columns the
/// store queries by, plus the full session as a JSON document.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn decode(document: &str) -> Result<QuizSession, AppError> {
        Ok(serde_json::from_str(document)?)
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<QuizSession>, AppError> {
        let document: Option<String> = sqlx::query_scalar(
            "SELECT document FROM quiz_sessions WHERE session_id = ? AND deleted_at IS NULL",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        document.as_deref().map(Self::decode).transpose()
    }

    async fn put(&self, session: &QuizSession) -> Result<(), AppError> {
        let document = serde_json::to_string(session)?;
        sqlx::query(
            r#"
            INSERT INTO quiz_sessions (session_id, quiz_id, user_id, status, started_at, document)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                status = excluded.status,
                document = excluded.document
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.quiz_id)
        .bind(&session.user_id)
        .bind(session.status.as_str())
        .bind(session.started_at)
        .bind(&document)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE quiz_sessions SET deleted_at = ? WHERE session_id = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_active(
        &self,
        quiz_id: &str,
        user_id: &str,
    ) -> Result<Option<QuizSession>, AppError> {
        let document: Option<String> = sqlx::query_scalar(
            r#"
            SELECT document FROM quiz_sessions
            WHERE quiz_id = ? AND user_id = ? AND status = ? AND deleted_at IS NULL
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .bind(SessionStatus::InProgress.as_str())
        .fetch_optional(&self.pool)
        .await?;

        document.as_deref().map(Self::decode).transpose()
    }

    async fn list_for_user(
        &self,
        quiz_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<QuizSession>, AppError> {
        let documents: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT document FROM quiz_sessions
            WHERE quiz_id = ? AND user_id = ? AND deleted_at IS NULL
            ORDER BY started_at DESC
            LIMIT ?
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&self.pool)
        .await?;

        documents
            .iter()
            .map(|doc| Self::decode(doc))
            .collect()
    }

    async fn count_for_user(&self, quiz_id: &str, user_id: &str) -> Result<u32, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM quiz_sessions
            WHERE quiz_id = ? AND user_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }
}

/// Maps the 'quiz_definitions' table. Enums travel as TEXT, JSON columns
/// through `sqlx::types::Json`.
#[derive(FromRow)]
struct DefinitionRow {
    quiz_id: String,
    name: Option<String>,
    topics: Json<Vec<String>>,
    default_mode: String,
    initial_difficulty: String,
    num_questions: Option<u32>,
    time_limit_minutes: Option<u32>,
    max_attempts: Option<u32>,
    is_published: bool,
    metadata: Option<Json<Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DefinitionRow {
    fn into_definition(self) -> Result<QuizDefinition, AppError> {
        let default_mode = self
            .default_mode
            .parse::<QuizMode>()
            .map_err(AppError::InternalServerError)?;
        let initial_difficulty = self
            .initial_difficulty
            .parse::<Difficulty>()
            .map_err(AppError::InternalServerError)?;

        Ok(QuizDefinition {
            quiz_id: self.quiz_id,
            name: self.name.unwrap_or_default(),
            topics: self.topics.0,
            default_mode,
            initial_difficulty,
            num_questions: self.num_questions,
            time_limit_minutes: self.time_limit_minutes,
            max_attempts: self.max_attempts,
            is_published: self.is_published,
            metadata: self
                .metadata
                .map(|m| m.0)
                .unwrap_or_else(|| Value::Object(Default::default())),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const DEFINITION_COLUMNS: &str = "quiz_id, name, topics, default_mode, initial_difficulty, \
     num_questions, time_limit_minutes, max_attempts, is_published, metadata, \
     created_at, updated_at";

/// SQLite-backed definition store.
pub struct SqliteDefinitionStore {
    pool: SqlitePool,
}

impl SqliteDefinitionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DefinitionStore for SqliteDefinitionStore {
    async fn get(&self, quiz_id: &str) -> Result<Option<QuizDefinition>, AppError> {
        let row: Option<DefinitionRow> = sqlx::query_as(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM quiz_definitions \
             WHERE quiz_id = ? AND deleted_at IS NULL"
        ))
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DefinitionRow::into_definition).transpose()
    }

    async fn put(&self, definition: &QuizDefinition) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO quiz_definitions (quiz_id, name, topics, default_mode, initial_difficulty,
                num_questions, time_limit_minutes, max_attempts, is_published, metadata,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(quiz_id) DO UPDATE SET
                name = excluded.name,
                topics = excluded.topics,
                default_mode = excluded.default_mode,
                initial_difficulty = excluded.initial_difficulty,
                num_questions = excluded.num_questions,
                time_limit_minutes = excluded.time_limit_minutes,
                max_attempts = excluded.max_attempts,
                is_published = excluded.is_published,
                metadata = excluded.metadata,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                deleted_at = NULL
            "#,
        )
        .bind(&definition.quiz_id)
        .bind(&definition.name)
        .bind(Json(&definition.topics))
        .bind(definition.default_mode.as_str())
        .bind(definition.initial_difficulty.as_str())
        .bind(definition.num_questions)
        .bind(definition.time_limit_minutes)
        .bind(definition.max_attempts)
        .bind(definition.is_published)
        .bind(Json(&definition.metadata))
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, quiz_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE quiz_definitions SET deleted_at = ? WHERE quiz_id = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(quiz_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<QuizDefinition>, AppError> {
        let rows: Vec<DefinitionRow> = sqlx::query_as(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM quiz_definitions \
             WHERE deleted_at IS NULL ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(DefinitionRow::into_definition)
            .collect()
    }
}
