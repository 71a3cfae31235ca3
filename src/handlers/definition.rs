// src/handlers/definition.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    engine::QuizEngine, error::AppError, models::definition::UpsertQuizDefinitionRequest,
};

/// Creates or replaces a quiz definition.
pub async fn upsert_definition(
    State(engine): State<Arc<QuizEngine>>,
    Json(payload): Json<UpsertQuizDefinitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let definition = engine.upsert_definition(payload).await?;
    Ok(Json(definition))
}

/// Lists all quiz definitions.
pub async fn list_definitions(
    State(engine): State<Arc<QuizEngine>>,
) -> Result<impl IntoResponse, AppError> {
    let definitions = engine.list_definitions().await?;
    Ok(Json(definitions))
}

/// Fetches one quiz definition.
pub async fn get_definition(
    State(engine): State<Arc<QuizEngine>>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let definition = engine.get_definition(&quiz_id).await?;
    Ok(Json(definition))
}

/// Soft-deletes a quiz definition. Sessions already in flight keep the
/// constraint snapshots they took at start.
pub async fn delete_definition(
    State(engine): State<Arc<QuizEngine>>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    engine.delete_definition(&quiz_id).await?;
    Ok(Json(serde_json::json!({
        "status": "deleted",
        "quiz_id": quiz_id,
    })))
}
