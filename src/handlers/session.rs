// src/handlers/session.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    engine::{QuizEngine, scoring},
    error::AppError,
    models::{
        question::PublicQuestion,
        session::{
            AnswerRequest, SessionDetail, SessionView, StartSessionRequest, StartSessionResponse,
        },
    },
};

const HISTORY_DEFAULT_LIMIT: usize = 20;
const HISTORY_MAX_LIMIT: usize = 100;

/// Query parameters identifying the session owner.
#[derive(Debug, Deserialize)]
pub struct OwnerParams {
    pub user_id: String,
}

/// Query parameters for the session history listing.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub quiz_id: String,
    pub user_id: String,
    pub limit: Option<usize>,
}

/// Starts a session for a learner, or resumes their `in_progress` one.
///
/// * Returns the session state plus a `resumed` flag so clients can tell
///   a fresh attempt from a reconnect.
pub async fn start_session(
    State(engine): State<Arc<QuizEngine>>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let (session, resumed) = engine.start(payload).await?;
    Ok(Json(StartSessionResponse {
        session: SessionView::from(&session),
        resumed,
    }))
}

/// Serves the next question for a session, stripped of its answer key.
pub async fn next_question(
    State(engine): State<Arc<QuizEngine>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = engine.next(&session_id).await?;
    Ok(Json(PublicQuestion::from(&record)))
}

/// Grades an answer to the currently pending question.
pub async fn submit_answer(
    State(engine): State<Arc<QuizEngine>>,
    Path(session_id): Path<String>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let outcome = engine.answer(&session_id, payload).await?;
    Ok(Json(outcome))
}

/// Ends a session early and returns its final summary.
pub async fn end_session(
    State(engine): State<Arc<QuizEngine>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let summary = engine.end(&session_id).await?;
    Ok(Json(summary))
}

/// Fetches the owner's view of one session, pending question included.
pub async fn get_session(
    State(engine): State<Arc<QuizEngine>>,
    Path(session_id): Path<String>,
    Query(params): Query<OwnerParams>,
) -> Result<impl IntoResponse, AppError> {
    let session = engine.resume(&session_id, &params.user_id).await?;

    let view = SessionView::from(&session);
    let active_question = session.active_question.as_ref().map(PublicQuestion::from);
    let summary = scoring::summarize(&session);
    Ok(Json(SessionDetail {
        session: view,
        active_question,
        summary,
    }))
}

/// Lists a learner's sessions for one quiz, newest first.
pub async fn list_sessions(
    State(engine): State<Arc<QuizEngine>>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.quiz_id.trim().is_empty() || params.user_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "quiz_id and user_id are required".to_string(),
        ));
    }

    let limit = params
        .limit
        .unwrap_or(HISTORY_DEFAULT_LIMIT)
        .clamp(1, HISTORY_MAX_LIMIT);
    let summaries = engine.history(&params.quiz_id, &params.user_id, limit).await?;
    Ok(Json(summaries))
}

/// Deletes a session. An `in_progress` session is marked abandoned first so
/// it stops counting toward the quiz's attempt limit.
pub async fn delete_session(
    State(engine): State<Arc<QuizEngine>>,
    Path(session_id): Path<String>,
    Query(params): Query<OwnerParams>,
) -> Result<impl IntoResponse, AppError> {
    engine.delete_session(&session_id, &params.user_id).await?;
    Ok(Json(serde_json::json!({
        "status": "deleted",
        "session_id": session_id,
    })))
}
