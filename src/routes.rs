// src/routes.rs

use axum::{
    Json, Router,
    http::Method,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{definition, session},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (definitions, sessions).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (quiz engine).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let definition_routes = Router::new()
        .route(
            "/",
            post(definition::upsert_definition).get(definition::list_definitions),
        )
        .route(
            "/{quiz_id}",
            get(definition::get_definition).delete(definition::delete_definition),
        );

    let session_routes = Router::new()
        .route("/", get(session::list_sessions))
        .route("/start", post(session::start_session))
        .route(
            "/{session_id}",
            get(session::get_session).delete(session::delete_session),
        )
        .route("/{session_id}/next", get(session::next_question))
        .route("/{session_id}/answer", post(session::submit_answer))
        .route("/{session_id}/end", post(session::end_session));

    Router::new()
        .route("/health", get(health))
        .nest("/api/quiz/definitions", definition_routes)
        .nest("/api/quiz/sessions", session_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Uptime probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
