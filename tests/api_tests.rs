// tests/api_tests.rs

use std::sync::Arc;
use std::time::Duration;

use quiz_backend::clients::content::StaticContentPool;
use quiz_backend::clients::generator::TemplateQuestionGenerator;
use quiz_backend::clients::store::{InMemoryDefinitionStore, InMemorySessionStore};
use quiz_backend::config::{Config, EngineSettings, GeneratorConfig};
use quiz_backend::engine::QuizEngine;
use quiz_backend::{routes, state::AppState};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
///
/// Every call builds a fully isolated app: in-memory stores and the
/// deterministic template generator, so tests never share state and never
/// reach the network.
async fn spawn_app() -> String {
    // 1. Build a test configuration (no database, no API key)
    let config = Config {
        bind_addr: "127.0.0.1:0".to_string(),
        database_url: None,
        rust_log: "error".to_string(),
        generator: GeneratorConfig {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(5),
        },
        engine: EngineSettings::default(),
    };

    // 2. Wire the engine with in-memory collaborators
    let engine = Arc::new(QuizEngine::new(
        Arc::new(InMemoryDefinitionStore::new()),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(StaticContentPool::empty()),
        Arc::new(TemplateQuestionGenerator),
        config.engine.clone(),
    ));

    let state = AppState { engine, config };

    // 3. Create the router with the app state
    let app = routes::create_router(state);

    // 4. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Creates a quiz definition and returns the response body.
async fn create_quiz(
    client: &reqwest::Client,
    address: &str,
    body: serde_json::Value,
) -> serde_json::Value {
    let response = client
        .post(&format!("{}/api/quiz/definitions", address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.expect("Failed to parse json")
}

/// Starts a session and returns the response body.
async fn start_session(
    client: &reqwest::Client,
    address: &str,
    quiz_id: &str,
    user_id: &str,
) -> serde_json::Value {
    let response = client
        .post(&format!("{}/api/quiz/sessions/start", address))
        .json(&serde_json::json!({ "quiz_id": quiz_id, "user_id": user_id }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.expect("Failed to parse json")
}

#[tokio::test]
async fn health_check_works() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/health", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_route_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn definition_crud_flow() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // 1. Create
    let created = create_quiz(
        &client,
        &address,
        serde_json::json!({
            "quiz_id": "rust-basics",
            "name": "Rust Basics",
            "topics": ["ownership", "lifetimes"],
            "default_mode": "practice",
            "initial_difficulty": "easy"
        }),
    )
    .await;
    assert_eq!(created["quiz_id"], "rust-basics");
    assert_eq!(created["name"], "Rust Basics");
    assert_eq!(created["is_published"], true);

    // 2. List
    let list: serde_json::Value = client
        .get(&format!("{}/api/quiz/definitions", address))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    // 3. Get
    let response = client
        .get(&format!("{}/api/quiz/definitions/rust-basics", address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let fetched: serde_json::Value = response.json().await.unwrap();
    assert_eq!(fetched["topics"], serde_json::json!(["ownership", "lifetimes"]));

    // 4. Delete
    let response = client
        .delete(&format!("{}/api/quiz/definitions/rust-basics", address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "deleted");
    assert_eq!(body["quiz_id"], "rust-basics");

    // 5. Gone
    let response = client
        .get(&format!("{}/api/quiz/definitions/rust-basics", address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn definition_validation_fails() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: topics must not be empty
    let response = client
        .post(&format!("{}/api/quiz/definitions", address))
        .json(&serde_json::json!({
            "quiz_id": "bad-quiz",
            "topics": []
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn start_session_works_and_resumes() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    create_quiz(
        &client,
        &address,
        serde_json::json!({ "quiz_id": "rust-basics", "topics": ["ownership"] }),
    )
    .await;

    // Act
    let first = start_session(&client, &address, "rust-basics", "u1").await;
    let second = start_session(&client, &address, "rust-basics", "u1").await;

    // Assert
    assert_eq!(first["resumed"], false);
    assert_eq!(first["status"], "in_progress");
    assert_eq!(first["attempt_number"], 1);
    assert_eq!(second["resumed"], true);
    assert_eq!(second["session_id"], first["session_id"]);
}

#[tokio::test]
async fn start_fails_validation_and_unknown_quiz() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: blank user_id fails validation
    let response = client
        .post(&format!("{}/api/quiz/sessions/start", address))
        .json(&serde_json::json!({ "quiz_id": "rust-basics", "user_id": "" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 400);

    // Act: unknown quiz is a 404
    let response = client
        .post(&format!("{}/api/quiz/sessions/start", address))
        .json(&serde_json::json!({ "quiz_id": "no-such-quiz", "user_id": "u1" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn assessment_flow_completes() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    create_quiz(
        &client,
        &address,
        serde_json::json!({
            "quiz_id": "final-exam",
            "topics": ["ownership"],
            "default_mode": "assessment",
            "num_questions": 2
        }),
    )
    .await;
    let session = start_session(&client, &address, "final-exam", "u1").await;
    let session_id = session["session_id"].as_str().unwrap().to_string();

    // 1. First question: the answer key must not leak
    let question: serde_json::Value = client
        .get(&format!("{}/api/quiz/sessions/{}/next", address, session_id))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(question["order"], 1);
    assert!(question.get("correct_choice").is_none());
    assert!(question.get("rationale").is_none());
    assert!(question.get("source_snippet_id").is_none());
    let choices = question["choices"].as_array().unwrap();
    assert_eq!(choices.len(), 4);

    // 2. Answer correctly (the template generator puts the key first)
    let outcome: serde_json::Value = client
        .post(&format!(
            "{}/api/quiz/sessions/{}/answer",
            address, session_id
        ))
        .json(&serde_json::json!({
            "question_id": question["question_id"],
            "selected_choice": choices[0]
        }))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["is_correct"], true);
    assert_eq!(outcome["session_completed"], false);
    assert!(outcome.get("summary").is_none());

    // 3. Second question, answered wrong, fills the quota
    let question: serde_json::Value = client
        .get(&format!("{}/api/quiz/sessions/{}/next", address, session_id))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(question["order"], 2);
    let choices = question["choices"].as_array().unwrap();
    let outcome: serde_json::Value = client
        .post(&format!(
            "{}/api/quiz/sessions/{}/answer",
            address, session_id
        ))
        .json(&serde_json::json!({
            "question_id": question["question_id"],
            "selected_choice": choices[1]
        }))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["is_correct"], false);
    assert_eq!(outcome["session_completed"], true);
    assert_eq!(outcome["summary"]["status"], "completed");
    assert_eq!(outcome["summary"]["total_questions"], 2);
    assert_eq!(outcome["summary"]["correct_answers"], 1);

    // 4. Asking for more questions is a 410 naming the terminal state
    let response = client
        .get(&format!("{}/api/quiz/sessions/{}/next", address, session_id))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 410);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn practice_difficulty_adapts_over_http() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    create_quiz(
        &client,
        &address,
        serde_json::json!({
            "quiz_id": "rust-basics",
            "topics": ["ownership"],
            "initial_difficulty": "easy"
        }),
    )
    .await;
    let session = start_session(&client, &address, "rust-basics", "u1").await;
    let session_id = session["session_id"].as_str().unwrap().to_string();
    assert_eq!(session["current_difficulty"], "easy");

    // Act: three straight correct answers
    let mut last_difficulty = String::new();
    for _ in 0..3 {
        let question: serde_json::Value = client
            .get(&format!("{}/api/quiz/sessions/{}/next", address, session_id))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .unwrap();
        let outcome: serde_json::Value = client
            .post(&format!(
                "{}/api/quiz/sessions/{}/answer",
                address, session_id
            ))
            .json(&serde_json::json!({
                "question_id": question["question_id"],
                "selected_choice": question["choices"][0]
            }))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .unwrap();
        last_difficulty = outcome["current_difficulty"].as_str().unwrap().to_string();
    }

    // Assert
    assert_eq!(last_difficulty, "medium");
}

#[tokio::test]
async fn answer_rejects_stale_and_unserved_choices() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    create_quiz(
        &client,
        &address,
        serde_json::json!({ "quiz_id": "rust-basics", "topics": ["ownership"] }),
    )
    .await;
    let session = start_session(&client, &address, "rust-basics", "u1").await;
    let session_id = session["session_id"].as_str().unwrap().to_string();
    let question: serde_json::Value = client
        .get(&format!("{}/api/quiz/sessions/{}/next", address, session_id))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();

    // Act: wrong question id is a conflict
    let response = client
        .post(&format!(
            "{}/api/quiz/sessions/{}/answer",
            address, session_id
        ))
        .json(&serde_json::json!({
            "question_id": "not-the-served-question",
            "selected_choice": question["choices"][0]
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 409);

    // Act: a choice that was never offered is a bad request
    let response = client
        .post(&format!(
            "{}/api/quiz/sessions/{}/answer",
            address, session_id
        ))
        .json(&serde_json::json!({
            "question_id": question["question_id"],
            "selected_choice": "something else entirely"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 400);

    // The pending question is still answerable afterwards.
    let response = client
        .post(&format!(
            "{}/api/quiz/sessions/{}/answer",
            address, session_id
        ))
        .json(&serde_json::json!({
            "question_id": question["question_id"],
            "selected_choice": question["choices"][0]
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn session_detail_is_owner_only() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    create_quiz(
        &client,
        &address,
        serde_json::json!({ "quiz_id": "rust-basics", "topics": ["ownership"] }),
    )
    .await;
    let session = start_session(&client, &address, "rust-basics", "u1").await;
    let session_id = session["session_id"].as_str().unwrap().to_string();
    client
        .get(&format!("{}/api/quiz/sessions/{}/next", address, session_id))
        .send()
        .await
        .expect("Failed to execute request");

    // Act: owner view carries the pending question without its key
    let response = client
        .get(&format!(
            "{}/api/quiz/sessions/{}?user_id=u1",
            address, session_id
        ))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let detail: serde_json::Value = response.json().await.unwrap();
    assert_eq!(detail["status"], "in_progress");
    assert_eq!(detail["questions_served"], 1);
    assert!(detail["active_question"].is_object());
    assert!(detail["active_question"].get("correct_choice").is_none());
    assert_eq!(detail["summary"]["total_questions"], 0);

    // Act: any other caller is rejected
    let response = client
        .get(&format!(
            "{}/api/quiz/sessions/{}?user_id=somebody-else",
            address, session_id
        ))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 403);

    // Act: unknown session is a 404
    let response = client
        .get(&format!(
            "{}/api/quiz/sessions/no-such-session?user_id=u1",
            address
        ))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn end_returns_the_summary() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    create_quiz(
        &client,
        &address,
        serde_json::json!({ "quiz_id": "rust-basics", "topics": ["ownership"] }),
    )
    .await;
    let session = start_session(&client, &address, "rust-basics", "u1").await;
    let session_id = session["session_id"].as_str().unwrap().to_string();
    let question: serde_json::Value = client
        .get(&format!("{}/api/quiz/sessions/{}/next", address, session_id))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    client
        .post(&format!(
            "{}/api/quiz/sessions/{}/answer",
            address, session_id
        ))
        .json(&serde_json::json!({
            "question_id": question["question_id"],
            "selected_choice": question["choices"][0]
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Act
    let response = client
        .post(&format!("{}/api/quiz/sessions/{}/end", address, session_id))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let summary: serde_json::Value = response.json().await.unwrap();
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["total_questions"], 1);
    assert_eq!(summary["correct_answers"], 1);
    assert_eq!(summary["accuracy"], 1.0);
}

#[tokio::test]
async fn history_lists_newest_first() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    create_quiz(
        &client,
        &address,
        serde_json::json!({ "quiz_id": "rust-basics", "topics": ["ownership"] }),
    )
    .await;
    let first = start_session(&client, &address, "rust-basics", "u1").await;
    client
        .post(&format!(
            "{}/api/quiz/sessions/{}/end",
            address,
            first["session_id"].as_str().unwrap()
        ))
        .send()
        .await
        .expect("Failed to execute request");
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = start_session(&client, &address, "rust-basics", "u1").await;

    // Act
    let response = client
        .get(&format!(
            "{}/api/quiz/sessions?quiz_id=rust-basics&user_id=u1",
            address
        ))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let history: serde_json::Value = response.json().await.unwrap();
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["session_id"], second["session_id"]);
    assert_eq!(entries[0]["status"], "in_progress");
    assert_eq!(entries[1]["session_id"], first["session_id"]);
    assert_eq!(entries[1]["status"], "completed");

    // Missing query parameters are rejected
    let response = client
        .get(&format!("{}/api/quiz/sessions?quiz_id=rust-basics", address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn delete_session_flow() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    create_quiz(
        &client,
        &address,
        serde_json::json!({ "quiz_id": "rust-basics", "topics": ["ownership"] }),
    )
    .await;
    let session = start_session(&client, &address, "rust-basics", "u1").await;
    let session_id = session["session_id"].as_str().unwrap().to_string();

    // Act: the wrong user cannot delete
    let response = client
        .delete(&format!(
            "{}/api/quiz/sessions/{}?user_id=somebody-else",
            address, session_id
        ))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 403);

    // Act: the owner can
    let response = client
        .delete(&format!(
            "{}/api/quiz/sessions/{}?user_id=u1",
            address, session_id
        ))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "deleted");
    assert_eq!(body["session_id"], session_id.as_str());

    // Assert: the session is gone
    let response = client
        .delete(&format!(
            "{}/api/quiz/sessions/{}?user_id=u1",
            address, session_id
        ))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);
}
