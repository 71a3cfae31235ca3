// src/main.rs

use std::sync::Arc;

use dotenvy::dotenv;
use quiz_backend::clients::content::StaticContentPool;
use quiz_backend::clients::generator::{
    LlmQuestionGenerator, QuestionGenerator, TemplateQuestionGenerator,
};
use quiz_backend::clients::sqlite::{self, SqliteDefinitionStore, SqliteSessionStore};
use quiz_backend::clients::store::{
    DefinitionStore, InMemoryDefinitionStore, InMemorySessionStore, SessionStore,
};
use quiz_backend::config::Config;
use quiz_backend::engine::QuizEngine;
use quiz_backend::routes;
use quiz_backend::state::AppState;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Pick the stores: durable sqlite when DATABASE_URL is set, in-memory otherwise
    let (sessions, definitions): (Arc<dyn SessionStore>, Arc<dyn DefinitionStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = sqlite::connect(url)
                    .await
                    .expect("Failed to initialize the sqlite store");
                tracing::info!("Database connected, migrations applied.");
                (
                    Arc::new(SqliteSessionStore::new(pool.clone())),
                    Arc::new(SqliteDefinitionStore::new(pool)),
                )
            }
            None => {
                tracing::info!("DATABASE_URL not set, using in-memory stores.");
                (
                    Arc::new(InMemorySessionStore::new()),
                    Arc::new(InMemoryDefinitionStore::new()),
                )
            }
        };

    // Pick the question generator: live model when a key is present,
    // deterministic templates otherwise
    let generator: Arc<dyn QuestionGenerator> = match config.generator.api_key.clone() {
        Some(api_key) => Arc::new(LlmQuestionGenerator::new(&config.generator, api_key)),
        None => {
            tracing::warn!("OPENROUTER_API_KEY not set, using the static template generator.");
            Arc::new(TemplateQuestionGenerator)
        }
    };

    let content = Arc::new(StaticContentPool::empty());

    let engine = Arc::new(QuizEngine::new(
        definitions,
        sessions,
        content,
        generator,
        config.engine.clone(),
    ));

    // Create AppState
    let state = AppState {
        engine,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr: std::net::SocketAddr = config
        .bind_addr
        .parse()
        .expect("BIND_ADDR must be a valid socket address");
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}
