use civic_portal::{
    AppState,
    agent::{AgentState, HttpAgentService, MockAgentService},
    config::{AppConfig, Env},
    create_router,
    directory::{DirectoryState, PostgresUserDirectory},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the profile directory, the agent client and the
/// HTTP server, in that order.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise debug for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "civic_portal=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator. Agent failures are only visible here,
            // since the webhook never reports them to Twilio.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Profile directory (Postgres).
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
    let directory = Arc::new(PostgresUserDirectory::new(pool)) as DirectoryState;

    // 4. Agent service. Without AGENT_SERVICE_URL (local only) the echoing mock answers.
    let agent = match &config.agent_url {
        Some(url) => {
            let client = HttpAgentService::new(url, config.agent_timeout)
                .expect("FATAL: Failed to build the agent service HTTP client.");
            tracing::info!(endpoint = client.endpoint(), "Using HTTP agent service");
            Arc::new(client) as AgentState
        }
        None => {
            tracing::warn!("AGENT_SERVICE_URL not set; replies come from the mock agent");
            Arc::new(MockAgentService::new()) as AgentState
        }
    };

    // 5. State assembly and route table check.
    let listen_addr = config.listen_addr.clone();
    let app_state = AppState::new(directory, agent, config);

    if let Err(e) = app_state.routes.validate() {
        panic!("FATAL: Route table is inconsistent: {e}");
    }
    for entry in app_state.routes.entries() {
        tracing::debug!(role = %entry.role, path = entry.path, "Dashboard route");
    }

    // 6. Router and server startup.
    let app = create_router(app_state);

    let listener = TcpListener::bind(&listen_addr)
        .await
        .expect("FATAL: Failed to bind the listen address.");

    tracing::info!("Listening on {}", listen_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", listen_addr);

    axum::serve(listener, app).await.expect("FATAL: HTTP server stopped unexpectedly.");
}
