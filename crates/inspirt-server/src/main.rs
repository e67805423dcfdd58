use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use inspirt_api::middleware::{require_admin, require_auth};
use inspirt_api::state::{AppState, AppStateInner};
use inspirt_api::{admin, auth, chat, replicas, voice};
use inspirt_providers::{ElevenLabs, OpenAiChat};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inspirt=debug,tower_http=debug".into()),
        )
        .init();

    // Config — all secrets are injected, never compiled in.
    let jwt_secret = std::env::var("INSPIRT_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: INSPIRT_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }
    let openai_key = require_env("OPENAI_API_KEY")?;
    let eleven_key = require_env("ELEVENLABS_API_KEY")?;

    let host = std::env::var("INSPIRT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("INSPIRT_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let db_path = std::env::var("INSPIRT_DB_PATH").unwrap_or_else(|_| "inspirt.db".into());

    // Init database
    let db = inspirt_db::Database::open(&PathBuf::from(&db_path))?;

    // Provider clients, with overridable endpoints for local stubs
    let mut text = OpenAiChat::new(openai_key)?;
    if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
        text = text.with_base_url(base);
    }
    let mut speech = ElevenLabs::new(eleven_key)?;
    if let Ok(base) = std::env::var("ELEVENLABS_BASE_URL") {
        speech = speech.with_base_url(base);
    }

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        text: Arc::new(text),
        speech: Arc::new(speech),
    });

    // Routes
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/validate-code", post(auth::validate_code))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/replicas", post(replicas::create_replica))
        .route("/replicas", get(replicas::list_replicas))
        .route("/replicas/{replica_id}", patch(replicas::update_replica))
        .route("/replicas/{replica_id}/chat", post(chat::chat_turn))
        .route("/replicas/{replica_id}/messages", get(replicas::get_messages))
        .route(
            "/replicas/{replica_id}/messages/{message_id}/feedback",
            post(replicas::message_feedback),
        )
        .route("/voice/create", post(voice::create_voice))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/admin/accounts", get(admin::list_accounts))
        .route("/admin/accounts/{account_id}/credits", patch(admin::update_credits))
        .route("/admin/accounts/{account_id}", delete(admin::delete_account))
        .route("/admin/chats", get(admin::list_chats))
        .route("/admin/replicas", get(admin::list_replicas))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/access-codes", post(admin::create_access_code))
        .route("/admin/cleanup-voices", post(admin::cleanup_voices))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Inspirt server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{} must be set", name))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
