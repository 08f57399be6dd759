use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waitroom::{
    api, auth::AuthConfig, game::GameConfig, gate::GateConfig, llm, room::RoomConfig,
    state::AppState,
};

/// Listener configuration
struct ServerConfig {
    bind_addr: SocketAddr,
}

impl ServerConfig {
    fn from_env() -> Result<Self, std::net::AddrParseError> {
        let bind_addr = std::env::var("BIND_ADDR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()?;
        Ok(Self { bind_addr })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waitroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting waiting-room study server...");

    let server_config = ServerConfig::from_env()?;
    let auth_config = Arc::new(AuthConfig::from_env());
    let gate_config = Arc::new(GateConfig::from_env());

    let llm_config = llm::LlmConfig::from_env();
    let provider = match llm_config.build_provider() {
        Ok(provider) => {
            tracing::info!(provider = provider.name(), "LLM provider initialized");
            Some(provider)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize LLM provider: {}. Personas will post fallback replies.",
                e
            );
            None
        }
    };

    let state = Arc::new(
        AppState::new_with_llm(provider, llm_config)
            .with_room_config(RoomConfig::from_env())
            .with_game_config(GameConfig::from_env()),
    );

    let app = api::router(state, gate_config, auth_config);

    tracing::info!("Listening on http://{}", server_config.bind_addr);
    let listener = tokio::net::TcpListener::bind(server_config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
