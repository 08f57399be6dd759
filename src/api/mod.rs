//! HTTP API and router assembly.

pub mod chat;
pub mod game;
pub mod participants;
pub mod records;

use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::auth::{self, AuthConfig};
use crate::error::ApiError;
use crate::gate::{self, GateConfig};
use crate::state::{AppState, StudyExport};
use crate::ws;

/// Export every persisted record as JSON.
///
/// GET /api/admin/export
pub async fn export_study(State(state): State<Arc<AppState>>) -> Result<Json<StudyExport>, ApiError> {
    Ok(Json(state.export_study().await?))
}

/// Build the full application router
pub fn router(
    state: Arc<AppState>,
    gate_config: Arc<GateConfig>,
    auth_config: Arc<AuthConfig>,
) -> Router {
    // Protected researcher routes (with HTTP Basic Auth)
    let admin_routes = Router::new()
        .route("/api/admin/export", get(export_study))
        .layer(middleware::from_fn_with_state(
            auth_config,
            auth::admin_auth_middleware,
        ));

    let gate_routes: Router<Arc<AppState>> = Router::new()
        .route("/api/device-check", post(gate::device_check))
        .with_state(gate_config.clone());

    // Study pages only load on a checked desktop browser
    let study_pages = Router::new()
        .nest_service("/study", ServeDir::new("static/study"))
        .layer(middleware::from_fn_with_state(
            gate_config,
            gate::device_gate_middleware,
        ));

    Router::new()
        .route("/api/participants", post(participants::create_participant))
        .route(
            "/api/participants/{id}",
            get(participants::get_participant).patch(participants::patch_participant),
        )
        .route(
            "/api/participants/{id}/condition",
            post(participants::assign_condition),
        )
        .route("/api/gameplay", post(records::create_gameplay))
        .route("/api/gameplay/{id}", axum::routing::patch(records::patch_gameplay))
        .route("/api/surveys", post(records::submit_survey))
        .route("/api/chat-logs", post(records::save_chat_log))
        .route("/api/chat", post(chat::generate_reply))
        .route("/api/game/start", post(game::start_game))
        .route("/api/game/{id}", get(game::get_game))
        .route("/api/game/{id}/answer", post(game::answer))
        .route("/api/game/{id}/skip", post(game::skip))
        .route("/api/game/{id}/finish", post(game::finish))
        .route("/api/game/{id}/leaderboard", get(game::leaderboard))
        .route("/ws", get(ws::ws_handler))
        .merge(admin_routes)
        .merge(gate_routes)
        .merge(study_pages)
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
