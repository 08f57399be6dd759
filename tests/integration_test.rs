use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use waitroom::api;
use waitroom::auth::AuthConfig;
use waitroom::gate::GateConfig;
use waitroom::llm::{GenerateRequest, GenerateResponse, LlmConfig, LlmProvider, LlmResult, ResponseMetadata};
use waitroom::persona::Persona;
use waitroom::protocol::{ClientMessage, ServerMessage};
use waitroom::room::vote::VotePhase;
use waitroom::room::RoomConfig;
use waitroom::state::AppState;
use waitroom::ws::handlers::handle_message;

const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

struct CannedProvider;

#[async_trait]
impl LlmProvider for CannedProvider {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        // Echo the last line without its "Name: " speaker prefix
        let last = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let text = last.rsplit_once(": ").map_or(last.as_str(), |(_, t)| t);
        Ok(GenerateResponse {
            text: format!("re: {}", text),
            metadata: ResponseMetadata {
                provider: "canned".to_string(),
                model: "none".to_string(),
                tokens_used: None,
                latency_ms: 0,
            },
        })
    }

    fn name(&self) -> &str {
        "canned"
    }
}

fn app_with(state: AppState, auth: AuthConfig) -> Router {
    api::router(Arc::new(state), Arc::new(GateConfig::default()), Arc::new(auth))
}

fn app() -> Router {
    app_with(AppState::new(), AuthConfig::disabled())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, DESKTOP_UA)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::USER_AGENT, DESKTOP_UA)
        .body(Body::empty())
        .unwrap()
}

async fn create_participant(app: &Router, name: &str) -> String {
    let (status, _, body) = send(
        app,
        json_request("POST", "/api/participants", json!({"display_name": name})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_participant_lifecycle() {
    let app = app();
    let id = create_participant(&app, "Sam").await;

    let (status, _, body) = send(&app, get(&format!("/api/participants/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Sam");
    assert_eq!(body["plays"], 0);

    let (status, _, body) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/participants/{}", id),
            json!({"plays": "increment", "completed": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plays"], 1);
    assert_eq!(body["completed"], true);

    let uri = format!("/api/participants/{}/condition", id);
    let (status, _, first) = send(&app, json_request("POST", &uri, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let condition = first["condition"].as_str().unwrap().to_string();
    assert!(condition == "private" || condition == "public");

    let (_, _, again) = send(&app, json_request("POST", &uri, json!({}))).await;
    assert_eq!(again["condition"], condition.as_str());
}

#[tokio::test]
async fn test_validation_and_missing_records() {
    let app = app();

    let (status, _, body) = send(
        &app,
        json_request("POST", "/api/participants", json!({"display_name": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    // Names the room uses for its own senders
    for name in ["jordan", "System"] {
        let (status, _, _) = send(
            &app,
            json_request("POST", "/api/participants", json!({"display_name": name})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _, body) = send(&app, get("/api/participants/nobody")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("nobody"));

    let id = create_participant(&app, "Sam").await;
    let (status, _, _) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/participants/{}", id),
            json!({"id": "other"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/participants/{}", id);
    let (status, _, body) = send(
        &app,
        json_request("PATCH", &uri, json!({"total_score": {"add": 5}, "plays": "increment"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((body["total_score"].as_u64(), body["plays"].as_u64()), (Some(5), Some(1)));

    send(&app, json_request("PATCH", &uri, json!({"total_score": u32::MAX}))).await;
    let (status, _, _) = send(
        &app,
        json_request("PATCH", &uri, json!({"total_score": "increment"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_survey_and_chat_log_persistence() {
    let app = app();
    let id = create_participant(&app, "Sam").await;

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/api/surveys",
            json!({"participant_id": id, "instrument": "post_task", "answers": {"q1": "", "q2": 4}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("q1"));

    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            "/api/surveys",
            json!({"participant_id": id, "instrument": "post_task", "answers": {"q1": "agree", "q2": 4}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/api/chat-logs",
            json!({
                "participant_id": id,
                "messages": [{"id": 1, "sender": "Sam", "text": "hi", "sent_at": "2026-01-01T00:00:00Z"}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_gameplay_records() {
    let app = app();
    let id = create_participant(&app, "Sam").await;

    // No condition yet
    let (status, _, _) = send(
        &app,
        json_request("POST", "/api/gameplay", json!({"participant_id": id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/api/gameplay",
            json!({"participant_id": id, "condition": "public"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let gameplay_id = body["id"].as_str().unwrap().to_string();

    let (status, _, body) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/gameplay/{}", gameplay_id),
            json!({"skipped": "increment", "score": 30}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["score"], 30);
}

#[tokio::test]
async fn test_chat_endpoint_requires_provider() {
    let app = app();
    let request = json!({
        "message": "hey",
        "personaName": "Jordan",
        "chatHistory": [],
        "replyCounts": {"Jordan": 0}
    });

    let (status, _, body) = send(&app, json_request("POST", "/api/chat", request.clone())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "not_configured");

    let state = AppState::new_with_llm(Some(Arc::new(CannedProvider)), LlmConfig::default());
    let app = app_with(state, AuthConfig::disabled());

    let (status, _, body) = send(&app, json_request("POST", "/api/chat", request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "re: hey");

    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            "/api/chat",
            json!({"message": "hey", "personaName": "Morgan"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_device_gate() {
    let app = app();

    let (status, headers, body) = send(
        &app,
        json_request("POST", "/api/device-check", json!({"width": 800, "height": 900})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["allowed"], false);
    assert!(headers.get(header::SET_COOKIE).is_none());

    let (status, headers, body) = send(
        &app,
        json_request("POST", "/api/device-check", json!({"width": 1440, "height": 900})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("device_ok=1"));
    assert!(cookie.contains("Max-Age=600"));

    // Study pages without a pass are redirected
    let response = app.clone().oneshot(get("/study/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/blocked.html");

    // Mobile browsers are redirected even with a pass
    let mobile = Request::builder()
        .uri("/study/index.html")
        .header(header::USER_AGENT, "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)")
        .header(header::COOKIE, "device_ok=1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(mobile).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let desktop = Request::builder()
        .uri("/study/index.html")
        .header(header::USER_AGENT, DESKTOP_UA)
        .header(header::COOKIE, "device_ok=1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(desktop).await.unwrap();
    assert_ne!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_admin_export_requires_credentials() {
    let app = app_with(AppState::new(), AuthConfig::new("admin", "secret"));
    create_participant(&app, "Sam").await;

    let (status, headers, _) = send(&app, get("/api/admin/export")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(header::WWW_AUTHENTICATE));

    // "admin:secret"
    let request = Request::builder()
        .uri("/api/admin/export")
        .header(header::AUTHORIZATION, "Basic YWRtaW46c2VjcmV0")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schema_version"], 1);
    assert_eq!(body["participants"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_word_game_over_http() {
    let app = app();
    let id = create_participant(&app, "Sam").await;
    send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/participants/{}", id),
            json!({"condition": "public"}),
        ),
    )
    .await;

    let (status, _, view) = send(
        &app,
        json_request("POST", "/api/game/start", json!({"participant_id": id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let remaining = view["remaining_secs"].as_u64().unwrap();
    assert!((179..=180).contains(&remaining));
    let game_id = view["game_id"].as_str().unwrap().to_string();

    let (status, _, outcome) = send(
        &app,
        json_request("POST", &format!("/api/game/{}/answer", game_id), json!({"answer": "zzz"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["correct"], false);

    let (status, _, outcome) = send(
        &app,
        json_request("POST", &format!("/api/game/{}/skip", game_id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["correct"], Value::Null);

    let (status, _, record) = send(
        &app,
        json_request("POST", &format!("/api/game/{}/finish", game_id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["answered"], 1);
    assert_eq!(record["skipped"], 1);

    let (status, _, board) = send(&app, get(&format!("/api/game/{}/leaderboard", game_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board.as_array().unwrap().len(), 4);

    let (status, _, closed) = send(&app, get(&format!("/api/game/{}", game_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["finished"], true);

    let (status, _, _) = send(
        &app,
        json_request("POST", &format!("/api/game/{}/skip", game_id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, _, participant) = send(&app, get(&format!("/api/participants/{}", id))).await;
    assert_eq!(participant["plays"], 1);
    assert_eq!(participant["skips"], 1);
    assert_eq!(participant["leaderboard_views"], 1);
}

#[tokio::test]
async fn test_private_condition_has_no_leaderboard() {
    let app = app();
    let id = create_participant(&app, "Sam").await;
    send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/participants/{}", id),
            json!({"condition": "private"}),
        ),
    )
    .await;

    let (_, _, view) = send(
        &app,
        json_request("POST", "/api/game/start", json!({"participant_id": id})),
    )
    .await;
    let game_id = view["game_id"].as_str().unwrap();

    let (status, _, body) = send(&app, get(&format!("/api/game/{}/leaderboard", game_id))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "condition_private");
}

/// End-to-end waiting room session on a paused clock
#[tokio::test(start_paused = true)]
async fn test_full_waiting_room_flow() {
    let state = Arc::new(
        AppState::new_with_llm(Some(Arc::new(CannedProvider)), LlmConfig::default())
            .with_room_config(RoomConfig {
                reply_probability: 0.0,
                ..RoomConfig::default()
            }),
    );
    let participant = state
        .create_participant("Sam".to_string(), None, None)
        .await
        .unwrap();
    let id = participant.id.clone();

    let room = state.open_room(&id).await.unwrap();
    let mut events = room.subscribe();

    // 1. Personas arrive at 3s, 7s and 12s
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(room.snapshot().await.players.len(), 2);
    tokio::time::sleep(Duration::from_secs(8)).await;
    assert_eq!(room.snapshot().await.players.len(), 4);

    // 2. A greeting is answered by everyone
    let response = handle_message(
        ClientMessage::SendChat {
            text: "hey".to_string(),
        },
        &id,
        &state,
    )
    .await;
    assert!(response.is_none());
    tokio::time::sleep(Duration::from_secs(10)).await;

    let snapshot = room.snapshot().await;
    for persona in Persona::ALL {
        assert!(
            snapshot
                .messages
                .iter()
                .any(|m| m.sender == persona.name() && m.text == "re: hey"),
            "{} should have replied",
            persona.name()
        );
    }

    // 3. Addressing Alex after their single reply gets no answer
    let decision = state.send_chat(&id, "Alex what now?").await.unwrap();
    assert!(decision.responders.is_empty());

    // 4. The vote reaches quorum and counts down to navigation
    handle_message(
        ClientMessage::CastVote {
            option: "The Puzzlers".to_string(),
        },
        &id,
        &state,
    )
    .await;
    tokio::time::sleep(Duration::from_millis(16_100)).await;
    assert_eq!(room.vote_state().await.phase, VotePhase::Expired);

    let mut typing = 0;
    let mut navigated = false;
    while let Ok(event) = events.try_recv() {
        match event {
            ServerMessage::Typing { .. } => typing += 1,
            ServerMessage::Navigate { .. } => navigated = true,
            _ => {}
        }
    }
    assert_eq!(typing, 3);
    assert!(navigated);

    // 5. Counters and the chat mirror reached the store
    tokio::task::yield_now().await;
    let stored = state.store.get_participant(&id).await.unwrap();
    assert_eq!(stored.chat_messages_sent, 2);
    assert_eq!(stored.team_vote.as_deref(), Some("The Puzzlers"));

    let export = state.export_study().await.unwrap();
    let log = &export.data.chat_logs[0];
    assert_eq!(log.participant_id, id);
    assert_eq!(log.messages.len(), room.snapshot().await.messages.len());

    state.close_room(&room).await;
    assert!(state.get_room(&id).await.is_none());
}
