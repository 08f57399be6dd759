//! Device-size gate for the study pages
//!
//! The study needs a desktop-sized screen:
//! - `POST /api/device-check` checks the reported viewport and user agent and
//!   hands out a short-lived pass cookie
//! - The `/study` pages redirect to `/blocked.html` for mobile user agents or
//!   when the pass cookie is missing

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

pub const PASS_COOKIE: &str = "device_ok";
pub const BLOCKED_PAGE: &str = "/blocked.html";

/// User-agent fragments that identify phones and tablets (lowercase)
const MOBILE_MARKERS: &[&str] = &[
    "mobi",
    "android",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "opera mini",
    "iemobile",
];

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Whether the `/study` pages are gated at all
    pub enabled: bool,
    pub min_width: u32,
    pub min_height: u32,
    /// Lifetime of the pass cookie
    pub cookie_ttl: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_width: 1024,
            min_height: 600,
            cookie_ttl: Duration::from_secs(600),
        }
    }
}

impl GateConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let enabled = std::env::var("GATE_ENABLED")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(defaults.enabled);

        let min_width = std::env::var("GATE_MIN_WIDTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.min_width);

        let min_height = std::env::var("GATE_MIN_HEIGHT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.min_height);

        let cookie_ttl = std::env::var("GATE_COOKIE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cookie_ttl);

        tracing::info!(
            enabled,
            min_width,
            min_height,
            cookie_ttl_secs = cookie_ttl.as_secs(),
            "Device gate config loaded"
        );

        Self {
            enabled,
            min_width,
            min_height,
            cookie_ttl,
        }
    }

    pub fn evaluate(&self, width: u32, height: u32, user_agent: &str) -> Result<(), GateRejection> {
        if is_mobile_user_agent(user_agent) {
            return Err(GateRejection::MobileDevice);
        }
        if width < self.min_width || height < self.min_height {
            return Err(GateRejection::ViewportTooSmall {
                width,
                height,
                min_width: self.min_width,
                min_height: self.min_height,
            });
        }
        Ok(())
    }

    pub fn pass_cookie(&self) -> String {
        format!(
            "{}=1; Max-Age={}; Path=/; SameSite=Lax",
            PASS_COOKIE,
            self.cookie_ttl.as_secs()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    #[error("This study cannot be completed on a phone or tablet")]
    MobileDevice,

    #[error("Screen is {width}x{height}, at least {min_width}x{min_height} is required")]
    ViewportTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
}

/// Check if a user agent belongs to a phone or tablet
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let ua_lower = user_agent.to_lowercase();
    MOBILE_MARKERS.iter().any(|marker| ua_lower.contains(marker))
}

/// Whether the request carries a valid pass cookie
pub fn has_pass_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(name, value)| name == PASS_COOKIE && value == "1")
}

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .unwrap_or("")
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCheckRequest {
    pub width: u32,
    pub height: u32,
    /// Overrides the request's User-Agent header when present
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCheckResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `POST /api/device-check`
pub async fn device_check(
    State(config): State<Arc<GateConfig>>,
    headers: HeaderMap,
    Json(request): Json<DeviceCheckRequest>,
) -> Response {
    let ua = request
        .user_agent
        .as_deref()
        .unwrap_or_else(|| user_agent(&headers));

    match config.evaluate(request.width, request.height, ua) {
        Ok(()) => {
            tracing::debug!(width = request.width, height = request.height, "Device check passed");
            (
                StatusCode::OK,
                [(header::SET_COOKIE, config.pass_cookie())],
                Json(DeviceCheckResponse {
                    allowed: true,
                    reason: None,
                }),
            )
                .into_response()
        }
        Err(rejection) => {
            tracing::info!(
                width = request.width,
                height = request.height,
                user_agent = ua,
                "Device check rejected: {}",
                rejection
            );
            (
                StatusCode::FORBIDDEN,
                Json(DeviceCheckResponse {
                    allowed: false,
                    reason: Some(rejection.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Middleware guarding the `/study` pages
pub async fn device_gate_middleware(
    State(config): State<Arc<GateConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !config.enabled {
        return next.run(request).await;
    }

    let ua = user_agent(request.headers());
    if is_mobile_user_agent(ua) {
        tracing::info!(user_agent = ua, uri = %request.uri(), "Blocked mobile device");
        return Redirect::temporary(BLOCKED_PAGE).into_response();
    }

    if !has_pass_cookie(request.headers()) {
        tracing::info!(uri = %request.uri(), "Blocked request without device pass");
        return Redirect::temporary(BLOCKED_PAGE).into_response();
    }

    next.run(request).await
}
