//! REST handlers and shared application state.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tokio::sync::Mutex;

use super::types::InfoResponse;
use crate::bridge::BridgeSettings;
use crate::engine::{AnglesRange, TcpEngineLink};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Control connection shared by every session. All engine
    /// operations serialize on this mutex.
    pub link: Arc<Mutex<TcpEngineLink>>,
    /// Path settings handed to each new session.
    pub settings: Arc<BridgeSettings>,
    /// Classifier metadata discovered at startup.
    pub angles: AnglesRange,
}

impl AppState {
    pub fn new(link: TcpEngineLink, settings: BridgeSettings, angles: AnglesRange) -> Self {
        Self {
            link: Arc::new(Mutex::new(link)),
            settings: Arc::new(settings),
            angles,
        }
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint: name, version, and the angle grid the web
/// app needs to scale its display.
pub async fn api_info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse::new(state.angles))
}
