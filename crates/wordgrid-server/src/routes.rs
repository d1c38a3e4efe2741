use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth;
use crate::ws::{self, AppState};

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
}

/// Upgrades a connection and joins (or creates) the requested room. Identity
/// comes from the session cookie if present, otherwise a fresh guest id is
/// minted for the lifetime of the connection (§6 Auth contract).
pub async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let cookie_header = headers.get("cookie").and_then(|v| v.to_str().ok());
    let user_id = auth::resolve_identity(cookie_header, &state.jwt_secret);

    ws.on_upgrade(move |socket| {
        ws::handle_socket(socket, state, query.room, query.name, query.color, user_id)
    })
}
