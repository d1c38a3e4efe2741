pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod pending_group;
pub mod registry;
pub mod room;
pub mod routes;
pub mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;
use tracing::info;

use wordgrid_core::Language;

use crate::config::AppConfig;
use crate::registry::RoomRegistry;
use crate::ws::AppState;

/// Build a fully configured Router + shared state from `config`.
pub async fn build_app(config: &AppConfig) -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to sqlite");

    db::init_db(&pool).await.expect("failed to initialize database");

    let dictionary = db::load_dictionary(&pool).await.expect("failed to hydrate dictionary");
    info!(
        en_words = dictionary.word_count(Language::En),
        ko_words = dictionary.word_count(Language::Ko),
        "dictionary hydrated"
    );

    let registry = RoomRegistry::new(Arc::new(dictionary), pool);
    let state = Arc::new(AppState {
        registry,
        jwt_secret: config.jwt_secret.clone(),
    });

    Router::new()
        .route("/health", get(routes::health))
        .route("/ws", get(routes::ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
