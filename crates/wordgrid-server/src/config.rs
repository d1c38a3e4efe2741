/// Every process tunable loaded from the environment in one place, the
/// way the teacher loads its handful of env vars in `main`, just
/// consolidated instead of scattered across call sites.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_port: u16,
    pub jwt_secret: String,
    pub max_connections: u32,
    pub korean_weights_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:wordgrid.db?mode=rwc".to_string()),
            bind_port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev-insecure-secret".to_string()),
            max_connections: std::env::var("MAX_CONNECTIONS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(500),
            korean_weights_path: std::env::var("KOREAN_JAMO_WEIGHTS_PATH").ok(),
        }
    }
}
