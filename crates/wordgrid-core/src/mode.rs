use serde::{Deserialize, Serialize};

/// Round mode; each carries its own default global-timer duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Classic,
    Blitz,
    Bullet,
}

impl GameMode {
    pub fn duration_secs(self) -> u32 {
        match self {
            GameMode::Classic => 300,
            GameMode::Blitz => 180,
            GameMode::Bullet => 60,
        }
    }
}

impl Default for GameMode {
    fn default() -> Self {
        GameMode::Classic
    }
}
