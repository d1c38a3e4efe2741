use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::language::Language;
use crate::mode::GameMode;

/// Messages sent from client to server over the room channel (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    StartGame,
    Place {
        x: i64,
        y: i64,
        letter: String,
        color: Option<String>,
        hand_index: Option<usize>,
    },
    UpdateSettings {
        settings: SettingsPatch,
    },
    Draw {
        count: usize,
    },
    StartTimer {
        duration: u32,
    },
    RerollHand,
    DestroyTile {
        hand_index: usize,
    },
    Chat {
        message: String,
    },
    EndGame,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub mode: Option<GameMode>,
    pub max_players: Option<usize>,
    pub lang: Option<Language>,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Init {
        player_id: Uuid,
        state: StateSnapshot,
    },
    Update {
        state: StateSnapshot,
        #[serde(skip_serializing_if = "Option::is_none")]
        timer: Option<u32>,
    },
    WordCompleted {
        word: String,
        tiles: Vec<TileWire>,
    },
    TileRemoved {
        tiles: Vec<PendingTileWire>,
    },
    Modal {
        message: String,
    },
    Chat {
        sender: String,
        sender_id: Uuid,
        message: String,
    },
    GameStartCountdown {
        seconds: u32,
    },
    GameStarted,
    GameOver {
        game_id: Option<Uuid>,
        state: StateSnapshot,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Error {
        message: String,
    },
    Timer {
        time: u32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomStatus {
    Lobby,
    Ingame,
    Finished,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomSettings {
    pub mode: GameMode,
    pub max_players: usize,
    pub lang: Language,
}

impl Default for RoomSettings {
    fn default() -> Self {
        RoomSettings {
            mode: GameMode::default(),
            max_players: 20,
            lang: Language::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileWire {
    pub x: i64,
    pub y: i64,
    pub letter: char,
    pub color: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingTileWire {
    pub x: i64,
    pub y: i64,
    pub letter: char,
    pub player_id: Uuid,
    pub color: String,
    pub h_group_id: Option<Uuid>,
    pub v_group_id: Option<Uuid>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: String,
    pub color: String,
    pub score: u32,
    pub hand: [Option<char>; 10],
}

/// The `state` payload sent on `INIT`/`UPDATE`/`GAME_OVER` (§6 State snapshot).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub room_code: String,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub players: HashMap<Uuid, PlayerView>,
    pub board: Vec<TileWire>,
    pub pending_tiles: Vec<PendingTileWire>,
    pub remaining_time: u32,
}
