use std::sync::{Arc, Weak};

use dashmap::DashMap;
use rand::Rng;
use sqlx::SqlitePool;

use wordgrid_core::dictionary::Dictionary;

use crate::room::{RoomEngine, RoomHandle};

const ROOM_CODE_LEN: usize = 6;
const ROOM_CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random 6-character uppercase alphanumeric room code.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_CODE_CHARS.len());
            ROOM_CODE_CHARS[idx] as char
        })
        .collect()
}

/// Owns every live room, keyed by code (§3 Ownership: the registry is the
/// sole authority over which rooms exist; a `RoomEngine` only knows its own
/// code, never the registry's full membership).
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    dictionary: Arc<Dictionary>,
    db: SqlitePool,
}

impl RoomRegistry {
    pub fn new(dictionary: Arc<Dictionary>, db: SqlitePool) -> Arc<Self> {
        Arc::new(RoomRegistry {
            rooms: DashMap::new(),
            dictionary,
            db,
        })
    }

    /// Returns the room for `code`, or allocates a fresh code and room if
    /// `code` is empty or unknown.
    pub fn get_or_create(self: &Arc<Self>, code: Option<&str>) -> (String, RoomHandle) {
        if let Some(code) = code {
            if let Some(existing) = self.rooms.get(code) {
                return (code.to_string(), existing.clone());
            }
        }

        let code = match code {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => loop {
                let candidate = generate_room_code();
                if !self.rooms.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let handle = RoomEngine::new(
            code.clone(),
            self.dictionary.clone(),
            self.db.clone(),
            Arc::downgrade(self),
        );
        self.rooms.insert(code.clone(), handle.clone());
        (code, handle)
    }

    pub fn get(&self, code: &str) -> Option<RoomHandle> {
        self.rooms.get(code).map(|r| r.clone())
    }

    pub async fn remove(&self, code: &str) {
        if let Some((_, handle)) = self.rooms.remove(code) {
            if crate::room::is_empty(&handle).await {
                return;
            }
            // A player reconnected during the cleanup delay; keep the room
            // and put it back rather than dropping live players.
            self.rooms.insert(code.to_string(), handle);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_code_has_expected_shape() {
        let code = generate_room_code();
        assert_eq!(code.len(), ROOM_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
