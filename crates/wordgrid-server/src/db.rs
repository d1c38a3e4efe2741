use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use wordgrid_core::dictionary::{Dictionary, DictionaryRow};
use wordgrid_core::Language;

/// Create all tables if they don't exist.
pub async fn init_db(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS dictionary (
            word TEXT NOT NULL,
            language TEXT NOT NULL,
            length INTEGER NOT NULL,
            score INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (word, language)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS games (
            id TEXT PRIMARY KEY,
            room_code TEXT NOT NULL,
            winner_uuid TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS game_players (
            game_id TEXT NOT NULL,
            user_uuid TEXT NOT NULL,
            score INTEGER NOT NULL,
            rank INTEGER NOT NULL,
            FOREIGN KEY (game_id) REFERENCES games(id)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Pull-once dictionary hydration at startup (§4.1 Load, no runtime reads
/// afterward beyond this one-shot pull).
pub async fn load_dictionary(pool: &SqlitePool) -> Result<Dictionary, sqlx::Error> {
    let rows = sqlx::query("SELECT word, language, length, score FROM dictionary")
        .fetch_all(pool)
        .await?;

    let entries = rows
        .into_iter()
        .filter_map(|row| {
            let word: String = row.get("word");
            let language_str: String = row.get("language");
            let language = match language_str.as_str() {
                "ko" => Language::Ko,
                _ => Language::En,
            };
            let length: i64 = row.get("length");
            let score: i64 = row.get("score");
            Some(DictionaryRow {
                word,
                language,
                length: length as usize,
                score,
            })
        })
        .collect();

    Ok(Dictionary::hydrate(entries))
}

pub struct PlayerResult {
    pub user_uuid: Uuid,
    pub score: u32,
}

/// Single write on EndGame: a game record plus one row per player, ranked
/// by descending score (§6 Persistence contract).
pub async fn save_game_result(
    pool: &SqlitePool,
    room_code: &str,
    mut players: Vec<PlayerResult>,
) -> Result<Uuid, sqlx::Error> {
    players.sort_by(|a, b| b.score.cmp(&a.score));
    let game_id = Uuid::new_v4();
    let winner_uuid = players.first().map(|p| p.user_uuid);

    sqlx::query("INSERT INTO games (id, room_code, winner_uuid) VALUES (?1, ?2, ?3)")
        .bind(game_id.to_string())
        .bind(room_code)
        .bind(winner_uuid.map(|u| u.to_string()))
        .execute(pool)
        .await?;

    for (idx, player) in players.iter().enumerate() {
        sqlx::query(
            "INSERT INTO game_players (game_id, user_uuid, score, rank) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(game_id.to_string())
        .bind(player.user_uuid.to_string())
        .bind(player.score)
        .bind((idx + 1) as i64)
        .execute(pool)
        .await?;
    }

    Ok(game_id)
}
