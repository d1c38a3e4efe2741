use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;
use wordgrid_server::config::AppConfig;

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsStream = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Seeds a throwaway file-backed SQLite database with `words`, then boots a
/// real server against it on a random port and returns its `ws://` base.
async fn start_server(words: &[(&str, &str)]) -> String {
    let db_path = std::env::temp_dir().join(format!("wordgrid-test-{}.db", Uuid::new_v4()));
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let seed_pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await
        .unwrap();
    wordgrid_server::db::init_db(&seed_pool).await.unwrap();
    for (word, lang) in words {
        sqlx::query("INSERT INTO dictionary (word, language, length, score) VALUES (?1, ?2, ?3, ?4)")
            .bind(word)
            .bind(lang)
            .bind(word.chars().count() as i64)
            .bind(word.chars().count() as i64)
            .execute(&seed_pool)
            .await
            .unwrap();
    }
    seed_pool.close().await;

    let config = AppConfig {
        database_url: db_url,
        bind_port: 0,
        jwt_secret: "test-secret".to_string(),
        max_connections: 100,
        korean_weights_path: None,
    };
    let app = wordgrid_server::build_app(&config).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("ws://127.0.0.1:{}", port)
}

async fn ws_connect(base: &str, room: Option<&str>, name: &str) -> (WsSink, WsStream) {
    let url = match room {
        Some(code) => format!("{}/ws?room={}&name={}", base, code, name),
        None => format!("{}/ws?name={}", base, name),
    };
    let (stream, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    stream.split()
}

async fn ws_send(sink: &mut WsSink, msg: serde_json::Value) {
    sink.send(Message::Text(msg.to_string().into())).await.unwrap();
}

async fn ws_recv_type(stream: &mut WsStream, msg_type: &str) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let remaining = deadline - tokio::time::Instant::now();
        if remaining.is_zero() {
            panic!("timed out waiting for message type: {}", msg_type);
        }
        let msg = tokio::time::timeout(remaining, stream.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", msg_type))
            .unwrap()
            .unwrap();

        if let Message::Text(text) = msg {
            let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
            if parsed["type"].as_str() == Some(msg_type) {
                return parsed;
            }
        }
    }
}

#[tokio::test]
async fn test_health() {
    let base = start_server(&[]).await;
    let http_base = base.replace("ws://", "http://");
    let resp = reqwest::get(format!("{}/health", http_base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(resp, "ok");
}

#[tokio::test]
async fn test_joining_room_receives_init_with_fresh_code() {
    let base = start_server(&[]).await;
    let (_sink, mut stream) = ws_connect(&base, None, "alice").await;

    let init = ws_recv_type(&mut stream, "INIT").await;
    let code = init["state"]["room_code"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert_eq!(init["state"]["status"].as_str().unwrap(), "LOBBY");
}

#[tokio::test]
async fn test_second_player_joining_broadcasts_update_to_first() {
    let base = start_server(&[]).await;
    let (_s1, mut stream1) = ws_connect(&base, None, "alice").await;
    let init = ws_recv_type(&mut stream1, "INIT").await;
    let code = init["state"]["room_code"].as_str().unwrap().to_string();

    let (_s2, mut stream2) = ws_connect(&base, Some(&code), "bob").await;
    let _ = ws_recv_type(&mut stream2, "INIT").await;

    // Alice sees an UPDATE once Bob joins, with both players present.
    let update = ws_recv_type(&mut stream1, "UPDATE").await;
    let players = update["state"]["players"].as_object().unwrap();
    assert_eq!(players.len(), 2);
}

#[tokio::test]
async fn test_non_host_cannot_start_game() {
    let base = start_server(&[]).await;
    let (_s1, mut stream1) = ws_connect(&base, None, "alice").await;
    let init = ws_recv_type(&mut stream1, "INIT").await;
    let code = init["state"]["room_code"].as_str().unwrap().to_string();

    let (mut sink2, mut stream2) = ws_connect(&base, Some(&code), "bob").await;
    let _ = ws_recv_type(&mut stream2, "INIT").await;
    let _ = ws_recv_type(&mut stream1, "UPDATE").await;

    ws_send(&mut sink2, json!({"type": "START_GAME"})).await;
    let err = ws_recv_type(&mut stream2, "ERROR").await;
    assert!(err["message"].as_str().unwrap().contains("host"));
}

#[tokio::test]
async fn test_host_starting_game_runs_countdown_then_game_started() {
    let base = start_server(&[("AAAAAAAAAA", "en")]).await;
    let (mut sink1, mut stream1) = ws_connect(&base, None, "alice").await;
    let init = ws_recv_type(&mut stream1, "INIT").await;
    let code = init["state"]["room_code"].as_str().unwrap().to_string();

    let (_s2, mut stream2) = ws_connect(&base, Some(&code), "bob").await;
    let _ = ws_recv_type(&mut stream2, "INIT").await;
    let _ = ws_recv_type(&mut stream1, "UPDATE").await;

    ws_send(&mut sink1, json!({"type": "START_GAME"})).await;

    let countdown = ws_recv_type(&mut stream1, "GAME_START_COUNTDOWN").await;
    assert_eq!(countdown["seconds"].as_u64().unwrap(), 3);

    // The server waits ~3.5s before flipping the room into play.
    let started = tokio::time::timeout(
        Duration::from_secs(6),
        ws_recv_type(&mut stream2, "GAME_STARTED"),
    )
    .await
    .unwrap();
    assert_eq!(started["type"].as_str().unwrap(), "GAME_STARTED");
}

#[tokio::test]
async fn test_place_tile_rejected_when_not_adjacent_to_board() {
    let base = start_server(&[("AAAAAAAAAA", "en")]).await;
    let (mut sink1, mut stream1) = ws_connect(&base, None, "alice").await;
    let init = ws_recv_type(&mut stream1, "INIT").await;
    let code = init["state"]["room_code"].as_str().unwrap().to_string();

    let (_s2, mut stream2) = ws_connect(&base, Some(&code), "bob").await;
    let _ = ws_recv_type(&mut stream2, "INIT").await;
    let _ = ws_recv_type(&mut stream1, "UPDATE").await;

    ws_send(&mut sink1, json!({"type": "START_GAME"})).await;
    let _ = ws_recv_type(&mut stream1, "GAME_START_COUNTDOWN").await;
    tokio::time::timeout(Duration::from_secs(6), ws_recv_type(&mut stream1, "GAME_STARTED"))
        .await
        .unwrap();

    // The single starting word sits horizontally at y=0; far off the board
    // it seeded, this placement cannot be adjacent to anything.
    ws_send(
        &mut sink1,
        json!({"type": "PLACE", "x": 5, "y": 5, "letter": "A", "hand_index": 0}),
    )
    .await;
    let err = ws_recv_type(&mut stream1, "ERROR").await;
    assert!(err["message"].as_str().unwrap().contains("adjacent"));
}

#[tokio::test]
async fn test_completing_a_word_awards_score_and_recolors_tiles() {
    // "AA" is the only viable 2-letter word, and "AAAAAAAAAA" the only
    // viable 10-letter one, so both the starting word and every player's
    // starting hand are deterministic.
    let base = start_server(&[("AAAAAAAAAA", "en"), ("AA", "en")]).await;
    let (mut sink1, mut stream1) = ws_connect(&base, None, "alice").await;
    let init = ws_recv_type(&mut stream1, "INIT").await;
    let code = init["state"]["room_code"].as_str().unwrap().to_string();

    let (_s2, mut stream2) = ws_connect(&base, Some(&code), "bob").await;
    let _ = ws_recv_type(&mut stream2, "INIT").await;
    let _ = ws_recv_type(&mut stream1, "UPDATE").await;

    ws_send(&mut sink1, json!({"type": "START_GAME"})).await;
    let _ = ws_recv_type(&mut stream1, "GAME_START_COUNTDOWN").await;
    tokio::time::timeout(Duration::from_secs(6), ws_recv_type(&mut stream1, "GAME_STARTED"))
        .await
        .unwrap();

    // Board cell (0,0) is the first letter of the starting word; placing a
    // second 'A' directly below it completes the vertical word "AA".
    ws_send(
        &mut sink1,
        json!({"type": "PLACE", "x": 0, "y": 1, "letter": "A", "hand_index": 0}),
    )
    .await;

    let completed = ws_recv_type(&mut stream1, "WORD_COMPLETED").await;
    assert_eq!(completed["word"].as_str().unwrap(), "AA");
    let tiles = completed["tiles"].as_array().unwrap();
    assert_eq!(tiles.len(), 2);

    let update = ws_recv_type(&mut stream1, "UPDATE").await;
    let players = update["state"]["players"].as_object().unwrap();
    let alice_score = players.values().find_map(|p| {
        if p["name"] == "alice" {
            p["score"].as_u64()
        } else {
            None
        }
    });
    assert_eq!(alice_score, Some(2));
}

#[tokio::test]
async fn test_chat_broadcasts_to_other_players() {
    let base = start_server(&[]).await;
    let (_s1, mut stream1) = ws_connect(&base, None, "alice").await;
    let init = ws_recv_type(&mut stream1, "INIT").await;
    let code = init["state"]["room_code"].as_str().unwrap().to_string();

    let (mut sink2, mut stream2) = ws_connect(&base, Some(&code), "bob").await;
    let _ = ws_recv_type(&mut stream2, "INIT").await;
    let _ = ws_recv_type(&mut stream1, "UPDATE").await;

    ws_send(&mut sink2, json!({"type": "CHAT", "message": "hi alice"})).await;

    let chat = ws_recv_type(&mut stream1, "CHAT").await;
    assert_eq!(chat["sender"].as_str().unwrap(), "bob");
    assert_eq!(chat["message"].as_str().unwrap(), "hi alice");
}
