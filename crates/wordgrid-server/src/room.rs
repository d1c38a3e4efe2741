use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use sqlx::SqlitePool;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use wordgrid_core::board::{
    empty_rack, has_adjacent, merged_view, occupied, scan_line, Board, Direction, PendingTile,
    Rack, Tile,
};
use wordgrid_core::dictionary::Dictionary;
use wordgrid_core::protocol::{
    PendingTileWire, PlayerView, RoomSettings, RoomStatus, ServerMessage, SettingsPatch,
    StateSnapshot, TileWire,
};
use crate::db;
use crate::error::ValidationError;
use crate::pending_group::resolve_group_id;
use crate::registry::RoomRegistry;

const GROUP_TIMER_SECS: u64 = 3;
const PENALTY_COOLDOWN_SECS: u64 = 5;
const ROOM_CLEANUP_SECS: u64 = 60;
const SUBSTRING_PENALTY: u32 = 1;
const FINALIZE_PENALTY: u32 = 5;
const NEUTRAL_COLOR: &str = "#94a3b8";

/// One connected participant. Carries its own outbound sink so a broadcast
/// is just a fan-out of non-suspending channel sends (§5).
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub score: u32,
    pub hand: Rack,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
}

/// The engine for a single room. Every mutating operation below locks the
/// surrounding `RoomHandle`, does its work, and drops the guard before
/// returning — the one exception is `end_game`, which relocks around a
/// persistence write that must not happen while the guard is held.
pub struct RoomEngine {
    pub code: String,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub board: Board,
    pub pending: Vec<PendingTile>,
    pub group_timers: HashMap<(Direction, Uuid), JoinHandle<()>>,
    pub players: HashMap<Uuid, Player>,
    pub join_order: Vec<Uuid>,
    pub tile_bag: Option<wordgrid_core::TileBag>,
    pub dictionary: Arc<Dictionary>,
    pub db: SqlitePool,
    pub duration: u32,
    pub remaining: u32,
    pub global_timer: Option<JoinHandle<()>>,
    pub penalty_cooldowns: HashMap<Uuid, Instant>,
    pub registry: Weak<RoomRegistry>,
}

/// Room engines are always reached through a lock; nothing outside this
/// module ever touches a `RoomEngine` directly.
pub type RoomHandle = Arc<Mutex<RoomEngine>>;

impl RoomEngine {
    pub fn new(
        code: String,
        dictionary: Arc<Dictionary>,
        db: SqlitePool,
        registry: Weak<RoomRegistry>,
    ) -> RoomHandle {
        Arc::new(Mutex::new(RoomEngine {
            code,
            status: RoomStatus::Lobby,
            settings: RoomSettings::default(),
            board: Board::new(),
            pending: Vec::new(),
            group_timers: HashMap::new(),
            players: HashMap::new(),
            join_order: Vec::new(),
            tile_bag: None,
            dictionary,
            db,
            duration: 0,
            remaining: 0,
            global_timer: None,
            penalty_cooldowns: HashMap::new(),
            registry,
        }))
    }

    /// The first-by-join-order player still present; migrates automatically
    /// on disconnect since it is recomputed, never stored (§4.5 Host).
    pub fn host(&self) -> Option<Uuid> {
        self.join_order
            .iter()
            .find(|id| self.players.contains_key(id))
            .copied()
    }

    pub fn is_host(&self, player_id: Uuid) -> bool {
        self.host() == Some(player_id)
    }

    pub fn add_player(&mut self, player: Player) {
        self.join_order.push(player.id);
        self.players.insert(player.id, player);
    }

    pub fn remove_player(&mut self, player_id: Uuid) {
        self.players.remove(&player_id);
        self.join_order.retain(|&id| id != player_id);
    }

    pub fn state_snapshot(&self) -> StateSnapshot {
        let players = self
            .players
            .iter()
            .map(|(id, p)| {
                (
                    *id,
                    PlayerView {
                        name: p.name.clone(),
                        color: p.color.clone(),
                        score: p.score,
                        hand: p.hand,
                    },
                )
            })
            .collect();
        let board = self
            .board
            .values()
            .map(|t| TileWire {
                x: t.x,
                y: t.y,
                letter: t.letter,
                color: t.color.clone(),
            })
            .collect();
        let pending_tiles = self.pending.iter().map(to_pending_wire).collect();

        StateSnapshot {
            room_code: self.code.clone(),
            status: self.status,
            settings: self.settings.clone(),
            players,
            board,
            pending_tiles,
            remaining_time: self.remaining,
        }
    }

    pub fn broadcast(&self, msg: ServerMessage) {
        for player in self.players.values() {
            let _ = player.tx.send(msg.clone());
        }
    }

    pub fn send_to(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(player) = self.players.get(&player_id) {
            let _ = player.tx.send(msg);
        }
    }
}

fn to_pending_wire(pt: &PendingTile) -> PendingTileWire {
    PendingTileWire {
        x: pt.x,
        y: pt.y,
        letter: pt.letter,
        player_id: pt.player_id,
        color: pt.color.clone(),
        h_group_id: pt.h_group_id,
        v_group_id: pt.v_group_id,
    }
}

fn draw_tiles_for_player(engine: &mut RoomEngine, player_id: Uuid, count: usize) -> Vec<char> {
    let new_tiles = match engine.tile_bag.as_mut() {
        Some(bag) => bag.draw(count),
        None => Vec::new(),
    };
    let mut drawn = Vec::new();
    if let Some(player) = engine.players.get_mut(&player_id) {
        for tile in new_tiles {
            match player.hand.iter().position(|s| s.is_none()) {
                Some(idx) => {
                    player.hand[idx] = Some(tile);
                    drawn.push(tile);
                }
                None => break,
            }
        }
    }
    drawn
}

// --- Connection lifecycle -------------------------------------------------

pub async fn join(handle: &RoomHandle, player: Player) {
    let mut engine = handle.lock().await;
    engine.add_player(player);
    let snapshot = engine.state_snapshot();
    engine.broadcast(ServerMessage::Update {
        state: snapshot,
        timer: None,
    });
}

pub async fn leave(handle: &RoomHandle, player_id: Uuid) {
    let mut engine = handle.lock().await;
    engine.remove_player(player_id);
    let snapshot = engine.state_snapshot();
    engine.broadcast(ServerMessage::Update {
        state: snapshot,
        timer: None,
    });
}

pub async fn is_empty(handle: &RoomHandle) -> bool {
    handle.lock().await.players.is_empty()
}

// --- Placement -------------------------------------------------------------

/// Implements the full placement pipeline from occupancy/hand/adjacency
/// checks through substring pruning, group-id resolution and merge, and
/// immediate-vs-deferred finalization (§4.3/§4.4).
pub async fn place_tile(
    handle: &RoomHandle,
    player_id: Uuid,
    x: i64,
    y: i64,
    letter_raw: char,
    color: Option<String>,
    hand_index: Option<usize>,
) -> Result<(), ValidationError> {
    let mut engine = handle.lock().await;

    if !engine.players.contains_key(&player_id) {
        return Err(ValidationError::NotInRoom);
    }
    let lang = engine.settings.lang;
    let letter = lang
        .normalize(&letter_raw.to_string())
        .chars()
        .next()
        .unwrap_or(letter_raw);

    if occupied(&engine.board, &engine.pending, x, y) {
        return Err(ValidationError::PositionOccupied);
    }

    {
        let player = engine.players.get(&player_id).unwrap();
        match hand_index {
            Some(idx) => {
                if idx >= player.hand.len() {
                    return Err(ValidationError::BadHandIndex(idx));
                }
                if player.hand[idx] != Some(letter) {
                    return Err(ValidationError::NotInRack(letter));
                }
            }
            None => {
                if !player.hand.iter().any(|slot| *slot == Some(letter)) {
                    return Err(ValidationError::NotInRack(letter));
                }
            }
        }
    }

    let is_first_tile = engine.board.is_empty() && engine.pending.is_empty();
    if !is_first_tile && !has_adjacent(&engine.board, &engine.pending, x, y) {
        return Err(ValidationError::NotAdjacent);
    }

    // Substring pruning: probe both axes with the tile temporarily placed.
    let mut probe = engine.pending.clone();
    probe.push(PendingTile {
        x,
        y,
        letter,
        player_id,
        color: color.clone().unwrap_or_default(),
        h_group_id: None,
        v_group_id: None,
        hand_index,
    });
    let probe_view = merged_view(&engine.board, &probe);
    let (h_run, _) = scan_line(&probe_view, x, y, Direction::H);
    let (v_run, _) = scan_line(&probe_view, x, y, Direction::V);
    let substring_invalid = (h_run.chars().count() > 1
        && !engine.dictionary.has_substring_at_edge(&h_run, lang))
        || (v_run.chars().count() > 1 && !engine.dictionary.has_substring_at_edge(&v_run, lang));

    let h_outcome = resolve_group_id(&mut engine.pending, &engine.board, x, y, Direction::H);
    let v_outcome = resolve_group_id(&mut engine.pending, &engine.board, x, y, Direction::V);
    for &loser in &h_outcome.cancelled {
        if let Some(jh) = engine.group_timers.remove(&(Direction::H, loser)) {
            jh.abort();
        }
    }
    for &loser in &v_outcome.cancelled {
        if let Some(jh) = engine.group_timers.remove(&(Direction::V, loser)) {
            jh.abort();
        }
    }

    let placed = PendingTile {
        x,
        y,
        letter,
        player_id,
        color: color.unwrap_or_else(|| "#4f46e5".to_string()),
        h_group_id: Some(h_outcome.group_id),
        v_group_id: Some(v_outcome.group_id),
        hand_index,
    };
    engine.pending.push(placed.clone());

    {
        let player = engine.players.get_mut(&player_id).unwrap();
        match hand_index {
            Some(idx) => player.hand[idx] = None,
            None => {
                if let Some(idx) = player.hand.iter().position(|slot| *slot == Some(letter)) {
                    player.hand[idx] = None;
                }
            }
        }
    }

    if substring_invalid {
        if let Some(player) = engine.players.get_mut(&player_id) {
            player.score = player.score.saturating_sub(SUBSTRING_PENALTY);
            match hand_index {
                Some(idx) if player.hand[idx].is_none() => player.hand[idx] = Some(letter),
                _ => {
                    if let Some(idx) = player.hand.iter().position(|s| s.is_none()) {
                        player.hand[idx] = Some(letter);
                    }
                }
            }
        }
        engine.pending.retain(|pt| !(pt.x == x && pt.y == y));

        let snapshot = engine.state_snapshot();
        engine.broadcast(ServerMessage::Update {
            state: snapshot,
            timer: None,
        });
        engine.broadcast(ServerMessage::TileRemoved {
            tiles: vec![to_pending_wire(&placed)],
        });
        engine.broadcast(ServerMessage::Modal {
            message: format!("Invalid placement! -{} points", SUBSTRING_PENALTY),
        });
        warn!(room = %engine.code, x, y, "substring-invalid placement penalized");
        return Ok(());
    }

    let merged = merged_view(&engine.board, &engine.pending);
    let (h_word, _) = scan_line(&merged, x, y, Direction::H);
    let (v_word, _) = scan_line(&merged, x, y, Direction::V);
    let h_valid = h_word.chars().count() < 2 || engine.dictionary.lookup(&h_word, lang).valid;
    let v_valid = v_word.chars().count() < 2 || engine.dictionary.lookup(&v_word, lang).valid;

    let mut finalized_h = false;
    let mut finalized_v = false;
    if h_word.chars().count() >= 2 && h_valid && v_valid {
        finalize_group_locked(&mut engine, Direction::H, h_outcome.group_id);
        finalized_h = true;
    }
    if v_word.chars().count() >= 2 && v_valid && h_valid {
        finalize_group_locked(&mut engine, Direction::V, v_outcome.group_id);
        finalized_v = true;
    }

    if !finalized_h {
        schedule_group_timer(handle.clone(), &mut engine, Direction::H, h_outcome.group_id);
    }
    if !finalized_v {
        schedule_group_timer(handle.clone(), &mut engine, Direction::V, v_outcome.group_id);
    }

    let snapshot = engine.state_snapshot();
    if finalized_h || finalized_v {
        engine.broadcast(ServerMessage::Update {
            state: snapshot,
            timer: None,
        });
    } else {
        engine.broadcast(ServerMessage::Update {
            state: snapshot,
            timer: Some(GROUP_TIMER_SECS as u32),
        });
    }

    Ok(())
}

fn schedule_group_timer(
    handle: RoomHandle,
    engine: &mut RoomEngine,
    direction: Direction,
    group_id: Uuid,
) {
    if let Some(prev) = engine.group_timers.remove(&(direction, group_id)) {
        prev.abort();
    }
    let task_handle = handle;
    let jh = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(GROUP_TIMER_SECS)).await;
        finalize_group(&task_handle, direction, group_id).await;
    });
    engine.group_timers.insert((direction, group_id), jh);
}

/// Re-acquires the room lock and finalizes `(direction, group_id)`; the
/// entry point for a fired group timer (§4.4.2). A no-op if the group was
/// already resolved out from under the timer (cancellation race, §9).
pub async fn finalize_group(handle: &RoomHandle, direction: Direction, group_id: Uuid) {
    let mut engine = handle.lock().await;
    finalize_group_locked(&mut engine, direction, group_id);
}

/// The finalization algorithm itself, callable either from inside an
/// already-locked `place_tile` (immediate finalize) or from `finalize_group`
/// once it has acquired the lock (deferred finalize via timer, or the
/// end-of-game sweep).
fn finalize_group_locked(engine: &mut RoomEngine, direction: Direction, group_id: Uuid) {
    let group_tiles: Vec<PendingTile> = engine
        .pending
        .iter()
        .filter(|pt| pt.group_id(direction) == Some(group_id))
        .cloned()
        .collect();
    if group_tiles.is_empty() {
        return;
    }

    let lang = engine.settings.lang;
    let mut group_view: HashMap<(i64, i64), char> = engine
        .board
        .iter()
        .map(|(&pos, t)| (pos, t.letter))
        .collect();
    for gt in &group_tiles {
        group_view.insert((gt.x, gt.y), gt.letter);
    }

    let (word, word_coords) = scan_line(&group_view, group_tiles[0].x, group_tiles[0].y, direction);
    let mut valid = word.chars().count() >= 2 && engine.dictionary.lookup(&word, lang).valid;

    if valid {
        let cross_dir = direction.cross();
        for &(bx, by) in &word_coords {
            let is_group_tile = group_tiles.iter().any(|gt| gt.x == bx && gt.y == by);
            if !is_group_tile {
                continue;
            }
            let (cross_word, _) = scan_line(&group_view, bx, by, cross_dir);
            if cross_word.chars().count() >= 2 && !engine.dictionary.lookup(&cross_word, lang).valid
            {
                valid = false;
                break;
            }
        }
    }

    if valid {
        let new_color = group_tiles[0].color.clone();
        for &(bx, by) in &word_coords {
            if let Some(tile) = engine.board.get_mut(&(bx, by)) {
                tile.color = new_color.clone();
            }
        }

        let word_len = word_coords.len();
        let word_score = (word_len as f64).powf(1.5).floor() as u32;
        let per_tile = word_score / group_tiles.len() as u32;

        let mut replenish: HashMap<Uuid, u32> = HashMap::new();
        for gt in &group_tiles {
            let newly_placed = !engine.board.contains_key(&(gt.x, gt.y));
            engine.board.insert(
                (gt.x, gt.y),
                Tile {
                    x: gt.x,
                    y: gt.y,
                    letter: gt.letter,
                    color: new_color.clone(),
                },
            );
            if let Some(player) = engine.players.get_mut(&gt.player_id) {
                player.score += per_tile;
            }
            if newly_placed {
                *replenish.entry(gt.player_id).or_insert(0) += 1;
            }
        }
        for (pid, count) in replenish {
            draw_tiles_for_player(engine, pid, count as usize);
        }

        let group_coords: HashSet<(i64, i64)> =
            group_tiles.iter().map(|gt| (gt.x, gt.y)).collect();
        engine.pending.retain(|pt| !group_coords.contains(&(pt.x, pt.y)));

        let completed_tiles: Vec<TileWire> = word_coords
            .iter()
            .filter_map(|&(bx, by)| {
                engine.board.get(&(bx, by)).map(|t| TileWire {
                    x: bx,
                    y: by,
                    letter: t.letter,
                    color: t.color.clone(),
                })
            })
            .collect();
        engine.broadcast(ServerMessage::WordCompleted {
            word: word.clone(),
            tiles: completed_tiles,
        });
        let snapshot = engine.state_snapshot();
        engine.broadcast(ServerMessage::Update {
            state: snapshot,
            timer: None,
        });
        engine.broadcast(ServerMessage::Modal {
            message: format!("Word completed: {}", word),
        });
        info!(room = %engine.code, %word, "group finalized");
        return;
    }

    let skip_penalty = word.chars().count() < 2;
    let mut penalized = Vec::new();
    if !skip_penalty {
        let now = Instant::now();
        for gt in &group_tiles {
            let pid = gt.player_id;
            let cooled_down = engine
                .penalty_cooldowns
                .get(&pid)
                .map(|t| now.duration_since(*t).as_secs() >= PENALTY_COOLDOWN_SECS)
                .unwrap_or(true);
            if cooled_down {
                if let Some(player) = engine.players.get_mut(&pid) {
                    player.score = player.score.saturating_sub(FINALIZE_PENALTY);
                }
                engine.penalty_cooldowns.insert(pid, now);
                penalized.push(pid);
            }
        }
        if !penalized.is_empty() {
            engine.broadcast(ServerMessage::Modal {
                message: format!("Invalid word: {}. -{} points penalty!", word, FINALIZE_PENALTY),
            });
        }
    }

    for pt in engine.pending.iter_mut() {
        if pt.group_id(direction) == Some(group_id) {
            pt.set_group_id(direction, None);
        }
    }
    engine.group_timers.remove(&(direction, group_id));

    let to_remove: Vec<PendingTile> = engine
        .pending
        .iter()
        .filter(|pt| {
            let h_active = pt
                .h_group_id
                .map(|gid| engine.group_timers.contains_key(&(Direction::H, gid)))
                .unwrap_or(false);
            let v_active = pt
                .v_group_id
                .map(|gid| engine.group_timers.contains_key(&(Direction::V, gid)))
                .unwrap_or(false);
            !h_active && !v_active
        })
        .cloned()
        .collect();

    if !to_remove.is_empty() {
        for pt in &to_remove {
            if let Some(player) = engine.players.get_mut(&pt.player_id) {
                let slot = pt
                    .hand_index
                    .filter(|&idx| idx < player.hand.len() && player.hand[idx].is_none())
                    .or_else(|| player.hand.iter().position(|s| s.is_none()));
                if let Some(idx) = slot {
                    player.hand[idx] = Some(pt.letter);
                }
            }
        }
        let wire: Vec<PendingTileWire> = to_remove.iter().map(to_pending_wire).collect();
        engine.broadcast(ServerMessage::TileRemoved { tiles: wire });
    }

    let remove_set: HashSet<(i64, i64)> = to_remove.iter().map(|pt| (pt.x, pt.y)).collect();
    engine.pending.retain(|pt| !remove_set.contains(&(pt.x, pt.y)));

    let snapshot = engine.state_snapshot();
    engine.broadcast(ServerMessage::Update {
        state: snapshot,
        timer: None,
    });
    warn!(room = %engine.code, %word, "group finalize failed, tiles returned");
}

// --- Lobby / match lifecycle -----------------------------------------------

fn starting_word_count(player_count: usize) -> usize {
    (1 + player_count.saturating_sub(1) / 5).min(4)
}

fn initialize_starting_words(engine: &mut RoomEngine) {
    let lang = engine.settings.lang;
    let word_count = starting_word_count(engine.players.len()).max(1);
    let (mut cur_x, mut cur_y) = (0i64, 0i64);

    for i in 0..word_count {
        let word = engine
            .dictionary
            .random_word(Some(10), None, None, lang)
            .or_else(|| engine.dictionary.random_word(Some(8), None, None, lang));
        let Some(word) = word else { continue };
        let letters: Vec<char> = lang.normalize(&word).chars().collect();
        let horizontal = i % 2 == 0;

        if horizontal {
            for (j, &ch) in letters.iter().enumerate() {
                let (px, py) = (cur_x + j as i64, cur_y);
                engine
                    .board
                    .entry((px, py))
                    .or_insert(Tile {
                        x: px,
                        y: py,
                        letter: ch,
                        color: NEUTRAL_COLOR.into(),
                    });
            }
            cur_x += letters.len() as i64 - 1;
        } else {
            for (j, &ch) in letters.iter().enumerate() {
                let (px, py) = (cur_x, cur_y + j as i64);
                engine
                    .board
                    .entry((px, py))
                    .or_insert(Tile {
                        x: px,
                        y: py,
                        letter: ch,
                        color: NEUTRAL_COLOR.into(),
                    });
            }
            cur_y += letters.len() as i64 - 1;
        }
    }
}

fn deal_starting_hand(engine: &mut RoomEngine, player_id: Uuid) {
    let lang = engine.settings.lang;
    let word = engine
        .dictionary
        .random_word(None, None, Some(10), lang)
        .or_else(|| engine.dictionary.random_word(Some(6), Some(10), None, lang));

    let mut hand = empty_rack();
    let mut filled = 0usize;
    if let Some(word) = word {
        for (i, ch) in lang.normalize(&word).chars().enumerate().take(10) {
            hand[i] = Some(ch);
            filled = i + 1;
        }
    }
    if let Some(player) = engine.players.get_mut(&player_id) {
        player.hand = hand;
    }
    if filled < 10 {
        draw_tiles_for_player(engine, player_id, 10 - filled);
    }
}

pub async fn start_match(handle: &RoomHandle) -> Result<(), ValidationError> {
    let mut engine = handle.lock().await;
    if engine.status != RoomStatus::Lobby {
        return Err(ValidationError::WrongRoomState);
    }
    engine.status = RoomStatus::Ingame;
    let lang = engine.settings.lang;
    engine.tile_bag = Some(wordgrid_core::TileBag::new(lang));

    initialize_starting_words(&mut engine);

    let player_ids = engine.join_order.clone();
    for pid in player_ids {
        deal_starting_hand(&mut engine, pid);
    }

    engine.duration = engine.settings.mode.duration_secs();
    engine.remaining = engine.duration;

    info!(room = %engine.code, "match started");
    Ok(())
}

/// Spawns the per-second countdown; fires `end_game` with reason `TIME_UP`
/// once it reaches zero (§4.4.4 Round timer).
pub async fn start_global_timer(handle: &RoomHandle, duration: u32) {
    {
        let mut engine = handle.lock().await;
        if let Some(prev) = engine.global_timer.take() {
            prev.abort();
        }
        engine.duration = duration;
        engine.remaining = duration;
    }
    let task_handle = handle.clone();
    let jh = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            let finished = {
                let mut engine = task_handle.lock().await;
                if engine.status != RoomStatus::Ingame {
                    return;
                }
                if engine.remaining > 0 {
                    engine.remaining -= 1;
                }
                let remaining = engine.remaining;
                engine.broadcast(ServerMessage::Timer { time: remaining });
                remaining == 0
            };
            if finished {
                end_game(&task_handle, Some("TIME_UP".to_string())).await;
                return;
            }
        }
    });
    handle.lock().await.global_timer = Some(jh);
}

/// Cancels every outstanding timer, force-finalizes whatever pending groups
/// remain, persists the final standings, transitions to `FINISHED`, and
/// schedules this room's removal from the registry. The persistence write
/// happens with the room lock released (§5): only the collection of the
/// summary and the final status transition hold it.
pub async fn end_game(handle: &RoomHandle, reason: Option<String>) {
    let (room_code, player_results, db_pool) = {
        let mut engine = handle.lock().await;
        if let Some(jh) = engine.global_timer.take() {
            jh.abort();
        }
        let keys: Vec<(Direction, Uuid)> = engine.group_timers.keys().cloned().collect();
        for key in &keys {
            if let Some(jh) = engine.group_timers.remove(key) {
                jh.abort();
            }
        }
        for (direction, group_id) in keys {
            finalize_group_locked(&mut engine, direction, group_id);
        }

        let results: Vec<db::PlayerResult> = engine
            .players
            .values()
            .map(|p| db::PlayerResult {
                user_uuid: p.id,
                score: p.score,
            })
            .collect();
        (engine.code.clone(), results, engine.db.clone())
    };

    let game_id = match db::save_game_result(&db_pool, &room_code, player_results).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(room = %room_code, error = %e, "persistence failure on end game");
            None
        }
    };

    let mut engine = handle.lock().await;
    engine.status = RoomStatus::Finished;
    engine.penalty_cooldowns.clear();
    let snapshot = engine.state_snapshot();
    engine.broadcast(ServerMessage::GameOver {
        game_id,
        state: snapshot,
        reason,
    });

    if let Some(registry) = engine.registry.upgrade() {
        let code = engine.code.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(ROOM_CLEANUP_SECS)).await;
            registry.remove(&code).await;
        });
    }
    info!(room = %engine.code, "game ended");
}

// --- Lobby / in-round player actions ----------------------------------------

pub async fn update_settings(
    handle: &RoomHandle,
    player_id: Uuid,
    patch: SettingsPatch,
) -> Result<(), ValidationError> {
    let mut engine = handle.lock().await;
    if !engine.is_host(player_id) {
        return Err(ValidationError::NotHost);
    }
    if let Some(lang) = patch.lang {
        if engine.status != RoomStatus::Lobby {
            return Err(ValidationError::WrongRoomState);
        }
        engine.settings.lang = lang;
    }
    if let Some(mode) = patch.mode {
        engine.settings.mode = mode;
        if engine.status == RoomStatus::Lobby {
            engine.duration = mode.duration_secs();
            engine.remaining = engine.duration;
        }
    }
    if let Some(max_players) = patch.max_players {
        engine.settings.max_players = max_players;
    }
    let snapshot = engine.state_snapshot();
    engine.broadcast(ServerMessage::Update {
        state: snapshot,
        timer: None,
    });
    Ok(())
}

pub async fn draw_for_player(
    handle: &RoomHandle,
    player_id: Uuid,
    count: usize,
) -> Result<(), ValidationError> {
    let mut engine = handle.lock().await;
    if !engine.players.contains_key(&player_id) {
        return Err(ValidationError::NotInRoom);
    }
    draw_tiles_for_player(&mut engine, player_id, count);
    let snapshot = engine.state_snapshot();
    engine.broadcast(ServerMessage::Update {
        state: snapshot,
        timer: None,
    });
    Ok(())
}

pub async fn reroll(handle: &RoomHandle, player_id: Uuid) -> Result<(), ValidationError> {
    let mut engine = handle.lock().await;
    if !engine.players.contains_key(&player_id) {
        return Err(ValidationError::NotInRoom);
    }
    let returned: Vec<char> = {
        let player = engine.players.get_mut(&player_id).unwrap();
        let tokens: Vec<char> = player.hand.iter().filter_map(|s| *s).collect();
        player.hand = empty_rack();
        tokens
    };
    if let Some(bag) = engine.tile_bag.as_mut() {
        bag.add_tiles(returned);
    }
    draw_tiles_for_player(&mut engine, player_id, 10);
    let snapshot = engine.state_snapshot();
    engine.broadcast(ServerMessage::Update {
        state: snapshot,
        timer: None,
    });
    Ok(())
}

pub async fn destroy_tile(
    handle: &RoomHandle,
    player_id: Uuid,
    hand_index: usize,
) -> Result<(), ValidationError> {
    let mut engine = handle.lock().await;
    if !engine.players.contains_key(&player_id) {
        return Err(ValidationError::NotInRoom);
    }
    {
        let player = engine.players.get(&player_id).unwrap();
        if hand_index >= player.hand.len() {
            return Err(ValidationError::BadHandIndex(hand_index));
        }
    }
    if let Some(player) = engine.players.get_mut(&player_id) {
        player.hand[hand_index] = None;
    }
    draw_tiles_for_player(&mut engine, player_id, 1);
    let snapshot = engine.state_snapshot();
    engine.broadcast(ServerMessage::Update {
        state: snapshot,
        timer: None,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordgrid_core::dictionary::DictionaryRow;
    use wordgrid_core::Language;

    fn sample_dictionary() -> Arc<Dictionary> {
        let rows = vec![
            ("CAT", 3),
            ("COOL", 4),
            ("TOOL", 4),
            ("ACT", 3),
            ("DOG", 3),
            ("DUAL", 4),
        ]
        .into_iter()
        .map(|(w, len)| DictionaryRow {
            word: w.to_string(),
            language: Language::En,
            length: len,
            score: len as i64,
        })
        .collect();
        Arc::new(Dictionary::hydrate(rows))
    }

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::init_db(&pool).await.unwrap();
        pool
    }

    async fn add_test_player(handle: &RoomHandle, name: &str) -> (Uuid, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        join(
            handle,
            Player {
                id,
                name: name.to_string(),
                color: "#fff".into(),
                score: 0,
                hand: empty_rack(),
                tx,
            },
        )
        .await;
        (id, rx)
    }

    #[tokio::test]
    async fn immediate_finalize_awards_score_and_promotes_tiles() {
        let pool = test_pool().await;
        let handle = RoomEngine::new("ABCDEF".into(), sample_dictionary(), pool, Weak::new());
        let (player_id, _rx) = add_test_player(&handle, "alice").await;

        {
            let mut engine = handle.lock().await;
            engine.players.get_mut(&player_id).unwrap().hand[0] = Some('C');
            engine.players.get_mut(&player_id).unwrap().hand[1] = Some('A');
            engine.players.get_mut(&player_id).unwrap().hand[2] = Some('T');
        }

        place_tile(&handle, player_id, 0, 0, 'C', None, Some(0))
            .await
            .unwrap();
        place_tile(&handle, player_id, 1, 0, 'A', None, Some(1))
            .await
            .unwrap();
        place_tile(&handle, player_id, 2, 0, 'T', None, Some(2))
            .await
            .unwrap();

        let engine = handle.lock().await;
        assert_eq!(engine.board.len(), 3);
        assert!(engine.pending.is_empty());
        assert_eq!(engine.players.get(&player_id).unwrap().score, 3);
    }

    #[tokio::test]
    async fn substring_invalid_placement_is_penalized_and_returned() {
        let pool = test_pool().await;
        let handle = RoomEngine::new("ZZZZZZ".into(), sample_dictionary(), pool, Weak::new());
        let (player_id, _rx) = add_test_player(&handle, "bob").await;

        {
            let mut engine = handle.lock().await;
            let hand = &mut engine.players.get_mut(&player_id).unwrap().hand;
            hand[0] = Some('X');
            hand[1] = Some('Z');
        }

        // First tile is always accepted (no run to prune against yet).
        place_tile(&handle, player_id, 0, 0, 'X', None, Some(0))
            .await
            .unwrap();
        // "XZ" is not a prefix of anything in the dictionary: rejected,
        // penalized, and returned to the rack, while X stays pending.
        place_tile(&handle, player_id, 1, 0, 'Z', None, Some(1))
            .await
            .unwrap();

        let engine = handle.lock().await;
        assert!(engine.board.is_empty());
        assert_eq!(engine.pending.len(), 1);
        assert_eq!(engine.pending[0].letter, 'X');
        assert_eq!(engine.players.get(&player_id).unwrap().score, 0);
        assert_eq!(engine.players.get(&player_id).unwrap().hand[1], Some('Z'));
    }

    #[tokio::test]
    async fn lone_tile_waits_on_both_axes_then_returns_once_both_resolve() {
        let pool = test_pool().await;
        let handle = RoomEngine::new("DEFER1".into(), sample_dictionary(), pool, Weak::new());
        let (player_id, _rx) = add_test_player(&handle, "carol").await;

        {
            let mut engine = handle.lock().await;
            engine.players.get_mut(&player_id).unwrap().hand[0] = Some('C');
        }

        // A single isolated letter is length-1 in both directions, so
        // neither axis finalizes immediately; both get deferred timers.
        place_tile(&handle, player_id, 0, 0, 'C', None, Some(0))
            .await
            .unwrap();

        let (h_group, v_group) = {
            let engine = handle.lock().await;
            assert_eq!(engine.pending.len(), 1);
            (
                engine.pending[0].h_group_id.unwrap(),
                engine.pending[0].v_group_id.unwrap(),
            )
        };

        // Resolving only the horizontal axis isn't enough: the vertical
        // timer is still live, so the tile stays pending.
        finalize_group(&handle, Direction::H, h_group).await;
        {
            let engine = handle.lock().await;
            assert_eq!(engine.pending.len(), 1);
        }

        // Once the vertical axis resolves too, the tile has no live timer
        // left on either axis and returns to the rack.
        finalize_group(&handle, Direction::V, v_group).await;
        let engine = handle.lock().await;
        assert!(engine.pending.is_empty());
        assert!(engine.board.is_empty());
        assert_eq!(engine.players.get(&player_id).unwrap().hand[0], Some('C'));
    }

    #[test]
    fn starting_word_count_scales_with_player_count() {
        assert_eq!(starting_word_count(1), 1);
        assert_eq!(starting_word_count(5), 1);
        assert_eq!(starting_word_count(6), 2);
        assert_eq!(starting_word_count(100), 4);
    }
}
