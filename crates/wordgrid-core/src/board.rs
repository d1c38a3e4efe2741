use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One axis a pending group can run along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    H,
    V,
}

impl Direction {
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::H => (1, 0),
            Direction::V => (0, 1),
        }
    }

    pub fn cross(self) -> Direction {
        match self {
            Direction::H => Direction::V,
            Direction::V => Direction::H,
        }
    }
}

/// A letter permanently promoted to the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub x: i64,
    pub y: i64,
    pub letter: char,
    pub color: String,
}

/// A tentative placement awaiting immediate or deferred finalization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTile {
    pub x: i64,
    pub y: i64,
    pub letter: char,
    pub player_id: Uuid,
    pub color: String,
    pub h_group_id: Option<Uuid>,
    pub v_group_id: Option<Uuid>,
    pub hand_index: Option<usize>,
}

impl PendingTile {
    pub fn group_id(&self, direction: Direction) -> Option<Uuid> {
        match direction {
            Direction::H => self.h_group_id,
            Direction::V => self.v_group_id,
        }
    }

    pub fn set_group_id(&mut self, direction: Direction, id: Option<Uuid>) {
        match direction {
            Direction::H => self.h_group_id = id,
            Direction::V => self.v_group_id = id,
        }
    }
}

/// Board keyed by coordinate; no two tiles may share a key.
pub type Board = HashMap<(i64, i64), Tile>;

/// Ten letter slots; `None` is an empty slot.
pub type Rack = [Option<char>; 10];

pub fn empty_rack() -> Rack {
    [None; 10]
}

/// Walks the maximal contiguous run of letters through `(x, y)` along
/// `direction` over an arbitrary coordinate→letter view (board, board plus
/// pending, or a group-local view during finalization). Returns the word
/// spelled in the direction of travel and the coordinates it spans, in
/// order from the run's start.
pub fn scan_line(
    cells: &HashMap<(i64, i64), char>,
    x: i64,
    y: i64,
    direction: Direction,
) -> (String, Vec<(i64, i64)>) {
    let (dx, dy) = direction.delta();
    let mut sx = x;
    let mut sy = y;
    while cells.contains_key(&(sx - dx, sy - dy)) {
        sx -= dx;
        sy -= dy;
    }

    let mut word = String::new();
    let mut coords = Vec::new();
    let (mut cx, mut cy) = (sx, sy);
    while let Some(letter) = cells.get(&(cx, cy)) {
        word.push(*letter);
        coords.push((cx, cy));
        cx += dx;
        cy += dy;
    }
    (word, coords)
}

/// True iff `(x, y)` touches a board or pending tile in one of the four
/// cardinal directions.
pub fn has_adjacent(board: &Board, pending: &[PendingTile], x: i64, y: i64) -> bool {
    const OFFSETS: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
    OFFSETS.iter().any(|(dx, dy)| {
        let (nx, ny) = (x + dx, y + dy);
        board.contains_key(&(nx, ny)) || pending.iter().any(|pt| pt.x == nx && pt.y == ny)
    })
}

pub fn occupied(board: &Board, pending: &[PendingTile], x: i64, y: i64) -> bool {
    board.contains_key(&(x, y)) || pending.iter().any(|pt| pt.x == x && pt.y == y)
}

/// Merges `board` and `pending` into a single coordinate→letter view, the
/// shape every word-scan over "current reality" needs.
pub fn merged_view(board: &Board, pending: &[PendingTile]) -> HashMap<(i64, i64), char> {
    let mut view: HashMap<(i64, i64), char> =
        board.iter().map(|(&pos, t)| (pos, t.letter)).collect();
    for pt in pending {
        view.insert((pt.x, pt.y), pt.letter);
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_line_finds_full_run() {
        let mut cells = HashMap::new();
        cells.insert((0, 0), 'C');
        cells.insert((1, 0), 'A');
        cells.insert((2, 0), 'T');
        let (word, coords) = scan_line(&cells, 1, 0, Direction::H);
        assert_eq!(word, "CAT");
        assert_eq!(coords, vec![(0, 0), (1, 0), (2, 0)]);
    }

    #[test]
    fn scan_line_single_cell_is_length_one() {
        let mut cells = HashMap::new();
        cells.insert((5, 5), 'Q');
        let (word, coords) = scan_line(&cells, 5, 5, Direction::V);
        assert_eq!(word, "Q");
        assert_eq!(coords, vec![(5, 5)]);
    }

    #[test]
    fn adjacency_checks_all_four_directions() {
        let mut board = Board::new();
        board.insert(
            (0, 0),
            Tile {
                x: 0,
                y: 0,
                letter: 'A',
                color: "#fff".into(),
            },
        );
        assert!(has_adjacent(&board, &[], 1, 0));
        assert!(has_adjacent(&board, &[], -1, 0));
        assert!(has_adjacent(&board, &[], 0, 1));
        assert!(has_adjacent(&board, &[], 0, -1));
        assert!(!has_adjacent(&board, &[], 5, 5));
    }
}
