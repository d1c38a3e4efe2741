use uuid::Uuid;
use wordgrid_core::board::{Board, Direction, PendingTile};

/// Result of resolving which group a new placement joins: the winning
/// group-id plus any group-ids that were merged away and whose timers the
/// caller must cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub group_id: Uuid,
    pub cancelled: Vec<Uuid>,
}

/// Walks board tiles in both directions along `direction`, starting from
/// `(x, y)`, until a gap; any pending tile reached along the way
/// contributes its existing group-id for that direction (§4.3).
pub fn connected_group_ids(
    board: &Board,
    pending: &[PendingTile],
    x: i64,
    y: i64,
    direction: Direction,
) -> Vec<Uuid> {
    let (dx, dy) = direction.delta();
    let mut ids = Vec::new();
    for sign in [1i64, -1i64] {
        let (sdx, sdy) = (dx * sign, dy * sign);
        let (mut cx, mut cy) = (x + sdx, y + sdy);
        loop {
            if board.contains_key(&(cx, cy)) {
                cx += sdx;
                cy += sdy;
                continue;
            }
            if let Some(pt) = pending.iter().find(|pt| pt.x == cx && pt.y == cy) {
                if let Some(gid) = pt.group_id(direction) {
                    if !ids.contains(&gid) {
                        ids.push(gid);
                    }
                }
                cx += sdx;
                cy += sdy;
                continue;
            }
            break;
        }
    }
    ids
}

/// Assigns the placement at `(x, y)` a group-id along `direction`: a fresh
/// one if it bridges nothing, the sole existing one if it bridges exactly
/// one group, or the merge of all bridged groups (tie-break: smallest
/// `Uuid`) if it bridges several. Rewrites the losing group-ids on every
/// pending tile that carried them.
pub fn resolve_group_id(
    pending: &mut [PendingTile],
    board: &Board,
    x: i64,
    y: i64,
    direction: Direction,
) -> MergeOutcome {
    let mut found = connected_group_ids(board, pending, x, y, direction);
    if found.is_empty() {
        return MergeOutcome {
            group_id: Uuid::new_v4(),
            cancelled: Vec::new(),
        };
    }
    found.sort();
    let winner = found[0];
    let mut cancelled = Vec::new();
    for &loser in &found[1..] {
        for pt in pending.iter_mut() {
            if pt.group_id(direction) == Some(loser) {
                pt.set_group_id(direction, Some(winner));
            }
        }
        cancelled.push(loser);
    }
    MergeOutcome {
        group_id: winner,
        cancelled,
    }
}
