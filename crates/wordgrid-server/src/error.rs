use thiserror::Error;

/// Error taxonomy (§7). Validation and logic failures stay local to the
/// operation that raised them; persistence and peer-send failures never
/// abort the engine. Only `ProtocolError` tears a channel down.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("session cookie missing")]
    Missing,
    #[error("session expired")]
    Expired,
    #[error("session invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("player does not belong to this room")]
    NotInRoom,
    #[error("tile already exists at this position")]
    PositionOccupied,
    #[error("tile {0} not found in rack")]
    NotInRack(char),
    #[error("tile must be adjacent to an existing or pending tile")]
    NotAdjacent,
    #[error("only the host may perform this action")]
    NotHost,
    #[error("room is not in the expected state for this action")]
    WrongRoomState,
    #[error("hand index {0} out of range")]
    BadHandIndex(usize),
}

#[derive(Debug, Error)]
pub enum PersistenceFailure {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
