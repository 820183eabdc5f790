/// Error taxonomy for the simulation core.
///
/// Nothing here ever reaches the player as a raw error: callers log the
/// value and fall back to "no-op" or "keep the previous state".

use std::path::PathBuf;

use thiserror::Error;

use crate::sim::level::LevelId;

#[derive(Debug, Error)]
pub enum GameError {
    /// Configuration: a transition or spawn referenced a level that is not in the table.
    #[error("level {0} is not configured")]
    UnknownLevel(LevelId),

    /// Configuration: a random spawn policy with nothing to spawn.
    #[error("level {0} has a random spawn policy with an empty archetype pool")]
    EmptySpawnPool(LevelId),

    /// Invariant: only one transition may be in flight.
    #[error("transition to level {requested} rejected: transition to level {target} in progress")]
    TransitionInProgress { requested: LevelId, target: LevelId },

    /// Invariant: the game-over latch is set, gameplay mutations are refused.
    #[error("game is stopped")]
    GameStopped,

    #[error("could not read {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type GameResult<T> = Result<T, GameError>;
