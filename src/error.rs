use crate::Card;
use thiserror::Error;

/// Everything that can go wrong when building cards, hands and melds.
///
/// Infeasible queries (no set, no run, no meld) are never errors; they come
/// back as empty iterators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("rank must be between 2 and 14, got {0}")]
    InvalidRank(u8),

    #[error("unknown suit: {0}")]
    InvalidSuit(String),

    #[error("invalid card: {0}")]
    InvalidCard(String),

    #[error("invalid objective: {0}")]
    InvalidObjective(String),

    /// Materializing or dematerializing a natural card. Always a bug in the caller.
    #[error("{0} is not a wild card")]
    NotWild(Card),

    #[error("invalid set: {0}")]
    InvalidSet(String),

    #[error("invalid run: {0}")]
    InvalidRun(String),

    #[error("invalid extension: {0}")]
    InvalidExtend(String),

    #[error("hand does not hold {0}")]
    MissingCard(Card),

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("deck is empty")]
    EmptyDeck,

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
