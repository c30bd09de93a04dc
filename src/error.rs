//! Error types for podium.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PodiumError>;

#[derive(Error, Debug)]
pub enum PodiumError {
    #[error("invalid score: {reason}")]
    InvalidScore { reason: String },

    #[error("invalid window: {key}")]
    InvalidWindow { key: String },

    #[error("game not found: {game_id}")]
    GameNotFound { game_id: u64 },

    #[error("user {user_id} not found in leaderboard for game {game_id}")]
    UserNotFound { user_id: u64, game_id: u64 },

    #[error("persistence failure: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("recovery corruption: {reason}")]
    RecoveryCorruption { reason: String },
}

impl PodiumError {
    pub fn invalid_score(reason: impl Into<String>) -> Self {
        Self::InvalidScore {
            reason: reason.into(),
        }
    }

    pub fn invalid_window(key: impl Into<String>) -> Self {
        Self::InvalidWindow { key: key.into() }
    }

    pub fn game_not_found(game_id: u64) -> Self {
        Self::GameNotFound { game_id }
    }

    pub fn user_not_found(user_id: u64, game_id: u64) -> Self {
        Self::UserNotFound { user_id, game_id }
    }

    pub fn corruption(reason: impl Into<String>) -> Self {
        Self::RecoveryCorruption {
            reason: reason.into(),
        }
    }
}
