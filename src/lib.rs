//! # Podium
//!
//! Single-node real-time leaderboard engine.
//!
//! ## Features
//!
//! - **Ranking views**: one best score per user per view, top-K and
//!   rank/percentile queries over all-time and sliding-window leaderboards
//! - **Sliding-window expiry**: delay-queued tickets retire window entries
//!   at the right wall-clock instant
//! - **Durability**: append-only WAL plus periodic atomic snapshots with
//!   deterministic recovery
//! - **HTTP edge**: thin axum surface over the engine
//!
//! ## Example
//!
//! ```rust,ignore
//! use podium::{EngineConfig, LeaderboardManager, Metrics, QueryService};
//! use std::sync::Arc;
//!
//! let manager = Arc::new(LeaderboardManager::new(
//!     EngineConfig::with_data_dir("./data"),
//!     Arc::new(Metrics::new()),
//! )?);
//! manager.recover()?;
//! manager.start()?;
//!
//! let queries = QueryService::new(Arc::clone(&manager));
//! queries.submit(1, 7, 500, 1_700_000_000_000)?;
//! let leaders = queries.top_k(7, 10, None)?;
//! ```

pub mod api;
pub mod config;
pub mod entry;
pub mod error;
pub mod expiry;
pub mod game;
pub mod leaderboard;
pub mod manager;
pub mod metrics;
pub mod query;
pub mod snapshot;
pub mod telemetry;
pub mod wal;
pub mod window;

// Re-exports
pub use config::{EngineConfig, HttpConfig};
pub use entry::ScoreEntry;
pub use error::{PodiumError, Result};
pub use game::GameSet;
pub use leaderboard::Leaderboard;
pub use manager::LeaderboardManager;
pub use metrics::Metrics;
pub use query::{QueryService, RankedEntry, UserStanding};
pub use wal::Durability;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn now_millis() -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    #[test]
    fn test_submit_and_query_round_trip() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(
            LeaderboardManager::new(
                EngineConfig::with_data_dir(dir.path()),
                Arc::new(Metrics::new()),
            )
            .unwrap(),
        );
        let queries = QueryService::new(Arc::clone(&manager));

        let now = now_millis();
        queries.submit(1, 7, 500, now - 2).unwrap();
        queries.submit(2, 7, 600, now - 1).unwrap();

        let leaders = queries.top_k(7, 10, None).unwrap();
        assert_eq!(leaders[0].user_id, 2);
        assert_eq!(leaders[1].user_id, 1);

        let standing = queries.user_rank(7, 2, Some("24h")).unwrap();
        assert_eq!(standing.rank, 1);
        assert_eq!(standing.percentile, 100.0);
    }
}
