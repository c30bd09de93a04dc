//! Ingest validation and the read-path query façade.

use crate::entry::ScoreEntry;
use crate::error::{PodiumError, Result};
use crate::leaderboard::Leaderboard;
use crate::manager::LeaderboardManager;
use crate::window;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// One leaderboard row with its 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub user_id: u64,
    pub score: i64,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    pub rank: usize,
}

/// A user's standing within one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStanding {
    pub user_id: u64,
    pub rank: usize,
    pub score: i64,
    pub percentile: f64,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

/// Thin read/write façade over the manager: submission validation, view
/// selection by window key, and response shaping.
#[derive(Clone)]
pub struct QueryService {
    manager: Arc<LeaderboardManager>,
}

impl QueryService {
    pub fn new(manager: Arc<LeaderboardManager>) -> Self {
        Self { manager }
    }

    /// Validates and ingests one submission.
    pub fn submit(&self, user_id: u64, game_id: u64, score: i64, timestamp_ms: i64) -> Result<()> {
        if user_id == 0 {
            return Err(PodiumError::invalid_score("user id must be positive"));
        }
        if game_id == 0 {
            return Err(PodiumError::invalid_score("game id must be positive"));
        }
        if score < 0 {
            return Err(PodiumError::invalid_score("score cannot be negative"));
        }
        if timestamp_ms > now_millis() {
            return Err(PodiumError::invalid_score(
                "score timestamp cannot be in the future",
            ));
        }
        self.manager
            .record_score(ScoreEntry::new(user_id, game_id, score, timestamp_ms))
    }

    /// Top `limit` entries of the selected view, paired with 1-based ranks.
    pub fn top_k(
        &self,
        game_id: u64,
        limit: usize,
        window: Option<&str>,
    ) -> Result<Vec<RankedEntry>> {
        let started = Instant::now();
        let view = self.resolve_view(game_id, window)?;
        let rows = view
            .top_k(limit)
            .into_iter()
            .zip(1..)
            .map(|(e, rank)| RankedEntry {
                user_id: e.user_id,
                score: e.score,
                timestamp_ms: e.timestamp_ms,
                rank,
            })
            .collect();

        let metrics = self.manager.metrics();
        metrics.queries_total.with_label_values(&["leaders"]).inc();
        metrics
            .query_duration
            .with_label_values(&["leaders"])
            .observe(started.elapsed().as_secs_f64());
        Ok(rows)
    }

    /// The user's rank, score, and percentile within the selected view.
    pub fn user_rank(
        &self,
        game_id: u64,
        user_id: u64,
        window: Option<&str>,
    ) -> Result<UserStanding> {
        let started = Instant::now();
        let view = self.resolve_view(game_id, window)?;
        let entry = view
            .user_score(user_id)
            .ok_or_else(|| PodiumError::user_not_found(user_id, game_id))?;
        let rank = view
            .user_rank(user_id)
            .ok_or_else(|| PodiumError::user_not_found(user_id, game_id))?;
        let total = view.len();

        let metrics = self.manager.metrics();
        metrics.queries_total.with_label_values(&["rank"]).inc();
        metrics
            .query_duration
            .with_label_values(&["rank"])
            .observe(started.elapsed().as_secs_f64());

        Ok(UserStanding {
            user_id,
            rank,
            score: entry.score,
            percentile: percentile(rank, total),
            timestamp_ms: entry.timestamp_ms,
        })
    }

    fn resolve_view(&self, game_id: u64, window: Option<&str>) -> Result<Arc<Leaderboard>> {
        let set = self
            .manager
            .game(game_id)
            .ok_or_else(|| PodiumError::game_not_found(game_id))?;
        match window {
            None => Ok(set.all_time()),
            Some(key) if key.is_empty() => Ok(set.all_time()),
            Some(key) => {
                if !window::is_valid_key(key) {
                    return Err(PodiumError::invalid_window(key));
                }
                // A syntactically valid but unconfigured window is the same
                // error as a malformed one.
                set.view(Some(key))
                    .ok_or_else(|| PodiumError::invalid_window(key))
            }
        }
    }
}

fn percentile(rank: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((total - rank + 1) as f64 * 100.0) / total as f64
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
