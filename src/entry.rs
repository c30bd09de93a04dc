//! Score entry value type and view ordering.

use std::cmp::Ordering;

/// A single submitted score.
///
/// Entries are immutable. A resubmission by the same user produces a new
/// entry that replaces the previous one in every view it reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoreEntry {
    pub user_id: u64,
    pub game_id: u64,
    pub score: i64,
    pub timestamp_ms: i64,
}

impl ScoreEntry {
    pub fn new(user_id: u64, game_id: u64, score: i64, timestamp_ms: i64) -> Self {
        Self {
            user_id,
            game_id,
            score,
            timestamp_ms,
        }
    }

    /// Key under which this entry sorts inside a view.
    #[inline]
    pub fn sort_key(&self) -> SortKey {
        SortKey {
            score: self.score,
            timestamp_ms: self.timestamp_ms,
            user_id: self.user_id,
        }
    }
}

/// View ordering: higher score first, earlier submission wins ties, user id
/// as the final tiebreak so the order is strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub score: i64,
    pub timestamp_ms: i64,
    pub user_id: u64,
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.timestamp_ms.cmp(&other.timestamp_ms))
            .then_with(|| self.user_id.cmp(&other.user_id))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
