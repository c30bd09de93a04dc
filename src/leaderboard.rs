//! A single ranking view (all-time or windowed).

use crate::entry::{ScoreEntry, SortKey};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// One leaderboard view.
///
/// Holds a sorted index of entries plus a per-user map, guarded by a single
/// lock so a reader never observes the two in disagreement. Each user has at
/// most one entry: inserting removes any previous entry for that user first.
#[derive(Debug, Default)]
pub struct Leaderboard {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Entries in view order.
    sorted: BTreeMap<SortKey, ScoreEntry>,
    /// Current entry per user.
    by_user: HashMap<u64, ScoreEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry`, replacing any previous entry for the same user.
    /// The last submission wins, even when the new score is lower.
    pub fn add_or_update(&self, entry: ScoreEntry) {
        let mut inner = self.inner.write();
        if let Some(old) = inner.by_user.insert(entry.user_id, entry) {
            inner.sorted.remove(&old.sort_key());
        }
        inner.sorted.insert(entry.sort_key(), entry);
    }

    /// Removes `entry` from the view. The user binding is dropped only when
    /// it still points at this exact entry, so removing a superseded entry
    /// is harmless and removing an absent entry is a no-op.
    pub fn remove(&self, entry: &ScoreEntry) {
        let mut inner = self.inner.write();
        inner.sorted.remove(&entry.sort_key());
        if inner.by_user.get(&entry.user_id) == Some(entry) {
            inner.by_user.remove(&entry.user_id);
        }
    }

    /// First `min(k, len)` entries in view order.
    pub fn top_k(&self, k: usize) -> Vec<ScoreEntry> {
        let inner = self.inner.read();
        inner.sorted.values().take(k).copied().collect()
    }

    /// The user's current entry, if any.
    pub fn user_score(&self, user_id: u64) -> Option<ScoreEntry> {
        self.inner.read().by_user.get(&user_id).copied()
    }

    /// 1-based rank of the user in view order. The smallest entry ranks
    /// `len()`. O(rank) scan over the sorted index.
    pub fn user_rank(&self, user_id: u64) -> Option<usize> {
        let inner = self.inner.read();
        let key = inner.by_user.get(&user_id)?.sort_key();
        Some(inner.sorted.range(..key).count() + 1)
    }

    pub fn len(&self) -> usize {
        self.inner.read().sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().sorted.is_empty()
    }

    /// All entries in view order, for snapshot serialization.
    pub fn entries(&self) -> Vec<ScoreEntry> {
        self.inner.read().sorted.values().copied().collect()
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        let inner = self.inner.read();
        assert_eq!(inner.sorted.len(), inner.by_user.len());
        for entry in inner.sorted.values() {
            assert_eq!(inner.by_user.get(&entry.user_id), Some(entry));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user_id: u64, score: i64, timestamp_ms: i64) -> ScoreEntry {
        ScoreEntry::new(user_id, 7, score, timestamp_ms)
    }

    #[test]
    fn test_top_k_order_and_tiebreaks() {
        let board = Leaderboard::new();
        board.add_or_update(entry(1, 100, 1000));
        board.add_or_update(entry(2, 100, 999));
        board.add_or_update(entry(3, 100, 1000));

        let top = board.top_k(3);
        assert_eq!(
            top.iter().map(|e| e.user_id).collect::<Vec<_>>(),
            vec![2, 1, 3]
        );
        board.check_invariants();
    }

    #[test]
    fn test_last_write_wins() {
        let board = Leaderboard::new();
        board.add_or_update(entry(1, 50, 2000));
        board.add_or_update(entry(1, 10, 3000));

        assert_eq!(board.len(), 1);
        let current = board.user_score(1).unwrap();
        assert_eq!(current.score, 10);
        assert_eq!(board.user_rank(1), Some(1));
        board.check_invariants();
    }

    #[test]
    fn test_remove_stale_entry_is_inert() {
        let board = Leaderboard::new();
        let old = entry(1, 50, 2000);
        let new = entry(1, 90, 3000);
        board.add_or_update(old);
        board.add_or_update(new);

        // The old entry was superseded; removing it must not touch the new one.
        board.remove(&old);
        assert_eq!(board.user_score(1), Some(new));
        assert_eq!(board.len(), 1);
        board.check_invariants();

        board.remove(&new);
        assert_eq!(board.user_score(1), None);
        assert!(board.is_empty());
        board.check_invariants();
    }

    #[test]
    fn test_remove_absent_entry_is_noop() {
        let board = Leaderboard::new();
        board.remove(&entry(42, 1, 1));
        assert!(board.is_empty());
        board.check_invariants();
    }

    #[test]
    fn test_user_rank() {
        let board = Leaderboard::new();
        for (user, score) in [(1, 300), (2, 200), (3, 100)] {
            board.add_or_update(entry(user, score, 1000));
        }
        assert_eq!(board.user_rank(1), Some(1));
        assert_eq!(board.user_rank(2), Some(2));
        assert_eq!(board.user_rank(3), Some(3));
        assert_eq!(board.user_rank(4), None);
    }

    #[test]
    fn test_top_k_clamps_to_len() {
        let board = Leaderboard::new();
        board.add_or_update(entry(1, 10, 1));
        assert_eq!(board.top_k(0).len(), 0);
        assert_eq!(board.top_k(100).len(), 1);
    }

    #[test]
    fn test_invariants_under_mixed_ops() {
        let board = Leaderboard::new();
        for i in 0..100u64 {
            board.add_or_update(entry(i % 10, (i * 37 % 101) as i64, i as i64));
            if i % 3 == 0 {
                board.remove(&entry(i % 10, (i * 37 % 101) as i64, i as i64));
            }
            board.check_invariants();
        }
    }
}
