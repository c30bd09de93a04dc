//! Per-game collection of ranking views.

use crate::entry::ScoreEntry;
use crate::expiry::ExpirationTicket;
use crate::leaderboard::Leaderboard;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Window every new game set starts with.
pub const DEFAULT_WINDOW_KEY: &str = "24h";
const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug)]
struct WindowView {
    duration_ms: i64,
    board: Arc<Leaderboard>,
}

/// All views for a single game: one all-time leaderboard plus the configured
/// sliding-window leaderboards.
///
/// The set never references the expiration queue; window inserts report
/// their expiration through the `emit` callback handed to [`GameSet::apply`].
#[derive(Debug)]
pub struct GameSet {
    game_id: u64,
    all_time: Arc<Leaderboard>,
    windows: RwLock<HashMap<String, WindowView>>,
}

impl GameSet {
    pub fn new(game_id: u64) -> Self {
        let set = Self {
            game_id,
            all_time: Arc::new(Leaderboard::new()),
            windows: RwLock::new(HashMap::new()),
        };
        set.configure_window(DEFAULT_WINDOW_KEY, DEFAULT_WINDOW);
        set
    }

    pub fn game_id(&self) -> u64 {
        self.game_id
    }

    /// Idempotent: creates an empty windowed view for `key` if absent and
    /// always (re)binds its duration.
    pub fn configure_window(&self, key: &str, duration: Duration) {
        let duration_ms = duration.as_millis() as i64;
        let mut windows = self.windows.write();
        match windows.get_mut(key) {
            Some(view) => view.duration_ms = duration_ms,
            None => {
                windows.insert(
                    key.to_string(),
                    WindowView {
                        duration_ms,
                        board: Arc::new(Leaderboard::new()),
                    },
                );
            }
        }
    }

    /// Selects a view. `None` or the empty key is the all-time view;
    /// anything else must name a configured window.
    pub fn view(&self, key: Option<&str>) -> Option<Arc<Leaderboard>> {
        match key {
            None => Some(Arc::clone(&self.all_time)),
            Some(k) if k.is_empty() => Some(Arc::clone(&self.all_time)),
            Some(k) => self.windows.read().get(k).map(|v| Arc::clone(&v.board)),
        }
    }

    pub fn all_time(&self) -> Arc<Leaderboard> {
        Arc::clone(&self.all_time)
    }

    /// Applies one entry: unconditionally to the all-time view, and to each
    /// window the entry still falls inside, emitting one expiration ticket
    /// per windowed insert. `now_ms` is sampled once by the caller so the
    /// eligibility decision is coherent across windows.
    pub fn apply<F: FnMut(ExpirationTicket)>(&self, entry: ScoreEntry, now_ms: i64, mut emit: F) {
        self.all_time.add_or_update(entry);

        let windows = self.windows.read();
        for (key, view) in windows.iter() {
            if entry.timestamp_ms > now_ms - view.duration_ms {
                view.board.add_or_update(entry);
                emit(ExpirationTicket {
                    due_at_ms: entry.timestamp_ms + view.duration_ms,
                    game_id: self.game_id,
                    window_key: key.clone(),
                    entry,
                });
            }
        }
    }

    /// `(key, duration_ms, entries)` per configured window, for snapshot
    /// serialization and ticket reconstruction on load.
    pub fn windows_snapshot(&self) -> Vec<(String, i64, Vec<ScoreEntry>)> {
        self.windows
            .read()
            .iter()
            .map(|(key, view)| (key.clone(), view.duration_ms, view.board.entries()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_configured() {
        let set = GameSet::new(7);
        assert!(set.view(Some("24h")).is_some());
        assert!(set.view(Some("1h")).is_none());
        assert!(set.view(None).is_some());
        assert!(set.view(Some("")).is_some());
    }

    #[test]
    fn test_configure_window_idempotent() {
        let set = GameSet::new(7);
        let view = set.view(Some("24h")).unwrap();
        view.add_or_update(ScoreEntry::new(1, 7, 10, 1));

        // Reconfiguring rebinds the duration but keeps the existing board.
        set.configure_window("24h", Duration::from_secs(3600));
        assert_eq!(set.view(Some("24h")).unwrap().len(), 1);
    }

    #[test]
    fn test_apply_window_filtering() {
        let set = GameSet::new(7);
        let now_ms = 100_000_000;
        let mut tickets = Vec::new();

        // In window: emits a ticket and lands in both views.
        set.apply(ScoreEntry::new(1, 7, 500, now_ms), now_ms, |t| {
            tickets.push(t)
        });
        // Far older than 24h: all-time only, no ticket.
        set.apply(ScoreEntry::new(2, 7, 600, 10_000_000), now_ms, |t| {
            tickets.push(t)
        });

        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].window_key, "24h");
        assert_eq!(tickets[0].due_at_ms, now_ms + 24 * 3600 * 1000);

        let windowed = set.view(Some("24h")).unwrap();
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed.user_score(1).map(|e| e.score), Some(500));

        let all_time = set.view(None).unwrap();
        assert_eq!(all_time.len(), 2);
        assert_eq!(all_time.top_k(1)[0].user_id, 2);
    }

    #[test]
    fn test_apply_emits_ticket_per_window() {
        let set = GameSet::new(7);
        set.configure_window("1h", Duration::from_secs(3600));
        let now_ms = 50_000_000;
        let mut tickets = Vec::new();
        set.apply(ScoreEntry::new(1, 7, 10, now_ms), now_ms, |t| {
            tickets.push(t)
        });
        let mut keys: Vec<_> = tickets.iter().map(|t| t.window_key.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["1h", "24h"]);
    }
}
