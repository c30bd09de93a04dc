//! Sliding-window expiration: a delay-ordered ticket queue and the worker
//! thread that retires due entries from windowed views.

use crate::entry::ScoreEntry;
use crate::game::GameSet;
use crate::metrics::Metrics;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A scheduled removal of one entry from one windowed view.
///
/// The ticket carries its own copy of the entry; it is authoritative only
/// while that entry is still the user's current entry in the view, which is
/// what makes superseded tickets inert (`Leaderboard::remove` compares the
/// whole entry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationTicket {
    pub due_at_ms: i64,
    pub game_id: u64,
    pub window_key: String,
    pub entry: ScoreEntry,
}

/// Heap ordering: earliest due first; remaining fields keep the order total.
#[derive(Debug, PartialEq, Eq)]
struct ByDue(ExpirationTicket);

impl Ord for ByDue {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .due_at_ms
            .cmp(&self.0.due_at_ms)
            .then_with(|| other.0.game_id.cmp(&self.0.game_id))
            .then_with(|| other.0.window_key.cmp(&self.0.window_key))
            .then_with(|| other.0.entry.user_id.cmp(&self.0.entry.user_id))
            .then_with(|| other.0.entry.game_id.cmp(&self.0.entry.game_id))
            .then_with(|| other.0.entry.timestamp_ms.cmp(&self.0.entry.timestamp_ms))
            .then_with(|| other.0.entry.score.cmp(&self.0.entry.score))
    }
}

impl PartialOrd for ByDue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-priority queue keyed by `due_at_ms` with a blocking take.
///
/// A push of an earlier-due ticket wakes a blocked taker so it can re-arm
/// its timeout against the new head.
pub struct ExpirationQueue {
    heap: Mutex<BinaryHeap<ByDue>>,
    available: Condvar,
    stopped: AtomicBool,
}

impl ExpirationQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            available: Condvar::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn push(&self, ticket: ExpirationTicket) {
        let mut heap = self.heap.lock();
        heap.push(ByDue(ticket));
        self.available.notify_one();
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Blocks until the head ticket is due, then pops it. Returns `None`
    /// once [`ExpirationQueue::stop`] has been called.
    pub fn take(&self) -> Option<ExpirationTicket> {
        let mut heap = self.heap.lock();
        loop {
            if self.stopped.load(AtomicOrdering::Acquire) {
                return None;
            }
            match heap.peek().map(|t| t.0.due_at_ms) {
                Some(due) => {
                    let now = now_millis();
                    if due <= now {
                        return heap.pop().map(|t| t.0);
                    }
                    let wait = Duration::from_millis((due - now) as u64);
                    self.available.wait_for(&mut heap, wait);
                }
                None => {
                    self.available.wait(&mut heap);
                }
            }
        }
    }

    /// Wakes every blocked taker and makes all future takes return `None`.
    pub fn stop(&self) {
        self.stopped.store(true, AtomicOrdering::Release);
        self.available.notify_all();
    }
}

impl Default for ExpirationQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Background thread that retires due tickets.
pub struct ExpirationWorker {
    handle: JoinHandle<()>,
    done_rx: mpsc::Receiver<()>,
}

impl ExpirationWorker {
    pub fn spawn(
        queue: Arc<ExpirationQueue>,
        games: Arc<DashMap<u64, Arc<GameSet>>>,
        metrics: Arc<Metrics>,
    ) -> std::io::Result<Self> {
        let (done_tx, done_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("score-expiration".into())
            .spawn(move || {
                while let Some(ticket) = queue.take() {
                    let Some(set) = games.get(&ticket.game_id).map(|s| Arc::clone(s.value()))
                    else {
                        continue;
                    };
                    let Some(view) = set.view(Some(&ticket.window_key)) else {
                        continue;
                    };
                    view.remove(&ticket.entry);
                    metrics.expirations_total.inc();
                    metrics.expiration_queue_depth.set(queue.len() as i64);
                }
                let _ = done_tx.send(());
            })?;
        Ok(Self { handle, done_rx })
    }

    /// Waits up to `timeout` for the worker to exit after the queue was
    /// stopped. Returns `false` if the worker had to be abandoned.
    pub fn join_timeout(self, timeout: Duration) -> bool {
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = self.handle.join();
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(due_at_ms: i64, user_id: u64) -> ExpirationTicket {
        ExpirationTicket {
            due_at_ms,
            game_id: 7,
            window_key: "24h".into(),
            entry: ScoreEntry::new(user_id, 7, 100, due_at_ms - 1000),
        }
    }

    #[test]
    fn test_take_pops_in_due_order() {
        let queue = ExpirationQueue::new();
        let now = now_millis();
        queue.push(ticket(now - 10, 2));
        queue.push(ticket(now - 30, 1));
        queue.push(ticket(now - 20, 3));

        assert_eq!(queue.take().map(|t| t.entry.user_id), Some(1));
        assert_eq!(queue.take().map(|t| t.entry.user_id), Some(3));
        assert_eq!(queue.take().map(|t| t.entry.user_id), Some(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_blocks_until_due() {
        let queue = Arc::new(ExpirationQueue::new());
        queue.push(ticket(now_millis() + 150, 1));

        let start = std::time::Instant::now();
        let taken = queue.take();
        assert!(taken.is_some());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_earlier_push_wakes_taker() {
        let queue = Arc::new(ExpirationQueue::new());
        queue.push(ticket(now_millis() + 60_000, 1));

        let taker = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take())
        };
        thread::sleep(Duration::from_millis(50));
        queue.push(ticket(now_millis() - 1, 2));

        let taken = taker.join().expect("taker thread");
        assert_eq!(taken.map(|t| t.entry.user_id), Some(2));
    }

    #[test]
    fn test_stop_unblocks_taker() {
        let queue = Arc::new(ExpirationQueue::new());
        let taker = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take())
        };
        thread::sleep(Duration::from_millis(50));
        queue.stop();
        assert_eq!(taker.join().expect("taker thread"), None);
    }

    #[test]
    fn test_worker_removes_due_entry() {
        let queue = Arc::new(ExpirationQueue::new());
        let games: Arc<DashMap<u64, Arc<GameSet>>> = Arc::new(DashMap::new());
        let metrics = Arc::new(Metrics::new());

        let set = Arc::new(GameSet::new(7));
        let entry = ScoreEntry::new(1, 7, 500, now_millis());
        set.view(Some("24h")).unwrap().add_or_update(entry);
        set.all_time().add_or_update(entry);
        games.insert(7, Arc::clone(&set));

        let worker =
            ExpirationWorker::spawn(Arc::clone(&queue), Arc::clone(&games), metrics).unwrap();
        queue.push(ExpirationTicket {
            due_at_ms: now_millis() - 1,
            game_id: 7,
            window_key: "24h".into(),
            entry,
        });

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while set.view(Some("24h")).unwrap().len() > 0 {
            assert!(std::time::Instant::now() < deadline, "entry never expired");
            thread::sleep(Duration::from_millis(10));
        }
        // All-time view is untouched by window expiry.
        assert_eq!(set.all_time().len(), 1);

        queue.stop();
        assert!(worker.join_timeout(Duration::from_secs(5)));
    }
}
