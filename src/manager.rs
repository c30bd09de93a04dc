//! Top-level leaderboard manager.
//!
//! Owns the game map, the expiration queue, the WAL, and snapshot
//! coordination. Orchestrates startup recovery (snapshot load + WAL replay)
//! and graceful shutdown (worker stop, final snapshot).

use crate::config::EngineConfig;
use crate::entry::ScoreEntry;
use crate::error::{PodiumError, Result};
use crate::expiry::{ExpirationQueue, ExpirationTicket, ExpirationWorker};
use crate::game::GameSet;
use crate::metrics::Metrics;
use crate::snapshot;
use crate::wal::WriteAheadLog;
use crate::window;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

struct Workers {
    expiration: ExpirationWorker,
    snapshot_timer: JoinHandle<()>,
}

pub struct LeaderboardManager {
    config: EngineConfig,
    /// Parsed `(key, duration)` pairs every game set is configured with.
    window_specs: Vec<(String, Duration)>,
    games: Arc<DashMap<u64, Arc<GameSet>>>,
    queue: Arc<ExpirationQueue>,
    wal: WriteAheadLog,
    metrics: Arc<Metrics>,
    /// Highest timestamp applied so far; becomes the replay cutoff written
    /// into the next snapshot.
    max_applied_ts: AtomicI64,
    /// Ingest holds this for read; the snapshotter takes it for write so the
    /// serialized image (and the WAL rotation that follows) sees no
    /// concurrent mutation.
    ingest_gate: RwLock<()>,
    /// Serializes the interval snapshot against the shutdown snapshot.
    snapshot_lock: Mutex<()>,
    stop: Mutex<bool>,
    stop_signal: Condvar,
    workers: Mutex<Option<Workers>>,
}

impl std::fmt::Debug for LeaderboardManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderboardManager").finish_non_exhaustive()
    }
}

impl LeaderboardManager {
    pub fn new(config: EngineConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let mut window_specs = Vec::with_capacity(config.windows.len());
        for key in &config.windows {
            let duration = window::parse_duration(key)
                .ok_or_else(|| PodiumError::invalid_window(key.clone()))?;
            window_specs.push((key.clone(), duration));
        }

        let wal = WriteAheadLog::open(config.wal_path.clone(), config.durability)?;
        if let Some(parent) = config.snapshot_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self {
            config,
            window_specs,
            games: Arc::new(DashMap::new()),
            queue: Arc::new(ExpirationQueue::new()),
            wal,
            metrics,
            max_applied_ts: AtomicI64::new(0),
            ingest_gate: RwLock::new(()),
            snapshot_lock: Mutex::new(()),
            stop: Mutex::new(false),
            stop_signal: Condvar::new(),
            workers: Mutex::new(None),
        })
    }

    /// Loads the snapshot (if present) and replays the active WAL.
    ///
    /// Window eligibility is re-tested against the wall clock at apply time,
    /// so scores already outside a window on restart stay out of it and the
    /// remaining ones get fresh tickets for their actual remaining lifetime.
    /// Call before [`LeaderboardManager::start`].
    pub fn recover(&self) -> Result<()> {
        let mut replay_from = 0;
        if let Some(loaded) = snapshot::load_snapshot(&self.config.snapshot_path)? {
            replay_from = loaded.last_included_timestamp_ms;
            self.max_applied_ts.fetch_max(replay_from, Ordering::SeqCst);
            for set in loaded.games {
                for (key, duration) in &self.window_specs {
                    set.configure_window(key, *duration);
                }
                // The queue is not persisted; re-arm a ticket for every
                // windowed entry (already-due tickets retire promptly once
                // the worker starts).
                for (key, duration_ms, entries) in set.windows_snapshot() {
                    for entry in entries {
                        self.queue.push(ExpirationTicket {
                            due_at_ms: entry.timestamp_ms + duration_ms,
                            game_id: set.game_id(),
                            window_key: key.clone(),
                            entry,
                        });
                    }
                }
                self.games.insert(set.game_id(), Arc::new(set));
            }
            info!(
                games = self.games.len(),
                replay_from, "snapshot loaded"
            );
        }

        let mut replayed = 0u64;
        self.wal.replay(replay_from, |entry| {
            self.apply_without_wal(entry);
            replayed += 1;
        })?;
        info!(replayed, "wal replay complete");

        self.metrics.games_active.set(self.games.len() as i64);
        self.metrics
            .expiration_queue_depth
            .set(self.queue.len() as i64);
        Ok(())
    }

    /// Spawns the expiration worker and the snapshot timer.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let expiration = ExpirationWorker::spawn(
            Arc::clone(&self.queue),
            Arc::clone(&self.games),
            Arc::clone(&self.metrics),
        )?;
        let snapshot_timer = {
            let manager = Arc::clone(self);
            thread::Builder::new()
                .name("snapshot-timer".into())
                .spawn(move || manager.snapshot_loop())?
        };
        *self.workers.lock() = Some(Workers {
            expiration,
            snapshot_timer,
        });
        Ok(())
    }

    /// Durably logs and applies one score entry.
    ///
    /// The WAL append happens first; a failed append leaves the in-memory
    /// state untouched. By the time this returns the entry is visible to
    /// readers.
    pub fn record_score(&self, entry: ScoreEntry) -> Result<()> {
        let started = Instant::now();
        let _gate = self.ingest_gate.read();

        let bytes = match self.wal.append(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.ingest_failures_total.inc();
                return Err(e);
            }
        };
        self.apply_without_wal(entry);

        self.metrics.scores_ingested_total.inc();
        self.metrics.wal_bytes_total.inc_by(bytes as u64);
        self.metrics
            .expiration_queue_depth
            .set(self.queue.len() as i64);
        self.metrics
            .ingest_duration
            .observe(started.elapsed().as_secs_f64());
        Ok(())
    }

    fn apply_without_wal(&self, entry: ScoreEntry) {
        let set = self.get_or_create_game(entry.game_id);
        set.apply(entry, now_millis(), |ticket| self.queue.push(ticket));
        self.max_applied_ts
            .fetch_max(entry.timestamp_ms, Ordering::SeqCst);
    }

    fn get_or_create_game(&self, game_id: u64) -> Arc<GameSet> {
        if let Some(set) = self.games.get(&game_id) {
            return Arc::clone(set.value());
        }
        // The entry API serializes first-time creation per game id, so at
        // most one set is ever created for it.
        let set = Arc::clone(
            self.games
                .entry(game_id)
                .or_insert_with(|| {
                    let set = GameSet::new(game_id);
                    for (key, duration) in &self.window_specs {
                        set.configure_window(key, *duration);
                    }
                    Arc::new(set)
                })
                .value(),
        );
        self.metrics.games_active.set(self.games.len() as i64);
        set
    }

    pub fn game(&self, game_id: u64) -> Option<Arc<GameSet>> {
        self.games.get(&game_id).map(|s| Arc::clone(s.value()))
    }

    pub fn games_count(&self) -> usize {
        self.games.len()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Writes a consistent snapshot of every game set and rotates the WAL.
    ///
    /// The ingest gate is held for write across the whole pass, including
    /// the rotation, so no record covered by the image can land in the WAL
    /// after the image and be lost to the archive.
    pub fn snapshot(&self) -> Result<()> {
        let _only_one = self.snapshot_lock.lock();
        let started = Instant::now();
        let _barrier = self.ingest_gate.write();

        let last_included = self.max_applied_ts.load(Ordering::SeqCst);
        let sets: Vec<Arc<GameSet>> = self.games.iter().map(|s| Arc::clone(s.value())).collect();
        snapshot::write_snapshot(
            &self.config.snapshot_path,
            &self.config.snapshot_tmp_path,
            &sets,
            last_included,
        )?;
        self.wal.rotate(&self.config.wal_archive_path)?;

        self.metrics.snapshots_total.inc();
        self.metrics
            .snapshot_duration
            .observe(started.elapsed().as_secs_f64());
        info!(
            games = sets.len(),
            last_included,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot complete"
        );
        Ok(())
    }

    fn snapshot_loop(&self) {
        let mut stopped = self.stop.lock();
        while !*stopped {
            let timed_out = self
                .stop_signal
                .wait_for(&mut stopped, self.config.snapshot_interval)
                .timed_out();
            if *stopped || !timed_out {
                continue;
            }
            drop(stopped);
            if let Err(e) = self.snapshot() {
                self.metrics.snapshot_failures_total.inc();
                error!("periodic snapshot failed: {e}");
            }
            stopped = self.stop.lock();
        }
    }

    /// Stops the background workers (expiration first, bounded join), then
    /// takes a final snapshot. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut stopped = self.stop.lock();
            if *stopped {
                return;
            }
            *stopped = true;
        }
        info!("leaderboard manager shutting down");
        self.stop_signal.notify_all();
        self.queue.stop();

        if let Some(workers) = self.workers.lock().take() {
            if !workers.expiration.join_timeout(WORKER_JOIN_TIMEOUT) {
                warn!(
                    "expiration worker did not stop within {:?}; abandoning it",
                    WORKER_JOIN_TIMEOUT
                );
            }
            let _ = workers.snapshot_timer.join();
        }

        if let Err(e) = self.snapshot() {
            self.metrics.snapshot_failures_total.inc();
            error!("final snapshot failed: {e}");
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
