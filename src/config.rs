//! Service configuration.

use crate::wal::Durability;
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration: persistence paths, snapshot cadence, durability
/// policy, and the window keys every game set is configured with.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Active WAL path.
    pub wal_path: PathBuf,
    /// Archive the WAL rotates into after a snapshot.
    pub wal_archive_path: PathBuf,
    /// Final snapshot path.
    pub snapshot_path: PathBuf,
    /// Temporary sibling the snapshot is written to before the atomic rename.
    pub snapshot_tmp_path: PathBuf,
    /// Interval between background snapshots.
    pub snapshot_interval: Duration,
    /// WAL append durability policy.
    pub durability: Durability,
    /// Window keys (e.g. `24h`, `1h`) configured on every game set.
    pub windows: Vec<String>,
}

impl EngineConfig {
    /// Config rooted at a data directory, with the default layout
    /// (`wal/scores`, `snapshot/leaderboard`) underneath it.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            wal_path: data_dir.join("wal/scores"),
            wal_archive_path: data_dir.join("wal/scores.archive"),
            snapshot_path: data_dir.join("snapshot/leaderboard"),
            snapshot_tmp_path: data_dir.join("snapshot/leaderboard.tmp"),
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wal_path: PathBuf::from("./data/wal/scores"),
            wal_archive_path: PathBuf::from("./data/wal/scores.archive"),
            snapshot_path: PathBuf::from("./data/snapshot/leaderboard"),
            snapshot_tmp_path: PathBuf::from("./data/snapshot/leaderboard.tmp"),
            snapshot_interval: Duration::from_secs(3600),
            durability: Durability::Flush,
            windows: vec!["24h".to_string()],
        }
    }
}

/// HTTP edge configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bind address.
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}
