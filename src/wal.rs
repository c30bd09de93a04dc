//! Write-ahead log of score mutations.
//!
//! One textual record per line, newline terminated:
//! `timestamp_ms,game_id,user_id,score`. Appends go through a buffered
//! writer and are flushed to the OS before returning; the sync policy
//! optionally forces them to durable media as well.

use crate::entry::ScoreEntry;
use crate::error::{PodiumError, Result};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Durability policy for WAL appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Flush to the OS page cache. Survives a process crash, not a host
    /// crash; records since the last OS flush may be lost.
    Flush,
    /// Flush and fsync every append. Survives a host crash at a significant
    /// throughput cost.
    Sync,
}

pub struct WriteAheadLog {
    path: PathBuf,
    durability: Durability,
    writer: Mutex<BufWriter<File>>,
}

impl WriteAheadLog {
    /// Opens the active log for appends, creating it (and its parent
    /// directories) if needed.
    pub fn open(path: impl Into<PathBuf>, durability: Durability) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            durability,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and returns its encoded length in bytes.
    ///
    /// Appends are serialized by the writer lock, so log order equals the
    /// order in which successful ingests return to their callers.
    pub fn append(&self, entry: &ScoreEntry) -> Result<usize> {
        let record = format!(
            "{},{},{},{}\n",
            entry.timestamp_ms, entry.game_id, entry.user_id, entry.score
        );
        let mut writer = self.writer.lock();
        writer.write_all(record.as_bytes())?;
        writer.flush()?;
        if self.durability == Durability::Sync {
            writer.get_ref().sync_data()?;
        }
        Ok(record.len())
    }

    /// Replays records with `timestamp_ms >= from_ts` in append order.
    /// A malformed line aborts recovery.
    pub fn replay<F: FnMut(ScoreEntry)>(&self, from_ts: i64, mut apply: F) -> Result<()> {
        let file = File::open(&self.path)?;
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let entry = parse_record(&line).ok_or_else(|| {
                PodiumError::corruption(format!("malformed wal record at line {}", lineno + 1))
            })?;
            if entry.timestamp_ms >= from_ts {
                apply(entry);
            }
        }
        Ok(())
    }

    /// Archives the active log under `archive` (replacing any prior archive)
    /// and starts a fresh active log. The caller must have completed a
    /// snapshot covering the archived records.
    pub fn rotate(&self, archive: &Path) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_data()?;
        fs::rename(&self.path, archive)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        *writer = BufWriter::new(file);
        Ok(())
    }
}

fn parse_record(line: &str) -> Option<ScoreEntry> {
    let mut fields = line.split(',');
    let timestamp_ms = fields.next()?.parse().ok()?;
    let game_id = fields.next()?.parse().ok()?;
    let user_id = fields.next()?.parse().ok()?;
    let score = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(ScoreEntry {
        user_id,
        game_id,
        score,
        timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(user_id: u64, score: i64, timestamp_ms: i64) -> ScoreEntry {
        ScoreEntry::new(user_id, 7, score, timestamp_ms)
    }

    #[test]
    fn test_append_and_replay() {
        let dir = tempdir().unwrap();
        let wal = WriteAheadLog::open(dir.path().join("scores"), Durability::Flush).unwrap();

        wal.append(&entry(1, 100, 1000)).unwrap();
        wal.append(&entry(2, 200, 2000)).unwrap();
        wal.append(&entry(3, 300, 3000)).unwrap();

        let mut replayed = Vec::new();
        wal.replay(0, |e| replayed.push(e)).unwrap();
        assert_eq!(replayed.len(), 3);
        assert_eq!(replayed[0], entry(1, 100, 1000));
        assert_eq!(replayed[2], entry(3, 300, 3000));
    }

    #[test]
    fn test_replay_from_timestamp() {
        let dir = tempdir().unwrap();
        let wal = WriteAheadLog::open(dir.path().join("scores"), Durability::Flush).unwrap();
        wal.append(&entry(1, 100, 1000)).unwrap();
        wal.append(&entry(2, 200, 2000)).unwrap();

        let mut replayed = Vec::new();
        wal.replay(2000, |e| replayed.push(e)).unwrap();
        assert_eq!(replayed, vec![entry(2, 200, 2000)]);
    }

    #[test]
    fn test_record_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores");
        let wal = WriteAheadLog::open(&path, Durability::Sync).unwrap();
        wal.append(&ScoreEntry::new(11, 7, 250, 99)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "99,7,11,250\n");
    }

    #[test]
    fn test_malformed_line_aborts_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores");
        fs::write(&path, "1000,7,1,100\nnot-a-record\n").unwrap();

        let wal = WriteAheadLog::open(&path, Durability::Flush).unwrap();
        let err = wal.replay(0, |_| {}).unwrap_err();
        assert!(matches!(err, PodiumError::RecoveryCorruption { .. }));
    }

    #[test]
    fn test_extra_field_is_malformed() {
        assert!(parse_record("1,2,3,4,5").is_none());
        assert!(parse_record("1,2,3").is_none());
        assert!(parse_record("").is_none());
        assert_eq!(
            parse_record("1000,7,1,100"),
            Some(ScoreEntry::new(1, 7, 100, 1000))
        );
    }

    #[test]
    fn test_rotate_archives_and_resets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores");
        let archive = dir.path().join("scores.archive");
        let wal = WriteAheadLog::open(&path, Durability::Flush).unwrap();

        wal.append(&entry(1, 100, 1000)).unwrap();
        wal.rotate(&archive).unwrap();

        assert_eq!(fs::read_to_string(&archive).unwrap(), "1000,7,1,100\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        // Appends continue on the fresh active log.
        wal.append(&entry(2, 200, 2000)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "2000,7,2,200\n");

        // A second rotation replaces the prior archive.
        wal.rotate(&archive).unwrap();
        assert_eq!(fs::read_to_string(&archive).unwrap(), "2000,7,2,200\n");
    }
}
