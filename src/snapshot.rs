//! Point-in-time snapshots of every game's views.
//!
//! The on-disk format is an explicit little-endian schema, not a serializer
//! dump, so it survives reimplementation:
//!
//! ```text
//! magic (u64, "PODSNAP1") | version (u32) | last_included_timestamp_ms (i64)
//! game_count (u32)
//!   game_id (u64)
//!   all_time entry_count (u32) | entries...
//!   window_count (u32)
//!     key_len (u16) | key (utf-8) | duration_ms (i64)
//!     entry_count (u32) | entries...
//! ```
//!
//! Each entry is `user_id (u64) | score (i64) | timestamp_ms (i64)`; the
//! game id comes from the enclosing record. The snapshot is written to a
//! temporary sibling, flushed, fsynced, then atomically renamed over the
//! final path. A failed write removes the temporary file and leaves the
//! prior snapshot untouched.

use crate::error::{PodiumError, Result};
use crate::game::GameSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const MAGIC: u64 = u64::from_le_bytes(*b"PODSNAP1");
const VERSION: u32 = 1;

/// State reconstructed from a snapshot file.
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub last_included_timestamp_ms: i64,
    pub games: Vec<GameSet>,
}

/// Writes a snapshot of `games` to `path` via `tmp_path`, atomically.
pub fn write_snapshot(
    path: &Path,
    tmp_path: &Path,
    games: &[Arc<GameSet>],
    last_included_timestamp_ms: i64,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let result = write_to_tmp(tmp_path, games, last_included_timestamp_ms)
        .and_then(|_| fs::rename(tmp_path, path).map_err(PodiumError::from));
    if result.is_err() {
        let _ = fs::remove_file(tmp_path);
    }
    result
}

fn write_to_tmp(
    tmp_path: &Path,
    games: &[Arc<GameSet>],
    last_included_timestamp_ms: i64,
) -> Result<()> {
    let file = File::create(tmp_path)?;
    let mut w = BufWriter::new(file);

    w.write_all(&MAGIC.to_le_bytes())?;
    w.write_all(&VERSION.to_le_bytes())?;
    w.write_all(&last_included_timestamp_ms.to_le_bytes())?;
    w.write_all(&(games.len() as u32).to_le_bytes())?;

    for set in games {
        w.write_all(&set.game_id().to_le_bytes())?;
        write_entries(&mut w, &set.all_time().entries())?;

        let windows = set.windows_snapshot();
        w.write_all(&(windows.len() as u32).to_le_bytes())?;
        for (key, duration_ms, entries) in windows {
            w.write_all(&(key.len() as u16).to_le_bytes())?;
            w.write_all(key.as_bytes())?;
            w.write_all(&duration_ms.to_le_bytes())?;
            write_entries(&mut w, &entries)?;
        }
    }

    w.flush()?;
    w.get_ref().sync_all()?;
    Ok(())
}

fn write_entries(w: &mut impl Write, entries: &[crate::entry::ScoreEntry]) -> Result<()> {
    w.write_all(&(entries.len() as u32).to_le_bytes())?;
    for entry in entries {
        w.write_all(&entry.user_id.to_le_bytes())?;
        w.write_all(&entry.score.to_le_bytes())?;
        w.write_all(&entry.timestamp_ms.to_le_bytes())?;
    }
    Ok(())
}

/// Loads the snapshot at `path`, or `None` when no snapshot exists.
/// A truncated or unreadable snapshot is a recovery corruption.
pub fn load_snapshot(path: &Path) -> Result<Option<LoadedSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path)?;
    match read_all(&mut BufReader::new(file)) {
        Ok(loaded) => Ok(Some(loaded)),
        Err(PodiumError::Persistence(e))
            if matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData
            ) =>
        {
            Err(PodiumError::corruption(format!("unreadable snapshot: {e}")))
        }
        Err(e) => Err(e),
    }
}

fn read_all(r: &mut impl Read) -> Result<LoadedSnapshot> {
    if read_u64(r)? != MAGIC {
        return Err(PodiumError::corruption("bad snapshot magic"));
    }
    let version = read_u32(r)?;
    if version != VERSION {
        return Err(PodiumError::corruption(format!(
            "unsupported snapshot version {version}"
        )));
    }
    let last_included_timestamp_ms = read_i64(r)?;

    let game_count = read_u32(r)?;
    let mut games = Vec::with_capacity(game_count as usize);
    for _ in 0..game_count {
        let game_id = read_u64(r)?;
        let set = GameSet::new(game_id);

        for entry in read_entries(r, game_id)? {
            set.all_time().add_or_update(entry);
        }

        let window_count = read_u32(r)?;
        for _ in 0..window_count {
            let key = read_string(r)?;
            let duration_ms = read_i64(r)?;
            set.configure_window(&key, Duration::from_millis(duration_ms.max(0) as u64));
            let view = set
                .view(Some(&key))
                .ok_or_else(|| PodiumError::corruption("window vanished during load"))?;
            for entry in read_entries(r, game_id)? {
                view.add_or_update(entry);
            }
        }
        games.push(set);
    }

    Ok(LoadedSnapshot {
        last_included_timestamp_ms,
        games,
    })
}

fn read_entries(r: &mut impl Read, game_id: u64) -> Result<Vec<crate::entry::ScoreEntry>> {
    let count = read_u32(r)?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let user_id = read_u64(r)?;
        let score = read_i64(r)?;
        let timestamp_ms = read_i64(r)?;
        entries.push(crate::entry::ScoreEntry {
            user_id,
            game_id,
            score,
            timestamp_ms,
        });
    }
    Ok(entries)
}

fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_i64(r: &mut impl Read) -> Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u16(r: &mut impl Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_string(r: &mut impl Read) -> Result<String> {
    let len = read_u16(r)?;
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| PodiumError::corruption("non-utf8 window key"))
}
