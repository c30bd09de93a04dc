//! Sliding-window key grammar.
//!
//! A window key is a nonzero decimal count followed by a single unit suffix,
//! e.g. `24h` or `7d`. The accepted suffixes are `h m M d s S`; `M` passes
//! the grammar but maps to no duration, so it cannot be configured.

use std::time::Duration;

/// Checks a key against the window grammar (`[1-9][0-9]*[hmMdsS]`).
pub fn is_valid_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    if bytes.len() < 2 {
        return false;
    }
    let (digits, suffix) = bytes.split_at(bytes.len() - 1);
    matches!(suffix[0], b'h' | b'm' | b'M' | b'd' | b's' | b'S')
        && digits[0] != b'0'
        && digits.iter().all(|b| b.is_ascii_digit())
}

/// Parses a window key into its duration, or `None` when the key is outside
/// the grammar or uses a suffix with no duration mapping.
pub fn parse_duration(key: &str) -> Option<Duration> {
    if !is_valid_key(key) {
        return None;
    }
    let (count, suffix) = key.split_at(key.len() - 1);
    let n: u64 = count.parse().ok()?;
    let secs = match suffix {
        "s" | "S" => n,
        "m" => n * 60,
        "h" => n * 3600,
        "d" => n * 86_400,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}
