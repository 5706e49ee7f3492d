//! Data Logging
//!
//! Writes live sessions to CSV and finds previously recorded sessions for
//! replay.

pub mod format;
mod recorder;

pub use format::{decode_row, encode_row, is_session_log};
pub use recorder::{session_file_name, DurableLogger, SESSION_PREFIX};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// List session logs in a directory, sorted by file name
///
/// Session names embed their start time, so this is also chronological.
/// A missing directory yields an empty list.
pub fn list_sessions<P: AsRef<Path>>(dir: P) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir.as_ref()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut sessions = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_session_log(&path) {
            sessions.push(path);
        }
    }
    sessions.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(sessions)
}
