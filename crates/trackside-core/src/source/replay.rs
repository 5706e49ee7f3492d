//! Replay source
//!
//! Reads a recorded session log row by row, optionally pacing records to
//! emulate the original arrival rate.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{RecordSource, SourceKind};
use crate::datalog::decode_row;
use crate::error::SourceError;
use crate::record::RawRecord;

/// Sequential reader over a session log
pub struct ReplaySource {
    path: PathBuf,
    reader: csv::Reader<File>,
    headers: Vec<String>,
    row: csv::StringRecord,
    pacing: Option<Duration>,
    rows: u64,
    pending: bool,
    finished: bool,
}

impl ReplaySource {
    /// Open a session log
    ///
    /// `pacing` is the delay inserted between consecutive records; `None`
    /// replays as fast as possible.
    pub fn open<P: AsRef<Path>>(path: P, pacing: Option<Duration>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(|source| SourceError::Open {
                path: path.clone(),
                source,
            })?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(SourceError::MissingHeader(path));
        }
        debug!(path = %path.display(), columns = headers.len(), "opened session log");

        Ok(Self {
            path,
            reader,
            headers,
            row: csv::StringRecord::new(),
            pacing: pacing.filter(|d| !d.is_zero()),
            rows: 0,
            pending: false,
            finished: false,
        })
    }

    /// Path of the log being replayed
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names from the header row
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows produced so far
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

#[async_trait]
impl RecordSource for ReplaySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Replay
    }

    async fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        if self.finished {
            return Ok(None);
        }

        // A row read before a cancelled pacing delay is kept for the next call
        if !self.pending {
            if !self.reader.read_record(&mut self.row)? {
                self.finished = true;
                info!(path = %self.path.display(), rows = self.rows, "replay finished");
                return Ok(None);
            }
            self.pending = true;
        }

        if let Some(delay) = self.pacing {
            if self.rows > 0 {
                tokio::time::sleep(delay).await;
            }
        }

        self.pending = false;
        self.rows += 1;
        Ok(Some(decode_row(&self.headers, self.row.iter())))
    }
}

impl std::fmt::Debug for ReplaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySource")
            .field("path", &self.path)
            .field("pacing", &self.pacing)
            .field("rows", &self.rows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_log(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_replay_rows_in_order() {
        let file = write_log(
            "timestamp,Car_Speed,Flag\n\
             2024-06-01T10:00:00.000000,10,0\n\
             2024-06-01T10:00:01.000000,20,1\n",
        );
        let mut source = ReplaySource::open(file.path(), None).unwrap();

        let first = source.next_record().await.unwrap().unwrap();
        let second = source.next_record().await.unwrap().unwrap();
        assert_eq!(first.get("Car_Speed").and_then(|v| v.as_f64()), Some(10.0));
        assert_eq!(second.get("Flag").and_then(|v| v.as_f64()), Some(1.0));
        assert!(first.timestamp < second.timestamp);

        assert!(source.next_record().await.unwrap().is_none());
        assert!(source.next_record().await.unwrap().is_none());
        assert_eq!(source.rows(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_pacing() {
        let file = write_log("timestamp,Car_Speed\nx,1\nx,2\nx,3\n");
        let mut source =
            ReplaySource::open(file.path(), Some(Duration::from_secs(1))).unwrap();

        let start = tokio::time::Instant::now();
        while source.next_record().await.unwrap().is_some() {}
        // No delay before the first record or after the last
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReplaySource::open(dir.path().join("missing.csv"), None);
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }

    #[test]
    fn test_empty_file_has_no_header() {
        let file = write_log("");
        let result = ReplaySource::open(file.path(), None);
        assert!(matches!(result, Err(SourceError::MissingHeader(_))));
    }
}
