//! Durable session logger
//!
//! Appends one row per ingested record to a new CSV file per session.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use super::format::{encode_row, LOG_EXTENSION};
use crate::catalog::Catalog;
use crate::error::LogError;
use crate::record::{NormalizedRecord, RawRecord};

/// Prefix of every session log file name
pub const SESSION_PREFIX: &str = "telemetry_data_";

/// Collision suffixes tried before giving up
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Session log file name for a session start time
pub fn session_file_name(started: NaiveDateTime) -> String {
    format!(
        "{}{}.{}",
        SESSION_PREFIX,
        started.format("%Y%m%d_%H%M%S"),
        LOG_EXTENSION
    )
}

/// Append-only CSV session log
pub struct DurableLogger {
    /// Log file path
    path: PathBuf,
    /// CSV writer over the log file
    writer: csv::Writer<File>,
    /// Catalog defining the column layout
    catalog: Arc<Catalog>,
    /// Rows written, excluding the header
    rows: u64,
    /// Whether each row is synced to disk
    sync_each_row: bool,
}

impl DurableLogger {
    /// Create a new session log in `dir` named after `started`
    ///
    /// The directory is created if needed. An existing file is never
    /// reused; a numeric suffix is added instead.
    pub fn create<P: AsRef<Path>>(
        dir: P,
        catalog: Arc<Catalog>,
        started: NaiveDateTime,
    ) -> Result<Self, LogError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| LogError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let base = session_file_name(started);
        let stem = base.trim_end_matches(&format!(".{}", LOG_EXTENSION)).to_string();

        let mut path = dir.join(&base);
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            match Self::create_at(&path, Arc::clone(&catalog)) {
                Err(LogError::CreateFile { source, .. })
                    if source.kind() == io::ErrorKind::AlreadyExists =>
                {
                    debug!(path = %path.display(), "session log exists, trying next name");
                    path = dir.join(format!("{}_{}.{}", stem, attempt, LOG_EXTENSION));
                }
                other => return other,
            }
        }

        Err(LogError::CreateFile {
            path,
            source: io::Error::new(io::ErrorKind::AlreadyExists, "no free session log name"),
        })
    }

    /// Create a session log at an exact path and write its header
    ///
    /// Fails if the file already exists.
    pub fn create_at<P: AsRef<Path>>(path: P, catalog: Arc<Catalog>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| LogError::CreateFile {
                path: path.clone(),
                source,
            })?;

        let mut logger = Self::from_file(path, file, catalog);
        logger.writer.write_record(logger.catalog.log_columns())?;
        logger.writer.flush()?;

        info!(
            path = %logger.path.display(),
            columns = logger.catalog.len() + 4,
            "created session log"
        );
        Ok(logger)
    }

    /// Wrap an already opened log file without writing a header
    pub(crate) fn from_file(path: PathBuf, file: File, catalog: Arc<Catalog>) -> Self {
        Self {
            path,
            writer: csv::Writer::from_writer(file),
            catalog,
            rows: 0,
            sync_each_row: false,
        }
    }

    /// Sync every row to disk, not just flush it to the OS
    pub fn with_sync_each_row(mut self, sync: bool) -> Self {
        self.sync_each_row = sync;
        self
    }

    /// Append one row
    ///
    /// The row is flushed before returning, so an error here means the
    /// record was not logged.
    pub fn append(&mut self, record: &NormalizedRecord, raw: &RawRecord) -> Result<(), LogError> {
        let row = encode_row(&self.catalog, record, raw);
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        if self.sync_each_row {
            self.writer.get_ref().sync_data()?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of data rows written
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// The catalog defining the column layout
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}

impl std::fmt::Debug for DurableLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableLogger")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .field("sync_each_row", &self.sync_each_row)
            .finish()
    }
}
