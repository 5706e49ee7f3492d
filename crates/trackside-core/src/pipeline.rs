//! Pipeline driver
//!
//! Pulls raw records from one source, decodes them, appends them to the
//! store and, for live sessions, to the session log. The driver is the only
//! writer of the store; consumers read it through snapshots.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::config::{PipelineConfig, SourceConfig};
use crate::datalog::DurableLogger;
use crate::decode::{FieldIssue, IssueKind, RecordDecoder};
use crate::error::PipelineError;
use crate::record::RawRecord;
use crate::source::{LiveSource, RecordSource, ReplaySource, SourceKind};
use crate::store::TelemetryStore;

/// Counters reported when the driver stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    /// Records appended to the store
    pub records: u64,
    /// Rows written to the session log
    pub logged: u64,
    /// Payloads the source could not parse
    pub rejected_payloads: u64,
    /// Fields dropped while decoding
    pub dropped_fields: u64,
    /// Whether the run ended on a shutdown request
    pub cancelled: bool,
}

/// Single-writer ingestion loop
pub struct PipelineDriver<S = Box<dyn RecordSource>> {
    source: S,
    decoder: RecordDecoder,
    store: Arc<TelemetryStore>,
    logger: Option<DurableLogger>,
}

impl<S: RecordSource> PipelineDriver<S> {
    /// Create a driver without a session log
    pub fn new(source: S, decoder: RecordDecoder, store: Arc<TelemetryStore>) -> Self {
        Self {
            source,
            decoder,
            store,
            logger: None,
        }
    }

    /// Attach a session log
    ///
    /// Ignored for replay sources, which never re-log.
    pub fn with_logger(mut self, logger: DurableLogger) -> Self {
        if self.source.kind() == SourceKind::Replay {
            warn!(path = %logger.path().display(), "replay sessions are not logged, ignoring logger");
        } else {
            self.logger = Some(logger);
        }
        self
    }

    /// The store this driver writes to
    pub fn store(&self) -> Arc<TelemetryStore> {
        Arc::clone(&self.store)
    }

    /// Path of the attached session log
    pub fn log_path(&self) -> Option<&Path> {
        self.logger.as_ref().map(DurableLogger::path)
    }

    /// Run until the source ends or `shutdown` is cancelled
    ///
    /// Shutdown is only observed between records, so a record is either
    /// fully stored and logged or not touched at all. A session log write
    /// failure stops the pipeline instead of ingesting unlogged records.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<PipelineSummary, PipelineError> {
        let mut summary = PipelineSummary::default();
        let kind = self.source.kind();
        debug!(?kind, logging = self.logger.is_some(), "pipeline started");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping pipeline");
                    summary.cancelled = true;
                    break;
                }
                next = self.source.next_record() => next?,
            };

            let Some(raw) = next else {
                break;
            };
            self.ingest(&raw, &mut summary)?;
        }

        summary.rejected_payloads = self.source.rejected();
        info!(
            records = summary.records,
            logged = summary.logged,
            rejected = summary.rejected_payloads,
            dropped_fields = summary.dropped_fields,
            "pipeline stopped"
        );
        Ok(summary)
    }

    fn ingest(&mut self, raw: &RawRecord, summary: &mut PipelineSummary) -> Result<(), PipelineError> {
        let (record, issues) = self.decoder.decode_with_issues(raw);
        for issue in &issues {
            report_issue(issue);
        }
        summary.dropped_fields += issues
            .iter()
            .filter(|i| i.kind != IssueKind::MissingGps)
            .count() as u64;

        // Logged first, so a record that failed to log never reaches the store
        if let Some(logger) = self.logger.as_mut() {
            if let Err(e) = logger.append(&record, raw) {
                error!(path = %logger.path().display(), error = %e, "session log write failed, halting ingestion");
                return Err(e.into());
            }
            summary.logged += 1;
        }

        self.store.append(&record);
        summary.records += 1;
        Ok(())
    }
}

fn report_issue(issue: &FieldIssue) {
    let raw = issue.raw.as_deref().unwrap_or("");
    match issue.kind {
        IssueKind::MalformedGps => {
            warn!(field = %issue.field, raw, "malformed GPS coordinates, skipping")
        }
        IssueKind::Unparsable => debug!(field = %issue.field, raw, "unparsable field, skipping"),
        IssueKind::MissingGps => debug!("record carries no GPS coordinates"),
    }
}

/// A driver assembled from a [`PipelineConfig`]
pub struct Pipeline {
    driver: PipelineDriver,
    listen_addr: Option<SocketAddr>,
}

impl Pipeline {
    /// Open the source and, for live sessions, create the session log
    ///
    /// Socket bind and log creation failures are returned here, before any
    /// record is ingested.
    pub async fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let catalog = Arc::new(Catalog::new(config.catalog));
        let decoder = RecordDecoder::new(Arc::clone(&catalog));
        let store = Arc::new(TelemetryStore::new(config.retention, config.flag_retention));

        match &config.source {
            SourceConfig::Live {
                bind_addr,
                port,
                max_datagram_size,
            } => {
                let source =
                    LiveSource::bind(SocketAddr::new(*bind_addr, *port), *max_datagram_size).await?;
                let listen_addr = source.local_addr().ok();
                let logger = DurableLogger::create(
                    &config.log_dir,
                    Arc::clone(&catalog),
                    Local::now().naive_local(),
                )?
                .with_sync_each_row(config.sync_each_row);

                let source: Box<dyn RecordSource> = Box::new(source);
                Ok(Self {
                    driver: PipelineDriver::new(source, decoder, store).with_logger(logger),
                    listen_addr,
                })
            }
            SourceConfig::Replay { path, .. } => {
                let source: Box<dyn RecordSource> =
                    Box::new(ReplaySource::open(path, config.source.pacing())?);
                info!(path = %path.display(), "replaying session log");
                Ok(Self {
                    driver: PipelineDriver::new(source, decoder, store),
                    listen_addr: None,
                })
            }
        }
    }

    /// The store consumers should snapshot
    pub fn store(&self) -> Arc<TelemetryStore> {
        self.driver.store()
    }

    /// Bound address of a live source
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen_addr
    }

    /// Path of the session log, for live sessions
    pub fn log_path(&self) -> Option<PathBuf> {
        self.driver.log_path().map(Path::to_path_buf)
    }

    /// Run on the current task
    pub async fn run(self, shutdown: CancellationToken) -> Result<PipelineSummary, PipelineError> {
        self.driver.run(shutdown).await
    }

    /// Run on its own task
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<Result<PipelineSummary, PipelineError>> {
        tokio::spawn(self.run(shutdown))
    }
}
