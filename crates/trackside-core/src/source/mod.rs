//! Ingestion sources
//!
//! A source produces raw records in arrival order. The live source never
//! ends on its own; the replay source ends after the last log row.

mod live;
mod replay;

pub use live::{LiveSource, DEFAULT_MAX_DATAGRAM_SIZE};
pub use replay::ReplaySource;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SourceError;
use crate::record::RawRecord;

/// Which kind of source feeds the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceKind {
    /// Network datagrams
    Live,
    /// Rows of a recorded session log
    Replay,
}

/// Producer of raw records
///
/// `next_record` must be cancel safe: dropping its future between records
/// loses nothing that was already returned.
#[async_trait]
pub trait RecordSource: Send {
    /// Kind of this source
    fn kind(&self) -> SourceKind;

    /// Wait for the next record
    ///
    /// `Ok(None)` means the source is exhausted.
    async fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError>;

    /// Payloads dropped because they could not be parsed
    fn rejected(&self) -> u64 {
        0
    }
}

#[async_trait]
impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    async fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        (**self).next_record().await
    }

    fn rejected(&self) -> u64 {
        (**self).rejected()
    }
}
