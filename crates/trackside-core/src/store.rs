//! Telemetry store
//!
//! Holds every channel's time series and the flag transition log behind a
//! single reader-writer lock. The pipeline driver is the only writer;
//! consumers poll [`TelemetryStore::snapshot`] for an owned, consistent copy.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::catalog::FLAG_FIELD;
use crate::record::NormalizedRecord;

/// Default number of flag events kept for consumers
pub const DEFAULT_FLAG_EVENT_LIMIT: usize = 10;

/// How many samples a series (or the flag log) keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Keep the whole session
    #[default]
    Unbounded,
    /// Keep only the most recent N entries
    Bounded(usize),
}

impl Retention {
    fn limit(&self) -> Option<usize> {
        match self {
            Retention::Unbounded => None,
            Retention::Bounded(n) => Some(*n),
        }
    }
}

/// One sample of a channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Record sequence number the sample came from
    pub index: u64,
    /// Physical value
    pub value: f64,
}

/// A change of the flag channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlagEvent {
    /// Record sequence number of the transition
    pub index: u64,
    /// New flag value
    pub value: f64,
}

/// Push onto a bounded deque, dropping the oldest entry on overflow
fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, retention: Retention) {
    if let Some(limit) = retention.limit() {
        if limit == 0 {
            return;
        }
        while buffer.len() >= limit {
            buffer.pop_front();
        }
    }
    buffer.push_back(item);
}

#[derive(Debug, Default)]
struct StoreState {
    series: BTreeMap<&'static str, VecDeque<Sample>>,
    flag_events: VecDeque<FlagEvent>,
    last_flag: Option<f64>,
    records: u64,
}

/// Shared, lock-protected telemetry buffer
#[derive(Debug)]
pub struct TelemetryStore {
    state: RwLock<StoreState>,
    retention: Retention,
    flag_retention: Retention,
}

impl TelemetryStore {
    /// Create a store with the given retention policies
    pub fn new(retention: Retention, flag_retention: Retention) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            retention,
            flag_retention,
        }
    }

    /// Sample retention policy
    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Flag event retention policy
    pub fn flag_retention(&self) -> Retention {
        self.flag_retention
    }

    /// Append one record atomically
    ///
    /// Every present channel gets one sample at the next record index. A
    /// flag event is logged when the flag differs from the previous flag
    /// value, or when it is the first flag seen. Returns the record index.
    pub fn append(&self, record: &NormalizedRecord) -> u64 {
        let mut state = self.state.write();
        let index = state.records;

        for value in record.values() {
            let series = state.series.entry(value.channel).or_default();
            push_bounded(
                series,
                Sample {
                    index,
                    value: value.value,
                },
                self.retention,
            );
        }

        if let Some(flag) = record.get(FLAG_FIELD) {
            if state.last_flag != Some(flag) {
                push_bounded(
                    &mut state.flag_events,
                    FlagEvent { index, value: flag },
                    self.flag_retention,
                );
            }
            state.last_flag = Some(flag);
        }

        state.records += 1;
        index
    }

    /// Take a consistent copy of everything in the store
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            series: state
                .series
                .iter()
                .map(|(name, samples)| (name.to_string(), samples.iter().copied().collect()))
                .collect(),
            flag_events: state.flag_events.iter().copied().collect(),
            records: state.records,
        }
    }

    /// Number of records appended so far
    pub fn records(&self) -> u64 {
        self.state.read().records
    }

    /// Drop all samples and events
    pub fn clear(&self) {
        *self.state.write() = StoreState::default();
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(
            Retention::Unbounded,
            Retention::Bounded(DEFAULT_FLAG_EVENT_LIMIT),
        )
    }
}

/// Read-only copy of the store at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Samples per channel, oldest first
    pub series: BTreeMap<String, Vec<Sample>>,
    /// Flag transitions, oldest first
    pub flag_events: Vec<FlagEvent>,
    /// Records appended when the snapshot was taken
    pub records: u64,
}

impl Snapshot {
    /// Samples of a channel
    pub fn channel(&self, name: &str) -> &[Sample] {
        self.series.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Values of a channel, oldest first
    pub fn values(&self, name: &str) -> Vec<f64> {
        self.channel(name).iter().map(|s| s.value).collect()
    }

    /// Number of retained samples for a channel
    pub fn len(&self, name: &str) -> usize {
        self.channel(name).len()
    }

    /// Check if no channel holds samples
    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// Most recent value of a channel
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.channel(name).last().map(|s| s.value)
    }

    /// Highest retained value of a channel
    pub fn max_value(&self, name: &str) -> Option<f64> {
        self.channel(name)
            .iter()
            .map(|s| s.value)
            .fold(None, |max, v| match max {
                Some(m) if m >= v => Some(m),
                _ => Some(v),
            })
    }
}
