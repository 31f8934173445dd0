//! Producer boundary: converts wire events into store mutations.
//!
//! Events identify the metric either by code or by name and carry the moment
//! either as tenths of a second or as a `{seconds, nanos}` timestamp. Unknown
//! metrics, negative amounts and missing moments are logged, counted and
//! dropped; they never reach the store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::error::{EventParseError, IngestError, UnknownMetricKind};
use crate::metric::MetricKind;
use crate::store::{Moment, PutOutcome, TimeSeriesStore};

/// Metric identifier as sent by a producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricRef {
    Code(i64),
    Name(String),
}

impl MetricRef {
    pub fn resolve(&self) -> Result<MetricKind, UnknownMetricKind> {
        match self {
            MetricRef::Code(code) => MetricKind::try_from(*code),
            MetricRef::Name(name) => name.parse(),
        }
    }
}

impl From<MetricKind> for MetricRef {
    fn from(kind: MetricKind) -> Self {
        MetricRef::Name(kind.name().to_string())
    }
}

/// Seconds plus nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolTimestamp {
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i32,
}

impl ProtocolTimestamp {
    /// Truncates to tenths of a second.
    pub fn to_moment(self) -> Moment {
        self.seconds
            .saturating_mul(10)
            .saturating_add(i64::from(self.nanos.div_euclid(100_000_000)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MomentRef {
    Tenths(Moment),
    Timestamp(ProtocolTimestamp),
}

impl MomentRef {
    pub fn to_moment(self) -> Moment {
        match self {
            MomentRef::Tenths(moment) => moment,
            MomentRef::Timestamp(ts) => ts.to_moment(),
        }
    }
}

/// One memory reading for one process and metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleEvent {
    pub pid: u32,
    pub metric: MetricRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moment: Option<MomentRef>,
    pub bytes: i64,
}

impl SampleEvent {
    pub fn new(pid: u32, kind: MetricKind, moment: Moment, bytes: i64) -> Self {
        Self {
            pid,
            metric: kind.into(),
            moment: Some(MomentRef::Tenths(moment)),
            bytes,
        }
    }
}

/// Full set of processes the producer currently knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownProcesses {
    pub pids: Vec<u32>,
}

/// Envelope used in recorded event files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProducerEvent {
    Sample(SampleEvent),
    KnownProcesses(KnownProcesses),
}

/// Counters kept by an [`Ingestor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub duplicates: u64,
    /// Samples too old for a full series.
    pub expired: u64,
    pub evicted: u64,
    pub rejected: u64,
    pub registered: u64,
    pub deleted: u64,
}

/// Processes touched by one `sync_known` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub registered: Vec<u32>,
    pub deleted: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct Ingestor {
    stats: IngestStats,
}

impl Ingestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Validates one sample and stores it.
    pub fn apply(
        &mut self,
        store: &mut TimeSeriesStore,
        event: &SampleEvent,
    ) -> Result<PutOutcome, IngestError> {
        match Self::put(store, event) {
            Ok(outcome) => {
                match outcome {
                    PutOutcome::Inserted { evicted } => {
                        self.stats.accepted += 1;
                        self.stats.evicted += evicted as u64;
                    }
                    PutOutcome::Duplicate => self.stats.duplicates += 1,
                    PutOutcome::Expired => self.stats.expired += 1,
                }
                Ok(outcome)
            }
            Err(e) => {
                self.stats.rejected += 1;
                warn!("dropping sample for pid {}: {}", event.pid, e);
                Err(e)
            }
        }
    }

    fn put(store: &mut TimeSeriesStore, event: &SampleEvent) -> Result<PutOutcome, IngestError> {
        let kind = event.metric.resolve()?;
        let moment = event
            .moment
            .ok_or(IngestError::MissingMoment { pid: event.pid })?
            .to_moment();
        Ok(store.put(event.pid, kind, moment, event.bytes)?)
    }

    /// Registers newly known processes and deletes the ones that vanished.
    pub fn sync_known(&mut self, store: &mut TimeSeriesStore, known: &KnownProcesses) -> SyncOutcome {
        let wanted: BTreeSet<u32> = known.pids.iter().copied().collect();
        let mut outcome = SyncOutcome::default();

        for pid in store.process_ids() {
            if !wanted.contains(&pid) && store.delete_process(pid) {
                outcome.deleted.push(pid);
            }
        }
        for &pid in &wanted {
            if store.register_process(pid) {
                outcome.registered.push(pid);
            }
        }

        self.stats.registered += outcome.registered.len() as u64;
        self.stats.deleted += outcome.deleted.len() as u64;
        if !outcome.registered.is_empty() || !outcome.deleted.is_empty() {
            debug!(
                "process set changed: {} registered, {} deleted",
                outcome.registered.len(),
                outcome.deleted.len()
            );
        }
        outcome
    }

    /// Applies one envelope event. Rejected samples are already logged and counted.
    pub fn apply_event(&mut self, store: &mut TimeSeriesStore, event: &ProducerEvent) {
        match event {
            ProducerEvent::Sample(sample) => {
                let _ = self.apply(store, sample);
            }
            ProducerEvent::KnownProcesses(known) => {
                self.sync_known(store, known);
            }
        }
    }
}

/// Parses a recorded event file: either a JSON array or one event per line.
pub fn parse_events(content: &str) -> Result<Vec<ProducerEvent>, EventParseError> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content).map_err(|source| EventParseError { line: 1, source });
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| EventParseError {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidSampleError;

    #[test]
    fn metric_ref_resolves_codes_and_names() {
        assert_eq!(MetricRef::Code(1).resolve(), Ok(MetricKind::Pss));
        assert_eq!(MetricRef::Name("uss".into()).resolve(), Ok(MetricKind::Uss));
        assert_eq!(MetricRef::Code(42).resolve(), Err(UnknownMetricKind::Code(42)));
    }

    #[test]
    fn protocol_timestamp_truncates_to_tenths() {
        let ts = ProtocolTimestamp {
            seconds: 12,
            nanos: 345_000_000,
        };
        assert_eq!(ts.to_moment(), 123);
        assert_eq!(MomentRef::Tenths(7).to_moment(), 7);
    }

    #[test]
    fn apply_counts_outcomes() {
        let mut store = TimeSeriesStore::with_capacity(2);
        let mut ingestor = Ingestor::new();

        for moment in 0..3 {
            let event = SampleEvent::new(1, MetricKind::Rss, moment, 2048);
            assert!(ingestor.apply(&mut store, &event).is_ok());
        }
        ingestor
            .apply(&mut store, &SampleEvent::new(1, MetricKind::Rss, 2, 4096))
            .unwrap();

        let stats = ingestor.stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(store.series_len(1, MetricKind::Rss), 2);

        let stale = SampleEvent::new(1, MetricKind::Rss, 0, 8192);
        assert_eq!(ingestor.apply(&mut store, &stale), Ok(PutOutcome::Expired));
        let stats = ingestor.stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.expired, 1);
        assert_eq!(store.series_len(1, MetricKind::Rss), 2);
    }

    #[test]
    fn invalid_events_are_rejected_without_touching_the_store() {
        let mut store = TimeSeriesStore::new();
        let mut ingestor = Ingestor::new();

        let unknown = SampleEvent {
            pid: 5,
            metric: MetricRef::Code(99),
            moment: Some(MomentRef::Tenths(0)),
            bytes: 10,
        };
        let err = ingestor.apply(&mut store, &unknown).unwrap_err();
        assert_eq!(err.reason(), "unknown_metric");

        let negative = SampleEvent::new(5, MetricKind::Rss, 0, -1);
        let err = ingestor.apply(&mut store, &negative).unwrap_err();
        assert_eq!(
            err,
            IngestError::InvalidSample(InvalidSampleError::NegativeAmount { pid: 5, bytes: -1 })
        );

        let no_moment = SampleEvent {
            moment: None,
            ..SampleEvent::new(5, MetricKind::Rss, 0, 1)
        };
        assert_eq!(
            ingestor.apply(&mut store, &no_moment),
            Err(IngestError::MissingMoment { pid: 5 })
        );

        assert!(!store.has_process(5));
        assert_eq!(ingestor.stats().rejected, 3);
    }

    #[test]
    fn sync_known_registers_and_deletes() {
        let mut store = TimeSeriesStore::new();
        let mut ingestor = Ingestor::new();
        store.put(1, MetricKind::Rss, 0, 1024).unwrap();
        store.put(2, MetricKind::Rss, 0, 1024).unwrap();

        let outcome = ingestor.sync_known(&mut store, &KnownProcesses { pids: vec![2, 3] });
        assert_eq!(outcome.deleted, vec![1]);
        assert_eq!(outcome.registered, vec![3]);
        assert!(store.has_process(3));
        assert!(!store.has_data(3));
        assert!(store.has_data(2));
        assert!(!store.has_process(1));
    }

    #[test]
    fn parses_json_lines_and_arrays() {
        let lines = r#"
{"type":"known_processes","pids":[10]}
{"type":"sample","pid":10,"metric":"RSS","moment":5,"bytes":2048}
{"type":"sample","pid":10,"metric":1,"moment":{"seconds":1,"nanos":0},"bytes":4096}
"#;
        let events = parse_events(lines).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            ProducerEvent::Sample(SampleEvent::new(10, MetricKind::Rss, 5, 2048))
        );
        match &events[2] {
            ProducerEvent::Sample(sample) => {
                assert_eq!(sample.metric, MetricRef::Code(1));
                assert_eq!(sample.moment.map(MomentRef::to_moment), Some(10));
            }
            other => panic!("unexpected event {other:?}"),
        }

        let array = r#"[{"type":"sample","pid":1,"metric":"PSS","moment":0,"bytes":1}]"#;
        assert_eq!(parse_events(array).unwrap().len(), 1);
    }

    #[test]
    fn parse_error_reports_line() {
        let err = parse_events("{\"type\":\"known_processes\",\"pids\":[]}\nnot json\n").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
