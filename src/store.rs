//! Bounded multi-series time store.
//!
//! Holds one series per `(pid, MetricKind)` pair. Every series is strictly
//! ordered by moment with unique moments and never grows beyond the store
//! capacity; the oldest samples are evicted first. Per-process extrema are
//! maintained incrementally and always describe the samples still retained.

use ahash::AHashMap as HashMap;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, trace};

use crate::error::InvalidSampleError;
use crate::metric::MetricKind;

/// Timestamp in tenths of a second.
pub type Moment = i64;

/// Default number of samples retained per series.
pub const DEFAULT_SERIES_CAPACITY: usize = 10_000;

/// Converts bytes to kilobytes, rounding half up.
pub fn bytes_to_kb(bytes: u64) -> u64 {
    bytes / 1024 + u64::from(bytes % 1024 >= 512)
}

/// One retained point of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub moment: Moment,
    pub kb: u64,
}

impl Sample {
    pub fn new(moment: Moment, kb: u64) -> Self {
        Self { moment, kb }
    }
}

/// Time and amount bounds across all series of one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessExtrema {
    pub min_moment: Moment,
    pub max_moment: Moment,
    pub max_kb: i64,
}

impl ProcessExtrema {
    /// Sentinel state of a process without samples.
    pub const EMPTY: ProcessExtrema = ProcessExtrema {
        min_moment: Moment::MAX,
        max_moment: Moment::MIN,
        max_kb: -1,
    };

    pub fn has_data(&self) -> bool {
        self.max_kb >= 0 && self.min_moment <= self.max_moment
    }

    fn observe(&mut self, sample: Sample) {
        self.min_moment = self.min_moment.min(sample.moment);
        self.max_moment = self.max_moment.max(sample.moment);
        self.max_kb = self.max_kb.max(kb_as_i64(sample.kb));
    }
}

/// Immutable copy of one non-empty series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesSnapshot {
    pub kind: MetricKind,
    pub points: Vec<Sample>,
}

impl SeriesSnapshot {
    pub fn last(&self) -> Option<&Sample> {
        self.points.last()
    }
}

/// Result of a successful `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Sample stored; `evicted` samples were dropped across the process.
    Inserted { evicted: usize },
    /// A sample with the same moment already exists; nothing changed.
    Duplicate,
    /// The series is full and the sample predates its oldest point; nothing changed.
    Expired,
}

fn kb_as_i64(kb: u64) -> i64 {
    i64::try_from(kb).unwrap_or(i64::MAX)
}

/// Samples removed by a trim step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Trim {
    removed: usize,
    max_removed_kb: i64,
}

impl Trim {
    const NONE: Trim = Trim {
        removed: 0,
        max_removed_kb: -1,
    };

    fn merge(self, other: Trim) -> Trim {
        Trim {
            removed: self.removed + other.removed,
            max_removed_kb: self.max_removed_kb.max(other.max_removed_kb),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Series {
    points: VecDeque<Sample>,
}

impl Series {
    /// Inserts in chronological position; returns false for a known moment.
    fn insert(&mut self, sample: Sample) -> bool {
        match self.points.back() {
            None => {
                self.points.push_back(sample);
                true
            }
            Some(last) if last.moment < sample.moment => {
                self.points.push_back(sample);
                true
            }
            Some(last) if last.moment == sample.moment => false,
            Some(_) => match self.points.binary_search_by_key(&sample.moment, |p| p.moment) {
                Ok(_) => false,
                Err(idx) => {
                    self.points.insert(idx, sample);
                    true
                }
            },
        }
    }

    /// Drops the oldest samples until at most `capacity` remain.
    fn trim_to_capacity(&mut self, capacity: usize) -> Trim {
        let overflow = self.points.len().saturating_sub(capacity);
        if overflow == 0 {
            return Trim::NONE;
        }
        let mut trim = Trim::NONE;
        for sample in self.points.drain(..overflow) {
            trim.removed += 1;
            trim.max_removed_kb = trim.max_removed_kb.max(kb_as_i64(sample.kb));
        }
        trim
    }

    /// Drops leading samples strictly older than `moment`.
    fn drop_before(&mut self, moment: Moment) -> Trim {
        let mut trim = Trim::NONE;
        while let Some(first) = self.points.front() {
            if first.moment >= moment {
                break;
            }
            trim.removed += 1;
            trim.max_removed_kb = trim.max_removed_kb.max(kb_as_i64(first.kb));
            self.points.pop_front();
        }
        trim
    }

    fn first_moment(&self) -> Option<Moment> {
        self.points.front().map(|p| p.moment)
    }

    fn last_moment(&self) -> Option<Moment> {
        self.points.back().map(|p| p.moment)
    }

    fn max_kb(&self) -> Option<u64> {
        self.points.iter().map(|p| p.kb).max()
    }
}

#[derive(Debug, Clone)]
struct ProcessSeries {
    series: BTreeMap<MetricKind, Series>,
    extrema: ProcessExtrema,
}

impl ProcessSeries {
    fn new() -> Self {
        Self {
            series: BTreeMap::new(),
            extrema: ProcessExtrema::EMPTY,
        }
    }

    fn has_data(&self) -> bool {
        self.series.values().any(|s| !s.points.is_empty())
    }

    fn insert(&mut self, kind: MetricKind, sample: Sample, capacity: usize) -> PutOutcome {
        let series = self.series.entry(kind).or_default();
        if series.points.len() >= capacity
            && series.first_moment().is_some_and(|front| sample.moment < front)
        {
            return PutOutcome::Expired;
        }
        if !series.insert(sample) {
            return PutOutcome::Duplicate;
        }
        self.extrema.observe(sample);

        let evicted = self.evict(kind, capacity);
        PutOutcome::Inserted { evicted }
    }

    /// Trims `kind` to capacity, aligns its siblings and repairs the extrema.
    fn evict(&mut self, kind: MetricKind, capacity: usize) -> usize {
        let Some(series) = self.series.get_mut(&kind) else {
            return 0;
        };
        let trimmed = series.trim_to_capacity(capacity);
        if trimmed.removed == 0 {
            return 0;
        }
        let front = series.first_moment();

        let aligned = match front {
            Some(front) => self.align_siblings(kind, front),
            None => Trim::NONE,
        };
        let total = trimmed.merge(aligned);

        self.recompute_moments();
        if total.max_removed_kb >= self.extrema.max_kb {
            self.recompute_max_kb();
        }

        trace!(
            "evicted {} samples ({} from {}, {} from siblings)",
            total.removed,
            trimmed.removed,
            kind,
            aligned.removed
        );
        total.removed
    }

    /// Clips every series except `trimmed` so none starts before `front`.
    fn align_siblings(&mut self, trimmed: MetricKind, front: Moment) -> Trim {
        let mut total = Trim::NONE;
        for (kind, series) in self.series.iter_mut() {
            if *kind == trimmed {
                continue;
            }
            total = total.merge(series.drop_before(front));
        }
        self.series.retain(|_, s| !s.points.is_empty());
        total
    }

    fn recompute_moments(&mut self) {
        let min = self.series.values().filter_map(Series::first_moment).min();
        let max = self.series.values().filter_map(Series::last_moment).max();
        self.extrema.min_moment = min.unwrap_or(ProcessExtrema::EMPTY.min_moment);
        self.extrema.max_moment = max.unwrap_or(ProcessExtrema::EMPTY.max_moment);
    }

    fn recompute_max_kb(&mut self) {
        self.extrema.max_kb = self
            .series
            .values()
            .filter_map(Series::max_kb)
            .max()
            .map(kb_as_i64)
            .unwrap_or(-1);
    }
}

/// Owner of every retained sample, keyed by process.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    capacity: usize,
    processes: HashMap<u32, ProcessSeries>,
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SERIES_CAPACITY)
    }

    /// Creates a store retaining at most `capacity` samples per series (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            processes: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stores one sample. Negative amounts are rejected before any mutation.
    pub fn put(
        &mut self,
        pid: u32,
        kind: MetricKind,
        moment: Moment,
        amount_bytes: i64,
    ) -> Result<PutOutcome, InvalidSampleError> {
        let bytes = u64::try_from(amount_bytes).map_err(|_| InvalidSampleError::NegativeAmount {
            pid,
            bytes: amount_bytes,
        })?;
        let sample = Sample::new(moment, bytes_to_kb(bytes));

        let capacity = self.capacity;
        let process = self.processes.entry(pid).or_insert_with(|| {
            debug!("creating entry for pid {}", pid);
            ProcessSeries::new()
        });
        Ok(process.insert(kind, sample, capacity))
    }

    /// Marks a process as known without data. Returns true if it was new.
    pub fn register_process(&mut self, pid: u32) -> bool {
        if self.processes.contains_key(&pid) {
            return false;
        }
        debug!("registering pid {} without samples", pid);
        self.processes.insert(pid, ProcessSeries::new());
        true
    }

    /// Snapshot of every non-empty series of `pid`, ordered by metric code.
    pub fn get_series(&self, pid: u32) -> Vec<SeriesSnapshot> {
        let Some(process) = self.processes.get(&pid) else {
            return Vec::new();
        };
        process
            .series
            .iter()
            .filter(|(_, s)| !s.points.is_empty())
            .map(|(kind, s)| SeriesSnapshot {
                kind: *kind,
                points: s.points.iter().copied().collect(),
            })
            .collect()
    }

    pub fn get_extrema(&self, pid: u32) -> Option<ProcessExtrema> {
        self.processes.get(&pid).map(|p| p.extrema)
    }

    pub fn has_process(&self, pid: u32) -> bool {
        self.processes.contains_key(&pid)
    }

    pub fn has_data(&self, pid: u32) -> bool {
        self.processes.get(&pid).is_some_and(ProcessSeries::has_data)
    }

    pub fn delete_process(&mut self, pid: u32) -> bool {
        let removed = self.processes.remove(&pid).is_some();
        if removed {
            debug!("deleted pid {}", pid);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.processes.clear();
    }

    /// Every `(pid, kind)` pair with a non-empty series.
    pub fn keys(&self) -> Vec<(u32, MetricKind)> {
        let mut keys: Vec<(u32, MetricKind)> = self
            .processes
            .iter()
            .flat_map(|(pid, p)| {
                p.series
                    .iter()
                    .filter(|(_, s)| !s.points.is_empty())
                    .map(move |(kind, _)| (*pid, *kind))
            })
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Known process ids in ascending order.
    pub fn process_ids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.processes.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    /// True when no process holds any sample.
    pub fn is_empty(&self) -> bool {
        !self.processes.values().any(ProcessSeries::has_data)
    }

    /// Total number of retained samples.
    pub fn point_count(&self) -> usize {
        self.processes
            .values()
            .flat_map(|p| p.series.values())
            .map(|s| s.points.len())
            .sum()
    }

    pub fn series_len(&self, pid: u32, kind: MetricKind) -> usize {
        self.processes
            .get(&pid)
            .and_then(|p| p.series.get(&kind))
            .map_or(0, |s| s.points.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: i64 = 1024 * 1024;

    fn true_max_kb(store: &TimeSeriesStore, pid: u32) -> i64 {
        store
            .get_series(pid)
            .iter()
            .flat_map(|s| s.points.iter())
            .map(|p| p.kb as i64)
            .max()
            .unwrap_or(-1)
    }

    #[test]
    fn kb_conversion_rounds_half_up() {
        assert_eq!(bytes_to_kb(0), 0);
        assert_eq!(bytes_to_kb(511), 0);
        assert_eq!(bytes_to_kb(512), 1);
        assert_eq!(bytes_to_kb(1535), 1);
        assert_eq!(bytes_to_kb(1536), 2);
        assert_eq!(bytes_to_kb(1_048_576), 1024);
    }

    #[test]
    fn end_to_end_two_samples() {
        let mut store = TimeSeriesStore::new();
        store.put(100, MetricKind::Rss, 0, MB).unwrap();
        store.put(100, MetricKind::Rss, 10, 2 * MB).unwrap();

        assert_eq!(
            store.get_extrema(100),
            Some(ProcessExtrema {
                min_moment: 0,
                max_moment: 10,
                max_kb: 2048
            })
        );
        let series = store.get_series(100);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].kind, MetricKind::Rss);
        assert_eq!(series[0].points, vec![Sample::new(0, 1024), Sample::new(10, 2048)]);
    }

    #[test]
    fn duplicate_moment_keeps_first_value() {
        let mut store = TimeSeriesStore::new();
        let first = store.put(1, MetricKind::Pss, 5, 4096).unwrap();
        let second = store.put(1, MetricKind::Pss, 5, 8192).unwrap();

        assert_eq!(first, PutOutcome::Inserted { evicted: 0 });
        assert_eq!(second, PutOutcome::Duplicate);
        assert_eq!(store.series_len(1, MetricKind::Pss), 1);
        assert_eq!(store.get_series(1)[0].points[0].kb, 4);
        assert_eq!(store.get_extrema(1).unwrap().max_kb, 4);
    }

    #[test]
    fn negative_amount_is_rejected_without_mutation() {
        let mut store = TimeSeriesStore::new();
        let err = store.put(7, MetricKind::Rss, 1, -1).unwrap_err();
        assert_eq!(err, InvalidSampleError::NegativeAmount { pid: 7, bytes: -1 });
        assert!(!store.has_process(7));

        store.put(7, MetricKind::Rss, 1, 2048).unwrap();
        assert!(store.put(7, MetricKind::Rss, 2, -5).is_err());
        assert_eq!(store.series_len(7, MetricKind::Rss), 1);
    }

    #[test]
    fn out_of_order_samples_are_sorted() {
        let mut store = TimeSeriesStore::new();
        for moment in [30, 10, 50, 20, 40, 0] {
            store.put(3, MetricKind::Rss, moment, moment * 1024).unwrap();
        }
        assert_eq!(store.put(3, MetricKind::Rss, 20, 1).unwrap(), PutOutcome::Duplicate);

        let moments: Vec<Moment> = store.get_series(3)[0].points.iter().map(|p| p.moment).collect();
        assert_eq!(moments, vec![0, 10, 20, 30, 40, 50]);
        let extrema = store.get_extrema(3).unwrap();
        assert_eq!((extrema.min_moment, extrema.max_moment), (0, 50));
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut store = TimeSeriesStore::with_capacity(100);
        for moment in 0..105 {
            store.put(1, MetricKind::Rss, moment, 1024).unwrap();
        }
        let points = &store.get_series(1)[0].points;
        assert_eq!(points.len(), 100);
        assert_eq!(points.first().unwrap().moment, 5);
        assert_eq!(points.last().unwrap().moment, 104);
        assert_eq!(store.get_extrema(1).unwrap().min_moment, 5);
    }

    #[test]
    fn put_reports_evicted_count() {
        let mut store = TimeSeriesStore::with_capacity(2);
        store.put(1, MetricKind::Rss, 0, 0).unwrap();
        store.put(1, MetricKind::Rss, 1, 0).unwrap();
        assert_eq!(
            store.put(1, MetricKind::Rss, 2, 0).unwrap(),
            PutOutcome::Inserted { evicted: 1 }
        );
    }

    #[test]
    fn sample_older_than_full_window_is_expired() {
        let mut store = TimeSeriesStore::with_capacity(3);
        for moment in [10, 20, 30] {
            store.put(1, MetricKind::Rss, moment, MB).unwrap();
        }
        assert_eq!(
            store.put(1, MetricKind::Rss, 5, 999 * MB).unwrap(),
            PutOutcome::Expired
        );

        let points = &store.get_series(1)[0].points;
        let moments: Vec<_> = points.iter().map(|p| p.moment).collect();
        assert_eq!(moments, vec![10, 20, 30]);
        let extrema = store.get_extrema(1).unwrap();
        assert_eq!(extrema.max_kb, 1024);
        assert_eq!(extrema.min_moment, 10);

        // Older than the front but with room left: still stored.
        store.put(1, MetricKind::Pss, 30, MB).unwrap();
        assert!(matches!(
            store.put(1, MetricKind::Pss, 15, MB).unwrap(),
            PutOutcome::Inserted { .. }
        ));
    }

    #[test]
    fn evicted_maximum_is_forgotten() {
        let mut store = TimeSeriesStore::with_capacity(3);
        store.put(1, MetricKind::Rss, 0, 100 * MB).unwrap();
        store.put(1, MetricKind::Rss, 1, MB).unwrap();
        store.put(1, MetricKind::Rss, 2, 2 * MB).unwrap();
        assert_eq!(store.get_extrema(1).unwrap().max_kb, 100 * 1024);

        store.put(1, MetricKind::Rss, 3, 3 * MB).unwrap();
        assert_eq!(store.get_extrema(1).unwrap().max_kb, 3 * 1024);
        assert_eq!(store.get_extrema(1).unwrap().max_kb, true_max_kb(&store, 1));
    }

    #[test]
    fn maximum_clipped_from_sibling_is_forgotten() {
        let mut store = TimeSeriesStore::with_capacity(2);
        store.put(1, MetricKind::Rss, 0, 10 * MB).unwrap();
        store.put(1, MetricKind::Pss, 0, 10 * MB).unwrap();
        store.put(1, MetricKind::Pss, 1, MB).unwrap();
        store.put(1, MetricKind::Rss, 1, MB).unwrap();
        // Evicts RSS@0; PSS@0 is clipped by alignment too.
        store.put(1, MetricKind::Rss, 2, MB).unwrap();
        assert_eq!(store.get_extrema(1).unwrap().max_kb, 1024);
        assert_eq!(store.get_extrema(1).unwrap().max_kb, true_max_kb(&store, 1));
    }

    #[test]
    fn eviction_aligns_sibling_series() {
        let mut store = TimeSeriesStore::with_capacity(3);
        for moment in 0..6 {
            store.put(9, MetricKind::Pss, moment, 50 * MB).unwrap();
        }
        // PSS retains 3..=5; RSS starts earlier and is clipped once it overflows.
        for moment in 2..6 {
            store.put(9, MetricKind::Rss, moment, MB).unwrap();
        }
        store.put(9, MetricKind::Rss, 6, MB).unwrap();

        let series = store.get_series(9);
        let rss = series.iter().find(|s| s.kind == MetricKind::Rss).unwrap();
        let pss = series.iter().find(|s| s.kind == MetricKind::Pss).unwrap();
        assert_eq!(rss.points.first().unwrap().moment, 4);
        assert_eq!(pss.points.first().unwrap().moment, 4);
        assert_eq!(store.get_extrema(9).unwrap().min_moment, 4);
        assert_eq!(store.get_extrema(9).unwrap().max_kb, 50 * 1024);
    }

    #[test]
    fn alignment_drops_fully_stale_siblings() {
        let mut store = TimeSeriesStore::with_capacity(2);
        store.put(4, MetricKind::Uss, 0, MB).unwrap();
        for moment in 10..13 {
            store.put(4, MetricKind::Rss, moment, MB).unwrap();
        }
        let kinds: Vec<MetricKind> = store.get_series(4).iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![MetricKind::Rss]);
        assert_eq!(store.keys(), vec![(4, MetricKind::Rss)]);
    }

    #[test]
    fn extrema_track_true_maximum_under_churn() {
        let mut store = TimeSeriesStore::with_capacity(16);
        let kinds = [MetricKind::Rss, MetricKind::Pss, MetricKind::Uss];
        let mut amount: i64 = 7;
        for moment in 0..500 {
            amount = (amount * 7919 + 13) % 100_000;
            let kind = kinds[(moment as usize) % kinds.len()];
            store.put(2, kind, moment, amount * 1024).unwrap();
            let extrema = store.get_extrema(2).unwrap();
            assert_eq!(extrema.max_kb, true_max_kb(&store, 2), "moment {moment}");
            let series = store.get_series(2);
            let min = series.iter().map(|s| s.points[0].moment).min().unwrap();
            let max = series.iter().map(|s| s.points.last().unwrap().moment).max().unwrap();
            assert_eq!((extrema.min_moment, extrema.max_moment), (min, max));
        }
    }

    #[test]
    fn delete_is_idempotent() {
        let mut store = TimeSeriesStore::new();
        store.put(5, MetricKind::Rss, 0, 1).unwrap();
        assert!(store.delete_process(5));
        assert!(!store.delete_process(5));
        assert!(!store.has_process(5));
        assert!(store.get_series(5).is_empty());
        assert_eq!(store.get_extrema(5), None);
    }

    #[test]
    fn registered_process_is_known_without_data() {
        let mut store = TimeSeriesStore::new();
        assert!(store.register_process(11));
        assert!(!store.register_process(11));
        assert!(store.has_process(11));
        assert!(!store.has_data(11));
        let extrema = store.get_extrema(11).unwrap();
        assert_eq!(extrema, ProcessExtrema::EMPTY);
        assert!(!extrema.has_data());
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_process_queries_are_empty() {
        let store = TimeSeriesStore::new();
        assert!(store.get_series(42).is_empty());
        assert_eq!(store.get_extrema(42), None);
        assert!(!store.has_process(42));
        assert!(!store.has_data(42));
    }

    #[test]
    fn clear_drops_everything() {
        let mut store = TimeSeriesStore::new();
        store.put(1, MetricKind::Rss, 0, 1).unwrap();
        store.put(2, MetricKind::Pss, 0, 1).unwrap();
        assert_eq!(store.point_count(), 2);
        assert_eq!(store.process_ids(), vec![1, 2]);
        store.clear();
        assert!(store.is_empty());
        assert!(store.process_ids().is_empty());
    }
}
