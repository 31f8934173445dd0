//! Adaptive gridlines.
//!
//! Intervals come from fixed ascending tables; the first interval that keeps
//! the number of lines under the axis cap wins. Lines sit at
//! `min + k * interval` strictly inside the axis range.

use std::sync::Arc;

use crate::chart::format::{format_kb_label, format_time_label};
use crate::store::Moment;

/// Time intervals in tenths of a second (1s .. 24h).
pub const TIME_GRID_INTERVALS: [i64; 13] = [
    10, 50, 100, 300, 600, 3_000, 6_000, 18_000, 36_000, 108_000, 216_000, 432_000, 864_000,
];

const KB: i64 = 1;
const MB: i64 = 1024 * KB;
const GB: i64 = 1024 * MB;
const TB: i64 = 1024 * GB;

/// Memory intervals in kilobytes (100 KB .. 1 TB).
pub const MEMORY_GRID_INTERVALS_KB: [i64; 15] = [
    100 * KB,
    500 * KB,
    MB,
    5 * MB,
    10 * MB,
    50 * MB,
    100 * MB,
    500 * MB,
    GB,
    5 * GB,
    10 * GB,
    50 * GB,
    100 * GB,
    500 * GB,
    TB,
];

pub const MAX_VERTICAL_GRID_LINES: i64 = 10;
pub const MAX_HORIZONTAL_GRID_LINES: i64 = 8;

/// One gridline in local data coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLine {
    /// Tick value on its axis (time offset or kilobytes).
    pub value: i64,
    /// Position inside the local data rectangle.
    pub position: i64,
    pub label: String,
}

/// Picks the first table interval with `range / interval <= max_lines`.
///
/// Ranges beyond the table use the largest entry times the smallest integer
/// factor that honors the cap.
pub fn select_interval(range: i64, table: &[i64], max_lines: i64) -> i64 {
    let max_lines = max_lines.max(1);
    let Some(&largest) = table.last() else {
        return range.max(1);
    };
    if range <= 0 {
        return table[0];
    }
    for &interval in table {
        if range <= interval.saturating_mul(max_lines) {
            return interval;
        }
    }
    let span = largest.saturating_mul(max_lines);
    let factor = range / span + i64::from(range % span != 0);
    largest.saturating_mul(factor)
}

/// Tick values `k * interval` (k >= 1) strictly below `range`.
fn ticks(range: i64, interval: i64) -> impl Iterator<Item = i64> {
    let interval = interval.max(1);
    (1..)
        .map(move |k: i64| k.saturating_mul(interval))
        .take_while(move |tick| *tick < range)
}

pub fn vertical_interval(min_moment: Moment, max_moment: Moment) -> i64 {
    let range = max_moment.saturating_sub(min_moment);
    select_interval(range, &TIME_GRID_INTERVALS, MAX_VERTICAL_GRID_LINES)
}

pub fn horizontal_interval(max_kb: i64) -> i64 {
    select_interval(max_kb, &MEMORY_GRID_INTERVALS_KB, MAX_HORIZONTAL_GRID_LINES)
}

/// Vertical lines for the time window `[min_moment, max_moment]`.
pub fn vertical_lines(min_moment: Moment, max_moment: Moment, interval: i64) -> Vec<GridLine> {
    let range = max_moment.saturating_sub(min_moment);
    ticks(range, interval)
        .map(|offset| GridLine {
            value: offset,
            position: offset,
            label: format_time_label(offset, interval),
        })
        .collect()
}

/// Horizontal lines for amounts in `[0, max_kb]`; positions are inverted
/// against `amount_range`.
pub fn horizontal_lines(max_kb: i64, interval: i64, precision: usize) -> Vec<GridLine> {
    let amount_range = max_kb.max(1);
    ticks(max_kb, interval)
        .map(|kb| GridLine {
            value: kb,
            position: amount_range - kb,
            label: format_kb_label(kb as f64, precision),
        })
        .collect()
}

/// Hit and miss counters of a [`GridCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridCacheStats {
    pub hits: u64,
    pub misses: u64,
}

type VerticalKey = (Moment, Moment, i64);
type HorizontalKey = (i64, i64);

/// Last computed gridlines per axis.
///
/// Label precision is fixed for the lifetime of a renderer, so it is not
/// part of the horizontal key.
#[derive(Debug, Default)]
pub struct GridCache {
    vertical: Option<(VerticalKey, Arc<[GridLine]>)>,
    horizontal: Option<(HorizontalKey, Arc<[GridLine]>)>,
    stats: GridCacheStats,
}

impl GridCache {
    pub fn vertical(&mut self, min_moment: Moment, max_moment: Moment) -> Arc<[GridLine]> {
        let interval = vertical_interval(min_moment, max_moment);
        let key = (min_moment, max_moment, interval);
        if let Some((cached, lines)) = &self.vertical {
            if *cached == key {
                self.stats.hits += 1;
                return Arc::clone(lines);
            }
        }
        self.stats.misses += 1;
        let lines: Arc<[GridLine]> = vertical_lines(min_moment, max_moment, interval).into();
        self.vertical = Some((key, Arc::clone(&lines)));
        lines
    }

    pub fn horizontal(&mut self, max_kb: i64, precision: usize) -> Arc<[GridLine]> {
        let interval = horizontal_interval(max_kb);
        let key = (max_kb, interval);
        if let Some((cached, lines)) = &self.horizontal {
            if *cached == key {
                self.stats.hits += 1;
                return Arc::clone(lines);
            }
        }
        self.stats.misses += 1;
        let lines: Arc<[GridLine]> = horizontal_lines(max_kb, interval, precision).into();
        self.horizontal = Some((key, Arc::clone(&lines)));
        lines
    }

    pub fn clear(&mut self) {
        self.vertical = None;
        self.horizontal = None;
    }

    pub fn stats(&self) -> GridCacheStats {
        self.stats
    }
}
