//! Running statistics served by the `/health` endpoint.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Snapshot of one running statistic.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatSnapshot {
    pub current: f64,
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub count: u64,
}

#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    pub fn snapshot(&self) -> StatSnapshot {
        match self.inner.lock() {
            Ok(s) => StatSnapshot {
                current: s.last,
                average: s.avg(),
                max: s.max,
                min: s.min,
                count: s.count,
            },
            Err(_) => StatSnapshot::default(),
        }
    }
}

#[derive(Default)]
pub struct HealthStats {
    pub sampled_processes: Stat,
    pub sampler_pass_seconds: Stat,
    pub render_seconds: Stat,
    pub retained_points: Stat,
    total_passes: AtomicU64,
    total_renders: AtomicU64,
    http_requests: AtomicU64,
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_pass(&self, sampled: usize, pass_seconds: f64, retained_points: usize) {
        self.sampled_processes.add_sample(sampled as f64);
        self.sampler_pass_seconds.add_sample(pass_seconds);
        self.retained_points.add_sample(retained_points as f64);
        self.total_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render(&self, render_seconds: f64) {
        self.render_seconds.add_sample(render_seconds);
        self.total_renders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_passes(&self) -> u64 {
        self.total_passes.load(Ordering::Relaxed)
    }

    pub fn total_renders(&self) -> u64 {
        self.total_renders.load(Ordering::Relaxed)
    }

    pub fn render_table(&self) -> String {
        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();
        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        let rows = [
            ("sampled processes", self.sampled_processes.snapshot(), 0),
            ("sampler pass (s)", self.sampler_pass_seconds.snapshot(), 3),
            ("render duration (s)", self.render_seconds.snapshot(), 4),
            ("retained points", self.retained_points.snapshot(), 0),
        ];
        for (name, s, precision) in rows {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                name,
                format!("{:.*}", precision, s.current),
                format!("{:.*}", precision.max(1), s.average),
                format!("{:.*}", precision, s.max),
                format!("{:.*}", precision, s.min),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "number of sampler passes: {}", self.total_passes()).ok();
        writeln!(out, "number of chart renders: {}", self.total_renders()).ok();
        writeln!(
            out,
            "number of http requests: {}",
            self.http_requests.load(Ordering::Relaxed)
        )
        .ok();
        out
    }
}
