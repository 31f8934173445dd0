//! Prometheus telemetry for the graph server.
//!
//! These describe the server itself (ingest rates, store size, render cost);
//! the memory samples are served as charts, not as metrics.

use prometheus::{Gauge, GaugeVec, IntCounterVec, Opts, Registry};

use herakles_proc_mem_graph::metric::MetricKind;
use herakles_proc_mem_graph::store::TimeSeriesStore;

#[derive(Clone)]
pub struct GraphMetrics {
    pub samples_ingested: IntCounterVec,
    pub samples_rejected: IntCounterVec,
    pub retained_points: GaugeVec,
    pub tracked_processes: Gauge,
    pub render_duration: Gauge,
    pub sampler_pass_duration: Gauge,
}

impl GraphMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let samples_ingested = IntCounterVec::new(
            Opts::new(
                "herakles_proc_mem_graph_samples_ingested_total",
                "Samples accepted into the store per metric",
            ),
            &["metric"],
        )?;
        let samples_rejected = IntCounterVec::new(
            Opts::new(
                "herakles_proc_mem_graph_samples_rejected_total",
                "Samples dropped at the ingest boundary per reason",
            ),
            &["reason"],
        )?;
        let retained_points = GaugeVec::new(
            Opts::new(
                "herakles_proc_mem_graph_retained_points",
                "Samples currently retained per process and metric",
            ),
            &["pid", "metric"],
        )?;
        let tracked_processes = Gauge::new(
            "herakles_proc_mem_graph_tracked_processes",
            "Number of processes known to the store",
        )?;
        let render_duration = Gauge::new(
            "herakles_proc_mem_graph_render_duration_seconds",
            "Time spent rendering the last batch of charts",
        )?;
        let sampler_pass_duration = Gauge::new(
            "herakles_proc_mem_graph_sampler_pass_duration_seconds",
            "Time spent in the last /proc sampler pass",
        )?;

        registry.register(Box::new(samples_ingested.clone()))?;
        registry.register(Box::new(samples_rejected.clone()))?;
        registry.register(Box::new(retained_points.clone()))?;
        registry.register(Box::new(tracked_processes.clone()))?;
        registry.register(Box::new(render_duration.clone()))?;
        registry.register(Box::new(sampler_pass_duration.clone()))?;

        Ok(Self {
            samples_ingested,
            samples_rejected,
            retained_points,
            tracked_processes,
            render_duration,
            sampler_pass_duration,
        })
    }

    /// Refreshes the store gauges from the current contents.
    pub fn observe_store(&self, store: &TimeSeriesStore) {
        self.retained_points.reset();
        for (pid, kind) in store.keys() {
            let pid_label = pid.to_string();
            self.retained_points
                .with_label_values(&[pid_label.as_str(), kind.name()])
                .set(store.series_len(pid, kind) as f64);
        }
        self.tracked_processes.set(store.process_ids().len() as f64);
    }

    pub fn record_ingested(&self, kind: MetricKind) {
        self.samples_ingested.with_label_values(&[kind.name()]).inc();
    }

    pub fn record_rejected(&self, reason: &str) {
        self.samples_rejected.with_label_values(&[reason]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_gauges_follow_contents() {
        let registry = Registry::new();
        let metrics = GraphMetrics::new(&registry).unwrap();
        let mut store = TimeSeriesStore::new();
        store.put(10, MetricKind::Rss, 0, 1024).unwrap();
        store.put(10, MetricKind::Rss, 1, 1024).unwrap();
        store.register_process(11);

        metrics.observe_store(&store);
        assert_eq!(metrics.tracked_processes.get(), 2.0);
        assert_eq!(
            metrics
                .retained_points
                .with_label_values(&["10", "RSS"])
                .get(),
            2.0
        );
    }

    #[test]
    fn double_registration_fails() {
        let registry = Registry::new();
        assert!(GraphMetrics::new(&registry).is_ok());
        assert!(GraphMetrics::new(&registry).is_err());
    }
}
