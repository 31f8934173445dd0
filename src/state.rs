//! Application state shared by the HTTP handlers and the background tasks.

use ahash::AHashMap as HashMap;
use prometheus::Registry;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock as StdRwLock};
use std::time::Instant;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, error, warn};

use herakles_proc_mem_graph::chart::{ChartConfig, ChartRenderer};
use herakles_proc_mem_graph::config::Config;
use herakles_proc_mem_graph::ingest::{Ingestor, SampleEvent};
use herakles_proc_mem_graph::metric::MetricKind;
use herakles_proc_mem_graph::sampler::SamplePass;
use herakles_proc_mem_graph::store::{PutOutcome, TimeSeriesStore};

use crate::health_stats::HealthStats;
use crate::metrics::GraphMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Store plus the adapter that feeds it; always locked together.
pub struct GraphData {
    pub store: TimeSeriesStore,
    pub ingestor: Ingestor,
}

pub struct AppState {
    pub config: Arc<Config>,
    pub chart_config: ChartConfig,
    pub data: RwLock<GraphData>,
    /// Last rendered SVG per pid.
    pub charts: StdRwLock<HashMap<u32, Arc<str>>>,
    renderers: Mutex<HashMap<u32, ChartRenderer>>,
    pub registry: Registry,
    pub metrics: GraphMetrics,
    pub health_stats: Arc<HealthStats>,
    /// Set after the first successful sampler pass.
    pub sampled: AtomicBool,
    /// Held for a whole render batch so batches publish in order.
    render_batch: AsyncMutex<()>,
}

impl AppState {
    pub fn new(config: Config, chart_config: ChartConfig) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let metrics = GraphMetrics::new(&registry)?;
        let store = TimeSeriesStore::with_capacity(config.series_capacity());
        Ok(Self {
            config: Arc::new(config),
            chart_config,
            data: RwLock::new(GraphData {
                store,
                ingestor: Ingestor::new(),
            }),
            charts: StdRwLock::new(HashMap::new()),
            renderers: Mutex::new(HashMap::new()),
            registry,
            metrics,
            health_stats: Arc::new(HealthStats::new()),
            sampled: AtomicBool::new(false),
            render_batch: AsyncMutex::new(()),
        })
    }

    /// Applies one sampler pass: syncs the process set, then stores the samples.
    pub async fn ingest_pass(&self, pass: &SamplePass) {
        let events = pass.events();
        let mut data = self.data.write().await;
        let GraphData { store, ingestor } = &mut *data;

        ingestor.sync_known(store, &pass.known);
        for event in &events {
            self.apply_sample(store, ingestor, event);
        }

        self.metrics.observe_store(store);
        self.metrics
            .sampler_pass_duration
            .set(pass.duration.as_secs_f64());
        self.health_stats.record_pass(
            pass.processes.len(),
            pass.duration.as_secs_f64(),
            store.point_count(),
        );
        self.sampled.store(true, Ordering::Relaxed);
    }

    fn apply_sample(&self, store: &mut TimeSeriesStore, ingestor: &mut Ingestor, event: &SampleEvent) {
        match ingestor.apply(store, event) {
            Ok(PutOutcome::Inserted { .. }) => {
                if let Ok(kind) = event.metric.resolve() {
                    self.metrics.record_ingested(kind);
                }
            }
            Ok(PutOutcome::Duplicate | PutOutcome::Expired) => {}
            Err(e) => self.metrics.record_rejected(e.reason()),
        }
    }

    /// Re-renders every known process and drops charts of vanished ones.
    pub async fn render_all(&self) {
        let _batch = self.render_batch.lock().await;
        let start = Instant::now();
        let data = self.data.read().await;
        let pids = data.store.process_ids();

        let mut rendered: HashMap<u32, Arc<str>> = HashMap::with_capacity(pids.len());
        for &pid in &pids {
            if let Some(svg) = self.render_locked(&data.store, pid) {
                rendered.insert(pid, svg);
            }
        }
        drop(data);

        if let Ok(mut renderers) = self.renderers.lock() {
            renderers.retain(|pid, _| rendered.contains_key(pid));
        }
        match self.charts.write() {
            Ok(mut charts) => *charts = rendered,
            Err(e) => error!("chart cache poisoned: {}", e),
        }

        let elapsed = start.elapsed().as_secs_f64();
        self.metrics.render_duration.set(elapsed);
        self.health_stats.record_render(elapsed);
        debug!("rendered {} charts in {:.4}s", pids.len(), elapsed);
    }

    /// Cached chart, or a fresh render when the process is known but not cached yet.
    pub async fn chart(&self, pid: u32) -> Option<Arc<str>> {
        if let Some(svg) = self.charts.read().ok().and_then(|c| c.get(&pid).cloned()) {
            return Some(svg);
        }
        let data = self.data.read().await;
        let svg = self.render_locked(&data.store, pid)?;
        if let Ok(mut charts) = self.charts.write() {
            charts.insert(pid, Arc::clone(&svg));
        }
        Some(svg)
    }

    fn render_locked(&self, store: &TimeSeriesStore, pid: u32) -> Option<Arc<str>> {
        let extrema = store.get_extrema(pid)?;
        let series = store.get_series(pid);

        let mut renderers = match self.renderers.lock() {
            Ok(r) => r,
            Err(e) => {
                warn!("renderer map poisoned: {}", e);
                return None;
            }
        };
        let renderer = match renderers.entry(pid) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match ChartRenderer::new(self.chart_config.clone()) {
                Ok(r) => entry.insert(r),
                Err(e) => {
                    error!("invalid chart configuration: {}", e);
                    return None;
                }
            },
        };
        Some(Arc::from(renderer.render_to_string(&extrema, &series)))
    }

    /// One line per known process for the `/processes` listing.
    pub async fn process_rows(&self) -> Vec<ProcessRow> {
        let data = self.data.read().await;
        data.store
            .process_ids()
            .into_iter()
            .map(|pid| {
                let series = data.store.get_series(pid);
                let last = |kind: MetricKind| {
                    series
                        .iter()
                        .find(|s| s.kind == kind)
                        .and_then(|s| s.last())
                        .map(|p| p.kb)
                };
                ProcessRow {
                    pid,
                    series: series.len(),
                    points: series.iter().map(|s| s.points.len()).sum(),
                    max_kb: data
                        .store
                        .get_extrema(pid)
                        .filter(|e| e.has_data())
                        .map(|e| e.max_kb),
                    last_rss_kb: last(MetricKind::Rss),
                    last_pss_kb: last(MetricKind::Pss),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRow {
    pub pid: u32,
    pub series: usize,
    pub points: usize,
    pub max_kb: Option<i64>,
    pub last_rss_kb: Option<u64>,
    pub last_pss_kb: Option<u64>,
}
