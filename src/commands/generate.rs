//! Generate testdata command implementation.
//!
//! Writes a synthetic event file that `render` (and the ingest adapter in
//! general) can replay.

use rand::Rng;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use herakles_proc_mem_graph::config::Config;
use herakles_proc_mem_graph::ingest::{KnownProcesses, ProducerEvent, SampleEvent};
use herakles_proc_mem_graph::metric::MetricKind;
use herakles_proc_mem_graph::sampler::current_moment;
use herakles_proc_mem_graph::store::Moment;

const FIRST_PID: u32 = 1000;

/// Builds the synthetic events: RSS every sample interval, PSS and USS on the
/// smaps cadence, then the full process set.
pub fn generate_events(
    rng: &mut impl Rng,
    processes: usize,
    samples: usize,
    end: Moment,
    config: &Config,
) -> Vec<ProducerEvent> {
    let rss_step = config.sample_interval().as_millis() as i64 / 100;
    let smaps_every = (config.smaps_interval().as_secs() / config.sample_interval().as_secs()).max(1) as usize;
    let start = end - rss_step * samples.saturating_sub(1) as i64;

    let mut events = Vec::with_capacity(processes * samples * 3 + 1);
    let mut pids = Vec::with_capacity(processes);
    for offset in 0..processes {
        let pid = FIRST_PID + offset as u32;
        pids.push(pid);

        // RSS: 10 MB - 512 MB start, then a bounded random walk
        let mut rss: i64 = rng.gen_range(10 * 1024 * 1024..512 * 1024 * 1024);
        for i in 0..samples {
            let moment = start + rss_step * i as i64;
            let delta: f64 = rng.gen_range(-0.05..0.06);
            rss = ((rss as f64) * (1.0 + delta)).max(1024.0 * 1024.0) as i64;
            events.push(ProducerEvent::Sample(SampleEvent::new(
                pid,
                MetricKind::Rss,
                moment,
                rss,
            )));

            if i % smaps_every == 0 {
                // PSS: 80-95% of RSS, USS: 60-80% of RSS
                let pss_ratio: f64 = rng.gen_range(0.80..0.95);
                let uss_ratio: f64 = rng.gen_range(0.60..0.80);
                events.push(ProducerEvent::Sample(SampleEvent::new(
                    pid,
                    MetricKind::Pss,
                    moment,
                    (rss as f64 * pss_ratio) as i64,
                )));
                events.push(ProducerEvent::Sample(SampleEvent::new(
                    pid,
                    MetricKind::Uss,
                    moment,
                    (rss as f64 * uss_ratio) as i64,
                )));
            }
        }
    }
    events.push(ProducerEvent::KnownProcesses(KnownProcesses { pids }));
    events
}

/// Writes the synthetic event file as JSON lines.
pub fn command_generate_testdata(
    output: PathBuf,
    processes: usize,
    samples: usize,
    config: &Config,
) -> anyhow::Result<()> {
    debug!(
        "Generating test data: processes={}, samples={}, output={}",
        processes,
        samples,
        output.display()
    );

    let mut rng = rand::thread_rng();
    let events = generate_events(&mut rng, processes, samples, current_moment(), config);

    let mut content = String::new();
    for event in &events {
        writeln!(content, "{}", serde_json::to_string(event)?)?;
    }
    fs::write(&output, content)?;

    println!(
        "✅ Generated test data: {} events for {} processes in {}",
        events.len(),
        processes,
        output.display()
    );
    println!(
        "   Render with: herakles-proc-mem-graph render -i {} --pid {}",
        output.display(),
        FIRST_PID
    );

    Ok(())
}
