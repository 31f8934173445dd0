//! One-shot sampling command implementation.

use std::fmt::Write as FmtWrite;
use std::thread;

use herakles_proc_mem_graph::chart::format_kb_label;
use herakles_proc_mem_graph::config::Config;
use herakles_proc_mem_graph::ingest::ProducerEvent;
use herakles_proc_mem_graph::sampler::{current_moment, SamplePass, Sampler};
use herakles_proc_mem_graph::store::bytes_to_kb;

/// Samples /proc `iterations` times, one sample interval apart.
///
/// With `json` the output is a replayable event file for `render`.
pub fn command_sample(
    pid: Option<u32>,
    iterations: usize,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let mut sampler_config = config.sampler_config();
    if let Some(pid) = pid {
        sampler_config.pids = Some(vec![pid]);
    }
    let sampler = Sampler::new(sampler_config, config.smaps_interval());
    let precision = config.label_precision.unwrap_or(1);

    if !json {
        println!("🧪 Herakles Process Memory Graph - Sample Mode");
        println!("===============================================");
    }

    for iteration in 1..=iterations {
        let pass = sampler.sample_at(current_moment(), true);
        if json {
            print!("{}", pass_to_jsonl(&pass)?);
        } else {
            println!("\n🔄 Iteration {}/{}:", iteration, iterations);
            print!("{}", render_pass_table(&pass, precision));
            println!(
                "   ⏱️  Scan duration: {:.2}ms",
                pass.duration.as_secs_f64() * 1000.0
            );
        }

        if iteration < iterations {
            thread::sleep(config.sample_interval());
        }
    }

    if !json {
        println!("\n✅ Sampling completed");
    }
    Ok(())
}

/// One JSON event per line: every sample followed by the known-process set.
pub fn pass_to_jsonl(pass: &SamplePass) -> anyhow::Result<String> {
    let mut out = String::new();
    for event in pass.events() {
        writeln!(out, "{}", serde_json::to_string(&ProducerEvent::Sample(event))?)?;
    }
    writeln!(
        out,
        "{}",
        serde_json::to_string(&ProducerEvent::KnownProcesses(pass.known.clone()))?
    )?;
    Ok(out)
}

pub fn render_pass_table(pass: &SamplePass, precision: usize) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "   {:>8}  {:<20} {:>12} {:>12} {:>12}",
        "PID", "NAME", "RSS", "PSS", "USS"
    )
    .ok();

    let fmt = |bytes: u64| format_kb_label(bytes_to_kb(bytes) as f64, precision);
    for process in &pass.processes {
        let (pss, uss) = match process.smaps {
            Some(smaps) => (fmt(smaps.pss), fmt(smaps.uss)),
            None => ("-".to_string(), "-".to_string()),
        };
        writeln!(
            out,
            "   {:>8}  {:<20} {:>12} {:>12} {:>12}",
            process.pid,
            process.name,
            fmt(process.rss),
            pss,
            uss
        )
        .ok();
    }
    writeln!(out, "   📊 Sampled processes: {}", pass.processes.len()).ok();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_proc_mem_graph::ingest::{parse_events, KnownProcesses};
    use herakles_proc_mem_graph::sampler::{ProcessSample, SmapsMemory};
    use std::time::Duration;

    fn pass() -> SamplePass {
        SamplePass {
            moment: 42,
            processes: vec![
                ProcessSample {
                    pid: 1,
                    name: "init".into(),
                    rss: 8 * 1024 * 1024,
                    smaps: Some(SmapsMemory {
                        rss: 8 * 1024 * 1024,
                        pss: 4 * 1024 * 1024,
                        uss: 2 * 1024 * 1024,
                    }),
                },
                ProcessSample {
                    pid: 2,
                    name: "kthreadd".into(),
                    rss: 1024 * 1024,
                    smaps: None,
                },
            ],
            known: KnownProcesses { pids: vec![1, 2] },
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn jsonl_output_replays() {
        let text = pass_to_jsonl(&pass()).unwrap();
        let events = parse_events(&text).unwrap();
        // 3 samples for pid 1, 1 for pid 2, then the process set
        assert_eq!(events.len(), 5);
        assert!(matches!(events.last(), Some(ProducerEvent::KnownProcesses(k)) if k.pids == vec![1, 2]));
    }

    #[test]
    fn table_marks_missing_smaps() {
        let table = render_pass_table(&pass(), 1);
        assert!(table.contains("init"));
        assert!(table.contains("8.0 MB"));
        assert!(table.lines().nth(2).unwrap().contains(" - "));
        assert!(table.contains("Sampled processes: 2"));
    }
}
