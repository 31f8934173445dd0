//! /proc sampler producing `SampleEvent`s.
//!
//! RSS comes from `/proc/<pid>/statm` on every pass. PSS and USS need a walk
//! over `smaps_rollup` (or the full `smaps` on older kernels) and are only
//! collected when the slower smaps cadence is due.

use chrono::Utc;
use rayon::prelude::*;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::ingest::{KnownProcesses, SampleEvent};
use crate::metric::{MetricKind, Os};
use crate::store::Moment;

pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const DEFAULT_SMAPS_BUFFER_KB: usize = 512;
pub const DEFAULT_SMAPS_ROLLUP_BUFFER_KB: usize = 256;

/// Platform whose metric kinds a /proc pass emits.
pub const HOST_OS: Os = Os::Linux;

/// Current wall-clock time in tenths of a second since the Unix epoch.
pub fn current_moment() -> Moment {
    Utc::now().timestamp_millis().div_euclid(100)
}

/// System page size in bytes.
pub fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions and only reads a constant.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub proc_root: PathBuf,
    /// Sample only these pids instead of scanning the whole root.
    pub pids: Option<Vec<u32>>,
    pub include_names: Vec<String>,
    pub exclude_names: Vec<String>,
    pub max_processes: Option<usize>,
    pub smaps_buffer_kb: usize,
    pub smaps_rollup_buffer_kb: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            pids: None,
            include_names: Vec::new(),
            exclude_names: Vec::new(),
            max_processes: None,
            smaps_buffer_kb: DEFAULT_SMAPS_BUFFER_KB,
            smaps_rollup_buffer_kb: DEFAULT_SMAPS_ROLLUP_BUFFER_KB,
        }
    }
}

/// Process entry representing a directory in the proc root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcEntry {
    pub pid: u32,
    pub proc_path: PathBuf,
}

/// Figures from one smaps walk, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmapsMemory {
    pub rss: u64,
    pub pss: u64,
    pub uss: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub rss: u64,
    pub smaps: Option<SmapsMemory>,
}

/// Result of one sampler pass.
#[derive(Debug, Clone)]
pub struct SamplePass {
    pub moment: Moment,
    pub processes: Vec<ProcessSample>,
    pub known: KnownProcesses,
    pub duration: Duration,
}

impl SamplePass {
    /// RSS for every sampled process, plus PSS and USS when smaps was read.
    pub fn events(&self) -> Vec<SampleEvent> {
        let mut events = Vec::with_capacity(self.processes.len() * 3);
        for process in &self.processes {
            let mut readings = vec![(MetricKind::Rss, process.rss)];
            if let Some(smaps) = process.smaps {
                readings.push((MetricKind::Pss, smaps.pss));
                readings.push((MetricKind::Uss, smaps.uss));
            }
            events.extend(
                readings
                    .into_iter()
                    .filter(|(kind, _)| kind.is_applicable(HOST_OS))
                    .map(|(kind, bytes)| {
                        SampleEvent::new(process.pid, kind, self.moment, clamp_bytes(bytes))
                    }),
            );
        }
        events
    }
}

fn clamp_bytes(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

pub struct Sampler {
    config: SamplerConfig,
    smaps_interval: Duration,
    last_smaps: Option<Instant>,
    page_size: u64,
}

impl Sampler {
    pub fn new(config: SamplerConfig, smaps_interval: Duration) -> Self {
        Self {
            config,
            smaps_interval,
            last_smaps: None,
            page_size: page_size(),
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Runs one pass at the current moment; reads smaps when its interval elapsed.
    pub fn sample(&mut self) -> SamplePass {
        let now = Instant::now();
        let smaps_due = self
            .last_smaps
            .map_or(true, |last| now.duration_since(last) >= self.smaps_interval);
        if smaps_due {
            self.last_smaps = Some(now);
        }
        self.sample_at(current_moment(), smaps_due)
    }

    /// Runs one pass stamped with `moment`.
    pub fn sample_at(&self, moment: Moment, include_smaps: bool) -> SamplePass {
        let start = Instant::now();
        let entries = match &self.config.pids {
            Some(pids) => entries_for_pids(&self.config.proc_root, pids),
            None => collect_proc_entries(&self.config.proc_root, self.config.max_processes),
        };
        trace!("found {} process entries", entries.len());

        let config = &self.config;
        let page_size = self.page_size;
        let mut processes: Vec<ProcessSample> = entries
            .par_iter()
            .filter_map(|entry| sample_process(entry, config, page_size, include_smaps))
            .collect();
        processes.sort_unstable_by_key(|p| p.pid);

        let known = KnownProcesses {
            pids: processes.iter().map(|p| p.pid).collect(),
        };
        let duration = start.elapsed();
        debug!(
            "sampled {} processes in {:.3}s (smaps: {})",
            processes.len(),
            duration.as_secs_f64(),
            include_smaps
        );

        SamplePass {
            moment,
            processes,
            known,
            duration,
        }
    }
}

fn sample_process(
    entry: &ProcEntry,
    config: &SamplerConfig,
    page_size: u64,
    include_smaps: bool,
) -> Option<ProcessSample> {
    let name = read_process_name(&entry.proc_path)?;
    if !should_include_process(&name, &config.include_names, &config.exclude_names) {
        return None;
    }
    // the process may exit between listing and reading
    let rss = match read_rss_bytes(&entry.proc_path, page_size) {
        Ok(rss) => rss,
        Err(e) => {
            trace!("skipping pid {}: {}", entry.pid, e);
            return None;
        }
    };
    let smaps = if include_smaps {
        parse_memory_for_process(&entry.proc_path, config)
            .map_err(|e| trace!("no smaps for pid {}: {}", entry.pid, e))
            .ok()
    } else {
        None
    };
    Some(ProcessSample {
        pid: entry.pid,
        name,
        rss,
        smaps,
    })
}

/// Lists numeric directories with a readable `statm`.
pub fn collect_proc_entries(root: &Path, max: Option<usize>) -> Vec<ProcEntry> {
    let mut out = Vec::new();
    if let Ok(entries) = fs::read_dir(root) {
        for entry in entries.flatten() {
            let p = entry.path();
            let name = match p.file_name().and_then(|s| s.to_str()) {
                Some(v) => v,
                None => continue,
            };
            if !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if !p.join("statm").exists() {
                continue;
            }
            let pid: u32 = match name.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            out.push(ProcEntry { pid, proc_path: p });
            if let Some(maxp) = max {
                if out.len() >= maxp {
                    break;
                }
            }
        }
    }
    out.sort_unstable_by_key(|e| e.pid);
    out
}

fn entries_for_pids(root: &Path, pids: &[u32]) -> Vec<ProcEntry> {
    pids.iter()
        .map(|&pid| ProcEntry {
            pid,
            proc_path: root.join(pid.to_string()),
        })
        .filter(|e| e.proc_path.join("statm").exists())
        .collect()
}

/// Reads process name from comm file or extracts from cmdline
pub fn read_process_name(proc_path: &Path) -> Option<String> {
    let comm = proc_path.join("comm");
    if let Ok(s) = fs::read_to_string(&comm) {
        let t = s.trim();
        if !t.is_empty() {
            return Some(t.into());
        }
    }

    let cmd = proc_path.join("cmdline");
    if let Ok(content) = fs::read(&cmd) {
        let first = content.split(|&b| b == 0u8).next()?;
        let first = std::str::from_utf8(first).ok()?;
        if let Some(name) = Path::new(first).file_name() {
            return name.to_str().map(|s| s.to_string());
        }
    }
    None
}

/// Resident pages (second field) from a statm line.
pub fn parse_statm(content: &str) -> Option<u64> {
    content.split_whitespace().nth(1)?.parse().ok()
}

pub fn read_rss_bytes(proc_path: &Path, page_size: u64) -> Result<u64, std::io::Error> {
    let content = fs::read_to_string(proc_path.join("statm"))?;
    let pages = parse_statm(&content).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed statm")
    })?;
    Ok(pages.saturating_mul(page_size))
}

/// Sums Rss, Pss and Private_* lines of an smaps-format stream.
pub fn parse_smaps_reader<R: BufRead>(reader: R) -> Result<SmapsMemory, std::io::Error> {
    let mut rss = 0;
    let mut pss = 0;
    let mut pc = 0;
    let mut pd = 0;

    for line in reader.lines() {
        let l = line?;
        if let Some(kb) = l.strip_prefix("Rss:") {
            rss += parse_kb_value(kb).unwrap_or(0);
        } else if let Some(kb) = l.strip_prefix("Pss:") {
            pss += parse_kb_value(kb).unwrap_or(0);
        } else if let Some(kb) = l.strip_prefix("Private_Clean:") {
            pc += parse_kb_value(kb).unwrap_or(0);
        } else if let Some(kb) = l.strip_prefix("Private_Dirty:") {
            pd += parse_kb_value(kb).unwrap_or(0);
        }
    }

    Ok(SmapsMemory {
        rss: rss * 1024,
        pss: pss * 1024,
        uss: (pc + pd) * 1024,
    })
}

/// Fast parser for /proc/<pid>/smaps_rollup (Linux >= 4.14)
pub fn parse_smaps_rollup(path: &Path, buf_kb: usize) -> Result<SmapsMemory, std::io::Error> {
    let file = fs::File::open(path)?;
    parse_smaps_reader(BufReader::with_capacity(buf_kb.max(1) * 1024, file))
}

pub fn parse_smaps(path: &Path, buf_kb: usize) -> Result<SmapsMemory, std::io::Error> {
    let file = fs::File::open(path)?;
    parse_smaps_reader(BufReader::with_capacity(buf_kb.max(1) * 1024, file))
}

/// Parses kilobyte values from smaps file lines
pub fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

/// Uses smaps_rollup when available, otherwise falls back to full smaps.
pub fn parse_memory_for_process(
    proc_path: &Path,
    config: &SamplerConfig,
) -> Result<SmapsMemory, std::io::Error> {
    let rollup = proc_path.join("smaps_rollup");
    if rollup.exists() {
        return parse_smaps_rollup(&rollup, config.smaps_rollup_buffer_kb);
    }
    parse_smaps(&proc_path.join("smaps"), config.smaps_buffer_kb)
}

/// Exclusion wins over inclusion; an empty include list matches everything.
pub fn should_include_process(name: &str, include: &[String], exclude: &[String]) -> bool {
    if exclude.iter().any(|s| name.contains(s.as_str())) {
        return false;
    }
    include.is_empty() || include.iter().any(|s| name.contains(s.as_str()))
}
