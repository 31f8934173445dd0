//! System check command implementation.

use std::path::Path;

use herakles_proc_mem_graph::config::{validate_effective_config, Config};
use herakles_proc_mem_graph::sampler::{
    collect_proc_entries, page_size, parse_memory_for_process, read_rss_bytes, SamplerConfig,
};

/// Verifies /proc access, smaps parsing and the configuration.
///
/// Exits with code 1 when any check fails.
pub fn command_check(memory: bool, proc: bool, all: bool, config: &Config) -> anyhow::Result<()> {
    println!("🔍 Herakles Process Memory Graph - System Check");
    println!("================================================");

    let sampler_config = config.sampler_config();
    let proc_root = sampler_config.proc_root.as_path();
    let mut all_ok = true;

    if proc || all {
        println!("\n📁 Checking {} filesystem...", proc_root.display());
        if proc_root.exists() {
            println!("   ✅ {} accessible", proc_root.display());

            let entries = collect_proc_entries(proc_root, Some(5));
            if entries.is_empty() {
                println!("   ❌ Cannot read any process entries");
                all_ok = false;
            } else {
                println!("   ✅ Can read {} process entries", entries.len());
            }
        } else {
            println!("   ❌ {} not found", proc_root.display());
            all_ok = false;
        }
    }

    if memory || all {
        println!("\n💾 Checking memory accessibility...");
        let own = proc_root.join(std::process::id().to_string());
        all_ok &= check_own_process(&own, &sampler_config);
    }

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(()) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}

fn check_own_process(proc_path: &Path, sampler_config: &SamplerConfig) -> bool {
    let mut ok = true;

    match read_rss_bytes(proc_path, page_size()) {
        Ok(rss) => println!("   ✅ statm readable: RSS={}MB", rss / 1024 / 1024),
        Err(e) => {
            println!("   ❌ statm not readable: {}", e);
            ok = false;
        }
    }

    if proc_path.join("smaps_rollup").exists() {
        println!("   ✅ smaps_rollup available (fast path)");
    } else if proc_path.join("smaps").exists() {
        println!("   ✅ smaps available (slow path)");
    } else {
        println!("   ❌ No memory maps accessible, PSS/USS will be missing");
        ok = false;
    }

    match parse_memory_for_process(proc_path, sampler_config) {
        Ok(mem) => println!(
            "   ✅ Memory parsing successful: RSS={}MB, PSS={}MB, USS={}MB",
            mem.rss / 1024 / 1024,
            mem.pss / 1024 / 1024,
            mem.uss / 1024 / 1024
        ),
        Err(e) => {
            println!("   ❌ Memory parsing failed: {}", e);
            ok = false;
        }
    }

    ok
}
