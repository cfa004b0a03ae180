//! CLI for flowbench: benchmark an OpenFlow 1.0 controller with a fleet
//! of fake switches.
//!
//! Measurement output (banner, per-loop lines, the RESULT line) goes to
//! stderr unconditionally; `-d`/`-q` turn on diagnostic logging through
//! `env_logger`; `--output` additionally writes the run summary as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use flowbench_core::{BenchConfig, Mode, harness};

#[derive(Parser)]
#[command(name = "flowbench")]
#[command(about = "flowbench — OpenFlow 1.0 controller benchmarking tool")]
#[command(version = flowbench_core::VERSION)]
struct Cli {
    /// Hostname of the controller to connect to
    #[arg(short = 'c', long, default_value = "localhost")]
    controller: String,

    /// Controller TCP port
    #[arg(short = 'p', long, default_value_t = 6653)]
    port: u16,

    /// Loops per test
    #[arg(short = 'l', long, default_value_t = 16)]
    loops: usize,

    /// Test length in ms
    #[arg(short = 'm', long = "ms-per-test", default_value_t = 1000)]
    ms_per_test: u64,

    /// Unique source MAC addresses per switch
    #[arg(short = 'M', long = "mac-addresses", default_value_t = 100_000)]
    mac_addresses: u32,

    /// Test throughput instead of latency
    #[arg(short = 't', long)]
    throughput: bool,

    /// Loops disregarded at test start (warmup)
    #[arg(short = 'w', long, default_value_t = 1)]
    warmup: usize,

    /// Loops disregarded at test end (cooldown)
    #[arg(short = 'C', long, default_value_t = 0)]
    cooldown: usize,

    /// Delay starting testing after features_reply is received (in ms)
    #[arg(short = 'D', long, default_value_t = 0)]
    delay: u64,

    /// Delay between switch additions (in ns)
    #[arg(short = 'e', long = "switch-add-delay", default_value_t = 0)]
    switch_add_delay: u64,

    /// Switches per thread
    #[arg(short = 'S', long = "switches-per-thread", default_value_t = 1)]
    switches_per_thread: usize,

    /// Delay between spawning worker threads (in ms)
    #[arg(short = 'T', long = "delay-per-thread", default_value_t = 1)]
    delay_per_thread: u64,

    /// Total worker threads
    #[arg(short = 'Z', long = "total-threads", default_value_t = 1)]
    total_threads: usize,

    /// Send gratuitous ARP replies to learn destination MACs before testing
    #[arg(
        short = 'L',
        long = "learn-dst-macs",
        default_value_t = true,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    learn_dst_macs: bool,

    /// Enable debugging (per-switch message traffic)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Enable thread-level debugging only
    #[arg(short = 'q', long = "debug-threads")]
    debug_threads: bool,

    /// Write the run summary as JSON
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let cfg = BenchConfig {
        controller: cli.controller.clone(),
        port: cli.port,
        loops: cli.loops,
        ms_per_test: cli.ms_per_test,
        mac_addresses: cli.mac_addresses,
        mode: if cli.throughput {
            Mode::Throughput
        } else {
            Mode::Latency
        },
        warmup: cli.warmup,
        cooldown: cli.cooldown,
        delay_ms: cli.delay,
        switch_add_delay_ns: cli.switch_add_delay,
        switches_per_thread: cli.switches_per_thread,
        delay_per_thread_ms: cli.delay_per_thread,
        total_threads: cli.total_threads,
        learn_dst_macs: cli.learn_dst_macs,
        ..Default::default()
    };

    banner(&cfg, cli.debug);

    let summary = match harness::run(&cfg) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("flowbench: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &cli.output {
        let json = match serde_json::to_string_pretty(&summary) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("flowbench: cannot serialize summary: {e}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = std::fs::write(path, json) {
            eprintln!("flowbench: cannot write {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.debug {
        builder.filter_level(log::LevelFilter::Debug);
    } else if cli.debug_threads {
        builder.filter_module("flowbench_core::worker", log::LevelFilter::Debug);
        builder.filter_module("flowbench_core::harness", log::LevelFilter::Debug);
    }
    builder.init();
}

fn banner(cfg: &BenchConfig, debug: bool) {
    eprintln!(
        "flowbench: controller benchmarking tool\n\
         \x20  running in mode '{}'\n\
         \x20  connecting to controller at {}:{}\n\
         \x20  faking {} switches with {} threads :: {} tests each; {} ms per test\n\
         \x20  with {} unique source MACs per switch\n\
         \x20  {} destination mac addresses before the test\n\
         \x20  starting test with {} ms delay after features_reply\n\
         \x20  ignoring first {} \"warmup\" and last {} \"cooldown\" loops\n\
         \x20  debugging info is {}",
        cfg.mode,
        cfg.controller,
        cfg.port,
        cfg.total_switches(),
        cfg.total_threads,
        cfg.loops,
        cfg.ms_per_test,
        cfg.mac_addresses,
        if cfg.learn_dst_macs {
            "learning"
        } else {
            "NOT learning"
        },
        cfg.delay_ms,
        cfg.warmup,
        cfg.cooldown,
        if debug { "on" } else { "off" }
    );
}
