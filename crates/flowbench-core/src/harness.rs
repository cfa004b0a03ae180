//! Orchestration: shared run state, worker fan-out, final reduction.
//!
//! The orchestrator owns the three objects workers share (the
//! `threads_started` counter, the reusable inter-loop barrier and the flat
//! result matrix) and nothing else crosses threads. Matrix writes are
//! partitioned by worker, and the reduction read happens only after the
//! end-of-window barrier, so a cell never sees concurrent access.

use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::stats::RunSummary;
use crate::worker::Worker;

/// Handles shared by every worker thread.
pub struct SharedState {
    /// Workers that have initialized all of their switches. No window
    /// timing starts anywhere until this reaches `total_threads`.
    pub threads_started: AtomicUsize,
    /// Reusable barrier at the top and bottom of every measurement window.
    pub barrier: Barrier,
    /// Flat `total_threads × switches_per_thread` count matrix. Cell
    /// `(t, i)` is written only by worker `t`.
    pub results: Vec<AtomicU64>,
}

impl SharedState {
    pub fn new(cfg: &BenchConfig) -> Self {
        let cells = cfg.total_switches();
        Self {
            threads_started: AtomicUsize::new(0),
            barrier: Barrier::new(cfg.total_threads),
            results: (0..cells).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

/// Run a configured benchmark to completion and return worker 0's summary.
///
/// Workers are spawned `delay_per_thread` ms apart so the controller is not
/// hit by a simultaneous connection storm. A worker that fails mid-run
/// terminates the process with exit code 1: there is no meaningful result
/// once a switch is gone.
pub fn run(cfg: &BenchConfig) -> Result<RunSummary, BenchError> {
    cfg.validate()?;

    let shared = Arc::new(SharedState::new(cfg));
    let mut handles = Vec::with_capacity(cfg.total_threads);

    for tid in 0..cfg.total_threads {
        eprintln!("Master Thread: Creating thread-{tid}!");
        let worker_cfg = cfg.clone();
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("worker-{tid}"))
            .spawn(move || worker_main(tid, worker_cfg, worker_shared))
            .map_err(BenchError::Io)?;
        handles.push(handle);
        thread::sleep(Duration::from_millis(cfg.delay_per_thread_ms));
    }

    let mut summary = None;
    for handle in handles {
        match handle.join() {
            Ok(Some(s)) => summary = Some(s),
            Ok(None) => {}
            Err(_) => {
                // a worker panicked rather than erroring; same verdict
                eprintln!("flowbench: worker thread panicked");
                std::process::exit(1);
            }
        }
    }
    summary.ok_or_else(|| BenchError::Config("worker 0 produced no summary".into()))
}

fn worker_main(tid: usize, cfg: BenchConfig, shared: Arc<SharedState>) -> Option<RunSummary> {
    debug!("worker {tid} starting");
    let result = Worker::new(tid, cfg, shared).and_then(Worker::run);
    match result {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("flowbench: {e}");
            std::process::exit(1);
        }
    }
}
