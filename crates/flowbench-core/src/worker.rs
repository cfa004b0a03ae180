//! Per-thread benchmark worker.
//!
//! A worker owns one partition of the switch fleet and a `mio::Poll` that
//! multiplexes all of its connections; nothing is shared across threads
//! except the handles in [`SharedState`]. The lifecycle:
//!
//! 1. open `switches_per_thread` paced connections;
//! 2. drive the handshake until every owned switch is initialized, then
//!    increment `threads_started` once;
//! 3. per loop: window timing starts when every worker has counted in, the
//!    generation gate opens `delay` ms later, the window closes after
//!    `delay + ms_per_test` ms, residual responses drain for 100 ms, and
//!    the counts land in the shared matrix;
//! 4. the inter-loop barrier; worker 0 reduces and prints.
//!
//! A fatal error from any switch aborts the whole run: with one switch
//! missing the aggregate numbers mean nothing.

use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use mio::{Events, Interest, Poll, Token};

use crate::clock;
use crate::config::{BenchConfig, Mode};
use crate::error::BenchError;
use crate::fakeswitch::FakeSwitch;
use crate::harness::SharedState;
use crate::stats::{LoopRecord, LoopStats, RunSummary};
use crate::transport;

/// Upper bound on one multiplexer wait.
const POLL_CEILING: Duration = Duration::from_millis(1000);

/// Post-window settling time for in-flight responses.
const DRAIN_MS: u64 = 100;

pub struct Worker {
    tid: usize,
    cfg: BenchConfig,
    shared: Arc<SharedState>,
    poll: Poll,
    events: Events,
    switches: Vec<FakeSwitch<mio::net::TcpStream>>,
    /// Interest currently registered per switch, to re-arm WRITABLE only
    /// when it changes.
    interests: Vec<Interest>,
    event_scratch: Vec<(usize, bool, bool)>,
    initialized: usize,
    counted_in: bool,
}

impl Worker {
    pub fn new(
        tid: usize,
        cfg: BenchConfig,
        shared: Arc<SharedState>,
    ) -> Result<Self, BenchError> {
        Ok(Self {
            tid,
            cfg,
            shared,
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
            switches: Vec::new(),
            interests: Vec::new(),
            event_scratch: Vec::new(),
            initialized: 0,
            counted_in: false,
        })
    }

    /// Run every measurement loop to completion. Worker 0 returns the run
    /// summary; other workers return `None`.
    pub fn run(mut self) -> Result<Option<RunSummary>, BenchError> {
        self.connect_all()?;

        let mut delay_ms = self.cfg.delay_ms as f64;
        let mut gate_open = false;
        let mut retained: Vec<LoopRecord> = Vec::new();

        for j in 0..self.cfg.loops {
            let loop_start = Instant::now();
            if j > 0 {
                self.shared.barrier.wait();
                // only the first loop gets a settling delay
                delay_ms = 0.0;
                gate_open = true;
            }
            self.run_window(delay_ms, &mut gate_open)?;
            self.shared.barrier.wait();
            if self.tid == 0 {
                if let Some(rate) = self.report_loop(j, loop_start, delay_ms) {
                    retained.push(LoopRecord {
                        index: j,
                        responses_per_sec: rate,
                    });
                }
            }
        }

        self.shared.barrier.wait();
        if self.tid == 0 {
            Ok(Some(self.finalize(retained)))
        } else {
            Ok(None)
        }
    }

    /// Open this worker's connections, paced by `switch_add_delay`.
    fn connect_all(&mut self) -> Result<(), BenchError> {
        let addr = transport::resolve(&self.cfg.controller, self.cfg.port)?;
        let nodelay = self.cfg.mode != Mode::Throughput;
        let dpid_offset = (self.tid * self.cfg.switches_per_thread) as u64;

        for i in 0..self.cfg.switches_per_thread {
            let mut stream = transport::connect(
                addr,
                Duration::from_millis(self.cfg.connect_timeout_ms),
                nodelay,
            )?;
            if self.cfg.switch_add_delay_ns > 0 {
                thread::sleep(Duration::from_nanos(self.cfg.switch_add_delay_ns));
            }
            debug!("worker {}: initializing switch {}", self.tid, i + 1);
            let interest = Interest::READABLE | Interest::WRITABLE;
            self.poll
                .registry()
                .register(&mut stream, Token(i), interest)?;
            self.switches.push(FakeSwitch::new(
                dpid_offset + i as u64,
                stream,
                self.cfg.mode,
                self.cfg.mac_addresses,
                self.cfg.learn_dst_macs,
            ));
            self.interests.push(interest);
        }
        Ok(())
    }

    /// One measurement window plus its drain and harvest.
    fn run_window(&mut self, delay_ms: f64, gate_open: &mut bool) -> Result<(), BenchError> {
        let total_wait = delay_ms + self.cfg.ms_per_test as f64;
        let mut started = false;
        let mut then = Instant::now();

        // restart generation stalled over the inter-loop barrier
        self.pump_all(*gate_open)?;

        loop {
            if !started
                && self.shared.threads_started.load(Ordering::Acquire) == self.cfg.total_threads
            {
                started = true;
                then = Instant::now();
                debug!("worker {}: window timer started", self.tid);
            }
            if started {
                let elapsed = clock::elapsed_ms(then);
                if elapsed > total_wait {
                    break;
                }
                if elapsed > delay_ms && !*gate_open {
                    *gate_open = true;
                    // measurement begins now: drop handshake-phase responses
                    for sw in &mut self.switches {
                        sw.take_count();
                    }
                    self.pump_all(true)?;
                    debug!("worker {}: measurement gate open", self.tid);
                }
            }
            let timeout = self.poll_timeout(started, then, delay_ms, total_wait, *gate_open);
            self.poll_once(timeout, *gate_open)?;
        }

        // Residual responses drain into the counts; no new probes.
        let drain_until = Instant::now() + Duration::from_millis(DRAIN_MS);
        loop {
            let now = Instant::now();
            if now >= drain_until {
                break;
            }
            self.poll_once((drain_until - now).min(POLL_CEILING), false)?;
        }

        let base = self.tid * self.cfg.switches_per_thread;
        for (i, sw) in self.switches.iter_mut().enumerate() {
            self.shared.results[base + i].store(sw.take_count(), Ordering::Release);
        }
        Ok(())
    }

    /// Bound the poll wait by the next timing boundary.
    fn poll_timeout(
        &self,
        started: bool,
        then: Instant,
        delay_ms: f64,
        total_wait: f64,
        gate_open: bool,
    ) -> Duration {
        if !started {
            // once this worker has counted in it is only waiting on the
            // others' atomic, which no event will announce
            return if self.counted_in {
                Duration::from_millis(1)
            } else {
                POLL_CEILING
            };
        }
        let boundary = if gate_open { total_wait } else { delay_ms };
        let remaining_ms = (boundary - clock::elapsed_ms(then)).max(0.0);
        Duration::from_secs_f64(remaining_ms / 1000.0).min(POLL_CEILING)
    }

    /// One multiplexer round: wait, deliver events, keep generators moving.
    fn poll_once(&mut self, timeout: Duration, gate_open: bool) -> Result<(), BenchError> {
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(BenchError::Io(e)),
        }

        self.event_scratch.clear();
        for ev in self.events.iter() {
            self.event_scratch
                .push((ev.token().0, ev.is_readable(), ev.is_writable()));
        }
        for i in 0..self.event_scratch.len() {
            let (idx, readable, writable) = self.event_scratch[i];
            let outcome = self.switches[idx].handle_io(readable, writable, gate_open)?;
            if outcome.initialized {
                self.note_initialized();
            }
            self.rearm(idx)?;
        }
        // keep generators moving even without events; state and gate decide
        // per switch whether anything is queued
        self.pump_all(gate_open)?;
        Ok(())
    }

    fn note_initialized(&mut self) {
        self.initialized += 1;
        debug!(
            "worker {}: {}/{} switches initialized",
            self.tid, self.initialized, self.cfg.switches_per_thread
        );
        if self.initialized >= self.cfg.switches_per_thread && !self.counted_in {
            self.counted_in = true;
            self.shared.threads_started.fetch_add(1, Ordering::Release);
            debug!("worker {}: all switches initialized, counted in", self.tid);
        }
    }

    /// Run every switch's generator/flush path and re-arm write interest.
    fn pump_all(&mut self, gate_open: bool) -> Result<(), BenchError> {
        for idx in 0..self.switches.len() {
            self.switches[idx].pump_write(gate_open)?;
            self.rearm(idx)?;
        }
        Ok(())
    }

    /// WRITABLE interest follows `outbuf` non-emptiness.
    fn rearm(&mut self, idx: usize) -> Result<(), BenchError> {
        let want = if self.switches[idx].outbuf_len() > 0 {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        if want != self.interests[idx] {
            self.poll
                .registry()
                .reregister(self.switches[idx].conn_mut(), Token(idx), want)?;
            self.interests[idx] = want;
        }
        Ok(())
    }

    /// Worker 0's per-loop reduction over the whole matrix. Returns the
    /// loop's rate when it falls inside the retained range.
    fn report_loop(&self, j: usize, loop_start: Instant, delay_ms: f64) -> Option<f64> {
        let mut flows_sum = 0.0;
        let mut line = format!(
            "{} {:<3} switches: flows:  ",
            clock::wall_clock_hms(),
            self.cfg.total_switches()
        );
        for cell in self.shared.results.iter() {
            let count = cell.load(Ordering::Acquire);
            line.push_str(&format!("{count} "));
            flows_sum += count as f64;
        }

        // The first loop absorbs startup skew: use the nominal window.
        let flows_per_ms = if j == 0 {
            flows_sum / self.cfg.ms_per_test as f64
        } else {
            flows_sum / (clock::elapsed_ms(loop_start) - delay_ms)
        };
        eprintln!("{line} total = {flows_per_ms:.6} per ms");

        if j < self.cfg.warmup || j >= self.cfg.loops - self.cfg.cooldown {
            return None;
        }
        Some(flows_per_ms * 1000.0)
    }

    /// Worker 0's end-of-run statistics and RESULT line.
    fn finalize(&self, retained: Vec<LoopRecord>) -> RunSummary {
        let values: Vec<f64> = retained.iter().map(|r| r.responses_per_sec).collect();
        let stats = LoopStats::compute(&values);
        eprintln!(
            "RESULT: {} switches {} tests min/max/avg/stdev = {:.2}/{:.2}/{:.2}/{:.2} responses/s",
            self.cfg.total_switches(),
            retained.len(),
            stats.min,
            stats.max,
            stats.avg,
            stats.stdev
        );
        let per_switch = self
            .shared
            .results
            .iter()
            .map(|cell| cell.load(Ordering::Acquire))
            .collect();
        RunSummary {
            switches: self.cfg.total_switches(),
            tests: retained.len(),
            stats,
            loops: retained,
            per_switch,
        }
    }
}
