//! # flowbench-core
//!
//! Core of the flowbench OpenFlow controller benchmark.
//!
//! The harness impersonates a fleet of OpenFlow 1.0 switches: it opens one
//! TCP connection per fake switch to the controller under test, completes
//! the version/features handshake, optionally primes the controller's MAC
//! table with gratuitous ARP replies, then drives a measured packet-in
//! workload and counts the PACKET_OUT/FLOW_MOD responses.
//!
//! Two workload modes:
//! - **latency**: at most one probe in flight per switch, so the rate
//!   bounds the controller's round-trip time;
//! - **throughput**: the send path is kept saturated with batched probes.
//!
//! ## Architecture
//!
//! ```text
//! harness ─▶ worker threads ─▶ mio Poll ─▶ fakeswitch ─▶ wire/payload
//!    │            │
//!    │            └─▶ per-window counts → shared result matrix
//!    └─▶ barrier + threads_started gate → worker 0 reduces & reports
//! ```
//!
//! Workers share nothing but an atomic start counter, a reusable barrier
//! and the partitioned count matrix; all socket I/O is non-blocking and
//! single-threaded within a worker.
//!
//! ## Quick start
//!
//! ```no_run
//! use flowbench_core::{BenchConfig, Mode, harness};
//!
//! let cfg = BenchConfig {
//!     controller: "localhost".into(),
//!     port: 6653,
//!     total_threads: 2,
//!     switches_per_thread: 8,
//!     mode: Mode::Throughput,
//!     ..Default::default()
//! };
//! let summary = harness::run(&cfg).expect("benchmark run");
//! println!("avg {:.2} responses/s", summary.stats.avg);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod fakeswitch;
pub mod harness;
pub mod msgbuf;
pub mod payload;
pub mod stats;
pub mod transport;
pub mod wire;
pub mod worker;

pub use config::{BenchConfig, Mode};
pub use error::BenchError;
pub use stats::{LoopRecord, LoopStats, RunSummary};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
