//! Run configuration.
//!
//! One record describes an entire benchmark: the controller endpoint, the
//! switch topology (threads × switches), the measurement schedule and the
//! workload mode. The CLI fills it from flags; tests build it directly.

use crate::error::BenchError;

/// Workload mode driven by each fake switch once the handshake completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// At most one packet-in outstanding per switch; measures round-trips.
    #[default]
    Latency,
    /// Saturate the send path with batched packet-ins.
    Throughput,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latency => write!(f, "latency"),
            Self::Throughput => write!(f, "throughput"),
        }
    }
}

/// Complete configuration for one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Controller hostname.
    pub controller: String,
    /// Controller TCP port.
    pub port: u16,
    /// Measurement loops per run.
    pub loops: usize,
    /// Length of one measurement window in milliseconds.
    pub ms_per_test: u64,
    /// Distinct source MAC addresses rotated through by each switch.
    pub mac_addresses: u32,
    /// Workload mode.
    pub mode: Mode,
    /// Leading loops excluded from the final statistics.
    pub warmup: usize,
    /// Trailing loops excluded from the final statistics.
    pub cooldown: usize,
    /// Settling delay after all switches are initialized, in milliseconds.
    /// Applies to the first loop only.
    pub delay_ms: u64,
    /// Pause between opening switch connections, in nanoseconds.
    pub switch_add_delay_ns: u64,
    /// Fake switches owned by each worker thread.
    pub switches_per_thread: usize,
    /// Pause between spawning worker threads, in milliseconds.
    pub delay_per_thread_ms: u64,
    /// Worker thread count.
    pub total_threads: usize,
    /// Prime the controller with gratuitous ARP replies before measuring.
    pub learn_dst_macs: bool,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            controller: "localhost".to_string(),
            port: 6653,
            loops: 16,
            ms_per_test: 1000,
            mac_addresses: 100_000,
            mode: Mode::Latency,
            warmup: 1,
            cooldown: 0,
            delay_ms: 0,
            switch_add_delay_ns: 0,
            switches_per_thread: 1,
            delay_per_thread_ms: 1,
            total_threads: 1,
            learn_dst_macs: true,
            connect_timeout_ms: 3000,
        }
    }
}

impl BenchConfig {
    /// Total fake switches across all workers.
    pub fn total_switches(&self) -> usize {
        self.total_threads * self.switches_per_thread
    }

    /// Loops retained for the final statistics.
    pub fn counted_tests(&self) -> usize {
        self.loops
            .saturating_sub(self.warmup)
            .saturating_sub(self.cooldown)
    }

    /// Reject configurations that cannot produce a meaningful run.
    /// Called before any connection is opened.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.total_threads == 0 {
            return Err(BenchError::Config("total-threads must be at least 1".into()));
        }
        if self.switches_per_thread == 0 {
            return Err(BenchError::Config(
                "switches-per-thread must be at least 1".into(),
            ));
        }
        if self.loops == 0 {
            return Err(BenchError::Config("loops must be at least 1".into()));
        }
        if self.ms_per_test == 0 {
            return Err(BenchError::Config("ms-per-test must be at least 1".into()));
        }
        if self.mac_addresses == 0 {
            return Err(BenchError::Config("mac-addresses must be at least 1".into()));
        }
        if self.warmup + self.cooldown >= self.loops {
            return Err(BenchError::Config(format!(
                "warmup ({}) + cooldown ({}) must leave at least one of {} loops",
                self.warmup, self.cooldown, self.loops
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_flag_table() {
        let cfg = BenchConfig::default();
        assert_eq!(cfg.controller, "localhost");
        assert_eq!(cfg.port, 6653);
        assert_eq!(cfg.loops, 16);
        assert_eq!(cfg.ms_per_test, 1000);
        assert_eq!(cfg.mac_addresses, 100_000);
        assert_eq!(cfg.mode, Mode::Latency);
        assert_eq!(cfg.warmup, 1);
        assert_eq!(cfg.cooldown, 0);
        assert!(cfg.learn_dst_macs);
        assert_eq!(cfg.connect_timeout_ms, 3000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn counted_tests_excludes_warmup_and_cooldown() {
        let cfg = BenchConfig {
            loops: 16,
            warmup: 2,
            cooldown: 3,
            ..Default::default()
        };
        assert_eq!(cfg.counted_tests(), 11);
    }

    #[test]
    fn rejects_empty_retained_set() {
        let cfg = BenchConfig {
            loops: 3,
            warmup: 2,
            cooldown: 1,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BenchError::Config(_))));
    }

    #[test]
    fn rejects_zero_counts() {
        for field in ["threads", "switches", "loops", "ms", "macs"] {
            let mut cfg = BenchConfig::default();
            match field {
                "threads" => cfg.total_threads = 0,
                "switches" => cfg.switches_per_thread = 0,
                "loops" => cfg.loops = 0,
                "ms" => cfg.ms_per_test = 0,
                _ => cfg.mac_addresses = 0,
            }
            assert!(cfg.validate().is_err(), "expected rejection for {field}");
        }
    }

    #[test]
    fn mode_labels() {
        assert_eq!(Mode::Latency.to_string(), "latency");
        assert_eq!(Mode::Throughput.to_string(), "throughput");
    }
}
