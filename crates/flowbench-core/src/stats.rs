//! Per-loop records and the end-of-run statistical reduction.
//!
//! Worker 0 retains the per-loop rates for loops in
//! `[warmup, loops − cooldown)` and reduces them to min/max/avg and the
//! population standard deviation. The records are serde-serializable so the
//! CLI can write a machine-readable report next to the stderr lines.

use serde::{Deserialize, Serialize};

/// One retained measurement loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopRecord {
    /// Loop index within the run.
    pub index: usize,
    /// Aggregate responses per second across all switches.
    pub responses_per_sec: f64,
}

/// Min/max/mean/population-stdev over a set of per-loop rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub stdev: f64,
}

impl LoopStats {
    /// Reduce `values`; all zeros for an empty set.
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                min: 0.0,
                max: 0.0,
                avg: 0.0,
                stdev: 0.0,
            };
        }
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sum = 0.0;
        for &v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let avg = sum / values.len() as f64;
        let variance =
            values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
        Self {
            min,
            max,
            avg,
            stdev: variance.sqrt(),
        }
    }
}

/// Complete result of a benchmark run, produced by worker 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total fake switches across all workers.
    pub switches: usize,
    /// Loops retained for statistics (loops − warmup − cooldown).
    pub tests: usize,
    /// Reduction over the retained loops.
    pub stats: LoopStats,
    /// Retained per-loop rates, in loop order.
    pub loops: Vec<LoopRecord>,
    /// Per-switch response counts harvested in the final loop.
    pub per_switch: Vec<u64>,
}
