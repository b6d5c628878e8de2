//! Debug probe store (spec.md §6 "Debug probe", §4.10 step 5 `debugProbe`).
//!
//! Purely a side channel: recording into it never affects slot values, the
//! schedule, or any fault path. A probe read returns the current cached
//! value plus a mode-specific summary.

use std::collections::HashMap;

use core_model::{ProbeMode, ProbeSpec, ProbeSummary, ProbeTarget};

const HISTOGRAM_BUCKETS: usize = 16;

#[derive(Debug, Clone)]
struct Histogram {
    min: f64,
    max: f64,
    counts: [u32; HISTOGRAM_BUCKETS],
}

impl Histogram {
    fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            counts: [0; HISTOGRAM_BUCKETS],
        }
    }

    fn observe(&mut self, v: f64) {
        if !v.is_finite() {
            return;
        }
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        let span = self.max - self.min;
        let bucket = if span <= 0.0 {
            0
        } else {
            (((v - self.min) / span) * (HISTOGRAM_BUCKETS - 1) as f64).round() as usize
        };
        self.counts[bucket.min(HISTOGRAM_BUCKETS - 1)] += 1;
    }

    fn summary(&self) -> ProbeSummary {
        ProbeSummary::Vector(self.counts.iter().map(|&c| c as f64).collect())
    }
}

/// Mutable recording side-channel a frame populates while dispatching
/// `debugProbe` steps. Lives alongside the Runtime State but is never part
/// of hot-swap's preserved surface — a probe is a debugging aid, not
/// program state (spec.md §4.11 only preserves state cells, time, and
/// frame counters).
#[derive(Debug, Default)]
pub struct ProbeStore {
    latest: HashMap<String, ProbeSummary>,
    diff_prev: HashMap<String, f64>,
    histograms: HashMap<String, Histogram>,
}

impl ProbeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one probe's reading for this frame, given the current value of
    /// its target (already resolved by the caller via the Value Store or
    /// Signal Evaluator).
    pub fn record(&mut self, spec: &ProbeSpec, current: f64) {
        let summary = match spec.mode {
            ProbeMode::Value => ProbeSummary::Numeric(current),
            ProbeMode::Diff => {
                let prev = self.diff_prev.insert(spec.name.clone(), current);
                ProbeSummary::Numeric(current - prev.unwrap_or(current))
            }
            ProbeMode::Histogram => {
                let hist = self.histograms.entry(spec.name.clone()).or_insert_with(Histogram::new);
                hist.observe(current);
                hist.summary()
            }
        };
        tracing::trace!(target: "exec.probe", name = %spec.name, probe_target = ?spec.target, "recorded");
        self.latest.insert(spec.name.clone(), summary);
    }

    /// Read back the most recent summary for a named probe, or
    /// [`ProbeSummary::Unavailable`] if it has never fired.
    pub fn read(&self, name: &str) -> ProbeSummary {
        self.latest.get(name).cloned().unwrap_or(ProbeSummary::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::SlotId;

    fn spec(mode: ProbeMode) -> ProbeSpec {
        ProbeSpec {
            name: "p".into(),
            target: ProbeTarget::Slot(SlotId(0)),
            mode,
        }
    }

    #[test]
    fn value_mode_reports_current() {
        let mut store = ProbeStore::new();
        store.record(&spec(ProbeMode::Value), 3.0);
        assert_eq!(store.read("p"), ProbeSummary::Numeric(3.0));
    }

    #[test]
    fn diff_mode_reports_zero_on_first_sample_then_delta() {
        let mut store = ProbeStore::new();
        let s = spec(ProbeMode::Diff);
        store.record(&s, 5.0);
        assert_eq!(store.read("p"), ProbeSummary::Numeric(0.0));
        store.record(&s, 8.0);
        assert_eq!(store.read("p"), ProbeSummary::Numeric(3.0));
    }

    #[test]
    fn histogram_mode_counts_observations() {
        let mut store = ProbeStore::new();
        let s = spec(ProbeMode::Histogram);
        for v in [0.0, 1.0, 2.0, 1.0] {
            store.record(&s, v);
        }
        let ProbeSummary::Vector(buckets) = store.read("p") else {
            panic!("expected vector summary");
        };
        assert_eq!(buckets.iter().sum::<f64>(), 4.0);
    }

    #[test]
    fn unrecorded_probe_is_unavailable() {
        let store = ProbeStore::new();
        assert_eq!(store.read("nope"), ProbeSummary::Unavailable);
    }
}
