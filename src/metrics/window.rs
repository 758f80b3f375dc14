//! Per-window accumulation state.
//!
//! A [`WindowState`] is owned by exactly one aggregator. Operations are
//! applied in arrival order and [`WindowState::flush`] turns everything
//! accumulated so far into a [`Snapshot`], leaving the window empty.

use crate::metrics::types::{MetricKind, OpKind, OpValue, Operation, Snapshot};
use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Utc};

/// Raw samples of one timer plus the sample-rate corrected event count.
#[derive(Debug, Clone, Default)]
pub struct TimerSamples {
    pub values: Vec<f64>,
    pub count: i64,
}

/// Everything a flush produces besides the snapshot itself: the names seen
/// this window, grouped by kind, for the registry.
#[derive(Debug, Default)]
pub struct FlushNames {
    pub primary: Vec<(String, MetricKind)>,
    pub derived: Vec<String>,
}

/// Accumulation state for the current flush interval.
#[derive(Debug, Default)]
pub struct WindowState {
    counters: AHashMap<String, i64>,
    timers: AHashMap<String, TimerSamples>,
    gauges: AHashMap<String, i64>,
    sets: AHashMap<String, AHashSet<String>>,
}

impl WindowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one operation to the window.
    pub fn apply(&mut self, op: Operation) {
        let divisor = op.rate_divisor();
        match (op.kind, op.value) {
            (OpKind::CounterAdd, OpValue::Int(v)) => {
                let delta = (v as f64 / divisor) as i64;
                let total = self.counters.entry(op.name).or_insert(0);
                *total = total.wrapping_add(delta);
            },
            (OpKind::TimerSample, OpValue::Float(v)) => {
                let timer = self.timers.entry(op.name).or_default();
                timer.values.push(v);
                timer.count = timer.count.wrapping_add((1.0 / divisor) as i64);
            },
            (OpKind::GaugeSet, OpValue::Int(v)) => {
                self.gauges.insert(op.name, v);
            },
            (OpKind::GaugeIncrement, OpValue::Int(v)) => {
                let gauge = self.gauges.entry(op.name).or_insert(0);
                *gauge = gauge.wrapping_add(v);
            },
            (OpKind::GaugeDecrement, OpValue::Int(v)) => {
                // No floor: a decrement on an absent gauge yields -v.
                let gauge = self.gauges.entry(op.name).or_insert(0);
                *gauge = gauge.wrapping_sub(v);
            },
            (OpKind::SetAdd, OpValue::Str(member)) => {
                self.sets.entry(op.name).or_default().insert(member);
            },
            (kind, value) => {
                tracing::debug!(?kind, ?value, "Dropping operation with mismatched payload");
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.timers.is_empty()
            && self.gauges.is_empty()
            && self.sets.is_empty()
    }

    /// Convert the window into a snapshot stamped `at` and reset it.
    pub fn flush(&mut self, at: DateTime<Utc>, percentiles: &[u32]) -> (Snapshot, FlushNames) {
        let mut snapshot = Snapshot::new(at);
        let mut names = FlushNames::default();

        for (name, total) in self.counters.drain() {
            snapshot.add(name.as_str(), total as f64);
            names.primary.push((name, MetricKind::Counter));
        }

        for (name, mut timer) in self.timers.drain() {
            if !timer.values.is_empty() {
                emit_timer(&name, &mut timer, percentiles, &mut snapshot, &mut names.derived);
            }
            names.primary.push((name, MetricKind::Timer));
        }

        for (name, value) in self.gauges.drain() {
            snapshot.add(name.as_str(), value as f64);
            names.primary.push((name, MetricKind::Gauge));
        }

        for (name, members) in self.sets.drain() {
            snapshot.add(name.as_str(), members.len() as f64);
            names.primary.push((name, MetricKind::Set));
        }

        (snapshot, names)
    }
}

fn emit_timer(
    name: &str,
    timer: &mut TimerSamples,
    percentiles: &[u32],
    snapshot: &mut Snapshot,
    derived: &mut Vec<String>,
) {
    let values = &mut timer.values;
    let mut total = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values.iter() {
        total += v;
        min = min.min(v);
        max = max.max(v);
    }
    let mean = total / values.len() as f64;

    if values.len() > 1 {
        values.sort_unstable_by(f64::total_cmp);
        for &p in percentiles {
            if let Some(value) = nearest_rank(values, p) {
                let metric = format!("{}.upper_{}", name, p);
                snapshot.add(metric.as_str(), value);
                derived.push(metric);
            }
        }
    }

    for (suffix, value) in [
        ("mean", mean),
        ("lower", min),
        ("upper", max),
        ("count", timer.count as f64),
    ] {
        let metric = format!("{}.{}", name, suffix);
        snapshot.add(metric.as_str(), value);
        derived.push(metric);
    }
}

/// Nearest-rank percentile of an ascending slice.
///
/// `rank = round(p / 100 * len)`; `None` when the rank falls outside
/// `1..=len`.
pub fn nearest_rank(sorted: &[f64], p: u32) -> Option<f64> {
    let rank = (f64::from(p) / 100.0 * sorted.len() as f64).round() as usize;
    if rank >= 1 && rank <= sorted.len() {
        Some(sorted[rank - 1])
    } else {
        None
    }
}
