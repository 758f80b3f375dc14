//! Core metric types shared by the parser, aggregator and store.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a parsed statsd line asks the aggregator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// `c`: add to a counter
    CounterAdd,
    /// `ms`: record a timer sample
    TimerSample,
    /// `g` without sign, and `h`: replace a gauge
    GaugeSet,
    /// `g` with a `+` prefix
    GaugeIncrement,
    /// `g` with a `-` prefix
    GaugeDecrement,
    /// `s`: add a member to a set
    SetAdd,
}

/// Payload of an operation. Which variant is present follows from the kind.
#[derive(Debug, Clone, PartialEq)]
pub enum OpValue {
    /// Counter deltas and gauge values. Decrements carry the magnitude.
    Int(i64),
    /// Timer samples
    Float(f64),
    /// Set members
    Str(String),
}

/// One parsed statsd update, consumed exactly once by the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OpKind,
    pub name: String,
    pub value: OpValue,
    /// Client side sample rate; `None` means full rate.
    pub sample_rate: Option<f64>,
}

impl Operation {
    pub fn new(kind: OpKind, name: impl Into<String>, value: OpValue) -> Self {
        Self {
            kind,
            name: name.into(),
            value,
            sample_rate: None,
        }
    }

    pub fn with_sample_rate(mut self, rate: Option<f64>) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Divisor used to extrapolate sampled values. Absent and zero rates
    /// both count as full rate.
    #[inline]
    pub fn rate_divisor(&self) -> f64 {
        match self.sample_rate {
            Some(rate) if rate > 0.0 => rate,
            _ => 1.0,
        }
    }
}

/// Kind under which a metric name is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Timer,
    Gauge,
    Set,
    /// Names synthesized from timers (`.mean`, `.upper_95`, ...)
    Derived,
}

/// Immutable result of one flush.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub at: DateTime<Utc>,
    pub metrics: AHashMap<String, f64>,
}

impl Snapshot {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            metrics: AHashMap::new(),
        }
    }

    #[inline]
    pub fn add(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// One row of a range query: a snapshot time and a value per requested
/// name, `None` where the snapshot had no entry for that name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datapoint {
    pub at: DateTime<Utc>,
    pub values: Vec<Option<f64>>,
}
