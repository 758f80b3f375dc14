//! Process-wide map from metric name to [`MetricKind`].
//!
//! Written by the aggregator once per flush and read concurrently by the
//! query API. All access goes through one `RwLock` so readers never see a
//! half-applied flush.

use crate::metrics::types::MetricKind;
use ahash::AHashMap;
use parking_lot::RwLock;
use serde::Serialize;

/// Known names of the four primary kinds, each sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricListing {
    pub counters: Vec<String>,
    pub timers: Vec<String>,
    pub gauges: Vec<String>,
    pub sets: Vec<String>,
}

impl MetricListing {
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.timers.is_empty()
            && self.gauges.is_empty()
            && self.sets.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MetricRegistry {
    names: RwLock<AHashMap<String, MetricKind>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the primary names seen in one window. A name that changes kind
    /// takes the latest one.
    pub fn record_primary<I>(&self, names: I)
    where
        I: IntoIterator<Item = (String, MetricKind)>,
    {
        let mut map = self.names.write();
        for (name, kind) in names {
            map.insert(name, kind);
        }
    }

    /// Mark names synthesized from timers.
    pub fn record_derived<I>(&self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut map = self.names.write();
        for name in names {
            map.insert(name, MetricKind::Derived);
        }
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.names.read().get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }

    /// Names grouped by primary kind, derived names excluded.
    pub fn list_by_kind(&self) -> MetricListing {
        let mut listing = MetricListing::default();
        {
            let map = self.names.read();
            for (name, kind) in map.iter() {
                let bucket = match kind {
                    MetricKind::Counter => &mut listing.counters,
                    MetricKind::Timer => &mut listing.timers,
                    MetricKind::Gauge => &mut listing.gauges,
                    MetricKind::Set => &mut listing.sets,
                    MetricKind::Derived => continue,
                };
                bucket.push(name.clone());
            }
        }
        listing.counters.sort_unstable();
        listing.timers.sort_unstable();
        listing.gauges.sort_unstable();
        listing.sets.sort_unstable();
        listing
    }

    /// Every known name, derived ones included, starting with `prefix`,
    /// sorted lexicographically.
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .names
            .read()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        out.sort_unstable();
        out
    }

    /// [`find_by_prefix`](Self::find_by_prefix) for each prefix in turn,
    /// concatenated in input order.
    pub fn find_all_by_prefixes<S: AsRef<str>>(&self, prefixes: &[S]) -> Vec<String> {
        prefixes
            .iter()
            .flat_map(|prefix| self.find_by_prefix(prefix.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> MetricRegistry {
        let registry = MetricRegistry::new();
        registry.record_primary(vec![
            ("api.hits".to_string(), MetricKind::Counter),
            ("api.latency".to_string(), MetricKind::Timer),
            ("queue.depth".to_string(), MetricKind::Gauge),
            ("users".to_string(), MetricKind::Set),
        ]);
        registry.record_derived(vec![
            "api.latency.mean".to_string(),
            "api.latency.upper_95".to_string(),
        ]);
        registry
    }

    #[test]
    fn test_list_by_kind_excludes_derived() {
        let listing = registry().list_by_kind();
        assert_eq!(
            listing,
            MetricListing {
                counters: vec!["api.hits".to_string()],
                timers: vec!["api.latency".to_string()],
                gauges: vec!["queue.depth".to_string()],
                sets: vec!["users".to_string()],
            }
        );
        assert!(!listing.is_empty());
    }

    #[test]
    fn test_find_by_prefix_includes_derived() {
        assert_eq!(
            registry().find_by_prefix("api.latency"),
            vec!["api.latency", "api.latency.mean", "api.latency.upper_95"]
        );
        assert!(registry().find_by_prefix("nope").is_empty());
    }

    #[test]
    fn test_find_all_preserves_prefix_order() {
        assert_eq!(
            registry().find_all_by_prefixes(&["users", "api.h"]),
            vec!["users", "api.hits"]
        );
    }

    #[test]
    fn test_last_kind_wins() {
        let registry = registry();
        registry.record_primary(vec![("users".to_string(), MetricKind::Gauge)]);
        assert_eq!(registry.kind_of("users"), Some(MetricKind::Gauge));
        assert_eq!(registry.len(), 6);
    }
}
