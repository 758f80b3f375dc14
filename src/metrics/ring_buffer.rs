//! Fixed-capacity circular store of flushed snapshots.
//!
//! The capacity is set once at construction. Appending to a full buffer
//! overwrites the oldest snapshot. Queries walk the slots oldest first.

use crate::metrics::types::{Datapoint, Snapshot};
use parking_lot::RwLock;
use std::sync::Arc;

struct Slots {
    values: Box<[Option<Arc<Snapshot>>]>,
    /// Next slot to write; when the buffer is full this is also the oldest.
    head: usize,
}

/// Ring buffer of snapshots, written by the aggregator and read by queries.
pub struct SnapshotRing {
    slots: RwLock<Slots>,
    capacity: usize,
}

impl SnapshotRing {
    /// Create a new ring buffer holding at most `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");

        Self {
            slots: RwLock::new(Slots {
                values: vec![None; capacity].into_boxed_slice(),
                head: 0,
            }),
            capacity,
        }
    }

    /// Store a snapshot at the head, evicting the oldest once full.
    pub fn append(&self, snapshot: Snapshot) {
        let mut slots = self.slots.write();
        let head = slots.head;
        slots.values[head] = Some(Arc::new(snapshot));
        slots.head = (head + 1) % self.capacity;
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.read().values.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All retained snapshots, oldest first.
    pub fn snapshots(&self) -> Vec<Arc<Snapshot>> {
        let slots = self.slots.read();
        (0..self.capacity)
            .filter_map(|i| slots.values[(slots.head + i) % self.capacity].clone())
            .collect()
    }

    /// Sparse multi-metric range query.
    ///
    /// One row per retained snapshot, oldest first, with a value per
    /// requested name (`None` where the snapshot lacks it). Rows where every
    /// requested name is missing are dropped.
    pub fn query_range<S: AsRef<str>>(&self, names: &[S]) -> Vec<Datapoint> {
        let slots = self.slots.read();
        let mut rows = Vec::with_capacity(self.capacity);

        for i in 0..self.capacity {
            let Some(snapshot) = &slots.values[(slots.head + i) % self.capacity] else {
                continue;
            };

            let values: Vec<Option<f64>> =
                names.iter().map(|name| snapshot.get(name.as_ref())).collect();

            if values.iter().any(Option::is_some) {
                rows.push(Datapoint {
                    at: snapshot.at,
                    values,
                });
            }
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot(secs: i64, metrics: &[(&str, f64)]) -> Snapshot {
        let mut snapshot = Snapshot::new(Utc.timestamp_opt(secs, 0).unwrap());
        for (name, value) in metrics {
            snapshot.add(*name, *value);
        }
        snapshot
    }

    #[test]
    fn test_ring_buffer_creation() {
        let ring = SnapshotRing::new(8);

        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
        assert!(ring.query_range(&["a"]).is_empty());
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        SnapshotRing::new(0);
    }

    #[test]
    fn test_query_oldest_first() {
        let ring = SnapshotRing::new(4);
        for i in 0..3 {
            ring.append(snapshot(i, &[("a", i as f64)]));
        }

        let rows = ring.query_range(&["a"]);
        let values: Vec<_> = rows.iter().map(|row| row.values[0]).collect();
        assert_eq!(values, vec![Some(0.0), Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_wraparound() {
        let ring = SnapshotRing::new(3);
        for i in 0..4 {
            ring.append(snapshot(i, &[("a", i as f64)]));
        }

        let rows = ring.query_range(&["a"]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].at.timestamp(), 1);
        assert_eq!(rows[2].at.timestamp(), 3);
        assert!(rows.iter().all(|row| row.values[0] != Some(0.0)));
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_capacity_one_keeps_latest() {
        let ring = SnapshotRing::new(1);
        ring.append(snapshot(1, &[("a", 1.0)]));
        ring.append(snapshot(2, &[("a", 2.0)]));

        let rows = ring.query_range(&["a"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![Some(2.0)]);
    }

    #[test]
    fn test_sparse_rows() {
        let ring = SnapshotRing::new(4);
        ring.append(snapshot(1, &[("a", 1.0), ("b", 2.0)]));
        ring.append(snapshot(2, &[("c", 9.0)]));
        ring.append(snapshot(3, &[("a", 3.0)]));

        let rows = ring.query_range(&["a", "b"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values, vec![Some(1.0), Some(2.0)]);
        assert_eq!(rows[1].at.timestamp(), 3);
        assert_eq!(rows[1].values, vec![Some(3.0), None]);
    }

    #[test]
    fn test_concurrent_readers() {
        use std::thread;

        let ring = Arc::new(SnapshotRing::new(16));
        let writer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for i in 0..100 {
                    ring.append(snapshot(i, &[("a", i as f64), ("b", i as f64)]));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for _ in 0..100 {
                        // A row is never half written.
                        for row in ring.query_range(&["a", "b"]) {
                            assert_eq!(row.values[0], row.values[1]);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(ring.len(), 16);
    }
}
