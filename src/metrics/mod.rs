//! statsd aggregation core.
//!
//! Data flows one way:
//! receivers → [`parser`] → ingestion queue → [`aggregator`] → {[`registry`], [`ring_buffer`]}.
//! Query consumers only ever read the registry and the ring buffer.

pub mod aggregator;
pub mod parser;
pub mod registry;
pub mod ring_buffer;
pub mod types;
pub mod window;

pub use aggregator::{ingestion_queue, Aggregator, OperationReceiver, OperationSender};
pub use parser::{parse_line, ParseError};
pub use registry::{MetricListing, MetricRegistry};
pub use ring_buffer::SnapshotRing;
pub use types::{Datapoint, MetricKind, OpKind, OpValue, Operation, Snapshot};
pub use window::WindowState;
