//! Stats Module
//!
//! Process-wide registry of per-service and per-key cache metrics.

mod model;
mod registry;

pub use model::{CacheInstanceStats, KeyStats};
pub use registry::{StatsEvent, StatsEventKind, StatsRegistry};

pub(crate) use registry::{KeyWrite, Registration, StatsReporter};
