// Part-history data layer
//
// This module provides the read-only part hierarchy and the asynchronous
// fetch path the tree projector uses to load children on demand.

pub mod backend;
pub mod error;
pub mod manager;
pub mod slow;
pub mod source;

pub use backend::{HistoryBackend, HistoryEntry};
pub use error::{HistoryError, Result};
pub use manager::HistoryManager;
pub use slow::{BackendMetrics, SlowHistoryBackend, SlowHistoryConfig};
pub use source::HierarchySource;
