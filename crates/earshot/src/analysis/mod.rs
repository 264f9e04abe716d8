//! Streaming analysis
//!
//! Block transform, the analyzing source decorator, and the snapshot
//! publisher that hands results to the presentation loop.

pub mod analyzer;
pub mod snapshot;
pub mod transform;

pub use analyzer::AnalyzingSource;
pub use snapshot::{FeatureSnapshot, SharedPublisher, SnapshotPublisher};
pub use transform::BlockTransform;
