//! Pre-built segment layouts for exercising the media source reader.
//!
//! Provides seeded scenarios that reproduce the segment boundary conditions
//! the reader has to bridge: estimated ends that overshoot the real samples,
//! small gaps, overlaps and data that arrives late.

pub mod builders;
pub mod runner;
pub mod types;

// Re-export main types
pub use builders::ScenarioBuilder;
pub use runner::ScenarioRunner;
pub use types::{Scenario, ScenarioKind, SegmentPlan};
