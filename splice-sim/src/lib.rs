//! Splice Simulation Framework - Deterministic playback of segmented media.
//!
//! Generates seeded segment layouts and plays them through a real media
//! source reader, the way a playback engine and an appender would, then
//! validates the delivered sample timeline against playback invariants.
//!
//! # Features
//!
//! - **Deterministic Layouts**: Same seed always produces identical segments
//! - **Estimate Jitter**: Samples end short of each segment's estimated end
//! - **Boundary Conditions**: Gaps below the fuzz tolerance, overlaps, late appends
//! - **Invariant Checking**: Monotonic playback, bounded gaps, end of stream
//!
//! # Example
//!
//! ```rust,no_run
//! use splice_core::config::SpliceConfig;
//! use splice_sim::{ScenarioKind, ScenarioRunner};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = ScenarioRunner::new(SpliceConfig::for_testing());
//! let report = runner.run(ScenarioKind::Gapped).await?;
//! println!("{}", report.to_json()?);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]

pub mod deterministic;
pub mod error;
pub mod invariants;
pub mod playback;
pub mod scenarios;

pub use deterministic::DeterministicRng;
pub use error::SimulationError;
pub use invariants::{
    Invariant, InvariantViolation, MaxGapInvariant, MonotonicPlaybackInvariant,
    ReachesEndInvariant, SegmentOrderInvariant, check_invariants, default_invariants,
};
pub use playback::{PlaybackDriver, PlaybackReport, TrackReport};
pub use scenarios::{Scenario, ScenarioBuilder, ScenarioKind, ScenarioRunner, SegmentPlan};
// Re-export config from core for convenience
pub use splice_core::config::SimulationConfig;
