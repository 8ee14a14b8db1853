//! Scenario runner and invariant validation.

use splice_core::config::SpliceConfig;

use super::builders::ScenarioBuilder;
use super::types::ScenarioKind;
use crate::invariants::{check_invariants, default_invariants};
use crate::playback::{PlaybackDriver, PlaybackReport};
use crate::SimulationError;

const DEFAULT_SEGMENTS: usize = 8;

/// Builds, plays and validates scenarios with one configuration.
pub struct ScenarioRunner {
    config: SpliceConfig,
    segments: usize,
}

impl ScenarioRunner {
    /// Creates new runner. The simulation section must carry a seed.
    pub fn new(config: SpliceConfig) -> Self {
        Self {
            config,
            segments: DEFAULT_SEGMENTS,
        }
    }

    pub fn segments(mut self, segments: usize) -> Self {
        self.segments = segments;
        self
    }

    /// Runs one scenario and attaches any invariant violations to its report.
    ///
    /// # Errors
    /// - `SimulationError::NoDeterministicSeed` - Config has no seed
    /// - `SimulationError::InvalidScenario` - Layout parameters rejected
    /// - Any playback error from `PlaybackDriver::run`
    pub async fn run(&self, kind: ScenarioKind) -> Result<PlaybackReport, SimulationError> {
        let scenario = ScenarioBuilder::from_config(kind, &self.config)?
            .segments(self.segments)
            .build()?;

        let mut report = PlaybackDriver::new(self.config.clone())
            .run(&scenario)
            .await?;

        let tolerance = self.config.reader.eos_fuzz
            + std::time::Duration::from_millis(self.config.simulation.duration_jitter_ms);
        report.violations = check_invariants(&report, &default_invariants(tolerance));

        tracing::info!(
            "Scenario {} finished with {} violation(s)",
            kind,
            report.violations.len()
        );
        Ok(report)
    }

    /// Runs every scenario kind in turn.
    pub async fn run_all(&self) -> Vec<(ScenarioKind, Result<PlaybackReport, SimulationError>)> {
        let mut results = Vec::with_capacity(ScenarioKind::ALL.len());
        for kind in ScenarioKind::ALL {
            results.push((kind, self.run(kind).await));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use splice_core::TrackType;

    use super::*;

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(SpliceConfig::for_testing()).segments(4)
    }

    #[tokio::test]
    async fn test_every_scenario_plays_cleanly() {
        for (kind, result) in runner().run_all().await {
            let report = result.unwrap_or_else(|error| panic!("{kind} failed: {error}"));
            assert!(report.is_clean(), "{kind}: {:?}", report.violations);
            assert_eq!(report.scenario, kind);
        }
    }

    #[tokio::test]
    async fn test_overlapping_switches_early() {
        let report = runner().run(ScenarioKind::Overlapping).await.unwrap();

        let audio = report.track(TrackType::Audio).unwrap();
        assert_eq!(audio.readers_used.len(), 4);
        // Overlapped tails are skipped, so playback is shorter than the
        // sum of the segments.
        assert!(audio.samples < 4 * 20);
    }

    #[tokio::test]
    async fn test_missing_seed_is_rejected() {
        let result = ScenarioRunner::new(SpliceConfig::default())
            .run(ScenarioKind::Contiguous)
            .await;
        assert!(matches!(result, Err(SimulationError::NoDeterministicSeed)));
    }
}
