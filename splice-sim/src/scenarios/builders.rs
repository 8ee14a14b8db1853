//! Seeded segment layout generation.

use std::time::Duration;

use splice_core::TrackType;
use splice_core::config::SpliceConfig;

use super::types::{Scenario, ScenarioKind, SegmentPlan};
use crate::{DeterministicRng, SimulationError};

const DEFAULT_SEGMENT_COUNT: usize = 8;
const DEFAULT_SEGMENT_LENGTH: Duration = Duration::from_secs(2);
const AUDIO_SAMPLE_DURATION: Duration = Duration::from_millis(100);
const VIDEO_SAMPLE_DURATION: Duration = Duration::from_millis(250);
const VIDEO_KEYFRAME_INTERVAL: usize = 4;

/// Builder for a single scenario layout.
///
/// The same kind, seed and parameters always produce the same segments.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    kind: ScenarioKind,
    seed: u64,
    segment_count: usize,
    segment_length: Duration,
    jitter: Duration,
    fuzz: Duration,
}

impl ScenarioBuilder {
    pub fn new(kind: ScenarioKind, seed: u64) -> Self {
        Self {
            kind,
            seed,
            segment_count: DEFAULT_SEGMENT_COUNT,
            segment_length: DEFAULT_SEGMENT_LENGTH,
            jitter: Duration::from_millis(40),
            fuzz: Duration::from_millis(125),
        }
    }

    /// Builder seeded and tuned from the simulation section of `config`.
    ///
    /// # Errors
    /// - `SimulationError::NoDeterministicSeed` - No seed provided in config
    pub fn from_config(kind: ScenarioKind, config: &SpliceConfig) -> Result<Self, SimulationError> {
        let seed = config
            .simulation
            .deterministic_seed
            .ok_or(SimulationError::NoDeterministicSeed)?;

        Ok(Self::new(kind, seed)
            .jitter(Duration::from_millis(config.simulation.duration_jitter_ms))
            .fuzz(config.reader.eos_fuzz))
    }

    pub fn segments(mut self, count: usize) -> Self {
        self.segment_count = count;
        self
    }

    pub fn segment_length(mut self, length: Duration) -> Self {
        self.segment_length = length;
        self
    }

    /// Maximum amount a segment's samples fall short of its estimated end.
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Tolerance the reader under test uses; bounds generated gaps.
    pub fn fuzz(mut self, fuzz: Duration) -> Self {
        self.fuzz = fuzz;
        self
    }

    /// Generate the layout.
    ///
    /// # Errors
    /// - `SimulationError::InvalidScenario` - Parameters cannot produce a
    ///   playable layout
    pub fn build(self) -> Result<Scenario, SimulationError> {
        self.validate()?;

        let mut rng = DeterministicRng::from_seed(self.seed);
        let boundaries = self.boundaries(&mut rng);
        let duration = boundaries
            .last()
            .map(|(_, end)| *end)
            .unwrap_or(Duration::ZERO);
        let append_ahead = match self.kind {
            ScenarioKind::LateAppend => 1,
            _ => boundaries.len(),
        };
        let jitter_ms = self.jitter.as_millis() as u64;

        let mut segments = Vec::with_capacity(boundaries.len() * 2);
        for (index, (start, reported_end)) in boundaries.into_iter().enumerate() {
            let mut pair = TrackType::ALL.map(|track| {
                let shortfall = Duration::from_millis(rng.random_range(0, jitter_ms + 1));
                let (sample_duration, keyframe_interval) = match track {
                    TrackType::Audio => (AUDIO_SAMPLE_DURATION, 1),
                    TrackType::Video => (VIDEO_SAMPLE_DURATION, VIDEO_KEYFRAME_INTERVAL),
                };
                SegmentPlan {
                    id: index as u64 * 2 + if track == TrackType::Audio { 1 } else { 2 },
                    track,
                    start,
                    reported_end,
                    sample_end: reported_end - shortfall,
                    sample_duration,
                    keyframe_interval,
                    deferred: index >= append_ahead,
                }
            });
            if rng.random_bool(0.5) {
                pair.reverse();
            }
            segments.extend(pair);
        }

        let seek_to = match self.kind {
            ScenarioKind::Seek => Some(duration * 2 / 5),
            _ => None,
        };

        tracing::debug!(
            "Built {} scenario: seed={} segments={} duration={:?}",
            self.kind,
            self.seed,
            segments.len(),
            duration
        );

        Ok(Scenario {
            kind: self.kind,
            seed: self.seed,
            segments,
            duration,
            seek_to,
        })
    }

    fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |reason: &str| -> Result<(), SimulationError> {
            Err(SimulationError::InvalidScenario {
                reason: reason.to_string(),
            })
        };

        if self.segment_count == 0 {
            return invalid("at least one segment is required");
        }
        if self.segment_length < VIDEO_SAMPLE_DURATION * 4 {
            return invalid("segments must hold at least four video samples");
        }
        if self.jitter * 2 >= self.segment_length {
            return invalid("jitter must be under half the segment length");
        }
        if self.kind == ScenarioKind::Gapped && self.fuzz <= Duration::from_millis(1) {
            return invalid("gapped layouts need a fuzz tolerance above 1ms");
        }
        Ok(())
    }

    /// Estimated `[start, end)` of every segment, shared by both tracks so
    /// they end together.
    fn boundaries(&self, rng: &mut DeterministicRng) -> Vec<(Duration, Duration)> {
        let fuzz_ms = self.fuzz.as_millis() as u64;
        let overlap_min = VIDEO_SAMPLE_DURATION.as_millis() as u64;
        let overlap_max = (self.segment_length / 2).as_millis() as u64;

        let mut boundaries = Vec::with_capacity(self.segment_count);
        let mut start = Duration::ZERO;
        for index in 0..self.segment_count {
            if index > 0 {
                match self.kind {
                    ScenarioKind::Gapped => {
                        start += Duration::from_millis(rng.random_range(1, fuzz_ms));
                    }
                    ScenarioKind::Overlapping => {
                        start -= Duration::from_millis(rng.random_range(overlap_min, overlap_max));
                    }
                    _ => {}
                }
            }
            let end = start + self.segment_length;
            boundaries.push((start, end));
            start = end;
        }
        boundaries
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_contiguous_layout_is_back_to_back() {
        let scenario = ScenarioBuilder::new(ScenarioKind::Contiguous, 1)
            .segments(3)
            .build()
            .unwrap();

        let audio: Vec<_> = scenario.track_segments(TrackType::Audio).collect();
        assert_eq!(audio.len(), 3);
        assert_eq!(audio[0].start, Duration::ZERO);
        assert_eq!(audio[1].start, audio[0].reported_end);
        assert_eq!(scenario.duration, Duration::from_secs(6));
        assert!(scenario.segments.iter().all(|segment| !segment.deferred));
        assert_eq!(scenario.seek_to, None);
    }

    #[test]
    fn test_late_append_defers_all_but_first_pair() {
        let scenario = ScenarioBuilder::new(ScenarioKind::LateAppend, 3)
            .segments(4)
            .build()
            .unwrap();

        let deferred = scenario.segments.iter().filter(|s| s.deferred).count();
        assert_eq!(deferred, 6);
        assert!(scenario.segments[..2].iter().all(|s| !s.deferred));
    }

    #[test]
    fn test_seek_targets_middle_of_stream() {
        let scenario = ScenarioBuilder::new(ScenarioKind::Seek, 5)
            .segments(5)
            .build()
            .unwrap();
        assert_eq!(scenario.seek_to, Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let result = ScenarioBuilder::new(ScenarioKind::Contiguous, 1)
            .segments(0)
            .build();
        assert!(matches!(result, Err(SimulationError::InvalidScenario { .. })));

        let result = ScenarioBuilder::new(ScenarioKind::Contiguous, 1)
            .jitter(Duration::from_secs(1))
            .build();
        assert!(matches!(result, Err(SimulationError::InvalidScenario { .. })));
    }

    #[test]
    fn test_from_config_requires_seed() {
        let config = SpliceConfig::default();
        assert!(matches!(
            ScenarioBuilder::from_config(ScenarioKind::Gapped, &config),
            Err(SimulationError::NoDeterministicSeed)
        ));

        let config = SpliceConfig::for_testing();
        let scenario = ScenarioBuilder::from_config(ScenarioKind::Gapped, &config)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(scenario.seed, 42);
    }

    proptest! {
        #[test]
        fn prop_gaps_stay_under_fuzz(seed in any::<u64>(), count in 1usize..12) {
            let scenario = ScenarioBuilder::new(ScenarioKind::Gapped, seed)
                .segments(count)
                .build()
                .unwrap();
            let audio: Vec<_> = scenario.track_segments(TrackType::Audio).collect();
            for pair in audio.windows(2) {
                let gap = pair[1].start - pair[0].reported_end;
                prop_assert!(gap > Duration::ZERO && gap < ms(125));
            }
        }

        #[test]
        fn prop_overlaps_never_swallow_a_segment(seed in any::<u64>(), count in 1usize..12) {
            let scenario = ScenarioBuilder::new(ScenarioKind::Overlapping, seed)
                .segments(count)
                .build()
                .unwrap();
            let video: Vec<_> = scenario.track_segments(TrackType::Video).collect();
            for pair in video.windows(2) {
                prop_assert!(pair[1].start > pair[0].start);
                prop_assert!(pair[1].start < pair[0].reported_end);
                prop_assert!(pair[1].reported_end > pair[0].reported_end);
            }
        }

        #[test]
        fn prop_layout_is_reproducible(seed in any::<u64>()) {
            let first = ScenarioBuilder::new(ScenarioKind::Overlapping, seed).build().unwrap();
            let second = ScenarioBuilder::new(ScenarioKind::Overlapping, seed).build().unwrap();
            prop_assert_eq!(first.segments, second.segments);
        }

        #[test]
        fn prop_samples_end_within_estimate(seed in any::<u64>()) {
            let scenario = ScenarioBuilder::new(ScenarioKind::Contiguous, seed).build().unwrap();
            for segment in &scenario.segments {
                prop_assert!(segment.sample_end <= segment.reported_end);
                prop_assert!(segment.reported_end - segment.sample_end <= ms(40));
            }
        }
    }
}
