//! Invariant checking framework for playback validation.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::playback::PlaybackReport;

/// Violation of a playback invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: String,
    /// Detailed description of the violation
    pub description: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invariant '{}' violated: {}",
            self.invariant, self.description
        )
    }
}

/// Trait for checking playback invariants.
pub trait Invariant: Send + Sync {
    /// Checks if invariant holds for a finished playback.
    ///
    /// # Errors
    /// Returns `InvariantViolation` if the invariant condition is not met.
    fn check(&self, report: &PlaybackReport) -> Result<(), InvariantViolation>;

    /// Returns name of this invariant.
    fn name(&self) -> &str;

    fn violation(&self, description: String) -> InvariantViolation {
        InvariantViolation {
            invariant: self.name().to_string(),
            description,
        }
    }
}

/// Sample end times strictly increase on every track: no sample is
/// delivered twice and playback never moves backwards.
pub struct MonotonicPlaybackInvariant;

impl Invariant for MonotonicPlaybackInvariant {
    fn check(&self, report: &PlaybackReport) -> Result<(), InvariantViolation> {
        for track in &report.tracks {
            if let Some(sample) = track.timeline.iter().find(|s| s.track != track.track) {
                return Err(self.violation(format!(
                    "{} sample at {:?} delivered on the {} track",
                    sample.track, sample.start, track.track
                )));
            }
            if let Some(pair) = track
                .timeline
                .windows(2)
                .find(|pair| pair[1].end() <= pair[0].end())
            {
                return Err(self.violation(format!(
                    "{} sample ending {:?} followed one ending {:?}",
                    track.track,
                    pair[1].end(),
                    pair[0].end()
                )));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "MonotonicPlayback"
    }
}

/// Holes between consecutive samples stay within the tolerance the reader
/// bridges when switching segments.
pub struct MaxGapInvariant {
    max_gap: Duration,
}

impl MaxGapInvariant {
    pub fn new(max_gap: Duration) -> Self {
        Self { max_gap }
    }
}

impl Invariant for MaxGapInvariant {
    fn check(&self, report: &PlaybackReport) -> Result<(), InvariantViolation> {
        for track in &report.tracks {
            for pair in track.timeline.windows(2) {
                let gap = pair[1].start.saturating_sub(pair[0].end());
                if gap > self.max_gap {
                    return Err(self.violation(format!(
                        "{} gap of {:?} at {:?} exceeds {:?}",
                        track.track,
                        gap,
                        pair[0].end(),
                        self.max_gap
                    )));
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "MaxGap"
    }
}

/// Every track reports end of stream close to the source duration.
pub struct ReachesEndInvariant {
    tolerance: Duration,
}

impl ReachesEndInvariant {
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }
}

impl Invariant for ReachesEndInvariant {
    fn check(&self, report: &PlaybackReport) -> Result<(), InvariantViolation> {
        let duration = report.duration();
        for track in &report.tracks {
            if !track.reached_end {
                return Err(self.violation(format!("{} never reached end of stream", track.track)));
            }
            if track.position() + self.tolerance < duration {
                return Err(self.violation(format!(
                    "{} ended at {:?}, source duration is {:?}",
                    track.track,
                    track.position(),
                    duration
                )));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ReachesEnd"
    }
}

/// Segments are played in append order; an earlier reader is never
/// returned to once playback moved past it.
pub struct SegmentOrderInvariant;

impl Invariant for SegmentOrderInvariant {
    fn check(&self, report: &PlaybackReport) -> Result<(), InvariantViolation> {
        for track in &report.tracks {
            if let Some(pair) = track.readers_used.windows(2).find(|pair| pair[1] <= pair[0]) {
                return Err(self.violation(format!(
                    "{} returned to {} after {}",
                    track.track, pair[1], pair[0]
                )));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "SegmentOrder"
    }
}

/// The standard invariant set for a reader using `tolerance` to bridge
/// segment boundaries.
pub fn default_invariants(tolerance: Duration) -> Vec<Box<dyn Invariant>> {
    vec![
        Box::new(MonotonicPlaybackInvariant),
        Box::new(MaxGapInvariant::new(tolerance)),
        Box::new(ReachesEndInvariant::new(tolerance)),
        Box::new(SegmentOrderInvariant),
    ]
}

/// Run every invariant, collecting all violations.
pub fn check_invariants(
    report: &PlaybackReport,
    invariants: &[Box<dyn Invariant>],
) -> Vec<InvariantViolation> {
    invariants
        .iter()
        .filter_map(|invariant| invariant.check(report).err())
        .inspect(|violation| tracing::warn!("{}", violation))
        .collect()
}
