//! Scenario configuration types.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use splice_core::{ScriptedSegmentReader, TimeRanges, TrackType};

use crate::SimulationError;

/// Segment layout families the simulator can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    /// Back-to-back segments whose samples may fall short of the estimated end
    Contiguous,
    /// Segments separated by gaps smaller than the fuzz tolerance
    Gapped,
    /// Each segment starts before the previous one's estimated end
    Overlapping,
    /// Segments are appended one at a time as playback runs dry
    LateAppend,
    /// Contiguous layout played from a seek into the middle
    Seek,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 5] = [
        ScenarioKind::Contiguous,
        ScenarioKind::Gapped,
        ScenarioKind::Overlapping,
        ScenarioKind::LateAppend,
        ScenarioKind::Seek,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioKind::Contiguous => "contiguous",
            ScenarioKind::Gapped => "gapped",
            ScenarioKind::Overlapping => "overlapping",
            ScenarioKind::LateAppend => "late-append",
            ScenarioKind::Seek => "seek",
        }
    }

    /// One-line description for scenario listings.
    pub fn description(self) -> &'static str {
        match self {
            ScenarioKind::Contiguous => {
                "back-to-back segments, sample ends short of the estimated end"
            }
            ScenarioKind::Gapped => "segments separated by gaps below the fuzz tolerance",
            ScenarioKind::Overlapping => "each segment overlaps the previous one's tail",
            ScenarioKind::LateAppend => "segments appended only when playback runs dry",
            ScenarioKind::Seek => "contiguous segments played from a mid-stream seek",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioKind {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SimulationError::UnknownScenario {
                name: s.to_string(),
            })
    }
}

/// One segment of one track, as the appender will deliver it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    pub id: u64,
    pub track: TrackType,
    pub start: Duration,
    /// Estimated end the segment reports as buffered
    pub reported_end: Duration,
    /// End of the last decodable sample, at most `reported_end`
    pub sample_end: Duration,
    pub sample_duration: Duration,
    pub keyframe_interval: usize,
    /// Held back until playback runs out of data
    pub deferred: bool,
}

impl SegmentPlan {
    /// Materialize the segment as an in-memory reader.
    pub fn build_reader(&self, total: Duration, latency: Duration) -> Arc<ScriptedSegmentReader> {
        let reader = ScriptedSegmentReader::uniform(
            self.id,
            self.track,
            self.start,
            self.sample_end,
            self.sample_duration,
        )
        .with_keyframes_every(self.keyframe_interval);
        reader.set_buffered(TimeRanges::from_range(self.start, self.reported_end));
        reader.set_duration(Some(total));
        reader.set_latency(latency);
        Arc::new(reader)
    }
}

/// A fully generated scenario: per-track segment plans in append order.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub kind: ScenarioKind,
    pub seed: u64,
    /// Interleaved audio and video segments in the order they are appended
    pub segments: Vec<SegmentPlan>,
    /// Source duration announced once every segment is appended
    pub duration: Duration,
    /// Initial seek issued before playback starts
    pub seek_to: Option<Duration>,
}

impl Scenario {
    pub fn track_segments(&self, track: TrackType) -> impl Iterator<Item = &SegmentPlan> {
        self.segments
            .iter()
            .filter(move |segment| segment.track == track)
    }
}
