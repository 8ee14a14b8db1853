//! Media-level value types shared by readers, stores and the playback engine.

pub mod time_ranges;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
pub use time_ranges::{TimeRange, TimeRanges};

use crate::source::ReaderId;

/// Logical track of a media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Audio,
    Video,
}

impl TrackType {
    /// Both tracks, audio first.
    pub const ALL: [TrackType; 2] = [TrackType::Audio, TrackType::Video];

    /// Lowercase name used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            TrackType::Audio => "audio",
            TrackType::Video => "video",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded sample handed to the playback engine.
///
/// Payloads stay with the segment reader that decoded them; this type carries
/// the timing the reader needs to track playback position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSample {
    pub track: TrackType,
    /// Presentation start time
    pub start: Duration,
    pub duration: Duration,
    pub keyframe: bool,
    /// Reader that produced the sample
    pub source: ReaderId,
}

impl MediaSample {
    /// Presentation end time (`start + duration`).
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// Parameters forwarded to a segment reader with every sample request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRequest {
    pub track: TrackType,
    /// Reader may skip ahead to the next keyframe at or after `time_threshold`
    pub skip_to_keyframe: bool,
    pub time_threshold: Duration,
}

impl SampleRequest {
    /// Plain sequential request without keyframe skipping.
    pub fn next(track: TrackType) -> Self {
        Self {
            track,
            skip_to_keyframe: false,
            time_threshold: Duration::ZERO,
        }
    }
}
