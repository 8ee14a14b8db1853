//! End-of-stream classification.

use std::time::Duration;

use super::ReaderError;
use super::session::MediaSourceReader;
use crate::media::TrackType;

/// Why no reader could supply the next sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// The source is complete and playback reached its end.
    TrueEndOfStream,
    /// More data may still be appended.
    WaitingForData,
}

/// Classifies a supply failure at `time`.
///
/// Only an ended source whose announced duration is within `fuzz` of `time`
/// is truly finished. An unknown duration never is.
pub fn resolve_end_of_stream(
    ended: bool,
    duration: Option<Duration>,
    time: Duration,
    fuzz: Duration,
) -> StreamStatus {
    match duration {
        Some(duration) if ended && time + fuzz >= duration => StreamStatus::TrueEndOfStream,
        _ => StreamStatus::WaitingForData,
    }
}

impl MediaSourceReader {
    /// Reject the pending request of `track` with either end of stream or
    /// waiting-for-data.
    pub(super) fn check_for_wait_or_end_of_stream(&mut self, track: TrackType, time: Duration) {
        let status =
            resolve_end_of_stream(self.ended, self.source_duration, time, self.config.eos_fuzz);
        tracing::debug!(
            "{} supply exhausted at {:?}: {:?} (ended={})",
            track,
            time,
            status,
            self.ended
        );

        let error = match status {
            StreamStatus::TrueEndOfStream => ReaderError::EndOfStream,
            StreamStatus::WaitingForData => ReaderError::WaitingForData,
        };
        self.track_mut(track).resolve_pending(Err(error));
    }
}
