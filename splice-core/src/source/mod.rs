//! Segment reader and track store contracts
//!
//! A [`SegmentReader`] decodes one appended segment. A [`TrackStore`] owns
//! every segment reader for one logical track and tells the session when its
//! buffered ranges change. Both are implemented outside this crate by the
//! demuxing layer; [`ScriptedSegmentReader`] and [`MemoryTrackStore`] are
//! in-memory implementations driven by tests and the simulator.

pub mod scripted;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
pub use scripted::{MemoryTrackStore, ScriptedSegmentReader};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::media::{MediaSample, SampleRequest, TimeRanges};

/// Stable identity of a segment reader.
///
/// The session keeps only weak references to readers, so identity
/// comparisons go through this id rather than pointer equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReaderId(u64);

impl ReaderId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reader-{}", self.0)
    }
}

/// Why a segment reader could not produce a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotDecodedReason {
    #[error("Decode error")]
    DecodeError,

    #[error("End of stream")]
    EndOfStream,

    #[error("Request canceled")]
    Canceled,
}

/// Segment reader seek failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeekError {
    #[error("Seek target {target:?} is not buffered")]
    NotBuffered { target: Duration },

    #[error("Seek canceled")]
    Canceled,

    #[error("Seek failed: {reason}")]
    Failed { reason: String },
}

/// Decoder for a single appended segment.
///
/// Implementations must be cheap to query synchronously (`buffered`, `id`)
/// and do their real work in the async methods.
#[async_trait]
pub trait SegmentReader: Send + Sync {
    /// Stable identity of this reader.
    fn id(&self) -> ReaderId;

    /// Decode and return the next sample.
    ///
    /// When `request.skip_to_keyframe` is set the reader may discard samples
    /// until the next keyframe at or after `request.time_threshold`.
    async fn request_sample(&self, request: SampleRequest) -> Result<MediaSample, NotDecodedReason>;

    /// Position the reader at `target`, returning the time it actually landed on.
    async fn seek(&self, target: Duration, tolerance: Duration) -> Result<Duration, SeekError>;

    /// Abandon any seek the reader is running internally.
    fn cancel_seek(&self);

    /// Time ranges this reader can decode.
    fn buffered(&self) -> TimeRanges;

    /// Hint that the reader is no longer active. Not a teardown.
    fn set_idle(&self);

    /// Whether the reader wants its decoder released while paused.
    fn is_dormant_needed(&self) -> bool {
        false
    }

    /// Release decoder resources held by this reader.
    fn release_resources(&self) {}

    /// Media duration reported by the segment, if known.
    fn duration(&self) -> Option<Duration> {
        None
    }
}

/// Owner of all segment readers for one logical track.
pub trait TrackStore: Send + Sync {
    /// Readers in append order, newest last.
    fn readers(&self) -> Vec<Arc<dyn SegmentReader>>;

    /// Whether any reader covers `time` under `tolerance`.
    fn contains_time(&self, time: Duration, tolerance: Duration) -> bool {
        self.readers()
            .iter()
            .any(|reader| reader.buffered().contains(time, tolerance))
    }

    /// Union of every reader's buffered ranges.
    fn buffered(&self) -> TimeRanges {
        let mut ranges = TimeRanges::new();
        for reader in self.readers() {
            ranges.union(&reader.buffered());
        }
        ranges
    }

    /// Receiver that changes whenever readers are appended, removed or grow.
    fn subscribe(&self) -> watch::Receiver<u64>;

    /// Drop any decode state before a seek.
    fn reset_decode(&self) {}

    /// Called once when the session shuts down.
    fn shutdown(&self) {}
}
