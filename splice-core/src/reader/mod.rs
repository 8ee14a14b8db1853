//! Media source reader actor
//!
//! Owns per-track reader selection, the sample request pipelines, the
//! coordinated seek and wait-for-data subscriptions. All state lives in a
//! single actor task; [`MediaSourceReaderHandle`] is the only way in.

mod actor;
mod buffered;
mod commands;
mod end_of_stream;
mod handle;
mod pipeline;
mod report;
mod seek;
mod session;
mod switch;
mod waiting;

use std::time::Duration;

pub use actor::spawn_media_source_reader;
pub use buffered::aggregate_buffered;
pub use end_of_stream::{StreamStatus, resolve_end_of_stream};
pub use handle::MediaSourceReaderHandle;
pub use report::{DebugReport, ReaderSummary, TrackSummary};
use serde::{Deserialize, Serialize};
pub use switch::select_reader;
use thiserror::Error;

use crate::media::TrackType;
use crate::source::{NotDecodedReason, SeekError};

/// Errors surfaced by media source reader operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    #[error("Decode error")]
    DecodeError,

    #[error("Request canceled")]
    Canceled,

    #[error("Waiting for data")]
    WaitingForData,

    #[error("End of stream")]
    EndOfStream,

    #[error("Seek failed: {0}")]
    SeekFailed(#[from] SeekError),

    #[error("A {track} sample request is already pending")]
    RequestPending { track: TrackType },

    #[error("A {track} wait-for-data subscription is already pending")]
    WaitPending { track: TrackType },

    #[error("No track configured")]
    NotConfigured,

    #[error("The {track} track has no segment readers yet")]
    TrackNotReady { track: TrackType },

    #[error("Media source reader has shut down")]
    Shutdown,
}

impl ReaderError {
    /// Errors the caller is expected to recover from by waiting or retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ReaderError::Canceled | ReaderError::WaitingForData)
    }
}

impl From<NotDecodedReason> for ReaderError {
    fn from(reason: NotDecodedReason) -> Self {
        match reason {
            NotDecodedReason::DecodeError => ReaderError::DecodeError,
            NotDecodedReason::EndOfStream => ReaderError::EndOfStream,
            NotDecodedReason::Canceled => ReaderError::Canceled,
        }
    }
}

/// How a coordinated seek finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// Both tracks were positioned; carries the time the last seek landed on.
    Completed(Duration),
    /// Superseded by a newer seek or explicitly canceled.
    Canceled,
}

/// Result of reading source metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub has_audio: bool,
    pub has_video: bool,
    /// Longest duration reported by the initial readers; `None` when unknown.
    pub duration: Option<Duration>,
}
