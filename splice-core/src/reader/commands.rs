//! Command definitions for the media source reader actor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use super::{DebugReport, ReaderError, SeekOutcome, SourceMetadata};
use crate::media::{MediaSample, TimeRanges, TrackType};
use crate::source::{NotDecodedReason, ReaderId, SeekError, TrackStore};

pub(crate) type SampleResponder = oneshot::Sender<Result<MediaSample, ReaderError>>;
pub(crate) type WaitResponder = oneshot::Sender<Result<TrackType, ReaderError>>;
pub(crate) type SeekResponder = oneshot::Sender<Result<SeekOutcome, ReaderError>>;

/// What a segment reader seek was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeekPurpose {
    /// Positioning a newly selected reader before requesting from it.
    Switch,
    /// One step of a coordinated two-track seek.
    Coordinated,
}

/// Commands processed by the media source reader actor.
///
/// Public operations carry a responder. The last three variants are internal
/// completions sent by spawned reader tasks and store watchers.
pub(crate) enum ReaderCommand {
    AttachTrack {
        track: TrackType,
        store: Arc<dyn TrackStore>,
        responder: oneshot::Sender<bool>,
    },
    DetachTrack {
        track: TrackType,
        responder: oneshot::Sender<()>,
    },
    ReadMetadata {
        responder: oneshot::Sender<Result<SourceMetadata, ReaderError>>,
    },
    RequestSample {
        track: TrackType,
        skip_to_keyframe: bool,
        time_threshold: Duration,
        responder: SampleResponder,
    },
    Seek {
        target: Duration,
        responder: SeekResponder,
    },
    CancelSeek {
        responder: oneshot::Sender<()>,
    },
    GetBuffered {
        responder: oneshot::Sender<TimeRanges>,
    },
    WaitForData {
        track: TrackType,
        responder: WaitResponder,
    },
    SetEnded {
        responder: oneshot::Sender<()>,
    },
    IsEnded {
        responder: oneshot::Sender<bool>,
    },
    SetSourceDuration {
        seconds: f64,
        responder: oneshot::Sender<()>,
    },
    NotifyRangesChanged {
        responder: oneshot::Sender<()>,
    },
    IsDormantNeeded {
        responder: oneshot::Sender<bool>,
    },
    ReleaseMediaResources {
        responder: oneshot::Sender<()>,
    },
    IsActiveReader {
        id: ReaderId,
        responder: oneshot::Sender<bool>,
    },
    DebugReport {
        responder: oneshot::Sender<DebugReport>,
    },
    Shutdown {
        responder: oneshot::Sender<()>,
    },
    /// A track store reported a mutation.
    RangesChanged { track: TrackType },
    /// A segment reader sample request finished.
    SampleCompleted {
        track: TrackType,
        ticket: u64,
        result: Result<MediaSample, NotDecodedReason>,
    },
    /// A segment reader seek finished.
    SeekCompleted {
        track: TrackType,
        ticket: u64,
        purpose: SeekPurpose,
        result: Result<Duration, SeekError>,
    },
}
