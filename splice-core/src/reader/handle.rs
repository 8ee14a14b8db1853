//! Handle for communicating with the media source reader actor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::commands::ReaderCommand;
use super::{DebugReport, ReaderError, SeekOutcome, SourceMetadata};
use crate::media::{MediaSample, TimeRanges, TrackType};
use crate::source::{ReaderId, TrackStore};

/// Handle for communicating with the media source reader actor.
///
/// Cheap to clone and safe to share between the playback engine, the
/// segment-appending side and diagnostics.
#[derive(Clone)]
pub struct MediaSourceReaderHandle {
    sender: mpsc::Sender<ReaderCommand>,
}

impl MediaSourceReaderHandle {
    pub(crate) fn new(sender: mpsc::Sender<ReaderCommand>) -> Self {
        Self { sender }
    }

    /// Binds a track store to `track`.
    ///
    /// The first store configured for a track wins; returns `false` when the
    /// track already had one and `store` was ignored.
    ///
    /// # Errors
    /// - `ReaderError::Shutdown` - Actor is no longer running
    pub async fn attach_track(
        &self,
        track: TrackType,
        store: Arc<dyn TrackStore>,
    ) -> Result<bool, ReaderError> {
        self.call(|responder| ReaderCommand::AttachTrack {
            track,
            store,
            responder,
        })
        .await
    }

    /// Unbinds the track store of `track`, canceling its outstanding work.
    pub async fn detach_track(&self, track: TrackType) -> Result<(), ReaderError> {
        self.call(|responder| ReaderCommand::DetachTrack { track, responder })
            .await
    }

    /// Selects the initial reader of every attached track and reports what
    /// the source contains.
    ///
    /// # Errors
    /// - `ReaderError::NotConfigured` - No track is attached
    /// - `ReaderError::TrackNotReady` - An attached track has no readers yet
    pub async fn read_metadata(&self) -> Result<SourceMetadata, ReaderError> {
        self.call(|responder| ReaderCommand::ReadMetadata { responder })
            .await?
    }

    /// Requests the next audio sample.
    ///
    /// # Errors
    /// - `ReaderError::DecodeError` - No audio reader is bound, or decoding failed
    /// - `ReaderError::Canceled` - A seek is pending or superseded the request
    /// - `ReaderError::WaitingForData` - Playback ran out of appended data
    /// - `ReaderError::EndOfStream` - Source ended and playback reached its end
    /// - `ReaderError::RequestPending` - An audio request is already outstanding
    pub async fn request_audio_sample(&self) -> Result<MediaSample, ReaderError> {
        self.request_sample_with(TrackType::Audio, false, Duration::ZERO)
            .await
    }

    /// Requests the next video sample.
    ///
    /// With `skip_to_keyframe` set, both tracks discard samples starting
    /// before `time_threshold`, and the video reader may jump straight to the
    /// next keyframe at or after it.
    ///
    /// # Errors
    /// Same as [`Self::request_audio_sample`].
    pub async fn request_video_sample(
        &self,
        skip_to_keyframe: bool,
        time_threshold: Duration,
    ) -> Result<MediaSample, ReaderError> {
        self.request_sample_with(TrackType::Video, skip_to_keyframe, time_threshold)
            .await
    }

    /// Requests the next sample of `track` without keyframe skipping.
    pub async fn request_sample(&self, track: TrackType) -> Result<MediaSample, ReaderError> {
        self.request_sample_with(track, false, Duration::ZERO).await
    }

    async fn request_sample_with(
        &self,
        track: TrackType,
        skip_to_keyframe: bool,
        time_threshold: Duration,
    ) -> Result<MediaSample, ReaderError> {
        self.call(|responder| ReaderCommand::RequestSample {
            track,
            skip_to_keyframe,
            time_threshold,
            responder,
        })
        .await?
    }

    /// Seeks both tracks to `target`.
    ///
    /// Resolves once the seek completes, possibly after waiting for the
    /// target to be appended. A newer seek or [`Self::cancel_seek`] resolves
    /// it with `SeekOutcome::Canceled`.
    ///
    /// # Errors
    /// - `ReaderError::SeekFailed` - A segment reader failed to seek
    /// - `ReaderError::NotConfigured` - No track is attached
    /// - `ReaderError::Shutdown` - Reader shut down before the seek finished
    pub async fn seek(&self, target: Duration) -> Result<SeekOutcome, ReaderError> {
        self.call(|responder| ReaderCommand::Seek { target, responder })
            .await?
    }

    /// Abandons the pending seek, if any.
    pub async fn cancel_seek(&self) -> Result<(), ReaderError> {
        self.call(|responder| ReaderCommand::CancelSeek { responder })
            .await
    }

    /// Time ranges playable on every attached track.
    pub async fn buffered(&self) -> Result<TimeRanges, ReaderError> {
        self.call(|responder| ReaderCommand::GetBuffered { responder })
            .await
    }

    /// Resolves once a reader covers the playback position of `track`.
    ///
    /// # Errors
    /// - `ReaderError::WaitPending` - Another subscription for `track` is outstanding
    /// - `ReaderError::NotConfigured` - `track` has no store attached
    /// - `ReaderError::Shutdown` - Reader shut down while waiting
    pub async fn wait_for_data(&self, track: TrackType) -> Result<TrackType, ReaderError> {
        self.call(|responder| ReaderCommand::WaitForData { track, responder })
            .await?
    }

    /// Marks the source as ended: no more segments will be appended.
    pub async fn set_ended(&self) -> Result<(), ReaderError> {
        self.call(|responder| ReaderCommand::SetEnded { responder })
            .await
    }

    pub async fn is_ended(&self) -> Result<bool, ReaderError> {
        self.call(|responder| ReaderCommand::IsEnded { responder })
            .await
    }

    /// Announces the source duration in seconds. Non-finite or negative
    /// values clear it.
    pub async fn set_source_duration(&self, seconds: f64) -> Result<(), ReaderError> {
        self.call(|responder| ReaderCommand::SetSourceDuration { seconds, responder })
            .await
    }

    /// Tells the reader that buffered ranges changed outside of a store
    /// notification.
    pub async fn notify_ranges_changed(&self) -> Result<(), ReaderError> {
        self.call(|responder| ReaderCommand::NotifyRangesChanged { responder })
            .await
    }

    /// Whether the active video reader wants its decoder released while paused.
    pub async fn is_dormant_needed(&self) -> Result<bool, ReaderError> {
        self.call(|responder| ReaderCommand::IsDormantNeeded { responder })
            .await
    }

    /// Asks the active video reader to release its decoder resources.
    pub async fn release_media_resources(&self) -> Result<(), ReaderError> {
        self.call(|responder| ReaderCommand::ReleaseMediaResources { responder })
            .await
    }

    /// Whether `id` is the active reader of either track.
    pub async fn is_active_reader(&self, id: ReaderId) -> Result<bool, ReaderError> {
        self.call(|responder| ReaderCommand::IsActiveReader { id, responder })
            .await
    }

    /// Snapshot of positions and readers for diagnostics.
    pub async fn debug_report(&self) -> Result<DebugReport, ReaderError> {
        self.call(|responder| ReaderCommand::DebugReport { responder })
            .await
    }

    /// Shuts the actor down, rejecting all outstanding work.
    ///
    /// Calling this on an already stopped reader succeeds.
    pub async fn shutdown(&self) -> Result<(), ReaderError> {
        let (responder, rx) = oneshot::channel();
        if self
            .sender
            .send(ReaderCommand::Shutdown { responder })
            .await
            .is_err()
        {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> ReaderCommand,
    ) -> Result<T, ReaderError> {
        let (responder, rx) = oneshot::channel();

        self.sender
            .send(command(responder))
            .await
            .map_err(|_| ReaderError::Shutdown)?;

        rx.await.map_err(|_| ReaderError::Shutdown)
    }
}
