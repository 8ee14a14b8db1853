//! Session state owned by the media source reader actor.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::commands::{ReaderCommand, SampleResponder, WaitResponder};
use super::seek::PendingSeek;
use super::{ReaderError, SourceMetadata, aggregate_buffered};
use crate::config::ReaderConfig;
use crate::media::{MediaSample, TimeRanges, TrackType, time_ranges};
use crate::source::{ReaderId, SegmentReader, TrackStore};

/// Non-owning reference to the reader a track currently decodes from.
///
/// Segment readers belong to their track store. The session only keeps a
/// weak handle plus the id used for identity comparisons.
pub(super) struct ActiveReader {
    pub(super) id: ReaderId,
    reader: Weak<dyn SegmentReader>,
}

impl ActiveReader {
    pub(super) fn new(reader: &Arc<dyn SegmentReader>) -> Self {
        Self {
            id: reader.id(),
            reader: Arc::downgrade(reader),
        }
    }
}

/// A spawned segment reader operation awaiting its completion.
pub(super) struct InFlight {
    pub(super) ticket: u64,
    task: JoinHandle<()>,
}

impl InFlight {
    pub(super) fn new(ticket: u64, task: JoinHandle<()>) -> Self {
        Self { ticket, task }
    }

    /// Drop interest in the operation. A completion that was already queued
    /// is discarded by its stale ticket.
    pub(super) fn disconnect(self) {
        self.task.abort();
    }
}

/// Per-track session state.
pub(super) struct TrackState {
    pub(super) track: TrackType,
    pub(super) store: Option<Arc<dyn TrackStore>>,
    pub(super) active: Option<ActiveReader>,
    /// End of the last delivered sample, or the last seek target
    pub(super) last_time: Duration,
    /// Sample request or post-switch seek serving `pending`
    pub(super) request: Option<InFlight>,
    /// Step of a coordinated seek running on this track
    pub(super) seek_request: Option<InFlight>,
    pub(super) pending: Option<SampleResponder>,
    pub(super) waiter: Option<WaitResponder>,
    pub(super) drop_threshold: Option<Duration>,
    /// The active reader was switched to but never positioned at `last_time`
    pub(super) needs_seek: bool,
    watcher: Option<JoinHandle<()>>,
}

impl TrackState {
    fn new(track: TrackType) -> Self {
        Self {
            track,
            store: None,
            active: None,
            last_time: Duration::ZERO,
            request: None,
            seek_request: None,
            pending: None,
            waiter: None,
            drop_threshold: None,
            needs_seek: false,
            watcher: None,
        }
    }

    pub(super) fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    pub(super) fn active_reader(&self) -> Option<Arc<dyn SegmentReader>> {
        self.active.as_ref().and_then(|active| active.reader.upgrade())
    }

    pub(super) fn active_id(&self) -> Option<ReaderId> {
        self.active.as_ref().map(|active| active.id)
    }

    pub(super) fn disconnect_request(&mut self) {
        if let Some(request) = self.request.take() {
            request.disconnect();
        }
    }

    pub(super) fn disconnect_seek(&mut self) {
        if let Some(request) = self.seek_request.take() {
            request.disconnect();
        }
    }

    /// Settle the outstanding sample delivery, if any.
    pub(super) fn resolve_pending(&mut self, result: Result<MediaSample, ReaderError>) {
        if let Some(responder) = self.pending.take() {
            let _ = responder.send(result);
        }
    }

    pub(super) fn resolve_waiter(&mut self, result: Result<TrackType, ReaderError>) {
        if let Some(responder) = self.waiter.take() {
            let _ = responder.send(result);
        }
    }

    fn stop_watching(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

/// State of one media source playback session.
pub(crate) struct MediaSourceReader {
    pub(super) config: ReaderConfig,
    pub(super) audio: TrackState,
    pub(super) video: TrackState,
    pub(super) pending_seek: Option<PendingSeek>,
    pub(super) ended: bool,
    pub(super) source_duration: Option<Duration>,
    completions: mpsc::UnboundedSender<ReaderCommand>,
    next_ticket: u64,
    is_shutdown: bool,
}

impl MediaSourceReader {
    pub(crate) fn new(
        config: ReaderConfig,
        completions: mpsc::UnboundedSender<ReaderCommand>,
    ) -> Self {
        Self {
            config,
            audio: TrackState::new(TrackType::Audio),
            video: TrackState::new(TrackType::Video),
            pending_seek: None,
            ended: false,
            source_duration: None,
            completions,
            next_ticket: 0,
            is_shutdown: false,
        }
    }

    pub(super) fn track(&self, track: TrackType) -> &TrackState {
        match track {
            TrackType::Audio => &self.audio,
            TrackType::Video => &self.video,
        }
    }

    pub(super) fn track_mut(&mut self, track: TrackType) -> &mut TrackState {
        match track {
            TrackType::Audio => &mut self.audio,
            TrackType::Video => &mut self.video,
        }
    }

    pub(super) fn next_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    pub(super) fn completion_sender(&self) -> mpsc::UnboundedSender<ReaderCommand> {
        self.completions.clone()
    }

    /// Bind `store` to `track`. Later stores for an already configured track
    /// are ignored.
    pub(crate) fn attach_track(&mut self, track: TrackType, store: Arc<dyn TrackStore>) -> bool {
        if self.track(track).is_configured() {
            tracing::debug!("{} track already configured, ignoring store", track);
            return false;
        }

        let mut changes = store.subscribe();
        let completions = self.completion_sender();
        let watcher = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                if completions
                    .send(ReaderCommand::RangesChanged { track })
                    .is_err()
                {
                    break;
                }
            }
        });

        let state = self.track_mut(track);
        state.store = Some(store);
        state.watcher = Some(watcher);
        tracing::debug!("Attached {} track store", track);
        true
    }

    /// Unbind the store of `track` and cancel everything outstanding on it.
    pub(crate) fn detach_track(&mut self, track: TrackType) {
        let state = self.track_mut(track);
        if state.store.take().is_none() {
            return;
        }

        state.stop_watching();
        state.disconnect_request();
        state.resolve_pending(Err(ReaderError::Canceled));
        state.resolve_waiter(Err(ReaderError::Canceled));
        state.active = None;
        state.drop_threshold = None;
        state.needs_seek = false;

        let seek_interrupted = state.seek_request.is_some();
        state.disconnect_seek();
        tracing::debug!("Detached {} track store", track);

        if seek_interrupted {
            self.cancel_seek();
        } else {
            // Coverage may now be satisfied by the remaining track.
            self.attempt_seek();
        }
    }

    /// Bind each attached track to its first reader and report the source
    /// layout.
    pub(crate) fn read_metadata(&mut self) -> Result<SourceMetadata, ReaderError> {
        if !self.audio.is_configured() && !self.video.is_configured() {
            tracing::debug!("read_metadata called with no track configured");
            return Err(ReaderError::NotConfigured);
        }

        let mut max_duration: Option<Duration> = None;
        for track in TrackType::ALL {
            let state = self.track_mut(track);
            let Some(store) = &state.store else {
                continue;
            };
            let readers = store.readers();
            let Some(first) = readers.first() else {
                return Err(ReaderError::TrackNotReady { track });
            };

            state.active = Some(ActiveReader::new(first));
            max_duration = max_duration.max(first.duration());
            tracing::debug!(
                "read_metadata {} reader={} duration={:?}",
                track,
                first.id(),
                max_duration
            );
        }

        Ok(SourceMetadata {
            has_audio: self.audio.is_configured(),
            has_video: self.video.is_configured(),
            // Zero means the segments do not know their duration.
            duration: max_duration.filter(|duration| !duration.is_zero()),
        })
    }

    pub(crate) fn buffered(&self) -> TimeRanges {
        let track_ranges: Vec<TimeRanges> = TrackType::ALL
            .iter()
            .filter_map(|track| self.track(*track).store.as_ref())
            .map(|store| store.buffered())
            .collect();

        let ranges = aggregate_buffered(&track_ranges, self.ended);
        tracing::debug!("buffered ranges={}", ranges);
        ranges
    }

    pub(crate) fn set_ended(&mut self) {
        tracing::debug!("Media source marked ended");
        self.ended = true;
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn set_source_duration(&mut self, seconds: f64) {
        self.source_duration = if seconds.is_finite() && seconds >= 0.0 {
            Some(time_ranges::secs(seconds))
        } else {
            None
        };
        tracing::debug!("Source duration set to {:?}", self.source_duration);
    }

    pub(crate) fn is_dormant_needed(&self) -> bool {
        self.video
            .active_reader()
            .is_some_and(|reader| reader.is_dormant_needed())
    }

    pub(crate) fn release_media_resources(&self) {
        if let Some(reader) = self.video.active_reader() {
            reader.release_resources();
        }
    }

    pub(crate) fn is_active_reader(&self, id: ReaderId) -> bool {
        self.audio.active_id() == Some(id) || self.video.active_id() == Some(id)
    }

    /// Tear the session down. Safe to call more than once.
    pub(crate) fn shutdown(&mut self) {
        if self.is_shutdown {
            return;
        }
        self.is_shutdown = true;

        if let Some(pending) = self.pending_seek.take() {
            pending.resolve(Err(ReaderError::Shutdown));
        }

        for track in TrackType::ALL {
            let state = self.track_mut(track);
            state.stop_watching();
            state.disconnect_request();
            state.disconnect_seek();
            state.resolve_pending(Err(ReaderError::Canceled));
            state.resolve_waiter(Err(ReaderError::Shutdown));
            state.active = None;
            if let Some(store) = state.store.take() {
                store.shutdown();
            }
        }

        tracing::debug!("Media source reader shut down");
    }
}
