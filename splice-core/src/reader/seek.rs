//! Coordinated two-track seek.
//!
//! A seek first cancels everything in flight, then waits until every
//! configured track covers the target. Video is seeked first; audio follows
//! at the time video actually landed on so both tracks start from the same
//! keyframe-aligned position.

use std::time::Duration;

use super::commands::{ReaderCommand, SeekPurpose, SeekResponder};
use super::session::{InFlight, MediaSourceReader};
use super::{ReaderError, SeekOutcome};
use crate::media::TrackType;
use crate::source::SeekError;

/// The single outstanding seek of a session.
pub(super) struct PendingSeek {
    pub(super) target: Duration,
    /// Still waiting for the target to be buffered on every track
    pub(super) waiting_for_data: bool,
    responder: SeekResponder,
}

impl PendingSeek {
    pub(super) fn resolve(self, result: Result<SeekOutcome, ReaderError>) {
        let _ = self.responder.send(result);
    }
}

impl MediaSourceReader {
    pub(super) fn is_seeking(&self) -> bool {
        self.pending_seek.is_some()
    }

    pub(crate) fn start_seek(&mut self, target: Duration, responder: SeekResponder) {
        tracing::debug!("Seek to {:?} requested", target);

        // Any previous requests are now unwanted, as is any reader we were
        // midway seeking to find a sample.
        for track in TrackType::ALL {
            let state = self.track_mut(track);
            state.disconnect_request();
            state.disconnect_seek();
            state.resolve_pending(Err(ReaderError::Canceled));
        }

        if let Some(previous) = self.pending_seek.take() {
            tracing::debug!("Seek to {:?} superseded", previous.target);
            previous.resolve(Ok(SeekOutcome::Canceled));
        }

        self.pending_seek = Some(PendingSeek {
            target,
            waiting_for_data: true,
            responder,
        });
        self.attempt_seek();
    }

    /// Run the pending seek once every configured track covers its target.
    pub(super) fn attempt_seek(&mut self) {
        let Some(target) = self
            .pending_seek
            .as_ref()
            .filter(|pending| pending.waiting_for_data)
            .map(|pending| pending.target)
        else {
            return;
        };

        if !self.track_stores_contain_time(target) {
            tracing::debug!("Seek to {:?} waiting for data", target);
            return;
        }
        if let Some(pending) = self.pending_seek.as_mut() {
            pending.waiting_for_data = false;
        }

        for track in TrackType::ALL {
            let state = self.track_mut(track);
            if let Some(store) = &state.store {
                store.reset_decode();
            }
            state.drop_threshold = None;
            // Decoding restarts at the seek target.
            state.last_time = target;
        }

        if self.video.is_configured() {
            self.begin_track_seek(TrackType::Video, target);
        } else if self.audio.is_configured() {
            self.begin_track_seek(TrackType::Audio, target);
        } else {
            tracing::warn!("Seek to {:?} with no track configured", target);
            self.finish_seek(Err(ReaderError::NotConfigured));
        }
    }

    fn track_stores_contain_time(&self, time: Duration) -> bool {
        let fuzz = self.config.eos_fuzz;
        TrackType::ALL.iter().all(|track| {
            self.track(*track)
                .store
                .as_ref()
                .is_none_or(|store| store.contains_time(time, fuzz))
        })
    }

    fn begin_track_seek(&mut self, track: TrackType, target: Duration) {
        let _ = self.switch_reader(track, target);
        let Some(reader) = self.track(track).active_reader() else {
            tracing::warn!("Seek on {} track with no reader bound", track);
            self.finish_seek(Err(ReaderError::TrackNotReady { track }));
            return;
        };
        tracing::debug!("Seeking {} reader {} to {:?}", track, reader.id(), target);

        let ticket = self.next_ticket();
        let completions = self.completion_sender();
        let task = tokio::spawn(async move {
            let result = reader.seek(target, Duration::ZERO).await;
            let _ = completions.send(ReaderCommand::SeekCompleted {
                track,
                ticket,
                purpose: SeekPurpose::Coordinated,
                result,
            });
        });

        let state = self.track_mut(track);
        state.seek_request = Some(InFlight::new(ticket, task));
        state.needs_seek = true;
    }

    pub(super) fn on_coordinated_seek_completed(
        &mut self,
        track: TrackType,
        ticket: u64,
        result: Result<Duration, SeekError>,
    ) {
        let state = self.track_mut(track);
        if state
            .seek_request
            .as_ref()
            .is_none_or(|request| request.ticket != ticket)
        {
            tracing::warn!("Discarding stale {} seek completion #{}", track, ticket);
            return;
        }
        state.seek_request = None;
        if result.is_ok() {
            state.needs_seek = false;
        }

        match result {
            Err(error) => {
                // The other track keeps whatever position it already reached.
                tracing::warn!("{} seek failed: {}", track, error);
                self.finish_seek(Err(ReaderError::SeekFailed(error)));
            }
            Ok(landed) if track == TrackType::Video && self.audio.is_configured() => {
                tracing::debug!("Video seek landed at {:?}, seeking audio", landed);
                if let Some(pending) = self.pending_seek.as_mut() {
                    pending.target = landed;
                }
                self.begin_track_seek(TrackType::Audio, landed);
            }
            Ok(landed) => {
                tracing::debug!("Seek completed at {:?}", landed);
                self.finish_seek(Ok(SeekOutcome::Completed(landed)));
            }
        }
    }

    /// Clear the pending seek and report its outcome.
    fn finish_seek(&mut self, result: Result<SeekOutcome, ReaderError>) {
        if let Some(pending) = self.pending_seek.take() {
            pending.resolve(result);
        }
        self.maybe_notify_have_data();
    }

    pub(crate) fn cancel_seek(&mut self) {
        for track in TrackType::ALL {
            let state = self.track_mut(track);
            state.disconnect_seek();
            if let Some(reader) = state.active_reader() {
                reader.cancel_seek();
            }
        }

        if self.pending_seek.is_some() {
            tracing::debug!("Pending seek canceled");
            self.finish_seek(Ok(SeekOutcome::Canceled));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::config::ReaderConfig;
    use crate::source::{MemoryTrackStore, ScriptedSegmentReader};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    struct Harness {
        session: MediaSourceReader,
        completions: mpsc::UnboundedReceiver<ReaderCommand>,
    }

    impl Harness {
        fn new() -> Self {
            let (sender, completions) = mpsc::unbounded_channel();
            Self {
                session: MediaSourceReader::new(ReaderConfig::default(), sender),
                completions,
            }
        }

        fn seek(&mut self, target: Duration) -> oneshot::Receiver<Result<SeekOutcome, ReaderError>> {
            let (responder, rx) = oneshot::channel();
            self.session.start_seek(target, responder);
            rx
        }

        async fn settle(
            &mut self,
            mut rx: oneshot::Receiver<Result<SeekOutcome, ReaderError>>,
        ) -> Result<SeekOutcome, ReaderError> {
            loop {
                if let Ok(result) = rx.try_recv() {
                    return result;
                }
                if let Some(ReaderCommand::SeekCompleted {
                    track,
                    ticket,
                    purpose,
                    result,
                }) = self.completions.recv().await
                {
                    self.session.on_seek_completed(track, ticket, purpose, result);
                }
            }
        }
    }

    fn store(track: TrackType, id: u64, start: u64, end: u64, step: u64) -> (Arc<MemoryTrackStore>, Arc<ScriptedSegmentReader>) {
        let reader = Arc::new(ScriptedSegmentReader::uniform(
            id,
            track,
            ms(start),
            ms(end),
            ms(step),
        ));
        let store = Arc::new(MemoryTrackStore::with_readers([reader.clone()]));
        (store, reader)
    }

    #[tokio::test]
    async fn test_audio_follows_video_landing_time() {
        let mut harness = Harness::new();
        let (audio_store, audio) = store(TrackType::Audio, 1, 0, 4000, 20);
        let (video_store, video) = store(TrackType::Video, 2, 0, 4000, 1000);
        harness.session.attach_track(TrackType::Audio, audio_store.clone());
        harness.session.attach_track(TrackType::Video, video_store.clone());
        harness.session.read_metadata().unwrap();

        let rx = harness.seek(ms(2500));
        let outcome = harness.settle(rx).await;

        assert_eq!(outcome, Ok(SeekOutcome::Completed(ms(2000))));
        assert_eq!(video.seek_targets(), vec![ms(2500)]);
        assert_eq!(audio.seek_targets(), vec![ms(2000)]);
        assert_eq!(audio_store.reset_decode_calls(), 1);
        assert_eq!(video_store.reset_decode_calls(), 1);
        assert_eq!(harness.session.audio.last_time, ms(2500));
        assert!(!harness.session.is_seeking());
    }

    #[tokio::test]
    async fn test_seek_waits_for_coverage() {
        let mut harness = Harness::new();
        let (audio_store, audio) = store(TrackType::Audio, 1, 0, 2000, 100);
        harness.session.attach_track(TrackType::Audio, audio_store.clone());
        harness.session.read_metadata().unwrap();

        let mut rx = harness.seek(ms(3000));
        assert!(harness.session.is_seeking());
        assert!(audio.seek_targets().is_empty());
        assert!(rx.try_recv().is_err());

        let later = Arc::new(ScriptedSegmentReader::uniform(
            2,
            TrackType::Audio,
            ms(2000),
            ms(4000),
            ms(100),
        ));
        audio_store.append(later.clone());
        harness.session.attempt_seek();

        assert_eq!(harness.settle(rx).await, Ok(SeekOutcome::Completed(ms(3000))));
        assert_eq!(later.seek_targets(), vec![ms(3000)]);
        assert_eq!(audio.idle_calls(), 1);
    }

    #[tokio::test]
    async fn test_new_seek_supersedes_pending_one() {
        let mut harness = Harness::new();
        let (audio_store, _audio) = store(TrackType::Audio, 1, 0, 2000, 100);
        harness.session.attach_track(TrackType::Audio, audio_store);
        harness.session.read_metadata().unwrap();

        let first = harness.seek(ms(9000));
        let second = harness.seek(ms(500));

        assert_eq!(first.await.unwrap(), Ok(SeekOutcome::Canceled));
        assert_eq!(
            harness.settle(second).await,
            Ok(SeekOutcome::Completed(ms(500)))
        );
    }

    #[tokio::test]
    async fn test_cancel_seek_resolves_as_canceled() {
        let mut harness = Harness::new();
        let (audio_store, audio) = store(TrackType::Audio, 1, 0, 2000, 100);
        harness.session.attach_track(TrackType::Audio, audio_store);
        harness.session.read_metadata().unwrap();

        let rx = harness.seek(ms(9000));
        harness.session.cancel_seek();

        assert_eq!(rx.await.unwrap(), Ok(SeekOutcome::Canceled));
        assert_eq!(audio.cancel_seek_calls(), 1);
        assert!(!harness.session.is_seeking());
    }

    #[tokio::test]
    async fn test_failed_video_seek_aborts_whole_seek() {
        let mut harness = Harness::new();
        let (audio_store, audio) = store(TrackType::Audio, 1, 0, 2000, 100);
        let (video_store, video) = store(TrackType::Video, 2, 0, 2000, 500);
        video.set_fail_seek(Some(SeekError::Failed {
            reason: "no keyframe".to_string(),
        }));
        harness.session.attach_track(TrackType::Audio, audio_store);
        harness.session.attach_track(TrackType::Video, video_store);
        harness.session.read_metadata().unwrap();

        let rx = harness.seek(ms(1000));
        assert!(matches!(
            harness.settle(rx).await,
            Err(ReaderError::SeekFailed(_))
        ));
        assert!(audio.seek_targets().is_empty());
        assert!(!harness.session.is_seeking());
    }

    #[tokio::test]
    async fn test_failed_audio_seek_leaves_video_where_it_landed() {
        let mut harness = Harness::new();
        let (audio_store, audio) = store(TrackType::Audio, 1, 0, 4000, 20);
        let (video_store, video) = store(TrackType::Video, 2, 0, 4000, 1000);
        audio.set_fail_seek(Some(SeekError::Failed {
            reason: "corrupt frame".to_string(),
        }));
        harness.session.attach_track(TrackType::Audio, audio_store);
        harness.session.attach_track(TrackType::Video, video_store);
        harness.session.read_metadata().unwrap();

        let rx = harness.seek(ms(2500));
        assert!(matches!(
            harness.settle(rx).await,
            Err(ReaderError::SeekFailed(SeekError::Failed { .. }))
        ));

        // Video is not rolled back to where it was before the seek.
        assert_eq!(video.seek_targets(), vec![ms(2500)]);
        assert_eq!(audio.seek_targets(), vec![ms(2000)]);
        assert_eq!(harness.session.video.last_time, ms(2500));
        assert!(!harness.session.video.needs_seek);
        assert!(harness.session.audio.needs_seek);
        assert!(!harness.session.is_seeking());
    }

    #[tokio::test]
    async fn test_cancel_disconnects_in_flight_seek_step() {
        let mut harness = Harness::new();
        let (audio_store, audio) = store(TrackType::Audio, 1, 0, 4000, 20);
        let (video_store, video) = store(TrackType::Video, 2, 0, 4000, 1000);
        video.set_latency(ms(100));
        harness.session.attach_track(TrackType::Audio, audio_store);
        harness.session.attach_track(TrackType::Video, video_store);
        harness.session.read_metadata().unwrap();

        let rx = harness.seek(ms(2500));
        let ticket = harness.session.video.seek_request.as_ref().unwrap().ticket;
        harness.session.cancel_seek();

        assert_eq!(rx.await.unwrap(), Ok(SeekOutcome::Canceled));
        assert!(harness.session.video.seek_request.is_none());
        assert_eq!(video.cancel_seek_calls(), 1);
        assert_eq!(audio.cancel_seek_calls(), 1);

        // A completion racing the cancel is stale and never starts audio.
        harness.session.on_seek_completed(
            TrackType::Video,
            ticket,
            SeekPurpose::Coordinated,
            Ok(ms(2000)),
        );
        tokio::time::sleep(ms(200)).await;
        while let Ok(command) = harness.completions.try_recv() {
            assert!(!matches!(command, ReaderCommand::SeekCompleted { .. }));
        }
        assert!(video.seek_targets().is_empty());
        assert!(audio.seek_targets().is_empty());
        assert!(!harness.session.is_seeking());
    }

    #[tokio::test]
    async fn test_cancel_disconnects_step_of_released_reader() {
        let mut harness = Harness::new();
        let (video_store, video) = store(TrackType::Video, 2, 0, 4000, 1000);
        video.set_latency(ms(100));
        harness.session.attach_track(TrackType::Video, video_store);
        harness.session.read_metadata().unwrap();

        let rx = harness.seek(ms(2500));
        assert!(harness.session.video.seek_request.is_some());
        // The store let go of the reader while its seek was running.
        harness.session.video.active = None;
        harness.session.cancel_seek();

        assert_eq!(rx.await.unwrap(), Ok(SeekOutcome::Canceled));
        assert!(harness.session.video.seek_request.is_none());
        assert_eq!(video.cancel_seek_calls(), 0);
    }

    #[tokio::test]
    async fn test_seek_without_tracks_is_not_configured() {
        let mut harness = Harness::new();
        let rx = harness.seek(ms(0));
        assert_eq!(rx.await.unwrap(), Err(ReaderError::NotConfigured));
    }
}
