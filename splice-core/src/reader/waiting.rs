//! Wait-for-data subscriptions.

use super::ReaderError;
use super::commands::WaitResponder;
use super::session::MediaSourceReader;
use crate::media::TrackType;

impl MediaSourceReader {
    pub(crate) fn wait_for_data(&mut self, track: TrackType, responder: WaitResponder) {
        let state = self.track_mut(track);
        if !state.is_configured() {
            let _ = responder.send(Err(ReaderError::NotConfigured));
            return;
        }
        if state.waiter.as_ref().is_some_and(|waiter| !waiter.is_closed()) {
            let _ = responder.send(Err(ReaderError::WaitPending { track }));
            return;
        }

        state.waiter = Some(responder);
        self.maybe_notify_have_data();
    }

    /// Wake every subscription whose track can now supply data at its
    /// playback position. Nothing is woken while a seek is pending.
    pub(super) fn maybe_notify_have_data(&mut self) {
        if self.is_seeking() {
            return;
        }

        for track in TrackType::ALL {
            let state = self.track(track);
            if state.waiter.is_none() {
                continue;
            }
            let have_data = self.have_data(track, state.last_time);
            tracing::debug!(
                "maybe_notify_have_data {} at {:?}: {}",
                track,
                state.last_time,
                have_data
            );
            if have_data {
                self.track_mut(track).resolve_waiter(Ok(track));
            }
        }
    }

    /// A track store gained or lost data.
    pub(crate) fn on_ranges_changed(&mut self) {
        self.attempt_seek();
        self.maybe_notify_have_data();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::config::ReaderConfig;
    use crate::source::{MemoryTrackStore, ScriptedSegmentReader};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn session() -> MediaSourceReader {
        let (completions, _receiver) = mpsc::unbounded_channel();
        MediaSourceReader::new(ReaderConfig::default(), completions)
    }

    fn audio(id: u64, start: u64, end: u64) -> Arc<ScriptedSegmentReader> {
        Arc::new(ScriptedSegmentReader::uniform(
            id,
            TrackType::Audio,
            ms(start),
            ms(end),
            ms(100),
        ))
    }

    fn wait(
        session: &mut MediaSourceReader,
        track: TrackType,
    ) -> oneshot::Receiver<Result<TrackType, ReaderError>> {
        let (responder, rx) = oneshot::channel();
        session.wait_for_data(track, responder);
        rx
    }

    #[tokio::test]
    async fn test_wait_resolves_when_data_arrives() {
        let mut session = session();
        let store = Arc::new(MemoryTrackStore::with_readers([audio(1, 0, 2000)]));
        session.attach_track(TrackType::Audio, store.clone());
        session.audio.last_time = ms(2000);

        let mut rx = wait(&mut session, TrackType::Audio);
        assert!(rx.try_recv().is_err());

        store.append(audio(2, 2000, 4000));
        session.on_ranges_changed();

        assert_eq!(rx.await.unwrap(), Ok(TrackType::Audio));
    }

    #[tokio::test]
    async fn test_wait_resolves_immediately_when_covered() {
        let mut session = session();
        let store = Arc::new(MemoryTrackStore::with_readers([audio(1, 0, 2000)]));
        session.attach_track(TrackType::Audio, store);

        let rx = wait(&mut session, TrackType::Audio);
        assert_eq!(rx.await.unwrap(), Ok(TrackType::Audio));
    }

    #[tokio::test]
    async fn test_second_wait_is_rejected() {
        let mut session = session();
        let store = Arc::new(MemoryTrackStore::new());
        session.attach_track(TrackType::Video, store);

        let _first = wait(&mut session, TrackType::Video);
        let second = wait(&mut session, TrackType::Video);

        assert_eq!(
            second.await.unwrap(),
            Err(ReaderError::WaitPending {
                track: TrackType::Video
            })
        );
    }

    #[tokio::test]
    async fn test_wait_on_unconfigured_track() {
        let mut session = session();
        let rx = wait(&mut session, TrackType::Audio);
        assert_eq!(rx.await.unwrap(), Err(ReaderError::NotConfigured));
    }
}
