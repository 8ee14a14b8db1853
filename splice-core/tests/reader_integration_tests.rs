//! Integration tests for the media source reader.
//!
//! Drive the public `MediaSourceReaderHandle` against in-memory track stores
//! the way a playback engine and a segment appender would.

use std::sync::Arc;
use std::time::Duration;

use splice_core::config::ReaderConfig;
use splice_core::{
    MediaSourceReaderHandle, MemoryTrackStore, ReaderError, ReaderId, ScriptedSegmentReader,
    SeekOutcome, TimeRanges, TrackType, spawn_media_source_reader,
};
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn segment(
    id: u64,
    track: TrackType,
    start: u64,
    end: u64,
    step: u64,
) -> Arc<ScriptedSegmentReader> {
    Arc::new(ScriptedSegmentReader::uniform(
        id,
        track,
        ms(start),
        ms(end),
        ms(step),
    ))
}

/// Test fixture wiring a reader actor to one store per track.
struct ReaderTestFixture {
    handle: MediaSourceReaderHandle,
    audio: Arc<MemoryTrackStore>,
    video: Arc<MemoryTrackStore>,
}

impl ReaderTestFixture {
    fn new() -> Self {
        Self {
            handle: spawn_media_source_reader(ReaderConfig::default()),
            audio: Arc::new(MemoryTrackStore::new()),
            video: Arc::new(MemoryTrackStore::new()),
        }
    }

    /// Attaches the audio store only and reads metadata.
    async fn with_audio(segments: &[Arc<ScriptedSegmentReader>]) -> Self {
        let fixture = Self::new();
        for segment in segments {
            fixture.audio.append(segment.clone());
        }
        fixture
            .handle
            .attach_track(TrackType::Audio, fixture.audio.clone())
            .await
            .unwrap();
        fixture.handle.read_metadata().await.unwrap();
        fixture
    }

    async fn audio_sample(&self) -> Result<splice_core::MediaSample, ReaderError> {
        timeout(TEST_TIMEOUT, self.handle.request_audio_sample())
            .await
            .expect("audio request timed out")
    }
}

#[tokio::test]
async fn test_request_without_reader_is_decode_error() {
    let fixture = ReaderTestFixture::new();

    let result = fixture.audio_sample().await;
    assert_eq!(result, Err(ReaderError::DecodeError));

    let result = fixture
        .handle
        .request_video_sample(true, Duration::from_secs(1))
        .await;
    assert_eq!(result, Err(ReaderError::DecodeError));
}

#[tokio::test]
async fn test_playback_crosses_segment_boundary() {
    // Six 330 ms samples end at 1.98 s, but the segment's estimated end is 2.0 s.
    let first = Arc::new(ScriptedSegmentReader::from_samples(
        1,
        TrackType::Audio,
        (0..6).map(|index| (ms(index * 330), ms(330), true)),
    ));
    first.set_buffered(TimeRanges::from_range(ms(0), ms(2000)));
    let second = segment(2, TrackType::Audio, 2000, 6000, 500);
    let fixture = ReaderTestFixture::with_audio(&[first.clone(), second.clone()]).await;

    for index in 0..6 {
        let sample = fixture.audio_sample().await.unwrap();
        assert_eq!(sample.source, ReaderId::new(1));
        assert_eq!(sample.start, ms(index * 330));
    }

    let sample = fixture.audio_sample().await.unwrap();
    assert_eq!(sample.source, ReaderId::new(2));
    assert_eq!(sample.start, ms(2000));
    assert_eq!(second.seek_targets(), vec![ms(2000)]);
    assert_eq!(first.idle_calls(), 1);
    assert_eq!(second.idle_calls(), 0);

    let sample = fixture.audio_sample().await.unwrap();
    assert_eq!(sample.source, ReaderId::new(2));
    assert!(assert_ok!(fixture.handle.is_active_reader(ReaderId::new(2)).await));
    assert!(!assert_ok!(fixture.handle.is_active_reader(ReaderId::new(1)).await));
}

#[tokio::test]
async fn test_seek_cancels_outstanding_request() {
    let reader = segment(1, TrackType::Audio, 0, 2000, 100);
    reader.set_hold(true);
    let fixture = ReaderTestFixture::with_audio(&[reader.clone()]).await;

    let (sample, seek) = timeout(TEST_TIMEOUT, async {
        tokio::join!(
            fixture.handle.request_audio_sample(),
            fixture.handle.seek(ms(500))
        )
    })
    .await
    .unwrap();

    assert_eq!(sample, Err(ReaderError::Canceled));
    assert_eq!(seek, Ok(SeekOutcome::Completed(ms(500))));

    reader.set_hold(false);
    let sample = fixture.audio_sample().await.unwrap();
    assert_eq!(sample.start, ms(500));
}

#[tokio::test]
async fn test_end_of_stream_only_when_ended_near_duration() {
    let fixture = ReaderTestFixture::with_audio(&[segment(1, TrackType::Audio, 0, 1000, 500)]).await;
    fixture.handle.set_source_duration(1.0).await.unwrap();

    fixture.audio_sample().await.unwrap();
    fixture.audio_sample().await.unwrap();

    assert_eq!(fixture.audio_sample().await, Err(ReaderError::WaitingForData));
    assert!(!fixture.handle.is_ended().await.unwrap());

    fixture.handle.set_ended().await.unwrap();
    assert!(fixture.handle.is_ended().await.unwrap());
    assert_eq!(fixture.audio_sample().await, Err(ReaderError::EndOfStream));
}

#[tokio::test]
async fn test_unknown_duration_never_ends() {
    let fixture = ReaderTestFixture::with_audio(&[segment(1, TrackType::Audio, 0, 500, 500)]).await;
    fixture.handle.set_ended().await.unwrap();
    fixture.handle.set_source_duration(f64::NAN).await.unwrap();

    fixture.audio_sample().await.unwrap();
    assert_eq!(fixture.audio_sample().await, Err(ReaderError::WaitingForData));
}

#[tokio::test]
async fn test_buffered_intersects_tracks() {
    let fixture = ReaderTestFixture::new();
    assert!(fixture.handle.buffered().await.unwrap().is_empty());

    fixture.audio.append(segment(1, TrackType::Audio, 0, 5000, 500));
    fixture.video.append(segment(2, TrackType::Video, 0, 3000, 500));
    fixture.video.append(segment(3, TrackType::Video, 4000, 6000, 500));
    fixture
        .handle
        .attach_track(TrackType::Audio, fixture.audio.clone())
        .await
        .unwrap();
    fixture
        .handle
        .attach_track(TrackType::Video, fixture.video.clone())
        .await
        .unwrap();

    let buffered = fixture.handle.buffered().await.unwrap();
    assert_eq!(buffered.as_slice()[0].start, ms(0));
    assert_eq!(buffered.as_slice()[0].end, ms(3000));
    assert_eq!(buffered, TimeRanges::from_secs(&[(0.0, 3.0), (4.0, 5.0)]));

    fixture.handle.set_ended().await.unwrap();
    let buffered = fixture.handle.buffered().await.unwrap();
    assert_eq!(buffered, TimeRanges::from_secs(&[(0.0, 3.0), (4.0, 6.0)]));
}

#[tokio::test]
async fn test_wait_for_data_wakes_on_append() {
    let fixture = ReaderTestFixture::with_audio(&[segment(1, TrackType::Audio, 0, 1000, 500)]).await;
    fixture.audio_sample().await.unwrap();
    fixture.audio_sample().await.unwrap();
    assert_eq!(fixture.audio_sample().await, Err(ReaderError::WaitingForData));

    let waiter = {
        let handle = fixture.handle.clone();
        tokio::spawn(async move { handle.wait_for_data(TrackType::Audio).await })
    };
    fixture.audio.append(segment(2, TrackType::Audio, 1000, 2000, 500));

    let woken = timeout(TEST_TIMEOUT, waiter).await.unwrap().unwrap();
    assert_eq!(woken, Ok(TrackType::Audio));

    let sample = fixture.audio_sample().await.unwrap();
    assert_eq!(sample.source, ReaderId::new(2));
}

#[tokio::test]
async fn test_seek_waits_for_appended_target() {
    let fixture = ReaderTestFixture::with_audio(&[segment(1, TrackType::Audio, 0, 2000, 100)]).await;

    let seek = {
        let handle = fixture.handle.clone();
        tokio::spawn(async move { handle.seek(ms(4200)).await })
    };
    tokio::task::yield_now().await;

    let later = segment(2, TrackType::Audio, 4000, 8000, 100);
    fixture.audio.append(later.clone());

    let outcome = timeout(TEST_TIMEOUT, seek).await.unwrap().unwrap();
    assert_eq!(outcome, Ok(SeekOutcome::Completed(ms(4200))));
    assert_eq!(later.seek_targets(), vec![ms(4200)]);

    let sample = fixture.audio_sample().await.unwrap();
    assert_eq!(sample.start, ms(4200));
}

#[tokio::test]
async fn test_cancel_seek_resolves_pending_seek() {
    let fixture = ReaderTestFixture::with_audio(&[segment(1, TrackType::Audio, 0, 2000, 100)]).await;

    let (outcome, canceled) = tokio::join!(
        fixture.handle.seek(ms(9000)),
        fixture.handle.cancel_seek()
    );

    assert_eq!(outcome, Ok(SeekOutcome::Canceled));
    assert_ok!(canceled);
}

#[tokio::test]
async fn test_shutdown_rejects_pending_work() {
    let fixture = ReaderTestFixture::with_audio(&[segment(1, TrackType::Audio, 0, 2000, 100)]).await;

    let (seek, shutdown) = tokio::join!(fixture.handle.seek(ms(9000)), fixture.handle.shutdown());

    assert_eq!(seek, Err(ReaderError::Shutdown));
    assert_ok!(shutdown);
    assert!(fixture.audio.is_shut_down());
    assert_err!(fixture.handle.is_ended().await);
    // Shutting down twice is harmless.
    assert_ok!(fixture.handle.shutdown().await);
}

#[tokio::test]
async fn test_handles_share_one_session() {
    let fixture = ReaderTestFixture::with_audio(&[segment(1, TrackType::Audio, 0, 2000, 100)]).await;
    fixture.handle.set_ended().await.unwrap();

    let checks = (0..4).map(|_| {
        let handle = fixture.handle.clone();
        async move { handle.is_ended().await }
    });
    let results = futures::future::join_all(checks).await;

    assert!(results.into_iter().all(|result| result == Ok(true)));
}

#[tokio::test]
async fn test_debug_report_through_handle() {
    let fixture = ReaderTestFixture::with_audio(&[
        segment(1, TrackType::Audio, 0, 2000, 500),
        segment(2, TrackType::Audio, 2000, 4000, 500),
    ])
    .await;
    fixture.audio_sample().await.unwrap();

    let report = fixture.handle.debug_report().await.unwrap();
    let audio = report.track(TrackType::Audio).unwrap();

    assert_eq!(audio.position, ms(500));
    assert_eq!(audio.readers.len(), 2);
    assert_eq!(audio.readers[0].id, ReaderId::new(2));
    assert!(audio.readers[1].active);
}

#[tokio::test]
async fn test_second_store_for_track_is_ignored() {
    let fixture = ReaderTestFixture::new();
    let other = Arc::new(MemoryTrackStore::new());

    assert!(assert_ok!(
        fixture
            .handle
            .attach_track(TrackType::Video, fixture.video.clone())
            .await
    ));
    assert!(!assert_ok!(fixture.handle.attach_track(TrackType::Video, other).await));

    assert_eq!(
        fixture.handle.read_metadata().await,
        Err(ReaderError::TrackNotReady {
            track: TrackType::Video
        })
    );
}
