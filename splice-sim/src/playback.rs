//! Playback driver: consumes a scenario the way a playback engine would.
//!
//! Both tracks pull samples concurrently through one reader handle. When a
//! track runs dry the driver plays the appender's role: it appends the next
//! deferred segment, or, once nothing is left, announces the duration and
//! marks the source ended.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use splice_core::config::SpliceConfig;
use splice_core::{
    MediaSample, MediaSourceReaderHandle, MemoryTrackStore, ReaderError, ReaderId,
    ScriptedSegmentReader, SeekOutcome, SegmentReader, TrackType, spawn_media_source_reader,
};
use tokio::time::timeout;

use crate::invariants::InvariantViolation;
use crate::scenarios::{Scenario, ScenarioKind};
use crate::SimulationError;

/// Consecutive idle waits after the source ended before a track counts as
/// stalled.
const MAX_IDLE_WAITS: usize = 50;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of playing one track to its end.
#[derive(Debug, Clone, Serialize)]
pub struct TrackReport {
    pub track: TrackType,
    pub samples: usize,
    pub keyframes: usize,
    pub first_start_ms: Option<u64>,
    pub last_end_ms: Option<u64>,
    /// Readers that delivered samples, in first-use order
    pub readers_used: Vec<ReaderId>,
    /// Largest hole between consecutive samples
    pub max_gap_ms: u64,
    /// Requests answered with `WaitingForData`
    pub waits: usize,
    pub reached_end: bool,
    #[serde(skip)]
    pub timeline: Vec<MediaSample>,
}

impl TrackReport {
    fn new(track: TrackType, timeline: Vec<MediaSample>, waits: usize) -> Self {
        let mut readers_used: Vec<ReaderId> = Vec::new();
        for sample in &timeline {
            if readers_used.last() != Some(&sample.source) {
                readers_used.push(sample.source);
            }
        }
        let max_gap = timeline
            .windows(2)
            .map(|pair| pair[1].start.saturating_sub(pair[0].end()))
            .max()
            .unwrap_or(Duration::ZERO);

        Self {
            track,
            samples: timeline.len(),
            keyframes: timeline.iter().filter(|sample| sample.keyframe).count(),
            first_start_ms: timeline.first().map(|sample| millis(sample.start)),
            last_end_ms: timeline.last().map(|sample| millis(sample.end())),
            readers_used,
            max_gap_ms: millis(max_gap),
            waits,
            reached_end: false,
            timeline,
        }
    }

    /// End of the last delivered sample.
    pub fn position(&self) -> Duration {
        self.timeline
            .last()
            .map(MediaSample::end)
            .unwrap_or(Duration::ZERO)
    }
}

/// Result of running one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackReport {
    pub scenario: ScenarioKind,
    pub seed: u64,
    pub duration_ms: u64,
    pub seek_target_ms: Option<u64>,
    pub seek_landed_ms: Option<u64>,
    pub tracks: Vec<TrackReport>,
    /// Aggregated buffered ranges once playback finished
    pub buffered: String,
    pub violations: Vec<InvariantViolation>,
    /// Reader debug dump taken before shutdown
    #[serde(skip)]
    pub debug: String,
}

impl PlaybackReport {
    pub fn track(&self, track: TrackType) -> Option<&TrackReport> {
        self.tracks.iter().find(|report| report.track == track)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Pretty-printed JSON form of the report.
    ///
    /// # Errors
    /// - `serde_json::Error` - If serialization fails
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedOutcome {
    Appended,
    Exhausted,
}

/// Appender stand-in holding the segments not yet delivered.
struct SegmentFeeder {
    queue: Mutex<VecDeque<(TrackType, Arc<ScriptedSegmentReader>)>>,
    audio: Arc<MemoryTrackStore>,
    video: Arc<MemoryTrackStore>,
    duration: Duration,
    ended: AtomicBool,
}

impl SegmentFeeder {
    fn store(&self, track: TrackType) -> &Arc<MemoryTrackStore> {
        match track {
            TrackType::Audio => &self.audio,
            TrackType::Video => &self.video,
        }
    }

    /// Append the next deferred segment, or end the source when none remain.
    async fn feed_or_end(
        &self,
        handle: &MediaSourceReaderHandle,
    ) -> Result<FeedOutcome, SimulationError> {
        let next = self.queue.lock().pop_front();
        if let Some((track, reader)) = next {
            tracing::debug!("Appending {} segment {}", track, reader.id());
            self.store(track).append(reader);
            return Ok(FeedOutcome::Appended);
        }

        if !self.ended.swap(true, Ordering::SeqCst) {
            tracing::debug!("All segments appended, ending source at {:?}", self.duration);
            handle
                .set_source_duration(self.duration.as_secs_f64())
                .await?;
            handle.set_ended().await?;
        }
        Ok(FeedOutcome::Exhausted)
    }
}

/// Runs scenarios against a fresh media source reader.
pub struct PlaybackDriver {
    config: SpliceConfig,
    request_timeout: Duration,
}

impl PlaybackDriver {
    pub fn new(config: SpliceConfig) -> Self {
        Self {
            config,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Upper bound on any single sample request.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Play `scenario` on both tracks until each reaches end of stream.
    ///
    /// # Errors
    /// - `SimulationError::Session` - Attaching, seeking or querying the reader failed
    /// - `SimulationError::Reader` - A track's request failed unrecoverably
    /// - `SimulationError::Stalled` - A track stopped progressing after the source ended
    /// - `SimulationError::Timeout` - A sample request did not complete in time
    pub async fn run(&self, scenario: &Scenario) -> Result<PlaybackReport, SimulationError> {
        let latency = Duration::from_millis(self.config.simulation.reader_latency_ms);
        let handle = spawn_media_source_reader(self.config.reader.clone());
        let audio = Arc::new(MemoryTrackStore::new());
        let video = Arc::new(MemoryTrackStore::new());

        let mut deferred = VecDeque::new();
        for plan in &scenario.segments {
            let reader = plan.build_reader(scenario.duration, latency);
            if plan.deferred {
                deferred.push_back((plan.track, reader));
            } else {
                match plan.track {
                    TrackType::Audio => audio.append(reader),
                    TrackType::Video => video.append(reader),
                }
            }
        }

        handle.attach_track(TrackType::Audio, audio.clone()).await?;
        handle.attach_track(TrackType::Video, video.clone()).await?;
        let metadata = handle.read_metadata().await?;
        tracing::info!(
            "Playing {} scenario (seed {}): {} segments, duration {:?}",
            scenario.kind,
            scenario.seed,
            scenario.segments.len(),
            metadata.duration
        );

        let seek_landed = match scenario.seek_to {
            Some(target) => match handle.seek(target).await? {
                SeekOutcome::Completed(landed) => {
                    tracing::info!("Seek to {:?} landed at {:?}", target, landed);
                    Some(landed)
                }
                SeekOutcome::Canceled => None,
            },
            None => None,
        };

        let feeder = SegmentFeeder {
            queue: Mutex::new(deferred),
            audio,
            video,
            duration: scenario.duration,
            ended: AtomicBool::new(false),
        };

        let results = join_all(
            TrackType::ALL.map(|track| self.play_track(&handle, &feeder, track)),
        )
        .await;

        let mut tracks = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(report) => tracks.push(report),
                Err(error) => {
                    tracing::warn!("Scenario {} failed: {}", scenario.kind, error);
                    let _ = handle.shutdown().await;
                    return Err(error);
                }
            }
        }

        let buffered = handle.buffered().await?.to_string();
        let debug = handle.debug_report().await?.to_string();
        handle.shutdown().await?;

        Ok(PlaybackReport {
            scenario: scenario.kind,
            seed: scenario.seed,
            duration_ms: millis(scenario.duration),
            seek_target_ms: scenario.seek_to.map(millis),
            seek_landed_ms: seek_landed.map(millis),
            tracks,
            buffered,
            violations: Vec::new(),
            debug,
        })
    }

    async fn play_track(
        &self,
        handle: &MediaSourceReaderHandle,
        feeder: &SegmentFeeder,
        track: TrackType,
    ) -> Result<TrackReport, SimulationError> {
        let wait_timeout = Duration::from_millis(self.config.simulation.wait_timeout_ms);
        let mut timeline: Vec<MediaSample> = Vec::new();
        let mut waits = 0;
        let mut idle_waits = 0;

        loop {
            let result = timeout(self.request_timeout, handle.request_sample(track))
                .await
                .map_err(|_| SimulationError::Timeout {
                    track,
                    elapsed: self.request_timeout,
                })?;

            match result {
                Ok(sample) => {
                    tracing::trace!("{} got [{:?}, {:?})", track, sample.start, sample.end());
                    idle_waits = 0;
                    timeline.push(sample);
                }
                Err(ReaderError::EndOfStream) => {
                    tracing::debug!("{} reached end of stream", track);
                    let mut report = TrackReport::new(track, timeline, waits);
                    report.reached_end = true;
                    return Ok(report);
                }
                Err(ReaderError::WaitingForData) => {
                    waits += 1;
                    if feeder.feed_or_end(handle).await? == FeedOutcome::Exhausted {
                        idle_waits += 1;
                        if idle_waits > MAX_IDLE_WAITS {
                            let report = TrackReport::new(track, timeline, waits);
                            return Err(SimulationError::Stalled {
                                track,
                                position: report.position(),
                            });
                        }
                    }
                    // Timing out only means the new data went to the other track.
                    if let Ok(Err(error)) = timeout(wait_timeout, handle.wait_for_data(track)).await {
                        if !error.is_recoverable() {
                            return Err(SimulationError::reader(track, error));
                        }
                    }
                }
                Err(ReaderError::Canceled) => continue,
                Err(error) => return Err(SimulationError::reader(track, error)),
            }
        }
    }
}
