//! In-memory segment readers and track stores.
//!
//! `ScriptedSegmentReader` plays back a fixed list of sample timings and
//! records every call made to it, so tests and the simulator can drive the
//! session deterministically and assert on how it used each reader.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{NotDecodedReason, ReaderId, SeekError, SegmentReader, TrackStore};
use crate::media::{MediaSample, SampleRequest, TimeRanges, TrackType};

/// Segment reader backed by a scripted list of samples.
pub struct ScriptedSegmentReader {
    id: ReaderId,
    track: TrackType,
    state: Mutex<ScriptState>,
    hold: watch::Sender<bool>,
}

#[derive(Default)]
struct ScriptState {
    samples: Vec<MediaSample>,
    cursor: usize,
    buffered_override: Option<TimeRanges>,
    duration: Option<Duration>,
    latency: Duration,
    fail_decode: bool,
    fail_seek: Option<SeekError>,
    dormant_needed: bool,
    requests: Vec<SampleRequest>,
    seek_targets: Vec<Duration>,
    idle_calls: usize,
    cancel_seek_calls: usize,
    release_calls: usize,
}

impl ScriptedSegmentReader {
    /// Build a reader from `(start, duration, keyframe)` triples.
    pub fn from_samples<I>(id: u64, track: TrackType, samples: I) -> Self
    where
        I: IntoIterator<Item = (Duration, Duration, bool)>,
    {
        let id = ReaderId::new(id);
        let samples = samples
            .into_iter()
            .map(|(start, duration, keyframe)| MediaSample {
                track,
                start,
                duration,
                keyframe,
                source: id,
            })
            .collect();
        let (hold, _) = watch::channel(false);

        Self {
            id,
            track,
            state: Mutex::new(ScriptState {
                samples,
                ..Default::default()
            }),
            hold,
        }
    }

    /// Build a reader covering `[start, end)` with back-to-back keyframe
    /// samples of `sample_duration`. The final sample is cut short at `end`.
    pub fn uniform(
        id: u64,
        track: TrackType,
        start: Duration,
        end: Duration,
        sample_duration: Duration,
    ) -> Self {
        let mut samples = Vec::new();
        if !sample_duration.is_zero() {
            let mut time = start;
            while time < end {
                let duration = sample_duration.min(end - time);
                samples.push((time, duration, true));
                time += duration;
            }
        }
        Self::from_samples(id, track, samples)
    }

    /// Keep the keyframe flag only on every `interval`-th sample.
    pub fn with_keyframes_every(self, interval: usize) -> Self {
        {
            let mut state = self.state.lock();
            for (index, sample) in state.samples.iter_mut().enumerate() {
                sample.keyframe = interval <= 1 || index % interval == 0;
            }
        }
        self
    }

    pub fn track(&self) -> TrackType {
        self.track
    }

    /// Override the buffered ranges the reader reports.
    pub fn set_buffered(&self, ranges: TimeRanges) {
        self.state.lock().buffered_override = Some(ranges);
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        self.state.lock().duration = duration;
    }

    /// Delay applied before every sample request and seek.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// While held, sample requests block until released.
    pub fn set_hold(&self, held: bool) {
        self.hold.send_replace(held);
    }

    pub fn set_fail_decode(&self, fail: bool) {
        self.state.lock().fail_decode = fail;
    }

    pub fn set_fail_seek(&self, error: Option<SeekError>) {
        self.state.lock().fail_seek = error;
    }

    pub fn set_dormant_needed(&self, needed: bool) {
        self.state.lock().dormant_needed = needed;
    }

    pub fn idle_calls(&self) -> usize {
        self.state.lock().idle_calls
    }

    pub fn cancel_seek_calls(&self) -> usize {
        self.state.lock().cancel_seek_calls
    }

    pub fn release_calls(&self) -> usize {
        self.state.lock().release_calls
    }

    /// Targets of every seek issued to this reader, in order.
    pub fn seek_targets(&self) -> Vec<Duration> {
        self.state.lock().seek_targets.clone()
    }

    /// Every sample request received, in order.
    pub fn requests(&self) -> Vec<SampleRequest> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Samples not yet handed out.
    pub fn remaining(&self) -> usize {
        let state = self.state.lock();
        state.samples.len().saturating_sub(state.cursor)
    }

    async fn apply_latency(&self) {
        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl SegmentReader for ScriptedSegmentReader {
    fn id(&self) -> ReaderId {
        self.id
    }

    async fn request_sample(&self, request: SampleRequest) -> Result<MediaSample, NotDecodedReason> {
        self.apply_latency().await;

        let mut hold = self.hold.subscribe();
        let released = hold.wait_for(|held| !*held).await.is_ok();
        if !released {
            return Err(NotDecodedReason::Canceled);
        }

        let mut state = self.state.lock();
        state.requests.push(request);
        if state.fail_decode {
            return Err(NotDecodedReason::DecodeError);
        }

        if request.skip_to_keyframe {
            let start = state.cursor;
            let keyframe = state.samples[start.min(state.samples.len())..]
                .iter()
                .position(|sample| sample.keyframe && sample.start >= request.time_threshold);
            if let Some(offset) = keyframe {
                state.cursor = start + offset;
            }
        }

        let next = state.samples.get(state.cursor).cloned();
        match next {
            Some(sample) => {
                state.cursor += 1;
                Ok(sample)
            }
            None => Err(NotDecodedReason::EndOfStream),
        }
    }

    async fn seek(&self, target: Duration, _tolerance: Duration) -> Result<Duration, SeekError> {
        self.apply_latency().await;

        let mut state = self.state.lock();
        state.seek_targets.push(target);
        if let Some(error) = state.fail_seek.clone() {
            return Err(error);
        }

        let landing = state.samples.iter().position(|sample| sample.end() > target);
        match landing {
            Some(index) => {
                state.cursor = index;
                Ok(state.samples[index].start)
            }
            None => {
                state.cursor = state.samples.len();
                Ok(target)
            }
        }
    }

    fn cancel_seek(&self) {
        self.state.lock().cancel_seek_calls += 1;
    }

    fn buffered(&self) -> TimeRanges {
        let state = self.state.lock();
        if let Some(ranges) = &state.buffered_override {
            return ranges.clone();
        }
        let mut ranges = TimeRanges::new();
        for sample in &state.samples {
            ranges.add(sample.start, sample.end());
        }
        ranges
    }

    fn set_idle(&self) {
        self.state.lock().idle_calls += 1;
    }

    fn is_dormant_needed(&self) -> bool {
        self.state.lock().dormant_needed
    }

    fn release_resources(&self) {
        self.state.lock().release_calls += 1;
    }

    fn duration(&self) -> Option<Duration> {
        self.state.lock().duration
    }
}

/// Track store holding scripted readers in append order.
pub struct MemoryTrackStore {
    readers: Mutex<Vec<Arc<ScriptedSegmentReader>>>,
    changes: watch::Sender<u64>,
    reset_decode_calls: AtomicUsize,
    shut_down: AtomicBool,
}

impl Default for MemoryTrackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            readers: Mutex::new(Vec::new()),
            changes,
            reset_decode_calls: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Create a store already holding `readers`, oldest first.
    pub fn with_readers<I>(readers: I) -> Self
    where
        I: IntoIterator<Item = Arc<ScriptedSegmentReader>>,
    {
        let store = Self::new();
        store.readers.lock().extend(readers);
        store
    }

    /// Append a reader as the newest segment and notify subscribers.
    pub fn append(&self, reader: Arc<ScriptedSegmentReader>) {
        self.readers.lock().push(reader);
        self.notify_changed();
    }

    /// Remove a reader and notify subscribers.
    pub fn remove(&self, id: ReaderId) -> Option<Arc<ScriptedSegmentReader>> {
        let removed = {
            let mut readers = self.readers.lock();
            let index = readers.iter().position(|reader| reader.id == id)?;
            readers.remove(index)
        };
        self.notify_changed();
        Some(removed)
    }

    /// Tell subscribers that a reader's ranges changed in place.
    pub fn notify_changed(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }

    pub fn reader(&self, id: ReaderId) -> Option<Arc<ScriptedSegmentReader>> {
        self.readers
            .lock()
            .iter()
            .find(|reader| reader.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.readers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.lock().is_empty()
    }

    pub fn reset_decode_calls(&self) -> usize {
        self.reset_decode_calls.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl TrackStore for MemoryTrackStore {
    fn readers(&self) -> Vec<Arc<dyn SegmentReader>> {
        self.readers
            .lock()
            .iter()
            .map(|reader| Arc::clone(reader) as Arc<dyn SegmentReader>)
            .collect()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn reset_decode(&self) {
        self.reset_decode_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
