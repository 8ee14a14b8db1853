//! Per-track sample request pipeline.
//!
//! request -> (switch seek) -> decode -> threshold drop -> deliver. A reader
//! running dry raises the track position to the reader's buffered end and
//! either switches to the next reader or asks the end-of-stream oracle.

use std::sync::Arc;
use std::time::Duration;

use super::ReaderError;
use super::commands::{ReaderCommand, SampleResponder, SeekPurpose};
use super::session::{InFlight, MediaSourceReader};
use super::switch::SwitchOutcome;
use crate::media::{MediaSample, SampleRequest, TrackType};
use crate::source::{NotDecodedReason, SeekError, SegmentReader};

impl MediaSourceReader {
    pub(crate) fn request_sample(
        &mut self,
        track: TrackType,
        skip_to_keyframe: bool,
        time_threshold: Duration,
        responder: SampleResponder,
    ) {
        let state = self.track_mut(track);
        match state.pending.as_ref().map(|pending| pending.is_closed()) {
            Some(false) => {
                let _ = responder.send(Err(ReaderError::RequestPending { track }));
                return;
            }
            Some(true) => {
                // The previous caller went away; its request is abandoned.
                state.pending = None;
                state.disconnect_request();
            }
            None => {}
        }

        if state.active.is_none() {
            tracing::debug!("{} sample requested with no reader bound", track);
            let _ = responder.send(Err(ReaderError::DecodeError));
            return;
        }

        if track == TrackType::Video && skip_to_keyframe {
            self.audio.drop_threshold = Some(time_threshold);
            self.video.drop_threshold = Some(time_threshold);
        }

        if self.is_seeking() {
            tracing::debug!("{} sample requested mid-seek, rejecting", track);
            let _ = responder.send(Err(ReaderError::Canceled));
            return;
        }

        let state = self.track_mut(track);
        state.pending = Some(responder);
        let last_time = state.last_time;
        tracing::trace!("{} sample requested at {:?}", track, last_time);

        match self.switch_reader(track, last_time) {
            SwitchOutcome::New(reader) => self.begin_switch_seek(track, reader, last_time),
            SwitchOutcome::Error(error) if !last_time.is_zero() => {
                tracing::trace!("{} no reader at {:?}: {:?}", track, last_time, error);
                self.check_for_wait_or_end_of_stream(track, last_time);
            }
            SwitchOutcome::Existing(reader) => self.request_from(track, reader, last_time),
            SwitchOutcome::Error(_) => {
                // Nothing played yet: fall back to the current reader.
                let reader = self.track(track).active_reader();
                match reader {
                    Some(reader) => self.request_from(track, reader, last_time),
                    None => self
                        .track_mut(track)
                        .resolve_pending(Err(ReaderError::DecodeError)),
                }
            }
        }
    }

    /// Request from the already active `reader`, finishing its positioning
    /// seek first if an abandoned request interrupted it.
    fn request_from(
        &mut self,
        track: TrackType,
        reader: Arc<dyn SegmentReader>,
        time: Duration,
    ) {
        if self.track(track).needs_seek {
            self.begin_switch_seek(track, reader, time);
        } else {
            self.issue_request(track, reader);
        }
    }

    /// Ask `reader` for its next sample on behalf of the pending request.
    fn issue_request(&mut self, track: TrackType, reader: Arc<dyn SegmentReader>) {
        let threshold = self.track(track).drop_threshold;
        let request = match track {
            TrackType::Video => SampleRequest {
                track,
                skip_to_keyframe: threshold.is_some(),
                time_threshold: threshold.unwrap_or(Duration::ZERO),
            },
            TrackType::Audio => SampleRequest::next(track),
        };

        let ticket = self.next_ticket();
        let completions = self.completion_sender();
        let task = tokio::spawn(async move {
            let result = reader.request_sample(request).await;
            let _ = completions.send(ReaderCommand::SampleCompleted {
                track,
                ticket,
                result,
            });
        });

        self.track_mut(track).request = Some(InFlight::new(ticket, task));
    }

    /// Position a newly selected reader before requesting from it.
    fn begin_switch_seek(&mut self, track: TrackType, reader: Arc<dyn SegmentReader>, time: Duration) {
        tracing::debug!("{} seeking new reader {} to {:?}", track, reader.id(), time);
        self.track_mut(track).needs_seek = true;

        let ticket = self.next_ticket();
        let completions = self.completion_sender();
        let task = tokio::spawn(async move {
            let result = reader.seek(time, Duration::ZERO).await;
            let _ = completions.send(ReaderCommand::SeekCompleted {
                track,
                ticket,
                purpose: SeekPurpose::Switch,
                result,
            });
        });

        self.track_mut(track).request = Some(InFlight::new(ticket, task));
    }

    fn is_current_request(&self, track: TrackType, ticket: u64) -> bool {
        self.track(track)
            .request
            .as_ref()
            .is_some_and(|request| request.ticket == ticket)
    }

    pub(crate) fn on_sample_completed(
        &mut self,
        track: TrackType,
        ticket: u64,
        result: Result<MediaSample, NotDecodedReason>,
    ) {
        if !self.is_current_request(track, ticket) {
            tracing::warn!("Discarding stale {} sample completion #{}", track, ticket);
            return;
        }
        self.track_mut(track).request = None;

        match result {
            Ok(sample) => self.on_sample_decoded(track, sample),
            Err(NotDecodedReason::EndOfStream) => self.on_reader_exhausted(track),
            Err(reason) => {
                tracing::debug!("{} sample not decoded: {}", track, reason);
                self.track_mut(track).resolve_pending(Err(reason.into()));
            }
        }
    }

    fn on_sample_decoded(&mut self, track: TrackType, sample: MediaSample) {
        let state = self.track_mut(track);
        if let Some(threshold) = state.drop_threshold {
            if sample.start < threshold {
                tracing::debug!(
                    "Dropping {} sample at {:?} before threshold {:?}",
                    track,
                    sample.start,
                    threshold
                );
                let reader = state.active_reader();
                match reader {
                    Some(reader) => self.issue_request(track, reader),
                    None => self
                        .track_mut(track)
                        .resolve_pending(Err(ReaderError::DecodeError)),
                }
                return;
            }
            state.drop_threshold = None;
        }

        tracing::trace!(
            "{} sample [{:?}, {:?}) from {}",
            track,
            sample.start,
            sample.end(),
            sample.source
        );
        state.last_time = sample.end();
        state.resolve_pending(Ok(sample));
    }

    /// The active reader has no more samples. Move past it by jumping to the
    /// end of its buffered range, since the delivered end time may fall short
    /// of the estimated segment end the next reader is matched against.
    fn on_reader_exhausted(&mut self, track: TrackType) {
        let state = self.track_mut(track);
        if let Some(end) = state
            .active_reader()
            .and_then(|reader| reader.buffered().end())
        {
            state.last_time = state.last_time.max(end);
        }
        let time = state.last_time;
        tracing::debug!("{} reader exhausted, position now {:?}", track, time);

        match self.switch_reader(track, time) {
            SwitchOutcome::New(reader) => self.begin_switch_seek(track, reader, time),
            _ => self.check_for_wait_or_end_of_stream(track, time),
        }
    }

    pub(crate) fn on_seek_completed(
        &mut self,
        track: TrackType,
        ticket: u64,
        purpose: SeekPurpose,
        result: Result<Duration, SeekError>,
    ) {
        match purpose {
            SeekPurpose::Switch => self.on_switch_seek_completed(track, ticket, result),
            SeekPurpose::Coordinated => self.on_coordinated_seek_completed(track, ticket, result),
        }
    }

    fn on_switch_seek_completed(
        &mut self,
        track: TrackType,
        ticket: u64,
        result: Result<Duration, SeekError>,
    ) {
        if !self.is_current_request(track, ticket) {
            tracing::warn!("Discarding stale {} switch seek #{}", track, ticket);
            return;
        }
        self.track_mut(track).request = None;

        match result {
            Ok(landed) => {
                tracing::trace!("{} switch seek landed at {:?}", track, landed);
                self.track_mut(track).needs_seek = false;
                let reader = self.track(track).active_reader();
                match reader {
                    Some(reader) => self.issue_request(track, reader),
                    None => self
                        .track_mut(track)
                        .resolve_pending(Err(ReaderError::DecodeError)),
                }
            }
            Err(error) => {
                tracing::warn!("{} switch seek failed: {}", track, error);
                self.track_mut(track)
                    .resolve_pending(Err(ReaderError::SeekFailed(error)));
            }
        }
    }
}
