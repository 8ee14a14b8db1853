//! Active reader selection and switching.

use std::sync::Arc;
use std::time::Duration;

use super::session::{ActiveReader, MediaSourceReader};
use crate::media::TrackType;
use crate::source::SegmentReader;

/// Picks the newest reader whose buffered ranges contain `target` under
/// `tolerance`.
///
/// Newer segments replace the ranges of older ones, so `readers` (oldest
/// first) is scanned from the back.
pub fn select_reader(
    readers: &[Arc<dyn SegmentReader>],
    target: Duration,
    tolerance: Duration,
) -> Option<Arc<dyn SegmentReader>> {
    readers
        .iter()
        .rev()
        .find(|reader| {
            let ranges = reader.buffered();
            let found = ranges.contains(target, tolerance);
            if !found {
                tracing::trace!(
                    "select_reader({:?}) {} target not in ranges={}",
                    target,
                    reader.id(),
                    ranges
                );
            }
            found
        })
        .cloned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SwitchError {
    TrackNotConfigured,
    NoReaderAtTarget,
}

pub(super) enum SwitchOutcome {
    /// The active reader already owns the target.
    Existing(Arc<dyn SegmentReader>),
    /// A different reader was adopted and must be seeked before use.
    New(Arc<dyn SegmentReader>),
    Error(SwitchError),
}

impl MediaSourceReader {
    /// Make the reader owning `target` the active reader of `track`.
    ///
    /// Tries an exact match first and only then the fuzz tolerance, so that
    /// with perfectly aligned segments the current reader plays out its last
    /// samples before the next one takes over.
    pub(super) fn switch_reader(&mut self, track: TrackType, target: Duration) -> SwitchOutcome {
        let fuzz = self.config.eos_fuzz;
        let state = self.track_mut(track);
        let Some(store) = &state.store else {
            return SwitchOutcome::Error(SwitchError::TrackNotConfigured);
        };

        let readers = store.readers();
        let selected = select_reader(&readers, target, Duration::ZERO)
            .or_else(|| select_reader(&readers, target, fuzz));
        let Some(reader) = selected else {
            return SwitchOutcome::Error(SwitchError::NoReaderAtTarget);
        };

        if state.active_id() == Some(reader.id()) {
            return SwitchOutcome::Existing(reader);
        }

        if let Some(previous) = state.active_reader() {
            previous.set_idle();
        }
        tracing::debug!(
            "Switched {} reader {:?} -> {} at {:?}",
            track,
            state.active_id(),
            reader.id(),
            target
        );
        state.active = Some(ActiveReader::new(&reader));
        SwitchOutcome::New(reader)
    }

    /// Whether some reader covers `target` on `track` within the fuzz tolerance.
    pub(super) fn have_data(&self, track: TrackType, target: Duration) -> bool {
        self.track(track).store.as_ref().is_some_and(|store| {
            select_reader(&store.readers(), target, self.config.eos_fuzz).is_some()
        })
    }
}
