//! Diagnostic snapshot of a reader session.

use std::fmt;
use std::time::Duration;

use super::session::MediaSourceReader;
use crate::media::{TimeRanges, TrackType};
use crate::source::ReaderId;

/// Per-track positions and readers, newest reader first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugReport {
    pub tracks: Vec<TrackSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSummary {
    pub track: TrackType,
    pub position: Duration,
    pub readers: Vec<ReaderSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderSummary {
    /// Append index within the track store
    pub index: usize,
    pub id: ReaderId,
    pub buffered: TimeRanges,
    pub active: bool,
}

impl DebugReport {
    pub fn track(&self, track: TrackType) -> Option<&TrackSummary> {
        self.tracks.iter().find(|summary| summary.track == track)
    }
}

impl fmt::Display for DebugReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Media source reader:")?;
        for summary in &self.tracks {
            writeln!(
                f,
                "\t{} track, position {:.3}s:",
                summary.track,
                summary.position.as_secs_f64()
            )?;
            for reader in &summary.readers {
                writeln!(
                    f,
                    "\t\t#{} {} ranges={} active={}",
                    reader.index, reader.id, reader.buffered, reader.active
                )?;
            }
        }
        Ok(())
    }
}

impl MediaSourceReader {
    pub(crate) fn debug_report(&self) -> DebugReport {
        let tracks = [&self.audio, &self.video]
            .into_iter()
            .filter_map(|state| {
                let store = state.store.as_ref()?;
                let active = state.active_id();
                let readers = store
                    .readers()
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(index, reader)| ReaderSummary {
                        index,
                        id: reader.id(),
                        buffered: reader.buffered(),
                        active: active == Some(reader.id()),
                    })
                    .collect();

                Some(TrackSummary {
                    track: state.track,
                    position: state.last_time,
                    readers,
                })
            })
            .collect();

        DebugReport { tracks }
    }
}
