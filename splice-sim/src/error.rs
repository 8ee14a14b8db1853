//! Errors raised while building or playing a simulated scenario.

use std::time::Duration;

use splice_core::{ReaderError, TrackType};
use thiserror::Error;

/// Errors that can occur during simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Deterministic seed required but not provided
    #[error("No deterministic seed provided")]
    NoDeterministicSeed,

    /// Scenario parameters cannot produce a playable layout
    #[error("Invalid scenario: {reason}")]
    InvalidScenario {
        /// Why the layout was rejected
        reason: String,
    },

    /// Scenario name did not match any preset
    #[error("Unknown scenario: {name}")]
    UnknownScenario {
        /// Name that was looked up
        name: String,
    },

    /// Setting up or querying the reader session failed
    #[error("Reader session error: {0}")]
    Session(#[from] ReaderError),

    /// The reader rejected an operation the playback engine relies on
    #[error("{track} playback failed: {source}")]
    Reader {
        /// Track whose playback loop hit the error
        track: TrackType,
        /// Underlying reader error
        #[source]
        source: ReaderError,
    },

    /// Every segment was appended but a track stopped making progress
    #[error("{track} playback stalled at {position:?}")]
    Stalled {
        /// Track that stopped progressing
        track: TrackType,
        /// Last delivered sample end
        position: Duration,
    },

    /// A reader call did not return within the allowed time
    #[error("{track} reader call timed out after {elapsed:?}")]
    Timeout {
        /// Track waiting on the call
        track: TrackType,
        /// How long the call was given
        elapsed: Duration,
    },
}

impl SimulationError {
    pub(crate) fn reader(track: TrackType, source: ReaderError) -> Self {
        Self::Reader { track, source }
    }
}
