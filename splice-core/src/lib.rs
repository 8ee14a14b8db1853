//! Splice Core - Playback-position reader for segmented media sources
//!
//! A media source is fed by independently appended segments, each decoded by
//! its own codec-specific segment reader. Segments may overlap (newer ones win)
//! or leave small gaps. This crate stitches them back into one continuous
//! audio stream and one continuous video stream: it picks the reader that owns
//! the current playback position, switches readers as playback crosses segment
//! boundaries, coordinates cross-track seeks that have to wait for appended
//! data, and tells true end-of-stream apart from transient starvation.
//!
//! All session state is owned by a single actor task; callers talk to it via
//! [`MediaSourceReaderHandle`].

pub mod config;
pub mod media;
pub mod reader;
pub mod source;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{ReaderConfig, SimulationConfig, SpliceConfig};
pub use media::{MediaSample, SampleRequest, TimeRange, TimeRanges, TrackType};
pub use reader::{
    DebugReport, MediaSourceReaderHandle, ReaderError, SeekOutcome, SourceMetadata, StreamStatus,
    spawn_media_source_reader,
};
pub use source::{
    MemoryTrackStore, NotDecodedReason, ReaderId, ScriptedSegmentReader, SeekError,
    SegmentReader, TrackStore,
};
