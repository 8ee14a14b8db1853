//! Actor implementation for the media source reader.

use tokio::sync::mpsc;

use super::commands::ReaderCommand;
use super::handle::MediaSourceReaderHandle;
use super::session::MediaSourceReader;
use crate::config::ReaderConfig;

/// Spawns the media source reader actor and returns its handle.
///
/// The actor owns all selection, position and seek state and processes
/// commands one at a time. Segment reader work runs in spawned tasks whose
/// completions are fed back through an internal channel, so state
/// transitions never overlap.
///
/// Must be called from within a tokio runtime.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() {
/// use std::sync::Arc;
///
/// use splice_core::config::ReaderConfig;
/// use splice_core::{MemoryTrackStore, TrackType, spawn_media_source_reader};
///
/// let handle = spawn_media_source_reader(ReaderConfig::default());
/// let store = Arc::new(MemoryTrackStore::new());
/// handle.attach_track(TrackType::Audio, store).await.unwrap();
/// # }
/// ```
pub fn spawn_media_source_reader(config: ReaderConfig) -> MediaSourceReaderHandle {
    let (sender, receiver) = mpsc::channel(config.command_buffer.max(1));
    let (completion_sender, completion_receiver) = mpsc::unbounded_channel();
    let reader = MediaSourceReader::new(config, completion_sender);

    tokio::spawn(async move {
        run_actor_loop(reader, receiver, completion_receiver).await;
    });

    MediaSourceReaderHandle::new(sender)
}

/// Runs the main actor message processing loop.
///
/// Stops after a shutdown command, or once every handle has been dropped.
/// The completion channel never closes on its own because the session keeps
/// a sender for spawning new reader tasks.
async fn run_actor_loop(
    mut reader: MediaSourceReader,
    mut receiver: mpsc::Receiver<ReaderCommand>,
    mut completions: mpsc::UnboundedReceiver<ReaderCommand>,
) {
    tracing::debug!("Media source reader actor started");

    loop {
        tokio::select! {
            command = receiver.recv() => match command {
                Some(command) => {
                    if !handle_command(&mut reader, command) {
                        break;
                    }
                }
                None => {
                    tracing::debug!("All reader handles dropped, shutting down");
                    reader.shutdown();
                    break;
                }
            },
            Some(command) = completions.recv() => {
                if !handle_command(&mut reader, command) {
                    break;
                }
            }
        }
    }

    tracing::debug!("Media source reader actor stopped");
}

/// Handles a single command for the media source reader.
/// Returns true to continue processing, false to shutdown.
fn handle_command(reader: &mut MediaSourceReader, command: ReaderCommand) -> bool {
    match command {
        ReaderCommand::AttachTrack {
            track,
            store,
            responder,
        } => {
            let attached = reader.attach_track(track, store);
            let _ = responder.send(attached);
        }

        ReaderCommand::DetachTrack { track, responder } => {
            reader.detach_track(track);
            let _ = responder.send(());
        }

        ReaderCommand::ReadMetadata { responder } => {
            let _ = responder.send(reader.read_metadata());
        }

        ReaderCommand::RequestSample {
            track,
            skip_to_keyframe,
            time_threshold,
            responder,
        } => {
            reader.request_sample(track, skip_to_keyframe, time_threshold, responder);
        }

        ReaderCommand::Seek { target, responder } => {
            reader.start_seek(target, responder);
        }

        ReaderCommand::CancelSeek { responder } => {
            reader.cancel_seek();
            let _ = responder.send(());
        }

        ReaderCommand::GetBuffered { responder } => {
            let _ = responder.send(reader.buffered());
        }

        ReaderCommand::WaitForData { track, responder } => {
            reader.wait_for_data(track, responder);
        }

        ReaderCommand::SetEnded { responder } => {
            reader.set_ended();
            let _ = responder.send(());
        }

        ReaderCommand::IsEnded { responder } => {
            let _ = responder.send(reader.is_ended());
        }

        ReaderCommand::SetSourceDuration { seconds, responder } => {
            reader.set_source_duration(seconds);
            let _ = responder.send(());
        }

        ReaderCommand::NotifyRangesChanged { responder } => {
            reader.on_ranges_changed();
            let _ = responder.send(());
        }

        ReaderCommand::IsDormantNeeded { responder } => {
            let _ = responder.send(reader.is_dormant_needed());
        }

        ReaderCommand::ReleaseMediaResources { responder } => {
            reader.release_media_resources();
            let _ = responder.send(());
        }

        ReaderCommand::IsActiveReader { id, responder } => {
            let _ = responder.send(reader.is_active_reader(id));
        }

        ReaderCommand::DebugReport { responder } => {
            let _ = responder.send(reader.debug_report());
        }

        ReaderCommand::Shutdown { responder } => {
            tracing::debug!("Media source reader actor shutting down");
            reader.shutdown();
            let _ = responder.send(());
            return false; // Signal to break out of the loop
        }

        ReaderCommand::RangesChanged { track } => {
            tracing::trace!("{} track store ranges changed", track);
            reader.on_ranges_changed();
        }

        ReaderCommand::SampleCompleted {
            track,
            ticket,
            result,
        } => {
            reader.on_sample_completed(track, ticket, result);
        }

        ReaderCommand::SeekCompleted {
            track,
            ticket,
            purpose,
            result,
        } => {
            reader.on_seek_completed(track, ticket, purpose, result);
        }
    }

    true
}
