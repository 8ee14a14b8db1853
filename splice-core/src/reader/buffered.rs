//! Caller-visible buffered range computation.

use std::time::Duration;

use crate::media::TimeRanges;

/// Time ranges playable on every track.
///
/// Intersects `[0, max_end)` with each track's ranges, `max_end` being the
/// latest end across tracks. Once the source has ended, every track's last
/// range is stretched to `max_end` first, so a track that finished slightly
/// early does not cut the tail off the playable range. An ended track with
/// no ranges at all does not restrict the result.
pub fn aggregate_buffered(track_ranges: &[TimeRanges], ended: bool) -> TimeRanges {
    if track_ranges.is_empty() {
        return TimeRanges::new();
    }

    let max_end = track_ranges
        .iter()
        .filter_map(TimeRanges::end)
        .max()
        .unwrap_or(Duration::ZERO);

    let mut playable = TimeRanges::from_range(Duration::ZERO, max_end);
    for ranges in track_ranges {
        let mut ranges = ranges.clone();
        if ended {
            if ranges.is_empty() {
                ranges.add(Duration::ZERO, max_end);
            } else {
                ranges.extend_end_to(max_end);
            }
        }
        playable.intersection(&ranges);
    }

    playable
}
