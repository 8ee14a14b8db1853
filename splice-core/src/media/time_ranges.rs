//! Buffered time range sets
//!
//! Ordered, disjoint `[start, end)` intervals in presentation time. Every
//! mutation leaves the set normalized: sorted by start, with overlapping or
//! touching intervals merged and empty intervals dropped.

use std::fmt;
use std::time::Duration;

/// A single half-open `[start, end)` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Duration,
    pub end: Duration,
}

impl TimeRange {
    /// Create a new interval. Callers are expected to pass `start <= end`.
    pub fn new(start: Duration, end: Duration) -> Self {
        Self { start, end }
    }

    /// Length of the interval.
    pub fn len(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    /// Returns true when the interval covers no time.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Checks whether `time` falls in this interval, allowing `time` to sit up
    /// to `tolerance` before the interval start.
    ///
    /// The tolerance never extends the end: a time at or past `end` is not
    /// contained, so a reader that has run out is never reselected for it.
    pub fn contains(&self, time: Duration, tolerance: Duration) -> bool {
        time < self.end && time + tolerance >= self.start
    }
}

/// Normalized set of buffered time ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeRanges {
    ranges: Vec<TimeRange>,
}

impl TimeRanges {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding a single interval.
    pub fn from_range(start: Duration, end: Duration) -> Self {
        let mut ranges = Self::new();
        ranges.add(start, end);
        ranges
    }

    /// Convenience constructor from `(start, end)` pairs in seconds.
    pub fn from_secs(pairs: &[(f64, f64)]) -> Self {
        let mut ranges = Self::new();
        for &(start, end) in pairs {
            ranges.add(secs(start), secs(end));
        }
        ranges
    }

    /// Add an interval, merging it with anything it overlaps or touches.
    /// Empty intervals are ignored.
    pub fn add(&mut self, start: Duration, end: Duration) {
        if start >= end {
            return;
        }
        self.ranges.push(TimeRange::new(start, end));
        self.normalize();
    }

    /// Add every interval of `other` to this set.
    pub fn union(&mut self, other: &TimeRanges) {
        self.ranges.extend(other.ranges.iter().copied());
        self.normalize();
    }

    /// Replace this set with its intersection with `other`.
    pub fn intersection(&mut self, other: &TimeRanges) {
        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);

        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if start < end {
                result.push(TimeRange::new(start, end));
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }

        self.ranges = result;
    }

    /// Index of the first interval containing `time` under `tolerance`.
    pub fn find(&self, time: Duration, tolerance: Duration) -> Option<usize> {
        self.ranges
            .iter()
            .position(|range| range.contains(time, tolerance))
    }

    /// Checks whether any interval contains `time` under `tolerance`.
    pub fn contains(&self, time: Duration, tolerance: Duration) -> bool {
        self.find(time, tolerance).is_some()
    }

    /// Start of the first interval.
    pub fn start(&self) -> Option<Duration> {
        self.ranges.first().map(|range| range.start)
    }

    /// End of the last interval.
    pub fn end(&self) -> Option<Duration> {
        self.ranges.last().map(|range| range.end)
    }

    /// Stretch the final interval so it ends at `end`. Does nothing when the
    /// set is empty or already ends later.
    pub fn extend_end_to(&mut self, end: Duration) {
        if let Some(last) = self.ranges.last_mut() {
            if end > last.end {
                last.end = end;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeRange> {
        self.ranges.iter()
    }

    pub fn as_slice(&self) -> &[TimeRange] {
        &self.ranges
    }

    fn normalize(&mut self) {
        self.ranges.retain(|range| !range.is_empty());
        self.ranges.sort_by_key(|range| range.start);

        let mut merged: Vec<TimeRange> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }
        self.ranges = merged;
    }
}

impl FromIterator<TimeRange> for TimeRanges {
    fn from_iter<I: IntoIterator<Item = TimeRange>>(iter: I) -> Self {
        let mut ranges = Self {
            ranges: iter.into_iter().collect(),
        };
        ranges.normalize();
        ranges
    }
}

impl fmt::Display for TimeRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges.is_empty() {
            return f.write_str("[]");
        }
        for (index, range) in self.ranges.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(
                f,
                "[{:.3}, {:.3})",
                range.start.as_secs_f64(),
                range.end.as_secs_f64()
            )?;
        }
        Ok(())
    }
}

/// Seconds to `Duration`. Negative and NaN input clamps to zero; values too
/// large to represent saturate at `Duration::MAX`.
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}
