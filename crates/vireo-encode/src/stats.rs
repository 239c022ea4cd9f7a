//! Encoded Frame Statistics
//!
//! A fixed-capacity circular history of encoded frame records. The most
//! recent [`STATS_WINDOW`] frames form the statistics window used for the
//! effective bit rate, the average frame size, and the maximum frame size.
//! The window must be large enough for I and P frames to average out, and
//! short enough to reflect the current situation.
//!
//! Timestamps are `mm_time` values: monotonic milliseconds supplied by the
//! frame producer, not wall time. Monotonicity is assumed, not enforced.

use tracing::debug;

/// Number of frames retained in the history ring
pub const HISTORY_SIZE: usize = 60;

/// Number of recent frames considered for the statistics
pub const STATS_WINDOW: usize = 21;

const _: () = assert!(STATS_WINDOW <= HISTORY_SIZE);

const MILLI_SECOND: u64 = 1000;

/// One encoded frame: producer timestamp and compressed size
#[derive(Debug, Clone, Copy, Default)]
struct FrameInfo {
    mm_time: u32,
    size: u32,
}

/// Circular history of the most recently encoded frames
///
/// Only frames that were actually encoded are recorded; dropped frames never
/// enter the history. `stat_sum` always equals the sum of the sizes in the
/// statistics window, and `stat_maximum` is either the window maximum or 0,
/// meaning it left the window and is recomputed on the next query.
#[derive(Debug)]
pub struct FrameHistory {
    frames: [FrameInfo; HISTORY_SIZE],
    /// Oldest retained frame
    first: usize,
    /// Most recent frame
    last: usize,
    /// Oldest frame inside the statistics window
    stat_first: usize,
    /// Sum of the sizes in the statistics window
    stat_sum: u64,
    /// Maximum size in the statistics window; 0 = recompute lazily
    stat_maximum: u32,
}

impl FrameHistory {
    /// Create an empty history
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: [FrameInfo::default(); HISTORY_SIZE],
            first: 0,
            last: 0,
            stat_first: 0,
            stat_sum: 0,
            stat_maximum: 0,
        }
    }

    /// Record the stream origin timestamp before the first frame
    ///
    /// The origin seeds the elapsed-time base so the very first window span
    /// is measured from the moment the stream was configured.
    pub fn seed_origin(&mut self, mm_time: u32) {
        self.frames[0].mm_time = mm_time;
    }

    /// Number of frames currently inside the statistics window
    ///
    /// Includes the origin slot until it slides out, matching the window the
    /// bit-rate figures are computed over.
    #[must_use]
    pub fn window_frame_count(&self) -> usize {
        let wrap = if self.last < self.stat_first { HISTORY_SIZE } else { 0 };
        self.last + wrap - self.stat_first + 1
    }

    /// Timestamp of the most recent frame
    #[must_use]
    pub fn last_mm_time(&self) -> u32 {
        self.frames[self.last].mm_time
    }

    /// Milliseconds spanned by the statistics window
    #[must_use]
    pub fn window_span_ms(&self) -> u32 {
        self.frames[self.last]
            .mm_time
            .wrapping_sub(self.frames[self.stat_first].mm_time)
    }

    /// Sum of the compressed sizes in the statistics window
    #[must_use]
    pub fn window_sum(&self) -> u64 {
        self.stat_sum
    }

    /// Append an encoded frame, evicting the oldest when full
    pub fn add(&mut self, mm_time: u32, size: u32) {
        // Slide the statistics window before the ring indices move.
        if self.window_frame_count() == STATS_WINDOW {
            let departing = self.frames[self.stat_first].size;
            self.stat_sum -= u64::from(departing);
            if self.stat_maximum == departing {
                self.stat_maximum = 0;
            }
            self.stat_first = (self.stat_first + 1) % HISTORY_SIZE;
        }
        self.stat_sum += u64::from(size);
        if self.stat_maximum > 0 && size > self.stat_maximum {
            self.stat_maximum = size;
        }

        self.last = (self.last + 1) % HISTORY_SIZE;
        if self.last == self.first {
            self.first = (self.first + 1) % HISTORY_SIZE;
        }
        self.frames[self.last] = FrameInfo { mm_time, size };
    }

    /// Average compressed frame size over the statistics window
    #[must_use]
    pub fn average_frame_size(&self) -> u64 {
        self.stat_sum / self.window_frame_count() as u64
    }

    /// Maximum compressed frame size over the statistics window
    ///
    /// Lazily rescans the window when the previous maximum slid out.
    pub fn maximum_frame_size(&mut self) -> u32 {
        if self.stat_maximum == 0 {
            let mut index = self.last;
            loop {
                self.stat_maximum = self.stat_maximum.max(self.frames[index].size);
                if index == self.stat_first {
                    break;
                }
                index = if index == 0 { HISTORY_SIZE - 1 } else { index - 1 };
            }
        }
        self.stat_maximum
    }

    /// Bit rate over the period delimited by two recorded frame timestamps
    ///
    /// `from` and `to` must be the `mm_time` of the first and last frame of
    /// the period. Returns `None` when the period starts outside the
    /// retained history, which callers must treat as "unknown", not as "no
    /// traffic". A frame at exactly `to` is only counted once a newer frame
    /// inside the window pins down the elapsed time past it.
    #[must_use]
    pub fn period_bit_rate(&self, from: u32, to: u32) -> Option<u64> {
        let mut sum: u64 = 0;
        let mut last_mm_time: u32 = 0;
        let mut index = self.last;
        loop {
            let frame = self.frames[index];
            if frame.mm_time == to {
                if last_mm_time == 0 {
                    // We don't know how much time elapsed between the
                    // period's last frame and the next, so it cannot be
                    // included.
                    sum = 1;
                    last_mm_time = to;
                } else {
                    sum = u64::from(frame.size) + 1;
                }
            } else if frame.mm_time == from {
                sum += u64::from(frame.size);
                let elapsed = u64::from(last_mm_time.wrapping_sub(from));
                if elapsed == 0 {
                    return Some(0);
                }
                return Some((sum - 1) * 8 * MILLI_SECOND / elapsed);
            } else if index == self.first {
                debug!(
                    from,
                    to,
                    history_first = self.frames[self.first].mm_time,
                    history_last = self.frames[self.last].mm_time,
                    "period outside known history"
                );
                return None;
            } else if sum > 0 {
                sum += u64::from(frame.size);
            } else {
                last_mm_time = frame.mm_time;
            }
            index = if index == 0 { HISTORY_SIZE - 1 } else { index - 1 };
        }
    }
}

impl Default for FrameHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_history(count: usize, frame_size: u32, interval_ms: u32) -> FrameHistory {
        let mut history = FrameHistory::new();
        history.seed_origin(0);
        for i in 0..count {
            history.add((i as u32 + 1) * interval_ms, frame_size);
        }
        history
    }

    #[test]
    fn test_empty_history() {
        let history = FrameHistory::new();
        assert_eq!(history.window_frame_count(), 1); // origin slot
        assert_eq!(history.window_sum(), 0);
        assert_eq!(history.last_mm_time(), 0);
    }

    #[test]
    fn test_window_sum_tracks_window() {
        let mut history = FrameHistory::new();
        history.seed_origin(0);
        for i in 0..STATS_WINDOW as u32 + 10 {
            history.add((i + 1) * 33, 1000);
        }

        // Window saturated at STATS_WINDOW entries, each of size 1000.
        assert_eq!(history.window_frame_count(), STATS_WINDOW);
        assert_eq!(history.window_sum(), STATS_WINDOW as u64 * 1000);
        assert_eq!(history.average_frame_size(), 1000);
    }

    #[test]
    fn test_maximum_recomputed_after_leaving_window() {
        let mut history = FrameHistory::new();
        history.seed_origin(0);

        // One big frame, then enough small ones to push it out of the window.
        history.add(33, 50_000);
        for i in 1..STATS_WINDOW as u32 + 1 {
            history.add((i + 1) * 33, 2000);
        }

        assert_eq!(history.maximum_frame_size(), 2000);
    }

    #[test]
    fn test_maximum_tracks_new_peak() {
        let mut history = filled_history(10, 1000, 33);
        assert_eq!(history.maximum_frame_size(), 1000);
        history.add(11 * 33, 9000);
        assert_eq!(history.maximum_frame_size(), 9000);
    }

    #[test]
    fn test_ring_eviction() {
        // More frames than the ring holds; the oldest are evicted silently.
        let history = filled_history(HISTORY_SIZE * 2, 500, 16);
        assert_eq!(history.window_frame_count(), STATS_WINDOW);
        assert_eq!(history.window_sum(), STATS_WINDOW as u64 * 500);
    }

    #[test]
    fn test_period_bit_rate() {
        // 10 frames of 1000 bytes, 100 ms apart.
        let history = filled_history(10, 1000, 100);

        // Frames at 300..=700 ms. The frame at 800 ms pins down the time
        // past the 700 ms frame, so all 5 frames count over a 500 ms span.
        let rate = history.period_bit_rate(300, 700);
        assert_eq!(rate, Some(5 * 1000 * 8 * 1000 / 500));
    }

    #[test]
    fn test_period_bit_rate_ending_at_newest_frame() {
        let history = filled_history(10, 1000, 100);

        // The period ends at the newest frame: its trailing gap is unknown,
        // so it is excluded. Frames at 500..=900 count over the 500 ms span.
        let rate = history.period_bit_rate(500, 1000);
        assert_eq!(rate, Some(5 * 1000 * 8 * 1000 / 500));
    }

    #[test]
    fn test_period_bit_rate_outside_history() {
        let history = filled_history(HISTORY_SIZE * 2, 1000, 100);
        // mm_time 100 was evicted long ago.
        assert_eq!(history.period_bit_rate(100, 500), None);
    }

    #[test]
    fn test_period_bit_rate_degenerate() {
        let history = filled_history(10, 1000, 100);
        // A zero-length period has no measurable span; the walk terminates
        // without a rate.
        assert_eq!(history.period_bit_rate(500, 500), None);
    }
}
