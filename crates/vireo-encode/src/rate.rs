//! Encoder Bit-Rate Control
//!
//! Codec encoders don't follow their configured bit rate very closely. This
//! controller keeps the outgoing stream under the target regardless of the
//! encoder's output, using a virtual buffer: short bursts (typically
//! I-frames) are allowed until the buffer runs dry, after which frames are
//! dropped at evenly spaced times until the deficit drains.
//!
//! # Overview
//!
//! The virtual buffer holds [`VBUFFER_MS`] milliseconds worth of data at the
//! current bit rate. Every encoded frame drains it by its compressed size
//! and refills it by the time elapsed since the previous frame. While the
//! buffer is in deficit, [`RateController::should_drop`] rejects frames
//! whose timestamp falls before the computed resume point, floored at 3 fps
//! so the stream never stalls completely.
//!
//! # Usage
//!
//! ```rust
//! use vireo_encode::{RateController, RateFeedback};
//!
//! struct Feedback;
//! impl RateFeedback for Feedback {
//!     fn roundtrip_ms(&self) -> u32 { 40 }
//! }
//!
//! let mut rate = RateController::new(Some(Box::new(Feedback)));
//! rate.configure(4_000_000, 8_000_000, 0);
//!
//! // After each encoded frame:
//! rate.on_encoded(20_000, 33);
//! if rate.should_drop(66) {
//!     // skip this frame
//! }
//! ```

use tracing::debug;

use crate::feedback::{RateFeedback, DEFAULT_FPS};
use crate::stats::FrameHistory;

/// Minimum allowed bit rate (bits per second)
pub const MIN_BIT_RATE: u64 = 128 * 1024;

/// Default bit rate when none was requested (bits per second)
pub const DEFAULT_BIT_RATE: u64 = 8 * 1024 * 1024;

/// Virtual buffer capacity in milliseconds worth of data
pub const VBUFFER_MS: u64 = 300;

const NANO_SECOND: u64 = 1_000_000_000;
const MILLI_SECOND: u64 = 1000;
const NANO_MS: u64 = NANO_SECOND / MILLI_SECOND;

/// Longest allowed gap between encoded frames (3 fps floor)
const MAX_PERIOD_NS: u64 = NANO_SECOND / 3;

/// Margin applied to the network latency to cover jitter
const LATENCY_MARGIN: f64 = 0.1;

/// Virtual-buffer bit-rate governor
///
/// Owns the [`FrameHistory`] ring and the throttling state. Rate control is
/// active only when a [`RateFeedback`] handle was supplied; without one the
/// controller still records statistics but never schedules drops.
pub struct RateController {
    history: FrameHistory,
    feedback: Option<Box<dyn RateFeedback>>,

    /// Bit rate target for the outgoing stream (bits per second); 0 until
    /// the first frame configures the stream
    bit_rate: u64,

    /// Remaining virtual buffer budget in bytes; negative while the encoder
    /// has overshot the target
    vbuffer_free: i64,

    /// Minimum `mm_time` of the next frame to encode; 0 = unthrottled
    next_frame: u32,
}

impl RateController {
    /// Create a controller; rate control is active iff `feedback` is `Some`
    #[must_use]
    pub fn new(feedback: Option<Box<dyn RateFeedback>>) -> Self {
        Self {
            history: FrameHistory::new(),
            feedback,
            bit_rate: 0,
            vbuffer_free: 0,
            next_frame: 0,
        }
    }

    /// Whether drop scheduling is enabled
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.feedback.is_some()
    }

    /// Whether the stream has been configured with an initial bit rate
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.bit_rate != 0
    }

    /// Current bit-rate target in bits per second
    #[must_use]
    pub fn bit_rate(&self) -> u64 {
        self.bit_rate
    }

    /// Source frame rate, re-read on every use since it may change
    #[must_use]
    pub fn source_fps(&self) -> u32 {
        self.feedback
            .as_ref()
            .map_or(DEFAULT_FPS, |f| f.source_fps().max(1))
    }

    /// Frame statistics history
    #[must_use]
    pub fn history(&self) -> &FrameHistory {
        &self.history
    }

    /// Average compressed frame size over the statistics window
    #[must_use]
    pub fn average_frame_size(&self) -> u64 {
        self.history.average_frame_size()
    }

    /// Maximum compressed frame size over the statistics window
    pub fn maximum_frame_size(&mut self) -> u32 {
        self.history.maximum_frame_size()
    }

    /// Configure the stream on its first frame
    ///
    /// Seeds the history origin and starts with an empty virtual buffer
    /// (slow start) so early overshoot is throttled immediately.
    pub fn configure(&mut self, starting_bit_rate: u64, cap: u64, mm_time: u32) {
        self.history.seed_origin(mm_time);
        self.bit_rate = starting_bit_rate;
        self.clamp_bit_rate(cap);
        self.vbuffer_free = 0; // Slow start
    }

    /// Clamp the bit rate into `[MIN_BIT_RATE, cap]`
    ///
    /// `cap` is the raw frame bit rate divided by the assumed minimum
    /// compression ratio; an unset bit rate falls back to
    /// [`DEFAULT_BIT_RATE`].
    pub fn clamp_bit_rate(&mut self, cap: u64) {
        if self.bit_rate == 0 {
            self.bit_rate = DEFAULT_BIT_RATE;
        } else if self.bit_rate < MIN_BIT_RATE {
            self.bit_rate = MIN_BIT_RATE;
        } else {
            self.bit_rate = self.bit_rate.min(cap.max(MIN_BIT_RATE));
        }
        debug!(mbps = mbps(self.bit_rate), "bit rate clamped");
    }

    /// Virtual buffer capacity in bytes at the current bit rate
    #[must_use]
    pub fn vbuffer_size(&self) -> i64 {
        (self.bit_rate * VBUFFER_MS / 8 / MILLI_SECOND) as i64
    }

    /// Remaining virtual buffer budget in bytes (negative = deficit)
    #[must_use]
    pub fn vbuffer_free(&self) -> i64 {
        self.vbuffer_free
    }

    /// Whether the frame at `mm_time` must be dropped
    ///
    /// True iff rate control is active and the timestamp falls before the
    /// scheduled resume point.
    #[must_use]
    pub fn should_drop(&self, mm_time: u32) -> bool {
        self.is_active() && mm_time < self.next_frame
    }

    /// Account for an encoded frame and reschedule drops
    ///
    /// Refills the virtual buffer by the time elapsed since the previous
    /// frame, drains it by the compressed size, records the frame in the
    /// history, and recomputes the earliest allowed next frame.
    pub fn on_encoded(&mut self, size: u32, mm_time: u32) {
        let mut elapsed = u64::from(mm_time.wrapping_sub(self.history.last_mm_time()));
        if elapsed == 0 {
            // First frame after the origin seed, or a duplicate timestamp:
            // budget one source frame period.
            elapsed = MILLI_SECOND / u64::from(self.source_fps());
        }
        let refill = (self.bit_rate * elapsed / 8 / MILLI_SECOND) as i64;
        self.vbuffer_free = (self.vbuffer_free + refill).min(self.vbuffer_size());
        self.history.add(mm_time, size);
        self.vbuffer_free -= i64::from(size);
        self.update_next_frame();
    }

    /// Effective bit rate over the statistics window
    ///
    /// The elapsed time extends past the newest frame by the scheduled drop
    /// gap, or by one source frame period when no drop is pending.
    #[must_use]
    pub fn effective_bit_rate(&self) -> u64 {
        let mut elapsed = u64::from(self.history.window_span_ms());
        if self.next_frame != 0 {
            elapsed += u64::from(self.next_frame.wrapping_sub(self.history.last_mm_time()));
        } else {
            elapsed += MILLI_SECOND / u64::from(self.source_fps());
        }
        if elapsed == 0 {
            0
        } else {
            self.history.window_sum() * 8 * MILLI_SECOND / elapsed
        }
    }

    /// Bit rate over a reported period, `None` when outside the history
    #[must_use]
    pub fn period_bit_rate(&self, from: u32, to: u32) -> Option<u64> {
        self.history.period_bit_rate(from, to)
    }

    /// Minimum playback delay the client needs at the current rate
    ///
    /// Large enough to send one maximum frame (typically an I-frame) plus
    /// one average frame, with the one-way network latency and a jitter
    /// margin on top.
    pub fn min_playback_delay_ms(&mut self) -> u32 {
        let size = u64::from(self.history.maximum_frame_size()) + self.history.average_frame_size();
        let send_time = MILLI_SECOND * size * 8 / self.bit_rate.max(1);
        let net_latency = self
            .feedback
            .as_ref()
            .map_or(0, |f| f.roundtrip_ms() / 2);
        send_time as u32 + (f64::from(net_latency) * (1.0 + LATENCY_MARGIN)) as u32
    }

    /// Recompute the earliest allowed next frame from the buffer deficit
    fn update_next_frame(&mut self) {
        if self.vbuffer_free >= 0 {
            self.next_frame = 0;
            return;
        }

        // How many source frames to skip so the deficit drains at the
        // target bit rate. Nanoseconds avoid precision loss.
        let delay_ns = (-self.vbuffer_free) as u64 * 8 * NANO_SECOND / self.bit_rate.max(1);
        let period_ns = NANO_SECOND / u64::from(self.source_fps());
        let drops = delay_ns.div_ceil(period_ns);
        debug!(
            drops,
            vbuffer_free = self.vbuffer_free,
            vbuffer_size = self.vbuffer_size(),
            "scheduling frame drops"
        );

        let delay_ns = (drops * period_ns + period_ns / 2).min(MAX_PERIOD_NS);
        self.next_frame = self
            .history
            .last_mm_time()
            .wrapping_add((delay_ns / NANO_MS) as u32);

        // Drops stretch the gap between encoded frames, so the client needs
        // a larger jitter buffer.
        let delay = self.min_playback_delay_ms();
        if let Some(feedback) = &self.feedback {
            feedback.update_playback_delay(delay);
        }
    }
}

impl std::fmt::Debug for RateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateController")
            .field("bit_rate", &self.bit_rate)
            .field("vbuffer_free", &self.vbuffer_free)
            .field("next_frame", &self.next_frame)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

fn mbps(bit_rate: u64) -> f64 {
    bit_rate as f64 / 1024.0 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct TestFeedback {
        roundtrip_ms: u32,
        fps: u32,
        last_delay: Arc<AtomicU32>,
    }

    impl RateFeedback for TestFeedback {
        fn roundtrip_ms(&self) -> u32 {
            self.roundtrip_ms
        }

        fn source_fps(&self) -> u32 {
            self.fps
        }

        fn update_playback_delay(&self, min_delay_ms: u32) {
            self.last_delay.store(min_delay_ms, Ordering::Relaxed);
        }
    }

    fn active_controller(bit_rate: u64) -> (RateController, Arc<AtomicU32>) {
        let delay = Arc::new(AtomicU32::new(0));
        let feedback = TestFeedback {
            roundtrip_ms: 40,
            fps: 30,
            last_delay: delay.clone(),
        };
        let mut rate = RateController::new(Some(Box::new(feedback)));
        rate.configure(bit_rate, u64::MAX, 0);
        (rate, delay)
    }

    /// Frame size that exactly fills the budget of one 33 ms frame tick.
    fn on_target_size(bit_rate: u64) -> u32 {
        (bit_rate * 33 / 8 / 1000) as u32
    }

    #[test]
    fn test_clamp_defaults() {
        let mut rate = RateController::new(None);
        rate.clamp_bit_rate(u64::MAX);
        assert_eq!(rate.bit_rate(), DEFAULT_BIT_RATE);
    }

    #[test]
    fn test_clamp_floor_and_cap() {
        let mut rate = RateController::new(None);
        rate.configure(1, u64::MAX, 0);
        assert_eq!(rate.bit_rate(), MIN_BIT_RATE);

        let mut rate = RateController::new(None);
        rate.configure(100_000_000, 10_000_000, 0);
        assert_eq!(rate.bit_rate(), 10_000_000);
    }

    #[test]
    fn test_inactive_controller_never_drops() {
        let mut rate = RateController::new(None);
        rate.configure(MIN_BIT_RATE, u64::MAX, 0);

        // Hugely oversized frames, still no drops without feedback.
        for i in 0..30u32 {
            rate.on_encoded(1_000_000, i * 33);
            assert!(!rate.should_drop((i + 1) * 33));
        }
    }

    #[test]
    fn test_steady_state_no_drops() {
        let bit_rate = 4_000_000;
        let (mut rate, _) = active_controller(bit_rate);
        let size = on_target_size(bit_rate);

        for i in 0..60u32 {
            let mm_time = i * 33;
            assert!(!rate.should_drop(mm_time), "dropped frame {i}");
            rate.on_encoded(size, mm_time);
        }

        // Effective bit rate within 15% of the target after warm-up.
        let effective = rate.effective_bit_rate();
        let lo = bit_rate * 85 / 100;
        let hi = bit_rate * 115 / 100;
        assert!(
            (lo..=hi).contains(&effective),
            "effective {effective} outside [{lo}, {hi}]"
        );
    }

    #[test]
    fn test_overshoot_schedules_drops() {
        let bit_rate = 4_000_000;
        let (mut rate, delay) = active_controller(bit_rate);
        let size = on_target_size(bit_rate) * 4; // 4x overshoot

        let mut dropped = 0;
        let mut first_drop_at = None;
        for i in 0..60u32 {
            let mm_time = i * 33;
            if rate.should_drop(mm_time) {
                dropped += 1;
                first_drop_at.get_or_insert(i);
                continue;
            }
            rate.on_encoded(size, mm_time);
        }

        // Slow start: 4x overshoot drains the empty buffer immediately, so
        // drops begin well within the first 15 frames.
        assert!(dropped > 0);
        assert!(first_drop_at.unwrap() < 15);

        // The drop schedule converges the output to at most the target.
        assert!(rate.effective_bit_rate() <= bit_rate * 115 / 100);

        // Scheduling drops pushed a playback-delay hint.
        assert!(delay.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_drop_window_clears_when_buffer_recovers() {
        let bit_rate = 4_000_000;
        let (mut rate, _) = active_controller(bit_rate);

        // One oversized frame forces a deficit.
        rate.on_encoded(on_target_size(bit_rate) * 40, 0);
        assert!(rate.vbuffer_free() < 0);
        let resume = (0..10_000u32).find(|t| !rate.should_drop(*t));
        assert!(resume.is_some());

        // A tiny frame at the resume point refills the buffer; with
        // vbuffer_free back above zero no further drops are scheduled.
        rate.on_encoded(1, resume.unwrap());
        if rate.vbuffer_free() >= 0 {
            assert!(!rate.should_drop(resume.unwrap() + 1));
        }
    }

    #[test]
    fn test_drop_gap_floored_at_3fps() {
        let (mut rate, _) = active_controller(MIN_BIT_RATE);

        // An absurdly large frame cannot stall the stream for more than
        // a third of a second.
        rate.on_encoded(10_000_000, 0);
        assert!(rate.should_drop(100));
        assert!(!rate.should_drop(334));
    }

    #[test]
    fn test_min_playback_delay() {
        let bit_rate = 4_000_000;
        let (mut rate, _) = active_controller(bit_rate);
        let size = on_target_size(bit_rate);
        for i in 0..30u32 {
            rate.on_encoded(size, i * 33);
        }

        // send time for (max + avg) sizes, plus half the 40 ms round trip
        // with a 10% margin.
        let sizes = u64::from(rate.maximum_frame_size()) + rate.average_frame_size();
        let expected = (1000 * sizes * 8 / bit_rate) as u32 + 22;
        assert_eq!(rate.min_playback_delay_ms(), expected);
    }
}
