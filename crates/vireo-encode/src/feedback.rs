//! Rate-Control Feedback
//!
//! The encoder adapts to network conditions through a feedback handle
//! provided by the embedding transport layer. Supplying a handle is what
//! switches rate control on: without one the encoder never drops frames and
//! assumes the default source frame rate.
//!
//! All callbacks are invoked from the encoding path and must not block.

/// Default source frame rate assumed when no feedback handle is present
pub const DEFAULT_FPS: u32 = 30;

/// Feedback from the transport layer driving rate control
///
/// # Examples
///
/// ```rust
/// use vireo_encode::RateFeedback;
///
/// struct Transport;
///
/// impl RateFeedback for Transport {
///     fn roundtrip_ms(&self) -> u32 {
///         40 // measured by the transport's keepalive
///     }
///
///     fn source_fps(&self) -> u32 {
///         60
///     }
/// }
/// ```
pub trait RateFeedback {
    /// Current client round-trip time in milliseconds
    ///
    /// The network latency is assumed symmetric; half the round trip is
    /// folded into the playback-delay hint.
    fn roundtrip_ms(&self) -> u32;

    /// Source frame rate in frames per second
    ///
    /// May change at any time, so the encoder never stores the result.
    fn source_fps(&self) -> u32 {
        DEFAULT_FPS
    }

    /// Push a new minimum playback delay to the client
    ///
    /// Called whenever frame drops change the expected spacing between
    /// encoded frames, so the client can size its jitter buffer.
    fn update_playback_delay(&self, min_delay_ms: u32) {
        let _ = min_delay_ms;
    }
}
