//! # vireo-stream
//!
//! Server-side video streaming core for remote display and desktop sharing.
//!
//! This crate provides a unified interface to the vireo streaming libraries:
//!
//! - **[`encode`]** - Adaptive video encoding (MJPEG/VP8/H.264) with
//!   virtual-buffer bit-rate control and frame-drop scheduling
//! - **[`cursor`]** - Cursor-sprite channel with per-client cursor caching
//! - **[`inputs`]** - Input channel: keyboard/mouse/tablet routing,
//!   ack windowing, and modifier-LED synchronization
//!
//! # Features
//!
//! All features are enabled by default. You can selectively enable only what you need:
//!
//! ```toml
//! # Use everything (default)
//! vireo-stream = "0.1"
//!
//! # Encoder only
//! vireo-stream = { version = "0.1", default-features = false, features = ["encode"] }
//!
//! # Cursor + inputs channels without the codec pipeline
//! vireo-stream = { version = "0.1", default-features = false, features = ["cursor", "inputs"] }
//! ```
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `encode` | Yes | Adaptive video encoding |
//! | `cursor` | Yes | Cursor channel and cache |
//! | `inputs` | Yes | Input channel |
//! | `full` | No | All features from all sub-crates |
//!
//! # Quick Start
//!
//! ## Encoding captured frames
//!
//! ```rust,ignore
//! use vireo_stream::encode::{CodecKind, EncoderConfig, EncodeOutcome, VideoEncoder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EncoderConfig::builder()
//!         .codec(CodecKind::Vp8)
//!         .starting_bit_rate(4 * 1024 * 1024)
//!         .build();
//!     let mut encoder = VideoEncoder::new(config, None)?;
//!
//!     // For each captured frame:
//!     match encoder.encode_frame(&bitmap, width, height, &crop, true, mm_time)? {
//!         EncodeOutcome::Encoded(frame) => send_to_client(frame.data()),
//!         EncodeOutcome::Dropped => {} // rate control skipped this frame
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Driving the cursor channel
//!
//! ```rust,ignore
//! use vireo_stream::cursor::{CursorChannel, CursorCommand};
//!
//! let mut channel = CursorChannel::new();
//! let client = channel.connect_client();
//!
//! channel.process_command(cmd, group_id);
//! for message in channel.drain_client(client) {
//!     transport.send(message); // marshalled by the wire layer
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         vireo-stream                            │
//! ├─────────────────┬─────────────────────┬─────────────────────────┤
//! │  vireo-encode   │    vireo-cursor     │      vireo-inputs       │
//! │                 │                     │                         │
//! │  VideoEncoder   │  CursorChannel      │  InputsChannel          │
//! │  RateController │  CursorCache        │  KeyboardSink/MouseSink │
//! │  FrameHistory   │  CursorItem         │  AgentMouseState        │
//! └────────┬────────┴──────────┬──────────┴────────────┬────────────┘
//!          │                   │                       │
//!          ▼                   ▼                       ▼
//!    GStreamer codecs    client cursor pipe      kbd/mouse/tablet
//! ```
//!
//! The embedding worker loop owns all three: it feeds captured bitmaps to
//! the encoder, forwards cursor commands from the display source to the
//! cursor channel, and hands incoming client messages to the input channel.
//!
//! # Platform Support
//!
//! - **Linux first** - GStreamer codec elements (`avenc_mjpeg`, `vp8enc`,
//!   `x264enc`) must be installed for the `encode` feature
//! - The `cursor` and `inputs` crates are pure Rust and platform-neutral
//!
//! # Related Crates
//!
//! You can also use the individual crates directly:
//!
//! - [`vireo-encode`](https://crates.io/crates/vireo-encode) - Encoding only
//! - [`vireo-cursor`](https://crates.io/crates/vireo-cursor) - Cursor channel only
//! - [`vireo-inputs`](https://crates.io/crates/vireo-inputs) - Input channel only

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// RE-EXPORTS
// =============================================================================

/// Adaptive video encoding with virtual-buffer bit-rate control.
///
/// This module provides the stateful encoder pipeline:
/// - MJPEG, VP8 and H.264 codec pipelines over GStreamer
/// - Sliding-window frame statistics and effective bit rate
/// - Frame-drop scheduling and playback-delay hints
/// - Zero-copy raw frame submission where the layout allows
///
/// See [`vireo_encode`] documentation for details.
#[cfg(feature = "encode")]
#[cfg_attr(docsrs, doc(cfg(feature = "encode")))]
pub use vireo_encode as encode;

/// Cursor-sprite channel with per-client cursor caching.
///
/// This module provides the cursor command pipeline:
/// - Shared cursor items referenced by every client pipe
/// - Per-client LRU cache keyed by the shape's `unique` id
/// - Cache-aware marshalling (`CACHE_ME` / `FROM_CACHE`)
///
/// See [`vireo_cursor`] documentation for details.
#[cfg(feature = "cursor")]
#[cfg_attr(docsrs, doc(cfg(feature = "cursor")))]
pub use vireo_cursor as cursor;

/// Input channel: keyboard, mouse and tablet routing.
///
/// This module provides the inbound message handler:
/// - Server-relative and client-absolute mouse modes
/// - Motion ack windowing
/// - Modifier-LED synchronization with a 2-second echo timer
///
/// See [`vireo_inputs`] documentation for details.
#[cfg(feature = "inputs")]
#[cfg_attr(docsrs, doc(cfg(feature = "inputs")))]
pub use vireo_inputs as inputs;

// =============================================================================
// PRELUDE - Common types for convenience
// =============================================================================

/// Prelude module with commonly used types.
///
/// ```rust
/// use vireo_stream::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "encode")]
    pub use vireo_encode::{
        CodecKind, CropRect, EncodeError, EncodeOutcome, EncoderConfig, PixelFormat, RateFeedback,
        SourceBitmap, VideoEncoder,
    };

    #[cfg(feature = "cursor")]
    pub use vireo_cursor::{CursorChannel, CursorCommand, CursorItem, CursorMessage, MouseMode};

    #[cfg(feature = "inputs")]
    pub use vireo_inputs::{ChannelStatus, InputMessage, InputsChannel, InputsMessage};
}
