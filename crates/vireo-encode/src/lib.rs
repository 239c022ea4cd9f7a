//! # vireo-encode
//!
//! Adaptive video encoding for remote display streams: a GStreamer-backed
//! codec pipeline (MJPEG/VP8/H.264) with virtual-buffer bit-rate control,
//! frame-drop scheduling, and zero-copy raw frame submission.
//!
//! This crate is part of the [vireo-stream](https://github.com/vireo-remote/vireo-stream)
//! workspace: the embedding worker loop captures framebuffer updates,
//! hands them to [`VideoEncoder::encode_frame`], and transmits the
//! compressed buffers to the client.
//!
//! # Features
//!
//! - **Three codecs**: MJPEG (`avenc_mjpeg`), VP8 (`vp8enc`) and H.264
//!   (`x264enc`), all tuned for zero-frame latency
//! - **Adaptive Bit Rate**: a virtual buffer absorbs I-frame bursts and
//!   forces evenly spaced frame drops once the encoder overshoots
//! - **Frame Statistics**: sliding-window history driving the effective
//!   bit rate, playback-delay hints, and client report annotations
//! - **Zero-Copy**: full-width crops wrap the source chunks directly into
//!   codec memory; shared [`bytes::Bytes`] ownership keeps them alive
//! - **Format Agility**: resolution and pixel-format changes reconfigure
//!   the pipeline in place (or rebuild it where the codec requires)
//!
//! # Requirements
//!
//! This crate requires:
//! - **GStreamer 1.x** runtime with the base, libav (MJPEG), vpx (VP8) and
//!   x264 (H.264) plugin sets
//! - **Rust 1.77+**
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vireo_encode::{
//!     BitmapChunk, CodecKind, CropRect, EncodeOutcome, EncoderConfig, PixelFormat,
//!     SourceBitmap, VideoEncoder,
//! };
//!
//! let config = EncoderConfig::builder()
//!     .codec(CodecKind::Mjpeg)
//!     .starting_bit_rate(4 * 1024 * 1024)
//!     .build();
//!
//! // Passing feedback callbacks switches rate control on.
//! let mut encoder = VideoEncoder::new(config, Some(Box::new(transport_feedback)))?;
//!
//! let crop = CropRect::new(0, 0, bitmap.width, bitmap.height);
//! match encoder.encode_frame(&bitmap, bitmap.width, bitmap.height, &crop, mm_time)? {
//!     EncodeOutcome::Encoded(frame) => client.send_video(frame.data()),
//!     EncodeOutcome::Dropped => {} // over budget, skipped
//! }
//! ```
//!
//! # Error Handling
//!
//! The crate uses typed errors via [`EncodeError`]. Per-frame errors
//! (padded chunks, codec push/pull failures) drop the affected frame and
//! leave the pipeline running; state-change failures tear it down for a
//! rebuild on the next frame; only codec-library initialization is fatal.
//!
//! ```rust,ignore
//! match encoder.encode_frame(&bitmap, w, h, &crop, mm_time) {
//!     Ok(outcome) => handle(outcome),
//!     Err(e) if e.is_frame_error() => {} // skip this frame
//!     Err(e) => return Err(e.into()),    // encoder unusable
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   SourceBitmap   │ chunked, possibly bottom-up framebuffer
//! └────────┬─────────┘
//!          │ crop + stride layout
//!          ▼
//! ┌──────────────────┐     stride match      ┌───────────────────┐
//! │  raw assembly    ├──────────────────────▶│ zero-copy wrappers│
//! │  (line copy)     │                       └─────────┬─────────┘
//! └────────┬─────────┘                                 │
//!          ▼                                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  appsrc ! videoconvert ! avenc_mjpeg|vp8enc|x264enc ! appsink│
//! └────────┬────────────────────────────────────────────────────┘
//!          │ compressed sample
//!          ▼
//! ┌──────────────────┐    size, mm_time   ┌──────────────────┐
//! │   EncodedFrame   ├───────────────────▶│  RateController  │
//! └──────────────────┘                    │  + FrameHistory  │
//!                                         └──────────────────┘
//! ```
//!
//! # Concurrency
//!
//! The encoder is single-threaded and owned by the worker loop; it may
//! block inside the codec for one frame's worth of compression. The codec
//! spawns its own internal threads, but the encoder only talks to it
//! through blocking push/pull calls. Feedback callbacks must not block.

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod bitmap;
pub mod codec;
pub mod config;
pub mod encoder;
pub mod error;
pub mod feedback;
pub mod rate;
pub mod raw;
pub mod stats;

mod h264;
mod mjpeg;
mod vp8;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Encoder (primary entry point)
pub use encoder::{EncodeOutcome, EncodedFrame, EncoderStats, VideoEncoder};

// Configuration
pub use config::{EncoderConfig, EncoderConfigBuilder};

// Errors
pub use error::{EncodeError, Result};

// Source frame types
pub use bitmap::{BitmapChunk, CropRect, PixelFormat, SourceBitmap};

// Codec selection
pub use codec::CodecKind;

// Rate control
pub use feedback::{RateFeedback, DEFAULT_FPS};
pub use rate::{RateController, DEFAULT_BIT_RATE, MIN_BIT_RATE, VBUFFER_MS};

// =============================================================================
// RE-EXPORTS - ADVANCED API
// =============================================================================

// Frame statistics
pub use stats::{FrameHistory, HISTORY_SIZE, STATS_WINDOW};

// Raw frame assembly (for capture harnesses and tests)
pub use raw::{materialize, FrameLayout};

// =============================================================================
// CRATE-LEVEL ITEMS
// =============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
