//! Error types for encoder operations
//!
//! Provides typed errors that library users can match and handle specifically.

use thiserror::Error;

/// Errors that can occur while encoding a video stream
///
/// The variants follow the failure taxonomy of the encoder: per-frame errors
/// ([`EncodeError::PaddedChunk`], [`EncodeError::TruncatedBitmap`],
/// [`EncodeError::FrameRejected`]) drop the affected frame and leave the
/// pipeline running, while state-change and construction errors tear the
/// pipeline down so it is rebuilt on the next frame.
///
/// # Examples
///
/// ```no_run
/// # use vireo_encode::{CodecKind, EncodeError, EncoderConfig, VideoEncoder};
/// # fn example() -> Result<(), EncodeError> {
/// let config = EncoderConfig::builder().codec(CodecKind::Mjpeg).build();
///
/// match VideoEncoder::new(config, None) {
///     Ok(encoder) => { /* stream frames */ }
///     Err(EncodeError::Init(msg)) => {
///         eprintln!("No encoder available: {msg}");
///     }
///     Err(e) => {
///         eprintln!("Other error: {e}");
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum EncodeError {
    /// GStreamer library initialization failed
    ///
    /// Fatal: no encoder can be created. The caller chooses a fallback
    /// compression scheme or fails the session.
    #[error("GStreamer initialization failed: {0}")]
    Init(String),

    /// The encoder configuration is invalid
    #[error("invalid encoder configuration: {0}")]
    InvalidConfig(String),

    /// The codec pipeline could not be constructed
    ///
    /// Usually means the codec element (`avenc_mjpeg`, `vp8enc`, `x264enc`)
    /// is not installed. The frame is dropped; construction is retried on
    /// the next frame.
    #[error("failed to construct codec pipeline: {0}")]
    PipelineConstruction(String),

    /// A pipeline state change (pause/play) failed
    ///
    /// The pipeline is torn down and rebuilt on the next frame.
    #[error("pipeline state change failed: {0}")]
    StateChange(String),

    /// A bitmap chunk's length is not a whole multiple of the row stride
    ///
    /// Padded chunks cannot be walked line by line; the frame is rejected.
    #[error("chunk {index}/{count} is padded, cannot copy")]
    PaddedChunk {
        /// Index of the offending chunk
        index: usize,
        /// Total number of chunks in the bitmap
        count: usize,
    },

    /// The bitmap's chunks end before the cropped region does
    #[error("source bitmap truncated: {missing} bytes missing")]
    TruncatedBitmap {
        /// Bytes the crop still needed when the chunk list ran out
        missing: usize,
    },

    /// The crop rectangle is empty or extends past the bitmap
    #[error("crop rectangle {left},{top}-{right},{bottom} not contained in {width}x{height} bitmap")]
    InvalidCrop {
        /// Crop left edge
        left: u32,
        /// Crop top edge
        top: u32,
        /// Crop right edge
        right: u32,
        /// Crop bottom edge
        bottom: u32,
        /// Bitmap width
        width: u32,
        /// Bitmap height
        height: u32,
    },

    /// The codec refused the frame on push or produced no compressed sample
    ///
    /// Transient: the frame is dropped, the pipeline keeps running.
    #[error("frame rejected by codec: {0}")]
    FrameRejected(String),
}

impl EncodeError {
    /// Whether the error is confined to a single frame
    ///
    /// Per-frame errors leave the pipeline intact; the caller simply skips
    /// the frame. Everything else invalidates the pipeline or the encoder.
    #[must_use]
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Self::PaddedChunk { .. }
                | Self::TruncatedBitmap { .. }
                | Self::InvalidCrop { .. }
                | Self::FrameRejected(_)
        )
    }
}

/// Result type for encoder operations
///
/// This is a convenience alias for `Result<T, EncodeError>`.
pub type Result<T> = std::result::Result<T, EncodeError>;
