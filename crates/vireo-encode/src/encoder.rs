//! Video Encoder
//!
//! The stateful encoding pipeline: adapts to format and resolution changes,
//! feeds raw source bitmaps into the codec, pulls compressed buffers back
//! out, and drives the rate controller with the result.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vireo_encode::{CodecKind, EncodeOutcome, EncoderConfig, VideoEncoder};
//!
//! let config = EncoderConfig::builder()
//!     .codec(CodecKind::Mjpeg)
//!     .starting_bit_rate(4_000_000)
//!     .build();
//! let mut encoder = VideoEncoder::new(config, None)?;
//!
//! match encoder.encode_frame(&bitmap, 640, 480, &crop, mm_time)? {
//!     EncodeOutcome::Encoded(frame) => stream.send(frame.data()),
//!     EncodeOutcome::Dropped => {}
//! }
//! ```
//!
//! # Zero-copy frame submission
//!
//! When the crop keeps the full bitmap width, the source chunks are wrapped
//! read-only into the codec buffer instead of copied. This is safe because
//! each wrapper owns a clone of the chunk's [`bytes::Bytes`] handle: the
//! pixel data outlives the codec's use of it no matter when the producer
//! drops the bitmap. Non-MJPEG pipelines additionally convert the frame
//! (a full copy) before their encoder sees it, and MJPEG performs no
//! inter-frame compression, so no codec retains the wrapper past the pull.

use gstreamer as gst;
use tracing::{debug, warn};

use crate::bitmap::{CropRect, PixelFormat, SourceBitmap};
use crate::codec::{source_caps, CodecKind, CodecPipeline};
use crate::config::EncoderConfig;
use crate::error::{EncodeError, Result};
use crate::feedback::RateFeedback;
use crate::rate::RateController;
use crate::raw::{self, FrameLayout};

/// Result of submitting one frame to the encoder
#[derive(Debug)]
pub enum EncodeOutcome {
    /// The frame was compressed; the buffer is ready to transmit
    Encoded(EncodedFrame),
    /// Rate control skipped the frame to hold the bit-rate target
    Dropped,
}

/// A compressed frame mapped for reading
///
/// Dropping the frame releases the mapping and the underlying codec buffer.
/// Release it before submitting the next frame when zero-copy is engaged.
pub struct EncodedFrame {
    map: gst::MappedBuffer<gst::buffer::Readable>,
}

impl EncodedFrame {
    /// Compressed bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.map.as_slice()
    }

    /// Compressed size in bytes
    #[must_use]
    pub fn size(&self) -> u32 {
        self.map.as_slice().len() as u32
    }
}

impl AsRef<[u8]> for EncodedFrame {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl std::fmt::Debug for EncodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedFrame").field("size", &self.size()).finish()
    }
}

/// Encoder statistics snapshot
#[derive(Debug, Clone, Copy)]
pub struct EncoderStats {
    /// Bit rate requested at construction (bits per second)
    pub starting_bit_rate: u64,
    /// Current effective bit rate (bits per second)
    pub current_bit_rate: u64,
    /// Compression level as a quality proxy, 0-100
    pub average_quality: f64,
}

/// Stateful video encoder for one stream
///
/// Construction initializes the codec library; the pipeline itself is built
/// lazily on the first frame and rebuilt whenever a state change fails or
/// the codec cannot survive a reconfiguration.
pub struct VideoEncoder {
    codec: CodecKind,
    starting_bit_rate: u64,
    width: u32,
    height: u32,
    format: Option<PixelFormat>,
    pipeline: Option<CodecPipeline>,
    rate: RateController,
    /// Frame counter stamped on codec buffers
    frame: u64,
}

impl VideoEncoder {
    /// Create an encoder for one video stream
    ///
    /// Rate control is active iff `feedback` is provided. Fails when the
    /// codec library cannot be initialized; the caller then falls back to a
    /// different compression scheme or fails the session.
    pub fn new(config: EncoderConfig, feedback: Option<Box<dyn RateFeedback>>) -> Result<Self> {
        config
            .validate()
            .map_err(|issues| EncodeError::InvalidConfig(issues.join("; ")))?;
        gst::init().map_err(|e| EncodeError::Init(e.to_string()))?;

        Ok(Self {
            codec: config.codec,
            starting_bit_rate: config.starting_bit_rate,
            width: 0,
            height: 0,
            format: None,
            pipeline: None,
            rate: RateController::new(feedback),
            frame: 0,
        })
    }

    /// Codec this encoder compresses with
    #[must_use]
    pub fn codec(&self) -> CodecKind {
        self.codec
    }

    /// Current bit-rate target in bits per second
    #[must_use]
    pub fn bit_rate(&self) -> u64 {
        self.rate.bit_rate()
    }

    /// Effective bit rate over the recent frame history
    #[must_use]
    pub fn effective_bit_rate(&self) -> u64 {
        self.rate.effective_bit_rate()
    }

    /// Encode one frame
    ///
    /// `width` and `height` are the stream dimensions; `crop` selects the
    /// visible region inside `bitmap`. `mm_time` is the producer's
    /// monotonic millisecond timestamp.
    ///
    /// Per-frame errors ([`EncodeError::is_frame_error`]) leave the
    /// pipeline running; the caller skips the frame and continues.
    pub fn encode_frame(
        &mut self,
        bitmap: &SourceBitmap,
        width: u32,
        height: u32,
        crop: &CropRect,
        mm_time: u32,
    ) -> Result<EncodeOutcome> {
        if !crop.contained_in(bitmap) {
            return Err(EncodeError::InvalidCrop {
                left: crop.left,
                top: crop.top,
                right: crop.right,
                bottom: crop.bottom,
                width: bitmap.width,
                height: bitmap.height,
            });
        }

        if self.format != Some(bitmap.format) || width != self.width || height != self.height {
            debug!(
                old_width = self.width,
                new_width = width,
                old_height = self.height,
                new_height = height,
                format = ?bitmap.format,
                "video format change"
            );
            self.width = width;
            self.height = height;
            self.format = Some(bitmap.format);

            let cap = self.bit_rate_cap(bitmap.format);
            if self.rate.is_configured() {
                self.rate.clamp_bit_rate(cap);
                self.reconfigure_pipeline(bitmap.format);
            } else {
                self.rate
                    .configure(self.starting_bit_rate, cap, mm_time);
            }
        }

        if self.rate.should_drop(mm_time) {
            // Drop the frame to limit the outgoing bit rate.
            return Ok(EncodeOutcome::Dropped);
        }

        if self.pipeline.is_none() {
            let params = self.codec.params(self.rate.bit_rate(), self.rate.source_fps());
            let caps = source_caps(bitmap.format, width, height, self.rate.source_fps());
            self.pipeline = Some(CodecPipeline::construct(&params, &caps)?);
        }

        self.push_raw_frame(bitmap, crop)?;
        let frame = self.pull_compressed()?;

        self.rate.on_encoded(frame.size(), mm_time);
        Ok(EncodeOutcome::Encoded(frame))
    }

    /// Process a stream report sent back by the client
    ///
    /// Reports arrive with the mm_time span they cover and how many frames
    /// the client dropped in it.
    pub fn client_stream_report(
        &mut self,
        num_frames: u32,
        num_drops: u32,
        start_frame_mm_time: u32,
        end_frame_mm_time: u32,
        end_frame_delay: i32,
        audio_delay: u32,
    ) {
        let period_bit_rate = self
            .rate
            .period_bit_rate(start_frame_mm_time, end_frame_mm_time);
        debug!(
            num_drops,
            num_frames,
            period_ms = end_frame_mm_time.wrapping_sub(start_frame_mm_time),
            end_frame_delay,
            audio_delay,
            period_mbps = period_bit_rate.map(|r| r as f64 / 1024.0 / 1024.0),
            effective_mbps = self.rate.effective_bit_rate() as f64 / 1024.0 / 1024.0,
            "client stream report"
        );
    }

    /// The server dropped a frame before it reached the encoder
    pub fn notify_server_frame_drop(&mut self) {
        debug!("server frame drop");
    }

    /// Statistics snapshot for monitoring
    #[must_use]
    pub fn stats(&self) -> EncoderStats {
        let raw_bit_rate = u64::from(self.width)
            * u64::from(self.height)
            * self.format.map_or(0, |f| u64::from(f.bits_per_pixel()))
            * u64::from(self.rate.source_fps());
        let current_bit_rate = self.rate.effective_bit_rate();

        // Use the compression level as a proxy for the quality.
        let average_quality = if current_bit_rate != 0 {
            (100.0 - raw_bit_rate as f64 / current_bit_rate as f64).max(0.0)
        } else {
            0.0
        };

        EncoderStats {
            starting_bit_rate: self.starting_bit_rate,
            current_bit_rate,
            average_quality,
        }
    }

    /// Highest bit rate worth using for the current video
    ///
    /// Based on a 10x compression ratio, which is more than enough for even
    /// MJPEG to provide good quality.
    fn bit_rate_cap(&self, format: PixelFormat) -> u64 {
        let raw_frame_bits =
            u64::from(self.width) * u64::from(self.height) * u64::from(format.bits_per_pixel());
        raw_frame_bits * u64::from(self.rate.source_fps()) / 10
    }

    /// Adapt a live pipeline to new caps, or tear it down for rebuild
    fn reconfigure_pipeline(&mut self, format: PixelFormat) {
        let Some(pipeline) = self.pipeline.take() else {
            return;
        };
        if pipeline.must_rebuild_on_reconfigure() {
            // The encoder cannot survive a caps change; the next frame
            // constructs a fresh pipeline.
            return;
        }
        let caps = source_caps(format, self.width, self.height, self.rate.source_fps());
        match pipeline.reconfigure(&caps) {
            Ok(()) => self.pipeline = Some(pipeline),
            Err(e) => warn!(error = %e, "reconfigure failed, pipeline torn down"),
        }
    }

    /// Assemble the raw frame and push it into the pipeline
    fn push_raw_frame(&mut self, bitmap: &SourceBitmap, crop: &CropRect) -> Result<()> {
        let layout = FrameLayout::of(bitmap, crop);

        let mut buffer = if layout.stream_stride != bitmap.stride {
            // We have to do a line-by-line copy because for each one we
            // have to leave out the pixels on the left or right.
            gst::Buffer::from_mut_slice(raw::line_copy(bitmap, crop)?)
        } else {
            let mut buffer = gst::Buffer::new();
            {
                let buf = buffer.get_mut().expect("new buffer is uniquely owned");
                let (chunk_index, chunk_offset, remaining) =
                    append_zero_copy(buf, bitmap, layout.chunk_offset, layout.frame_len)?;
                // Appending writable memory is fine; writing to the buffer
                // would copy the read-only wrappers.
                if remaining > 0 {
                    let tail = raw::chunk_copy(bitmap, chunk_index, chunk_offset, remaining)?;
                    buf.append_memory(gst::Memory::from_mut_slice(tail));
                }
            }
            buffer
        };

        buffer
            .get_mut()
            .expect("buffer is uniquely owned")
            .set_offset(self.frame);
        self.frame += 1;

        let Some(pipeline) = self.pipeline.as_ref() else {
            return Err(EncodeError::FrameRejected("pipeline unavailable".to_string()));
        };
        pipeline.push(buffer)
    }

    /// Pull the compressed sample for the frame just pushed
    fn pull_compressed(&self) -> Result<EncodedFrame> {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return Err(EncodeError::FrameRejected("pipeline unavailable".to_string()));
        };
        let sample = pipeline.pull()?;
        let buffer = sample
            .buffer_owned()
            .ok_or_else(|| EncodeError::FrameRejected("sample has no buffer".to_string()))?;
        let map = buffer
            .into_mapped_buffer_readable()
            .map_err(|_| EncodeError::FrameRejected("failed to map the compressed buffer".to_string()))?;
        Ok(EncodedFrame { map })
    }
}

/// Wrap as many source chunks as allowed into read-only codec memory
///
/// Returns the position where wrapping stopped and how many bytes remain
/// for the copy spill. GStreamer buffers hold a bounded number of memory
/// objects; past the bound it would merge them with wasteful copies, so one
/// slot is reserved for the spill memory.
fn append_zero_copy(
    buf: &mut gst::BufferRef,
    bitmap: &SourceBitmap,
    chunk_offset: usize,
    len: usize,
) -> Result<(usize, usize, usize)> {
    let stride = bitmap.stride as usize;
    let count = bitmap.chunks.len();
    let mut chunk_index = 0;
    let mut chunk_offset = chunk_offset;
    let mut len = len;

    // We may have to move forward by more than one chunk to reach the
    // first visible row.
    while chunk_index < count && chunk_offset >= bitmap.chunks[chunk_index].len() {
        let chunk = &bitmap.chunks[chunk_index];
        if count > 1 && chunk.len() % stride != 0 {
            return Err(EncodeError::PaddedChunk { index: chunk_index, count });
        }
        chunk_offset -= chunk.len();
        chunk_index += 1;
    }

    let max_mem = gst::Buffer::max_memory() as usize;
    let limit = if count - chunk_index > max_mem {
        chunk_index + max_mem - 1
    } else {
        count
    };

    while len > 0 && chunk_index < limit {
        let chunk = &bitmap.chunks[chunk_index];
        if count > 1 && chunk.len() % stride != 0 {
            return Err(EncodeError::PaddedChunk { index: chunk_index, count });
        }
        let take = (chunk.len() - chunk_offset).min(len);
        let slice = chunk.data.slice(chunk_offset..chunk_offset + take);
        buf.append_memory(gst::Memory::from_slice(slice));
        len -= take;
        chunk_offset = 0;
        chunk_index += 1;
    }

    Ok((chunk_index, chunk_offset, len))
}
