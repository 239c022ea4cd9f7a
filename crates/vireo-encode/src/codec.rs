//! GStreamer Codec Pipeline
//!
//! Wraps the codec-library state machine behind a small surface: construct,
//! reconfigure, push raw frames, pull compressed samples, tear down. The
//! per-codec element descriptions live in [`crate::mjpeg`], [`crate::vp8`]
//! and [`crate::h264`]; everything here is codec-agnostic.
//!
//! The pipeline is `appsrc ! videoconvert ! <encoder> ! appsink`, built from
//! a launch description and driven synchronously: one raw buffer in, one
//! compressed sample out.

use gstreamer as gst;
use gstreamer::prelude::{Cast, ElementExt, GstBinExt, GstObjectExt, PipelineExt};
use gstreamer_app as gst_app;
use tracing::{debug, warn};

use crate::bitmap::PixelFormat;
use crate::error::{EncodeError, Result};
use crate::{h264, mjpeg, vp8};

/// Compressed stream codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// Motion JPEG: intra-frame only, cheapest to encode
    Mjpeg,
    /// VP8 in CBR mode
    Vp8,
    /// H.264 baseline via x264
    H264,
}

impl CodecKind {
    pub(crate) fn params(self, bit_rate: u64, source_fps: u32) -> CodecParams {
        match self {
            Self::Mjpeg => mjpeg::params(bit_rate),
            Self::Vp8 => vp8::params(bit_rate, source_fps),
            Self::H264 => h264::params(bit_rate),
        }
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mjpeg => write!(f, "mjpeg"),
            Self::Vp8 => write!(f, "vp8"),
            Self::H264 => write!(f, "h264"),
        }
    }
}

/// Codec-specific pipeline construction parameters
#[derive(Debug, Clone)]
pub(crate) struct CodecParams {
    /// Encoder element with its tuning properties, launch syntax
    pub(crate) encoder_launch: String,
    /// Run the pipeline without a clock (MJPEG's timing element is broken,
    /// see https://bugzilla.gnome.org/show_bug.cgi?id=753257)
    pub(crate) disable_clock: bool,
    /// The encoder cannot survive a caps change; rebuild instead
    pub(crate) rebuild_on_reconfigure: bool,
}

/// Source caps for the raw video entering the pipeline
pub(crate) fn source_caps(format: PixelFormat, width: u32, height: u32, fps: u32) -> gst::Caps {
    gst::Caps::builder("video/x-raw")
        .field("format", format.gst_format())
        .field("width", width as i32)
        .field("height", height as i32)
        .field("framerate", gst::Fraction::new(fps as i32, 1))
        .build()
}

/// A constructed, playing codec pipeline
///
/// Dropping the pipeline sets it to `Null`, releasing every element and any
/// still-referenced zero-copy source memory.
pub(crate) struct CodecPipeline {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    appsink: gst_app::AppSink,
    rebuild_on_reconfigure: bool,
}

impl CodecPipeline {
    /// Build the pipeline, apply the source caps, and start playing
    pub(crate) fn construct(params: &CodecParams, caps: &gst::Caps) -> Result<Self> {
        let description = format!(
            "appsrc name=src do-timestamp=true ! videoconvert ! {} ! appsink name=sink sync=false",
            params.encoder_launch
        );
        debug!(pipeline = %description, "constructing codec pipeline");

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| EncodeError::PipelineConstruction(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| {
                EncodeError::PipelineConstruction("launch did not produce a pipeline".to_string())
            })?;

        let appsrc = pipeline
            .by_name("src")
            .and_then(|e| e.downcast::<gst_app::AppSrc>().ok())
            .ok_or_else(|| {
                EncodeError::PipelineConstruction("appsrc element missing".to_string())
            })?;
        let appsink = pipeline
            .by_name("sink")
            .and_then(|e| e.downcast::<gst_app::AppSink>().ok())
            .ok_or_else(|| {
                EncodeError::PipelineConstruction("appsink element missing".to_string())
            })?;

        appsrc.set_caps(Some(caps));

        if params.disable_clock {
            pipeline.use_clock(None::<&gst::Clock>);
        }

        let this = Self {
            pipeline,
            appsrc,
            appsink,
            rebuild_on_reconfigure: params.rebuild_on_reconfigure,
        };
        this.pipeline
            .set_state(gst::State::Playing)
            .map_err(|_| EncodeError::StateChange("unable to start the pipeline".to_string()))?;
        Ok(this)
    }

    /// Whether a caps change requires a full rebuild instead
    pub(crate) fn must_rebuild_on_reconfigure(&self) -> bool {
        self.rebuild_on_reconfigure
    }

    /// Apply new source caps to the running pipeline
    ///
    /// Pauses, swaps the caps, and resumes. On failure the caller tears the
    /// pipeline down; the next frame rebuilds it.
    pub(crate) fn reconfigure(&self, caps: &gst::Caps) -> Result<()> {
        if self.pipeline.set_state(gst::State::Paused).is_err() {
            warn!("could not pause the pipeline, rebuilding it instead");
            return Err(EncodeError::StateChange("pause failed".to_string()));
        }
        self.appsrc.set_caps(Some(caps));
        if self.pipeline.set_state(gst::State::Playing).is_err() {
            warn!("could not restart the pipeline, rebuilding it instead");
            return Err(EncodeError::StateChange("restart failed".to_string()));
        }
        Ok(())
    }

    /// Push one raw frame buffer into the pipeline
    pub(crate) fn push(&self, buffer: gst::Buffer) -> Result<()> {
        self.appsrc.push_buffer(buffer).map(|_| ()).map_err(|flow| {
            EncodeError::FrameRejected(format!("unable to push source buffer ({flow:?})"))
        })
    }

    /// Pull the compressed sample for the pushed frame, blocking until the
    /// codec produced it
    pub(crate) fn pull(&self) -> Result<gst::Sample> {
        self.appsink
            .pull_sample()
            .map_err(|_| EncodeError::FrameRejected("failed to pull the compressed buffer".to_string()))
    }
}

impl Drop for CodecPipeline {
    fn drop(&mut self) {
        if self.pipeline.set_state(gst::State::Null).is_err() {
            warn!(pipeline = %self.pipeline.name(), "failed to tear down pipeline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_display() {
        assert_eq!(CodecKind::Mjpeg.to_string(), "mjpeg");
        assert_eq!(CodecKind::Vp8.to_string(), "vp8");
        assert_eq!(CodecKind::H264.to_string(), "h264");
    }

    #[test]
    fn test_params_per_codec() {
        let mjpeg = CodecKind::Mjpeg.params(4_000_000, 30);
        assert!(mjpeg.encoder_launch.starts_with("avenc_mjpeg"));
        assert!(mjpeg.disable_clock);
        assert!(!mjpeg.rebuild_on_reconfigure);

        let vp8 = CodecKind::Vp8.params(4_000_000, 30);
        assert!(vp8.encoder_launch.starts_with("vp8enc"));
        assert!(vp8.rebuild_on_reconfigure);
        assert!(!vp8.disable_clock);

        let h264 = CodecKind::H264.params(4_000_000, 30);
        assert!(h264.encoder_launch.starts_with("x264enc"));
        assert!(!h264.rebuild_on_reconfigure);
    }
}
