//! MJPEG encoder parameters
//!
//! Motion JPEG performs no inter-frame compression, which keeps the encoder
//! latency at zero frames and lets the zero-copy path hand the source
//! bitmap straight to the codec.

use crate::codec::CodecParams;

pub(crate) fn params(bit_rate: u64) -> CodecParams {
    CodecParams {
        // max-threads=1 keeps the frame latency at zero
        encoder_launch: format!("avenc_mjpeg name=encoder bitrate={bit_rate} max-threads=1"),
        disable_clock: true,
        rebuild_on_reconfigure: false,
    }
}
