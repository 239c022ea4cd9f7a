//! H.264 encoder parameters
//!
//! x264 with zero-frame latency: zerolatency tuning, sliced threads, and
//! intra refresh for uniform compressed frame sizes. x264 takes its bitrate
//! in kbit/s.

use crate::codec::CodecParams;

pub(crate) fn params(bit_rate: u64) -> CodecParams {
    CodecParams {
        encoder_launch: format!(
            "x264enc name=encoder bitrate={} byte-stream=true aud=false tune=zerolatency \
             sliced-threads=true speed-preset=ultrafast intra-refresh=true",
            bit_rate / 1024
        ),
        disable_clock: false,
        rebuild_on_reconfigure: false,
    }
}
