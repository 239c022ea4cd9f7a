//! VP8 encoder parameters
//!
//! See http://www.webmproject.org/docs/encoder-parameters/ for the meaning
//! of the vp8enc knobs. The encoder gets confused by caps changes on a live
//! pipeline, so format or resolution changes rebuild it from scratch.

use crate::codec::CodecParams;

pub(crate) fn params(bit_rate: u64, source_fps: u32) -> CodecParams {
    // lag-in-frames=0 keeps the frame latency at zero; error-resilient
    // covers client-side frame drops.
    let deadline_us = 1_000_000 / u64::from(source_fps.max(1)) / 2;
    let threads = num_cpus::get().saturating_sub(1).max(1);
    CodecParams {
        encoder_launch: format!(
            "vp8enc name=encoder resize-allowed=true target-bitrate={bit_rate} end-usage=cbr \
             lag-in-frames=0 error-resilient=default deadline={deadline_us} threads={threads}"
        ),
        disable_clock: false,
        rebuild_on_reconfigure: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_tracks_fps() {
        let p30 = params(4_000_000, 30);
        assert!(p30.encoder_launch.contains("deadline=16666"));

        let p60 = params(4_000_000, 60);
        assert!(p60.encoder_launch.contains("deadline=8333"));
    }
}
