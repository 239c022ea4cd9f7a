//! Encoder Configuration
//!
//! Provides configuration options for the video encoder with a builder
//! pattern for ergonomic construction.
//!
//! # Examples
//!
//! ```rust
//! use vireo_encode::{CodecKind, EncoderConfig};
//!
//! // Using builder pattern
//! let config = EncoderConfig::builder()
//!     .codec(CodecKind::Vp8)
//!     .starting_bit_rate(4 * 1024 * 1024)
//!     .build();
//!
//! // Using struct literal with defaults
//! let config = EncoderConfig {
//!     codec: CodecKind::H264,
//!     ..Default::default()
//! };
//! ```

use crate::codec::CodecKind;
use crate::rate::DEFAULT_BIT_RATE;

/// Configuration for a [`crate::VideoEncoder`]
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Codec to compress the stream with (default: MJPEG)
    ///
    /// MJPEG is the cheapest and most widely available; VP8 and H.264
    /// compress better at the cost of encoder CPU.
    pub codec: CodecKind,

    /// Initial bit-rate estimate in bits per second (default: 8 Mb/s)
    ///
    /// Applied when the first frame configures the stream, then clamped
    /// against the source dimensions and adapted by the rate controller.
    pub starting_bit_rate: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: CodecKind::Mjpeg,
            starting_bit_rate: DEFAULT_BIT_RATE,
        }
    }
}

impl EncoderConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> EncoderConfigBuilder {
        EncoderConfigBuilder::default()
    }

    /// Validate configuration and return any issues
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.starting_bit_rate == 0 {
            issues.push("starting_bit_rate must be non-zero".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// Builder for [`EncoderConfig`]
///
/// Provides a fluent interface for constructing configuration.
#[derive(Debug, Clone, Default)]
pub struct EncoderConfigBuilder {
    codec: Option<CodecKind>,
    starting_bit_rate: Option<u64>,
}

impl EncoderConfigBuilder {
    /// Set the stream codec
    #[must_use]
    pub fn codec(mut self, codec: CodecKind) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Set the initial bit-rate estimate in bits per second
    #[must_use]
    pub fn starting_bit_rate(mut self, bit_rate: u64) -> Self {
        self.starting_bit_rate = Some(bit_rate);
        self
    }

    /// Build the configuration, filling unset fields with defaults
    #[must_use]
    pub fn build(self) -> EncoderConfig {
        let defaults = EncoderConfig::default();
        EncoderConfig {
            codec: self.codec.unwrap_or(defaults.codec),
            starting_bit_rate: self.starting_bit_rate.unwrap_or(defaults.starting_bit_rate),
        }
    }
}
