//! Error types for input channel operations

use thiserror::Error;

/// Errors that can occur on the input channel
#[derive(Error, Debug)]
pub enum InputsError {
    /// A sink of this kind is already attached
    ///
    /// Each sink is attached at most once; detach it first to replace it.
    #[error("already have {0}")]
    SinkAlreadySet(&'static str),

    /// The channel was closed after an incoming error
    #[error("input channel is closed")]
    ChannelClosed,
}

/// Result type for input channel operations
///
/// This is a convenience alias for `Result<T, InputsError>`.
pub type Result<T> = std::result::Result<T, InputsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            InputsError::SinkAlreadySet("keyboard").to_string(),
            "already have keyboard"
        );
    }
}
