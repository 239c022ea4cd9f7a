//! Error types for cursor channel operations

use thiserror::Error;

use crate::channel::ClientId;

/// Errors that can occur on the cursor channel
#[derive(Error, Debug)]
pub enum CursorError {
    /// The client id is not connected to this channel
    ///
    /// Either the client never connected or it was disconnected and its
    /// pipe was cancelled.
    #[error("client {0:?} is not connected")]
    UnknownClient(ClientId),
}

/// Result type for cursor channel operations
///
/// This is a convenience alias for `Result<T, CursorError>`.
pub type Result<T> = std::result::Result<T, CursorError>;
