//! # vireo-cursor
//!
//! Cursor-sprite channel for remote display servers: a reference-counted
//! cursor command pipeline with a bounded per-client cursor cache.
//!
//! This crate is part of the [vireo-stream](https://github.com/vireo-remote/vireo-stream)
//! workspace and pairs with [`vireo-inputs`](https://crates.io/crates/vireo-inputs),
//! whose mouse mode decides whether cursor moves are streamed at all.
//!
//! # Why a Separate Cursor Channel?
//!
//! Streaming the cursor separately from the video gives:
//! - Lower perceived latency (the pointer moves without waiting for a frame)
//! - Reduced bandwidth (a sprite is tiny compared to a video frame)
//! - Client-side rendering of trails and visibility
//!
//! # Features
//!
//! - **Shared cursor items**: one [`CursorItem`] is referenced by the
//!   channel's current-cursor slot and every client pipe, released when the
//!   last reference drains
//! - **Per-client cursor cache**: 256 shapes keyed by the producer's
//!   `unique` id, LRU-evicted; repeated shapes transmit as cache references
//! - **Cache-aware marshalling**: `CACHE_ME` on first sighting,
//!   `FROM_CACHE` afterwards, inline payload for uncacheable shapes
//! - **Reset and disconnect semantics**: cache invalidation messages and
//!   pipe cancellation at the right moments
//!
//! # Quick Start
//!
//! ```rust
//! use bytes::Bytes;
//! use vireo_cursor::{
//!     CursorChannel, CursorCommand, CursorHeader, CursorMessage, CursorShape, Point,
//! };
//!
//! let mut channel = CursorChannel::new();
//! let client = channel.connect_client();
//!
//! channel.process_command(
//!     CursorCommand::Set {
//!         shape: CursorShape {
//!             header: CursorHeader {
//!                 unique: 0xaa,
//!                 width: 32,
//!                 height: 32,
//!                 hot_spot_x: 4,
//!                 hot_spot_y: 4,
//!             },
//!             data: Bytes::from(vec![0u8; 32 * 32 * 4]),
//!         },
//!         position: Point::new(100, 100),
//!         visible: true,
//!     },
//!     0,
//! );
//!
//! for message in channel.drain_client(client).unwrap() {
//!     match message {
//!         CursorMessage::Init { .. } => { /* seed the fresh client */ }
//!         CursorMessage::Set { cursor, .. } => { /* marshal shape + payload */ }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! # Concurrency
//!
//! The channel is single-threaded and owned by the worker loop. Cursor
//! items use [`std::sync::Arc`] purely for shared ownership between the
//! channel and its pipes; per-client pipe order is preserved.

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod cache;
pub mod channel;
pub mod error;
pub mod item;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Channel (primary entry point)
pub use channel::{
    ClientId, ClientState, CursorChannel, CursorFlags, CursorMessage, MouseMode, PipeItem,
    WireCursor, VERB_CURSOR_RESET,
};

// Cursor data model
pub use item::{CursorCommand, CursorHeader, CursorItem, CursorShape, Point};

// Cache
pub use cache::{CursorCache, CURSOR_CACHE_CAPACITY};

// Errors
pub use error::{CursorError, Result};

// =============================================================================
// CRATE-LEVEL ITEMS
// =============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_channel() {
        let channel = CursorChannel::new();
        assert!(channel.visible());
        assert_eq!(channel.mouse_mode(), MouseMode::Server);
        assert!(!channel.is_connected());
    }
}
