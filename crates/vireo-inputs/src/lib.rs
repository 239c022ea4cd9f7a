//! # vireo-inputs
//!
//! Input channel for remote display servers: decodes client keyboard,
//! mouse and tablet messages, routes them into sinks provided by the
//! embedding process, paces the client with motion acks, and keeps
//! modifier LEDs synchronized in both directions.
//!
//! This crate is part of the [vireo-stream](https://github.com/vireo-remote/vireo-stream)
//! workspace and pairs with [`vireo-cursor`](https://crates.io/crates/vireo-cursor):
//! the mouse mode chosen here decides whether the cursor channel streams
//! pointer moves.
//!
//! # Features
//!
//! - **Mouse-mode routing**: server-relative deltas to the mouse sink,
//!   client-absolute positions to the guest agent or a tablet sink
//! - **Ack windowing**: one [`InputsMessage::MouseMotionAck`] per
//!   [`MOTION_ACK_BUNCH`] motion events
//! - **Modifier sync**: client modifier state diffed against the local
//!   LEDs and injected as make/break scan codes, with a 2-second echo timer
//! - **Release-all on error**: stuck-modifier protection before teardown
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vireo_inputs::{InputMessage, InputsChannel, MouseMode};
//!
//! let mut channel = InputsChannel::new();
//! channel.set_keyboard(Box::new(kbd_device))?;
//! channel.set_mouse(Box::new(mouse_device))?;
//! channel.set_timer(Box::new(worker_timer))?;
//! channel.on_connect();
//!
//! // Transport loop:
//! let status = channel.handle_message(decoded_message);
//! for outbound in channel.drain() {
//!     transport.send(outbound);
//! }
//! ```
//!
//! # Concurrency
//!
//! The channel is a per-session singleton, owned and serialized by the
//! worker thread. Sinks are passed by handle at attach time and only ever
//! called from [`InputsChannel::handle_message`], the timer callback, and
//! error teardown.

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod channel;
pub mod error;
pub mod sink;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Channel (primary entry point)
pub use channel::{
    ChannelStatus, InputMessage, InputsChannel, InputsMessage, MouseButton, MouseMode,
    AGENT_DBUTTON_MASK, AGENT_LBUTTON_MASK, AGENT_MBUTTON_MASK, AGENT_RBUTTON_MASK,
    AGENT_UBUTTON_MASK, BUTTON_MASK_LEFT, BUTTON_MASK_MIDDLE, BUTTON_MASK_RIGHT,
    CAPS_LOCK_SCAN_CODE, MOTION_ACK_BUNCH, NUM_LOCK_SCAN_CODE, SCROLL_LOCK_SCAN_CODE,
};

// Sinks
pub use sink::{
    AgentMouseSink, AgentMouseState, KeyboardSink, ModifierTimer, MouseSink, TabletSink,
    KEY_MODIFIERS_TTL, MODIFIER_CAPS_LOCK, MODIFIER_NUM_LOCK, MODIFIER_SCROLL_LOCK,
};

// Errors
pub use error::{InputsError, Result};

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
        let channel = InputsChannel::new();
        assert_eq!(channel.mouse_mode(), MouseMode::Server);
        assert!(!channel.has_tablet());
        assert!(!channel.is_closed());
    }
}
