//! Input Sinks
//!
//! The channel routes decoded client input into sinks provided by the
//! embedding process: a keyboard for PS/2 scan codes, a relative mouse, an
//! absolute tablet, and the guest agent's absolute mouse path. Sinks are
//! passed by handle at attach time; the channel serializes all calls on the
//! worker thread.

use std::time::Duration;

/// How long lock-key presses keep the modifier echo armed
pub const KEY_MODIFIERS_TTL: Duration = Duration::from_secs(2);

/// Keyboard modifier flag: Scroll Lock LED
pub const MODIFIER_SCROLL_LOCK: u8 = 1 << 0;
/// Keyboard modifier flag: Num Lock LED
pub const MODIFIER_NUM_LOCK: u8 = 1 << 1;
/// Keyboard modifier flag: Caps Lock LED
pub const MODIFIER_CAPS_LOCK: u8 = 1 << 2;

/// Absolute mouse state forwarded to the guest agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentMouseState {
    /// Absolute X in display coordinates
    pub x: u32,
    /// Absolute Y in display coordinates
    pub y: u32,
    /// Agent button mask
    pub buttons: u32,
    /// Display the coordinates are relative to
    pub display_id: u32,
}

/// Sink for PS/2 scan codes
pub trait KeyboardSink {
    /// Inject one scan-code byte
    fn push_scan(&mut self, code: u8);

    /// Current LED state as modifier flags
    fn leds(&self) -> u8 {
        0
    }
}

/// Sink for server-relative mouse events
pub trait MouseSink {
    /// Relative motion with wheel delta and the pressed-button mask
    fn motion(&mut self, dx: i32, dy: i32, dz: i32, buttons: u32);

    /// Button mask changed
    fn buttons(&mut self, buttons: u32);
}

/// Sink for client-absolute pointer events when no agent is attached
pub trait TabletSink {
    /// Resolution the absolute coordinates map onto
    fn set_logical_size(&mut self, width: i32, height: i32);

    /// Absolute position with the pressed-button mask
    fn position(&mut self, x: u32, y: u32, buttons: u32);

    /// Wheel delta with the pressed-button mask
    fn wheel(&mut self, dz: i32, buttons: u32);

    /// Button mask changed
    fn buttons(&mut self, buttons: u32);
}

/// Sink for absolute mouse events routed through the guest agent
pub trait AgentMouseSink {
    /// Forward the full absolute mouse state
    fn mouse_event(&mut self, state: &AgentMouseState);
}

/// One-shot timer for the modifier-LED echo
///
/// Arming an already armed timer restarts it. On expiry the embedding loop
/// calls [`crate::InputsChannel::on_modifier_timer`].
pub trait ModifierTimer {
    /// Start (or restart) the timer
    fn arm(&mut self, ttl: Duration);
}
