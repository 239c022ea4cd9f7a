//! Input Channel
//!
//! Decodes client input messages and routes them to the attached sinks:
//! keyboard scan codes, relative mouse motion in server mouse mode, and
//! absolute positions to the agent or tablet in client mouse mode. Every
//! [`MOTION_ACK_BUNCH`] motion events the channel queues an ack so the
//! client can pace its event flood.
//!
//! Modifier sync runs both ways: client `KeyModifiers` messages are diffed
//! against the local LED state and injected as make/break scan codes, and a
//! 2-second timer echoes the resulting LED state back to the client.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vireo_inputs::{ChannelStatus, InputMessage, InputsChannel};
//!
//! let mut channel = InputsChannel::new();
//! channel.set_keyboard(Box::new(kbd))?;
//! channel.set_mouse(Box::new(mouse))?;
//! channel.on_connect();
//!
//! match channel.handle_message(InputMessage::MouseMotion { dx: 3, dy: -1, buttons_state: 0 }) {
//!     ChannelStatus::Ok => {}
//!     ChannelStatus::Failed => { /* transport closes the channel */ }
//!     ChannelStatus::Blocked => { /* transport retries later */ }
//! }
//! for message in channel.drain() {
//!     transport.send(message);
//! }
//! ```

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::{InputsError, Result};
use crate::sink::{
    AgentMouseSink, AgentMouseState, KeyboardSink, ModifierTimer, MouseSink, TabletSink,
    KEY_MODIFIERS_TTL, MODIFIER_CAPS_LOCK, MODIFIER_NUM_LOCK, MODIFIER_SCROLL_LOCK,
};

/// Motion events between successive motion acks
pub const MOTION_ACK_BUNCH: u32 = 4;

/// Scroll Lock make code
pub const SCROLL_LOCK_SCAN_CODE: u8 = 0x46;
/// Num Lock make code
pub const NUM_LOCK_SCAN_CODE: u8 = 0x45;
/// Caps Lock make code
pub const CAPS_LOCK_SCAN_CODE: u8 = 0x3a;

/// Break-code bit added to a make code on key release
const RELEASE_BIT: u8 = 0x80;
/// Extended scan-code prefix
const EXTENDED_PREFIX: u8 = 0xe0;

/// Client button mask: left button
pub const BUTTON_MASK_LEFT: u32 = 1 << 0;
/// Client button mask: middle button
pub const BUTTON_MASK_MIDDLE: u32 = 1 << 1;
/// Client button mask: right button
pub const BUTTON_MASK_RIGHT: u32 = 1 << 2;

/// Agent button mask: left button
pub const AGENT_LBUTTON_MASK: u32 = 1 << 1;
/// Agent button mask: middle button
pub const AGENT_MBUTTON_MASK: u32 = 1 << 2;
/// Agent button mask: right button
pub const AGENT_RBUTTON_MASK: u32 = 1 << 3;
/// Agent button mask: wheel up
pub const AGENT_UBUTTON_MASK: u32 = 1 << 4;
/// Agent button mask: wheel down
pub const AGENT_DBUTTON_MASK: u32 = 1 << 5;

/// Pointer ownership, decided by the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseMode {
    /// Server-relative: motion deltas drive the server's pointer
    #[default]
    Server,
    /// Client-absolute: the client reports absolute positions
    Client,
}

/// A mouse button as named by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    /// Left button
    Left,
    /// Middle button
    Middle,
    /// Right button
    Right,
    /// Wheel rolled up
    WheelUp,
    /// Wheel rolled down
    WheelDown,
}

/// A decoded inbound input message
#[derive(Debug, Clone, Copy)]
pub enum InputMessage {
    /// Key pressed; `code` holds up to four little-endian scan bytes
    KeyDown {
        /// Packed scan-code bytes
        code: u32,
    },
    /// Key released; `code` holds up to four little-endian scan bytes
    KeyUp {
        /// Packed scan-code bytes
        code: u32,
    },
    /// Relative motion (server mouse mode)
    MouseMotion {
        /// Horizontal delta
        dx: i32,
        /// Vertical delta
        dy: i32,
        /// Client button mask held during the motion
        buttons_state: u32,
    },
    /// Absolute position (client mouse mode)
    MousePosition {
        /// Absolute X
        x: u32,
        /// Absolute Y
        y: u32,
        /// Client button mask held at the position
        buttons_state: u32,
        /// Display the coordinates are relative to
        display_id: u32,
    },
    /// Button pressed
    MousePress {
        /// The button
        button: MouseButton,
        /// Client button mask after the press
        buttons_state: u32,
    },
    /// Button released
    MouseRelease {
        /// The button
        button: MouseButton,
        /// Client button mask after the release
        buttons_state: u32,
    },
    /// Client-side modifier state changed
    KeyModifiers {
        /// Modifier flags (Scroll/Num/Caps)
        modifiers: u8,
    },
    /// Client announces disconnection
    Disconnecting,
}

/// An outbound input channel message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputsMessage {
    /// Initial modifier state for a fresh client
    Init {
        /// Current LED state
        keyboard_modifiers: u8,
    },
    /// LED state echo
    KeyModifiers {
        /// Current LED state
        modifiers: u8,
    },
    /// Ack for a bunch of motion events
    MouseMotionAck,
    /// Channel migration marker
    Migrate,
}

/// Handler status reported to the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Message handled
    Ok,
    /// Channel unusable; the transport should tear it down
    Failed,
    /// Channel cannot accept the message now; retry later
    Blocked,
}

/// The server side of the input channel
///
/// Singleton per session, owned by the worker loop. Sinks are attached by
/// handle; all routing happens synchronously in [`Self::handle_message`].
#[derive(Default)]
pub struct InputsChannel {
    keyboard: Option<Box<dyn KeyboardSink>>,
    mouse: Option<Box<dyn MouseSink>>,
    tablet: Option<Box<dyn TabletSink>>,
    agent: Option<Box<dyn AgentMouseSink>>,
    timer: Option<Box<dyn ModifierTimer>>,

    mouse_mode: MouseMode,
    /// Route client-mode positions through the agent when one is attached
    agent_mouse: bool,
    agent_attached: bool,

    mouse_state: AgentMouseState,
    motion_count: u32,
    pipe: VecDeque<InputsMessage>,
    closed: bool,
}

impl InputsChannel {
    /// Create a channel with no sinks attached
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent_mouse: true,
            ..Self::default()
        }
    }

    /// Attach the keyboard sink
    pub fn set_keyboard(&mut self, sink: Box<dyn KeyboardSink>) -> Result<()> {
        if self.keyboard.is_some() {
            return Err(InputsError::SinkAlreadySet("keyboard"));
        }
        self.keyboard = Some(sink);
        Ok(())
    }

    /// Attach the relative mouse sink
    pub fn set_mouse(&mut self, sink: Box<dyn MouseSink>) -> Result<()> {
        if self.mouse.is_some() {
            return Err(InputsError::SinkAlreadySet("mouse"));
        }
        self.mouse = Some(sink);
        Ok(())
    }

    /// Attach the tablet sink
    pub fn set_tablet(&mut self, sink: Box<dyn TabletSink>) -> Result<()> {
        if self.tablet.is_some() {
            return Err(InputsError::SinkAlreadySet("tablet"));
        }
        self.tablet = Some(sink);
        Ok(())
    }

    /// Whether a tablet sink is attached
    #[must_use]
    pub fn has_tablet(&self) -> bool {
        self.tablet.is_some()
    }

    /// Detach the tablet sink
    pub fn detach_tablet(&mut self) {
        debug!("tablet detached");
        self.tablet = None;
    }

    /// Resolution the tablet's absolute coordinates map onto
    pub fn set_tablet_logical_size(&mut self, width: i32, height: i32) {
        if let Some(tablet) = &mut self.tablet {
            tablet.set_logical_size(width, height);
        }
    }

    /// Attach the agent mouse sink
    pub fn set_agent(&mut self, sink: Box<dyn AgentMouseSink>) -> Result<()> {
        if self.agent.is_some() {
            return Err(InputsError::SinkAlreadySet("agent"));
        }
        self.agent = Some(sink);
        self.agent_attached = true;
        Ok(())
    }

    /// Attach the modifier echo timer
    pub fn set_timer(&mut self, timer: Box<dyn ModifierTimer>) -> Result<()> {
        if self.timer.is_some() {
            return Err(InputsError::SinkAlreadySet("timer"));
        }
        self.timer = Some(timer);
        Ok(())
    }

    /// Current mouse mode
    #[must_use]
    pub fn mouse_mode(&self) -> MouseMode {
        self.mouse_mode
    }

    /// Switch between server-relative and client-absolute routing
    pub fn set_mouse_mode(&mut self, mode: MouseMode) {
        self.mouse_mode = mode;
    }

    /// Whether client-mode positions go through the agent
    pub fn set_agent_mouse(&mut self, enabled: bool) {
        self.agent_mouse = enabled;
    }

    /// Mark the guest agent as attached or detached
    pub fn set_agent_attached(&mut self, attached: bool) {
        self.agent_attached = attached;
    }

    /// Last absolute mouse state forwarded to the agent
    #[must_use]
    pub fn mouse_state(&self) -> &AgentMouseState {
        &self.mouse_state
    }

    /// Whether the channel was closed by an incoming error
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// A client attached: queue the initial modifier state
    pub fn on_connect(&mut self) {
        let leds = self.keyboard.as_ref().map_or(0, |k| k.leds());
        self.pipe.push_back(InputsMessage::Init {
            keyboard_modifiers: leds,
        });
    }

    /// Queue the migration marker
    pub fn queue_migrate(&mut self) {
        self.pipe.push_back(InputsMessage::Migrate);
    }

    /// Number of queued outbound messages
    #[must_use]
    pub fn pipe_len(&self) -> usize {
        self.pipe.len()
    }

    /// Drain the outbound message pipe in enqueue order
    pub fn drain(&mut self) -> Vec<InputsMessage> {
        self.pipe.drain(..).collect()
    }

    /// Handle one decoded client message
    pub fn handle_message(&mut self, message: InputMessage) -> ChannelStatus {
        if self.closed {
            return ChannelStatus::Failed;
        }

        match message {
            InputMessage::KeyDown { code } => {
                if code == u32::from(CAPS_LOCK_SCAN_CODE)
                    || code == u32::from(NUM_LOCK_SCAN_CODE)
                    || code == u32::from(SCROLL_LOCK_SCAN_CODE)
                {
                    self.arm_modifiers_watch();
                }
                self.push_scan_bytes(code);
            }
            InputMessage::KeyUp { code } => self.push_scan_bytes(code),
            InputMessage::MouseMotion { dx, dy, buttons_state } => {
                self.bump_motion_count();
                if self.mouse_mode == MouseMode::Server {
                    if let Some(mouse) = &mut self.mouse {
                        mouse.motion(dx, dy, 0, buttons_to_local(buttons_state));
                    }
                }
            }
            InputMessage::MousePosition { x, y, buttons_state, display_id } => {
                self.bump_motion_count();
                if self.mouse_mode != MouseMode::Client {
                    return ChannelStatus::Ok;
                }
                if self.agent_mouse && self.agent_attached {
                    self.mouse_state = AgentMouseState {
                        x,
                        y,
                        buttons: buttons_to_agent(buttons_state),
                        display_id,
                    };
                    let state = self.mouse_state;
                    if let Some(agent) = &mut self.agent {
                        agent.mouse_event(&state);
                    }
                } else if let Some(tablet) = &mut self.tablet {
                    tablet.position(x, y, buttons_to_local(buttons_state));
                } else {
                    warn!("client-absolute position with neither agent nor tablet");
                }
            }
            InputMessage::MousePress { button, buttons_state } => {
                let dz = wheel_delta(button);
                if self.mouse_mode == MouseMode::Client {
                    if self.agent_mouse && self.agent_attached {
                        self.mouse_state.buttons = buttons_to_agent(buttons_state)
                            | if dz == -1 { AGENT_UBUTTON_MASK } else { 0 }
                            | if dz == 1 { AGENT_DBUTTON_MASK } else { 0 };
                        let state = self.mouse_state;
                        if let Some(agent) = &mut self.agent {
                            agent.mouse_event(&state);
                        }
                    } else if let Some(tablet) = &mut self.tablet {
                        tablet.wheel(dz, buttons_to_local(buttons_state));
                    }
                } else if let Some(mouse) = &mut self.mouse {
                    mouse.motion(0, 0, dz, buttons_to_local(buttons_state));
                }
            }
            InputMessage::MouseRelease { button: _, buttons_state } => {
                if self.mouse_mode == MouseMode::Client {
                    if self.agent_mouse && self.agent_attached {
                        self.mouse_state.buttons = buttons_to_agent(buttons_state);
                        let state = self.mouse_state;
                        if let Some(agent) = &mut self.agent {
                            agent.mouse_event(&state);
                        }
                    } else if let Some(tablet) = &mut self.tablet {
                        tablet.buttons(buttons_to_local(buttons_state));
                    }
                } else if let Some(mouse) = &mut self.mouse {
                    mouse.buttons(buttons_to_local(buttons_state));
                }
            }
            InputMessage::KeyModifiers { modifiers } => {
                let Some(keyboard) = &mut self.keyboard else {
                    return ChannelStatus::Ok;
                };
                let leds = keyboard.leds();
                for (flag, scan) in [
                    (MODIFIER_SCROLL_LOCK, SCROLL_LOCK_SCAN_CODE),
                    (MODIFIER_NUM_LOCK, NUM_LOCK_SCAN_CODE),
                    (MODIFIER_CAPS_LOCK, CAPS_LOCK_SCAN_CODE),
                ] {
                    if (modifiers & flag) != (leds & flag) {
                        keyboard.push_scan(scan);
                        keyboard.push_scan(scan | RELEASE_BIT);
                    }
                }
                self.arm_modifiers_watch();
            }
            InputMessage::Disconnecting => {}
        }
        ChannelStatus::Ok
    }

    /// The modifier echo timer expired: report the current LED state
    pub fn on_modifier_timer(&mut self) {
        let leds = self.keyboard.as_ref().map_or(0, |k| k.leds());
        self.send_keyboard_modifiers(leds);
    }

    /// The local LED state changed outside the channel
    pub fn on_keyboard_leds_change(&mut self, leds: u8) {
        self.send_keyboard_modifiers(leds);
    }

    /// Queue a modifier state echo to the client
    pub fn send_keyboard_modifiers(&mut self, modifiers: u8) {
        if self.closed {
            return;
        }
        self.pipe.push_back(InputsMessage::KeyModifiers { modifiers });
    }

    /// An incoming transport error: release held keys and close
    ///
    /// The release sequence covers both shifts, both controls and both
    /// alts, so the guest is not left with a stuck modifier.
    pub fn on_incoming_error(&mut self) {
        self.release_keys();
        self.closed = true;
        self.pipe.clear();
    }

    fn release_keys(&mut self) {
        let Some(keyboard) = &mut self.keyboard else {
            return;
        };
        keyboard.push_scan(0x2a | RELEASE_BIT); // LSHIFT
        keyboard.push_scan(0x36 | RELEASE_BIT); // RSHIFT
        keyboard.push_scan(EXTENDED_PREFIX);
        keyboard.push_scan(0x1d | RELEASE_BIT); // RCTRL
        keyboard.push_scan(0x1d | RELEASE_BIT); // LCTRL
        keyboard.push_scan(EXTENDED_PREFIX);
        keyboard.push_scan(0x38 | RELEASE_BIT); // RALT
        keyboard.push_scan(0x38 | RELEASE_BIT); // LALT
    }

    fn push_scan_bytes(&mut self, code: u32) {
        let Some(keyboard) = &mut self.keyboard else {
            return;
        };
        for byte in code.to_le_bytes() {
            if byte == 0 {
                break;
            }
            keyboard.push_scan(byte);
        }
    }

    fn bump_motion_count(&mut self) {
        self.motion_count += 1;
        if self.motion_count % MOTION_ACK_BUNCH == 0 {
            self.pipe.push_back(InputsMessage::MouseMotionAck);
        }
    }

    fn arm_modifiers_watch(&mut self) {
        if let Some(timer) = &mut self.timer {
            timer.arm(KEY_MODIFIERS_TTL);
        }
    }
}

impl std::fmt::Debug for InputsChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputsChannel")
            .field("mouse_mode", &self.mouse_mode)
            .field("motion_count", &self.motion_count)
            .field("pipe_len", &self.pipe.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Map the client button mask to the local mouse layout
fn buttons_to_local(state: u32) -> u32 {
    (state & BUTTON_MASK_LEFT)
        | ((state & BUTTON_MASK_MIDDLE) << 1)
        | ((state & BUTTON_MASK_RIGHT) >> 1)
}

/// Map the client button mask to the agent's layout
fn buttons_to_agent(state: u32) -> u32 {
    (if state & BUTTON_MASK_LEFT != 0 { AGENT_LBUTTON_MASK } else { 0 })
        | (if state & BUTTON_MASK_MIDDLE != 0 { AGENT_MBUTTON_MASK } else { 0 })
        | (if state & BUTTON_MASK_RIGHT != 0 { AGENT_RBUTTON_MASK } else { 0 })
}

/// Wheel delta encoded in the press message's button id
fn wheel_delta(button: MouseButton) -> i32 {
    match button {
        MouseButton::WheelUp => -1,
        MouseButton::WheelDown => 1,
        _ => 0,
    }
}
