//! Cursor Channel
//!
//! Fans cursor commands out to every connected client. The channel keeps
//! exactly one "current cursor" (used to seed newly connecting clients),
//! the latest visibility/position/trail state, and a pipe of pending items
//! per client. Draining a client's pipe marshals the items into outbound
//! messages, consulting that client's cursor cache so repeated shapes go
//! out as cache references instead of pixel payloads.
//!
//! # Usage
//!
//! ```rust
//! use vireo_cursor::{CursorChannel, CursorCommand, CursorMessage, Point};
//!
//! let mut channel = CursorChannel::new();
//! let client = channel.connect_client();
//!
//! channel.process_command(CursorCommand::Move { position: Point::new(10, 20) }, 0);
//!
//! let messages = channel.drain_client(client).unwrap();
//! assert!(matches!(messages[0], CursorMessage::Init { .. }));
//! assert!(matches!(messages[1], CursorMessage::Move { .. }));
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::CursorCache;
use crate::error::{CursorError, Result};
use crate::item::{CursorCommand, CursorHeader, CursorItem, CursorShape, Point};

/// Verb code for the cursor reset message
pub const VERB_CURSOR_RESET: u8 = 1;

/// How the client mouse is driven, mirrored from the input channel
///
/// In server mode the pointer is server-owned, so every cursor move must be
/// streamed; in client mode the client draws its own pointer and move
/// updates are suppressed unless they re-show a hidden cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseMode {
    /// Pointer position is owned by the server
    #[default]
    Server,
    /// Pointer position is owned by the client
    Client,
}

/// Handle identifying one connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub(crate) u64);

/// Per-client delivery state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Connected, nothing streamed yet beyond the init seed
    Connected,
    /// At least one cursor command has been queued
    Streaming,
}

/// An entry in a client's outbound pipe
///
/// Cursor items are shared: the pipe holds a clone of the [`Arc`] handle,
/// so the item stays alive until every pipe that references it drained.
#[derive(Debug, Clone)]
pub enum PipeItem {
    /// Deliver a cursor command
    Cursor(Arc<CursorItem>),
    /// Invalidate one cached shape
    InvalOne(u64),
    /// Invalidate the whole cursor cache
    InvalAll,
    /// Seed a fresh client with the current cursor state
    Init,
    /// A bodyless protocol verb
    Verb(u8),
    /// Channel migration marker
    Migrate,
}

/// Cache disposition of a transmitted cursor shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorFlags {
    /// Shape transmitted inline without caching
    #[default]
    None,
    /// Shape transmitted inline; the client should cache it
    CacheMe,
    /// Shape already cached by the client; no payload follows
    FromCache,
}

/// Cursor description as it goes out on the wire
#[derive(Debug, Clone, Default)]
pub struct WireCursor {
    /// Cache disposition
    pub flags: CursorFlags,
    /// Shape header; `None` when there is no current shape
    pub header: Option<CursorHeader>,
    /// Sprite pixels; `None` on cache hits and shapeless cursors
    pub payload: Option<Bytes>,
}

/// An outbound cursor channel message
///
/// Byte layouts are the wire marshaller's concern; these carry the fields
/// it needs.
#[derive(Debug, Clone)]
pub enum CursorMessage {
    /// Full cursor state for a newly connected client
    Init {
        /// Current position
        position: Point,
        /// Current visibility
        visible: bool,
        /// Trail length
        trail_length: u16,
        /// Trail frequency
        trail_frequency: u16,
        /// Current shape, cache-aware
        cursor: WireCursor,
    },
    /// New cursor shape
    Set {
        /// Position at the time of the change
        position: Point,
        /// Visibility after the change
        visible: bool,
        /// The shape, cache-aware
        cursor: WireCursor,
    },
    /// Cursor moved
    Move {
        /// New position
        position: Point,
    },
    /// Cursor hidden
    Hide,
    /// Trail configuration changed
    Trail {
        /// Trail length
        length: u16,
        /// Trail frequency
        frequency: u16,
    },
    /// Drop one cached shape
    InvalOne {
        /// The shape's `unique` id
        id: u64,
    },
    /// Drop every cached shape
    InvalAll,
    /// Reset client cursor state
    Reset,
    /// Channel migration marker
    Migrate,
}

#[derive(Debug)]
struct CursorClient {
    id: ClientId,
    state: ClientState,
    cache: CursorCache,
    pipe: VecDeque<PipeItem>,
}

/// The server side of the cursor channel
///
/// Owned by the worker loop; commands flow in from the display source and
/// marshalled messages flow out per client.
#[derive(Debug, Default)]
pub struct CursorChannel {
    item: Option<Arc<CursorItem>>,
    visible: bool,
    position: Point,
    trail_length: u16,
    trail_frequency: u16,
    mouse_mode: MouseMode,
    clients: Vec<CursorClient>,
    next_client_id: u64,
}

impl CursorChannel {
    /// Create a channel with no clients and a visible, shapeless cursor
    #[must_use]
    pub fn new() -> Self {
        Self {
            visible: true,
            ..Self::default()
        }
    }

    /// Current mouse mode
    #[must_use]
    pub fn mouse_mode(&self) -> MouseMode {
        self.mouse_mode
    }

    /// Switch the mouse mode (driven by the input channel)
    pub fn set_mouse_mode(&mut self, mode: MouseMode) {
        self.mouse_mode = mode;
    }

    /// Whether the cursor is currently visible
    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Current cursor position
    #[must_use]
    pub fn position(&self) -> Point {
        self.position
    }

    /// The current cursor item, if a shape was ever set
    #[must_use]
    pub fn current_item(&self) -> Option<&Arc<CursorItem>> {
        self.item.as_ref()
    }

    /// Whether any client is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.clients.is_empty()
    }

    /// Connect a client and queue its init seed
    pub fn connect_client(&mut self) -> ClientId {
        let id = ClientId(self.next_client_id);
        self.next_client_id += 1;

        let mut pipe = VecDeque::new();
        pipe.push_back(PipeItem::Init);
        self.clients.push(CursorClient {
            id,
            state: ClientState::Connected,
            cache: CursorCache::new(),
            pipe,
        });
        debug!(?id, "cursor client connected");
        id
    }

    /// Delivery state of a client
    pub fn client_state(&self, id: ClientId) -> Result<ClientState> {
        Ok(self.client(id)?.state)
    }

    /// Number of shapes a client has cached
    pub fn client_cache_len(&self, id: ClientId) -> Result<usize> {
        Ok(self.client(id)?.cache.len())
    }

    /// Number of items queued for a client
    pub fn client_pipe_len(&self, id: ClientId) -> Result<usize> {
        Ok(self.client(id)?.pipe.len())
    }

    /// Disconnect one client, cancelling its queued pipe items
    pub fn disconnect_client(&mut self, id: ClientId) -> Result<()> {
        let index = self
            .clients
            .iter()
            .position(|c| c.id == id)
            .ok_or(CursorError::UnknownClient(id))?;
        self.clients.remove(index);
        debug!(?id, "cursor client disconnected");
        Ok(())
    }

    /// Disconnect every client and release the current cursor
    ///
    /// Queued pipe items are cancelled; the shared cursor items they held
    /// are released with them.
    pub fn disconnect_all(&mut self) {
        self.clients.clear();
        self.item = None;
    }

    /// Apply a cursor command and fan it out to the connected clients
    ///
    /// Move commands are suppressed in client mouse mode unless they
    /// re-show a hidden cursor.
    pub fn process_command(&mut self, command: CursorCommand, group_id: u32) {
        let item = CursorItem::new(command, group_id);

        let mut cursor_show = false;
        match &item.command {
            CursorCommand::Set { visible, .. } => {
                self.visible = *visible;
                self.item = Some(item.clone());
            }
            CursorCommand::Move { position } => {
                cursor_show = !self.visible;
                self.visible = true;
                self.position = *position;
            }
            CursorCommand::Hide => {
                self.visible = false;
            }
            CursorCommand::Trail { length, frequency } => {
                self.trail_length = *length;
                self.trail_frequency = *frequency;
            }
        }

        let is_move = matches!(item.command, CursorCommand::Move { .. });
        if self.is_connected()
            && (self.mouse_mode == MouseMode::Server || !is_move || cursor_show)
        {
            for client in &mut self.clients {
                client.state = ClientState::Streaming;
                client.pipe.push_back(PipeItem::Cursor(item.clone()));
            }
        }
    }

    /// Queue an invalidation of one cached shape to every client
    pub fn invalidate_one(&mut self, unique: u64) {
        for client in &mut self.clients {
            client.pipe.push_back(PipeItem::InvalOne(unique));
        }
    }

    /// Restore the channel to its initial cursor state
    ///
    /// Clients are told to drop their caches and reset their local cursor.
    pub fn reset(&mut self) {
        self.item = None;
        self.visible = true;
        self.position = Point::default();
        self.trail_length = 0;
        self.trail_frequency = 0;

        for client in &mut self.clients {
            client.pipe.push_back(PipeItem::InvalAll);
            client.pipe.push_back(PipeItem::Verb(VERB_CURSOR_RESET));
        }
    }

    /// Marshal and drain every queued item for one client
    pub fn drain_client(&mut self, id: ClientId) -> Result<Vec<CursorMessage>> {
        // Snapshot of channel state consulted while marshalling.
        let visible = self.visible;
        let position = self.position;
        let trail_length = self.trail_length;
        let trail_frequency = self.trail_frequency;
        let current = self.item.clone();

        let client = self
            .clients
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CursorError::UnknownClient(id))?;

        let mut messages = Vec::with_capacity(client.pipe.len());
        while let Some(pipe_item) = client.pipe.pop_front() {
            match pipe_item {
                PipeItem::Cursor(item) => match &item.command {
                    CursorCommand::Set { shape, position, visible: _ } => {
                        messages.push(CursorMessage::Set {
                            position: *position,
                            visible,
                            cursor: fill_cursor(&mut client.cache, Some(shape)),
                        });
                    }
                    CursorCommand::Move { position } => {
                        messages.push(CursorMessage::Move { position: *position });
                    }
                    CursorCommand::Hide => messages.push(CursorMessage::Hide),
                    CursorCommand::Trail { length, frequency } => {
                        messages.push(CursorMessage::Trail {
                            length: *length,
                            frequency: *frequency,
                        });
                    }
                },
                PipeItem::Init => {
                    client.cache.reset();
                    let shape = current.as_ref().and_then(|item| match &item.command {
                        CursorCommand::Set { shape, .. } => Some(shape),
                        _ => None,
                    });
                    messages.push(CursorMessage::Init {
                        position,
                        visible,
                        trail_length,
                        trail_frequency,
                        cursor: fill_cursor(&mut client.cache, shape),
                    });
                }
                PipeItem::InvalOne(unique) => {
                    messages.push(CursorMessage::InvalOne { id: unique });
                }
                PipeItem::InvalAll => {
                    client.cache.reset();
                    messages.push(CursorMessage::InvalAll);
                }
                PipeItem::Verb(VERB_CURSOR_RESET) => messages.push(CursorMessage::Reset),
                PipeItem::Verb(code) => {
                    warn!(code, "unknown cursor verb, skipped");
                }
                PipeItem::Migrate => messages.push(CursorMessage::Migrate),
            }
        }
        Ok(messages)
    }

    fn client(&self, id: ClientId) -> Result<&CursorClient> {
        self.clients
            .iter()
            .find(|c| c.id == id)
            .ok_or(CursorError::UnknownClient(id))
    }
}

/// Fill the wire cursor for a shape, consulting the client's cache
///
/// Cache hits send only the header (`FROM_CACHE`); first sightings of a
/// cacheable shape send the payload with `CACHE_ME`; `unique == 0` shapes
/// always send the payload uncached.
fn fill_cursor(cache: &mut CursorCache, shape: Option<&CursorShape>) -> WireCursor {
    let Some(shape) = shape else {
        return WireCursor::default();
    };

    let mut flags = CursorFlags::None;
    if shape.header.unique != 0 {
        if cache.hit(shape.header.unique) {
            return WireCursor {
                flags: CursorFlags::FromCache,
                header: Some(shape.header),
                payload: None,
            };
        }
        if cache.insert(shape.header.unique) {
            flags = CursorFlags::CacheMe;
        }
    }

    let payload = (!shape.data.is_empty()).then(|| shape.data.clone());
    WireCursor {
        flags,
        header: Some(shape.header),
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(unique: u64) -> CursorShape {
        CursorShape {
            header: CursorHeader {
                unique,
                width: 32,
                height: 32,
                hot_spot_x: 0,
                hot_spot_y: 0,
            },
            data: Bytes::from_static(&[0xff; 16]),
        }
    }

    fn set_command(unique: u64) -> CursorCommand {
        CursorCommand::Set {
            shape: shape(unique),
            position: Point::new(5, 5),
            visible: true,
        }
    }

    #[test]
    fn test_init_seeds_new_client() {
        let mut channel = CursorChannel::new();
        channel.process_command(set_command(0xaa), 0);

        let client = channel.connect_client();
        let messages = channel.drain_client(client).unwrap();

        assert_eq!(messages.len(), 1);
        let CursorMessage::Init { cursor, visible, .. } = &messages[0] else {
            panic!("expected init message");
        };
        assert!(*visible);
        // The init shape seeds the cache.
        assert_eq!(cursor.flags, CursorFlags::CacheMe);
        assert!(cursor.payload.is_some());
        assert_eq!(channel.client_cache_len(client).unwrap(), 1);
    }

    #[test]
    fn test_cache_hit_miss_sequence() {
        let mut channel = CursorChannel::new();
        let client = channel.connect_client();
        channel.drain_client(client).unwrap(); // consume init

        // First sighting: payload + CACHE_ME.
        channel.process_command(set_command(0xaa), 0);
        let messages = channel.drain_client(client).unwrap();
        let CursorMessage::Set { cursor, .. } = &messages[0] else {
            panic!("expected set message");
        };
        assert_eq!(cursor.flags, CursorFlags::CacheMe);
        assert!(cursor.payload.is_some());

        // Same unique again: no payload, FROM_CACHE.
        channel.process_command(set_command(0xaa), 0);
        let messages = channel.drain_client(client).unwrap();
        let CursorMessage::Set { cursor, .. } = &messages[0] else {
            panic!("expected set message");
        };
        assert_eq!(cursor.flags, CursorFlags::FromCache);
        assert!(cursor.payload.is_none());
        assert_eq!(channel.client_cache_len(client).unwrap(), 1);

        // unique == 0: payload, no cache change.
        channel.process_command(set_command(0), 0);
        let messages = channel.drain_client(client).unwrap();
        let CursorMessage::Set { cursor, .. } = &messages[0] else {
            panic!("expected set message");
        };
        assert_eq!(cursor.flags, CursorFlags::None);
        assert!(cursor.payload.is_some());
        assert_eq!(channel.client_cache_len(client).unwrap(), 1);
    }

    #[test]
    fn test_move_suppressed_in_client_mode() {
        let mut channel = CursorChannel::new();
        channel.set_mouse_mode(MouseMode::Client);
        let client = channel.connect_client();
        channel.drain_client(client).unwrap();

        // Visible cursor: client draws its own pointer, no move streamed.
        channel.process_command(CursorCommand::Move { position: Point::new(1, 1) }, 0);
        assert!(channel.drain_client(client).unwrap().is_empty());

        // Hidden cursor: the move re-shows it and must be streamed.
        channel.process_command(CursorCommand::Hide, 0);
        channel.process_command(CursorCommand::Move { position: Point::new(2, 2) }, 0);
        let messages = channel.drain_client(client).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], CursorMessage::Hide));
        assert!(matches!(messages[1], CursorMessage::Move { .. }));
        assert!(channel.visible());
    }

    #[test]
    fn test_moves_streamed_in_server_mode() {
        let mut channel = CursorChannel::new();
        let client = channel.connect_client();
        channel.drain_client(client).unwrap();

        channel.process_command(CursorCommand::Move { position: Point::new(7, 9) }, 0);
        let messages = channel.drain_client(client).unwrap();
        assert!(
            matches!(messages[0], CursorMessage::Move { position } if position == Point::new(7, 9))
        );
    }

    #[test]
    fn test_state_machine() {
        let mut channel = CursorChannel::new();
        let client = channel.connect_client();
        assert_eq!(channel.client_state(client).unwrap(), ClientState::Connected);

        channel.process_command(set_command(1), 0);
        assert_eq!(channel.client_state(client).unwrap(), ClientState::Streaming);
    }

    #[test]
    fn test_reset_invalidates_caches() {
        let mut channel = CursorChannel::new();
        let client = channel.connect_client();
        channel.process_command(set_command(0xaa), 0);
        channel.drain_client(client).unwrap();
        assert_eq!(channel.client_cache_len(client).unwrap(), 1);

        channel.reset();
        assert!(channel.current_item().is_none());
        assert!(channel.visible());
        assert_eq!(channel.position(), Point::default());

        let messages = channel.drain_client(client).unwrap();
        assert!(matches!(messages[0], CursorMessage::InvalAll));
        assert!(matches!(messages[1], CursorMessage::Reset));
        assert_eq!(channel.client_cache_len(client).unwrap(), 0);
    }

    #[test]
    fn test_trail_broadcast() {
        let mut channel = CursorChannel::new();
        let a = channel.connect_client();
        let b = channel.connect_client();
        channel.drain_client(a).unwrap();
        channel.drain_client(b).unwrap();

        channel.process_command(CursorCommand::Trail { length: 4, frequency: 10 }, 0);
        for id in [a, b] {
            let messages = channel.drain_client(id).unwrap();
            assert!(
                matches!(messages[0], CursorMessage::Trail { length: 4, frequency: 10 })
            );
        }
    }

    #[test]
    fn test_disconnect_cancels_pipe() {
        let mut channel = CursorChannel::new();
        let client = channel.connect_client();
        channel.process_command(set_command(1), 0);

        channel.disconnect_client(client).unwrap();
        assert!(channel.drain_client(client).is_err());
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_disconnect_all_releases_cursor() {
        let mut channel = CursorChannel::new();
        channel.connect_client();
        channel.process_command(set_command(1), 0);
        assert!(channel.current_item().is_some());

        channel.disconnect_all();
        assert!(channel.current_item().is_none());
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_item_shared_across_pipes() {
        let mut channel = CursorChannel::new();
        let a = channel.connect_client();
        let b = channel.connect_client();
        channel.process_command(set_command(0xcc), 0);

        // One shared item: the current-cursor slot plus both pipes.
        let item = channel.current_item().unwrap();
        assert_eq!(Arc::strong_count(item), 3);

        channel.drain_client(a).unwrap();
        channel.drain_client(b).unwrap();
        let item = channel.current_item().unwrap();
        assert_eq!(Arc::strong_count(item), 1);
    }

    #[test]
    fn test_invalidate_one() {
        let mut channel = CursorChannel::new();
        let client = channel.connect_client();
        channel.drain_client(client).unwrap();

        channel.invalidate_one(0xaa);
        let messages = channel.drain_client(client).unwrap();
        assert!(matches!(messages[0], CursorMessage::InvalOne { id: 0xaa }));
    }
}
