//! Cursor Commands and Items
//!
//! Cursor updates arrive from the display source as commands: set a new
//! shape, move, hide, or configure motion trails. A command wrapped in a
//! [`CursorItem`] is shared between the channel's current-cursor slot and
//! every client pipe that still has to deliver it; [`std::sync::Arc`]
//! handles replace manual reference counting, so an item lives exactly as
//! long as something references it.

use std::sync::Arc;

use bytes::Bytes;

/// A position in display pixel coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    /// Horizontal position
    pub x: i32,
    /// Vertical position
    pub y: i32,
}

impl Point {
    /// Create a point
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Fixed-size description of a cursor shape
///
/// `unique` is an opaque nonzero identifier assigned by the cursor
/// producer; zero means the shape cannot be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorHeader {
    /// Cache identity; 0 = uncacheable
    pub unique: u64,
    /// Sprite width in pixels
    pub width: u16,
    /// Sprite height in pixels
    pub height: u16,
    /// Hot spot X offset within the sprite
    pub hot_spot_x: u16,
    /// Hot spot Y offset within the sprite
    pub hot_spot_y: u16,
}

/// A cursor shape: header plus variable-size pixel payload
#[derive(Debug, Clone)]
pub struct CursorShape {
    /// Shape description
    pub header: CursorHeader,
    /// Sprite pixel data, shared with the producer
    pub data: Bytes,
}

/// A cursor update from the display source
#[derive(Debug, Clone)]
pub enum CursorCommand {
    /// Replace the cursor shape
    Set {
        /// The new shape
        shape: CursorShape,
        /// Position at the time of the change
        position: Point,
        /// Whether the cursor is visible afterwards
        visible: bool,
    },
    /// Move the cursor
    Move {
        /// New position
        position: Point,
    },
    /// Hide the cursor
    Hide,
    /// Configure motion-trail rendering on the client
    Trail {
        /// Trail length in sprites
        length: u16,
        /// Trail update frequency
        frequency: u16,
    },
}

/// A refcounted cursor command shared across client pipes
#[derive(Debug)]
pub struct CursorItem {
    /// Resource group the producer allocated the command from
    pub group_id: u32,
    /// The command itself
    pub command: CursorCommand,
}

impl CursorItem {
    /// Wrap a command for sharing
    #[must_use]
    pub fn new(command: CursorCommand, group_id: u32) -> Arc<Self> {
        Arc::new(Self { group_id, command })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_sharing() {
        let item = CursorItem::new(CursorCommand::Hide, 1);
        let pipe_ref = item.clone();
        drop(item);
        // The pipe's reference keeps the command alive.
        assert!(matches!(pipe_ref.command, CursorCommand::Hide));
    }
}
