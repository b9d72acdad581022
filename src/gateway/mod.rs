//! The window-server boundary.
//!
//! The core never talks to X11 directly. It pulls [`Notification`]s out of
//! a [`Gateway`] and pushes [`Command`]s back in; `x11` provides the real
//! connection and `mock` a recording stand-in for tests.

pub mod x11;

#[cfg(test)]
pub mod mock;

use anyhow::Result;
use x11rb::protocol::xproto::{ButtonIndex, Keycode, Keysym, ModMask, StackMode, Window};

/// Geometry and stacking fields of a configure request.
///
/// `None` means the client did not ask to change that field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowChanges {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub sibling: Option<Window>,
    pub stack_mode: Option<StackMode>,
}

impl WindowChanges {
    /// Keep every requested field except the position, which is forced to the origin
    pub fn pinned_to_origin(self) -> Self {
        Self {
            x: self.x.map(|_| 0),
            y: self.y.map(|_| 0),
            ..self
        }
    }
}

/// Something the window server told us
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ConfigureRequest { window: Window, changes: WindowChanges },
    MapRequest { window: Window },
    KeyPress { keycode: Keycode, state: u16 },
    DestroyNotify { window: Window },
    UnmapNotify { window: Window },
    /// Pointer motion while the move chord is held, in root coordinates
    MotionNotify { root_x: i16, root_y: i16 },
    /// Error reply to an earlier request (usually a window that has since vanished)
    ProtocolError(String),
    /// Anything the manager does not react to
    Other,
}

/// Something we ask the window server to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Configure { window: Window, changes: WindowChanges },
    /// Listen for structure and pointer-enter notifications on a client
    SelectInput(Window),
    Raise(Window),
    Focus(Window),
    Resize { window: Window, width: u32, height: u32 },
    Move { window: Window, x: i32, y: i32 },
    Map(Window),
    /// Politely ask the client to close (WM_DELETE_WINDOW)
    Close(Window),
    /// Forcibly disconnect the client owning the window
    Kill(Window),
}

/// Connection to the window server as seen by the core.
///
/// Every command is fire-and-forget: errors caused by a request come back
/// later as [`Notification::ProtocolError`], never from [`Gateway::send`].
pub trait Gateway {
    /// Block until the next notification; `None` once the connection is closed
    fn next_event(&mut self) -> Result<Option<Notification>>;

    fn send(&mut self, command: Command) -> Result<()>;

    /// Ask for exclusive delivery of a modifier+key chord
    fn grab_key_chord(&mut self, modifiers: ModMask, keysym: Keysym) -> Result<()>;

    /// Ask for exclusive delivery of pointer events while modifier+button is held
    fn grab_pointer_chord(&mut self, modifiers: ModMask, button: ButtonIndex) -> Result<()>;

    /// First-level key symbol for a keycode (0 if unmapped)
    fn keysym(&self, keycode: Keycode) -> Keysym;

    /// Width and height of the screen in pixels
    fn screen_size(&self) -> (u32, u32);

    fn flush(&mut self) -> Result<()>;

    /// Close the connection; subsequent `next_event` calls return `None`
    fn disconnect(&mut self);
}
