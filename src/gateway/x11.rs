//! X11 implementation of the gateway on top of x11rb.

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use super::{Command, Gateway, Notification, WindowChanges};

/// Glyph index of `left_ptr` in the core cursor font
const LEFT_PTR_GLYPH: u16 = 68;

/// ICCCM atoms used by the window manager
struct Atoms {
    wm_protocols: Atom,
    wm_delete_window: Atom,
}

impl Atoms {
    fn new(conn: &RustConnection) -> Result<Self> {
        Ok(Self {
            wm_protocols: Self::intern(conn, b"WM_PROTOCOLS")?,
            wm_delete_window: Self::intern(conn, b"WM_DELETE_WINDOW")?,
        })
    }

    fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom> {
        Ok(conn.intern_atom(false, name)?.reply()?.atom)
    }
}

/// Snapshot of the server's keycode -> keysym table
#[derive(Debug, Clone)]
pub struct KeyboardMap {
    min_keycode: Keycode,
    keysyms_per_keycode: usize,
    keysyms: Vec<Keysym>,
}

impl KeyboardMap {
    pub fn new(min_keycode: Keycode, keysyms_per_keycode: usize, keysyms: Vec<Keysym>) -> Self {
        Self {
            min_keycode,
            keysyms_per_keycode,
            keysyms,
        }
    }

    fn query(conn: &RustConnection) -> Result<Self> {
        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let max_keycode = setup.max_keycode;

        let mapping = conn
            .get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1)?
            .reply()?;

        Ok(Self::new(
            min_keycode,
            mapping.keysyms_per_keycode as usize,
            mapping.keysyms,
        ))
    }

    /// First-level keysym for a keycode, ignoring modifier state
    pub fn keysym(&self, keycode: Keycode) -> Keysym {
        if keycode < self.min_keycode {
            return 0;
        }
        let idx = (keycode - self.min_keycode) as usize * self.keysyms_per_keycode;
        self.keysyms.get(idx).copied().unwrap_or(0)
    }

    /// Lowest keycode producing `keysym` at any level
    pub fn keycode(&self, keysym: Keysym) -> Option<Keycode> {
        if self.keysyms_per_keycode == 0 || keysym == 0 {
            return None;
        }
        self.keysyms
            .chunks(self.keysyms_per_keycode)
            .position(|chunk| chunk.contains(&keysym))
            .and_then(|i| u8::try_from(i).ok())
            .map(|i| self.min_keycode + i)
    }
}

/// Live connection to the X server
pub struct X11Gateway {
    conn: Option<RustConnection>,
    root: Window,
    screen_size: (u32, u32),
    atoms: Atoms,
    keyboard: KeyboardMap,
}

impl X11Gateway {
    /// Connect to the display named by `$DISPLAY`
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) =
            RustConnection::connect(None).context("Failed to connect to X11 server")?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let screen_size = (
            screen.width_in_pixels as u32,
            screen.height_in_pixels as u32,
        );

        log::info!(
            "Connected to X11, screen {}, root window 0x{:x}, {}x{}",
            screen_num,
            root,
            screen_size.0,
            screen_size.1
        );

        let atoms = Atoms::new(&conn)?;
        let keyboard = KeyboardMap::query(&conn)?;

        Ok(Self {
            conn: Some(conn),
            root,
            screen_size,
            atoms,
            keyboard,
        })
    }

    fn conn(&self) -> Result<&RustConnection> {
        self.conn.as_ref().context("X11 connection already closed")
    }

    /// Become the window manager by requesting SubstructureRedirect on root
    pub fn become_wm(&self) -> Result<()> {
        let conn = self.conn()?;
        let event_mask = EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY;

        let result = conn.change_window_attributes(
            self.root,
            &ChangeWindowAttributesAux::new().event_mask(event_mask),
        );
        conn.flush()?;

        if let Err(e) = result?.check() {
            anyhow::bail!("Another window manager is already running! Error: {:?}", e);
        }

        log::info!("Successfully became the window manager");
        Ok(())
    }

    /// Give the root window the standard arrow cursor
    pub fn set_root_cursor(&self) -> Result<()> {
        let conn = self.conn()?;
        let font = conn.generate_id()?;
        conn.open_font(font, b"cursor")?;

        let cursor = conn.generate_id()?;
        conn.create_glyph_cursor(
            cursor,
            font,
            font,
            LEFT_PTR_GLYPH,
            LEFT_PTR_GLYPH + 1,
            0,
            0,
            0,
            0xffff,
            0xffff,
            0xffff,
        )?;
        conn.change_window_attributes(
            self.root,
            &ChangeWindowAttributesAux::new().cursor(cursor),
        )?;
        conn.close_font(font)?;
        conn.flush()?;
        Ok(())
    }

    /// Viewable, non-override-redirect children of the root
    pub fn existing_windows(&self) -> Result<Vec<Window>> {
        let conn = self.conn()?;
        let tree = conn.query_tree(self.root)?.reply()?;

        let mut windows = Vec::new();
        for &window in &tree.children {
            // The window may vanish between the tree query and this one
            let Ok(attrs) = conn.get_window_attributes(window)?.reply() else {
                continue;
            };
            if attrs.override_redirect || attrs.map_state != MapState::VIEWABLE {
                continue;
            }
            windows.push(window);
        }
        Ok(windows)
    }

    /// Send WM_DELETE_WINDOW via the WM_PROTOCOLS client message
    fn send_delete_window(&self, window: Window) -> Result<()> {
        let conn = self.conn()?;
        let data = ClientMessageData::from([
            self.atoms.wm_delete_window,
            x11rb::CURRENT_TIME,
            0u32,
            0u32,
            0u32,
        ]);
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window,
            type_: self.atoms.wm_protocols,
            data,
        };
        conn.send_event(false, window, EventMask::NO_EVENT, event)?;
        Ok(())
    }

    fn translate(event: Event) -> Notification {
        match event {
            Event::ConfigureRequest(e) => {
                let aux = ConfigureWindowAux::from_configure_request(&e);
                Notification::ConfigureRequest {
                    window: e.window,
                    changes: WindowChanges {
                        x: aux.x,
                        y: aux.y,
                        width: aux.width,
                        height: aux.height,
                        border_width: aux.border_width,
                        sibling: aux.sibling,
                        stack_mode: aux.stack_mode,
                    },
                }
            }
            Event::MapRequest(e) => Notification::MapRequest { window: e.window },
            Event::KeyPress(e) => Notification::KeyPress {
                keycode: e.detail,
                state: u16::from(e.state),
            },
            Event::DestroyNotify(e) => Notification::DestroyNotify { window: e.window },
            Event::UnmapNotify(e) => Notification::UnmapNotify { window: e.window },
            Event::MotionNotify(e) => Notification::MotionNotify {
                root_x: e.root_x,
                root_y: e.root_y,
            },
            Event::Error(e) => Notification::ProtocolError(format!(
                "{:?} on 0x{:x} (major opcode {})",
                e.error_kind, e.bad_value, e.major_opcode
            )),
            _ => Notification::Other,
        }
    }

    fn configure(&self, window: Window, aux: &ConfigureWindowAux) -> Result<()> {
        self.conn()?.configure_window(window, aux)?;
        Ok(())
    }
}

impl Gateway for X11Gateway {
    fn next_event(&mut self) -> Result<Option<Notification>> {
        let Some(conn) = self.conn.as_ref() else {
            return Ok(None);
        };
        conn.flush()?;
        let event = conn.wait_for_event()?;
        Ok(Some(Self::translate(event)))
    }

    fn send(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Configure { window, changes } => {
                let aux = ConfigureWindowAux::new()
                    .x(changes.x)
                    .y(changes.y)
                    .width(changes.width)
                    .height(changes.height)
                    .border_width(changes.border_width)
                    .sibling(changes.sibling)
                    .stack_mode(changes.stack_mode);
                self.configure(window, &aux)?;
            }
            Command::SelectInput(window) => {
                self.conn()?.change_window_attributes(
                    window,
                    &ChangeWindowAttributesAux::new()
                        .event_mask(EventMask::STRUCTURE_NOTIFY | EventMask::ENTER_WINDOW),
                )?;
            }
            Command::Raise(window) => {
                self.configure(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?;
            }
            Command::Focus(window) => {
                self.conn()?
                    .set_input_focus(InputFocus::PARENT, window, x11rb::CURRENT_TIME)?;
            }
            Command::Resize { window, width, height } => {
                self.configure(window, &ConfigureWindowAux::new().width(width).height(height))?;
            }
            Command::Move { window, x, y } => {
                self.configure(window, &ConfigureWindowAux::new().x(x).y(y))?;
            }
            Command::Map(window) => {
                self.conn()?.map_window(window)?;
            }
            Command::Close(window) => self.send_delete_window(window)?,
            Command::Kill(window) => {
                self.conn()?.kill_client(window)?;
            }
        }
        Ok(())
    }

    fn grab_key_chord(&mut self, modifiers: ModMask, keysym: Keysym) -> Result<()> {
        let Some(keycode) = self.keyboard.keycode(keysym) else {
            log::warn!("Could not find keycode for keysym 0x{:x}", keysym);
            return Ok(());
        };

        let conn = self.conn()?;
        // Grab with and without NumLock/CapsLock to handle those states
        for extra_mods in lock_variants() {
            conn.grab_key(
                false, // owner_events
                self.root,
                modifiers | extra_mods,
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )?;
        }

        log::info!(
            "Grabbed keysym 0x{:x} (keycode {}, mods 0x{:x})",
            keysym,
            keycode,
            u16::from(modifiers)
        );
        Ok(())
    }

    fn grab_pointer_chord(&mut self, modifiers: ModMask, button: ButtonIndex) -> Result<()> {
        let conn = self.conn()?;
        for extra_mods in lock_variants() {
            conn.grab_button(
                false,
                self.root,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE, // confine_to
                x11rb::NONE, // cursor
                button,
                modifiers | extra_mods,
            )?;
        }
        Ok(())
    }

    fn keysym(&self, keycode: Keycode) -> Keysym {
        self.keyboard.keysym(keycode)
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen_size
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.as_ref() {
            conn.flush()?;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.flush() {
                log::warn!("Failed to flush before disconnecting: {}", e);
            }
            log::info!("Closed X11 connection");
        }
    }
}

/// Lock modifiers that should not affect chord matching
fn lock_variants() -> [ModMask; 4] {
    let numlock = ModMask::M2; // NumLock is usually Mod2
    let capslock = ModMask::LOCK;
    [ModMask::from(0u16), capslock, numlock, capslock | numlock]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> KeyboardMap {
        // Two keysyms per keycode starting at keycode 8:
        // 8 -> (h, H), 9 -> (Return, none), 10 -> (l, L)
        KeyboardMap::new(8, 2, vec![0x68, 0x48, 0xff0d, 0, 0x6c, 0x4c])
    }

    #[test]
    fn test_keysym_uses_first_level() {
        let map = sample_map();
        assert_eq!(map.keysym(8), 0x68);
        assert_eq!(map.keysym(9), 0xff0d);
        assert_eq!(map.keysym(10), 0x6c);
    }

    #[test]
    fn test_keysym_out_of_range_is_nosymbol() {
        let map = sample_map();
        assert_eq!(map.keysym(7), 0);
        assert_eq!(map.keysym(200), 0);
    }

    #[test]
    fn test_keycode_matches_any_level() {
        let map = sample_map();
        assert_eq!(map.keycode(0x6c), Some(10));
        assert_eq!(map.keycode(0x48), Some(8));
        assert_eq!(map.keycode(0x71), None);
        assert_eq!(map.keycode(0), None);
    }

    #[test]
    fn test_lock_variants_cover_caps_and_num() {
        let variants = lock_variants();
        assert!(variants.contains(&ModMask::from(0u16)));
        assert!(variants.contains(&(ModMask::LOCK | ModMask::M2)));
    }
}
