//! Key bindings for rectwm.
//!
//! The binding table is compiled in, written in the same `"Mod4+Return"`
//! notation users know from other window managers, and parsed once at
//! startup. It is an ordered list rather than a map: several bindings may
//! share a key symbol, and a key press runs every one of them.

use x11rb::protocol::xproto::{ButtonIndex, Keysym, ModMask};

use crate::registry::Direction;

/// Modifier used by the default bindings
pub const PRIMARY_MODIFIER: ModMask = ModMask::M4;

/// Modifier+button chord that drags the focused window
pub const MOVE_CHORD: (ModMask, ButtonIndex) = (PRIMARY_MODIFIER, ButtonIndex::M1);

/// Something a key binding can do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start a program; `argv[0]` is the executable
    Launch(Vec<String>),
    FocusCycle(Direction),
    /// Ask the focused client to close itself
    CloseFocused,
    /// Disconnect the focused client from the server
    ForceKillFocused,
    Quit,
}

impl Action {
    pub fn launch(argv: &[&str]) -> Self {
        Action::Launch(argv.iter().map(|s| s.to_string()).collect())
    }
}

/// Parsed keybinding (ready for X11 grab)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedBinding {
    pub keysym: Keysym,
    pub modifiers: ModMask,
}

/// One entry of the binding table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub modifiers: ModMask,
    pub keysym: Keysym,
    pub action: Action,
}

/// Ordered, immutable table of key bindings
#[derive(Debug, Clone, Default)]
pub struct KeyBindingTable {
    bindings: Vec<KeyBinding>,
}

impl KeyBindingTable {
    /// Build a table from `("Mod4+q", action)` pairs, skipping entries that fail to parse
    pub fn from_notation<'a>(entries: impl IntoIterator<Item = (&'a str, Action)>) -> Self {
        let bindings = entries
            .into_iter()
            .filter_map(|(combo, action)| match parse_key_binding(combo) {
                Some(parsed) => Some(KeyBinding {
                    modifiers: parsed.modifiers,
                    keysym: parsed.keysym,
                    action,
                }),
                None => {
                    log::warn!("Failed to parse keybinding: {}", combo);
                    None
                }
            })
            .collect();
        Self { bindings }
    }

    /// The compiled-in bindings
    pub fn defaults() -> Self {
        Self::from_notation([
            ("Mod4+Return", Action::launch(&["alacritty"])),
            ("Mod4+b", Action::launch(&["firefox"])),
            ("Mod4+q", Action::Quit),
            ("Mod4+l", Action::FocusCycle(Direction::Forward)),
            ("Mod4+h", Action::FocusCycle(Direction::Backward)),
            ("Mod4+w", Action::CloseFocused),
            ("Mod4+Shift+c", Action::ForceKillFocused),
        ])
    }

    /// Actions of every binding on `keysym`, in table order.
    ///
    /// Modifiers only matter when the chords are grabbed; dispatch
    /// matches on the key symbol alone.
    pub fn resolve(&self, keysym: Keysym) -> impl Iterator<Item = &Action> + '_ {
        self.bindings
            .iter()
            .filter(move |b| b.keysym == keysym)
            .map(|b| &b.action)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Parse a key binding string like "Mod4+Shift+h" into keysym and modifiers
pub fn parse_key_binding(s: &str) -> Option<ParsedBinding> {
    let parts: Vec<&str> = s.split('+').collect();
    let (key_part, modifier_parts) = parts.split_last()?;

    let mut modifiers = ModMask::from(0u16);
    for part in modifier_parts {
        modifiers = modifiers
            | match part.to_lowercase().as_str() {
                "mod4" | "super" | "win" => ModMask::M4,
                "shift" => ModMask::SHIFT,
                "control" | "ctrl" => ModMask::CONTROL,
                "mod1" | "alt" => ModMask::M1,
                _ => {
                    log::warn!("Unknown modifier: {}", part);
                    return None;
                }
            };
    }

    let keysym = key_to_keysym(key_part)?;
    Some(ParsedBinding { keysym, modifiers })
}

/// Convert key name to X11 keysym
fn key_to_keysym(key: &str) -> Option<Keysym> {
    let lower = key.to_lowercase();

    // Latin-1 letters and digits map to their ASCII code
    if let [c] = lower.as_bytes() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            return Some(*c as Keysym);
        }
    }

    match lower.as_str() {
        "return" | "enter" => Some(0xff0d),
        "tab" => Some(0xff09),
        "escape" | "esc" => Some(0xff1b),
        "space" => Some(0x20),
        "backspace" => Some(0xff08),
        "delete" => Some(0xffff),
        "left" => Some(0xff51),
        "up" => Some(0xff52),
        "right" => Some(0xff53),
        "down" => Some(0xff54),
        "[" | "bracketleft" => Some(0x5b),
        "]" | "bracketright" => Some(0x5d),
        "/" | "slash" => Some(0x2f),
        _ => {
            log::warn!("Unknown key: {}", key);
            None
        }
    }
}
