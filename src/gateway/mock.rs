//! Recording gateway for unit testing.
//!
//! Serves a scripted queue of notifications and records every command,
//! grab and disconnect so tests can assert on the exact sequence.

use std::collections::{HashMap, VecDeque};

use anyhow::Result;
use x11rb::protocol::xproto::{ButtonIndex, Keycode, Keysym, ModMask};

use super::{Command, Gateway, Notification};

pub struct RecordingGateway {
    pub events: VecDeque<Notification>,
    pub commands: Vec<Command>,
    pub key_grabs: Vec<(ModMask, Keysym)>,
    pub pointer_grabs: Vec<(ModMask, ButtonIndex)>,
    pub keymap: HashMap<Keycode, Keysym>,
    pub screen: (u32, u32),
    pub flushes: usize,
    pub disconnected: bool,
}

impl RecordingGateway {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            events: VecDeque::new(),
            commands: Vec::new(),
            key_grabs: Vec::new(),
            pointer_grabs: Vec::new(),
            keymap: HashMap::new(),
            screen: (width, height),
            flushes: 0,
            disconnected: false,
        }
    }

    /// Map a keycode to a first-level keysym
    pub fn with_key(mut self, keycode: Keycode, keysym: Keysym) -> Self {
        self.keymap.insert(keycode, keysym);
        self
    }

    pub fn push_event(&mut self, event: Notification) {
        self.events.push_back(event);
    }

    /// Return and forget everything recorded so far
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }
}

impl Gateway for RecordingGateway {
    fn next_event(&mut self) -> Result<Option<Notification>> {
        if self.disconnected {
            return Ok(None);
        }
        Ok(self.events.pop_front())
    }

    fn send(&mut self, command: Command) -> Result<()> {
        self.commands.push(command);
        Ok(())
    }

    fn grab_key_chord(&mut self, modifiers: ModMask, keysym: Keysym) -> Result<()> {
        self.key_grabs.push((modifiers, keysym));
        Ok(())
    }

    fn grab_pointer_chord(&mut self, modifiers: ModMask, button: ButtonIndex) -> Result<()> {
        self.pointer_grabs.push((modifiers, button));
        Ok(())
    }

    fn keysym(&self, keycode: Keycode) -> Keysym {
        self.keymap.get(&keycode).copied().unwrap_or(0)
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnected = true;
    }
}
