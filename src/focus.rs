//! Focus controller.
//!
//! Mirrors the registry's focus pointer onto the server: the focused
//! client is raised and given input focus after every change to the ring.

use anyhow::Result;
use x11rb::protocol::xproto::Window;

use crate::gateway::{Command, Gateway};
use crate::registry::ClientRegistry;
use crate::state::StateTransition;

#[derive(Debug, Default)]
pub struct FocusController {
    /// Window most recently pushed to the server (None if the ring was empty)
    applied: Option<Window>,
}

impl FocusController {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn applied(&self) -> Option<Window> {
        self.applied
    }

    /// Raise and focus whatever the registry considers focused.
    ///
    /// Sends nothing when the registry is empty. Returns the transition if
    /// the focused window differs from the last one applied.
    pub fn apply<G: Gateway>(
        &mut self,
        registry: &ClientRegistry,
        gateway: &mut G,
    ) -> Result<Option<StateTransition>> {
        let target = registry.focused_window();

        if let Some(window) = target {
            gateway.send(Command::Raise(window))?;
            gateway.send(Command::Focus(window))?;
        }

        let transition = (target != self.applied).then_some(StateTransition::FocusChanged {
            from: self.applied,
            to: target,
        });
        self.applied = target;
        Ok(transition)
    }
}
