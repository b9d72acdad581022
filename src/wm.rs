//! Event dispatch for rectwm.
//!
//! [`Wm`] owns the gateway, the launcher, the binding table and the
//! [`WindowManagerState`]. Each loop iteration blocks for one notification
//! and handles it to completion before asking for the next.

use anyhow::Result;
use x11rb::protocol::xproto::Window;

use crate::bindings::{Action, KeyBindingTable, MOVE_CHORD};
use crate::focus::FocusController;
use crate::gateway::{Command, Gateway, Notification};
use crate::registry::ClientRegistry;
use crate::spawn::Launcher;
use crate::state::{StateTransition, UnmanageReason};
use crate::tracing::EventTracer;

/// Everything the handlers mutate
#[derive(Debug)]
pub struct WindowManagerState {
    pub registry: ClientRegistry,
    pub focus: FocusController,
    /// Last pointer position seen during a move drag (root coordinates)
    pub pointer: (i16, i16),
    /// Cleared by the quit action
    pub running: bool,
}

impl Default for WindowManagerState {
    fn default() -> Self {
        Self {
            registry: ClientRegistry::new(),
            focus: FocusController::new(),
            pointer: (0, 0),
            running: true,
        }
    }
}

/// The window manager: single-threaded event dispatcher
pub struct Wm<G: Gateway, L: Launcher> {
    gateway: G,
    launcher: L,
    bindings: KeyBindingTable,
    state: WindowManagerState,
    tracer: EventTracer,
}

impl<G: Gateway, L: Launcher> Wm<G, L> {
    pub fn new(gateway: G, launcher: L, bindings: KeyBindingTable) -> Self {
        Self {
            gateway,
            launcher,
            bindings,
            state: WindowManagerState::default(),
            tracer: EventTracer::new(),
        }
    }

    pub fn tracer(&self) -> &EventTracer {
        &self.tracer
    }

    /// Register every key chord in the binding table and the move chord
    pub fn grab_chords(&mut self) -> Result<()> {
        if self.bindings.is_empty() {
            log::warn!("No key bindings configured");
        }
        for binding in self.bindings.iter() {
            self.gateway.grab_key_chord(binding.modifiers, binding.keysym)?;
        }
        log::info!("Registered {} key bindings", self.bindings.len());

        let (modifiers, button) = MOVE_CHORD;
        self.gateway.grab_pointer_chord(modifiers, button)?;

        self.gateway.flush()?;
        Ok(())
    }

    /// Manage windows that were already mapped before we started
    pub fn adopt(&mut self, windows: &[Window]) -> Result<()> {
        for &window in windows {
            log::info!("Found existing window 0x{:x}", window);
            self.manage_window(window)?;
        }
        self.gateway.flush()?;
        Ok(())
    }

    /// Main event loop; returns once quit closes the connection
    pub fn run(&mut self) -> Result<()> {
        log::info!("Entering event loop");

        while self.state.running {
            let Some(event) = self.gateway.next_event()? else {
                break;
            };

            if let Err(e) = self.handle_event(event) {
                log::error!("Error handling event: {}", e);
            }

            if cfg!(debug_assertions) {
                for violation in self.state.registry.validate() {
                    log::error!("State violation {:?}: {}", violation.kind, violation.description);
                }
            }

            if self.state.running {
                self.gateway.flush()?;
            }
        }

        log::info!("Exiting window manager");
        Ok(())
    }

    /// Handle one notification
    pub fn handle_event(&mut self, event: Notification) -> Result<()> {
        match event {
            Notification::ConfigureRequest { window, changes } => {
                self.tracer.trace_x11_event("ConfigureRequest", Some(window), "");
                log::debug!("ConfigureRequest for window 0x{:x}", window);
                self.gateway.send(Command::Configure {
                    window,
                    changes: changes.pinned_to_origin(),
                })?;
            }

            Notification::MapRequest { window } => {
                self.tracer.trace_x11_event("MapRequest", Some(window), "");
                log::debug!("MapRequest for window 0x{:x}", window);
                self.manage_window(window)?;
            }

            Notification::KeyPress { keycode, state } => {
                self.tracer
                    .trace_x11_event("KeyPress", None, &format!("keycode={}", keycode));
                self.handle_key_press(keycode, state)?;
            }

            Notification::DestroyNotify { window } => {
                self.tracer.trace_x11_event("DestroyNotify", Some(window), "");
                log::debug!("DestroyNotify for window 0x{:x}", window);
                self.unmanage_window(window, UnmanageReason::Destroyed)?;
            }

            Notification::UnmapNotify { window } => {
                self.tracer.trace_x11_event("UnmapNotify", Some(window), "");
                log::debug!("UnmapNotify for window 0x{:x}", window);
                self.unmanage_window(window, UnmanageReason::Unmapped)?;
            }

            Notification::MotionNotify { root_x, root_y } => {
                self.state.pointer = (root_x, root_y);
                if let Some(window) = self.state.registry.focused_window() {
                    self.gateway.send(Command::Move {
                        window,
                        x: root_x as i32,
                        y: root_y as i32,
                    })?;
                }
            }

            Notification::ProtocolError(message) => {
                // Usually a request against a window that has already gone away
                self.tracer.trace_x11_event("Error", None, &message);
                log::debug!("Ignoring X11 error: {}", message);
            }

            Notification::Other => {}
        }

        Ok(())
    }

    fn handle_key_press(&mut self, keycode: u8, state: u16) -> Result<()> {
        let keysym = self.gateway.keysym(keycode);
        let actions: Vec<Action> = self.bindings.resolve(keysym).cloned().collect();

        log::debug!(
            "KeyPress: keycode={}, keysym=0x{:x}, state=0x{:x}, {} action(s)",
            keycode,
            keysym,
            state,
            actions.len()
        );

        for action in actions {
            self.execute_action(action)?;
        }
        Ok(())
    }

    /// Execute a bound action
    pub fn execute_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Launch(argv) => self.launcher.spawn(&argv),
            Action::FocusCycle(direction) => {
                if self.state.registry.cycle(direction).is_some() {
                    self.apply_focus()?;
                }
            }
            Action::CloseFocused => {
                if let Some(window) = self.state.registry.focused_window() {
                    log::info!("Closing window 0x{:x}", window);
                    self.gateway.send(Command::Close(window))?;
                }
            }
            Action::ForceKillFocused => {
                if let Some(window) = self.state.registry.focused_window() {
                    log::info!("Killing client of window 0x{:x}", window);
                    self.gateway.send(Command::Kill(window))?;
                }
            }
            Action::Quit => {
                log::info!("Quitting window manager");
                self.gateway.disconnect();
                self.state.running = false;
            }
        }
        Ok(())
    }

    /// Start managing a window: full-screen, mapped, focused
    fn manage_window(&mut self, window: Window) -> Result<()> {
        self.gateway.send(Command::SelectInput(window))?;

        if self.state.registry.contains(window) {
            log::debug!("Window 0x{:x} is already managed", window);
        } else {
            self.state.registry.insert(window);
            log::info!(
                "Managing window 0x{:x} ({} clients)",
                window,
                self.state.registry.len()
            );
            self.tracer.trace_transition(&StateTransition::ClientManaged { window });
        }

        let (width, height) = self.gateway.screen_size();
        self.gateway.send(Command::Resize { window, width, height })?;
        self.gateway.send(Command::Map(window))?;
        self.apply_focus()
    }

    /// Stop managing a window; untracked windows are ignored
    fn unmanage_window(&mut self, window: Window, reason: UnmanageReason) -> Result<()> {
        if !self.state.registry.remove(window) {
            return Ok(());
        }

        log::info!("Unmanaging window 0x{:x}", window);
        if self.state.registry.is_empty() {
            log::debug!("No clients left");
        }
        self.tracer.trace_transition(&StateTransition::ClientUnmanaged { window, reason });
        self.apply_focus()
    }

    fn apply_focus(&mut self) -> Result<()> {
        let transition = self
            .state
            .focus
            .apply(&self.state.registry, &mut self.gateway)?;
        if let Some(transition) = transition {
            self.tracer.trace_transition(&transition);
        }
        Ok(())
    }
}
