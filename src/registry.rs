//! Client registry: the ring of managed windows.
//!
//! Clients live in a slotmap arena and are linked into a circular,
//! doubly-linked ring through their `next`/`prev` keys. The ring has no
//! head; the focused client is the only entry point.
//!
//! New clients are spliced in *before* the focused client, so after
//! inserting A, B, C the ring in `next` order reads C → B → A → C.

use slotmap::{new_key_type, SlotMap};
use x11rb::protocol::xproto::Window;

use crate::state::{StateViolation, ViolationKind};

new_key_type! {
    /// Stable identifier for a client in the registry arena
    pub struct ClientId;
}

/// Direction to step around the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow `next` links
    Forward,
    /// Follow `prev` links
    Backward,
}

/// A managed window
#[derive(Debug, Clone)]
pub struct Client {
    /// X11 window handle (immutable for the client's lifetime)
    pub window: Window,
    next: ClientId,
    prev: ClientId,
}

#[cfg(test)]
impl Client {
    pub fn next(&self) -> ClientId {
        self.next
    }

    pub fn prev(&self) -> ClientId {
        self.prev
    }
}

/// Owns every managed client and tracks which one is focused.
///
/// `focused` is `Some` exactly when the ring is non-empty.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: SlotMap<ClientId, Client>,
    focused: Option<ClientId>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.focused.is_none()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[cfg(test)]
    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Key of the focused client
    #[cfg(test)]
    pub fn focused(&self) -> Option<ClientId> {
        self.focused
    }

    /// Window of the focused client
    pub fn focused_window(&self) -> Option<Window> {
        self.focused.map(|id| self.clients[id].window)
    }

    pub fn contains(&self, window: Window) -> bool {
        self.clients.values().any(|c| c.window == window)
    }

    /// Start managing `window` and focus it.
    ///
    /// The caller guarantees `window` is not already tracked.
    pub fn insert(&mut self, window: Window) -> ClientId {
        let id = match self.focused {
            None => self.clients.insert_with_key(|id| Client {
                window,
                next: id,
                prev: id,
            }),
            Some(focused) => {
                let prev = self.clients[focused].prev;
                let id = self.clients.insert(Client {
                    window,
                    next: focused,
                    prev,
                });
                self.clients[prev].next = id;
                self.clients[focused].prev = id;
                id
            }
        };
        self.focused = Some(id);
        id
    }

    /// Stop managing `window`.
    ///
    /// The scan starts at the focused client and walks `next` links once
    /// around the ring; an untracked window leaves the registry untouched
    /// and returns `false`. When the focused client is removed, focus moves
    /// to its predecessor, or is cleared if it was the last client.
    pub fn remove(&mut self, window: Window) -> bool {
        let Some(start) = self.focused else {
            return false;
        };

        let mut current = start;
        while self.clients[current].window != window {
            let next = self.clients[current].next;
            if next == start {
                return false;
            }
            current = next;
        }

        let Client { next, prev, .. } = self.clients[current];
        self.clients[prev].next = next;
        self.clients[next].prev = prev;

        if self.focused == Some(current) {
            self.focused = if prev == current { None } else { Some(prev) };
        }

        self.clients.remove(current);
        true
    }

    /// Move focus one step around the ring and return the newly focused window
    pub fn cycle(&mut self, direction: Direction) -> Option<Window> {
        let focused = self.focused?;
        let client = &self.clients[focused];
        let target = match direction {
            Direction::Forward => client.next,
            Direction::Backward => client.prev,
        };
        self.focused = Some(target);
        Some(self.clients[target].window)
    }

    /// Windows in ring order, starting at the focused client
    pub fn windows(&self) -> Ring<'_> {
        Ring {
            registry: self,
            start: self.focused,
            current: self.focused,
        }
    }

    /// Check the ring and focus invariants
    pub fn validate(&self) -> Vec<StateViolation> {
        let mut violations = Vec::new();

        let Some(focused) = self.focused else {
            if !self.clients.is_empty() {
                violations.push(StateViolation {
                    kind: ViolationKind::FocusMissing,
                    description: format!("{} clients tracked but none focused", self.clients.len()),
                });
            }
            return violations;
        };

        if !self.clients.contains_key(focused) {
            violations.push(StateViolation {
                kind: ViolationKind::DanglingFocus,
                description: format!("Focused client {:?} is not in the ring", focused),
            });
            return violations;
        }

        for (id, client) in &self.clients {
            let linked = self.clients.get(client.next).map(|c| c.prev) == Some(id)
                && self.clients.get(client.prev).map(|c| c.next) == Some(id);
            if !linked {
                violations.push(StateViolation {
                    kind: ViolationKind::BrokenLink,
                    description: format!(
                        "Client 0x{:x} has inconsistent neighbours",
                        client.window
                    ),
                });
            }
        }

        if violations.is_empty() {
            let steps = self.windows().count();
            if steps != self.clients.len() {
                violations.push(StateViolation {
                    kind: ViolationKind::OpenRing,
                    description: format!(
                        "Ring from focus closes after {} steps, {} clients tracked",
                        steps,
                        self.clients.len()
                    ),
                });
            }
        }

        violations
    }
}

/// Iterator over the ring, one full turn from the focused client
pub struct Ring<'a> {
    registry: &'a ClientRegistry,
    start: Option<ClientId>,
    current: Option<ClientId>,
}

impl Iterator for Ring<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let id = self.current?;
        let client = self.registry.clients.get(id)?;
        self.current = Some(client.next).filter(|&next| Some(next) != self.start);
        Some(client.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Window = 0xa;
    const B: Window = 0xb;
    const C: Window = 0xc;

    fn registry_with(windows: &[Window]) -> ClientRegistry {
        let mut registry = ClientRegistry::new();
        for &w in windows {
            registry.insert(w);
        }
        registry
    }

    #[test]
    fn test_insert_into_empty_makes_singleton() {
        let mut registry = ClientRegistry::new();
        let id = registry.insert(A);

        let client = registry.get(id).unwrap();
        assert_eq!(client.next(), id);
        assert_eq!(client.prev(), id);
        assert_eq!(registry.focused(), Some(id));
        assert_eq!(registry.focused_window(), Some(A));
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_insert_focuses_newest_before_previous_focus() {
        let registry = registry_with(&[A, B, C]);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.focused_window(), Some(C));
        assert_eq!(registry.windows().collect::<Vec<_>>(), vec![C, B, A]);
        assert!(registry.validate().is_empty());
    }

    #[test]
    fn test_cycle_forward_follows_next() {
        let mut registry = registry_with(&[A, B, C]);

        assert_eq!(registry.cycle(Direction::Forward), Some(B));
        assert_eq!(registry.cycle(Direction::Forward), Some(A));
        assert_eq!(registry.cycle(Direction::Forward), Some(C));
    }

    #[test]
    fn test_cycle_forward_then_backward_restores_focus() {
        let mut registry = registry_with(&[A, B, C]);
        registry.cycle(Direction::Forward);
        let before = registry.focused_window();

        registry.cycle(Direction::Forward);
        registry.cycle(Direction::Backward);
        assert_eq!(registry.focused_window(), before);
    }

    #[test]
    fn test_cycle_on_empty_is_noop() {
        let mut registry = ClientRegistry::new();
        assert_eq!(registry.cycle(Direction::Forward), None);
        assert_eq!(registry.cycle(Direction::Backward), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cycle_singleton_stays_put() {
        let mut registry = registry_with(&[A]);
        assert_eq!(registry.cycle(Direction::Forward), Some(A));
        assert_eq!(registry.cycle(Direction::Backward), Some(A));
    }

    #[test]
    fn test_remove_untracked_leaves_registry_unchanged() {
        let mut registry = registry_with(&[A, B, C]);

        assert!(!registry.remove(0xdead));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.focused_window(), Some(C));
        assert_eq!(registry.windows().collect::<Vec<_>>(), vec![C, B, A]);
    }

    #[test]
    fn test_remove_from_empty_is_noop() {
        let mut registry = ClientRegistry::new();
        assert!(!registry.remove(A));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_last_client_clears_focus() {
        let mut registry = registry_with(&[A]);

        assert!(registry.remove(A));
        assert!(registry.is_empty());
        assert_eq!(registry.focused(), None);
        assert_eq!(registry.len(), 0);
        assert!(registry.validate().is_empty());
    }

    #[test]
    fn test_remove_unfocused_keeps_focus() {
        let mut registry = registry_with(&[A, B, C]);

        assert!(registry.remove(B));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.focused_window(), Some(C));
        assert_eq!(registry.windows().collect::<Vec<_>>(), vec![C, A]);
        assert!(registry.validate().is_empty());
    }

    #[test]
    fn test_remove_focused_moves_focus_to_predecessor() {
        let mut registry = registry_with(&[A, B, C]);
        // Ring is C -> B -> A -> C, so C's predecessor is A
        assert!(registry.remove(C));
        assert_eq!(registry.focused_window(), Some(A));
        assert_eq!(registry.windows().collect::<Vec<_>>(), vec![A, B]);
    }

    #[test]
    fn test_cycle_then_remove_newly_focused_client() {
        let mut registry = registry_with(&[A, B, C]);

        assert_eq!(registry.cycle(Direction::Forward), Some(B));
        assert!(registry.remove(B));

        // B sat between C and A, so focus falls back to C
        assert_eq!(registry.focused_window(), Some(C));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.windows().collect::<Vec<_>>(), vec![C, A]);
        assert!(registry.validate().is_empty());
    }

    #[test]
    fn test_insert_after_removals_keeps_ring_closed() {
        let mut registry = registry_with(&[A, B]);
        registry.remove(A);
        registry.remove(B);
        registry.insert(C);
        registry.insert(A);

        assert_eq!(registry.windows().collect::<Vec<_>>(), vec![A, C]);
        assert!(registry.validate().is_empty());
    }

    #[test]
    fn test_contains() {
        let registry = registry_with(&[A, B]);
        assert!(registry.contains(A));
        assert!(registry.contains(B));
        assert!(!registry.contains(C));
    }

    #[test]
    fn test_ring_invariant_over_mixed_sequence() {
        // Small LCG so the sequence is deterministic but irregular
        let mut seed: u32 = 0x2545_f491;
        let mut next_rand = move || {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            seed >> 16
        };

        let mut registry = ClientRegistry::new();
        let mut live: Vec<Window> = Vec::new();
        let mut next_window: Window = 1;

        for _ in 0..2000 {
            match next_rand() % 4 {
                0 | 1 => {
                    registry.insert(next_window);
                    live.push(next_window);
                    next_window += 1;
                }
                2 if !live.is_empty() => {
                    let idx = next_rand() as usize % live.len();
                    let window = live.swap_remove(idx);
                    assert!(registry.remove(window));
                }
                _ => {
                    let direction = if next_rand() % 2 == 0 {
                        Direction::Forward
                    } else {
                        Direction::Backward
                    };
                    registry.cycle(direction);
                }
            }

            assert_eq!(registry.len(), live.len());
            assert_eq!(registry.is_empty(), live.is_empty());
            assert_eq!(registry.windows().count(), live.len());
            if let Some(focused) = registry.focused_window() {
                assert!(live.contains(&focused));
            }
            assert!(registry.validate().is_empty());
        }
    }
}
