//! State machine types and validation for rectwm.
//!
//! The manager has exactly two pieces of mutable state: the client ring
//! and the focus pointer into it.
//!
//! ```text
//!                 MapRequest
//!     ┌─────────┐ insert()   ┌────────────────┐
//!     │  Empty  │ ─────────► │ Focused { w }  │ ◄─┐ cycle() / insert()
//!     └─────────┘            └───────┬────────┘ ──┘ remove(other)
//!          ▲                         │
//!          │ remove(last client)     │
//!          └─────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

/// State violations that can be detected
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StateViolation {
    pub kind: ViolationKind,
    pub description: String,
}

/// Types of state violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Clients are tracked but nothing is focused
    FocusMissing,
    /// Focus points at a client that is not in the ring
    DanglingFocus,
    /// A client's neighbours do not point back at it
    BrokenLink,
    /// Walking `next` from the focus does not visit every client exactly once
    OpenRing,
}

/// State transition events that can be traced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum StateTransition {
    /// Window was added to the ring
    ClientManaged { window: u32 },
    /// Window was removed from the ring
    ClientUnmanaged { window: u32, reason: UnmanageReason },
    /// Focus moved (either side may be empty)
    FocusChanged { from: Option<u32>, to: Option<u32> },
}

/// Reason a window was unmanaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmanageReason {
    /// Client destroyed the window
    Destroyed,
    /// Client unmapped the window
    Unmapped,
}
