//! Discovery session controller
//!
//! One controller task owns the capability gate, the attachment manager and
//! at most one role session. Host requests and platform completions reach it
//! over the same ordered channel:
//!
//! ```text
//!   SessionHandle ──┐
//!                   ├──► Command channel ──► SessionController task ──► HostEvent channel
//!   TransportSink ──┘                          │
//!                                              ▼
//!                                        WifiAwareBridge
//! ```
//!
//! ## States
//!
//! `Idle → Attaching → ConfiguringRole → Active`, with `stop` passing through
//! `Stopping` back to `Idle` from anywhere.

pub mod controller;
pub mod error;
pub mod handle;

pub use controller::SessionController;
pub use error::SessionError;
pub use handle::{SessionHandle, StartTicket};

use serde::Serialize;
use std::fmt;

use crate::attachment::{Attachment, AttachmentState, AttemptId};
use crate::role::{Role, RoleSessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Attaching(Role),
    ConfiguringRole(Role),
    Active(Role),
    Stopping,
}

impl SessionState {
    /// Role being started or running, if any
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Attaching(role) | Self::ConfiguringRole(role) | Self::Active(role) => Some(*role),
            Self::Idle | Self::Stopping => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Attaching(role) => write!(f, "Attaching({})", role),
            Self::ConfiguringRole(role) => write!(f, "ConfiguringRole({})", role),
            Self::Active(role) => write!(f, "Active({})", role),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Public view of the current attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentInfo {
    pub attempt: AttemptId,
    pub created_at: u64,
    pub state: AttachmentState,
}

impl From<&Attachment> for AttachmentInfo {
    fn from(attachment: &Attachment) -> Self {
        Self {
            attempt: attachment.attempt(),
            created_at: attachment.created_at(),
            state: attachment.state(),
        }
    }
}

/// Point-in-time view of the controller, answered in command order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// `None` until the first start request probes the platform
    pub capability: Option<bool>,
    pub attachment: Option<AttachmentInfo>,
    pub role_session: Option<RoleSessionState>,
    /// Host events discarded because the event channel was full
    pub dropped_events: u64,
}
