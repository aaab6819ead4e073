//! Attachment manager
//!
//! Owns the single WiFi Aware radio registration. Each attach request gets a
//! fresh `AttemptId`; completions carrying any other attempt are stale and are
//! refused. A stale *success* still carries a live platform registration, so
//! the manager releases it on the spot rather than leaking the radio.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::transport::{AttachmentHandle, TransportSink, WifiAwareBridge};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttachError {
    #[error("An attach attempt is already pending")]
    AlreadyAttaching,
    #[error("An attachment is already live")]
    AlreadyAttached,
    #[error("Attach failed: {0}")]
    Failed(String),
    #[error("Stale completion for {0}")]
    StaleCompletion(AttemptId),
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Identity of one attach attempt.
///
/// Monotonic per manager, so an id is never reused after a stop/start cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(u64);

impl AttemptId {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentState {
    /// Request handed to the platform, no answer yet
    Attaching,
    /// Platform confirmed the registration
    Attached,
    /// Platform refused the registration
    Failed,
    /// Released by `detach`
    Closed,
}

/// One radio registration and where it is in its lifecycle.
#[derive(Debug, Clone)]
pub struct Attachment {
    attempt: AttemptId,
    handle: Option<AttachmentHandle>,
    created_at: u64,
    state: AttachmentState,
}

impl Attachment {
    fn new(attempt: AttemptId) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            attempt,
            handle: None,
            created_at,
            state: AttachmentState::Attaching,
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Platform handle; `None` until the attach is confirmed
    pub fn handle(&self) -> Option<AttachmentHandle> {
        self.handle
    }

    /// Creation time in unix milliseconds
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn state(&self) -> AttachmentState {
        self.state
    }
}

// ============================================================================
// MANAGER
// ============================================================================

pub struct AttachmentManager {
    bridge: Arc<dyn WifiAwareBridge>,
    current: Option<Attachment>,
    last_attempt: u64,
}

impl AttachmentManager {
    pub fn new(bridge: Arc<dyn WifiAwareBridge>) -> Self {
        Self {
            bridge,
            current: None,
            last_attempt: 0,
        }
    }

    /// Start a new attach attempt.
    ///
    /// `make_sink` builds the completion sink bound to the new attempt. A second
    /// call while an attempt is pending is refused with `AlreadyAttaching` and
    /// does not reach the platform.
    pub fn attach(
        &mut self,
        make_sink: impl FnOnce(AttemptId) -> TransportSink,
    ) -> Result<AttemptId, AttachError> {
        if let Some(current) = &self.current {
            match current.state {
                AttachmentState::Attaching => return Err(AttachError::AlreadyAttaching),
                AttachmentState::Attached => return Err(AttachError::AlreadyAttached),
                AttachmentState::Failed | AttachmentState::Closed => {}
            }
        }

        self.last_attempt += 1;
        let attempt = AttemptId(self.last_attempt);
        self.current = Some(Attachment::new(attempt));

        if let Err(e) = self.bridge.attach(make_sink(attempt)) {
            warn!("Attach request for {} refused by platform: {}", attempt, e);
            self.current = None;
            return Err(AttachError::Failed(e.to_string()));
        }

        info!("Attach requested ({})", attempt);
        Ok(attempt)
    }

    /// Record a confirmed registration for `attempt`.
    ///
    /// A confirmation for anything but the pending attempt is stale; its
    /// handle is closed immediately.
    pub fn on_attached(
        &mut self,
        attempt: AttemptId,
        handle: AttachmentHandle,
    ) -> Result<&Attachment, AttachError> {
        match self.current.as_mut() {
            Some(current)
                if current.attempt == attempt && current.state == AttachmentState::Attaching =>
            {
                current.handle = Some(handle);
                current.state = AttachmentState::Attached;
                info!("Attached {} ({})", handle, attempt);
                Ok(current)
            }
            _ => {
                debug!(
                    "Stale attach confirmation for {}, releasing {}",
                    attempt, handle
                );
                self.bridge.close_attachment(handle);
                Err(AttachError::StaleCompletion(attempt))
            }
        }
    }

    /// Record a refused registration for `attempt`.
    ///
    /// The pending attachment is discarded and returned in the `Failed` state.
    pub fn on_attach_failed(&mut self, attempt: AttemptId) -> Result<Attachment, AttachError> {
        match self.current.take() {
            Some(mut current)
                if current.attempt == attempt && current.state == AttachmentState::Attaching =>
            {
                current.state = AttachmentState::Failed;
                warn!("Attach failed ({})", attempt);
                Ok(current)
            }
            other => {
                self.current = other;
                debug!("Stale attach failure for {}", attempt);
                Err(AttachError::StaleCompletion(attempt))
            }
        }
    }

    pub fn current(&self) -> Option<&Attachment> {
        self.current.as_ref()
    }

    /// Handle of the live registration if `attempt` owns it
    pub fn live_handle(&self, attempt: AttemptId) -> Option<AttachmentHandle> {
        self.current
            .as_ref()
            .filter(|a| a.attempt == attempt && a.state == AttachmentState::Attached)
            .and_then(|a| a.handle)
    }

    /// Release the current registration, if any.
    ///
    /// Idempotent. An attachment still in `Attaching` is simply forgotten; its
    /// eventual confirmation is stale and gets released in `on_attached`.
    pub fn detach(&mut self) -> Option<Attachment> {
        let mut attachment = self.current.take()?;

        if let Some(handle) = attachment.handle {
            if attachment.state == AttachmentState::Attached {
                self.bridge.close_attachment(handle);
            }
        }
        attachment.state = AttachmentState::Closed;
        info!("Detached ({})", attachment.attempt);
        Some(attachment)
    }
}
