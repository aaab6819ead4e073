//! Completion sink handed to the platform bridge.
//!
//! Platform callbacks (`onAttached`, `onPublishStarted`, `onServiceDiscovered`,
//! ...) turn into discrete `TransportSignal` messages tagged with the attempt
//! that issued the request. All signals land on the controller's single
//! ordered command channel, so a callback never touches session state
//! directly.

use tokio::sync::mpsc;
use tracing::debug;

use super::wifi_aware::{AttachmentHandle, PeerHandle};
use crate::attachment::AttemptId;
use crate::session::controller::Command;

/// A single service match reported by the subscriber side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub peer: PeerHandle,
    pub service_specific_info: Option<Vec<u8>>,
    pub match_filter: Option<Vec<Vec<u8>>>,
}

/// Completion and event messages delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// The radio registration is live
    Attached(AttachmentHandle),
    /// The registration request was refused
    AttachFailed(String),
    /// Publish or subscribe is running
    RoleStarted,
    /// Publish or subscribe was refused
    RoleFailed(String),
    /// Subscriber matched a publisher
    ServiceDiscovered(Discovery),
    /// A peer sent a message over the discovery session
    MessageReceived { peer: PeerHandle, payload: Vec<u8> },
    /// The registration or its discovery session ended without being asked to
    Terminated(String),
}

impl TransportSignal {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attached(_) => "attached",
            Self::AttachFailed(_) => "attach_failed",
            Self::RoleStarted => "role_started",
            Self::RoleFailed(_) => "role_failed",
            Self::ServiceDiscovered(_) => "service_discovered",
            Self::MessageReceived { .. } => "message_received",
            Self::Terminated(_) => "terminated",
        }
    }
}

/// Handle through which the platform reports completions for one attempt.
///
/// Cheap to clone and safe to call from any thread. Calls never block; if the
/// controller has shut down the signal is dropped.
#[derive(Debug, Clone)]
pub struct TransportSink {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<Command>,
}

impl TransportSink {
    pub(crate) fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { attempt, tx }
    }

    /// Attempt this sink reports for
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn attached(&self, handle: AttachmentHandle) {
        self.signal(TransportSignal::Attached(handle));
    }

    pub fn attach_failed(&self, reason: impl Into<String>) {
        self.signal(TransportSignal::AttachFailed(reason.into()));
    }

    pub fn role_started(&self) {
        self.signal(TransportSignal::RoleStarted);
    }

    pub fn role_failed(&self, reason: impl Into<String>) {
        self.signal(TransportSignal::RoleFailed(reason.into()));
    }

    pub fn service_discovered(
        &self,
        peer: PeerHandle,
        service_specific_info: Option<Vec<u8>>,
        match_filter: Option<Vec<Vec<u8>>>,
    ) {
        self.signal(TransportSignal::ServiceDiscovered(Discovery {
            peer,
            service_specific_info,
            match_filter,
        }));
    }

    pub fn message_received(&self, peer: PeerHandle, payload: Vec<u8>) {
        self.signal(TransportSignal::MessageReceived { peer, payload });
    }

    pub fn terminated(&self, reason: impl Into<String>) {
        self.signal(TransportSignal::Terminated(reason.into()));
    }

    /// Deliver a raw signal
    pub fn signal(&self, signal: TransportSignal) {
        let kind = signal.kind();
        if self
            .tx
            .send(Command::Signal {
                attempt: self.attempt,
                signal,
            })
            .is_err()
        {
            debug!("Controller gone, dropping {} for {}", kind, self.attempt);
        }
    }
}
