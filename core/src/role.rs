//! Discovery roles
//!
//! Publisher and subscriber share one skeleton: configure on a live
//! attachment, wait for the platform to confirm, then route discovery and
//! message events outward. `DiscoveryRole` captures what differs between them;
//! `RoleSession` tracks one configured role and its lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::attachment::AttemptId;
use crate::events::HostEvent;
use crate::transport::{
    AttachmentHandle, Discovery, PeerHandle, TransportError, TransportSink, WifiAwareBridge,
};

/// Service name announced by publishers and matched by subscribers
pub const SERVICE_NAME: &str = "com.safeq.app.emergency";

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Publisher,
    Subscriber,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publisher => write!(f, "Publisher"),
            Self::Subscriber => write!(f, "Subscriber"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleSessionState {
    /// Configure issued, waiting for the platform
    Starting,
    /// Platform confirmed; events flow
    Active,
    /// Torn down with its attachment
    Stopped,
}

// ============================================================================
// MESSAGE HOOK
// ============================================================================

/// Receives peer messages arriving on a discovery session.
///
/// No message protocol is defined on top of the discovery session, so the
/// default hook drops everything. Implementations must return quickly: they
/// run on the controller task.
pub trait MessageHook: Send + Sync {
    fn on_message(&self, role: Role, peer: &PeerHandle, payload: &[u8]);
}

/// Default hook: logs and discards.
#[derive(Debug, Default)]
pub struct IgnoreMessages;

impl MessageHook for IgnoreMessages {
    fn on_message(&self, role: Role, peer: &PeerHandle, payload: &[u8]) {
        trace!(
            "{} ignoring {}-byte message from {}",
            role,
            payload.len(),
            peer
        );
    }
}

// ============================================================================
// ROLE TRAIT
// ============================================================================

pub trait DiscoveryRole: Send + Sync {
    fn role(&self) -> Role;

    /// Issue the publish/subscribe request for `service_name` on `attachment`.
    fn configure(
        &self,
        bridge: &dyn WifiAwareBridge,
        attachment: AttachmentHandle,
        service_name: &str,
        sink: TransportSink,
    ) -> Result<(), TransportError>;

    /// Map a discovery onto an outward event, if this role reports them.
    fn on_discovery(&self, discovery: Discovery) -> Option<HostEvent>;

    fn on_message(&self, peer: &PeerHandle, payload: &[u8]);
}

pub struct Publisher {
    hook: Arc<dyn MessageHook>,
}

impl Publisher {
    pub fn new(hook: Arc<dyn MessageHook>) -> Self {
        Self { hook }
    }
}

impl DiscoveryRole for Publisher {
    fn role(&self) -> Role {
        Role::Publisher
    }

    fn configure(
        &self,
        bridge: &dyn WifiAwareBridge,
        attachment: AttachmentHandle,
        service_name: &str,
        sink: TransportSink,
    ) -> Result<(), TransportError> {
        bridge.publish(attachment, service_name, sink)
    }

    fn on_discovery(&self, discovery: Discovery) -> Option<HostEvent> {
        // Publishers do not match; a platform reporting one is ignored
        debug!("Publisher ignoring discovery of {}", discovery.peer);
        None
    }

    fn on_message(&self, peer: &PeerHandle, payload: &[u8]) {
        self.hook.on_message(Role::Publisher, peer, payload);
    }
}

pub struct Subscriber {
    hook: Arc<dyn MessageHook>,
}

impl Subscriber {
    pub fn new(hook: Arc<dyn MessageHook>) -> Self {
        Self { hook }
    }
}

impl DiscoveryRole for Subscriber {
    fn role(&self) -> Role {
        Role::Subscriber
    }

    fn configure(
        &self,
        bridge: &dyn WifiAwareBridge,
        attachment: AttachmentHandle,
        service_name: &str,
        sink: TransportSink,
    ) -> Result<(), TransportError> {
        bridge.subscribe(attachment, service_name, sink)
    }

    fn on_discovery(&self, discovery: Discovery) -> Option<HostEvent> {
        info!("Service discovered from peer: {}", discovery.peer);
        Some(HostEvent::ServiceDiscovered(discovery.into()))
    }

    fn on_message(&self, peer: &PeerHandle, payload: &[u8]) {
        self.hook.on_message(Role::Subscriber, peer, payload);
    }
}

/// Build the role implementation for `role`.
pub fn role_for(role: Role, hook: Arc<dyn MessageHook>) -> Box<dyn DiscoveryRole> {
    match role {
        Role::Publisher => Box::new(Publisher::new(hook)),
        Role::Subscriber => Box::new(Subscriber::new(hook)),
    }
}

// ============================================================================
// ROLE SESSION
// ============================================================================

/// One configured discovery role, bound to the attachment of `attempt`.
pub struct RoleSession {
    inner: Box<dyn DiscoveryRole>,
    attempt: AttemptId,
    state: RoleSessionState,
}

impl RoleSession {
    /// Configure `inner` on a live attachment.
    ///
    /// On a synchronous platform refusal no session is created.
    pub fn start(
        inner: Box<dyn DiscoveryRole>,
        bridge: &dyn WifiAwareBridge,
        attempt: AttemptId,
        attachment: AttachmentHandle,
        sink: TransportSink,
    ) -> Result<Self, TransportError> {
        inner.configure(bridge, attachment, SERVICE_NAME, sink)?;
        info!("{} configure requested on {} ({})", inner.role(), attachment, attempt);

        Ok(Self {
            inner,
            attempt,
            state: RoleSessionState::Starting,
        })
    }

    pub fn role(&self) -> Role {
        self.inner.role()
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn state(&self) -> RoleSessionState {
        self.state
    }

    pub fn mark_active(&mut self) {
        self.state = RoleSessionState::Active;
        info!("WiFi Aware {} started", self.role());
    }

    pub fn stop(&mut self) {
        self.state = RoleSessionState::Stopped;
    }

    /// Route a discovery; only an active session reports anything.
    pub fn handle_discovery(&self, discovery: Discovery) -> Option<HostEvent> {
        if self.state != RoleSessionState::Active {
            debug!("Dropping discovery of {} before role is active", discovery.peer);
            return None;
        }
        self.inner.on_discovery(discovery)
    }

    pub fn handle_message(&self, peer: &PeerHandle, payload: &[u8]) {
        if self.state != RoleSessionState::Active {
            debug!("Dropping message from {} before role is active", peer);
            return;
        }
        self.inner.on_message(peer, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingHook {
        seen: Mutex<Vec<(Role, String, Vec<u8>)>>,
    }

    impl MessageHook for RecordingHook {
        fn on_message(&self, role: Role, peer: &PeerHandle, payload: &[u8]) {
            self.seen
                .lock()
                .push((role, peer.to_string(), payload.to_vec()));
        }
    }

    fn sink() -> TransportSink {
        let (tx, _rx) = mpsc::unbounded_channel();
        TransportSink::new(AttemptId::from_raw(1), tx)
    }

    fn discovery(peer: &str) -> Discovery {
        Discovery {
            peer: PeerHandle::new(peer),
            service_specific_info: Some(vec![7]),
            match_filter: None,
        }
    }

    #[test]
    fn test_publisher_configures_publish() {
        let transport = ScriptedTransport::new(true);
        let handle = AttachmentHandle::new(3);

        let session = RoleSession::start(
            role_for(Role::Publisher, Arc::new(IgnoreMessages)),
            &transport,
            AttemptId::from_raw(1),
            handle,
            sink(),
        )
        .unwrap();

        assert_eq!(session.role(), Role::Publisher);
        assert_eq!(session.state(), RoleSessionState::Starting);
        assert_eq!(transport.publish_calls(), vec![(handle, SERVICE_NAME.to_string())]);
        assert!(transport.subscribe_calls().is_empty());
    }

    #[test]
    fn test_subscriber_configures_subscribe() {
        let transport = ScriptedTransport::new(true);
        let handle = AttachmentHandle::new(4);

        RoleSession::start(
            role_for(Role::Subscriber, Arc::new(IgnoreMessages)),
            &transport,
            AttemptId::from_raw(1),
            handle,
            sink(),
        )
        .unwrap();

        assert_eq!(transport.subscribe_calls(), vec![(handle, SERVICE_NAME.to_string())]);
        assert!(transport.publish_calls().is_empty());
    }

    #[test]
    fn test_refused_configure_creates_no_session() {
        let transport = ScriptedTransport::new(true);
        transport.reject_role_with("bad config");

        let result = RoleSession::start(
            role_for(Role::Publisher, Arc::new(IgnoreMessages)),
            &transport,
            AttemptId::from_raw(1),
            AttachmentHandle::new(1),
            sink(),
        );

        assert_eq!(
            result.err(),
            Some(TransportError::Rejected("bad config".to_string()))
        );
    }

    #[test]
    fn test_subscriber_reports_discoveries_only_when_active() {
        let transport = ScriptedTransport::new(true);
        let mut session = RoleSession::start(
            role_for(Role::Subscriber, Arc::new(IgnoreMessages)),
            &transport,
            AttemptId::from_raw(1),
            AttachmentHandle::new(1),
            sink(),
        )
        .unwrap();

        assert!(session.handle_discovery(discovery("P0")).is_none());

        session.mark_active();
        let event = session.handle_discovery(discovery("P1")).unwrap();
        match event {
            HostEvent::ServiceDiscovered(found) => {
                assert_eq!(found.peer_handle, "P1");
                assert_eq!(found.service_specific_info, Some(vec![7]));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        session.stop();
        assert!(session.handle_discovery(discovery("P2")).is_none());
    }

    #[test]
    fn test_publisher_never_reports_discoveries() {
        let publisher = Publisher::new(Arc::new(IgnoreMessages));
        assert!(publisher.on_discovery(discovery("P1")).is_none());
    }

    #[test]
    fn test_messages_reach_hook_when_active() {
        let transport = ScriptedTransport::new(true);
        let hook = Arc::new(RecordingHook::default());
        let mut session = RoleSession::start(
            role_for(Role::Publisher, hook.clone()),
            &transport,
            AttemptId::from_raw(1),
            AttachmentHandle::new(1),
            sink(),
        )
        .unwrap();

        session.handle_message(&PeerHandle::new("early"), b"dropped");
        session.mark_active();
        session.handle_message(&PeerHandle::new("P9"), b"help");

        let seen = hook.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (Role::Publisher, "P9".to_string(), b"help".to_vec()));
    }

    #[test]
    fn test_ignore_messages_is_harmless() {
        IgnoreMessages.on_message(Role::Subscriber, &PeerHandle::new("P1"), &[0u8; 512]);
    }
}
