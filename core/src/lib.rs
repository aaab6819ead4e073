// SafeQ Aware Core — emergency service discovery over WiFi Aware
//
// A device either announces the emergency service (publisher) or looks for
// devices announcing it (subscriber). Everything radio-specific sits behind
// `WifiAwareBridge`; this crate owns the session lifecycle on top of it.

pub mod attachment;
pub mod capability;
pub mod config;
pub mod events;
pub mod logging;
pub mod role;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use attachment::{AttachError, AttachmentState, AttemptId};
pub use config::{ConfigError, SessionConfig};
pub use events::{HostEvent, ServiceDiscovered, SessionTerminated};
pub use logging::{init_logging, LogSettings, LoggingGuard};
pub use role::{IgnoreMessages, MessageHook, Role, RoleSessionState, SERVICE_NAME};
pub use session::{
    AttachmentInfo, SessionController, SessionError, SessionHandle, SessionSnapshot,
    SessionState, StartTicket,
};
pub use transport::{
    AttachmentHandle, PeerHandle, TransportError, TransportSignal, TransportSink, WifiAwareBridge,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_public_surface_round_trip() {
        let _guard = init_logging(&LogSettings::default()).unwrap();

        let transport = Arc::new(ScriptedTransport::new(true));
        let (handle, mut events) =
            SessionController::spawn(transport.clone(), SessionConfig::default()).unwrap();

        let ticket = handle.submit_start(Role::Subscriber).unwrap();
        assert_eq!(ticket.role(), Role::Subscriber);
        handle.status().await.unwrap();
        transport.confirm_attach();
        handle.status().await.unwrap();
        transport.confirm_role();
        ticket.wait().await.unwrap();

        transport.discover("PeerHandle{peerId=3}");
        handle.stop().await;

        let event = events.recv().await.unwrap();
        assert_eq!(event.name(), "serviceDiscovered");
        assert_eq!(
            event.to_json().unwrap(),
            r#"{"peerHandle":"PeerHandle{peerId=3}"}"#
        );
        assert_eq!(
            handle.status().await.unwrap().state,
            SessionState::Idle
        );
    }
}
