// WiFi Aware platform bridge
//
// The radio stack that performs NAN service discovery lives in platform code
// (Android `WifiAwareManager`). This module defines the narrow surface the
// session controller drives:
// - capability probe
// - attach / close of the single radio registration
// - publish / subscribe on an attached registration
// - best-effort message send to a discovered peer
//
// Every operation returns as soon as the request has been handed to the
// platform. Completions come back through the `TransportSink` passed in.

use std::fmt;
use thiserror::Error;

use super::sink::TransportSink;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Errors reported synchronously by a platform bridge.
///
/// These never cross the session controller boundary; the controller maps
/// them onto `SessionError` kinds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("WiFi Aware unavailable on this device")]
    Unavailable,
    #[error("Request rejected by platform: {0}")]
    Rejected(String),
    #[error("Unknown attachment handle: {0}")]
    UnknownAttachment(AttachmentHandle),
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),
    #[error("Platform bridge error: {0}")]
    PlatformError(String),
}

// ============================================================================
// HANDLES
// ============================================================================

/// Opaque token for one live radio registration, assigned by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentHandle(u64);

impl AttachmentHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttachmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attachment#{}", self.0)
    }
}

/// Transport-assigned identifier of a discovered counterpart.
///
/// Held only as a correlation token on outgoing events and message sends.
/// The string form is stable for the lifetime of the discovery it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerHandle(String);

impl PeerHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// PLATFORM BRIDGE TRAIT
// ============================================================================

/// Platform-specific WiFi Aware API abstraction.
///
/// Implemented by platform code (JNI on Android) or by test doubles. Methods
/// may be called from the controller task while the platform concurrently
/// invokes sinks from its own callback threads; implementations must not
/// call back into the sink synchronously while holding locks the controller
/// could need, but doing so is otherwise safe because sinks only enqueue.
pub trait WifiAwareBridge: Send + Sync {
    /// Check whether WiFi Aware is present on this device.
    fn probe_capability(&self) -> bool;

    /// Request a radio registration.
    ///
    /// Completes with `TransportSink::attached` or `TransportSink::attach_failed`.
    fn attach(&self, sink: TransportSink) -> Result<(), TransportError>;

    /// Start publishing `service_name` on the given registration.
    ///
    /// Completes with `role_started` or `role_failed`; incoming messages are
    /// reported through `message_received`.
    fn publish(
        &self,
        attachment: AttachmentHandle,
        service_name: &str,
        sink: TransportSink,
    ) -> Result<(), TransportError>;

    /// Start subscribing to `service_name` on the given registration.
    ///
    /// Completes with `role_started` or `role_failed`; every match is
    /// reported through `service_discovered`.
    fn subscribe(
        &self,
        attachment: AttachmentHandle,
        service_name: &str,
        sink: TransportSink,
    ) -> Result<(), TransportError>;

    /// Release a registration and any discovery session running on it.
    fn close_attachment(&self, attachment: AttachmentHandle);

    /// Queue a message to a peer on the active discovery session.
    fn send_message(
        &self,
        attachment: AttachmentHandle,
        peer: &PeerHandle,
        message_id: u32,
        payload: &[u8],
    ) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_handle_display_is_stable() {
        let peer = PeerHandle::new("PeerHandle{peerId=7}");
        assert_eq!(peer.to_string(), "PeerHandle{peerId=7}");
        assert_eq!(peer.as_str(), peer.clone().to_string());
    }

    #[test]
    fn test_attachment_handle_display() {
        let handle = AttachmentHandle::new(42);
        assert_eq!(handle.raw(), 42);
        assert_eq!(handle.to_string(), "attachment#42");
    }

    #[test]
    fn test_transport_error_messages() {
        let err = TransportError::Rejected("publish config invalid".to_string());
        assert_eq!(err.to_string(), "Request rejected by platform: publish config invalid");

        let err = TransportError::UnknownAttachment(AttachmentHandle::new(3));
        assert_eq!(err.to_string(), "Unknown attachment handle: attachment#3");
    }
}
