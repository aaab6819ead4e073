use serde::Serialize;
use thiserror::Error;

use crate::role::Role;

/// Every failure a host request can see.
///
/// Platform errors are translated into one of these before leaving the
/// controller; stale completions are swallowed and never appear here.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum SessionError {
    #[error("Wi-Fi Aware not supported on this device")]
    NotSupported,
    #[error("A start request is already in progress")]
    AlreadyInProgress,
    #[error("A {0} session is already active")]
    AlreadyActive(Role),
    #[error("Wi-Fi Aware attach failed: {0}")]
    AttachFailed(String),
    #[error("{role} configuration failed: {reason}")]
    RoleConfigurationFailed { role: Role, reason: String },
    #[error("Start request cancelled by stop")]
    Cancelled,
    #[error("No active discovery session")]
    NotActive,
    #[error("Message of {len} bytes exceeds limit of {max}")]
    MessageTooLarge { len: usize, max: usize },
    #[error("Message send failed: {0}")]
    SendFailed(String),
    #[error("Session controller is not running")]
    ControllerClosed,
}

impl SessionError {
    /// Stable code for host-side rejection payloads
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotSupported => "NOT_SUPPORTED",
            Self::AlreadyInProgress => "ALREADY_IN_PROGRESS",
            Self::AlreadyActive(_) => "ALREADY_ACTIVE",
            Self::AttachFailed(_) => "ATTACH_FAILED",
            Self::RoleConfigurationFailed { .. } => "ROLE_CONFIGURATION_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::NotActive => "NOT_ACTIVE",
            Self::MessageTooLarge { .. } => "MESSAGE_TOO_LARGE",
            Self::SendFailed(_) => "SEND_FAILED",
            Self::ControllerClosed => "CONTROLLER_CLOSED",
        }
    }

    /// Whether the caller caused this by issuing requests out of order
    pub fn is_sequencing(&self) -> bool {
        matches!(
            self,
            Self::AlreadyInProgress | Self::AlreadyActive(_) | Self::NotActive
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(SessionError::NotSupported.code(), "NOT_SUPPORTED");
        assert_eq!(
            SessionError::RoleConfigurationFailed {
                role: Role::Subscriber,
                reason: "x".to_string()
            }
            .code(),
            "ROLE_CONFIGURATION_FAILED"
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            SessionError::AlreadyActive(Role::Publisher).to_string(),
            "A Publisher session is already active"
        );
        assert_eq!(
            SessionError::MessageTooLarge { len: 300, max: 255 }.to_string(),
            "Message of 300 bytes exceeds limit of 255"
        );
    }

    #[test]
    fn test_sequencing_classification() {
        assert!(SessionError::AlreadyInProgress.is_sequencing());
        assert!(SessionError::AlreadyActive(Role::Subscriber).is_sequencing());
        assert!(!SessionError::AttachFailed("x".to_string()).is_sequencing());
        assert!(!SessionError::NotSupported.is_sequencing());
    }
}
