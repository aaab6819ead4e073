//! Events pushed to the host application.
//!
//! The host bridge forwards these to its listeners by name; payload field
//! names follow the host's camelCase convention and absent optionals are
//! omitted entirely.

use serde::Serialize;

use crate::role::Role;
use crate::transport::Discovery;

/// Payload of a `serviceDiscovered` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDiscovered {
    pub peer_handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_specific_info: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_filter: Option<Vec<Vec<u8>>>,
}

impl From<Discovery> for ServiceDiscovered {
    fn from(discovery: Discovery) -> Self {
        Self {
            peer_handle: discovery.peer.to_string(),
            service_specific_info: discovery.service_specific_info,
            match_filter: discovery.match_filter,
        }
    }
}

/// Payload of a `sessionTerminated` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTerminated {
    pub role: Role,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HostEvent {
    ServiceDiscovered(ServiceDiscovered),
    SessionTerminated(SessionTerminated),
}

impl HostEvent {
    /// Listener name the host registers for
    pub fn name(&self) -> &'static str {
        match self {
            Self::ServiceDiscovered(_) => "serviceDiscovered",
            Self::SessionTerminated(_) => "sessionTerminated",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
