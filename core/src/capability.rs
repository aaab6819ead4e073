//! Capability gate
//!
//! Answers "does this device have WiFi Aware?" once and remembers the answer.
//! The probe runs lazily on the first question, never at construction.

use std::sync::{Arc, OnceLock};
use tracing::info;

use crate::transport::WifiAwareBridge;

pub struct CapabilityGate {
    bridge: Arc<dyn WifiAwareBridge>,
    supported: OnceLock<bool>,
}

impl CapabilityGate {
    pub fn new(bridge: Arc<dyn WifiAwareBridge>) -> Self {
        Self {
            bridge,
            supported: OnceLock::new(),
        }
    }

    /// Whether the transport is usable; probes the platform on first call only.
    pub fn is_supported(&self) -> bool {
        *self.supported.get_or_init(|| {
            let supported = self.bridge.probe_capability();
            info!("WiFi Aware capability probed: supported={}", supported);
            supported
        })
    }

    /// The cached answer, or `None` if nothing has asked yet.
    pub fn probed(&self) -> Option<bool> {
        self.supported.get().copied()
    }
}
