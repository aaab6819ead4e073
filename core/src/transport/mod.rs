// Transport module — WiFi Aware platform bridge and its completion sink

pub mod sink;
pub mod wifi_aware;

pub use sink::{Discovery, TransportSignal, TransportSink};
pub use wifi_aware::{AttachmentHandle, PeerHandle, TransportError, WifiAwareBridge};
