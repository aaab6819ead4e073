//! Scripted WiFi Aware bridge for tests.
//!
//! Records every call the controller makes and lets a test play the
//! platform's side: confirm or fail an attach, start or refuse a role,
//! report discoveries. Completions go to the most recent sink handed over,
//! which is what a real platform would answer.

use parking_lot::Mutex;
use std::collections::HashSet;

use crate::transport::{AttachmentHandle, PeerHandle, TransportError, TransportSink, WifiAwareBridge};

#[derive(Default)]
struct ScriptState {
    probe_calls: usize,
    attach_sinks: Vec<TransportSink>,
    role_sinks: Vec<TransportSink>,
    publish_calls: Vec<(AttachmentHandle, String)>,
    subscribe_calls: Vec<(AttachmentHandle, String)>,
    closed: Vec<AttachmentHandle>,
    sent: Vec<(AttachmentHandle, PeerHandle, u32, Vec<u8>)>,
    live: HashSet<AttachmentHandle>,
    next_handle: u64,
    reject_attach: Option<String>,
    reject_role: Option<String>,
    reject_send: Option<String>,
}

pub struct ScriptedTransport {
    supported: bool,
    state: Mutex<ScriptState>,
}

impl ScriptedTransport {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            state: Mutex::new(ScriptState::default()),
        }
    }

    // ------------------------------------------------------------------------
    // Recorded calls
    // ------------------------------------------------------------------------

    pub fn probe_calls(&self) -> usize {
        self.state.lock().probe_calls
    }

    pub fn attach_calls(&self) -> usize {
        self.state.lock().attach_sinks.len()
    }

    pub fn attach_sinks(&self) -> Vec<TransportSink> {
        self.state.lock().attach_sinks.clone()
    }

    pub fn role_sinks(&self) -> Vec<TransportSink> {
        self.state.lock().role_sinks.clone()
    }

    pub fn publish_calls(&self) -> Vec<(AttachmentHandle, String)> {
        self.state.lock().publish_calls.clone()
    }

    pub fn subscribe_calls(&self) -> Vec<(AttachmentHandle, String)> {
        self.state.lock().subscribe_calls.clone()
    }

    pub fn closed_handles(&self) -> Vec<AttachmentHandle> {
        self.state.lock().closed.clone()
    }

    pub fn sent_messages(&self) -> Vec<(AttachmentHandle, PeerHandle, u32, Vec<u8>)> {
        self.state.lock().sent.clone()
    }

    /// Registrations confirmed and not yet closed
    pub fn live_attachments(&self) -> usize {
        self.state.lock().live.len()
    }

    // ------------------------------------------------------------------------
    // Synchronous refusals
    // ------------------------------------------------------------------------

    pub fn reject_attach_with(&self, reason: &str) {
        self.state.lock().reject_attach = Some(reason.to_string());
    }

    pub fn reject_role_with(&self, reason: &str) {
        self.state.lock().reject_role = Some(reason.to_string());
    }

    pub fn reject_send_with(&self, reason: &str) {
        self.state.lock().reject_send = Some(reason.to_string());
    }

    pub fn clear_rejections(&self) {
        let mut state = self.state.lock();
        state.reject_attach = None;
        state.reject_role = None;
        state.reject_send = None;
    }

    // ------------------------------------------------------------------------
    // Platform side
    // ------------------------------------------------------------------------

    // Each helper answers the latest request and panics if the controller has
    // not issued one yet.

    fn latest_attach_sink(&self, action: &str) -> TransportSink {
        match self.state.lock().attach_sinks.last().cloned() {
            Some(sink) => sink,
            None => panic!("{} without an attach request", action),
        }
    }

    fn latest_role_sink(&self, action: &str) -> TransportSink {
        match self.state.lock().role_sinks.last().cloned() {
            Some(sink) => sink,
            None => panic!("{} without a publish or subscribe request", action),
        }
    }

    /// Confirm the latest attach request with a fresh handle.
    pub fn confirm_attach(&self) -> AttachmentHandle {
        let (sink, handle) = {
            let mut state = self.state.lock();
            state.next_handle += 1;
            let handle = AttachmentHandle::new(state.next_handle);
            state.live.insert(handle);
            let sink = state
                .attach_sinks
                .last()
                .cloned()
                .expect("confirm_attach without an attach request");
            (sink, handle)
        };
        sink.attached(handle);
        handle
    }

    pub fn fail_attach(&self, reason: &str) {
        self.latest_attach_sink("fail_attach").attach_failed(reason);
    }

    pub fn confirm_role(&self) {
        self.latest_role_sink("confirm_role").role_started();
    }

    pub fn fail_role(&self, reason: &str) {
        self.latest_role_sink("fail_role").role_failed(reason);
    }

    pub fn discover(&self, peer: &str) {
        self.latest_role_sink("discover")
            .service_discovered(PeerHandle::new(peer), None, None);
    }

    pub fn deliver_message(&self, peer: &str, payload: &[u8]) {
        self.latest_role_sink("deliver_message")
            .message_received(PeerHandle::new(peer), payload.to_vec());
    }

    /// The platform drops the latest registration on its own.
    pub fn terminate(&self, reason: &str) {
        self.latest_attach_sink("terminate").terminated(reason);
    }
}

impl WifiAwareBridge for ScriptedTransport {
    fn probe_capability(&self) -> bool {
        self.state.lock().probe_calls += 1;
        self.supported
    }

    fn attach(&self, sink: TransportSink) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.reject_attach.clone() {
            return Err(TransportError::Rejected(reason));
        }
        state.attach_sinks.push(sink);
        Ok(())
    }

    fn publish(
        &self,
        attachment: AttachmentHandle,
        service_name: &str,
        sink: TransportSink,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.reject_role.clone() {
            return Err(TransportError::Rejected(reason));
        }
        state.publish_calls.push((attachment, service_name.to_string()));
        state.role_sinks.push(sink);
        Ok(())
    }

    fn subscribe(
        &self,
        attachment: AttachmentHandle,
        service_name: &str,
        sink: TransportSink,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.reject_role.clone() {
            return Err(TransportError::Rejected(reason));
        }
        state.subscribe_calls.push((attachment, service_name.to_string()));
        state.role_sinks.push(sink);
        Ok(())
    }

    fn close_attachment(&self, attachment: AttachmentHandle) {
        let mut state = self.state.lock();
        state.live.remove(&attachment);
        state.closed.push(attachment);
    }

    fn send_message(
        &self,
        attachment: AttachmentHandle,
        peer: &PeerHandle,
        message_id: u32,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.reject_send.clone() {
            return Err(TransportError::Rejected(reason));
        }
        if !state.live.contains(&attachment) {
            return Err(TransportError::UnknownAttachment(attachment));
        }
        state
            .sent
            .push((attachment, peer.clone(), message_id, payload.to_vec()));
        Ok(())
    }
}
