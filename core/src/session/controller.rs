// Session controller task
//
// Owns every piece of session state. Nothing outside this task mutates the
// attachment or the role session; callers and platform callbacks only send
// `Command`s. Each pending start carries the attempt it created, and every
// platform signal is checked against the current attempt before it may move
// the state machine.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::handle::SessionHandle;
use super::{SessionSnapshot, SessionState};
use crate::attachment::{AttachError, AttachmentManager, AttemptId};
use crate::capability::CapabilityGate;
use crate::config::{ConfigError, SessionConfig};
use crate::events::{HostEvent, SessionTerminated};
use crate::role::{role_for, IgnoreMessages, MessageHook, Role, RoleSession};
use crate::transport::{
    AttachmentHandle, Discovery, PeerHandle, TransportSignal, TransportSink, WifiAwareBridge,
};

// ============================================================================
// COMMANDS
// ============================================================================

/// Everything the controller task reacts to, in arrival order
#[derive(Debug)]
pub(crate) enum Command {
    Start {
        role: Role,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    SendMessage {
        peer: PeerHandle,
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<u32, SessionError>>,
    },
    Status {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
    Signal {
        attempt: AttemptId,
        signal: TransportSignal,
    },
}

// ============================================================================
// PENDING REQUEST
// ============================================================================

/// A start call waiting on attach + configure.
///
/// Consumed by `resolve`, so a request cannot be answered twice.
struct PendingRequest {
    attempt: AttemptId,
    role: Role,
    reply: oneshot::Sender<Result<(), SessionError>>,
    issued_at: Instant,
}

impl PendingRequest {
    fn resolve(self, result: Result<(), SessionError>) {
        let elapsed_ms = self.issued_at.elapsed().as_millis();
        match &result {
            Ok(()) => info!(
                "Start {} resolved after {}ms ({})",
                self.role, elapsed_ms, self.attempt
            ),
            Err(e) => warn!(
                "Start {} rejected after {}ms ({}): {}",
                self.role, elapsed_ms, self.attempt, e
            ),
        }
        if self.reply.send(result).is_err() {
            debug!("Caller for {} went away before resolution", self.attempt);
        }
    }
}

// ============================================================================
// PHASE
// ============================================================================

/// Internal state; the pending request and role session live inside the
/// phases that own them.
enum Phase {
    Idle,
    Attaching {
        pending: PendingRequest,
    },
    Configuring {
        session: RoleSession,
        pending: PendingRequest,
    },
    Active {
        session: RoleSession,
    },
    Stopping,
}

impl Phase {
    fn state(&self) -> SessionState {
        match self {
            Phase::Idle => SessionState::Idle,
            Phase::Attaching { pending } => SessionState::Attaching(pending.role),
            Phase::Configuring { pending, .. } => SessionState::ConfiguringRole(pending.role),
            Phase::Active { session } => SessionState::Active(session.role()),
            Phase::Stopping => SessionState::Stopping,
        }
    }

    fn attempt(&self) -> Option<AttemptId> {
        match self {
            Phase::Attaching { pending } | Phase::Configuring { pending, .. } => {
                Some(pending.attempt)
            }
            Phase::Active { session } => Some(session.attempt()),
            Phase::Idle | Phase::Stopping => None,
        }
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct SessionController {
    bridge: Arc<dyn WifiAwareBridge>,
    gate: CapabilityGate,
    attachments: AttachmentManager,
    hook: Arc<dyn MessageHook>,
    config: SessionConfig,
    phase: Phase,
    events: mpsc::Sender<HostEvent>,
    commands: mpsc::WeakUnboundedSender<Command>,
    last_message_id: u32,
    dropped_events: u64,
}

impl SessionController {
    /// Spawn the controller on the current tokio runtime.
    ///
    /// Returns the request handle and the receiver for host events.
    pub fn spawn(
        bridge: Arc<dyn WifiAwareBridge>,
        config: SessionConfig,
    ) -> Result<(SessionHandle, mpsc::Receiver<HostEvent>), ConfigError> {
        Self::spawn_with_hook(bridge, config, Arc::new(IgnoreMessages))
    }

    /// Like `spawn`, routing peer messages to `hook`.
    pub fn spawn_with_hook(
        bridge: Arc<dyn WifiAwareBridge>,
        config: SessionConfig,
        hook: Arc<dyn MessageHook>,
    ) -> Result<(SessionHandle, mpsc::Receiver<HostEvent>), ConfigError> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel::<Command>();
        let (event_tx, event_rx) = mpsc::channel::<HostEvent>(config.event_capacity);

        let controller = Self {
            gate: CapabilityGate::new(bridge.clone()),
            attachments: AttachmentManager::new(bridge.clone()),
            bridge,
            hook,
            config,
            phase: Phase::Idle,
            events: event_tx,
            commands: command_tx.downgrade(),
            last_message_id: 0,
            dropped_events: 0,
        };

        tokio::spawn(controller.run(command_rx));
        info!("WiFi Aware session controller started");

        Ok((SessionHandle::new(command_tx), event_rx))
    }

    async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = command_rx.recv().await {
            match command {
                Command::Shutdown { reply } => {
                    self.stop();
                    let _ = reply.send(());
                    break;
                }
                command => self.handle(command),
            }
        }

        // Handles and sinks are all gone or shutdown was requested
        self.stop();
        info!("WiFi Aware session controller stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start { role, reply } => self.start(role, reply),
            Command::Stop { reply } => {
                self.stop();
                let _ = reply.send(());
            }
            Command::SendMessage {
                peer,
                payload,
                reply,
            } => {
                let _ = reply.send(self.send_message(&peer, &payload));
            }
            Command::Status { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Signal { attempt, signal } => self.on_signal(attempt, signal),
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn transition(&mut self, phase: Phase) {
        let from = self.phase.state();
        self.phase = phase;
        let to = self.phase.state();
        if from != to {
            info!("Session {} -> {}", from, to);
        }
    }

    fn sink(&self, attempt: AttemptId) -> Option<TransportSink> {
        self.commands
            .upgrade()
            .map(|tx| TransportSink::new(attempt, tx))
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    fn start(&mut self, role: Role, reply: oneshot::Sender<Result<(), SessionError>>) {
        let rejection = match &self.phase {
            Phase::Attaching { .. } | Phase::Configuring { .. } => {
                Some(SessionError::AlreadyInProgress)
            }
            Phase::Active { session } => Some(SessionError::AlreadyActive(session.role())),
            Phase::Idle | Phase::Stopping => None,
        };
        if let Some(err) = rejection {
            debug!("Refusing start {} in {}: {}", role, self.phase.state(), err);
            let _ = reply.send(Err(err));
            return;
        }

        if !self.gate.is_supported() {
            warn!("Start {} refused: WiFi Aware not supported", role);
            let _ = reply.send(Err(SessionError::NotSupported));
            return;
        }

        let Some(tx) = self.commands.upgrade() else {
            let _ = reply.send(Err(SessionError::ControllerClosed));
            return;
        };

        match self
            .attachments
            .attach(|attempt| TransportSink::new(attempt, tx))
        {
            Ok(attempt) => {
                let pending = PendingRequest {
                    attempt,
                    role,
                    reply,
                    issued_at: Instant::now(),
                };
                self.transition(Phase::Attaching { pending });
            }
            Err(AttachError::Failed(reason)) => {
                let _ = reply.send(Err(SessionError::AttachFailed(reason)));
            }
            Err(e) => {
                // Phase and manager disagree; refuse rather than replace
                warn!("Attach refused while {}: {}", self.phase.state(), e);
                let _ = reply.send(Err(SessionError::AlreadyInProgress));
            }
        }
    }

    /// Tear everything down. Always succeeds and is a no-op from `Idle`.
    fn stop(&mut self) {
        let previous = std::mem::replace(&mut self.phase, Phase::Stopping);
        if !matches!(previous, Phase::Idle | Phase::Stopping) {
            info!("Session {} -> Stopping", previous.state());
        }

        let pending = match previous {
            Phase::Idle | Phase::Stopping => None,
            Phase::Attaching { pending } => Some(pending),
            Phase::Configuring {
                mut session,
                pending,
            } => {
                session.stop();
                Some(pending)
            }
            Phase::Active { mut session } => {
                session.stop();
                None
            }
        };

        if self.attachments.detach().is_some() {
            info!("Wi-Fi Aware session stopped");
        }
        self.transition(Phase::Idle);

        if let Some(pending) = pending {
            pending.resolve(Err(SessionError::Cancelled));
        }
    }

    fn send_message(&mut self, peer: &PeerHandle, payload: &[u8]) -> Result<u32, SessionError> {
        let attempt = match &self.phase {
            Phase::Active { session } => session.attempt(),
            _ => return Err(SessionError::NotActive),
        };

        if payload.len() > self.config.max_message_len {
            return Err(SessionError::MessageTooLarge {
                len: payload.len(),
                max: self.config.max_message_len,
            });
        }

        let handle = self
            .attachments
            .live_handle(attempt)
            .ok_or(SessionError::NotActive)?;

        self.last_message_id = self.last_message_id.wrapping_add(1);
        let message_id = self.last_message_id;

        self.bridge
            .send_message(handle, peer, message_id, payload)
            .map_err(|e| {
                warn!("Send to {} failed: {}", peer, e);
                SessionError::SendFailed(e.to_string())
            })?;

        debug!("Queued message {} ({} bytes) to {}", message_id, payload.len(), peer);
        Ok(message_id)
    }

    fn snapshot(&self) -> SessionSnapshot {
        let role_session = match &self.phase {
            Phase::Configuring { session, .. } | Phase::Active { session } => Some(session.state()),
            _ => None,
        };

        SessionSnapshot {
            state: self.phase.state(),
            capability: self.gate.probed(),
            attachment: self.attachments.current().map(Into::into),
            role_session,
            dropped_events: self.dropped_events,
        }
    }

    // ------------------------------------------------------------------------
    // Platform signals
    // ------------------------------------------------------------------------

    fn on_signal(&mut self, attempt: AttemptId, signal: TransportSignal) {
        match signal {
            TransportSignal::Attached(handle) => self.on_attached(attempt, handle),
            TransportSignal::AttachFailed(reason) => self.on_attach_failed(attempt, reason),
            TransportSignal::RoleStarted => self.on_role_started(attempt),
            TransportSignal::RoleFailed(reason) | TransportSignal::Terminated(reason) => {
                self.on_failure(attempt, reason)
            }
            TransportSignal::ServiceDiscovered(discovery) => {
                self.on_discovery(attempt, discovery)
            }
            TransportSignal::MessageReceived { peer, payload } => {
                self.on_message(attempt, &peer, &payload)
            }
        }
    }

    fn on_attached(&mut self, attempt: AttemptId, handle: AttachmentHandle) {
        // The manager releases the handle itself when the attempt is stale
        if let Err(e) = self.attachments.on_attached(attempt, handle) {
            debug!("Discarding attach confirmation: {}", e);
            return;
        }

        let pending = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Attaching { pending } if pending.attempt == attempt => pending,
            other => {
                warn!("Attachment for {} has no pending start, releasing", attempt);
                self.phase = other;
                self.attachments.detach();
                return;
            }
        };

        let Some(sink) = self.sink(attempt) else {
            self.attachments.detach();
            pending.resolve(Err(SessionError::ControllerClosed));
            return;
        };

        let role = pending.role;
        match RoleSession::start(
            role_for(role, self.hook.clone()),
            self.bridge.as_ref(),
            attempt,
            handle,
            sink,
        ) {
            Ok(session) => self.transition(Phase::Configuring { session, pending }),
            Err(e) => {
                self.attachments.detach();
                self.transition(Phase::Idle);
                pending.resolve(Err(SessionError::RoleConfigurationFailed {
                    role,
                    reason: e.to_string(),
                }));
            }
        }
    }

    fn on_attach_failed(&mut self, attempt: AttemptId, reason: String) {
        if self.attachments.on_attach_failed(attempt).is_err() {
            debug!("Discarding stale attach failure for {}", attempt);
            return;
        }

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Attaching { pending } if pending.attempt == attempt => {
                self.transition(Phase::Idle);
                pending.resolve(Err(SessionError::AttachFailed(reason)));
            }
            other => self.phase = other,
        }
    }

    fn on_role_started(&mut self, attempt: AttemptId) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Configuring {
                mut session,
                pending,
            } if pending.attempt == attempt => {
                session.mark_active();
                self.transition(Phase::Active { session });
                pending.resolve(Ok(()));
            }
            other => {
                self.phase = other;
                debug!("Discarding stale role start for {}", attempt);
            }
        }
    }

    /// Role refusal or termination of the registration / discovery session.
    fn on_failure(&mut self, attempt: AttemptId, reason: String) {
        if self.phase.attempt() != Some(attempt) {
            debug!("Discarding stale failure for {}: {}", attempt, reason);
            return;
        }

        match std::mem::replace(&mut self.phase, Phase::Stopping) {
            Phase::Attaching { pending } => {
                self.attachments.detach();
                self.transition(Phase::Idle);
                pending.resolve(Err(SessionError::AttachFailed(reason)));
            }
            Phase::Configuring {
                mut session,
                pending,
            } => {
                let role = pending.role;
                session.stop();
                self.attachments.detach();
                self.transition(Phase::Idle);
                pending.resolve(Err(SessionError::RoleConfigurationFailed { role, reason }));
            }
            Phase::Active { mut session } => {
                let role = session.role();
                warn!("{} session terminated: {}", role, reason);
                session.stop();
                self.attachments.detach();
                self.transition(Phase::Idle);
                self.emit(HostEvent::SessionTerminated(SessionTerminated { role, reason }));
            }
            other => self.phase = other,
        }
    }

    fn on_discovery(&mut self, attempt: AttemptId, discovery: Discovery) {
        let event = match &self.phase {
            Phase::Active { session } if session.attempt() == attempt => {
                session.handle_discovery(discovery)
            }
            _ => {
                debug!("Discarding discovery of {} for {}", discovery.peer, attempt);
                None
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn on_message(&mut self, attempt: AttemptId, peer: &PeerHandle, payload: &[u8]) {
        match &self.phase {
            Phase::Active { session } if session.attempt() == attempt => {
                session.handle_message(peer, payload)
            }
            _ => debug!("Discarding message from {} for {}", peer, attempt),
        }
    }

    /// Hand an event to the host without waiting on it.
    ///
    /// A full channel drops the event and counts it; the controller task never
    /// blocks on a slow host.
    fn emit(&mut self, event: HostEvent) {
        let name = event.name();
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped_events += 1;
                warn!(
                    "Host event channel full, dropped {} ({} dropped so far)",
                    name, self.dropped_events
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Host event receiver dropped, {} not delivered", name);
            }
        }
    }
}
