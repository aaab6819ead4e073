use tokio::sync::{mpsc, oneshot};

use super::controller::Command;
use super::error::SessionError;
use super::SessionSnapshot;
use crate::role::Role;
use crate::transport::PeerHandle;

/// Handle for issuing requests to a running `SessionController`.
///
/// Cheap to clone; every clone talks to the same controller task. Requests
/// are answered in the order the controller receives them.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    command_tx: mpsc::UnboundedSender<Command>,
}

/// A submitted start request whose outcome is still pending.
#[derive(Debug)]
pub struct StartTicket {
    role: Role,
    rx: oneshot::Receiver<Result<(), SessionError>>,
}

impl StartTicket {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Wait for the start request to resolve.
    pub async fn wait(self) -> Result<(), SessionError> {
        self.rx.await.map_err(|_| SessionError::ControllerClosed)?
    }
}

impl SessionHandle {
    pub(crate) fn new(command_tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { command_tx }
    }

    /// Enqueue a start request without waiting for it to resolve.
    ///
    /// The request is ordered ahead of anything sent on this handle
    /// afterwards.
    pub fn submit_start(&self, role: Role) -> Result<StartTicket, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Start { role, reply })
            .map_err(|_| SessionError::ControllerClosed)?;
        Ok(StartTicket { role, rx })
    }

    /// Attach and publish the emergency service; resolves once publishing runs.
    pub async fn start_publishing(&self) -> Result<(), SessionError> {
        self.submit_start(Role::Publisher)?.wait().await
    }

    /// Attach and subscribe to the emergency service; resolves once
    /// subscribing runs. Matches arrive as `HostEvent::ServiceDiscovered`.
    pub async fn start_subscribing(&self) -> Result<(), SessionError> {
        self.submit_start(Role::Subscriber)?.wait().await
    }

    /// Tear down the current session. Always succeeds, including when idle
    /// or when the controller has already shut down.
    pub async fn stop(&self) {
        let (reply, rx) = oneshot::channel();
        if self.command_tx.send(Command::Stop { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Send a payload to a discovered peer; returns the message id used.
    pub async fn send_message(
        &self,
        peer: PeerHandle,
        payload: Vec<u8>,
    ) -> Result<u32, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::SendMessage {
                peer,
                payload,
                reply,
            })
            .map_err(|_| SessionError::ControllerClosed)?;

        rx.await.map_err(|_| SessionError::ControllerClosed)?
    }

    pub async fn status(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Status { reply })
            .map_err(|_| SessionError::ControllerClosed)?;

        rx.await.map_err(|_| SessionError::ControllerClosed)
    }

    /// Stop any session and end the controller task.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.command_tx.send(Command::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}
