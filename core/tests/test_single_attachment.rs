// Property test: one radio registration at most
//
// Random interleavings of host requests and platform completions, including
// completions for attempts that were already abandoned. After every step the
// platform must hold at most one live registration, and the controller must
// agree with the platform about whether it holds one.

use futures::FutureExt;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use safeq_core::{
    AttachmentHandle, AttachmentState, PeerHandle, Role, SessionConfig, SessionController,
    SessionState, TransportError, TransportSink, WifiAwareBridge,
};

#[derive(Default)]
struct RadioState {
    attach_sinks: Vec<(TransportSink, bool)>,
    role_sinks: Vec<(TransportSink, bool)>,
    live: HashSet<AttachmentHandle>,
    next_handle: u64,
}

/// Platform double that answers each request at most once, in any order
#[derive(Default)]
struct Radio {
    state: Mutex<RadioState>,
}

impl Radio {
    fn live(&self) -> usize {
        self.state.lock().live.len()
    }

    fn take_attach(&self, pick: usize) -> Option<TransportSink> {
        let mut state = self.state.lock();
        let len = state.attach_sinks.len();
        if len == 0 {
            return None;
        }
        let (sink, answered) = &mut state.attach_sinks[pick % len];
        if *answered {
            return None;
        }
        *answered = true;
        Some(sink.clone())
    }

    fn take_role(&self, pick: usize) -> Option<TransportSink> {
        let mut state = self.state.lock();
        let len = state.role_sinks.len();
        if len == 0 {
            return None;
        }
        let (sink, answered) = &mut state.role_sinks[pick % len];
        if *answered {
            return None;
        }
        *answered = true;
        Some(sink.clone())
    }

    /// Any attach sink, answered or not; termination can follow a confirm
    fn peek_attach(&self, pick: usize) -> Option<TransportSink> {
        let state = self.state.lock();
        let len = state.attach_sinks.len();
        (len > 0).then(|| state.attach_sinks[pick % len].0.clone())
    }

    fn confirm_attach(&self, pick: usize) {
        if let Some(sink) = self.take_attach(pick) {
            let handle = {
                let mut state = self.state.lock();
                state.next_handle += 1;
                let handle = AttachmentHandle::new(state.next_handle);
                state.live.insert(handle);
                handle
            };
            sink.attached(handle);
        }
    }
}

impl WifiAwareBridge for Radio {
    fn probe_capability(&self) -> bool {
        true
    }

    fn attach(&self, sink: TransportSink) -> Result<(), TransportError> {
        self.state.lock().attach_sinks.push((sink, false));
        Ok(())
    }

    fn publish(
        &self,
        attachment: AttachmentHandle,
        _service_name: &str,
        sink: TransportSink,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.live.contains(&attachment) {
            return Err(TransportError::UnknownAttachment(attachment));
        }
        state.role_sinks.push((sink, false));
        Ok(())
    }

    fn subscribe(
        &self,
        attachment: AttachmentHandle,
        service_name: &str,
        sink: TransportSink,
    ) -> Result<(), TransportError> {
        self.publish(attachment, service_name, sink)
    }

    fn close_attachment(&self, attachment: AttachmentHandle) {
        self.state.lock().live.remove(&attachment);
    }

    fn send_message(
        &self,
        attachment: AttachmentHandle,
        _peer: &PeerHandle,
        _message_id: u32,
        _payload: &[u8],
    ) -> Result<(), TransportError> {
        if self.state.lock().live.contains(&attachment) {
            Ok(())
        } else {
            Err(TransportError::UnknownAttachment(attachment))
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Start(Role),
    Stop,
    ConfirmAttach(usize),
    FailAttach(usize),
    ConfirmRole(usize),
    FailRole(usize),
    Discover(usize),
    Terminate(usize),
    Send,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => prop_oneof![Just(Role::Publisher), Just(Role::Subscriber)].prop_map(Op::Start),
        1 => Just(Op::Stop),
        3 => any::<usize>().prop_map(Op::ConfirmAttach),
        1 => any::<usize>().prop_map(Op::FailAttach),
        3 => any::<usize>().prop_map(Op::ConfirmRole),
        1 => any::<usize>().prop_map(Op::FailRole),
        1 => any::<usize>().prop_map(Op::Discover),
        1 => any::<usize>().prop_map(Op::Terminate),
        1 => Just(Op::Send),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_never_more_than_one_live_attachment(ops in prop::collection::vec(op_strategy(), 1..40)) {
        tokio_test::block_on(async {
            let radio = Arc::new(Radio::default());
            let (handle, mut events) =
                SessionController::spawn(radio.clone(), SessionConfig::default()).unwrap();
            let mut tickets = Vec::new();

            for op in &ops {
                match op {
                    Op::Start(role) => tickets.push(handle.submit_start(*role).unwrap()),
                    Op::Stop => handle.stop().await,
                    Op::ConfirmAttach(pick) => radio.confirm_attach(*pick),
                    Op::FailAttach(pick) => {
                        if let Some(sink) = radio.take_attach(*pick) {
                            sink.attach_failed("refused");
                        }
                    }
                    Op::ConfirmRole(pick) => {
                        if let Some(sink) = radio.take_role(*pick) {
                            sink.role_started();
                        }
                    }
                    Op::FailRole(pick) => {
                        if let Some(sink) = radio.take_role(*pick) {
                            sink.role_failed("refused");
                        }
                    }
                    Op::Discover(pick) => {
                        let sink = {
                            let state = radio.state.lock();
                            let len = state.role_sinks.len();
                            (len > 0).then(|| state.role_sinks[*pick % len].0.clone())
                        };
                        if let Some(sink) = sink {
                            sink.service_discovered(PeerHandle::new("peer"), None, None);
                        }
                    }
                    Op::Terminate(pick) => {
                        if let Some(sink) = radio.peek_attach(*pick) {
                            sink.terminated("radio off");
                        }
                    }
                    Op::Send => {
                        let _ = handle.send_message(PeerHandle::new("peer"), vec![1]).await;
                    }
                }

                let snapshot = handle.status().await.unwrap();
                let live = radio.live();
                assert!(live <= 1, "{} live registrations after {:?}", live, op);

                let attached = snapshot
                    .attachment
                    .as_ref()
                    .map(|a| a.state == AttachmentState::Attached)
                    .unwrap_or(false);
                assert_eq!(attached, live == 1, "controller and platform disagree after {:?}", op);

                if snapshot.role_session.is_some() {
                    assert!(attached, "role session without attachment after {:?}", op);
                }
                if let SessionState::Active(_) = snapshot.state {
                    assert_eq!(live, 1);
                }
            }

            handle.stop().await;
            assert_eq!(radio.live(), 0);
            assert_eq!(handle.status().await.unwrap().state, SessionState::Idle);

            // Every start resolved exactly once, none left hanging
            for ticket in tickets {
                assert!(ticket.wait().now_or_never().is_some());
            }

            // Discoveries only surface from an active subscriber; drain them
            while events.try_recv().is_ok() {}
        });
    }
}
