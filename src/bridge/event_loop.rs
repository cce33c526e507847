//! Event loop for an established connection
//!
//! One task reads and dispatches inbound payloads while the caller's task
//! multiplexes the keepalive ticker, the shutdown token and the end of the
//! read task.

use super::dispatch::Dispatcher;
use super::{LoopConfig, LoopExit};
use crate::error::BridgeError;
use crate::transport::{FrameSink, FrameSource};
use bridge_shared::state_machine::{BridgeStateMachine, CloseMode, LoopEvent, TransitionResult};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type ReadTask = JoinHandle<Result<(), BridgeError>>;

/// Text sent on every keepalive tick
pub fn keepalive_payload() -> String {
    chrono::Local::now().to_string()
}

/// Apply an event to the state machine and log the transition
pub(crate) fn transition(fsm: &mut BridgeStateMachine, event: LoopEvent) -> TransitionResult {
    let from = fsm.state();
    let result = fsm.process_event(event);
    match &result {
        TransitionResult::Invalid { from, event } => {
            warn!("[BRIDGE] Ignoring {:?} in state {:?}", event, from);
        }
        _ => info!("[BRIDGE] {:?} -> {:?} on {:?}", from, fsm.state(), event),
    }
    result
}

/// Run the loop until the read task ends, a keepalive write fails or
/// `shutdown` is cancelled. The state machine must be `Running` on entry
/// and is `Closed` on return.
pub async fn run<S, R>(
    fsm: &mut BridgeStateMachine,
    mut sink: S,
    source: R,
    dispatcher: Arc<Dispatcher>,
    config: &LoopConfig,
    shutdown: CancellationToken,
) -> Result<LoopExit, BridgeError>
where
    S: FrameSink,
    R: FrameSource,
{
    let mut reader: ReadTask = tokio::spawn(read_loop(source, dispatcher));
    let mut read_result: Option<Result<(), BridgeError>> = None;

    // First keepalive goes out one interval after the loop starts
    let mut keepalive = interval_at(
        Instant::now() + config.keepalive_interval,
        config.keepalive_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            joined = &mut reader => {
                read_result = Some(flatten(joined));
                break LoopExit::ReadFailed;
            }

            _ = keepalive.tick() => {
                if let Err(e) = sink.send_text(keepalive_payload()).await {
                    warn!("write: {}", e);
                    break LoopExit::WriteFailed;
                }
            }

            _ = shutdown.cancelled() => {
                info!("interrupt");
                break LoopExit::Interrupted;
            }
        }
    };

    let event = match exit {
        LoopExit::Interrupted => LoopEvent::Interrupted,
        LoopExit::ReadFailed => LoopEvent::ReadFailed,
        LoopExit::WriteFailed => LoopEvent::WriteFailed,
    };
    let mode = match transition(fsm, event) {
        TransitionResult::Closing(mode) => mode,
        _ => CloseMode::Immediate,
    };

    if mode == CloseMode::Handshake && read_result.is_none() {
        // Ask the peer to close, then give it a bounded window to do so
        match sink.send_close().await {
            Ok(()) => {
                tokio::select! {
                    joined = &mut reader => {
                        read_result = Some(flatten(joined));
                        debug!("Peer finished the close handshake");
                    }
                    _ = sleep(config.close_grace) => {
                        debug!("Close grace period of {:?} expired", config.close_grace);
                    }
                }
            }
            Err(e) => warn!("write close: {}", e),
        }
    }

    sink.close().await;
    if read_result.is_none() {
        reader.abort();
    }
    transition(fsm, LoopEvent::Released);

    match read_result {
        Some(Err(e)) => Err(e),
        _ => Ok(exit),
    }
}

/// Inbound activity. Returns `Ok` once the connection stops delivering
/// payloads, or the fatal error raised by the dispatcher.
async fn read_loop<R: FrameSource>(
    mut source: R,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), BridgeError> {
    loop {
        let payload = match source.recv_text().await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("read: {}", e);
                return Ok(());
            }
        };
        dispatcher.handle_payload(&payload).await?;
    }
}

fn flatten(joined: Result<Result<(), BridgeError>, tokio::task::JoinError>) -> Result<(), BridgeError> {
    match joined {
        Ok(result) => result,
        Err(e) => {
            error!("Read task ended abnormally: {}", e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::NotifyPolicy;
    use crate::testing::{MockConnector, MockPeer, RecordingNotifier, SentFrame};
    use crate::transport::TransportConnector;
    use bridge_shared::state_machine::BridgeState;
    use bridge_shared::{Alert, ClassifierMode};
    use std::time::Duration;

    struct Harness {
        peer: MockPeer,
        notifier: RecordingNotifier,
        shutdown: CancellationToken,
        handle: JoinHandle<(Result<LoopExit, BridgeError>, BridgeState)>,
    }

    async fn start(notifier: RecordingNotifier, policy: NotifyPolicy) -> Harness {
        let (connector, peer) = MockConnector::new();
        let (sink, source) = connector.connect("ws://mock/echo").await.unwrap();
        let dispatcher = Arc::new(Dispatcher::new(
            ClassifierMode::Substring,
            policy,
            Arc::new(notifier.clone()),
        ));
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut fsm = BridgeStateMachine::new();
            fsm.process_event(LoopEvent::Connected);
            let result = run(&mut fsm, sink, source, dispatcher, &LoopConfig::default(), token).await;
            (result, fsm.state())
        });

        Harness {
            peer,
            notifier,
            shutdown,
            handle,
        }
    }

    #[test]
    fn test_keepalive_payload_is_timestamp() {
        let payload = keepalive_payload();
        assert!(payload.starts_with(&chrono::Local::now().format("%Y-").to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_keepalive_per_second() {
        let h = start(RecordingNotifier::new(), NotifyPolicy::default()).await;
        let started = Instant::now();

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(h.peer.text_count(), 3);

        let times = h.peer.text_times();
        assert_eq!(times[0] - started, Duration::from_secs(1));
        assert_eq!(times[1] - times[0], Duration::from_secs(1));
        assert_eq!(times[2] - times[1], Duration::from_secs(1));

        h.shutdown.cancel();
        let _ = h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_waits_for_peer() {
        let h = start(RecordingNotifier::new(), NotifyPolicy::default()).await;
        h.peer.acknowledge_close();

        sleep(Duration::from_millis(1500)).await;
        let cancelled_at = Instant::now();
        h.shutdown.cancel();

        let (result, state) = h.handle.await.unwrap();
        assert_eq!(result.unwrap(), LoopExit::Interrupted);
        assert_eq!(state, BridgeState::Closed);
        assert!(cancelled_at.elapsed() < Duration::from_secs(1));

        let sent = h.peer.sent();
        assert_eq!(sent.last(), Some(&SentFrame::Close));
        assert!(h.peer.released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_gives_up_after_grace_period() {
        let h = start(RecordingNotifier::new(), NotifyPolicy::default()).await;

        sleep(Duration::from_millis(500)).await;
        let cancelled_at = Instant::now();
        h.shutdown.cancel();

        let (result, state) = h.handle.await.unwrap();
        assert_eq!(result.unwrap(), LoopExit::Interrupted);
        assert_eq!(state, BridgeState::Closed);
        assert_eq!(cancelled_at.elapsed(), Duration::from_secs(1));

        // Keepalives stop once the close message is out
        assert_eq!(h.peer.sent(), vec![SentFrame::Close]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_closes_without_sending() {
        let h = start(RecordingNotifier::new(), NotifyPolicy::default()).await;

        h.peer.hang_up();
        let (result, state) = h.handle.await.unwrap();

        assert_eq!(result.unwrap(), LoopExit::ReadFailed);
        assert_eq!(state, BridgeState::Closed);
        assert!(h.peer.sent().is_empty());
        assert!(h.peer.released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_ends_loop() {
        let h = start(RecordingNotifier::new(), NotifyPolicy::default()).await;
        h.peer.fail_writes();

        let started = Instant::now();
        let (result, state) = h.handle.await.unwrap();

        assert_eq!(result.unwrap(), LoopExit::WriteFailed);
        assert_eq!(state, BridgeState::Closed);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert!(h.peer.released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_payloads_are_dispatched_in_order() {
        let h = start(RecordingNotifier::new(), NotifyPolicy::default()).await;

        h.peer.push(r#"{"event":"x","r":"y","state":{"open":true}}"#);
        h.peer.push("2024-03-01 10:00:00 +01:00");
        h.peer.push(r#"{"vibration":true}"#);
        h.peer.hang_up();

        let (result, _) = h.handle.await.unwrap();
        assert_eq!(result.unwrap(), LoopExit::ReadFailed);
        assert_eq!(h.notifier.alerts(), vec![Alert::DOOR_OPENED, Alert::VIBRATION]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_failure_keeps_loop_running() {
        let h = start(RecordingNotifier::failing(), NotifyPolicy::LogAndContinue).await;

        h.peer.push(r#"{"vibration":true}"#);
        sleep(Duration::from_millis(2500)).await;

        assert!(!h.handle.is_finished());
        assert_eq!(h.peer.text_count(), 2);
        assert_eq!(h.notifier.alerts().len(), 1);

        h.shutdown.cancel();
        let (result, _) = h.handle.await.unwrap();
        assert_eq!(result.unwrap(), LoopExit::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_notify_is_fatal() {
        let h = start(RecordingNotifier::failing(), NotifyPolicy::FailFast).await;

        h.peer.push(r#"{"event":"x","r":"y","state":{"open":true}}"#);
        let (result, state) = h.handle.await.unwrap();

        let err = result.expect_err("loop should fail");
        assert!(err.is_fatal());
        assert_eq!(state, BridgeState::Closed);
        assert!(h.peer.sent().is_empty());
    }
}
