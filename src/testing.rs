//! In-memory transport and notifier used by the unit tests

use crate::error::BridgeError;
use crate::notify::{NotifyReceipt, Notifier};
use crate::transport::{FrameSink, FrameSource, TransportConnector};
use async_trait::async_trait;
use bridge_shared::Alert;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A frame written by the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentFrame {
    Text(String),
    Close,
}

#[derive(Default)]
struct PeerState {
    sent: Mutex<Vec<(Instant, SentFrame)>>,
    fail_writes: AtomicBool,
    ack_close: AtomicBool,
    released: AtomicBool,
}

/// Test-side handle to the remote end of a mock connection
#[derive(Clone)]
pub struct MockPeer {
    inbound: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    state: Arc<PeerState>,
}

impl MockPeer {
    /// Deliver a payload to the bridge
    pub fn push(&self, payload: &str) {
        if let Some(tx) = self.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(payload.to_string());
        }
    }

    /// Close the connection from the peer side
    pub fn hang_up(&self) {
        self.inbound.lock().unwrap().take();
    }

    /// Make every following write fail
    pub fn fail_writes(&self) {
        self.state.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Hang up as soon as a close message arrives
    pub fn acknowledge_close(&self) {
        self.state.ack_close.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        self.state
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    /// Times at which keepalive text frames were written
    pub fn text_times(&self) -> Vec<Instant> {
        self.state
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, frame)| matches!(frame, SentFrame::Text(_)))
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn text_count(&self) -> usize {
        self.text_times().len()
    }

    /// Whether the bridge released its write half
    pub fn released(&self) -> bool {
        self.state.released.load(Ordering::SeqCst)
    }
}

pub struct MockSink {
    peer: MockPeer,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<(), BridgeError> {
        if self.peer.state.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::Write("broken pipe".into()));
        }
        self.peer
            .state
            .sent
            .lock()
            .unwrap()
            .push((Instant::now(), SentFrame::Text(text)));
        Ok(())
    }

    async fn send_close(&mut self) -> Result<(), BridgeError> {
        if self.peer.state.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::Write("broken pipe".into()));
        }
        self.peer
            .state
            .sent
            .lock()
            .unwrap()
            .push((Instant::now(), SentFrame::Close));
        if self.peer.state.ack_close.load(Ordering::SeqCst) {
            self.peer.hang_up();
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.peer.state.released.store(true, Ordering::SeqCst);
    }
}

pub struct MockSource {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameSource for MockSource {
    async fn recv_text(&mut self) -> Result<String, BridgeError> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| BridgeError::Read("connection closed".into()))
    }
}

/// Hands out a single in-memory connection
pub struct MockConnector {
    conn: Mutex<Option<(MockSink, MockSource)>>,
    dialed: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new() -> (Self, MockPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = MockPeer {
            inbound: Arc::new(Mutex::new(Some(tx))),
            state: Arc::new(PeerState::default()),
        };
        let sink = MockSink { peer: peer.clone() };
        let source = MockSource { rx };

        let connector = Self {
            conn: Mutex::new(Some((sink, source))),
            dialed: Arc::new(Mutex::new(Vec::new())),
        };
        (connector, peer)
    }

    /// A connector whose dial always fails
    pub fn refusing() -> Self {
        Self {
            conn: Mutex::new(None),
            dialed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// URLs passed to `connect`
    pub fn dialed(&self) -> Arc<Mutex<Vec<String>>> {
        self.dialed.clone()
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    type Sink = MockSink;
    type Source = MockSource;

    async fn connect(&self, url: &str) -> Result<(MockSink, MockSource), BridgeError> {
        self.dialed.lock().unwrap().push(url.to_string());
        self.conn
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BridgeError::Connection {
                url: url.to_string(),
                reason: "connection refused".into(),
            })
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}

/// Notifier that records every alert instead of sending it
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<Alert>>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the alert, then reports a transport failure
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &Alert) -> Result<NotifyReceipt, BridgeError> {
        self.alerts.lock().unwrap().push(alert.clone());
        if self.failing {
            return Err(BridgeError::Notify {
                reason: "connection refused".into(),
                fatal: false,
            });
        }
        Ok(NotifyReceipt { status: 200 })
    }
}
