//! WebSocket transport implementation

use crate::error::BridgeError;
use crate::transport::traits::{FrameSink, FrameSource, TransportConnector};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for flushing the final frames when releasing the write half
const RELEASE_TIMEOUT: Duration = Duration::from_millis(500);

/// Write half of a WebSocket connection
pub struct WsSink {
    inner: SplitSink<WsStream, Message>,
    close_sent: bool,
    closed: bool,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), BridgeError> {
        if self.closed {
            return Err(BridgeError::Write("connection already closed".into()));
        }
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| BridgeError::Write(e.to_string()))
    }

    async fn send_close(&mut self) -> Result<(), BridgeError> {
        if self.closed {
            return Err(BridgeError::Write("connection already closed".into()));
        }
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        self.inner
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| BridgeError::Write(e.to_string()))?;
        self.close_sent = true;
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Without a close handshake only frames tungstenite already queued
        // (e.g. the reply to a peer's close) are flushed
        let result = if self.close_sent {
            timeout(RELEASE_TIMEOUT, self.inner.close()).await
        } else {
            timeout(RELEASE_TIMEOUT, self.inner.flush()).await
        };
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("WebSocket release: {}", e),
            Err(_) => debug!("WebSocket release timed out"),
        }
    }
}

/// Read half of a WebSocket connection
pub struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn recv_text(&mut self) -> Result<String, BridgeError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(String::from_utf8_lossy(&data).into_owned())
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(f) => format!("peer closed connection ({})", u16::from(f.code)),
                        None => "peer closed connection".to_string(),
                    };
                    return Err(BridgeError::Read(reason));
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(BridgeError::Read(e.to_string())),
                None => return Err(BridgeError::Read("connection closed".into())),
            }
        }
    }
}

/// Dials plain `ws://` (or `wss://`) endpoints without extra headers
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl TransportConnector for WsConnector {
    type Sink = WsSink;
    type Source = WsSource;

    async fn connect(&self, url: &str) -> Result<(Self::Sink, Self::Source), BridgeError> {
        let (stream, response) = match timeout(self.connect_timeout, connect_async(url)).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                return Err(BridgeError::Connection {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(BridgeError::Connection {
                    url: url.to_string(),
                    reason: format!("handshake timed out after {:?}", self.connect_timeout),
                })
            }
        };
        debug!("WebSocket handshake complete: status={}", response.status());

        let (sink, source) = stream.split();
        Ok((
            WsSink {
                inner: sink,
                close_sent: false,
                closed: false,
            },
            WsSource { inner: source },
        ))
    }

    fn name(&self) -> &'static str {
        "WebSocket"
    }
}
