//! Development peer for the sensor bridge
//!
//! Accepts WebSocket connections on `/echo`, echoes every data frame back and
//! broadcasts each line typed on stdin to all connected clients, e.g.
//! `{"e":"changed","r":"sensors","state":{"open":true}}`.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ECHO_PATH: &str = "/echo";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let bind = std::env::args().nth(1).unwrap_or_else(|| "0.0.0.0:8080".into());
    let listener = TcpListener::bind(&bind).await?;
    info!("Echo server listening on {} (path {})", bind, ECHO_PATH);

    let (inject_tx, _) = broadcast::channel::<String>(16);

    let stdin_tx = inject_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            match stdin_tx.send(line) {
                Ok(n) => info!("Injected payload to {} client(s)", n),
                Err(_) => warn!("No clients connected, payload dropped"),
            }
        }
    });

    loop {
        let (socket, addr) = listener.accept().await?;
        info!("Connection from: {}", addr);

        let inject_rx = inject_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, addr, inject_rx).await {
                warn!("Session {} ended with error: {}", addr, e);
            }
            info!("Client disconnected: {}", addr);
        });
    }
}

fn check_path(req: &Request, resp: Response) -> Result<Response, ErrorResponse> {
    if req.uri().path() == ECHO_PATH {
        return Ok(resp);
    }
    let mut err = ErrorResponse::new(Some(format!("no endpoint at {}", req.uri().path())));
    *err.status_mut() = StatusCode::NOT_FOUND;
    Err(err)
}

async fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    mut inject_rx: broadcast::Receiver<String>,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_hdr_async(stream, check_path).await?;
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("[{}] recv: {}", addr, text.as_str());
                        write.send(Message::Text(text)).await?;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        write.send(Message::Binary(data)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("[{}] close requested: {:?}", addr, frame.map(|f| f.code));
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                }
            }

            injected = inject_rx.recv() => {
                match injected {
                    Ok(payload) => write.send(Message::Text(payload.into())).await?,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("[{}] skipped {} injected payloads", addr, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Completes the close handshake started by the client
    let _ = write.close().await;
    Ok(())
}
