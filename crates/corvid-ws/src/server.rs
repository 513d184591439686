use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use corvid_core::{CorvidError, Result};

use crate::frame::{self, Opcode};
use crate::handshake::{self, HandshakeRequest, MAX_HANDSHAKE_BYTES};

/// Matches the original poll-loop's fixed client table size. Connections
/// beyond this many concurrent clients are refused at accept time.
pub const MAX_CLIENTS: usize = 64;

#[async_trait::async_trait]
pub trait WsHandler: Send + Sync {
    async fn on_connect(&self, client_id: u64);
    /// Returns the text to send back to the client, if any. The connection
    /// stays open regardless; only a `Close` frame or a read error ends it.
    async fn on_message(&self, client_id: u64, text: &str) -> Option<String>;
    async fn on_disconnect(&self, client_id: u64);
}

pub async fn serve(
    addr: &str,
    auth_token: Option<String>,
    handler: Arc<dyn WsHandler>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| CorvidError::Transport(e.to_string()))?;
    info!(addr, "WebSocket server listening");

    let slots = Arc::new(Semaphore::new(MAX_CLIENTS));
    let next_id = Arc::new(AtomicU64::new(1));

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| CorvidError::Transport(e.to_string()))?;

        let Ok(permit) = slots.clone().try_acquire_owned() else {
            debug!(%peer, "rejecting connection, at MAX_CLIENTS capacity");
            drop(stream);
            continue;
        };

        let client_id = next_id.fetch_add(1, Ordering::SeqCst);
        let handler = handler.clone();
        let auth_token = auth_token.clone();

        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handle_connection(stream, client_id, auth_token, handler.clone()).await {
                warn!(client_id, error = %e, "WebSocket connection ended with error");
            }
            handler.on_disconnect(client_id).await;
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    client_id: u64,
    auth_token: Option<String>,
    handler: Arc<dyn WsHandler>,
) -> Result<()> {
    let mut buf = vec![0u8; MAX_HANDSHAKE_BYTES];
    let n = stream
        .read(&mut buf)
        .await
        .map_err(|e| CorvidError::Transport(e.to_string()))?;
    if n == 0 {
        return Err(CorvidError::Handshake("empty request".to_string()));
    }

    let raw = String::from_utf8_lossy(&buf[..n]).to_string();
    let request = HandshakeRequest::parse(&raw);

    if !request.is_upgrade_request() {
        return Err(CorvidError::Handshake("not a WebSocket upgrade request".to_string()));
    }

    if !request.is_authorized(auth_token.as_deref()) {
        let _ = stream.write_all(handshake::UNAUTHORIZED_RESPONSE.as_bytes()).await;
        return Err(CorvidError::Auth);
    }

    let Some(key) = request.sec_websocket_key() else {
        return Err(CorvidError::Handshake("missing Sec-WebSocket-Key".to_string()));
    };

    let accept_key = handshake::compute_accept_key(&key);
    let response = handshake::switching_protocols_response(&accept_key);
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| CorvidError::Transport(e.to_string()))?;

    handler.on_connect(client_id).await;

    loop {
        let frame = match frame::read_frame(&mut stream).await {
            Ok(f) => f,
            Err(_) => return Ok(()),
        };

        match frame.opcode {
            Opcode::Text => {
                let text = String::from_utf8_lossy(&frame.payload).to_string();
                if let Some(reply) = handler.on_message(client_id, &text).await {
                    if frame::write_text(&mut stream, &reply).await.is_err() {
                        return Ok(());
                    }
                }
            }
            Opcode::Ping => {
                let _ = frame::write_pong(&mut stream, &frame.payload).await;
            }
            Opcode::Close => {
                let _ = frame::write_close(&mut stream).await;
                return Ok(());
            }
            _ => {}
        }
    }
}
