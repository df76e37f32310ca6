//! WebSocket transport: a plain `tokio::net::TcpListener` accept loop
//! handing each connection its own task — one semaphore-free task per
//! connection since room capacity is enforced by `Room::connect` itself,
//! not at the transport.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use nexus_protocol::{CloseCode, InboundMessage, OutboundMessage};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::room::RoomHandle;

/// How many candidate ports the accept loop probes past the configured
/// start before giving up.
const PORT_PROBE_ATTEMPTS: u16 = 20;

/// Binds the first free port at or after `start`, probing upward.
pub async fn bind(start: u16) -> io::Result<TcpListener> {
    let mut last_err = None;
    for offset in 0..PORT_PROBE_ATTEMPTS {
        let port = start.saturating_add(offset);
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                log::info!("listening on port {port}");
                return Ok(listener);
            }
            Err(err) => {
                log::warn!("port {port} unavailable: {err}");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrInUse, "no free port found in probe range")))
}

/// Accepts connections forever, handing each one its own task.
pub async fn run_accept_loop(listener: TcpListener, room: RoomHandle) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let room = room.clone();
                tokio::spawn(async move { handle_connection(stream, addr, room).await });
            }
            Err(err) => log::error!("failed to accept incoming connection: {err}"),
        }
    }
}

/// Captures the `token` query parameter (if any) off the HTTP upgrade
/// request during the WebSocket handshake, since `tokio-tungstenite`
/// doesn't surface handshake headers any other way once the upgrade
/// completes.
fn capture_token(request: &Request) -> Option<String> {
    let query = request.uri().query()?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token").then(|| value.to_string())
    })
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, room: RoomHandle) {
    let _ = stream.set_nodelay(true);

    let captured_token = Arc::new(Mutex::new(None));
    let callback_token = Arc::clone(&captured_token);
    let callback = move |request: &Request, response: Response| {
        *callback_token.lock().expect("token capture mutex poisoned") = capture_token(request);
        Ok(response)
    };

    let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(err) => {
            log::debug!("websocket handshake failed for {addr}: {err}");
            return;
        }
    };
    let token = captured_token.lock().expect("token capture mutex poisoned").clone();

    let (mut sink, mut incoming) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundMessage>();

    let connected = match room.connect(token, outbound_tx).await {
        Ok(connected) => connected,
        Err(close_code) => {
            let _ = sink.send(close_message(close_code)).await;
            return;
        }
    };
    log::info!("session {} connected for account {} ({addr})", connected.session_id, connected.account_id);

    let session_id = connected.session_id;
    let mut close_rx = connected.close_rx;

    loop {
        tokio::select! {
            biased;

            close_code = &mut close_rx => {
                let code = close_code.unwrap_or(CloseCode::Admin);
                let _ = sink.send(close_message(code)).await;
                break;
            }
            outbound = outbound_rx.recv() => {
                let Some(message) = outbound else { break };
                match serde_json::to_string(&message) {
                    Ok(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => log::error!("failed to encode outbound message: {err}"),
                }
            }
            frame = incoming.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<InboundMessage>(&text) {
                        Ok(message) => room.inbound(session_id, message).await,
                        Err(err) => log::debug!("dropping malformed frame from {addr}: {err}"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        log::debug!("websocket error from {addr}: {err}");
                        break;
                    }
                }
            }
        }
    }

    room.disconnect(session_id).await;
    log::info!("session {session_id} disconnected ({addr})");
}

fn close_message(code: CloseCode) -> Message {
    Message::Close(Some(CloseFrame {
        code: code.code().into(),
        reason: code.reason().into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_token_reads_query_parameter() {
        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .uri("/ws?token=abc123")
            .body(())
            .unwrap();
        assert_eq!(capture_token(&request), Some("abc123".to_string()));
    }

    #[test]
    fn capture_token_is_none_without_a_query() {
        let request = tokio_tungstenite::tungstenite::http::Request::builder().uri("/ws").body(()).unwrap();
        assert_eq!(capture_token(&request), None);
    }

    #[tokio::test]
    async fn bind_probes_upward_past_an_occupied_port() {
        let first = bind(18_500).await.unwrap();
        let first_port = first.local_addr().unwrap().port();
        let second = bind(first_port).await.unwrap();
        assert_ne!(first.local_addr().unwrap().port(), second.local_addr().unwrap().port());
    }
}
