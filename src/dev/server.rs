// src/dev/server.rs

//! Reload WebSocket server.
//!
//! A plain `TcpListener` accept thread upgrades connections with
//! `tungstenite` and keeps the client list shared with the async world.
//! Outbound messages are broadcast to every connected extension context;
//! inbound messages are parsed and forwarded to the dispatcher over an mpsc
//! channel.

use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use tungstenite::{Message, WebSocket};

use crate::dev::protocol::ReloadMessage;
use crate::errors::{ExtkitError, Result};

/// Maximum port retry attempts when the preferred port is taken.
const MAX_PORT_RETRIES: u16 = 10;

type SharedClients = Arc<Mutex<Vec<Arc<Mutex<WebSocket<TcpStream>>>>>>;

/// Handle to the running reload server.
#[derive(Clone)]
pub struct ReloadServerHandle {
    clients: SharedClients,
    port: u16,
}

impl ReloadServerHandle {
    /// Port the server actually bound (may differ from the requested one).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Broadcast one message to every connected client, dropping clients
    /// whose sockets have died.
    pub fn broadcast(&self, msg: &ReloadMessage) {
        let json = msg.to_json();
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        clients.retain(|client| {
            let mut ws = client
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match ws.send(Message::Text(json.clone().into())) {
                Ok(()) => true,
                Err(e) => {
                    debug!(error = %e, "dropping dead reload client");
                    false
                }
            }
        });
    }
}

/// Start the reload server on `base_port` (retrying upward when taken).
///
/// Inbound messages that parse as [`ReloadMessage`] are forwarded to
/// `inbound_tx`.
pub fn start_reload_server(
    base_port: u16,
    inbound_tx: mpsc::Sender<ReloadMessage>,
) -> Result<ReloadServerHandle> {
    let (listener, port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
    debug!(port, "reload server listening");

    let clients: SharedClients = Arc::new(Mutex::new(Vec::new()));
    let accept_clients = Arc::clone(&clients);

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "reload server accept error");
                    continue;
                }
            };

            let ws = match tungstenite::accept(stream) {
                Ok(ws) => ws,
                Err(e) => {
                    debug!(error = %e, "websocket handshake failed");
                    continue;
                }
            };

            // Short read timeouts let the reader loop share the socket with
            // broadcasts without starving them.
            if let Err(e) = ws
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(100)))
            {
                warn!(error = %e, "failed to set read timeout on reload client");
            }

            debug!("reload client connected");
            let client = Arc::new(Mutex::new(ws));
            {
                let mut list = accept_clients
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                list.push(Arc::clone(&client));
            }

            let tx = inbound_tx.clone();
            std::thread::spawn(move || read_loop(client, tx));
        }
    });

    Ok(ReloadServerHandle { clients, port })
}

fn read_loop(client: Arc<Mutex<WebSocket<TcpStream>>>, tx: mpsc::Sender<ReloadMessage>) {
    loop {
        let msg = {
            let mut ws = client
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            ws.read()
        };

        match msg {
            Ok(Message::Text(text)) => {
                if let Some(parsed) = ReloadMessage::from_json(&text) {
                    if tx.blocking_send(parsed).is_err() {
                        return;
                    }
                } else {
                    debug!(%text, "unrecognised reload message");
                }
            }
            Ok(Message::Close(_)) => {
                debug!("reload client disconnected");
                return;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
            {
                // Timeout tick; release the lock so broadcasts get through.
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(_) => return,
        }
    }
}

fn try_bind_port(base_port: u16, retries: u16) -> Result<(TcpListener, u16)> {
    for offset in 0..=retries {
        let port = base_port + offset;
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => return Ok((listener, port)),
            Err(e) if e.kind() == ErrorKind::AddrInUse => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(ExtkitError::ConfigError(format!(
        "no free port in {base_port}..={}",
        base_port + retries
    )))
}
