//! WebSocket transport to the teth node.
//!
//! One `Connection` is one socket. Concurrent calls are multiplexed over it
//! and correlated to responses by request id. `ChainTransport` owns the
//! endpoint and enforces that at most one instance is live at a time.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::protocol::{BlockRecord, BlockSelector, JsonRpcRequest, JsonRpcResponse};
use crate::error::WalletError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, WalletError>>>;

/// Observable lifecycle of one connection instance. Driven only by
/// transport events; `Disconnected` is terminal for the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct ConnShared {
    endpoint: String,
    state: watch::Sender<ConnectionState>,
    out: mpsc::UnboundedSender<Message>,
    out_rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    pending: Mutex<PendingMap>,
    next_id: AtomicU64,
}

impl ConnShared {
    fn transition(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            log::debug!("connection to {} is now {}", self.endpoint, state);
        }
    }

    /// Fail every in-flight call. Used on teardown.
    fn drain_pending(&self) {
        let pending: PendingMap = std::mem::take(&mut *lock_unpoisoned(&self.pending));
        for (_, tx) in pending {
            let _ = tx.send(Err(WalletError::Transport("connection closed".to_string())));
        }
    }
}

/// Handle to one live connection instance. Cheap to clone; clones share the
/// underlying socket.
#[derive(Clone, Debug)]
pub struct Connection {
    shared: Arc<ConnShared>,
}

impl Connection {
    fn new(endpoint: &str) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let (out, out_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(ConnShared {
                endpoint: endpoint.to_string(),
                state,
                out,
                out_rx: Mutex::new(Some(out_rx)),
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    async fn establish(&self) -> Result<(), WalletError> {
        let (ws, _) = match connect_async(self.shared.endpoint.as_str()).await {
            Ok(ok) => ok,
            Err(e) => {
                self.shared.transition(ConnectionState::Disconnected);
                return Err(WalletError::Transport(format!(
                    "failed to connect to {}: {}",
                    self.shared.endpoint, e
                )));
            }
        };

        let (write, read) = ws.split();
        let out_rx = lock_unpoisoned(&self.shared.out_rx)
            .take()
            .ok_or_else(|| WalletError::Internal("connection established twice".to_string()))?;

        self.shared.transition(ConnectionState::Connected);
        tokio::spawn(write_loop(self.shared.clone(), write, out_rx));
        tokio::spawn(read_loop(self.shared.clone(), read));
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Invoke a remote method by name. Fails with `NotConnected` unless the
    /// instance is currently connected.
    pub async fn invoke(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        if self.state() != ConnectionState::Connected {
            return Err(WalletError::NotConnected);
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock_unpoisoned(&self.shared.pending).insert(id, tx);

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        let text = serde_json::to_string(&request)
            .map_err(|e| WalletError::Internal(format!("failed to encode request: {}", e)))?;

        if self.shared.out.send(Message::Text(text.into())).is_err() {
            lock_unpoisoned(&self.shared.pending).remove(&id);
            return Err(WalletError::NotConnected);
        }

        // The socket may have died between the state check and the send, in
        // which case the teardown drain can miss this entry. Reclaim it
        // rather than waiting on a response that will never arrive.
        if self.state() == ConnectionState::Disconnected
            && lock_unpoisoned(&self.shared.pending).remove(&id).is_some()
        {
            return Err(WalletError::Transport("connection closed".to_string()));
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(WalletError::Transport("connection closed".to_string())),
        }
    }

    /// Balance of `address` at the latest block, in base units.
    pub async fn get_balance(&self, address: &str) -> Result<u128, WalletError> {
        let raw = self
            .invoke("eth_getBalance", json!([address, "latest"]))
            .await?;
        super::protocol::parse_quantity(&raw)
            .map_err(|reason| WalletError::malformed("eth_getBalance", reason))
    }

    /// Fetch one block. `None` when the node has no block at that number.
    pub async fn get_block(
        &self,
        selector: BlockSelector,
    ) -> Result<Option<BlockRecord>, WalletError> {
        let raw = self
            .invoke("eth_getBlockByNumber", json!([selector.to_param(), false]))
            .await?;
        if raw.is_null() {
            return Ok(None);
        }
        BlockRecord::from_rpc(&raw)
            .map(Some)
            .map_err(|reason| WalletError::malformed("eth_getBlockByNumber", reason))
    }
}

async fn write_loop(
    shared: Arc<ConnShared>,
    mut write: SplitSink<WsStream, Message>,
    mut out_rx: mpsc::UnboundedReceiver<Message>,
) {
    let mut state_rx = shared.state.subscribe();
    loop {
        tokio::select! {
            msg = out_rx.recv() => match msg {
                Some(msg) => {
                    if let Err(e) = write.send(msg).await {
                        log::warn!("send to {} failed: {}", shared.endpoint, e);
                        break;
                    }
                }
                None => break,
            },
            _ = state_rx.changed() => {
                if *state_rx.borrow() == ConnectionState::Disconnected {
                    break;
                }
            }
        }
    }
    shared.transition(ConnectionState::Disconnected);
}

async fn read_loop(shared: Arc<ConnShared>, mut read: SplitStream<WsStream>) {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => route_response(&shared, &text),
            Ok(Message::Ping(data)) => {
                let _ = shared.out.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                log::warn!("socket error on {}: {}", shared.endpoint, e);
                break;
            }
            _ => {}
        }
    }
    shared.transition(ConnectionState::Disconnected);
    shared.drain_pending();
}

fn route_response(shared: &ConnShared, text: &str) {
    let response: JsonRpcResponse = match serde_json::from_str(text) {
        Ok(response) => response,
        Err(e) => {
            log::debug!("discarding unparseable frame: {}", e);
            return;
        }
    };

    let Some(id) = response.id else {
        // Server-initiated notification; this client only polls.
        return;
    };
    let Some(tx) = lock_unpoisoned(&shared.pending).remove(&id) else {
        log::debug!("response for unknown request id {}", id);
        return;
    };

    let outcome = match response.error {
        Some(err) => Err(WalletError::Rpc {
            code: err.code,
            message: err.message,
        }),
        None => Ok(response.result.unwrap_or(Value::Null)),
    };
    let _ = tx.send(outcome);
}

/// Owns the node endpoint and at most one live connection instance.
pub struct ChainTransport {
    endpoint: String,
    current: Mutex<Option<Connection>>,
}

impl ChainTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            current: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The current connection instance, live or dead.
    pub fn current(&self) -> Option<Connection> {
        lock_unpoisoned(&self.current).clone()
    }

    /// State of the current instance; `Disconnected` when none exists yet.
    pub fn state(&self) -> ConnectionState {
        self.current()
            .map(|conn| conn.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Open a fresh connection instance. Fails with `AlreadyConnected` while
    /// the previous instance is still connecting or connected.
    pub async fn connect(&self) -> Result<Connection, WalletError> {
        let conn = {
            let mut current = lock_unpoisoned(&self.current);
            if let Some(existing) = current.as_ref() {
                if existing.state() != ConnectionState::Disconnected {
                    return Err(WalletError::AlreadyConnected);
                }
            }
            let conn = Connection::new(&self.endpoint);
            *current = Some(conn.clone());
            conn
        };

        conn.establish().await?;
        log::info!("connected to node at {}", self.endpoint);
        Ok(conn)
    }
}
