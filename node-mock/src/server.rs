//! WebSocket server plumbing.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::rpc;
use crate::state::ChainState;

/// An in-process mock node bound to an ephemeral port. Shut down explicitly
/// or by dropping the handle.
pub struct MockNode {
    state: Arc<ChainState>,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl MockNode {
    pub async fn spawn(state: Arc<ChainState>) -> anyhow::Result<MockNode> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock node listener")?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(listener, state.clone(), shutdown_rx));
        log::debug!("mock node listening on {}", local_addr);
        Ok(Self {
            state,
            local_addr,
            shutdown,
            accept_task,
        })
    }

    pub fn state(&self) -> Arc<ChainState> {
        self.state.clone()
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Stop accepting and close every open connection.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        self.accept_task.abort();
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Serve forever on `addr`. Used by the standalone binary.
pub async fn run_server(state: Arc<ChainState>, addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    log::info!("Mock teth node listening on ws://{}", listener.local_addr()?);
    let (_shutdown, shutdown_rx) = watch::channel(false);
    accept_loop(listener, state, shutdown_rx).await;
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<ChainState>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let conn_shutdown = shutdown.clone();
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    log::debug!("connection from {}", peer);
                    tokio::spawn(handle_socket(stream, state.clone(), conn_shutdown));
                }
                Err(e) => log::warn!("accept failed: {}", e),
            },
        }
    }
}

async fn handle_socket(
    stream: TcpStream,
    state: Arc<ChainState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            log::debug!("handshake failed: {}", e);
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let delay = state.response_delay();
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let response = rpc::dispatch(&state, &text);
                    if write.send(Message::Text(response.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    log::debug!("socket error: {}", e);
                    break;
                }
                _ => {}
            },
        }
    }
}
