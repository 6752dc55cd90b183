//! Shared WebSocket hub: one listener for the whole process, sessions keyed
//! by view id.
//!
//! A view connects and sends `{"type":"hello","view_id":N,"key":"..."}` as
//! its first frame. The key must match the secret registered for that view
//! with [`SocketHub::authorize`]. After `{"type":"ready"}` each text frame
//! carries exactly one JSON message in either direction.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

use electrobun_common::{TransportError, ViewId};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use super::ReceiveHandler;

const HELLO_TIMEOUT: Duration = Duration::from_secs(10);
const OUTBOUND_QUEUE: usize = 256;

/// First frame a view sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubHello {
    Hello { view_id: ViewId, key: String },
}

/// Hub's answer to a hello.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubResponse {
    Ready { view_id: ViewId },
    Error { message: String },
}

struct Session {
    generation: u64,
    outbound: mpsc::Sender<String>,
}

struct Registration {
    key: String,
    receiver: Option<ReceiveHandler>,
    session: Option<Session>,
}

#[derive(Default)]
struct HubInner {
    views: RwLock<HashMap<ViewId, Registration>>,
    generation: AtomicU64,
    local_addr: OnceLock<SocketAddr>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone, Default)]
pub struct SocketHub {
    inner: Arc<HubInner>,
}

impl SocketHub {
    /// A hub with no listener. Connections can still be fed in with
    /// [`SocketHub::handle_connection`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `addr` and start accepting views.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        let hub = Self::new();
        let _ = hub.inner.local_addr.set(local);

        let accept_hub = hub.clone();
        let task = tokio::spawn(async move { accept_hub.accept_loop(listener).await });
        if let Ok(mut slot) = hub.inner.accept_task.lock() {
            *slot = Some(task);
        }

        tracing::info!(addr = %local, "socket hub listening");
        Ok(hub)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr.get().copied()
    }

    /// `ws://host:port` for views to connect to.
    pub fn url(&self) -> Option<String> {
        self.local_addr().map(|addr| format!("ws://{addr}"))
    }

    /// Allow `view_id` to connect with `key`.
    pub fn authorize(&self, view_id: ViewId, key: impl Into<String>) {
        if let Ok(mut views) = self.inner.views.write() {
            views.insert(
                view_id,
                Registration {
                    key: key.into(),
                    receiver: None,
                    session: None,
                },
            );
        }
    }

    /// Forget a view. Its session, if any, ends.
    pub fn revoke(&self, view_id: ViewId) -> bool {
        self.inner
            .views
            .write()
            .map(|mut views| views.remove(&view_id).is_some())
            .unwrap_or(false)
    }

    pub fn set_receiver(&self, view_id: ViewId, handler: ReceiveHandler) {
        if let Ok(mut views) = self.inner.views.write() {
            match views.get_mut(&view_id) {
                Some(reg) => reg.receiver = Some(handler),
                None => tracing::warn!(%view_id, "receiver set for unauthorized view"),
            }
        }
    }

    pub fn is_connected(&self, view_id: ViewId) -> bool {
        self.inner
            .views
            .read()
            .map(|views| {
                views
                    .get(&view_id)
                    .and_then(|reg| reg.session.as_ref())
                    .is_some_and(|s| !s.outbound.is_closed())
            })
            .unwrap_or(false)
    }

    pub fn connected_count(&self) -> usize {
        self.inner
            .views
            .read()
            .map(|views| views.values().filter(|r| r.session.is_some()).count())
            .unwrap_or(0)
    }

    /// Queue one JSON text frame for `view_id`.
    pub async fn send(&self, view_id: ViewId, text: String) -> Result<(), TransportError> {
        let outbound = self
            .inner
            .views
            .read()
            .ok()
            .and_then(|views| {
                views
                    .get(&view_id)
                    .and_then(|reg| reg.session.as_ref())
                    .map(|s| s.outbound.clone())
            })
            .ok_or(TransportError::SocketUnavailable(view_id))?;

        outbound
            .send(text)
            .await
            .map_err(|_| TransportError::SocketUnavailable(view_id))
    }

    /// Stop accepting and drop every session.
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.accept_task.lock().ok().and_then(|mut t| t.take()) {
            task.abort();
        }
        if let Ok(mut views) = self.inner.views.write() {
            for reg in views.values_mut() {
                reg.session = None;
            }
        }
    }

    async fn accept_loop(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let hub = self.clone();
                    tokio::spawn(async move {
                        match accept_async(stream).await {
                            Ok(ws) => hub.handle_connection(ws, addr).await,
                            Err(e) => {
                                tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }

    /// Serve one upgraded connection until either side closes it.
    pub async fn handle_connection<S>(&self, ws: WebSocketStream<S>, addr: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut sink, mut stream) = ws.split();

        // 1. Hello identifies the view.
        let Some((view_id, key)) = read_hello(&mut stream, addr).await else {
            return;
        };

        // 2. Check the key and attach the session.
        let (generation, mut rx) = match self.attach(view_id, &key) {
            Ok(v) => v,
            Err(message) => {
                tracing::warn!(peer = %addr, %view_id, reason = message, "socket hello rejected");
                let _ = send_response(
                    &mut sink,
                    &HubResponse::Error {
                        message: message.into(),
                    },
                )
                .await;
                return;
            }
        };

        if send_response(&mut sink, &HubResponse::Ready { view_id })
            .await
            .is_err()
        {
            self.detach(view_id, generation);
            return;
        }

        tracing::info!(peer = %addr, %view_id, "socket client registered");

        // 3. Forwarding loop.
        loop {
            tokio::select! {
                outbound = rx.recv() => match outbound {
                    Some(text) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // Session replaced or view revoked.
                    None => break,
                },

                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.deliver(view_id, &text),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                },
            }
        }

        // 4. Cleanup.
        tracing::info!(peer = %addr, %view_id, "socket client disconnected");
        self.detach(view_id, generation);
    }

    fn attach(
        &self,
        view_id: ViewId,
        key: &str,
    ) -> Result<(u64, mpsc::Receiver<String>), &'static str> {
        let mut views = self.inner.views.write().map_err(|_| "hub unavailable")?;
        let reg = views.get_mut(&view_id).ok_or("unknown view")?;
        if !keys_match(&reg.key, key) {
            return Err("invalid key");
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        if reg.session.is_some() {
            tracing::debug!(%view_id, "replacing previous socket session");
        }
        // Dropping the previous sender ends the previous forwarding loop.
        reg.session = Some(Session {
            generation,
            outbound: tx,
        });
        Ok((generation, rx))
    }

    fn detach(&self, view_id: ViewId, generation: u64) {
        if let Ok(mut views) = self.inner.views.write() {
            if let Some(reg) = views.get_mut(&view_id) {
                if reg
                    .session
                    .as_ref()
                    .is_some_and(|s| s.generation == generation)
                {
                    reg.session = None;
                }
            }
        }
    }

    fn deliver(&self, view_id: ViewId, text: &str) {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(%view_id, error = %e, "discarding malformed socket frame");
                return;
            }
        };
        let receiver = self
            .inner
            .views
            .read()
            .ok()
            .and_then(|views| views.get(&view_id).and_then(|r| r.receiver.clone()));
        match receiver {
            Some(handler) => handler(value),
            None => tracing::debug!(%view_id, "socket frame with no receiver"),
        }
    }
}

async fn read_hello<S>(
    stream: &mut futures_util::stream::SplitStream<WebSocketStream<S>>,
    addr: SocketAddr,
) -> Option<(ViewId, String)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = tokio::time::timeout(HELLO_TIMEOUT, stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<HubHello>(&text) {
            Ok(HubHello::Hello { view_id, key }) => Some((view_id, key)),
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "invalid hello message");
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "expected text hello, got another frame");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error during hello");
            None
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "connection closed before hello");
            None
        }
        Err(_) => {
            tracing::warn!(peer = %addr, "hello timeout");
            None
        }
    }
}

async fn send_response<S>(
    sink: &mut futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    response: &HubResponse,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))
}

/// Compare a presented key with the registered one in time that depends only
/// on the length, never on how many leading bytes agree.
fn keys_match(expected: &str, presented: &str) -> bool {
    let (expected, presented) = (expected.as_bytes(), presented.as_bytes());
    if expected.len() != presented.len() {
        return false;
    }
    expected
        .iter()
        .zip(presented)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
