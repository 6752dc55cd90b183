use std::sync::Arc;

use electrobun_common::{TransportError, ViewId};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ReceiveHandler, Transport, TransportKind};
use crate::codec::EncodedMessage;

/// Owns one view's channel: the always-present pipe path and, optionally,
/// that view's slot on the shared socket hub.
///
/// The outbound route is chosen on the first send and then pinned: the
/// socket if it is connected at that moment, otherwise the pipe. A socket
/// route is demoted to the pipe for good when the socket disappears, never
/// the other way round, so two paths are never in flight at once.
pub struct TransportManager {
    view_id: ViewId,
    pipe: Arc<dyn Transport>,
    socket: Option<Arc<dyn Transport>>,
    /// Held across route selection and the whole write, which serializes
    /// sends for this view.
    route: Mutex<Option<TransportKind>>,
    closed: CancellationToken,
    #[cfg(unix)]
    owned_paths: Option<super::ChannelPaths>,
}

impl TransportManager {
    pub fn new(
        view_id: ViewId,
        pipe: Arc<dyn Transport>,
        socket: Option<Arc<dyn Transport>>,
    ) -> Self {
        Self {
            view_id,
            pipe,
            socket,
            route: Mutex::new(None),
            closed: CancellationToken::new(),
            #[cfg(unix)]
            owned_paths: None,
        }
    }

    /// Create and open the FIFO pair for `side`. The controller side also
    /// removes the files again on [`close`](Self::close).
    #[cfg(unix)]
    pub async fn open(
        view_id: ViewId,
        paths: &super::ChannelPaths,
        side: super::Side,
        socket: Option<Arc<dyn Transport>>,
    ) -> Result<Self, TransportError> {
        let pipe = super::pipe::open_channel(paths, side).await?;
        let mut manager = Self::new(view_id, Arc::new(pipe), socket);
        if side == super::Side::Controller {
            manager.owned_paths = Some(paths.clone());
        }
        Ok(manager)
    }

    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    /// Serialize `message` and deliver it on the pinned route.
    ///
    /// A message that cannot be serialized is logged and dropped; the
    /// channel is unaffected.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), TransportError> {
        let encoded = EncodedMessage::encode(message).map_err(|e| {
            warn!(view_id = %self.view_id, error = %e, "dropping message that failed to serialize");
            TransportError::from(e)
        })?;

        let mut route = self.route.lock().await;
        let transport = self.select(&mut route);

        match transport.send(&encoded).await {
            Ok(()) => Ok(()),
            Err(e) if transport.kind() == TransportKind::Socket => {
                warn!(view_id = %self.view_id, error = %e, "socket send failed, falling back to pipe");
                *route = Some(TransportKind::Pipe);
                self.pipe.send(&encoded).await
            }
            Err(e) => {
                warn!(view_id = %self.view_id, error = %e, "send failed");
                Err(e)
            }
        }
    }

    fn select(&self, route: &mut Option<TransportKind>) -> Arc<dyn Transport> {
        let socket = self.socket.as_ref().filter(|s| s.is_available());
        match (*route, socket) {
            (None, Some(socket)) => {
                info!(view_id = %self.view_id, "routing over socket");
                *route = Some(TransportKind::Socket);
                Arc::clone(socket)
            }
            (None, None) => {
                debug!(view_id = %self.view_id, "routing over pipe");
                *route = Some(TransportKind::Pipe);
                Arc::clone(&self.pipe)
            }
            (Some(TransportKind::Socket), Some(socket)) => Arc::clone(socket),
            (Some(TransportKind::Socket), None) => {
                info!(view_id = %self.view_id, "socket gone, pinning route to pipe");
                *route = Some(TransportKind::Pipe);
                Arc::clone(&self.pipe)
            }
            (Some(TransportKind::Pipe), _) => Arc::clone(&self.pipe),
        }
    }

    /// Route chosen for outbound traffic, if anything has been sent yet.
    pub async fn route(&self) -> Option<TransportKind> {
        *self.route.lock().await
    }

    /// Deliver every inbound message, from either path, to `handler` in the
    /// order it was framed. Delivery stops when the pipe reaches end-of-data.
    pub fn register_receive_handler<F>(&self, handler: F)
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        let handler: ReceiveHandler = Arc::new(handler);
        self.pipe
            .register_receive_handler(Arc::clone(&handler), self.closed.clone());
        if let Some(socket) = &self.socket {
            socket.register_receive_handler(handler, self.closed.clone());
        }
    }

    /// Cancelled once the channel has closed, by either side.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Wait until the channel closes.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    pub async fn close(&self) {
        self.closed.cancel();
        self.pipe.close().await;
        if let Some(socket) = &self.socket {
            socket.close().await;
        }
        #[cfg(unix)]
        if let Some(paths) = &self.owned_paths {
            super::pipe::remove_pair(paths);
        }
        info!(view_id = %self.view_id, "transport closed");
    }
}
