use async_trait::async_trait;
use electrobun_common::{TransportError, ViewId};
use tokio_util::sync::CancellationToken;

use super::{ReceiveHandler, SocketHub, Transport, TransportKind};
use crate::codec::EncodedMessage;

/// One view's slice of the shared [`SocketHub`].
pub struct SocketTransport {
    hub: SocketHub,
    view_id: ViewId,
}

impl SocketTransport {
    /// Register `view_id` with the hub; only a client presenting `key` may
    /// attach to it.
    pub fn new(hub: SocketHub, view_id: ViewId, key: impl Into<String>) -> Self {
        hub.authorize(view_id, key);
        Self { hub, view_id }
    }
}

#[async_trait]
impl Transport for SocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Socket
    }

    fn is_available(&self) -> bool {
        self.hub.is_connected(self.view_id)
    }

    async fn send(&self, message: &EncodedMessage) -> Result<(), TransportError> {
        self.hub
            .send(self.view_id, message.as_str().to_owned())
            .await
    }

    // The socket comes and goes independently of the channel, so it never
    // signals channel closure.
    fn register_receive_handler(&self, handler: ReceiveHandler, _closed: CancellationToken) {
        self.hub.set_receiver(self.view_id, handler);
    }

    async fn close(&self) {
        self.hub.revoke(self.view_id);
    }
}
