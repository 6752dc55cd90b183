//! Physical channels between the controller and one view.
//!
//! Two implementations share the [`Transport`] contract: a FIFO pair that is
//! always available, and a shared WebSocket hub that is preferred once the
//! view has connected to it. [`TransportManager`] owns both for one view and
//! decides which carries each outbound message.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use electrobun_common::{TransportError, ViewId};
use tokio_util::sync::CancellationToken;

use crate::codec::EncodedMessage;

pub mod hub;
mod manager;
#[cfg(unix)]
pub mod pipe;
pub mod socket;
pub mod stream;


pub use hub::SocketHub;
pub use manager::TransportManager;
pub use socket::SocketTransport;
pub use stream::{InboundSource, StreamTransport};

/// Callback invoked once per decoded inbound message.
pub type ReceiveHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Fixed root of every channel file name.
pub const PIPE_NAME_ROOT: &str = "electrobun_ipc_pipe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Pipe,
    Socket,
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Whether a message sent now has somewhere to go.
    fn is_available(&self) -> bool;

    async fn send(&self, message: &EncodedMessage) -> Result<(), TransportError>;

    /// Start delivering inbound messages to `handler`. Transports that own
    /// the channel's lifetime cancel `closed` when their stream ends.
    fn register_receive_handler(&self, handler: ReceiveHandler, closed: CancellationToken);

    async fn close(&self);
}

/// Which end of a channel this process holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Controller,
    View,
}

/// The two FIFO paths derived from one channel prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPaths {
    prefix: PathBuf,
}

impl ChannelPaths {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Controller → view.
    pub fn to_view(&self) -> PathBuf {
        self.with_suffix("_in")
    }

    /// View → controller.
    pub fn from_view(&self) -> PathBuf {
        self.with_suffix("_out")
    }

    /// Path this side writes to.
    pub fn outbound(&self, side: Side) -> PathBuf {
        match side {
            Side::Controller => self.to_view(),
            Side::View => self.from_view(),
        }
    }

    /// Path this side reads from.
    pub fn inbound(&self, side: Side) -> PathBuf {
        match side {
            Side::Controller => self.from_view(),
            Side::View => self.to_view(),
        }
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self.prefix.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// Produces collision-free channel prefixes for one process instance.
///
/// `<root>/electrobun_ipc_pipe_<build-hash>_<salt>_<view-id>`: the build hash
/// separates app builds, the random salt separates concurrent processes of
/// the same build, and the view id separates views within a process.
#[derive(Debug, Clone)]
pub struct ChannelNamespace {
    root: PathBuf,
    build_hash: String,
    salt: String,
}

impl ChannelNamespace {
    pub fn new(root: impl Into<PathBuf>, build_hash: impl Into<String>) -> Self {
        Self::with_salt(root, build_hash, random_salt())
    }

    pub fn with_salt(
        root: impl Into<PathBuf>,
        build_hash: impl Into<String>,
        salt: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            build_hash: build_hash.into(),
            salt: salt.into(),
        }
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn paths_for(&self, view_id: ViewId) -> ChannelPaths {
        ChannelPaths::new(self.root.join(format!(
            "{PIPE_NAME_ROOT}_{}_{}_{}",
            self.build_hash,
            self.salt,
            view_id.get()
        )))
    }
}

fn random_salt() -> String {
    use rand::Rng;
    let n: u32 = rand::thread_rng().gen();
    format!("{n:08x}")
}
