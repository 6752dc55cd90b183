use std::path::PathBuf;
use std::time::Duration;

use crate::id::ViewId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Errors raised below the RPC layer: channel setup, framing, delivery.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to create channel {path}: {source}")]
    ChannelSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no socket connected for {0}")]
    SocketUnavailable(ViewId),

    #[error("socket handshake failed: {0}")]
    Handshake(String),

    #[error("channel closed")]
    Closed,
}

/// Errors surfaced to callers of the RPC dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("request '{name}' timed out after {after:?}")]
    Timeout { name: String, after: Duration },

    #[error("remote error: {0}")]
    Remote(String),

    #[error("no handler registered for request '{0}'")]
    MissingHandler(String),

    #[error("invalid payload for '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("channel closed before a response arrived")]
    ChannelClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("view setup failed: {0}")]
    Setup(#[from] TransportError),

    #[error("unknown view: {0}")]
    NotFound(ViewId),
}

#[derive(Debug, thiserror::Error)]
pub enum ElectrobunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
