//! Wire layer between the controller and its views: line-delimited JSON
//! framing, the pipe and socket transports, and the RPC dispatcher that runs
//! on top of them.

pub mod codec;
pub mod rpc;
pub mod transport;

pub use codec::{EncodedMessage, JsonLineCodec, CHUNK_SIZE};
pub use rpc::{MessageDef, RequestDef, Rpc, RpcSchema, Untyped};
pub use transport::{
    ChannelNamespace, ChannelPaths, Side, SocketHub, SocketTransport, Transport, TransportKind,
    TransportManager,
};
