//! Typed request/response and fire-and-forget messaging on top of a
//! [`TransportManager`](crate::transport::TransportManager).
//!
//! Wire envelope, one JSON object per message:
//!
//! ```text
//! {"kind":"request","id":1,"name":"ping","params":null}
//! {"kind":"response","id":1,"result":"pong"}
//! {"kind":"response","id":2,"error":"no handler registered for request 'x'"}
//! {"kind":"message","name":"log","payload":"hello"}
//! ```

mod dispatcher;
pub mod packet;
mod pending;
pub mod schema;

#[cfg(test)]
mod tests;

pub use dispatcher::Rpc;
pub use packet::Packet;
pub use schema::{MessageDef, RequestDef, RpcSchema, Untyped};
