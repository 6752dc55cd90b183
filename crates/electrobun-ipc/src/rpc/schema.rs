//! Typed RPC contracts.
//!
//! A contract is a marker type implementing [`RpcSchema`]. Each operation the
//! side owning that contract handles is a type implementing [`RequestDef`] or
//! [`MessageDef`] with `Schema` set to the contract. Requests and messages
//! live in separate namespaces, and so do the two directions: `"close"` may
//! be a request in one contract and a message in the other.
//!
//! ```
//! use electrobun_ipc::rpc::{MessageDef, RequestDef, RpcSchema};
//!
//! pub enum ControllerOps {}
//! impl RpcSchema for ControllerOps {}
//!
//! pub struct Ping;
//! impl RequestDef for Ping {
//!     type Schema = ControllerOps;
//!     const NAME: &'static str = "ping";
//!     type Params = ();
//!     type Response = String;
//! }
//!
//! pub struct Log;
//! impl MessageDef for Log {
//!     type Schema = ControllerOps;
//!     const NAME: &'static str = "log";
//!     type Payload = String;
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Marker for one direction's set of handled operations.
pub trait RpcSchema: Send + Sync + 'static {}

/// A request that expects a correlated response.
pub trait RequestDef: Send + Sync + 'static {
    /// Contract of the side that handles this request.
    type Schema: RpcSchema;
    const NAME: &'static str;
    type Params: Serialize + DeserializeOwned + Send + 'static;
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

/// A fire-and-forget message.
pub trait MessageDef: Send + Sync + 'static {
    /// Contract of the side that handles this message.
    type Schema: RpcSchema;
    const NAME: &'static str;
    type Payload: Serialize + DeserializeOwned + Send + 'static;
}

/// Contract with no typed operations, for callers that only use the
/// `*_raw` surface.
pub enum Untyped {}

impl RpcSchema for Untyped {}
