//! What the peer answers.

use std::convert::Infallible;

use electrobun_ipc::{Rpc, Untyped};
use serde_json::Value;
use tracing::info;

pub type PeerRpc = Rpc<Untyped, Untyped>;

/// `ping` → `"pong"`, `echo` → its params, every message logged.
pub fn install(rpc: &PeerRpc) {
    rpc.handle_request_raw("ping", |_params: Value| async {
        Ok::<_, Infallible>(Value::String("pong".into()))
    });
    rpc.handle_request_raw("echo", |params: Value| async move { Ok::<_, Infallible>(params) });
    rpc.on_any_message(|name, payload| {
        info!(message_name = name, %payload, "message received");
    });
}
