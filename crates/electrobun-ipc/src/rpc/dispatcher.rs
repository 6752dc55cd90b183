//! Request/response correlation and handler dispatch over one channel.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use electrobun_common::{RpcError, TransportError};
use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use super::packet::{self, Packet};
use super::pending::{PendingGuard, PendingRequests};
use super::schema::{MessageDef, RequestDef, RpcSchema};
use crate::transport::TransportManager;

type RequestHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;
type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;
type WildcardHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

struct RpcInner {
    transport: Arc<TransportManager>,
    pending: Arc<PendingRequests>,
    max_request_time: Duration,
    request_handlers: RwLock<HashMap<String, RequestHandler>>,
    message_handlers: RwLock<HashMap<String, MessageHandler>>,
    wildcard: RwLock<Option<WildcardHandler>>,
}

/// RPC endpoint for one peer relationship.
///
/// `L` is the contract this side handles, `R` the contract the peer
/// handles. Requests and messages can only be sent for operations in `R` and
/// handlers can only be registered for operations in `L`; the untyped
/// `*_raw` methods bypass both checks.
///
/// Clones share the same pending table and handler maps.
pub struct Rpc<L: RpcSchema, R: RpcSchema> {
    inner: Arc<RpcInner>,
    _schemas: PhantomData<fn() -> (L, R)>,
}

impl<L: RpcSchema, R: RpcSchema> Clone for Rpc<L, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _schemas: PhantomData,
        }
    }
}

impl<L: RpcSchema, R: RpcSchema> Rpc<L, R> {
    /// Take over `transport`'s inbound stream. Requests that get no response
    /// within `max_request_time` fail with [`RpcError::Timeout`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(transport: Arc<TransportManager>, max_request_time: Duration) -> Self {
        let inner = Arc::new(RpcInner {
            transport: Arc::clone(&transport),
            pending: Arc::new(PendingRequests::new()),
            max_request_time,
            request_handlers: RwLock::new(HashMap::new()),
            message_handlers: RwLock::new(HashMap::new()),
            wildcard: RwLock::new(None),
        });

        let weak: Weak<RpcInner> = Arc::downgrade(&inner);
        transport.register_receive_handler(move |value| {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch(value);
            }
        });

        let weak = Arc::downgrade(&inner);
        let closed = transport.closed_token();
        tokio::spawn(async move {
            closed.cancelled().await;
            if let Some(inner) = weak.upgrade() {
                let failed = inner.pending.fail_all(|_| RpcError::ChannelClosed);
                if failed > 0 {
                    debug!(
                        view_id = %inner.transport.view_id(),
                        failed,
                        "channel closed with requests in flight"
                    );
                }
            }
        });

        Self {
            inner,
            _schemas: PhantomData,
        }
    }

    pub fn transport(&self) -> &Arc<TransportManager> {
        &self.inner.transport
    }

    pub fn max_request_time(&self) -> Duration {
        self.inner.max_request_time
    }

    /// Requests sent and not yet settled.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    // -- outbound -----------------------------------------------------------

    pub async fn request<Q>(&self, params: Q::Params) -> Result<Q::Response, RpcError>
    where
        Q: RequestDef<Schema = R>,
    {
        self.request_with_timeout::<Q>(params, self.inner.max_request_time)
            .await
    }

    pub async fn request_with_timeout<Q>(
        &self,
        params: Q::Params,
        timeout: Duration,
    ) -> Result<Q::Response, RpcError>
    where
        Q: RequestDef<Schema = R>,
    {
        let params = serde_json::to_value(params).map_err(|e| {
            warn!(request = Q::NAME, error = %e, "request params failed to serialize");
            TransportError::from(e)
        })?;
        let value = self.request_raw_with_timeout(Q::NAME, params, timeout).await?;
        serde_json::from_value(value).map_err(|source| RpcError::Decode {
            name: Q::NAME.to_owned(),
            source,
        })
    }

    /// Fire-and-forget. Delivery failures are logged, never returned.
    pub async fn send<M>(&self, payload: M::Payload)
    where
        M: MessageDef<Schema = R>,
    {
        match serde_json::to_value(payload) {
            Ok(payload) => self.send_raw(M::NAME, payload).await,
            Err(e) => warn!(op = M::NAME, error = %e, "dropping message that failed to serialize"),
        }
    }

    pub async fn request_raw(&self, name: &str, params: Value) -> Result<Value, RpcError> {
        self.request_raw_with_timeout(name, params, self.inner.max_request_time)
            .await
    }

    pub async fn request_raw_with_timeout(
        &self,
        name: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        let (id, reply) = self.inner.pending.insert(name);
        let _guard = PendingGuard::new(Arc::clone(&self.inner.pending), id);

        // The close watcher cancels before draining, so anything inserted
        // after the drain sees the token already cancelled.
        if self.inner.transport.is_closed() {
            return Err(RpcError::ChannelClosed);
        }

        let packet = Packet::Request {
            id,
            name: name.to_owned(),
            params,
        };
        debug!(view_id = %self.inner.transport.view_id(), id, request = name, "sending request");

        let exchange = async {
            match self.inner.transport.send(&packet).await {
                // A dropped sender means the table was torn down.
                Ok(()) => reply.await.unwrap_or(Err(RpcError::ChannelClosed)),
                Err(e) => Err(RpcError::from(e)),
            }
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    view_id = %self.inner.transport.view_id(),
                    id,
                    request = name,
                    ?timeout,
                    "request timed out"
                );
                Err(RpcError::Timeout {
                    name: name.to_owned(),
                    after: timeout,
                })
            }
        }
    }

    pub async fn send_raw(&self, name: &str, payload: Value) {
        let packet = Packet::Message {
            name: name.to_owned(),
            payload,
        };
        if let Err(e) = self.inner.transport.send(&packet).await {
            debug!(view_id = %self.inner.transport.view_id(), op = name, error = %e, "message not delivered");
        }
    }

    // -- handlers -----------------------------------------------------------

    /// Answer requests for `Q`. A handler error is reported to the peer as a
    /// remote error carrying its `Display` text.
    pub fn handle_request<Q, F, Fut, E>(&self, handler: F)
    where
        Q: RequestDef<Schema = L>,
        F: Fn(Q::Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Q::Response, E>> + Send + 'static,
        E: Display,
    {
        self.handle_request_raw(Q::NAME, move |params: Value| {
            let call = serde_json::from_value::<Q::Params>(params).map(&handler);
            async move {
                let pending = call.map_err(|source| {
                    RpcError::Decode {
                        name: Q::NAME.to_owned(),
                        source,
                    }
                    .to_string()
                })?;
                let response = pending.await.map_err(|e| e.to_string())?;
                serde_json::to_value(response).map_err(|e| e.to_string())
            }
        });
    }

    pub fn handle_request_raw<F, Fut, E>(&self, name: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: Display,
    {
        let handler: RequestHandler = Arc::new(move |params| -> BoxFuture<'static, Result<Value, String>> {
            let fut = handler(params);
            Box::pin(async move { fut.await.map_err(|e| e.to_string()) })
        });
        let replaced = write_lock(&self.inner.request_handlers)
            .insert(name.to_owned(), handler)
            .is_some();
        if replaced {
            debug!(request = name, "request handler replaced");
        }
    }

    /// Handle messages for `M`. Payloads that do not decode as
    /// `M::Payload` are logged and skipped.
    pub fn on_message<M, F>(&self, handler: F)
    where
        M: MessageDef<Schema = L>,
        F: Fn(M::Payload) + Send + Sync + 'static,
    {
        self.on_message_raw(M::NAME, move |payload| {
            match serde_json::from_value::<M::Payload>(payload) {
                Ok(payload) => handler(payload),
                Err(e) => warn!(op = M::NAME, error = %e, "discarding undecodable message payload"),
            }
        });
    }

    pub fn on_message_raw<F>(&self, name: &str, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        write_lock(&self.inner.message_handlers).insert(name.to_owned(), Arc::new(handler));
    }

    /// Observe every inbound message, before its name-specific handler.
    pub fn on_any_message<F>(&self, handler: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        *write_lock(&self.inner.wildcard) = Some(Arc::new(handler));
    }
}

impl RpcInner {
    fn dispatch(&self, value: Value) {
        let packet: Packet = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => {
                warn!(view_id = %self.transport.view_id(), error = %e, "discarding unrecognized packet");
                return;
            }
        };

        match packet {
            Packet::Request { id, name, params } => self.answer(id, name, params),
            Packet::Response { id, result, error } => {
                let outcome = packet::outcome(result, error).map_err(RpcError::Remote);
                match self.pending.resolve(id, outcome) {
                    Some(name) => debug!(view_id = %self.transport.view_id(), id, request = %name, "response received"),
                    None => warn!(
                        view_id = %self.transport.view_id(),
                        id,
                        "discarding response for unknown or expired request"
                    ),
                }
            }
            Packet::Message { name, payload } => self.deliver(&name, payload),
        }
    }

    fn answer(&self, id: u64, name: String, params: Value) {
        let handler = read_lock(&self.request_handlers).get(&name).cloned();
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            let outcome = match handler {
                Some(handler) => handler(params).await,
                None => {
                    warn!(view_id = %transport.view_id(), id, request = %name, "no handler for request");
                    Err(RpcError::MissingHandler(name.clone()).to_string())
                }
            };
            if let Err(e) = transport.send(&Packet::response(id, outcome)).await {
                warn!(view_id = %transport.view_id(), id, request = %name, error = %e, "failed to send response");
            }
        });
    }

    fn deliver(&self, name: &str, payload: Value) {
        let wildcard = read_lock(&self.wildcard).clone();
        if let Some(wildcard) = wildcard {
            wildcard(name, &payload);
        }

        let handler = read_lock(&self.message_handlers).get(name).cloned();
        match handler {
            Some(handler) => handler(payload),
            None => debug!(view_id = %self.transport.view_id(), op = name, "no handler for message"),
        }
    }
}

// Handler maps stay consistent even if a holder panicked mid-insert.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
