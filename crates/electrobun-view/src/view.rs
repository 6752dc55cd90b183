use std::sync::{Arc, RwLock};

use electrobun_common::{EventBus, HandlerId, Rect, ViewId};
use electrobun_ipc::transport::ChannelPaths;
use electrobun_ipc::{Rpc, RpcSchema, TransportManager};
use tracing::debug;

use crate::events::NavigationEvent;
use crate::host::{HostDirective, NativeHost};
use crate::secret::SecretKey;
use crate::types::ContentSource;

struct ViewState {
    id: ViewId,
    host_view_id: Option<ViewId>,
    secret: SecretKey,
    paths: ChannelPaths,
    frame: Rect,
    auto_resize: bool,
    content: RwLock<ContentSource>,
    transport: Arc<TransportManager>,
    host: Arc<dyn NativeHost>,
    events: EventBus,
}

/// Untyped, cheaply cloneable reference to a live view. This is what the
/// registry stores.
#[derive(Clone)]
pub struct ViewHandle {
    state: Arc<ViewState>,
}

pub(crate) struct ViewParts {
    pub id: ViewId,
    pub host_view_id: Option<ViewId>,
    pub secret: SecretKey,
    pub paths: ChannelPaths,
    pub frame: Rect,
    pub auto_resize: bool,
    pub content: ContentSource,
    pub transport: Arc<TransportManager>,
    pub host: Arc<dyn NativeHost>,
    pub events: EventBus,
}

impl ViewHandle {
    pub(crate) fn new(parts: ViewParts) -> Self {
        Self {
            state: Arc::new(ViewState {
                id: parts.id,
                host_view_id: parts.host_view_id,
                secret: parts.secret,
                paths: parts.paths,
                frame: parts.frame,
                auto_resize: parts.auto_resize,
                content: RwLock::new(parts.content),
                transport: parts.transport,
                host: parts.host,
                events: parts.events,
            }),
        }
    }

    pub fn id(&self) -> ViewId {
        self.state.id
    }

    pub fn host_view_id(&self) -> Option<ViewId> {
        self.state.host_view_id
    }

    pub fn secret(&self) -> &SecretKey {
        &self.state.secret
    }

    pub fn channel_paths(&self) -> &ChannelPaths {
        &self.state.paths
    }

    pub fn frame(&self) -> Rect {
        self.state.frame
    }

    pub fn auto_resize(&self) -> bool {
        self.state.auto_resize
    }

    pub fn content(&self) -> ContentSource {
        self.state
            .content
            .read()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn transport(&self) -> &Arc<TransportManager> {
        &self.state.transport
    }

    /// Navigate to `url`. Any inline HTML is superseded.
    pub fn load_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.set_content(ContentSource::Url(url.clone()));
        debug!(view_id = %self.id(), %url, "load url");
        self.state.host.dispatch(HostDirective::LoadUrl {
            view_id: self.id(),
            url,
        });
    }

    /// Render `html` inline. Any URL is superseded.
    pub fn load_html(&self, html: impl Into<String>) {
        let html = html.into();
        self.set_content(ContentSource::Html(html.clone()));
        debug!(view_id = %self.id(), bytes = html.len(), "load html");
        self.state.host.dispatch(HostDirective::LoadHtml {
            view_id: self.id(),
            html,
        });
    }

    /// Listen for `event` on this view only.
    pub fn on<F>(&self, event: NavigationEvent, handler: F) -> HandlerId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.state.events.on(event.scoped(self.id()), handler)
    }

    pub fn off(&self, handler: HandlerId) -> bool {
        self.state.events.off(handler)
    }

    pub(crate) async fn close(&self) {
        self.state.transport.close().await;
    }

    fn set_content(&self, content: ContentSource) {
        if let Ok(mut current) = self.state.content.write() {
            *current = content;
        }
    }
}

impl std::fmt::Debug for ViewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewHandle")
            .field("id", &self.state.id)
            .field("host_view_id", &self.state.host_view_id)
            .field("prefix", &self.state.paths.prefix())
            .finish_non_exhaustive()
    }
}

/// A view together with its typed RPC endpoint.
///
/// `L` is what the controller handles, `R` what the view handles.
pub struct BrowserView<L: RpcSchema, R: RpcSchema> {
    handle: ViewHandle,
    rpc: Rpc<L, R>,
}

impl<L: RpcSchema, R: RpcSchema> std::fmt::Debug for BrowserView<L, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserView")
            .field("id", &self.handle.id())
            .finish_non_exhaustive()
    }
}

impl<L: RpcSchema, R: RpcSchema> BrowserView<L, R> {
    pub(crate) fn new(handle: ViewHandle, rpc: Rpc<L, R>) -> Self {
        Self { handle, rpc }
    }

    pub fn id(&self) -> ViewId {
        self.handle.id()
    }

    pub fn handle(&self) -> &ViewHandle {
        &self.handle
    }

    pub fn rpc(&self) -> &Rpc<L, R> {
        &self.rpc
    }

    pub fn load_url(&self, url: impl Into<String>) {
        self.handle.load_url(url);
    }

    pub fn load_html(&self, html: impl Into<String>) {
        self.handle.load_html(html);
    }

    pub fn on<F>(&self, event: NavigationEvent, handler: F) -> HandlerId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.handle.on(event, handler)
    }
}

impl<L: RpcSchema, R: RpcSchema> Clone for BrowserView<L, R> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            rpc: self.rpc.clone(),
        }
    }
}
