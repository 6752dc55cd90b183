//! Process-wide view lifecycle: creation, lookup, teardown.

use std::sync::Arc;
use std::time::Duration;

use electrobun_common::{EventBus, TransportError, ViewError, ViewId};
use electrobun_config::ElectrobunConfig;
use electrobun_ipc::transport::{ChannelNamespace, SocketHub, SocketTransport, Transport};
use electrobun_ipc::RpcSchema;
use tracing::{info, warn};

use crate::events::NavigationEvent;
use crate::host::{HostDirective, NativeHost};
use crate::registry::ViewRegistry;
use crate::view::ViewHandle;

/// Shared state for every view in the process.
///
/// Owns the registry, the event bus and the channel namespace, and holds the
/// socket hub if one is running. Cloning shares all of it.
#[derive(Clone)]
pub struct ViewContext {
    registry: ViewRegistry,
    host: Arc<dyn NativeHost>,
    events: EventBus,
    namespace: ChannelNamespace,
    hub: Option<SocketHub>,
    max_request_time: Duration,
}

impl ViewContext {
    /// A context with no socket hub; every view talks over its pipe pair.
    pub fn new(namespace: ChannelNamespace, host: Arc<dyn NativeHost>) -> Self {
        Self {
            registry: ViewRegistry::new(),
            host,
            events: EventBus::default(),
            namespace,
            hub: None,
            max_request_time: Duration::from_millis(1000),
        }
    }

    /// Build a context from config, binding the socket hub when enabled.
    pub async fn from_config(
        config: &ElectrobunConfig,
        host: Arc<dyn NativeHost>,
    ) -> Result<Self, TransportError> {
        let namespace = ChannelNamespace::new(
            config.channel.resolved_pipe_dir(),
            config.channel.resolved_build_hash(),
        );
        let mut ctx = Self::new(namespace, host).with_max_request_time(config.rpc.max_request_time());
        if config.socket.enabled {
            ctx.hub = Some(SocketHub::bind(&config.socket.bind_addr()).await?);
        }
        Ok(ctx)
    }

    pub fn with_socket_hub(mut self, hub: SocketHub) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn with_max_request_time(mut self, max: Duration) -> Self {
        self.max_request_time = max;
        self
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn namespace(&self) -> &ChannelNamespace {
        &self.namespace
    }

    pub fn hub(&self) -> Option<&SocketHub> {
        self.hub.as_ref()
    }

    pub fn max_request_time(&self) -> Duration {
        self.max_request_time
    }

    pub fn lookup(&self, id: ViewId) -> Option<ViewHandle> {
        self.registry.lookup(id)
    }

    pub fn views(&self) -> Vec<ViewHandle> {
        self.registry.list_all()
    }

    /// Attach an existing view to a native window.
    pub fn add_view_to_window(&self, window_id: u32, view_id: ViewId) -> Result<(), ViewError> {
        if self.registry.lookup(view_id).is_none() {
            return Err(ViewError::NotFound(view_id));
        }
        self.host.dispatch(HostDirective::AddViewToWindow { window_id, view_id });
        Ok(())
    }

    /// Publish a navigation event for `view_id` on the bus. Returns how many
    /// listeners ran.
    pub fn emit_navigation(
        &self,
        view_id: ViewId,
        event: NavigationEvent,
        payload: serde_json::Value,
    ) -> usize {
        self.events.emit(&event.scoped(view_id), payload)
    }

    /// Close a view's channel and forget it.
    pub async fn destroy(&self, id: ViewId) -> Result<(), ViewError> {
        let view = self.registry.remove(id).ok_or(ViewError::NotFound(id))?;
        view.close().await;
        info!(view_id = %id, "view destroyed");
        Ok(())
    }

    /// Destroy every view and stop the socket hub.
    pub async fn shutdown(&self) {
        let views = self.registry.clear();
        let count = views.len();
        for view in views {
            view.close().await;
        }
        if let Some(hub) = &self.hub {
            hub.shutdown();
        }
        info!(count, "all views destroyed");
    }

    fn socket_for(&self, id: ViewId, key: &str) -> Option<Arc<dyn Transport>> {
        self.hub
            .as_ref()
            .map(|hub| Arc::new(SocketTransport::new(hub.clone(), id, key)) as Arc<dyn Transport>)
    }
}

#[cfg(unix)]
mod create {
    use super::*;

    use electrobun_common::next_view_id;
    use electrobun_ipc::transport::Side;
    use electrobun_ipc::{Rpc, TransportManager};

    use crate::secret::SecretKey;
    use crate::types::ViewOptions;
    use crate::view::{BrowserView, ViewParts};

    impl ViewContext {
        /// Create a view: allocate its id and channel, bind its dispatcher,
        /// register it and tell the native host to show it.
        ///
        /// A channel that cannot be set up fails this view only.
        pub async fn create_view<L, R>(&self, options: ViewOptions) -> Result<BrowserView<L, R>, ViewError>
        where
            L: RpcSchema,
            R: RpcSchema,
        {
            let id = next_view_id();
            let secret = SecretKey::generate();
            let key = secret.to_base64();
            let paths = self.namespace.paths_for(id);
            let socket = self.socket_for(id, &key);

            let transport = match TransportManager::open(id, &paths, Side::Controller, socket).await {
                Ok(t) => Arc::new(t),
                Err(e) => {
                    warn!(view_id = %id, error = %e, "view channel setup failed");
                    if let Some(hub) = &self.hub {
                        hub.revoke(id);
                    }
                    return Err(ViewError::Setup(e));
                }
            };
            let rpc = Rpc::bind(Arc::clone(&transport), self.max_request_time);

            let handle = ViewHandle::new(ViewParts {
                id,
                host_view_id: options.host_view_id,
                secret,
                paths: paths.clone(),
                frame: options.frame,
                auto_resize: options.auto_resize,
                content: options.content.clone(),
                transport,
                host: Arc::clone(&self.host),
                events: self.events.clone(),
            });
            self.registry.register(handle.clone());

            self.host.dispatch(HostDirective::CreateView {
                view_id: id,
                channel_prefix: paths.prefix().display().to_string(),
                secret_key: key,
                host_view_id: options.host_view_id,
                frame: options.frame,
                content: options.content,
                auto_resize: options.auto_resize,
                socket_url: self.hub.as_ref().and_then(SocketHub::url),
            });
            if let Some(window_id) = options.window_id {
                self.host.dispatch(HostDirective::AddViewToWindow { window_id, view_id: id });
            }

            info!(view_id = %id, prefix = %paths.prefix().display(), "view created");
            Ok(BrowserView::new(handle, rpc))
        }
    }
}
