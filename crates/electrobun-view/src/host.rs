//! Directives sent to the native UI host.
//!
//! The host renders the views; this crate only tells it what to do. Every
//! directive is fire-and-forget.

use std::sync::Mutex;

use electrobun_common::{Rect, ViewId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::ContentSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostDirective {
    CreateView {
        view_id: ViewId,
        channel_prefix: String,
        secret_key: String,
        host_view_id: Option<ViewId>,
        frame: Rect,
        content: ContentSource,
        auto_resize: bool,
        /// `ws://` address of the socket hub, when one is running.
        socket_url: Option<String>,
    },
    LoadUrl {
        view_id: ViewId,
        url: String,
    },
    LoadHtml {
        view_id: ViewId,
        html: String,
    },
    AddViewToWindow {
        window_id: u32,
        view_id: ViewId,
    },
}

impl HostDirective {
    pub fn view_id(&self) -> ViewId {
        match self {
            Self::CreateView { view_id, .. }
            | Self::LoadUrl { view_id, .. }
            | Self::LoadHtml { view_id, .. }
            | Self::AddViewToWindow { view_id, .. } => *view_id,
        }
    }
}

pub trait NativeHost: Send + Sync {
    fn dispatch(&self, directive: HostDirective);
}

/// Forwards directives over an unbounded channel to whatever drives the
/// real host (an FFI bridge, a test).
pub struct QueueHost {
    tx: mpsc::UnboundedSender<HostDirective>,
}

impl QueueHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostDirective>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NativeHost for QueueHost {
    fn dispatch(&self, directive: HostDirective) {
        let view_id = directive.view_id();
        if self.tx.send(directive).is_err() {
            warn!(%view_id, "native host gone, directive dropped");
        }
    }
}

/// Keeps every directive in memory.
#[derive(Default)]
pub struct RecordingHost {
    directives: Mutex<Vec<HostDirective>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all recorded directives.
    pub fn drain(&self) -> Vec<HostDirective> {
        self.directives
            .lock()
            .map(|mut d| std::mem::take(&mut *d))
            .unwrap_or_default()
    }
}

impl NativeHost for RecordingHost {
    fn dispatch(&self, directive: HostDirective) {
        debug!(view_id = %directive.view_id(), ?directive, "host directive");
        if let Ok(mut directives) = self.directives.lock() {
            directives.push(directive);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn directives_serialize_with_kebab_tags() {
        let d = HostDirective::LoadUrl {
            view_id: ViewId(4),
            url: "https://electrobun.dev".into(),
        };
        assert_eq!(
            serde_json::to_value(&d).unwrap(),
            json!({"type": "load-url", "view_id": 4, "url": "https://electrobun.dev"})
        );

        let d = HostDirective::AddViewToWindow {
            window_id: 1,
            view_id: ViewId(4),
        };
        assert_eq!(serde_json::to_value(&d).unwrap()["type"], "add-view-to-window");
    }

    #[tokio::test]
    async fn queue_host_forwards_in_order() {
        let (host, mut rx) = QueueHost::new();
        host.dispatch(HostDirective::LoadHtml {
            view_id: ViewId(1),
            html: "a".into(),
        });
        host.dispatch(HostDirective::LoadUrl {
            view_id: ViewId(1),
            url: "b".into(),
        });
        assert!(matches!(rx.recv().await, Some(HostDirective::LoadHtml { .. })));
        assert!(matches!(rx.recv().await, Some(HostDirective::LoadUrl { .. })));
    }

    #[test]
    fn queue_host_survives_closed_receiver() {
        let (host, rx) = QueueHost::new();
        drop(rx);
        host.dispatch(HostDirective::LoadUrl {
            view_id: ViewId(1),
            url: "x".into(),
        });
    }

    #[test]
    fn recording_host_drains() {
        let host = RecordingHost::new();
        host.dispatch(HostDirective::LoadUrl {
            view_id: ViewId(2),
            url: "x".into(),
        });
        assert_eq!(host.drain().len(), 1);
        assert!(host.drain().is_empty());
    }
}
