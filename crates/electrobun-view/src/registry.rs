use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use electrobun_common::ViewId;
use tracing::debug;

use crate::view::ViewHandle;

/// Live views by id. Cloning shares the same table.
#[derive(Clone, Default)]
pub struct ViewRegistry {
    views: Arc<RwLock<HashMap<ViewId, ViewHandle>>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `view` under the id it was created with.
    pub fn register(&self, view: ViewHandle) -> ViewId {
        let id = view.id();
        if let Ok(mut views) = self.views.write() {
            views.insert(id, view);
        }
        debug!(view_id = %id, "view registered");
        id
    }

    pub fn lookup(&self, id: ViewId) -> Option<ViewHandle> {
        self.views.read().ok()?.get(&id).cloned()
    }

    /// Snapshot of every live view, in no particular order.
    pub fn list_all(&self) -> Vec<ViewHandle> {
        self.views
            .read()
            .map(|views| views.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn remove(&self, id: ViewId) -> Option<ViewHandle> {
        let removed = self.views.write().ok()?.remove(&id);
        if removed.is_some() {
            debug!(view_id = %id, "view unregistered");
        }
        removed
    }

    /// Remove and return every view.
    pub fn clear(&self) -> Vec<ViewHandle> {
        self.views
            .write()
            .map(|mut views| views.drain().map(|(_, v)| v).collect())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.views.read().map(|views| views.len()).unwrap_or(0)
    }
}
