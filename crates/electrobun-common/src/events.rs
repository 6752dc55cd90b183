//! Process-wide named event bus.
//!
//! Listeners register by event name. Per-view scoping is done by the caller
//! composing the name (e.g. `will-navigate-3`); the bus itself only matches
//! names exactly. Async consumers can also `subscribe` to every event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

type Handler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data: serde_json::Value,
}

/// Token returned by [`EventBus::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<(HandlerId, Handler)>>>>,
    next_handler: Arc<AtomicU64>,
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            next_handler: Arc::new(AtomicU64::new(1)),
            sender,
        }
    }

    /// Register a listener for `name`.
    pub fn on<F>(&self, name: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut map) = self.handlers.write() {
            map.entry(name.into())
                .or_default()
                .push((id, Arc::new(handler)));
        }
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&self, id: HandlerId) -> bool {
        let Ok(mut map) = self.handlers.write() else {
            return false;
        };
        let mut removed = false;
        map.retain(|_, list| {
            let before = list.len();
            list.retain(|(hid, _)| *hid != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Deliver an event to the listeners of `name` and to broadcast
    /// subscribers. Returns how many named listeners ran.
    pub fn emit(&self, name: &str, data: serde_json::Value) -> usize {
        // Snapshot so handlers may call back into the bus.
        let handlers: Vec<Handler> = match self.handlers.read() {
            Ok(map) => map
                .get(name)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        for handler in &handlers {
            handler(&data);
        }

        tracing::trace!(event = name, listeners = handlers.len(), "event emitted");
        let _ = self.sender.send(Event {
            name: name.to_string(),
            data,
        });
        handlers.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of listeners registered under `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.handlers
            .read()
            .map(|map| map.get(name).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emit_reaches_named_listener() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on("did-navigate-1", move |data| {
            sink.lock().unwrap().push(data.clone());
        });

        let ran = bus.emit("did-navigate-1", serde_json::json!({"url": "https://a.test"}));
        assert_eq!(ran, 1);
        assert_eq!(seen.lock().unwrap()[0]["url"], "https://a.test");
    }

    #[test]
    fn emit_does_not_cross_names() {
        let bus = EventBus::default();
        let hits = Arc::new(Mutex::new(0));
        let h = Arc::clone(&hits);
        bus.on("dom-ready-1", move |_| *h.lock().unwrap() += 1);

        assert_eq!(bus.emit("dom-ready-2", serde_json::Value::Null), 0);
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn off_removes_listener() {
        let bus = EventBus::default();
        let id = bus.on("will-navigate-4", |_| {});
        assert_eq!(bus.listener_count("will-navigate-4"), 1);
        assert!(bus.off(id));
        assert_eq!(bus.listener_count("will-navigate-4"), 0);
        assert!(!bus.off(id));
    }

    #[test]
    fn handler_can_reenter_bus() {
        let bus = EventBus::default();
        let inner = bus.clone();
        bus.on("outer", move |_| {
            inner.emit("inner", serde_json::Value::Null);
        });
        assert_eq!(bus.emit("outer", serde_json::Value::Null), 1);
    }

    #[tokio::test]
    async fn subscribers_see_every_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit("dom-ready-9", serde_json::json!(true));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "dom-ready-9");
        assert_eq!(event.data, serde_json::json!(true));
    }

    #[test]
    fn emit_with_no_listeners_returns_zero() {
        let bus = EventBus::new(16);
        assert_eq!(bus.emit("nothing", serde_json::Value::Null), 0);
    }
}
