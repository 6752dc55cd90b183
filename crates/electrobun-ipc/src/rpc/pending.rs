use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use electrobun_common::RpcError;
use serde_json::Value;
use tokio::sync::oneshot;

pub(crate) type Outcome = Result<Value, RpcError>;

struct Entry {
    name: String,
    reply: oneshot::Sender<Outcome>,
}

/// Outstanding requests keyed by correlation id.
///
/// Ids start at 1, increase monotonically and wrap; an id still in use is
/// skipped rather than reissued.
#[derive(Default)]
pub(crate) struct PendingRequests {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, Entry>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for `name` and return it with the receiving half of the
    /// reply slot.
    pub fn insert(&self, name: &str) -> (u64, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.lock();
        let id = loop {
            let candidate = self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if candidate != 0 && !entries.contains_key(&candidate) {
                break candidate;
            }
        };
        entries.insert(
            id,
            Entry {
                name: name.to_owned(),
                reply: tx,
            },
        );
        (id, rx)
    }

    /// Settle request `id`. Returns the request's name, or `None` when no
    /// such request is pending (already settled, timed out, or never sent).
    pub fn resolve(&self, id: u64, outcome: Outcome) -> Option<String> {
        let entry = self.lock().remove(&id)?;
        // The caller may have stopped waiting; nothing to do then.
        let _ = entry.reply.send(outcome);
        Some(entry.name)
    }

    pub fn remove(&self, id: u64) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Settle every pending request with an error built by `error`.
    pub fn fail_all(&self, error: impl Fn(&str) -> RpcError) -> usize {
        let drained: Vec<Entry> = self.lock().drain().map(|(_, e)| e).collect();
        let count = drained.len();
        for entry in drained {
            let _ = entry.reply.send(Err(error(&entry.name)));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Entry>> {
        // The map holds no invariants a panicking holder could break.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Removes its entry when dropped, so a caller that gives up (timeout,
/// cancelled future) never leaves a stale slot behind.
pub(crate) struct PendingGuard {
    pending: Arc<PendingRequests>,
    id: u64,
}

impl PendingGuard {
    pub fn new(pending: Arc<PendingRequests>, id: u64) -> Self {
        Self { pending, id }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_start_at_one_and_increase() {
        let p = PendingRequests::new();
        let (a, _ra) = p.insert("a");
        let (b, _rb) = p.insert("b");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn ids_in_use_are_skipped_after_wrap() {
        let p = PendingRequests::new();
        let (first, _r) = p.insert("held");
        assert_eq!(first, 1);
        // Next fetch_add yields u64::MAX, then wraps through 0 to 1.
        p.next_id.store(u64::MAX - 1, Ordering::Relaxed);
        let (a, _ra) = p.insert("a");
        let (b, _rb) = p.insert("b");
        assert_eq!(a, u64::MAX);
        assert_eq!(b, 2);
    }

    #[tokio::test]
    async fn resolve_delivers_once() {
        let p = PendingRequests::new();
        let (id, rx) = p.insert("ping");
        assert_eq!(p.resolve(id, Ok(json!("pong"))).as_deref(), Some("ping"));
        assert_eq!(rx.await.unwrap().unwrap(), json!("pong"));
        assert!(p.resolve(id, Ok(json!("late"))).is_none());
        assert_eq!(p.len(), 0);
    }

    #[tokio::test]
    async fn fail_all_settles_everything() {
        let p = PendingRequests::new();
        let (_, r1) = p.insert("a");
        let (_, r2) = p.insert("b");
        assert_eq!(p.fail_all(|_| RpcError::ChannelClosed), 2);
        assert!(matches!(r1.await.unwrap(), Err(RpcError::ChannelClosed)));
        assert!(matches!(r2.await.unwrap(), Err(RpcError::ChannelClosed)));
        assert_eq!(p.len(), 0);
    }

    #[test]
    fn guard_removes_entry() {
        let p = Arc::new(PendingRequests::new());
        let (id, _rx) = p.insert("x");
        drop(PendingGuard::new(Arc::clone(&p), id));
        assert_eq!(p.len(), 0);
    }
}
