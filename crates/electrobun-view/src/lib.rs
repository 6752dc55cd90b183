//! View lifecycle for Electrobun.
//!
//! A [`ViewContext`] creates views: each gets a process-unique id, a secret
//! key, a pipe channel (plus a socket slot when the hub runs) and a typed RPC
//! dispatcher, and the native host is told to render it. Navigation events
//! reach listeners through the context's event bus, scoped per view.

pub mod context;
pub mod events;
pub mod host;
pub mod registry;
pub mod secret;
pub mod types;
pub mod view;


pub use context::ViewContext;
pub use events::NavigationEvent;
pub use host::{HostDirective, NativeHost, QueueHost, RecordingHost};
pub use registry::ViewRegistry;
pub use secret::SecretKey;
pub use types::{ContentSource, ViewOptions};
pub use view::{BrowserView, ViewHandle};
