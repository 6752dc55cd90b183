pub mod errors;
pub mod events;
pub mod id;
pub mod types;

pub use errors::{ConfigError, ElectrobunError, RpcError, TransportError, ViewError};
pub use events::{Event, EventBus, HandlerId};
pub use id::{next_view_id, ViewId};
pub use types::Rect;

pub type Result<T> = std::result::Result<T, ElectrobunError>;
