//! Caches for the three recoverable AMQP resources.
//!
//! ```text
//! ConnectionCache ──► connection
//!                       ├─► SessionCache ──► session "cbs", session "mgmt", ...
//!                       └─► ChannelCache ──► RequestResponseChannel (sender + receiver)
//! ```
//!
//! Each wraps the generic [`RecoverableCache`](crate::RecoverableCache) or
//! [`KeyedRecoverableCache`](crate::KeyedRecoverableCache) and only adds
//! identity, naming and the resource-specific terminated message.

mod channel;
mod connection;
mod context;
mod session;

pub use channel::{ChannelCache, RequestResponseChannel};
pub use connection::ConnectionCache;
pub use context::ResourceContext;
pub use session::SessionCache;
