// Real-time Fan-out
//
// Delivers event payloads and join/leave controls to live connections.
//
// Key design decisions:
// - The dispatcher depends on a ConnectionRegistry trait, injected at
//   construction; nothing here is a process-global
// - LocalRegistry is the in-process implementation: one unbounded sender
//   and one channel set per connection, registered on accept
// - Overlapping channel lists deliver at most once per connection
// - Delivery is best-effort; clients resync through a pull path on
//   reconnect, so a dropped receiver is an eviction, not an error

pub mod dispatcher;
pub mod frame;
pub mod local;
pub mod registry;

// Re-exports for convenience
pub use dispatcher::Dispatcher;
pub use frame::Frame;
pub use local::{ConnectionId, LocalRegistry};
pub use registry::ConnectionRegistry;
