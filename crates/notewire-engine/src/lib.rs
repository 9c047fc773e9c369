// Event Pipeline Engine
//
// Wires the pieces together: one Engine owns the event log and a consumer
// task per processor. Emitting an event is an append plus an enqueue and
// returns immediately; the realtime, subscription, and notification
// processors each work through their own queue.
//
// Key design decisions:
// - Queues are unbounded mpsc channels, one per processor, so a slow
//   processor backs up its own queue and nothing else
// - Each consumer is strictly sequential; per-processor ordering matches
//   emit order with no cross-event races inside one processor
// - A processor error is logged and the event is skipped, never retried;
//   the log keeps the full record for later inspection
// - Follow-on events re-enter through EngineHandle, which holds a weak
//   reference so shutdown is never kept alive by its own consumers

pub mod engine;
pub mod processor;
pub mod processors;

pub use engine::{Engine, EngineHandle};
pub use processor::Processor;
pub use processors::{NotificationProcessor, RealtimeProcessor, SubscriptionProcessor};
