// Domain-Event Fan-out Core
//
// This crate holds the backend-agnostic half of the notewire engine: the
// event model, the channel topology and notification resolution algorithms,
// and the trait seams everything else plugs into.
//
// Key design decisions:
// - The mutation kinds are a closed enum (EventPayload), matched
//   exhaustively by the topology resolver; an unrouted kind cannot compile
// - All collaborators are injected traits (PermissionOracle, EntityStore,
//   ViewStore, Mailer, SubscriptionStore, NotificationStore, EventLog)
// - Access questions are asked live at processing time, never cached
// - Absence is Ok(None)/empty, never an error; events race deletions
// - Per-candidate failures are logged and skipped, batches keep going
// - In-memory implementations of every seam live here for tests and
//   standalone embedding; Postgres implementations live in notewire-storage

// Domain model
pub mod channel;
pub mod entities;
pub mod event;

pub mod config;
pub mod error;
pub mod traits;

// Resolution algorithms
pub mod recipients;
pub mod subscriptions;
pub mod topology;

// In-memory implementations for tests and standalone use
pub mod memory;

// Re-exports for convenience
pub use channel::Channel;
pub use config::NotifyPolicy;
pub use entities::{
    Collection, CollectionPermission, Document, Group, NotificationSetting, SentNotification,
    Subscription, User,
};
pub use error::{EngineError, Result};
pub use event::{Event, EventPayload};
pub use recipients::RecipientResolver;
pub use subscriptions::SubscriptionManager;
pub use topology::{ControlAction, ControlDirective, RoutePlan, TopologyResolver};
pub use traits::{
    EntityStore, EventLog, MailKind, Mailer, NotificationStore, PermissionOracle, StoredEvent,
    SubscriptionStore, ViewStore,
};
