// Collaborator seams for pluggable backends
//
// Everything this subsystem consumes from the host application sits behind
// one of these traits:
// - In-memory implementations (memory.rs) for tests and standalone use
// - Postgres implementations (notewire-storage) for the rows we own
// - The host application's adapters for everything else
//
// Two conventions hold across all of them:
// - Absence is Ok(None) / an empty Vec, never an error. Events race
//   deletions, so "the row vanished" is an expected answer.
// - Answers reflect state at call time. The oracle in particular must not
//   be cached; access checks are deliberately re-run at dispatch and at
//   send time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{
    Collection, Document, Group, NotificationSetting, SentNotification, Subscription, User,
};
use crate::error::Result;
use crate::event::Event;

// ============================================================================
// PermissionOracle - Live access-control queries
// ============================================================================

/// Access-control query surface of the host application.
///
/// Every answer is the truth at the instant of the call. The broader
/// oracle also answers manage-level queries, but no operation in this
/// subsystem consults them, so the seam stays narrow.
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    /// Can `user_id` read `document_id` right now, by any path
    /// (direct membership, collection membership, group grant, team-wide
    /// collection permission)?
    async fn can_read_document(&self, user_id: Uuid, document_id: Uuid) -> Result<bool>;

    /// Can `user_id` read `collection_id` right now, by any path?
    async fn can_read_collection(&self, user_id: Uuid, collection_id: Uuid) -> Result<bool>;

    /// Can `user_id` hold a subscription on `document_id`?
    async fn can_subscribe(&self, user_id: Uuid, document_id: Uuid) -> Result<bool>;
}

// ============================================================================
// EntityStore - Point lookups into the host application's rows
// ============================================================================

/// Read access to the host application's entities.
///
/// Lookups are tolerant of soft- and hard-deleted rows: a vanished entity
/// is `Ok(None)`, and membership reads for a vanished parent are empty.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn document(&self, id: Uuid) -> Result<Option<Document>>;

    async fn collection(&self, id: Uuid) -> Result<Option<Collection>>;

    async fn group(&self, id: Uuid) -> Result<Option<Group>>;

    async fn user(&self, id: Uuid) -> Result<Option<User>>;

    /// Users holding a direct membership on the document (direct grants are
    /// not implied by collection membership).
    async fn document_member_ids(&self, document_id: Uuid) -> Result<Vec<Uuid>>;

    /// Current members of the group.
    async fn group_member_ids(&self, group_id: Uuid) -> Result<Vec<Uuid>>;

    /// Collections the group currently holds a grant on.
    async fn group_collection_ids(&self, group_id: Uuid) -> Result<Vec<Uuid>>;

    /// All users in the team, suspended or not.
    async fn team_member_ids(&self, team_id: Uuid) -> Result<Vec<Uuid>>;
}

// ============================================================================
// ViewStore - Per-user read state
// ============================================================================

/// Read state: when did a user last open a document.
///
/// Used only for the "already seen" suppression in recipient resolution.
#[async_trait]
pub trait ViewStore: Send + Sync {
    async fn last_viewed(&self, user_id: Uuid, document_id: Uuid)
        -> Result<Option<DateTime<Utc>>>;
}

// ============================================================================
// Mailer - Outbound notification handoff
// ============================================================================

/// Template kinds the mail collaborator knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    DocumentPublished,
    DocumentUpdated,
}

impl MailKind {
    /// Template identifier on the mail collaborator's side.
    pub fn template(&self) -> &'static str {
        match self {
            MailKind::DocumentPublished => "document-published",
            MailKind::DocumentUpdated => "document-updated",
        }
    }

    /// Notification class name as recorded in settings rows, subscription
    /// rows, and the sent-notification log.
    pub fn event_name(&self) -> &'static str {
        match self {
            MailKind::DocumentPublished => "documents.publish",
            MailKind::DocumentUpdated => "documents.update",
        }
    }
}

/// Fire-and-forget handoff to the external mail delivery collaborator.
///
/// Retries on delivery failure belong to that collaborator, not to this
/// subsystem; an Err here is logged for observability and dropped.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn schedule(&self, kind: MailKind, to: &str, data: serde_json::Value) -> Result<()>;
}

// ============================================================================
// SubscriptionStore - Rows owned by this subsystem
// ============================================================================

/// Persistence for Subscription rows.
///
/// Rows are soft-disabled, never deleted, so "previously unsubscribed" is
/// distinguishable from "never subscribed". There is deliberately no
/// unique constraint on (user, document, event): `create_if_missing` is
/// the atomic check-then-create, and the rare duplicate it cannot prevent
/// is collapsed per user by every consumer.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Create an enabled subscription iff no row of any state exists for
    /// the tuple. Returns the new row, or None if anything (enabled or
    /// disabled) was already there. Check and insert are one atomic unit.
    async fn create_if_missing(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>>;

    /// Create the row or re-enable an existing one (explicit opt-in).
    async fn upsert_enabled(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Subscription>;

    /// Soft-disable the row if present (explicit opt-out). Idempotent.
    async fn disable(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>>;

    async fn find(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>>;

    /// Users holding an enabled subscription for (document, event),
    /// collapsed per user.
    async fn enabled_user_ids(&self, document_id: Uuid, event: &str) -> Result<Vec<Uuid>>;
}

// ============================================================================
// NotificationStore - Settings and send records
// ============================================================================

/// Persistence for team-wide notification settings and sent-notification
/// evidence rows.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// All opt-in settings in the team for one notification kind.
    async fn settings_for(&self, team_id: Uuid, event: &str) -> Result<Vec<NotificationSetting>>;

    /// Record that a notification was handed to the mail collaborator.
    async fn record_sent(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
        emailed_at: DateTime<Utc>,
    ) -> Result<SentNotification>;

    /// Was a notification for this tuple sent at or after `since`?
    async fn was_notified_since(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
        since: DateTime<Utc>,
    ) -> Result<bool>;
}

// ============================================================================
// EventLog - Append-only audit record
// ============================================================================

/// An event as stored, with its per-team sequence number.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub sequence: i64,
    pub event: Event,
}

/// Append-only record of domain mutations, retained indefinitely.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append the event; returns its per-team sequence number.
    async fn append(&self, event: &Event) -> Result<i64>;

    /// Events for a team in sequence order, optionally after `since`.
    async fn list_for_team(&self, team_id: Uuid, since: Option<i64>) -> Result<Vec<StoredEvent>>;
}
