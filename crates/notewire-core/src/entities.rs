// Entity snapshots and subsystem-owned records
//
// The Document/Collection/Group/User structs are read models of the host
// application's rows, fetched live through EntityStore at processing time.
// Subscription/NotificationSetting/SentNotification are the rows this
// subsystem owns (persisted by notewire-storage in production).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How widely a collection is shared inside its team.
///
/// A collection with no permission at all (`Collection::permission == None`)
/// is private: only explicit members (direct or via group) can see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionPermission {
    /// Every team member can read.
    Read,
    /// Every team member can read and write.
    ReadWrite,
}

/// Document snapshot as read from the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub team_id: Uuid,
    /// Unset while the document is a personal draft.
    pub collection_id: Option<Uuid>,
    pub title: String,
    pub created_by: Uuid,
    /// The user whose edit produced the current revision. Recipient
    /// resolution excludes this user, not whoever emitted the event.
    pub last_modified_by: Uuid,
    /// Users who have edited the document. Drives automatic subscription
    /// creation on collaboration activity.
    pub collaborator_ids: Vec<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }
}

/// Collection snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    /// `None` means private: visible only to explicit members.
    pub permission: Option<CollectionPermission>,
}

impl Collection {
    pub fn is_private(&self) -> bool {
        self.permission.is_none()
    }
}

/// Group snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
}

/// User snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    /// Delivery address for asynchronous notifications. Users without one
    /// are dropped from every notify-set.
    pub email: Option<String>,
    pub suspended_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }

    /// Whether this user can receive asynchronous notifications at all.
    pub fn is_notifiable(&self) -> bool {
        !self.is_suspended() && self.email.is_some()
    }
}

/// A user's opt-in (or soft opt-out) to asynchronous notifications for one
/// document and one event kind.
///
/// Rows are never hard-deleted: `enabled = false` records an explicit
/// unsubscribe, which must keep blocking automatic re-subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    /// Wire name of the subscribed event kind, e.g. `documents.update`.
    pub event: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's team-wide opt-in to one class of notification, independent of
/// per-document subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSetting {
    pub id: Uuid,
    pub user_id: Uuid,
    pub team_id: Uuid,
    /// Wire name of the notification class, e.g. `documents.publish`.
    pub event: String,
    pub created_at: DateTime<Utc>,
}

/// Evidence that a notification was handed to the mail collaborator.
/// Append-only; used solely for the dedup-window check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub event: String,
    pub emailed_at: DateTime<Utc>,
}
