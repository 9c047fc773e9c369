// Database models (internal, converted to core types at the store boundary)

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use notewire_core::{NotificationSetting, SentNotification, Subscription};

// ============================================
// Subscription models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub event: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            id: row.id,
            user_id: row.user_id,
            document_id: row.document_id,
            event: row.event,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ============================================
// Notification models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct NotificationSettingRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub team_id: Uuid,
    pub event: String,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationSettingRow> for NotificationSetting {
    fn from(row: NotificationSettingRow) -> Self {
        NotificationSetting {
            id: row.id,
            user_id: row.user_id,
            team_id: row.team_id,
            event: row.event,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SentNotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub event: String,
    pub emailed_at: DateTime<Utc>,
}

impl From<SentNotificationRow> for SentNotification {
    fn from(row: SentNotificationRow) -> Self {
        SentNotification {
            id: row.id,
            user_id: row.user_id,
            document_id: row.document_id,
            event: row.event,
            emailed_at: row.emailed_at,
        }
    }
}

// ============================================
// Event log models
// ============================================

/// One logged event. `payload` holds the tagged JSON form of the payload
/// union; `name` duplicates its wire name for SQL-side filtering.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub team_id: Uuid,
    pub actor_id: Uuid,
    pub sequence: i64,
    pub name: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
