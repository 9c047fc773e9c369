// Database-backed NotificationStore implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notewire_core::{
    EngineError, NotificationSetting, NotificationStore, Result, SentNotification,
};
use uuid::Uuid;

use crate::repositories::Database;

// ============================================================================
// DbNotificationStore - Settings and send records in Postgres
// ============================================================================

/// Database-backed notification settings and sent-notification evidence.
#[derive(Clone)]
pub struct DbNotificationStore {
    db: Database,
}

impl DbNotificationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for DbNotificationStore {
    async fn settings_for(&self, team_id: Uuid, event: &str) -> Result<Vec<NotificationSetting>> {
        let rows = self
            .db
            .list_notification_settings(team_id, event)
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;
        Ok(rows.into_iter().map(NotificationSetting::from).collect())
    }

    async fn record_sent(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
        emailed_at: DateTime<Utc>,
    ) -> Result<SentNotification> {
        let row = self
            .db
            .insert_sent_notification(user_id, document_id, event, emailed_at)
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;
        Ok(SentNotification::from(row))
    }

    async fn was_notified_since(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        self.db
            .sent_notification_exists_since(user_id, document_id, event, since)
            .await
            .map_err(|e| EngineError::store(e.to_string()))
    }
}
