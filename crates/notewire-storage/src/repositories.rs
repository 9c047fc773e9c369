// Repository layer for database operations

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Apply pending migrations from the crate's migrations directory.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ============================================
    // Subscriptions
    // ============================================

    /// Insert an enabled subscription unless a row of any state already
    /// exists for the tuple. One statement, so the existence check and the
    /// insert cannot interleave with another writer.
    pub async fn insert_subscription_if_missing(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<SubscriptionRow>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            INSERT INTO subscriptions (id, user_id, document_id, event, enabled)
            SELECT $1, $2, $3, $4, TRUE
            WHERE NOT EXISTS (
                SELECT 1 FROM subscriptions
                WHERE user_id = $2 AND document_id = $3 AND event = $4
            )
            RETURNING id, user_id, document_id, event, enabled, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(document_id)
        .bind(event)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Re-enable an existing row or insert a fresh one. Two statements; a
    /// concurrent insert between them can leave a duplicate, which readers
    /// collapse.
    pub async fn upsert_subscription_enabled(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<SubscriptionRow> {
        let updated = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            UPDATE subscriptions
            SET enabled = TRUE, updated_at = now()
            WHERE user_id = $1 AND document_id = $2 AND event = $3
            RETURNING id, user_id, document_id, event, enabled, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(document_id)
        .bind(event)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(row);
        }

        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            INSERT INTO subscriptions (id, user_id, document_id, event, enabled)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING id, user_id, document_id, event, enabled, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(document_id)
        .bind(event)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn disable_subscription(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<SubscriptionRow>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            UPDATE subscriptions
            SET enabled = FALSE, updated_at = now()
            WHERE user_id = $1 AND document_id = $2 AND event = $3
            RETURNING id, user_id, document_id, event, enabled, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(document_id)
        .bind(event)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn find_subscription(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<SubscriptionRow>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, user_id, document_id, event, enabled, created_at, updated_at
            FROM subscriptions
            WHERE user_id = $1 AND document_id = $2 AND event = $3
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(document_id)
        .bind(event)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_enabled_subscriber_ids(
        &self,
        document_id: Uuid,
        event: &str,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT user_id
            FROM subscriptions
            WHERE document_id = $1 AND event = $2 AND enabled
            "#,
        )
        .bind(document_id)
        .bind(event)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    // ============================================
    // Notification settings and send records
    // ============================================

    /// Record a team-wide opt-in. The unique constraint makes repeats a
    /// no-op; the existing row is returned either way.
    pub async fn insert_notification_setting(
        &self,
        user_id: Uuid,
        team_id: Uuid,
        event: &str,
    ) -> Result<NotificationSettingRow> {
        let row = sqlx::query_as::<_, NotificationSettingRow>(
            r#"
            INSERT INTO notification_settings (id, user_id, team_id, event)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, team_id, event) DO UPDATE SET event = EXCLUDED.event
            RETURNING id, user_id, team_id, event, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(team_id)
        .bind(event)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_notification_settings(
        &self,
        team_id: Uuid,
        event: &str,
    ) -> Result<Vec<NotificationSettingRow>> {
        let rows = sqlx::query_as::<_, NotificationSettingRow>(
            r#"
            SELECT id, user_id, team_id, event, created_at
            FROM notification_settings
            WHERE team_id = $1 AND event = $2
            ORDER BY created_at
            "#,
        )
        .bind(team_id)
        .bind(event)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn insert_sent_notification(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
        emailed_at: DateTime<Utc>,
    ) -> Result<SentNotificationRow> {
        let row = sqlx::query_as::<_, SentNotificationRow>(
            r#"
            INSERT INTO sent_notifications (id, user_id, document_id, event, emailed_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, document_id, event, emailed_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(document_id)
        .bind(event)
        .bind(emailed_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn sent_notification_exists_since(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM sent_notifications
                WHERE user_id = $1 AND document_id = $2 AND event = $3 AND emailed_at >= $4
            )
            "#,
        )
        .bind(user_id)
        .bind(document_id)
        .bind(event)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    // ============================================
    // Event log
    // ============================================

    /// Append one event, assigning the next per-team sequence number.
    pub async fn insert_event(
        &self,
        id: Uuid,
        team_id: Uuid,
        actor_id: Uuid,
        name: &str,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Result<EventRow> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events (id, team_id, actor_id, sequence, name, payload, created_at)
            VALUES ($1, $2, $3, COALESCE((SELECT MAX(sequence) + 1 FROM events WHERE team_id = $2), 1), $4, $5, $6)
            RETURNING id, team_id, actor_id, sequence, name, payload, created_at
            "#,
        )
        .bind(id)
        .bind(team_id)
        .bind(actor_id)
        .bind(name)
        .bind(payload)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_events_for_team(
        &self,
        team_id: Uuid,
        since: Option<i64>,
    ) -> Result<Vec<EventRow>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, team_id, actor_id, sequence, name, payload, created_at
            FROM events
            WHERE team_id = $1 AND sequence > COALESCE($2, 0)
            ORDER BY sequence
            "#,
        )
        .bind(team_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
