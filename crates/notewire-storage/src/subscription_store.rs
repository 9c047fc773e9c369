// Database-backed SubscriptionStore implementation

use async_trait::async_trait;
use notewire_core::{EngineError, Result, Subscription, SubscriptionStore};
use uuid::Uuid;

use crate::repositories::Database;

// ============================================================================
// DbSubscriptionStore - Subscription rows in Postgres
// ============================================================================

/// Database-backed subscription store.
///
/// The atomicity contract of `create_if_missing` is carried by the single
/// INSERT ... WHERE NOT EXISTS statement in the repository layer.
#[derive(Clone)]
pub struct DbSubscriptionStore {
    db: Database,
}

impl DbSubscriptionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubscriptionStore for DbSubscriptionStore {
    async fn create_if_missing(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>> {
        let row = self
            .db
            .insert_subscription_if_missing(user_id, document_id, event)
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;
        Ok(row.map(Subscription::from))
    }

    async fn upsert_enabled(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Subscription> {
        let row = self
            .db
            .upsert_subscription_enabled(user_id, document_id, event)
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;
        Ok(Subscription::from(row))
    }

    async fn disable(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>> {
        let row = self
            .db
            .disable_subscription(user_id, document_id, event)
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;
        Ok(row.map(Subscription::from))
    }

    async fn find(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>> {
        let row = self
            .db
            .find_subscription(user_id, document_id, event)
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;
        Ok(row.map(Subscription::from))
    }

    async fn enabled_user_ids(&self, document_id: Uuid, event: &str) -> Result<Vec<Uuid>> {
        self.db
            .list_enabled_subscriber_ids(document_id, event)
            .await
            .map_err(|e| EngineError::store(e.to_string()))
    }
}
