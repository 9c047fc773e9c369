// Subscription lifecycle
//
// Automatic creation on collaboration activity, plus the two explicit user
// actions. The one rule everything here protects: an explicitly disabled
// row blocks automatic re-creation forever, and only an explicit subscribe
// can undo it.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::entities::{Document, Subscription};
use crate::error::Result;
use crate::traits::{PermissionOracle, SubscriptionStore};

pub struct SubscriptionManager {
    store: Arc<dyn SubscriptionStore>,
    oracle: Arc<dyn PermissionOracle>,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn SubscriptionStore>, oracle: Arc<dyn PermissionOracle>) -> Self {
        Self { store, oracle }
    }

    /// Create enabled subscriptions for every listed collaborator who may
    /// hold one and has no row yet. Returns only the rows actually created;
    /// an existing row of any state, enabled or disabled, creates nothing.
    ///
    /// A failed check or write skips that collaborator and the batch
    /// continues.
    pub async fn ensure_subscriptions(
        &self,
        document: &Document,
        event: &str,
        collaborator_ids: &[Uuid],
    ) -> Result<Vec<Subscription>> {
        let mut created = Vec::new();
        let mut seen = HashSet::new();
        for &user_id in collaborator_ids {
            if !seen.insert(user_id) {
                continue;
            }
            match self.oracle.can_subscribe(user_id, document.id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    warn!(
                        %user_id,
                        document_id = %document.id,
                        error = %err,
                        "skipping collaborator, subscribe check failed"
                    );
                    continue;
                }
            }
            match self
                .store
                .create_if_missing(user_id, document.id, event)
                .await
            {
                Ok(Some(subscription)) => created.push(subscription),
                Ok(None) => {}
                Err(err) => warn!(
                    %user_id,
                    document_id = %document.id,
                    error = %err,
                    "skipping collaborator, subscription write failed"
                ),
            }
        }
        Ok(created)
    }

    /// Explicit opt-in. Creates the row or re-enables a disabled one.
    /// Returns `None` when the user may not subscribe to this document.
    pub async fn subscribe(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>> {
        if !self.oracle.can_subscribe(user_id, document_id).await? {
            return Ok(None);
        }
        let subscription = self.store.upsert_enabled(user_id, document_id, event).await?;
        Ok(Some(subscription))
    }

    /// Explicit opt-out. Soft-disables the row so automatic re-creation
    /// stays blocked. Idempotent; `None` when there was never a row.
    pub async fn unsubscribe(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>> {
        self.store.disable(user_id, document_id, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Collection, User};
    use crate::memory::{InMemoryDirectory, InMemorySubscriptionStore};
    use chrono::Utc;

    const EVENT: &str = "documents.update";

    struct Fixture {
        directory: Arc<InMemoryDirectory>,
        store: Arc<InMemorySubscriptionStore>,
        manager: SubscriptionManager,
        document: Document,
        member: User,
        second_member: User,
        outsider: User,
    }

    async fn fixture() -> Fixture {
        let directory = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(InMemorySubscriptionStore::new());
        let manager = SubscriptionManager::new(store.clone(), directory.clone());

        let team_id = Uuid::now_v7();
        let member = make_user(team_id, "member");
        let second_member = make_user(team_id, "second");
        let outsider = make_user(team_id, "outsider");
        let collection = Collection {
            id: Uuid::now_v7(),
            team_id,
            name: "Private".to_string(),
            created_by: member.id,
            permission: None,
        };
        let document = Document {
            id: Uuid::now_v7(),
            team_id,
            collection_id: Some(collection.id),
            title: "Roadmap".to_string(),
            created_by: member.id,
            last_modified_by: member.id,
            collaborator_ids: vec![member.id, second_member.id, outsider.id],
            published_at: Some(Utc::now()),
            updated_at: Utc::now(),
        };

        directory.add_user(member.clone()).await;
        directory.add_user(second_member.clone()).await;
        directory.add_user(outsider.clone()).await;
        directory.add_collection(collection.clone()).await;
        directory.add_document(document.clone()).await;
        directory.add_collection_member(collection.id, member.id).await;
        directory
            .add_collection_member(collection.id, second_member.id)
            .await;

        Fixture {
            directory,
            store,
            manager,
            document,
            member,
            second_member,
            outsider,
        }
    }

    fn make_user(team_id: Uuid, name: &str) -> User {
        User {
            id: Uuid::now_v7(),
            team_id,
            name: name.to_string(),
            email: Some(format!("{name}@example.com")),
            suspended_at: None,
        }
    }

    #[tokio::test]
    async fn creates_rows_for_collaborators_who_can_subscribe() {
        let f = fixture().await;
        let collaborators = f.document.collaborator_ids.clone();

        let created = f
            .manager
            .ensure_subscriptions(&f.document, EVENT, &collaborators)
            .await
            .unwrap();

        let ids: Vec<Uuid> = created.iter().map(|s| s.user_id).collect();
        assert_eq!(ids, vec![f.member.id, f.second_member.id]);
        assert!(created.iter().all(|s| s.enabled));
        // The outsider cannot read the private collection.
        assert!(f
            .store
            .find(f.outsider.id, f.document.id, EVENT)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn second_pass_creates_nothing() {
        let f = fixture().await;
        let collaborators = vec![f.member.id];

        f.manager
            .ensure_subscriptions(&f.document, EVENT, &collaborators)
            .await
            .unwrap();
        let second = f
            .manager
            .ensure_subscriptions(&f.document, EVENT, &collaborators)
            .await
            .unwrap();

        assert!(second.is_empty());
        assert_eq!(f.store.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn disabled_row_blocks_automatic_recreation() {
        let f = fixture().await;
        f.manager
            .subscribe(f.member.id, f.document.id, EVENT)
            .await
            .unwrap();
        f.manager
            .unsubscribe(f.member.id, f.document.id, EVENT)
            .await
            .unwrap();

        let created = f
            .manager
            .ensure_subscriptions(&f.document, EVENT, &[f.member.id])
            .await
            .unwrap();

        assert!(created.is_empty());
        let row = f
            .store
            .find(f.member.id, f.document.id, EVENT)
            .await
            .unwrap()
            .unwrap();
        assert!(!row.enabled);
    }

    #[tokio::test]
    async fn explicit_subscribe_reenables_after_unsubscribe() {
        let f = fixture().await;
        f.manager
            .subscribe(f.member.id, f.document.id, EVENT)
            .await
            .unwrap();
        f.manager
            .unsubscribe(f.member.id, f.document.id, EVENT)
            .await
            .unwrap();

        let resubscribed = f
            .manager
            .subscribe(f.member.id, f.document.id, EVENT)
            .await
            .unwrap()
            .unwrap();

        assert!(resubscribed.enabled);
        assert_eq!(f.store.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn subscribe_without_access_is_refused() {
        let f = fixture().await;

        let result = f
            .manager
            .subscribe(f.outsider.id, f.document.id, EVENT)
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(f.store.rows().await.is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let f = fixture().await;
        assert!(f
            .manager
            .unsubscribe(f.member.id, f.document.id, EVENT)
            .await
            .unwrap()
            .is_none());

        f.manager
            .subscribe(f.member.id, f.document.id, EVENT)
            .await
            .unwrap();
        let first = f
            .manager
            .unsubscribe(f.member.id, f.document.id, EVENT)
            .await
            .unwrap();
        let second = f
            .manager
            .unsubscribe(f.member.id, f.document.id, EVENT)
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_some_and(|row| !row.enabled));
        assert_eq!(f.store.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_collaborator_ids_collapse() {
        let f = fixture().await;
        let collaborators = vec![f.member.id, f.member.id, f.member.id];

        let created = f
            .manager
            .ensure_subscriptions(&f.document, EVENT, &collaborators)
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(f.store.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn collaborator_who_lost_access_is_excluded() {
        let f = fixture().await;
        f.directory
            .remove_collection_member(f.document.collection_id.unwrap(), f.member.id)
            .await;

        let created = f
            .manager
            .ensure_subscriptions(
                &f.document,
                EVENT,
                &[f.member.id, f.second_member.id],
            )
            .await
            .unwrap();

        let ids: Vec<Uuid> = created.iter().map(|s| s.user_id).collect();
        assert_eq!(ids, vec![f.second_member.id]);
    }
}
