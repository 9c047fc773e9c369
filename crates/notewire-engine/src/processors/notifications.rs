// Notification processor
//
// documents.publish and revisions.create are the two triggers that can
// become mail. Recipient resolution decides who qualifies; this processor
// applies the dedup window, hands each mail to the collaborator, and
// records the evidence row the window check reads.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use notewire_core::{
    EntityStore, Event, EventPayload, MailKind, Mailer, NotificationStore, NotifyPolicy,
    RecipientResolver, Result,
};

use crate::engine::EngineHandle;
use crate::processor::Processor;

pub struct NotificationProcessor {
    entities: Arc<dyn EntityStore>,
    resolver: RecipientResolver,
    notifications: Arc<dyn NotificationStore>,
    mailer: Arc<dyn Mailer>,
    policy: NotifyPolicy,
}

impl NotificationProcessor {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        resolver: RecipientResolver,
        notifications: Arc<dyn NotificationStore>,
        mailer: Arc<dyn Mailer>,
        policy: NotifyPolicy,
    ) -> Self {
        Self {
            entities,
            resolver,
            notifications,
            mailer,
            policy,
        }
    }
}

#[async_trait]
impl Processor for NotificationProcessor {
    fn name(&self) -> &'static str {
        "notifications"
    }

    fn applies_to(&self, event: &Event) -> bool {
        matches!(
            event.payload,
            EventPayload::DocumentPublished { .. } | EventPayload::RevisionCreated { .. }
        )
    }

    async fn process(&self, event: &Event, _handle: &EngineHandle) -> Result<()> {
        let (document_id, kind) = match &event.payload {
            EventPayload::DocumentPublished { document_id, .. } => {
                (*document_id, MailKind::DocumentPublished)
            }
            EventPayload::RevisionCreated { document_id, .. } => {
                (*document_id, MailKind::DocumentUpdated)
            }
            _ => return Ok(()),
        };
        let Some(document) = self.entities.document(document_id).await? else {
            debug!(%document_id, "document gone, nothing to notify");
            return Ok(());
        };

        let recipients = self.resolver.recipients_for(&document, kind).await?;
        let window_start = Utc::now() - self.policy.dedup_window;

        for user in recipients {
            let Some(address) = user.email.as_deref() else {
                continue;
            };

            // A failed window check skips the recipient: a missed mail is
            // recoverable on the next trigger, a double send is not.
            match self
                .notifications
                .was_notified_since(user.id, document.id, kind.event_name(), window_start)
                .await
            {
                Ok(true) => {
                    debug!(
                        user_id = %user.id,
                        document_id = %document.id,
                        "recently notified, suppressed"
                    );
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        user_id = %user.id,
                        document_id = %document.id,
                        error = %err,
                        "dedup check failed, recipient skipped"
                    );
                    continue;
                }
            }

            let data = json!({
                "document_id": document.id,
                "title": document.title,
                "event": kind.event_name(),
            });
            if let Err(err) = self.mailer.schedule(kind, address, data).await {
                warn!(
                    user_id = %user.id,
                    document_id = %document.id,
                    error = %err,
                    "mail handoff failed"
                );
                continue;
            }

            if let Err(err) = self
                .notifications
                .record_sent(user.id, document.id, kind.event_name(), Utc::now())
                .await
            {
                warn!(
                    user_id = %user.id,
                    document_id = %document.id,
                    error = %err,
                    "sent record not written"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use notewire_core::memory::{
        InMemoryDirectory, InMemoryEventLog, InMemoryNotificationStore, InMemorySubscriptionStore,
        RecordingMailer,
    };
    use notewire_core::{
        Collection, CollectionPermission, Document, SubscriptionStore, User,
    };
    use uuid::Uuid;

    use super::*;
    use crate::engine::Engine;

    struct Fixture {
        directory: Arc<InMemoryDirectory>,
        subscriptions: Arc<InMemorySubscriptionStore>,
        notifications: Arc<InMemoryNotificationStore>,
        mailer: Arc<RecordingMailer>,
        processor: NotificationProcessor,
        handle: EngineHandle,
        _engine: Engine,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(InMemoryDirectory::new());
        let subscriptions = Arc::new(InMemorySubscriptionStore::new());
        let notifications = Arc::new(InMemoryNotificationStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let policy = NotifyPolicy::default();
        let processor = NotificationProcessor::new(
            directory.clone(),
            RecipientResolver::new(
                directory.clone(),
                directory.clone(),
                directory.clone(),
                subscriptions.clone(),
                notifications.clone(),
                policy.clone(),
            ),
            notifications.clone(),
            mailer.clone(),
            policy,
        );
        let engine = Engine::new(Arc::new(InMemoryEventLog::new()), vec![]);
        let handle = engine.handle();
        Fixture {
            directory,
            subscriptions,
            notifications,
            mailer,
            processor,
            handle,
            _engine: engine,
        }
    }

    fn member(team_id: Uuid, name: &str) -> User {
        User {
            id: Uuid::now_v7(),
            team_id,
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            suspended_at: None,
        }
    }

    async fn seed_published_document(fixture: &Fixture, team_id: Uuid, author: &User) -> Document {
        let collection = Collection {
            id: Uuid::now_v7(),
            team_id,
            name: "Product".to_string(),
            created_by: author.id,
            permission: Some(CollectionPermission::Read),
        };
        let document = Document {
            id: Uuid::now_v7(),
            team_id,
            collection_id: Some(collection.id),
            title: "Quarterly plan".to_string(),
            created_by: author.id,
            last_modified_by: author.id,
            collaborator_ids: vec![author.id],
            published_at: Some(Utc::now()),
            updated_at: Utc::now(),
        };
        fixture.directory.add_collection(collection).await;
        fixture.directory.add_document(document.clone()).await;
        document
    }

    fn publish_event(team_id: Uuid, author: &User, document: &Document) -> Event {
        Event::new(
            team_id,
            author.id,
            EventPayload::DocumentPublished {
                document_id: document.id,
                collection_id: document.collection_id.unwrap(),
            },
        )
    }

    #[tokio::test]
    async fn publish_schedules_mail_and_records_evidence() {
        let fixture = fixture();
        let team_id = Uuid::now_v7();
        let author = member(team_id, "Ada");
        let reader = member(team_id, "Grace");
        fixture.directory.add_user(author.clone()).await;
        fixture.directory.add_user(reader.clone()).await;
        let document = seed_published_document(&fixture, team_id, &author).await;
        fixture
            .notifications
            .add_setting(author.id, team_id, "documents.publish")
            .await;
        fixture
            .notifications
            .add_setting(reader.id, team_id, "documents.publish")
            .await;

        fixture
            .processor
            .process(&publish_event(team_id, &author, &document), &fixture.handle)
            .await
            .unwrap();

        let scheduled = fixture.mailer.scheduled().await;
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].to, "grace@example.com");
        assert_eq!(scheduled[0].kind, MailKind::DocumentPublished);
        assert_eq!(scheduled[0].data["title"], "Quarterly plan");

        let sent = fixture.notifications.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, reader.id);
        assert_eq!(sent[0].event, "documents.publish");
    }

    #[tokio::test]
    async fn second_trigger_inside_the_window_is_suppressed() {
        let fixture = fixture();
        let team_id = Uuid::now_v7();
        let author = member(team_id, "Ada");
        let reader = member(team_id, "Grace");
        fixture.directory.add_user(author.clone()).await;
        fixture.directory.add_user(reader.clone()).await;
        let document = seed_published_document(&fixture, team_id, &author).await;
        fixture
            .notifications
            .add_setting(reader.id, team_id, "documents.publish")
            .await;

        for _ in 0..2 {
            fixture
                .processor
                .process(&publish_event(team_id, &author, &document), &fixture.handle)
                .await
                .unwrap();
        }

        assert_eq!(fixture.mailer.scheduled().await.len(), 1);
        assert_eq!(fixture.notifications.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_handoff_leaves_no_evidence_row() {
        let fixture = fixture();
        let team_id = Uuid::now_v7();
        let author = member(team_id, "Ada");
        let reader = member(team_id, "Grace");
        fixture.directory.add_user(author.clone()).await;
        fixture.directory.add_user(reader.clone()).await;
        let document = seed_published_document(&fixture, team_id, &author).await;
        fixture
            .notifications
            .add_setting(reader.id, team_id, "documents.publish")
            .await;
        fixture.mailer.fail_delivery_to("grace@example.com").await;

        fixture
            .processor
            .process(&publish_event(team_id, &author, &document), &fixture.handle)
            .await
            .unwrap();

        assert!(fixture.mailer.scheduled().await.is_empty());
        // No evidence row, so the next trigger tries again.
        assert!(fixture.notifications.sent().await.is_empty());
    }

    #[tokio::test]
    async fn revision_notifies_enabled_subscribers_as_update_class() {
        let fixture = fixture();
        let team_id = Uuid::now_v7();
        let author = member(team_id, "Ada");
        let watcher = member(team_id, "Joan");
        fixture.directory.add_user(author.clone()).await;
        fixture.directory.add_user(watcher.clone()).await;
        let document = seed_published_document(&fixture, team_id, &author).await;
        fixture
            .notifications
            .add_setting(watcher.id, team_id, "documents.update")
            .await;
        fixture
            .subscriptions
            .upsert_enabled(watcher.id, document.id, "documents.update")
            .await
            .unwrap();

        let event = Event::new(
            team_id,
            author.id,
            EventPayload::RevisionCreated {
                revision_id: Uuid::now_v7(),
                document_id: document.id,
                collection_id: document.collection_id.unwrap(),
            },
        );
        fixture
            .processor
            .process(&event, &fixture.handle)
            .await
            .unwrap();

        let scheduled = fixture.mailer.scheduled().await;
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].kind, MailKind::DocumentUpdated);
        assert_eq!(scheduled[0].kind.template(), "document-updated");
        assert_eq!(scheduled[0].to, "joan@example.com");
    }
}
