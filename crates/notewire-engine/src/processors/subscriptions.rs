// Subscription processor
//
// Reacts to collaboration activity: every collaborator of the revised
// document gets an enabled documents.update subscription unless a row for
// them already exists in any state. Each row actually created is announced
// back into the pipeline as subscriptions.create, so the realtime side can
// tell the user's clients.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use notewire_core::{
    EntityStore, Event, EventPayload, MailKind, Result, SubscriptionManager,
};

use crate::engine::EngineHandle;
use crate::processor::Processor;

pub struct SubscriptionProcessor {
    entities: Arc<dyn EntityStore>,
    manager: SubscriptionManager,
}

impl SubscriptionProcessor {
    pub fn new(entities: Arc<dyn EntityStore>, manager: SubscriptionManager) -> Self {
        Self { entities, manager }
    }
}

#[async_trait]
impl Processor for SubscriptionProcessor {
    fn name(&self) -> &'static str {
        "subscriptions"
    }

    fn applies_to(&self, event: &Event) -> bool {
        matches!(event.payload, EventPayload::RevisionCreated { .. })
    }

    async fn process(&self, event: &Event, handle: &EngineHandle) -> Result<()> {
        let Some(document_id) = event.document_id() else {
            return Ok(());
        };
        let Some(document) = self.entities.document(document_id).await? else {
            debug!(%document_id, "document gone, no subscriptions to ensure");
            return Ok(());
        };

        let created = self
            .manager
            .ensure_subscriptions(
                &document,
                MailKind::DocumentUpdated.event_name(),
                &document.collaborator_ids,
            )
            .await?;

        for subscription in created {
            let follow_on = Event::new(
                event.team_id,
                subscription.user_id,
                EventPayload::SubscriptionCreated {
                    subscription_id: subscription.id,
                    user_id: subscription.user_id,
                    document_id: subscription.document_id,
                },
            );
            if let Err(err) = handle.emit(follow_on).await {
                warn!(
                    subscription_id = %subscription.id,
                    error = %err,
                    "follow-on subscriptions.create not emitted"
                );
            }
        }
        Ok(())
    }
}
