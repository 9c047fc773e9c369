// Notification recipient resolution
//
// Computes the notify-set for one document and one notification class.
// Starts wide (every team opt-in) and narrows: the last modifier, users
// without an enabled subscription when the class is update-gated, users who
// lost read access since the trigger, users who already opened the current
// revision, suspended users, and users without a delivery address all drop
// out. A failed lookup drops that candidate only.
//
// The dedup window is not applied here. The notifications processor checks
// it against the sent log immediately before scheduling, so a recipient
// list can be recomputed freely.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::config::NotifyPolicy;
use crate::entities::{Document, User};
use crate::error::Result;
use crate::traits::{
    EntityStore, MailKind, NotificationStore, PermissionOracle, SubscriptionStore, ViewStore,
};

pub struct RecipientResolver {
    entities: Arc<dyn EntityStore>,
    oracle: Arc<dyn PermissionOracle>,
    views: Arc<dyn ViewStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    notifications: Arc<dyn NotificationStore>,
    policy: NotifyPolicy,
}

impl RecipientResolver {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        oracle: Arc<dyn PermissionOracle>,
        views: Arc<dyn ViewStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        notifications: Arc<dyn NotificationStore>,
        policy: NotifyPolicy,
    ) -> Self {
        Self {
            entities,
            oracle,
            views,
            subscriptions,
            notifications,
            policy,
        }
    }

    /// Resolve the users who should be notified about `document` for the
    /// given class, collapsed to one entry per user, in team opt-in order.
    pub async fn recipients_for(&self, document: &Document, kind: MailKind) -> Result<Vec<User>> {
        let event = kind.event_name();
        let settings = self
            .notifications
            .settings_for(document.team_id, event)
            .await?;

        // Update-class notifications reach only users holding an enabled
        // documents.update subscription; publish-class stays team-wide.
        let gated = self.policy.is_update_gated(event);
        let subscriber_ids: HashSet<Uuid> = if gated {
            self.subscriptions
                .enabled_user_ids(document.id, MailKind::DocumentUpdated.event_name())
                .await?
                .into_iter()
                .collect()
        } else {
            HashSet::new()
        };

        let mut seen = HashSet::new();
        let mut recipients = Vec::new();
        for setting in settings {
            let user_id = setting.user_id;
            if user_id == document.last_modified_by {
                continue;
            }
            if !seen.insert(user_id) {
                continue;
            }
            if gated && !subscriber_ids.contains(&user_id) {
                continue;
            }
            match self.qualify(user_id, document).await {
                Ok(Some(user)) => recipients.push(user),
                Ok(None) => {}
                Err(err) => warn!(
                    %user_id,
                    document_id = %document.id,
                    error = %err,
                    "skipping notification candidate, lookup failed"
                ),
            }
        }
        Ok(recipients)
    }

    /// Per-candidate checks. `Ok(None)` means the candidate is filtered
    /// out; `Err` means a lookup failed and the caller decides.
    async fn qualify(&self, user_id: Uuid, document: &Document) -> Result<Option<User>> {
        // Access is re-checked at send time; the trigger may be minutes old.
        let readable = match document.collection_id {
            Some(collection_id) => {
                self.oracle
                    .can_read_collection(user_id, collection_id)
                    .await?
            }
            // Drafts have no collection; fall back to the document itself.
            None => self.oracle.can_read_document(user_id, document.id).await?,
        };
        if !readable {
            return Ok(None);
        }

        if let Some(viewed_at) = self.views.last_viewed(user_id, document.id).await? {
            if viewed_at > document.updated_at {
                return Ok(None);
            }
        }

        let Some(user) = self.entities.user(user_id).await? else {
            return Ok(None);
        };
        if !user.is_notifiable() {
            return Ok(None);
        }
        Ok(Some(user))
    }
}
