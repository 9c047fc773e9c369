// Channel topology resolution
//
// Maps one event to the channels its payload must reach and the join/leave
// directives that re-point live connections. Membership questions are
// answered by the oracle at resolution time; the one exception is the
// snapshot carried by groups.delete, whose rows are gone by then.
//
// The match over the payload union is exhaustive on purpose. Adding a
// mutation kind without deciding its routing will not compile.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::channel::Channel;
use crate::error::Result;
use crate::event::{Event, EventPayload};
use crate::traits::{EntityStore, PermissionOracle};

/// Direction of a control directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Join,
    Leave,
}

impl ControlAction {
    /// Wire verb, the `type` field of the control frame.
    pub fn verb(&self) -> &'static str {
        match self {
            ControlAction::Join => "join",
            ControlAction::Leave => "leave",
        }
    }
}

/// Instruction to re-point one user's live connections at a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlDirective {
    pub user_id: Uuid,
    pub action: ControlAction,
    pub channel: Channel,
}

/// Everything the realtime processor needs to act on one event: the
/// channels to broadcast the payload to, and the subscription changes to
/// push first. `channels` is ordered and de-duplicated; first mention wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePlan {
    pub channels: Vec<Channel>,
    pub controls: Vec<ControlDirective>,
}

impl RoutePlan {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.controls.is_empty()
    }

    fn push_channel(&mut self, channel: Channel) {
        if !self.channels.contains(&channel) {
            self.channels.push(channel);
        }
    }

    fn join(&mut self, user_id: Uuid, channel: Channel) {
        self.controls.push(ControlDirective {
            user_id,
            action: ControlAction::Join,
            channel,
        });
    }

    fn leave(&mut self, user_id: Uuid, channel: Channel) {
        self.controls.push(ControlDirective {
            user_id,
            action: ControlAction::Leave,
            channel,
        });
    }
}

/// Resolves one event into a [`RoutePlan`].
///
/// Stateless between calls. Lookups for the primary entity propagate as
/// errors (the caller logs and skips the event); a failed check for a
/// single (user, channel) pair inside a cascade is logged here and that
/// pair is skipped, leaving the rest of the plan intact.
pub struct TopologyResolver {
    entities: Arc<dyn EntityStore>,
    oracle: Arc<dyn PermissionOracle>,
}

impl TopologyResolver {
    pub fn new(entities: Arc<dyn EntityStore>, oracle: Arc<dyn PermissionOracle>) -> Self {
        Self { entities, oracle }
    }

    pub async fn resolve(&self, event: &Event) -> Result<RoutePlan> {
        match &event.payload {
            EventPayload::DocumentPublished { document_id, .. }
            | EventPayload::DocumentUpdated { document_id, .. }
            | EventPayload::DocumentArchived { document_id, .. }
            | EventPayload::DocumentUnarchived { document_id, .. }
            | EventPayload::DocumentDeleted { document_id, .. } => {
                self.document_content(event.actor_id, *document_id, None)
                    .await
            }
            EventPayload::DocumentMoved {
                document_id,
                from_collection_id,
                ..
            } => {
                self.document_content(event.actor_id, *document_id, Some(*from_collection_id))
                    .await
            }
            // The row is already gone; route on the payload alone. Only the
            // containing collection needs the update, so no actor echo.
            EventPayload::DocumentPermanentlyDeleted { collection_id, .. } => {
                let mut plan = RoutePlan::default();
                plan.push_channel(Channel::Collection(*collection_id));
                Ok(plan)
            }
            EventPayload::DocumentMemberAdded {
                document_id,
                user_id,
            } => {
                self.document_membership(
                    event.actor_id,
                    *document_id,
                    *user_id,
                    ControlAction::Join,
                )
                .await
            }
            EventPayload::DocumentMemberRemoved {
                document_id,
                user_id,
            } => {
                self.document_membership(
                    event.actor_id,
                    *document_id,
                    *user_id,
                    ControlAction::Leave,
                )
                .await
            }
            // Collaboration activity drives subscriptions and notifications,
            // not realtime fan-out.
            EventPayload::RevisionCreated { .. } => Ok(RoutePlan::default()),
            EventPayload::CollectionCreated { collection_id } => {
                self.collection_created(event, *collection_id).await
            }
            EventPayload::CollectionUpdated { collection_id }
            | EventPayload::CollectionDeleted { collection_id } => {
                let mut plan = RoutePlan::default();
                plan.push_channel(Channel::User(event.actor_id));
                plan.push_channel(Channel::Collection(*collection_id));
                Ok(plan)
            }
            EventPayload::CollectionMemberAdded {
                collection_id,
                user_id,
            } => {
                self.collection_membership(
                    event.actor_id,
                    *collection_id,
                    *user_id,
                    ControlAction::Join,
                )
                .await
            }
            EventPayload::CollectionMemberRemoved {
                collection_id,
                user_id,
            } => {
                self.collection_membership(
                    event.actor_id,
                    *collection_id,
                    *user_id,
                    ControlAction::Leave,
                )
                .await
            }
            EventPayload::CollectionGroupAdded {
                collection_id,
                group_id,
            } => {
                self.collection_group(event.actor_id, *collection_id, *group_id, ControlAction::Join)
                    .await
            }
            EventPayload::CollectionGroupRemoved {
                collection_id,
                group_id,
            } => {
                self.collection_group(
                    event.actor_id,
                    *collection_id,
                    *group_id,
                    ControlAction::Leave,
                )
                .await
            }
            EventPayload::GroupCreated { .. } | EventPayload::GroupUpdated { .. } => {
                let mut plan = RoutePlan::default();
                plan.push_channel(Channel::User(event.actor_id));
                plan.push_channel(Channel::Team(event.team_id));
                Ok(plan)
            }
            EventPayload::GroupDeleted {
                group_id,
                member_ids,
            } => self.group_deleted(event, *group_id, member_ids).await,
            EventPayload::GroupMemberAdded { group_id, user_id } => {
                self.group_membership(event.actor_id, *group_id, *user_id, ControlAction::Join)
                    .await
            }
            EventPayload::GroupMemberRemoved { group_id, user_id } => {
                self.group_membership(event.actor_id, *group_id, *user_id, ControlAction::Leave)
                    .await
            }
            EventPayload::SubscriptionCreated { user_id, .. }
            | EventPayload::SubscriptionDeleted { user_id, .. } => {
                let mut plan = RoutePlan::default();
                plan.push_channel(Channel::User(event.actor_id));
                plan.push_channel(Channel::User(*user_id));
                Ok(plan)
            }
        }
    }

    /// Content changes: actor echo, every direct member, and the containing
    /// collection sidebar when the document is published. A move also
    /// refreshes the source collection.
    async fn document_content(
        &self,
        actor_id: Uuid,
        document_id: Uuid,
        from_collection: Option<Uuid>,
    ) -> Result<RoutePlan> {
        let Some(document) = self.entities.document(document_id).await? else {
            return Ok(RoutePlan::default());
        };

        let mut plan = RoutePlan::default();
        plan.push_channel(Channel::User(actor_id));
        // Direct grants are not implied by collection membership, so the
        // collection channel alone would miss these users.
        for member_id in self.entities.document_member_ids(document_id).await? {
            plan.push_channel(Channel::User(member_id));
        }
        if document.is_published() {
            if let Some(collection_id) = document.collection_id {
                plan.push_channel(Channel::Collection(collection_id));
            }
            if let Some(from_collection_id) = from_collection {
                plan.push_channel(Channel::Collection(from_collection_id));
            }
        }
        Ok(plan)
    }

    async fn document_membership(
        &self,
        actor_id: Uuid,
        document_id: Uuid,
        user_id: Uuid,
        action: ControlAction,
    ) -> Result<RoutePlan> {
        let mut plan = RoutePlan::default();
        plan.push_channel(Channel::User(actor_id));
        plan.push_channel(Channel::Document(document_id));
        plan.push_channel(Channel::User(user_id));

        let channel = Channel::Document(document_id);
        match self.oracle.can_read_document(user_id, document_id).await {
            // A join only once access is confirmed; a leave only once every
            // other path (collection, group, team) is confirmed gone.
            Ok(true) if action == ControlAction::Join => plan.join(user_id, channel),
            Ok(false) if action == ControlAction::Leave => plan.leave(user_id, channel),
            Ok(_) => {}
            Err(err) => warn!(
                %user_id,
                %document_id,
                error = %err,
                "skipping control directive, document access check failed"
            ),
        }
        Ok(plan)
    }

    async fn collection_created(&self, event: &Event, collection_id: Uuid) -> Result<RoutePlan> {
        let Some(collection) = self.entities.collection(collection_id).await? else {
            return Ok(RoutePlan::default());
        };

        let mut plan = RoutePlan::default();
        let channel = Channel::Collection(collection_id);
        if collection.is_private() {
            // Only the creator can see it; their other connections join.
            plan.push_channel(Channel::User(collection.created_by));
            plan.join(collection.created_by, channel);
        } else {
            plan.push_channel(Channel::User(event.actor_id));
            plan.push_channel(Channel::Team(event.team_id));
            for member_id in self.entities.team_member_ids(event.team_id).await? {
                self.collection_control(&mut plan, member_id, collection_id, ControlAction::Join)
                    .await;
            }
        }
        Ok(plan)
    }

    async fn collection_membership(
        &self,
        actor_id: Uuid,
        collection_id: Uuid,
        user_id: Uuid,
        action: ControlAction,
    ) -> Result<RoutePlan> {
        let mut plan = RoutePlan::default();
        plan.push_channel(Channel::User(actor_id));
        plan.push_channel(Channel::Collection(collection_id));
        plan.push_channel(Channel::User(user_id));
        self.collection_control(&mut plan, user_id, collection_id, action)
            .await;
        Ok(plan)
    }

    /// Group grant granted/revoked on a collection: every current member is
    /// told, and each member's access is re-checked individually.
    async fn collection_group(
        &self,
        actor_id: Uuid,
        collection_id: Uuid,
        group_id: Uuid,
        action: ControlAction,
    ) -> Result<RoutePlan> {
        let mut plan = RoutePlan::default();
        plan.push_channel(Channel::User(actor_id));
        plan.push_channel(Channel::Collection(collection_id));
        for member_id in self.entities.group_member_ids(group_id).await? {
            plan.push_channel(Channel::User(member_id));
            self.collection_control(&mut plan, member_id, collection_id, action)
                .await;
        }
        Ok(plan)
    }

    /// The membership rows are gone, so former members come from the payload
    /// snapshot. Collection access is still re-checked live: a member who
    /// keeps access through another path keeps the channel.
    async fn group_deleted(
        &self,
        event: &Event,
        group_id: Uuid,
        member_ids: &[Uuid],
    ) -> Result<RoutePlan> {
        let mut plan = RoutePlan::default();
        plan.push_channel(Channel::User(event.actor_id));
        plan.push_channel(Channel::Team(event.team_id));

        let collection_ids = self.entities.group_collection_ids(group_id).await?;
        for &member_id in member_ids {
            plan.leave(member_id, Channel::Group(group_id));
            for &collection_id in &collection_ids {
                self.collection_control(&mut plan, member_id, collection_id, ControlAction::Leave)
                    .await;
            }
        }
        Ok(plan)
    }

    async fn group_membership(
        &self,
        actor_id: Uuid,
        group_id: Uuid,
        user_id: Uuid,
        action: ControlAction,
    ) -> Result<RoutePlan> {
        let mut plan = RoutePlan::default();
        plan.push_channel(Channel::User(actor_id));
        plan.push_channel(Channel::Group(group_id));
        plan.push_channel(Channel::User(user_id));

        // The group channel tracks membership itself, no oracle involved.
        match action {
            ControlAction::Join => plan.join(user_id, Channel::Group(group_id)),
            ControlAction::Leave => plan.leave(user_id, Channel::Group(group_id)),
        }
        for collection_id in self.entities.group_collection_ids(group_id).await? {
            self.collection_control(&mut plan, user_id, collection_id, action)
                .await;
        }
        Ok(plan)
    }

    /// Append a join when the user can read the collection, or a leave when
    /// they no longer can. A failed check skips this pair only.
    async fn collection_control(
        &self,
        plan: &mut RoutePlan,
        user_id: Uuid,
        collection_id: Uuid,
        action: ControlAction,
    ) {
        match self.oracle.can_read_collection(user_id, collection_id).await {
            Ok(true) if action == ControlAction::Join => {
                plan.join(user_id, Channel::Collection(collection_id));
            }
            Ok(false) if action == ControlAction::Leave => {
                plan.leave(user_id, Channel::Collection(collection_id));
            }
            Ok(_) => {}
            Err(err) => warn!(
                %user_id,
                %collection_id,
                error = %err,
                "skipping control directive, collection access check failed"
            ),
        }
    }
}
