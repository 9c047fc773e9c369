// Domain events
//
// One mutation in the host application becomes exactly one Event. The
// payload is a closed union over every mutation kind this subsystem
// handles: the topology resolver matches it exhaustively, so a new kind
// that is not routed anywhere is a compile error rather than a silent gap.
//
// Events are immutable once created. Ordering within an entity is
// creation-time order; the EventLog retains them indefinitely for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of a domain mutation, the unit of fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub team_id: Uuid,
    /// The user whose action produced the mutation.
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh time-ordered id.
    pub fn new(team_id: Uuid, actor_id: Uuid, payload: EventPayload) -> Self {
        Self {
            id: Uuid::now_v7(),
            team_id,
            actor_id,
            created_at: Utc::now(),
            payload,
        }
    }

    /// Wire name of the mutation kind, e.g. `documents.publish`.
    pub fn name(&self) -> &'static str {
        self.payload.name()
    }

    pub fn document_id(&self) -> Option<Uuid> {
        self.payload.document_id()
    }

    pub fn collection_id(&self) -> Option<Uuid> {
        self.payload.collection_id()
    }

    pub fn group_id(&self) -> Option<Uuid> {
        self.payload.group_id()
    }

    /// The user the mutation was about (member added/removed, subscriber),
    /// as opposed to the actor who performed it.
    pub fn subject_user_id(&self) -> Option<Uuid> {
        self.payload.subject_user_id()
    }
}

/// Closed union of every mutation kind the subsystem processes.
///
/// Serialized with the wire name under `type` and the fields under `data`,
/// which is also the shape stored in the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    #[serde(rename = "documents.publish")]
    DocumentPublished { document_id: Uuid, collection_id: Uuid },
    #[serde(rename = "documents.update")]
    DocumentUpdated { document_id: Uuid, collection_id: Uuid },
    #[serde(rename = "documents.archive")]
    DocumentArchived { document_id: Uuid, collection_id: Uuid },
    #[serde(rename = "documents.unarchive")]
    DocumentUnarchived { document_id: Uuid, collection_id: Uuid },
    #[serde(rename = "documents.delete")]
    DocumentDeleted { document_id: Uuid, collection_id: Uuid },
    /// The row is gone by processing time, so the payload must carry every
    /// id the router needs: the model id and its containing collection.
    #[serde(rename = "documents.permanent_delete")]
    DocumentPermanentlyDeleted { document_id: Uuid, collection_id: Uuid },
    #[serde(rename = "documents.move")]
    DocumentMoved {
        document_id: Uuid,
        collection_id: Uuid,
        from_collection_id: Uuid,
    },
    #[serde(rename = "documents.add_user")]
    DocumentMemberAdded { document_id: Uuid, user_id: Uuid },
    #[serde(rename = "documents.remove_user")]
    DocumentMemberRemoved { document_id: Uuid, user_id: Uuid },

    /// Collaboration activity. Not routed over realtime channels; drives
    /// subscription creation and update-class notifications instead.
    #[serde(rename = "revisions.create")]
    RevisionCreated {
        revision_id: Uuid,
        document_id: Uuid,
        collection_id: Uuid,
    },

    #[serde(rename = "collections.create")]
    CollectionCreated { collection_id: Uuid },
    #[serde(rename = "collections.update")]
    CollectionUpdated { collection_id: Uuid },
    #[serde(rename = "collections.delete")]
    CollectionDeleted { collection_id: Uuid },
    #[serde(rename = "collections.add_user")]
    CollectionMemberAdded { collection_id: Uuid, user_id: Uuid },
    #[serde(rename = "collections.remove_user")]
    CollectionMemberRemoved { collection_id: Uuid, user_id: Uuid },
    #[serde(rename = "collections.add_group")]
    CollectionGroupAdded { collection_id: Uuid, group_id: Uuid },
    #[serde(rename = "collections.remove_group")]
    CollectionGroupRemoved { collection_id: Uuid, group_id: Uuid },

    #[serde(rename = "groups.create")]
    GroupCreated { group_id: Uuid },
    #[serde(rename = "groups.update")]
    GroupUpdated { group_id: Uuid },
    /// Membership rows are deleted together with the group, so the cascade
    /// works from this snapshot; collection access is still re-queried live.
    #[serde(rename = "groups.delete")]
    GroupDeleted {
        group_id: Uuid,
        member_ids: Vec<Uuid>,
    },
    #[serde(rename = "groups.add_user")]
    GroupMemberAdded { group_id: Uuid, user_id: Uuid },
    #[serde(rename = "groups.remove_user")]
    GroupMemberRemoved { group_id: Uuid, user_id: Uuid },

    #[serde(rename = "subscriptions.create")]
    SubscriptionCreated {
        subscription_id: Uuid,
        user_id: Uuid,
        document_id: Uuid,
    },
    #[serde(rename = "subscriptions.delete")]
    SubscriptionDeleted {
        subscription_id: Uuid,
        user_id: Uuid,
        document_id: Uuid,
    },
}

impl EventPayload {
    /// Wire name of the mutation kind.
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::DocumentPublished { .. } => "documents.publish",
            EventPayload::DocumentUpdated { .. } => "documents.update",
            EventPayload::DocumentArchived { .. } => "documents.archive",
            EventPayload::DocumentUnarchived { .. } => "documents.unarchive",
            EventPayload::DocumentDeleted { .. } => "documents.delete",
            EventPayload::DocumentPermanentlyDeleted { .. } => "documents.permanent_delete",
            EventPayload::DocumentMoved { .. } => "documents.move",
            EventPayload::DocumentMemberAdded { .. } => "documents.add_user",
            EventPayload::DocumentMemberRemoved { .. } => "documents.remove_user",
            EventPayload::RevisionCreated { .. } => "revisions.create",
            EventPayload::CollectionCreated { .. } => "collections.create",
            EventPayload::CollectionUpdated { .. } => "collections.update",
            EventPayload::CollectionDeleted { .. } => "collections.delete",
            EventPayload::CollectionMemberAdded { .. } => "collections.add_user",
            EventPayload::CollectionMemberRemoved { .. } => "collections.remove_user",
            EventPayload::CollectionGroupAdded { .. } => "collections.add_group",
            EventPayload::CollectionGroupRemoved { .. } => "collections.remove_group",
            EventPayload::GroupCreated { .. } => "groups.create",
            EventPayload::GroupUpdated { .. } => "groups.update",
            EventPayload::GroupDeleted { .. } => "groups.delete",
            EventPayload::GroupMemberAdded { .. } => "groups.add_user",
            EventPayload::GroupMemberRemoved { .. } => "groups.remove_user",
            EventPayload::SubscriptionCreated { .. } => "subscriptions.create",
            EventPayload::SubscriptionDeleted { .. } => "subscriptions.delete",
        }
    }

    pub fn document_id(&self) -> Option<Uuid> {
        match self {
            EventPayload::DocumentPublished { document_id, .. }
            | EventPayload::DocumentUpdated { document_id, .. }
            | EventPayload::DocumentArchived { document_id, .. }
            | EventPayload::DocumentUnarchived { document_id, .. }
            | EventPayload::DocumentDeleted { document_id, .. }
            | EventPayload::DocumentPermanentlyDeleted { document_id, .. }
            | EventPayload::DocumentMoved { document_id, .. }
            | EventPayload::DocumentMemberAdded { document_id, .. }
            | EventPayload::DocumentMemberRemoved { document_id, .. }
            | EventPayload::RevisionCreated { document_id, .. }
            | EventPayload::SubscriptionCreated { document_id, .. }
            | EventPayload::SubscriptionDeleted { document_id, .. } => Some(*document_id),
            _ => None,
        }
    }

    pub fn collection_id(&self) -> Option<Uuid> {
        match self {
            EventPayload::DocumentPublished { collection_id, .. }
            | EventPayload::DocumentUpdated { collection_id, .. }
            | EventPayload::DocumentArchived { collection_id, .. }
            | EventPayload::DocumentUnarchived { collection_id, .. }
            | EventPayload::DocumentDeleted { collection_id, .. }
            | EventPayload::DocumentPermanentlyDeleted { collection_id, .. }
            | EventPayload::DocumentMoved { collection_id, .. }
            | EventPayload::RevisionCreated { collection_id, .. }
            | EventPayload::CollectionCreated { collection_id }
            | EventPayload::CollectionUpdated { collection_id }
            | EventPayload::CollectionDeleted { collection_id }
            | EventPayload::CollectionMemberAdded { collection_id, .. }
            | EventPayload::CollectionMemberRemoved { collection_id, .. }
            | EventPayload::CollectionGroupAdded { collection_id, .. }
            | EventPayload::CollectionGroupRemoved { collection_id, .. } => Some(*collection_id),
            _ => None,
        }
    }

    pub fn group_id(&self) -> Option<Uuid> {
        match self {
            EventPayload::CollectionGroupAdded { group_id, .. }
            | EventPayload::CollectionGroupRemoved { group_id, .. }
            | EventPayload::GroupCreated { group_id }
            | EventPayload::GroupUpdated { group_id }
            | EventPayload::GroupDeleted { group_id, .. }
            | EventPayload::GroupMemberAdded { group_id, .. }
            | EventPayload::GroupMemberRemoved { group_id, .. } => Some(*group_id),
            _ => None,
        }
    }

    /// The user the mutation was about, if any.
    pub fn subject_user_id(&self) -> Option<Uuid> {
        match self {
            EventPayload::DocumentMemberAdded { user_id, .. }
            | EventPayload::DocumentMemberRemoved { user_id, .. }
            | EventPayload::CollectionMemberAdded { user_id, .. }
            | EventPayload::CollectionMemberRemoved { user_id, .. }
            | EventPayload::GroupMemberAdded { user_id, .. }
            | EventPayload::GroupMemberRemoved { user_id, .. }
            | EventPayload::SubscriptionCreated { user_id, .. }
            | EventPayload::SubscriptionDeleted { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_wire_name() {
        let document_id = Uuid::now_v7();
        let collection_id = Uuid::now_v7();
        let event = Event::new(
            Uuid::now_v7(),
            Uuid::now_v7(),
            EventPayload::DocumentPublished {
                document_id,
                collection_id,
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "documents.publish");
        assert_eq!(json["data"]["document_id"], document_id.to_string());
        assert_eq!(json["data"]["collection_id"], collection_id.to_string());
        assert_eq!(json["team_id"], event.team_id.to_string());
    }

    #[test]
    fn event_round_trips_through_json() {
        let event = Event::new(
            Uuid::now_v7(),
            Uuid::now_v7(),
            EventPayload::GroupDeleted {
                group_id: Uuid::now_v7(),
                member_ids: vec![Uuid::now_v7(), Uuid::now_v7()],
            },
        );

        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert_eq!(back.payload, event.payload);
    }

    #[test]
    fn accessors_expose_referenced_ids() {
        let document_id = Uuid::now_v7();
        let user_id = Uuid::now_v7();
        let payload = EventPayload::DocumentMemberAdded {
            document_id,
            user_id,
        };
        assert_eq!(payload.name(), "documents.add_user");
        assert_eq!(payload.document_id(), Some(document_id));
        assert_eq!(payload.subject_user_id(), Some(user_id));
        assert_eq!(payload.collection_id(), None);
        assert_eq!(payload.group_id(), None);
    }
}
