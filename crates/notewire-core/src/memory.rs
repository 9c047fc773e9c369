// In-memory implementations for examples and testing
//
// These implementations keep all data in memory, making them suitable for:
// - End-to-end pipeline tests without a database
// - Unit tests of the resolvers
// - Standalone embedding of the engine in small deployments
//
// InMemoryDirectory stands in for the host application: it holds entity
// snapshots plus the membership relations, and answers oracle queries from
// those relations the way the host's access-control layer would.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::{
    Collection, Document, Group, NotificationSetting, SentNotification, Subscription, User,
};
use crate::error::{EngineError, Result};
use crate::event::Event;
use crate::traits::{
    EntityStore, EventLog, Mailer, MailKind, NotificationStore, PermissionOracle, StoredEvent,
    SubscriptionStore, ViewStore,
};

// ============================================================================
// InMemoryDirectory - Host application stand-in
// ============================================================================

/// In-memory entity directory, relation-aware oracle, and view store.
///
/// One struct implements all three host-side seams so access answers stay
/// consistent with the seeded relations. Seed it with `add_*`, mutate it
/// mid-test with `remove_*`, and mark users with `fail_user_lookup` to
/// exercise the skip-and-continue paths.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    documents: Arc<RwLock<HashMap<Uuid, Document>>>,
    collections: Arc<RwLock<HashMap<Uuid, Collection>>>,
    groups: Arc<RwLock<HashMap<Uuid, Group>>>,
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    document_members: Arc<RwLock<HashMap<Uuid, Vec<Uuid>>>>,
    collection_members: Arc<RwLock<HashMap<Uuid, Vec<Uuid>>>>,
    group_members: Arc<RwLock<HashMap<Uuid, Vec<Uuid>>>>,
    /// group id -> collections the group holds a grant on
    group_collections: Arc<RwLock<HashMap<Uuid, Vec<Uuid>>>>,
    /// (user id, document id) -> last opened
    views: Arc<RwLock<HashMap<(Uuid, Uuid), DateTime<Utc>>>>,
    failing_users: Arc<RwLock<HashSet<Uuid>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_document(&self, document: Document) {
        self.documents.write().await.insert(document.id, document);
    }

    pub async fn remove_document(&self, id: Uuid) {
        self.documents.write().await.remove(&id);
    }

    pub async fn add_collection(&self, collection: Collection) {
        self.collections
            .write()
            .await
            .insert(collection.id, collection);
    }

    pub async fn add_group(&self, group: Group) {
        self.groups.write().await.insert(group.id, group);
    }

    pub async fn add_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn add_document_member(&self, document_id: Uuid, user_id: Uuid) {
        push_unique(
            self.document_members.write().await.entry(document_id),
            user_id,
        );
    }

    pub async fn remove_document_member(&self, document_id: Uuid, user_id: Uuid) {
        if let Some(members) = self.document_members.write().await.get_mut(&document_id) {
            members.retain(|id| *id != user_id);
        }
    }

    pub async fn add_collection_member(&self, collection_id: Uuid, user_id: Uuid) {
        push_unique(
            self.collection_members.write().await.entry(collection_id),
            user_id,
        );
    }

    pub async fn remove_collection_member(&self, collection_id: Uuid, user_id: Uuid) {
        if let Some(members) = self.collection_members.write().await.get_mut(&collection_id) {
            members.retain(|id| *id != user_id);
        }
    }

    pub async fn add_group_member(&self, group_id: Uuid, user_id: Uuid) {
        push_unique(self.group_members.write().await.entry(group_id), user_id);
    }

    pub async fn remove_group_member(&self, group_id: Uuid, user_id: Uuid) {
        if let Some(members) = self.group_members.write().await.get_mut(&group_id) {
            members.retain(|id| *id != user_id);
        }
    }

    pub async fn grant_collection_to_group(&self, collection_id: Uuid, group_id: Uuid) {
        push_unique(
            self.group_collections.write().await.entry(group_id),
            collection_id,
        );
    }

    pub async fn revoke_collection_from_group(&self, collection_id: Uuid, group_id: Uuid) {
        if let Some(collections) = self.group_collections.write().await.get_mut(&group_id) {
            collections.retain(|id| *id != collection_id);
        }
    }

    pub async fn set_last_viewed(&self, user_id: Uuid, document_id: Uuid, at: DateTime<Utc>) {
        self.views.write().await.insert((user_id, document_id), at);
    }

    /// Make subsequent `EntityStore::user` lookups for this id fail.
    pub async fn fail_user_lookup(&self, user_id: Uuid) {
        self.failing_users.write().await.insert(user_id);
    }
}

fn push_unique(entry: std::collections::hash_map::Entry<'_, Uuid, Vec<Uuid>>, value: Uuid) {
    let values = entry.or_default();
    if !values.contains(&value) {
        values.push(value);
    }
}

#[async_trait]
impl EntityStore for InMemoryDirectory {
    async fn document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn collection(&self, id: Uuid) -> Result<Option<Collection>> {
        Ok(self.collections.read().await.get(&id).cloned())
    }

    async fn group(&self, id: Uuid) -> Result<Option<Group>> {
        Ok(self.groups.read().await.get(&id).cloned())
    }

    async fn user(&self, id: Uuid) -> Result<Option<User>> {
        if self.failing_users.read().await.contains(&id) {
            return Err(EngineError::store(format!("user lookup failed for {id}")));
        }
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn document_member_ids(&self, document_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .document_members
            .read()
            .await
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn group_member_ids(&self, group_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .group_members
            .read()
            .await
            .get(&group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn group_collection_ids(&self, group_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .group_collections
            .read()
            .await
            .get(&group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn team_member_ids(&self, team_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|user| user.team_id == team_id)
            .map(|user| user.id)
            .collect())
    }
}

#[async_trait]
impl PermissionOracle for InMemoryDirectory {
    async fn can_read_document(&self, user_id: Uuid, document_id: Uuid) -> Result<bool> {
        let document = match self.documents.read().await.get(&document_id).cloned() {
            Some(document) => document,
            None => return Ok(false),
        };
        let direct = self
            .document_members
            .read()
            .await
            .get(&document_id)
            .is_some_and(|members| members.contains(&user_id));
        if direct {
            return Ok(true);
        }
        match document.collection_id {
            Some(collection_id) => self.can_read_collection(user_id, collection_id).await,
            None => Ok(false),
        }
    }

    async fn can_read_collection(&self, user_id: Uuid, collection_id: Uuid) -> Result<bool> {
        let collection = match self.collections.read().await.get(&collection_id).cloned() {
            Some(collection) => collection,
            None => return Ok(false),
        };
        let same_team = self
            .users
            .read()
            .await
            .get(&user_id)
            .is_some_and(|user| user.team_id == collection.team_id);
        if !same_team {
            return Ok(false);
        }
        if !collection.is_private() {
            return Ok(true);
        }
        let direct = self
            .collection_members
            .read()
            .await
            .get(&collection_id)
            .is_some_and(|members| members.contains(&user_id));
        if direct {
            return Ok(true);
        }
        let group_members = self.group_members.read().await;
        let grants = self.group_collections.read().await;
        Ok(group_members.iter().any(|(group_id, members)| {
            members.contains(&user_id)
                && grants
                    .get(group_id)
                    .is_some_and(|collections| collections.contains(&collection_id))
        }))
    }

    async fn can_subscribe(&self, user_id: Uuid, document_id: Uuid) -> Result<bool> {
        self.can_read_document(user_id, document_id).await
    }
}

#[async_trait]
impl ViewStore for InMemoryDirectory {
    async fn last_viewed(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .views
            .read()
            .await
            .get(&(user_id, document_id))
            .copied())
    }
}

// ============================================================================
// InMemorySubscriptionStore - Subscription rows in memory
// ============================================================================

/// In-memory subscription store.
///
/// Rows live in a Vec so duplicate-tolerant semantics match the production
/// table, which has no unique constraint either.
#[derive(Debug, Default, Clone)]
pub struct InMemorySubscriptionStore {
    rows: Arc<RwLock<Vec<Subscription>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows, in insertion order.
    pub async fn rows(&self) -> Vec<Subscription> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn create_if_missing(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>> {
        // The lock spans check and insert, like the single-statement
        // production query.
        let mut rows = self.rows.write().await;
        let exists = rows.iter().any(|row| {
            row.user_id == user_id && row.document_id == document_id && row.event == event
        });
        if exists {
            return Ok(None);
        }
        let now = Utc::now();
        let row = Subscription {
            id: Uuid::now_v7(),
            user_id,
            document_id,
            event: event.to_string(),
            enabled: true,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(Some(row))
    }

    async fn upsert_enabled(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Subscription> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.iter_mut().find(|row| {
            row.user_id == user_id && row.document_id == document_id && row.event == event
        }) {
            row.enabled = true;
            row.updated_at = Utc::now();
            return Ok(row.clone());
        }
        let now = Utc::now();
        let row = Subscription {
            id: Uuid::now_v7(),
            user_id,
            document_id,
            event: event.to_string(),
            enabled: true,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn disable(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| {
            row.user_id == user_id && row.document_id == document_id && row.event == event
        }) {
            Some(row) => {
                row.enabled = false;
                row.updated_at = Utc::now();
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }

    async fn find(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
    ) -> Result<Option<Subscription>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|row| {
                row.user_id == user_id && row.document_id == document_id && row.event == event
            })
            .cloned())
    }

    async fn enabled_user_ids(&self, document_id: Uuid, event: &str) -> Result<Vec<Uuid>> {
        let rows = self.rows.read().await;
        let mut seen = HashSet::new();
        Ok(rows
            .iter()
            .filter(|row| row.document_id == document_id && row.event == event && row.enabled)
            .map(|row| row.user_id)
            .filter(|user_id| seen.insert(*user_id))
            .collect())
    }
}

// ============================================================================
// InMemoryNotificationStore - Settings and send records in memory
// ============================================================================

/// In-memory notification settings and sent-notification evidence.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNotificationStore {
    settings: Arc<RwLock<Vec<NotificationSetting>>>,
    sent: Arc<RwLock<Vec<SentNotification>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opt a user in to one notification class.
    pub async fn add_setting(&self, user_id: Uuid, team_id: Uuid, event: &str) {
        self.settings.write().await.push(NotificationSetting {
            id: Uuid::now_v7(),
            user_id,
            team_id,
            event: event.to_string(),
            created_at: Utc::now(),
        });
    }

    /// All send records, in insertion order.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn settings_for(&self, team_id: Uuid, event: &str) -> Result<Vec<NotificationSetting>> {
        Ok(self
            .settings
            .read()
            .await
            .iter()
            .filter(|setting| setting.team_id == team_id && setting.event == event)
            .cloned()
            .collect())
    }

    async fn record_sent(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
        emailed_at: DateTime<Utc>,
    ) -> Result<SentNotification> {
        let record = SentNotification {
            id: Uuid::now_v7(),
            user_id,
            document_id,
            event: event.to_string(),
            emailed_at,
        };
        self.sent.write().await.push(record.clone());
        Ok(record)
    }

    async fn was_notified_since(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        event: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.sent.read().await.iter().any(|record| {
            record.user_id == user_id
                && record.document_id == document_id
                && record.event == event
                && record.emailed_at >= since
        }))
    }
}

// ============================================================================
// InMemoryEventLog - Append-only log in memory
// ============================================================================

/// In-memory event log with per-team sequence numbers.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventLog {
    events: Arc<RwLock<Vec<StoredEvent>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: &Event) -> Result<i64> {
        let mut events = self.events.write().await;
        let sequence = events
            .iter()
            .filter(|stored| stored.event.team_id == event.team_id)
            .map(|stored| stored.sequence)
            .max()
            .unwrap_or(0)
            + 1;
        events.push(StoredEvent {
            sequence,
            event: event.clone(),
        });
        Ok(sequence)
    }

    async fn list_for_team(&self, team_id: Uuid, since: Option<i64>) -> Result<Vec<StoredEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|stored| stored.event.team_id == team_id)
            .filter(|stored| since.is_none_or(|s| stored.sequence > s))
            .cloned()
            .collect())
    }
}

// ============================================================================
// RecordingMailer - Captures scheduled mail instead of sending it
// ============================================================================

/// One captured handoff to the mail collaborator.
#[derive(Debug, Clone)]
pub struct ScheduledMail {
    pub kind: MailKind,
    pub to: String,
    pub data: serde_json::Value,
}

/// Mailer that records every scheduled mail for assertions. Addresses
/// registered with `fail_delivery_to` refuse the handoff instead, which
/// exercises the log-and-continue path.
#[derive(Debug, Default, Clone)]
pub struct RecordingMailer {
    scheduled: Arc<RwLock<Vec<ScheduledMail>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_delivery_to(&self, address: &str) {
        self.failing.write().await.insert(address.to_string());
    }

    /// All captured mail, in scheduling order.
    pub async fn scheduled(&self) -> Vec<ScheduledMail> {
        self.scheduled.read().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn schedule(&self, kind: MailKind, to: &str, data: serde_json::Value) -> Result<()> {
        if self.failing.read().await.contains(to) {
            return Err(EngineError::mail(format!("delivery refused for {to}")));
        }
        self.scheduled.write().await.push(ScheduledMail {
            kind,
            to: to.to_string(),
            data,
        });
        Ok(())
    }
}
