// In-process connection registry
//
// Keeps every live connection behind an unbounded sender and a set of
// subscribed channels. The socket layer owns the receiving half: register
// on accept, forward frames to the wire, disconnect on close. A send into
// a dropped receiver counts as a disconnect and evicts the entry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use notewire_core::Channel;

use crate::frame::Frame;
use crate::registry::ConnectionRegistry;

/// Identifies one accepted connection for its lifetime.
pub type ConnectionId = Uuid;

struct Connection {
    user_id: Uuid,
    sender: mpsc::UnboundedSender<Frame>,
    channels: HashSet<Channel>,
}

/// Registry for connections terminated by this process.
#[derive(Clone, Default)]
pub struct LocalRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `user_id`. The connection starts
    /// subscribed to the user's own channel and the team channel; join
    /// frames extend the set from there.
    pub async fn register(
        &self,
        user_id: Uuid,
        team_id: Uuid,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<Frame>) {
        let connection_id = Uuid::now_v7();
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut channels = HashSet::new();
        channels.insert(Channel::User(user_id));
        channels.insert(Channel::Team(team_id));
        self.inner.connections.write().await.insert(
            connection_id,
            Connection {
                user_id,
                sender,
                channels,
            },
        );
        debug!(%user_id, %connection_id, "registered connection");
        (connection_id, receiver)
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) {
        if self
            .inner
            .connections
            .write()
            .await
            .remove(&connection_id)
            .is_some()
        {
            debug!(%connection_id, "removed connection");
        }
    }

    /// Subscribe one connection directly, outside the control-frame path.
    /// The socket layer uses this when a client opens an entity it can read.
    pub async fn subscribe(&self, connection_id: ConnectionId, channel: Channel) {
        if let Some(connection) = self.inner.connections.write().await.get_mut(&connection_id) {
            connection.channels.insert(channel);
        }
    }

    pub async fn unsubscribe(&self, connection_id: ConnectionId, channel: &Channel) {
        if let Some(connection) = self.inner.connections.write().await.get_mut(&connection_id) {
            connection.channels.remove(channel);
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    /// Channels one connection is currently subscribed to.
    pub async fn channels_of(&self, connection_id: ConnectionId) -> HashSet<Channel> {
        self.inner
            .connections
            .read()
            .await
            .get(&connection_id)
            .map(|connection| connection.channels.clone())
            .unwrap_or_default()
    }

    async fn evict(&self, dead: Vec<ConnectionId>) {
        if dead.is_empty() {
            return;
        }
        let mut connections = self.inner.connections.write().await;
        for connection_id in dead {
            connections.remove(&connection_id);
            debug!(%connection_id, "evicted connection with dropped receiver");
        }
    }
}

#[async_trait]
impl ConnectionRegistry for LocalRegistry {
    async fn broadcast(&self, channels: &[Channel], frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let connections = self.inner.connections.read().await;
            for (&connection_id, connection) in connections.iter() {
                let subscribed = channels
                    .iter()
                    .any(|channel| connection.channels.contains(channel));
                if !subscribed {
                    continue;
                }
                if connection.sender.send(frame.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(connection_id);
                }
            }
        }
        self.evict(dead).await;
        delivered
    }

    async fn join(&self, user_id: Uuid, channel: &Channel, frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let mut connections = self.inner.connections.write().await;
            for (&connection_id, connection) in connections.iter_mut() {
                if connection.user_id != user_id {
                    continue;
                }
                connection.channels.insert(*channel);
                if connection.sender.send(frame.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(connection_id);
                }
            }
        }
        self.evict(dead).await;
        delivered
    }

    async fn leave(&self, user_id: Uuid, channel: &Channel, frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let mut connections = self.inner.connections.write().await;
            for (&connection_id, connection) in connections.iter_mut() {
                if connection.user_id != user_id {
                    continue;
                }
                connection.channels.remove(channel);
                if connection.sender.send(frame.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(connection_id);
                }
            }
        }
        self.evict(dead).await;
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notewire_core::topology::ControlAction;
    use serde_json::json;

    #[tokio::test]
    async fn register_pre_subscribes_user_and_team_channels() {
        let registry = LocalRegistry::new();
        let user_id = Uuid::now_v7();
        let team_id = Uuid::now_v7();
        let (connection_id, mut receiver) = registry.register(user_id, team_id).await;

        let channels = registry.channels_of(connection_id).await;
        assert!(channels.contains(&Channel::User(user_id)));
        assert!(channels.contains(&Channel::Team(team_id)));

        let frame = Frame::event("groups.create", json!({"id": "g1"}));
        let delivered = registry.broadcast(&[Channel::Team(team_id)], &frame).await;
        assert_eq!(delivered, 1);
        assert_eq!(receiver.try_recv().unwrap(), frame);
    }

    #[tokio::test]
    async fn overlapping_channels_deliver_once_per_connection() {
        let registry = LocalRegistry::new();
        let user_id = Uuid::now_v7();
        let team_id = Uuid::now_v7();
        let collection_id = Uuid::now_v7();
        let (connection_id, mut receiver) = registry.register(user_id, team_id).await;
        registry
            .subscribe(connection_id, Channel::Collection(collection_id))
            .await;

        let frame = Frame::event("documents.update", json!({"id": "d1"}));
        let delivered = registry
            .broadcast(
                &[Channel::User(user_id), Channel::Collection(collection_id)],
                &frame,
            )
            .await;

        assert_eq!(delivered, 1);
        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_unsubscribed_connections() {
        let registry = LocalRegistry::new();
        let team_id = Uuid::now_v7();
        let (_, mut listener) = registry.register(Uuid::now_v7(), team_id).await;
        let (_, mut other) = registry.register(Uuid::now_v7(), Uuid::now_v7()).await;

        let frame = Frame::event("groups.update", json!({"id": "g1"}));
        let delivered = registry.broadcast(&[Channel::Team(team_id)], &frame).await;

        assert_eq!(delivered, 1);
        assert!(listener.try_recv().is_ok());
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_extends_every_connection_of_the_user() {
        let registry = LocalRegistry::new();
        let user_id = Uuid::now_v7();
        let team_id = Uuid::now_v7();
        let collection_id = Uuid::now_v7();
        // Same user on two devices.
        let (first, mut rx_first) = registry.register(user_id, team_id).await;
        let (second, mut rx_second) = registry.register(user_id, team_id).await;

        let channel = Channel::Collection(collection_id);
        let frame = Frame::control(ControlAction::Join, &channel, "collections.add_user");
        let delivered = registry.join(user_id, &channel, &frame).await;

        assert_eq!(delivered, 2);
        assert!(registry.channels_of(first).await.contains(&channel));
        assert!(registry.channels_of(second).await.contains(&channel));
        assert_eq!(rx_first.try_recv().unwrap(), frame);
        assert_eq!(rx_second.try_recv().unwrap(), frame);
    }

    #[tokio::test]
    async fn leave_stops_subsequent_broadcasts() {
        let registry = LocalRegistry::new();
        let user_id = Uuid::now_v7();
        let collection_id = Uuid::now_v7();
        let (connection_id, mut receiver) = registry.register(user_id, Uuid::now_v7()).await;
        registry
            .subscribe(connection_id, Channel::Collection(collection_id))
            .await;

        let channel = Channel::Collection(collection_id);
        let frame = Frame::control(ControlAction::Leave, &channel, "collections.remove_user");
        registry.leave(user_id, &channel, &frame).await;
        assert_eq!(receiver.try_recv().unwrap(), frame);

        let update = Frame::event("documents.update", json!({"id": "d1"}));
        let delivered = registry.broadcast(&[channel], &update).await;
        assert_eq!(delivered, 0);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_receiver_is_evicted_on_next_send() {
        let registry = LocalRegistry::new();
        let user_id = Uuid::now_v7();
        let team_id = Uuid::now_v7();
        let (_, receiver) = registry.register(user_id, team_id).await;
        drop(receiver);

        let frame = Frame::event("groups.create", json!({"id": "g1"}));
        let delivered = registry.broadcast(&[Channel::Team(team_id)], &frame).await;

        assert_eq!(delivered, 0);
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn disconnect_removes_the_connection() {
        let registry = LocalRegistry::new();
        let (connection_id, _receiver) = registry.register(Uuid::now_v7(), Uuid::now_v7()).await;
        assert_eq!(registry.connection_count().await, 1);

        registry.disconnect(connection_id).await;
        assert_eq!(registry.connection_count().await, 0);
    }
}
