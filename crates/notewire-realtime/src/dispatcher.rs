// Channel dispatch
//
// Thin layer between route plans and the connection registry: payload
// frames go to channel sets, control frames re-point a user's connections.
// The registry is injected, so the same dispatcher serves a single-process
// deployment and a multi-node one.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use notewire_core::topology::ControlAction;
use notewire_core::{Channel, Result};

use crate::frame::Frame;
use crate::registry::ConnectionRegistry;

pub struct Dispatcher {
    registry: Arc<dyn ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver one payload frame to every connection subscribed to any of
    /// the channels. Returns the number of connections reached.
    pub async fn dispatch(
        &self,
        event_name: &str,
        channels: &[Channel],
        payload: Value,
    ) -> Result<usize> {
        if channels.is_empty() {
            return Ok(0);
        }
        let frame = Frame::event(event_name, payload);
        let delivered = self.registry.broadcast(channels, &frame).await;
        debug!(
            event = event_name,
            channels = channels.len(),
            delivered,
            "dispatched payload frame"
        );
        Ok(delivered)
    }

    /// Re-point the subscriptions of one user's connections and tell those
    /// connections why.
    pub async fn send_control(
        &self,
        user_id: Uuid,
        action: ControlAction,
        channel: &Channel,
        event_name: &str,
    ) -> Result<usize> {
        let frame = Frame::control(action, channel, event_name);
        let delivered = match action {
            ControlAction::Join => self.registry.join(user_id, channel, &frame).await,
            ControlAction::Leave => self.registry.leave(user_id, channel, &frame).await,
        };
        debug!(
            %user_id,
            action = action.verb(),
            channel = %channel,
            delivered,
            "sent control frame"
        );
        Ok(delivered)
    }
}
