// Realtime fan-out processor
//
// Turns one event into live frames: resolves the route plan, pushes the
// control directives so connections are re-pointed before the payload
// lands, then broadcasts the payload to the plan's channels.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use notewire_core::{EntityStore, Event, EventPayload, Result, TopologyResolver};
use notewire_realtime::Dispatcher;

use crate::engine::EngineHandle;
use crate::processor::Processor;

pub struct RealtimeProcessor {
    resolver: TopologyResolver,
    dispatcher: Dispatcher,
    entities: Arc<dyn EntityStore>,
}

impl RealtimeProcessor {
    pub fn new(
        resolver: TopologyResolver,
        dispatcher: Dispatcher,
        entities: Arc<dyn EntityStore>,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            entities,
        }
    }

    /// Frame payload: the event's own fields plus a snapshot of the primary
    /// entity, fetched live so clients see the current state rather than the
    /// state at emit time. A row that is already gone leaves ids only.
    async fn build_data(&self, event: &Event) -> Result<Value> {
        let tagged = serde_json::to_value(&event.payload)?;
        let mut data = match tagged.get("data").cloned() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        if let Some(document_id) = event.document_id() {
            // The permanent-delete row is gone; the ids in the payload are
            // all the clients get.
            if !matches!(
                event.payload,
                EventPayload::DocumentPermanentlyDeleted { .. }
            ) {
                if let Some(document) = self.entities.document(document_id).await? {
                    data.insert("document".to_string(), serde_json::to_value(&document)?);
                }
            }
        } else if let Some(collection_id) = event.collection_id() {
            if let Some(collection) = self.entities.collection(collection_id).await? {
                data.insert("collection".to_string(), serde_json::to_value(&collection)?);
            }
        } else if let Some(group_id) = event.group_id() {
            if let Some(group) = self.entities.group(group_id).await? {
                data.insert("group".to_string(), serde_json::to_value(&group)?);
            }
        }

        Ok(Value::Object(data))
    }
}

#[async_trait]
impl Processor for RealtimeProcessor {
    fn name(&self) -> &'static str {
        "realtime"
    }

    fn applies_to(&self, event: &Event) -> bool {
        // Revisions drive subscriptions and notifications, never frames.
        !matches!(event.payload, EventPayload::RevisionCreated { .. })
    }

    async fn process(&self, event: &Event, _handle: &EngineHandle) -> Result<()> {
        let plan = self.resolver.resolve(event).await?;
        if plan.is_empty() {
            debug!(event = event.name(), event_id = %event.id, "no routes, event skipped");
            return Ok(());
        }

        // Controls first, so a connection joined by this very event already
        // holds the channel when the payload frame goes out.
        for control in &plan.controls {
            self.dispatcher
                .send_control(control.user_id, control.action, &control.channel, event.name())
                .await?;
        }

        let data = self.build_data(event).await?;
        self.dispatcher
            .dispatch(event.name(), &plan.channels, data)
            .await?;
        Ok(())
    }
}
