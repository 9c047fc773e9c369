// Database-backed EventLog implementation
//
// Events are stored with their payload in tagged JSON form, so a row can
// be rebuilt into the exact Event that was appended. A row whose payload
// no longer parses (an old kind this build no longer knows) is a store
// error on read; the log itself is append-only and never migrated.

use async_trait::async_trait;
use notewire_core::{EngineError, Event, EventLog, EventPayload, Result, StoredEvent};
use uuid::Uuid;

use crate::models::EventRow;
use crate::repositories::Database;

// ============================================================================
// DbEventLog - Append-only event log in Postgres
// ============================================================================

#[derive(Clone)]
pub struct DbEventLog {
    db: Database,
}

impl DbEventLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn into_stored(row: EventRow) -> Result<StoredEvent> {
    let payload: EventPayload = serde_json::from_value(row.payload)?;
    Ok(StoredEvent {
        sequence: row.sequence,
        event: Event {
            id: row.id,
            team_id: row.team_id,
            actor_id: row.actor_id,
            created_at: row.created_at,
            payload,
        },
    })
}

#[async_trait]
impl EventLog for DbEventLog {
    async fn append(&self, event: &Event) -> Result<i64> {
        let payload = serde_json::to_value(&event.payload)?;
        let row = self
            .db
            .insert_event(
                event.id,
                event.team_id,
                event.actor_id,
                event.name(),
                payload,
                event.created_at,
            )
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;
        Ok(row.sequence)
    }

    async fn list_for_team(&self, team_id: Uuid, since: Option<i64>) -> Result<Vec<StoredEvent>> {
        let rows = self
            .db
            .list_events_for_team(team_id, since)
            .await
            .map_err(|e| EngineError::store(e.to_string()))?;
        rows.into_iter().map(into_stored).collect()
    }
}
