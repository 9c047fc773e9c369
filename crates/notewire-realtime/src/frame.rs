// Outbound wire frames
//
// Two shapes reach a client: payload frames carrying an event under its
// wire name, and join/leave control frames that tell the client its
// subscription set changed. Both serialize to the flat JSON objects the
// frontend protocol expects; the untagged enum keeps them one Rust type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use notewire_core::topology::ControlAction;
use notewire_core::Channel;

/// One frame as written to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    /// `{"type": "<eventName>", "data": {...}}`
    Event {
        #[serde(rename = "type")]
        name: String,
        data: Value,
    },
    /// `{"type": "join"|"leave", "channel": "<name>", "event": "<eventName>"}`
    Control {
        #[serde(rename = "type")]
        action: String,
        channel: String,
        event: String,
    },
}

impl Frame {
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Frame::Event {
            name: name.into(),
            data,
        }
    }

    pub fn control(action: ControlAction, channel: &Channel, event_name: &str) -> Self {
        Frame::Control {
            action: action.verb().to_string(),
            channel: channel.to_string(),
            event: event_name.to_string(),
        }
    }

    /// Frame label for logging: the event name, or the control verb.
    pub fn label(&self) -> &str {
        match self {
            Frame::Event { name, .. } => name,
            Frame::Control { action, .. } => action,
        }
    }
}
