// Realtime topic names
//
// A Channel is a derived broadcast topic, never persisted: membership is
// computed live from the PermissionOracle at dispatch time because access
// grants can change between event emission and delivery.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// A named realtime broadcast topic derived from an entity id.
///
/// Serializes to its wire name (`user-<id>`, `team-<id>`, `collection-<id>`,
/// `document-<id>`, `group-<id>`) so frames carry plain strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    User(Uuid),
    Team(Uuid),
    Collection(Uuid),
    Document(Uuid),
    Group(Uuid),
}

impl Channel {
    /// Wire name of the channel, e.g. `collection-018f3e9a-…`.
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// The entity id this channel is derived from.
    pub fn entity_id(&self) -> Uuid {
        match self {
            Channel::User(id)
            | Channel::Team(id)
            | Channel::Collection(id)
            | Channel::Document(id)
            | Channel::Group(id) => *id,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::User(id) => write!(f, "user-{}", id),
            Channel::Team(id) => write!(f, "team-{}", id),
            Channel::Collection(id) => write!(f, "collection-{}", id),
            Channel::Document(id) => write!(f, "document-{}", id),
            Channel::Group(id) => write!(f, "group-{}", id),
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once('-')
            .ok_or_else(|| format!("malformed channel name: {s}"))?;
        let id = Uuid::parse_str(id).map_err(|e| format!("bad channel id in {s}: {e}"))?;
        match prefix {
            "user" => Ok(Channel::User(id)),
            "team" => Ok(Channel::Team(id)),
            "collection" => Ok(Channel::Collection(id)),
            "document" => Ok(Channel::Document(id)),
            "group" => Ok(Channel::Group(id)),
            other => Err(format!("unknown channel prefix: {other}")),
        }
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_round_trip() {
        let id = Uuid::now_v7();
        for channel in [
            Channel::User(id),
            Channel::Team(id),
            Channel::Collection(id),
            Channel::Document(id),
            Channel::Group(id),
        ] {
            let name = channel.name();
            assert_eq!(name.parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn channel_serializes_to_wire_name() {
        let id = Uuid::now_v7();
        let json = serde_json::to_value(Channel::Collection(id)).unwrap();
        assert_eq!(json, serde_json::json!(format!("collection-{id}")));
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert!("collection".parse::<Channel>().is_err());
        assert!("room-not-a-uuid".parse::<Channel>().is_err());
        assert!(format!("shelf-{}", Uuid::now_v7())
            .parse::<Channel>()
            .is_err());
    }
}
