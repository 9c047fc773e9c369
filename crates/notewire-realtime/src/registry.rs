// Connection registry seam
//
// The dispatcher never owns connections; it calls through this trait. The
// in-process implementation is LocalRegistry. A deployment fronting several
// nodes can substitute a registry that relays over its transport of choice,
// and everything upstream of this trait is unchanged.

use async_trait::async_trait;
use uuid::Uuid;

use notewire_core::Channel;

use crate::frame::Frame;

/// Live-connection index and delivery surface.
///
/// All delivery is best-effort: a connection that cannot accept a frame is
/// treated as disconnected and dropped from the index. Methods return the
/// number of connections actually reached.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Deliver the frame at most once to every connection subscribed to
    /// any of the listed channels.
    async fn broadcast(&self, channels: &[Channel], frame: &Frame) -> usize;

    /// Subscribe every connection of `user_id` to `channel`, then deliver
    /// the control frame to those connections.
    async fn join(&self, user_id: Uuid, channel: &Channel, frame: &Frame) -> usize;

    /// Unsubscribe every connection of `user_id` from `channel`, then
    /// deliver the control frame to those connections.
    async fn leave(&self, user_id: Uuid, channel: &Channel, frame: &Frame) -> usize;
}
