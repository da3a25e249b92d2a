//! Outbound message broadcast.

use riptide_messages::Message;
use tokio::sync::mpsc;
use tracing::warn;

/// Fire-and-forget, best-effort broadcast.
///
/// The consensus protocol tolerates arbitrary loss and reordering, so
/// implementations report nothing back. The transport is expected to
/// deliver a replica's own messages back to it, the way gossip transports
/// do; a replica does not short-circuit its own votes.
pub trait Broadcaster {
    fn broadcast(&self, message: Message);
}

/// A broadcaster that hands messages to a channel consumed by the network
/// task.
pub struct ChannelBroadcaster {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelBroadcaster {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelBroadcaster { tx }, rx)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn broadcast(&self, message: Message) {
        if self.tx.send(message).is_err() {
            // The network task is gone; timeouts will re-drive consensus if
            // it comes back.
            warn!("Broadcast dropped: network channel closed");
        }
    }
}
