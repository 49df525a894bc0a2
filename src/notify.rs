use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Change feed. One broadcast channel per equipment plus a venue channel for
/// changes that affect every unit (closed days).
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
    venue: broadcast::Sender<Event>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            venue: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to changes of one unit. Creates the channel if needed.
    pub fn subscribe(&self, equipment_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(equipment_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    pub fn subscribe_venue(&self) -> broadcast::Receiver<Event> {
        self.venue.subscribe()
    }

    /// Route an event to every channel in its scope. No-op without listeners.
    pub fn publish(&self, event: &Event) {
        let scope = event.equipment_scope();
        if scope.is_empty() {
            let _ = self.venue.send(event.clone());
            return;
        }
        for id in scope {
            if let Some(sender) = self.channels.get(&id) {
                let _ = sender.send(event.clone());
            }
        }
    }
}
