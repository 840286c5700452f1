//! In-process notification hub.
//!
//! One broadcast room per user; every WebSocket session of that user
//! subscribes to the same room. Rooms are pruned once their last
//! receiver disconnects.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{Event, Notifier};
use crate::config::NOTIFY_ROOM_CAPACITY;

/// Per-user broadcast rooms.
#[derive(Default)]
pub struct Hub {
    rooms: RwLock<HashMap<Uuid, broadcast::Sender<Event>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to the user's room, creating it on first use.
    pub fn subscribe(&self, user: Uuid) -> broadcast::Receiver<Event> {
        let mut rooms = self.rooms.write().expect("hub lock poisoned");
        rooms
            .entry(user)
            .or_insert_with(|| broadcast::channel(NOTIFY_ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Drop the user's room if no connections remain.
    pub fn prune(&self, user: Uuid) {
        let mut rooms = self.rooms.write().expect("hub lock poisoned");
        if let Some(sender) = rooms.get(&user) {
            if sender.receiver_count() == 0 {
                rooms.remove(&user);
            }
        }
    }

    /// Number of live connections for a user (used by tests).
    pub fn connection_count(&self, user: Uuid) -> usize {
        self.rooms
            .read()
            .expect("hub lock poisoned")
            .get(&user)
            .map_or(0, |sender| sender.receiver_count())
    }
}

impl Notifier for Hub {
    fn notify(&self, recipient: Uuid, event: Event) {
        let rooms = match self.rooms.read() {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::error!("Notification hub lock poisoned: {}", e);
                return;
            }
        };

        match rooms.get(&recipient) {
            Some(sender) => {
                // Err means no live receivers; the user went offline
                // between lookup and send. Best-effort, so just log.
                if sender.send(event).is_err() {
                    tracing::debug!(user = %recipient, "Dropped event for offline user");
                }
            }
            None => {
                tracing::debug!(user = %recipient, "No notification room for user");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_event() -> Event {
        Event::ServiceStatusChanged {
            service_id: Uuid::new_v4(),
            status: crate::domain::ServiceStatus::Cancelled,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_events_for_its_room() {
        let hub = Hub::new();
        let user = Uuid::new_v4();
        let mut rx = hub.subscribe(user);

        hub.notify(user, test_event());

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::ServiceStatusChanged { .. }));
    }

    #[tokio::test]
    async fn events_do_not_leak_across_rooms() {
        let hub = Hub::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut rx = hub.subscribe(other);

        hub.notify(user, test_event());

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn notify_without_room_is_a_noop() {
        let hub = Hub::new();
        // Must not panic or error
        hub.notify(Uuid::new_v4(), test_event());
    }

    #[test]
    fn prune_removes_empty_rooms() {
        let hub = Hub::new();
        let user = Uuid::new_v4();

        let rx = hub.subscribe(user);
        assert_eq!(hub.connection_count(user), 1);

        drop(rx);
        hub.prune(user);
        assert_eq!(hub.connection_count(user), 0);
    }
}
