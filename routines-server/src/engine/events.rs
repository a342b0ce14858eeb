use routines_shared::api::ServerEvent;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 256;

/// Fan-out of change notifications. Listeners that fall behind lose the
/// oldest events and are expected to refetch.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn publish(&self, event: ServerEvent) {
        // No receivers is normal when no display is connected.
        let _ = self.tx.send(event);
    }

    pub fn logs_changed(&self, family_id: &str, log_ids: Vec<i32>) {
        if log_ids.is_empty() {
            return;
        }
        self.publish(ServerEvent::LogsChanged {
            family_id: family_id.to_string(),
            log_ids,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }
}
