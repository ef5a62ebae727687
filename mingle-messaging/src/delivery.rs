use serde_json::Value;
use socketioxide::SocketIo;
use uuid::Uuid;

/// Push an event to a user's connected clients. Dispatch is fire-and-forget:
/// it must not block the caller, and an undeliverable event is dropped after
/// logging. Connection management, reconnection, and multi-device fan-out
/// belong to the transport behind the implementation.
pub trait LiveDelivery: Send + Sync {
    fn send_to_user(&self, user_id: Uuid, event: &str, payload: Value);
}

/// Socket.IO-backed delivery. Clients join their `user:{id}` room on connect;
/// emitting to the room reaches every device the user has online.
pub struct SocketDelivery {
    io: SocketIo,
}

impl SocketDelivery {
    pub fn new(io: SocketIo) -> Self {
        Self { io }
    }
}

impl LiveDelivery for SocketDelivery {
    fn send_to_user(&self, user_id: Uuid, event: &str, payload: Value) {
        let room = format!("user:{user_id}");
        if let Err(e) = self.io.to(room.clone()).emit(event.to_string(), &payload) {
            tracing::warn!(error = %e, room = %room, event = %event, "live delivery emit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingDelivery {
        sent: Mutex<Vec<(Uuid, String, Value)>>,
    }

    impl LiveDelivery for RecordingDelivery {
        fn send_to_user(&self, user_id: Uuid, event: &str, payload: Value) {
            self.sent
                .lock()
                .unwrap()
                .push((user_id, event.to_string(), payload));
        }
    }

    #[test]
    fn events_reach_the_addressed_user_only() {
        let delivery = Arc::new(RecordingDelivery::default());
        let as_trait: Arc<dyn LiveDelivery> = delivery.clone();

        let receiver = Uuid::new_v4();
        as_trait.send_to_user(
            receiver,
            "new_message",
            serde_json::json!({ "content": "hi" }),
        );

        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, receiver);
        assert_eq!(sent[0].1, "new_message");
        assert_eq!(sent[0].2["content"], "hi");
    }
}
