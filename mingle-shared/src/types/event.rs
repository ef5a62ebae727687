use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `mingle.{domain}.{entity}.{action}`
/// Example: `mingle.messaging.message.sent`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    pub const MESSAGING_MESSAGE_SENT: &str = "mingle.messaging.message.sent";
    pub const MESSAGING_CONVERSATION_READ: &str = "mingle.messaging.conversation.read";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MessageSent {
        pub message_id: Uuid,
        pub conversation_id: Uuid,
        pub sender_id: Uuid,
        pub receiver_id: Uuid,
        pub content_preview: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ConversationRead {
        pub conversation_id: Uuid,
        pub user_id: Uuid,
        pub messages_read: i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_user_and_correlation() {
        let user = Uuid::new_v4();
        let corr = Uuid::new_v4();
        let event = Event::new(
            "mingle-messaging",
            routing_keys::MESSAGING_MESSAGE_SENT,
            payloads::MessageSent {
                message_id: Uuid::new_v4(),
                conversation_id: Uuid::new_v4(),
                sender_id: user,
                receiver_id: Uuid::new_v4(),
                content_preview: "hi".into(),
            },
        )
        .with_user(user)
        .with_correlation(corr);

        assert_eq!(event.user_id, Some(user));
        assert_eq!(event.correlation_id, Some(corr));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "mingle.messaging.message.sent");
        assert_eq!(json["data"]["content_preview"], "hi");
    }
}
