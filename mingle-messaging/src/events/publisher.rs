use uuid::Uuid;

use mingle_shared::clients::rabbitmq::RabbitMQClient;
use mingle_shared::types::event::{payloads, routing_keys, Event};

pub async fn publish_message_sent(
    rabbitmq: &RabbitMQClient,
    message_id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    content_preview: &str,
) {
    let event = Event::new(
        "mingle-messaging",
        routing_keys::MESSAGING_MESSAGE_SENT,
        payloads::MessageSent {
            message_id,
            conversation_id,
            sender_id,
            receiver_id,
            content_preview: content_preview.to_string(),
        },
    )
    .with_user(sender_id);

    if let Err(e) = rabbitmq
        .publish(routing_keys::MESSAGING_MESSAGE_SENT, &event)
        .await
    {
        tracing::error!(error = %e, "failed to publish message.sent event");
    }
}

pub async fn publish_conversation_read(
    rabbitmq: &RabbitMQClient,
    conversation_id: Uuid,
    user_id: Uuid,
    messages_read: i64,
) {
    let event = Event::new(
        "mingle-messaging",
        routing_keys::MESSAGING_CONVERSATION_READ,
        payloads::ConversationRead {
            conversation_id,
            user_id,
            messages_read,
        },
    )
    .with_user(user_id);

    if let Err(e) = rabbitmq
        .publish(routing_keys::MESSAGING_CONVERSATION_READ, &event)
        .await
    {
        tracing::error!(error = %e, "failed to publish conversation.read event");
    }
}
