use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mingle_shared::errors::{AppError, AppResult, ErrorCode};
use mingle_shared::types::{Cursor, Page, PageParams};

use crate::blocks::BlockGate;
use crate::events::publisher;
use crate::models::{Message, MessageMedia, NewMessage, NewMessageMedia};
use crate::schema::{conversations, message_media, messages};
use crate::services::conversation_service::ConversationService;
use crate::AppState;

/// Attachment descriptor as delivered by the upload subsystem; url, type and
/// dimensions are already validated there.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaDescriptor {
    pub url: String,
    pub media_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaDescriptor>,
    /// Caller-supplied correlation token, echoed back untouched so an
    /// optimistic UI can reconcile the pending message with the stored one.
    pub client_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SentMessage {
    #[serde(flatten)]
    pub message: Message,
    pub media: Vec<MessageMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageWithMedia {
    #[serde(flatten)]
    pub message: Message,
    pub media: Vec<MessageMedia>,
}

#[derive(Debug, Serialize)]
pub struct ReadReceipt {
    pub conversation_id: Uuid,
    pub messages_read: i64,
    pub read_at: DateTime<Utc>,
}

/// A message needs a body or at least one attachment; both is fine.
fn validate_payload(content: Option<&str>, media: &[MediaDescriptor]) -> AppResult<()> {
    let has_content = content.map_or(false, |c| !c.trim().is_empty());
    if !has_content && media.is_empty() {
        return Err(AppError::new(
            ErrorCode::EmptyMessage,
            "message must have content or media",
        ));
    }
    Ok(())
}

fn content_preview(content: Option<&str>) -> String {
    content
        .filter(|c| !c.trim().is_empty())
        .unwrap_or("[media]")
        .chars()
        .take(100)
        .collect()
}

pub struct MessageService;

impl MessageService {
    /// Persist and fan out a new message. The message insert and the
    /// receiver's durable unread increment commit in one transaction; the
    /// cache bump, the domain event and the live-delivery emit all happen
    /// after commit and cannot fail the send.
    pub async fn send(
        state: &AppState,
        sender_id: Uuid,
        conversation_id: Uuid,
        outgoing: OutgoingMessage,
    ) -> AppResult<SentMessage> {
        validate_payload(outgoing.content.as_deref(), &outgoing.media)?;

        let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

        let conversation =
            ConversationService::load_for_participant(&mut conn, conversation_id, sender_id)?;
        let receiver_id = conversation.other_participant(sender_id);

        // Blocking is mutable; enforce it on every send, not only at
        // conversation creation.
        if BlockGate::is_blocked(&mut conn, sender_id, receiver_id)? {
            return Err(AppError::new(
                ErrorCode::UserBlocked,
                "messaging is not available between these users",
            ));
        }

        let new_message = NewMessage {
            id: Uuid::now_v7(),
            conversation_id,
            sender_id,
            receiver_id,
            content: outgoing.content.clone(),
        };

        let (message, mut media) = conn.transaction::<_, AppError, _>(|conn| {
            let message: Message = diesel::insert_into(messages::table)
                .values(&new_message)
                .get_result(conn)?;

            let media_rows: Vec<NewMessageMedia> = outgoing
                .media
                .iter()
                .enumerate()
                .map(|(position, descriptor)| NewMessageMedia {
                    id: Uuid::new_v4(),
                    message_id: message.id,
                    position: position as i32,
                    url: descriptor.url.clone(),
                    media_type: descriptor.media_type.clone(),
                    width: descriptor.width,
                    height: descriptor.height,
                })
                .collect();

            let media: Vec<MessageMedia> = if media_rows.is_empty() {
                vec![]
            } else {
                diesel::insert_into(message_media::table)
                    .values(&media_rows)
                    .get_results(conn)?
            };

            if receiver_id == conversation.user_a {
                diesel::update(conversations::table.find(conversation_id))
                    .set((
                        conversations::last_message_id.eq(message.id),
                        conversations::last_message_at.eq(message.created_at),
                        conversations::unread_count_a.eq(conversations::unread_count_a + 1),
                        conversations::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;
            } else {
                diesel::update(conversations::table.find(conversation_id))
                    .set((
                        conversations::last_message_id.eq(message.id),
                        conversations::last_message_at.eq(message.created_at),
                        conversations::unread_count_b.eq(conversations::unread_count_b + 1),
                        conversations::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;
            }

            Ok((message, media))
        })?;

        media.sort_by_key(|m| m.position);

        // The durable write is committed; everything below is best-effort.
        state.counters.bump(receiver_id, conversation_id, 1).await;

        let preview = content_preview(message.content.as_deref());
        {
            let rabbitmq = state.rabbitmq.clone();
            let preview = preview.clone();
            let message_id = message.id;
            tokio::spawn(async move {
                publisher::publish_message_sent(
                    &rabbitmq,
                    message_id,
                    conversation_id,
                    sender_id,
                    receiver_id,
                    &preview,
                )
                .await;
            });
        }

        let payload = serde_json::json!({
            "conversation_id": conversation_id,
            "preview": preview,
            "message": {
                "id": message.id,
                "conversation_id": message.conversation_id,
                "sender_id": message.sender_id,
                "receiver_id": message.receiver_id,
                "content": &message.content,
                "media": &media,
                "created_at": message.created_at,
            },
        });
        state.delivery.send_to_user(receiver_id, "new_message", payload);

        tracing::info!(
            sender = %sender_id,
            receiver = %receiver_id,
            conversation = %conversation_id,
            message = %message.id,
            "message sent"
        );

        Ok(SentMessage {
            message,
            media,
            client_ref: outgoing.client_ref,
        })
    }

    /// Page through a conversation's messages, newest first, strictly older
    /// than the cursor position.
    pub async fn list(
        state: &AppState,
        conversation_id: Uuid,
        requesting_user_id: Uuid,
        params: &PageParams,
    ) -> AppResult<Page<MessageWithMedia>> {
        let limit = params.limit();
        let position = params.position()?;

        let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

        ConversationService::load_for_participant(&mut conn, conversation_id, requesting_user_id)?;

        let mut query = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .order((messages::created_at.desc(), messages::id.desc()))
            .limit(limit)
            .into_boxed();

        if let Some(cursor) = position {
            query = query.filter(
                messages::created_at.lt(cursor.ts).or(messages::created_at
                    .eq(cursor.ts)
                    .and(messages::id.lt(cursor.id))),
            );
        }

        let rows: Vec<Message> = query
            .load(&mut conn)
            .map_err(|e| AppError::Database(e))?;

        let ids: Vec<Uuid> = rows.iter().map(|m| m.id).collect();
        let mut media_map: HashMap<Uuid, Vec<MessageMedia>> = HashMap::new();
        if !ids.is_empty() {
            let all_media: Vec<MessageMedia> = message_media::table
                .filter(message_media::message_id.eq_any(&ids))
                .order(message_media::position.asc())
                .load(&mut conn)
                .map_err(|e| AppError::Database(e))?;
            for item in all_media {
                media_map.entry(item.message_id).or_default().push(item);
            }
        }

        let next_cursor = if rows.len() as i64 == limit {
            rows.last().map(|m| Cursor::new(m.created_at, m.id).encode())
        } else {
            None
        };

        let items = rows
            .into_iter()
            .map(|message| {
                let media = media_map.remove(&message.id).unwrap_or_default();
                MessageWithMedia { message, media }
            })
            .collect();

        Ok(Page::new(items, next_cursor))
    }

    /// Mark everything addressed to `user_id` in the conversation as read.
    /// Idempotent: a second call with nothing unread succeeds as a no-op.
    pub async fn mark_read(
        state: &AppState,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<ReadReceipt> {
        let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

        let conversation =
            ConversationService::load_for_participant(&mut conn, conversation_id, user_id)?;

        // Capture the unread count before any mutation: the cache total is
        // later decremented by exactly this amount, so a send landing between
        // the capture and the decrement cannot be double-counted.
        let pending = match state
            .counters
            .cached_conversation(user_id, conversation_id)
            .await
        {
            Some(value) => value,
            None => conversation.unread_for(user_id),
        };

        let (messages_read, read_at) = conn.transaction::<_, AppError, _>(|conn| {
            let read_at = Utc::now();
            let messages_read = diesel::update(
                messages::table
                    .filter(messages::conversation_id.eq(conversation_id))
                    .filter(messages::receiver_id.eq(user_id))
                    .filter(messages::is_read.eq(false)),
            )
            .set((messages::is_read.eq(true), messages::updated_at.eq(read_at)))
            .execute(conn)? as i64;

            if user_id == conversation.user_a {
                diesel::update(conversations::table.find(conversation_id))
                    .set(conversations::unread_count_a.eq(0i64))
                    .execute(conn)?;
            } else {
                diesel::update(conversations::table.find(conversation_id))
                    .set(conversations::unread_count_b.eq(0i64))
                    .execute(conn)?;
            }

            Ok((messages_read, read_at))
        })?;

        if pending > 0 {
            state.counters.drop_total(user_id, pending).await;
            state
                .counters
                .reset_conversation(user_id, conversation_id)
                .await;
        }

        {
            let rabbitmq = state.rabbitmq.clone();
            tokio::spawn(async move {
                publisher::publish_conversation_read(
                    &rabbitmq,
                    conversation_id,
                    user_id,
                    messages_read,
                )
                .await;
            });
        }

        Ok(ReadReceipt {
            conversation_id,
            messages_read,
            read_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(url: &str) -> MediaDescriptor {
        MediaDescriptor {
            url: url.into(),
            media_type: "image/png".into(),
            width: Some(640),
            height: Some(480),
        }
    }

    #[test]
    fn rejects_message_with_no_content_and_no_media() {
        for content in [None, Some(""), Some("   ")] {
            let err = validate_payload(content, &[]).unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::EmptyMessage, "{content:?}");
        }
    }

    #[test]
    fn accepts_content_or_media_or_both() {
        assert!(validate_payload(Some("hi"), &[]).is_ok());
        assert!(validate_payload(None, &[media("https://cdn/a.png")]).is_ok());
        assert!(validate_payload(Some("caption"), &[media("https://cdn/a.png")]).is_ok());
    }

    #[test]
    fn preview_truncates_to_100_chars() {
        let long = "x".repeat(250);
        let preview = content_preview(Some(&long));
        assert_eq!(preview.chars().count(), 100);
    }

    #[test]
    fn preview_falls_back_for_media_only_messages() {
        assert_eq!(content_preview(None), "[media]");
        assert_eq!(content_preview(Some("  ")), "[media]");
        assert_eq!(content_preview(Some("hello")), "hello");
    }
}
