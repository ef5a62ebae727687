use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use mingle_shared::errors::{AppError, AppResult, ErrorCode};
use mingle_shared::types::{Cursor, Page, PageParams};

use crate::blocks::BlockGate;
use crate::models::{canonical_pair, Conversation, NewConversation};
use crate::schema::{conversations, messages};
use crate::AppState;

/// One row of a user's conversation list: the other participant, the last
/// message preview, and the requester's unread count.
#[derive(Debug, Serialize)]
pub struct ConversationPreview {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub last_message: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
    pub created_at: DateTime<Utc>,
}

pub struct ConversationService;

impl ConversationService {
    /// Resolve the single conversation between two users, creating it on
    /// first contact. Idempotent under concurrent calls: the canonical pair
    /// ordering plus the unique constraint on `(user_a, user_b)` make the
    /// insert race-safe, so no check-then-insert.
    pub async fn get_or_create(
        state: &AppState,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<(Conversation, bool)> {
        if user_a == user_b {
            return Err(AppError::new(
                ErrorCode::SelfConversation,
                "cannot start a conversation with yourself",
            ));
        }

        let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

        if BlockGate::is_blocked(&mut conn, user_a, user_b)? {
            return Err(AppError::new(
                ErrorCode::UserBlocked,
                "messaging is not available between these users",
            ));
        }

        let (first, second) = canonical_pair(user_a, user_b);

        let inserted: Option<Conversation> = diesel::insert_into(conversations::table)
            .values(&NewConversation {
                id: Uuid::new_v4(),
                user_a: first,
                user_b: second,
            })
            .on_conflict((conversations::user_a, conversations::user_b))
            .do_nothing()
            .get_result(&mut conn)
            .optional()
            .map_err(|e| AppError::Database(e))?;

        if let Some(conversation) = inserted {
            tracing::debug!(conversation = %conversation.id, "conversation created");
            return Ok((conversation, true));
        }

        // Lost the race or the conversation already existed; load the winner.
        let conversation = conversations::table
            .filter(conversations::user_a.eq(first))
            .filter(conversations::user_b.eq(second))
            .first::<Conversation>(&mut conn)
            .map_err(|e| AppError::Database(e))?;

        Ok((conversation, false))
    }

    /// Load a conversation, visible to its two participants only.
    pub async fn get_by_id(
        state: &AppState,
        conversation_id: Uuid,
        requesting_user_id: Uuid,
    ) -> AppResult<Conversation> {
        let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;
        Self::load_for_participant(&mut conn, conversation_id, requesting_user_id)
    }

    pub(crate) fn load_for_participant(
        conn: &mut PgConnection,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = conversations::table
            .find(conversation_id)
            .first::<Conversation>(conn)
            .optional()
            .map_err(|e| AppError::Database(e))?
            .ok_or_else(|| {
                AppError::new(ErrorCode::ConversationNotFound, "conversation not found")
            })?;

        if !conversation.is_participant(user_id) {
            return Err(AppError::new(
                ErrorCode::NotConversationMember,
                "you are not a member of this conversation",
            ));
        }

        Ok(conversation)
    }

    /// List a user's conversations, most recent activity first, keyset
    /// paginated on `(last_message_at, id)`. Unread counts are read from the
    /// cache tier when present, falling back to the durable counter already
    /// loaded with the row.
    pub async fn list_for_user(
        state: &AppState,
        user_id: Uuid,
        params: &PageParams,
    ) -> AppResult<Page<ConversationPreview>> {
        let limit = params.limit();
        let position = params.position()?;

        let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

        let mut query = conversations::table
            .filter(
                conversations::user_a
                    .eq(user_id)
                    .or(conversations::user_b.eq(user_id)),
            )
            .order((
                conversations::last_message_at.desc(),
                conversations::id.desc(),
            ))
            .limit(limit)
            .into_boxed();

        if let Some(cursor) = position {
            query = query.filter(
                conversations::last_message_at.lt(cursor.ts).or(
                    conversations::last_message_at
                        .eq(cursor.ts)
                        .and(conversations::id.lt(cursor.id)),
                ),
            );
        }

        let convs: Vec<Conversation> = query
            .load(&mut conn)
            .map_err(|e| AppError::Database(e))?;

        // Batch-load the denormalized last messages for previews.
        let last_ids: Vec<Uuid> = convs.iter().filter_map(|c| c.last_message_id).collect();
        let mut last_contents: HashMap<Uuid, Option<String>> = HashMap::new();
        if !last_ids.is_empty() {
            let rows: Vec<(Uuid, Option<String>)> = messages::table
                .filter(messages::id.eq_any(&last_ids))
                .select((messages::id, messages::content))
                .load(&mut conn)
                .map_err(|e| AppError::Database(e))?;
            last_contents.extend(rows);
        }

        let next_cursor = if convs.len() as i64 == limit {
            convs
                .last()
                .map(|c| Cursor::new(c.last_message_at, c.id).encode())
        } else {
            None
        };

        let mut previews = Vec::with_capacity(convs.len());
        for conv in convs {
            let unread_count = match state.counters.cached_conversation(user_id, conv.id).await {
                Some(value) => value,
                None => {
                    let durable = conv.unread_for(user_id);
                    state
                        .counters
                        .backfill_conversation(user_id, conv.id, durable)
                        .await;
                    durable
                }
            };

            let last_message = conv.last_message_id.map(|id| {
                last_contents
                    .get(&id)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| "[media]".to_string())
            });

            previews.push(ConversationPreview {
                id: conv.id,
                partner_id: conv.other_participant(user_id),
                last_message,
                last_message_at: conv.last_message_at,
                unread_count,
                created_at: conv.created_at,
            });
        }

        Ok(Page::new(previews, next_cursor))
    }
}
